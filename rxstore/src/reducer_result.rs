use crate::{Coroutine, Emitter, FromFn, Lazy, Resume, State, StateStream, Step, StoreError};
use futures::future::BoxFuture;
use futures::{FutureExt, Stream, StreamExt};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Everything a reducer, selector or recovery handler may answer with.
///
/// Each variant is one way of describing "the next state(s)"; [`normalize`](crate::normalize)
/// turns all of them into a [`StateStream`].
pub enum ReducerResult<S> {
    /// The next state, available right away.
    Sync(S),
    /// A single state that becomes available later.
    Deferred(BoxFuture<'static, Result<S, StoreError>>),
    /// Several states over time.
    Stream(StateStream<S>),
    /// A suspendable computation whose yields are the emitted states.
    Coroutine(Box<dyn Coroutine<S>>),
    /// A callback-driven producer, started as soon as it is normalized.
    Thunk(Box<dyn FnOnce(Emitter<S>) + Send>),
    /// The reducer failed synchronously.
    Failed(StoreError),
}

impl<S: State> ReducerResult<S> {
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = S> + Send + 'static,
    {
        ReducerResult::Deferred(future.map(Ok).boxed())
    }

    pub fn try_deferred<F, E>(future: F) -> Self
    where
        F: Future<Output = Result<S, E>> + Send + 'static,
        E: ToString,
    {
        ReducerResult::Deferred(
            future
                .map(|result| result.map_err(|e| StoreError::Error(e.to_string())))
                .boxed(),
        )
    }

    pub fn stream<T>(stream: T) -> Self
    where
        T: Stream<Item = S> + Send + 'static,
    {
        ReducerResult::Stream(StateStream::new(stream.map(Ok)))
    }

    pub fn try_stream<T, E>(stream: T) -> Self
    where
        T: Stream<Item = Result<S, E>> + Send + 'static,
        E: ToString,
    {
        ReducerResult::Stream(StateStream::new(
            stream.map(|item| item.map_err(|e| StoreError::Error(e.to_string()))),
        ))
    }

    pub fn coroutine<C>(coroutine: C) -> Self
    where
        C: Coroutine<S> + 'static,
    {
        ReducerResult::Coroutine(Box::new(coroutine))
    }

    /// A coroutine built by `constructor` the first time the resulting stream is polled.
    pub fn coroutine_with<C, F>(constructor: F) -> Self
    where
        C: Coroutine<S> + 'static,
        F: FnOnce() -> C + Send + 'static,
    {
        ReducerResult::Coroutine(Box::new(Lazy::new(constructor)))
    }

    /// A coroutine written as a single resume function.
    pub fn coroutine_fn<F>(resume: F) -> Self
    where
        F: FnMut(Resume<S>) -> Step<S> + Send + 'static,
    {
        ReducerResult::Coroutine(Box::new(FromFn::new(resume)))
    }

    pub fn thunk<F>(thunk: F) -> Self
    where
        F: FnOnce(Emitter<S>) + Send + 'static,
    {
        ReducerResult::Thunk(Box::new(thunk))
    }

    pub fn failed(error: impl Into<StoreError>) -> Self {
        ReducerResult::Failed(error.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ReducerResult::Sync(_) => "sync",
            ReducerResult::Deferred(_) => "deferred",
            ReducerResult::Stream(_) => "stream",
            ReducerResult::Coroutine(_) => "coroutine",
            ReducerResult::Thunk(_) => "thunk",
            ReducerResult::Failed(_) => "failed",
        }
    }
}

impl<S> fmt::Debug for ReducerResult<S>
where
    S: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReducerResult::Sync(value) => f.debug_tuple("Sync").field(value).finish(),
            ReducerResult::Failed(error) => f.debug_tuple("Failed").field(error).finish(),
            ReducerResult::Deferred(_) => f.write_str("Deferred(..)"),
            ReducerResult::Stream(_) => f.write_str("Stream(..)"),
            ReducerResult::Coroutine(_) => f.write_str("Coroutine(..)"),
            ReducerResult::Thunk(_) => f.write_str("Thunk(..)"),
        }
    }
}

/// Conversion of a reducer's return value into a [`ReducerResult`].
///
/// Plain states, `Result`s and streams can be returned from reducers without wrapping them.
pub trait IntoReducerResult<S> {
    fn into_result(self) -> ReducerResult<S>;
}

impl<S: State> IntoReducerResult<S> for S {
    fn into_result(self) -> ReducerResult<S> {
        ReducerResult::Sync(self)
    }
}

impl<S> IntoReducerResult<S> for ReducerResult<S> {
    fn into_result(self) -> ReducerResult<S> {
        self
    }
}

impl<S> IntoReducerResult<S> for StateStream<S> {
    fn into_result(self) -> ReducerResult<S> {
        ReducerResult::Stream(self)
    }
}

impl<S: State, E> IntoReducerResult<S> for Result<S, E>
where
    E: ToString,
{
    fn into_result(self) -> ReducerResult<S> {
        match self {
            Ok(value) => ReducerResult::Sync(value),
            Err(error) => ReducerResult::Failed(StoreError::Error(error.to_string())),
        }
    }
}

impl<S, E> IntoReducerResult<S> for Result<ReducerResult<S>, E>
where
    E: ToString,
{
    fn into_result(self) -> ReducerResult<S> {
        match self {
            Ok(result) => result,
            Err(error) => ReducerResult::Failed(StoreError::Error(error.to_string())),
        }
    }
}

impl<S> From<StateStream<S>> for ReducerResult<S> {
    fn from(stream: StateStream<S>) -> Self {
        ReducerResult::Stream(stream)
    }
}

type ReduceFn<S, A> = dyn Fn(S, &A) -> ReducerResult<S> + Send + Sync;

/// A shareable `(previous state, action) -> next state(s)` function.
pub struct Reducer<S, A> {
    reduce: Arc<ReduceFn<S, A>>,
}

impl<S: 'static, A: 'static> Reducer<S, A> {
    pub fn new<F, R>(reduce: F) -> Self
    where
        F: Fn(S, &A) -> R + Send + Sync + 'static,
        R: IntoReducerResult<S>,
    {
        Reducer {
            reduce: Arc::new(move |state: S, action: &A| reduce(state, action).into_result()),
        }
    }

    pub fn reduce(&self, state: S, action: &A) -> ReducerResult<S> {
        (self.reduce)(state, action)
    }
}

impl<S, A> Clone for Reducer<S, A> {
    fn clone(&self) -> Self {
        Reducer {
            reduce: Arc::clone(&self.reduce),
        }
    }
}

impl<S, A> fmt::Debug for Reducer<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reducer").finish_non_exhaustive()
    }
}
