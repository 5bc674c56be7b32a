use crate::coroutine::drive;
use crate::store_error::catch_panic;
use crate::{ReducerResult, State, StateStream, StoreError};
use futures::stream::{self, StreamExt};
use std::task::Poll;
use tokio::sync::mpsc::{self, UnboundedSender};

/// Turns any [`ReducerResult`] into a [`StateStream`].
///
/// Streams pass through untouched; deferred values become single-element streams; coroutines
/// are driven step by step; thunks are started immediately.
pub fn normalize<S: State>(result: ReducerResult<S>) -> StateStream<S> {
    match result {
        ReducerResult::Sync(value) => StateStream::once(value),
        ReducerResult::Deferred(future) => StateStream::new(stream::once(future)),
        ReducerResult::Stream(stream) => stream,
        ReducerResult::Coroutine(coroutine) => drive(coroutine),
        ReducerResult::Thunk(thunk) => start_thunk(thunk),
        ReducerResult::Failed(error) => StateStream::failed(error),
    }
}

/// Awaits only the terminal value of `result`.
///
/// Fails with the first error of the normalized stream, or with [`StoreError::Empty`] if it
/// completes without emitting.
pub async fn settle<S: State>(result: ReducerResult<S>) -> Result<S, StoreError> {
    if let ReducerResult::Sync(value) = result {
        return Ok(value);
    }
    let mut stream = normalize(result);
    let mut last = None;
    while let Some(item) = stream.next().await {
        last = Some(item?);
    }
    last.ok_or(StoreError::Empty)
}

enum Signal<S> {
    Next(S),
    Error(StoreError),
    Complete,
}

/// The callbacks handed to a thunk reducer.
///
/// Calls made after `error` or `complete` are ignored. Dropping every clone of the emitter
/// completes the stream as well.
pub struct Emitter<S> {
    tx: UnboundedSender<Signal<S>>,
}

impl<S> Clone for Emitter<S> {
    fn clone(&self) -> Self {
        Emitter {
            tx: self.tx.clone(),
        }
    }
}

impl<S> Emitter<S> {
    pub fn next(&self, value: S) {
        let _ = self.tx.send(Signal::Next(value));
    }

    pub fn error(&self, error: impl Into<StoreError>) {
        let _ = self.tx.send(Signal::Error(error.into()));
    }

    pub fn complete(&self) {
        let _ = self.tx.send(Signal::Complete);
    }
}

fn start_thunk<S: State>(thunk: Box<dyn FnOnce(Emitter<S>) + Send>) -> StateStream<S> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    if let Err(error) = catch_panic(|| thunk(Emitter { tx })) {
        return StateStream::failed(error);
    }
    let mut finished = false;
    StateStream::new(stream::poll_fn(move |cx| {
        if finished {
            return Poll::Ready(None);
        }
        match rx.poll_recv(cx) {
            Poll::Ready(Some(Signal::Next(value))) => Poll::Ready(Some(Ok(value))),
            Poll::Ready(Some(Signal::Error(error))) => {
                finished = true;
                Poll::Ready(Some(Err(error)))
            }
            Poll::Ready(Some(Signal::Complete)) | Poll::Ready(None) => {
                finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }))
}
