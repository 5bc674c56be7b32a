use crate::store_error::catch_panic;
use crate::{settle, IntoReducerResult, ReducerResult, State, StateStream, StoreError};
use futures::stream;
use tracing::trace;

/// What a coroutine does when resumed.
pub enum Step<S> {
    /// Suspend on `operand`. Its terminal value is emitted and fed back into the next resume.
    Yield(ReducerResult<S>),
    /// The coroutine finished.
    Done,
    /// The coroutine raised an error.
    Failed(StoreError),
}

impl<S: State> Step<S> {
    pub fn yield_value(value: S) -> Self {
        Step::Yield(ReducerResult::Sync(value))
    }

    pub fn yield_result(operand: impl IntoReducerResult<S>) -> Self {
        Step::Yield(operand.into_result())
    }

    pub fn failed(error: impl Into<StoreError>) -> Self {
        Step::Failed(error.into())
    }
}

/// The input handed to a [`FromFn`] coroutine.
#[derive(Debug, Clone, PartialEq)]
pub enum Resume<S> {
    /// First resume, nothing has been yielded yet.
    Start,
    /// Terminal value of the previously yielded operand.
    Value(S),
    /// The previously yielded operand failed.
    Error(StoreError),
}

/// A reducer computation expressed as an explicit state machine.
///
/// Only the operands a coroutine yields itself produce states. A yielded nested coroutine is
/// settled to its terminal value, which is emitted once and handed back through `resume`.
pub trait Coroutine<S>: Send {
    /// Resumes the coroutine. `input` is `None` on the first call, and the settled value of the
    /// last yielded operand afterwards.
    fn resume(&mut self, input: Option<S>) -> Step<S>;

    /// Injects the failure of the last yielded operand. The coroutine may recover by yielding
    /// again; the default re-raises.
    fn throw(&mut self, error: StoreError) -> Step<S> {
        Step::Failed(error)
    }
}

/// Adapter turning a `FnMut(Resume<S>) -> Step<S>` into a [`Coroutine`].
pub struct FromFn<F> {
    resume: F,
}

impl<F> FromFn<F> {
    pub fn new(resume: F) -> Self {
        FromFn { resume }
    }
}

impl<S, F> Coroutine<S> for FromFn<F>
where
    F: FnMut(Resume<S>) -> Step<S> + Send,
{
    fn resume(&mut self, input: Option<S>) -> Step<S> {
        match input {
            Some(value) => (self.resume)(Resume::Value(value)),
            None => (self.resume)(Resume::Start),
        }
    }

    fn throw(&mut self, error: StoreError) -> Step<S> {
        (self.resume)(Resume::Error(error))
    }
}

/// A coroutine constructed on its first resume.
pub struct Lazy<C, F> {
    constructor: Option<F>,
    coroutine: Option<C>,
}

impl<C, F> Lazy<C, F> {
    pub fn new(constructor: F) -> Self {
        Lazy {
            constructor: Some(constructor),
            coroutine: None,
        }
    }
}

impl<C, F> Lazy<C, F>
where
    F: FnOnce() -> C,
{
    fn get(&mut self) -> Option<&mut C> {
        if let Some(constructor) = self.constructor.take() {
            self.coroutine = Some(constructor());
        }
        self.coroutine.as_mut()
    }
}

impl<S, C, F> Coroutine<S> for Lazy<C, F>
where
    C: Coroutine<S>,
    F: FnOnce() -> C + Send,
{
    fn resume(&mut self, input: Option<S>) -> Step<S> {
        match self.get() {
            Some(coroutine) => coroutine.resume(input),
            None => Step::Done,
        }
    }

    fn throw(&mut self, error: StoreError) -> Step<S> {
        match self.get() {
            Some(coroutine) => coroutine.throw(error),
            None => Step::Failed(error),
        }
    }
}

enum Phase<S> {
    Resume(Option<S>),
    Throw(StoreError),
    Finished,
}

/// Drives `coroutine` to completion, emitting the settled value of each yielded operand.
pub(crate) fn drive<S: State>(coroutine: Box<dyn Coroutine<S>>) -> StateStream<S> {
    StateStream::new(stream::unfold(
        (coroutine, Phase::Resume(None)),
        |(mut coroutine, mut phase)| async move {
            loop {
                let step = match phase {
                    Phase::Resume(input) => catch_panic(|| coroutine.resume(input)),
                    Phase::Throw(error) => catch_panic(|| coroutine.throw(error)),
                    Phase::Finished => return None,
                };
                match step.unwrap_or_else(Step::Failed) {
                    Step::Done => return None,
                    Step::Failed(error) => {
                        return Some((Err(error), (coroutine, Phase::Finished)));
                    }
                    Step::Yield(operand) => match settle(operand).await {
                        Ok(value) => {
                            let input = value.clone();
                            return Some((Ok(value), (coroutine, Phase::Resume(Some(input)))));
                        }
                        Err(error) => {
                            trace!(%error, "coroutine operand failed");
                            phase = Phase::Throw(error);
                        }
                    },
                }
            }
        },
    ))
}
