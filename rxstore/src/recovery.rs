use crate::store_error::catch_panic;
use crate::{normalize, IntoReducerResult, ReducerResult, State, StateStream, StoreError};
use futures::{ready, Stream, StreamExt};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::{debug, warn};

type RecoverFn<S> = dyn Fn(StoreError, S) -> ReducerResult<S> + Send + Sync;

/// Produces the replacement result for an action whose processing failed.
///
/// The handler receives the error and the state the failed action started from. The default
/// handler keeps that state.
pub struct RecoveryHandler<S> {
    recover: Arc<RecoverFn<S>>,
}

impl<S: State> RecoveryHandler<S> {
    pub fn new<F, R>(recover: F) -> Self
    where
        F: Fn(StoreError, S) -> R + Send + Sync + 'static,
        R: IntoReducerResult<S>,
    {
        RecoveryHandler {
            recover: Arc::new(move |error: StoreError, previous: S| {
                recover(error, previous).into_result()
            }),
        }
    }

    pub fn recover(&self, error: StoreError, previous: S) -> ReducerResult<S> {
        catch_panic(|| (self.recover)(error, previous)).unwrap_or_else(ReducerResult::Failed)
    }
}

impl<S: State> Default for RecoveryHandler<S> {
    fn default() -> Self {
        RecoveryHandler::new(|error: StoreError, previous: S| {
            debug!(%error, "keeping previous state");
            previous
        })
    }
}

impl<S> Clone for RecoveryHandler<S> {
    fn clone(&self) -> Self {
        RecoveryHandler {
            recover: Arc::clone(&self.recover),
        }
    }
}

impl<S> fmt::Debug for RecoveryHandler<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryHandler").finish_non_exhaustive()
    }
}

/// Wraps the stream of one action and splices in the recovery stream on its first failure.
///
/// Errors of the recovery stream are fatal and come out as [`StoreError::Recovery`], after
/// which the gate ends.
#[must_use = "Streams do nothing unless polled"]
pub struct RecoveryGate<S> {
    stream: StateStream<S>,
    previous: S,
    handler: RecoveryHandler<S>,
    recovering: bool,
    failed: bool,
}

impl<S: State> RecoveryGate<S> {
    pub fn new(stream: StateStream<S>, previous: S, handler: RecoveryHandler<S>) -> Self {
        RecoveryGate {
            stream,
            previous,
            handler,
            recovering: false,
            failed: false,
        }
    }

    /// True once the recovery stream has replaced the original one.
    pub fn is_recovering(&self) -> bool {
        self.recovering
    }
}

impl<S> Unpin for RecoveryGate<S> {}

impl<S: State> Stream for RecoveryGate<S> {
    type Item = Result<S, StoreError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.failed {
            return Poll::Ready(None);
        }
        loop {
            match ready!(this.stream.poll_next_unpin(cx)) {
                Some(Err(error)) if !this.recovering => {
                    warn!(%error, "action failed, splicing recovery");
                    this.recovering = true;
                    let recovery = this.handler.recover(error, this.previous.clone());
                    this.stream = normalize(recovery);
                }
                Some(Err(error)) => {
                    this.failed = true;
                    return Poll::Ready(Some(Err(StoreError::recovery(error))));
                }
                other => return Poll::Ready(other),
            }
        }
    }
}
