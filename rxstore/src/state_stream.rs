use crate::StoreError;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

/// The canonical temporal shape of every reducer answer: an ordered, lazy sequence of states
/// that either completes or fails once.
#[must_use = "Streams do nothing unless polled"]
pub struct StateStream<S> {
    inner: BoxStream<'static, Result<S, StoreError>>,
}

impl<S: Send + 'static> StateStream<S> {
    pub fn new<T>(stream: T) -> Self
    where
        T: Stream<Item = Result<S, StoreError>> + Send + 'static,
    {
        StateStream {
            inner: stream.boxed(),
        }
    }

    /// A stream emitting every value of `values` and then completing.
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        I::IntoIter: Send + 'static,
    {
        Self::new(stream::iter(values.into_iter().map(Ok)))
    }

    pub fn once(value: S) -> Self {
        Self::new(stream::once(async move { Ok(value) }))
    }

    pub fn failed(error: StoreError) -> Self {
        Self::new(stream::once(async move { Err(error) }))
    }

    pub fn empty() -> Self {
        Self::new(stream::empty())
    }
}

impl<S> Stream for StateStream<S> {
    type Item = Result<S, StoreError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<S> fmt::Debug for StateStream<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStream").finish_non_exhaustive()
    }
}
