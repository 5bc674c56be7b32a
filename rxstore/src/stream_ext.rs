use futures_core::stream::Stream;
use pin_project::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Extension trait that provides the stream operators used by the state pipeline.
///
/// It is implemented for every `Stream`; the coalescing and deduplicating operators apply to
/// streams of `Result`s, where errors always pass through.
pub trait StateStreamExt: Stream {
    /// Drops values equal to the previously delivered value according to `same`.
    fn distinct_until_changed_by<T, E, F>(self, same: F) -> DistinctUntilChanged<Self, T, F>
    where
        Self: Stream<Item = Result<T, E>> + Sized,
        T: Clone,
        F: FnMut(&T, &T) -> bool,
    {
        DistinctUntilChanged {
            stream: self,
            last: None,
            same,
        }
    }

    /// Delivers only the last value of every burst of values that are ready at the same time.
    ///
    /// A value is held back until the inner stream has nothing more to give right now. An error
    /// flushes the held value first.
    ///
    /// ## Examples
    ///
    /// ```
    /// use futures::StreamExt;
    /// use rxstore::StateStreamExt;
    ///
    /// async fn example() {
    ///     let values: Vec<Result<i32, ()>> = futures::stream::iter(vec![Ok(1), Ok(2), Ok(3)])
    ///         .coalesce()
    ///         .collect()
    ///         .await;
    ///
    ///     assert_eq!(values, vec![Ok(3)]);
    /// }
    /// ```
    fn coalesce<T, E>(self) -> Coalesce<Self, T, E>
    where
        Self: Stream<Item = Result<T, E>> + Sized,
    {
        Coalesce {
            stream: self,
            buffered: None,
            error: None,
            done: false,
        }
    }

    /// Maps every item to a stream and follows only the stream of the latest item.
    fn switch_map<U, F>(self, f: F) -> SwitchMap<Self, U, F>
    where
        F: FnMut(Self::Item) -> U,
        U: Stream,
        Self: Sized,
    {
        SwitchMap {
            stream: self,
            inner: None,
            outer_done: false,
            f,
        }
    }
}
impl<T: ?Sized> StateStreamExt for T where T: Stream {}

/// Created by `distinct_until_changed_by` on `StateStreamExt`.
#[pin_project(project = DistinctProj)]
#[must_use = "Streams do nothing unless polled"]
pub struct DistinctUntilChanged<A, T, F> {
    #[pin]
    stream: A,
    last: Option<T>,
    same: F,
}

impl<A, T, E, F> Stream for DistinctUntilChanged<A, T, F>
where
    A: Stream<Item = Result<T, E>>,
    T: Clone,
    F: FnMut(&T, &T) -> bool,
{
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let DistinctProj {
            mut stream,
            last,
            same,
        } = self.project();

        loop {
            match stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(value))) => {
                    if let Some(previous) = last.as_ref() {
                        if same(previous, &value) {
                            continue;
                        }
                    }
                    *last = Some(value.clone());
                    return Poll::Ready(Some(Ok(value)));
                }
                other => return other,
            }
        }
    }
}

/// Created by `coalesce` on `StateStreamExt`.
#[pin_project(project = CoalesceProj)]
#[must_use = "Streams do nothing unless polled"]
pub struct Coalesce<A, T, E> {
    #[pin]
    stream: A,
    buffered: Option<T>,
    error: Option<E>,
    done: bool,
}

impl<A, T, E> Stream for Coalesce<A, T, E>
where
    A: Stream<Item = Result<T, E>>,
{
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let CoalesceProj {
            mut stream,
            buffered,
            error,
            done,
        } = self.project();

        if let Some(error) = error.take() {
            return Poll::Ready(Some(Err(error)));
        }
        if *done {
            return Poll::Ready(None);
        }
        loop {
            match stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(value))) => *buffered = Some(value),
                Poll::Ready(Some(Err(err))) => {
                    return match buffered.take() {
                        Some(value) => {
                            *error = Some(err);
                            Poll::Ready(Some(Ok(value)))
                        }
                        None => Poll::Ready(Some(Err(err))),
                    };
                }
                Poll::Ready(None) => {
                    *done = true;
                    return Poll::Ready(buffered.take().map(Ok));
                }
                Poll::Pending => {
                    return match buffered.take() {
                        Some(value) => Poll::Ready(Some(Ok(value))),
                        None => Poll::Pending,
                    };
                }
            }
        }
    }
}

/// Created by `switch_map` on `StateStreamExt`.
#[pin_project(project = SwitchMapProj)]
#[must_use = "Streams do nothing unless polled"]
pub struct SwitchMap<A, U, F> {
    #[pin]
    stream: A,
    inner: Option<Pin<Box<U>>>,
    outer_done: bool,
    f: F,
}

impl<A, U, F> Stream for SwitchMap<A, U, F>
where
    A: Stream,
    U: Stream,
    F: FnMut(A::Item) -> U,
{
    type Item = U::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let SwitchMapProj {
            mut stream,
            inner,
            outer_done,
            f,
        } = self.project();

        while !*outer_done {
            match stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => *inner = Some(Box::pin(f(item))),
                Poll::Ready(None) => *outer_done = true,
                Poll::Pending => break,
            }
        }
        if let Some(current) = inner.as_mut() {
            match current.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => return Poll::Ready(Some(item)),
                Poll::Ready(None) => *inner = None,
                Poll::Pending => return Poll::Pending,
            }
        }
        if *outer_done {
            Poll::Ready(None)
        } else {
            Poll::Pending
        }
    }
}
