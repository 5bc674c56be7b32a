use crate::{normalize, Action, Record, Reducer, ReducerResult, State, StateStream, StoreError};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Combines named reducers into one reducer over a [`Record`].
///
/// Every action goes to every sub-reducer together with its own field (`V::default()` when the
/// field is missing). The sub-results are joined with [`CombineLatest`].
pub fn combine_reducers<V, A, K, I>(reducers: I) -> Reducer<Record<V>, A>
where
    V: State + Default,
    A: Action,
    K: Into<String>,
    I: IntoIterator<Item = (K, Reducer<V, A>)>,
{
    let reducers: Arc<Vec<(String, Reducer<V, A>)>> = Arc::new(
        reducers
            .into_iter()
            .map(|(name, reducer)| (name.into(), reducer))
            .collect(),
    );
    Reducer::new(move |state: Record<V>, action: &A| {
        let sources = reducers
            .iter()
            .map(|(name, reducer)| {
                let field = state.get(name).cloned().unwrap_or_default();
                (name.clone(), normalize(reducer.reduce(field, action)))
            })
            .collect();
        ReducerResult::Stream(StateStream::new(CombineLatest::new(state, sources)))
    })
}

struct Source<V> {
    name: String,
    stream: StateStream<V>,
    latest: Option<V>,
    done: bool,
}

/// Joins named streams into a stream of records.
///
/// Once every source has a value, each emission of any source yields a record holding the most
/// recent value of every source. Records are built from the previous one and share its
/// allocation when the emitted value did not change the field. The first error ends the stream.
#[must_use = "Streams do nothing unless polled"]
pub struct CombineLatest<V> {
    sources: Vec<Source<V>>,
    composite: Record<V>,
    cursor: usize,
    failed: bool,
}

impl<V: State> CombineLatest<V> {
    /// Sources start without a value; nothing is emitted until each has emitted once.
    pub fn new(base: Record<V>, sources: Vec<(String, StateStream<V>)>) -> Self {
        let sources = sources
            .into_iter()
            .map(|(name, stream)| Source {
                name,
                stream,
                latest: None,
                done: false,
            })
            .collect();
        CombineLatest {
            sources,
            composite: base,
            cursor: 0,
            failed: false,
        }
    }

    /// Sources start from a known value, so their first emission already yields a record.
    pub fn seeded(base: Record<V>, sources: Vec<(String, StateStream<V>, V)>) -> Self {
        let mut composite = base;
        let sources = sources
            .into_iter()
            .map(|(name, stream, value)| {
                composite = composite.with(name.as_str(), value.clone());
                Source {
                    name,
                    stream,
                    latest: Some(value),
                    done: false,
                }
            })
            .collect();
        CombineLatest {
            sources,
            composite,
            cursor: 0,
            failed: false,
        }
    }

    /// The record as it stands, before anything further is polled.
    pub fn snapshot(&self) -> Record<V> {
        self.composite.clone()
    }

    fn complete(&self) -> bool {
        self.sources.iter().all(|source| source.latest.is_some())
    }
}

impl<V> Unpin for CombineLatest<V> {}

impl<V: State> Stream for CombineLatest<V> {
    type Item = Result<Record<V>, StoreError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.failed {
            return Poll::Ready(None);
        }
        let count = this.sources.len();
        let start = this.cursor;
        loop {
            let mut progressed = false;
            for offset in 0..count {
                let index = (start + offset) % count;
                // Drain the source while the record is incomplete; earlier values get overwritten.
                loop {
                    let source = &mut this.sources[index];
                    if source.done {
                        break;
                    }
                    match source.stream.poll_next_unpin(cx) {
                        Poll::Ready(Some(Ok(value))) => {
                            source.latest = Some(value.clone());
                            this.composite = this.composite.with(source.name.as_str(), value);
                            if this.complete() {
                                this.cursor = (index + 1) % count;
                                return Poll::Ready(Some(Ok(this.composite.clone())));
                            }
                            progressed = true;
                        }
                        Poll::Ready(Some(Err(error))) => {
                            this.failed = true;
                            return Poll::Ready(Some(Err(error)));
                        }
                        Poll::Ready(None) => {
                            source.done = true;
                            progressed = true;
                        }
                        Poll::Pending => break,
                    }
                }
            }
            if !progressed {
                break;
            }
        }
        if this.sources.iter().all(|source| source.done) {
            Poll::Ready(None)
        } else {
            Poll::Pending
        }
    }
}
