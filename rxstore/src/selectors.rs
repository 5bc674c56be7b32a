use crate::{
    normalize, Action, IntoReducerResult, Record, Reducer, ReducerResult, State, StateStream,
    StateStreamExt,
};
use futures::future::ready;
use futures::stream::{self, StreamExt};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

type SelectFn<V> = dyn Fn(&Record<V>) -> ReducerResult<V> + Send + Sync;

/// A derived field computed from a record, possibly asynchronously.
pub struct Selector<V> {
    select: Arc<SelectFn<V>>,
}

impl<V: State> Selector<V> {
    /// A selector recomputed on every state.
    pub fn new<F, R>(select: F) -> Self
    where
        F: Fn(&Record<V>) -> R + Send + Sync + 'static,
        R: IntoReducerResult<V>,
    {
        Selector {
            select: Arc::new(move |state: &Record<V>| select(state).into_result()),
        }
    }

    /// A selector that only recomputes when the key extracted by `deps` changes.
    ///
    /// While the key stays the same, the last resolved selection is answered synchronously.
    pub fn memoized<D, G, F, R>(deps: G, compute: F) -> Self
    where
        D: Clone + PartialEq + Send + Sync + 'static,
        G: Fn(&Record<V>) -> D + Send + Sync + 'static,
        F: Fn(D) -> R + Send + Sync + 'static,
        R: IntoReducerResult<V>,
    {
        let memo: Arc<Mutex<Option<(D, V)>>> = Arc::new(Mutex::new(None));
        Selector {
            select: Arc::new(move |state: &Record<V>| {
                let key = deps(state);
                {
                    let memo = memo.lock().unwrap_or_else(PoisonError::into_inner);
                    if let Some((last_key, value)) = memo.as_ref() {
                        if *last_key == key {
                            return ReducerResult::Sync(value.clone());
                        }
                    }
                }
                let memo = Arc::clone(&memo);
                let stream = normalize(compute(key.clone()).into_result()).inspect(move |item| {
                    if let Ok(value) = item {
                        let mut memo = memo.lock().unwrap_or_else(PoisonError::into_inner);
                        *memo = Some((key.clone(), value.clone()));
                    }
                });
                ReducerResult::Stream(StateStream::new(stream))
            }),
        }
    }

    pub fn select(&self, state: &Record<V>) -> ReducerResult<V> {
        (self.select)(state)
    }
}

impl<V> Clone for Selector<V> {
    fn clone(&self) -> Self {
        Selector {
            select: Arc::clone(&self.select),
        }
    }
}

impl<V> fmt::Debug for Selector<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector").finish_non_exhaustive()
    }
}

/// Wraps `reducer` so that named selections are merged into every state it produces.
///
/// Each state of the inner reducer is emitted first; every selection that then resolves to a
/// new value adds one more record. A newer inner state abandons selections still pending for the
/// older one.
pub fn assign_selectors<V, A, K, I>(
    reducer: Reducer<Record<V>, A>,
    selectors: I,
) -> Reducer<Record<V>, A>
where
    V: State,
    A: Action,
    K: Into<String>,
    I: IntoIterator<Item = (K, Selector<V>)>,
{
    let selectors: Arc<Vec<(String, Selector<V>)>> = Arc::new(
        selectors
            .into_iter()
            .map(|(name, selector)| (name.into(), selector))
            .collect(),
    );
    Reducer::new(move |state: Record<V>, action: &A| {
        let selectors = Arc::clone(&selectors);
        let states = normalize(reducer.reduce(state, action)).switch_map(move |item| match item {
            Ok(state) => select_into(state, &selectors),
            Err(error) => StateStream::failed(error),
        });
        ReducerResult::Stream(StateStream::new(states.coalesce()))
    })
}

fn select_into<V: State>(
    state: Record<V>,
    selectors: &[(String, Selector<V>)],
) -> StateStream<Record<V>> {
    let selections = stream::select_all(selectors.iter().map(|(name, selector)| {
        let name = name.clone();
        normalize(selector.select(&state)).map(move |item| item.map(|value| (name.clone(), value)))
    }));
    let updates = selections
        .scan(state.clone(), |current, item| {
            let update = match item {
                Ok((name, value)) => {
                    let next = current.with(name, value);
                    if Record::ptr_eq(&next, current) {
                        None
                    } else {
                        *current = next.clone();
                        Some(Ok(next))
                    }
                }
                Err(error) => Some(Err(error)),
            };
            ready(Some(update))
        })
        .filter_map(ready);
    StateStream::new(stream::once(ready(Ok(state))).chain(updates))
}
