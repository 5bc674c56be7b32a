use crate::state_store::{Pipeline, Settle};
use crate::{Action, CombineLatest, Record, State, StateStream, Store, StoreConfig};
use futures::future::ready;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::watch;
use tracing::trace;

/// Redispatches every action sent on the returned channel to all `children`.
///
/// The watch counts the actions forwarded so far.
fn broadcast<S, A>(children: Vec<Store<S, A>>) -> (UnboundedSender<A>, watch::Receiver<u64>)
where
    S: State,
    A: Action,
{
    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<A>();
    let (forwarded_tx, forwarded_rx) = watch::channel(0);
    tokio::spawn(async move {
        while let Some(action) = action_rx.recv().await {
            trace!(action = action.action_type(), children = children.len(), "broadcasting action");
            for child in &children {
                child.dispatch(action.clone());
            }
            forwarded_tx.send_modify(|count| *count += 1);
        }
    });
    (action_tx, forwarded_rx)
}

fn launch_combined<C, S, A>(
    children: Vec<Store<C, A>>,
    initial_state: S,
    updates: StateStream<S>,
) -> Store<S, A>
where
    C: State,
    S: State,
    A: Action,
{
    let settles = children
        .iter()
        .map(|child| Box::new(child.clone()) as Box<dyn Settle>)
        .collect();
    let (action_tx, forwarded) = broadcast(children);
    let feed = StateStream::new(stream::once(ready(Ok(initial_state.clone()))).chain(updates));
    Store::launch(Pipeline {
        initial_state,
        feed,
        action_tx,
        ready: forwarded,
        children: settles,
        same: Arc::new(|a: &S, b: &S| a == b),
        coalesce: StoreConfig::default().coalesce,
    })
}

/// Combines named stores into one store whose state is a [`Record`] keyed by store name.
///
/// Actions dispatched to the combined store are broadcast to every child. Child states are
/// joined with [`CombineLatest`], seeded from each child's current state.
pub fn combine_stores<V, A, K, I>(stores: I) -> Store<Record<V>, A>
where
    V: State,
    A: Action,
    K: Into<String>,
    I: IntoIterator<Item = (K, Store<V, A>)>,
{
    let stores: Vec<(String, Store<V, A>)> = stores
        .into_iter()
        .map(|(name, store)| (name.into(), store))
        .collect();
    let sources: Vec<(String, StateStream<V>, V)> = stores
        .iter()
        .map(|(name, store)| {
            let observable = store.get_observable();
            (name.clone(), observable, store.get_state())
        })
        .collect();
    let latest = CombineLatest::seeded(Record::new(), sources);
    let initial_state = latest.snapshot();
    let children = stores.into_iter().map(|(_, store)| store).collect();
    launch_combined(children, initial_state, StateStream::new(latest))
}

/// [`combine_stores`] keyed by each store's position in `stores`.
pub fn combine_store_list<V, A, I>(stores: I) -> Store<Record<V>, A>
where
    V: State,
    A: Action,
    I: IntoIterator<Item = Store<V, A>>,
{
    combine_stores(
        stores
            .into_iter()
            .enumerate()
            .map(|(index, store)| (index.to_string(), store)),
    )
}

/// Merges stores holding partial records into one store holding their union.
///
/// Whenever a child publishes, its fields are shallow-merged into the cumulative record; a
/// merged state is only emitted if some field actually changed.
pub fn merge_stores<V, A, I>(stores: I) -> Store<Record<V>, A>
where
    V: State,
    A: Action,
    I: IntoIterator<Item = Store<Record<V>, A>>,
{
    let children: Vec<Store<Record<V>, A>> = stores.into_iter().collect();
    let observables: Vec<StateStream<Record<V>>> =
        children.iter().map(Store::get_observable).collect();
    let initial_state = children
        .iter()
        .fold(Record::new(), |merged, child| merged.merge(&child.get_state()));

    let updates = stream::select_all(observables)
        .scan(initial_state.clone(), |merged, item| {
            let update = match item {
                Ok(partial) => {
                    let next = merged.merge(&partial);
                    if Record::ptr_eq(&next, merged) {
                        None
                    } else {
                        *merged = next.clone();
                        Some(Ok(next))
                    }
                }
                Err(error) => Some(Err(error)),
            };
            ready(Some(update))
        })
        .filter_map(ready);

    launch_combined(children, initial_state, StateStream::new(updates))
}
