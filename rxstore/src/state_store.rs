use crate::{
    Action, ActionSequencer, RecoveryHandler, Reducer, State, StateStream, StateStreamExt,
    StoreConfig, StoreError,
};
use futures::future::BoxFuture;
use futures::stream;
use futures::{FutureExt, StreamExt};
use futures_signals::signal::{Mutable, MutableSignalCloned};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{oneshot, watch};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{error, trace, warn};

/// Receives the states published by a [`Store`].
pub trait Observer<S>: Send + 'static {
    fn next(&mut self, state: &S);

    /// The state feed failed for good.
    fn error(&mut self, _error: &StoreError) {}

    /// The state feed ended.
    fn complete(&mut self) {}

    /// Closed observers are dropped on the next publication.
    fn is_closed(&self) -> bool {
        false
    }
}

impl<S, F> Observer<S> for F
where
    F: FnMut(&S) + Send + 'static,
{
    fn next(&mut self, state: &S) {
        self(state)
    }
}

struct ChannelObserver<S> {
    tx: Option<UnboundedSender<Result<S, StoreError>>>,
}

impl<S: State> Observer<S> for ChannelObserver<S> {
    fn next(&mut self, state: &S) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(Ok(state.clone()));
        }
    }

    fn error(&mut self, error: &StoreError) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Err(error.clone()));
        }
    }

    fn complete(&mut self) {
        self.tx = None;
    }

    fn is_closed(&self) -> bool {
        self.tx.as_ref().map_or(true, UnboundedSender::is_closed)
    }
}

type Entry<S> = (u64, Box<dyn Observer<S>>);

struct Registry<S> {
    observers: Vec<Entry<S>>,
    /// Set while observers are being called with the lock released.
    publishing: bool,
    removed: Vec<u64>,
}

/// The observers of a store.
///
/// Observers run without the registry lock held, so they may subscribe and unsubscribe from
/// inside their callbacks. Observers added during a publication see the next state.
struct Subscribers<S> {
    next_id: AtomicU64,
    registry: Mutex<Registry<S>>,
}

impl<S: 'static> Subscribers<S> {
    fn new() -> Self {
        Subscribers {
            next_id: AtomicU64::new(0),
            registry: Mutex::new(Registry {
                observers: Vec::new(),
                publishing: false,
                removed: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry<S>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn add(&self, observer: Box<dyn Observer<S>>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().observers.push((id, observer));
        id
    }

    fn remove(&self, id: u64) {
        let mut registry = self.lock();
        registry.observers.retain(|(observer_id, _)| *observer_id != id);
        if registry.publishing {
            registry.removed.push(id);
        }
    }

    fn publish(&self, state: &S) {
        let mut observers = {
            let mut registry = self.lock();
            registry.publishing = true;
            std::mem::take(&mut registry.observers)
        };
        observers.retain(|(_, observer)| !observer.is_closed());
        for (_, observer) in observers.iter_mut() {
            observer.next(state);
        }

        let mut registry = self.lock();
        let removed = std::mem::take(&mut registry.removed);
        observers.retain(|(id, _)| !removed.contains(id));
        let added = std::mem::replace(&mut registry.observers, observers);
        registry.observers.extend(added);
        registry.publishing = false;
    }

    fn take_all(&self) -> Vec<Entry<S>> {
        std::mem::take(&mut self.lock().observers)
    }

    fn fail(&self, error: &StoreError) {
        for (_, mut observer) in self.take_all() {
            observer.error(error);
        }
    }

    fn complete(&self) {
        for (_, mut observer) in self.take_all() {
            observer.complete();
        }
    }
}

/// Handle returned by [`Store::subscribe`]. Dropping it keeps the subscription alive.
pub struct Subscription<S> {
    id: u64,
    subscribers: Weak<Subscribers<S>>,
}

impl<S: 'static> Subscription<S> {
    pub fn unsubscribe(self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers.remove(self.id);
        }
    }
}

impl<S> fmt::Debug for Subscription<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Something a combined store waits on in [`Store::await_state`].
pub(crate) trait Settle: Send + Sync {
    fn settle(&self) -> BoxFuture<'_, Result<(), StoreError>>;
}

impl<S: State, A: Action> Settle for Store<S, A> {
    fn settle(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        async move { self.await_state().await.map(|_| ()) }.boxed()
    }
}

type SameFn<S> = dyn Fn(&S, &S) -> bool + Send + Sync;

/// The parts a store is assembled from.
pub(crate) struct Pipeline<S, A> {
    pub initial_state: S,
    pub feed: StateStream<S>,
    pub action_tx: UnboundedSender<A>,
    /// Number of dispatched actions fully taken care of upstream of the feed.
    pub ready: watch::Receiver<u64>,
    pub children: Vec<Box<dyn Settle>>,
    pub same: Arc<SameFn<S>>,
    pub coalesce: bool,
}

struct Inner<S, A> {
    state: Mutable<S>,
    action_tx: UnboundedSender<A>,
    dispatched: AtomicU64,
    ready: watch::Receiver<u64>,
    children: Vec<Box<dyn Settle>>,
    flush_tx: UnboundedSender<oneshot::Sender<S>>,
    subscribers: Arc<Subscribers<S>>,
    _guard: DropGuard,
}

/// A store holding one state value that evolves through dispatched actions.
///
/// Cloning a store gives another handle to the same pipeline. The pipeline stops when the last
/// handle is dropped.
pub struct Store<S, A> {
    inner: Arc<Inner<S, A>>,
}

impl<S, A> Clone for Store<S, A> {
    fn clone(&self) -> Self {
        Store {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: fmt::Debug, A> fmt::Debug for Store<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("state", &*self.inner.state.lock_ref())
            .finish_non_exhaustive()
    }
}

/// Creates a store with the default recovery handler and configuration.
pub fn create_store<S: State, A: Action>(reducer: Reducer<S, A>, initial_state: S) -> Store<S, A> {
    StoreBuilder::new(reducer, initial_state).build()
}

impl<S: State, A: Action> Store<S, A> {
    /// Starts building a store whose initial state is `S::default()`.
    pub fn builder(reducer: Reducer<S, A>) -> StoreBuilder<S, A>
    where
        S: Default,
    {
        StoreBuilder::new(reducer, S::default())
    }

    pub(crate) fn launch(pipeline: Pipeline<S, A>) -> Self {
        let Pipeline {
            initial_state,
            feed,
            action_tx,
            ready,
            children,
            same,
            coalesce,
        } = pipeline;

        let state = Mutable::new(initial_state);
        let subscribers = Arc::new(Subscribers::new());
        let (flush_tx, flush_rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();

        let feed = if coalesce {
            StateStream::new(feed.coalesce())
        } else {
            feed
        };
        let feed = StateStream::new(feed.distinct_until_changed_by(move |a, b| same(a, b)));

        tokio::spawn(Self::process_feed(
            feed,
            state.clone(),
            Arc::clone(&subscribers),
            flush_rx,
            token.clone(),
        ));

        Store {
            inner: Arc::new(Inner {
                state,
                action_tx,
                dispatched: AtomicU64::new(0),
                ready,
                children,
                flush_tx,
                subscribers,
                _guard: token.drop_guard(),
            }),
        }
    }

    async fn process_feed(
        mut feed: StateStream<S>,
        state: Mutable<S>,
        subscribers: Arc<Subscribers<S>>,
        mut flush_rx: UnboundedReceiver<oneshot::Sender<S>>,
        token: CancellationToken,
    ) {
        let publish = |item: Result<S, StoreError>| match item {
            Ok(next) => {
                trace!("publishing state");
                state.set(next.clone());
                subscribers.publish(&next);
                true
            }
            Err(err) => {
                error!(error = %err, "state feed failed");
                subscribers.fail(&err);
                false
            }
        };

        'feed: loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                item = feed.next() => match item {
                    Some(item) => {
                        if !publish(item) {
                            return;
                        }
                    }
                    None => break,
                },
                Some(reply) = flush_rx.recv() => {
                    while let Some(item) = feed.next().now_or_never() {
                        match item {
                            Some(item) => {
                                if !publish(item) {
                                    return;
                                }
                            }
                            None => {
                                let _ = reply.send(state.get_cloned());
                                break 'feed;
                            }
                        }
                    }
                    let _ = reply.send(state.get_cloned());
                }
            }
        }
        subscribers.complete();
    }

    /// Queues `action`. Returns immediately; the action is reduced once every earlier action
    /// has settled.
    pub fn dispatch(&self, action: A) {
        self.inner.dispatched.fetch_add(1, Ordering::SeqCst);
        if self.inner.action_tx.send(action).is_err() {
            warn!("dispatch on a closed store");
        }
    }

    /// Registers `observer` for every state published from now on.
    pub fn subscribe<O>(&self, observer: O) -> Subscription<S>
    where
        O: Observer<S>,
    {
        let id = self.inner.subscribers.add(Box::new(observer));
        Subscription {
            id,
            subscribers: Arc::downgrade(&self.inner.subscribers),
        }
    }

    /// The latest published state.
    pub fn get_state(&self) -> S {
        self.inner.state.get_cloned()
    }

    /// A stream of every state published from now on.
    ///
    /// It fails with the feed's fatal error, and ends when the store shuts down.
    pub fn get_observable(&self) -> StateStream<S> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.inner
            .subscribers
            .add(Box::new(ChannelObserver { tx: Some(tx) }));
        StateStream::new(stream::poll_fn(move |cx| rx.poll_recv(cx)))
    }

    /// A lossy signal of the cached state.
    pub fn to_signal(&self) -> MutableSignalCloned<S> {
        self.inner.state.signal_cloned()
    }

    /// Waits until every action dispatched so far has settled and its states were published,
    /// then returns the cached state.
    pub async fn await_state(&self) -> Result<S, StoreError> {
        let target = self.inner.dispatched.load(Ordering::SeqCst);
        let mut ready = self.inner.ready.clone();
        if ready.wait_for(|count| *count >= target).await.is_err() {
            return Err(StoreError::Closed);
        }
        for child in &self.inner.children {
            child.settle().await?;
        }
        let (tx, rx) = oneshot::channel();
        self.inner
            .flush_tx
            .send(tx)
            .map_err(|_| StoreError::Closed)?;
        rx.await.map_err(|_| StoreError::Closed)
    }
}

/// Configures and starts a reducer-driven [`Store`].
pub struct StoreBuilder<S, A> {
    reducer: Reducer<S, A>,
    initial_state: S,
    recovery: RecoveryHandler<S>,
    same: Arc<SameFn<S>>,
    config: StoreConfig,
}

impl<S: State, A: Action> StoreBuilder<S, A> {
    pub fn new(reducer: Reducer<S, A>, initial_state: S) -> Self {
        StoreBuilder {
            reducer,
            initial_state,
            recovery: RecoveryHandler::default(),
            same: Arc::new(|a: &S, b: &S| a == b),
            config: StoreConfig::default(),
        }
    }

    pub fn initial_state(self, initial_state: S) -> Self {
        Self {
            initial_state,
            ..self
        }
    }

    pub fn recovery(self, recovery: RecoveryHandler<S>) -> Self {
        Self { recovery, ..self }
    }

    /// Replaces the equality used to drop repeated states.
    ///
    /// States are compared with `PartialEq` by default. Pass
    /// [`Record::ptr_eq`](crate::Record::ptr_eq) to drop a record only when the reducer returned
    /// the very same allocation.
    pub fn dedupe_by<F>(self, same: F) -> Self
    where
        F: Fn(&S, &S) -> bool + Send + Sync + 'static,
    {
        Self {
            same: Arc::new(same),
            ..self
        }
    }

    pub fn config(self, config: StoreConfig) -> Self {
        Self { config, ..self }
    }

    pub fn build(self) -> Store<S, A> {
        let (action_tx, mut action_rx) = mpsc::unbounded_channel::<A>();
        let (settled_tx, settled_rx) = watch::channel(0);
        let actions = stream::poll_fn(move |cx| action_rx.poll_recv(cx));
        let feed = ActionSequencer::new(self.reducer, self.initial_state.clone(), actions)
            .with_recovery(self.recovery)
            .with_policy(self.config.flatten)
            .with_settled(settled_tx)
            .into_stream();

        Store::launch(Pipeline {
            initial_state: self.initial_state,
            feed,
            action_tx,
            ready: settled_rx,
            children: Vec::new(),
            same: self.same,
            coalesce: self.config.coalesce,
        })
    }
}
