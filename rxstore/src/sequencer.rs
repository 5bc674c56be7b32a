use crate::store_error::catch_panic;
use crate::{
    normalize, Action, FlattenPolicy, RecoveryGate, RecoveryHandler, Reducer, ReducerResult,
    State, StateStream, StoreError,
};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use tokio::sync::watch;
use tracing::{debug, error, trace};

struct InFlight<S> {
    action_type: String,
    stream: RecoveryGate<S>,
    last: Option<S>,
}

enum Event<A, S> {
    Action(Option<A>),
    Item(Option<Result<S, StoreError>>),
}

/// Folds a stream of actions into one stream of states.
///
/// The initial state is emitted first. Actions are reduced strictly one after another: the
/// reducer for an action only runs once the previous action's stream has completed, and it
/// receives that stream's last value. Intermediate values are emitted but never become a
/// baseline.
pub struct ActionSequencer<S, A> {
    reducer: Reducer<S, A>,
    recovery: RecoveryHandler<S>,
    policy: FlattenPolicy,
    actions: BoxStream<'static, A>,
    actions_done: bool,
    previous: S,
    seed: Option<S>,
    current: Option<InFlight<S>>,
    pending: Option<A>,
    settled: Option<watch::Sender<u64>>,
    terminated: bool,
}

impl<S: State, A: Action> ActionSequencer<S, A> {
    pub fn new<T>(reducer: Reducer<S, A>, initial_state: S, actions: T) -> Self
    where
        T: Stream<Item = A> + Send + 'static,
    {
        ActionSequencer {
            reducer,
            recovery: RecoveryHandler::default(),
            policy: FlattenPolicy::default(),
            actions: actions.boxed(),
            actions_done: false,
            previous: initial_state.clone(),
            seed: Some(initial_state),
            current: None,
            pending: None,
            settled: None,
            terminated: false,
        }
    }

    pub fn with_recovery(self, recovery: RecoveryHandler<S>) -> Self {
        Self { recovery, ..self }
    }

    pub fn with_policy(self, policy: FlattenPolicy) -> Self {
        Self { policy, ..self }
    }

    /// Counts settled actions into `settled`.
    pub fn with_settled(self, settled: watch::Sender<u64>) -> Self {
        Self {
            settled: Some(settled),
            ..self
        }
    }

    pub fn into_stream(self) -> StateStream<S> {
        StateStream::new(stream::unfold(self, |mut sequencer| async move {
            let item = sequencer.next_emission().await?;
            Some((item, sequencer))
        }))
    }

    fn start(&self, action: A) -> InFlight<S> {
        let action_type = action.action_type().to_string();
        debug!(action = %action_type, "action received");
        let previous = self.previous.clone();
        let result = catch_panic(|| self.reducer.reduce(previous.clone(), &action))
            .unwrap_or_else(ReducerResult::Failed);
        trace!(action = %action_type, kind = result.kind(), "reducer answered");
        InFlight {
            action_type,
            stream: RecoveryGate::new(normalize(result), previous, self.recovery.clone()),
            last: None,
        }
    }

    async fn next_action(&mut self) -> Option<A> {
        if let Some(action) = self.pending.take() {
            return Some(action);
        }
        if self.actions_done {
            return None;
        }
        let action = self.actions.next().await;
        if action.is_none() {
            self.actions_done = true;
        }
        action
    }

    async fn next_emission(&mut self) -> Option<Result<S, StoreError>> {
        if self.terminated {
            return None;
        }
        if let Some(seed) = self.seed.take() {
            return Some(Ok(seed));
        }
        loop {
            if self.current.is_none() {
                let action = self.next_action().await?;
                self.current = Some(self.start(action));
            }
            let switching = self.policy == FlattenPolicy::SwitchLatest;
            let watch_actions = switching && self.pending.is_none() && !self.actions_done;
            let Some(flight) = self.current.as_mut() else {
                continue;
            };

            let event = tokio::select! {
                biased;
                action = self.actions.next(), if watch_actions => Event::Action(action),
                item = flight.stream.next() => Event::Item(item),
            };

            match event {
                Event::Action(Some(action)) => {
                    trace!(action = action.action_type(), "newer action queued");
                    self.pending = Some(action);
                }
                Event::Action(None) => self.actions_done = true,
                Event::Item(Some(Ok(state))) => {
                    flight.last = Some(state.clone());
                    if switching && self.pending.is_some() {
                        trace!(action = %flight.action_type, "superseded emission dropped");
                        continue;
                    }
                    return Some(Ok(state));
                }
                Event::Item(Some(Err(err))) => {
                    error!(action = %flight.action_type, error = %err, "closing state feed");
                    self.current = None;
                    self.terminated = true;
                    return Some(Err(err));
                }
                Event::Item(None) => {
                    if let Some(state) = flight.last.take() {
                        self.previous = state;
                    }
                    debug!(
                        action = %flight.action_type,
                        recovered = flight.stream.is_recovering(),
                        "action settled"
                    );
                    self.current = None;
                    if let Some(settled) = &self.settled {
                        settled.send_modify(|count| *count += 1);
                    }
                }
            }
        }
    }
}
