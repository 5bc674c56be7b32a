#![allow(dead_code)]

use rxstore::{Action, Reducer, ReducerResult, State, Store};
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration};
use tracing::Level;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;

/// Installs the fmt subscriber once per test binary; later calls are no-ops.
pub fn tracing_init() {
    let _ = tracing_subscriber::fmt()
        .with_file(false)
        .with_line_number(false)
        .with_thread_names(false)
        .with_thread_ids(true)
        .with_target(false)
        .with_max_level(Level::DEBUG)
        .with_timer(ShortTime::default())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ShortTime {
    epoch: chrono::DateTime<chrono::offset::Local>,
}

impl Default for ShortTime {
    fn default() -> Self {
        Self {
            epoch: chrono::Local::now(),
        }
    }
}

impl FormatTime for ShortTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", self.epoch.format("%H:%M:%S"))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TestAction {
    Add(i64),
    Append(String),
    Toggle,
    Reset,
    Fail,
    Other,
}

impl Action for TestAction {
    fn action_type(&self) -> &str {
        match self {
            TestAction::Add(_) => "ADD",
            TestAction::Append(_) => "APPEND",
            TestAction::Toggle => "TOGGLE",
            TestAction::Reset => "RESET",
            TestAction::Fail => "FAIL",
            TestAction::Other => "OTHER",
        }
    }
}

/// A loosely typed field value for record states.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Num(i64),
    Flag(bool),
    Text(String),
}

impl State for Value {}

impl Value {
    pub fn num(&self) -> i64 {
        match self {
            Value::Num(value) => *value,
            _ => 0,
        }
    }

    pub fn flag(&self) -> bool {
        matches!(self, Value::Flag(true))
    }

    pub fn text(&self) -> &str {
        match self {
            Value::Text(value) => value,
            _ => "",
        }
    }
}

pub fn counter(state: i64, action: &TestAction) -> ReducerResult<i64> {
    match action {
        TestAction::Add(value) => ReducerResult::Sync(state + value),
        TestAction::Reset => ReducerResult::Sync(0),
        TestAction::Fail => ReducerResult::failed("counter failed"),
        _ => ReducerResult::Sync(state),
    }
}

/// Like [`counter`], but every answer arrives after a short delay.
pub fn deferred_counter(state: i64, action: &TestAction) -> ReducerResult<i64> {
    let next = match action {
        TestAction::Add(value) => state + value,
        TestAction::Reset => 0,
        TestAction::Fail => return ReducerResult::try_deferred(async { Err("counter failed") }),
        _ => state,
    };
    ReducerResult::deferred(async move {
        sleep(Duration::from_millis(20)).await;
        next
    })
}

pub fn counter_store() -> Store<i64, TestAction> {
    rxstore::create_store(Reducer::new(counter), 0)
}

/// Subscribes to `store` and records every published state.
pub fn collect_states<S: State>(store: &Store<S, impl Action>) -> Arc<Mutex<Vec<S>>> {
    let states = Arc::new(Mutex::new(Vec::new()));
    let sink = states.clone();
    store.subscribe(move |state: &S| sink.lock().unwrap().push(state.clone()));
    states
}

pub fn snapshot<S: Clone>(states: &Arc<Mutex<Vec<S>>>) -> Vec<S> {
    states.lock().unwrap().clone()
}
