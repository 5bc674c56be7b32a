use super::CounterAction;
use crate::{
    combine_reducers, normalize, record, reducers, CombineLatest, Record, Reducer, ReducerResult,
    StateStream, StoreError,
};
use futures::channel::mpsc;
use futures::{FutureExt, StreamExt};
use tokio::time::{sleep, Duration};

fn num(state: i64, action: &CounterAction) -> i64 {
    match action {
        CounterAction::Add(value) => state + value,
        CounterAction::Reset => 0,
        _ => state,
    }
}

fn other(state: i64, _action: &CounterAction) -> i64 {
    state
}

async fn reduce(
    reducer: &Reducer<Record<i64>, CounterAction>,
    state: Record<i64>,
    action: CounterAction,
) -> Vec<Result<Record<i64>, StoreError>> {
    normalize(reducer.reduce(state, &action)).collect().await
}

#[tokio::test]
async fn test_combine_reducers_sync() {
    let reducer = combine_reducers(reducers! { "num" => num, "other" => other });
    let state = record! { "num" => 1, "other" => 7 };
    let states = reduce(&reducer, state, CounterAction::Add(2)).await;
    assert_eq!(states, vec![Ok(record! { "num" => 3, "other" => 7 })]);
}

#[tokio::test]
async fn test_combine_reducers_keeps_identity() {
    let reducer = combine_reducers(reducers! { "num" => num, "other" => other });
    let state = record! { "num" => 1, "other" => 7 };
    let states = reduce(&reducer, state.clone(), CounterAction::Other).await;
    assert_eq!(states.len(), 1);
    match &states[0] {
        Ok(next) => assert!(Record::ptr_eq(next, &state)),
        Err(error) => panic!("unexpected error {error}"),
    }
}

#[tokio::test]
async fn test_combine_reducers_missing_field_defaults() {
    let reducer = combine_reducers(reducers! { "num" => num, "other" => other });
    let states = reduce(&reducer, Record::new(), CounterAction::Add(5)).await;
    assert_eq!(states, vec![Ok(record! { "num" => 5, "other" => 0 })]);
}

#[tokio::test]
async fn test_combine_reducers_waits_for_every_field() {
    let reducer = combine_reducers(reducers! {
        "slow" => |state: i64, _action: &CounterAction| {
            ReducerResult::deferred(async move {
                sleep(Duration::from_millis(20)).await;
                state + 1
            })
        },
        "steps" => |state: i64, _action: &CounterAction| {
            ReducerResult::Stream(StateStream::from_values(vec![state + 1, state + 2]))
        },
    });
    let states = reduce(&reducer, Record::new(), CounterAction::Other).await;
    assert_eq!(states, vec![Ok(record! { "slow" => 1, "steps" => 2 })]);
}

#[tokio::test]
async fn test_combine_reducers_propagates_errors() {
    let reducer = combine_reducers(reducers! {
        "num" => num,
        "broken" => |_state: i64, _action: &CounterAction| ReducerResult::<i64>::failed("broken"),
    });
    let states = reduce(&reducer, Record::new(), CounterAction::Add(1)).await;
    assert_eq!(states, vec![Err(StoreError::error("broken"))]);
}

#[tokio::test]
async fn test_combine_latest_overwrites_until_complete() {
    let sources = vec![
        ("a".to_string(), StateStream::from_values(vec![1, 2])),
        ("b".to_string(), StateStream::from_values(vec![10, 20])),
    ];
    let states: Vec<_> = CombineLatest::new(Record::new(), sources).collect().await;
    // a's first value is replaced before b has emitted anything
    assert_eq!(
        states,
        vec![
            Ok(record! { "a" => 2, "b" => 10 }),
            Ok(record! { "a" => 2, "b" => 20 }),
        ]
    );
}

#[tokio::test]
async fn test_combine_latest_interleaved() {
    let (a_tx, a_rx) = mpsc::unbounded::<i64>();
    let (b_tx, b_rx) = mpsc::unbounded::<i64>();
    let sources = vec![
        ("a".to_string(), StateStream::new(a_rx.map(Ok))),
        ("b".to_string(), StateStream::new(b_rx.map(Ok))),
    ];
    let mut latest = CombineLatest::new(Record::new(), sources);

    a_tx.unbounded_send(1).unwrap();
    assert!(latest.next().now_or_never().is_none());

    b_tx.unbounded_send(10).unwrap();
    assert_eq!(latest.next().await, Some(Ok(record! { "a" => 1, "b" => 10 })));
    a_tx.unbounded_send(2).unwrap();
    assert_eq!(latest.next().await, Some(Ok(record! { "a" => 2, "b" => 10 })));
    b_tx.unbounded_send(20).unwrap();
    assert_eq!(latest.next().await, Some(Ok(record! { "a" => 2, "b" => 20 })));

    drop(a_tx);
    drop(b_tx);
    assert_eq!(latest.next().await, None);
}

#[tokio::test]
async fn test_combine_latest_seeded() {
    let sources = vec![
        ("a".to_string(), StateStream::from_values(vec![5]), 1),
        ("b".to_string(), StateStream::empty(), 2),
    ];
    let latest = CombineLatest::seeded(Record::new(), sources);
    assert_eq!(latest.snapshot(), record! { "a" => 1, "b" => 2 });
    let states: Vec<_> = latest.collect().await;
    assert_eq!(states, vec![Ok(record! { "a" => 5, "b" => 2 })]);
}
