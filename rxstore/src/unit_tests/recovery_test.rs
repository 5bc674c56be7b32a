use crate::{RecoveryGate, RecoveryHandler, ReducerResult, StateStream, StoreError};
use futures::StreamExt;

fn failing_stream() -> StateStream<i64> {
    StateStream::new(futures::stream::iter(vec![
        Ok(1),
        Err(StoreError::error("bad")),
        Ok(3),
    ]))
}

#[tokio::test]
async fn test_gate_passes_values_through() {
    let gate = RecoveryGate::new(
        StateStream::from_values(vec![1, 2]),
        0,
        RecoveryHandler::default(),
    );
    assert_eq!(gate.collect::<Vec<_>>().await, vec![Ok(1), Ok(2)]);
}

#[tokio::test]
async fn test_default_handler_keeps_previous_state() {
    let mut gate = RecoveryGate::new(failing_stream(), 10, RecoveryHandler::default());
    assert_eq!(gate.next().await, Some(Ok(1)));
    assert!(!gate.is_recovering());
    // The rest of the failed stream is abandoned
    assert_eq!(gate.next().await, Some(Ok(10)));
    assert!(gate.is_recovering());
    assert_eq!(gate.next().await, None);
}

#[tokio::test]
async fn test_custom_handler_stream() {
    let handler = RecoveryHandler::new(|error: StoreError, previous: i64| {
        assert_eq!(error, StoreError::error("bad"));
        ReducerResult::Stream(StateStream::from_values(vec![previous + 1, previous + 2]))
    });
    let gate = RecoveryGate::new(failing_stream(), 10, handler);
    assert_eq!(
        gate.collect::<Vec<_>>().await,
        vec![Ok(1), Ok(11), Ok(12)]
    );
}

#[tokio::test]
async fn test_failing_handler_is_fatal() {
    let handler = RecoveryHandler::new(|_error: StoreError, _previous: i64| {
        ReducerResult::<i64>::failed("still broken")
    });
    let gate = RecoveryGate::new(failing_stream(), 10, handler);
    assert_eq!(
        gate.collect::<Vec<_>>().await,
        vec![
            Ok(1),
            Err(StoreError::recovery(StoreError::error("still broken")))
        ]
    );

    let handler = RecoveryHandler::new(|_error: StoreError, _previous: i64| -> i64 {
        panic!("handler panicked")
    });
    let gate = RecoveryGate::new(StateStream::failed(StoreError::Empty), 10, handler);
    assert_eq!(
        gate.collect::<Vec<_>>().await,
        vec![Err(StoreError::recovery(StoreError::Panicked(
            "handler panicked".to_string()
        )))]
    );
}
