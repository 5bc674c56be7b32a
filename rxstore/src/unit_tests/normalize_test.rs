use crate::{normalize, settle, IntoReducerResult, ReducerResult, StateStream, StoreError};
use futures::{stream, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};

async fn collect(result: ReducerResult<i64>) -> Vec<Result<i64, StoreError>> {
    normalize(result).collect().await
}

#[tokio::test]
async fn test_normalize_sync_and_failed() {
    assert_eq!(collect(ReducerResult::Sync(3)).await, vec![Ok(3)]);
    assert_eq!(
        collect(ReducerResult::failed("boom")).await,
        vec![Err(StoreError::error("boom"))]
    );
}

#[tokio::test]
async fn test_normalize_deferred() {
    let result = ReducerResult::deferred(async {
        sleep(Duration::from_millis(10)).await;
        5
    });
    assert_eq!(collect(result).await, vec![Ok(5)]);

    let result = ReducerResult::try_deferred(async { Err::<i64, _>("not found") });
    assert_eq!(
        collect(result).await,
        vec![Err(StoreError::error("not found"))]
    );
}

#[tokio::test]
async fn test_normalize_stream() {
    let result = ReducerResult::stream(stream::iter(vec![1, 2, 3]));
    assert_eq!(collect(result).await, vec![Ok(1), Ok(2), Ok(3)]);

    let result = ReducerResult::<i64>::try_stream(stream::iter(vec![Ok(1), Err("bad"), Ok(3)]));
    assert_eq!(
        collect(result).await,
        vec![Ok(1), Err(StoreError::error("bad")), Ok(3)]
    );
}

#[tokio::test]
async fn test_normalize_thunk() {
    let result = ReducerResult::<i64>::thunk(|emitter| {
        emitter.next(1);
        emitter.next(2);
        emitter.complete();
        emitter.next(3);
    });
    assert_eq!(collect(result).await, vec![Ok(1), Ok(2)]);
}

#[tokio::test]
async fn test_normalize_thunk_starts_immediately() {
    let started = Arc::new(AtomicBool::new(false));
    let flag = started.clone();
    let stream = normalize(ReducerResult::<i64>::thunk(move |emitter| {
        flag.store(true, Ordering::SeqCst);
        emitter.complete();
    }));
    // Started before anything polls the stream
    assert!(started.load(Ordering::SeqCst));
    assert!(stream.collect::<Vec<_>>().await.is_empty());
}

#[tokio::test]
async fn test_normalize_thunk_async_emitter() {
    let result = ReducerResult::<i64>::thunk(|emitter| {
        tokio::spawn(async move {
            sleep(Duration::from_millis(10)).await;
            emitter.next(7);
            sleep(Duration::from_millis(10)).await;
            emitter.next(8);
            // Dropping the emitter completes the stream
        });
    });
    assert_eq!(collect(result).await, vec![Ok(7), Ok(8)]);
}

#[tokio::test]
async fn test_normalize_thunk_error() {
    let result = ReducerResult::<i64>::thunk(|emitter| {
        emitter.next(1);
        emitter.error("failed");
        emitter.next(2);
    });
    assert_eq!(
        collect(result).await,
        vec![Ok(1), Err(StoreError::error("failed"))]
    );

    let result = ReducerResult::<i64>::thunk(|_| panic!("thunk panicked"));
    assert_eq!(
        collect(result).await,
        vec![Err(StoreError::Panicked("thunk panicked".to_string()))]
    );
}

#[tokio::test]
async fn test_settle() {
    assert_eq!(settle(ReducerResult::Sync(1)).await, Ok(1));
    assert_eq!(
        settle(ReducerResult::Stream(StateStream::from_values(vec![1, 2, 3]))).await,
        Ok(3)
    );
    assert_eq!(
        settle(ReducerResult::<i64>::Stream(StateStream::empty())).await,
        Err(StoreError::Empty)
    );
    assert_eq!(
        settle(ReducerResult::<i64>::failed("boom")).await,
        Err(StoreError::error("boom"))
    );
}

fn kind_of(result: impl IntoReducerResult<i64>) -> &'static str {
    result.into_result().kind()
}

#[test]
fn test_into_reducer_result() {
    assert_eq!(kind_of(5), "sync");
    assert_eq!(kind_of(Ok::<i64, String>(5)), "sync");
    assert_eq!(kind_of(Err::<i64, _>("bad input")), "failed");
    assert_eq!(
        kind_of(Ok::<_, String>(ReducerResult::<i64>::stream(stream::iter(vec![1])))),
        "stream"
    );
    assert_eq!(kind_of(StateStream::<i64>::empty()), "stream");

    let failed: ReducerResult<i64> = Err::<i64, _>("bad input").into_result();
    assert_eq!(format!("{failed:?}"), r#"Failed(Error("bad input"))"#);
    assert_eq!(format!("{:?}", ReducerResult::Sync(4_i64)), "Sync(4)");
}
