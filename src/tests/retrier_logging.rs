use std::time::Duration;

use crate::tests::test_support::LogSink;
use crate::{AttemptRetrier, Error, RetrierConfig, RetryError};

#[tokio::test(start_paused = true)]
async fn retries_are_logged_with_the_reported_error() {
    let logs = LogSink::default();
    let guard = logs.install();

    let retrier = AttemptRetrier::new(RetrierConfig::new(
        Duration::from_millis(10),
        Duration::from_millis(1000),
    ))
    .unwrap()
    .with_context("fetch");
    let mut calls = 0u32;
    let value = retrier
        .run(|| {
            calls += 1;
            let call = calls;
            async move {
                if call < 3 {
                    Err(format!("503 on call {call}"))
                } else {
                    Ok(call)
                }
            }
        })
        .await
        .unwrap();
    drop(guard);

    assert_eq!(value, 3);
    assert!(
        logs.lines()
            .iter()
            .any(|line| line.contains("WARN") && line.contains("503 on call 1")),
        "expected a retry warning, got {:?}",
        logs.lines()
    );
    assert_eq!(logs.count("retrier.retry"), 2);
    let outcome = logs.find("retry.outcome").expect("outcome logged");
    assert!(outcome.contains("context=fetch"));
    assert!(outcome.contains("attempts=3"));
    assert!(outcome.contains("success=true"));
}

#[tokio::test(start_paused = true)]
async fn a_retry_refused_by_the_time_budget_is_not_logged() {
    let logs = LogSink::default();
    let guard = logs.install();

    let retrier = AttemptRetrier::<u32>::new(
        RetrierConfig::new(Duration::from_millis(10), Duration::from_millis(100))
            .with_max_attempts_time(Duration::from_millis(1)),
    )
    .unwrap();
    let err = retrier
        .run(|| async { Err::<u32, _>("503") })
        .await
        .expect_err("first retry overruns the budget");
    drop(guard);

    assert!(matches!(
        err,
        Error::Retry(RetryError::AttemptTimeExceeded { .. })
    ));
    assert_eq!(logs.count("retrier.retry"), 0);
    assert!(logs.find("retrier.failed").is_some());
}

#[tokio::test(start_paused = true)]
async fn cancellation_is_logged_as_unsuccessful() {
    let logs = LogSink::default();
    let guard = logs.install();

    let retrier = AttemptRetrier::<u32>::new(
        RetrierConfig::new(Duration::from_millis(10), Duration::from_millis(100))
            .with_initial_delay(Duration::from_millis(100)),
    )
    .unwrap();
    let outcome = retrier.start().unwrap();
    assert!(retrier.cancel());
    assert_eq!(outcome.await, Err(RetryError::Cancelled));
    drop(guard);

    assert!(logs.find("retrier.cancelled").is_some());
    let summary = logs.find("retry.outcome").expect("outcome logged");
    assert!(summary.contains("success=false"));
}
