use std::time::Duration;

use backoff_retrier::{AttemptRetrier, BackoffConfig, BackoffEvent, BackoffScheduler, RetrierConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    // Promise-style: the retrier calls the operation for us.
    let retrier = AttemptRetrier::new(
        RetrierConfig::new(Duration::from_millis(50), Duration::from_secs(2))
            .with_max_attempts_count(5)
            .with_randomness(0.1),
    )?
    .with_context("flaky_fetch");
    let body = retrier
        .run_with(|attempt| async move {
            if attempt < 3 {
                Err(format!("503 on attempt {attempt}"))
            } else {
                Ok(format!("payload after {attempt} attempts"))
            }
        })
        .await?;
    println!("{body}");

    // Event-style: we retry whenever the scheduler says we are ready.
    let backoff: BackoffScheduler<String> = BackoffScheduler::new(
        BackoffConfig::default()
            .with_initial_delay(Duration::from_millis(20))
            .with_max_delay(Duration::from_millis(500)),
    )?;
    backoff.fail_after(3)?;
    let mut events = backoff.subscribe();
    backoff.backoff("connection refused".to_string());
    while let Ok(event) = events.recv().await {
        match event {
            BackoffEvent::Backoff { attempt, delay, .. } => {
                println!("backoff #{attempt}: waiting {delay:?}");
            }
            BackoffEvent::Ready { attempt, .. } => {
                println!("retrying after backoff #{attempt}");
                backoff.backoff("connection refused".to_string());
            }
            BackoffEvent::Fail { error } => {
                println!("giving up: {}", error.unwrap_or_default());
                break;
            }
        }
    }
    Ok(())
}
