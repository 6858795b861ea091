//! Bounded polling for convergence.

use failover::{FailoverError, Result, WaitOperation};
use shared::histogram;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep_until};

use crate::metrics_defs::WAIT_ATTEMPTS;

/// Polls `attempt` every `interval` until it yields a value.
///
/// `Ok(None)` means "not yet" and schedules another poll, errors abort the
/// wait immediately. Gives up with `Timeout` once the next poll would not
/// start before `deadline`.
pub async fn poll_until<T, F, Fut>(
    operation: WaitOperation,
    interval: Duration,
    deadline: Instant,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let started = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        if let Some(value) = attempt().await? {
            histogram!(WAIT_ATTEMPTS).record(f64::from(attempts));
            tracing::debug!(%operation, attempts, "wait converged");
            return Ok(value);
        }

        let now = Instant::now();
        let next = now + interval;
        if next >= deadline {
            histogram!(WAIT_ATTEMPTS).record(f64::from(attempts));
            tracing::warn!(%operation, attempts, "wait deadline reached");
            return Err(FailoverError::Timeout {
                operation,
                waited: now - started,
            });
        }

        tracing::debug!(%operation, attempts, "not converged yet, polling again");
        sleep_until(next).await;
    }
}
