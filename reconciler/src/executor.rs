//! Bounded parallel execution of cloud queries.

use failover::{FailoverError, Result, WaitOperation};
use shared::counter;
use std::collections::HashMap;
use std::future::Future;
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep_until};

use crate::metrics_defs::FANOUT_TIMEOUT;

/// Runs one task per unit of work and collects every result by key.
///
/// Results come back in completion order. Tasks still running when the
/// deadline passes are aborted and reported as `Timeout`, so the caller always
/// gets exactly one result per key.
pub struct FanOut {
    deadline: Instant,
}

impl FanOut {
    pub fn new(deadline: Instant) -> Self {
        FanOut { deadline }
    }

    pub async fn run<K, T, F>(&self, tasks: Vec<(K, F)>) -> Vec<(K, Result<T>)>
    where
        K: Clone + Send + 'static,
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let started = Instant::now();
        let mut join_set = JoinSet::new();
        let mut pending = HashMap::new();

        for (key, task) in tasks {
            let task_key = key.clone();
            let abort_handle = join_set.spawn(async move { (task_key, task.await) });
            pending.insert(abort_handle.id(), key);
        }

        let mut results = Vec::with_capacity(pending.len());

        let deadline = sleep_until(self.deadline);
        tokio::pin!(deadline);

        loop {
            if join_set.is_empty() {
                break;
            }

            tokio::select! {
                Some(join_result) = join_set.join_next_with_id() => {
                    match join_result {
                        Ok((id, (key, result))) => {
                            pending.remove(&id);
                            results.push((key, result));
                        }
                        Err(e) => {
                            tracing::error!("Task panicked: {}", e);
                            if let Some(key) = pending.remove(&e.id()) {
                                results.push((key, Err(FailoverError::Internal(e.to_string()))));
                            }
                        }
                    }
                }
                _ = &mut deadline => {
                    tracing::warn!(remaining = join_set.len(), "fan-out deadline reached, aborting tasks");
                    join_set.abort_all();
                    break;
                }
                else => break,
            }
        }

        // Tasks that finished or panicked while being aborted still count,
        // cancelled ones stay pending and are reported as timed out
        while let Some(join_result) = join_set.join_next_with_id().await {
            match join_result {
                Ok((id, (key, result))) => {
                    pending.remove(&id);
                    results.push((key, result));
                }
                Err(e) if e.is_panic() => {
                    tracing::error!("Task panicked: {}", e);
                    if let Some(key) = pending.remove(&e.id()) {
                        results.push((key, Err(FailoverError::Internal(e.to_string()))));
                    }
                }
                Err(_) => {}
            }
        }

        if !pending.is_empty() {
            counter!(FANOUT_TIMEOUT).increment(pending.len() as u64);
        }

        let waited = started.elapsed();
        results.extend(pending.into_values().map(|key| {
            (
                key,
                Err(FailoverError::Timeout {
                    operation: WaitOperation::FanOut,
                    waited,
                }),
            )
        }));

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::sleep;

    #[tokio::test(start_paused = true)]
    async fn test_results_merged_by_key() {
        let fan_out = FanOut::new(Instant::now() + Duration::from_secs(60));

        let tasks: Vec<_> = [(0usize, 30u64), (1, 10), (2, 20)]
            .into_iter()
            .map(|(key, delay)| {
                (key, async move {
                    sleep(Duration::from_secs(delay)).await;
                    Ok(key * 10)
                })
            })
            .collect();

        let mut results = fan_out.run(tasks).await;

        // Completion order follows the delays
        let order: Vec<_> = results.iter().map(|(key, _)| *key).collect();
        assert_eq!(order, vec![1, 2, 0]);

        results.sort_by_key(|(key, _)| *key);
        let values: Vec<_> = results.into_iter().map(|(_, r)| r.unwrap()).collect();
        assert_eq!(values, vec![0, 10, 20]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_reports_timeout() {
        let fan_out = FanOut::new(Instant::now() + Duration::from_secs(5));

        let tasks: Vec<_> = [("fast", 1u64), ("slow", 60)]
            .into_iter()
            .map(|(key, delay)| {
                (key, async move {
                    sleep(Duration::from_secs(delay)).await;
                    Ok(())
                })
            })
            .collect();

        let results: HashMap<_, _> = fan_out.run(tasks).await.into_iter().collect();
        assert!(results["fast"].is_ok());
        assert!(results["slow"].as_ref().unwrap_err().is_timeout());
    }

    #[tokio::test]
    async fn test_errors_are_kept_per_key() {
        let fan_out = FanOut::new(Instant::now() + Duration::from_secs(5));

        let tasks: Vec<_> = [0, 1]
            .into_iter()
            .map(|key| {
                (key, async move {
                    if key == 0 {
                        Ok(())
                    } else {
                        Err(FailoverError::Internal("boom".to_string()))
                    }
                })
            })
            .collect();

        let results: HashMap<_, _> = fan_out.run(tasks).await.into_iter().collect();
        assert!(results[&0].is_ok());
        assert!(matches!(results[&1], Err(FailoverError::Internal(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_is_reported_as_internal() {
        let fan_out = FanOut::new(Instant::now() + Duration::from_secs(5));

        let tasks: Vec<_> = [0, 1]
            .into_iter()
            .map(|key| {
                (key, async move {
                    if key == 1 {
                        panic!("listing task crashed");
                    }
                    Ok(key)
                })
            })
            .collect();

        let results: HashMap<_, _> = fan_out.run(tasks).await.into_iter().collect();
        assert_eq!(results.len(), 2);
        assert_eq!(*results[&0].as_ref().unwrap(), 0);
        assert!(matches!(results[&1], Err(FailoverError::Internal(_))));
    }

    #[tokio::test]
    async fn test_no_tasks() {
        let fan_out = FanOut::new(Instant::now() + Duration::from_secs(5));
        let tasks: Vec<(usize, std::future::Ready<Result<()>>)> = vec![];
        assert!(fan_out.run(tasks).await.is_empty());
    }
}
