//! Scatter-gather coordinator.
//!
//! # Responsibilities
//! - Issue one request per target backend, concurrently
//! - Gate each request on the backend's concurrency limiter
//! - Collect replies in arrival order under the tiered deadline
//! - Abandon stragglers and record them as timeouts
//!
//! # Design Decisions
//! - One tokio task per backend; aborting a task drops its permit
//! - The grace window starts at the first successful reply only
//! - Never fails: callers decide whether the partial result is usable

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::backend::Backend;
use crate::zipper::error::BackendError;

/// One backend's outcome for a dispatch.
#[derive(Debug, Clone)]
pub struct BackendReply<T> {
    /// Address of the backend that produced the outcome.
    pub backend: String,
    pub outcome: Result<T, BackendError>,
    /// Time from dispatch to arrival (or abandonment).
    pub elapsed: Duration,
}

impl<T> BackendReply<T> {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Send `request` to every backend in `targets` and gather the replies.
///
/// `deadline` is the call's global deadline. Once the first successful reply
/// arrives, backends still outstanding `after_started` later are abandoned,
/// unless `deadline` comes first.
pub async fn dispatch<T, F, Fut>(
    targets: &[Arc<Backend>],
    after_started: Duration,
    deadline: Instant,
    request: F,
) -> Vec<BackendReply<T>>
where
    T: Send + 'static,
    F: Fn(Arc<Backend>) -> Fut,
    Fut: Future<Output = Result<T, BackendError>> + Send + 'static,
{
    let started = Instant::now();
    let mut tasks = JoinSet::new();

    for (index, backend) in targets.iter().enumerate() {
        let backend = Arc::clone(backend);
        let call = request(Arc::clone(&backend));
        tasks.spawn(async move {
            let _permit = backend.acquire().await;
            (index, call.await)
        });
    }

    let mut replies = Vec::with_capacity(targets.len());
    let mut answered = vec![false; targets.len()];
    let mut grace_started = false;
    let mut abandoned = false;

    let timer = tokio::time::sleep_until(deadline);
    tokio::pin!(timer);

    while !tasks.is_empty() {
        tokio::select! {
            joined = tasks.join_next() => match joined {
                Some(Ok((index, outcome))) => {
                    answered[index] = true;
                    let elapsed = started.elapsed();
                    if outcome.is_ok() && !grace_started {
                        grace_started = true;
                        let grace = Instant::now() + after_started;
                        if grace < deadline {
                            timer.as_mut().reset(grace);
                        }
                    }
                    tracing::trace!(
                        backend = %targets[index].address(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        ok = outcome.is_ok(),
                        "Backend replied"
                    );
                    replies.push(BackendReply {
                        backend: targets[index].address().to_string(),
                        outcome,
                        elapsed,
                    });
                }
                Some(Err(e)) => {
                    tracing::error!(error = %e, "Backend task failed");
                }
                None => break,
            },
            _ = &mut timer => {
                abandoned = true;
                break;
            }
        }
    }

    // Stragglers are cancelled; their permits go back with the dropped futures.
    tasks.abort_all();

    let elapsed = started.elapsed();
    for (index, done) in answered.iter().enumerate() {
        if *done {
            continue;
        }
        let error = if abandoned {
            tracing::debug!(
                backend = %targets[index].address(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Abandoning backend after deadline"
            );
            BackendError::Timeout
        } else {
            BackendError::Aborted
        };
        replies.push(BackendReply {
            backend: targets[index].address().to_string(),
            outcome: Err(error),
            elapsed,
        });
    }

    replies
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backends(n: usize) -> Vec<Arc<Backend>> {
        let client = reqwest::Client::new();
        (0..n)
            .map(|i| Arc::new(Backend::new(&format!("127.0.0.1:{}", 9000 + i), client.clone(), 0).unwrap()))
            .collect()
    }

    fn index_of(backend: &Backend) -> u64 {
        backend.address().rsplit(':').next().unwrap().parse::<u64>().unwrap() - 9000
    }

    #[tokio::test]
    async fn test_collects_all_replies() {
        let targets = backends(3);
        let deadline = Instant::now() + Duration::from_secs(2);
        let replies = dispatch(&targets, Duration::from_secs(1), deadline, |b| async move {
            Ok::<_, BackendError>(index_of(&b))
        })
        .await;

        assert_eq!(replies.len(), 3);
        assert!(replies.iter().all(|r| r.is_success()));
    }

    #[tokio::test]
    async fn test_grace_window_abandons_stragglers() {
        let targets = backends(2);
        let deadline = Instant::now() + Duration::from_secs(5);
        let start = Instant::now();
        let replies = dispatch(&targets, Duration::from_millis(100), deadline, |b| async move {
            if index_of(&b) == 1 {
                tokio::time::sleep(Duration::from_secs(3)).await;
            }
            Ok::<_, BackendError>(())
        })
        .await;

        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(replies.len(), 2);
        assert!(replies[0].is_success());
        assert_eq!(replies[1].outcome, Err(BackendError::Timeout));
    }

    #[tokio::test]
    async fn test_failures_do_not_start_grace_window() {
        let targets = backends(2);
        let deadline = Instant::now() + Duration::from_secs(2);
        let replies = dispatch(&targets, Duration::from_millis(50), deadline, |b| async move {
            if index_of(&b) == 0 {
                Err(BackendError::Status(500))
            } else {
                tokio::time::sleep(Duration::from_millis(300)).await;
                Ok(())
            }
        })
        .await;

        assert_eq!(replies.len(), 2);
        assert!(replies.iter().any(|r| r.is_success()));
    }

    #[tokio::test]
    async fn test_global_deadline_without_replies() {
        let targets = backends(3);
        let start = Instant::now();
        let deadline = start + Duration::from_millis(100);
        let replies = dispatch(&targets, Duration::from_secs(1), deadline, |_| async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, BackendError>(())
        })
        .await;

        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(replies.len(), 3);
        assert!(replies.iter().all(|r| r.outcome == Err(BackendError::Timeout)));
    }

    #[tokio::test]
    async fn test_abandoned_tasks_release_permits() {
        let client = reqwest::Client::new();
        let target = Arc::new(Backend::new("127.0.0.1:9100", client, 1).unwrap());
        let targets = vec![target.clone()];

        let deadline = Instant::now() + Duration::from_millis(50);
        let _ = dispatch(&targets, Duration::from_secs(1), deadline, |_| async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, BackendError>(())
        })
        .await;

        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(target.limiter().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_empty_target_set() {
        let replies = dispatch(&[], Duration::from_secs(1), Instant::now(), |_| async move {
            Ok::<_, BackendError>(())
        })
        .await;
        assert!(replies.is_empty());
    }
}
