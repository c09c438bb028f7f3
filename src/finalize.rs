//! Post-login finalization worker.
//!
//! A successful handshake hands a [`PostLoginJob`] to the queue and responds
//! right away. The worker runs each job on its own task, retries failures
//! with exponential backoff and jitter, and logs anything that still fails
//! after `max_attempts`. Nothing is reported back to the HTTP request.
//!
//! The default hook, [`RecordProfile`], stores the resolved provider profile
//! on the caller record.

use crate::{protocol::Profile, registry::Registry};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::{
    sync::mpsc,
    task::{JoinError, JoinHandle, JoinSet},
    time::sleep,
};
use tracing::{Instrument, debug, error, info, info_span, warn};
use ulid::Ulid;

#[derive(Clone, Debug)]
pub struct PostLoginJob {
    pub id: Ulid,
    pub identity: String,
    pub profile: Profile,
}

/// Work to run once a caller is logged in.
#[async_trait]
pub trait PostLoginHook: Send + Sync {
    async fn run(&self, job: &PostLoginJob) -> Result<()>;
}

/// Persist the resolved profile through the registry.
pub struct RecordProfile {
    registry: Arc<dyn Registry>,
}

impl RecordProfile {
    #[must_use]
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl PostLoginHook for RecordProfile {
    async fn run(&self, job: &PostLoginJob) -> Result<()> {
        self.registry
            .record_login(&job.identity, &job.profile)
            .await
            .with_context(|| format!("failed to record login for {}", job.identity))
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FinalizeConfig {
    max_attempts: u32,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl FinalizeConfig {
    /// Default: 5 attempts, 2s->60s exponential backoff with jitter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_attempts: 5,
            backoff_base: Duration::from_secs(2),
            backoff_max: Duration::from_secs(60),
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_backoff_base_seconds(mut self, seconds: u64) -> Self {
        self.backoff_base = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_backoff_max_seconds(mut self, seconds: u64) -> Self {
        self.backoff_max = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn normalize(self) -> Self {
        let backoff_base = if self.backoff_base.is_zero() {
            Duration::from_millis(100)
        } else {
            self.backoff_base
        };
        Self {
            max_attempts: self.max_attempts.max(1),
            backoff_base,
            backoff_max: self.backoff_max.max(backoff_base),
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry number `attempt` (1-based), before jitter.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.backoff_base
            .saturating_mul(1 << exponent)
            .min(self.backoff_max)
    }
}

impl Default for FinalizeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Sending half handed to the handshake.
#[derive(Clone, Debug)]
pub struct PostLoginQueue {
    tx: mpsc::UnboundedSender<PostLoginJob>,
}

impl PostLoginQueue {
    /// Queue plus the receiving end, for callers that drive jobs themselves.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PostLoginJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue a finalization job without waiting for it.
    ///
    /// # Errors
    /// Returns an error if the worker has stopped.
    pub fn enqueue(&self, identity: &str, profile: Profile) -> Result<Ulid> {
        let job = PostLoginJob {
            id: Ulid::new(),
            identity: identity.to_string(),
            profile,
        };
        let id = job.id;
        self.tx
            .send(job)
            .map_err(|_| anyhow::anyhow!("post-login worker is not running"))?;
        Ok(id)
    }
}

/// Spawn the worker and return its queue.
///
/// The returned handle completes once every queue sender is dropped and all
/// jobs already received have finished, retries included.
pub fn spawn_worker(
    hook: Arc<dyn PostLoginHook>,
    config: FinalizeConfig,
) -> (PostLoginQueue, JoinHandle<()>) {
    let (queue, mut rx) = PostLoginQueue::channel();
    let config = config.normalize();

    let handle = tokio::spawn(async move {
        let mut jobs = JoinSet::new();
        loop {
            tokio::select! {
                job = rx.recv() => match job {
                    Some(job) => {
                        let span =
                            info_span!("post_login", job_id = %job.id, identity = %job.identity);
                        jobs.spawn(run_job(hook.clone(), job, config).instrument(span));
                    }
                    None => break,
                },
                Some(result) = jobs.join_next(), if !jobs.is_empty() => reap(result),
            }
        }

        debug!("post-login queue closed, draining {} jobs", jobs.len());
        while let Some(result) = jobs.join_next().await {
            reap(result);
        }
    });

    (queue, handle)
}

fn reap(result: Result<(), JoinError>) {
    if let Err(err) = result {
        error!("post-login job ended abnormally: {err}");
    }
}

async fn run_job(hook: Arc<dyn PostLoginHook>, job: PostLoginJob, config: FinalizeConfig) {
    let mut attempt = 1;
    loop {
        match hook.run(&job).await {
            Ok(()) => {
                info!("post-login finalization complete");
                return;
            }
            Err(err) if attempt >= config.max_attempts() => {
                error!("post-login finalization failed after {attempt} attempts: {err:#}");
                return;
            }
            Err(err) => {
                let delay = jittered(config.backoff(attempt));
                warn!(
                    "post-login finalization attempt {attempt} failed, retrying in {}ms: {err:#}",
                    delay.as_millis()
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

fn jittered(delay: Duration) -> Duration {
    let jitter_factor = 0.1;
    let mut rng = rand::thread_rng();
    delay.mul_f64(rng.gen_range(1.0 - jitter_factor..=1.0))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::registry::{MemoryRegistry, Whitelist};
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Notify;

    struct Flaky {
        failures: u32,
        calls: AtomicU32,
        done: Notify,
    }

    #[async_trait]
    impl PostLoginHook for Flaky {
        async fn run(&self, _job: &PostLoginJob) -> Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                anyhow::bail!("transient failure {call}");
            }
            self.done.notify_one();
            Ok(())
        }
    }

    fn profile() -> Profile {
        Profile {
            id: 99,
            username: Some("alice".to_string()),
        }
    }

    #[test]
    fn backoff_grows_and_caps() {
        let config = FinalizeConfig::new()
            .with_backoff_base_seconds(2)
            .with_backoff_max_seconds(10)
            .normalize();
        assert_eq!(config.backoff(1), Duration::from_secs(2));
        assert_eq!(config.backoff(2), Duration::from_secs(4));
        assert_eq!(config.backoff(3), Duration::from_secs(8));
        assert_eq!(config.backoff(4), Duration::from_secs(10));
        assert_eq!(config.backoff(40), Duration::from_secs(10));
    }

    #[test]
    fn normalize_fixes_degenerate_values() {
        let config = FinalizeConfig::new()
            .with_max_attempts(0)
            .with_backoff_base_seconds(0)
            .with_backoff_max_seconds(0)
            .normalize();
        assert_eq!(config.max_attempts(), 1);
        assert_eq!(config.backoff(1), Duration::from_millis(100));
    }

    #[test]
    fn jitter_stays_within_ten_percent() {
        let delay = Duration::from_secs(10);
        for _ in 0..50 {
            let value = jittered(delay);
            assert!(value <= delay);
            assert!(value >= Duration::from_secs(9));
        }
    }

    #[tokio::test]
    async fn worker_records_profile() {
        let registry = Arc::new(MemoryRegistry::new(Whitelist::everyone()));
        let hook = Arc::new(RecordProfile::new(registry.clone()));
        let (queue, _handle) = spawn_worker(hook, FinalizeConfig::new());

        queue.enqueue("@alice:example.com", profile()).unwrap();

        for _ in 0..100 {
            if registry.profile("@alice:example.com").await.is_some() {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(registry.profile("@alice:example.com").await, Some(profile()));
    }

    #[tokio::test(start_paused = true)]
    async fn worker_retries_transient_failures() {
        let hook = Arc::new(Flaky {
            failures: 2,
            calls: AtomicU32::new(0),
            done: Notify::new(),
        });
        let config = FinalizeConfig::new().with_backoff_base_seconds(1);
        let (queue, _handle) = spawn_worker(hook.clone(), config);

        queue.enqueue("@alice:example.com", profile()).unwrap();
        hook.done.notified().await;

        assert_eq!(hook.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_queue_waits_for_jobs_in_backoff() {
        let hook = Arc::new(Flaky {
            failures: 3,
            calls: AtomicU32::new(0),
            done: Notify::new(),
        });
        let config = FinalizeConfig::new().with_backoff_base_seconds(5);
        let (queue, handle) = spawn_worker(hook.clone(), config);

        queue.enqueue("@alice:example.com", profile()).unwrap();
        drop(queue);
        handle.await.unwrap();

        assert_eq!(hook.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn enqueue_fails_once_worker_is_gone() {
        let (queue, rx) = PostLoginQueue::channel();
        drop(rx);
        assert!(queue.enqueue("@alice:example.com", profile()).is_err());
    }
}
