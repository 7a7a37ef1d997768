//! Fire-and-forget mailing-list registration.
//!
//! `ListRegistrar::submit` puts a job on a bounded queue and returns at once;
//! one spawned worker drains the queue and calls the notifier, retrying with
//! exponential backoff and jitter up to `max_attempts`. Outcomes are only
//! logged, so nothing here can fail or slow down the caller. The worker stops
//! once every registrar handle is dropped and the queue is empty.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{Instrument, debug, error, info_span, warn};

use super::notify::Notifier;

#[derive(Clone, Copy, Debug)]
pub struct RegistrarConfig {
    queue_capacity: usize,
    max_attempts: u32,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl RegistrarConfig {
    /// Default config: 64 queued jobs, 3 attempts, 1s->30s backoff with jitter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue_capacity: 64,
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_backoff_base(mut self, delay: Duration) -> Self {
        self.backoff_base = delay;
        self
    }

    #[must_use]
    pub fn with_backoff_max(mut self, delay: Duration) -> Self {
        self.backoff_max = delay;
        self
    }

    #[must_use]
    pub fn normalize(self) -> Self {
        let queue_capacity = self.queue_capacity.max(1);
        let max_attempts = self.max_attempts.max(1);
        let backoff_max = self.backoff_max.max(self.backoff_base);
        Self {
            queue_capacity,
            max_attempts,
            backoff_base: self.backoff_base,
            backoff_max,
        }
    }

    #[must_use]
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn backoff_base(&self) -> Duration {
        self.backoff_base
    }

    #[must_use]
    pub fn backoff_max(&self) -> Duration {
        self.backoff_max
    }
}

impl Default for RegistrarConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct ListJob {
    name: String,
    email: String,
}

/// Handle used to enqueue mailing-list registrations.
#[derive(Clone, Debug)]
pub struct ListRegistrar {
    sender: mpsc::Sender<ListJob>,
}

impl ListRegistrar {
    /// Spawn the worker. Await the returned handle after dropping every
    /// registrar to drain pending jobs.
    #[must_use]
    pub fn spawn(notifier: Arc<dyn Notifier>, config: RegistrarConfig) -> (Self, JoinHandle<()>) {
        let config = config.normalize();
        let (sender, receiver) = mpsc::channel(config.queue_capacity());
        let handle = tokio::spawn(run_worker(receiver, notifier, config));
        (Self { sender }, handle)
    }

    /// Enqueue a registration without waiting. A full or closed queue drops
    /// the job with a log line.
    pub fn submit(&self, name: &str, email: &str) {
        let job = ListJob {
            name: name.to_string(),
            email: email.to_string(),
        };
        match self.sender.try_send(job) {
            Ok(()) => debug!(email, "mailing list registration queued"),
            Err(TrySendError::Full(job)) => {
                warn!(email = %job.email, "mailing list queue full, registration dropped");
            }
            Err(TrySendError::Closed(job)) => {
                error!(email = %job.email, "mailing list worker stopped, registration dropped");
            }
        }
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<ListJob>,
    notifier: Arc<dyn Notifier>,
    config: RegistrarConfig,
) {
    while let Some(job) = receiver.recv().await {
        let span = info_span!("mailing_list.register", email = %job.email);
        register(notifier.as_ref(), &job, &config)
            .instrument(span)
            .await;
    }
    debug!("mailing list worker stopped");
}

async fn register(notifier: &dyn Notifier, job: &ListJob, config: &RegistrarConfig) {
    let mut attempt = 1;
    loop {
        match notifier.add_to_list(&job.name, &job.email).await {
            Ok(()) => {
                debug!(attempt, "mailing list registration delivered");
                return;
            }
            Err(err) if attempt >= config.max_attempts() => {
                error!(attempt, "mailing list registration failed: {err:#}");
                return;
            }
            Err(err) => {
                warn!(attempt, "mailing list registration attempt failed: {err:#}");
                sleep(backoff_delay(
                    attempt,
                    config.backoff_base(),
                    config.backoff_max(),
                ))
                .await;
                attempt += 1;
            }
        }
    }
}

fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let shift = attempt.saturating_sub(1).min(31);
    let factor = 1u32 << shift;
    let delay = base.checked_mul(factor).unwrap_or(max);
    jitter_delay(delay.min(max))
}

fn jitter_delay(delay: Duration) -> Duration {
    let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    if delay_ms < 2 {
        return delay;
    }
    let half = delay_ms / 2;
    let jitter = rand::thread_rng().gen_range(0..=half);
    Duration::from_millis(half + jitter)
}
