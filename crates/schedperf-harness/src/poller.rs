//! Completion polling.
//!
//! The harness has no channel to the scheduler-under-test; it learns about
//! progress only by counting bound pods. `CompletionPoller` repeats that
//! count until a target is reached, sleeping a phase-specific interval in
//! between. Listing is expensive for the control plane, so warm-up polls
//! coarsely and only the measured phase polls finely.
//!
//! Every wait is bounded: query failures are retried with exponential
//! backoff until the wait's deadline, the whole wait gives up at that
//! deadline, and a shutdown signal aborts it. Only a wait without a
//! deadline falls back to the retry budget to stay bounded.

use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::control_plane::ControlPlane;
use crate::error::{HarnessError, HarnessResult};
use schedperf_state::{LabelSelector, StateResult};

/// Poll cadence and deadline for one wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Pause between successful queries.
    pub interval: Duration,
    /// Give up once the wait has run this long. `None` waits forever.
    pub deadline: Option<Duration>,
}

impl PollPolicy {
    /// Coarse warm-up cadence.
    pub fn warmup() -> Self {
        Self {
            interval: Duration::from_secs(1),
            deadline: Some(Duration::from_secs(600)),
        }
    }

    /// Fine measured-phase cadence.
    pub fn measured() -> Self {
        Self {
            interval: Duration::from_millis(100),
            deadline: Some(Duration::from_secs(600)),
        }
    }
}

/// Backoff for failed scheduled-pod queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Consecutive failures tolerated by a wait that has no deadline.
    pub max_retries: u32,
    /// Backoff after the first failure; doubles on each further one.
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
        }
    }
}

/// Consecutive-failure tracker with exponential backoff.
#[derive(Debug)]
struct QueryBackoff {
    consecutive_failures: u32,
    current: Duration,
    base: Duration,
    max: Duration,
}

impl QueryBackoff {
    fn new(policy: &RetryPolicy) -> Self {
        Self {
            consecutive_failures: 0,
            current: policy.base_backoff,
            base: policy.base_backoff,
            max: policy.max_backoff,
        }
    }

    /// Record a failure and return how long to wait before the next try.
    fn record_failure(&mut self) -> Duration {
        self.consecutive_failures += 1;
        if self.consecutive_failures > 1 {
            self.current = (self.current * 2).min(self.max);
        }
        self.current
    }

    fn reset(&mut self) {
        self.consecutive_failures = 0;
        self.current = self.base;
    }
}

/// Point-in-time count of bound pods matching a selector.
#[derive(Debug, Clone, Copy)]
pub struct ScheduledSnapshot {
    pub count: usize,
    pub taken_at: Instant,
}

impl ScheduledSnapshot {
    /// Time from `start` until this snapshot was taken.
    pub fn since(&self, start: Instant) -> Duration {
        self.taken_at.saturating_duration_since(start)
    }
}

/// What happened during one successful wait.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WaitStats {
    /// Queries issued, including failed ones.
    pub polls: u32,
    pub failed_queries: u32,
    /// Count observed by the query that satisfied the target.
    pub final_count: usize,
    /// Snapshots that came back lower than the one before.
    pub regressions: u32,
    /// From the start of the wait until the satisfying snapshot was taken.
    pub elapsed: Duration,
}

/// Waits for the scheduler-under-test to bind a target number of pods.
pub struct CompletionPoller<C: ControlPlane> {
    plane: C,
    retry: RetryPolicy,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<C: ControlPlane> CompletionPoller<C> {
    pub fn new(plane: C, retry: RetryPolicy) -> Self {
        Self {
            plane,
            retry,
            shutdown: None,
        }
    }

    /// Abort waits with [`HarnessError::Cancelled`] once `shutdown` flips to true.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Take a fresh snapshot. Never cached.
    pub fn snapshot(&self, selector: &LabelSelector) -> StateResult<ScheduledSnapshot> {
        let count = self.plane.count_scheduled_pods(selector)?;
        Ok(ScheduledSnapshot {
            count,
            taken_at: Instant::now(),
        })
    }

    /// Block until at least `target` pods matching `selector` are scheduled.
    pub async fn wait_for_scheduled_count(
        &mut self,
        target: usize,
        selector: &LabelSelector,
        policy: PollPolicy,
    ) -> HarnessResult<WaitStats> {
        let start = Instant::now();
        let mut stats = WaitStats::default();
        let mut backoff = QueryBackoff::new(&self.retry);
        let mut last: Option<usize> = None;
        let mut last_error: Option<String> = None;

        debug!(
            target,
            %selector,
            interval_ms = policy.interval.as_millis() as u64,
            "waiting for scheduled pods"
        );

        loop {
            if self.is_cancelled() {
                return Err(HarnessError::Cancelled);
            }

            stats.polls += 1;
            let mut pause = match self.snapshot(selector) {
                Ok(snapshot) => {
                    backoff.reset();
                    last_error = None;
                    if let Some(prev) = last {
                        if snapshot.count < prev {
                            stats.regressions += 1;
                            warn!(prev, observed = snapshot.count, "scheduled count went backwards");
                        }
                    }
                    last = Some(snapshot.count);
                    stats.final_count = snapshot.count;

                    if snapshot.count >= target {
                        stats.elapsed = snapshot.since(start);
                        debug!(
                            target,
                            observed = snapshot.count,
                            polls = stats.polls,
                            elapsed_ms = stats.elapsed.as_millis() as u64,
                            "scheduled target reached"
                        );
                        return Ok(stats);
                    }
                    trace!(target, observed = snapshot.count, "target not reached yet");
                    policy.interval
                }
                Err(source) => {
                    stats.failed_queries += 1;
                    let delay = backoff.record_failure();
                    // With a deadline, failures are retried until it runs out.
                    if policy.deadline.is_none()
                        && backoff.consecutive_failures > self.retry.max_retries
                    {
                        return Err(HarnessError::Query {
                            attempts: backoff.consecutive_failures,
                            source,
                        });
                    }
                    warn!(
                        error = %source,
                        attempt = backoff.consecutive_failures,
                        backoff_ms = delay.as_millis() as u64,
                        "scheduled-pod query failed, retrying"
                    );
                    last_error = Some(source.to_string());
                    delay
                }
            };

            if let Some(deadline) = policy.deadline {
                let waited = start.elapsed();
                if waited >= deadline {
                    if let Some(error) = &last_error {
                        warn!(%error, "deadline reached while queries were failing");
                    }
                    return Err(HarnessError::ConvergenceTimeout {
                        target,
                        observed: last.unwrap_or(0),
                        waited,
                    });
                }
                pause = pause.min(deadline - waited);
            }

            self.pause(pause).await;
        }
    }

    fn is_cancelled(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Sleep for `duration`, waking early if the shutdown signal changes.
    async fn pause(&mut self, duration: Duration) {
        let Some(rx) = self.shutdown.as_mut() else {
            tokio::time::sleep(duration).await;
            return;
        };

        let sender_gone = tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            changed = rx.changed() => changed.is_err(),
        };
        if sender_gone {
            // Nobody can cancel any more; stop listening.
            self.shutdown = None;
        }
    }
}
