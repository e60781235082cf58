//! Scheduler: binds pending pods to nodes.
//!
//! The `Scheduler` is the control loop that:
//! - Lists pending pods from the state store
//! - Derives per-node usage from the pods already bound
//! - Ranks feasible nodes and binds each pod to the best one
//!
//! It shares nothing with the benchmark harness except the store.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use schedperf_state::*;

use crate::error::{SchedulerError, SchedulerResult};
use crate::scorer::{NodeResources, ScoringWeights, rank_nodes};

/// Tuning knobs for the scheduling loop.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum number of pods bound per cycle.
    pub batch_size: usize,
    /// Pause between cycles when nothing could be bound.
    pub idle_interval: Duration,
    pub weights: ScoringWeights,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            idle_interval: Duration::from_millis(10),
            weights: ScoringWeights::default(),
        }
    }
}

/// Reference scheduler over a [`StateStore`].
pub struct Scheduler {
    state: StateStore,
    config: SchedulerConfig,
}

impl Scheduler {
    /// Create a new scheduler.
    pub fn new(state: StateStore, config: SchedulerConfig) -> Self {
        Self { state, config }
    }

    /// Run one scheduling cycle. Returns the number of pods bound.
    ///
    /// Pods that fit no node stay pending and are retried next cycle.
    pub fn schedule_once(&self) -> SchedulerResult<u32> {
        let pending = self.state.list_pending_pods(usize::MAX)?;
        if pending.is_empty() {
            return Ok(0);
        }

        let mut nodes = self.node_usage()?;
        if nodes.is_empty() {
            return Err(SchedulerError::NoNodes);
        }

        let mut bound: u32 = 0;
        let mut unschedulable: u32 = 0;
        for pod in pending {
            if bound as usize >= self.config.batch_size {
                break;
            }

            let ranked = rank_nodes(&nodes, &pod.requests, &pod.node_selector, &self.config.weights);
            let Some(best) = ranked.first() else {
                unschedulable += 1;
                trace!(pod = %pod.table_key(), "no feasible node");
                continue;
            };

            let key = pod.table_key();
            match self.state.bind_pod(&key, &best.node_name) {
                Ok(()) => {
                    if let Some(node) = nodes.iter_mut().find(|n| n.node_name == best.node_name) {
                        node.add_pod(&pod.requests);
                    }
                    bound += 1;
                    trace!(
                        pod = %key,
                        node = %best.node_name,
                        score = best.score,
                        least_allocated = best.breakdown.least_allocated,
                        balanced = best.breakdown.balanced,
                        "pod bound"
                    );
                }
                // Deleted or bound by someone else since listing.
                Err(StateError::NotFound(_)) | Err(StateError::Conflict(_)) => {
                    debug!(pod = %key, "pod changed before bind, skipping");
                }
                Err(e) => return Err(e.into()),
            }
        }

        if unschedulable > 0 {
            debug!(unschedulable, "pods left pending without a feasible node");
        }
        Ok(bound)
    }

    /// Run the scheduling loop until `shutdown` flips to true.
    ///
    /// Returns the total number of pods bound.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> u64 {
        info!(
            batch_size = self.config.batch_size,
            idle_ms = self.config.idle_interval.as_millis() as u64,
            "scheduler loop starting"
        );
        let mut total: u64 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let pause = match self.schedule_once() {
                Ok(0) => self.config.idle_interval,
                Ok(bound) => {
                    total += u64::from(bound);
                    debug!(bound, total, "scheduling cycle complete");
                    Duration::ZERO
                }
                Err(SchedulerError::NoNodes) => self.config.idle_interval,
                Err(e) => {
                    warn!(error = %e, "scheduling cycle failed");
                    self.config.idle_interval
                }
            };

            if pause.is_zero() {
                tokio::task::yield_now().await;
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!(total, "scheduler loop stopped");
        total
    }

    /// Current allocatable/requested view of every node.
    fn node_usage(&self) -> SchedulerResult<Vec<NodeResources>> {
        let mut by_name: HashMap<String, NodeResources> = self
            .state
            .list_nodes()?
            .iter()
            .map(|n| (n.name.clone(), NodeResources::from_node(n)))
            .collect();

        for pod in self.state.list_scheduled_pods(&LabelSelector::everything())? {
            if let Some(node) = pod.node_name.as_ref().and_then(|n| by_name.get_mut(n)) {
                node.add_pod(&pod.requests);
            }
        }

        Ok(by_name.into_values().collect())
    }
}
