//! Pod group injection.
//!
//! A `PodInjector` creates pods in labeled groups (`group=<label>`), all in
//! one namespace. Groups share storage and are told apart only by label.
//! Creation is synchronous, stops at the first failure, and never retries.

use tracing::{debug, info, warn};

use crate::control_plane::ControlPlane;
use crate::error::{HarnessError, HarnessResult, ObjectKind};
use crate::nodes::{CleanupReport, epoch_secs, unique_suffix};
use crate::strategy::ObjectStrategy;
use schedperf_state::{GROUP_LABEL, PodSpec};

/// Creates pod groups and removes them again at case end.
pub struct PodInjector<C: ControlPlane> {
    plane: C,
    namespace: String,
    /// Unique per injector; keeps names distinct across environments.
    suffix: String,
    batches: usize,
    /// `{namespace}/{name}` keys of created pods.
    created: Vec<String>,
}

impl<C: ControlPlane> PodInjector<C> {
    pub fn new(plane: C, namespace: &str) -> Self {
        Self {
            plane,
            namespace: namespace.to_string(),
            suffix: unique_suffix(),
            batches: 0,
            created: Vec::new(),
        }
    }

    /// Number of pods created and not yet cleaned up.
    pub fn created(&self) -> usize {
        self.created.len()
    }

    /// Create `count` pods labeled `group=<group_label>`, built by `strategy`.
    ///
    /// Fails with [`HarnessError::Creation`] on the first failing call. Pods
    /// created before the failure stay tracked for cleanup.
    pub fn create_pods<S>(&mut self, group_label: &str, count: usize, strategy: &S) -> HarnessResult<usize>
    where
        S: ObjectStrategy<Object = PodSpec>,
    {
        let batch = self.batches;
        self.batches += 1;
        let created_at = epoch_secs();

        for index in 0..count {
            let mut pod = strategy.build(index);
            pod.namespace = self.namespace.clone();
            pod.name = format!("{group_label}-{}{batch}-{index}", self.suffix);
            pod.labels.insert(GROUP_LABEL.to_string(), group_label.to_string());
            pod.node_name = None;
            pod.created_at = created_at;

            let key = pod.table_key();
            self.plane
                .create_pod(&pod)
                .map_err(|source| HarnessError::Creation {
                    kind: ObjectKind::Pod,
                    name: key.clone(),
                    source,
                })?;
            self.created.push(key);
        }

        info!(group = %group_label, namespace = %self.namespace, count, "pods created");
        Ok(count)
    }

    /// Delete every pod this injector created. Idempotent.
    pub fn cleanup_pods(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();
        if self.created.is_empty() {
            return report;
        }

        for key in self.created.drain(..) {
            match self.plane.delete_pod(&key) {
                Ok(true) => report.deleted += 1,
                Ok(false) => report.missing += 1,
                Err(e) => {
                    warn!(pod = %key, error = %e, "failed to delete pod");
                    report.failed += 1;
                }
            }
        }

        debug!(
            namespace = %self.namespace,
            deleted = report.deleted,
            failed = report.failed,
            "pods cleaned up"
        );
        report
    }
}

impl<C: ControlPlane> Drop for PodInjector<C> {
    fn drop(&mut self) {
        if !self.created.is_empty() {
            self.cleanup_pods();
        }
    }
}
