//! Node preparation with scoped cleanup.
//!
//! A `NodePreparer` creates nodes that share a generated name prefix and
//! remembers every node it created, so cleanup removes exactly that set even
//! when preparation stopped half way. Cleanup runs at most once per node and
//! also runs on drop if the owner never called it.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::control_plane::ControlPlane;
use crate::error::{HarnessError, HarnessResult, ObjectKind};
use crate::strategy::{HOSTNAME_LABEL, ObjectStrategy};
use schedperf_state::NodeSpec;

/// Outcome of a cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Objects removed by this pass.
    pub deleted: usize,
    /// Objects that were already gone.
    pub missing: usize,
    /// Objects whose deletion failed.
    pub failed: usize,
}

impl CleanupReport {
    pub fn merge(self, other: CleanupReport) -> CleanupReport {
        CleanupReport {
            deleted: self.deleted + other.deleted,
            missing: self.missing + other.missing,
            failed: self.failed + other.failed,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Creates and cleans up one batch of nodes.
pub struct NodePreparer<C: ControlPlane> {
    plane: C,
    /// `{prefix}{suffix}-`, shared by every node of this preparer.
    name_prefix: String,
    created: Vec<String>,
    next_index: usize,
}

impl<C: ControlPlane> NodePreparer<C> {
    /// Create a preparer whose nodes are named `{prefix}{suffix}-{index}`.
    pub fn new(plane: C, prefix: &str) -> Self {
        Self {
            plane,
            name_prefix: format!("{prefix}{}-", unique_suffix()),
            created: Vec::new(),
            next_index: 0,
        }
    }

    /// Name prefix of every node this preparer creates.
    pub fn name_prefix(&self) -> &str {
        &self.name_prefix
    }

    /// Names of the nodes created so far and not yet cleaned up.
    pub fn created(&self) -> &[String] {
        &self.created
    }

    /// Create `count` nodes built by `strategy`.
    ///
    /// Stops at the first failed creation. Nodes created before the failure
    /// remain tracked and are removed by [`cleanup_nodes`](Self::cleanup_nodes).
    pub fn prepare_nodes<S>(&mut self, count: usize, strategy: &S) -> HarnessResult<usize>
    where
        S: ObjectStrategy<Object = NodeSpec>,
    {
        let created_at = epoch_secs();
        for _ in 0..count {
            let index = self.next_index;
            let mut node = strategy.build(index);
            node.name = format!("{}{index}", self.name_prefix);
            node.labels.insert(HOSTNAME_LABEL.to_string(), node.name.clone());
            node.created_at = created_at;

            self.plane
                .create_node(&node)
                .map_err(|source| HarnessError::Creation {
                    kind: ObjectKind::Node,
                    name: node.name.clone(),
                    source,
                })?;
            self.created.push(node.name);
            self.next_index += 1;
        }

        info!(prefix = %self.name_prefix, count, "nodes prepared");
        Ok(count)
    }

    /// Delete every node this preparer created.
    ///
    /// Idempotent: a second call finds nothing left to delete. Individual
    /// failures are logged and counted, never returned.
    pub fn cleanup_nodes(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();
        if self.created.is_empty() {
            return report;
        }

        for name in self.created.drain(..) {
            match self.plane.delete_node(&name) {
                Ok(true) => report.deleted += 1,
                Ok(false) => report.missing += 1,
                Err(e) => {
                    warn!(node = %name, error = %e, "failed to delete node");
                    report.failed += 1;
                }
            }
        }

        debug!(
            prefix = %self.name_prefix,
            deleted = report.deleted,
            missing = report.missing,
            failed = report.failed,
            "nodes cleaned up"
        );
        report
    }
}

impl<C: ControlPlane> Drop for NodePreparer<C> {
    fn drop(&mut self) {
        if !self.created.is_empty() {
            debug!(prefix = %self.name_prefix, "cleaning up nodes on drop");
            self.cleanup_nodes();
        }
    }
}

/// Short hex suffix that keeps generated names unique across batches.
pub(crate) fn unique_suffix() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("{:06x}", nanos & 0xff_ffff)
}

/// Current Unix epoch in seconds.
pub(crate) fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::NodeStrategy;
    use crate::testing::FaultyPlane;
    use schedperf_state::StateStore;

    #[test]
    fn prepares_nodes_with_shared_prefix() {
        let store = StateStore::open_in_memory().unwrap();
        let mut preparer = NodePreparer::new(&store, "scheduler-perf-");

        assert_eq!(preparer.prepare_nodes(10, &NodeStrategy::Trivial).unwrap(), 10);

        let nodes = store.list_nodes().unwrap();
        assert_eq!(nodes.len(), 10);
        assert!(nodes.iter().all(|n| n.name.starts_with(preparer.name_prefix())));
        assert!(preparer.name_prefix().starts_with("scheduler-perf-"));
    }

    #[test]
    fn hostname_label_follows_generated_name() {
        let store = StateStore::open_in_memory().unwrap();
        let mut preparer = NodePreparer::new(&store, "scheduler-perf-");
        preparer
            .prepare_nodes(3, &NodeStrategy::Labeled {
                key: "zone".to_string(),
                value: "a".to_string(),
            })
            .unwrap();

        for node in store.list_nodes().unwrap() {
            assert_eq!(node.labels.get(HOSTNAME_LABEL), Some(&node.name));
            assert_eq!(node.labels.get("zone").map(String::as_str), Some("a"));
        }
    }

    #[test]
    fn repeated_prepare_continues_numbering() {
        let store = StateStore::open_in_memory().unwrap();
        let mut preparer = NodePreparer::new(&store, "p-");
        preparer.prepare_nodes(2, &NodeStrategy::Trivial).unwrap();
        preparer.prepare_nodes(3, &NodeStrategy::Trivial).unwrap();

        assert_eq!(store.list_nodes().unwrap().len(), 5);
        assert_eq!(preparer.created().len(), 5);
    }

    #[test]
    fn cleanup_is_idempotent() {
        let store = StateStore::open_in_memory().unwrap();
        let mut preparer = NodePreparer::new(&store, "scheduler-perf-");
        preparer.prepare_nodes(4, &NodeStrategy::Trivial).unwrap();

        let first = preparer.cleanup_nodes();
        assert_eq!(first.deleted, 4);
        assert!(store.list_nodes().unwrap().is_empty());

        let second = preparer.cleanup_nodes();
        assert_eq!(second, CleanupReport::default());
        assert!(store.list_nodes().unwrap().is_empty());
    }

    #[test]
    fn cleanup_leaves_foreign_nodes_alone() {
        let store = StateStore::open_in_memory().unwrap();
        store.create_node(&NodeStrategy::Trivial.build(99)).unwrap();

        let mut preparer = NodePreparer::new(&store, "scheduler-perf-");
        preparer.prepare_nodes(3, &NodeStrategy::Trivial).unwrap();
        preparer.cleanup_nodes();

        let remaining = store.list_nodes().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "node-99");
    }

    #[test]
    fn partial_failure_is_reported_and_cleaned_up() {
        let plane = FaultyPlane::new();
        plane.node_budget.set(Some(3));
        let mut preparer = NodePreparer::new(&plane, "scheduler-perf-");

        let err = preparer.prepare_nodes(5, &NodeStrategy::Trivial).unwrap_err();
        assert!(matches!(
            err,
            HarnessError::Creation { kind: ObjectKind::Node, .. }
        ));
        assert_eq!(preparer.created().len(), 3);

        let report = preparer.cleanup_nodes();
        assert_eq!(report.deleted, 3);
        assert!(plane.inner.list_nodes().unwrap().is_empty());
    }

    #[test]
    fn drop_cleans_up_remaining_nodes() {
        let store = StateStore::open_in_memory().unwrap();
        {
            let mut preparer = NodePreparer::new(&store, "scheduler-perf-");
            preparer.prepare_nodes(3, &NodeStrategy::Trivial).unwrap();
        }
        assert!(store.list_nodes().unwrap().is_empty());
    }

    #[test]
    fn cleanup_counts_already_deleted_nodes() {
        let store = StateStore::open_in_memory().unwrap();
        let mut preparer = NodePreparer::new(&store, "p-");
        preparer.prepare_nodes(2, &NodeStrategy::Trivial).unwrap();
        let first = preparer.created()[0].clone();
        store.delete_node(&first).unwrap();

        let report = preparer.cleanup_nodes();
        assert_eq!(report.deleted, 1);
        assert_eq!(report.missing, 1);
        assert!(report.is_clean());
    }
}
