//! Object types held by the schedperf control plane.
//!
//! Nodes are the resource hosts, pods the schedulable work units. A pod is
//! "scheduled" once its `node_name` is set by a bind. All types serialize
//! to JSON for storage in redb tables.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Label set attached to nodes and pods.
pub type Labels = BTreeMap<String, String>;

/// Label carrying the pod group a harness-created pod belongs to.
pub const GROUP_LABEL: &str = "group";

// ── Resources ─────────────────────────────────────────────────────

/// Amounts of the resources a node offers or a pod requests.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ResourceList {
    /// CPU in millicores.
    pub cpu_millis: u64,
    /// Memory in bytes.
    pub memory_bytes: u64,
    /// Pod slots. Requests use 1 per pod.
    pub pods: u32,
}

impl ResourceList {
    /// Component-wise sum of two resource lists.
    pub fn saturating_add(self, other: ResourceList) -> ResourceList {
        ResourceList {
            cpu_millis: self.cpu_millis.saturating_add(other.cpu_millis),
            memory_bytes: self.memory_bytes.saturating_add(other.memory_bytes),
            pods: self.pods.saturating_add(other.pods),
        }
    }

    /// Whether `request` fits inside `self` once `used` is subtracted.
    pub fn fits(&self, used: &ResourceList, request: &ResourceList) -> bool {
        used.cpu_millis.saturating_add(request.cpu_millis) <= self.cpu_millis
            && used.memory_bytes.saturating_add(request.memory_bytes) <= self.memory_bytes
            && used.pods.saturating_add(request.pods) <= self.pods
    }
}

// ── Node ──────────────────────────────────────────────────────────

/// A synthetic resource host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeSpec {
    pub name: String,
    pub labels: Labels,
    /// Resources available to pods on this node.
    pub allocatable: ResourceList,
    /// Unschedulable nodes are never chosen by a scheduler.
    pub unschedulable: bool,
    /// Unix timestamp (seconds) when the node was created.
    pub created_at: u64,
}

// ── Pod ───────────────────────────────────────────────────────────

/// Reference to the controller that owns a pod.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OwnerReference {
    pub kind: String,
    pub name: String,
    pub controller: bool,
}

/// A schedulable work unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PodSpec {
    pub namespace: String,
    pub name: String,
    pub labels: Labels,
    /// Resources requested by the pod.
    pub requests: ResourceList,
    pub owner: Option<OwnerReference>,
    /// Node labels that must all match for the pod to be placed.
    #[serde(default)]
    pub node_selector: Labels,
    /// Set when a scheduler binds the pod.
    pub node_name: Option<String>,
    /// Unix timestamp (seconds) when the pod was created.
    pub created_at: u64,
    /// Unix timestamp (seconds) when the pod was bound.
    pub bound_at: Option<u64>,
}

impl PodSpec {
    /// Build the composite key for the pods table.
    pub fn table_key(&self) -> String {
        pod_key(&self.namespace, &self.name)
    }

    /// Whether a scheduler has bound this pod to a node.
    pub fn is_scheduled(&self) -> bool {
        self.node_name.is_some()
    }
}

/// Composite key `{namespace}/{name}` for a pod.
pub fn pod_key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

// ── Selector ──────────────────────────────────────────────────────

/// Equality-based label selector. An empty selector matches everything.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LabelSelector {
    pub match_labels: Labels,
}

impl LabelSelector {
    /// Selector matching every object.
    pub fn everything() -> Self {
        Self::default()
    }

    /// Add a required `key=value` pair.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.match_labels.insert(key.into(), value.into());
        self
    }

    /// Selector for one pod group.
    pub fn group(label: &str) -> Self {
        Self::everything().with(GROUP_LABEL, label)
    }

    pub fn is_everything(&self) -> bool {
        self.match_labels.is_empty()
    }

    /// Whether every required pair is present in `labels`.
    pub fn matches(&self, labels: &Labels) -> bool {
        self.match_labels
            .iter()
            .all(|(k, v)| labels.get(k).is_some_and(|lv| lv == v))
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_everything() {
            return f.write_str("<everything>");
        }
        let pairs: Vec<String> = self
            .match_labels
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        f.write_str(&pairs.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn everything_matches_any_labels() {
        let sel = LabelSelector::everything();
        assert!(sel.matches(&Labels::new()));
        assert!(sel.matches(&labels(&[("group", "setup")])));
        assert_eq!(sel.to_string(), "<everything>");
    }

    #[test]
    fn selector_requires_all_pairs() {
        let sel = LabelSelector::group("measured").with("name", "rc2");
        assert!(sel.matches(&labels(&[("group", "measured"), ("name", "rc2"), ("x", "y")])));
        assert!(!sel.matches(&labels(&[("group", "measured")])));
        assert!(!sel.matches(&labels(&[("group", "setup"), ("name", "rc2")])));
        assert_eq!(sel.to_string(), "group=measured,name=rc2");
    }

    #[test]
    fn resource_fit_checks_every_dimension() {
        let node = ResourceList { cpu_millis: 1000, memory_bytes: 1024, pods: 2 };
        let req = ResourceList { cpu_millis: 500, memory_bytes: 512, pods: 1 };

        assert!(node.fits(&ResourceList::default(), &req));
        assert!(node.fits(&req, &req));
        let used = req.saturating_add(req);
        assert!(!node.fits(&used, &req));

        let pods_full = ResourceList { cpu_millis: 0, memory_bytes: 0, pods: 2 };
        assert!(!node.fits(&pods_full, &ResourceList { pods: 1, ..Default::default() }));
    }
}
