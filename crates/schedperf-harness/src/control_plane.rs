//! The control-plane seam.
//!
//! The harness only needs create/delete for nodes and pods and a count of
//! bound pods matching a selector. Anything that can answer those (the
//! embedded store, a remote API client, a fault-injecting wrapper in tests)
//! can host a benchmark.

use schedperf_state::{LabelSelector, NodeSpec, PodSpec, StateResult, StateStore};

/// Object CRUD and listing used by the harness.
///
/// Listing carries no staleness guarantee beyond "committed at query time".
pub trait ControlPlane {
    fn create_node(&self, node: &NodeSpec) -> StateResult<()>;

    /// Returns true if the node existed.
    fn delete_node(&self, name: &str) -> StateResult<bool>;

    fn create_pod(&self, pod: &PodSpec) -> StateResult<()>;

    /// Delete by `{namespace}/{name}` key. Returns true if the pod existed.
    fn delete_pod(&self, key: &str) -> StateResult<bool>;

    /// Number of pods matching `selector` currently bound to a node.
    fn count_scheduled_pods(&self, selector: &LabelSelector) -> StateResult<usize>;
}

impl ControlPlane for StateStore {
    fn create_node(&self, node: &NodeSpec) -> StateResult<()> {
        StateStore::create_node(self, node)
    }

    fn delete_node(&self, name: &str) -> StateResult<bool> {
        StateStore::delete_node(self, name)
    }

    fn create_pod(&self, pod: &PodSpec) -> StateResult<()> {
        StateStore::create_pod(self, pod)
    }

    fn delete_pod(&self, key: &str) -> StateResult<bool> {
        StateStore::delete_pod(self, key)
    }

    fn count_scheduled_pods(&self, selector: &LabelSelector) -> StateResult<usize> {
        StateStore::count_scheduled_pods(self, selector)
    }
}

impl<T: ControlPlane + ?Sized> ControlPlane for &T {
    fn create_node(&self, node: &NodeSpec) -> StateResult<()> {
        (**self).create_node(node)
    }

    fn delete_node(&self, name: &str) -> StateResult<bool> {
        (**self).delete_node(name)
    }

    fn create_pod(&self, pod: &PodSpec) -> StateResult<()> {
        (**self).create_pod(pod)
    }

    fn delete_pod(&self, key: &str) -> StateResult<bool> {
        (**self).delete_pod(key)
    }

    fn count_scheduled_pods(&self, selector: &LabelSelector) -> StateResult<usize> {
        (**self).count_scheduled_pods(selector)
    }
}
