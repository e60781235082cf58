//! Object construction strategies.
//!
//! A strategy turns an index into a node or pod object. Strategies are pure:
//! the same index always yields the same object, and the preparer/injector
//! that calls them stamps names, group labels, and timestamps afterwards.

use serde::{Deserialize, Serialize};

use schedperf_state::{Labels, NodeSpec, OwnerReference, PodSpec, ResourceList};

/// Allocatable resources of a trivial node.
pub const DEFAULT_NODE_ALLOCATABLE: ResourceList = ResourceList {
    cpu_millis: 4000,
    memory_bytes: 32 * 1024 * 1024 * 1024,
    pods: 110,
};

/// Requests of a strategy-built pod.
pub const DEFAULT_POD_REQUESTS: ResourceList = ResourceList {
    cpu_millis: 100,
    memory_bytes: 500 * 1024 * 1024,
    pods: 1,
};

/// Node label carrying the node's own name.
pub const HOSTNAME_LABEL: &str = "kubernetes.io/hostname";

/// Builds one object from an index.
pub trait ObjectStrategy {
    type Object;

    fn build(&self, index: usize) -> Self::Object;
}

/// How synthetic nodes look.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeStrategy {
    /// Bare node with default allocatable resources.
    #[default]
    Trivial,
    /// Trivial node carrying one extra label.
    Labeled { key: String, value: String },
}

impl ObjectStrategy for NodeStrategy {
    type Object = NodeSpec;

    fn build(&self, index: usize) -> NodeSpec {
        let mut labels = Labels::new();
        labels.insert(HOSTNAME_LABEL.to_string(), format!("node-{index}"));
        if let NodeStrategy::Labeled { key, value } = self {
            labels.insert(key.clone(), value.clone());
        }
        NodeSpec {
            name: format!("node-{index}"),
            labels,
            allocatable: DEFAULT_NODE_ALLOCATABLE,
            unschedulable: false,
            created_at: 0,
        }
    }
}

/// How synthetic pods look.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PodStrategy {
    /// Standalone pod with default requests.
    Bare,
    /// Pod owned by a replication controller, labeled `name=<controller>`.
    ControllerOwned { controller: String },
}

impl PodStrategy {
    pub fn controller_owned(controller: impl Into<String>) -> Self {
        PodStrategy::ControllerOwned {
            controller: controller.into(),
        }
    }
}

impl ObjectStrategy for PodStrategy {
    type Object = PodSpec;

    fn build(&self, index: usize) -> PodSpec {
        let mut pod = PodSpec {
            namespace: String::new(),
            name: format!("pod-{index}"),
            labels: Labels::new(),
            requests: DEFAULT_POD_REQUESTS,
            owner: None,
            node_selector: Labels::new(),
            node_name: None,
            created_at: 0,
            bound_at: None,
        };
        if let PodStrategy::ControllerOwned { controller } = self {
            pod.labels.insert("name".to_string(), controller.clone());
            pod.owner = Some(OwnerReference {
                kind: "ReplicationController".to_string(),
                name: controller.clone(),
                controller: true,
            });
        }
        pod
    }
}
