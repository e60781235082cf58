//! Node scoring for pod placement.
//!
//! Evaluates candidate nodes using a weighted combination of:
//! - **Least-allocated**: prefer nodes with the most free cpu and memory after placement
//! - **Balanced**: prefer nodes whose cpu and memory utilization stay close together
//!
//! Nodes that are unschedulable, miss a required label, or cannot fit the
//! pod's requests are filtered out before scoring.

use serde::{Deserialize, Serialize};

use schedperf_state::{Labels, NodeSpec, ResourceList};

/// Allocatable and requested resources for a single node.
#[derive(Debug, Clone)]
pub struct NodeResources {
    pub node_name: String,
    pub labels: Labels,
    pub allocatable: ResourceList,
    /// Sum of requests of pods already bound to this node.
    pub requested: ResourceList,
    pub unschedulable: bool,
}

impl NodeResources {
    /// Node with nothing bound to it yet.
    pub fn from_node(node: &NodeSpec) -> Self {
        Self {
            node_name: node.name.clone(),
            labels: node.labels.clone(),
            allocatable: node.allocatable,
            requested: ResourceList::default(),
            unschedulable: node.unschedulable,
        }
    }

    /// Account for a pod bound to this node.
    pub fn add_pod(&mut self, requests: &ResourceList) {
        self.requested = self.requested.saturating_add(*requests);
    }
}

/// Scored placement result for a single node.
#[derive(Debug, Clone)]
pub struct NodeScore {
    pub node_name: String,
    /// Total composite score (higher = better). Range: 0.0..=100.0.
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// Individual score components for debugging.
#[derive(Debug, Clone)]
pub struct ScoreBreakdown {
    pub least_allocated: f64,
    pub balanced: f64,
}

/// Weights for the scoring components.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoringWeights {
    pub least_allocated: f64,
    pub balanced: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            least_allocated: 0.7,
            balanced: 0.3,
        }
    }
}

/// Score a single node for a pod with the given requests and node selector.
pub fn score_node(
    node: &NodeResources,
    requests: &ResourceList,
    node_selector: &Labels,
    weights: &ScoringWeights,
) -> Option<NodeScore> {
    if node.unschedulable {
        return None;
    }

    for (key, value) in node_selector {
        match node.labels.get(key) {
            Some(v) if v == value => {}
            _ => return None,
        }
    }

    if !node.allocatable.fits(&node.requested, requests) {
        return None;
    }

    let cpu_frac = fraction(
        node.requested.cpu_millis.saturating_add(requests.cpu_millis),
        node.allocatable.cpu_millis,
    );
    let mem_frac = fraction(
        node.requested.memory_bytes.saturating_add(requests.memory_bytes),
        node.allocatable.memory_bytes,
    );

    let least_allocated = ((1.0 - cpu_frac) + (1.0 - mem_frac)) / 2.0 * 100.0;
    let balanced = (1.0 - (cpu_frac - mem_frac).abs()) * 100.0;

    let score = weights.least_allocated * least_allocated + weights.balanced * balanced;

    Some(NodeScore {
        node_name: node.node_name.clone(),
        score,
        breakdown: ScoreBreakdown {
            least_allocated,
            balanced,
        },
    })
}

/// Score all nodes and return the feasible ones sorted best first.
///
/// Ties are broken by node name so placement is deterministic.
pub fn rank_nodes(
    nodes: &[NodeResources],
    requests: &ResourceList,
    node_selector: &Labels,
    weights: &ScoringWeights,
) -> Vec<NodeScore> {
    let mut scores: Vec<NodeScore> = nodes
        .iter()
        .filter_map(|n| score_node(n, requests, node_selector, weights))
        .collect();

    scores.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.node_name.cmp(&b.node_name))
    });
    scores
}

/// Utilization fraction in `0.0..=1.0`; zero capacity counts as full.
fn fraction(used: u64, capacity: u64) -> f64 {
    if capacity == 0 {
        return 1.0;
    }
    (used as f64 / capacity as f64).min(1.0)
}
