//! Fault-injecting control plane for unit tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use crate::control_plane::ControlPlane;
use schedperf_state::{LabelSelector, NodeSpec, PodSpec, StateError, StateResult, StateStore};

/// Wraps a store and fails selected calls on demand.
pub(crate) struct FaultyPlane {
    pub inner: StateStore,
    /// Node creations allowed before every further one fails.
    pub node_budget: Cell<Option<usize>>,
    /// Pod creations allowed before every further one fails.
    pub pod_budget: Cell<Option<usize>>,
    /// Number of upcoming count queries that fail.
    pub query_failures: Cell<u32>,
    /// Counts returned instead of the real one, one per query, in order.
    pub scripted_counts: RefCell<VecDeque<usize>>,
    /// Every count returned, in order.
    pub observed: RefCell<Vec<usize>>,
}

impl FaultyPlane {
    pub fn new() -> Self {
        Self {
            inner: StateStore::open_in_memory().unwrap(),
            node_budget: Cell::new(None),
            pod_budget: Cell::new(None),
            query_failures: Cell::new(0),
            scripted_counts: RefCell::new(VecDeque::new()),
            observed: RefCell::new(Vec::new()),
        }
    }

    fn spend(budget: &Cell<Option<usize>>) -> StateResult<()> {
        match budget.get() {
            Some(0) => Err(StateError::Write("injected creation failure".to_string())),
            Some(n) => {
                budget.set(Some(n - 1));
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl ControlPlane for FaultyPlane {
    fn create_node(&self, node: &NodeSpec) -> StateResult<()> {
        Self::spend(&self.node_budget)?;
        self.inner.create_node(node)
    }

    fn delete_node(&self, name: &str) -> StateResult<bool> {
        self.inner.delete_node(name)
    }

    fn create_pod(&self, pod: &PodSpec) -> StateResult<()> {
        Self::spend(&self.pod_budget)?;
        self.inner.create_pod(pod)
    }

    fn delete_pod(&self, key: &str) -> StateResult<bool> {
        self.inner.delete_pod(key)
    }

    fn count_scheduled_pods(&self, selector: &LabelSelector) -> StateResult<usize> {
        let failures = self.query_failures.get();
        if failures > 0 {
            self.query_failures.set(failures - 1);
            return Err(StateError::Read("injected query failure".to_string()));
        }
        let scripted = self.scripted_counts.borrow_mut().pop_front();
        let count = match scripted {
            Some(count) => count,
            None => self.inner.count_scheduled_pods(selector)?,
        };
        self.observed.borrow_mut().push(count);
        Ok(count)
    }
}
