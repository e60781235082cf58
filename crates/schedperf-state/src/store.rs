//! StateStore: redb-backed node and pod storage.
//!
//! Provides the CRUD, list, and bind operations the harness and the
//! scheduler-under-test need. All values are JSON-serialized into redb's
//! `&[u8]` value columns. The store supports both on-disk and in-memory
//! backends (the latter for tests and throwaway benchmark clusters).

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::{debug, trace};

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe object store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store.
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(NODES).map_err(map_err!(Table))?;
        txn.open_table(PODS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Nodes ──────────────────────────────────────────────────────

    /// Create a node. Fails with `AlreadyExists` if the name is taken.
    pub fn create_node(&self, node: &NodeSpec) -> StateResult<()> {
        let value = serde_json::to_vec(node).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(NODES).map_err(map_err!(Table))?;
            let exists = table
                .get(node.name.as_str())
                .map_err(map_err!(Read))?
                .is_some();
            if exists {
                return Err(StateError::AlreadyExists(format!("node {}", node.name)));
            }
            table
                .insert(node.name.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Get a node by name.
    pub fn get_node(&self, name: &str) -> StateResult<Option<NodeSpec>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(NODES).map_err(map_err!(Table))?;
        match table.get(name).map_err(map_err!(Read))? {
            Some(guard) => {
                let node: NodeSpec =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(node))
            }
            None => Ok(None),
        }
    }

    /// List all nodes.
    pub fn list_nodes(&self) -> StateResult<Vec<NodeSpec>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(NODES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let node: NodeSpec =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(node);
        }
        Ok(results)
    }

    /// Delete a node by name. Returns true if it existed.
    pub fn delete_node(&self, name: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(NODES).map_err(map_err!(Table))?;
            existed = table.remove(name).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        trace!(%name, existed, "node deleted");
        Ok(existed)
    }

    // ── Pods ───────────────────────────────────────────────────────

    /// Create a pod. Fails with `AlreadyExists` if the key is taken.
    pub fn create_pod(&self, pod: &PodSpec) -> StateResult<()> {
        let key = pod.table_key();
        let value = serde_json::to_vec(pod).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(PODS).map_err(map_err!(Table))?;
            let exists = table.get(key.as_str()).map_err(map_err!(Read))?.is_some();
            if exists {
                return Err(StateError::AlreadyExists(format!("pod {key}")));
            }
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Get a pod by its `{namespace}/{name}` key.
    pub fn get_pod(&self, key: &str) -> StateResult<Option<PodSpec>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(PODS).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let pod: PodSpec =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(pod))
            }
            None => Ok(None),
        }
    }

    /// List pods whose labels match `selector`.
    pub fn list_pods(&self, selector: &LabelSelector) -> StateResult<Vec<PodSpec>> {
        self.scan_pods(|pod| selector.matches(&pod.labels), usize::MAX)
    }

    /// List up to `limit` pods not yet bound to a node.
    pub fn list_pending_pods(&self, limit: usize) -> StateResult<Vec<PodSpec>> {
        self.scan_pods(|pod| !pod.is_scheduled(), limit)
    }

    /// List pods matching `selector` that are bound to a node.
    pub fn list_scheduled_pods(&self, selector: &LabelSelector) -> StateResult<Vec<PodSpec>> {
        self.scan_pods(
            |pod| pod.is_scheduled() && selector.matches(&pod.labels),
            usize::MAX,
        )
    }

    /// Count pods matching `selector` that are bound to a node.
    pub fn count_scheduled_pods(&self, selector: &LabelSelector) -> StateResult<usize> {
        Ok(self.list_scheduled_pods(selector)?.len())
    }

    /// Bind a pending pod to a node.
    ///
    /// Fails with `NotFound` if the pod does not exist and `Conflict` if it is
    /// already bound.
    pub fn bind_pod(&self, key: &str, node_name: &str) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(PODS).map_err(map_err!(Table))?;
            let mut pod: PodSpec = match table.get(key).map_err(map_err!(Read))? {
                Some(guard) => {
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?
                }
                None => return Err(StateError::NotFound(format!("pod {key}"))),
            };
            if let Some(existing) = &pod.node_name {
                return Err(StateError::Conflict(format!(
                    "pod {key} already bound to {existing}"
                )));
            }
            pod.node_name = Some(node_name.to_string());
            pod.bound_at = Some(epoch_secs());
            let value = serde_json::to_vec(&pod).map_err(map_err!(Serialize))?;
            table
                .insert(key, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Delete a pod by key. Returns true if it existed.
    pub fn delete_pod(&self, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(PODS).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }

    /// Delete all pods matching `selector`. Returns number deleted.
    pub fn delete_pods(&self, selector: &LabelSelector) -> StateResult<u32> {
        let keys: Vec<String> = self
            .list_pods(selector)?
            .iter()
            .map(PodSpec::table_key)
            .collect();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let count = keys.len() as u32;
        {
            let mut table = txn.open_table(PODS).map_err(map_err!(Table))?;
            for key in &keys {
                table.remove(key.as_str()).map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%selector, count, "pods deleted");
        Ok(count)
    }

    /// Scan the pods table, keeping up to `limit` pods accepted by `keep`.
    fn scan_pods(
        &self,
        keep: impl Fn(&PodSpec) -> bool,
        limit: usize,
    ) -> StateResult<Vec<PodSpec>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(PODS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            if results.len() >= limit {
                break;
            }
            let (_, value) = entry.map_err(map_err!(Read))?;
            let pod: PodSpec =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if keep(&pod) {
                results.push(pod);
            }
        }
        Ok(results)
    }
}

/// Current Unix epoch in seconds.
fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
