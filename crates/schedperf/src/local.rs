//! Local cluster environments.
//!
//! Each benchmark case gets its own store and its own reference scheduler
//! task, so nothing leaks between cases. With a data directory the store is
//! a redb file that is removed again at teardown; otherwise it lives in
//! memory.

use std::path::PathBuf;

use anyhow::Context;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use schedperf_harness::{BenchmarkCase, Environment, EnvironmentFactory};
use schedperf_scheduler::{Scheduler, SchedulerConfig};
use schedperf_state::StateStore;

/// A store plus the scheduler binding pods in it.
pub struct LocalCluster {
    store: StateStore,
    shutdown: watch::Sender<bool>,
    scheduler: JoinHandle<u64>,
    db_path: Option<PathBuf>,
}

impl LocalCluster {
    /// Start a scheduler task over `store`.
    pub fn start(store: StateStore, config: SchedulerConfig, db_path: Option<PathBuf>) -> Self {
        let (shutdown, rx) = watch::channel(false);
        let scheduler = Scheduler::new(store.clone(), config);
        let scheduler = tokio::spawn(scheduler.run(rx));
        Self {
            store,
            shutdown,
            scheduler,
            db_path,
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }
}

impl Environment for LocalCluster {
    type Plane = StateStore;

    fn control_plane(&self) -> &StateStore {
        &self.store
    }

    async fn teardown(self) {
        let _ = self.shutdown.send(true);
        match self.scheduler.await {
            Ok(bound) => debug!(bound, "scheduler stopped"),
            Err(e) => warn!(error = %e, "scheduler task failed"),
        }

        drop(self.store);
        if let Some(path) = self.db_path {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(path = ?path, "store file removed"),
                Err(e) => warn!(path = ?path, error = %e, "failed to remove store file"),
            }
        }
    }
}

/// Hands out a fresh [`LocalCluster`] per case.
pub struct LocalClusterFactory {
    data_dir: Option<PathBuf>,
    scheduler: SchedulerConfig,
    acquired: usize,
}

impl LocalClusterFactory {
    /// In-memory stores when `data_dir` is `None`.
    pub fn new(data_dir: Option<PathBuf>, scheduler: SchedulerConfig) -> Self {
        Self {
            data_dir,
            scheduler,
            acquired: 0,
        }
    }

    /// Number of environments handed out so far.
    pub fn acquired(&self) -> usize {
        self.acquired
    }
}

impl EnvironmentFactory for LocalClusterFactory {
    type Env = LocalCluster;

    async fn acquire(&mut self, case: &BenchmarkCase) -> anyhow::Result<LocalCluster> {
        let index = self.acquired;
        self.acquired += 1;

        let (store, db_path) = match &self.data_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
                let path = dir.join(format!("case-{index}.redb"));
                if path.exists() {
                    std::fs::remove_file(&path)
                        .with_context(|| format!("failed to remove stale {}", path.display()))?;
                }
                let store = StateStore::open(&path)
                    .with_context(|| format!("failed to open store at {}", path.display()))?;
                (store, Some(path))
            }
            None => (StateStore::open_in_memory()?, None),
        };

        info!(
            case = %case.name(),
            index,
            path = ?db_path,
            "local cluster starting"
        );
        Ok(LocalCluster::start(store, self.scheduler.clone(), db_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schedperf_state::{LabelSelector, NodeSpec, PodSpec, ResourceList};
    use std::time::Duration;

    fn node(name: &str) -> NodeSpec {
        NodeSpec {
            name: name.to_string(),
            labels: Default::default(),
            allocatable: ResourceList {
                cpu_millis: 1000,
                memory_bytes: 1 << 30,
                pods: 10,
            },
            unschedulable: false,
            created_at: 0,
        }
    }

    fn pod(name: &str) -> PodSpec {
        PodSpec {
            namespace: "default".to_string(),
            name: name.to_string(),
            labels: Default::default(),
            requests: ResourceList {
                cpu_millis: 100,
                memory_bytes: 1 << 20,
                pods: 1,
            },
            owner: None,
            node_selector: Default::default(),
            node_name: None,
            created_at: 0,
            bound_at: None,
        }
    }

    async fn wait_for_binding(store: &StateStore, want: usize) {
        for _ in 0..200 {
            if store.count_scheduled_pods(&LabelSelector::everything()).unwrap() >= want {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("pods were not bound");
    }

    #[tokio::test]
    async fn in_memory_cluster_schedules_pods() {
        let mut factory = LocalClusterFactory::new(None, SchedulerConfig::default());
        let cluster = factory.acquire(&BenchmarkCase::new(1, 0, 1)).await.unwrap();

        cluster.store().create_node(&node("n1")).unwrap();
        cluster.store().create_pod(&pod("p1")).unwrap();
        wait_for_binding(cluster.store(), 1).await;

        let bound = cluster.store().get_pod("default/p1").unwrap().unwrap();
        assert_eq!(bound.node_name.as_deref(), Some("n1"));
        cluster.teardown().await;
        assert_eq!(factory.acquired(), 1);
    }

    #[tokio::test]
    async fn on_disk_store_is_removed_at_teardown() {
        let dir = tempfile::tempdir().unwrap();
        let mut factory =
            LocalClusterFactory::new(Some(dir.path().to_path_buf()), SchedulerConfig::default());

        let cluster = factory.acquire(&BenchmarkCase::new(1, 0, 1)).await.unwrap();
        let path = dir.path().join("case-0.redb");
        assert!(path.exists());

        cluster.teardown().await;
        assert!(!path.exists());

        let second = factory.acquire(&BenchmarkCase::new(1, 0, 1)).await.unwrap();
        assert!(dir.path().join("case-1.redb").exists());
        assert!(second.store().list_nodes().unwrap().is_empty());
        second.teardown().await;
    }
}
