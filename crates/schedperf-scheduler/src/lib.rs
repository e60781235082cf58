//! schedperf-scheduler: reference scheduler-under-test.
//!
//! A small in-process scheduler that watches the object store for pending
//! pods and binds each to the best feasible node. It exists so the harness
//! can run end to end without an external scheduler; the harness never
//! calls it directly and observes it only through pod bindings.
//!
//! # Architecture
//!
//! ```text
//! Scheduler::run (tokio task)
//!   └── schedule_once (per cycle)
//!       ├── StateStore::list_pending_pods (up to batch_size)
//!       ├── node usage from nodes + bound pods
//!       ├── scorer::rank_nodes (filter + least-allocated/balanced score)
//!       └── StateStore::bind_pod
//! ```

pub mod error;
pub mod scheduler;
pub mod scorer;

pub use error::{SchedulerError, SchedulerResult};
pub use scheduler::{Scheduler, SchedulerConfig};
pub use scorer::{NodeResources, NodeScore, ScoringWeights, rank_nodes, score_node};
