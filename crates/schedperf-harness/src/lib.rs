//! schedperf-harness: scheduler throughput benchmarking harness.
//!
//! Measures how quickly a scheduler-under-test binds pending pods to nodes
//! under a controlled load shape. The harness never talks to the scheduler:
//! it creates objects through a [`ControlPlane`] and polls the number of
//! bound pods until a target is reached.
//!
//! # Components
//!
//! - **`strategy`**: node and pod object factories
//! - **`nodes`**: `NodePreparer`, node batches with scoped cleanup
//! - **`pods`**: `PodInjector`, labeled pod groups
//! - **`poller`**: `CompletionPoller`, deadline-bounded waits with retry
//! - **`driver`**: `BenchmarkDriver`, the sequential case matrix
//! - **`config`**: `BenchConfig`, TOML configuration
//!
//! # Case flow
//!
//! ```text
//! acquire env → prepare nodes → create "setup" pods → warm-up wait
//!   → reset timer → create "measured" pods → measured wait → record
//!   → cleanup pods/nodes → teardown env
//! ```

pub mod config;
pub mod control_plane;
pub mod driver;
pub mod error;
pub mod nodes;
pub mod pods;
pub mod poller;
pub mod strategy;

#[cfg(test)]
mod testing;

pub use config::{BenchConfig, PhaseConfig, RetryConfig, StrategyConfig, parse_duration};
pub use control_plane::ControlPlane;
pub use driver::{
    BenchmarkCase, BenchmarkDriver, CaseFailure, CasePhase, CaseReport, CaseTiming,
    DriverSettings, Environment, EnvironmentFactory, MEASURED_GROUP, SETUP_GROUP,
};
pub use error::{HarnessError, HarnessResult, ObjectKind};
pub use nodes::{CleanupReport, NodePreparer};
pub use pods::PodInjector;
pub use poller::{CompletionPoller, PollPolicy, RetryPolicy, ScheduledSnapshot, WaitStats};
pub use strategy::{NodeStrategy, ObjectStrategy, PodStrategy};
