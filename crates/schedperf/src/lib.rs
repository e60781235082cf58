//! schedperf: scheduler throughput benchmark runner.
//!
//! Wires the harness to a local cluster: every case runs against a fresh
//! embedded store with the reference scheduler binding pods in a background
//! task. The `schedperf` binary adds the CLI, logging, and Ctrl-C handling.

pub mod config;
pub mod local;
pub mod report;

pub use config::{FileConfig, SchedulerSection};
pub use local::{LocalCluster, LocalClusterFactory};
pub use report::{CaseRecord, OutputFormat, render, render_json_lines, render_text};
