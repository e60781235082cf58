//! schedperf-state: embedded control plane for the scheduler benchmark.
//!
//! Backed by [redb](https://docs.rs/redb), stores the node and pod objects
//! that the harness creates and the scheduler-under-test binds.
//!
//! # Architecture
//!
//! All objects are JSON-serialized into redb's `&[u8]` value columns.
//! Pods use the composite key `{namespace}/{name}`; nodes are keyed by name.
//! Listing is a full table scan filtered by a [`LabelSelector`], evaluated
//! against committed data at query time.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared between the harness and a scheduler task.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
