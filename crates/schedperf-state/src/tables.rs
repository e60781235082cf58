//! redb table definitions for the schedperf object store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized objects).

use redb::TableDefinition;

/// Node objects keyed by `{name}`.
pub const NODES: TableDefinition<&str, &[u8]> = TableDefinition::new("nodes");

/// Pod objects keyed by `{namespace}/{name}`.
pub const PODS: TableDefinition<&str, &[u8]> = TableDefinition::new("pods");
