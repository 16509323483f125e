//! Storage backend trait and backend selection.
//!
//! This module defines the persistence seam for the settings tree:
//! - `MemoryBackend` - In-process storage (default for tests and embedding)
//! - `JsonlBackend` - JSONL files under a data directory (backs the CLI)

use crate::Result;
use crate::models::{HistoryEntry, SettingNode};

/// Trait for storage backends that persist settings nodes and their audit
/// trail.
///
/// The backend is a dumb CRUD surface: it holds no business semantics, does
/// not sort, and does not notify. Ordering and change notification live in
/// the `NodeStore` wrapper.
pub trait StoreBackend: Send + Sync {
    /// Read a node by id. Absence is `Ok(None)`.
    fn read_node(&self, id: &str) -> Result<Option<SettingNode>>;

    /// Read all direct children of the given parent (`None` for roots),
    /// in arbitrary order.
    fn read_children(&self, parent: Option<&str>) -> Result<Vec<SettingNode>>;

    /// Read all nodes whose `assigned_targets` contains `target_id`,
    /// regardless of tree position, in arbitrary order.
    fn read_by_target(&self, target_id: &str) -> Result<Vec<SettingNode>>;

    /// Create or replace a node.
    fn write_node(&mut self, node: &SettingNode) -> Result<()>;

    /// Delete a node by id. Deleting a missing id is a no-op.
    fn delete_node(&mut self, id: &str) -> Result<()>;

    /// Append an audit record.
    fn append_history(&mut self, entry: &HistoryEntry) -> Result<()>;

    /// Read the full audit trail, oldest first.
    fn read_history(&self) -> Result<Vec<HistoryEntry>>;

    /// Get the storage location description (for display purposes).
    fn location(&self) -> String;

    /// Get the backend type.
    fn backend_type(&self) -> BackendType;
}

/// Available storage backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// In-process storage, lost on exit
    Memory,
    /// JSONL files under a data directory
    Jsonl,
}

impl BackendType {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Jsonl => "jsonl",
        }
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
