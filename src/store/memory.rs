//! In-process storage backend.

use std::collections::HashMap;

use crate::Result;
use crate::models::{HistoryEntry, SettingNode};
use crate::store::backend::{BackendType, StoreBackend};

/// HashMap-backed storage. The default for tests and for embedding the
/// engine behind an application-owned persistence layer.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    nodes: HashMap<String, SettingNode>,
    history: Vec<HistoryEntry>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreBackend for MemoryBackend {
    fn read_node(&self, id: &str) -> Result<Option<SettingNode>> {
        Ok(self.nodes.get(id).cloned())
    }

    fn read_children(&self, parent: Option<&str>) -> Result<Vec<SettingNode>> {
        Ok(self
            .nodes
            .values()
            .filter(|n| n.parent.as_deref() == parent)
            .cloned()
            .collect())
    }

    fn read_by_target(&self, target_id: &str) -> Result<Vec<SettingNode>> {
        Ok(self
            .nodes
            .values()
            .filter(|n| n.assigned_targets.iter().any(|t| t == target_id))
            .cloned()
            .collect())
    }

    fn write_node(&mut self, node: &SettingNode) -> Result<()> {
        self.nodes.insert(node.id.clone(), node.clone());
        Ok(())
    }

    fn delete_node(&mut self, id: &str) -> Result<()> {
        self.nodes.remove(id);
        Ok(())
    }

    fn append_history(&mut self, entry: &HistoryEntry) -> Result<()> {
        self.history.push(entry.clone());
        Ok(())
    }

    fn read_history(&self) -> Result<Vec<HistoryEntry>> {
        Ok(self.history.clone())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Memory
    }
}
