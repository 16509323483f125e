//! JSONL file storage backend.
//!
//! Layout under the data directory:
//! - `nodes.jsonl` - one node per line, rewritten on every mutation
//! - `history.jsonl` - append-only audit trail
//!
//! Node files are small (settings trees are admin-curated), so a full
//! rewrite on mutation is cheaper than maintaining an index.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::models::{HistoryEntry, SettingNode};
use crate::store::backend::{BackendType, StoreBackend};
use crate::{Error, Result};

const NODES_FILE: &str = "nodes.jsonl";
const HISTORY_FILE: &str = "history.jsonl";

/// File-backed storage for the `fst` CLI.
pub struct JsonlBackend {
    root: PathBuf,
    nodes: HashMap<String, SettingNode>,
}

impl JsonlBackend {
    /// Initialize storage under `root`, creating the directory and empty
    /// files if needed.
    pub fn init(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;
        for file in [NODES_FILE, HISTORY_FILE] {
            let path = root.join(file);
            if !path.exists() {
                File::create(&path)?;
            }
        }
        Self::open(root)
    }

    /// Open existing storage under `root`.
    pub fn open(root: &Path) -> Result<Self> {
        if !root.join(NODES_FILE).exists() {
            return Err(Error::NotInitialized);
        }
        let nodes = read_nodes(&root.join(NODES_FILE))?;
        Ok(Self {
            root: root.to_path_buf(),
            nodes,
        })
    }

    /// Check if storage exists under `root`.
    pub fn exists(root: &Path) -> bool {
        root.join(NODES_FILE).exists()
    }

    fn rewrite_nodes(&self) -> Result<()> {
        let path = self.root.join(NODES_FILE);
        let tmp = self.root.join(format!("{}.tmp", NODES_FILE));
        {
            let mut file = File::create(&tmp)?;
            let mut nodes: Vec<_> = self.nodes.values().collect();
            nodes.sort_by(|a, b| a.id.cmp(&b.id));
            for node in nodes {
                writeln!(file, "{}", serde_json::to_string(node)?)?;
            }
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

fn read_nodes(path: &Path) -> Result<HashMap<String, SettingNode>> {
    let file = File::open(path)?;
    let mut nodes = HashMap::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let node: SettingNode = serde_json::from_str(&line)?;
        nodes.insert(node.id.clone(), node);
    }
    Ok(nodes)
}

impl StoreBackend for JsonlBackend {
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
        self.rewrite_nodes()
    }

    fn delete_node(&mut self, id: &str) -> Result<()> {
        if self.nodes.remove(id).is_some() {
            self.rewrite_nodes()?;
        }
        Ok(())
    }

    fn append_history(&mut self, entry: &HistoryEntry) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(self.root.join(HISTORY_FILE))?;
        writeln!(file, "{}", serde_json::to_string(entry)?)?;
        Ok(())
    }

    fn read_history(&self) -> Result<Vec<HistoryEntry>> {
        let path = self.root.join(HISTORY_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(path)?;
        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line)?);
        }
        Ok(entries)
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Jsonl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HistoryAction, SettingNode};
    use tempfile::TempDir;

    #[test]
    fn test_init_and_reopen_round_trip() {
        let dir = TempDir::new().unwrap();
        {
            let mut backend = JsonlBackend::init(dir.path()).unwrap();
            backend
                .write_node(&SettingNode::category("root", "Root", None))
                .unwrap();
            backend
                .write_node(&SettingNode::category("child", "Child", Some("root")))
                .unwrap();
        }

        let backend = JsonlBackend::open(dir.path()).unwrap();
        assert!(backend.read_node("root").unwrap().is_some());
        let children = backend.read_children(Some("root")).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, "child");
    }

    #[test]
    fn test_open_uninitialized_fails() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            JsonlBackend::open(dir.path()),
            Err(Error::NotInitialized)
        ));
    }

    #[test]
    fn test_delete_persists() {
        let dir = TempDir::new().unwrap();
        let mut backend = JsonlBackend::init(dir.path()).unwrap();
        backend
            .write_node(&SettingNode::category("a", "A", None))
            .unwrap();
        backend.delete_node("a").unwrap();

        let backend = JsonlBackend::open(dir.path()).unwrap();
        assert!(backend.read_node("a").unwrap().is_none());
    }

    #[test]
    fn test_history_appends_across_reopens() {
        let dir = TempDir::new().unwrap();
        let node = SettingNode::category("a", "A", None);
        {
            let mut backend = JsonlBackend::init(dir.path()).unwrap();
            let entry = HistoryEntry::record(
                HistoryAction::Create,
                None,
                Some(node.clone()),
                Some("admin"),
            );
            backend.append_history(&entry).unwrap();
        }
        {
            let mut backend = JsonlBackend::open(dir.path()).unwrap();
            let entry =
                HistoryEntry::record(HistoryAction::Delete, Some(node), None, Some("admin"));
            backend.append_history(&entry).unwrap();

            let history = backend.read_history().unwrap();
            assert_eq!(history.len(), 2);
            assert_eq!(history[0].action, HistoryAction::Create);
            assert_eq!(history[1].action, HistoryAction::Delete);
        }
    }
}
