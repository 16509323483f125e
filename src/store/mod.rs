//! Node store for the settings tree.
//!
//! The `NodeStore` wraps a `StoreBackend` with the engine's semantics:
//! structural validation, canonical `(order, name)` ordering, audit history,
//! and per-parent / per-target change notification. It is the single shared
//! mutable resource; the resolver, binding index, and subscription bus are
//! all constructed over an explicit `Arc<NodeStore>` handle.

pub mod backend;
pub mod jsonl;
pub mod memory;

pub use backend::{BackendType, StoreBackend};
pub use jsonl::JsonlBackend;
pub use memory::MemoryBackend;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{
    HistoryAction, HistoryEntry, MAX_DEPTH, NodePayload, SettingNode, sort_siblings,
};
use crate::{Error, Result};

type WatchCallback = Arc<dyn Fn() + Send + Sync>;

/// Registry of live change watchers.
///
/// Callbacks are invoked synchronously after a mutation commits, outside
/// the registry locks; they are expected to be cheap (typically a channel
/// send into a subscription task).
#[derive(Default)]
pub(crate) struct ChangeNotifier {
    next_id: AtomicU64,
    children: Mutex<HashMap<u64, (Option<String>, WatchCallback)>>,
    targets: Mutex<HashMap<u64, (String, WatchCallback)>>,
}

impl ChangeNotifier {
    fn watch_children(&self, parent: Option<String>, cb: WatchCallback) -> u64 {
        let id = self.next_id.fetch_add(1, AtomicOrdering::Relaxed);
        self.children.lock().insert(id, (parent, cb));
        id
    }

    fn watch_target(&self, target_id: String, cb: WatchCallback) -> u64 {
        let id = self.next_id.fetch_add(1, AtomicOrdering::Relaxed);
        self.targets.lock().insert(id, (target_id, cb));
        id
    }

    fn unwatch_children(&self, id: u64) {
        self.children.lock().remove(&id);
    }

    fn unwatch_target(&self, id: u64) {
        self.targets.lock().remove(&id);
    }

    /// Fire callbacks for every affected parent and target, deduplicated.
    fn notify(&self, parents: &BTreeSet<Option<String>>, targets: &BTreeSet<String>) {
        let mut callbacks: Vec<WatchCallback> = Vec::new();
        {
            let children = self.children.lock();
            for (parent, cb) in children.values() {
                if parents.contains(parent) {
                    callbacks.push(cb.clone());
                }
            }
        }
        {
            let watched = self.targets.lock();
            for (target, cb) in watched.values() {
                if targets.contains(target) {
                    callbacks.push(cb.clone());
                }
            }
        }
        for cb in callbacks {
            cb();
        }
    }
}

/// Which registry a `WatchHandle` belongs to.
#[derive(Debug, Clone, Copy)]
enum WatchKind {
    Children,
    Target,
}

/// Handle to a registered change watcher.
///
/// Deregisters on `stop()` or drop; both are idempotent. No callback is
/// invoked after deregistration returns.
pub struct WatchHandle {
    id: u64,
    kind: WatchKind,
    notifier: Arc<ChangeNotifier>,
}

impl WatchHandle {
    /// Stop watching. Idempotent.
    pub fn stop(&self) {
        match self.kind {
            WatchKind::Children => self.notifier.unwatch_children(self.id),
            WatchKind::Target => self.notifier.unwatch_target(self.id),
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Storage manager for one settings tree.
pub struct NodeStore {
    backend: RwLock<Box<dyn StoreBackend>>,
    notifier: Arc<ChangeNotifier>,
}

impl NodeStore {
    /// Wrap an arbitrary backend.
    pub fn new(backend: Box<dyn StoreBackend>) -> Arc<Self> {
        Arc::new(Self {
            backend: RwLock::new(backend),
            notifier: Arc::new(ChangeNotifier::default()),
        })
    }

    /// An empty in-memory store.
    pub fn in_memory() -> Arc<Self> {
        Self::new(Box::new(MemoryBackend::new()))
    }

    /// Initialize JSONL storage under `root` and wrap it.
    pub fn init_jsonl(root: &Path) -> Result<Arc<Self>> {
        Ok(Self::new(Box::new(JsonlBackend::init(root)?)))
    }

    /// Open existing JSONL storage under `root` and wrap it.
    pub fn open_jsonl(root: &Path) -> Result<Arc<Self>> {
        Ok(Self::new(Box::new(JsonlBackend::open(root)?)))
    }

    /// Storage location description.
    pub fn location(&self) -> String {
        self.backend.read().location()
    }

    /// Backend type.
    pub fn backend_type(&self) -> BackendType {
        self.backend.read().backend_type()
    }

    /// Read a node by id. Absence is `Ok(None)`, never an error.
    pub async fn get(&self, id: &str) -> Result<Option<SettingNode>> {
        self.backend.read().read_node(id)
    }

    /// Read the direct children of `parent` (`None` for roots), in
    /// canonical `(order, name)` order.
    pub async fn get_children(&self, parent: Option<&str>) -> Result<Vec<SettingNode>> {
        let mut children = self.backend.read().read_children(parent)?;
        sort_siblings(&mut children);
        Ok(children)
    }

    /// All nodes bound to `target_id`, regardless of tree position.
    ///
    /// Set semantics; callers that need ordering sort the result.
    pub async fn find_by_target(&self, target_id: &str) -> Result<Vec<SettingNode>> {
        self.backend.read().read_by_target(target_id)
    }

    /// Create or update a node.
    ///
    /// Validates structure (parent exists, parent relation stays acyclic
    /// within the depth bound, value matches its declared type), stamps
    /// audit fields, recomputes the informational path, writes, appends a
    /// history entry, and notifies watchers. Structural violations are
    /// rejected before any notification is emitted.
    pub async fn put(&self, mut node: SettingNode, actor: Option<&str>) -> Result<SettingNode> {
        if node.id.is_empty() {
            return Err(Error::InvalidInput("node id must not be empty".to_string()));
        }
        if let NodePayload::Variable {
            value_type,
            value: Some(value),
        } = &node.payload
        {
            if !value.matches(*value_type) {
                return Err(Error::InvalidInput(format!(
                    "value does not match declared type {} for node {}",
                    value_type, node.id
                )));
            }
        }

        let now = Utc::now();
        let (before, parent_path) = {
            let backend = self.backend.read();
            let before = backend.read_node(&node.id)?;
            let parent_path = match node.parent.as_deref() {
                Some(parent_id) => {
                    let parent = backend
                        .read_node(parent_id)?
                        .ok_or_else(|| Error::ParentNotFound(parent_id.to_string()))?;
                    ancestry_check(&**backend, &node.id, &parent)?;
                    Some(parent.path)
                }
                None => None,
            };
            (before, parent_path)
        };

        match &before {
            Some(b) => {
                node.created_at = b.created_at;
                node.created_by = b.created_by.clone();
            }
            None => {
                node.created_at = now;
                node.created_by = actor.map(|a| a.to_string());
            }
        }
        node.updated_at = now;
        node.updated_by = actor.map(|a| a.to_string());
        node.path = match &parent_path {
            Some(p) => format!("{}.{}", p, node.name),
            None => node.name.clone(),
        };

        let action = match &before {
            None => HistoryAction::Create,
            Some(b) if b.parent != node.parent => HistoryAction::Move,
            Some(_) => HistoryAction::Update,
        };

        {
            let mut backend = self.backend.write();
            backend.write_node(&node)?;
            backend.append_history(&HistoryEntry::record(
                action,
                before.clone(),
                Some(node.clone()),
                actor,
            ))?;
        }

        let mut parents = BTreeSet::new();
        parents.insert(node.parent.clone());
        let mut targets: BTreeSet<String> = node.assigned_targets.iter().cloned().collect();
        if let Some(b) = &before {
            parents.insert(b.parent.clone());
            targets.extend(b.assigned_targets.iter().cloned());
        }
        self.notifier.notify(&parents, &targets);

        Ok(node)
    }

    /// Delete a node and all of its descendants.
    ///
    /// One history entry per removed node; watcher notification is fired
    /// once per affected parent/target after the whole batch commits.
    pub async fn remove(&self, id: &str, actor: Option<&str>) -> Result<()> {
        self.remove_with_action(id, actor, HistoryAction::Delete).await
    }

    async fn remove_with_action(
        &self,
        id: &str,
        actor: Option<&str>,
        action: HistoryAction,
    ) -> Result<()> {
        let victims = {
            let backend = self.backend.read();
            let root = backend
                .read_node(id)?
                .ok_or_else(|| Error::NotFound(id.to_string()))?;
            collect_subtree(&**backend, root)?
        };

        {
            let mut backend = self.backend.write();
            // children before parents
            for victim in victims.iter().rev() {
                backend.delete_node(&victim.id)?;
                let entry_action = if victim.id == id { action } else { HistoryAction::Delete };
                backend.append_history(&HistoryEntry::record(
                    entry_action,
                    Some(victim.clone()),
                    None,
                    actor,
                ))?;
            }
        }

        let mut parents = BTreeSet::new();
        let mut targets = BTreeSet::new();
        for victim in &victims {
            parents.insert(victim.parent.clone());
            targets.extend(victim.assigned_targets.iter().cloned());
        }
        self.notifier.notify(&parents, &targets);

        Ok(())
    }

    /// Deep-copy a node and its descendants under fresh ids.
    ///
    /// The copy keeps the source's parent, ordering, flags, and target
    /// bindings; the top copy's name gains a " (copy)" suffix. Returns the
    /// top copy.
    pub async fn duplicate(&self, id: &str, actor: Option<&str>) -> Result<SettingNode> {
        let source_tree = {
            let backend = self.backend.read();
            let root = backend
                .read_node(id)?
                .ok_or_else(|| Error::NotFound(id.to_string()))?;
            collect_subtree(&**backend, root)?
        };

        let now = Utc::now();
        let mut id_map: HashMap<String, String> = HashMap::new();
        for node in &source_tree {
            id_map.insert(node.id.clone(), generate_id(&node.name));
        }

        let mut copies = Vec::with_capacity(source_tree.len());
        for (i, source) in source_tree.iter().enumerate() {
            let mut copy = source.clone();
            copy.id = id_map[&source.id].clone();
            if i == 0 {
                copy.name = format!("{} (copy)", source.name);
            } else if let Some(parent) = &source.parent {
                // descendants reattach inside the copy
                copy.parent = Some(id_map[parent].clone());
            }
            copy.created_at = now;
            copy.updated_at = now;
            copy.created_by = actor.map(|a| a.to_string());
            copy.updated_by = actor.map(|a| a.to_string());
            copies.push(copy);
        }

        {
            let mut backend = self.backend.write();
            for (i, copy) in copies.iter().enumerate() {
                backend.write_node(copy)?;
                let entry_action = if i == 0 {
                    HistoryAction::Duplicate
                } else {
                    HistoryAction::Create
                };
                backend.append_history(&HistoryEntry::record(
                    entry_action,
                    None,
                    Some(copy.clone()),
                    actor,
                ))?;
            }
        }

        let mut parents = BTreeSet::new();
        let mut targets = BTreeSet::new();
        for copy in &copies {
            parents.insert(copy.parent.clone());
            targets.extend(copy.assigned_targets.iter().cloned());
        }
        self.notifier.notify(&parents, &targets);

        copies
            .into_iter()
            .next()
            .ok_or_else(|| Error::Other("duplicate produced no nodes".to_string()))
    }

    /// Undo one history entry.
    ///
    /// Writes back the entry's `before` image, or deletes the node (with
    /// descendants) when the entry recorded a create. Returns the restored
    /// node, if any.
    pub async fn revert(
        &self,
        entry: &HistoryEntry,
        actor: Option<&str>,
    ) -> Result<Option<SettingNode>> {
        match &entry.before {
            Some(image) => {
                let now = Utc::now();
                let current = {
                    let backend = self.backend.read();
                    if let Some(parent_id) = image.parent.as_deref() {
                        if backend.read_node(parent_id)?.is_none() {
                            return Err(Error::ParentNotFound(parent_id.to_string()));
                        }
                    }
                    backend.read_node(&image.id)?
                };

                let mut restored = image.clone();
                restored.updated_at = now;
                restored.updated_by = actor.map(|a| a.to_string());

                {
                    let mut backend = self.backend.write();
                    backend.write_node(&restored)?;
                    backend.append_history(&HistoryEntry::record(
                        HistoryAction::Revert,
                        current.clone(),
                        Some(restored.clone()),
                        actor,
                    ))?;
                }

                let mut parents = BTreeSet::new();
                parents.insert(restored.parent.clone());
                let mut targets: BTreeSet<String> =
                    restored.assigned_targets.iter().cloned().collect();
                if let Some(c) = &current {
                    parents.insert(c.parent.clone());
                    targets.extend(c.assigned_targets.iter().cloned());
                }
                self.notifier.notify(&parents, &targets);

                Ok(Some(restored))
            }
            None => {
                if self.get(&entry.setting_id).await?.is_some() {
                    self.remove_with_action(&entry.setting_id, actor, HistoryAction::Revert)
                        .await?;
                }
                Ok(None)
            }
        }
    }

    /// The full audit trail, oldest first.
    pub async fn history(&self) -> Result<Vec<HistoryEntry>> {
        self.backend.read().read_history()
    }

    /// Watch the child set of `parent`. The callback fires after every
    /// committed mutation that affects it.
    pub fn on_children_changed(
        &self,
        parent: Option<&str>,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> WatchHandle {
        let id = self
            .notifier
            .watch_children(parent.map(|p| p.to_string()), Arc::new(callback));
        WatchHandle {
            id,
            kind: WatchKind::Children,
            notifier: self.notifier.clone(),
        }
    }

    /// Watch the set of nodes bound to `target_id`. The callback fires
    /// after every committed mutation touching a node bound to it (before
    /// or after the mutation).
    pub fn on_target_nodes_changed(
        &self,
        target_id: &str,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> WatchHandle {
        let id = self
            .notifier
            .watch_target(target_id.to_string(), Arc::new(callback));
        WatchHandle {
            id,
            kind: WatchKind::Target,
            notifier: self.notifier.clone(),
        }
    }
}

/// Reject a parent assignment that would make `node_id` its own ancestor,
/// or that sits deeper than the traversal bound.
fn ancestry_check(backend: &dyn StoreBackend, node_id: &str, parent: &SettingNode) -> Result<()> {
    let mut cursor = Some(parent.clone());
    let mut depth = 0usize;
    while let Some(current) = cursor {
        if current.id == node_id {
            return Err(Error::InvalidInput(format!(
                "node {} cannot be its own ancestor",
                node_id
            )));
        }
        depth += 1;
        if depth > MAX_DEPTH {
            return Err(Error::InvalidInput(format!(
                "tree deeper than {} levels",
                MAX_DEPTH
            )));
        }
        cursor = match current.parent.as_deref() {
            Some(p) => backend.read_node(p)?,
            None => None,
        };
    }
    Ok(())
}

/// Breadth-first subtree collection, root first. The visited set guards
/// against corrupt backends handing back a cyclic parent relation.
fn collect_subtree(backend: &dyn StoreBackend, root: SettingNode) -> Result<Vec<SettingNode>> {
    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(root.id.clone());
    let mut out = vec![root];
    let mut i = 0;
    while i < out.len() {
        let parent_id = out[i].id.clone();
        let children = backend.read_children(Some(parent_id.as_str()))?;
        for child in children {
            if seen.insert(child.id.clone()) {
                out.push(child);
            }
        }
        i += 1;
    }
    Ok(out)
}

/// Generate a unique node ID.
///
/// Format: `st-<4 hex chars>`, hashed from the seed, a random UUID, and a
/// nanosecond timestamp.
pub fn generate_id(seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(Uuid::new_v4().as_bytes());
    hasher.update(
        Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or(0)
            .to_le_bytes(),
    );
    let hash_hex = format!("{:x}", hasher.finalize());
    format!("st-{}", &hash_hex[..4])
}

/// Resolve the data directory for the `fst` CLI.
///
/// Priority: explicit path > `FST_DATA_DIR` env var > `dirs::data_dir()/fieldset`.
pub fn get_data_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Ok(env) = std::env::var("FST_DATA_DIR") {
        if !env.is_empty() {
            return Ok(PathBuf::from(env));
        }
    }
    dirs::data_dir()
        .map(|d| d.join("fieldset"))
        .ok_or_else(|| Error::Other("Could not determine data directory".to_string()))
}
