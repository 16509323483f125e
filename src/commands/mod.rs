//! Command implementations for the fieldset CLI.
//!
//! This module contains the business logic for each CLI command. Commands
//! open the JSONL-backed store under the resolved data directory, perform
//! one operation, and return a typed result that renders as JSON (default)
//! or human-readable text.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::bindings::{ListOption, TargetBindingIndex};
use crate::bus::SubscriptionBus;
use crate::checklist::{Checklist, ChecklistProjector};
use crate::models::{HistoryEntry, NodePayload, SettingNode, SettingValue, ValueType};
use crate::resolver::Resolver;
use crate::store::{BackendType, JsonlBackend, NodeStore, StoreBackend, generate_id};
use crate::targets::{TARGET_CATALOG, Target, TargetKind, find_target};
use crate::{Error, Result};

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output: Serialize {
    /// Format for human-readable output.
    fn to_human(&self) -> String;

    /// Serialize to JSON string.
    fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

fn open_store(data_dir: &Path) -> Result<Arc<NodeStore>> {
    NodeStore::open_jsonl(data_dir)
}

fn describe(node: &SettingNode) -> String {
    match &node.payload {
        NodePayload::Category => format!("{} [{}] (category)", node.name, node.id),
        NodePayload::Variable { value_type, value } => {
            let rendered = value
                .as_ref()
                .map(|v| v.display_text())
                .unwrap_or_else(|| "-".to_string());
            format!(
                "{} [{}] ({}: {})",
                node.name, node.id, value_type, rendered
            )
        }
    }
}

/// Parse a raw CLI value string according to the declared type.
fn parse_value(value_type: ValueType, raw: &str) -> Result<SettingValue> {
    match value_type {
        ValueType::String => Ok(SettingValue::String(raw.to_string())),
        ValueType::Number => raw
            .parse::<f64>()
            .map(SettingValue::Number)
            .map_err(|_| Error::InvalidInput(format!("not a number: {}", raw))),
        ValueType::Boolean => match raw.trim().to_lowercase().as_str() {
            "true" => Ok(SettingValue::Boolean(true)),
            "false" => Ok(SettingValue::Boolean(false)),
            _ => Err(Error::InvalidInput(format!("not a boolean: {}", raw))),
        },
        ValueType::Json => serde_json::from_str(raw)
            .map(SettingValue::Json)
            .map_err(|e| Error::InvalidInput(format!("invalid json: {}", e))),
    }
}

// ==================== Node commands ====================

/// A single node, as returned by create/show/update/duplicate.
#[derive(Debug, Serialize)]
pub struct NodeResult {
    pub node: SettingNode,
}

impl Output for NodeResult {
    fn to_human(&self) -> String {
        let n = &self.node;
        let mut out = vec![describe(n)];
        out.push(format!("  path:     {}", n.path));
        if let Some(parent) = &n.parent {
            out.push(format!("  parent:   {}", parent));
        }
        out.push(format!("  order:    {}", n.order));
        if let Some(from) = &n.inherited_from {
            out.push(format!("  inherits: {}", from));
        }
        if !n.assigned_targets.is_empty() {
            out.push(format!("  targets:  {}", n.assigned_targets.join(", ")));
        }
        out.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct NodeListResult {
    pub nodes: Vec<SettingNode>,
}

impl Output for NodeListResult {
    fn to_human(&self) -> String {
        if self.nodes.is_empty() {
            return "(no nodes)".to_string();
        }
        self.nodes
            .iter()
            .map(describe)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Flattened depth-first tree listing.
#[derive(Debug, Serialize)]
pub struct TreeEntry {
    pub depth: usize,
    pub node: SettingNode,
}

#[derive(Debug, Serialize)]
pub struct TreeResult {
    pub entries: Vec<TreeEntry>,
}

impl Output for TreeResult {
    fn to_human(&self) -> String {
        if self.entries.is_empty() {
            return "(empty tree)".to_string();
        }
        self.entries
            .iter()
            .map(|e| format!("{}{}", "  ".repeat(e.depth), describe(&e.node)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteResult {
    pub id: String,
    pub deleted: bool,
}

impl Output for DeleteResult {
    fn to_human(&self) -> String {
        format!("Deleted {} (with descendants)", self.id)
    }
}

pub async fn node_create(
    data_dir: &Path,
    name: String,
    parent: Option<String>,
    value_type: Option<String>,
    value: Option<String>,
    order: i64,
    targets: Vec<String>,
    inherit: Option<String>,
    actor: Option<String>,
) -> Result<NodeResult> {
    let store = open_store(data_dir)?;
    let id = generate_id(&name);

    let mut node = match &value_type {
        Some(vt) => {
            let vt = ValueType::parse(vt)
                .ok_or_else(|| Error::InvalidInput(format!("unknown value type: {}", vt)))?;
            let mut node = SettingNode::variable(&id, &name, parent.as_deref(), vt);
            if let Some(raw) = &value {
                node = node.with_value(parse_value(vt, raw)?);
            }
            node
        }
        None => {
            if value.is_some() {
                return Err(Error::InvalidInput(
                    "a category cannot carry a value; pass --type to create a variable"
                        .to_string(),
                ));
            }
            SettingNode::category(&id, &name, parent.as_deref())
        }
    };
    node.order = order;
    node.assigned_targets = targets;
    node.inherited_from = inherit;

    let node = store.put(node, actor.as_deref()).await?;
    Ok(NodeResult { node })
}

pub async fn node_list(data_dir: &Path, parent: Option<&str>) -> Result<NodeListResult> {
    let store = open_store(data_dir)?;
    if let Some(id) = parent {
        if store.get(id).await?.is_none() {
            return Err(Error::NotFound(id.to_string()));
        }
    }
    let nodes = store.get_children(parent).await?;
    Ok(NodeListResult { nodes })
}

pub async fn node_tree(data_dir: &Path) -> Result<TreeResult> {
    let store = open_store(data_dir)?;
    let mut entries = Vec::new();
    // depth-first, children in canonical order
    let mut stack: Vec<(usize, SettingNode)> = Vec::new();
    let mut roots = store.get_children(None).await?;
    roots.reverse();
    for root in roots {
        stack.push((0, root));
    }
    while let Some((depth, node)) = stack.pop() {
        let mut children = store.get_children(Some(node.id.as_str())).await?;
        children.reverse();
        for child in children {
            stack.push((depth + 1, child));
        }
        entries.push(TreeEntry { depth, node });
    }
    Ok(TreeResult { entries })
}

pub async fn node_show(data_dir: &Path, id: &str) -> Result<NodeResult> {
    let store = open_store(data_dir)?;
    let node = store
        .get(id)
        .await?
        .ok_or_else(|| Error::NotFound(id.to_string()))?;
    Ok(NodeResult { node })
}

#[allow(clippy::too_many_arguments)]
pub async fn node_update(
    data_dir: &Path,
    id: &str,
    name: Option<String>,
    value: Option<String>,
    clear_value: bool,
    order: Option<i64>,
    parent: Option<String>,
    to_root: bool,
    add_target: Vec<String>,
    remove_target: Vec<String>,
    inherit: Option<String>,
    clear_inherit: bool,
    hidden: Option<bool>,
    favorite: Option<bool>,
    actor: Option<String>,
) -> Result<NodeResult> {
    let store = open_store(data_dir)?;
    let mut node = store
        .get(id)
        .await?
        .ok_or_else(|| Error::NotFound(id.to_string()))?;

    if let Some(name) = name {
        node.name = name;
    }
    if let Some(order) = order {
        node.order = order;
    }
    if to_root {
        node.parent = None;
    } else if let Some(parent) = parent {
        node.parent = Some(parent);
    }
    if clear_inherit {
        node.inherited_from = None;
    } else if let Some(inherit) = inherit {
        node.inherited_from = Some(inherit);
    }
    if let Some(hidden) = hidden {
        node.hidden = hidden;
    }
    if let Some(favorite) = favorite {
        node.favorite = favorite;
    }
    for target in add_target {
        if !node.assigned_targets.contains(&target) {
            node.assigned_targets.push(target);
        }
    }
    node.assigned_targets
        .retain(|t| !remove_target.contains(t));

    if clear_value || value.is_some() {
        let NodePayload::Variable {
            value_type,
            value: slot,
        } = &mut node.payload
        else {
            return Err(Error::InvalidInput(format!(
                "node {} is a category and cannot carry a value",
                id
            )));
        };
        *slot = match value {
            Some(raw) => Some(parse_value(*value_type, &raw)?),
            None => None,
        };
    }

    let node = store.put(node, actor.as_deref()).await?;
    Ok(NodeResult { node })
}

pub async fn node_delete(data_dir: &Path, id: &str, actor: Option<&str>) -> Result<DeleteResult> {
    let store = open_store(data_dir)?;
    store.remove(id, actor).await?;
    Ok(DeleteResult {
        id: id.to_string(),
        deleted: true,
    })
}

pub async fn node_duplicate(
    data_dir: &Path,
    id: &str,
    actor: Option<&str>,
) -> Result<NodeResult> {
    let store = open_store(data_dir)?;
    let node = store.duplicate(id, actor).await?;
    Ok(NodeResult { node })
}

// ==================== Target commands ====================

#[derive(Debug, Serialize)]
pub struct TargetListResult {
    pub targets: Vec<Target>,
}

impl Output for TargetListResult {
    fn to_human(&self) -> String {
        self.targets
            .iter()
            .map(|t| format!("{:<36} {:<6} {}", t.id, t.kind.to_string(), t.label))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Kind-aware projection of one target.
#[derive(Debug, Serialize)]
pub struct TargetShowResult {
    pub id: String,
    pub label: String,
    pub kind: TargetKind,
    /// How many nodes are bound
    pub bound: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<ListOption>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<SettingValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag: Option<bool>,
}

impl Output for TargetShowResult {
    fn to_human(&self) -> String {
        let mut out = vec![format!("{} ({}) - {}", self.id, self.kind, self.label)];
        out.push(format!("  bound nodes: {}", self.bound));
        if let Some(options) = &self.options {
            for option in options {
                out.push(format!("  - {} [{}]", option.label, option.id));
            }
        }
        if let Some(value) = &self.value {
            out.push(format!("  value: {}", value.display_text()));
        }
        if let Some(flag) = &self.flag {
            out.push(format!("  flag: {}", flag));
        }
        out.join("\n")
    }
}

pub fn target_list() -> TargetListResult {
    TargetListResult {
        targets: TARGET_CATALOG.to_vec(),
    }
}

pub async fn target_show(data_dir: &Path, id: &str) -> Result<TargetShowResult> {
    let target = find_target(id).ok_or_else(|| Error::UnknownTarget(id.to_string()))?;
    let store = open_store(data_dir)?;
    let index = TargetBindingIndex::new(store);
    let bound = index.bindings_for(id).await?.len();

    let mut result = TargetShowResult {
        id: target.id.to_string(),
        label: target.label.to_string(),
        kind: target.kind,
        bound,
        options: None,
        value: None,
        flag: None,
    };
    match target.kind {
        TargetKind::List => result.options = Some(index.list_options(id).await?),
        TargetKind::Value => result.value = index.value_of(id).await?,
        TargetKind::Flag => result.flag = Some(index.flag_of(id).await?),
    }
    Ok(result)
}

// ==================== Resolve / checklist / history ====================

#[derive(Debug, Serialize)]
pub struct ResolveResult {
    pub id: String,
    pub value: Option<SettingValue>,
}

impl Output for ResolveResult {
    fn to_human(&self) -> String {
        match &self.value {
            Some(value) => format!("{} = {}", self.id, value.display_text()),
            None => format!("{} resolves to no value", self.id),
        }
    }
}

pub async fn resolve(data_dir: &Path, id: &str) -> Result<ResolveResult> {
    let store = open_store(data_dir)?;
    if store.get(id).await?.is_none() {
        return Err(Error::NotFound(id.to_string()));
    }
    let resolver = Resolver::new(store);
    let value = resolver.resolve_id(id).await?;
    Ok(ResolveResult {
        id: id.to_string(),
        value,
    })
}

impl Output for Checklist {
    fn to_human(&self) -> String {
        if self.is_empty() {
            return "(empty checklist)".to_string();
        }
        let mut out = vec![format!("Checklist v{}", self.version)];
        for section in &self.sections {
            out.push(format!("{} [{}]", section.title, section.id));
            for item in &section.items {
                out.push(format!("  - {} [{}]", item.label, item.id));
            }
        }
        out.push(format!("states: {}", self.states.join(" / ")));
        out.join("\n")
    }
}

pub async fn checklist(data_dir: &Path) -> Result<Checklist> {
    let store = open_store(data_dir)?;
    let projector = ChecklistProjector::new(store);
    projector.snapshot().await
}

#[derive(Debug, Serialize)]
pub struct HistoryResult {
    pub entries: Vec<HistoryEntry>,
}

impl Output for HistoryResult {
    fn to_human(&self) -> String {
        if self.entries.is_empty() {
            return "(no history)".to_string();
        }
        self.entries
            .iter()
            .map(|e| {
                format!(
                    "{} {:<9} {} ({})",
                    e.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    e.action.to_string(),
                    e.setting_path,
                    e.actor
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub async fn history(data_dir: &Path, limit: Option<usize>) -> Result<HistoryResult> {
    let store = open_store(data_dir)?;
    let mut entries = store.history().await?;
    if let Some(limit) = limit {
        let skip = entries.len().saturating_sub(limit);
        entries.drain(..skip);
    }
    Ok(HistoryResult { entries })
}

// ==================== Watch ====================

/// Stream live target emissions to stdout until Ctrl-C.
pub async fn watch(data_dir: &Path, target_id: &str, human: bool) -> Result<()> {
    let target = find_target(target_id).ok_or_else(|| Error::UnknownTarget(target_id.to_string()))?;
    let store = open_store(data_dir)?;
    let bus = SubscriptionBus::new(store);

    let sub = bus.subscribe_by_target(target.id, move |view| {
        if human {
            let children = view.merged_children();
            println!(
                "{}: {} bound, {} children",
                view.target_id,
                view.parents.len(),
                children.len()
            );
        } else {
            match serde_json::to_string(&view) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::warn!(error = %e, "failed to serialize emission"),
            }
        }
    });

    let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .map_err(|e| Error::Other(format!("failed to install signal handler: {}", e)))?;

    tokio::task::spawn_blocking(move || {
        let _ = stop_rx.recv();
    })
    .await
    .map_err(|e| Error::Other(format!("watch interrupted: {}", e)))?;

    sub.unsubscribe();
    Ok(())
}

// ==================== System commands ====================

#[derive(Debug, Serialize)]
pub struct InitResult {
    pub location: String,
    pub backend: BackendType,
    pub initialized: bool,
}

impl Output for InitResult {
    fn to_human(&self) -> String {
        format!(
            "Initialized {} settings store at {}",
            self.backend.as_str(),
            self.location
        )
    }
}

pub fn init(data_dir: &Path) -> Result<InitResult> {
    let backend = JsonlBackend::init(data_dir)?;
    Ok(InitResult {
        location: backend.location(),
        backend: backend.backend_type(),
        initialized: true,
    })
}

#[derive(Debug, Serialize)]
pub struct BuildInfoResult {
    pub version: String,
    pub commit: String,
    pub built: String,
}

impl Output for BuildInfoResult {
    fn to_human(&self) -> String {
        format!(
            "Version: {}\nCommit:  {}\nBuilt:   {}",
            self.version, self.commit, self.built
        )
    }
}

pub fn build_info() -> BuildInfoResult {
    BuildInfoResult {
        version: crate::cli::package_version().to_string(),
        commit: crate::cli::git_commit().to_string(),
        built: crate::cli::build_timestamp().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_per_type() {
        assert_eq!(
            parse_value(ValueType::String, "hello").unwrap(),
            SettingValue::String("hello".to_string())
        );
        assert_eq!(
            parse_value(ValueType::Number, "1.5").unwrap(),
            SettingValue::Number(1.5)
        );
        assert_eq!(
            parse_value(ValueType::Boolean, "true").unwrap(),
            SettingValue::Boolean(true)
        );
        assert!(matches!(
            parse_value(ValueType::Number, "abc"),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            parse_value(ValueType::Boolean, "da"),
            Err(Error::InvalidInput(_))
        ));
        let json = parse_value(ValueType::Json, r#"{"a": 1}"#).unwrap();
        assert_eq!(json, SettingValue::Json(serde_json::json!({"a": 1})));
    }

    #[test]
    fn test_target_list_covers_catalog() {
        assert_eq!(target_list().targets.len(), TARGET_CATALOG.len());
    }
}
