//! Data models for the settings tree.
//!
//! This module defines the core data structures:
//! - `SettingNode` - One entry in the configuration tree (category or variable)
//! - `NodePayload` - The tagged category/variable split
//! - `SettingValue` - A semantically typed stored value
//! - `HistoryEntry` - Append-only audit record for every mutation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Bound on tree depth and on inheritance chain length.
///
/// Ancestor walks and inheritance resolution both stop after this many
/// hops, so neither can traverse unboundedly even on corrupt data.
pub const MAX_DEPTH: usize = 64;

/// Declared value type of a variable node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Json,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueType::String => "string",
            ValueType::Number => "number",
            ValueType::Boolean => "boolean",
            ValueType::Json => "json",
        };
        write!(f, "{}", s)
    }
}

impl ValueType {
    /// Parse a value type from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "string" | "str" | "text" => Some(Self::String),
            "number" | "num" => Some(Self::Number),
            "boolean" | "bool" | "flag" => Some(Self::Boolean),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// A stored value, semantically typed per the owning node's `ValueType`.
///
/// Serialized untagged so the JSONL representation reads like plain JSON:
/// `true`, `42`, `"08:00-16:00"`, `{"any": "shape"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Boolean(bool),
    Number(f64),
    String(String),
    Json(serde_json::Value),
}

impl SettingValue {
    /// Whether the value's shape matches the declared type.
    ///
    /// `Json` admits any value.
    pub fn matches(&self, value_type: ValueType) -> bool {
        match (self, value_type) {
            (_, ValueType::Json) => true,
            (SettingValue::String(_), ValueType::String) => true,
            (SettingValue::Number(_), ValueType::Number) => true,
            (SettingValue::Boolean(_), ValueType::Boolean) => true,
            _ => false,
        }
    }

    /// Render the value as display text, e.g. for dropdown option labels.
    pub fn display_text(&self) -> String {
        match self {
            SettingValue::Boolean(b) => b.to_string(),
            SettingValue::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            SettingValue::String(s) => s.clone(),
            SettingValue::Json(v) => v.to_string(),
        }
    }
}

/// The category/variable split of a node.
///
/// Categories are containers and carry no value; variables are leaves and
/// may carry one. The tag lands in the node's serialized form as `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodePayload {
    Category,
    Variable {
        value_type: ValueType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<SettingValue>,
    },
}

/// A node in the configuration tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingNode {
    /// Unique identifier (e.g., "st-a1b2")
    pub id: String,

    /// Dotted human-readable path; informational only, never used for lookup
    pub path: String,

    /// Display name; ordering tiebreaker and source of generated labels
    pub name: String,

    /// Category or variable payload (serialized with a `type` tag)
    #[serde(flatten)]
    pub payload: NodePayload,

    /// Containing node, or None for a root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    /// Sibling sort key
    #[serde(default)]
    pub order: i64,

    /// Presentation flag, opaque to the engine
    #[serde(default)]
    pub hidden: bool,

    /// Presentation flag, opaque to the engine
    #[serde(default)]
    pub favorite: bool,

    /// Node whose resolved value stands in when this node has none set.
    /// May reference any node; the resolver tolerates cycles.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inherited_from: Option<String>,

    /// Target ids this node is bound to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assigned_targets: Vec<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Actor who created the node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,

    /// Actor who last updated the node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

impl SettingNode {
    /// Create a new category node.
    pub fn category(
        id: impl Into<String>,
        name: impl Into<String>,
        parent: Option<&str>,
    ) -> Self {
        Self::new(id.into(), name.into(), parent, NodePayload::Category)
    }

    /// Create a new variable node with no value set.
    pub fn variable(
        id: impl Into<String>,
        name: impl Into<String>,
        parent: Option<&str>,
        value_type: ValueType,
    ) -> Self {
        Self::new(
            id.into(),
            name.into(),
            parent,
            NodePayload::Variable {
                value_type,
                value: None,
            },
        )
    }

    fn new(id: String, name: String, parent: Option<&str>, payload: NodePayload) -> Self {
        let now = Utc::now();
        Self {
            id,
            path: name.clone(),
            name,
            payload,
            parent: parent.map(|p| p.to_string()),
            order: 0,
            hidden: false,
            favorite: false,
            inherited_from: None,
            assigned_targets: Vec::new(),
            created_at: now,
            updated_at: now,
            created_by: None,
            updated_by: None,
        }
    }

    /// Set the stored value (builder style). No effect on categories.
    pub fn with_value(mut self, value: SettingValue) -> Self {
        if let NodePayload::Variable { value: slot, .. } = &mut self.payload {
            *slot = Some(value);
        }
        self
    }

    /// Set the sibling sort key (builder style).
    pub fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }

    pub fn is_category(&self) -> bool {
        matches!(self.payload, NodePayload::Category)
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.payload, NodePayload::Variable { .. })
    }

    /// The node's own stored value, if any. Categories have none.
    pub fn own_value(&self) -> Option<&SettingValue> {
        match &self.payload {
            NodePayload::Variable { value, .. } => value.as_ref(),
            NodePayload::Category => None,
        }
    }
}

/// Sibling ordering: `(order, name)` ascending, id as the final tiebreaker
/// so the order is total and deterministic.
pub fn sibling_cmp(a: &SettingNode, b: &SettingNode) -> Ordering {
    a.order
        .cmp(&b.order)
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.id.cmp(&b.id))
}

/// Sort a child or binding list into canonical sibling order.
pub fn sort_siblings(nodes: &mut [SettingNode]) {
    nodes.sort_by(sibling_cmp);
}

/// What a history entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Create,
    Update,
    Delete,
    Move,
    Duplicate,
    Revert,
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HistoryAction::Create => "create",
            HistoryAction::Update => "update",
            HistoryAction::Delete => "delete",
            HistoryAction::Move => "move",
            HistoryAction::Duplicate => "duplicate",
            HistoryAction::Revert => "revert",
        };
        write!(f, "{}", s)
    }
}

/// Append-only audit record written alongside every mutation.
///
/// Entries are never mutated after creation; they exist for traceability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Id of the mutated node
    pub setting_id: String,

    /// Path of the node at mutation time
    pub setting_path: String,

    /// What happened
    pub action: HistoryAction,

    /// Snapshot before the mutation (absent for creates)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<SettingNode>,

    /// Snapshot after the mutation (absent for deletes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<SettingNode>,

    /// Who performed the mutation
    pub actor: String,

    /// When the mutation happened
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    /// Build an entry from before/after snapshots.
    ///
    /// `setting_id`/`setting_path` come from the after image when present,
    /// else the before image.
    pub fn record(
        action: HistoryAction,
        before: Option<SettingNode>,
        after: Option<SettingNode>,
        actor: Option<&str>,
    ) -> Self {
        let witness = after.as_ref().or(before.as_ref());
        let (setting_id, setting_path) = witness
            .map(|n| (n.id.clone(), n.path.clone()))
            .unwrap_or_default();
        Self {
            setting_id,
            setting_path,
            action,
            before,
            after,
            actor: actor.unwrap_or("unknown").to_string(),
            timestamp: Utc::now(),
        }
    }
}
