//! Target binding index.
//!
//! Maps an application target id to the nodes bound to it and performs the
//! kind-specific projections consumers rely on: option lists for `list`
//! targets, a single resolved scalar for `value` targets, and a coerced
//! boolean for `flag` targets.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::Result;
use crate::models::{SettingNode, SettingValue, sort_siblings};
use crate::resolver::Resolver;
use crate::store::NodeStore;
use crate::targets::to_boolean;

/// One selectable option of a list-kind target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListOption {
    /// Id of the child node behind the option
    pub id: String,
    /// Display label: the child's resolved value, falling back to its name
    pub label: String,
}

/// Index over the store's target bindings.
#[derive(Clone)]
pub struct TargetBindingIndex {
    store: Arc<NodeStore>,
    resolver: Resolver,
}

impl TargetBindingIndex {
    pub fn new(store: Arc<NodeStore>) -> Self {
        let resolver = Resolver::new(store.clone());
        Self { store, resolver }
    }

    /// Nodes bound to `target_id`, in canonical `(order, name)` order.
    pub async fn bindings_for(&self, target_id: &str) -> Result<Vec<SettingNode>> {
        let mut bound = self.store.find_by_target(target_id).await?;
        sort_siblings(&mut bound);
        Ok(bound)
    }

    /// Options of a list-kind target: the children of every bound node,
    /// concatenated, sorted, and deduplicated by id. Options with a blank
    /// label are excluded.
    pub async fn list_options(&self, target_id: &str) -> Result<Vec<ListOption>> {
        let parents = self.bindings_for(target_id).await?;
        let mut children = Vec::new();
        for parent in &parents {
            children.extend(self.store.get_children(Some(parent.id.as_str())).await?);
        }
        sort_siblings(&mut children);

        let mut seen: HashSet<String> = HashSet::new();
        let mut options = Vec::new();
        for child in children {
            if !seen.insert(child.id.clone()) {
                continue;
            }
            let label = match self.resolver.resolve(&child).await? {
                Some(value) => {
                    let text = value.display_text();
                    if text.trim().is_empty() {
                        child.name.clone()
                    } else {
                        text
                    }
                }
                None => child.name.clone(),
            };
            if label.trim().is_empty() {
                continue;
            }
            options.push(ListOption {
                id: child.id,
                label,
            });
        }
        Ok(options)
    }

    /// Resolved scalar of a value-kind target. With several nodes bound to
    /// the same target, the first after sort wins.
    pub async fn value_of(&self, target_id: &str) -> Result<Option<SettingValue>> {
        let bound = self.bindings_for(target_id).await?;
        match bound.first() {
            Some(node) => self.resolver.resolve(node).await,
            None => Ok(None),
        }
    }

    /// Coerced boolean of a flag-kind target. Unbound or unresolved reads
    /// as the "off" state.
    pub async fn flag_of(&self, target_id: &str) -> Result<bool> {
        let value = self.value_of(target_id).await?;
        Ok(to_boolean(value.as_ref()))
    }
}
