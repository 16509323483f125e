//! Inheritance resolution.
//!
//! A node's *effective* value is its own stored value when set, otherwise
//! the resolved value of the node its `inherited_from` reference points at.
//! The reference may point anywhere in the tree (not necessarily an
//! ancestor), so the data cannot be trusted to be acyclic: resolution
//! carries a visited set and a fixed chain bound, and degrades to "no
//! value" instead of looping or failing.

use std::collections::HashSet;
use std::sync::Arc;

use crate::Result;
use crate::models::{MAX_DEPTH, SettingNode, SettingValue};
use crate::store::NodeStore;

/// Cycle-safe resolver over an explicit store handle.
#[derive(Clone)]
pub struct Resolver {
    store: Arc<NodeStore>,
}

impl Resolver {
    pub fn new(store: Arc<NodeStore>) -> Self {
        Self { store }
    }

    /// Compute the effective value of `node`.
    ///
    /// Returns `Ok(None)` when nothing in the chain carries a value, the
    /// chain dead-ends on a missing node, a cycle is detected, or the
    /// chain exceeds the depth bound. Pure projection: two calls with no
    /// intervening mutation return the same result.
    pub async fn resolve(&self, node: &SettingNode) -> Result<Option<SettingValue>> {
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(node.id.clone());
        let mut current = node.clone();

        for _ in 0..MAX_DEPTH {
            if let Some(value) = current.own_value() {
                return Ok(Some(value.clone()));
            }
            let Some(next_id) = current.inherited_from.clone() else {
                return Ok(None);
            };
            if !visited.insert(next_id.clone()) {
                tracing::warn!(
                    node = %node.id,
                    via = %next_id,
                    "inheritance cycle detected, resolving to no value"
                );
                return Ok(None);
            }
            match self.store.get(&next_id).await? {
                Some(next) => current = next,
                // dangling reference reads as "never configured"
                None => return Ok(None),
            }
        }

        tracing::warn!(
            node = %node.id,
            limit = MAX_DEPTH,
            "inheritance chain exceeded depth bound, resolving to no value"
        );
        Ok(None)
    }

    /// Resolve by id. A missing id resolves to `Ok(None)`.
    pub async fn resolve_id(&self, id: &str) -> Result<Option<SettingValue>> {
        match self.store.get(id).await? {
            Some(node) => self.resolve(&node).await,
            None => Ok(None),
        }
    }
}
