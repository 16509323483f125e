//! Subscription bus: live, push-based views over the settings tree.
//!
//! Two views are offered: the child set of one parent, and the full fan-out
//! of a target binding (every bound parent plus its children). Each
//! subscription runs as a tokio task fed by a channel from the store's
//! synchronous change notifier; every signal triggers a full recompute from
//! the current snapshot, so emissions are always stably ordered regardless
//! of the order mutations arrived in.
//!
//! Target subscriptions are two-level: a membership watcher tracks which
//! parents are bound, and a per-subscription map from parent id to its
//! child-watcher handle is diffed on every membership change. Stale
//! watchers are dropped (deregistering them), new ones are registered;
//! naive cleanup here is the classic watcher leak.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::Result;
use crate::models::{SettingNode, sort_siblings};
use crate::store::{NodeStore, WatchHandle};

/// One bound parent with its current children, both in canonical order.
#[derive(Debug, Clone, Serialize)]
pub struct ParentView {
    pub node: SettingNode,
    pub children: Vec<SettingNode>,
}

/// Snapshot emitted to `subscribe_by_target` consumers.
#[derive(Debug, Clone, Serialize)]
pub struct TargetView {
    pub target_id: String,
    pub parents: Vec<ParentView>,
}

impl TargetView {
    /// All tracked parents' children merged into one `(order, name)`-sorted
    /// list, deduplicated by id.
    pub fn merged_children(&self) -> Vec<SettingNode> {
        let mut merged: Vec<SettingNode> = self
            .parents
            .iter()
            .flat_map(|p| p.children.iter().cloned())
            .collect();
        sort_siblings(&mut merged);
        let mut seen: HashSet<String> = HashSet::new();
        merged.retain(|n| seen.insert(n.id.clone()));
        merged
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

/// Handle to a live subscription.
///
/// `unsubscribe` is idempotent and synchronous: the active guard flips
/// before the subscription task is aborted, so no callback fires after it
/// returns. Dropping the handle unsubscribes too.
pub struct SubscriptionHandle {
    active: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SubscriptionHandle {
    pub(crate) fn new(active: Arc<AtomicBool>, task: JoinHandle<()>) -> Self {
        Self {
            active,
            task: Mutex::new(Some(task)),
        }
    }

    /// Stop the subscription. Safe to call more than once.
    pub fn unsubscribe(&self) {
        self.active.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Live view factory over an explicit store handle.
#[derive(Clone)]
pub struct SubscriptionBus {
    store: Arc<NodeStore>,
}

impl SubscriptionBus {
    pub fn new(store: Arc<NodeStore>) -> Self {
        Self { store }
    }

    /// Watch the child set of `parent`.
    ///
    /// Emits the current sorted children immediately, then again after
    /// every mutation affecting that parent. Bursts are coalesced into one
    /// recompute.
    pub fn subscribe_children<F>(&self, parent: Option<&str>, on_change: F) -> SubscriptionHandle
    where
        F: Fn(Vec<SettingNode>) + Send + Sync + 'static,
    {
        let store = self.store.clone();
        let parent = parent.map(|p| p.to_string());
        let active = Arc::new(AtomicBool::new(true));
        let task_active = active.clone();

        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        // register before the initial read so no mutation slips between
        let watch = store.on_children_changed(parent.as_deref(), move || {
            let _ = tx.send(());
        });

        let task = tokio::spawn(async move {
            let _watch = watch;
            emit_children(&store, parent.as_deref(), &task_active, &on_change).await;
            while rx.recv().await.is_some() {
                while rx.try_recv().is_ok() {}
                if !task_active.load(Ordering::SeqCst) {
                    break;
                }
                emit_children(&store, parent.as_deref(), &task_active, &on_change).await;
            }
        });

        SubscriptionHandle::new(active, task)
    }

    /// Watch everything bound to `target_id`.
    ///
    /// Emits a full `TargetView` immediately (an explicit empty view when
    /// nothing is bound) and after every relevant mutation: membership
    /// changes, bound-parent edits, and child-level edits of any bound
    /// parent.
    pub fn subscribe_by_target<F>(&self, target_id: &str, on_change: F) -> SubscriptionHandle
    where
        F: Fn(TargetView) + Send + Sync + 'static,
    {
        let store = self.store.clone();
        let target_id = target_id.to_string();
        let active = Arc::new(AtomicBool::new(true));
        let task_active = active.clone();

        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let membership_tx = tx.clone();
        let membership_watch = store.on_target_nodes_changed(&target_id, move || {
            let _ = membership_tx.send(());
        });

        let task = tokio::spawn(async move {
            let _membership = membership_watch;
            let mut child_watches: HashMap<String, WatchHandle> = HashMap::new();
            sync_and_emit(
                &store,
                &target_id,
                &tx,
                &mut child_watches,
                &task_active,
                &on_change,
            )
            .await;
            while rx.recv().await.is_some() {
                while rx.try_recv().is_ok() {}
                if !task_active.load(Ordering::SeqCst) {
                    break;
                }
                sync_and_emit(
                    &store,
                    &target_id,
                    &tx,
                    &mut child_watches,
                    &task_active,
                    &on_change,
                )
                .await;
            }
        });

        SubscriptionHandle::new(active, task)
    }
}

async fn emit_children<F>(
    store: &Arc<NodeStore>,
    parent: Option<&str>,
    active: &AtomicBool,
    on_change: &F,
) where
    F: Fn(Vec<SettingNode>),
{
    match store.get_children(parent).await {
        Ok(children) => {
            if active.load(Ordering::SeqCst) {
                on_change(children);
            }
        }
        // the subscription outlives a backend hiccup; retrying is the
        // consumer's call
        Err(e) => tracing::warn!(error = %e, "children subscription read failed"),
    }
}

/// Recompute the bound-parent set, diff the child watchers against it, and
/// emit a fresh snapshot.
async fn sync_and_emit<F>(
    store: &Arc<NodeStore>,
    target_id: &str,
    tx: &mpsc::UnboundedSender<()>,
    child_watches: &mut HashMap<String, WatchHandle>,
    active: &AtomicBool,
    on_change: &F,
) where
    F: Fn(TargetView),
{
    let result: Result<TargetView> = async {
        let mut parents = store.find_by_target(target_id).await?;
        sort_siblings(&mut parents);

        let current: HashSet<String> = parents.iter().map(|p| p.id.clone()).collect();
        // dropping a handle deregisters its watcher
        child_watches.retain(|id, _| current.contains(id));
        for parent in &parents {
            if !child_watches.contains_key(&parent.id) {
                let child_tx = tx.clone();
                let watch = store.on_children_changed(Some(parent.id.as_str()), move || {
                    let _ = child_tx.send(());
                });
                child_watches.insert(parent.id.clone(), watch);
            }
        }

        let mut views = Vec::with_capacity(parents.len());
        for parent in parents {
            let children = store.get_children(Some(parent.id.as_str())).await?;
            views.push(ParentView {
                node: parent,
                children,
            });
        }
        Ok(TargetView {
            target_id: target_id.to_string(),
            parents: views,
        })
    }
    .await;

    match result {
        Ok(view) => {
            if active.load(Ordering::SeqCst) {
                on_change(view);
            }
        }
        Err(e) => tracing::warn!(target_id, error = %e, "target subscription read failed"),
    }
}
