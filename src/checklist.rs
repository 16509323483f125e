//! Equipment-revision checklist projector.
//!
//! The canonical target-bound consumer: it subscribes to the fixed
//! checklist target, treats each bound node as a checklist *section* and
//! each `Variable` child as an *item*, and emits a fresh versioned snapshot
//! on every change. Consumers are never left without state: when nothing is
//! bound, an explicit empty checklist goes out with the sentinel version.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::mpsc;

use crate::Result;
use crate::bus::{SubscriptionBus, SubscriptionHandle, TargetView};
use crate::models::SettingValue;
use crate::resolver::Resolver;
use crate::store::NodeStore;
use crate::targets::CHECKLIST_TARGET;

/// The two states a checklist item can be marked with.
pub const CHECKLIST_STATES: [&str; 2] = ["Functional", "Nefunctional"];

/// Version stamped on an empty checklist (no sections bound).
pub const EMPTY_CHECKLIST_VERSION: u64 = 0;

/// One checklist item, projected from a `Variable` child of a section.
#[derive(Debug, Clone, Serialize)]
pub struct ChecklistItem {
    pub id: String,
    pub label: String,
    /// Resolved effective value, for form pre-fill
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<SettingValue>,
}

/// One checklist section, projected from a bound node.
#[derive(Debug, Clone, Serialize)]
pub struct ChecklistSection {
    pub id: String,
    pub title: String,
    pub items: Vec<ChecklistItem>,
}

/// A versioned checklist snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct Checklist {
    /// Monotonically increasing snapshot marker; `0` flags the empty
    /// checklist
    pub version: u64,
    pub sections: Vec<ChecklistSection>,
    pub states: [&'static str; 2],
}

impl Checklist {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Projects the settings tree into checklist snapshots.
#[derive(Clone)]
pub struct ChecklistProjector {
    store: Arc<NodeStore>,
    bus: SubscriptionBus,
    resolver: Resolver,
    version: Arc<AtomicU64>,
}

impl ChecklistProjector {
    pub fn new(store: Arc<NodeStore>) -> Self {
        Self {
            bus: SubscriptionBus::new(store.clone()),
            resolver: Resolver::new(store.clone()),
            store,
            version: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Subscribe to checklist snapshots.
    ///
    /// The handler fires immediately with the current checklist and again
    /// after every relevant tree change. Unsubscribing tears down the
    /// nested target subscription as well.
    pub fn subscribe<F>(&self, on_checklist: F) -> SubscriptionHandle
    where
        F: Fn(Checklist) + Send + Sync + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<TargetView>();
        let inner = self.bus.subscribe_by_target(CHECKLIST_TARGET, move |view| {
            let _ = tx.send(view);
        });

        let resolver = self.resolver.clone();
        let version = self.version.clone();
        let active = Arc::new(AtomicBool::new(true));
        let task_active = active.clone();

        let task = tokio::spawn(async move {
            // dropping the inner handle on task teardown unsubscribes the
            // nested target watchers
            let _inner = inner;
            while let Some(view) = rx.recv().await {
                let view = latest(view, &mut rx);
                if !task_active.load(Ordering::SeqCst) {
                    break;
                }
                match project(&resolver, &version, view).await {
                    Ok(checklist) => {
                        if task_active.load(Ordering::SeqCst) {
                            on_checklist(checklist);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "checklist projection failed");
                    }
                }
            }
        });

        SubscriptionHandle::new(active, task)
    }

    /// One-shot projection of the current tree state.
    pub async fn snapshot(&self) -> Result<Checklist> {
        let view = self.current_view().await?;
        project(&self.resolver, &self.version, view).await
    }

    async fn current_view(&self) -> Result<TargetView> {
        let mut parents = self.store.find_by_target(CHECKLIST_TARGET).await?;
        crate::models::sort_siblings(&mut parents);
        let mut views = Vec::with_capacity(parents.len());
        for parent in parents {
            let children = self.store.get_children(Some(parent.id.as_str())).await?;
            views.push(crate::bus::ParentView {
                node: parent,
                children,
            });
        }
        Ok(TargetView {
            target_id: CHECKLIST_TARGET.to_string(),
            parents: views,
        })
    }
}

/// Collapse a burst of queued views down to the most recent one.
fn latest(mut view: TargetView, rx: &mut mpsc::UnboundedReceiver<TargetView>) -> TargetView {
    while let Ok(newer) = rx.try_recv() {
        view = newer;
    }
    view
}

async fn project(
    resolver: &Resolver,
    version: &AtomicU64,
    view: TargetView,
) -> Result<Checklist> {
    let mut sections = Vec::with_capacity(view.parents.len());
    for parent in view.parents {
        let mut items = Vec::new();
        for child in parent.children {
            if !child.is_variable() {
                continue;
            }
            let value = resolver.resolve(&child).await?;
            items.push(ChecklistItem {
                id: child.id,
                label: child.name,
                value,
            });
        }
        sections.push(ChecklistSection {
            id: parent.node.id,
            title: parent.node.name,
            items,
        });
    }

    let version = if sections.is_empty() {
        EMPTY_CHECKLIST_VERSION
    } else {
        version.fetch_add(1, Ordering::SeqCst) + 1
    };

    Ok(Checklist {
        version,
        sections,
        states: CHECKLIST_STATES,
    })
}
