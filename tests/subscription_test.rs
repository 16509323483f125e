//! Library-level subscription tests over the file-backed store.
//!
//! The unit tests in `src/bus/` cover the in-memory backend; these run the
//! same live-view machinery against JSONL storage, the way the CLI uses it.

use std::time::Duration;

use fieldset::bus::{SubscriptionBus, TargetView};
use fieldset::models::{SettingNode, SettingValue, ValueType};
use fieldset::store::NodeStore;
use fieldset::targets::to_boolean;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);

async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    timeout(WAIT, rx.recv())
        .await
        .expect("emission timed out")
        .expect("subscription channel closed")
}

#[tokio::test]
async fn test_children_view_over_jsonl_store() {
    let dir = TempDir::new().unwrap();
    let store = NodeStore::init_jsonl(dir.path()).unwrap();
    store
        .put(SettingNode::category("c1", "Shift Types", None), None)
        .await
        .unwrap();

    let bus = SubscriptionBus::new(store.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = bus.subscribe_children(Some("c1"), move |children| {
        let _ = tx.send(children);
    });

    assert!(next(&mut rx).await.is_empty());

    store
        .put(
            SettingNode::variable("v1", "08:00-16:00", Some("c1"), ValueType::String),
            None,
        )
        .await
        .unwrap();
    let children = next(&mut rx).await;
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].name, "08:00-16:00");
}

#[tokio::test]
async fn test_two_level_fanout_over_jsonl_store() {
    let dir = TempDir::new().unwrap();
    let store = NodeStore::init_jsonl(dir.path()).unwrap();

    let bus = SubscriptionBus::new(store.clone());
    let (tx, mut rx) = mpsc::unbounded_channel::<TargetView>();
    let _sub = bus.subscribe_by_target("works.create.timeSlots", move |view| {
        let _ = tx.send(view);
    });

    // explicit empty view first
    assert!(next(&mut rx).await.is_empty());

    let mut cat = SettingNode::category("c1", "Shift Types", None);
    cat.assigned_targets = vec!["works.create.timeSlots".to_string()];
    store.put(cat, None).await.unwrap();
    assert_eq!(next(&mut rx).await.parents.len(), 1);

    store
        .put(
            SettingNode::variable("v1", "08:00-16:00", Some("c1"), ValueType::String)
                .with_order(0),
            None,
        )
        .await
        .unwrap();
    store
        .put(
            SettingNode::variable("v2", "16:00-00:00", Some("c1"), ValueType::String)
                .with_order(1),
            None,
        )
        .await
        .unwrap();

    // drain until the view settles on both children
    let mut names: Vec<String> = Vec::new();
    for _ in 0..2 {
        let view = next(&mut rx).await;
        names = view
            .merged_children()
            .into_iter()
            .map(|n| n.name)
            .collect();
        if names.len() == 2 {
            break;
        }
    }
    assert_eq!(names, vec!["08:00-16:00", "16:00-00:00"]);
}

#[tokio::test]
async fn test_flag_rebind_without_resubscribe() {
    let dir = TempDir::new().unwrap();
    let store = NodeStore::init_jsonl(dir.path()).unwrap();
    let mut flag = SettingNode::variable("f", "Offers", None, ValueType::Number)
        .with_value(SettingValue::Number(1.0));
    flag.assigned_targets = vec!["features.offers.enabled".to_string()];
    let flag = store.put(flag, None).await.unwrap();

    let bus = SubscriptionBus::new(store.clone());
    let (tx, mut rx) = mpsc::unbounded_channel::<bool>();
    let _sub = bus.subscribe_by_target("features.offers.enabled", move |view| {
        let coerced = view
            .parents
            .first()
            .and_then(|p| p.node.own_value().cloned());
        let _ = tx.send(to_boolean(coerced.as_ref()));
    });

    assert!(next(&mut rx).await);

    let updated = SettingNode {
        payload: fieldset::models::NodePayload::Variable {
            value_type: ValueType::String,
            value: Some(SettingValue::String("off".to_string())),
        },
        ..flag
    };
    store.put(updated, None).await.unwrap();
    assert!(!next(&mut rx).await);
}

#[tokio::test]
async fn test_mutations_survive_reopen_with_fresh_subscription() {
    let dir = TempDir::new().unwrap();
    {
        let store = NodeStore::init_jsonl(dir.path()).unwrap();
        let mut cat = SettingNode::category("c1", "Brigades", None);
        cat.assigned_targets = vec!["works.create.brigades".to_string()];
        store.put(cat, None).await.unwrap();
        store
            .put(
                SettingNode::variable("v1", "North", Some("c1"), ValueType::String),
                None,
            )
            .await
            .unwrap();
    }

    let store = NodeStore::open_jsonl(dir.path()).unwrap();
    let bus = SubscriptionBus::new(store);
    let (tx, mut rx) = mpsc::unbounded_channel::<TargetView>();
    let _sub = bus.subscribe_by_target("works.create.brigades", move |view| {
        let _ = tx.send(view);
    });

    let view = next(&mut rx).await;
    assert_eq!(view.parents.len(), 1);
    assert_eq!(view.merged_children()[0].name, "North");
}
