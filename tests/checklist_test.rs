//! Library-level checklist projector tests over the file-backed store.

use std::time::Duration;

use fieldset::checklist::{Checklist, ChecklistProjector, EMPTY_CHECKLIST_VERSION};
use fieldset::models::{SettingNode, SettingValue, ValueType};
use fieldset::store::NodeStore;
use fieldset::targets::CHECKLIST_TARGET;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);

async fn next(rx: &mut mpsc::UnboundedReceiver<Checklist>) -> Checklist {
    timeout(WAIT, rx.recv())
        .await
        .expect("checklist emission timed out")
        .expect("checklist channel closed")
}

#[tokio::test]
async fn test_live_checklist_follows_tree_changes() {
    let dir = TempDir::new().unwrap();
    let store = NodeStore::init_jsonl(dir.path()).unwrap();

    let projector = ChecklistProjector::new(store.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let sub = projector.subscribe(move |checklist| {
        let _ = tx.send(checklist);
    });

    // consumers always get an initial state, even with nothing bound
    let initial = next(&mut rx).await;
    assert!(initial.is_empty());
    assert_eq!(initial.version, EMPTY_CHECKLIST_VERSION);
    assert_eq!(initial.states, ["Functional", "Nefunctional"]);

    // binding a section produces a live update
    let mut section = SettingNode::category("s1", "Hydraulics", None);
    section.assigned_targets = vec![CHECKLIST_TARGET.to_string()];
    store.put(section, Some("admin")).await.unwrap();

    let with_section = next(&mut rx).await;
    assert_eq!(with_section.sections.len(), 1);
    assert_eq!(with_section.sections[0].title, "Hydraulics");
    assert!(with_section.version > EMPTY_CHECKLIST_VERSION);

    // items appear as variable children arrive
    store
        .put(
            SettingNode::variable("i1", "Hose wear", Some("s1"), ValueType::String)
                .with_value(SettingValue::String("inspect".to_string())),
            Some("admin"),
        )
        .await
        .unwrap();

    let with_item = next(&mut rx).await;
    assert_eq!(with_item.sections[0].items.len(), 1);
    assert_eq!(with_item.sections[0].items[0].label, "Hose wear");
    assert_eq!(
        with_item.sections[0].items[0].value,
        Some(SettingValue::String("inspect".to_string()))
    );
    assert!(with_item.version > with_section.version);

    sub.unsubscribe();

    // no emissions after unsubscribe
    store
        .put(
            SettingNode::variable("i2", "Pump seal", Some("s1"), ValueType::String),
            Some("admin"),
        )
        .await
        .unwrap();
    let quiet = timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(quiet.is_err() || quiet.unwrap().is_none());
}

#[tokio::test]
async fn test_snapshot_matches_subscription_shape() {
    let dir = TempDir::new().unwrap();
    let store = NodeStore::init_jsonl(dir.path()).unwrap();

    let mut section = SettingNode::category("s1", "Electrics", None);
    section.assigned_targets = vec![CHECKLIST_TARGET.to_string()];
    store.put(section, None).await.unwrap();
    store
        .put(
            SettingNode::variable("i1", "Breaker state", Some("s1"), ValueType::String),
            None,
        )
        .await
        .unwrap();

    let projector = ChecklistProjector::new(store);
    let snapshot = projector.snapshot().await.unwrap();
    assert_eq!(snapshot.sections.len(), 1);
    assert_eq!(snapshot.sections[0].items.len(), 1);
    assert_eq!(snapshot.states, ["Functional", "Nefunctional"]);
}
