//! CLI tests for target catalog commands and kind projections.

mod common;

use common::TestEnv;
use predicates::prelude::*;

#[test]
fn test_target_list_shows_catalog() {
    let env = TestEnv::new();
    let json = env.fst_json(&["target", "list"]);
    let ids: Vec<_> = json["targets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap().to_string())
        .collect();
    assert!(ids.contains(&"works.create.timeSlots".to_string()));
    assert!(ids.contains(&"features.offers.enabled".to_string()));
}

#[test]
fn test_unknown_target_is_rejected() {
    let env = TestEnv::init();
    env.fst()
        .args(["target", "show", "no.such.target"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown target"));
}

#[test]
fn test_list_target_projects_children_in_order() {
    let env = TestEnv::init();
    let parent = env.create_node(&["Shift Types", "--target", "works.create.timeSlots"]);
    env.create_node(&[
        "16:00-00:00", "--parent", &parent, "--type", "string", "--order", "1",
    ]);
    env.create_node(&[
        "08:00-16:00", "--parent", &parent, "--type", "string", "--order", "0",
    ]);

    let json = env.fst_json(&["target", "show", "works.create.timeSlots"]);
    assert_eq!(json["kind"], "list");
    assert_eq!(json["bound"], 1);
    let labels: Vec<_> = json["options"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["label"].as_str().unwrap())
        .collect();
    assert_eq!(labels, vec!["08:00-16:00", "16:00-00:00"]);
}

#[test]
fn test_unbound_list_target_is_empty_not_an_error() {
    let env = TestEnv::init();
    let json = env.fst_json(&["target", "show", "works.create.brigades"]);
    assert_eq!(json["bound"], 0);
    assert!(json["options"].as_array().unwrap().is_empty());
}

#[test]
fn test_value_target_first_bound_wins() {
    let env = TestEnv::init();
    env.create_node(&[
        "Primary",
        "--type",
        "string",
        "--value",
        "Acme Field Services",
        "--order",
        "0",
        "--target",
        "reports.header.companyName",
    ]);
    env.create_node(&[
        "Secondary",
        "--type",
        "string",
        "--value",
        "Shadow Co",
        "--order",
        "1",
        "--target",
        "reports.header.companyName",
    ]);

    let json = env.fst_json(&["target", "show", "reports.header.companyName"]);
    assert_eq!(json["kind"], "value");
    assert_eq!(json["value"], "Acme Field Services");
}

#[test]
fn test_flag_target_coerces_and_updates() {
    let env = TestEnv::init();
    let id = env.create_node(&[
        "Offers",
        "--type",
        "number",
        "--value",
        "1",
        "--target",
        "features.offers.enabled",
    ]);

    let json = env.fst_json(&["target", "show", "features.offers.enabled"]);
    assert_eq!(json["flag"], true);

    // rebinding the value flips the flag on the next read
    env.fst()
        .args(["node", "update", &id, "--clear-value"])
        .assert()
        .success();
    env.fst()
        .args(["node", "update", &id, "--value", "0"])
        .assert()
        .success();

    let json = env.fst_json(&["target", "show", "features.offers.enabled"]);
    assert_eq!(json["flag"], false);
}

#[test]
fn test_unbound_flag_target_reads_off() {
    let env = TestEnv::init();
    let json = env.fst_json(&["target", "show", "features.archive.autoEligible"]);
    assert_eq!(json["flag"], false);
}

#[test]
fn test_checklist_empty_has_sentinel_version() {
    let env = TestEnv::init();
    let json = env.fst_json(&["checklist"]);
    assert_eq!(json["version"], 0);
    assert!(json["sections"].as_array().unwrap().is_empty());
    assert_eq!(json["states"][0], "Functional");
    assert_eq!(json["states"][1], "Nefunctional");
}

#[test]
fn test_checklist_projects_sections_and_items() {
    let env = TestEnv::init();
    let section = env.create_node(&[
        "Electrics",
        "--target",
        "equipment.revision.checklist",
    ]);
    env.create_node(&["Breaker state", "--parent", &section, "--type", "string"]);
    // a nested category is not an item
    env.create_node(&["Subgroup", "--parent", &section]);

    let json = env.fst_json(&["checklist"]);
    assert!(json["version"].as_u64().unwrap() > 0);
    let sections = json["sections"].as_array().unwrap();
    assert_eq!(sections.len(), 1);
    assert_eq!(sections[0]["title"], "Electrics");
    let items = sections[0]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["label"], "Breaker state");
}
