//! Static target catalog.
//!
//! A target is a fixed integration point of the application that a settings
//! node can be bound to: a dropdown option list, a scalar default, or a
//! boolean feature flag. The catalog is configuration of the application
//! itself, declared once at process start and never mutated at runtime.

use serde::Serialize;

use crate::models::SettingValue;

/// How a bound node's data is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// Children of bound nodes become selectable options
    List,
    /// Exactly one resolved scalar (first bound node after sort wins)
    Value,
    /// A boolean obtained by coercing the resolved value
    Flag,
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TargetKind::List => "list",
            TargetKind::Value => "value",
            TargetKind::Flag => "flag",
        };
        write!(f, "{}", s)
    }
}

/// One catalog entry.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Target {
    pub id: &'static str,
    pub label: &'static str,
    pub kind: TargetKind,
}

/// Target id the equipment-revision checklist projector subscribes to.
pub const CHECKLIST_TARGET: &str = "equipment.revision.checklist";

/// The application's integration points.
pub const TARGET_CATALOG: &[Target] = &[
    Target {
        id: "works.create.timeSlots",
        label: "Work order time slots",
        kind: TargetKind::List,
    },
    Target {
        id: "works.create.brigades",
        label: "Brigade roster",
        kind: TargetKind::List,
    },
    Target {
        id: CHECKLIST_TARGET,
        label: "Equipment revision checklist sections",
        kind: TargetKind::List,
    },
    Target {
        id: "works.defaults.warrantyMonths",
        label: "Default warranty period (months)",
        kind: TargetKind::Value,
    },
    Target {
        id: "reports.header.companyName",
        label: "Report header company name",
        kind: TargetKind::Value,
    },
    Target {
        id: "features.offers.enabled",
        label: "Offer workflow toggle",
        kind: TargetKind::Flag,
    },
    Target {
        id: "features.archive.autoEligible",
        label: "Automatic archive eligibility",
        kind: TargetKind::Flag,
    },
];

/// Look up a catalog entry by id.
pub fn find_target(id: &str) -> Option<&'static Target> {
    TARGET_CATALOG.iter().find(|t| t.id == id)
}

/// String values that coerce to `true`, compared trimmed and lowercased.
const TRUTHY_STRINGS: &[&str] = &["true", "1", "da", "on"];

/// Total boolean coercion for flag-kind targets.
///
/// Booleans pass through, nonzero numbers are true, a small set of strings
/// is true, and everything else (json, absent) is false.
pub fn to_boolean(value: Option<&SettingValue>) -> bool {
    match value {
        Some(SettingValue::Boolean(b)) => *b,
        Some(SettingValue::Number(n)) => *n != 0.0,
        Some(SettingValue::String(s)) => {
            let s = s.trim().to_lowercase();
            TRUTHY_STRINGS.contains(&s.as_str())
        }
        Some(SettingValue::Json(_)) | None => false,
    }
}
