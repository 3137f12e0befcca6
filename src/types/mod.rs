//! Shared domain types: ack records, categories, actions and collection names.

mod ack;

pub use ack::*;

use serde::Serialize;

/// Requested operation on the ack-manage endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AckAction {
    Show,
    Enable,
    Disable,
}

impl AckAction {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "show" => Some(Self::Show),
            "enable" => Some(Self::Enable),
            "disable" => Some(Self::Disable),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Show => "show",
            Self::Enable => "enable",
            Self::Disable => "disable",
        }
    }
}

impl std::fmt::Display for AckAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Known object categories and the component code of their data collection.
const COMPONENT_MAPPING: [(&str, &str); 6] = [
    ("splk-dsm", "dsm"),
    ("splk-dhm", "dhm"),
    ("splk-mhm", "mhm"),
    ("splk-flx", "flx"),
    ("splk-cim", "cim"),
    ("splk-wlk", "wlk"),
];

/// Component code for a category, `None` for categories outside the known set.
pub fn component_for_category(category: &str) -> Option<&'static str> {
    COMPONENT_MAPPING
        .iter()
        .find(|(cat, _)| *cat == category)
        .map(|(_, component)| *component)
}

/// Collection holding the ack records of a tenant.
pub fn ack_collection_name(tenant_id: &str) -> String {
    format!("kv_trackme_common_alerts_ack_tenant_{tenant_id}")
}

/// Collection holding the entity data (and current anomaly reason) of a
/// tenant's component.
pub fn data_collection_name(component: &str, tenant_id: &str) -> String {
    format!("kv_trackme_{component}_tenant_{tenant_id}")
}

/// Collection receiving audit events when the collection audit sink is used.
pub fn audit_collection_name(tenant_id: &str) -> String {
    format!("kv_trackme_audit_changes_tenant_{tenant_id}")
}
