//! Ack record and its enumerated fields
//!
//! Records are read back from collections that may have been written by
//! other tools, so numeric fields accept both JSON numbers and numeric
//! strings, and every field has a default.

use serde::{Deserialize, Deserializer, Serialize};

/// Sentinel stored when no anomaly reason or ack type applies.
pub const NOT_APPLICABLE: &str = "N/A";

/// Who raised the acknowledgment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckSource {
    AutoAck,
    #[default]
    UserAck,
}

impl AckSource {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "auto_ack" => Some(Self::AutoAck),
            "user_ack" => Some(Self::UserAck),
            _ => None,
        }
    }
}

/// Whether the ack currently silences alerts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckState {
    Active,
    #[default]
    Inactive,
}

/// Ack persistence policy.
///
/// Unsticky acks are purged externally once the entity recovers; sticky acks
/// live until their expiration. Disabled records carry `N/A`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AckType {
    #[serde(rename = "sticky")]
    Sticky,
    #[default]
    #[serde(rename = "unsticky")]
    Unsticky,
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl AckType {
    /// Parse a requested ack type. `N/A` is reserved for disabled records
    /// and is not accepted from callers.
    pub fn parse_requested(value: &str) -> Option<Self> {
        match value {
            "sticky" => Some(Self::Sticky),
            "unsticky" => Some(Self::Unsticky),
            _ => None,
        }
    }
}

/// Anomaly reason as stored: free text, a comma-joined string, or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnomalyReason {
    Text(String),
    List(Vec<String>),
}

impl Default for AnomalyReason {
    fn default() -> Self {
        Self::Text(NOT_APPLICABLE.to_string())
    }
}

impl AnomalyReason {
    pub fn is_not_applicable(&self) -> bool {
        matches!(self, Self::Text(text) if text == NOT_APPLICABLE)
    }

    /// Render for display: a list of reasons, or `N/A` when nothing is set.
    pub fn normalized(&self) -> serde_json::Value {
        match self {
            Self::Text(text) if text.is_empty() => serde_json::json!(NOT_APPLICABLE),
            Self::Text(text) => serde_json::json!(text.split(',').collect::<Vec<_>>()),
            Self::List(items) if items.is_empty() => serde_json::json!(NOT_APPLICABLE),
            Self::List(items) => serde_json::json!(items),
        }
    }

    /// Best-effort conversion from an arbitrary JSON value found in a
    /// request or a data collection.
    pub fn from_value(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::default(),
            serde_json::Value::String(text) => Self::Text(text.clone()),
            serde_json::Value::Array(items) => Self::List(
                items
                    .iter()
                    .map(|item| match item {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            other => Self::Text(other.to_string()),
        }
    }
}

/// One acknowledgment, unique per (tenant, object) inside a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AckRecord {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub object_category: String,
    #[serde(default)]
    pub anomaly_reason: AnomalyReason,
    #[serde(default)]
    pub ack_source: AckSource,
    /// Epoch seconds; 0 when not applicable
    #[serde(default, deserialize_with = "lenient_epoch")]
    pub ack_expiration: f64,
    #[serde(default)]
    pub ack_state: AckState,
    #[serde(default, deserialize_with = "lenient_epoch")]
    pub ack_mtime: f64,
    #[serde(default)]
    pub ack_type: AckType,
    #[serde(default)]
    pub ack_comment: String,
}

impl AckRecord {
    pub fn is_enabled(&self) -> bool {
        self.ack_state == AckState::Active
    }
}

/// An ack record together with the key the store assigned to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAck {
    #[serde(rename = "_key")]
    pub key: String,
    #[serde(flatten)]
    pub record: AckRecord,
}

impl StoredAck {
    /// Read a stored document field by field.
    ///
    /// Only `_key` and `object` are required. Any other field that is
    /// missing or holds an unexpected value falls back to its default, so
    /// a row written by another tool still maps to its key.
    pub fn from_document(doc: &serde_json::Map<String, serde_json::Value>) -> Option<Self> {
        let key = doc.get("_key")?.as_str()?.to_string();
        let object = doc.get("object")?.as_str()?.to_string();

        let record = AckRecord {
            object,
            object_category: field(doc, "object_category"),
            anomaly_reason: doc
                .get("anomaly_reason")
                .map(AnomalyReason::from_value)
                .unwrap_or_default(),
            ack_source: field(doc, "ack_source"),
            ack_expiration: epoch_field(doc, "ack_expiration"),
            ack_state: field(doc, "ack_state"),
            ack_mtime: epoch_field(doc, "ack_mtime"),
            ack_type: field(doc, "ack_type"),
            ack_comment: field(doc, "ack_comment"),
        };

        Some(Self { key, record })
    }
}

fn field<T>(doc: &serde_json::Map<String, serde_json::Value>, name: &str) -> T
where
    T: serde::de::DeserializeOwned + Default,
{
    doc.get(name)
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_default()
}

fn epoch_field(doc: &serde_json::Map<String, serde_json::Value>, name: &str) -> f64 {
    doc.get(name)
        .and_then(|value| lenient_epoch(value.clone()).ok())
        .unwrap_or_default()
}

/// Accept numbers, numeric strings, empty strings and null for epoch fields.
fn lenient_epoch<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Null => Ok(0.0),
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| D::Error::custom("epoch out of range")),
        serde_json::Value::String(s) if s.trim().is_empty() => Ok(0.0),
        serde_json::Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| D::Error::custom(format!("invalid epoch {s:?}: {e}"))),
        other => Err(D::Error::custom(format!("invalid epoch {other}"))),
    }
}
