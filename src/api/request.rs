//! Request argument parsing and validation
//!
//! Arguments arrive loosely typed. Validation runs in a fixed order and
//! stops at the first problem, before any store access.

use serde_json::{Map, Value};

use super::envelope::value_text;
use crate::types::{AckAction, AckSource, AckType, AnomalyReason};

/// Default ack period: one day.
pub const DEFAULT_ACK_PERIOD_SECS: i64 = 86_400;

/// Default update comment recorded in the audit trail.
pub const DEFAULT_UPDATE_COMMENT: &str = "API update";

/// Validation failures; the message is returned to the caller verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("tenant_id=\"None\", tenant_id is required")]
    MissingTenant,
    #[error("tenant_id=\"{tenant_id}\", action=\"{action}\", action is incorrect, valid options are show | enable | disable")]
    InvalidAction { tenant_id: String, action: String },
    #[error("tenant_id=\"{tenant_id}\", action=\"{action}\", object_list is required")]
    MissingObjectList { tenant_id: String, action: AckAction },
    /// `object_list` must be a comma separated string or a non-empty
    /// array of names.
    #[error("tenant_id=\"{tenant_id}\", object_list=\"{value}\", object_list is incorrect, a comma separated list of entities is expected")]
    InvalidObjectList { tenant_id: String, value: String },
    /// `*` selects every record of the category and is only valid for
    /// show; enable/disable never write a literal `*` entity.
    #[error("tenant_id=\"{tenant_id}\", action=\"{action}\", object_list=\"*\" is only supported with action=show")]
    WildcardNotAllowed { tenant_id: String, action: AckAction },
    #[error("tenant_id=\"{tenant_id}\", object_category is required")]
    MissingCategory { tenant_id: String },
    #[error("tenant_id=\"{tenant_id}\", ack_period=\"{value}\", ack_period period is incorrect, an integer is expected")]
    InvalidAckPeriod { tenant_id: String, value: String },
    #[error("tenant_id=\"{tenant_id}\", ack_type=\"{value}\", ack_type is incorrect, valid options are sticky | unsticky")]
    InvalidAckType { tenant_id: String, value: String },
    #[error("tenant_id=\"{tenant_id}\", ack_source=\"{value}\", ack_source is incorrect, valid options are auto_ack | user_ack")]
    InvalidAckSource { tenant_id: String, value: String },
}

/// Which objects a request targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectSelection {
    /// Every record of the tenant+category (`*`)
    All,
    List(Vec<String>),
}

/// Look up an argument, treating explicit `null` as absent.
fn arg<'a>(args: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    args.get(name).filter(|v| !v.is_null())
}

pub(crate) fn parse_tenant(args: &Map<String, Value>) -> Result<String, RequestError> {
    arg(args, "tenant_id")
        .map(value_text)
        .ok_or(RequestError::MissingTenant)
}

pub(crate) fn parse_category(
    args: &Map<String, Value>,
    tenant_id: &str,
) -> Result<String, RequestError> {
    arg(args, "object_category")
        .map(value_text)
        .ok_or_else(|| RequestError::MissingCategory {
            tenant_id: tenant_id.to_string(),
        })
}

/// Parse `object_list`; `None` when it was not supplied.
pub(crate) fn parse_object_list(
    args: &Map<String, Value>,
    tenant_id: &str,
) -> Result<Option<ObjectSelection>, RequestError> {
    let Some(value) = arg(args, "object_list") else {
        return Ok(None);
    };

    match value {
        Value::String(s) if s == "*" => Ok(Some(ObjectSelection::All)),
        Value::String(s) => Ok(Some(ObjectSelection::List(
            s.split(',').map(str::to_string).collect(),
        ))),
        Value::Array(items) if !items.is_empty() => Ok(Some(ObjectSelection::List(
            items.iter().map(value_text).collect(),
        ))),
        other => Err(RequestError::InvalidObjectList {
            tenant_id: tenant_id.to_string(),
            value: value_text(other),
        }),
    }
}

/// Accepts integers, floats (truncated) and strings holding an integer.
fn parse_ack_period(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64().filter(|f| f.is_finite()).map(|f| {
                #[allow(clippy::cast_possible_truncation)]
                let secs = f.trunc() as i64;
                secs
            })
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Validated arguments of the ack-manage endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct AckManageRequest {
    pub tenant_id: String,
    pub action: AckAction,
    pub object_category: String,
    pub objects: ObjectSelection,
    pub ack_period: i64,
    pub ack_type: AckType,
    pub ack_comment: Option<String>,
    pub ack_source: AckSource,
    pub anomaly_reason: AnomalyReason,
    pub update_comment: String,
}

impl AckManageRequest {
    pub fn from_args(args: &Map<String, Value>) -> Result<Self, RequestError> {
        let tenant_id = parse_tenant(args)?;

        let action = match args.get("action") {
            None => AckAction::Show,
            Some(value) => match value.as_str().and_then(AckAction::parse) {
                Some(action) => action,
                None => {
                    return Err(RequestError::InvalidAction {
                        tenant_id,
                        action: value_text(value),
                    })
                }
            },
        };

        let objects = match (parse_object_list(args, &tenant_id)?, action) {
            (None, AckAction::Show) => ObjectSelection::All,
            (None, _) => return Err(RequestError::MissingObjectList { tenant_id, action }),
            (Some(ObjectSelection::All), AckAction::Enable | AckAction::Disable) => {
                return Err(RequestError::WildcardNotAllowed { tenant_id, action })
            }
            (Some(selection), _) => selection,
        };

        let object_category = parse_category(args, &tenant_id)?;

        let ack_period = match args.get("ack_period") {
            None => DEFAULT_ACK_PERIOD_SECS,
            Some(value) => parse_ack_period(value).ok_or_else(|| RequestError::InvalidAckPeriod {
                tenant_id: tenant_id.clone(),
                value: value_text(value),
            })?,
        };

        let ack_type = match args.get("ack_type") {
            None => AckType::Unsticky,
            Some(value) => value
                .as_str()
                .and_then(AckType::parse_requested)
                .ok_or_else(|| RequestError::InvalidAckType {
                    tenant_id: tenant_id.clone(),
                    value: value_text(value),
                })?,
        };

        let ack_comment = arg(args, "ack_comment").map(value_text);

        let anomaly_reason = arg(args, "anomaly_reason")
            .map(AnomalyReason::from_value)
            .unwrap_or_default();

        let ack_source = match args.get("ack_source") {
            None => AckSource::UserAck,
            Some(value) => value
                .as_str()
                .and_then(AckSource::parse)
                .ok_or_else(|| RequestError::InvalidAckSource {
                    tenant_id: tenant_id.clone(),
                    value: value_text(value),
                })?,
        };

        let update_comment = arg(args, "update_comment")
            .map_or_else(|| DEFAULT_UPDATE_COMMENT.to_string(), value_text);

        Ok(Self {
            tenant_id,
            action,
            object_category,
            objects,
            ack_period,
            ack_type,
            ack_comment,
            ack_source,
            anomaly_reason,
            update_comment,
        })
    }

    /// Comment stored on the record: the explicit ack comment, else the
    /// update comment.
    pub fn effective_ack_comment(&self) -> &str {
        self.ack_comment.as_deref().unwrap_or(&self.update_comment)
    }
}

/// Validated arguments of the get-ack-for-object endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetAckRequest {
    pub tenant_id: String,
    pub object_category: String,
    pub objects: ObjectSelection,
}

impl GetAckRequest {
    pub fn from_args(args: &Map<String, Value>) -> Result<Self, RequestError> {
        let tenant_id = parse_tenant(args)?;
        let objects = parse_object_list(args, &tenant_id)?.unwrap_or(ObjectSelection::All);
        let object_category = parse_category(args, &tenant_id)?;

        Ok(Self {
            tenant_id,
            object_category,
            objects,
        })
    }
}
