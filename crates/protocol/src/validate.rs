//! Structural validation of inbound wire data.
//!
//! Checks run over raw `serde_json::Value`s so every violation can be
//! reported with its field path, instead of stopping at serde's first
//! error. Business rules (sequence continuity, patch semantics) do not
//! belong here — they live in `genui-stream`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ControlAction, PROTOCOL_VERSION, PatchOp, ProgressStatus, WireFrame, codes};

// ── Result types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub path: String,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub path: String,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub auto_fixed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: vec![],
            warnings: vec![],
        }
    }

    pub fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings: vec![],
        }
    }
}

pub(crate) fn err(
    path: impl Into<String>,
    code: &str,
    message: impl Into<String>,
) -> ValidationError {
    ValidationError {
        path: path.into(),
        code: code.into(),
        message: message.into(),
    }
}

// ── Frame envelope ───────────────────────────────────────────────────────────

/// Structural check of a complete frame: envelope plus event.
pub fn check_frame(data: &Value) -> Vec<ValidationError> {
    let Some(obj) = data.as_object() else {
        return vec![err("", codes::INVALID_TYPE, "Frame must be a JSON object")];
    };
    let mut errors = Vec::new();

    match obj.get("version") {
        Some(Value::String(v)) if v == PROTOCOL_VERSION => {},
        Some(Value::String(v)) => errors.push(err(
            "version",
            codes::INVALID_VALUE,
            format!("Unsupported protocol version \"{v}\", expected \"{PROTOCOL_VERSION}\""),
        )),
        Some(_) => errors.push(err("version", codes::INVALID_TYPE, "Version must be a string")),
        None => errors.push(err("version", codes::REQUIRED, "Version is required")),
    }

    match obj.get("correlationId") {
        Some(Value::String(id)) if !id.is_empty() => {},
        Some(Value::String(_)) => errors.push(err(
            "correlationId",
            codes::INVALID_VALUE,
            "Correlation id must be non-empty",
        )),
        Some(_) => errors.push(err(
            "correlationId",
            codes::INVALID_TYPE,
            "Correlation id must be a string",
        )),
        None => errors.push(err(
            "correlationId",
            codes::REQUIRED,
            "Correlation id is required",
        )),
    }

    check_non_negative_int(obj.get("sequence"), "sequence", codes::INVALID_SEQUENCE, &mut errors);
    check_non_negative_int(obj.get("timestamp"), "timestamp", codes::INVALID_VALUE, &mut errors);

    match obj.get("event") {
        Some(event) => {
            for mut e in check_event(event) {
                e.path = if e.path.is_empty() {
                    "event".into()
                } else {
                    format!("event.{}", e.path)
                };
                errors.push(e);
            }
        },
        None => errors.push(err("event", codes::REQUIRED, "Event is required")),
    }

    errors
}

fn check_non_negative_int(
    value: Option<&Value>,
    path: &str,
    range_code: &str,
    errors: &mut Vec<ValidationError>,
) {
    match value {
        Some(Value::Number(n)) => {
            if n.as_u64().is_none() {
                errors.push(err(
                    path,
                    range_code,
                    format!("{path} must be a non-negative integer"),
                ));
            }
        },
        Some(_) => errors.push(err(
            path,
            codes::INVALID_TYPE,
            format!("{path} must be a number"),
        )),
        None => errors.push(err(path, codes::REQUIRED, format!("{path} is required"))),
    }
}

// ── Events ───────────────────────────────────────────────────────────────────

/// Structural check of one event.
pub fn check_event(data: &Value) -> Vec<ValidationError> {
    let Some(obj) = data.as_object() else {
        return vec![err("", codes::INVALID_TYPE, "Event must be a JSON object")];
    };
    let mut errors = Vec::new();

    let kind = match obj.get("kind") {
        Some(Value::String(k)) => k.as_str(),
        Some(_) => {
            errors.push(err("kind", codes::INVALID_TYPE, "Event kind must be a string"));
            return errors;
        },
        None => {
            errors.push(err("kind", codes::REQUIRED, "Event kind is required"));
            return errors;
        },
    };

    match kind {
        "control" => check_control(obj, &mut errors),
        "progress" => check_progress(obj, &mut errors),
        "patch" => check_patch_event(obj, &mut errors),
        "message" => check_message_fields(obj, &mut errors),
        "error" => check_error(obj, &mut errors),
        "done" => check_optional_string(obj, "state", &mut errors),
        other => errors.push(err(
            "kind",
            codes::INVALID_VALUE,
            format!("Unknown event kind \"{other}\""),
        )),
    }

    errors
}

fn check_control(obj: &serde_json::Map<String, Value>, errors: &mut Vec<ValidationError>) {
    match obj.get("action") {
        Some(action @ Value::String(name)) => {
            if serde_json::from_value::<ControlAction>(action.clone()).is_err() {
                errors.push(err(
                    "action",
                    codes::INVALID_VALUE,
                    format!("Unknown control action \"{name}\""),
                ));
            }
        },
        Some(_) => errors.push(err(
            "action",
            codes::INVALID_TYPE,
            "Control action must be a string",
        )),
        None => errors.push(err("action", codes::REQUIRED, "Control action is required")),
    }
    check_optional_string(obj, "state", errors);
}

fn check_progress(obj: &serde_json::Map<String, Value>, errors: &mut Vec<ValidationError>) {
    for field in ["state", "toolName", "toolCallId", "message"] {
        check_optional_string(obj, field, errors);
    }
    if let Some(status @ Value::String(name)) = obj.get("status") {
        if serde_json::from_value::<ProgressStatus>(status.clone()).is_err() {
            errors.push(err(
                "status",
                codes::INVALID_VALUE,
                format!("Unknown progress status \"{name}\""),
            ));
        }
    } else if matches!(obj.get("status"), Some(_)) {
        errors.push(err("status", codes::INVALID_TYPE, "Status must be a string"));
    }
    match obj.get("progress") {
        Some(Value::Number(n)) => {
            let v = n.as_f64().unwrap_or(-1.0);
            if !(0.0..=100.0).contains(&v) {
                errors.push(err(
                    "progress",
                    codes::INVALID_VALUE,
                    "Progress must be between 0 and 100",
                ));
            }
        },
        Some(_) => errors.push(err("progress", codes::INVALID_TYPE, "Progress must be a number")),
        None => {},
    }
}

fn check_patch_event(obj: &serde_json::Map<String, Value>, errors: &mut Vec<ValidationError>) {
    let patch = obj.get("patch");
    let patches = obj.get("patches");

    let has_single = patch.is_some();
    let has_batch = patches
        .and_then(Value::as_array)
        .is_some_and(|a| !a.is_empty());
    if !has_single && !has_batch {
        errors.push(err("", codes::REQUIRED, "patch or patches is required"));
        return;
    }

    if let Some(p) = patch {
        for mut e in check_patch_shape(p) {
            e.path = prefix_path("patch", &e.path);
            errors.push(e);
        }
    }
    if let Some(list) = patches {
        match list.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    for mut e in check_patch_shape(item) {
                        e.path = prefix_path(&format!("patches.{i}"), &e.path);
                        errors.push(e);
                    }
                }
            },
            None => errors.push(err("patches", codes::INVALID_TYPE, "patches must be an array")),
        }
    }
}

/// Wire-level patch shape: op membership and field types only. A patch
/// payload is either a strict tree mutation or one of the legacy
/// side-channel kinds — the semantic split is the contract's job.
fn check_patch_shape(data: &Value) -> Vec<ValidationError> {
    let Some(obj) = data.as_object() else {
        return vec![err("", codes::INVALID_TYPE, "Patch must be a JSON object")];
    };
    let mut errors = Vec::new();

    match obj.get("op") {
        Some(op @ Value::String(name)) => {
            if serde_json::from_value::<PatchOp>(op.clone()).is_err() {
                errors.push(err(
                    "op",
                    codes::INVALID_VALUE,
                    format!("Unknown patch op \"{name}\""),
                ));
            }
        },
        Some(_) => errors.push(err("op", codes::INVALID_TYPE, "Patch op must be a string")),
        None => errors.push(err("op", codes::REQUIRED, "Patch op is required")),
    }
    check_optional_string(obj, "path", &mut errors);
    check_optional_string(obj, "from", &mut errors);
    errors
}

/// Structural check of a standalone message payload.
pub fn check_message(data: &Value) -> Vec<ValidationError> {
    let Some(obj) = data.as_object() else {
        return vec![err("", codes::INVALID_TYPE, "Message must be a JSON object")];
    };
    let mut errors = Vec::new();
    check_message_fields(obj, &mut errors);
    errors
}

fn check_message_fields(obj: &serde_json::Map<String, Value>, errors: &mut Vec<ValidationError>) {
    match obj.get("content") {
        Some(Value::String(c)) if !c.is_empty() => {},
        Some(Value::String(_)) => errors.push(err(
            "content",
            codes::INVALID_VALUE,
            "Message content must be non-empty",
        )),
        Some(_) => errors.push(err(
            "content",
            codes::INVALID_TYPE,
            "Message content must be a string",
        )),
        None => errors.push(err("content", codes::REQUIRED, "Message content is required")),
    }
    check_optional_string(obj, "id", errors);
    check_enum_member::<crate::MessageRole>(obj, "role", errors);
    check_enum_member::<crate::MessageMode>(obj, "mode", errors);
}

fn check_error(obj: &serde_json::Map<String, Value>, errors: &mut Vec<ValidationError>) {
    for field in ["code", "message"] {
        match obj.get(field) {
            Some(Value::String(v)) if !v.is_empty() => {},
            Some(Value::String(_)) => errors.push(err(
                field,
                codes::INVALID_VALUE,
                format!("Error {field} must be non-empty"),
            )),
            Some(_) => errors.push(err(
                field,
                codes::INVALID_TYPE,
                format!("Error {field} must be a string"),
            )),
            None => errors.push(err(field, codes::REQUIRED, format!("Error {field} is required"))),
        }
    }
    if let Some(r) = obj.get("recoverable")
        && !r.is_boolean()
    {
        errors.push(err(
            "recoverable",
            codes::INVALID_TYPE,
            "recoverable must be a boolean",
        ));
    }
    check_optional_string(obj, "state", errors);
}

fn check_enum_member<T: serde::de::DeserializeOwned>(
    obj: &serde_json::Map<String, Value>,
    field: &str,
    errors: &mut Vec<ValidationError>,
) {
    match obj.get(field) {
        Some(v @ Value::String(name)) => {
            if serde_json::from_value::<T>(v.clone()).is_err() {
                errors.push(err(
                    field,
                    codes::INVALID_VALUE,
                    format!("Unknown {field} \"{name}\""),
                ));
            }
        },
        Some(_) => errors.push(err(field, codes::INVALID_TYPE, format!("{field} must be a string"))),
        None => {},
    }
}

fn check_optional_string(
    obj: &serde_json::Map<String, Value>,
    field: &str,
    errors: &mut Vec<ValidationError>,
) {
    if let Some(v) = obj.get(field)
        && !v.is_string()
        && !v.is_null()
    {
        errors.push(err(field, codes::INVALID_TYPE, format!("{field} must be a string")));
    }
}

fn prefix_path(prefix: &str, path: &str) -> String {
    if path.is_empty() {
        prefix.into()
    } else {
        format!("{prefix}.{path}")
    }
}

// ── Generic patch check ──────────────────────────────────────────────────────

/// Generic JSON-Patch-level check of a standalone patch value: op
/// membership, path shape, `value` for `add`/`replace`, `from` for
/// `move`/`copy`.
pub fn check_patch(data: &Value) -> Vec<ValidationError> {
    let mut errors = check_patch_shape(data);
    if !errors.is_empty() {
        return errors;
    }
    let Some(obj) = data.as_object() else {
        return errors;
    };

    let path = obj.get("path").and_then(Value::as_str).unwrap_or_default();
    if !path.starts_with('/') {
        errors.push(err("path", codes::INVALID_PATH, "Path must start with /"));
    }

    let op = obj.get("op").and_then(Value::as_str).unwrap_or_default();
    if matches!(op, "add" | "replace") && !obj.contains_key("value") {
        errors.push(err(
            "value",
            codes::MISSING_VALUE,
            format!("Value required for {op} operation"),
        ));
    }
    if matches!(op, "move" | "copy")
        && obj.get("from").and_then(Value::as_str).unwrap_or_default().is_empty()
    {
        errors.push(err(
            "from",
            codes::MISSING_FROM,
            format!("From path required for {op} operation"),
        ));
    }
    errors
}

// ── Element check ────────────────────────────────────────────────────────────

/// Structural check of a UI element payload.
pub fn check_element(data: &Value) -> Vec<ValidationError> {
    let Some(obj) = data.as_object() else {
        return vec![err("", codes::INVALID_TYPE, "Element must be a JSON object")];
    };
    let mut errors = Vec::new();

    for field in ["key", "type"] {
        match obj.get(field) {
            Some(Value::String(v)) if !v.is_empty() => {},
            Some(Value::String(_)) => errors.push(err(
                field,
                codes::INVALID_VALUE,
                format!("Element {field} must be non-empty"),
            )),
            Some(_) => errors.push(err(
                field,
                codes::INVALID_TYPE,
                format!("Element {field} must be a string"),
            )),
            None => {
                errors.push(err(field, codes::REQUIRED, format!("Element {field} is required")));
            },
        }
    }

    match obj.get("props") {
        Some(Value::Object(_)) => {},
        Some(_) => errors.push(err("props", codes::INVALID_TYPE, "Element props must be an object")),
        None => errors.push(err("props", codes::REQUIRED, "Element props are required")),
    }

    match obj.get("children") {
        Some(Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                if !item.is_string() {
                    errors.push(err(
                        format!("children.{i}"),
                        codes::INVALID_TYPE,
                        "Child entries must be key strings",
                    ));
                }
            }
        },
        Some(Value::Null) | None => {},
        Some(_) => errors.push(err(
            "children",
            codes::INVALID_TYPE,
            "Element children must be an array of key strings",
        )),
    }

    if let Some(pk) = obj.get("parentKey")
        && !pk.is_string()
        && !pk.is_null()
    {
        errors.push(err("parentKey", codes::INVALID_TYPE, "parentKey must be a string"));
    }

    errors
}

// ── Typed parse ──────────────────────────────────────────────────────────────

/// Validate and deserialize a frame. Fails closed on any structural
/// mismatch; no recovery happens here.
pub fn parse_frame(data: &Value) -> Result<WireFrame, Vec<ValidationError>> {
    let errors = check_frame(data);
    if !errors.is_empty() {
        return Err(errors);
    }
    serde_json::from_value(data.clone())
        .map_err(|e| vec![err("", codes::INVALID_TYPE, format!("Frame failed to decode: {e}"))])
}
