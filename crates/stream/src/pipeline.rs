//! Inbound validation pipeline with best-effort auto-recovery.
//!
//! The outward-facing answer to "is this inbound data usable". Structural
//! checks come from `genui-protocol`; this layer adds the component-catalog
//! cross-check and envelope auto-fix. Validation never panics and never
//! returns `Err` — one malformed frame must not kill a session.

use std::collections::HashSet;

use genui_protocol::{
    PROTOCOL_VERSION, ValidationWarning, WireFrame, codes, now_ms, validate,
};
use serde_json::Value;
use tracing::debug;

/// Result of [`ValidationPipeline::parse_with_recovery`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveredFrame {
    /// The usable frame, when validation (possibly after auto-fix) passed.
    pub frame: Option<WireFrame>,
    pub validation: genui_protocol::ValidationResult,
    pub recovered: bool,
}

/// One pipeline instance per stream session; construct and pass explicitly,
/// never share ambient state across correlation ids.
#[derive(Debug, Clone, Default)]
pub struct ValidationPipeline {
    component_types: HashSet<String>,
}

impl ValidationPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_component_types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut pipeline = Self::new();
        pipeline.register_component_types(types);
        pipeline
    }

    /// Register catalog component names for warning-level element checks.
    pub fn register_component_types<I, S>(&mut self, types: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.component_types.extend(types.into_iter().map(Into::into));
    }

    pub fn validate_frame(&self, data: &Value) -> genui_protocol::ValidationResult {
        genui_protocol::ValidationResult::from_errors(validate::check_frame(data))
    }

    pub fn validate_event(&self, data: &Value) -> genui_protocol::ValidationResult {
        genui_protocol::ValidationResult::from_errors(validate::check_event(data))
    }

    pub fn validate_message(&self, data: &Value) -> genui_protocol::ValidationResult {
        genui_protocol::ValidationResult::from_errors(validate::check_message(data))
    }

    pub fn validate_patch(&self, data: &Value) -> genui_protocol::ValidationResult {
        genui_protocol::ValidationResult::from_errors(validate::check_patch(data))
    }

    /// Structural element check plus the catalog cross-check. An
    /// unrecognized component type is a warning, not an error — the catalog
    /// may simply be incomplete client-side, and unknown components should
    /// not abort rendering.
    pub fn validate_element(&self, data: &Value) -> genui_protocol::ValidationResult {
        let mut result =
            genui_protocol::ValidationResult::from_errors(validate::check_element(data));
        if !result.valid {
            return result;
        }

        if !self.component_types.is_empty()
            && let Some(component) = data.get("type").and_then(Value::as_str)
            && !self.component_types.contains(component)
        {
            result.warnings.push(ValidationWarning {
                path: "type".into(),
                code: codes::UNKNOWN_COMPONENT.into(),
                message: format!("Unknown component type: {component}"),
                auto_fixed: false,
            });
        }
        result
    }

    /// Validate, and when that fails, attempt envelope repair before giving
    /// up. Auto-fix targets omitted boilerplate (version, timestamp,
    /// correlation id, sequence) — never content-level corruption, which
    /// still fails with the original errors.
    pub fn parse_with_recovery(&self, data: &Value) -> RecoveredFrame {
        let validation = self.validate_frame(data);
        if validation.valid {
            return RecoveredFrame {
                frame: validate::parse_frame(data).ok(),
                validation,
                recovered: false,
            };
        }

        if let Some(fixed) = auto_fix(data) {
            let mut revalidation = self.validate_frame(&fixed);
            if revalidation.valid {
                debug!("frame envelope auto-fixed");
                revalidation.warnings.push(ValidationWarning {
                    path: String::new(),
                    code: codes::AUTO_FIXED.into(),
                    message: "Frame was auto-fixed".into(),
                    auto_fixed: true,
                });
                return RecoveredFrame {
                    frame: validate::parse_frame(&fixed).ok(),
                    validation: revalidation,
                    recovered: true,
                };
            }
        }

        RecoveredFrame {
            frame: None,
            validation,
            recovered: false,
        }
    }
}

/// Fill omitted envelope fields with defaults. Only absent, null, or
/// empty-string fields count as omitted; a present-but-wrong-typed value is
/// left alone so revalidation still fails on it. `sequence` alone gets the
/// broader non-number rule.
fn auto_fix(data: &Value) -> Option<Value> {
    let obj = data.as_object()?;
    let mut fixed = obj.clone();

    let omitted = |v: Option<&Value>| {
        matches!(v, None | Some(Value::Null))
            || matches!(v, Some(Value::String(s)) if s.is_empty())
    };
    if omitted(fixed.get("version")) {
        fixed.insert("version".into(), PROTOCOL_VERSION.into());
    }
    if matches!(fixed.get("timestamp"), None | Some(Value::Null)) {
        fixed.insert("timestamp".into(), now_ms().into());
    }
    if omitted(fixed.get("correlationId")) {
        fixed.insert(
            "correlationId".into(),
            uuid::Uuid::new_v4().to_string().into(),
        );
    }
    if !matches!(fixed.get("sequence"), Some(Value::Number(_))) {
        fixed.insert("sequence".into(), 0.into());
    }

    Some(Value::Object(fixed))
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_frame_passes_without_recovery() {
        let pipeline = ValidationPipeline::new();
        let result = pipeline.parse_with_recovery(&json!({
            "version": "3.0",
            "correlationId": "corr-1",
            "sequence": 0,
            "timestamp": 1234,
            "event": {"kind": "done"},
        }));
        assert!(!result.recovered);
        assert!(result.validation.valid);
        assert_eq!(result.frame.unwrap().correlation_id, "corr-1");
    }

    #[test]
    fn recovery_fills_missing_envelope_fields() {
        let pipeline = ValidationPipeline::new();
        let result = pipeline.parse_with_recovery(&json!({
            "sequence": 0,
            "event": {"kind": "done"},
        }));
        assert!(result.recovered);
        let frame = result.frame.unwrap();
        assert_eq!(frame.version, PROTOCOL_VERSION);
        assert!(!frame.correlation_id.is_empty());
        assert!(frame.timestamp > 0);
        assert!(
            result
                .validation
                .warnings
                .iter()
                .any(|w| w.code == codes::AUTO_FIXED && w.auto_fixed)
        );
    }

    #[test]
    fn recovery_defaults_non_numeric_sequence() {
        let pipeline = ValidationPipeline::new();
        let result = pipeline.parse_with_recovery(&json!({
            "version": "3.0",
            "correlationId": "corr-1",
            "sequence": "first",
            "timestamp": 1,
            "event": {"kind": "done"},
        }));
        assert!(result.recovered);
        assert_eq!(result.frame.unwrap().sequence, 0);
    }

    #[test]
    fn recovery_never_masks_content_errors() {
        let pipeline = ValidationPipeline::new();
        let result = pipeline.parse_with_recovery(&json!({
            "event": {"kind": "message", "content": ""},
        }));
        assert!(!result.recovered);
        assert!(result.frame.is_none());
        assert!(
            result
                .validation
                .errors
                .iter()
                .any(|e| e.path == "event.content")
        );
    }

    #[test]
    fn recovery_rejects_wrong_typed_version() {
        let pipeline = ValidationPipeline::new();
        let result = pipeline.parse_with_recovery(&json!({
            "version": 123,
            "correlationId": "corr-1",
            "sequence": 0,
            "timestamp": 1,
            "event": {"kind": "done"},
        }));
        assert!(!result.recovered);
        assert!(result.frame.is_none());
        assert!(
            result
                .validation
                .errors
                .iter()
                .any(|e| e.path == "version" && e.code == codes::INVALID_TYPE)
        );
    }

    #[test]
    fn recovery_rejects_wrong_typed_correlation_id() {
        let pipeline = ValidationPipeline::new();
        let result = pipeline.parse_with_recovery(&json!({
            "version": "3.0",
            "correlationId": 42,
            "sequence": 0,
            "timestamp": 1,
            "event": {"kind": "done"},
        }));
        assert!(!result.recovered);
        assert!(result.frame.is_none());
    }

    #[test]
    fn recovery_rejects_wrong_typed_timestamp() {
        let pipeline = ValidationPipeline::new();
        let result = pipeline.parse_with_recovery(&json!({
            "version": "3.0",
            "correlationId": "corr-1",
            "sequence": 0,
            "timestamp": "late",
            "event": {"kind": "done"},
        }));
        assert!(!result.recovered);
        assert!(result.frame.is_none());
    }

    #[test]
    fn recovery_fills_null_and_empty_envelope_fields() {
        let pipeline = ValidationPipeline::new();
        let result = pipeline.parse_with_recovery(&json!({
            "version": "",
            "correlationId": null,
            "sequence": 0,
            "timestamp": null,
            "event": {"kind": "done"},
        }));
        assert!(result.recovered);
        let frame = result.frame.unwrap();
        assert_eq!(frame.version, PROTOCOL_VERSION);
        assert!(!frame.correlation_id.is_empty());
    }

    #[test]
    fn recovery_leaves_wrong_version_alone() {
        let pipeline = ValidationPipeline::new();
        let result = pipeline.parse_with_recovery(&json!({
            "version": "2.0",
            "correlationId": "corr-1",
            "sequence": 0,
            "timestamp": 1,
            "event": {"kind": "done"},
        }));
        assert!(!result.recovered);
        assert!(result.frame.is_none());
    }

    #[test]
    fn unknown_component_is_warning_not_error() {
        let pipeline = ValidationPipeline::with_component_types(["Card", "Stack"]);
        let result =
            pipeline.validate_element(&json!({"key": "x", "type": "Hologram", "props": {}}));
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].code, codes::UNKNOWN_COMPONENT);
    }

    #[test]
    fn known_component_produces_no_warning() {
        let pipeline = ValidationPipeline::with_component_types(["Card"]);
        let result = pipeline.validate_element(&json!({"key": "x", "type": "Card", "props": {}}));
        assert!(result.valid);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn empty_catalog_skips_component_check() {
        let pipeline = ValidationPipeline::new();
        let result =
            pipeline.validate_element(&json!({"key": "x", "type": "Anything", "props": {}}));
        assert!(result.valid);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn validate_message_requires_content() {
        let pipeline = ValidationPipeline::new();
        assert!(!pipeline.validate_message(&json!({"role": "assistant"})).valid);
        assert!(pipeline.validate_message(&json!({"content": "hi"})).valid);
    }

    #[test]
    fn validate_patch_checks_generic_rules() {
        let pipeline = ValidationPipeline::new();
        let result = pipeline.validate_patch(&json!({"op": "add", "path": "/x"}));
        assert!(!result.valid);
        assert_eq!(result.errors[0].code, codes::MISSING_VALUE);
    }
}
