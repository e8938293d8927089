//! Semantic rules for UI patches, on top of the structural wire shape.
//!
//! Two entry styles exist on purpose: [`strict_ui_patch`] rejects
//! stringified-JSON payloads outright, while [`normalized_ui_patch`] repairs
//! them first. LLM-generated payloads are observed to sometimes double-encode
//! JSON as strings; call sites choose whether to tolerate that.
//! Normalization must run before validation, never after — validation
//! assumes already-normalized input.

use genui_protocol::{PatchOp, UiPatch, paths, validate};
use serde_json::Value;

use crate::error::{Error, Result};

// ── Normalization ────────────────────────────────────────────────────────────

/// Parse a stringified-JSON `value` back into a structure when the path
/// expects one: an object/array on an element-root path, an array on the
/// children-collection path. Anything else passes through unchanged, so
/// normalization is idempotent.
pub fn normalize_ui_patch(mut patch: UiPatch) -> UiPatch {
    let Some(Value::String(raw)) = &patch.value else {
        return patch;
    };

    if paths::element_root_key(&patch.path).is_some() {
        if let Some(parsed) = parse_stringified_json(raw) {
            patch.value = Some(parsed);
        }
    } else if paths::is_children_collection(&patch.path) {
        if let Some(parsed @ Value::Array(_)) = parse_stringified_json(raw) {
            patch.value = Some(parsed);
        }
    }
    patch
}

fn parse_stringified_json(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('{') && !trimmed.starts_with('[') {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(v @ (Value::Object(_) | Value::Array(_))) => Some(v),
        _ => None,
    }
}

fn is_stringified_json(raw: &str) -> bool {
    parse_stringified_json(raw).is_some()
}

// ── Validation ───────────────────────────────────────────────────────────────

/// Check a patch against the protocol's semantic rules. Empty result means
/// valid. Rules are evaluated in order; the first matching path class wins.
pub fn validate_ui_patch_contract(patch: &UiPatch) -> Vec<String> {
    let mut errors = Vec::new();

    if patch.op.is_legacy() {
        errors.push(format!(
            "Unsupported op \"{}\" for UI patches. Use the message channel instead.",
            patch.op
        ));
        return errors;
    }

    let path = patch.path.as_str();
    if path.is_empty() {
        errors.push("Patch path is required.".into());
        return errors;
    }

    if path == paths::ROOT_PATH {
        if patch.op != PatchOp::Set {
            errors.push("Only \"set\" is allowed on /root.".into());
        }
        match &patch.value {
            Some(Value::String(s)) if !s.trim().is_empty() => {},
            _ => errors.push("Patch /root value must be a non-empty string.".into()),
        }
        return errors;
    }

    if let Some(key) = paths::element_root_key(path) {
        if patch.op == PatchOp::Remove {
            return errors;
        }

        if !matches!(patch.op, PatchOp::Add | PatchOp::Replace | PatchOp::Ensure) {
            errors.push(format!(
                "Unsupported op \"{}\" for element root path {path}. Use add/replace/ensure/remove.",
                patch.op
            ));
            return errors;
        }

        if let Some(Value::String(raw)) = &patch.value
            && is_stringified_json(raw)
        {
            errors.push(format!(
                "Patch value for {path} must be an object, not stringified JSON."
            ));
            return errors;
        }

        let payload = patch.value.clone().unwrap_or(Value::Null);
        let shape_errors = validate::check_element(&payload);
        if let Some(first) = shape_errors.first() {
            errors.push(format!(
                "Invalid UIElement payload for {path}: {}.",
                first.message
            ));
            return errors;
        }

        let payload_key = payload.get("key").and_then(Value::as_str).unwrap_or_default();
        if payload_key != key {
            errors.push(format!(
                "Element key mismatch for {path}: expected \"{key}\", got \"{payload_key}\"."
            ));
        }
        return errors;
    }

    if paths::is_element_path(path) {
        if patch.op == PatchOp::Remove {
            return errors;
        }

        if !matches!(patch.op, PatchOp::Add | PatchOp::Replace | PatchOp::Set) {
            errors.push(format!(
                "Unsupported op \"{}\" for nested element path {path}. Use add/replace/set/remove.",
                patch.op
            ));
            return errors;
        }

        if patch.value.is_none() {
            errors.push(format!("Patch {path} requires a value."));
            return errors;
        }

        if paths::is_children_append(path) && !matches!(&patch.value, Some(Value::String(_))) {
            errors.push(format!("Patch {path} requires a child key string value."));
        }

        if paths::is_children_collection(path) {
            let all_strings = matches!(
                &patch.value,
                Some(Value::Array(items)) if items.iter().all(Value::is_string)
            );
            if !all_strings {
                errors.push(format!("Patch {path} requires an array of child key strings."));
            }
        }
        return errors;
    }

    errors.push(format!(
        "Unsupported patch path \"{path}\". Allowed roots are /root and /elements/*."
    ));
    errors
}

/// Fail-fast variant for internal tool-call boundaries. The default
/// pipeline path never throws; this one does.
pub fn assert_ui_patch_contract(patch: UiPatch) -> Result<UiPatch> {
    let errors = validate_ui_patch_contract(&patch);
    if errors.is_empty() {
        Ok(patch)
    } else {
        Err(Error::Contract(errors))
    }
}

// ── Raw-value entry points ───────────────────────────────────────────────────

/// Strict schema variant: decode and validate without normalization.
pub fn strict_ui_patch(value: &Value) -> std::result::Result<UiPatch, Vec<String>> {
    let patch: UiPatch = serde_json::from_value(value.clone())
        .map_err(|e| vec![format!("Invalid patch shape: {e}.")])?;
    let errors = validate_ui_patch_contract(&patch);
    if errors.is_empty() { Ok(patch) } else { Err(errors) }
}

/// Normalizing schema variant: repair stringified payloads, then validate.
pub fn normalized_ui_patch(value: &Value) -> std::result::Result<UiPatch, Vec<String>> {
    let patch: UiPatch = serde_json::from_value(value.clone())
        .map_err(|e| vec![format!("Invalid patch shape: {e}.")])?;
    let patch = normalize_ui_patch(patch);
    let errors = validate_ui_patch_contract(&patch);
    if errors.is_empty() { Ok(patch) } else { Err(errors) }
}
