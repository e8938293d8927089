//! Progressive-rendering expansion for element-creation patches.
//!
//! An LLM naturally emits one large JSON object per UI element; waiting for
//! the whole object before any pixel appears defeats streaming. Expansion
//! splits an `add`/`ensure` element patch into a skeleton (empty arrays)
//! plus ordered append patches, so the client can show structure immediately
//! while content backfills.
//!
//! Expanded groups are marked `atomic: true` — the applier must treat the
//! whole group as one transaction and never display a skeleton without its
//! appends as a terminal state.

use genui_protocol::{PatchOp, UiPatch, paths};
use serde_json::Value;

/// Output of [`expand_for_progressive_rendering`]: the ordered patch list
/// plus whether expansion happened.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandResult {
    pub patches: Vec<UiPatch>,
    pub expanded: bool,
    /// When true, all patches must be applied in a single batch.
    pub atomic: bool,
}

impl ExpandResult {
    fn unexpanded(patch: UiPatch) -> Self {
        Self {
            patches: vec![patch],
            expanded: false,
            atomic: false,
        }
    }
}

/// Split an element-creation patch into `[skeleton, ...prop appends,
/// ...children appends]`.
///
/// Only `add`/`ensure` patches on an exact element-root path whose payload
/// carries a non-empty `children` array or non-empty array-valued props are
/// expanded; everything else passes through unchanged.
pub fn expand_for_progressive_rendering(patch: UiPatch) -> ExpandResult {
    if !matches!(patch.op, PatchOp::Add | PatchOp::Ensure) {
        return ExpandResult::unexpanded(patch);
    }
    let Some(element_key) = paths::element_root_key(&patch.path).map(str::to_owned) else {
        return ExpandResult::unexpanded(patch);
    };
    let Some(Value::Object(payload)) = &patch.value else {
        return ExpandResult::unexpanded(patch);
    };

    let has_array_props = payload
        .get("props")
        .and_then(Value::as_object)
        .is_some_and(|props| {
            props
                .values()
                .any(|v| v.as_array().is_some_and(|a| !a.is_empty()))
        });
    let children = payload.get("children").and_then(Value::as_array);
    let has_children = children.is_some_and(|c| !c.is_empty());

    if !has_array_props && !has_children {
        return ExpandResult::unexpanded(patch);
    }

    let mut skeleton_payload = payload.clone();
    let mut appends = Vec::new();

    if has_array_props && let Some(Value::Object(props)) = skeleton_payload.get_mut("props") {
        for (name, value) in props.iter_mut() {
            let Some(items) = value.as_array().filter(|a| !a.is_empty()) else {
                continue;
            };
            for item in items {
                appends.push(UiPatch::add(
                    paths::prop_append_path(&element_key, name),
                    item.clone(),
                ));
            }
            *value = Value::Array(vec![]);
        }
    }

    if let Some(items) = children.filter(|_| has_children) {
        for child_key in items {
            appends.push(UiPatch::add(
                paths::children_append_path(&element_key),
                child_key.clone(),
            ));
        }
        skeleton_payload.insert("children".into(), Value::Array(vec![]));
    }

    let mut skeleton = patch;
    skeleton.value = Some(Value::Object(skeleton_payload));

    let mut patches = Vec::with_capacity(appends.len() + 1);
    patches.push(skeleton);
    patches.extend(appends);

    ExpandResult {
        patches,
        expanded: true,
        atomic: true,
    }
}
