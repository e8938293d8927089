//! UI patch operations.
//!
//! A patch is a single tree-mutation instruction: a JSON-Pointer path, an
//! operation, and an optional value. Three legacy ops (`message`, `question`,
//! `suggestion`) survive from the previous protocol generation; they are
//! accepted on the wire but rejected by the patch contract, which routes
//! their payloads to the message channel instead.

use serde::{Deserialize, Serialize};

/// Every op the wire accepts. Tree mutation uses `add`/`replace`/`remove`/
/// `set`/`ensure`; `move`/`copy`/`test` belong to the generic JSON-Patch
/// vocabulary but are never used on `/elements` paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Remove,
    Replace,
    Set,
    /// Idempotent create: make the element if absent, no-op if already
    /// present with equivalent content.
    Ensure,
    Move,
    Copy,
    Test,
    Message,
    Question,
    Suggestion,
}

impl PatchOp {
    /// Ops inherited from the previous protocol generation. They carry
    /// side-channel payloads, not tree mutations.
    pub fn is_legacy(self) -> bool {
        matches!(self, Self::Message | Self::Question | Self::Suggestion)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Replace => "replace",
            Self::Set => "set",
            Self::Ensure => "ensure",
            Self::Move => "move",
            Self::Copy => "copy",
            Self::Test => "test",
            Self::Message => "message",
            Self::Question => "question",
            Self::Suggestion => "suggestion",
        }
    }
}

impl std::fmt::Display for PatchOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single tree mutation (or legacy side-channel payload).
///
/// `path` is serialized even when empty so receivers always see the field;
/// an empty path fails contract validation with a specific reason rather
/// than a deserialization error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiPatch {
    pub op: PatchOp,
    #[serde(default)]
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Question payload for the legacy `question` op.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<serde_json::Value>,
    /// Suggestion list for the legacy `suggestion` op.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<serde_json::Value>>,
}

impl UiPatch {
    pub fn new(op: PatchOp, path: impl Into<String>) -> Self {
        Self {
            op,
            path: path.into(),
            value: None,
            from: None,
            question: None,
            suggestions: None,
        }
    }

    pub fn with_value(mut self, value: serde_json::Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn add(path: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(PatchOp::Add, path).with_value(value)
    }

    pub fn replace(path: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(PatchOp::Replace, path).with_value(value)
    }

    pub fn set(path: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(PatchOp::Set, path).with_value(value)
    }

    pub fn ensure(path: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(PatchOp::Ensure, path).with_value(value)
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self::new(PatchOp::Remove, path)
    }
}
