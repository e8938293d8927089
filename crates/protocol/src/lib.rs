//! Stream wire protocol definitions.
//!
//! Protocol version 3. A stream is an ordered sequence of JSON frames, one
//! per line, scoped to a correlation id. Each frame carries exactly one
//! event:
//!
//! - `control`  — lifecycle/meta signals (start, heartbeat, abort, plan markers)
//! - `progress` — tool execution telemetry
//! - `patch`    — one or more UI tree mutations
//! - `message`  — conversational text
//! - `error`    — a reported fault
//! - `done`     — terminal success marker
//!
//! This crate is the single source of truth for the wire shapes. It performs
//! structural validation only; semantic patch rules and reordering live in
//! `genui-stream`.

use serde::{Deserialize, Serialize};

pub mod element;
pub mod patch;
pub mod paths;
pub mod validate;

pub use element::{
    Dimension, ElementLayout, ElementMeta, GridPlacement, SizeConstraints, UiElement, UiTree,
};
pub use patch::{PatchOp, UiPatch};
pub use validate::{ValidationError, ValidationResult, ValidationWarning, parse_frame};

// ── Constants ────────────────────────────────────────────────────────────────

/// Wire protocol version tag. Frames carrying any other value are rejected.
pub const PROTOCOL_VERSION: &str = "3.0";

// ── Error codes ──────────────────────────────────────────────────────────────

pub mod codes {
    pub const REQUIRED: &str = "REQUIRED";
    pub const INVALID_TYPE: &str = "INVALID_TYPE";
    pub const INVALID_VALUE: &str = "INVALID_VALUE";
    pub const INVALID_SEQUENCE: &str = "INVALID_SEQUENCE";
    pub const INVALID_PATH: &str = "INVALID_PATH";
    pub const MISSING_VALUE: &str = "MISSING_VALUE";
    pub const MISSING_FROM: &str = "MISSING_FROM";
    pub const UNKNOWN_COMPONENT: &str = "UNKNOWN_COMPONENT";
    pub const AUTO_FIXED: &str = "AUTO_FIXED";
}

// ── Frame envelope ───────────────────────────────────────────────────────────

/// The atomic transport unit: one envelope carrying one event.
///
/// `sequence` is strictly increasing per correlation id, starting at 0, and
/// defines the total order. `timestamp` is used only for gap-timeout
/// accounting, never for ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireFrame {
    pub version: String,
    pub correlation_id: String,
    pub sequence: u64,
    pub timestamp: u64,
    pub event: WireEvent,
}

impl WireFrame {
    /// Build a frame with the current protocol version and timestamp.
    pub fn new(correlation_id: impl Into<String>, sequence: u64, event: WireEvent) -> Self {
        Self {
            version: PROTOCOL_VERSION.into(),
            correlation_id: correlation_id.into(),
            sequence,
            timestamp: now_ms(),
            event,
        }
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ── Events ───────────────────────────────────────────────────────────────────

/// Discriminated union of all event kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum WireEvent {
    Control(ControlEvent),
    Progress(ProgressEvent),
    Patch(PatchEvent),
    Message(MessageEvent),
    Error(ErrorEvent),
    Done(DoneEvent),
}

/// Lifecycle/meta signal. Informational, never a tree mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlEvent {
    pub action: ControlAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlAction {
    Start,
    Heartbeat,
    PersistedAttachments,
    DocumentIndexUi,
    Citations,
    Usage,
    PlanCreated,
    StepStarted,
    StepDone,
    SubtaskStarted,
    SubtaskDone,
    LevelStarted,
    LevelCompleted,
    OrchestrationDone,
    Abort,
}

/// Tool execution telemetry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProgressStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Completion percentage, 0–100.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Pending,
    Starting,
    Progress,
    Running,
    Complete,
    Error,
}

/// Carries one or more UI tree mutations. Exactly one of `patch`/`patches`
/// must be present and non-empty; [`PatchEvent::into_patches`] flattens both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<UiPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patches: Option<Vec<UiPatch>>,
    /// When true, the carried patches must be applied as one transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atomic: Option<bool>,
}

impl PatchEvent {
    pub fn single(patch: UiPatch) -> Self {
        Self {
            patch: Some(patch),
            patches: None,
            atomic: None,
        }
    }

    pub fn batch(patches: Vec<UiPatch>, atomic: bool) -> Self {
        Self {
            patch: None,
            patches: Some(patches),
            atomic: Some(atomic),
        }
    }

    /// Flatten `patch`/`patches` into one ordered list.
    pub fn into_patches(self) -> Vec<UiPatch> {
        match (self.patch, self.patches) {
            (Some(p), None) => vec![p],
            (None, Some(ps)) => ps,
            (Some(p), Some(mut ps)) => {
                ps.insert(0, p);
                ps
            },
            (None, None) => vec![],
        }
    }
}

/// Conversational text. Repeated events with the same `id` are merged by the
/// consumer according to `mode`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub mode: MessageMode,
    #[serde(default)]
    pub role: MessageRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageMode {
    Append,
    Replace,
    /// Complete message; replaces any accumulated content. The default so
    /// that senders from the previous protocol generation, which had no
    /// `mode` field, still parse.
    #[default]
    Final,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    #[default]
    Assistant,
    System,
}

/// A reported fault. `recoverable = true` signals the stream may continue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Terminal success marker for the correlation id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DoneEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn frame_constructor_fills_version_and_timestamp() {
        let frame = WireFrame::new(
            "corr-1",
            0,
            WireEvent::Control(ControlEvent {
                action: ControlAction::Start,
                state: None,
                data: Some(serde_json::json!({"mode": "DIRECT"})),
            }),
        );
        assert_eq!(frame.version, PROTOCOL_VERSION);
        assert_eq!(frame.sequence, 0);
        assert!(frame.timestamp > 0);
    }

    #[test]
    fn frame_round_trip() {
        let json = serde_json::json!({
            "version": "3.0",
            "correlationId": "corr-1",
            "sequence": 3,
            "timestamp": 1234,
            "event": { "kind": "done", "state": "ok" },
        });
        let frame: WireFrame = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(frame.correlation_id, "corr-1");
        assert!(matches!(frame.event, WireEvent::Done(_)));
        assert_eq!(serde_json::to_value(&frame).unwrap(), json);
    }

    #[test]
    fn control_actions_use_kebab_case() {
        let event: WireEvent =
            serde_json::from_value(serde_json::json!({"kind": "control", "action": "plan-created"}))
                .unwrap();
        match event {
            WireEvent::Control(c) => assert_eq!(c.action, ControlAction::PlanCreated),
            _ => panic!("expected control event"),
        }
    }

    #[test]
    fn message_defaults_role_and_mode() {
        let event: MessageEvent =
            serde_json::from_value(serde_json::json!({"content": "hi"})).unwrap();
        assert_eq!(event.role, MessageRole::Assistant);
        assert_eq!(event.mode, MessageMode::Final);
    }

    #[test]
    fn message_mode_append_round_trip() {
        let event = MessageEvent {
            id: Some("m1".into()),
            mode: MessageMode::Append,
            role: MessageRole::Assistant,
            content: "partial".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["mode"], "append");
        let parsed: MessageEvent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn error_event_defaults_recoverable_false() {
        let event: ErrorEvent = serde_json::from_value(
            serde_json::json!({"code": "E_TOOL", "message": "tool failed"}),
        )
        .unwrap();
        assert!(!event.recoverable);
    }

    #[test]
    fn patch_event_flattens_single_and_batch() {
        let single = PatchEvent::single(UiPatch::set("/root", serde_json::json!("main")));
        assert_eq!(single.into_patches().len(), 1);

        let batch = PatchEvent {
            patch: Some(UiPatch::set("/root", serde_json::json!("main"))),
            patches: Some(vec![UiPatch::remove("/elements/old")]),
            atomic: None,
        };
        let flat = batch.into_patches();
        assert_eq!(flat.len(), 2);
        assert_eq!(flat[0].op, PatchOp::Set);
        assert_eq!(flat[1].op, PatchOp::Remove);
    }

    #[test]
    fn progress_event_omits_absent_fields() {
        let event = ProgressEvent {
            state: None,
            tool_name: Some("web-search".into()),
            tool_call_id: None,
            status: Some(ProgressStatus::Running),
            message: None,
            progress: Some(40.0),
            data: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("state"));
        assert_eq!(json["toolName"], "web-search");
        assert_eq!(json["status"], "running");
    }
}
