//! Stream consumer: wires the pipeline, buffer, contract, expander and
//! placeholder manager into one inbound path.
//!
//! Raw JSON goes in through [`StreamConsumer::ingest`]; ordered, validated,
//! render-ready [`StreamUpdate`]s come out of the channel returned by
//! [`StreamConsumer::new`]. Frames are released strictly in sequence order
//! regardless of arrival order, and forward references to not-yet-streamed
//! children are bridged with placeholder elements so the UI never points at
//! a missing key.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use genui_protocol::{
    ControlEvent, DoneEvent, ErrorEvent, MessageEvent, ProgressEvent, UiElement,
    ValidationError, ValidationResult, WireEvent, WireFrame, codes,
    patch::{PatchOp, UiPatch},
    paths,
};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::buffer::{BufferOptions, BufferStats, SequenceBuffer};
use crate::contract::{normalize_ui_patch, validate_ui_patch_contract};
use crate::expander::expand_for_progressive_rendering;
use crate::pipeline::ValidationPipeline;
use crate::placeholder::{
    DEFAULT_PLACEHOLDER_TIMEOUT, PlaceholderManager, PlaceholderStats,
};

// ── Updates ──────────────────────────────────────────────────────────────────

/// An ordered, render-ready unit emitted by the consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamUpdate {
    /// Contract-clean patches, expanded for progressive rendering. Apply in
    /// order; when `atomic` is set, apply the whole group or none of it.
    Patches { patches: Vec<UiPatch>, atomic: bool },
    Message(MessageEvent),
    Control(ControlEvent),
    Progress(ProgressEvent),
    Error(ErrorEvent),
    Done(DoneEvent),
    /// Sequence numbers declared lost after the gap timeout. Rendering
    /// continues past them.
    Gap { skipped: Vec<u64> },
    /// A patch that failed the UI patch contract. Surfaced for diagnostics,
    /// never applied.
    Rejected { patch: UiPatch, reasons: Vec<String> },
    /// A frame that failed validation beyond what auto-recovery can repair.
    Invalid { validation: ValidationResult },
    /// A previously forward-referenced element arrived. The elements listed
    /// in `dependents` reference it and may need re-rendering.
    PlaceholderResolved { key: String, dependents: Vec<String> },
    /// Placeholders discarded after waiting too long for their element.
    PlaceholderTimeout { keys: Vec<String> },
}

// ── Consumer ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ConsumerOptions {
    pub buffer: BufferOptions,
    pub placeholder_timeout: Duration,
    /// Catalog component names; empty disables the unknown-component check.
    pub component_types: Vec<String>,
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self {
            buffer: BufferOptions::default(),
            placeholder_timeout: DEFAULT_PLACEHOLDER_TIMEOUT,
            component_types: vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerStats {
    pub buffer: BufferStats,
    pub placeholders: PlaceholderStats,
}

struct ConsumerState {
    placeholders: PlaceholderManager,
    known_keys: HashSet<String>,
    correlation_id: Option<String>,
}

/// One consumer per stream session. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct StreamConsumer {
    pipeline: ValidationPipeline,
    buffer: SequenceBuffer,
    state: Arc<Mutex<ConsumerState>>,
    tx: mpsc::UnboundedSender<StreamUpdate>,
}

impl StreamConsumer {
    pub fn new(options: ConsumerOptions) -> (Self, mpsc::UnboundedReceiver<StreamUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let consumer = Self {
            pipeline: ValidationPipeline::with_component_types(options.component_types),
            buffer: SequenceBuffer::new(options.buffer),
            state: Arc::new(Mutex::new(ConsumerState {
                placeholders: PlaceholderManager::new(options.placeholder_timeout),
                known_keys: HashSet::new(),
                correlation_id: None,
            })),
            tx,
        };

        let state = Arc::clone(&consumer.state);
        let tx = consumer.tx.clone();
        consumer.buffer.set_on_flush(move |frames| {
            for frame in frames {
                handle_frame(&state, &tx, frame.clone());
            }
        });

        (consumer, rx)
    }

    fn lock(&self) -> MutexGuard<'_, ConsumerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Feed one raw inbound value. Invalid frames are reported on the
    /// channel and dropped; valid ones are buffered until their sequence
    /// position comes up.
    pub fn ingest(&self, data: &Value) {
        let result = self.pipeline.parse_with_recovery(data);
        let Some(frame) = result.frame else {
            warn!(
                errors = result.validation.errors.len(),
                "dropping unrecoverable frame"
            );
            let _ = self.tx.send(StreamUpdate::Invalid {
                validation: result.validation,
            });
            return;
        };
        if result.recovered {
            debug!(sequence = frame.sequence, "frame accepted after auto-fix");
        }

        {
            let mut state = self.lock();
            match &state.correlation_id {
                None => state.correlation_id = Some(frame.correlation_id.clone()),
                Some(expected) if *expected != frame.correlation_id => {
                    warn!(
                        expected,
                        got = frame.correlation_id,
                        "frame from a different stream, dropping"
                    );
                    let _ = self.tx.send(StreamUpdate::Invalid {
                        validation: ValidationResult::from_errors(vec![ValidationError {
                            path: "correlationId".into(),
                            code: codes::INVALID_VALUE.into(),
                            message: format!(
                                "Unexpected correlation id: {}",
                                frame.correlation_id
                            ),
                        }]),
                    });
                    return;
                },
                Some(_) => {},
            }
        }

        self.buffer.add(frame);
    }

    /// Release any due frames immediately, declaring timed-out gaps lost.
    pub fn force_flush(&self) {
        let result = self.buffer.force_flush();
        if !result.gaps.is_empty() {
            let _ = self.tx.send(StreamUpdate::Gap {
                skipped: result.gaps,
            });
        }
    }

    /// Discard placeholders whose element never arrived. Call periodically;
    /// the consumer does not run its own timer for this.
    pub fn prune_placeholders(&self) {
        let keys = self.lock().placeholders.prune_timed_out();
        if !keys.is_empty() {
            let _ = self.tx.send(StreamUpdate::PlaceholderTimeout { keys });
        }
    }

    pub fn stats(&self) -> ConsumerStats {
        ConsumerStats {
            buffer: self.buffer.stats(),
            placeholders: self.lock().placeholders.stats(),
        }
    }

    /// Drop all session state. The update channel stays usable.
    pub fn reset(&self) {
        self.buffer.reset();
        let mut state = self.lock();
        state.placeholders.reset();
        state.known_keys.clear();
        state.correlation_id = None;
    }
}

// ── Frame handling ───────────────────────────────────────────────────────────

fn handle_frame(
    state: &Mutex<ConsumerState>,
    tx: &mpsc::UnboundedSender<StreamUpdate>,
    frame: WireFrame,
) {
    match frame.event {
        WireEvent::Patch(event) => {
            let mut atomic = event.atomic.unwrap_or(false);
            let mut out = Vec::new();
            for patch in event.into_patches() {
                let patch = normalize_ui_patch(patch);
                let reasons = validate_ui_patch_contract(&patch);
                if !reasons.is_empty() {
                    warn!(path = patch.path, "patch rejected by contract");
                    let _ = tx.send(StreamUpdate::Rejected { patch, reasons });
                    continue;
                }
                let expanded = expand_for_progressive_rendering(patch);
                // an expanded skeleton must never render without its appends
                atomic |= expanded.expanded;
                let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
                for piece in expanded.patches {
                    note_patch(&mut guard, tx, piece, &mut out);
                }
            }
            if !out.is_empty() {
                let _ = tx.send(StreamUpdate::Patches {
                    patches: out,
                    atomic,
                });
            }
        },
        WireEvent::Message(event) => {
            let _ = tx.send(StreamUpdate::Message(event));
        },
        WireEvent::Control(event) => {
            let _ = tx.send(StreamUpdate::Control(event));
        },
        WireEvent::Progress(event) => {
            let _ = tx.send(StreamUpdate::Progress(event));
        },
        WireEvent::Error(event) => {
            let _ = tx.send(StreamUpdate::Error(event));
        },
        WireEvent::Done(event) => {
            let _ = tx.send(StreamUpdate::Done(event));
        },
    }
}

/// Track element keys as patches flow past, bridging forward references.
///
/// A child append naming a key nobody has streamed yet gets a placeholder
/// element injected ahead of the append, so the tree the renderer sees is
/// always internally consistent. When the real element later arrives over
/// an element-root write, the placeholder resolves and its dependents are
/// reported.
fn note_patch(
    state: &mut ConsumerState,
    tx: &mpsc::UnboundedSender<StreamUpdate>,
    patch: UiPatch,
    out: &mut Vec<UiPatch>,
) {
    let writes_element = matches!(
        patch.op,
        PatchOp::Add | PatchOp::Ensure | PatchOp::Replace
    );
    if writes_element
        && let Some(key) = paths::element_root_key(&patch.path)
        && patch.value.as_ref().is_some_and(Value::is_object)
    {
        let key = key.to_string();
        if state.placeholders.is_placeholder(&key)
            && let Some(value) = &patch.value
            && let Ok(element) = serde_json::from_value::<UiElement>(value.clone())
        {
            let resolution = state.placeholders.resolve(&key, element);
            debug!(key, "placeholder resolved");
            let _ = tx.send(StreamUpdate::PlaceholderResolved {
                key: key.clone(),
                dependents: resolution.dependents,
            });
        }
        state.known_keys.insert(key);
    } else if paths::is_children_append(&patch.path)
        && let Some(parent) = paths::element_key(&patch.path)
        && let Some(Value::String(child)) = &patch.value
    {
        let parent = parent.to_string();
        let child = child.clone();
        if !state.known_keys.contains(&child) && !state.placeholders.is_placeholder(&child) {
            debug!(child, parent, "forward reference, injecting placeholder");
            let stub = state
                .placeholders
                .create_placeholder(&child, Some(&parent));
            if let Ok(value) = serde_json::to_value(stub) {
                out.push(UiPatch::ensure(paths::element_root_path(&child), value));
            }
        }
        state.placeholders.add_reference(&child, &parent);
    }
    out.push(patch);
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use genui_protocol::PatchEvent;
    use serde_json::json;

    fn frame_value(sequence: u64, event: Value) -> Value {
        json!({
            "version": "3.0",
            "correlationId": "corr-1",
            "sequence": sequence,
            "timestamp": 1000 + sequence,
            "event": event,
        })
    }

    fn collect(rx: &mut mpsc::UnboundedReceiver<StreamUpdate>) -> Vec<StreamUpdate> {
        let mut updates = Vec::new();
        while let Ok(update) = rx.try_recv() {
            updates.push(update);
        }
        updates
    }

    fn test_options() -> ConsumerOptions {
        ConsumerOptions {
            buffer: BufferOptions {
                flush_interval: Duration::from_millis(50),
                ..BufferOptions::default()
            },
            ..ConsumerOptions::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_order_frames_come_out_ordered() {
        let (consumer, mut rx) = StreamConsumer::new(test_options());
        consumer.ingest(&frame_value(2, json!({"kind": "done"})));
        consumer.ingest(&frame_value(
            0,
            json!({"kind": "control", "action": "start"}),
        ));
        consumer.ingest(&frame_value(
            1,
            json!({"kind": "message", "content": "hello"}),
        ));

        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_millis(51)).await;
        tokio::task::yield_now().await;

        let updates = collect(&mut rx);
        assert_eq!(updates.len(), 3);
        assert!(matches!(updates[0], StreamUpdate::Control(_)));
        assert!(matches!(updates[1], StreamUpdate::Message(_)));
        assert!(matches!(updates[2], StreamUpdate::Done(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn patch_events_are_expanded() {
        let (consumer, mut rx) = StreamConsumer::new(test_options());
        consumer.ingest(&frame_value(
            0,
            json!({"kind": "patch", "patch": {
                "op": "add",
                "path": "/elements/grid",
                "value": {"key": "grid", "type": "Grid", "props": {}, "children": ["a", "b"]},
            }}),
        ));

        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_millis(51)).await;
        tokio::task::yield_now().await;

        let updates = collect(&mut rx);
        // skeleton, two placeholder injections, two appends
        let StreamUpdate::Patches { patches, atomic } = &updates[0] else {
            panic!("expected patches, got {updates:?}");
        };
        assert!(*atomic);
        assert_eq!(patches.len(), 5);
        assert_eq!(patches[0].path, "/elements/grid");
        assert_eq!(patches[1].op, PatchOp::Ensure);
        assert_eq!(patches[1].path, "/elements/a");
        assert_eq!(patches[2].path, "/elements/grid/children/-");
        assert_eq!(patches[3].path, "/elements/b");
        assert_eq!(patches[4].path, "/elements/grid/children/-");
    }

    #[tokio::test(start_paused = true)]
    async fn placeholder_resolves_when_element_arrives() {
        let (consumer, mut rx) = StreamConsumer::new(test_options());
        consumer.ingest(&frame_value(
            0,
            json!({"kind": "patch", "patch": {
                "op": "add",
                "path": "/elements/list/children/-",
                "value": "item-1",
            }}),
        ));
        consumer.ingest(&frame_value(
            1,
            json!({"kind": "patch", "patch": {
                "op": "add",
                "path": "/elements/item-1",
                "value": {"key": "item-1", "type": "ListItem", "props": {}},
            }}),
        ));

        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_millis(51)).await;
        tokio::task::yield_now().await;

        let updates = collect(&mut rx);
        let resolved = updates.iter().find_map(|u| match u {
            StreamUpdate::PlaceholderResolved { key, dependents } => {
                Some((key.clone(), dependents.clone()))
            },
            _ => None,
        });
        let (key, dependents) = resolved.unwrap();
        assert_eq!(key, "item-1");
        assert_eq!(dependents, vec!["list".to_string()]);

        let StreamUpdate::Patches { patches, .. } = &updates[0] else {
            panic!("expected patches first");
        };
        assert_eq!(patches[0].op, PatchOp::Ensure);
        assert_eq!(patches[0].path, "/elements/item-1");
        assert_eq!(
            patches[0].value.as_ref().unwrap()["type"],
            json!(crate::placeholder::PLACEHOLDER_TYPE)
        );
        assert_eq!(patches[1].path, "/elements/list/children/-");
    }

    #[tokio::test(start_paused = true)]
    async fn contract_violations_are_rejected_not_applied() {
        let (consumer, mut rx) = StreamConsumer::new(test_options());
        consumer.ingest(&frame_value(
            0,
            json!({"kind": "patch", "patch": {"op": "remove", "path": "/root"}}),
        ));

        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_millis(51)).await;
        tokio::task::yield_now().await;

        let updates = collect(&mut rx);
        assert_eq!(updates.len(), 1);
        let StreamUpdate::Rejected { reasons, .. } = &updates[0] else {
            panic!("expected rejection, got {updates:?}");
        };
        assert!(reasons[0].contains("root"));
    }

    #[tokio::test(start_paused = true)]
    async fn unrecoverable_frame_reports_invalid() {
        let (consumer, mut rx) = StreamConsumer::new(test_options());
        consumer.ingest(&json!({"event": {"kind": "message", "content": ""}}));

        let updates = collect(&mut rx);
        assert_eq!(updates.len(), 1);
        assert!(matches!(updates[0], StreamUpdate::Invalid { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn recovered_frame_still_flows() {
        let (consumer, mut rx) = StreamConsumer::new(test_options());
        consumer.ingest(&json!({"sequence": 0, "event": {"kind": "done"}}));

        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_millis(51)).await;
        tokio::task::yield_now().await;

        let updates = collect(&mut rx);
        assert!(matches!(updates[0], StreamUpdate::Done(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn mismatched_correlation_id_is_dropped() {
        let (consumer, mut rx) = StreamConsumer::new(test_options());
        consumer.ingest(&frame_value(0, json!({"kind": "done"})));
        let mut other = frame_value(1, json!({"kind": "done"}));
        other["correlationId"] = json!("corr-2");
        consumer.ingest(&other);

        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_millis(51)).await;
        tokio::task::yield_now().await;

        let updates = collect(&mut rx);
        assert!(
            updates
                .iter()
                .any(|u| matches!(u, StreamUpdate::Invalid { .. }))
        );
        assert_eq!(consumer.stats().buffer.buffered, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn gap_is_reported_after_timeout() {
        let (consumer, mut rx) = StreamConsumer::new(test_options());
        consumer.ingest(&frame_value(3, json!({"kind": "done"})));

        tokio::time::advance(Duration::from_millis(5001)).await;
        consumer.force_flush();

        let updates = collect(&mut rx);
        // flushed frames come off the buffer callback first, then the gap note
        assert!(matches!(updates[0], StreamUpdate::Done(_)));
        assert_eq!(
            updates[1],
            StreamUpdate::Gap {
                skipped: vec![0, 1, 2],
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn placeholder_timeout_is_reported() {
        let (consumer, mut rx) = StreamConsumer::new(test_options());
        consumer.ingest(&frame_value(
            0,
            json!({"kind": "patch", "patch": {
                "op": "add",
                "path": "/elements/list/children/-",
                "value": "never-arrives",
            }}),
        ));
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_millis(51)).await;
        tokio::task::yield_now().await;
        collect(&mut rx);

        tokio::time::advance(Duration::from_millis(5001)).await;
        consumer.prune_placeholders();

        let updates = collect(&mut rx);
        assert_eq!(
            updates,
            vec![StreamUpdate::PlaceholderTimeout {
                keys: vec!["never-arrives".into()],
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn reset_clears_session_state() {
        let (consumer, mut rx) = StreamConsumer::new(test_options());
        consumer.ingest(&frame_value(5, json!({"kind": "done"})));
        consumer.reset();

        assert_eq!(consumer.stats().buffer.buffered, 0);
        assert_eq!(consumer.stats().placeholders.placeholders, 0);

        // a fresh correlation id is accepted after reset
        let mut next = frame_value(0, json!({"kind": "done"}));
        next["correlationId"] = json!("corr-2");
        consumer.ingest(&next);
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_millis(51)).await;
        tokio::task::yield_now().await;
        let updates = collect(&mut rx);
        assert!(matches!(updates.last(), Some(StreamUpdate::Done(_))));
    }

    #[test]
    fn batch_patch_event_keeps_atomic_flag() {
        let event = PatchEvent::batch(vec![UiPatch::set("/elements/x/props/a", json!(1))], true);
        assert_eq!(event.atomic, Some(true));
    }
}
