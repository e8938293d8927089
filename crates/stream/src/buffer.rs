//! Sequence reordering buffer.
//!
//! Absorbs out-of-order network delivery and releases frames to the
//! registered flush callback in strict sequence order. Flushing is debounced
//! on a short timer so a burst of frames triggers one flush pass, and gaps
//! are only ever declared after an explicit timeout via [`SequenceBuffer::force_flush`].
//!
//! One buffer instance serves one correlation id; streams must not share a
//! buffer.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use genui_protocol::WireFrame;
use tokio::time::Instant;
use tracing::{debug, warn};

pub const DEFAULT_MAX_BUFFER_SIZE: usize = 100;
pub const DEFAULT_GAP_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(50);

// ── Options and results ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct BufferOptions {
    /// Buffered-frame count beyond which an immediate force-flush runs.
    pub max_buffer_size: usize,
    /// How long the oldest out-of-order frame may wait before the missing
    /// range below it is declared lost.
    pub gap_timeout: Duration,
    /// Debounce window for coalescing flushes of frame bursts.
    pub flush_interval: Duration,
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self {
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            gap_timeout: DEFAULT_GAP_TIMEOUT,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

/// Frames released by one flush pass, plus any sequence numbers declared
/// permanently lost. `gaps` is only ever non-empty after a timed-out
/// [`SequenceBuffer::force_flush`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlushResult {
    pub frames: Vec<WireFrame>,
    pub gaps: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferStats {
    pub buffered: usize,
    pub expected_sequence: u64,
    /// Age of the longest-waiting buffered frame.
    pub oldest_age: Duration,
}

// ── Buffer ───────────────────────────────────────────────────────────────────

type FlushCallback = Arc<dyn Fn(&[WireFrame]) + Send + Sync>;

struct BufferedFrame {
    frame: WireFrame,
    received_at: Instant,
}

struct Inner {
    buffer: BTreeMap<u64, BufferedFrame>,
    expected_sequence: u64,
    on_flush: Option<FlushCallback>,
    flush_task: Option<tokio::task::JoinHandle<()>>,
}

#[derive(Clone)]
pub struct SequenceBuffer {
    inner: Arc<Mutex<Inner>>,
    options: BufferOptions,
}

impl SequenceBuffer {
    pub fn new(options: BufferOptions) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                buffer: BTreeMap::new(),
                expected_sequence: 0,
                on_flush: None,
                flush_task: None,
            })),
            options,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register the callback invoked with each in-order run of frames.
    pub fn set_on_flush(&self, callback: impl Fn(&[WireFrame]) + Send + Sync + 'static) {
        self.lock().on_flush = Some(Arc::new(callback));
    }

    /// Buffer a frame. Duplicate sequences are last-write-wins; correct
    /// senders never produce them, so the overwrite is logged.
    pub fn add(&self, frame: WireFrame) {
        let sequence = frame.sequence;
        let (due, overflow) = {
            let mut inner = self.lock();
            let replaced = inner
                .buffer
                .insert(
                    sequence,
                    BufferedFrame {
                        frame,
                        received_at: Instant::now(),
                    },
                )
                .is_some();
            if replaced {
                warn!(sequence, "duplicate sequence buffered, last write wins");
            }
            (
                sequence == inner.expected_sequence,
                inner.buffer.len() > self.options.max_buffer_size,
            )
        };

        if overflow {
            debug!(
                max = self.options.max_buffer_size,
                "buffer overflow, forcing flush"
            );
            self.force_flush();
        } else if due {
            self.schedule_flush();
        }
    }

    /// Coalesce a burst into one flush pass: at most one pending timer at a
    /// time. Without a Tokio runtime the debounce is skipped and callers
    /// flush explicitly.
    fn schedule_flush(&self) {
        let mut inner = self.lock();
        if inner.flush_task.is_some() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let this = self.clone();
        let interval = self.options.flush_interval;
        inner.flush_task = Some(handle.spawn(async move {
            tokio::time::sleep(interval).await;
            this.lock().flush_task = None;
            this.flush();
        }));
    }

    /// Release the contiguous run starting at the expected sequence.
    ///
    /// The run is drained into a local list before the callback fires, so a
    /// callback that synchronously calls [`SequenceBuffer::add`] cannot re-enter a flush in
    /// progress.
    pub fn flush(&self) -> FlushResult {
        let (frames, callback) = {
            let mut inner = self.lock();
            let mut frames = Vec::new();
            while let Some(entry) = {
                let next = inner.expected_sequence;
                inner.buffer.remove(&next)
            } {
                frames.push(entry.frame);
                inner.expected_sequence += 1;
            }
            (frames, inner.on_flush.clone())
        };

        if !frames.is_empty()
            && let Some(callback) = callback
        {
            callback(&frames);
        }

        FlushResult {
            frames,
            gaps: vec![],
        }
    }

    /// Declare timed-out gaps, then flush.
    ///
    /// If the lowest buffered sequence has waited longer than `gap_timeout`,
    /// the range below it is recorded as lost and the expected sequence
    /// jumps forward. One skip per call: re-invoke to skip further ranges.
    /// Before the timeout this behaves exactly like [`SequenceBuffer::flush`].
    pub fn force_flush(&self) -> FlushResult {
        let gaps = {
            let mut inner = self.lock();
            let skip_to = inner.buffer.first_key_value().and_then(|(&min_seq, entry)| {
                let timed_out = min_seq > inner.expected_sequence
                    && entry.received_at.elapsed() > self.options.gap_timeout;
                timed_out.then_some(min_seq)
            });
            match skip_to {
                Some(min_seq) => {
                    let gaps: Vec<u64> = (inner.expected_sequence..min_seq).collect();
                    warn!(
                        from = inner.expected_sequence,
                        to = min_seq,
                        "sequence gap declared after timeout"
                    );
                    inner.expected_sequence = min_seq;
                    gaps
                },
                None => vec![],
            }
        };

        let mut result = self.flush();
        result.gaps = gaps;
        result
    }

    /// Drop all state and cancel any pending debounced flush. Used when a
    /// stream is abandoned or restarted.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.buffer.clear();
        inner.expected_sequence = 0;
        if let Some(task) = inner.flush_task.take() {
            task.abort();
        }
    }

    pub fn stats(&self) -> BufferStats {
        let inner = self.lock();
        let oldest_age = inner
            .buffer
            .values()
            .map(|entry| entry.received_at.elapsed())
            .max()
            .unwrap_or(Duration::ZERO);
        BufferStats {
            buffered: inner.buffer.len(),
            expected_sequence: inner.expected_sequence,
            oldest_age,
        }
    }
}

impl Default for SequenceBuffer {
    fn default() -> Self {
        Self::new(BufferOptions::default())
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
