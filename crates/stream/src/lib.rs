//! Ordered, validated consumption of generative UI streams.
//!
//! Frames arrive over whatever transport the host uses, frequently out of
//! order and occasionally malformed. This crate turns that firehose into a
//! render-ready update sequence:
//!
//! - [`pipeline::ValidationPipeline`] validates inbound frames and repairs
//!   omitted envelope boilerplate,
//! - [`buffer::SequenceBuffer`] reorders frames by sequence number with a
//!   debounced flush and a gap timeout,
//! - [`contract`] normalizes and enforces the UI patch contract,
//! - [`expander`] splits large element inserts into a skeleton plus appends
//!   for progressive rendering,
//! - [`placeholder::PlaceholderManager`] bridges forward references to
//!   elements that have not streamed yet,
//! - [`consumer::StreamConsumer`] wires all of the above into one inbound
//!   path.
//!
//! The pieces are usable individually; the consumer is the batteries-included
//! composition.

pub mod buffer;
pub mod consumer;
pub mod contract;
pub mod error;
pub mod expander;
pub mod pipeline;
pub mod placeholder;

pub use buffer::{BufferOptions, BufferStats, FlushResult, SequenceBuffer};
pub use consumer::{ConsumerOptions, ConsumerStats, StreamConsumer, StreamUpdate};
pub use contract::{
    assert_ui_patch_contract, normalize_ui_patch, normalized_ui_patch, strict_ui_patch,
    validate_ui_patch_contract,
};
pub use error::{Error, Result};
pub use expander::{ExpandResult, expand_for_progressive_rendering};
pub use pipeline::{RecoveredFrame, ValidationPipeline};
pub use placeholder::{
    PLACEHOLDER_TYPE, PlaceholderManager, PlaceholderStats, Resolution,
};
