//! Defect Stream
//!
//! Post-processing for a live stream of detections coming out of a vision
//! model that watches a camera feed. Raw, noisy per-frame reports are turned
//! into a clean sequence of confirmed detections.
//!
//! # Filter chain
//!
//! Each raw message runs through four stages in a fixed order:
//!
//! 1. **Validator**: required fields, confidence floor, box normalization and
//!    sanity limits.
//! 2. **Dedup**: same type near the same place within a sliding window.
//! 3. **Temporal**: multi-frame corroboration (IoU matching).
//! 4. **NMS**: streaming non-maximum suppression against recently surfaced
//!    boxes.
//!
//! All rolling state is owned by a [`DetectionPipeline`], one per
//! [`StreamSession`]. Nothing is process-global.
//!
//! # Module Structure
//!
//! - `geometry`: normalized boxes, IoU, scale detection, display mapping
//! - `detect`: payload parsing, categories, validator and the filter stages
//! - `pipeline`: the ordered chain
//! - `session`: streaming state machine and cancellation
//! - `log`: hash-chained session record and summary
//! - `config`: profile and transport loading

use anyhow::Result;
use std::time::{SystemTime, UNIX_EPOCH};

pub mod config;
pub mod detect;
pub mod geometry;
pub mod log;
pub mod pipeline;
pub mod session;

pub use config::{StreamConfig, TransportMode};
pub use detect::{
    Category, Detection, DetectionDetails, DetectionKind, DetectionProfile, DetectorSource,
    ProfileKind, RawMessage, RawPayload, ReplaySource, ScriptedSource,
};
pub use geometry::{
    auto_scale_and_clamp, intersection_over_union, transform_box_for_display, DisplayRect,
    FitMode, NormalizedBox,
};
pub use log::{hash_entry, DetectionSink, SessionLog, SessionSummary};
pub use pipeline::{DetectionPipeline, FilterReason, FrameOutcome};
pub use session::{CancelHandle, RunStats, SessionState, StreamSession};

/// Wall clock in epoch milliseconds.
pub fn epoch_millis() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis() as u64)
}
