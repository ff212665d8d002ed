//! Streaming non-maximum suppression.
//!
//! Classic NMS works on one batch of candidates. Here detections arrive one at
//! a time, so suppression is against a trailing window of already surfaced
//! detections: an overlapping newcomer is dropped unless it is strictly more
//! confident, in which case it evicts the weaker record.
//!
//! Call order per detection is [`NmsTracker::should_suppress`] first, then
//! [`NmsTracker::track`] only if it was not suppressed, so the retained set
//! reflects exactly what was shown to the user.

use super::profile::DetectionProfile;
use crate::geometry::{intersection_over_union, NormalizedBox};

#[derive(Clone, Debug, PartialEq)]
pub struct ConfirmedRecord {
    pub type_label: String,
    pub bbox: NormalizedBox,
    pub confidence: f64,
    pub timestamp: u64,
}

#[derive(Clone, Debug)]
pub struct NmsTracker {
    window_ms: u64,
    iou_threshold: f64,
    records: Vec<ConfirmedRecord>,
}

impl NmsTracker {
    pub fn new(window_ms: u64, iou_threshold: f64) -> Self {
        Self {
            window_ms,
            iou_threshold,
            records: Vec::new(),
        }
    }

    pub fn from_profile(profile: &DetectionProfile) -> Self {
        Self::new(profile.nms_window_ms, profile.nms_iou_threshold)
    }

    pub fn prune(&mut self, now: u64) {
        let window = self.window_ms;
        self.records.retain(|r| now.saturating_sub(r.timestamp) < window);
    }

    /// True when a retained record overlaps `bbox` at or above the IoU
    /// threshold and is at least as confident.
    pub fn should_suppress(
        &mut self,
        type_label: &str,
        bbox: &NormalizedBox,
        confidence: f64,
        now: u64,
    ) -> bool {
        self.prune(now);
        let stronger = self.records.iter().find(|r| {
            intersection_over_union(&r.bbox, bbox) >= self.iou_threshold
                && confidence <= r.confidence
        });
        if let Some(r) = stronger {
            log::debug!(
                "nms: {} ({:.0}) suppressed by {} ({:.0})",
                type_label,
                confidence,
                r.type_label,
                r.confidence
            );
        }
        stronger.is_some()
    }

    /// Register a surfaced detection, evicting weaker overlapping records.
    pub fn track(&mut self, type_label: &str, bbox: NormalizedBox, confidence: f64, now: u64) {
        self.prune(now);
        let iou_threshold = self.iou_threshold;
        self.records.retain(|r| {
            let weaker_overlap = intersection_over_union(&r.bbox, &bbox) >= iou_threshold
                && r.confidence < confidence;
            if weaker_overlap {
                log::debug!(
                    "nms: {} ({:.0}) replaces {} ({:.0})",
                    type_label,
                    confidence,
                    r.type_label,
                    r.confidence
                );
            }
            !weaker_overlap
        });
        self.records.push(ConfirmedRecord {
            type_label: type_label.to_string(),
            bbox,
            confidence,
            timestamp: now,
        });
    }

    pub fn records(&self) -> &[ConfirmedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
