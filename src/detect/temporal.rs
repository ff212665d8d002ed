use std::collections::HashMap;

use super::profile::DetectionProfile;
use super::same_type;
use crate::geometry::{intersection_over_union, spatial_key, NormalizedBox};

/// A (type, location) pair seen at least once inside the temporal window.
#[derive(Clone, Debug, PartialEq)]
pub struct TemporalCandidate {
    pub type_label: String,
    pub bbox: NormalizedBox,
    /// Highest confidence seen across sightings.
    pub confidence: f64,
    /// Always >= 1.
    pub frame_count: u32,
    pub first_seen: u64,
    pub last_seen: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Consistency {
    pub confirmed: bool,
    pub frame_count: u32,
}

/// Multi-frame corroboration: a candidate is confirmed once it has been
/// sighted `threshold` times, each sighting within `window_ms` of the last.
#[derive(Clone, Debug)]
pub struct TemporalTracker {
    window_ms: u64,
    threshold: u32,
    iou_threshold: f64,
    candidates: HashMap<String, TemporalCandidate>,
}

impl TemporalTracker {
    pub fn new(window_ms: u64, threshold: u32, iou_threshold: f64) -> Self {
        Self {
            window_ms,
            threshold,
            iou_threshold,
            candidates: HashMap::new(),
        }
    }

    pub fn from_profile(profile: &DetectionProfile) -> Self {
        Self::new(
            profile.temporal_window_ms,
            profile.temporal_threshold,
            profile.iou_threshold,
        )
    }

    pub fn prune(&mut self, now: u64) {
        let window = self.window_ms;
        self.candidates.retain(|_, c| now.saturating_sub(c.last_seen) <= window);
    }

    /// Record a sighting and report whether the candidate is now confirmed.
    ///
    /// When several candidates overlap the new box, the one with the highest
    /// IoU absorbs the sighting.
    pub fn check_consistency(
        &mut self,
        type_label: &str,
        bbox: &NormalizedBox,
        confidence: f64,
        now: u64,
    ) -> Consistency {
        self.prune(now);

        let matched = self
            .candidates
            .iter()
            .filter(|(_, c)| same_type(&c.type_label, type_label))
            .map(|(key, c)| (key, intersection_over_union(&c.bbox, bbox)))
            .filter(|(_, iou)| *iou >= self.iou_threshold)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(key, _)| key.clone());

        if let Some(key) = matched {
            if let Some(candidate) = self.candidates.get_mut(&key) {
                candidate.frame_count = candidate.frame_count.saturating_add(1);
                candidate.last_seen = now;
                candidate.confidence = candidate.confidence.max(confidence);
                return Consistency {
                    confirmed: candidate.frame_count >= self.threshold,
                    frame_count: candidate.frame_count,
                };
            }
        }

        // An unmatched sighting in an occupied grid cell replaces the old
        // candidate there.
        self.candidates.insert(
            spatial_key(type_label, bbox),
            TemporalCandidate {
                type_label: type_label.to_string(),
                bbox: *bbox,
                confidence,
                frame_count: 1,
                first_seen: now,
                last_seen: now,
            },
        );
        Consistency {
            confirmed: self.threshold <= 1,
            frame_count: 1,
        }
    }

    pub fn candidate(&self, type_label: &str, bbox: &NormalizedBox) -> Option<&TemporalCandidate> {
        self.candidates.get(&spatial_key(type_label, bbox))
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn clear(&mut self) {
        self.candidates.clear();
    }
}
