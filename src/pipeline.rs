//! Per-session filter chain.
//!
//! Every raw detector message runs Validator, Dedup, Temporal, then NMS. The
//! first stage that filters a detection short-circuits the rest. Type-only
//! detections (no usable box) skip Temporal and NMS, which both need spatial
//! state.

use std::fmt;

use crate::detect::{
    parse_payload, validate, DeduplicationFilter, Detection, DetectionKind, DetectionProfile,
    NmsTracker, RawDetection, RawPayload, Rejection, TemporalTracker,
};

/// Why a detection was not surfaced. None of these are errors.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterReason {
    Malformed(String),
    MissingType,
    LowConfidence { confidence: f64, minimum: f64 },
    Duplicate,
    Unconfirmed { frame_count: u32 },
    Suppressed,
}

impl From<Rejection> for FilterReason {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::MissingType => FilterReason::MissingType,
            Rejection::LowConfidence {
                confidence,
                minimum,
            } => FilterReason::LowConfidence {
                confidence,
                minimum,
            },
        }
    }
}

impl fmt::Display for FilterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterReason::Malformed(reason) => write!(f, "malformed payload: {}", reason),
            FilterReason::MissingType => write!(f, "missing_type"),
            FilterReason::LowConfidence {
                confidence,
                minimum,
            } => write!(f, "low_confidence ({:.1} < {:.1})", confidence, minimum),
            FilterReason::Duplicate => write!(f, "duplicate"),
            FilterReason::Unconfirmed { frame_count } => {
                write!(f, "unconfirmed ({} frame(s))", frame_count)
            }
            FilterReason::Suppressed => write!(f, "suppressed by nms"),
        }
    }
}

/// Result of feeding one message through the chain.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameOutcome {
    Confirmed(Detection),
    Filtered(FilterReason),
    /// Detector reported nothing of interest in the frame.
    Clear,
    /// Detector is still analysing.
    Scanning,
}

impl FrameOutcome {
    pub fn confirmed(&self) -> Option<&Detection> {
        match self {
            FrameOutcome::Confirmed(detection) => Some(detection),
            _ => None,
        }
    }
}

/// Owns the three rolling collections for one streaming session.
#[derive(Clone, Debug)]
pub struct DetectionPipeline {
    profile: DetectionProfile,
    dedup: DeduplicationFilter,
    temporal: TemporalTracker,
    nms: NmsTracker,
}

impl DetectionPipeline {
    pub fn new(profile: DetectionProfile) -> Self {
        Self {
            dedup: DeduplicationFilter::from_profile(&profile),
            temporal: TemporalTracker::from_profile(&profile),
            nms: NmsTracker::from_profile(&profile),
            profile,
        }
    }

    pub fn profile(&self) -> &DetectionProfile {
        &self.profile
    }

    /// Parse and filter one raw detector message received at `now`.
    pub fn process(&mut self, raw_text: &str, now: u64) -> FrameOutcome {
        self.process_payload(parse_payload(raw_text), now)
    }

    pub fn process_payload(&mut self, payload: RawPayload, now: u64) -> FrameOutcome {
        match payload {
            RawPayload::Defect(raw) => self.process_detection(DetectionKind::Defect, &raw, now),
            RawPayload::Evidence(raw) => self.process_detection(DetectionKind::Evidence, &raw, now),
            RawPayload::Clear => FrameOutcome::Clear,
            RawPayload::Scanning => FrameOutcome::Scanning,
            RawPayload::Malformed(reason) => {
                log::warn!("dropping malformed detector payload: {}", reason);
                FrameOutcome::Filtered(FilterReason::Malformed(reason))
            }
        }
    }

    pub fn process_detection(
        &mut self,
        kind: DetectionKind,
        raw: &RawDetection,
        now: u64,
    ) -> FrameOutcome {
        let outcome = match validate(kind, raw, &self.profile, now) {
            Ok(detection) => self.filter(detection),
            Err(rejection) => Err(rejection.into()),
        };
        match outcome {
            Ok(detection) => {
                log::info!(
                    "confirmed {} '{}' ({:.0}%, {})",
                    detection.category.as_str(),
                    detection.type_label,
                    detection.confidence,
                    if detection.bbox.is_some() { "boxed" } else { "type-only" }
                );
                FrameOutcome::Confirmed(detection)
            }
            Err(reason) => {
                let label = raw.type_label.as_deref().unwrap_or("<untyped>");
                log::debug!("filtered '{}': {}", label, reason);
                FrameOutcome::Filtered(reason)
            }
        }
    }

    /// Run an already validated detection through Dedup, Temporal and NMS.
    pub fn filter(&mut self, detection: Detection) -> Result<Detection, FilterReason> {
        let now = detection.timestamp;
        let label = detection.type_label.as_str();

        if self.dedup.is_duplicate(label, detection.bbox.as_ref(), now) {
            return Err(FilterReason::Duplicate);
        }

        if let Some(bbox) = detection.bbox {
            let consistency =
                self.temporal
                    .check_consistency(label, &bbox, detection.confidence, now);
            if !consistency.confirmed {
                return Err(FilterReason::Unconfirmed {
                    frame_count: consistency.frame_count,
                });
            }
            if self
                .nms
                .should_suppress(label, &bbox, detection.confidence, now)
            {
                return Err(FilterReason::Suppressed);
            }
            self.nms.track(label, bbox, detection.confidence, now);
        }

        self.dedup.record(label, detection.bbox, now);
        Ok(detection)
    }

    /// Forget all rolling state.
    pub fn reset(&mut self) {
        self.dedup.clear();
        self.temporal.clear();
        self.nms.clear();
    }

    /// True when no stage holds any state.
    pub fn is_idle(&self) -> bool {
        self.dedup.is_empty() && self.temporal.is_empty() && self.nms.is_empty()
    }

    pub fn dedup(&self) -> &DeduplicationFilter {
        &self.dedup
    }

    pub fn temporal(&self) -> &TemporalTracker {
        &self.temporal
    }

    pub fn nms(&self) -> &NmsTracker {
        &self.nms
    }
}

impl Default for DetectionPipeline {
    fn default() -> Self {
        Self::new(DetectionProfile::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Category;
    use crate::geometry::NormalizedBox;
    use serde_json::json;

    fn crack(confidence: f64, box_2d: [f64; 4]) -> String {
        json!({
            "type": "defect",
            "defectType": "crack",
            "confidence": confidence,
            "box_2d": box_2d,
        })
        .to_string()
    }

    #[test]
    fn single_boxed_detection_is_confirmed_and_tracked() {
        let mut p = DetectionPipeline::default();
        let outcome = p.process(&crack(85.0, [200.0, 150.0, 450.0, 180.0]), 1_000);
        let det = outcome.confirmed().unwrap();
        assert_eq!(det.category, Category::Structural);
        assert_eq!(det.bbox, NormalizedBox::new(0.2, 0.15, 0.45, 0.18));
        assert_eq!(p.dedup().len(), 1);
        assert_eq!(p.temporal().len(), 1);
        assert_eq!(p.nms().len(), 1);
    }

    #[test]
    fn repeat_in_same_place_is_duplicate() {
        let mut p = DetectionPipeline::default();
        assert!(p.process(&crack(85.0, [200.0, 150.0, 450.0, 180.0]), 0).confirmed().is_some());
        assert_eq!(
            p.process(&crack(88.0, [205.0, 150.0, 455.0, 180.0]), 250),
            FrameOutcome::Filtered(FilterReason::Duplicate)
        );
    }

    #[test]
    fn rejection_short_circuits_before_stateful_stages() {
        let mut p = DetectionPipeline::default();
        let outcome = p.process(&crack(40.0, [200.0, 150.0, 450.0, 180.0]), 0);
        assert!(matches!(
            outcome,
            FrameOutcome::Filtered(FilterReason::LowConfidence { .. })
        ));
        assert!(p.is_idle());
    }

    #[test]
    fn unconfirmed_sighting_does_not_block_its_confirmation() {
        let profile = DetectionProfile::property().with_temporal_threshold(2);
        let mut p = DetectionPipeline::new(profile);
        assert_eq!(
            p.process(&crack(80.0, [200.0, 150.0, 450.0, 180.0]), 0),
            FrameOutcome::Filtered(FilterReason::Unconfirmed { frame_count: 1 })
        );
        assert!(p.dedup().is_empty());
        assert!(p
            .process(&crack(82.0, [200.0, 150.0, 450.0, 180.0]), 400)
            .confirmed()
            .is_some());
    }

    #[test]
    fn type_only_detection_skips_spatial_stages() {
        let mut p = DetectionPipeline::default();
        let payload = json!({"type": "defect", "defectType": "mold", "confidence": 75}).to_string();
        let det = p.process(&payload, 0);
        assert!(det.confirmed().unwrap().bbox.is_none());
        assert!(p.temporal().is_empty());
        assert!(p.nms().is_empty());
        assert_eq!(
            p.process(&payload, 500),
            FrameOutcome::Filtered(FilterReason::Duplicate)
        );
    }

    #[test]
    fn non_detection_payloads_pass_through() {
        let mut p = DetectionPipeline::default();
        assert_eq!(p.process(r#"{"type":"clear"}"#, 0), FrameOutcome::Clear);
        assert_eq!(p.process(r#"{"type":"scanning"}"#, 0), FrameOutcome::Scanning);
        assert!(matches!(
            p.process("the model is thinking", 0),
            FrameOutcome::Filtered(FilterReason::Malformed(_))
        ));
    }

    #[test]
    fn reset_clears_all_stages() {
        let mut p = DetectionPipeline::default();
        p.process(&crack(85.0, [200.0, 150.0, 450.0, 180.0]), 0);
        assert!(!p.is_idle());
        p.reset();
        assert!(p.is_idle());
        assert!(p.process(&crack(85.0, [200.0, 150.0, 450.0, 180.0]), 10).confirmed().is_some());
    }
}
