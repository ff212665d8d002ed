use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

const TEMPORAL_WINDOW_MS: u64 = 3_000;
const TEMPORAL_THRESHOLD: u32 = 1;
const TEMPORAL_IOU_THRESHOLD: f64 = 0.25;
const NMS_WINDOW_MS: u64 = 5_000;
const NMS_IOU_THRESHOLD: f64 = 0.5;
const MIN_BOX_AREA: f64 = 0.001;
const MAX_BOX_AREA: f64 = 0.70;
const MAX_ASPECT_RATIO: f64 = 15.0;

/// Which deployment a profile was built for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    /// Crime-scene evidence capture.
    Forensic,
    /// Construction / property defect inspection.
    #[default]
    Property,
}

impl FromStr for ProfileKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "forensic" | "evidence" => Ok(Self::Forensic),
            "property" | "defect" | "construction" => Ok(Self::Property),
            other => Err(anyhow!(
                "unknown profile '{}': expected 'forensic' or 'property'",
                other
            )),
        }
    }
}

impl ProfileKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProfileKind::Forensic => "forensic",
            ProfileKind::Property => "property",
        }
    }
}

/// Every tunable of the filter chain, constructed once per mode and threaded
/// through the pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionProfile {
    /// Sliding window for the coarse duplicate filter.
    pub dedup_window_ms: u64,
    /// Maximum center distance (normalized) for two reports to be one defect.
    pub spatial_tolerance: f64,
    /// Detections below this confidence (0..100) are dropped.
    pub min_confidence: f64,
    pub temporal_window_ms: u64,
    /// Sightings required before a candidate is confirmed. 1 confirms on sight.
    pub temporal_threshold: u32,
    /// IoU at which a new sighting matches an existing temporal candidate.
    pub iou_threshold: f64,
    pub nms_window_ms: u64,
    pub nms_iou_threshold: f64,
    pub min_box_area: f64,
    pub max_box_area: f64,
    pub max_aspect_ratio: f64,
}

impl DetectionProfile {
    pub fn forensic() -> Self {
        Self {
            dedup_window_ms: 45_000,
            spatial_tolerance: 0.12,
            min_confidence: 70.0,
            ..Self::shared()
        }
    }

    pub fn property() -> Self {
        Self {
            dedup_window_ms: 30_000,
            spatial_tolerance: 0.15,
            min_confidence: 60.0,
            ..Self::shared()
        }
    }

    pub fn for_kind(kind: ProfileKind) -> Self {
        match kind {
            ProfileKind::Forensic => Self::forensic(),
            ProfileKind::Property => Self::property(),
        }
    }

    fn shared() -> Self {
        Self {
            dedup_window_ms: 0,
            spatial_tolerance: 0.0,
            min_confidence: 0.0,
            temporal_window_ms: TEMPORAL_WINDOW_MS,
            temporal_threshold: TEMPORAL_THRESHOLD,
            iou_threshold: TEMPORAL_IOU_THRESHOLD,
            nms_window_ms: NMS_WINDOW_MS,
            nms_iou_threshold: NMS_IOU_THRESHOLD,
            min_box_area: MIN_BOX_AREA,
            max_box_area: MAX_BOX_AREA,
            max_aspect_ratio: MAX_ASPECT_RATIO,
        }
    }

    pub fn with_temporal_threshold(mut self, threshold: u32) -> Self {
        self.temporal_threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.dedup_window_ms == 0 || self.temporal_window_ms == 0 || self.nms_window_ms == 0 {
            return Err(anyhow!("profile windows must be greater than zero"));
        }
        if self.temporal_threshold == 0 {
            return Err(anyhow!("temporal_threshold must be at least 1"));
        }
        if !(0.0..=100.0).contains(&self.min_confidence) {
            return Err(anyhow!(
                "min_confidence must be within 0..=100, got {}",
                self.min_confidence
            ));
        }
        for (name, value) in [
            ("spatial_tolerance", self.spatial_tolerance),
            ("iou_threshold", self.iou_threshold),
            ("nms_iou_threshold", self.nms_iou_threshold),
            ("min_box_area", self.min_box_area),
            ("max_box_area", self.max_box_area),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("{} must be within 0..=1, got {}", name, value));
            }
        }
        if self.min_box_area >= self.max_box_area {
            return Err(anyhow!("min_box_area must be below max_box_area"));
        }
        if self.max_aspect_ratio.is_nan() || self.max_aspect_ratio < 1.0 {
            return Err(anyhow!("max_aspect_ratio must be at least 1"));
        }
        Ok(())
    }
}

impl Default for DetectionProfile {
    fn default() -> Self {
        Self::property()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_validate() {
        DetectionProfile::forensic().validate().unwrap();
        DetectionProfile::property().validate().unwrap();
    }

    #[test]
    fn presets_differ_only_in_dedup_and_confidence() {
        let f = DetectionProfile::forensic();
        let p = DetectionProfile::property();
        assert_eq!(f.dedup_window_ms, 45_000);
        assert_eq!(p.dedup_window_ms, 30_000);
        assert_eq!(f.spatial_tolerance, 0.12);
        assert_eq!(p.spatial_tolerance, 0.15);
        assert_eq!(f.min_confidence, 70.0);
        assert_eq!(p.min_confidence, 60.0);
        assert_eq!(f.temporal_threshold, 1);
        assert_eq!(f.temporal_window_ms, p.temporal_window_ms);
        assert_eq!(f.nms_iou_threshold, p.nms_iou_threshold);
    }

    #[test]
    fn validate_rejects_zero_threshold_and_bad_ranges() {
        assert!(DetectionProfile::property()
            .with_temporal_threshold(0)
            .validate()
            .is_err());

        let mut p = DetectionProfile::property();
        p.nms_iou_threshold = 1.5;
        assert!(p.validate().is_err());

        let mut p = DetectionProfile::forensic();
        p.min_box_area = 0.8;
        assert!(p.validate().is_err());

        let mut p = DetectionProfile::forensic();
        p.nms_window_ms = 0;
        assert!(p.validate().is_err());
    }

    #[test]
    fn profile_kind_parses_aliases() {
        assert_eq!("Evidence".parse::<ProfileKind>().unwrap(), ProfileKind::Forensic);
        assert_eq!(" defect ".parse::<ProfileKind>().unwrap(), ProfileKind::Property);
        assert!("xray".parse::<ProfileKind>().is_err());
    }
}
