use std::fmt;

use super::category::categorize;
use super::payload::RawDetection;
use super::profile::DetectionProfile;
use super::result::{Detection, DetectionKind};
use crate::geometry::{auto_scale_and_clamp, NormalizedBox};

/// Confidence assumed when the model omits one or sends something unreadable.
pub const DEFAULT_CONFIDENCE: f64 = 70.0;

/// Why a raw detection was dropped before reaching the filter chain.
#[derive(Clone, Debug, PartialEq)]
pub enum Rejection {
    MissingType,
    LowConfidence { confidence: f64, minimum: f64 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::MissingType => write!(f, "missing_type"),
            Rejection::LowConfidence {
                confidence,
                minimum,
            } => write!(f, "low_confidence ({:.1} < {:.1})", confidence, minimum),
        }
    }
}

/// Why a box was discarded. The detection itself survives as type-only.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BoxIssue {
    Degenerate,
    TooSmall { area: f64 },
    TooLarge { area: f64 },
    TooElongated { aspect_ratio: f64 },
}

impl fmt::Display for BoxIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoxIssue::Degenerate => write!(f, "degenerate box"),
            BoxIssue::TooSmall { area } => write!(f, "box too small (area {:.4})", area),
            BoxIssue::TooLarge { area } => write!(f, "box too large (area {:.3})", area),
            BoxIssue::TooElongated { aspect_ratio } => {
                write!(f, "box too elongated (aspect {:.1})", aspect_ratio)
            }
        }
    }
}

/// Noise-sized, near-whole-frame and sliver boxes are not trusted.
pub fn check_box(bbox: &NormalizedBox, profile: &DetectionProfile) -> Result<(), BoxIssue> {
    let area = bbox.area();
    if area < profile.min_box_area {
        return Err(BoxIssue::TooSmall { area });
    }
    if area > profile.max_box_area {
        return Err(BoxIssue::TooLarge { area });
    }
    let aspect_ratio = bbox.aspect_ratio();
    if aspect_ratio > profile.max_aspect_ratio {
        return Err(BoxIssue::TooElongated { aspect_ratio });
    }
    Ok(())
}

/// Normalize a raw box and apply the sanity limits.
pub fn normalize_box(
    raw: [f64; 4],
    profile: &DetectionProfile,
) -> Result<NormalizedBox, BoxIssue> {
    let bbox = auto_scale_and_clamp(raw).ok_or(BoxIssue::Degenerate)?;
    check_box(&bbox, profile)?;
    Ok(bbox)
}

/// Turn a raw detector report into a [`Detection`].
///
/// Box problems never reject the detection; the box is dropped and the
/// detection continues as type-only.
pub fn validate(
    kind: DetectionKind,
    raw: &RawDetection,
    profile: &DetectionProfile,
    timestamp: u64,
) -> Result<Detection, Rejection> {
    let type_label = raw
        .type_label
        .as_deref()
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .ok_or(Rejection::MissingType)?
        .to_string();

    let confidence = raw
        .confidence
        .unwrap_or(DEFAULT_CONFIDENCE)
        .clamp(0.0, 100.0);
    if confidence < profile.min_confidence {
        return Err(Rejection::LowConfidence {
            confidence,
            minimum: profile.min_confidence,
        });
    }

    let bbox = match raw.box_2d {
        Some(values) => match normalize_box(values, profile) {
            Ok(bbox) => Some(bbox),
            Err(issue) => {
                log::debug!("{}: {}; continuing as type-only", type_label, issue);
                None
            }
        },
        None => None,
    };

    Ok(Detection {
        kind,
        category: categorize(kind, &type_label),
        type_label,
        bbox,
        confidence,
        timestamp,
        details: raw.details.clone(),
    })
}
