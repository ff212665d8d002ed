use serde::{Deserialize, Serialize};

use super::category::Category;
use crate::geometry::NormalizedBox;

/// Which detector prompt produced a detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionKind {
    Defect,
    Evidence,
}

impl DetectionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DetectionKind::Defect => "defect",
            DetectionKind::Evidence => "evidence",
        }
    }
}

/// Free-text fields the model attaches to a detection. Passed through to the
/// consumer untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

/// A validated detection on its way through the filter chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub kind: DetectionKind,
    pub type_label: String,
    pub category: Category,
    /// `None` for type-only detections (no usable box).
    #[serde(rename = "box")]
    pub bbox: Option<NormalizedBox>,
    /// Clamped to `0..=100`.
    pub confidence: f64,
    /// Epoch milliseconds.
    pub timestamp: u64,
    #[serde(default)]
    pub details: DetectionDetails,
}
