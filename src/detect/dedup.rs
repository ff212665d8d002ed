use super::profile::DetectionProfile;
use super::same_type;
use crate::geometry::{center_distance, NormalizedBox};

/// One previously surfaced detection.
#[derive(Clone, Debug, PartialEq)]
pub struct RecentDetection {
    pub type_label: String,
    pub bbox: Option<NormalizedBox>,
    pub timestamp: u64,
}

/// Cheap first-pass filter against repeats from consecutive frames of a
/// static scene. Matches on type plus center distance; no IoU.
#[derive(Clone, Debug)]
pub struct DeduplicationFilter {
    window_ms: u64,
    spatial_tolerance: f64,
    recent: Vec<RecentDetection>,
}

impl DeduplicationFilter {
    pub fn new(window_ms: u64, spatial_tolerance: f64) -> Self {
        Self {
            window_ms,
            spatial_tolerance,
            recent: Vec::new(),
        }
    }

    pub fn from_profile(profile: &DetectionProfile) -> Self {
        Self::new(profile.dedup_window_ms, profile.spatial_tolerance)
    }

    /// Drop records that have aged out of the window.
    pub fn prune(&mut self, now: u64) {
        let window = self.window_ms;
        self.recent.retain(|r| now.saturating_sub(r.timestamp) < window);
    }

    /// True when a retained record has the same type and either both boxes
    /// sit within the spatial tolerance, or neither side has a box.
    pub fn is_duplicate(
        &mut self,
        type_label: &str,
        bbox: Option<&NormalizedBox>,
        now: u64,
    ) -> bool {
        self.prune(now);
        self.recent.iter().any(|r| {
            if !same_type(&r.type_label, type_label) {
                return false;
            }
            match (r.bbox.as_ref(), bbox) {
                (Some(prev), Some(cur)) => center_distance(prev, cur) < self.spatial_tolerance,
                (None, None) => true,
                _ => false,
            }
        })
    }

    /// Register an accepted detection. Duplicates are never recorded, so the
    /// window is anchored on the first sighting.
    pub fn record(&mut self, type_label: &str, bbox: Option<NormalizedBox>, now: u64) {
        self.recent.push(RecentDetection {
            type_label: type_label.to_string(),
            bbox,
            timestamp: now,
        });
    }

    pub fn recent(&self) -> &[RecentDetection] {
        &self.recent
    }

    pub fn len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }

    pub fn clear(&mut self) {
        self.recent.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: u64 = 30_000;

    fn crack_box() -> NormalizedBox {
        NormalizedBox::new(0.2, 0.15, 0.45, 0.18).unwrap()
    }

    fn filter() -> DeduplicationFilter {
        DeduplicationFilter::from_profile(&DetectionProfile::property())
    }

    #[test]
    fn window_expiry() {
        let mut f = filter();
        let bx = crack_box();
        assert!(!f.is_duplicate("crack", Some(&bx), 0));
        f.record("crack", Some(bx), 0);

        assert!(f.is_duplicate("crack", Some(&bx), WINDOW - 1));
        assert!(!f.is_duplicate("crack", Some(&bx), WINDOW + 1));
        assert!(f.is_empty());
    }

    #[test]
    fn type_match_is_case_insensitive() {
        let mut f = filter();
        f.record("Crack", Some(crack_box()), 0);
        assert!(f.is_duplicate("CRACK", Some(&crack_box()), 10));
        assert!(!f.is_duplicate("leak", Some(&crack_box()), 10));
    }

    #[test]
    fn distant_boxes_are_distinct() {
        let mut f = filter();
        f.record("crack", Some(crack_box()), 0);
        let far = NormalizedBox::new(0.6, 0.6, 0.8, 0.8).unwrap();
        assert!(!f.is_duplicate("crack", Some(&far), 100));

        // Center moved by 0.1: inside the 0.15 property tolerance.
        let near = NormalizedBox::new(0.3, 0.15, 0.55, 0.18).unwrap();
        assert!(f.is_duplicate("crack", Some(&near), 100));
    }

    #[test]
    fn forensic_tolerance_is_tighter() {
        let mut f = DeduplicationFilter::from_profile(&DetectionProfile::forensic());
        f.record("casing", Some(crack_box()), 0);
        // Center moved by 0.13: outside 0.12.
        let moved = NormalizedBox::new(0.33, 0.15, 0.58, 0.18).unwrap();
        assert!(!f.is_duplicate("casing", Some(&moved), 100));
    }

    #[test]
    fn type_only_detections_match_on_type() {
        let mut f = filter();
        f.record("leak", None, 0);
        assert!(f.is_duplicate("Leak", None, 100));
        assert!(!f.is_duplicate("mold", None, 100));
    }

    #[test]
    fn boxed_and_type_only_records_do_not_match() {
        let mut f = filter();
        f.record("leak", None, 0);
        assert!(!f.is_duplicate("leak", Some(&crack_box()), 100));

        let mut f = filter();
        f.record("leak", Some(crack_box()), 0);
        assert!(!f.is_duplicate("leak", None, 100));
    }

    #[test]
    fn clear_forgets_everything() {
        let mut f = filter();
        f.record("crack", Some(crack_box()), 0);
        f.clear();
        assert!(!f.is_duplicate("crack", Some(&crack_box()), 1));
    }
}
