//! Normalized bounding-box geometry.
//!
//! Boxes are expressed as `[ymin, xmin, ymax, xmax]` fractions of the source
//! frame. Detector output arrives in an unknown scale (0..1, 0..100 or 0..1000)
//! and must pass through [`auto_scale_and_clamp`] before any of the overlap
//! math here is meaningful.

use serde::{Deserialize, Serialize};

/// Axis-aligned box in normalized `[0, 1]` frame coordinates.
///
/// Invariant: `ymin < ymax` and `xmin < xmax`, all four values in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBox {
    pub ymin: f64,
    pub xmin: f64,
    pub ymax: f64,
    pub xmax: f64,
}

impl NormalizedBox {
    /// Build a box, returning `None` when the invariant does not hold.
    pub fn new(ymin: f64, xmin: f64, ymax: f64, xmax: f64) -> Option<Self> {
        let values = [ymin, xmin, ymax, xmax];
        if values
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0 || *v > 1.0)
        {
            return None;
        }
        if ymin >= ymax || xmin >= xmax {
            return None;
        }
        Some(Self {
            ymin,
            xmin,
            ymax,
            xmax,
        })
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Long side over short side. Infinite for a zero-thickness box.
    pub fn aspect_ratio(&self) -> f64 {
        let (w, h) = (self.width(), self.height());
        let short = w.min(h);
        if short <= 0.0 {
            return f64::INFINITY;
        }
        w.max(h) / short
    }

    /// Center as `(x, y)`.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.xmin + self.xmax) / 2.0,
            (self.ymin + self.ymax) / 2.0,
        )
    }
}

/// Standard intersection-over-union. Degenerate unions yield 0.
pub fn intersection_over_union(a: &NormalizedBox, b: &NormalizedBox) -> f64 {
    let inter_w = (a.xmax.min(b.xmax) - a.xmin.max(b.xmin)).max(0.0);
    let inter_h = (a.ymax.min(b.ymax) - a.ymin.max(b.ymin)).max(0.0);
    let intersection = inter_w * inter_h;
    let union = a.area() + b.area() - intersection;
    if union <= 0.0 || !union.is_finite() {
        return 0.0;
    }
    (intersection / union).clamp(0.0, 1.0)
}

/// Euclidean distance between box centers, in normalized units.
pub fn center_distance(a: &NormalizedBox, b: &NormalizedBox) -> f64 {
    let (ax, ay) = a.center();
    let (bx, by) = b.center();
    (ax - bx).hypot(ay - by)
}

/// Coarse identity key for a physical location: lowercased type plus the box
/// center quantized to one decimal (roughly ten buckets per axis).
pub fn spatial_key(type_label: &str, bbox: &NormalizedBox) -> String {
    let (cx, cy) = bbox.center();
    format!("{}_{:.1}_{:.1}", type_label.trim().to_lowercase(), cx, cy)
}

/// Coordinate scale inferred from a raw detector box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoordinateScale {
    Unit,
    Percent,
    Permille,
}

impl CoordinateScale {
    /// Inspect the largest magnitude: above 100 means 0..1000, above 1 means
    /// 0..100, otherwise the values are already fractions.
    pub fn detect(raw: &[f64; 4]) -> Self {
        let max_abs = raw.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        if max_abs > 100.0 {
            CoordinateScale::Permille
        } else if max_abs > 1.0 {
            CoordinateScale::Percent
        } else {
            CoordinateScale::Unit
        }
    }

    pub fn divisor(self) -> f64 {
        match self {
            CoordinateScale::Unit => 1.0,
            CoordinateScale::Percent => 100.0,
            CoordinateScale::Permille => 1000.0,
        }
    }
}

/// Normalize a raw `[ymin, xmin, ymax, xmax]` tuple of unknown scale.
///
/// Inverted pairs are swapped and every value is clamped to `[0, 1]`. Returns
/// `None` when the result has no width or height.
pub fn auto_scale_and_clamp(raw: [f64; 4]) -> Option<NormalizedBox> {
    if raw.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let divisor = CoordinateScale::detect(&raw).divisor();
    let [mut ymin, mut xmin, mut ymax, mut xmax] = raw.map(|v| v / divisor);

    if ymin > ymax {
        std::mem::swap(&mut ymin, &mut ymax);
    }
    if xmin > xmax {
        std::mem::swap(&mut xmin, &mut xmax);
    }

    let ymin = ymin.clamp(0.0, 1.0);
    let xmin = xmin.clamp(0.0, 1.0);
    let ymax = ymax.clamp(0.0, 1.0);
    let xmax = xmax.clamp(0.0, 1.0);

    NormalizedBox::new(ymin, xmin, ymax, xmax)
}

/// How source media is fitted into its on-screen container (CSS `object-fit`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Scale up until the container is filled; the overflow axis is cropped.
    #[default]
    Cover,
    /// Scale until the whole source fits; the slack axis is letterboxed.
    Contain,
    /// Stretch each axis independently.
    Fill,
}

/// On-screen rectangle in device pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DisplayRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Map a source-space box onto a container rendered with `fit`.
///
/// Origins are snapped to the pixel grid plus half a pixel so one-pixel
/// strokes land on a single device row/column. Returns `None` for empty
/// source or display dimensions.
pub fn transform_box_for_display(
    bbox: &NormalizedBox,
    source_w: f64,
    source_h: f64,
    display_w: f64,
    display_h: f64,
    fit: FitMode,
) -> Option<DisplayRect> {
    let dims = [source_w, source_h, display_w, display_h];
    if dims.iter().any(|d| !d.is_finite() || *d <= 0.0) {
        return None;
    }

    let scale_x = display_w / source_w;
    let scale_y = display_h / source_h;
    let (rendered_w, rendered_h) = match fit {
        FitMode::Cover => {
            let scale = scale_x.max(scale_y);
            (source_w * scale, source_h * scale)
        }
        FitMode::Contain => {
            let scale = scale_x.min(scale_y);
            (source_w * scale, source_h * scale)
        }
        FitMode::Fill => (display_w, display_h),
    };
    let offset_x = (display_w - rendered_w) / 2.0;
    let offset_y = (display_h - rendered_h) / 2.0;

    let x = offset_x + bbox.xmin * rendered_w;
    let y = offset_y + bbox.ymin * rendered_h;
    let width = bbox.width() * rendered_w;
    let height = bbox.height() * rendered_h;

    Some(DisplayRect {
        x: x.round() + 0.5,
        y: y.round() + 0.5,
        width: width.round(),
        height: height.round(),
    })
}
