// THEORY:
// The `component` module holds the "dumb" data containers produced by the
// `RegionSegmenter`. A `ConnectedComponent` is one 4-connected island of
// anomalous-red pixels, summarized by its pixel count and bounding box only;
// the pixels themselves are not kept. A `ShapeDescriptor` is the shape test
// derived from a component: how much of its bounding box it fills (extent), how
// wide it is relative to its height (aspect), and whether both fall inside the
// configured "lesion-like oval" band.

use crate::config::ShapeConfig;
use serde::Serialize;

/// A pixel coordinate (column `x`, row `y`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

/// Inclusive bounding box of a component: `min` is top-left, `max` bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox {
    pub fn width(&self) -> u32 {
        self.max.x - self.min.x + 1
    }

    pub fn height(&self) -> u32 {
        self.max.y - self.min.y + 1
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }
}

/// One 4-connected region of the anomaly mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectedComponent {
    /// Discovery order in the row-major scan, starting at 0.
    pub id: u32,
    /// Pixel count.
    pub area: usize,
    pub bounding_box: BoundingBox,
}

/// Shape test derived from a component and its bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ShapeDescriptor {
    /// area / bounding-box area, 0..1.
    pub extent: f64,
    /// bounding-box width / height.
    pub aspect: f64,
    /// extent ≥ `extent_min` and aspect inside `[oval_aspect_lo, oval_aspect_hi]`.
    pub oval: bool,
}

impl ShapeDescriptor {
    pub fn describe(component: &ConnectedComponent, shape: &ShapeConfig) -> Self {
        let bbox = &component.bounding_box;
        let bbox_area = (bbox.area() as f64).max(1.0);
        let extent = component.area as f64 / bbox_area;
        let aspect = bbox.width() as f64 / (bbox.height() as f64).max(1.0);
        let oval = extent >= shape.extent_min
            && (shape.oval_aspect_lo..=shape.oval_aspect_hi).contains(&aspect);
        Self {
            extent,
            aspect,
            oval,
        }
    }

    /// Multiplier used to rank candidate components: ovality and fill both count.
    pub fn rank_weight(&self) -> f64 {
        let oval = if self.oval { 1.0 } else { 0.0 };
        (0.5 + 0.5 * oval) * (0.5 + 0.5 * self.extent)
    }
}
