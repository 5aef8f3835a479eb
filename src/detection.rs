// src/detection.rs - Object detector output as the engine sees it
use crate::geometry::Point;
use serde::{Deserialize, Serialize};

/// Label the object detector reports for the ball.
pub const BASKETBALL_LABEL: &str = "basketball";

/// Axis-aligned normalized bounding box, top-left origin.
///
/// Detector-space boxes are converted once in [`BoundingBox::from_detector`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Converts a bottom-left origin box, where `y` is the lower edge.
    pub fn from_detector(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(x, 1.0 - y - height, width, height)
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    /// Half-open containment: the min edges belong to the box, the max edges don't.
    pub fn contains(&self, point: &Point) -> bool {
        self.width > 0.0
            && self.height > 0.0
            && point.x >= self.x
            && point.x < self.max_x()
            && point.y >= self.y
            && point.y < self.max_y()
    }
}

/// A single labelled detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    pub label: String,
    pub bbox: BoundingBox,
    pub confidence: f64,
}

impl DetectedObject {
    pub fn new(label: impl Into<String>, bbox: BoundingBox, confidence: f64) -> Self {
        Self {
            label: label.into(),
            bbox,
            confidence,
        }
    }

    pub fn is_labelled(&self, label: &str) -> bool {
        self.label == label
    }
}
