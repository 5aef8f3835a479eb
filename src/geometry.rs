// src/geometry.rs - Angle and alignment math on normalized points
use nalgebra::{Point2, Vector2};

/// Normalized 2D point. Engine-side points always use a top-left origin.
pub type Point = Point2<f64>;

/// Angle at vertex `b` between rays `b->a` and `b->c`, in degrees [0, 180].
///
/// Degenerate input (either ray of zero length) yields 0 rather than NaN.
pub fn angle_degrees(a: &Point, b: &Point, c: &Point) -> f64 {
    let ba: Vector2<f64> = a - b;
    let bc: Vector2<f64> = c - b;

    let mag_ba = ba.norm();
    let mag_bc = bc.norm();

    if mag_ba == 0.0 || mag_bc == 0.0 {
        return 0.0;
    }

    // acos is undefined past +-1; rounding can push the ratio there
    let cos_angle = (ba.dot(&bc) / (mag_ba * mag_bc)).clamp(-1.0, 1.0);
    cos_angle.acos().to_degrees()
}

/// Converts a bottom-left origin point into the top-left convention.
pub fn flip_vertical(x: f64, y: f64) -> Point {
    Point::new(x, 1.0 - y)
}

/// Sum of horizontal offsets between consecutive points of a chain.
pub fn horizontal_deviation(chain: &[Point]) -> f64 {
    chain
        .windows(2)
        .map(|pair| (pair[0].x - pair[1].x).abs())
        .sum()
}
