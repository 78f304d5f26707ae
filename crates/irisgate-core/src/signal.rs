//! Stateless per-frame geometry: eye aspect ratio and iris shape.
//!
//! Degenerate input (zero-width eye, empty point set) yields `None` rather
//! than NaN so callers can fall back explicitly.

use crate::landmarks::Point;

/// Horizontal eye width below which EAR is undefined.
const MIN_EYE_WIDTH: f32 = 1e-6;

/// Added to the mean radius before dividing, so a collapsed iris reads as 0.
const CIRCULARITY_EPSILON: f32 = 1e-8;

/// Iris radius below which the points are treated as not located.
const MIN_IRIS_RADIUS: f32 = 1e-6;

/// Eye Aspect Ratio of a 6-point eye contour.
///
/// `(|p1 - p5| + |p2 - p4|) / (2 * |p0 - p3|)`. Open eyes sit around 0.25–0.35,
/// a closed eye drops towards 0.
pub fn eye_aspect_ratio(eye: &[Point; 6]) -> Option<f32> {
    let a = eye[1].distance(eye[5]);
    let b = eye[2].distance(eye[4]);
    let c = eye[0].distance(eye[3]);
    if c < MIN_EYE_WIDTH {
        return None;
    }
    Some((a + b) / (2.0 * c))
}

/// Arithmetic mean of the points.
pub fn iris_center(points: &[Point]) -> Option<Point> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f32;
    let (sx, sy) = points
        .iter()
        .fold((0.0f32, 0.0f32), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some(Point::new(sx / n, sy / n))
}

fn center_distances(points: &[Point]) -> Option<Vec<f32>> {
    let c = iris_center(points)?;
    Some(points.iter().map(|p| p.distance(c)).collect())
}

fn mean(values: &[f32]) -> f32 {
    values.iter().sum::<f32>() / values.len() as f32
}

/// Mean distance from each point to the center. Needs at least 3 points.
pub fn iris_radius(points: &[Point]) -> Option<f32> {
    if points.len() < 3 {
        return None;
    }
    center_distances(points).map(|d| mean(&d))
}

/// Normalised dispersion of the boundary points around their centroid.
///
/// Population standard deviation of the point-to-center distances divided by
/// their mean. A clean circle reads ~0; occlusion and edge noise push it up.
pub fn circularity(points: &[Point]) -> Option<f32> {
    let d = center_distances(points)?;
    let m = mean(&d);
    let var = d.iter().map(|v| (v - m) * (v - m)).sum::<f32>() / d.len() as f32;
    Some(var.sqrt() / (m + CIRCULARITY_EPSILON))
}

/// Geometry derived from one iris in one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IrisGeometry {
    pub center: Point,
    pub radius: f32,
    pub circularity: f32,
}

impl IrisGeometry {
    /// `None` for too few points or a collapsed iris (all points coincident),
    /// which is how providers report an iris they could not locate.
    ///
    /// A collapsed iris is therefore treated like a missing one: it is left
    /// out of the shape average and the carried geometry stands in for
    /// motion and reaction. Scored directly it would read as a perfect
    /// circle (circularity 0) and dilute edge noise on the other eye.
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let radius = iris_radius(points)?;
        if radius < MIN_IRIS_RADIUS {
            return None;
        }
        Some(Self {
            center: iris_center(points)?,
            radius,
            circularity: circularity(points)?,
        })
    }
}
