//! Landmark points, index tables and last-known-good carrying.
//!
//! Index tables follow the MediaPipe face-mesh topology with refined iris
//! landmarks (478 points). A set with fewer points simply lacks the organs
//! whose indices fall past its end.

use serde::{Deserialize, Serialize};

/// Left eye contour, conventional 6-point EAR ordering.
pub const LEFT_EYE: [usize; 6] = [33, 160, 158, 133, 153, 144];
/// Right eye contour, conventional 6-point EAR ordering.
pub const RIGHT_EYE: [usize; 6] = [263, 387, 385, 362, 380, 373];
/// Left iris boundary points.
pub const LEFT_IRIS: [usize; 4] = [468, 469, 470, 471];
/// Right iris boundary points.
pub const RIGHT_IRIS: [usize; 4] = [473, 474, 475, 476];

/// Point count of a full face mesh with refined iris landmarks.
pub const FULL_MESH_POINTS: usize = 478;

/// A 2D landmark in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "(f32, f32)", into = "(f32, f32)")]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl From<(f32, f32)> for Point {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

impl From<Point> for (f32, f32) {
    fn from(p: Point) -> Self {
        (p.x, p.y)
    }
}

/// Landmarks for the single tracked face in one frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet {
    points: Vec<Point>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Gather the points at `indices`, or `None` if any index is missing.
    pub fn select<const N: usize>(&self, indices: &[usize; N]) -> Option<[Point; N]> {
        let mut out = [Point::default(); N];
        for (slot, &i) in out.iter_mut().zip(indices.iter()) {
            *slot = *self.points.get(i)?;
        }
        Some(out)
    }

    pub fn left_eye(&self) -> Option<[Point; 6]> {
        self.select(&LEFT_EYE)
    }

    pub fn right_eye(&self) -> Option<[Point; 6]> {
        self.select(&RIGHT_EYE)
    }

    pub fn left_iris(&self) -> Option<[Point; 4]> {
        self.select(&LEFT_IRIS)
    }

    pub fn right_iris(&self) -> Option<[Point; 4]> {
        self.select(&RIGHT_IRIS)
    }
}

impl From<Vec<Point>> for LandmarkSet {
    fn from(points: Vec<Point>) -> Self {
        Self::new(points)
    }
}

/// A value observed this frame, or the last one observed before it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Observed<T> {
    Fresh(T),
    Carried(T),
}

impl<T> Observed<T> {
    pub fn value(&self) -> &T {
        match self {
            Observed::Fresh(v) | Observed::Carried(v) => v,
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, Observed::Fresh(_))
    }
}

/// Last-known-good holder for per-organ geometry.
///
/// Feeding `Some` records a fresh value; feeding `None` hands back the most
/// recent fresh value (if any) marked as carried.
#[derive(Debug, Clone)]
pub struct Carried<T> {
    last: Option<T>,
}

impl<T> Default for Carried<T> {
    fn default() -> Self {
        Self { last: None }
    }
}

impl<T: Clone> Carried<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, current: Option<T>) -> Option<Observed<T>> {
        match current {
            Some(v) => {
                self.last = Some(v.clone());
                Some(Observed::Fresh(v))
            }
            None => self.last.clone().map(Observed::Carried),
        }
    }

    pub fn last(&self) -> Option<&T> {
        self.last.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh(n: usize) -> LandmarkSet {
        LandmarkSet::new((0..n).map(|i| Point::new(i as f32, 0.0)).collect())
    }

    #[test]
    fn test_select_full_mesh() {
        let lm = mesh(FULL_MESH_POINTS);
        let eye = lm.left_eye().unwrap();
        assert_eq!(eye[0], Point::new(33.0, 0.0));
        assert_eq!(eye[5], Point::new(144.0, 0.0));
        assert!(lm.right_iris().is_some());
    }

    #[test]
    fn test_select_without_iris_points() {
        // 468-point mesh: eyes present, irises absent
        let lm = mesh(468);
        assert!(lm.left_eye().is_some());
        assert!(lm.right_eye().is_some());
        assert!(lm.left_iris().is_none());
        assert!(lm.right_iris().is_none());
    }

    #[test]
    fn test_distance() {
        assert!((Point::new(0.0, 0.0).distance(Point::new(3.0, 4.0)) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_carried_returns_last_fresh() {
        let mut c = Carried::new();
        assert!(c.observe(None::<f32>).is_none());
        assert_eq!(c.observe(Some(2.0)), Some(Observed::Fresh(2.0)));
        assert_eq!(c.observe(None), Some(Observed::Carried(2.0)));
        assert_eq!(c.observe(None), Some(Observed::Carried(2.0)));
        assert_eq!(c.observe(Some(3.0)), Some(Observed::Fresh(3.0)));
    }

    #[test]
    fn test_landmarks_deserialize_from_pairs() {
        let lm: LandmarkSet = serde_json::from_str("[[1.0, 2.0], [3.5, 4.0]]").unwrap();
        assert_eq!(lm.len(), 2);
        assert_eq!(lm.points()[1], Point::new(3.5, 4.0));
    }
}
