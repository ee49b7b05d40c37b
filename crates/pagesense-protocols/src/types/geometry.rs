//! Geometry primitives in page-content coordinates.

use serde::{Deserialize, Serialize};

/// A point in page-content coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Bounding box for an element.
///
/// Width and height are never negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Create a box, clamping negative extents to zero.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Zero-area boxes carry no geometry of their own.
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Check if a point is inside this bounding box.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.right() && y >= self.y && y <= self.bottom()
    }

    /// Whether `other` lies fully inside this box. Shared edges count as inside.
    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Get the center point of this bounding box.
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Corner and center sample points: top-left, top-right, bottom-left,
    /// bottom-right, center. Corners are inset by one pixel so they land
    /// on the element rather than on its neighbour's edge.
    pub fn sample_points(&self) -> [Point; 5] {
        let inset_x = if self.width > 2.0 { 1.0 } else { 0.0 };
        let inset_y = if self.height > 2.0 { 1.0 } else { 0.0 };
        [
            Point::new(self.x + inset_x, self.y + inset_y),
            Point::new(self.right() - inset_x, self.y + inset_y),
            Point::new(self.x + inset_x, self.bottom() - inset_y),
            Point::new(self.right() - inset_x, self.bottom() - inset_y),
            self.center(),
        ]
    }

    /// Check if this box intersects with another.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    /// Translate by an offset.
    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    /// This box, or `parent` when this one has no area.
    pub fn or_parent(self, parent: Option<BoundingBox>) -> Self {
        match parent {
            Some(p) if self.is_empty() => p,
            _ => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clamps_negative() {
        let b = BoundingBox::new(1.0, 2.0, -5.0, 3.0);
        assert_eq!(b.width, 0.0);
        assert!(b.is_empty());
    }

    #[test]
    fn test_contains_box_boundary_inclusive() {
        let region = BoundingBox::new(0.0, 0.0, 100.0, 100.0);
        let on_edge = BoundingBox::new(50.0, 50.0, 50.0, 50.0);
        let over = BoundingBox::new(50.0, 50.0, 51.0, 50.0);
        assert!(region.contains_box(&on_edge));
        assert!(!region.contains_box(&over));
    }

    #[test]
    fn test_center_and_samples() {
        let b = BoundingBox::new(10.0, 10.0, 20.0, 10.0);
        assert_eq!(b.center(), Point::new(20.0, 15.0));
        let samples = b.sample_points();
        assert_eq!(samples[0], Point::new(11.0, 11.0));
        assert_eq!(samples[3], Point::new(29.0, 19.0));
        assert_eq!(samples[4], b.center());
    }

    #[test]
    fn test_intersects() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(a.intersects(&BoundingBox::new(5.0, 5.0, 10.0, 10.0)));
        assert!(!a.intersects(&BoundingBox::new(10.0, 0.0, 10.0, 10.0)));
    }

    #[test]
    fn test_or_parent_fallback() {
        let parent = BoundingBox::new(0.0, 0.0, 50.0, 50.0);
        assert_eq!(BoundingBox::new(3.0, 3.0, 0.0, 0.0).or_parent(Some(parent)), parent);
        let own = BoundingBox::new(3.0, 3.0, 4.0, 4.0);
        assert_eq!(own.or_parent(Some(parent)), own);
    }
}
