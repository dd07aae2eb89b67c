//! Planar geometry for the spatial tree.
//!
//! Terrain cells are axis-aligned squares ([`Rect`]); search areas are disks.
//! [`Rect::disk_coverage`] classifies how a disk overlaps a cell, which is
//! what lets a radius query skip whole subtrees.

use serde::{Deserialize, Serialize};

/// A continuous position on the landscape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Point {
    /// Build a point.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Manhattan distance to another point.
    pub const fn manhattan_to(self, other: Self) -> f64 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

/// How a disk overlaps a rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Coverage {
    /// The disk contains the whole rectangle.
    Full,
    /// The disk and the rectangle intersect.
    Partial,
    /// The disk and the rectangle are disjoint.
    Null,
}

/// An axis-aligned rectangle, closed on its minimum edges and open on its maximum edges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Lower-left corner.
    pub min: Point,
    /// Upper-right corner.
    pub max: Point,
}

impl Rect {
    /// Build a rectangle from two corners.
    pub const fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    /// A square of side `size` anchored at `min`.
    pub const fn square(min: Point, size: f64) -> Self {
        Self {
            min,
            max: Point::new(min.x + size, min.y + size),
        }
    }

    /// Horizontal extent.
    pub const fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// Vertical extent.
    pub const fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Geometric centre.
    pub const fn center(&self) -> Point {
        Point::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
        )
    }

    /// Whether `p` lies inside (minimum edges inclusive, maximum edges exclusive).
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x && p.x < self.max.x && p.y >= self.min.y && p.y < self.max.y
    }

    /// Whether `p` lies inside or on any edge.
    pub fn contains_inclusive(&self, p: Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// The point of the rectangle closest to `p`.
    pub const fn closest_point(&self, p: Point) -> Point {
        Point::new(
            p.x.clamp(self.min.x, self.max.x),
            p.y.clamp(self.min.y, self.max.y),
        )
    }

    /// Distance from `p` to the rectangle; zero when `p` is inside.
    pub fn distance_to_point(&self, p: Point) -> f64 {
        p.distance_to(self.closest_point(p))
    }

    /// The four corners, counter-clockwise from `min`.
    pub const fn corners(&self) -> [Point; 4] {
        [
            self.min,
            Point::new(self.max.x, self.min.y),
            self.max,
            Point::new(self.min.x, self.max.y),
        ]
    }

    /// Classify the overlap between this rectangle and the disk of `radius` around `center`.
    pub fn disk_coverage(&self, center: Point, radius: f64) -> Coverage {
        if self.distance_to_point(center) > radius {
            Coverage::Null
        } else if self
            .corners()
            .iter()
            .all(|corner| corner.distance_to(center) <= radius)
        {
            Coverage::Full
        } else {
            Coverage::Partial
        }
    }

    /// Clamp `p` into the rectangle, nudging points on the maximum edges inside.
    pub fn clamp_inside(&self, p: Point, epsilon: f64) -> Point {
        let x = p.x.clamp(self.min.x, self.max.x);
        let y = p.y.clamp(self.min.y, self.max.y);
        Point::new(
            if x >= self.max.x { self.max.x - epsilon } else { x },
            if y >= self.max.y { self.max.y - epsilon } else { y },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> Rect {
        Rect::square(Point::new(0.0, 0.0), 1.0)
    }

    #[test]
    fn containment_is_half_open() {
        let r = unit();
        assert!(r.contains(Point::new(0.0, 0.0)));
        assert!(!r.contains(Point::new(1.0, 0.5)));
        assert!(r.contains_inclusive(Point::new(1.0, 0.5)));
    }

    #[test]
    fn distance_is_zero_inside() {
        let r = unit();
        assert!(r.distance_to_point(Point::new(0.5, 0.5)).abs() < f64::EPSILON);
        assert!((r.distance_to_point(Point::new(3.0, 0.5)) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn disk_coverage_classification() {
        let r = unit();
        assert_eq!(r.disk_coverage(Point::new(0.5, 0.5), 1.0), Coverage::Full);
        assert_eq!(r.disk_coverage(Point::new(1.2, 0.5), 0.5), Coverage::Partial);
        assert_eq!(r.disk_coverage(Point::new(5.0, 5.0), 1.0), Coverage::Null);
    }

    #[test]
    fn clamp_inside_nudges_max_edge() {
        let r = unit();
        let p = r.clamp_inside(Point::new(1.0, 2.0), 1e-6);
        assert!(r.contains(p));
    }
}
