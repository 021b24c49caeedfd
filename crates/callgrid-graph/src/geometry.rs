use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// World or screen space point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        self.x.hypot(self.y)
    }

    pub fn distance(self, other: Vec2) -> f32 {
        (self - other).length()
    }

    pub fn lerp(self, other: Vec2, t: f32) -> Vec2 {
        self + (other - self) * t
    }

    pub fn approx_eq(self, other: Vec2, epsilon: f32) -> bool {
        (self.x - other.x).abs() <= epsilon && (self.y - other.y).abs() <= epsilon
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Vec2 {
    fn sub_assign(&mut self, rhs: Vec2) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;
    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    /// Build from two arbitrary corners.
    pub fn from_min_max(min: Vec2, max: Vec2) -> Self {
        Self {
            min: Vec2::new(min.x.min(max.x), min.y.min(max.y)),
            max: Vec2::new(min.x.max(max.x), min.y.max(max.y)),
        }
    }

    pub fn from_center_size(center: Vec2, size: Vec2) -> Self {
        let half = size * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width(), self.height())
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(
            self.min.x + self.width() * 0.5,
            self.min.y + self.height() * 0.5,
        )
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// Whether a circle overlaps the rectangle, edges included.
    pub fn intersects_circle(&self, center: Vec2, radius: f32) -> bool {
        let nearest = Vec2::new(
            center.x.clamp(self.min.x, self.max.x),
            center.y.clamp(self.min.y, self.max.y),
        );
        nearest.distance(center) <= radius
    }

    /// Grow by `margin` on every side.
    pub fn expand(&self, margin: f32) -> Self {
        Self {
            min: Vec2::new(self.min.x - margin, self.min.y - margin),
            max: Vec2::new(self.max.x + margin, self.max.y + margin),
        }
    }

    pub fn union(&self, other: &Rect) -> Self {
        Self {
            min: Vec2::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Vec2::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_normalizes_corners() {
        let rect = Rect::from_min_max(Vec2::new(10.0, 5.0), Vec2::new(0.0, 20.0));
        assert_eq!(rect.min, Vec2::new(0.0, 5.0));
        assert_eq!(rect.max, Vec2::new(10.0, 20.0));
        assert!(rect.contains(Vec2::new(5.0, 10.0)));
    }

    #[test]
    fn test_expand_and_union() {
        let a = Rect::from_center_size(Vec2::ZERO, Vec2::new(10.0, 10.0));
        let b = Rect::from_center_size(Vec2::new(20.0, 0.0), Vec2::new(2.0, 2.0));
        let u = a.union(&b);
        assert_eq!(u.min, Vec2::new(-5.0, -5.0));
        assert_eq!(u.max, Vec2::new(21.0, 5.0));
        assert!(!a.intersects(&b));
        assert!(a.expand(10.0).intersects(&b));
    }

    #[test]
    fn test_circle_overlap_uses_nearest_edge_point() {
        let rect = Rect::from_min_max(Vec2::ZERO, Vec2::new(100.0, 20.0));
        assert!(rect.intersects_circle(Vec2::new(50.0, 10.0), 1.0));
        assert!(rect.intersects_circle(Vec2::new(50.0, 30.0), 10.0));
        assert!(!rect.intersects_circle(Vec2::new(50.0, 30.0), 9.0));
        // corner distance is 5 along the diagonal, not 3 or 4
        assert!(!rect.intersects_circle(Vec2::new(103.0, 24.0), 4.5));
        assert!(rect.intersects_circle(Vec2::new(103.0, 24.0), 5.0));
    }
}
