use crate::geometry::Vec2;

/// A quadratic bezier segment. Straight when `control` is the midpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeCurve {
    pub start: Vec2,
    pub control: Vec2,
    pub end: Vec2,
}

impl EdgeCurve {
    pub fn is_straight(&self) -> bool {
        self.control
            .approx_eq(self.start.lerp(self.end, 0.5), 1e-3)
    }

    /// Sample the curve at parameter t [0, 1]
    pub fn sample(&self, t: f32) -> Vec2 {
        let mt = 1.0 - t;
        self.start * (mt * mt) + self.control * (2.0 * mt * t) + self.end * (t * t)
    }

    /// Tangent direction at t, not normalized.
    pub fn tangent(&self, t: f32) -> Vec2 {
        (self.control - self.start) * (2.0 * (1.0 - t)) + (self.end - self.control) * (2.0 * t)
    }

    /// Polyline approximation with `segments + 1` points.
    pub fn flatten(&self, segments: usize) -> Vec<Vec2> {
        let segments = segments.max(1);
        (0..=segments)
            .map(|i| self.sample(i as f32 / segments as f32))
            .collect()
    }

    /// Minimum distance from a point to uniformly sampled points of the curve.
    pub fn point_distance(&self, point: Vec2, samples: usize) -> f32 {
        self.flatten(samples)
            .into_iter()
            .map(|p| p.distance(point))
            .fold(f32::INFINITY, f32::min)
    }
}

/// Bends connections that are not axis-aligned.
///
/// The bend is `min(d * factor, max_bend) * |sin 2θ|^exponent`: zero on an
/// axis, largest at 45°. It is applied perpendicular to the edge, on a side
/// picked from the sign of the dominant-axis offset so parallel edges fan
/// out the same way.
#[derive(Debug, Clone, Copy)]
pub struct EdgeRouter {
    pub factor: f32,
    pub max_bend: f32,
    pub exponent: f32,
    /// Below this value of `|sin 2θ|^exponent` the edge is drawn straight.
    pub straight_threshold: f32,
}

impl Default for EdgeRouter {
    fn default() -> Self {
        Self {
            factor: 0.45,
            max_bend: 160.0,
            exponent: 0.6,
            straight_threshold: 0.03,
        }
    }
}

impl EdgeRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signed bend distance for the edge `from -> to`.
    pub fn curvature(&self, from: Vec2, to: Vec2) -> f32 {
        let delta = to - from;
        let distance = delta.length();
        if distance < f32::EPSILON {
            return 0.0;
        }

        let theta = delta.y.atan2(delta.x);
        let curviness = (2.0 * theta).sin().abs().powf(self.exponent);
        if curviness < self.straight_threshold {
            return 0.0;
        }

        let sign = if delta.x.abs() >= delta.y.abs() {
            if delta.y >= 0.0 { 1.0 } else { -1.0 }
        } else if delta.x >= 0.0 {
            1.0
        } else {
            -1.0
        };
        sign * (distance * self.factor).min(self.max_bend) * curviness
    }

    pub fn route(&self, from: Vec2, to: Vec2) -> EdgeCurve {
        let mid = from.lerp(to, 0.5);
        let delta = to - from;
        let distance = delta.length();
        let bend = self.curvature(from, to);
        let control = if bend == 0.0 || distance < f32::EPSILON {
            mid
        } else {
            let perpendicular = Vec2::new(-delta.y / distance, delta.x / distance);
            mid + perpendicular * bend
        };
        EdgeCurve {
            start: from,
            control,
            end: to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_axis_aligned_edges_are_straight() {
        let router = EdgeRouter::new();
        for to in [
            Vec2::new(400.0, 0.0),
            Vec2::new(-400.0, 0.0),
            Vec2::new(0.0, 400.0),
            Vec2::new(0.0, -400.0),
        ] {
            assert_eq!(router.curvature(Vec2::ZERO, to), 0.0);
            assert!(router.route(Vec2::ZERO, to).is_straight());
        }
    }

    #[test]
    fn test_diagonal_bend_is_capped() {
        let router = EdgeRouter::new();
        let bend = router.curvature(Vec2::ZERO, Vec2::new(1000.0, 1000.0));
        assert!((bend - 160.0).abs() < 1e-2);
        let short = router.curvature(Vec2::ZERO, Vec2::new(100.0, 100.0));
        assert!((short - 100.0_f32.hypot(100.0) * 0.45).abs() < 1e-2);
    }

    #[test]
    fn test_bend_side_follows_sign() {
        let router = EdgeRouter::new();
        assert!(router.curvature(Vec2::ZERO, Vec2::new(300.0, 100.0)) > 0.0);
        assert!(router.curvature(Vec2::ZERO, Vec2::new(300.0, -100.0)) < 0.0);
        assert!(router.curvature(Vec2::ZERO, Vec2::new(-100.0, 300.0)) < 0.0);
    }

    #[test]
    fn test_curve_endpoints() {
        let curve = EdgeRouter::new().route(Vec2::new(10.0, 10.0), Vec2::new(200.0, 90.0));
        assert_eq!(curve.sample(0.0), curve.start);
        assert!(curve.sample(1.0).approx_eq(curve.end, 1e-3));
        assert!(curve.point_distance(curve.start, 20) < 1e-3);
    }

    proptest! {
        #[test]
        fn prop_curvature_is_bounded(x in -5000.0f32..5000.0, y in -5000.0f32..5000.0) {
            let router = EdgeRouter::new();
            let to = Vec2::new(x, y);
            let bend = router.curvature(Vec2::ZERO, to).abs();
            prop_assert!(bend <= 160.0 + 1e-3);
            prop_assert!(bend <= to.length() * 0.45 + 1e-3);
        }
    }
}
