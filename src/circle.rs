//! Circle Shape

use crate::collider::{Aabb, MassData, RayCastInput, RayCastOutput};
use crate::math::{self, Transform, Vec2, PI};

/// A solid circle with a local-space center offset
#[derive(Clone, Copy, Debug)]
pub struct CircleShape {
    /// Center in shape-local coordinates
    pub position: Vec2,
    /// Radius
    pub radius: f32,
}

impl CircleShape {
    /// Create a circle from a local center and radius
    pub fn new(position: Vec2, radius: f32) -> Self {
        debug_assert!(radius >= 0.0);
        Self { position, radius }
    }

    /// World-space containment test
    pub fn test_point(&self, xf: &Transform, p: Vec2) -> bool {
        let center = xf.transform_point(self.position);
        let d = p - center;
        d.dot(d) <= self.radius * self.radius
    }

    /// Ray cast from the collision-detection reference:
    /// solve `|p + t·d - c|² = r²` for the smallest t in range.
    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        let position = xf.transform_point(self.position);
        let s = input.p1 - position;
        let b = s.dot(s) - self.radius * self.radius;

        let r = input.p2 - input.p1;
        let c = s.dot(r);
        let rr = r.dot(r);
        let sigma = c * c - rr * b;

        // Negative discriminant: the line misses. Short segment: degenerate.
        if sigma < 0.0 || rr < f32::EPSILON {
            return None;
        }

        let t = -(c + math::sqrt(sigma));
        if 0.0 <= t && t <= input.max_fraction * rr {
            let fraction = t / rr;
            let normal = (s + r * fraction).normalized();
            return Some(RayCastOutput { normal, fraction });
        }

        None
    }

    /// World-space bounds
    pub fn compute_aabb(&self, xf: &Transform) -> Aabb {
        let p = xf.transform_point(self.position);
        let r = Vec2::new(self.radius, self.radius);
        Aabb::new(p - r, p + r)
    }

    /// Mass properties: solid disc about the local origin
    pub fn compute_mass(&self, density: f32) -> MassData {
        let mass = density * PI * self.radius * self.radius;
        // Disc inertia about its center plus the parallel-axis term
        let inertia = mass * (0.5 * self.radius * self.radius + self.position.dot(self.position));
        MassData {
            mass,
            center: self.position,
            inertia,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_containment() {
        let circle = CircleShape::new(Vec2::new(1.0, 0.0), 0.5);
        let xf = Transform::IDENTITY;
        assert!(circle.test_point(&xf, Vec2::new(1.2, 0.1)));
        assert!(!circle.test_point(&xf, Vec2::new(2.0, 0.0)));

        // Rotated transform moves the offset center
        let xf = Transform::new(Vec2::ZERO, PI);
        assert!(circle.test_point(&xf, Vec2::new(-1.0, 0.0)));
    }

    #[test]
    fn test_ray_cast_hit() {
        let circle = CircleShape::new(Vec2::ZERO, 1.0);
        let input = RayCastInput {
            p1: Vec2::new(-5.0, 0.0),
            p2: Vec2::new(5.0, 0.0),
            max_fraction: 1.0,
        };
        let out = circle.ray_cast(&input, &Transform::IDENTITY).unwrap();
        // Enters at x = -1: fraction (−1 − (−5)) / 10 = 0.4
        assert!((out.fraction - 0.4).abs() < 1e-5);
        assert!((out.normal.x + 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_ray_cast_miss() {
        let circle = CircleShape::new(Vec2::ZERO, 1.0);
        let input = RayCastInput {
            p1: Vec2::new(-5.0, 3.0),
            p2: Vec2::new(5.0, 3.0),
            max_fraction: 1.0,
        };
        assert!(circle.ray_cast(&input, &Transform::IDENTITY).is_none());
    }

    #[test]
    fn test_ray_starting_inside() {
        // Ray from the center exits without reporting a hit (t < 0 root)
        let circle = CircleShape::new(Vec2::ZERO, 1.0);
        let input = RayCastInput {
            p1: Vec2::ZERO,
            p2: Vec2::new(5.0, 0.0),
            max_fraction: 1.0,
        };
        assert!(circle.ray_cast(&input, &Transform::IDENTITY).is_none());
    }

    #[test]
    fn test_mass() {
        let circle = CircleShape::new(Vec2::ZERO, 2.0);
        let md = circle.compute_mass(1.0);
        assert!((md.mass - 4.0 * PI).abs() < 1e-4);
        assert_eq!(md.center, Vec2::ZERO);
        assert!((md.inertia - 8.0 * PI).abs() < 1e-3);
    }

    #[test]
    fn test_aabb() {
        let circle = CircleShape::new(Vec2::new(1.0, 2.0), 0.5);
        let aabb = circle.compute_aabb(&Transform::IDENTITY);
        assert_eq!(aabb.min, Vec2::new(0.5, 1.5));
        assert_eq!(aabb.max, Vec2::new(1.5, 2.5));
    }
}
