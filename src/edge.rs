//! Edge Shape
//!
//! A line segment. Two-sided edges collide from both directions; one-sided
//! edges carry ghost vertices from a surrounding chain and only push from
//! the side their normal faces — the right side when walking vertex1 →
//! vertex2 — which suppresses internal-edge collisions on smooth terrain.

use crate::collider::{Aabb, MassData, RayCastInput, RayCastOutput};
use crate::math::{Transform, Vec2};
use crate::tuning::POLYGON_RADIUS;

/// A line-segment shape
#[derive(Clone, Copy, Debug)]
pub struct EdgeShape {
    /// Segment start
    pub vertex1: Vec2,
    /// Segment end
    pub vertex2: Vec2,
    /// Ghost vertex preceding vertex1 (meaningful when one-sided)
    pub vertex0: Vec2,
    /// Ghost vertex following vertex2 (meaningful when one-sided)
    pub vertex3: Vec2,
    /// One-sided edges only report collisions from their normal side
    /// (right of the vertex1 → vertex2 direction)
    pub one_sided: bool,
}

impl EdgeShape {
    /// A free-standing segment that collides from both sides
    pub fn two_sided(v1: Vec2, v2: Vec2) -> Self {
        Self {
            vertex1: v1,
            vertex2: v2,
            vertex0: Vec2::ZERO,
            vertex3: Vec2::ZERO,
            one_sided: false,
        }
    }

    /// A chain segment with ghost vertices for adjacency smoothing
    pub fn one_sided(v0: Vec2, v1: Vec2, v2: Vec2, v3: Vec2) -> Self {
        Self {
            vertex1: v1,
            vertex2: v2,
            vertex0: v0,
            vertex3: v3,
            one_sided: true,
        }
    }

    /// Skin radius shared with polygons so manifolds line up
    #[inline]
    pub fn radius(&self) -> f32 {
        POLYGON_RADIUS
    }

    /// Segment ray cast.
    ///
    /// The segment normal points right of the v1→v2 direction; the reported
    /// hit normal faces the ray origin. One-sided edges ignore rays that
    /// start behind them.
    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        // Work in shape-local frame
        let p1 = xf.inv_transform_point(input.p1);
        let p2 = xf.inv_transform_point(input.p2);
        let d = p2 - p1;

        let v1 = self.vertex1;
        let v2 = self.vertex2;
        let e = v2 - v1;

        let mut normal = Vec2::new(e.y, -e.x);
        if normal.normalize() == 0.0 {
            return None;
        }

        // t satisfies dot(normal, p1 + t*d - v1) = 0
        let numerator = normal.dot(v1 - p1);
        if self.one_sided && numerator > 0.0 {
            // Ray starts behind a one-sided edge
            return None;
        }
        let denominator = normal.dot(d);
        if denominator == 0.0 {
            return None;
        }

        let t = numerator / denominator;
        if t < 0.0 || input.max_fraction < t {
            return None;
        }

        // The intersection must lie between the endpoints
        let q = p1 + d * t;
        let rr = e.dot(e);
        if rr == 0.0 {
            return None;
        }
        let s = (q - v1).dot(e) / rr;
        if s < 0.0 || 1.0 < s {
            return None;
        }

        let world_normal = if numerator > 0.0 {
            -xf.q.rotate(normal)
        } else {
            xf.q.rotate(normal)
        };
        Some(RayCastOutput {
            normal: world_normal,
            fraction: t,
        })
    }

    /// World-space bounds, padded by the skin radius
    pub fn compute_aabb(&self, xf: &Transform) -> Aabb {
        let v1 = xf.transform_point(self.vertex1);
        let v2 = xf.transform_point(self.vertex2);
        let r = Vec2::new(self.radius(), self.radius());
        Aabb::new(v1.min(v2) - r, v1.max(v2) + r)
    }

    /// Edges are massless; static geometry only
    pub fn compute_mass(&self) -> MassData {
        MassData {
            mass: 0.0,
            center: (self.vertex1 + self.vertex2) * 0.5,
            inertia: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_cast_perpendicular() {
        let edge = EdgeShape::two_sided(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0));
        let input = RayCastInput {
            p1: Vec2::new(0.0, 2.0),
            p2: Vec2::new(0.0, -2.0),
            max_fraction: 1.0,
        };
        let out = edge.ray_cast(&input, &Transform::IDENTITY).unwrap();
        assert!((out.fraction - 0.5).abs() < 1e-6);
        // Normal faces back toward the ray origin (+Y)
        assert!(out.normal.y > 0.99);
    }

    #[test]
    fn test_ray_cast_misses_endpoints() {
        let edge = EdgeShape::two_sided(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0));
        let input = RayCastInput {
            p1: Vec2::new(2.0, 2.0),
            p2: Vec2::new(2.0, -2.0),
            max_fraction: 1.0,
        };
        assert!(edge.ray_cast(&input, &Transform::IDENTITY).is_none());
    }

    #[test]
    fn test_ray_cast_parallel() {
        let edge = EdgeShape::two_sided(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0));
        let input = RayCastInput {
            p1: Vec2::new(-2.0, 1.0),
            p2: Vec2::new(2.0, 1.0),
            max_fraction: 1.0,
        };
        assert!(edge.ray_cast(&input, &Transform::IDENTITY).is_none());
    }

    #[test]
    fn test_one_sided_back_face() {
        // Walking v1 → v2 in −X, the normal faces +Y: only rays from above
        // may hit
        let edge = EdgeShape::one_sided(
            Vec2::new(2.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(-1.0, 0.0),
            Vec2::new(-2.0, 0.0),
        );
        let from_above = RayCastInput {
            p1: Vec2::new(0.0, 2.0),
            p2: Vec2::new(0.0, -2.0),
            max_fraction: 1.0,
        };
        assert!(edge.ray_cast(&from_above, &Transform::IDENTITY).is_some());

        let from_below = RayCastInput {
            p1: Vec2::new(0.0, -2.0),
            p2: Vec2::new(0.0, 2.0),
            max_fraction: 1.0,
        };
        assert!(edge.ray_cast(&from_below, &Transform::IDENTITY).is_none());
    }

    #[test]
    fn test_massless() {
        let edge = EdgeShape::two_sided(Vec2::ZERO, Vec2::new(4.0, 0.0));
        let md = edge.compute_mass();
        assert_eq!(md.mass, 0.0);
        assert_eq!(md.center, Vec2::new(2.0, 0.0));
    }
}
