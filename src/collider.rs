//! Collision Shapes and Geometric Queries
//!
//! The shape variant type and the common geometric quantities every shape
//! reports: bounding boxes, mass properties, point containment, ray casts.
//!
//! # Shapes
//!
//! - **Circle**: center + radius
//! - **Edge**: one-sided or two-sided line segment, optionally with ghost
//!   vertices from a surrounding chain
//! - **Polygon**: convex hull of up to 8 vertices with rounded corners
//! - **Chain**: sequence of edges with ghost-vertex smoothing; one broad-phase
//!   proxy per child edge
//!
//! Narrow-phase manifold generation lives in `collide`/`collide_edge`; this
//! module only dispatches the per-shape predicates.

use crate::chain::ChainShape;
use crate::circle::CircleShape;
use crate::edge::EdgeShape;
use crate::math::{Transform, Vec2};
use crate::polygon::PolygonShape;

// ============================================================================
// AABB
// ============================================================================

/// Axis-aligned bounding box
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    /// Minimum corner
    pub min: Vec2,
    /// Maximum corner
    pub max: Vec2,
}

impl Aabb {
    /// Create a new AABB from corners
    #[inline]
    pub const fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// True when the bounds are ordered and finite
    pub fn is_valid(&self) -> bool {
        let d = self.max - self.min;
        d.x >= 0.0 && d.y >= 0.0 && self.min.is_valid() && self.max.is_valid()
    }

    /// Center point
    #[inline]
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Half-widths
    #[inline]
    pub fn extents(&self) -> Vec2 {
        (self.max - self.min) * 0.5
    }

    /// Perimeter — the 2D surface measure used by the tree's insertion cost
    #[inline]
    pub fn perimeter(&self) -> f32 {
        let d = self.max - self.min;
        2.0 * (d.x + d.y)
    }

    /// Union of two boxes
    #[inline]
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// True when `other` lies entirely inside self
    #[inline]
    pub fn contains(&self, other: &Aabb) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && other.max.x <= self.max.x
            && other.max.y <= self.max.y
    }

    /// Overlap test
    #[inline]
    pub fn intersects(&self, other: &Aabb) -> bool {
        other.min.x <= self.max.x
            && other.min.y <= self.max.y
            && self.min.x <= other.max.x
            && self.min.y <= other.max.y
    }

    /// Slab test against a ray segment; true when the segment's [0, max_fraction]
    /// span clips the box.
    pub fn ray_cast(&self, input: &RayCastInput) -> bool {
        let mut tmin = f32::MIN;
        let mut tmax = f32::MAX;

        let p = input.p1;
        let d = input.p2 - input.p1;

        for axis in 0..2 {
            let (p_i, d_i, lo, hi) = if axis == 0 {
                (p.x, d.x, self.min.x, self.max.x)
            } else {
                (p.y, d.y, self.min.y, self.max.y)
            };

            if d_i.abs() < f32::EPSILON {
                // Parallel to this slab
                if p_i < lo || hi < p_i {
                    return false;
                }
            } else {
                let inv = 1.0 / d_i;
                let mut t1 = (lo - p_i) * inv;
                let mut t2 = (hi - p_i) * inv;
                if t1 > t2 {
                    core::mem::swap(&mut t1, &mut t2);
                }
                tmin = tmin.max(t1);
                tmax = tmax.min(t2);
                if tmin > tmax {
                    return false;
                }
            }
        }

        tmin < input.max_fraction && tmax > 0.0
    }
}

// ============================================================================
// Ray casting
// ============================================================================

/// Ray cast input: the segment from p1 toward p2, truncated at `max_fraction`
#[derive(Clone, Copy, Debug)]
pub struct RayCastInput {
    /// Segment start
    pub p1: Vec2,
    /// Segment end
    pub p2: Vec2,
    /// Fraction of the segment to consider (1.0 = full segment)
    pub max_fraction: f32,
}

/// Ray cast hit: the surface normal and the fractional hit distance
#[derive(Clone, Copy, Debug)]
pub struct RayCastOutput {
    /// Surface normal at the hit point
    pub normal: Vec2,
    /// Fraction along the input segment where the hit occurs
    pub fraction: f32,
}

// ============================================================================
// Mass data
// ============================================================================

/// Mass, center of mass, and rotational inertia of a shape
#[derive(Clone, Copy, Debug, Default)]
pub struct MassData {
    /// Total mass (kg)
    pub mass: f32,
    /// Center of mass in shape-local coordinates
    pub center: Vec2,
    /// Rotational inertia about the local origin (kg·m²)
    pub inertia: f32,
}

// ============================================================================
// Shape variant
// ============================================================================

/// Shape kind discriminant, also the index into the narrow-phase jump table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ShapeType {
    /// Circle shape
    Circle = 0,
    /// Edge shape
    Edge = 1,
    /// Polygon shape
    Polygon = 2,
    /// Chain shape
    Chain = 3,
}

/// A collision shape
#[derive(Clone, Debug)]
pub enum Shape {
    /// Circle
    Circle(CircleShape),
    /// Edge segment
    Edge(EdgeShape),
    /// Convex polygon
    Polygon(PolygonShape),
    /// Edge chain
    Chain(ChainShape),
}

impl Shape {
    /// Shape kind
    #[inline]
    pub fn shape_type(&self) -> ShapeType {
        match self {
            Shape::Circle(_) => ShapeType::Circle,
            Shape::Edge(_) => ShapeType::Edge,
            Shape::Polygon(_) => ShapeType::Polygon,
            Shape::Chain(_) => ShapeType::Chain,
        }
    }

    /// Number of broad-phase children (chains have one per edge)
    #[inline]
    pub fn child_count(&self) -> usize {
        match self {
            Shape::Chain(chain) => chain.child_count(),
            _ => 1,
        }
    }

    /// Shape skin radius
    #[inline]
    pub fn radius(&self) -> f32 {
        match self {
            Shape::Circle(c) => c.radius,
            Shape::Edge(e) => e.radius(),
            Shape::Polygon(p) => p.radius(),
            Shape::Chain(c) => c.radius(),
        }
    }

    /// Point containment in world space. Open shapes (edges, chains) contain
    /// no points.
    pub fn test_point(&self, xf: &Transform, p: Vec2) -> bool {
        match self {
            Shape::Circle(c) => c.test_point(xf, p),
            Shape::Polygon(poly) => poly.test_point(xf, p),
            Shape::Edge(_) | Shape::Chain(_) => false,
        }
    }

    /// Ray cast against one child
    pub fn ray_cast(
        &self,
        input: &RayCastInput,
        xf: &Transform,
        child_index: usize,
    ) -> Option<RayCastOutput> {
        match self {
            Shape::Circle(c) => c.ray_cast(input, xf),
            Shape::Edge(e) => e.ray_cast(input, xf),
            Shape::Polygon(p) => p.ray_cast(input, xf),
            Shape::Chain(c) => c.child_edge(child_index).ray_cast(input, xf),
        }
    }

    /// World-space AABB of one child
    pub fn compute_aabb(&self, xf: &Transform, child_index: usize) -> Aabb {
        match self {
            Shape::Circle(c) => c.compute_aabb(xf),
            Shape::Edge(e) => e.compute_aabb(xf),
            Shape::Polygon(p) => p.compute_aabb(xf),
            Shape::Chain(c) => c.compute_aabb(xf, child_index),
        }
    }

    /// Mass properties at the given density. Open shapes report zero mass.
    pub fn compute_mass(&self, density: f32) -> MassData {
        match self {
            Shape::Circle(c) => c.compute_mass(density),
            Shape::Edge(e) => e.compute_mass(),
            Shape::Polygon(p) => p.compute_mass(density),
            Shape::Chain(c) => c.compute_mass(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aabb_union_contains() {
        let a = Aabb::new(Vec2::new(0.0, 0.0), Vec2::new(1.0, 1.0));
        let b = Aabb::new(Vec2::new(2.0, 2.0), Vec2::new(3.0, 3.0));
        let u = a.union(&b);
        assert!(u.contains(&a));
        assert!(u.contains(&b));
        assert_eq!(u.min, Vec2::ZERO);
        assert_eq!(u.max, Vec2::new(3.0, 3.0));
    }

    #[test]
    fn test_aabb_intersects() {
        let a = Aabb::new(Vec2::new(0.0, 0.0), Vec2::new(2.0, 2.0));
        let b = Aabb::new(Vec2::new(1.0, 1.0), Vec2::new(3.0, 3.0));
        let c = Aabb::new(Vec2::new(5.0, 5.0), Vec2::new(6.0, 6.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        // Touching edges count as intersecting
        let d = Aabb::new(Vec2::new(2.0, 0.0), Vec2::new(3.0, 2.0));
        assert!(a.intersects(&d));
    }

    #[test]
    fn test_aabb_perimeter() {
        let a = Aabb::new(Vec2::ZERO, Vec2::new(3.0, 2.0));
        assert_eq!(a.perimeter(), 10.0);
    }

    #[test]
    fn test_aabb_ray_cast() {
        let a = Aabb::new(Vec2::new(2.0, -1.0), Vec2::new(3.0, 1.0));
        let hit = RayCastInput {
            p1: Vec2::new(0.0, 0.0),
            p2: Vec2::new(10.0, 0.0),
            max_fraction: 1.0,
        };
        assert!(a.ray_cast(&hit));

        let miss = RayCastInput {
            p1: Vec2::new(0.0, 5.0),
            p2: Vec2::new(10.0, 5.0),
            max_fraction: 1.0,
        };
        assert!(!a.ray_cast(&miss));

        // Truncated segment stops short of the box
        let short = RayCastInput {
            p1: Vec2::new(0.0, 0.0),
            p2: Vec2::new(10.0, 0.0),
            max_fraction: 0.1,
        };
        assert!(!a.ray_cast(&short));
    }

    #[test]
    fn test_shape_type_dispatch() {
        let circle = Shape::Circle(CircleShape::new(Vec2::ZERO, 1.0));
        assert_eq!(circle.shape_type(), ShapeType::Circle);
        assert_eq!(circle.child_count(), 1);

        let edge = Shape::Edge(EdgeShape::two_sided(
            Vec2::new(-1.0, 0.0),
            Vec2::new(1.0, 0.0),
        ));
        assert_eq!(edge.shape_type(), ShapeType::Edge);
        assert!(!edge.test_point(&Transform::IDENTITY, Vec2::ZERO));
    }
}
