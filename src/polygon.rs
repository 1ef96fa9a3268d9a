//! Convex Polygon Shape
//!
//! Up to [`MAX_POLYGON_VERTICES`] counter-clockwise vertices with outward
//! normals and a small skin radius. Construction computes the convex hull of
//! the input points, so callers never hand the solver a concave polygon.

use crate::collider::{Aabb, MassData, RayCastInput, RayCastOutput};
use crate::math::{Rot, Transform, Vec2};
use crate::tuning::{LINEAR_SLOP, MAX_POLYGON_VERTICES, POLYGON_RADIUS};

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// A convex polygon
#[derive(Clone, Copy, Debug)]
pub struct PolygonShape {
    /// Centroid in shape-local coordinates
    pub centroid: Vec2,
    /// Counter-clockwise hull vertices
    pub vertices: [Vec2; MAX_POLYGON_VERTICES],
    /// Outward edge normals; `normals[i]` belongs to the edge from
    /// `vertices[i]` to `vertices[i+1]`
    pub normals: [Vec2; MAX_POLYGON_VERTICES],
    /// Number of live vertices
    pub count: usize,
}

impl PolygonShape {
    /// Build the convex hull of the given points.
    ///
    /// Points closer together than half a linear slop are welded. Returns
    /// `None` when fewer than 3 distinct points remain or the hull collapses
    /// (degenerate input).
    pub fn new(points: &[Vec2]) -> Option<Self> {
        if points.len() < 3 || points.len() > MAX_POLYGON_VERTICES {
            return None;
        }

        // Weld near-coincident points
        let weld_dist_sq = (0.5 * LINEAR_SLOP) * (0.5 * LINEAR_SLOP);
        let mut unique: Vec<Vec2> = Vec::with_capacity(points.len());
        for &p in points {
            if unique.iter().all(|&q| (p - q).length_squared() > weld_dist_sq) {
                unique.push(p);
            }
        }
        if unique.len() < 3 {
            return None;
        }

        // Gift wrapping from the rightmost point
        let mut right = 0;
        let mut max_x = unique[0].x;
        for (i, p) in unique.iter().enumerate().skip(1) {
            if p.x > max_x || (p.x == max_x && p.y < unique[right].y) {
                right = i;
                max_x = p.x;
            }
        }

        let mut hull = [0usize; MAX_POLYGON_VERTICES];
        let mut hull_count = 0;
        let mut index = right;
        loop {
            if hull_count >= MAX_POLYGON_VERTICES {
                return None;
            }
            hull[hull_count] = index;
            hull_count += 1;

            let mut next = 0;
            for (j, _) in unique.iter().enumerate() {
                if next == index {
                    next = j;
                    continue;
                }
                let r = unique[next] - unique[hull[hull_count - 1]];
                let v = unique[j] - unique[hull[hull_count - 1]];
                let c = r.cross(v);
                if c < 0.0 || (c == 0.0 && v.length_squared() > r.length_squared()) {
                    next = j;
                }
            }

            index = next;
            if index == right {
                break;
            }
        }

        if hull_count < 3 {
            return None;
        }

        let mut vertices = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        for i in 0..hull_count {
            vertices[i] = unique[hull[i]];
        }

        let mut normals = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        for i in 0..hull_count {
            let i2 = if i + 1 < hull_count { i + 1 } else { 0 };
            let edge = vertices[i2] - vertices[i];
            if edge.length_squared() <= f32::EPSILON * f32::EPSILON {
                return None;
            }
            let mut n = edge.cross_scalar(1.0);
            n.normalize();
            normals[i] = n;
        }

        let centroid = compute_centroid(&vertices[..hull_count]);
        Some(Self {
            centroid,
            vertices,
            normals,
            count: hull_count,
        })
    }

    /// Axis-aligned box with the given half-extents, centered at the origin
    pub fn new_box(half_width: f32, half_height: f32) -> Self {
        let mut vertices = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        vertices[0] = Vec2::new(-half_width, -half_height);
        vertices[1] = Vec2::new(half_width, -half_height);
        vertices[2] = Vec2::new(half_width, half_height);
        vertices[3] = Vec2::new(-half_width, half_height);
        let mut normals = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        normals[0] = Vec2::new(0.0, -1.0);
        normals[1] = Vec2::new(1.0, 0.0);
        normals[2] = Vec2::new(0.0, 1.0);
        normals[3] = Vec2::new(-1.0, 0.0);
        Self {
            centroid: Vec2::ZERO,
            vertices,
            normals,
            count: 4,
        }
    }

    /// Box with the given half-extents, offset and rotated in shape space
    pub fn new_oriented_box(half_width: f32, half_height: f32, center: Vec2, angle: f32) -> Self {
        let mut poly = Self::new_box(half_width, half_height);
        poly.centroid = center;
        let xf = Transform {
            p: center,
            q: Rot::from_angle(angle),
        };
        for i in 0..poly.count {
            poly.vertices[i] = xf.transform_point(poly.vertices[i]);
            poly.normals[i] = xf.q.rotate(poly.normals[i]);
        }
        poly
    }

    /// Skin radius
    #[inline]
    pub fn radius(&self) -> f32 {
        POLYGON_RADIUS
    }

    /// World-space containment test
    pub fn test_point(&self, xf: &Transform, p: Vec2) -> bool {
        let local = xf.inv_transform_point(p);
        for i in 0..self.count {
            if self.normals[i].dot(local - self.vertices[i]) > 0.0 {
                return false;
            }
        }
        true
    }

    /// Ray cast by clipping the segment against each half-plane
    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        let p1 = xf.inv_transform_point(input.p1);
        let p2 = xf.inv_transform_point(input.p2);
        let d = p2 - p1;

        let mut lower = 0.0_f32;
        let mut upper = input.max_fraction;
        let mut index = None;

        for i in 0..self.count {
            // p = p1 + t * d; separation = dot(normal, p - v)
            let numerator = self.normals[i].dot(self.vertices[i] - p1);
            let denominator = self.normals[i].dot(d);

            if denominator == 0.0 {
                if numerator < 0.0 {
                    return None;
                }
            } else {
                if denominator < 0.0 && numerator < lower * denominator {
                    // Entering this half-plane
                    lower = numerator / denominator;
                    index = Some(i);
                } else if denominator > 0.0 && numerator < upper * denominator {
                    // Leaving this half-plane
                    upper = numerator / denominator;
                }
            }

            if upper < lower {
                return None;
            }
        }

        debug_assert!(0.0 <= lower && lower <= input.max_fraction);
        index.map(|i| RayCastOutput {
            normal: xf.q.rotate(self.normals[i]),
            fraction: lower,
        })
    }

    /// World-space bounds, padded by the skin radius
    pub fn compute_aabb(&self, xf: &Transform) -> Aabb {
        let mut lower = xf.transform_point(self.vertices[0]);
        let mut upper = lower;
        for i in 1..self.count {
            let v = xf.transform_point(self.vertices[i]);
            lower = lower.min(v);
            upper = upper.max(v);
        }
        let r = Vec2::new(self.radius(), self.radius());
        Aabb::new(lower - r, upper + r)
    }

    /// Mass properties via triangle decomposition about a reference point
    pub fn compute_mass(&self, density: f32) -> MassData {
        debug_assert!(self.count >= 3);

        let mut center = Vec2::ZERO;
        let mut area = 0.0_f32;
        let mut inertia = 0.0_f32;

        // Reference point keeps the triangle cross products well-conditioned
        let s = self.vertices[..self.count]
            .iter()
            .fold(Vec2::ZERO, |acc, &v| acc + v)
            * (1.0 / self.count as f32);

        const INV3: f32 = 1.0 / 3.0;
        for i in 0..self.count {
            let e1 = self.vertices[i] - s;
            let e2 = self.vertices[if i + 1 < self.count { i + 1 } else { 0 }] - s;

            let d = e1.cross(e2);
            let triangle_area = 0.5 * d;
            area += triangle_area;

            center += (e1 + e2) * (triangle_area * INV3);

            let intx2 = e1.x * e1.x + e2.x * e1.x + e2.x * e2.x;
            let inty2 = e1.y * e1.y + e2.y * e1.y + e2.y * e2.y;
            inertia += (0.25 * INV3 * d) * (intx2 + inty2);
        }

        let mass = density * area;
        debug_assert!(area > f32::EPSILON);
        center *= 1.0 / area;
        let local_center = center + s;

        // Shift inertia from the reference point to the local origin
        let inertia = density * inertia
            + mass * (local_center.dot(local_center) - center.dot(center));

        MassData {
            mass,
            center: local_center,
            inertia,
        }
    }

    /// Debug check: convexity and counter-clockwise winding
    pub fn validate(&self) -> bool {
        for i in 0..self.count {
            let i1 = i;
            let i2 = if i + 1 < self.count { i + 1 } else { 0 };
            let p = self.vertices[i1];
            let e = self.vertices[i2] - p;
            for j in 0..self.count {
                if j == i1 || j == i2 {
                    continue;
                }
                let v = self.vertices[j] - p;
                if e.cross(v) < 0.0 {
                    return false;
                }
            }
        }
        true
    }
}

/// Area centroid of a counter-clockwise vertex loop
fn compute_centroid(vs: &[Vec2]) -> Vec2 {
    debug_assert!(vs.len() >= 3);

    let origin = vs[0];
    let mut center = Vec2::ZERO;
    let mut area = 0.0_f32;

    const INV3: f32 = 1.0 / 3.0;
    for i in 1..vs.len() - 1 {
        let e1 = vs[i] - origin;
        let e2 = vs[i + 1] - origin;
        let a = 0.5 * e1.cross(e2);
        area += a;
        center += (e1 + e2) * (a * INV3);
    }

    debug_assert!(area > f32::EPSILON);
    center * (1.0 / area) + origin
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_construction() {
        let poly = PolygonShape::new_box(1.0, 2.0);
        assert_eq!(poly.count, 4);
        assert_eq!(poly.centroid, Vec2::ZERO);
        assert!(poly.validate());
    }

    #[test]
    fn test_hull_discards_interior_points() {
        let points = [
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(2.0, 2.0),
            Vec2::new(0.0, 2.0),
            Vec2::new(1.0, 1.0), // interior
        ];
        let poly = PolygonShape::new(&points).unwrap();
        assert_eq!(poly.count, 4);
        assert!(poly.validate());
        assert!((poly.centroid - Vec2::new(1.0, 1.0)).length() < 1e-5);
    }

    #[test]
    fn test_degenerate_input_rejected() {
        // Collinear points have no 2D hull
        let collinear = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(2.0, 0.0),
        ];
        assert!(PolygonShape::new(&collinear).is_none());

        // Welded duplicates leave too few points
        let dupes = [
            Vec2::new(0.0, 0.0),
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 1.0),
        ];
        assert!(PolygonShape::new(&dupes).is_none());
    }

    #[test]
    fn test_point_containment() {
        let poly = PolygonShape::new_box(1.0, 1.0);
        let xf = Transform::IDENTITY;
        assert!(poly.test_point(&xf, Vec2::new(0.5, 0.5)));
        assert!(!poly.test_point(&xf, Vec2::new(1.5, 0.0)));

        let xf = Transform::new(Vec2::new(10.0, 0.0), 0.0);
        assert!(poly.test_point(&xf, Vec2::new(10.5, 0.5)));
    }

    #[test]
    fn test_ray_cast() {
        let poly = PolygonShape::new_box(1.0, 1.0);
        let input = RayCastInput {
            p1: Vec2::new(-5.0, 0.0),
            p2: Vec2::new(5.0, 0.0),
            max_fraction: 1.0,
        };
        let out = poly.ray_cast(&input, &Transform::IDENTITY).unwrap();
        assert!((out.fraction - 0.4).abs() < 1e-5);
        assert!((out.normal.x + 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_box_mass() {
        let poly = PolygonShape::new_box(1.0, 1.0);
        let md = poly.compute_mass(2.0);
        // 2x2 box at density 2: mass 8
        assert!((md.mass - 8.0).abs() < 1e-4);
        assert!(md.center.length() < 1e-5);
        // Rectangle inertia: m/12 * (w² + h²) = 8/12 * 8
        assert!((md.inertia - 8.0 / 12.0 * 8.0).abs() < 1e-3);
    }

    #[test]
    fn test_oriented_box() {
        let poly = PolygonShape::new_oriented_box(1.0, 1.0, Vec2::new(5.0, 0.0), 0.0);
        assert!(poly.test_point(&Transform::IDENTITY, Vec2::new(5.5, 0.5)));
        assert!(!poly.test_point(&Transform::IDENTITY, Vec2::new(0.0, 0.0)));
    }
}
