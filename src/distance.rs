//! GJK Distance and Shape Casting
//!
//! Closest points between convex shapes via the GJK algorithm.
//!
//! # Features
//!
//! - **Distance query**: closest points, warm-started by a simplex cache
//! - **Shape cast**: linear sweep of one proxy toward another by
//!   conservative advancement
//! - **Deterministic**: bounded iterations, no randomness
//!
//! The simplex grows from 1 to 3 vertices; each iteration solves the
//! sub-simplex closest to the origin in barycentric form and walks toward
//! the origin until no support point makes progress.
//!
//! Author: Moroya Sakamoto

use crate::chain::ChainShape;
use crate::circle::CircleShape;
use crate::collider::Shape;
use crate::math::{Transform, Vec2};
use crate::tuning::{LINEAR_SLOP, MAX_GJK_ITERATIONS, MAX_POLYGON_VERTICES, POLYGON_RADIUS};

// ============================================================================
// Distance proxy
// ============================================================================

/// A convex shape reduced to the vertex cloud + radius form GJK consumes
#[derive(Clone, Debug)]
pub struct DistanceProxy {
    /// Vertex buffer in shape-local coordinates
    pub vertices: [Vec2; MAX_POLYGON_VERTICES],
    /// Number of live vertices
    pub count: usize,
    /// Shape skin radius
    pub radius: f32,
}

impl DistanceProxy {
    /// Build a proxy from one child of a shape
    pub fn from_shape(shape: &Shape, child_index: usize) -> Self {
        match shape {
            Shape::Circle(c) => Self::from_circle(c),
            Shape::Polygon(p) => {
                let mut vertices = [Vec2::ZERO; MAX_POLYGON_VERTICES];
                vertices[..p.count].copy_from_slice(&p.vertices[..p.count]);
                Self {
                    vertices,
                    count: p.count,
                    radius: p.radius(),
                }
            }
            Shape::Edge(e) => Self::from_segment(e.vertex1, e.vertex2),
            Shape::Chain(chain) => Self::from_chain_child(chain, child_index),
        }
    }

    fn from_circle(c: &CircleShape) -> Self {
        let mut vertices = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        vertices[0] = c.position;
        Self {
            vertices,
            count: 1,
            radius: c.radius,
        }
    }

    fn from_segment(v1: Vec2, v2: Vec2) -> Self {
        let mut vertices = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        vertices[0] = v1;
        vertices[1] = v2;
        Self {
            vertices,
            count: 2,
            radius: POLYGON_RADIUS,
        }
    }

    fn from_chain_child(chain: &ChainShape, child_index: usize) -> Self {
        debug_assert!(child_index < chain.child_count());
        Self::from_segment(
            chain.vertices[child_index],
            chain.vertices[child_index + 1],
        )
    }

    /// Index of the vertex furthest along `d`
    #[inline]
    pub fn support(&self, d: Vec2) -> usize {
        let mut best = 0;
        let mut best_value = self.vertices[0].dot(d);
        for i in 1..self.count {
            let value = self.vertices[i].dot(d);
            if value > best_value {
                best = i;
                best_value = value;
            }
        }
        best
    }

    /// Vertex accessor
    #[inline]
    pub fn vertex(&self, index: usize) -> Vec2 {
        debug_assert!(index < self.count);
        self.vertices[index]
    }
}

// ============================================================================
// Simplex cache
// ============================================================================

/// Warm-start state carried between distance calls on the same pair.
///
/// `metric` records the simplex measure (length for 2, area for 3) so a
/// stale cache is detected and discarded before reuse.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimplexCache {
    /// Length or area of the cached simplex
    pub metric: f32,
    /// Number of cached vertices
    pub count: u16,
    /// Support indices on proxy A
    pub index_a: [u8; 3],
    /// Support indices on proxy B
    pub index_b: [u8; 3],
}

/// Input to [`distance`]
#[derive(Clone, Debug)]
pub struct DistanceInput {
    /// Proxy for shape A
    pub proxy_a: DistanceProxy,
    /// Proxy for shape B
    pub proxy_b: DistanceProxy,
    /// World transform of A
    pub transform_a: Transform,
    /// World transform of B
    pub transform_b: Transform,
    /// Shrink the result by the shape radii
    pub use_radii: bool,
}

/// Output of [`distance`]
#[derive(Clone, Copy, Debug)]
pub struct DistanceOutput {
    /// Closest point on A in world space
    pub point_a: Vec2,
    /// Closest point on B in world space
    pub point_b: Vec2,
    /// Distance between the closest points
    pub distance: f32,
    /// GJK iterations used
    pub iterations: usize,
}

// ============================================================================
// Simplex
// ============================================================================

#[derive(Clone, Copy, Debug, Default)]
struct SimplexVertex {
    /// Support on A (world)
    w_a: Vec2,
    /// Support on B (world)
    w_b: Vec2,
    /// Minkowski difference w_b - w_a
    w: Vec2,
    /// Barycentric coordinate
    a: f32,
    index_a: usize,
    index_b: usize,
}

#[derive(Clone, Copy, Debug, Default)]
struct Simplex {
    v: [SimplexVertex; 3],
    count: usize,
}

impl Simplex {
    fn read_cache(
        cache: &SimplexCache,
        proxy_a: &DistanceProxy,
        xf_a: &Transform,
        proxy_b: &DistanceProxy,
        xf_b: &Transform,
    ) -> Self {
        let mut simplex = Self::default();
        simplex.count = cache.count as usize;

        for i in 0..simplex.count {
            let v = &mut simplex.v[i];
            v.index_a = cache.index_a[i] as usize;
            v.index_b = cache.index_b[i] as usize;
            let local_a = proxy_a.vertex(v.index_a.min(proxy_a.count - 1));
            let local_b = proxy_b.vertex(v.index_b.min(proxy_b.count - 1));
            v.w_a = xf_a.transform_point(local_a);
            v.w_b = xf_b.transform_point(local_b);
            v.w = v.w_b - v.w_a;
            v.a = 0.0;
        }

        // Discard a cache whose measure diverged from the current geometry
        if simplex.count > 1 {
            let metric1 = cache.metric;
            let metric2 = simplex.metric();
            if metric2 < 0.5 * metric1 || 2.0 * metric1 < metric2 || metric2 < f32::EPSILON {
                simplex.count = 0;
            }
        }

        // Empty or invalidated cache: seed from vertex 0
        if simplex.count == 0 {
            let v = &mut simplex.v[0];
            v.index_a = 0;
            v.index_b = 0;
            v.w_a = xf_a.transform_point(proxy_a.vertex(0));
            v.w_b = xf_b.transform_point(proxy_b.vertex(0));
            v.w = v.w_b - v.w_a;
            simplex.count = 1;
        }

        simplex
    }

    fn write_cache(&self, cache: &mut SimplexCache) {
        cache.metric = self.metric();
        cache.count = self.count as u16;
        for i in 0..self.count {
            cache.index_a[i] = self.v[i].index_a as u8;
            cache.index_b[i] = self.v[i].index_b as u8;
        }
    }

    fn search_direction(&self) -> Vec2 {
        match self.count {
            1 => -self.v[0].w,
            2 => {
                let e12 = self.v[1].w - self.v[0].w;
                let sgn = e12.cross(-self.v[0].w);
                if sgn > 0.0 {
                    // Origin is left of e12
                    Vec2::scalar_cross(1.0, e12)
                } else {
                    e12.cross_scalar(1.0)
                }
            }
            _ => Vec2::ZERO,
        }
    }

    fn closest_point(&self) -> Vec2 {
        match self.count {
            1 => self.v[0].w,
            2 => self.v[0].w * self.v[0].a + self.v[1].w * self.v[1].a,
            3 => Vec2::ZERO,
            _ => Vec2::ZERO,
        }
    }

    fn witness_points(&self) -> (Vec2, Vec2) {
        match self.count {
            1 => (self.v[0].w_a, self.v[0].w_b),
            2 => (
                self.v[0].w_a * self.v[0].a + self.v[1].w_a * self.v[1].a,
                self.v[0].w_b * self.v[0].a + self.v[1].w_b * self.v[1].a,
            ),
            3 => {
                let p = self.v[0].w_a * self.v[0].a
                    + self.v[1].w_a * self.v[1].a
                    + self.v[2].w_a * self.v[2].a;
                (p, p)
            }
            _ => (Vec2::ZERO, Vec2::ZERO),
        }
    }

    fn metric(&self) -> f32 {
        match self.count {
            1 => 0.0,
            2 => (self.v[1].w - self.v[0].w).length(),
            3 => (self.v[1].w - self.v[0].w).cross(self.v[2].w - self.v[0].w),
            _ => 0.0,
        }
    }

    /// Closest point on segment v0-v1 to the origin, in barycentric form
    fn solve2(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let e12 = w2 - w1;

        // w1 region
        let d12_2 = -w1.dot(e12);
        if d12_2 <= 0.0 {
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        // w2 region
        let d12_1 = w2.dot(e12);
        if d12_1 <= 0.0 {
            self.v[0] = self.v[1];
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        // Interior of the edge
        let inv_d12 = 1.0 / (d12_1 + d12_2);
        self.v[0].a = d12_1 * inv_d12;
        self.v[1].a = d12_2 * inv_d12;
        self.count = 2;
    }

    /// Closest feature of triangle v0-v1-v2 to the origin
    fn solve3(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let w3 = self.v[2].w;

        let e12 = w2 - w1;
        let w1e12 = w1.dot(e12);
        let w2e12 = w2.dot(e12);
        let d12_1 = w2e12;
        let d12_2 = -w1e12;

        let e13 = w3 - w1;
        let w1e13 = w1.dot(e13);
        let w3e13 = w3.dot(e13);
        let d13_1 = w3e13;
        let d13_2 = -w1e13;

        let e23 = w3 - w2;
        let w2e23 = w2.dot(e23);
        let w3e23 = w3.dot(e23);
        let d23_1 = w3e23;
        let d23_2 = -w2e23;

        // Triangle123
        let n123 = e12.cross(e13);
        let d123_1 = n123 * w2.cross(w3);
        let d123_2 = n123 * w3.cross(w1);
        let d123_3 = n123 * w1.cross(w2);

        // w1 region
        if d12_2 <= 0.0 && d13_2 <= 0.0 {
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        // e12
        if d12_1 > 0.0 && d12_2 > 0.0 && d123_3 <= 0.0 {
            let inv_d12 = 1.0 / (d12_1 + d12_2);
            self.v[0].a = d12_1 * inv_d12;
            self.v[1].a = d12_2 * inv_d12;
            self.count = 2;
            return;
        }

        // e13
        if d13_1 > 0.0 && d13_2 > 0.0 && d123_2 <= 0.0 {
            let inv_d13 = 1.0 / (d13_1 + d13_2);
            self.v[0].a = d13_1 * inv_d13;
            self.v[2].a = d13_2 * inv_d13;
            self.count = 2;
            self.v[1] = self.v[2];
            return;
        }

        // w2 region
        if d12_1 <= 0.0 && d23_2 <= 0.0 {
            self.v[0] = self.v[1];
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        // w3 region
        if d13_1 <= 0.0 && d23_1 <= 0.0 {
            self.v[0] = self.v[2];
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        // e23
        if d23_1 > 0.0 && d23_2 > 0.0 && d123_1 <= 0.0 {
            let inv_d23 = 1.0 / (d23_1 + d23_2);
            self.v[1].a = d23_1 * inv_d23;
            self.v[2].a = d23_2 * inv_d23;
            self.count = 2;
            self.v[0] = self.v[2];
            return;
        }

        // Interior: the origin is enclosed
        let inv_d123 = 1.0 / (d123_1 + d123_2 + d123_3);
        self.v[0].a = d123_1 * inv_d123;
        self.v[1].a = d123_2 * inv_d123;
        self.v[2].a = d123_3 * inv_d123;
        self.count = 3;
    }
}

// ============================================================================
// Distance query
// ============================================================================

/// Closest points between two convex proxies, warm-started by `cache`.
pub fn distance(cache: &mut SimplexCache, input: &DistanceInput) -> DistanceOutput {
    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;
    let xf_a = input.transform_a;
    let xf_b = input.transform_b;

    let mut simplex = Simplex::read_cache(cache, proxy_a, &xf_a, proxy_b, &xf_b);

    // Support indices from prior iterations; used to detect cycling
    let mut save_a = [0usize; 3];
    let mut save_b = [0usize; 3];

    let mut iteration = 0;
    while iteration < MAX_GJK_ITERATIONS {
        let save_count = simplex.count;
        for i in 0..save_count {
            save_a[i] = simplex.v[i].index_a;
            save_b[i] = simplex.v[i].index_b;
        }

        match simplex.count {
            1 => {}
            2 => simplex.solve2(),
            3 => simplex.solve3(),
            _ => unreachable!(),
        }

        // Enclosed origin means overlap; separation is zero
        if simplex.count == 3 {
            break;
        }

        let d = simplex.search_direction();
        if d.length_squared() < f32::EPSILON * f32::EPSILON {
            // The origin sits on an edge or vertex of the simplex. Leaving
            // now keeps the witness points valid; treating this as overlap
            // would corrupt them.
            break;
        }

        // New support vertex in direction d
        let vertex = &mut simplex.v[simplex.count];
        vertex.index_a = proxy_a.support(xf_a.q.inv_rotate(-d));
        vertex.w_a = xf_a.transform_point(proxy_a.vertex(vertex.index_a));
        vertex.index_b = proxy_b.support(xf_b.q.inv_rotate(d));
        vertex.w_b = xf_b.transform_point(proxy_b.vertex(vertex.index_b));
        vertex.w = vertex.w_b - vertex.w_a;

        iteration += 1;

        // A repeated support vertex means no progress
        let mut duplicate = false;
        for i in 0..save_count {
            if vertex.index_a == save_a[i] && vertex.index_b == save_b[i] {
                duplicate = true;
                break;
            }
        }
        if duplicate {
            break;
        }

        simplex.count += 1;
    }

    simplex.write_cache(cache);

    let (mut point_a, mut point_b) = simplex.witness_points();
    let mut dist = (point_b - point_a).length();

    if input.use_radii {
        let r_a = proxy_a.radius;
        let r_b = proxy_b.radius;

        if dist > r_a + r_b && dist > f32::EPSILON {
            // Shrink witness points onto the shape surfaces
            dist -= r_a + r_b;
            let mut normal = point_b - point_a;
            normal.normalize();
            point_a += normal * r_a;
            point_b -= normal * r_b;
        } else {
            // Overlapping skins: collapse to a shared midpoint
            let p = (point_a + point_b) * 0.5;
            point_a = p;
            point_b = p;
            dist = 0.0;
        }
    }

    DistanceOutput {
        point_a,
        point_b,
        distance: dist,
        iterations: iteration,
    }
}

// ============================================================================
// Shape cast
// ============================================================================

/// Input to [`shape_cast`]: sweep proxy B by `translation_b` toward A
#[derive(Clone, Debug)]
pub struct ShapeCastInput {
    /// Proxy for the stationary shape
    pub proxy_a: DistanceProxy,
    /// Proxy for the moving shape
    pub proxy_b: DistanceProxy,
    /// World transform of A
    pub transform_a: Transform,
    /// World transform of B at the start of the sweep
    pub transform_b: Transform,
    /// Sweep displacement of B
    pub translation_b: Vec2,
}

/// Result of a successful [`shape_cast`]
#[derive(Clone, Copy, Debug)]
pub struct ShapeCastOutput {
    /// Contact point at the hit time
    pub point: Vec2,
    /// Contact normal at the hit time (from A toward B)
    pub normal: Vec2,
    /// Fraction of the translation consumed before contact
    pub lambda: f32,
    /// Iterations used
    pub iterations: usize,
}

/// Linear shape cast by conservative advancement.
///
/// At each iteration, advance λ by the current separation over the approach
/// speed along the closest-point axis. Returns `None` when the shapes do not
/// touch within the translation, or start out deeply overlapped.
pub fn shape_cast(input: &ShapeCastInput) -> Option<ShapeCastOutput> {
    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;

    let radius_a = proxy_a.radius.max(POLYGON_RADIUS);
    let radius_b = proxy_b.radius.max(POLYGON_RADIUS);
    let radius = radius_a + radius_b;

    let xf_a = input.transform_a;
    let mut xf_b = input.transform_b;
    let r = input.translation_b;

    let target = (radius - 3.0 * LINEAR_SLOP).max(LINEAR_SLOP);
    let tolerance = 0.25 * LINEAR_SLOP;

    let mut lambda = 0.0_f32;
    let mut cache = SimplexCache::default();
    let mut normal = Vec2::ZERO;

    const MAX_SHAPE_CAST_ITERATIONS: usize = 20;
    let mut iteration = 0;
    loop {
        let dist_input = DistanceInput {
            proxy_a: proxy_a.clone(),
            proxy_b: proxy_b.clone(),
            transform_a: xf_a,
            transform_b: xf_b,
            use_radii: false,
        };
        let output = distance(&mut cache, &dist_input);

        // Already touching (within tolerance of the target surface distance)
        if output.distance < target + tolerance {
            if iteration == 0 {
                // Initial overlap is a TOI-solver problem, not a cast hit
                return None;
            }
            let point = output.point_b + normal * radius_b;
            return Some(ShapeCastOutput {
                point,
                normal,
                lambda,
                iterations: iteration,
            });
        }

        debug_assert!(output.distance > 0.0);
        normal = output.point_b - output.point_a;
        normal.normalize();

        // Approach speed along the closest axis
        let approach = -r.dot(normal);
        if approach <= f32::EPSILON {
            return None; // moving apart or parallel
        }

        lambda += (output.distance - target) / approach;
        if lambda >= 1.0 {
            return None; // separated through the whole translation
        }

        xf_b.p = input.transform_b.p + r * lambda;

        iteration += 1;
        if iteration >= MAX_SHAPE_CAST_ITERATIONS {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polygon::PolygonShape;

    fn circle_proxy(radius: f32) -> DistanceProxy {
        DistanceProxy::from_shape(
            &Shape::Circle(CircleShape::new(Vec2::ZERO, radius)),
            0,
        )
    }

    fn box_proxy(hw: f32, hh: f32) -> DistanceProxy {
        DistanceProxy::from_shape(&Shape::Polygon(PolygonShape::new_box(hw, hh)), 0)
    }

    #[test]
    fn test_circle_circle_distance() {
        let mut cache = SimplexCache::default();
        let input = DistanceInput {
            proxy_a: circle_proxy(1.0),
            proxy_b: circle_proxy(1.0),
            transform_a: Transform::IDENTITY,
            transform_b: Transform::new(Vec2::new(5.0, 0.0), 0.0),
            use_radii: true,
        };
        let out = distance(&mut cache, &input);
        // Centers 5 apart, radii 1 each: surface distance 3
        assert!((out.distance - 3.0).abs() < 1e-4);
        assert!((out.point_a.x - 1.0).abs() < 1e-4);
        assert!((out.point_b.x - 4.0).abs() < 1e-4);
    }

    #[test]
    fn test_box_box_distance() {
        let mut cache = SimplexCache::default();
        let input = DistanceInput {
            proxy_a: box_proxy(1.0, 1.0),
            proxy_b: box_proxy(1.0, 1.0),
            transform_a: Transform::IDENTITY,
            transform_b: Transform::new(Vec2::new(5.0, 0.0), 0.0),
            use_radii: false,
        };
        let out = distance(&mut cache, &input);
        assert!((out.distance - 3.0).abs() < 1e-4);
    }

    #[test]
    fn test_overlap_reports_zero() {
        let mut cache = SimplexCache::default();
        let input = DistanceInput {
            proxy_a: circle_proxy(1.0),
            proxy_b: circle_proxy(1.0),
            transform_a: Transform::IDENTITY,
            transform_b: Transform::new(Vec2::new(0.5, 0.0), 0.0),
            use_radii: true,
        };
        let out = distance(&mut cache, &input);
        assert_eq!(out.distance, 0.0);
    }

    #[test]
    fn test_warm_start_cache() {
        let mut cache = SimplexCache::default();
        let input = DistanceInput {
            proxy_a: box_proxy(1.0, 1.0),
            proxy_b: box_proxy(1.0, 1.0),
            transform_a: Transform::IDENTITY,
            transform_b: Transform::new(Vec2::new(4.0, 0.1), 0.0),
            use_radii: false,
        };
        let cold = distance(&mut cache, &input);
        // Second query with the warm cache converges in fewer iterations
        let warm = distance(&mut cache, &input);
        assert!((cold.distance - warm.distance).abs() < 1e-5);
        assert!(warm.iterations <= cold.iterations);
    }

    #[test]
    fn test_shape_cast_hit() {
        let input = ShapeCastInput {
            proxy_a: circle_proxy(1.0),
            proxy_b: circle_proxy(1.0),
            transform_a: Transform::IDENTITY,
            transform_b: Transform::new(Vec2::new(10.0, 0.0), 0.0),
            translation_b: Vec2::new(-10.0, 0.0),
        };
        let out = shape_cast(&input).expect("cast should hit");
        // Gap of 8 closed at speed 10: λ ≈ 0.8 (minus the slop target)
        assert!(out.lambda > 0.75 && out.lambda < 0.82, "lambda = {}", out.lambda);
        assert!(out.normal.x > 0.99);
    }

    #[test]
    fn test_shape_cast_miss() {
        let input = ShapeCastInput {
            proxy_a: circle_proxy(1.0),
            proxy_b: circle_proxy(1.0),
            transform_a: Transform::IDENTITY,
            transform_b: Transform::new(Vec2::new(10.0, 0.0), 0.0),
            translation_b: Vec2::new(0.0, 5.0),
        };
        assert!(shape_cast(&input).is_none());
    }

    #[test]
    fn test_shape_cast_short_translation() {
        let input = ShapeCastInput {
            proxy_a: circle_proxy(1.0),
            proxy_b: circle_proxy(1.0),
            transform_a: Transform::IDENTITY,
            transform_b: Transform::new(Vec2::new(10.0, 0.0), 0.0),
            translation_b: Vec2::new(-2.0, 0.0),
        };
        // Only closes 2 of the 8 unit gap
        assert!(shape_cast(&input).is_none());
    }
}
