//! Chain Shape
//!
//! A polyline of one-sided edges sharing vertices. Each edge is a separate
//! broad-phase child; neighbors act as ghost vertices so bodies slide over
//! interior vertices without snagging.
//!
//! Chains describe terrain and containers; they are never dynamic.

use crate::collider::{Aabb, MassData, RayCastInput, RayCastOutput};
use crate::edge::EdgeShape;
use crate::math::{Transform, Vec2};
use crate::tuning::{LINEAR_SLOP, POLYGON_RADIUS};

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// An open or closed sequence of one-sided edges
#[derive(Clone, Debug)]
pub struct ChainShape {
    /// Chain vertices (a closed loop repeats the first vertex at the end)
    pub vertices: Vec<Vec2>,
    /// Ghost vertex before the first edge
    pub prev_vertex: Vec2,
    /// Ghost vertex after the last edge
    pub next_vertex: Vec2,
}

impl ChainShape {
    /// Closed loop through the given vertices (counter-clockwise winding
    /// makes the outward side solid).
    ///
    /// Returns `None` for fewer than 3 vertices or near-coincident neighbors.
    pub fn new_loop(vertices: &[Vec2]) -> Option<Self> {
        if vertices.len() < 3 {
            return None;
        }
        if !distinct_neighbors(vertices) {
            return None;
        }

        let mut vs = Vec::with_capacity(vertices.len() + 1);
        vs.extend_from_slice(vertices);
        vs.push(vertices[0]); // close the loop
        let prev_vertex = vs[vs.len() - 2];
        let next_vertex = vs[1];
        Some(Self {
            vertices: vs,
            prev_vertex,
            next_vertex,
        })
    }

    /// Open chain with explicit ghost vertices for the two ends
    pub fn new_chain(
        vertices: &[Vec2],
        prev_vertex: Vec2,
        next_vertex: Vec2,
    ) -> Option<Self> {
        if vertices.len() < 2 {
            return None;
        }
        if !distinct_neighbors(vertices) {
            return None;
        }

        Some(Self {
            vertices: vertices.into(),
            prev_vertex,
            next_vertex,
        })
    }

    /// Skin radius shared with edges
    #[inline]
    pub fn radius(&self) -> f32 {
        POLYGON_RADIUS
    }

    /// Number of edges
    #[inline]
    pub fn child_count(&self) -> usize {
        self.vertices.len() - 1
    }

    /// Materialize one child as a one-sided edge with ghost vertices
    pub fn child_edge(&self, index: usize) -> EdgeShape {
        debug_assert!(index < self.child_count());

        let v1 = self.vertices[index];
        let v2 = self.vertices[index + 1];
        let v0 = if index > 0 {
            self.vertices[index - 1]
        } else {
            self.prev_vertex
        };
        let v3 = if index + 2 < self.vertices.len() {
            self.vertices[index + 2]
        } else {
            self.next_vertex
        };

        EdgeShape::one_sided(v0, v1, v2, v3)
    }

    /// World-space bounds of one child edge
    pub fn compute_aabb(&self, xf: &Transform, child_index: usize) -> Aabb {
        debug_assert!(child_index < self.child_count());
        let v1 = xf.transform_point(self.vertices[child_index]);
        let v2 = xf.transform_point(self.vertices[child_index + 1]);
        let r = Vec2::new(self.radius(), self.radius());
        Aabb::new(v1.min(v2) - r, v1.max(v2) + r)
    }

    /// Ray cast one child edge
    pub fn ray_cast(
        &self,
        input: &RayCastInput,
        xf: &Transform,
        child_index: usize,
    ) -> Option<RayCastOutput> {
        self.child_edge(child_index).ray_cast(input, xf)
    }

    /// Chains are massless; static geometry only
    pub fn compute_mass(&self) -> MassData {
        MassData::default()
    }
}

/// Neighboring vertices must be farther apart than the weld tolerance
fn distinct_neighbors(vertices: &[Vec2]) -> bool {
    let min_dist_sq = (0.5 * LINEAR_SLOP) * (0.5 * LINEAR_SLOP);
    vertices
        .windows(2)
        .all(|w| (w[1] - w[0]).length_squared() > min_dist_sq)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_chain_children() {
        let vs = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(2.0, 1.0),
        ];
        let chain = ChainShape::new_chain(
            &vs,
            Vec2::new(-1.0, 0.0),
            Vec2::new(3.0, 1.0),
        )
        .unwrap();

        assert_eq!(chain.child_count(), 2);

        // First child uses the prev ghost
        let e0 = chain.child_edge(0);
        assert_eq!(e0.vertex0, Vec2::new(-1.0, 0.0));
        assert_eq!(e0.vertex1, Vec2::new(0.0, 0.0));
        assert_eq!(e0.vertex3, Vec2::new(2.0, 1.0));
        assert!(e0.one_sided);

        // Last child uses the next ghost
        let e1 = chain.child_edge(1);
        assert_eq!(e1.vertex0, Vec2::new(0.0, 0.0));
        assert_eq!(e1.vertex3, Vec2::new(3.0, 1.0));
    }

    #[test]
    fn test_loop_wraps_ghosts() {
        let vs = [
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(1.0, 2.0),
        ];
        let chain = ChainShape::new_loop(&vs).unwrap();
        // Loop closes: 3 edges from 4 stored vertices
        assert_eq!(chain.child_count(), 3);

        let last = chain.child_edge(2);
        assert_eq!(last.vertex2, Vec2::new(0.0, 0.0));
        assert_eq!(last.vertex3, chain.next_vertex);
    }

    #[test]
    fn test_rejects_degenerate() {
        assert!(ChainShape::new_loop(&[Vec2::ZERO, Vec2::UNIT_X]).is_none());
        let dupes = [Vec2::ZERO, Vec2::ZERO, Vec2::UNIT_Y];
        assert!(ChainShape::new_loop(&dupes).is_none());
        assert!(ChainShape::new_chain(&[Vec2::ZERO], Vec2::ZERO, Vec2::ZERO).is_none());
    }

    #[test]
    fn test_child_aabb() {
        let vs = [Vec2::new(0.0, 0.0), Vec2::new(4.0, 0.0)];
        let chain =
            ChainShape::new_chain(&vs, Vec2::new(-1.0, 0.0), Vec2::new(5.0, 0.0)).unwrap();
        let aabb = chain.compute_aabb(&Transform::IDENTITY, 0);
        assert!(aabb.min.x <= 0.0 && aabb.max.x >= 4.0);
    }

    #[test]
    fn test_massless() {
        let vs = [Vec2::ZERO, Vec2::UNIT_X];
        let chain = ChainShape::new_chain(&vs, -Vec2::UNIT_X, Vec2::new(2.0, 0.0)).unwrap();
        assert_eq!(chain.compute_mass().mass, 0.0);
    }
}
