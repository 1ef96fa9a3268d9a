//! Contact Manifolds
//!
//! Up to two contact points between a pair of shapes, stored in a local
//! frame so the solver can re-derive world geometry after either body moves.
//!
//! # Manifold kinds
//!
//! - **Circles**: local_point is circle A's center; points hold B's center
//! - **FaceA**: local_normal/local_point describe a face of A; points lie on B
//! - **FaceB**: the mirror case
//!
//! Each point carries a contact feature id encoding which vertex/face pair
//! produced it. Warm starting matches impulses across steps by these ids, so
//! they must be stable while the touching features are unchanged.

use crate::math::{Transform, Vec2};
use crate::tuning::MAX_MANIFOLD_POINTS;

// ============================================================================
// Contact features
// ============================================================================

/// Kind of feature on each shape that generated a contact point
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum FeatureType {
    /// Contact point is at a vertex
    #[default]
    Vertex = 0,
    /// Contact point is on a face
    Face = 1,
}

/// The vertex/face pair that produced a contact point.
///
/// Equal features across two steps identify "the same" contact point for
/// warm-start impulse transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ContactFeature {
    /// Feature index on shape A
    pub index_a: u8,
    /// Feature index on shape B
    pub index_b: u8,
    /// Feature type on shape A
    pub type_a: FeatureType,
    /// Feature type on shape B
    pub type_b: FeatureType,
}

impl ContactFeature {
    /// Pack into a single comparable key
    #[inline]
    pub fn key(self) -> u32 {
        (self.index_a as u32)
            | (self.index_b as u32) << 8
            | (self.type_a as u32) << 16
            | (self.type_b as u32) << 24
    }

    /// Swap the A/B roles (used when flipping a manifold)
    #[inline]
    pub fn swapped(self) -> Self {
        Self {
            index_a: self.index_b,
            index_b: self.index_a,
            type_a: self.type_b,
            type_b: self.type_a,
        }
    }
}

// ============================================================================
// Manifold
// ============================================================================

/// One contact point of a manifold
#[derive(Clone, Copy, Debug, Default)]
pub struct ManifoldPoint {
    /// Location in the manifold's local frame (meaning depends on the kind)
    pub local_point: Vec2,
    /// Accumulated non-penetration impulse
    pub normal_impulse: f32,
    /// Accumulated friction impulse
    pub tangent_impulse: f32,
    /// Feature id for warm-start matching
    pub id: ContactFeature,
}

/// Reference frame of a manifold
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ManifoldType {
    /// Circle-circle
    #[default]
    Circles,
    /// Reference face on shape A
    FaceA,
    /// Reference face on shape B
    FaceB,
}

/// A contact manifold between two shapes
#[derive(Clone, Copy, Debug, Default)]
pub struct Manifold {
    /// Contact points (only `point_count` are live)
    pub points: [ManifoldPoint; MAX_MANIFOLD_POINTS],
    /// Normal in the reference shape's local frame (unused for circles)
    pub local_normal: Vec2,
    /// Reference point in the reference shape's local frame
    pub local_point: Vec2,
    /// Which shape carries the reference feature
    pub kind: ManifoldType,
    /// Number of live points
    pub point_count: usize,
}

// ============================================================================
// World manifold
// ============================================================================

/// Manifold resolved into world space for the solver and callbacks
#[derive(Clone, Copy, Debug, Default)]
pub struct WorldManifold {
    /// World normal, pointing from A to B
    pub normal: Vec2,
    /// World contact points (midway between the shape surfaces)
    pub points: [Vec2; MAX_MANIFOLD_POINTS],
    /// Signed surface separation at each point (negative = penetrating)
    pub separations: [f32; MAX_MANIFOLD_POINTS],
}

impl WorldManifold {
    /// Evaluate a manifold with the current transforms and shape radii
    pub fn new(
        manifold: &Manifold,
        xf_a: &Transform,
        radius_a: f32,
        xf_b: &Transform,
        radius_b: f32,
    ) -> Self {
        let mut out = Self::default();
        if manifold.point_count == 0 {
            return out;
        }

        match manifold.kind {
            ManifoldType::Circles => {
                out.normal = Vec2::UNIT_X;
                let point_a = xf_a.transform_point(manifold.local_point);
                let point_b = xf_b.transform_point(manifold.points[0].local_point);
                if (point_b - point_a).length_squared() > f32::EPSILON * f32::EPSILON {
                    out.normal = (point_b - point_a).normalized();
                }

                let c_a = point_a + out.normal * radius_a;
                let c_b = point_b - out.normal * radius_b;
                out.points[0] = (c_a + c_b) * 0.5;
                out.separations[0] = (c_b - c_a).dot(out.normal);
            }
            ManifoldType::FaceA => {
                out.normal = xf_a.q.rotate(manifold.local_normal);
                let plane_point = xf_a.transform_point(manifold.local_point);

                for i in 0..manifold.point_count {
                    let clip_point = xf_b.transform_point(manifold.points[i].local_point);
                    let c_a = clip_point
                        + out.normal * (radius_a - (clip_point - plane_point).dot(out.normal));
                    let c_b = clip_point - out.normal * radius_b;
                    out.points[i] = (c_a + c_b) * 0.5;
                    out.separations[i] = (c_b - c_a).dot(out.normal);
                }
            }
            ManifoldType::FaceB => {
                let normal = xf_b.q.rotate(manifold.local_normal);
                let plane_point = xf_b.transform_point(manifold.local_point);

                for i in 0..manifold.point_count {
                    let clip_point = xf_a.transform_point(manifold.points[i].local_point);
                    let c_b = clip_point
                        + normal * (radius_b - (clip_point - plane_point).dot(normal));
                    let c_a = clip_point - normal * radius_a;
                    out.points[i] = (c_a + c_b) * 0.5;
                    out.separations[i] = (c_a - c_b).dot(normal);
                }

                // Report the normal from A to B
                out.normal = -normal;
            }
        }

        out
    }
}

// ============================================================================
// Clipping
// ============================================================================

/// A vertex undergoing Sutherland-Hodgman clipping
#[derive(Clone, Copy, Debug, Default)]
pub struct ClipVertex {
    /// Vertex position
    pub v: Vec2,
    /// Feature id carried through the clip
    pub id: ContactFeature,
}

/// Clip the segment `v_in` against the half-plane
/// `dot(normal, x) - offset <= 0`, tagging any newly created vertex with
/// `vertex_index_a`. Returns the number of output points (0, 1, or 2).
pub fn clip_segment_to_line(
    v_out: &mut [ClipVertex; 2],
    v_in: &[ClipVertex; 2],
    normal: Vec2,
    offset: f32,
    vertex_index_a: usize,
) -> usize {
    let mut count = 0;

    // Signed distances of the endpoints
    let distance0 = normal.dot(v_in[0].v) - offset;
    let distance1 = normal.dot(v_in[1].v) - offset;

    // Keep points behind the plane
    if distance0 <= 0.0 {
        v_out[count] = v_in[0];
        count += 1;
    }
    if distance1 <= 0.0 {
        v_out[count] = v_in[1];
        count += 1;
    }

    // The segment crosses the plane: emit the intersection
    if distance0 * distance1 < 0.0 {
        let interp = distance0 / (distance0 - distance1);
        v_out[count].v = v_in[0].v + (v_in[1].v - v_in[0].v) * interp;
        // The clip plane is a face of A cutting an edge of B
        v_out[count].id = ContactFeature {
            index_a: vertex_index_a as u8,
            index_b: v_in[0].id.index_b,
            type_a: FeatureType::Vertex,
            type_b: FeatureType::Face,
        };
        count += 1;
    }

    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_key_roundtrip() {
        let f = ContactFeature {
            index_a: 3,
            index_b: 7,
            type_a: FeatureType::Face,
            type_b: FeatureType::Vertex,
        };
        let g = f.swapped();
        assert_eq!(g.index_a, 7);
        assert_eq!(g.type_a, FeatureType::Vertex);
        assert_ne!(f.key(), g.key());
        assert_eq!(f.key(), f.swapped().swapped().key());
    }

    #[test]
    fn test_clip_keeps_inside_points() {
        let v_in = [
            ClipVertex {
                v: Vec2::new(-1.0, 0.0),
                id: ContactFeature::default(),
            },
            ClipVertex {
                v: Vec2::new(1.0, 0.0),
                id: ContactFeature::default(),
            },
        ];
        let mut v_out = [ClipVertex::default(); 2];

        // Plane x <= 2 keeps both
        let n = clip_segment_to_line(&mut v_out, &v_in, Vec2::UNIT_X, 2.0, 0);
        assert_eq!(n, 2);

        // Plane x <= 0 clips the second point to the origin
        let n = clip_segment_to_line(&mut v_out, &v_in, Vec2::UNIT_X, 0.0, 4);
        assert_eq!(n, 2);
        assert!((v_out[1].v.x - 0.0).abs() < 1e-6);
        assert_eq!(v_out[1].id.index_a, 4);
        assert_eq!(v_out[1].id.type_a, FeatureType::Vertex);
    }

    #[test]
    fn test_clip_rejects_outside_segment() {
        let v_in = [
            ClipVertex {
                v: Vec2::new(3.0, 0.0),
                id: ContactFeature::default(),
            },
            ClipVertex {
                v: Vec2::new(5.0, 0.0),
                id: ContactFeature::default(),
            },
        ];
        let mut v_out = [ClipVertex::default(); 2];
        let n = clip_segment_to_line(&mut v_out, &v_in, Vec2::UNIT_X, 0.0, 0);
        assert_eq!(n, 0);
    }

    #[test]
    fn test_world_manifold_circles() {
        let mut manifold = Manifold {
            kind: ManifoldType::Circles,
            local_point: Vec2::ZERO, // circle A center
            point_count: 1,
            ..Default::default()
        };
        manifold.points[0].local_point = Vec2::ZERO; // circle B center

        let xf_a = Transform::IDENTITY;
        let xf_b = Transform::new(Vec2::new(1.5, 0.0), 0.0);
        let wm = WorldManifold::new(&manifold, &xf_a, 1.0, &xf_b, 1.0);

        assert!(wm.normal.x > 0.99);
        // Overlap of 0.5: separation = 1.5 - 2.0
        assert!((wm.separations[0] + 0.5).abs() < 1e-5);
        assert!((wm.points[0].x - 0.75).abs() < 1e-5);
    }
}
