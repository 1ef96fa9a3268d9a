//! Narrow Phase: Edge Manifolds
//!
//! Manifold generators for edges against circles and polygons. One-sided
//! edges (chain children) restrict the admissible contact normals using
//! their ghost vertices, so bodies slide across interior chain vertices
//! without catching on them.

use crate::circle::CircleShape;
use crate::edge::EdgeShape;
use crate::manifold::{
    clip_segment_to_line, ClipVertex, ContactFeature, FeatureType, Manifold, ManifoldType,
};
use crate::math::{Transform, Vec2};
use crate::polygon::PolygonShape;
use crate::tuning::MAX_POLYGON_VERTICES;

// ============================================================================
// Edge-circle
// ============================================================================

/// Manifold between an edge (reference) and a circle
pub fn collide_edge_circle(
    edge_a: &EdgeShape,
    xf_a: &Transform,
    circle_b: &CircleShape,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    // Circle center in the edge's frame
    let q = xf_a.inv_transform_point(xf_b.transform_point(circle_b.position));

    let a = edge_a.vertex1;
    let b = edge_a.vertex2;
    let e = b - a;

    // Edge normal, right of the v1→v2 direction
    let n = Vec2::new(e.y, -e.x);
    let offset = n.dot(q - a);

    if edge_a.one_sided && offset < 0.0 {
        return manifold;
    }

    // Barycentric coordinates of the projection
    let u = e.dot(b - q);
    let v = e.dot(q - a);

    let radius = edge_a.radius() + circle_b.radius;

    let feature_b = |index_a: u8, type_a: FeatureType| ContactFeature {
        index_a,
        index_b: 0,
        type_a,
        type_b: FeatureType::Vertex,
    };

    // Region A: closest to vertex1
    if v <= 0.0 {
        let d = q - a;
        if d.dot(d) > radius * radius {
            return manifold;
        }

        // The previous chain edge owns this vertex region
        if edge_a.one_sided {
            let a1 = edge_a.vertex0;
            let b1 = a;
            let e1 = b1 - a1;
            let u1 = e1.dot(b1 - q);
            if u1 > 0.0 {
                return manifold;
            }
        }

        manifold.kind = ManifoldType::Circles;
        manifold.local_normal = Vec2::ZERO;
        manifold.local_point = a;
        manifold.point_count = 1;
        manifold.points[0].local_point = circle_b.position;
        manifold.points[0].id = feature_b(0, FeatureType::Vertex);
        return manifold;
    }

    // Region B: closest to vertex2
    if u <= 0.0 {
        let d = q - b;
        if d.dot(d) > radius * radius {
            return manifold;
        }

        // The next chain edge owns this vertex region
        if edge_a.one_sided {
            let b2 = edge_a.vertex3;
            let a2 = b;
            let e2 = b2 - a2;
            let v2 = e2.dot(q - a2);
            if v2 > 0.0 {
                return manifold;
            }
        }

        manifold.kind = ManifoldType::Circles;
        manifold.local_normal = Vec2::ZERO;
        manifold.local_point = b;
        manifold.point_count = 1;
        manifold.points[0].local_point = circle_b.position;
        manifold.points[0].id = feature_b(1, FeatureType::Vertex);
        return manifold;
    }

    // Region AB: closest to the interior of the segment
    let den = e.dot(e);
    debug_assert!(den > 0.0);
    let p = (a * u + b * v) * (1.0 / den);
    let d = q - p;
    if d.dot(d) > radius * radius {
        return manifold;
    }

    let mut normal = Vec2::new(-e.y, e.x);
    if normal.dot(q - a) < 0.0 {
        normal = -normal;
    }
    normal.normalize();

    manifold.kind = ManifoldType::FaceA;
    manifold.local_normal = normal;
    manifold.local_point = a;
    manifold.point_count = 1;
    manifold.points[0].local_point = circle_b.position;
    manifold.points[0].id = feature_b(0, FeatureType::Face);
    manifold
}

// ============================================================================
// Edge-polygon
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EpAxisType {
    EdgeA,
    EdgeB,
}

#[derive(Clone, Copy, Debug)]
struct EpAxis {
    kind: EpAxisType,
    index: usize,
    separation: f32,
    normal: Vec2,
}

/// Polygon B (in A's frame) against the edge normal; the better of ±normal
fn compute_edge_separation(
    vertices_b: &[Vec2],
    v1: Vec2,
    normal1: Vec2,
) -> EpAxis {
    let mut axis = EpAxis {
        kind: EpAxisType::EdgeA,
        index: 0,
        separation: f32::MIN,
        normal: Vec2::ZERO,
    };

    let axes = [normal1, -normal1];
    for (j, &axis_candidate) in axes.iter().enumerate() {
        let mut sj = f32::MAX;
        for &vb in vertices_b {
            let si = axis_candidate.dot(vb - v1);
            if si < sj {
                sj = si;
            }
        }
        if sj > axis.separation {
            axis.index = j;
            axis.separation = sj;
            axis.normal = axis_candidate;
        }
    }

    axis
}

/// The edge segment against polygon B's face normals
fn compute_polygon_separation(
    vertices_b: &[Vec2],
    normals_b: &[Vec2],
    v1: Vec2,
    v2: Vec2,
) -> EpAxis {
    let mut axis = EpAxis {
        kind: EpAxisType::EdgeB,
        index: 0,
        separation: f32::MIN,
        normal: Vec2::ZERO,
    };

    for i in 0..vertices_b.len() {
        let n = -normals_b[i];
        let s1 = n.dot(vertices_b[i] - v1);
        let s2 = n.dot(vertices_b[i] - v2);
        let s = s1.min(s2);

        if s > axis.separation {
            axis.index = i;
            axis.separation = s;
            axis.normal = n;
        }
    }

    axis
}

/// Manifold between an edge and a polygon
pub fn collide_edge_polygon(
    edge_a: &EdgeShape,
    xf_a: &Transform,
    polygon_b: &PolygonShape,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    let xf = xf_a.mul_t(*xf_b);
    let centroid_b = xf.transform_point(polygon_b.centroid);

    let v1 = edge_a.vertex1;
    let v2 = edge_a.vertex2;

    let mut edge1 = v2 - v1;
    edge1.normalize();

    // Edge normal, right of the v1→v2 direction
    let normal1 = Vec2::new(edge1.y, -edge1.x);
    let offset1 = normal1.dot(centroid_b - v1);

    if edge_a.one_sided && offset1 < 0.0 {
        return manifold;
    }

    // Polygon B in the edge's frame
    let count_b = polygon_b.count;
    let mut vertices_b = [Vec2::ZERO; MAX_POLYGON_VERTICES];
    let mut normals_b = [Vec2::ZERO; MAX_POLYGON_VERTICES];
    for i in 0..count_b {
        vertices_b[i] = xf.transform_point(polygon_b.vertices[i]);
        normals_b[i] = xf.q.rotate(polygon_b.normals[i]);
    }
    let vertices_b = &vertices_b[..count_b];
    let normals_b = &normals_b[..count_b];

    let radius = polygon_b.radius() + edge_a.radius();

    let edge_axis = compute_edge_separation(vertices_b, v1, normal1);
    if edge_axis.separation > radius {
        return manifold;
    }

    let polygon_axis = compute_polygon_separation(vertices_b, normals_b, v1, v2);
    if polygon_axis.separation > radius {
        return manifold;
    }

    // Hysteresis toward the edge axis reduces reference flip-flop
    const RELATIVE_TOL: f32 = 0.98;
    const ABSOLUTE_TOL: f32 = 0.001;

    let mut primary_axis = if polygon_axis.separation - radius
        > RELATIVE_TOL * (edge_axis.separation - radius) + ABSOLUTE_TOL
    {
        polygon_axis
    } else {
        edge_axis
    };

    if edge_a.one_sided {
        // Gauss-map check: only normals between the adjacent edge normals
        // are admissible, otherwise the contact belongs to a neighbor.
        let mut edge0 = v1 - edge_a.vertex0;
        edge0.normalize();
        let normal0 = Vec2::new(edge0.y, -edge0.x);
        let convex1 = edge0.cross(edge1) >= 0.0;

        let mut edge2 = edge_a.vertex3 - v2;
        edge2.normalize();
        let normal2 = Vec2::new(edge2.y, -edge2.x);
        let convex2 = edge1.cross(edge2) >= 0.0;

        const SIN_TOL: f32 = 0.1;
        let side1 = primary_axis.normal.dot(edge1) <= 0.0;

        if side1 {
            if convex1 {
                if primary_axis.normal.cross(normal0) > SIN_TOL {
                    return manifold; // the previous edge owns this direction
                }
            } else {
                primary_axis = edge_axis;
            }
        } else if convex2 {
            if normal2.cross(primary_axis.normal) > SIN_TOL {
                return manifold; // the next edge owns this direction
            }
        } else {
            primary_axis = edge_axis;
        }
    }

    // Reference face and the incident points to clip against it
    let mut clip_points = [ClipVertex::default(); 2];
    let (ref_normal, ref_v1, ref_v2, ref_i1, ref_i2);

    if primary_axis.kind == EpAxisType::EdgeA {
        manifold.kind = ManifoldType::FaceA;

        // Incident edge on B: most anti-parallel normal
        let mut best_index = 0;
        let mut best_value = primary_axis.normal.dot(normals_b[0]);
        for (i, nb) in normals_b.iter().enumerate().skip(1) {
            let value = primary_axis.normal.dot(*nb);
            if value < best_value {
                best_value = value;
                best_index = i;
            }
        }

        let i1 = best_index;
        let i2 = if i1 + 1 < count_b { i1 + 1 } else { 0 };

        clip_points[0] = ClipVertex {
            v: vertices_b[i1],
            id: ContactFeature {
                index_a: 0,
                index_b: i1 as u8,
                type_a: FeatureType::Face,
                type_b: FeatureType::Vertex,
            },
        };
        clip_points[1] = ClipVertex {
            v: vertices_b[i2],
            id: ContactFeature {
                index_a: 0,
                index_b: i2 as u8,
                type_a: FeatureType::Face,
                type_b: FeatureType::Vertex,
            },
        };

        ref_i1 = 0;
        ref_i2 = 1;
        ref_v1 = v1;
        ref_v2 = v2;
        ref_normal = primary_axis.normal;
    } else {
        manifold.kind = ManifoldType::FaceB;

        clip_points[0] = ClipVertex {
            v: v2,
            id: ContactFeature {
                index_a: 1,
                index_b: primary_axis.index as u8,
                type_a: FeatureType::Vertex,
                type_b: FeatureType::Face,
            },
        };
        clip_points[1] = ClipVertex {
            v: v1,
            id: ContactFeature {
                index_a: 0,
                index_b: primary_axis.index as u8,
                type_a: FeatureType::Vertex,
                type_b: FeatureType::Face,
            },
        };

        ref_i1 = primary_axis.index;
        ref_i2 = if ref_i1 + 1 < count_b { ref_i1 + 1 } else { 0 };
        ref_v1 = vertices_b[ref_i1];
        ref_v2 = vertices_b[ref_i2];
        ref_normal = normals_b[ref_i1];
    }

    let mut tangent = ref_v2 - ref_v1;
    tangent.normalize();
    let side_normal1 = -tangent;
    let side_normal2 = tangent;
    let side_offset1 = side_normal1.dot(ref_v1);
    let side_offset2 = side_normal2.dot(ref_v2);

    let mut clip_points1 = [ClipVertex::default(); 2];
    let mut clip_points2 = [ClipVertex::default(); 2];

    let np = clip_segment_to_line(&mut clip_points1, &clip_points, side_normal1, side_offset1, ref_i1);
    if np < 2 {
        return manifold;
    }

    let np = clip_segment_to_line(&mut clip_points2, &clip_points1, side_normal2, side_offset2, ref_i2);
    if np < 2 {
        return manifold;
    }

    if primary_axis.kind == EpAxisType::EdgeA {
        manifold.local_normal = ref_normal;
        manifold.local_point = ref_v1;
    } else {
        // Face-B manifolds store the face in B's own frame
        manifold.local_normal = polygon_b.normals[ref_i1];
        manifold.local_point = polygon_b.vertices[ref_i1];
    }

    let mut point_count = 0;
    for clip in clip_points2.iter() {
        let separation = ref_normal.dot(clip.v - ref_v1);
        if separation <= radius {
            let cp = &mut manifold.points[point_count];
            if manifold.kind == ManifoldType::FaceA {
                cp.local_point = xf.inv_transform_point(clip.v);
                cp.id = clip.id;
            } else {
                cp.local_point = clip.v;
                cp.id = clip.id.swapped();
            }
            point_count += 1;
        }
    }

    manifold.point_count = point_count;
    manifold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifold::WorldManifold;

    fn flat_edge() -> EdgeShape {
        EdgeShape::two_sided(Vec2::new(-2.0, 0.0), Vec2::new(2.0, 0.0))
    }

    /// Chain edge walked right-to-left, so its one-sided normal faces +Y
    fn flat_chain_edge() -> EdgeShape {
        EdgeShape::one_sided(
            Vec2::new(4.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(-2.0, 0.0),
            Vec2::new(-4.0, 0.0),
        )
    }

    #[test]
    fn test_edge_circle_face_contact() {
        let edge = flat_edge();
        let circle = CircleShape::new(Vec2::ZERO, 0.5);
        let xf_b = Transform::new(Vec2::new(0.0, 0.4), 0.0);

        let m = collide_edge_circle(&edge, &Transform::IDENTITY, &circle, &xf_b);
        assert_eq!(m.point_count, 1);
        assert_eq!(m.kind, ManifoldType::FaceA);
        assert!(m.local_normal.y > 0.99);
    }

    #[test]
    fn test_edge_circle_vertex_region() {
        let edge = flat_edge();
        let circle = CircleShape::new(Vec2::ZERO, 0.5);
        // Just beyond vertex2, within the radius
        let xf_b = Transform::new(Vec2::new(2.3, 0.0), 0.0);

        let m = collide_edge_circle(&edge, &Transform::IDENTITY, &circle, &xf_b);
        assert_eq!(m.point_count, 1);
        assert_eq!(m.kind, ManifoldType::Circles);
    }

    #[test]
    fn test_one_sided_edge_ignores_back_side() {
        let edge = flat_chain_edge();
        let circle = CircleShape::new(Vec2::ZERO, 0.5);

        let above = Transform::new(Vec2::new(0.0, 0.4), 0.0);
        assert_eq!(
            collide_edge_circle(&edge, &Transform::IDENTITY, &circle, &above).point_count,
            1
        );

        let below = Transform::new(Vec2::new(0.0, -0.4), 0.0);
        assert_eq!(
            collide_edge_circle(&edge, &Transform::IDENTITY, &circle, &below).point_count,
            0
        );
    }

    #[test]
    fn test_ghost_vertex_suppresses_interior_hit() {
        // Circle beyond vertex1 projects onto the PREVIOUS collinear edge,
        // so this edge must not claim the contact.
        let edge = flat_chain_edge();
        let circle = CircleShape::new(Vec2::ZERO, 0.5);
        let xf_b = Transform::new(Vec2::new(2.3, 0.1), 0.0);

        let m = collide_edge_circle(&edge, &Transform::IDENTITY, &circle, &xf_b);
        assert_eq!(m.point_count, 0, "neighbor edge owns this region");
    }

    #[test]
    fn test_edge_polygon_resting_box() {
        let edge = flat_edge();
        let poly = PolygonShape::new_box(0.5, 0.5);
        let xf_b = Transform::new(Vec2::new(0.0, 0.49), 0.0);

        let m = collide_edge_polygon(&edge, &Transform::IDENTITY, &poly, &xf_b);
        assert_eq!(m.point_count, 2);
        assert_eq!(m.kind, ManifoldType::FaceA);

        let wm = WorldManifold::new(
            &m,
            &Transform::IDENTITY,
            edge.radius(),
            &xf_b,
            poly.radius(),
        );
        assert!(wm.normal.y > 0.99);
        assert!(wm.separations[0] < 0.0);
    }

    #[test]
    fn test_edge_polygon_separated() {
        let edge = flat_edge();
        let poly = PolygonShape::new_box(0.5, 0.5);
        let xf_b = Transform::new(Vec2::new(0.0, 3.0), 0.0);
        let m = collide_edge_polygon(&edge, &Transform::IDENTITY, &poly, &xf_b);
        assert_eq!(m.point_count, 0);
    }

    #[test]
    fn test_one_sided_edge_polygon_back_cull() {
        let edge = flat_chain_edge();
        let poly = PolygonShape::new_box(0.5, 0.5);
        let xf_b = Transform::new(Vec2::new(0.0, -0.49), 0.0);
        let m = collide_edge_polygon(&edge, &Transform::IDENTITY, &poly, &xf_b);
        assert_eq!(m.point_count, 0, "centroid behind a one-sided edge");
    }

    #[test]
    fn test_edge_polygon_corner_contact() {
        let edge = flat_edge();
        let poly = PolygonShape::new_box(0.5, 0.5);
        // Rotated 45°: one corner down
        let xf_b = Transform::new(Vec2::new(0.0, 0.65), core::f32::consts::FRAC_PI_4);
        let m = collide_edge_polygon(&edge, &Transform::IDENTITY, &poly, &xf_b);
        assert!(m.point_count >= 1);
    }
}
