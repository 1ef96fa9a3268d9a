//! Narrow Phase: Circle and Polygon Manifolds
//!
//! Manifold generators for the convex pairings: circle-circle,
//! polygon-circle, and polygon-polygon.
//!
//! Polygon-polygon runs the separating-axis test over both shapes' face
//! normals, picks the reference face (largest separation, with a relative
//! tolerance so the choice is stable frame to frame), and clips the incident
//! edge against the reference side planes, keeping at most two points within
//! the contact radius.
//!
//! Author: Moroya Sakamoto

use crate::circle::CircleShape;
use crate::manifold::{
    clip_segment_to_line, ClipVertex, ContactFeature, FeatureType, Manifold, ManifoldType,
};
use crate::math::{Transform, Vec2};
use crate::polygon::PolygonShape;
use crate::tuning::LINEAR_SLOP;

// ============================================================================
// Circle-circle
// ============================================================================

/// Manifold between two circles
pub fn collide_circles(
    circle_a: &CircleShape,
    xf_a: &Transform,
    circle_b: &CircleShape,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    let p_a = xf_a.transform_point(circle_a.position);
    let p_b = xf_b.transform_point(circle_b.position);

    let d = p_b - p_a;
    let dist_sqr = d.dot(d);
    let r = circle_a.radius + circle_b.radius;
    if dist_sqr > r * r {
        return manifold;
    }

    manifold.kind = ManifoldType::Circles;
    manifold.local_point = circle_a.position;
    manifold.local_normal = Vec2::ZERO;
    manifold.point_count = 1;
    manifold.points[0].local_point = circle_b.position;
    manifold.points[0].id = ContactFeature::default();
    manifold
}

// ============================================================================
// Polygon-circle
// ============================================================================

/// Manifold between a polygon (reference) and a circle
pub fn collide_polygon_circle(
    polygon_a: &PolygonShape,
    xf_a: &Transform,
    circle_b: &CircleShape,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    // Circle center in the polygon's frame
    let c = xf_b.transform_point(circle_b.position);
    let c_local = xf_a.inv_transform_point(c);

    // Face of maximum separation
    let mut normal_index = 0;
    let mut separation = f32::MIN;
    let radius = polygon_a.radius() + circle_b.radius;

    for i in 0..polygon_a.count {
        let s = polygon_a.normals[i].dot(c_local - polygon_a.vertices[i]);
        if s > radius {
            return manifold; // early out: separated
        }
        if s > separation {
            separation = s;
            normal_index = i;
        }
    }

    let vert_index1 = normal_index;
    let vert_index2 = if vert_index1 + 1 < polygon_a.count {
        vert_index1 + 1
    } else {
        0
    };
    let v1 = polygon_a.vertices[vert_index1];
    let v2 = polygon_a.vertices[vert_index2];

    // Center inside the polygon
    if separation < f32::EPSILON {
        manifold.point_count = 1;
        manifold.kind = ManifoldType::FaceA;
        manifold.local_normal = polygon_a.normals[normal_index];
        manifold.local_point = (v1 + v2) * 0.5;
        manifold.points[0].local_point = circle_b.position;
        manifold.points[0].id = ContactFeature::default();
        return manifold;
    }

    // Voronoi regions of the reference edge
    let u1 = (c_local - v1).dot(v2 - v1);
    let u2 = (c_local - v2).dot(v1 - v2);
    if u1 <= 0.0 {
        if (c_local - v1).length_squared() > radius * radius {
            return manifold;
        }
        manifold.point_count = 1;
        manifold.kind = ManifoldType::FaceA;
        manifold.local_normal = (c_local - v1).normalized();
        manifold.local_point = v1;
    } else if u2 <= 0.0 {
        if (c_local - v2).length_squared() > radius * radius {
            return manifold;
        }
        manifold.point_count = 1;
        manifold.kind = ManifoldType::FaceA;
        manifold.local_normal = (c_local - v2).normalized();
        manifold.local_point = v2;
    } else {
        let face_center = (v1 + v2) * 0.5;
        let s = (c_local - face_center).dot(polygon_a.normals[vert_index1]);
        if s > radius {
            return manifold;
        }
        manifold.point_count = 1;
        manifold.kind = ManifoldType::FaceA;
        manifold.local_normal = polygon_a.normals[vert_index1];
        manifold.local_point = face_center;
    }

    manifold.points[0].local_point = circle_b.position;
    manifold.points[0].id = ContactFeature::default();
    manifold
}

// ============================================================================
// Polygon-polygon
// ============================================================================

/// Largest separation of poly2 from poly1's faces, with the achieving face
fn find_max_separation(
    poly1: &PolygonShape,
    xf1: &Transform,
    poly2: &PolygonShape,
    xf2: &Transform,
) -> (f32, usize) {
    // Work entirely in poly2's frame
    let xf = xf2.mul_t(*xf1);

    let mut best_index = 0;
    let mut max_separation = f32::MIN;
    for i in 0..poly1.count {
        let n = xf.q.rotate(poly1.normals[i]);
        let v1 = xf.transform_point(poly1.vertices[i]);

        // Deepest point of poly2 against this face
        let mut si = f32::MAX;
        for j in 0..poly2.count {
            let sij = n.dot(poly2.vertices[j] - v1);
            if sij < si {
                si = sij;
            }
        }

        if si > max_separation {
            max_separation = si;
            best_index = i;
        }
    }

    (max_separation, best_index)
}

/// The edge of poly2 most anti-parallel to poly1's reference face normal
fn find_incident_edge(
    poly1: &PolygonShape,
    xf1: &Transform,
    edge1: usize,
    poly2: &PolygonShape,
    xf2: &Transform,
) -> [ClipVertex; 2] {
    debug_assert!(edge1 < poly1.count);

    // Reference normal in poly2's frame
    let normal1 = xf2.q.inv_rotate(xf1.q.rotate(poly1.normals[edge1]));

    let mut index = 0;
    let mut min_dot = f32::MAX;
    for i in 0..poly2.count {
        let dot = normal1.dot(poly2.normals[i]);
        if dot < min_dot {
            min_dot = dot;
            index = i;
        }
    }

    let i1 = index;
    let i2 = if i1 + 1 < poly2.count { i1 + 1 } else { 0 };

    [
        ClipVertex {
            v: xf2.transform_point(poly2.vertices[i1]),
            id: ContactFeature {
                index_a: edge1 as u8,
                index_b: i1 as u8,
                type_a: FeatureType::Face,
                type_b: FeatureType::Vertex,
            },
        },
        ClipVertex {
            v: xf2.transform_point(poly2.vertices[i2]),
            id: ContactFeature {
                index_a: edge1 as u8,
                index_b: i2 as u8,
                type_a: FeatureType::Face,
                type_b: FeatureType::Vertex,
            },
        },
    ]
}

/// SAT + clipping manifold between two polygons
pub fn collide_polygons(
    poly_a: &PolygonShape,
    xf_a: &Transform,
    poly_b: &PolygonShape,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();
    let total_radius = poly_a.radius() + poly_b.radius();

    let (separation_a, edge_a) = find_max_separation(poly_a, xf_a, poly_b, xf_b);
    if separation_a > total_radius {
        return manifold;
    }

    let (separation_b, edge_b) = find_max_separation(poly_b, xf_b, poly_a, xf_a);
    if separation_b > total_radius {
        return manifold;
    }

    // Prefer A's face unless B's separation is meaningfully larger; the
    // tolerance keeps the reference choice from flickering between frames.
    let k_tol = 0.1 * LINEAR_SLOP;
    let (poly1, poly2, xf1, xf2, edge1, flip) = if separation_b > separation_a + k_tol {
        manifold.kind = ManifoldType::FaceB;
        (poly_b, poly_a, xf_b, xf_a, edge_b, true)
    } else {
        manifold.kind = ManifoldType::FaceA;
        (poly_a, poly_b, xf_a, xf_b, edge_a, false)
    };

    let incident_edge = find_incident_edge(poly1, xf1, edge1, poly2, xf2);

    let iv1 = edge1;
    let iv2 = if edge1 + 1 < poly1.count { edge1 + 1 } else { 0 };

    let mut v11 = poly1.vertices[iv1];
    let mut v12 = poly1.vertices[iv2];

    let local_tangent = (v12 - v11).normalized();
    let local_normal = local_tangent.cross_scalar(1.0);
    let plane_point = (v11 + v12) * 0.5;

    let tangent = xf1.q.rotate(local_tangent);
    let normal = tangent.cross_scalar(1.0);

    v11 = xf1.transform_point(v11);
    v12 = xf1.transform_point(v12);

    let front_offset = normal.dot(v11);

    // Side planes extended by the contact radius
    let side_offset1 = -tangent.dot(v11) + total_radius;
    let side_offset2 = tangent.dot(v12) + total_radius;

    let mut clip_points1 = [ClipVertex::default(); 2];
    let mut clip_points2 = [ClipVertex::default(); 2];

    let np = clip_segment_to_line(&mut clip_points1, &incident_edge, -tangent, side_offset1, iv1);
    if np < 2 {
        return manifold;
    }

    let np = clip_segment_to_line(&mut clip_points2, &clip_points1, tangent, side_offset2, iv2);
    if np < 2 {
        return manifold;
    }

    manifold.local_normal = local_normal;
    manifold.local_point = plane_point;

    let mut point_count = 0;
    for clip in clip_points2.iter() {
        let separation = normal.dot(clip.v) - front_offset;
        if separation <= total_radius {
            let cp = &mut manifold.points[point_count];
            cp.local_point = xf2.inv_transform_point(clip.v);
            cp.id = if flip { clip.id.swapped() } else { clip.id };
            point_count += 1;
        }
    }

    manifold.point_count = point_count;
    manifold
}
