#![no_main]
use alice_physics_2d::collide::{collide_circles, collide_polygon_circle, collide_polygons};
use alice_physics_2d::{CircleShape, PolygonShape, Transform, Vec2};
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct CollisionInput {
    /// Two shape transforms (positions and angles, scaled down)
    x1: i8,
    y1: i8,
    angle1: i8,
    x2: i8,
    y2: i8,
    angle2: i8,
    /// Shape selector per side: 0 = circle, otherwise box
    kind1: u8,
    kind2: u8,
    /// Raw size inputs (clamped to sane positive values)
    size1: u8,
    size2: u8,
}

fn size(raw: u8) -> f32 {
    0.05 + (raw as f32) * 0.01
}

// Fuzz the manifold generators with near-overlapping shapes.
// Must never panic, and manifolds must never report more than 2 points.
fuzz_target!(|input: CollisionInput| {
    let xf1 = Transform::new(
        Vec2::new(input.x1 as f32 * 0.05, input.y1 as f32 * 0.05),
        input.angle1 as f32 * 0.05,
    );
    let xf2 = Transform::new(
        Vec2::new(input.x2 as f32 * 0.05, input.y2 as f32 * 0.05),
        input.angle2 as f32 * 0.05,
    );

    let manifold = match (input.kind1 == 0, input.kind2 == 0) {
        (true, true) => {
            let a = CircleShape::new(Vec2::ZERO, size(input.size1));
            let b = CircleShape::new(Vec2::ZERO, size(input.size2));
            collide_circles(&a, &xf1, &b, &xf2)
        }
        (false, true) => {
            let a = PolygonShape::new_box(size(input.size1), size(input.size1));
            let b = CircleShape::new(Vec2::ZERO, size(input.size2));
            collide_polygon_circle(&a, &xf1, &b, &xf2)
        }
        (true, false) => {
            let a = PolygonShape::new_box(size(input.size2), size(input.size2));
            let b = CircleShape::new(Vec2::ZERO, size(input.size1));
            collide_polygon_circle(&a, &xf2, &b, &xf1)
        }
        (false, false) => {
            let a = PolygonShape::new_box(size(input.size1), size(input.size1));
            let b = PolygonShape::new_box(size(input.size2), size(input.size2));
            collide_polygons(&a, &xf1, &b, &xf2)
        }
    };

    assert!(manifold.point_count <= 2);
});
