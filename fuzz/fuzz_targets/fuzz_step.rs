#![no_main]
use alice_physics_2d::prelude::*;
use alice_physics_2d::{CircleShape, PolygonShape, Shape, Vec2};
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    /// Number of bodies to add (capped)
    body_count: u8,
    /// Position components (i16 to keep values reasonable)
    positions: Vec<(i16, i16)>,
    /// Velocity components
    velocities: Vec<(i8, i8)>,
    /// Per-body: use a box instead of a circle
    use_box: Vec<bool>,
    /// Number of simulation steps (capped)
    step_count: u8,
}

// Fuzz the world: add random bodies and step.
// Must never panic regardless of input.
fuzz_target!(|input: FuzzInput| {
    let mut world = World::new(Vec2::new(0.0, -10.0));

    let body_count = (input.body_count as usize).min(16);

    for i in 0..body_count {
        let (px, py) = input.positions.get(i).copied().unwrap_or((0, 0));
        let (vx, vy) = input.velocities.get(i).copied().unwrap_or((0, 0));

        let mut def = BodyDef::dynamic_at(Vec2::new(px as f32 * 0.1, py as f32 * 0.1));
        def.linear_velocity = Vec2::new(vx as f32, vy as f32);
        let body = world.create_body(&def).unwrap();

        let shape = if input.use_box.get(i).copied().unwrap_or(false) {
            Shape::Polygon(PolygonShape::new_box(0.5, 0.5))
        } else {
            Shape::Circle(CircleShape::new(Vec2::ZERO, 0.5))
        };
        world.create_fixture(body, &FixtureDef::new(shape)).unwrap();
    }

    let steps = (input.step_count as usize).min(64);
    for _ in 0..steps {
        world.step(1.0 / 60.0, 8, 3);
    }
});
