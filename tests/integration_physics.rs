//! Integration tests for ALICE-Physics-2D
//!
//! End-to-end scenarios against the public API: resting stacks, restitution,
//! continuous collision, filtering truth tables, broad-phase soundness, and
//! the determinism guarantee.

use alice_physics_2d::prelude::*;
use alice_physics_2d::{
    tuning, CircleShape, DebugDrawData, DebugDrawFlags, DeterministicRng, DynamicTree,
    EdgeShape, PolygonShape, RayCastInput, Shape, Vec2,
};

// ============================================================================
// Helpers
// ============================================================================

const DT: f32 = 1.0 / 60.0;

fn run_world(world: &mut World, steps: usize) {
    for _ in 0..steps {
        world.step(DT, 8, 3);
    }
}

fn ground_edge_world() -> World {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    let ground = world.create_body(&BodyDef::static_at(Vec2::ZERO)).unwrap();
    let edge = EdgeShape::two_sided(Vec2::new(-40.0, 0.0), Vec2::new(40.0, 0.0));
    world
        .create_fixture(ground, &FixtureDef::new(Shape::Edge(edge)))
        .unwrap();
    world
}

fn add_box(world: &mut World, position: Vec2, half: f32) -> BodyId {
    let body = world.create_body(&BodyDef::dynamic_at(position)).unwrap();
    world
        .create_fixture(
            body,
            &FixtureDef::new(Shape::Polygon(PolygonShape::new_box(half, half))),
        )
        .unwrap();
    body
}

// ============================================================================
// Test 1 — Gravity drop
// ============================================================================

/// A 1×1 box dropped from y = 10 onto a wide ground edge must come to rest
/// with its center half a unit (plus at most a slop band) above the ground.
#[test]
fn test_gravity_drop_comes_to_rest() {
    let mut world = ground_edge_world();
    let body = add_box(&mut world, Vec2::new(0.0, 10.0), 0.5);

    run_world(&mut world, 180);

    let b = world.body(body).unwrap();
    let y = b.position().y;
    assert!(
        (0.5..=0.55).contains(&y),
        "box should rest at y ≈ 0.5, got {y}"
    );
    assert!(
        b.linear_velocity().length() < 0.01,
        "box should be at rest, |v| = {}",
        b.linear_velocity().length()
    );
}

// ============================================================================
// Test 2 — Restitution
// ============================================================================

/// A perfectly bouncy ball must return close to its drop height after the
/// first bounce.
#[test]
fn test_restitution_preserves_bounce_height() {
    let mut world = ground_edge_world();
    let ball = world
        .create_body(&BodyDef::dynamic_at(Vec2::new(0.0, 10.0)))
        .unwrap();
    world
        .create_fixture(
            ball,
            &FixtureDef::new(Shape::Circle(CircleShape::new(Vec2::ZERO, 1.0)))
                .with_restitution(1.0)
                .with_friction(0.0),
        )
        .unwrap();

    // Fall until the bounce (velocity flips from down to up), then track the
    // peak of the rebound.
    let mut bounced = false;
    let mut peak = 0.0_f32;
    for _ in 0..600 {
        let vy_before = world.body(ball).unwrap().linear_velocity().y;
        world.step(DT, 8, 3);
        let b = world.body(ball).unwrap();
        if !bounced && vy_before < 0.0 && b.linear_velocity().y > 0.0 {
            bounced = true;
        }
        if bounced {
            peak = peak.max(b.position().y);
            if b.linear_velocity().y < 0.0 {
                break; // past the rebound apex
            }
        }
    }

    assert!(bounced, "ball never bounced");
    assert!(
        peak >= 9.6,
        "rebound should preserve nearly all energy, peak = {peak}"
    );
}

// ============================================================================
// Test 3 — Resting stack sleeps
// ============================================================================

/// Three stacked boxes settle, fall asleep, and stay vertically ordered
/// with only slop-sized gaps.
#[test]
fn test_resting_stack_sleeps() {
    let mut world = ground_edge_world();
    let bottom = add_box(&mut world, Vec2::new(0.0, 0.5), 0.5);
    let middle = add_box(&mut world, Vec2::new(0.0, 1.5), 0.5);
    let top = add_box(&mut world, Vec2::new(0.0, 2.5), 0.5);

    run_world(&mut world, 300);

    for &id in &[bottom, middle, top] {
        let b = world.body(id).unwrap();
        assert!(
            b.linear_velocity().length() < tuning::LINEAR_SLEEP_TOLERANCE,
            "stacked box still moving: |v| = {}",
            b.linear_velocity().length()
        );
        assert!(!b.is_awake(), "stacked box should be asleep");
    }

    let y0 = world.body(bottom).unwrap().position().y;
    let y1 = world.body(middle).unwrap().position().y;
    let y2 = world.body(top).unwrap().position().y;
    assert!(y0 < y1 && y1 < y2, "stack order broken: {y0} {y1} {y2}");

    // Center spacing stays within the skin-radius band: the hull gap is at
    // most the two polygon radii, less up to a slop of solver overlap
    for (lower, upper) in [(y0, y1), (y1, y2)] {
        let gap = upper - lower - 1.0;
        assert!(
            (-2.0 * tuning::LINEAR_SLOP..=2.0 * tuning::POLYGON_RADIUS + 1e-3).contains(&gap),
            "stack gap out of band: {gap}"
        );
    }
}

// ============================================================================
// Test 4 — Bullet does not tunnel
// ============================================================================

/// A bullet crossing half the wall distance per step must be stopped by the
/// TOI pass instead of passing through a thin wall.
#[test]
fn test_bullet_stops_at_thin_wall() {
    let wall_x = 5.0;
    let mut world = World::new(Vec2::ZERO);

    let wall = world.create_body(&BodyDef::static_at(Vec2::ZERO)).unwrap();
    let edge = EdgeShape::two_sided(Vec2::new(wall_x, -5.0), Vec2::new(wall_x, 5.0));
    world
        .create_fixture(wall, &FixtureDef::new(Shape::Edge(edge)))
        .unwrap();

    let mut def = BodyDef::dynamic_at(Vec2::new(wall_x - 0.5, 0.0));
    def.bullet = true;
    def.linear_velocity = Vec2::new(1000.0, 0.0);
    let bullet = world.create_body(&def).unwrap();
    world
        .create_fixture(
            bullet,
            &FixtureDef::new(Shape::Polygon(PolygonShape::new_box(0.1, 0.1))),
        )
        .unwrap();

    // One step covers ~16 units without CCD
    world.step(DT, 8, 3);

    let x = world.body(bullet).unwrap().position().x;
    assert!(
        x > wall_x - 1.0 && x <= wall_x,
        "bullet should stop at the wall, x = {x}"
    );
}

/// A fast non-bullet body passes straight through a thin *dynamic* wall:
/// continuous collision between two dynamic bodies is reserved for bullets.
#[test]
fn test_non_bullet_tunnels_through_dynamic_wall() {
    let wall_x = 5.0;
    let mut world = World::new(Vec2::ZERO);

    let wall = world
        .create_body(&BodyDef::dynamic_at(Vec2::new(wall_x, 0.0)))
        .unwrap();
    world
        .create_fixture(
            wall,
            &FixtureDef::new(Shape::Polygon(PolygonShape::new_box(0.05, 5.0))),
        )
        .unwrap();

    let mut def = BodyDef::dynamic_at(Vec2::new(wall_x - 0.5, 0.0));
    def.linear_velocity = Vec2::new(1000.0, 0.0);
    let body = world.create_body(&def).unwrap();
    world
        .create_fixture(
            body,
            &FixtureDef::new(Shape::Polygon(PolygonShape::new_box(0.1, 0.1))),
        )
        .unwrap();

    world.step(DT, 8, 3);

    // Discrete stepping alone cannot see the thin wall
    assert!(world.body(body).unwrap().position().x > wall_x);
}

// ============================================================================
// Test 5 — Collision filtering truth table
// ============================================================================

/// Exercise the group/category/mask rules over overlapping fixture pairs.
#[test]
fn test_collision_filter_truth_table() {
    struct Row {
        filter_a: Filter,
        filter_b: Filter,
        expect_touching: bool,
    }

    let rows = [
        // Same negative group: never collide, masks irrelevant
        Row {
            filter_a: Filter::new(0xFFFF, 0xFFFF).with_group(-1),
            filter_b: Filter::new(0xFFFF, 0xFFFF).with_group(-1),
            expect_touching: false,
        },
        // Same positive group: always collide, masks irrelevant
        Row {
            filter_a: Filter::new(0x0001, 0x0000).with_group(1),
            filter_b: Filter::new(0x0002, 0x0000).with_group(1),
            expect_touching: true,
        },
        // No group, masks accept both directions
        Row {
            filter_a: Filter::new(0x0001, 0x0002),
            filter_b: Filter::new(0x0002, 0x0001),
            expect_touching: true,
        },
        // No group, A's mask rejects B
        Row {
            filter_a: Filter::new(0x0001, 0x0004),
            filter_b: Filter::new(0x0002, 0x0001),
            expect_touching: false,
        },
        // No group, B's mask rejects A
        Row {
            filter_a: Filter::new(0x0001, 0x0002),
            filter_b: Filter::new(0x0002, 0x0004),
            expect_touching: false,
        },
    ];

    for (i, row) in rows.iter().enumerate() {
        let mut world = World::new(Vec2::ZERO);

        let body_a = world.create_body(&BodyDef::dynamic_at(Vec2::ZERO)).unwrap();
        let fixture_a = world
            .create_fixture(
                body_a,
                &FixtureDef::new(Shape::Circle(CircleShape::new(Vec2::ZERO, 1.0)))
                    .with_filter(row.filter_a),
            )
            .unwrap();

        let body_b = world
            .create_body(&BodyDef::dynamic_at(Vec2::new(0.5, 0.0)))
            .unwrap();
        let fixture_b = world
            .create_fixture(
                body_b,
                &FixtureDef::new(Shape::Circle(CircleShape::new(Vec2::ZERO, 1.0)))
                    .with_filter(row.filter_b),
            )
            .unwrap();

        world.step(DT, 8, 3);

        assert_eq!(
            world.fixtures_touching(fixture_a, fixture_b),
            row.expect_touching,
            "filter truth table row {i} failed"
        );
    }
}

// ============================================================================
// Test 6 — Dynamic tree ray cast vs brute force
// ============================================================================

/// 1000 random unit boxes: tree ray-cast hit set must match a brute-force
/// scan, and closest-hit filtering must return the nearest box.
#[test]
fn test_tree_ray_cast_matches_brute_force() {
    let mut rng = DeterministicRng::new(0xA11CE);
    let mut tree = DynamicTree::new();
    let mut proxies = Vec::new();

    for i in 0..1000u32 {
        let p = rng.next_point(0.0, 100.0);
        let aabb = alice_physics_2d::Aabb::new(p, p + Vec2::new(1.0, 1.0));
        proxies.push(tree.create_proxy(aabb, i));
    }

    let input = RayCastInput {
        p1: Vec2::new(-1.0, 50.0),
        p2: Vec2::new(200.0, 50.0),
        max_fraction: 1.0,
    };

    // Collect every proxy the traversal offers without shortening
    let mut tree_hits = Vec::new();
    tree.ray_cast(&input, |_, proxy| {
        tree_hits.push(tree.user_data(proxy));
        1.0
    });
    tree_hits.sort_unstable();

    // Brute force over the stored (fat) AABBs
    let mut brute_hits = Vec::new();
    for &proxy in &proxies {
        if tree.fat_aabb(proxy).ray_cast(&input) {
            brute_hits.push(tree.user_data(proxy));
        }
    }
    brute_hits.sort_unstable();

    assert_eq!(tree_hits, brute_hits, "ray-cast hit sets differ");
    assert!(!tree_hits.is_empty(), "a 200-unit ray should hit something");

    // Closest-hit search: shorten the ray at each hit's near face
    let mut closest: Option<(u32, f32)> = None;
    tree.ray_cast(&input, |sub, proxy| {
        let aabb = tree.fat_aabb(proxy);
        let t = (aabb.min.x - sub.p1.x) / (sub.p2.x - sub.p1.x);
        let t = t.clamp(0.0, sub.max_fraction);
        if closest.is_none() || t < closest.unwrap().1 {
            closest = Some((tree.user_data(proxy), t));
        }
        t
    });

    let brute_closest = brute_hits
        .iter()
        .map(|&ud| {
            let proxy = proxies[ud as usize];
            let aabb = tree.fat_aabb(proxy);
            (ud, (aabb.min.x - input.p1.x) / (input.p2.x - input.p1.x))
        })
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
        .unwrap();

    assert_eq!(
        closest.unwrap().0,
        brute_closest.0,
        "closest-hit mismatch"
    );
}

// ============================================================================
// Test 7 — Broad-phase soundness
// ============================================================================

/// Every overlapping proxy pair must be reported (no false negatives).
#[test]
fn test_broad_phase_reports_all_overlaps() {
    use alice_physics_2d::{Aabb, BroadPhase};

    let mut rng = DeterministicRng::new(77);
    let mut bp = BroadPhase::new();
    let mut boxes = Vec::new();

    for i in 0..200u32 {
        let p = rng.next_point(0.0, 40.0);
        let aabb = Aabb::new(p, p + Vec2::new(2.0, 2.0));
        bp.create_proxy(aabb, i);
        boxes.push(aabb);
    }

    let mut pairs = Vec::new();
    bp.update_pairs(|a, b| {
        pairs.push(if a < b { (a, b) } else { (b, a) });
    });
    pairs.sort_unstable();

    // Tight-AABB overlaps are a subset of fat-AABB overlaps, so every
    // brute-force overlap must be present
    for i in 0..boxes.len() {
        for j in i + 1..boxes.len() {
            if boxes[i].intersects(&boxes[j]) {
                assert!(
                    pairs.binary_search(&(i as u32, j as u32)).is_ok(),
                    "missing overlap pair ({i}, {j})"
                );
            }
        }
    }
}

// ============================================================================
// Test 8 — Determinism
// ============================================================================

/// Two identical worlds stepped identically must produce bit-identical
/// transforms.
#[test]
fn test_determinism_bit_identical() {
    fn build_and_run() -> Vec<(u32, u32, u32)> {
        let mut world = ground_edge_world();
        let mut rng = DeterministicRng::new(0xD0D0);

        let mut bodies = Vec::new();
        for _ in 0..20 {
            let p = Vec2::new(rng.next_range(-5.0, 5.0), rng.next_range(1.0, 15.0));
            bodies.push(add_box(&mut world, p, 0.5));
        }

        run_world(&mut world, 120);

        bodies
            .iter()
            .map(|&id| {
                let b = world.body(id).unwrap();
                (
                    b.position().x.to_bits(),
                    b.position().y.to_bits(),
                    b.angle().to_bits(),
                )
            })
            .collect()
    }

    let run1 = build_and_run();
    let run2 = build_and_run();
    assert_eq!(run1, run2, "simulation must be bit-identical across runs");
}

// ============================================================================
// Test 9 — Touching manifolds stay within the slop band
// ============================================================================

/// After stepping, every touching manifold's separations sit inside a few
/// linear slops of the surface.
#[test]
fn test_touching_manifold_separation_bound() {
    let mut world = ground_edge_world();
    for i in 0..3 {
        add_box(&mut world, Vec2::new(i as f32 * 1.5 - 1.5, 0.5), 0.5);
    }

    run_world(&mut world, 120);

    let mut touching = 0;
    for contact_id in world.contact_ids() {
        let contact = world.contact(contact_id).unwrap();
        if !contact.is_touching() {
            continue;
        }
        touching += 1;

        assert!(
            contact.manifold.point_count >= 1 && contact.manifold.point_count <= 2,
            "touching manifold must have 1 or 2 points"
        );

        let fixture_a = world.fixture(contact.fixture_a()).unwrap();
        let fixture_b = world.fixture(contact.fixture_b()).unwrap();
        let xf_a = world.body(contact.body_a()).unwrap().transform();
        let xf_b = world.body(contact.body_b()).unwrap().transform();
        let wm = alice_physics_2d::WorldManifold::new(
            &contact.manifold,
            &xf_a,
            fixture_a.shape.radius(),
            &xf_b,
            fixture_b.shape.radius(),
        );

        for i in 0..contact.manifold.point_count {
            let separation = wm.separations[i];
            assert!(
                separation <= 2.0 * tuning::LINEAR_SLOP
                    && separation >= -4.0 * tuning::LINEAR_SLOP,
                "separation out of band: {separation}"
            );
        }
    }

    assert!(touching >= 3, "boxes should rest on the ground");
}

// ============================================================================
// Test 10 — Energy bound without gravity
// ============================================================================

/// With gravity off and no restitution, a collision must not add kinetic
/// energy beyond solver slack.
#[test]
fn test_collision_does_not_add_energy() {
    let mut world = World::new(Vec2::ZERO);

    let mut def_a = BodyDef::dynamic_at(Vec2::new(-2.0, 0.0));
    def_a.linear_velocity = Vec2::new(5.0, 0.0);
    let a = world.create_body(&def_a).unwrap();
    world
        .create_fixture(
            a,
            &FixtureDef::new(Shape::Circle(CircleShape::new(Vec2::ZERO, 0.5)))
                .with_restitution(0.0),
        )
        .unwrap();

    let mut def_b = BodyDef::dynamic_at(Vec2::new(2.0, 0.0));
    def_b.linear_velocity = Vec2::new(-5.0, 0.0);
    let b = world.create_body(&def_b).unwrap();
    world
        .create_fixture(
            b,
            &FixtureDef::new(Shape::Circle(CircleShape::new(Vec2::ZERO, 0.5)))
                .with_restitution(0.0),
        )
        .unwrap();

    let kinetic_energy = |world: &World| -> f32 {
        [a, b]
            .iter()
            .map(|&id| {
                let body = world.body(id).unwrap();
                let v = body.linear_velocity().length_squared();
                let w = body.angular_velocity();
                0.5 * body.mass() * v + 0.5 * body.inertia() * w * w
            })
            .sum()
    };

    let initial = kinetic_energy(&world);
    for _ in 0..120 {
        let before = kinetic_energy(&world);
        world.step(DT, 8, 3);
        let after = kinetic_energy(&world);
        // Position correction may add a little energy; bound the slack
        assert!(
            after <= before * 1.02 + 1e-3,
            "energy grew in one step: {before} -> {after}"
        );
    }
    assert!(kinetic_energy(&world) <= initial * 1.02);
}

// ============================================================================
// Test 11 — Sensors report without response
// ============================================================================

#[test]
fn test_sensor_detects_but_does_not_block() {
    let mut world = ground_edge_world();

    // Sensor region above the ground
    let sensor_body = world
        .create_body(&BodyDef::static_at(Vec2::new(0.0, 2.0)))
        .unwrap();
    let sensor = world
        .create_fixture(
            sensor_body,
            &FixtureDef::new(Shape::Polygon(PolygonShape::new_box(1.0, 1.0))).sensor(),
        )
        .unwrap();

    let ball = world
        .create_body(&BodyDef::dynamic_at(Vec2::new(0.0, 6.0)))
        .unwrap();
    let ball_fixture = world
        .create_fixture(
            ball,
            &FixtureDef::new(Shape::Circle(CircleShape::new(Vec2::ZERO, 0.4))),
        )
        .unwrap();

    let mut seen_overlap = false;
    for _ in 0..300 {
        world.step(DT, 8, 3);
        if world.fixtures_touching(sensor, ball_fixture) {
            seen_overlap = true;
        }
    }

    assert!(seen_overlap, "ball should pass through the sensor region");
    // The sensor produced no response: the ball fell through to the ground
    let y = world.body(ball).unwrap().position().y;
    assert!(y < 1.0, "sensor must not block the ball, y = {y}");
}

// ============================================================================
// Test 12 — Revolute pendulum keeps its anchor distance
// ============================================================================

#[test]
fn test_revolute_pendulum() {
    let mut world = World::new(Vec2::new(0.0, -10.0));

    let pivot_body = world.create_body(&BodyDef::static_at(Vec2::ZERO)).unwrap();
    let bob = world
        .create_body(&BodyDef::dynamic_at(Vec2::new(3.0, 0.0)))
        .unwrap();
    world
        .create_fixture(
            bob,
            &FixtureDef::new(Shape::Circle(CircleShape::new(Vec2::ZERO, 0.3))),
        )
        .unwrap();

    let def = RevoluteJointDef::new(
        pivot_body,
        bob,
        &world.body(pivot_body).unwrap().transform(),
        &world.body(bob).unwrap().transform(),
        Vec2::ZERO,
    );
    world.create_joint(&JointDef::Revolute(def)).unwrap();

    // The bob must swing through the bottom of its arc while the arm length
    // never drifts
    let mut min_y = f32::MAX;
    let mut max_arm_error = 0.0_f32;
    for _ in 0..240 {
        world.step(DT, 8, 3);
        let p = world.body(bob).unwrap().position();
        min_y = min_y.min(p.y);
        max_arm_error = max_arm_error.max((p.length() - 3.0).abs());
    }

    assert!(max_arm_error < 0.05, "pendulum arm drifted by {max_arm_error}");
    assert!(min_y < -2.0, "pendulum never swung down, min_y = {min_y}");
}

// ============================================================================
// Test 13 — Chain terrain carries a rolling ball
// ============================================================================

#[test]
fn test_chain_terrain_supports_body() {
    let mut world = World::new(Vec2::new(0.0, -10.0));

    let terrain = world.create_body(&BodyDef::static_at(Vec2::ZERO)).unwrap();
    // Walked right-to-left so the one-sided normals face up
    let points = [
        Vec2::new(10.0, 0.0),
        Vec2::new(3.0, 0.0),
        Vec2::new(0.0, -0.5),
        Vec2::new(-3.0, 0.0),
        Vec2::new(-10.0, 0.0),
    ];
    let chain = ChainShape::new_chain(
        &points,
        Vec2::new(11.0, 0.0),
        Vec2::new(-11.0, 0.0),
    )
    .unwrap();
    world
        .create_fixture(terrain, &FixtureDef::new(Shape::Chain(chain)))
        .unwrap();

    let ball = world
        .create_body(&BodyDef::dynamic_at(Vec2::new(-2.0, 2.0)))
        .unwrap();
    world
        .create_fixture(
            ball,
            &FixtureDef::new(Shape::Circle(CircleShape::new(Vec2::ZERO, 0.4)))
                .with_friction(0.1),
        )
        .unwrap();

    run_world(&mut world, 600);

    let p = world.body(ball).unwrap().position();
    // Settled in the valley, not fallen through
    assert!(p.y > -0.6, "ball fell through the chain, y = {}", p.y);
    assert!(p.y < 1.0, "ball should settle into the dip, y = {}", p.y);
}

// ============================================================================
// Test 14 — Debug draw produces data after a step
// ============================================================================

#[test]
fn test_debug_draw_full_flags() {
    let mut world = ground_edge_world();
    add_box(&mut world, Vec2::new(0.0, 0.5), 0.5);
    run_world(&mut world, 30);

    let mut data = DebugDrawData::new();
    let flags = DebugDrawFlags {
        shapes: true,
        joints: true,
        aabbs: true,
        contacts: true,
        transforms: true,
    };
    world.debug_draw(&mut data, flags);

    assert!(!data.segments.is_empty());
    assert!(!data.points.is_empty(), "resting contact should be drawn");
}
