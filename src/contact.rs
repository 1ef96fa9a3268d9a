//! Contact
//!
//! An edge in the body-body graph representing a fixture pair that may
//! collide. The manifold generator for the pair's shape types is resolved
//! once at creation through a jump table, so the per-step collide pass
//! performs no type dispatch.
//!
//! Warm starting: when a manifold is regenerated, accumulated impulses are
//! carried over between points whose contact-feature ids match.
//!
//! Author: Moroya Sakamoto

use crate::body::{Body, BodyId, ContactId};
use crate::callbacks::ContactListener;
use crate::collide::{collide_circles, collide_polygon_circle, collide_polygons};
use crate::collide_edge::{collide_edge_circle, collide_edge_polygon};
use crate::collider::{Shape, ShapeType};
use crate::distance::{distance, DistanceInput, DistanceProxy, SimplexCache};
use crate::fixture::{Fixture, FixtureId};
use crate::manifold::Manifold;
use crate::math::{self, Transform};
use crate::pool::Pool;

// ============================================================================
// Dispatch table
// ============================================================================

/// Cached manifold generator: (shape A, child A, xf A, shape B, child B, xf B)
pub type EvaluateFn = fn(&Shape, usize, &Transform, &Shape, usize, &Transform) -> Manifold;

fn evaluate_circle_circle(
    a: &Shape,
    _ca: usize,
    xf_a: &Transform,
    b: &Shape,
    _cb: usize,
    xf_b: &Transform,
) -> Manifold {
    match (a, b) {
        (Shape::Circle(ca), Shape::Circle(cb)) => collide_circles(ca, xf_a, cb, xf_b),
        _ => unreachable!("dispatch table violated"),
    }
}

fn evaluate_polygon_circle(
    a: &Shape,
    _ca: usize,
    xf_a: &Transform,
    b: &Shape,
    _cb: usize,
    xf_b: &Transform,
) -> Manifold {
    match (a, b) {
        (Shape::Polygon(pa), Shape::Circle(cb)) => collide_polygon_circle(pa, xf_a, cb, xf_b),
        _ => unreachable!("dispatch table violated"),
    }
}

fn evaluate_polygon_polygon(
    a: &Shape,
    _ca: usize,
    xf_a: &Transform,
    b: &Shape,
    _cb: usize,
    xf_b: &Transform,
) -> Manifold {
    match (a, b) {
        (Shape::Polygon(pa), Shape::Polygon(pb)) => collide_polygons(pa, xf_a, pb, xf_b),
        _ => unreachable!("dispatch table violated"),
    }
}

fn evaluate_edge_circle(
    a: &Shape,
    _ca: usize,
    xf_a: &Transform,
    b: &Shape,
    _cb: usize,
    xf_b: &Transform,
) -> Manifold {
    match (a, b) {
        (Shape::Edge(ea), Shape::Circle(cb)) => collide_edge_circle(ea, xf_a, cb, xf_b),
        _ => unreachable!("dispatch table violated"),
    }
}

fn evaluate_edge_polygon(
    a: &Shape,
    _ca: usize,
    xf_a: &Transform,
    b: &Shape,
    _cb: usize,
    xf_b: &Transform,
) -> Manifold {
    match (a, b) {
        (Shape::Edge(ea), Shape::Polygon(pb)) => collide_edge_polygon(ea, xf_a, pb, xf_b),
        _ => unreachable!("dispatch table violated"),
    }
}

fn evaluate_chain_circle(
    a: &Shape,
    child_a: usize,
    xf_a: &Transform,
    b: &Shape,
    _cb: usize,
    xf_b: &Transform,
) -> Manifold {
    match (a, b) {
        (Shape::Chain(chain), Shape::Circle(cb)) => {
            let edge = chain.child_edge(child_a);
            collide_edge_circle(&edge, xf_a, cb, xf_b)
        }
        _ => unreachable!("dispatch table violated"),
    }
}

fn evaluate_chain_polygon(
    a: &Shape,
    child_a: usize,
    xf_a: &Transform,
    b: &Shape,
    _cb: usize,
    xf_b: &Transform,
) -> Manifold {
    match (a, b) {
        (Shape::Chain(chain), Shape::Polygon(pb)) => {
            let edge = chain.child_edge(child_a);
            collide_edge_polygon(&edge, xf_a, pb, xf_b)
        }
        _ => unreachable!("dispatch table violated"),
    }
}

/// The generator for a type pair, plus whether the fixtures must be swapped
/// so the reference shape lands in slot A. `None` for pairs that cannot
/// collide (two zero-area shapes).
pub fn dispatch(type_a: ShapeType, type_b: ShapeType) -> Option<(EvaluateFn, bool)> {
    use ShapeType::*;
    match (type_a, type_b) {
        (Circle, Circle) => Some((evaluate_circle_circle, false)),
        (Polygon, Circle) => Some((evaluate_polygon_circle, false)),
        (Circle, Polygon) => Some((evaluate_polygon_circle, true)),
        (Polygon, Polygon) => Some((evaluate_polygon_polygon, false)),
        (Edge, Circle) => Some((evaluate_edge_circle, false)),
        (Circle, Edge) => Some((evaluate_edge_circle, true)),
        (Edge, Polygon) => Some((evaluate_edge_polygon, false)),
        (Polygon, Edge) => Some((evaluate_edge_polygon, true)),
        (Chain, Circle) => Some((evaluate_chain_circle, false)),
        (Circle, Chain) => Some((evaluate_chain_circle, true)),
        (Chain, Polygon) => Some((evaluate_chain_polygon, false)),
        (Polygon, Chain) => Some((evaluate_chain_polygon, true)),
        // Edges and chains have no volume; they never collide together
        (Edge | Chain, Edge | Chain) => None,
    }
}

// ============================================================================
// Mixing rules
// ============================================================================

/// Geometric-mean friction: either surface being slick dominates
#[inline]
pub fn mix_friction(friction_a: f32, friction_b: f32) -> f32 {
    math::sqrt(friction_a * friction_b)
}

/// Maximum restitution: a ball bounces off concrete no matter the concrete
#[inline]
pub fn mix_restitution(restitution_a: f32, restitution_b: f32) -> f32 {
    restitution_a.max(restitution_b)
}

// ============================================================================
// Contact
// ============================================================================

/// A potential or actual collision between two fixtures
#[derive(Clone)]
pub struct Contact {
    /// First fixture (reference shape side)
    pub(crate) fixture_a: FixtureId,
    /// Second fixture
    pub(crate) fixture_b: FixtureId,
    /// Shape child of fixture A (chain edge index)
    pub(crate) child_a: usize,
    /// Shape child of fixture B
    pub(crate) child_b: usize,
    /// Cached owning bodies
    pub(crate) body_a: BodyId,
    /// Cached owning bodies
    pub(crate) body_b: BodyId,

    /// Current manifold
    pub manifold: Manifold,

    /// Cleared by `pre_solve` to skip a step's response
    pub(crate) enabled: bool,
    /// Manifold has points (or sensor overlap)
    pub(crate) touching: bool,
    /// Needs re-filtering before the next collide pass
    pub(crate) filter_pending: bool,

    /// Mixed friction coefficient
    pub(crate) friction: f32,
    /// Mixed restitution coefficient
    pub(crate) restitution: f32,
    /// Surface translation speed along the tangent (conveyor belts)
    pub(crate) tangent_speed: f32,

    /// TOI cache for the continuous pass
    pub(crate) toi: f32,
    pub(crate) toi_valid: bool,
    /// Times this contact participated in TOI sub-stepping this step
    pub(crate) toi_count: u32,

    /// Island assembly bookkeeping
    pub(crate) island_flag: bool,

    /// Cached manifold generator
    evaluate_fn: EvaluateFn,
}

impl Contact {
    /// Create a contact for a fixture pair, swapping so the dispatch table's
    /// reference shape is fixture A. Returns `None` for shape pairs that can
    /// never collide.
    pub(crate) fn new(
        fixture_a: FixtureId,
        child_a: usize,
        fixture_b: FixtureId,
        child_b: usize,
        fixtures: &Pool<Fixture>,
    ) -> Option<Self> {
        let fa = &fixtures[fixture_a];
        let fb = &fixtures[fixture_b];

        let type_a = fa.shape.shape_type();
        let type_b = fb.shape.shape_type();
        let (evaluate_fn, swap) = dispatch(type_a, type_b)?;

        let (fixture_a, child_a, fa, fixture_b, child_b, fb) = if swap {
            (fixture_b, child_b, fb, fixture_a, child_a, fa)
        } else {
            (fixture_a, child_a, fa, fixture_b, child_b, fb)
        };

        Some(Self {
            fixture_a,
            fixture_b,
            child_a,
            child_b,
            body_a: fa.body(),
            body_b: fb.body(),
            manifold: Manifold::default(),
            enabled: true,
            touching: false,
            filter_pending: false,
            friction: mix_friction(fa.friction, fb.friction),
            restitution: mix_restitution(fa.restitution, fb.restitution),
            tangent_speed: 0.0,
            toi: 0.0,
            toi_valid: false,
            toi_count: 0,
            island_flag: false,
            evaluate_fn,
        })
    }

    /// First fixture
    #[inline]
    pub fn fixture_a(&self) -> FixtureId {
        self.fixture_a
    }

    /// Second fixture
    #[inline]
    pub fn fixture_b(&self) -> FixtureId {
        self.fixture_b
    }

    /// Chain child index on fixture A
    #[inline]
    pub fn child_a(&self) -> usize {
        self.child_a
    }

    /// Chain child index on fixture B
    #[inline]
    pub fn child_b(&self) -> usize {
        self.child_b
    }

    /// Body owning fixture A
    #[inline]
    pub fn body_a(&self) -> BodyId {
        self.body_a
    }

    /// Body owning fixture B
    #[inline]
    pub fn body_b(&self) -> BodyId {
        self.body_b
    }

    /// Are the fixtures touching?
    #[inline]
    pub fn is_touching(&self) -> bool {
        self.touching
    }

    /// Is the contact participating in the solver this step?
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Mixed friction
    #[inline]
    pub fn friction(&self) -> f32 {
        self.friction
    }

    /// Override the mixed friction until the fixtures change
    #[inline]
    pub fn set_friction(&mut self, friction: f32) {
        self.friction = friction;
    }

    /// Mixed restitution
    #[inline]
    pub fn restitution(&self) -> f32 {
        self.restitution
    }

    /// Override the mixed restitution until the fixtures change
    #[inline]
    pub fn set_restitution(&mut self, restitution: f32) {
        self.restitution = restitution;
    }

    /// Surface speed along the tangent (conveyor belts)
    #[inline]
    pub fn set_tangent_speed(&mut self, speed: f32) {
        self.tangent_speed = speed;
    }

    /// Schedule re-filtering of this contact
    #[inline]
    pub fn flag_for_filtering(&mut self) {
        self.filter_pending = true;
    }

    /// Run the cached manifold generator
    pub(crate) fn evaluate(
        &self,
        shape_a: &Shape,
        xf_a: &Transform,
        shape_b: &Shape,
        xf_b: &Transform,
    ) -> Manifold {
        (self.evaluate_fn)(shape_a, self.child_a, xf_a, shape_b, self.child_b, xf_b)
    }

    /// Regenerate the manifold, carry over warm-start impulses, flip the
    /// touching state, and fire the listener hooks.
    pub(crate) fn update(
        &mut self,
        fixtures: &Pool<Fixture>,
        bodies: &mut Pool<Body>,
        listener: &mut dyn ContactListener,
    ) {
        let old_manifold = self.manifold;

        // Re-enabled each step; pre_solve may veto below
        self.enabled = true;

        let was_touching = self.touching;

        let fixture_a = &fixtures[self.fixture_a];
        let fixture_b = &fixtures[self.fixture_b];
        let sensor = fixture_a.is_sensor() || fixture_b.is_sensor();

        let xf_a = bodies[self.body_a].transform();
        let xf_b = bodies[self.body_b].transform();

        let touching;
        if sensor {
            // Sensors report overlap without manifold points
            touching = test_overlap(
                &fixture_a.shape,
                self.child_a,
                &xf_a,
                &fixture_b.shape,
                self.child_b,
                &xf_b,
            );
            self.manifold.point_count = 0;
        } else {
            self.manifold = self.evaluate(&fixture_a.shape, &xf_a, &fixture_b.shape, &xf_b);
            touching = self.manifold.point_count > 0;

            // Match old impulses to new points by feature id
            for i in 0..self.manifold.point_count {
                let new_point = &mut self.manifold.points[i];
                new_point.normal_impulse = 0.0;
                new_point.tangent_impulse = 0.0;
                for j in 0..old_manifold.point_count {
                    let old_point = &old_manifold.points[j];
                    if old_point.id == new_point.id {
                        new_point.normal_impulse = old_point.normal_impulse;
                        new_point.tangent_impulse = old_point.tangent_impulse;
                        break;
                    }
                }
            }

            if touching != was_touching {
                bodies[self.body_a].set_awake(true);
                bodies[self.body_b].set_awake(true);
            }
        }

        self.touching = touching;

        if !was_touching && touching {
            listener.begin_contact(self);
        }
        if was_touching && !touching {
            listener.end_contact(self);
        }
        if !sensor && touching {
            self.enabled = listener.pre_solve(self, &old_manifold);
        }
    }
}

/// Overlap test via GJK distance, used for sensor contacts
pub(crate) fn test_overlap(
    shape_a: &Shape,
    child_a: usize,
    xf_a: &Transform,
    shape_b: &Shape,
    child_b: usize,
    xf_b: &Transform,
) -> bool {
    let input = DistanceInput {
        proxy_a: DistanceProxy::from_shape(shape_a, child_a),
        proxy_b: DistanceProxy::from_shape(shape_b, child_b),
        transform_a: *xf_a,
        transform_b: *xf_b,
        use_radii: true,
    };
    let mut cache = SimplexCache::default();
    let output = distance(&mut cache, &input);
    output.distance < 10.0 * f32::EPSILON
}

/// Convenience handle pairing used by the manager
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ContactKey {
    pub fixture_a: FixtureId,
    pub child_a: usize,
    pub fixture_b: FixtureId,
    pub child_b: usize,
}

impl Contact {
    /// Whether this contact connects the given fixture/child pair in either
    /// order
    pub(crate) fn matches(&self, key: &ContactKey) -> bool {
        (self.fixture_a == key.fixture_a
            && self.fixture_b == key.fixture_b
            && self.child_a == key.child_a
            && self.child_b == key.child_b)
            || (self.fixture_a == key.fixture_b
                && self.fixture_b == key.fixture_a
                && self.child_a == key.child_b
                && self.child_b == key.child_a)
    }
}

/// Pool-handle alias used throughout the solver
pub type ContactHandle = ContactId;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circle::CircleShape;
    use crate::fixture::FixtureDef;
    use crate::math::Vec2;
    use crate::polygon::PolygonShape;

    fn fixture_pool() -> Pool<Fixture> {
        let mut pool = Pool::new();
        let circle = FixtureDef::new(Shape::Circle(CircleShape::new(Vec2::ZERO, 1.0)));
        let poly = FixtureDef::new(Shape::Polygon(PolygonShape::new_box(1.0, 1.0)));
        let edge = FixtureDef::new(Shape::Edge(crate::edge::EdgeShape::two_sided(
            Vec2::new(-1.0, 0.0),
            Vec2::new(1.0, 0.0),
        )));
        pool.insert(Fixture::from_def(0, &circle)); // id 0
        pool.insert(Fixture::from_def(1, &poly)); // id 1
        pool.insert(Fixture::from_def(2, &edge)); // id 2
        pool
    }

    #[test]
    fn test_dispatch_normalizes_order() {
        let fixtures = fixture_pool();

        // circle (0) vs polygon (1): polygon must land in slot A
        let contact = Contact::new(0, 0, 1, 0, &fixtures).unwrap();
        assert_eq!(contact.fixture_a(), 1);
        assert_eq!(contact.fixture_b(), 0);

        // polygon (1) vs circle (0): unchanged
        let contact = Contact::new(1, 0, 0, 0, &fixtures).unwrap();
        assert_eq!(contact.fixture_a(), 1);
    }

    #[test]
    fn test_edge_edge_rejected() {
        let mut fixtures = fixture_pool();
        let edge2 = FixtureDef::new(Shape::Edge(crate::edge::EdgeShape::two_sided(
            Vec2::new(0.0, -1.0),
            Vec2::new(0.0, 1.0),
        )));
        let e2 = fixtures.insert(Fixture::from_def(3, &edge2));
        assert!(Contact::new(2, 0, e2, 0, &fixtures).is_none());
    }

    #[test]
    fn test_mixing_rules() {
        assert_eq!(mix_friction(0.0, 1.0), 0.0);
        assert!((mix_friction(0.5, 0.5) - 0.5).abs() < 1e-6);
        assert_eq!(mix_restitution(0.2, 0.9), 0.9);
    }

    #[test]
    fn test_contact_key_matches_either_order() {
        let fixtures = fixture_pool();
        let contact = Contact::new(1, 0, 0, 0, &fixtures).unwrap();
        let key = ContactKey {
            fixture_a: 0,
            child_a: 0,
            fixture_b: 1,
            child_b: 0,
        };
        assert!(contact.matches(&key));

        let other = ContactKey {
            fixture_a: 0,
            child_a: 1,
            fixture_b: 1,
            child_b: 0,
        };
        assert!(!contact.matches(&other));
    }

    #[test]
    fn test_overlap_helper() {
        let a = Shape::Circle(CircleShape::new(Vec2::ZERO, 1.0));
        let b = Shape::Circle(CircleShape::new(Vec2::ZERO, 1.0));
        let xf_a = Transform::IDENTITY;
        let near = Transform::new(Vec2::new(1.5, 0.0), 0.0);
        let far = Transform::new(Vec2::new(5.0, 0.0), 0.0);
        assert!(test_overlap(&a, 0, &xf_a, &b, 0, &near));
        assert!(!test_overlap(&a, 0, &xf_a, &b, 0, &far));
    }
}
