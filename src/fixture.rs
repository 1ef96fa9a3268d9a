//! Fixture
//!
//! Attaches a shape to a body with surface material (friction, restitution),
//! density, a collision filter, and a sensor flag. Each shape child owns one
//! broad-phase proxy; the world keeps the proxies synchronized as the body
//! moves.

use crate::body::BodyId;
use crate::collider::{Aabb, Shape};
use crate::filter::Filter;
use crate::math::{Transform, Vec2};

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Handle of a fixture in the world pool
pub type FixtureId = u32;

/// Construction parameters for a fixture
#[derive(Clone, Debug)]
pub struct FixtureDef {
    /// The collision shape (cloned into the fixture)
    pub shape: Shape,
    /// Mass per square meter
    pub density: f32,
    /// Coulomb friction coefficient
    pub friction: f32,
    /// Bounce coefficient in [0, 1]
    pub restitution: f32,
    /// Sensors detect overlap but produce no collision response
    pub is_sensor: bool,
    /// Collision filter
    pub filter: Filter,
    /// Opaque user tag
    pub user_data: u64,
}

impl FixtureDef {
    /// Definition with the usual defaults (density 1, friction 0.2)
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            density: 1.0,
            friction: 0.2,
            restitution: 0.0,
            is_sensor: false,
            filter: Filter::DEFAULT,
            user_data: 0,
        }
    }

    /// Set density
    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    /// Set friction
    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    /// Set restitution
    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    /// Set the collision filter
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Mark as sensor
    pub fn sensor(mut self) -> Self {
        self.is_sensor = true;
        self
    }
}

/// One broad-phase proxy of a fixture (one per shape child)
#[derive(Clone, Copy, Debug)]
pub struct FixtureProxy {
    /// The fixture
    pub fixture: FixtureId,
    /// Which shape child this proxy covers
    pub child_index: usize,
    /// Tree proxy handle
    pub tree_proxy: u32,
    /// Tight AABB at the last synchronization
    pub aabb: Aabb,
}

/// A shape attached to a body
#[derive(Clone, Debug)]
pub struct Fixture {
    /// Owning body
    pub(crate) body: BodyId,
    /// The collision shape
    pub shape: Shape,
    /// Mass per square meter
    pub(crate) density: f32,
    /// Coulomb friction coefficient
    pub friction: f32,
    /// Bounce coefficient
    pub restitution: f32,
    /// Sensors detect overlap but produce no response
    pub(crate) is_sensor: bool,
    /// Collision filter
    pub filter: Filter,
    /// Proxy-record indices in the contact manager, one per child
    pub(crate) proxy_ids: Vec<u32>,
    /// Opaque user tag
    pub user_data: u64,
}

impl Fixture {
    /// Build a fixture from a definition
    pub(crate) fn from_def(body: BodyId, def: &FixtureDef) -> Self {
        debug_assert!(def.density >= 0.0);
        debug_assert!(def.friction >= 0.0);
        Self {
            body,
            shape: def.shape.clone(),
            density: def.density,
            friction: def.friction,
            restitution: def.restitution,
            is_sensor: def.is_sensor,
            filter: def.filter,
            proxy_ids: Vec::new(),
            user_data: def.user_data,
        }
    }

    /// Owning body
    #[inline]
    pub fn body(&self) -> BodyId {
        self.body
    }

    /// Is this fixture a sensor?
    #[inline]
    pub fn is_sensor(&self) -> bool {
        self.is_sensor
    }

    /// Mass density
    #[inline]
    pub fn density(&self) -> f32 {
        self.density
    }

    /// World-space point containment test
    pub fn test_point(&self, xf: &Transform, p: Vec2) -> bool {
        self.shape.test_point(xf, p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circle::CircleShape;
    use crate::polygon::PolygonShape;

    #[test]
    fn test_def_builder() {
        let def = FixtureDef::new(Shape::Circle(CircleShape::new(Vec2::ZERO, 1.0)))
            .with_density(2.5)
            .with_friction(0.7)
            .with_restitution(0.3)
            .sensor();
        assert_eq!(def.density, 2.5);
        assert_eq!(def.friction, 0.7);
        assert_eq!(def.restitution, 0.3);
        assert!(def.is_sensor);
    }

    #[test]
    fn test_fixture_from_def() {
        let def = FixtureDef::new(Shape::Polygon(PolygonShape::new_box(1.0, 1.0)));
        let fixture = Fixture::from_def(3, &def);
        assert_eq!(fixture.body(), 3);
        assert!(!fixture.is_sensor());
        assert!(fixture.proxy_ids.is_empty());
    }

    #[test]
    fn test_point_test_forwards_to_shape() {
        let def = FixtureDef::new(Shape::Circle(CircleShape::new(Vec2::ZERO, 1.0)));
        let fixture = Fixture::from_def(0, &def);
        let xf = Transform::new(Vec2::new(5.0, 0.0), 0.0);
        assert!(fixture.test_point(&xf, Vec2::new(5.2, 0.0)));
        assert!(!fixture.test_point(&xf, Vec2::ZERO));
    }
}
