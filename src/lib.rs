//! ALICE-Physics-2D: Deterministic 2D Rigid-Body Physics Engine
//!
//! A fixed-timestep 2D physics engine built around a persistent dynamic
//! AABB tree, a warm-started sequential-impulse solver, and conservative-
//! advancement continuous collision detection.
//!
//! # Features
//!
//! - **Deterministic**: fixed iteration counts, stable orderings, and no
//!   internal randomness; identical inputs on the same build give
//!   bit-identical results
//! - **Dynamic AABB tree**: O(log n) insert/remove/move broad phase with
//!   fat, motion-predicted bounds
//! - **Sequential impulses**: warm starting, friction cones, restitution,
//!   2-point block solving, position correction
//! - **Continuous collision**: GJK distance, time-of-impact root finding,
//!   and TOI sub-stepping keep bullets out of walls
//! - **Ten joint kinds**: revolute, prismatic, distance, weld, mouse,
//!   pulley, gear, wheel, friction, motor
//! - **no_std**: the core runs on `alloc` + `libm`
//!
//! # Example
//!
//! ```rust
//! use alice_physics_2d::prelude::*;
//!
//! // World with downward gravity
//! let mut world = World::new(Vec2::new(0.0, -10.0));
//!
//! // Static ground edge
//! let ground = world.create_body(&BodyDef::static_at(Vec2::ZERO)).unwrap();
//! let ground_edge = EdgeShape::two_sided(Vec2::new(-40.0, 0.0), Vec2::new(40.0, 0.0));
//! world
//!     .create_fixture(ground, &FixtureDef::new(Shape::Edge(ground_edge)))
//!     .unwrap();
//!
//! // Falling ball
//! let ball = world
//!     .create_body(&BodyDef::dynamic_at(Vec2::new(0.0, 10.0)))
//!     .unwrap();
//! world
//!     .create_fixture(
//!         ball,
//!         &FixtureDef::new(Shape::Circle(CircleShape::new(Vec2::ZERO, 0.5)))
//!             .with_restitution(0.6),
//!     )
//!     .unwrap();
//!
//! // Simulate one second at 60 Hz
//! for _ in 0..60 {
//!     world.step(1.0 / 60.0, 8, 3);
//! }
//! assert!(world.body(ball).unwrap().position().y < 10.0);
//! ```
//!
//! # Modules
//!
//! - [`math`]: Vec2/Rot/Transform/Sweep primitives
//! - [`tuning`]: solver and collision constants
//! - [`collider`]: shape variant, AABBs, ray casts, mass properties
//! - [`circle`], [`edge`], [`polygon`], [`chain`]: shape primitives
//! - [`dynamic_bvh`]: the dynamic AABB tree
//! - [`broadphase`]: moved-proxy tracking and pair generation
//! - [`distance`]: GJK closest points and shape casting
//! - [`ccd`]: time-of-impact queries
//! - [`manifold`], [`collide`], [`collide_edge`]: narrow-phase manifolds
//! - [`filter`]: category/mask/group collision filtering
//! - [`body`], [`fixture`]: rigid bodies and their shapes
//! - [`contact`], [`contact_manager`]: the contact graph
//! - [`joint`], [`joint_extra`]: joint constraints
//! - [`island`], [`contact_solver`]: the island solver
//! - [`world`]: the simulation pipeline
//! - [`callbacks`]: listener and filter capability set
//! - [`pool`], [`scratch`]: allocation helpers
//! - [`profiling`]: step counters
//! - [`debug_render`]: backend-free draw data
//! - [`rng`]: deterministic RNG for tests and benchmarks
//!
//! # Determinism
//!
//! The pipeline visits bodies, contacts, and joints in pool-index order,
//! caps every iterative algorithm at a fixed count, sorts broad-phase pairs
//! before use, and draws no random numbers. Within one platform and build,
//! stepping two identical worlds identically produces bit-identical
//! transforms. Cross-platform determinism is not guaranteed: results follow
//! the platform's f32 arithmetic.

#![warn(missing_docs)]
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(all(not(feature = "std"), not(feature = "libm")))]
compile_error!("Building without `std` requires the `libm` feature for float math.");

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod body;
pub mod broadphase;
pub mod callbacks;
pub mod ccd;
pub mod chain;
pub mod circle;
pub mod collide;
pub mod collide_edge;
pub mod collider;
pub mod contact;
pub mod contact_manager;
pub mod contact_solver;
pub mod debug_render;
pub mod distance;
pub mod dynamic_bvh;
pub mod edge;
pub mod error;
pub mod filter;
pub mod fixture;
pub mod island;
pub mod joint;
pub mod joint_extra;
pub mod manifold;
pub mod math;
pub mod polygon;
pub mod pool;
pub mod profiling;
pub mod rng;
pub mod scratch;
pub mod tuning;
pub mod world;

// Re-export commonly used types
pub use body::{Body, BodyDef, BodyId, BodyType, ContactEdge, JointEdge};
pub use broadphase::BroadPhase;
pub use callbacks::{
    ContactFilter, ContactImpulse, ContactListener, DefaultListener, DestructionListener,
};
pub use ccd::{time_of_impact, ToiInput, ToiOutput, ToiState};
pub use chain::ChainShape;
pub use circle::CircleShape;
pub use collider::{Aabb, MassData, RayCastInput, RayCastOutput, Shape, ShapeType};
pub use contact::{Contact, ContactHandle};
pub use debug_render::{DebugColor, DebugDrawData, DebugDrawFlags};
pub use distance::{
    distance, shape_cast, DistanceInput, DistanceOutput, DistanceProxy, ShapeCastInput,
    ShapeCastOutput, SimplexCache,
};
pub use dynamic_bvh::DynamicTree;
pub use edge::EdgeShape;
pub use error::PhysicsError;
pub use filter::Filter;
pub use fixture::{Fixture, FixtureDef, FixtureId};
pub use joint::{
    DistanceJointDef, Joint, JointDef, JointId, JointKind, MouseJointDef, PrismaticJointDef,
    RevoluteJointDef, WeldJointDef,
};
pub use joint_extra::{
    FrictionJointDef, GearJointDef, MotorJointDef, PulleyJointDef, WheelJointDef,
};
pub use manifold::{ContactFeature, Manifold, ManifoldPoint, ManifoldType, WorldManifold};
pub use math::{Mat22, Mat33, Rot, Sweep, Transform, Vec2, Vec3};
pub use polygon::PolygonShape;
pub use profiling::{ProfileHistory, StepProfile};
pub use rng::DeterministicRng;
pub use world::{World, WorldConfig};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::body::{Body, BodyDef, BodyId, BodyType};
    pub use crate::callbacks::{
        ContactFilter, ContactImpulse, ContactListener, DestructionListener,
    };
    pub use crate::chain::ChainShape;
    pub use crate::circle::CircleShape;
    pub use crate::collider::{Aabb, RayCastInput, Shape};
    pub use crate::edge::EdgeShape;
    pub use crate::error::PhysicsError;
    pub use crate::filter::Filter;
    pub use crate::fixture::{Fixture, FixtureDef, FixtureId};
    pub use crate::joint::{
        DistanceJointDef, JointDef, JointId, JointKind, MouseJointDef, PrismaticJointDef,
        RevoluteJointDef, WeldJointDef,
    };
    pub use crate::joint_extra::{
        FrictionJointDef, GearJointDef, MotorJointDef, PulleyJointDef, WheelJointDef,
    };
    pub use crate::math::{Rot, Transform, Vec2};
    pub use crate::polygon::PolygonShape;
    pub use crate::world::{World, WorldConfig};
}

#[cfg(test)]
mod compile_smoke_tests {
    //! Verify that core types from the prelude and key modules are
    //! accessible. These tests catch accidental breakage of public
    //! re-exports.

    use super::prelude::*;

    #[test]
    fn test_prelude_types_accessible() {
        let _ = Vec2::ZERO;
        let _ = Transform::IDENTITY;
        let _ = BodyDef::default();
        let _ = Filter::DEFAULT;
        let _ = WorldConfig::default();
    }

    #[test]
    #[cfg(feature = "std")]
    fn test_error_type_accessible() {
        let e = PhysicsError::WorldLocked;
        let s = format!("{e}");
        assert!(s.contains("locked"));
    }

    #[test]
    fn test_world_construction() {
        let world = World::new(Vec2::new(0.0, -10.0));
        assert_eq!(world.body_count(), 0);
        assert!(!world.is_locked());
    }
}
