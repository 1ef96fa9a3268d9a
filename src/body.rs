//! Rigid Body
//!
//! Kinematic state (transform, velocities, accumulated forces), inertial
//! state (mass, rotational inertia, local center), lifecycle flags, and the
//! edge lists linking a body to its fixtures, contacts, and joints.
//!
//! Bodies live in the world's pool; handles are pool indices. All world-
//! visible mutation that touches the broad phase (transforms, fixture
//! creation) goes through [`crate::world::World`].

use crate::fixture::FixtureId;
use crate::joint::JointId;
use crate::math::{Rot, Sweep, Transform, Vec2};
use crate::pool::Pool;

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Handle of a body in the world pool
pub type BodyId = u32;

/// Handle of a contact in the contact manager pool
pub type ContactId = u32;

/// How a body participates in simulation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum BodyType {
    /// Never moves; infinite mass
    #[default]
    Static = 0,
    /// Moved by its velocities only; infinite mass, unaffected by forces
    Kinematic = 1,
    /// Fully simulated
    Dynamic = 2,
}

/// A contact attached to this body, with the body on the other side
#[derive(Clone, Copy, Debug)]
pub struct ContactEdge {
    /// The contact
    pub contact: ContactId,
    /// The other body
    pub other: BodyId,
}

/// A joint attached to this body, with the body on the other side.
///
/// Carries the joint's collide-connected flag so pair filtering never needs
/// the joint pool.
#[derive(Clone, Copy, Debug)]
pub struct JointEdge {
    /// The joint
    pub joint: JointId,
    /// The other body
    pub other: BodyId,
    /// Whether the joint allows its two bodies to collide
    pub collide_connected: bool,
}

/// Construction parameters for a body
#[derive(Clone, Copy, Debug)]
pub struct BodyDef {
    /// Body type
    pub body_type: BodyType,
    /// World position of the body origin
    pub position: Vec2,
    /// World angle in radians
    pub angle: f32,
    /// Initial linear velocity
    pub linear_velocity: Vec2,
    /// Initial angular velocity
    pub angular_velocity: f32,
    /// Linear velocity decay; 0 = none
    pub linear_damping: f32,
    /// Angular velocity decay; 0 = none
    pub angular_damping: f32,
    /// May this body fall asleep?
    pub allow_sleep: bool,
    /// Start awake?
    pub awake: bool,
    /// Lock rotation (infinite rotational inertia)
    pub fixed_rotation: bool,
    /// Enable continuous collision against other dynamic bodies
    pub bullet: bool,
    /// Participates in simulation at all
    pub enabled: bool,
    /// Gravity multiplier
    pub gravity_scale: f32,
    /// Opaque user tag
    pub user_data: u64,
}

impl Default for BodyDef {
    fn default() -> Self {
        Self {
            body_type: BodyType::Static,
            position: Vec2::ZERO,
            angle: 0.0,
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            allow_sleep: true,
            awake: true,
            fixed_rotation: false,
            bullet: false,
            enabled: true,
            gravity_scale: 1.0,
            user_data: 0,
        }
    }
}

impl BodyDef {
    /// Dynamic body at a position
    pub fn dynamic_at(position: Vec2) -> Self {
        Self {
            body_type: BodyType::Dynamic,
            position,
            ..Default::default()
        }
    }

    /// Static body at a position
    pub fn static_at(position: Vec2) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Kinematic body at a position
    pub fn kinematic_at(position: Vec2) -> Self {
        Self {
            body_type: BodyType::Kinematic,
            position,
            ..Default::default()
        }
    }
}

/// A rigid body
#[derive(Clone, Debug)]
pub struct Body {
    /// Body type
    pub(crate) body_type: BodyType,

    /// Body-origin transform
    pub(crate) xf: Transform,
    /// Center-of-mass motion over the current step (TOI state)
    pub(crate) sweep: Sweep,

    /// Linear velocity of the center of mass
    pub(crate) linear_velocity: Vec2,
    /// Angular velocity
    pub(crate) angular_velocity: f32,

    /// Force accumulator, cleared after each step
    pub(crate) force: Vec2,
    /// Torque accumulator, cleared after each step
    pub(crate) torque: f32,

    /// Mass (0 for static/kinematic)
    pub(crate) mass: f32,
    /// Inverse mass
    pub(crate) inv_mass: f32,
    /// Rotational inertia about the center of mass
    pub(crate) inertia: f32,
    /// Inverse rotational inertia (0 when fixed rotation)
    pub(crate) inv_inertia: f32,

    /// Linear damping
    pub linear_damping: f32,
    /// Angular damping
    pub angular_damping: f32,
    /// Gravity multiplier
    pub gravity_scale: f32,

    /// Seconds spent below the sleep tolerances
    pub(crate) sleep_time: f32,

    pub(crate) allow_sleep: bool,
    pub(crate) awake: bool,
    pub(crate) enabled: bool,
    pub(crate) bullet: bool,
    pub(crate) fixed_rotation: bool,

    /// Island assembly bookkeeping
    pub(crate) island_flag: bool,
    pub(crate) island_index: usize,

    /// Fixtures owned by this body, in creation order
    pub(crate) fixtures: Vec<FixtureId>,
    /// Contacts touching this body
    pub(crate) contact_edges: Vec<ContactEdge>,
    /// Joints attached to this body
    pub(crate) joint_edges: Vec<JointEdge>,

    /// Opaque user tag
    pub user_data: u64,
}

impl Body {
    /// Build a body from a definition
    pub(crate) fn from_def(def: &BodyDef) -> Self {
        debug_assert!(def.position.is_valid());

        let xf = Transform::new(def.position, def.angle);
        let sweep = Sweep {
            local_center: Vec2::ZERO,
            c0: def.position,
            c: def.position,
            a0: def.angle,
            a: def.angle,
            alpha0: 0.0,
        };

        let (mass, inv_mass) = if def.body_type == BodyType::Dynamic {
            (1.0, 1.0)
        } else {
            (0.0, 0.0)
        };

        Self {
            body_type: def.body_type,
            xf,
            sweep,
            linear_velocity: def.linear_velocity,
            angular_velocity: def.angular_velocity,
            force: Vec2::ZERO,
            torque: 0.0,
            mass,
            inv_mass,
            inertia: 0.0,
            inv_inertia: 0.0,
            linear_damping: def.linear_damping,
            angular_damping: def.angular_damping,
            gravity_scale: def.gravity_scale,
            sleep_time: 0.0,
            allow_sleep: def.allow_sleep,
            awake: if def.body_type == BodyType::Static {
                false
            } else {
                def.awake
            },
            enabled: def.enabled,
            bullet: def.bullet,
            fixed_rotation: def.fixed_rotation,
            island_flag: false,
            island_index: 0,
            fixtures: Vec::new(),
            contact_edges: Vec::new(),
            joint_edges: Vec::new(),
            user_data: def.user_data,
        }
    }

    // ========================================================================
    // State accessors
    // ========================================================================

    /// Body type
    #[inline]
    pub fn body_type(&self) -> BodyType {
        self.body_type
    }

    /// True for dynamic bodies
    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.body_type == BodyType::Dynamic
    }

    /// Body-origin transform
    #[inline]
    pub fn transform(&self) -> Transform {
        self.xf
    }

    /// World position of the body origin
    #[inline]
    pub fn position(&self) -> Vec2 {
        self.xf.p
    }

    /// World angle in radians
    #[inline]
    pub fn angle(&self) -> f32 {
        self.sweep.a
    }

    /// World position of the center of mass
    #[inline]
    pub fn world_center(&self) -> Vec2 {
        self.sweep.c
    }

    /// Center of mass in body-local coordinates
    #[inline]
    pub fn local_center(&self) -> Vec2 {
        self.sweep.local_center
    }

    /// Linear velocity of the center of mass
    #[inline]
    pub fn linear_velocity(&self) -> Vec2 {
        self.linear_velocity
    }

    /// Angular velocity in radians per second
    #[inline]
    pub fn angular_velocity(&self) -> f32 {
        self.angular_velocity
    }

    /// Set the linear velocity (wakes the body when nonzero)
    pub fn set_linear_velocity(&mut self, v: Vec2) {
        if self.body_type == BodyType::Static {
            return;
        }
        if v.dot(v) > 0.0 {
            self.set_awake(true);
        }
        self.linear_velocity = v;
    }

    /// Set the angular velocity (wakes the body when nonzero)
    pub fn set_angular_velocity(&mut self, w: f32) {
        if self.body_type == BodyType::Static {
            return;
        }
        if w * w > 0.0 {
            self.set_awake(true);
        }
        self.angular_velocity = w;
    }

    /// Mass in kg (0 for static/kinematic)
    #[inline]
    pub fn mass(&self) -> f32 {
        self.mass
    }

    /// Rotational inertia about the body origin
    #[inline]
    pub fn inertia(&self) -> f32 {
        self.inertia + self.mass * self.sweep.local_center.dot(self.sweep.local_center)
    }

    /// Is the body awake?
    #[inline]
    pub fn is_awake(&self) -> bool {
        self.awake
    }

    /// Wake or sleep the body. Sleeping zeroes velocities and accumulators.
    /// Static bodies never report awake.
    pub fn set_awake(&mut self, awake: bool) {
        if self.body_type == BodyType::Static {
            return;
        }
        if awake {
            self.awake = true;
            self.sleep_time = 0.0;
        } else {
            self.awake = false;
            self.sleep_time = 0.0;
            self.linear_velocity = Vec2::ZERO;
            self.angular_velocity = 0.0;
            self.force = Vec2::ZERO;
            self.torque = 0.0;
        }
    }

    /// Participates in simulation?
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Continuous collision enabled?
    #[inline]
    pub fn is_bullet(&self) -> bool {
        self.bullet
    }

    /// Enable or disable continuous collision for this body
    #[inline]
    pub fn set_bullet(&mut self, bullet: bool) {
        self.bullet = bullet;
    }

    /// Rotation locked?
    #[inline]
    pub fn is_fixed_rotation(&self) -> bool {
        self.fixed_rotation
    }

    /// Is sleeping allowed for this body?
    #[inline]
    pub fn is_sleeping_allowed(&self) -> bool {
        self.allow_sleep
    }

    /// Allow or forbid sleeping; forbidding wakes the body
    pub fn set_sleeping_allowed(&mut self, allowed: bool) {
        self.allow_sleep = allowed;
        if !allowed {
            self.set_awake(true);
        }
    }

    /// Fixtures owned by this body, in creation order
    #[inline]
    pub fn fixtures(&self) -> &[FixtureId] {
        &self.fixtures
    }

    /// Contacts attached to this body
    #[inline]
    pub fn contact_edges(&self) -> &[ContactEdge] {
        &self.contact_edges
    }

    /// Joints attached to this body
    #[inline]
    pub fn joint_edges(&self) -> &[JointEdge] {
        &self.joint_edges
    }

    // ========================================================================
    // Forces and impulses
    // ========================================================================

    /// Apply a world-space force at a world point
    pub fn apply_force(&mut self, force: Vec2, point: Vec2, wake: bool) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        if wake && !self.awake {
            self.set_awake(true);
        }
        // Forces on sleeping bodies evaporate
        if self.awake {
            self.force += force;
            self.torque += (point - self.sweep.c).cross(force);
        }
    }

    /// Apply a world-space force at the center of mass
    pub fn apply_force_to_center(&mut self, force: Vec2, wake: bool) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        if wake && !self.awake {
            self.set_awake(true);
        }
        if self.awake {
            self.force += force;
        }
    }

    /// Apply a torque
    pub fn apply_torque(&mut self, torque: f32, wake: bool) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        if wake && !self.awake {
            self.set_awake(true);
        }
        if self.awake {
            self.torque += torque;
        }
    }

    /// Apply a world-space impulse at a world point
    pub fn apply_linear_impulse(&mut self, impulse: Vec2, point: Vec2, wake: bool) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        if wake && !self.awake {
            self.set_awake(true);
        }
        if self.awake {
            self.linear_velocity += impulse * self.inv_mass;
            self.angular_velocity += self.inv_inertia * (point - self.sweep.c).cross(impulse);
        }
    }

    /// Apply an angular impulse
    pub fn apply_angular_impulse(&mut self, impulse: f32, wake: bool) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        if wake && !self.awake {
            self.set_awake(true);
        }
        if self.awake {
            self.angular_velocity += self.inv_inertia * impulse;
        }
    }

    // ========================================================================
    // Space conversion
    // ========================================================================

    /// Local point to world space
    #[inline]
    pub fn world_point(&self, local: Vec2) -> Vec2 {
        self.xf.transform_point(local)
    }

    /// Local vector to world space
    #[inline]
    pub fn world_vector(&self, local: Vec2) -> Vec2 {
        self.xf.q.rotate(local)
    }

    /// World point to local space
    #[inline]
    pub fn local_point(&self, world: Vec2) -> Vec2 {
        self.xf.inv_transform_point(world)
    }

    /// World vector to local space
    #[inline]
    pub fn local_vector(&self, world: Vec2) -> Vec2 {
        self.xf.q.inv_rotate(world)
    }

    /// World velocity of a world point attached to this body
    #[inline]
    pub fn velocity_at_world_point(&self, world_point: Vec2) -> Vec2 {
        self.linear_velocity
            + Vec2::scalar_cross(self.angular_velocity, world_point - self.sweep.c)
    }

    // ========================================================================
    // Mass and sweep maintenance
    // ========================================================================

    /// Recompute mass, inertia, and center from the owned fixtures.
    ///
    /// Dynamic bodies with no massive fixtures get one kilogram at the
    /// origin so the solver never divides by zero.
    pub(crate) fn reset_mass_data(&mut self, fixtures: &Pool<crate::fixture::Fixture>) {
        self.mass = 0.0;
        self.inv_mass = 0.0;
        self.inertia = 0.0;
        self.inv_inertia = 0.0;
        self.sweep.local_center = Vec2::ZERO;

        if self.body_type != BodyType::Dynamic {
            self.sweep.c0 = self.xf.p;
            self.sweep.c = self.xf.p;
            self.sweep.a0 = self.sweep.a;
            return;
        }

        let mut center = Vec2::ZERO;
        for &fixture_id in &self.fixtures {
            let fixture = &fixtures[fixture_id];
            if fixture.density == 0.0 {
                continue;
            }
            let mass_data = fixture.shape.compute_mass(fixture.density);
            self.mass += mass_data.mass;
            center += mass_data.center * mass_data.mass;
            self.inertia += mass_data.inertia;
        }

        if self.mass > 0.0 {
            self.inv_mass = 1.0 / self.mass;
            center *= self.inv_mass;
        } else {
            self.mass = 1.0;
            self.inv_mass = 1.0;
        }

        if self.inertia > 0.0 && !self.fixed_rotation {
            // Shift to the center of mass
            self.inertia -= self.mass * center.dot(center);
            debug_assert!(self.inertia > 0.0);
            self.inv_inertia = 1.0 / self.inertia;
        } else {
            self.inertia = 0.0;
            self.inv_inertia = 0.0;
        }

        // Move the sweep's center, preserving the world velocity of it
        let old_center = self.sweep.c;
        self.sweep.local_center = center;
        self.sweep.c = self.xf.transform_point(center);
        self.sweep.c0 = self.sweep.c;
        self.linear_velocity +=
            Vec2::scalar_cross(self.angular_velocity, self.sweep.c - old_center);
    }

    /// Rebuild the transform from the end-of-step sweep state
    pub(crate) fn synchronize_transform(&mut self) {
        self.xf.q = Rot::from_angle(self.sweep.a);
        self.xf.p = self.sweep.c - self.xf.q.rotate(self.sweep.local_center);
    }

    /// Advance the sweep to `alpha` and set the transform there (TOI)
    pub(crate) fn advance(&mut self, alpha: f32) {
        self.sweep.advance(alpha);
        self.sweep.c = self.sweep.c0;
        self.sweep.a = self.sweep.a0;
        self.synchronize_transform();
    }

    /// Whether collisions with `other` are allowed: at least one must be
    /// dynamic and no joint between them may suppress collision.
    pub(crate) fn should_collide(&self, other_id: BodyId, other: &Body) -> bool {
        if self.body_type != BodyType::Dynamic && other.body_type != BodyType::Dynamic {
            return false;
        }
        !self
            .joint_edges
            .iter()
            .any(|edge| edge.other == other_id && !edge.collide_connected)
    }
}
