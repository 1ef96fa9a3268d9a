//! Joint Constraints
//!
//! Joints connect pairs of bodies and remove degrees of freedom between
//! them, solved with the same warm-started sequential impulses as contacts.
//!
//! # Joint kinds
//!
//! - [`RevoluteJoint`]: shared hinge point, optional motor and angle limit
//! - [`PrismaticJoint`]: sliding along one axis, optional motor and limit
//! - [`DistanceJoint`]: fixed or spring distance between two anchors
//! - [`WeldJoint`]: locks relative position and angle, optionally springy
//! - [`MouseJoint`]: soft drag of a body toward a world target
//!
//! The remaining kinds (pulley, gear, wheel, friction, motor) live in
//! `joint_extra`.
//!
//! Each joint caches its effective masses and accumulated impulses in the
//! kind struct; `init_velocity_constraints` refreshes the cache at the start
//! of every island solve.
//!
//! Author: Moroya Sakamoto

use crate::body::{Body, BodyId};
use crate::island::{Position, TimeStep, Velocity};
use crate::joint_extra::{
    FrictionJoint, GearJoint, MotorJoint, PulleyJoint, WheelJoint,
};
use crate::math::{clamp, Mat22, Mat33, Rot, Transform, Vec2, Vec3};
use crate::pool::Pool;
use crate::tuning::{ANGULAR_SLOP, LINEAR_SLOP, MAX_ANGULAR_CORRECTION, MAX_LINEAR_CORRECTION};

/// Handle of a joint in the world pool
pub type JointId = u32;

// ============================================================================
// Body constraint snapshot
// ============================================================================

/// Per-body data every joint needs during a solve
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct BodySolverInfo {
    pub index: usize,
    pub local_center: Vec2,
    pub inv_mass: f32,
    pub inv_i: f32,
}

impl BodySolverInfo {
    pub(crate) fn from_body(body: &Body) -> Self {
        Self {
            index: body.island_index,
            local_center: body.sweep.local_center,
            inv_mass: body.inv_mass,
            inv_i: body.inv_inertia,
        }
    }
}

// ============================================================================
// Definitions
// ============================================================================

/// Construction parameters shared by all joint kinds
#[derive(Clone, Copy, Debug)]
pub struct JointBaseDef {
    /// First body
    pub body_a: BodyId,
    /// Second body
    pub body_b: BodyId,
    /// May the two bodies still collide with each other?
    pub collide_connected: bool,
    /// Opaque user tag
    pub user_data: u64,
}

impl JointBaseDef {
    /// Base definition for a body pair
    pub fn new(body_a: BodyId, body_b: BodyId) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: false,
            user_data: 0,
        }
    }
}

/// Revolute joint definition
#[derive(Clone, Copy, Debug)]
pub struct RevoluteJointDef {
    /// Common fields
    pub base: JointBaseDef,
    /// Hinge point in body A's frame
    pub local_anchor_a: Vec2,
    /// Hinge point in body B's frame
    pub local_anchor_b: Vec2,
    /// B angle minus A angle at rest
    pub reference_angle: f32,
    /// Constrain the joint angle to [lower, upper]
    pub enable_limit: bool,
    /// Lower angle limit (radians)
    pub lower_angle: f32,
    /// Upper angle limit (radians)
    pub upper_angle: f32,
    /// Drive the joint angle
    pub enable_motor: bool,
    /// Target angular speed (rad/s)
    pub motor_speed: f32,
    /// Motor torque budget (N·m)
    pub max_motor_torque: f32,
}

impl RevoluteJointDef {
    /// Hinge two bodies at a shared world point
    pub fn new(body_a: BodyId, body_b: BodyId, xf_a: &Transform, xf_b: &Transform, anchor: Vec2) -> Self {
        Self {
            base: JointBaseDef::new(body_a, body_b),
            local_anchor_a: xf_a.inv_transform_point(anchor),
            local_anchor_b: xf_b.inv_transform_point(anchor),
            reference_angle: xf_b.q.angle() - xf_a.q.angle(),
            enable_limit: false,
            lower_angle: 0.0,
            upper_angle: 0.0,
            enable_motor: false,
            motor_speed: 0.0,
            max_motor_torque: 0.0,
        }
    }
}

/// Prismatic joint definition
#[derive(Clone, Copy, Debug)]
pub struct PrismaticJointDef {
    /// Common fields
    pub base: JointBaseDef,
    /// Anchor in body A's frame
    pub local_anchor_a: Vec2,
    /// Anchor in body B's frame
    pub local_anchor_b: Vec2,
    /// Slide axis in body A's frame (unit)
    pub local_axis_a: Vec2,
    /// B angle minus A angle at rest
    pub reference_angle: f32,
    /// Constrain translation to [lower, upper]
    pub enable_limit: bool,
    /// Lower translation limit
    pub lower_translation: f32,
    /// Upper translation limit
    pub upper_translation: f32,
    /// Drive the translation
    pub enable_motor: bool,
    /// Target slide speed (m/s)
    pub motor_speed: f32,
    /// Motor force budget (N)
    pub max_motor_force: f32,
}

impl PrismaticJointDef {
    /// Slide body B relative to body A along a world axis through `anchor`
    pub fn new(
        body_a: BodyId,
        body_b: BodyId,
        xf_a: &Transform,
        xf_b: &Transform,
        anchor: Vec2,
        world_axis: Vec2,
    ) -> Self {
        Self {
            base: JointBaseDef::new(body_a, body_b),
            local_anchor_a: xf_a.inv_transform_point(anchor),
            local_anchor_b: xf_b.inv_transform_point(anchor),
            local_axis_a: xf_a.q.inv_rotate(world_axis).normalized(),
            reference_angle: xf_b.q.angle() - xf_a.q.angle(),
            enable_limit: false,
            lower_translation: 0.0,
            upper_translation: 0.0,
            enable_motor: false,
            motor_speed: 0.0,
            max_motor_force: 0.0,
        }
    }
}

/// Distance joint definition
#[derive(Clone, Copy, Debug)]
pub struct DistanceJointDef {
    /// Common fields
    pub base: JointBaseDef,
    /// Anchor in body A's frame
    pub local_anchor_a: Vec2,
    /// Anchor in body B's frame
    pub local_anchor_b: Vec2,
    /// Rest length
    pub length: f32,
    /// Spring stiffness in N/m; 0 makes the joint rigid
    pub stiffness: f32,
    /// Spring damping in N·s/m
    pub damping: f32,
}

impl DistanceJointDef {
    /// Connect two world anchors at their current distance
    pub fn new(
        body_a: BodyId,
        body_b: BodyId,
        xf_a: &Transform,
        xf_b: &Transform,
        anchor_a: Vec2,
        anchor_b: Vec2,
    ) -> Self {
        Self {
            base: JointBaseDef::new(body_a, body_b),
            local_anchor_a: xf_a.inv_transform_point(anchor_a),
            local_anchor_b: xf_b.inv_transform_point(anchor_b),
            length: (anchor_b - anchor_a).length().max(LINEAR_SLOP),
            stiffness: 0.0,
            damping: 0.0,
        }
    }
}

/// Weld joint definition
#[derive(Clone, Copy, Debug)]
pub struct WeldJointDef {
    /// Common fields
    pub base: JointBaseDef,
    /// Anchor in body A's frame
    pub local_anchor_a: Vec2,
    /// Anchor in body B's frame
    pub local_anchor_b: Vec2,
    /// B angle minus A angle at rest
    pub reference_angle: f32,
    /// Angular spring stiffness; 0 welds the angle rigidly
    pub stiffness: f32,
    /// Angular spring damping
    pub damping: f32,
}

impl WeldJointDef {
    /// Weld two bodies at a shared world point
    pub fn new(body_a: BodyId, body_b: BodyId, xf_a: &Transform, xf_b: &Transform, anchor: Vec2) -> Self {
        Self {
            base: JointBaseDef::new(body_a, body_b),
            local_anchor_a: xf_a.inv_transform_point(anchor),
            local_anchor_b: xf_b.inv_transform_point(anchor),
            reference_angle: xf_b.q.angle() - xf_a.q.angle(),
            stiffness: 0.0,
            damping: 0.0,
        }
    }
}

/// Mouse joint definition
#[derive(Clone, Copy, Debug)]
pub struct MouseJointDef {
    /// Common fields; body A is a ground reference, body B is dragged
    pub base: JointBaseDef,
    /// World target the anchor is pulled toward
    pub target: Vec2,
    /// Force budget (N); usually scaled by the body's mass
    pub max_force: f32,
    /// Spring stiffness
    pub stiffness: f32,
    /// Spring damping
    pub damping: f32,
}

/// Joint definition variant accepted by `World::create_joint`
#[derive(Clone, Debug)]
pub enum JointDef {
    /// Hinge
    Revolute(RevoluteJointDef),
    /// Slider
    Prismatic(PrismaticJointDef),
    /// Rope/rod
    Distance(DistanceJointDef),
    /// Rigid attachment
    Weld(WeldJointDef),
    /// Target drag
    Mouse(MouseJointDef),
    /// Rope over two pulleys
    Pulley(crate::joint_extra::PulleyJointDef),
    /// Ratio between two other joints
    Gear(crate::joint_extra::GearJointDef),
    /// Suspension wheel
    Wheel(crate::joint_extra::WheelJointDef),
    /// Velocity damper between bodies
    Friction(crate::joint_extra::FrictionJointDef),
    /// Position/angle servo
    Motor(crate::joint_extra::MotorJointDef),
}

impl JointDef {
    /// Common fields of any definition
    pub fn base(&self) -> &JointBaseDef {
        match self {
            JointDef::Revolute(d) => &d.base,
            JointDef::Prismatic(d) => &d.base,
            JointDef::Distance(d) => &d.base,
            JointDef::Weld(d) => &d.base,
            JointDef::Mouse(d) => &d.base,
            JointDef::Pulley(d) => &d.base,
            JointDef::Gear(d) => &d.base,
            JointDef::Wheel(d) => &d.base,
            JointDef::Friction(d) => &d.base,
            JointDef::Motor(d) => &d.base,
        }
    }
}

// ============================================================================
// Joint
// ============================================================================

/// Kind-specific constraint state
#[derive(Clone, Debug)]
pub enum JointKind {
    /// Hinge
    Revolute(RevoluteJoint),
    /// Slider
    Prismatic(PrismaticJoint),
    /// Rope/rod
    Distance(DistanceJoint),
    /// Rigid attachment
    Weld(WeldJoint),
    /// Target drag
    Mouse(MouseJoint),
    /// Rope over two pulleys
    Pulley(PulleyJoint),
    /// Ratio between two other joints
    Gear(GearJoint),
    /// Suspension wheel
    Wheel(WheelJoint),
    /// Velocity damper
    Friction(FrictionJoint),
    /// Position/angle servo
    Motor(MotorJoint),
}

/// A constraint between two bodies
#[derive(Clone, Debug)]
pub struct Joint {
    /// First body
    pub(crate) body_a: BodyId,
    /// Second body
    pub(crate) body_b: BodyId,
    /// May the connected bodies collide?
    pub(crate) collide_connected: bool,
    /// Island assembly bookkeeping
    pub(crate) island_flag: bool,
    /// Kind-specific state
    pub kind: JointKind,
    /// Opaque user tag
    pub user_data: u64,
}

impl Joint {
    /// First body
    #[inline]
    pub fn body_a(&self) -> BodyId {
        self.body_a
    }

    /// Second body
    #[inline]
    pub fn body_b(&self) -> BodyId {
        self.body_b
    }

    /// May the connected bodies collide?
    #[inline]
    pub fn collide_connected(&self) -> bool {
        self.collide_connected
    }

    /// Refresh cached masses and apply warm-start impulses
    pub(crate) fn init_velocity_constraints(
        &mut self,
        step: &TimeStep,
        positions: &[Position],
        velocities: &mut [Velocity],
        bodies: &Pool<Body>,
    ) {
        let info_a = BodySolverInfo::from_body(&bodies[self.body_a]);
        let info_b = BodySolverInfo::from_body(&bodies[self.body_b]);
        match &mut self.kind {
            JointKind::Revolute(j) => j.init(step, positions, velocities, info_a, info_b),
            JointKind::Prismatic(j) => j.init(step, positions, velocities, info_a, info_b),
            JointKind::Distance(j) => j.init(step, positions, velocities, info_a, info_b),
            JointKind::Weld(j) => j.init(step, positions, velocities, info_a, info_b),
            JointKind::Mouse(j) => j.init(step, positions, velocities, info_a, info_b),
            JointKind::Pulley(j) => j.init(step, positions, velocities, info_a, info_b),
            JointKind::Gear(j) => j.init(step, positions, velocities, bodies),
            JointKind::Wheel(j) => j.init(step, positions, velocities, info_a, info_b),
            JointKind::Friction(j) => j.init(step, positions, velocities, info_a, info_b),
            JointKind::Motor(j) => j.init(step, positions, velocities, info_a, info_b),
        }
    }

    /// One velocity iteration
    pub(crate) fn solve_velocity_constraints(
        &mut self,
        step: &TimeStep,
        velocities: &mut [Velocity],
    ) {
        match &mut self.kind {
            JointKind::Revolute(j) => j.solve_velocity(step, velocities),
            JointKind::Prismatic(j) => j.solve_velocity(step, velocities),
            JointKind::Distance(j) => j.solve_velocity(step, velocities),
            JointKind::Weld(j) => j.solve_velocity(step, velocities),
            JointKind::Mouse(j) => j.solve_velocity(step, velocities),
            JointKind::Pulley(j) => j.solve_velocity(step, velocities),
            JointKind::Gear(j) => j.solve_velocity(step, velocities),
            JointKind::Wheel(j) => j.solve_velocity(step, velocities),
            JointKind::Friction(j) => j.solve_velocity(step, velocities),
            JointKind::Motor(j) => j.solve_velocity(step, velocities),
        }
    }

    /// One position iteration; true when the error is within tolerance
    pub(crate) fn solve_position_constraints(&mut self, positions: &mut [Position]) -> bool {
        match &mut self.kind {
            JointKind::Revolute(j) => j.solve_position(positions),
            JointKind::Prismatic(j) => j.solve_position(positions),
            JointKind::Distance(j) => j.solve_position(positions),
            JointKind::Weld(j) => j.solve_position(positions),
            // Soft constraints have no position correction
            JointKind::Mouse(_) => true,
            JointKind::Pulley(j) => j.solve_position(positions),
            JointKind::Gear(j) => j.solve_position(positions),
            JointKind::Wheel(j) => j.solve_position(positions),
            JointKind::Friction(_) => true,
            JointKind::Motor(_) => true,
        }
    }
}

// ============================================================================
// Revolute joint
// ============================================================================

/// Hinge: bodies share a point; one remaining angular degree of freedom,
/// optionally motorized and limited
#[derive(Clone, Debug)]
pub struct RevoluteJoint {
    /// Hinge point in body A's frame
    pub local_anchor_a: Vec2,
    /// Hinge point in body B's frame
    pub local_anchor_b: Vec2,
    /// B angle minus A angle at rest
    pub reference_angle: f32,

    /// Limit enabled
    pub enable_limit: bool,
    /// Lower angle limit
    pub lower_angle: f32,
    /// Upper angle limit
    pub upper_angle: f32,
    /// Motor enabled
    pub enable_motor: bool,
    /// Target angular speed
    pub motor_speed: f32,
    /// Motor torque budget
    pub max_motor_torque: f32,

    // Accumulated impulses
    impulse: Vec2,
    motor_impulse: f32,
    lower_impulse: f32,
    upper_impulse: f32,

    // Per-solve cache
    info_a: BodySolverInfo,
    info_b: BodySolverInfo,
    r_a: Vec2,
    r_b: Vec2,
    k: Mat22,
    axial_mass: f32,
    angle: f32,
}

impl RevoluteJoint {
    pub(crate) fn from_def(def: &RevoluteJointDef) -> Self {
        Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            reference_angle: def.reference_angle,
            enable_limit: def.enable_limit,
            lower_angle: def.lower_angle,
            upper_angle: def.upper_angle,
            enable_motor: def.enable_motor,
            motor_speed: def.motor_speed,
            max_motor_torque: def.max_motor_torque,
            impulse: Vec2::ZERO,
            motor_impulse: 0.0,
            lower_impulse: 0.0,
            upper_impulse: 0.0,
            info_a: BodySolverInfo::default(),
            info_b: BodySolverInfo::default(),
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            k: Mat22::default(),
            axial_mass: 0.0,
            angle: 0.0,
        }
    }

    /// Joint angle (B relative to A minus the reference)
    #[inline]
    pub fn joint_angle(&self) -> f32 {
        self.angle
    }

    fn init(
        &mut self,
        step: &TimeStep,
        positions: &[Position],
        velocities: &mut [Velocity],
        info_a: BodySolverInfo,
        info_b: BodySolverInfo,
    ) {
        self.info_a = info_a;
        self.info_b = info_b;

        let a_a = positions[info_a.index].a;
        let a_b = positions[info_b.index].a;
        let q_a = Rot::from_angle(a_a);
        let q_b = Rot::from_angle(a_b);

        self.r_a = q_a.rotate(self.local_anchor_a - info_a.local_center);
        self.r_b = q_b.rotate(self.local_anchor_b - info_b.local_center);
        self.angle = a_b - a_a - self.reference_angle;

        let m_a = info_a.inv_mass;
        let m_b = info_b.inv_mass;
        let i_a = info_a.inv_i;
        let i_b = info_b.inv_i;

        self.k = Mat22::new(
            Vec2::new(
                m_a + m_b + i_a * self.r_a.y * self.r_a.y + i_b * self.r_b.y * self.r_b.y,
                -i_a * self.r_a.x * self.r_a.y - i_b * self.r_b.x * self.r_b.y,
            ),
            Vec2::new(
                -i_a * self.r_a.x * self.r_a.y - i_b * self.r_b.x * self.r_b.y,
                m_a + m_b + i_a * self.r_a.x * self.r_a.x + i_b * self.r_b.x * self.r_b.x,
            ),
        );

        let axial = i_a + i_b;
        self.axial_mass = if axial > 0.0 { 1.0 / axial } else { 0.0 };
        let fixed_rotation = axial == 0.0;

        if !self.enable_motor || fixed_rotation {
            self.motor_impulse = 0.0;
        }
        if !self.enable_limit || fixed_rotation {
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }

        if step.warm_starting {
            self.impulse *= step.dt_ratio;
            self.motor_impulse *= step.dt_ratio;
            self.lower_impulse *= step.dt_ratio;
            self.upper_impulse *= step.dt_ratio;

            let axial_impulse = self.motor_impulse + self.lower_impulse - self.upper_impulse;
            let p = self.impulse;

            velocities[info_a.index].v -= p * m_a;
            velocities[info_a.index].w -= i_a * (self.r_a.cross(p) + axial_impulse);
            velocities[info_b.index].v += p * m_b;
            velocities[info_b.index].w += i_b * (self.r_b.cross(p) + axial_impulse);
        } else {
            self.impulse = Vec2::ZERO;
            self.motor_impulse = 0.0;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
    }

    fn solve_velocity(&mut self, step: &TimeStep, velocities: &mut [Velocity]) {
        let (ia, ib) = (self.info_a, self.info_b);
        let m_a = ia.inv_mass;
        let m_b = ib.inv_mass;
        let i_a = ia.inv_i;
        let i_b = ib.inv_i;
        let fixed_rotation = i_a + i_b == 0.0;

        let mut v_a = velocities[ia.index].v;
        let mut w_a = velocities[ia.index].w;
        let mut v_b = velocities[ib.index].v;
        let mut w_b = velocities[ib.index].w;

        // Motor
        if self.enable_motor && !fixed_rotation {
            let cdot = w_b - w_a - self.motor_speed;
            let mut impulse = -self.axial_mass * cdot;
            let old_impulse = self.motor_impulse;
            let max_impulse = self.max_motor_torque * step.dt;
            self.motor_impulse = clamp(old_impulse + impulse, -max_impulse, max_impulse);
            impulse = self.motor_impulse - old_impulse;

            w_a -= i_a * impulse;
            w_b += i_b * impulse;
        }

        // Limits
        if self.enable_limit && !fixed_rotation {
            // Lower
            {
                let c = self.angle - self.lower_angle;
                let cdot = w_b - w_a;
                let mut impulse = -self.axial_mass * (cdot + c.min(0.0) * step.inv_dt);
                let old_impulse = self.lower_impulse;
                self.lower_impulse = (old_impulse + impulse).max(0.0);
                impulse = self.lower_impulse - old_impulse;

                w_a -= i_a * impulse;
                w_b += i_b * impulse;
            }
            // Upper (sign flipped)
            {
                let c = self.upper_angle - self.angle;
                let cdot = w_a - w_b;
                let mut impulse = -self.axial_mass * (cdot + c.min(0.0) * step.inv_dt);
                let old_impulse = self.upper_impulse;
                self.upper_impulse = (old_impulse + impulse).max(0.0);
                impulse = self.upper_impulse - old_impulse;

                w_a += i_a * impulse;
                w_b -= i_b * impulse;
            }
        }

        // Point-to-point
        {
            let cdot = v_b + Vec2::scalar_cross(w_b, self.r_b)
                - v_a
                - Vec2::scalar_cross(w_a, self.r_a);
            let impulse = self.k.solve(-cdot);
            self.impulse += impulse;

            v_a -= impulse * m_a;
            w_a -= i_a * self.r_a.cross(impulse);
            v_b += impulse * m_b;
            w_b += i_b * self.r_b.cross(impulse);
        }

        velocities[ia.index].v = v_a;
        velocities[ia.index].w = w_a;
        velocities[ib.index].v = v_b;
        velocities[ib.index].w = w_b;
    }

    fn solve_position(&mut self, positions: &mut [Position]) -> bool {
        let (ia, ib) = (self.info_a, self.info_b);
        let mut c_a = positions[ia.index].c;
        let mut a_a = positions[ia.index].a;
        let mut c_b = positions[ib.index].c;
        let mut a_b = positions[ib.index].a;

        let mut angular_error = 0.0_f32;
        let fixed_rotation = ia.inv_i + ib.inv_i == 0.0;

        // Angle limit correction
        if self.enable_limit && !fixed_rotation {
            let angle = a_b - a_a - self.reference_angle;
            let mut c = 0.0;

            if (self.upper_angle - self.lower_angle).abs() < 2.0 * ANGULAR_SLOP {
                c = clamp(
                    angle - self.lower_angle,
                    -MAX_ANGULAR_CORRECTION,
                    MAX_ANGULAR_CORRECTION,
                );
            } else if angle <= self.lower_angle {
                c = clamp(
                    angle - self.lower_angle + ANGULAR_SLOP,
                    -MAX_ANGULAR_CORRECTION,
                    0.0,
                );
            } else if angle >= self.upper_angle {
                c = clamp(
                    angle - self.upper_angle - ANGULAR_SLOP,
                    0.0,
                    MAX_ANGULAR_CORRECTION,
                );
            }

            let impulse = -self.axial_mass * c;
            a_a -= ia.inv_i * impulse;
            a_b += ib.inv_i * impulse;
            angular_error = c.abs();
        }

        // Point correction
        let position_error;
        {
            let q_a = Rot::from_angle(a_a);
            let q_b = Rot::from_angle(a_b);
            let r_a = q_a.rotate(self.local_anchor_a - ia.local_center);
            let r_b = q_b.rotate(self.local_anchor_b - ib.local_center);

            let c = c_b + r_b - c_a - r_a;
            position_error = c.length();

            let m_a = ia.inv_mass;
            let m_b = ib.inv_mass;
            let i_a = ia.inv_i;
            let i_b = ib.inv_i;

            let k = Mat22::new(
                Vec2::new(
                    m_a + m_b + i_a * r_a.y * r_a.y + i_b * r_b.y * r_b.y,
                    -i_a * r_a.x * r_a.y - i_b * r_b.x * r_b.y,
                ),
                Vec2::new(
                    -i_a * r_a.x * r_a.y - i_b * r_b.x * r_b.y,
                    m_a + m_b + i_a * r_a.x * r_a.x + i_b * r_b.x * r_b.x,
                ),
            );

            let impulse = -(k.solve(c));

            c_a -= impulse * m_a;
            a_a -= i_a * r_a.cross(impulse);
            c_b += impulse * m_b;
            a_b += i_b * r_b.cross(impulse);
        }

        positions[ia.index].c = c_a;
        positions[ia.index].a = a_a;
        positions[ib.index].c = c_b;
        positions[ib.index].a = a_b;

        position_error <= LINEAR_SLOP && angular_error <= ANGULAR_SLOP
    }
}

// ============================================================================
// Prismatic joint
// ============================================================================

/// Slider: relative motion restricted to one axis fixed in body A, with an
/// optional translation limit and drive motor
#[derive(Clone, Debug)]
pub struct PrismaticJoint {
    /// Anchor in body A's frame
    pub local_anchor_a: Vec2,
    /// Anchor in body B's frame
    pub local_anchor_b: Vec2,
    /// Slide axis in body A's frame
    pub local_axis_a: Vec2,
    /// B angle minus A angle at rest
    pub reference_angle: f32,

    /// Limit enabled
    pub enable_limit: bool,
    /// Lower translation limit
    pub lower_translation: f32,
    /// Upper translation limit
    pub upper_translation: f32,
    /// Motor enabled
    pub enable_motor: bool,
    /// Target slide speed
    pub motor_speed: f32,
    /// Motor force budget
    pub max_motor_force: f32,

    // Accumulated impulses: (perpendicular, angular)
    impulse: Vec2,
    motor_impulse: f32,
    lower_impulse: f32,
    upper_impulse: f32,

    // Per-solve cache
    info_a: BodySolverInfo,
    info_b: BodySolverInfo,
    axis: Vec2,
    perp: Vec2,
    s1: f32,
    s2: f32,
    a1: f32,
    a2: f32,
    k: Mat22,
    translation: f32,
    axial_mass: f32,
}

impl PrismaticJoint {
    pub(crate) fn from_def(def: &PrismaticJointDef) -> Self {
        Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            local_axis_a: def.local_axis_a.normalized(),
            reference_angle: def.reference_angle,
            enable_limit: def.enable_limit,
            lower_translation: def.lower_translation,
            upper_translation: def.upper_translation,
            enable_motor: def.enable_motor,
            motor_speed: def.motor_speed,
            max_motor_force: def.max_motor_force,
            impulse: Vec2::ZERO,
            motor_impulse: 0.0,
            lower_impulse: 0.0,
            upper_impulse: 0.0,
            info_a: BodySolverInfo::default(),
            info_b: BodySolverInfo::default(),
            axis: Vec2::ZERO,
            perp: Vec2::ZERO,
            s1: 0.0,
            s2: 0.0,
            a1: 0.0,
            a2: 0.0,
            k: Mat22::default(),
            translation: 0.0,
            axial_mass: 0.0,
        }
    }

    /// Current translation along the slide axis
    #[inline]
    pub fn joint_translation(&self) -> f32 {
        self.translation
    }

    fn init(
        &mut self,
        step: &TimeStep,
        positions: &[Position],
        velocities: &mut [Velocity],
        info_a: BodySolverInfo,
        info_b: BodySolverInfo,
    ) {
        self.info_a = info_a;
        self.info_b = info_b;

        let c_a = positions[info_a.index].c;
        let a_a = positions[info_a.index].a;
        let c_b = positions[info_b.index].c;
        let a_b = positions[info_b.index].a;
        let q_a = Rot::from_angle(a_a);
        let q_b = Rot::from_angle(a_b);

        let r_a = q_a.rotate(self.local_anchor_a - info_a.local_center);
        let r_b = q_b.rotate(self.local_anchor_b - info_b.local_center);
        let d = c_b + r_b - c_a - r_a;

        let m_a = info_a.inv_mass;
        let m_b = info_b.inv_mass;
        let i_a = info_a.inv_i;
        let i_b = info_b.inv_i;

        // Axial (motor + limit) terms
        self.axis = q_a.rotate(self.local_axis_a);
        self.a1 = (d + r_a).cross(self.axis);
        self.a2 = r_b.cross(self.axis);
        let axial = m_a + m_b + i_a * self.a1 * self.a1 + i_b * self.a2 * self.a2;
        self.axial_mass = if axial > 0.0 { 1.0 / axial } else { 0.0 };

        // Perpendicular + angular block
        self.perp = q_a.rotate(self.local_axis_a.skew());
        self.s1 = (d + r_a).cross(self.perp);
        self.s2 = r_b.cross(self.perp);

        let k11 = m_a + m_b + i_a * self.s1 * self.s1 + i_b * self.s2 * self.s2;
        let k12 = i_a * self.s1 + i_b * self.s2;
        let mut k22 = i_a + i_b;
        if k22 == 0.0 {
            // Both bodies have fixed rotation
            k22 = 1.0;
        }
        self.k = Mat22::new(Vec2::new(k11, k12), Vec2::new(k12, k22));

        self.translation = self.axis.dot(d);

        if !self.enable_limit {
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
        if !self.enable_motor {
            self.motor_impulse = 0.0;
        }

        if step.warm_starting {
            self.impulse *= step.dt_ratio;
            self.motor_impulse *= step.dt_ratio;
            self.lower_impulse *= step.dt_ratio;
            self.upper_impulse *= step.dt_ratio;

            let axial_impulse = self.motor_impulse + self.lower_impulse - self.upper_impulse;
            let p = self.perp * self.impulse.x + self.axis * axial_impulse;
            let l_a = self.impulse.x * self.s1 + self.impulse.y + axial_impulse * self.a1;
            let l_b = self.impulse.x * self.s2 + self.impulse.y + axial_impulse * self.a2;

            velocities[info_a.index].v -= p * m_a;
            velocities[info_a.index].w -= i_a * l_a;
            velocities[info_b.index].v += p * m_b;
            velocities[info_b.index].w += i_b * l_b;
        } else {
            self.impulse = Vec2::ZERO;
            self.motor_impulse = 0.0;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
    }

    fn solve_velocity(&mut self, step: &TimeStep, velocities: &mut [Velocity]) {
        let (ia, ib) = (self.info_a, self.info_b);
        let m_a = ia.inv_mass;
        let m_b = ib.inv_mass;
        let i_a = ia.inv_i;
        let i_b = ib.inv_i;

        let mut v_a = velocities[ia.index].v;
        let mut w_a = velocities[ia.index].w;
        let mut v_b = velocities[ib.index].v;
        let mut w_b = velocities[ib.index].w;

        // Motor
        if self.enable_motor {
            let cdot = self.axis.dot(v_b - v_a) + self.a2 * w_b - self.a1 * w_a;
            let mut impulse = self.axial_mass * (self.motor_speed - cdot);
            let old_impulse = self.motor_impulse;
            let max_impulse = self.max_motor_force * step.dt;
            self.motor_impulse = clamp(old_impulse + impulse, -max_impulse, max_impulse);
            impulse = self.motor_impulse - old_impulse;

            let p = self.axis * impulse;
            v_a -= p * m_a;
            w_a -= i_a * impulse * self.a1;
            v_b += p * m_b;
            w_b += i_b * impulse * self.a2;
        }

        // Limits
        if self.enable_limit {
            // Lower
            {
                let c = self.translation - self.lower_translation;
                let cdot = self.axis.dot(v_b - v_a) + self.a2 * w_b - self.a1 * w_a;
                let mut impulse = -self.axial_mass * (cdot + c.min(0.0) * step.inv_dt);
                let old_impulse = self.lower_impulse;
                self.lower_impulse = (old_impulse + impulse).max(0.0);
                impulse = self.lower_impulse - old_impulse;

                let p = self.axis * impulse;
                v_a -= p * m_a;
                w_a -= i_a * impulse * self.a1;
                v_b += p * m_b;
                w_b += i_b * impulse * self.a2;
            }
            // Upper
            {
                let c = self.upper_translation - self.translation;
                let cdot = self.axis.dot(v_a - v_b) + self.a1 * w_a - self.a2 * w_b;
                let mut impulse = -self.axial_mass * (cdot + c.min(0.0) * step.inv_dt);
                let old_impulse = self.upper_impulse;
                self.upper_impulse = (old_impulse + impulse).max(0.0);
                impulse = self.upper_impulse - old_impulse;

                let p = self.axis * impulse;
                v_a += p * m_a;
                w_a += i_a * impulse * self.a1;
                v_b -= p * m_b;
                w_b -= i_b * impulse * self.a2;
            }
        }

        // Perpendicular + angular constraint
        {
            let cdot = Vec2::new(
                self.perp.dot(v_b - v_a) + self.s2 * w_b - self.s1 * w_a,
                w_b - w_a,
            );
            let df = self.k.solve(-cdot);
            self.impulse += df;

            let p = self.perp * df.x;
            let l_a = df.x * self.s1 + df.y;
            let l_b = df.x * self.s2 + df.y;

            v_a -= p * m_a;
            w_a -= i_a * l_a;
            v_b += p * m_b;
            w_b += i_b * l_b;
        }

        velocities[ia.index].v = v_a;
        velocities[ia.index].w = w_a;
        velocities[ib.index].v = v_b;
        velocities[ib.index].w = w_b;
    }

    fn solve_position(&mut self, positions: &mut [Position]) -> bool {
        let (ia, ib) = (self.info_a, self.info_b);
        let mut c_a = positions[ia.index].c;
        let mut a_a = positions[ia.index].a;
        let mut c_b = positions[ib.index].c;
        let mut a_b = positions[ib.index].a;

        let q_a = Rot::from_angle(a_a);
        let q_b = Rot::from_angle(a_b);

        let m_a = ia.inv_mass;
        let m_b = ib.inv_mass;
        let i_a = ia.inv_i;
        let i_b = ib.inv_i;

        let r_a = q_a.rotate(self.local_anchor_a - ia.local_center);
        let r_b = q_b.rotate(self.local_anchor_b - ib.local_center);
        let d = c_b + r_b - c_a - r_a;

        let axis = q_a.rotate(self.local_axis_a);
        let a1 = (d + r_a).cross(axis);
        let a2 = r_b.cross(axis);
        let perp = q_a.rotate(self.local_axis_a.skew());
        let s1 = (d + r_a).cross(perp);
        let s2 = r_b.cross(perp);

        let c1 = Vec2::new(perp.dot(d), a_b - a_a - self.reference_angle);
        let mut linear_error = c1.x.abs();
        let angular_error = c1.y.abs();

        // Limit correction joins the block when active
        let mut active = false;
        let mut c2 = 0.0_f32;
        if self.enable_limit {
            let translation = axis.dot(d);
            if (self.upper_translation - self.lower_translation).abs() < 2.0 * LINEAR_SLOP {
                c2 = clamp(translation, -MAX_LINEAR_CORRECTION, MAX_LINEAR_CORRECTION);
                linear_error = linear_error.max(translation.abs());
                active = true;
            } else if translation <= self.lower_translation {
                c2 = clamp(
                    translation - self.lower_translation + LINEAR_SLOP,
                    -MAX_LINEAR_CORRECTION,
                    0.0,
                );
                linear_error = linear_error.max(self.lower_translation - translation);
                active = true;
            } else if translation >= self.upper_translation {
                c2 = clamp(
                    translation - self.upper_translation - LINEAR_SLOP,
                    0.0,
                    MAX_LINEAR_CORRECTION,
                );
                linear_error = linear_error.max(translation - self.upper_translation);
                active = true;
            }
        }

        let impulse;
        if active {
            let k11 = m_a + m_b + i_a * s1 * s1 + i_b * s2 * s2;
            let k12 = i_a * s1 + i_b * s2;
            let k13 = i_a * s1 * a1 + i_b * s2 * a2;
            let mut k22 = i_a + i_b;
            if k22 == 0.0 {
                k22 = 1.0;
            }
            let k23 = i_a * a1 + i_b * a2;
            let k33 = m_a + m_b + i_a * a1 * a1 + i_b * a2 * a2;

            let k = Mat33 {
                ex: Vec3::new(k11, k12, k13),
                ey: Vec3::new(k12, k22, k23),
                ez: Vec3::new(k13, k23, k33),
            };
            impulse = k.solve33(-Vec3::new(c1.x, c1.y, c2));
        } else {
            let k11 = m_a + m_b + i_a * s1 * s1 + i_b * s2 * s2;
            let k12 = i_a * s1 + i_b * s2;
            let mut k22 = i_a + i_b;
            if k22 == 0.0 {
                k22 = 1.0;
            }
            let k = Mat22::new(Vec2::new(k11, k12), Vec2::new(k12, k22));
            let impulse1 = k.solve(-c1);
            impulse = Vec3::new(impulse1.x, impulse1.y, 0.0);
        }

        let p = perp * impulse.x + axis * impulse.z;
        let l_a = impulse.x * s1 + impulse.y + impulse.z * a1;
        let l_b = impulse.x * s2 + impulse.y + impulse.z * a2;

        c_a -= p * m_a;
        a_a -= i_a * l_a;
        c_b += p * m_b;
        a_b += i_b * l_b;

        positions[ia.index].c = c_a;
        positions[ia.index].a = a_a;
        positions[ib.index].c = c_b;
        positions[ib.index].a = a_b;

        linear_error <= LINEAR_SLOP && angular_error <= ANGULAR_SLOP
    }
}

// ============================================================================
// Distance joint
// ============================================================================

/// Rod or spring holding two anchors at a rest length
#[derive(Clone, Debug)]
pub struct DistanceJoint {
    /// Anchor in body A's frame
    pub local_anchor_a: Vec2,
    /// Anchor in body B's frame
    pub local_anchor_b: Vec2,
    /// Rest length
    pub length: f32,
    /// Spring stiffness; 0 = rigid rod
    pub stiffness: f32,
    /// Spring damping
    pub damping: f32,

    impulse: f32,

    // Per-solve cache
    info_a: BodySolverInfo,
    info_b: BodySolverInfo,
    u: Vec2,
    r_a: Vec2,
    r_b: Vec2,
    current_length: f32,
    mass: f32,
    soft_mass: f32,
    bias: f32,
    gamma: f32,
}

impl DistanceJoint {
    pub(crate) fn from_def(def: &DistanceJointDef) -> Self {
        Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            length: def.length.max(LINEAR_SLOP),
            stiffness: def.stiffness,
            damping: def.damping,
            impulse: 0.0,
            info_a: BodySolverInfo::default(),
            info_b: BodySolverInfo::default(),
            u: Vec2::ZERO,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            current_length: 0.0,
            mass: 0.0,
            soft_mass: 0.0,
            bias: 0.0,
            gamma: 0.0,
        }
    }

    fn init(
        &mut self,
        step: &TimeStep,
        positions: &[Position],
        velocities: &mut [Velocity],
        info_a: BodySolverInfo,
        info_b: BodySolverInfo,
    ) {
        self.info_a = info_a;
        self.info_b = info_b;

        let c_a = positions[info_a.index].c;
        let a_a = positions[info_a.index].a;
        let c_b = positions[info_b.index].c;
        let a_b = positions[info_b.index].a;
        let q_a = Rot::from_angle(a_a);
        let q_b = Rot::from_angle(a_b);

        self.r_a = q_a.rotate(self.local_anchor_a - info_a.local_center);
        self.r_b = q_b.rotate(self.local_anchor_b - info_b.local_center);
        self.u = c_b + self.r_b - c_a - self.r_a;

        self.current_length = self.u.normalize();
        if self.current_length < LINEAR_SLOP {
            self.u = Vec2::ZERO;
        }

        let cr_a = self.r_a.cross(self.u);
        let cr_b = self.r_b.cross(self.u);
        let inv_mass = info_a.inv_mass
            + info_a.inv_i * cr_a * cr_a
            + info_b.inv_mass
            + info_b.inv_i * cr_b * cr_b;
        self.mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };

        if self.stiffness > 0.0 {
            // Soft constraint: fold the spring into the effective mass
            let c = self.current_length - self.length;
            let d = self.damping;
            let k = self.stiffness;

            let h = step.dt;
            self.gamma = h * (d + h * k);
            self.gamma = if self.gamma != 0.0 { 1.0 / self.gamma } else { 0.0 };
            self.bias = c * h * k * self.gamma;

            let soft_inv = inv_mass + self.gamma;
            self.soft_mass = if soft_inv != 0.0 { 1.0 / soft_inv } else { 0.0 };
        } else {
            self.gamma = 0.0;
            self.bias = 0.0;
            self.soft_mass = self.mass;
        }

        if step.warm_starting {
            self.impulse *= step.dt_ratio;
            let p = self.u * self.impulse;
            velocities[info_a.index].v -= p * info_a.inv_mass;
            velocities[info_a.index].w -= info_a.inv_i * self.r_a.cross(p);
            velocities[info_b.index].v += p * info_b.inv_mass;
            velocities[info_b.index].w += info_b.inv_i * self.r_b.cross(p);
        } else {
            self.impulse = 0.0;
        }
    }

    fn solve_velocity(&mut self, _step: &TimeStep, velocities: &mut [Velocity]) {
        let (ia, ib) = (self.info_a, self.info_b);

        let mut v_a = velocities[ia.index].v;
        let mut w_a = velocities[ia.index].w;
        let mut v_b = velocities[ib.index].v;
        let mut w_b = velocities[ib.index].w;

        let vp_a = v_a + Vec2::scalar_cross(w_a, self.r_a);
        let vp_b = v_b + Vec2::scalar_cross(w_b, self.r_b);
        let cdot = self.u.dot(vp_b - vp_a);

        let impulse = -self.soft_mass * (cdot + self.bias + self.gamma * self.impulse);
        self.impulse += impulse;

        let p = self.u * impulse;
        v_a -= p * ia.inv_mass;
        w_a -= ia.inv_i * self.r_a.cross(p);
        v_b += p * ib.inv_mass;
        w_b += ib.inv_i * self.r_b.cross(p);

        velocities[ia.index].v = v_a;
        velocities[ia.index].w = w_a;
        velocities[ib.index].v = v_b;
        velocities[ib.index].w = w_b;
    }

    fn solve_position(&mut self, positions: &mut [Position]) -> bool {
        if self.stiffness > 0.0 {
            // Springs carry their own error; nothing to correct
            return true;
        }

        let (ia, ib) = (self.info_a, self.info_b);
        let mut c_a = positions[ia.index].c;
        let mut a_a = positions[ia.index].a;
        let mut c_b = positions[ib.index].c;
        let mut a_b = positions[ib.index].a;

        let q_a = Rot::from_angle(a_a);
        let q_b = Rot::from_angle(a_b);
        let r_a = q_a.rotate(self.local_anchor_a - ia.local_center);
        let r_b = q_b.rotate(self.local_anchor_b - ib.local_center);
        let mut u = c_b + r_b - c_a - r_a;

        let length = u.normalize();
        let c = clamp(
            length - self.length,
            -MAX_LINEAR_CORRECTION,
            MAX_LINEAR_CORRECTION,
        );

        let impulse = -self.mass * c;
        let p = u * impulse;

        c_a -= p * ia.inv_mass;
        a_a -= ia.inv_i * r_a.cross(p);
        c_b += p * ib.inv_mass;
        a_b += ib.inv_i * r_b.cross(p);

        positions[ia.index].c = c_a;
        positions[ia.index].a = a_a;
        positions[ib.index].c = c_b;
        positions[ib.index].a = a_b;

        c.abs() < LINEAR_SLOP
    }
}

// ============================================================================
// Weld joint
// ============================================================================

/// Locks relative position and angle; the angle lock can be softened into a
/// rotational spring via stiffness/damping
#[derive(Clone, Debug)]
pub struct WeldJoint {
    /// Anchor in body A's frame
    pub local_anchor_a: Vec2,
    /// Anchor in body B's frame
    pub local_anchor_b: Vec2,
    /// B angle minus A angle at rest
    pub reference_angle: f32,
    /// Angular spring stiffness; 0 = rigid
    pub stiffness: f32,
    /// Angular spring damping
    pub damping: f32,

    impulse: Vec3,

    // Per-solve cache
    info_a: BodySolverInfo,
    info_b: BodySolverInfo,
    r_a: Vec2,
    r_b: Vec2,
    mass: Mat33,
    bias: f32,
    gamma: f32,
}

impl WeldJoint {
    pub(crate) fn from_def(def: &WeldJointDef) -> Self {
        Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            reference_angle: def.reference_angle,
            stiffness: def.stiffness,
            damping: def.damping,
            impulse: Vec3::ZERO,
            info_a: BodySolverInfo::default(),
            info_b: BodySolverInfo::default(),
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            mass: Mat33::ZERO,
            bias: 0.0,
            gamma: 0.0,
        }
    }

    fn init(
        &mut self,
        step: &TimeStep,
        positions: &[Position],
        velocities: &mut [Velocity],
        info_a: BodySolverInfo,
        info_b: BodySolverInfo,
    ) {
        self.info_a = info_a;
        self.info_b = info_b;

        let a_a = positions[info_a.index].a;
        let a_b = positions[info_b.index].a;
        let q_a = Rot::from_angle(a_a);
        let q_b = Rot::from_angle(a_b);

        self.r_a = q_a.rotate(self.local_anchor_a - info_a.local_center);
        self.r_b = q_b.rotate(self.local_anchor_b - info_b.local_center);

        let m_a = info_a.inv_mass;
        let m_b = info_b.inv_mass;
        let i_a = info_a.inv_i;
        let i_b = info_b.inv_i;

        let mut k = Mat33::ZERO;
        k.ex.x = m_a + m_b + self.r_a.y * self.r_a.y * i_a + self.r_b.y * self.r_b.y * i_b;
        k.ey.x = -self.r_a.y * self.r_a.x * i_a - self.r_b.y * self.r_b.x * i_b;
        k.ez.x = -self.r_a.y * i_a - self.r_b.y * i_b;
        k.ex.y = k.ey.x;
        k.ey.y = m_a + m_b + self.r_a.x * self.r_a.x * i_a + self.r_b.x * self.r_b.x * i_b;
        k.ez.y = self.r_a.x * i_a + self.r_b.x * i_b;
        k.ex.z = k.ez.x;
        k.ey.z = k.ez.y;
        k.ez.z = i_a + i_b;

        if self.stiffness > 0.0 {
            self.mass = k.inverse22();

            let mut inv_i = i_a + i_b;
            let c = a_b - a_a - self.reference_angle;

            let h = step.dt;
            self.gamma = h * (self.damping + h * self.stiffness);
            self.gamma = if self.gamma != 0.0 { 1.0 / self.gamma } else { 0.0 };
            self.bias = c * h * self.stiffness * self.gamma;

            inv_i += self.gamma;
            self.mass.ez.z = if inv_i != 0.0 { 1.0 / inv_i } else { 0.0 };
        } else if k.ez.z == 0.0 {
            self.mass = k.inverse22();
            self.gamma = 0.0;
            self.bias = 0.0;
        } else {
            self.mass = k.sym_inverse33();
            self.gamma = 0.0;
            self.bias = 0.0;
        }

        if step.warm_starting {
            self.impulse = self.impulse * step.dt_ratio;
            let p = Vec2::new(self.impulse.x, self.impulse.y);

            velocities[info_a.index].v -= p * m_a;
            velocities[info_a.index].w -= i_a * (self.r_a.cross(p) + self.impulse.z);
            velocities[info_b.index].v += p * m_b;
            velocities[info_b.index].w += i_b * (self.r_b.cross(p) + self.impulse.z);
        } else {
            self.impulse = Vec3::ZERO;
        }
    }

    fn solve_velocity(&mut self, _step: &TimeStep, velocities: &mut [Velocity]) {
        let (ia, ib) = (self.info_a, self.info_b);
        let m_a = ia.inv_mass;
        let m_b = ib.inv_mass;
        let i_a = ia.inv_i;
        let i_b = ib.inv_i;

        let mut v_a = velocities[ia.index].v;
        let mut w_a = velocities[ia.index].w;
        let mut v_b = velocities[ib.index].v;
        let mut w_b = velocities[ib.index].w;

        if self.stiffness > 0.0 {
            // Soft angular part first
            let cdot2 = w_b - w_a;
            let impulse2 =
                -self.mass.ez.z * (cdot2 + self.bias + self.gamma * self.impulse.z);
            self.impulse.z += impulse2;

            w_a -= i_a * impulse2;
            w_b += i_b * impulse2;

            // Rigid linear part
            let cdot1 = v_b + Vec2::scalar_cross(w_b, self.r_b)
                - v_a
                - Vec2::scalar_cross(w_a, self.r_a);
            let impulse1 = -(self.mass.solve22(cdot1));
            self.impulse.x += impulse1.x;
            self.impulse.y += impulse1.y;

            v_a -= impulse1 * m_a;
            w_a -= i_a * self.r_a.cross(impulse1);
            v_b += impulse1 * m_b;
            w_b += i_b * self.r_b.cross(impulse1);
        } else {
            let cdot1 = v_b + Vec2::scalar_cross(w_b, self.r_b)
                - v_a
                - Vec2::scalar_cross(w_a, self.r_a);
            let cdot2 = w_b - w_a;
            let cdot = Vec3::new(cdot1.x, cdot1.y, cdot2);

            let impulse = -(self.mass.solve33(cdot));
            self.impulse = self.impulse + impulse;

            let p = Vec2::new(impulse.x, impulse.y);
            v_a -= p * m_a;
            w_a -= i_a * (self.r_a.cross(p) + impulse.z);
            v_b += p * m_b;
            w_b += i_b * (self.r_b.cross(p) + impulse.z);
        }

        velocities[ia.index].v = v_a;
        velocities[ia.index].w = w_a;
        velocities[ib.index].v = v_b;
        velocities[ib.index].w = w_b;
    }

    fn solve_position(&mut self, positions: &mut [Position]) -> bool {
        let (ia, ib) = (self.info_a, self.info_b);
        let mut c_a = positions[ia.index].c;
        let mut a_a = positions[ia.index].a;
        let mut c_b = positions[ib.index].c;
        let mut a_b = positions[ib.index].a;

        let q_a = Rot::from_angle(a_a);
        let q_b = Rot::from_angle(a_b);

        let m_a = ia.inv_mass;
        let m_b = ib.inv_mass;
        let i_a = ia.inv_i;
        let i_b = ib.inv_i;

        let r_a = q_a.rotate(self.local_anchor_a - ia.local_center);
        let r_b = q_b.rotate(self.local_anchor_b - ib.local_center);

        let mut k = Mat33::ZERO;
        k.ex.x = m_a + m_b + r_a.y * r_a.y * i_a + r_b.y * r_b.y * i_b;
        k.ey.x = -r_a.y * r_a.x * i_a - r_b.y * r_b.x * i_b;
        k.ez.x = -r_a.y * i_a - r_b.y * i_b;
        k.ex.y = k.ey.x;
        k.ey.y = m_a + m_b + r_a.x * r_a.x * i_a + r_b.x * r_b.x * i_b;
        k.ez.y = r_a.x * i_a + r_b.x * i_b;
        k.ex.z = k.ez.x;
        k.ey.z = k.ez.y;
        k.ez.z = i_a + i_b;

        let position_error;
        let angular_error;

        if self.stiffness > 0.0 {
            let c1 = c_b + r_b - c_a - r_a;
            position_error = c1.length();
            angular_error = 0.0;

            let p = -(k.solve22(c1));

            c_a -= p * m_a;
            a_a -= i_a * r_a.cross(p);
            c_b += p * m_b;
            a_b += i_b * r_b.cross(p);
        } else {
            let c1 = c_b + r_b - c_a - r_a;
            let c2 = a_b - a_a - self.reference_angle;

            position_error = c1.length();
            angular_error = c2.abs();

            let c = Vec3::new(c1.x, c1.y, c2);
            let impulse = if k.ez.z > 0.0 {
                -(k.solve33(c))
            } else {
                let impulse2 = -(k.solve22(c1));
                Vec3::new(impulse2.x, impulse2.y, 0.0)
            };

            let p = Vec2::new(impulse.x, impulse.y);
            c_a -= p * m_a;
            a_a -= i_a * (r_a.cross(p) + impulse.z);
            c_b += p * m_b;
            a_b += i_b * (r_b.cross(p) + impulse.z);
        }

        positions[ia.index].c = c_a;
        positions[ia.index].a = a_a;
        positions[ib.index].c = c_b;
        positions[ib.index].a = a_b;

        position_error <= LINEAR_SLOP && angular_error <= ANGULAR_SLOP
    }
}

// ============================================================================
// Mouse joint
// ============================================================================

/// Soft spring dragging body B's anchor toward a movable world target
#[derive(Clone, Debug)]
pub struct MouseJoint {
    /// World target
    pub target: Vec2,
    /// Anchor in body B's frame
    pub local_anchor_b: Vec2,
    /// Force budget
    pub max_force: f32,
    /// Spring stiffness
    pub stiffness: f32,
    /// Spring damping
    pub damping: f32,

    impulse: Vec2,

    // Per-solve cache
    info_b: BodySolverInfo,
    r_b: Vec2,
    mass: Mat22,
    c: Vec2,
    beta: f32,
    gamma: f32,
}

impl MouseJoint {
    pub(crate) fn from_def(def: &MouseJointDef) -> Self {
        Self {
            target: def.target,
            local_anchor_b: Vec2::ZERO,
            max_force: def.max_force,
            stiffness: def.stiffness,
            damping: def.damping,
            impulse: Vec2::ZERO,
            info_b: BodySolverInfo::default(),
            r_b: Vec2::ZERO,
            mass: Mat22::default(),
            c: Vec2::ZERO,
            beta: 0.0,
            gamma: 0.0,
        }
    }

    /// Move the drag target
    #[inline]
    pub fn set_target(&mut self, target: Vec2) {
        self.target = target;
    }

    fn init(
        &mut self,
        step: &TimeStep,
        positions: &[Position],
        velocities: &mut [Velocity],
        _info_a: BodySolverInfo,
        info_b: BodySolverInfo,
    ) {
        self.info_b = info_b;

        let c_b = positions[info_b.index].c;
        let a_b = positions[info_b.index].a;
        let q_b = Rot::from_angle(a_b);

        let d = self.damping;
        let k = self.stiffness;

        let h = step.dt;
        self.gamma = h * (d + h * k);
        if self.gamma != 0.0 {
            self.gamma = 1.0 / self.gamma;
        }
        self.beta = h * k * self.gamma;

        self.r_b = q_b.rotate(self.local_anchor_b - info_b.local_center);

        // K = invMass * I + invI * skew(rB) * skew(rB)^T + gamma * I
        let m_b = info_b.inv_mass;
        let i_b = info_b.inv_i;
        let k_matrix = Mat22::new(
            Vec2::new(
                m_b + i_b * self.r_b.y * self.r_b.y + self.gamma,
                -i_b * self.r_b.x * self.r_b.y,
            ),
            Vec2::new(
                -i_b * self.r_b.x * self.r_b.y,
                m_b + i_b * self.r_b.x * self.r_b.x + self.gamma,
            ),
        );
        self.mass = k_matrix.inverse();

        self.c = (c_b + self.r_b - self.target) * self.beta;

        // A dragged body never coasts at full speed
        velocities[info_b.index].w *= 0.98;

        if step.warm_starting {
            self.impulse *= step.dt_ratio;
            velocities[info_b.index].v += self.impulse * m_b;
            velocities[info_b.index].w += i_b * self.r_b.cross(self.impulse);
        } else {
            self.impulse = Vec2::ZERO;
        }
    }

    fn solve_velocity(&mut self, step: &TimeStep, velocities: &mut [Velocity]) {
        let ib = self.info_b;
        let mut v_b = velocities[ib.index].v;
        let mut w_b = velocities[ib.index].w;

        let cdot = v_b + Vec2::scalar_cross(w_b, self.r_b);
        let mut impulse = self
            .mass
            .mul_vec(-(cdot + self.c + self.impulse * self.gamma));

        let old_impulse = self.impulse;
        self.impulse += impulse;
        let max_impulse = step.dt * self.max_force;
        if self.impulse.dot(self.impulse) > max_impulse * max_impulse {
            self.impulse *= max_impulse / self.impulse.length();
        }
        impulse = self.impulse - old_impulse;

        v_b += impulse * ib.inv_mass;
        w_b += ib.inv_i * self.r_b.cross(impulse);

        velocities[ib.index].v = v_b;
        velocities[ib.index].w = w_b;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyDef;

    fn step_60hz() -> TimeStep {
        TimeStep {
            dt: 1.0 / 60.0,
            inv_dt: 60.0,
            dt_ratio: 1.0,
            velocity_iterations: 8,
            position_iterations: 3,
            warm_starting: true,
        }
    }

    fn body_pair() -> (Pool<Body>, BodyId, BodyId) {
        use crate::circle::CircleShape;
        use crate::collider::Shape;
        use crate::fixture::{Fixture, FixtureDef};

        let mut bodies = Pool::new();
        let mut fixtures = Pool::new();
        let a = bodies.insert(Body::from_def(&BodyDef::static_at(Vec2::ZERO)));
        let b = bodies.insert(Body::from_def(&BodyDef::dynamic_at(Vec2::new(2.0, 0.0))));

        // The dynamic body needs real rotational inertia for motor and limit
        // impulses to act on it
        let def = FixtureDef::new(Shape::Circle(CircleShape::new(Vec2::ZERO, 0.5)));
        let fixture_id = fixtures.insert(Fixture::from_def(b, &def));
        bodies[b].fixtures.push(fixture_id);
        bodies[b].reset_mass_data(&fixtures);

        bodies[a].island_index = 0;
        bodies[b].island_index = 1;
        (bodies, a, b)
    }

    #[test]
    fn test_distance_joint_holds_length() {
        let (bodies, a, b) = body_pair();
        let def = DistanceJointDef::new(
            a,
            b,
            &bodies[a].transform(),
            &bodies[b].transform(),
            Vec2::ZERO,
            Vec2::new(2.0, 0.0),
        );
        assert!((def.length - 2.0).abs() < 1e-5);

        let mut joint = DistanceJoint::from_def(&def);
        let step = step_60hz();

        let positions = [
            Position {
                c: Vec2::ZERO,
                a: 0.0,
            },
            Position {
                c: Vec2::new(2.0, 0.0),
                a: 0.0,
            },
        ];
        // Body B pulling away along +x
        let mut velocities = [
            Velocity::default(),
            Velocity {
                v: Vec2::new(1.0, 0.0),
                w: 0.0,
            },
        ];

        joint.init(
            &step,
            &positions,
            &mut velocities,
            BodySolverInfo::from_body(&bodies[a]),
            BodySolverInfo::from_body(&bodies[b]),
        );
        for _ in 0..8 {
            joint.solve_velocity(&step, &mut velocities);
        }

        // Separating velocity along the rod is killed
        assert!(velocities[1].v.x.abs() < 1e-3, "v = {:?}", velocities[1].v);
    }

    #[test]
    fn test_revolute_motor_spins_body() {
        let (bodies, a, b) = body_pair();
        let mut def = RevoluteJointDef::new(
            a,
            b,
            &bodies[a].transform(),
            &bodies[b].transform(),
            Vec2::new(2.0, 0.0),
        );
        def.enable_motor = true;
        def.motor_speed = 5.0;
        def.max_motor_torque = 1000.0;

        let mut joint = RevoluteJoint::from_def(&def);
        let step = step_60hz();

        let positions = [
            Position {
                c: Vec2::ZERO,
                a: 0.0,
            },
            Position {
                c: Vec2::new(2.0, 0.0),
                a: 0.0,
            },
        ];
        let mut velocities = [Velocity::default(), Velocity::default()];

        joint.init(
            &step,
            &positions,
            &mut velocities,
            BodySolverInfo::from_body(&bodies[a]),
            BodySolverInfo::from_body(&bodies[b]),
        );
        for _ in 0..8 {
            joint.solve_velocity(&step, &mut velocities);
        }

        assert!(
            velocities[1].w > 1.0,
            "motor should spin the body, w = {}",
            velocities[1].w
        );
    }

    #[test]
    fn test_revolute_limit_blocks_angle() {
        let (bodies, a, b) = body_pair();
        let mut def = RevoluteJointDef::new(
            a,
            b,
            &bodies[a].transform(),
            &bodies[b].transform(),
            Vec2::new(2.0, 0.0),
        );
        def.enable_limit = true;
        def.lower_angle = -0.1;
        def.upper_angle = 0.1;

        let mut joint = RevoluteJoint::from_def(&def);
        let step = step_60hz();

        // Angle exactly at the upper limit, still spinning up
        let positions = [
            Position {
                c: Vec2::ZERO,
                a: 0.0,
            },
            Position {
                c: Vec2::new(2.0, 0.0),
                a: 0.1,
            },
        ];
        let mut velocities = [
            Velocity::default(),
            Velocity {
                v: Vec2::ZERO,
                w: 4.0,
            },
        ];

        joint.init(
            &step,
            &positions,
            &mut velocities,
            BodySolverInfo::from_body(&bodies[a]),
            BodySolverInfo::from_body(&bodies[b]),
        );
        for _ in 0..8 {
            joint.solve_velocity(&step, &mut velocities);
        }

        assert!(
            velocities[1].w < 0.5,
            "limit should stop the spin, w = {}",
            velocities[1].w
        );
    }

    #[test]
    fn test_weld_position_correction() {
        let (bodies, a, b) = body_pair();
        let def = WeldJointDef::new(
            a,
            b,
            &bodies[a].transform(),
            &bodies[b].transform(),
            Vec2::new(2.0, 0.0),
        );
        let mut joint = WeldJoint::from_def(&def);
        let step = step_60hz();

        // Body B drifted off the weld point
        let mut positions = [
            Position {
                c: Vec2::ZERO,
                a: 0.0,
            },
            Position {
                c: Vec2::new(2.3, 0.1),
                a: 0.05,
            },
        ];
        let mut velocities = [Velocity::default(), Velocity::default()];

        joint.init(
            &step,
            &positions,
            &mut velocities,
            BodySolverInfo::from_body(&bodies[a]),
            BodySolverInfo::from_body(&bodies[b]),
        );

        let error_before = (positions[1].c - Vec2::new(2.0, 0.0)).length();
        for _ in 0..10 {
            joint.solve_position(&mut positions);
        }
        let error_after = (positions[1].c - Vec2::new(2.0, 0.0)).length();

        assert!(
            error_after < 0.2 * error_before,
            "weld should pull the body back ({error_before} -> {error_after})"
        );
    }

    #[test]
    fn test_mouse_joint_pulls_toward_target() {
        let (bodies, a, b) = body_pair();
        let def = MouseJointDef {
            base: JointBaseDef::new(a, b),
            target: Vec2::new(5.0, 0.0),
            max_force: 1000.0,
            stiffness: 50.0,
            damping: 1.0,
        };
        let mut joint = MouseJoint::from_def(&def);
        let step = step_60hz();

        let positions = [
            Position {
                c: Vec2::ZERO,
                a: 0.0,
            },
            Position {
                c: Vec2::new(2.0, 0.0),
                a: 0.0,
            },
        ];
        let mut velocities = [Velocity::default(), Velocity::default()];

        joint.init(
            &step,
            &positions,
            &mut velocities,
            BodySolverInfo::from_body(&bodies[a]),
            BodySolverInfo::from_body(&bodies[b]),
        );
        for _ in 0..8 {
            joint.solve_velocity(&step, &mut velocities);
        }

        assert!(
            velocities[1].v.x > 0.0,
            "body should accelerate toward the target"
        );
    }
}
