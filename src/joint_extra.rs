//! Additional Joint Constraints
//!
//! The less common joint kinds: pulley, gear, wheel, friction, and motor.
//! Same solver contract as `joint`: cached masses refreshed per island
//! solve, warm-started accumulated impulses, optional position correction.

use crate::body::{Body, BodyId};
use crate::error::PhysicsError;
use crate::island::{Position, TimeStep, Velocity};
use crate::joint::{BodySolverInfo, Joint, JointBaseDef, JointId, JointKind};
use crate::math::{clamp, Mat22, Rot, Vec2};
use crate::pool::Pool;
use crate::tuning::LINEAR_SLOP;

// ============================================================================
// Friction joint
// ============================================================================

/// Friction joint definition
#[derive(Clone, Copy, Debug)]
pub struct FrictionJointDef {
    /// Common fields
    pub base: JointBaseDef,
    /// Anchor in body A's frame
    pub local_anchor_a: Vec2,
    /// Anchor in body B's frame
    pub local_anchor_b: Vec2,
    /// Maximum friction force (N)
    pub max_force: f32,
    /// Maximum friction torque (N·m)
    pub max_torque: f32,
}

/// Top-down friction: bleeds relative linear and angular velocity between
/// two bodies, bounded by force/torque budgets
#[derive(Clone, Debug)]
pub struct FrictionJoint {
    /// Anchor in body A's frame
    pub local_anchor_a: Vec2,
    /// Anchor in body B's frame
    pub local_anchor_b: Vec2,
    /// Maximum friction force
    pub max_force: f32,
    /// Maximum friction torque
    pub max_torque: f32,

    linear_impulse: Vec2,
    angular_impulse: f32,

    info_a: BodySolverInfo,
    info_b: BodySolverInfo,
    r_a: Vec2,
    r_b: Vec2,
    linear_mass: Mat22,
    angular_mass: f32,
}

impl FrictionJoint {
    pub(crate) fn from_def(def: &FrictionJointDef) -> Self {
        Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            max_force: def.max_force,
            max_torque: def.max_torque,
            linear_impulse: Vec2::ZERO,
            angular_impulse: 0.0,
            info_a: BodySolverInfo::default(),
            info_b: BodySolverInfo::default(),
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            linear_mass: Mat22::default(),
            angular_mass: 0.0,
        }
    }

    pub(crate) fn init(
        &mut self,
        step: &TimeStep,
        positions: &[Position],
        velocities: &mut [Velocity],
        info_a: BodySolverInfo,
        info_b: BodySolverInfo,
    ) {
        self.info_a = info_a;
        self.info_b = info_b;

        let q_a = Rot::from_angle(positions[info_a.index].a);
        let q_b = Rot::from_angle(positions[info_b.index].a);

        self.r_a = q_a.rotate(self.local_anchor_a - info_a.local_center);
        self.r_b = q_b.rotate(self.local_anchor_b - info_b.local_center);

        let m_a = info_a.inv_mass;
        let m_b = info_b.inv_mass;
        let i_a = info_a.inv_i;
        let i_b = info_b.inv_i;

        let k = Mat22::new(
            Vec2::new(
                m_a + m_b + i_a * self.r_a.y * self.r_a.y + i_b * self.r_b.y * self.r_b.y,
                -i_a * self.r_a.x * self.r_a.y - i_b * self.r_b.x * self.r_b.y,
            ),
            Vec2::new(
                -i_a * self.r_a.x * self.r_a.y - i_b * self.r_b.x * self.r_b.y,
                m_a + m_b + i_a * self.r_a.x * self.r_a.x + i_b * self.r_b.x * self.r_b.x,
            ),
        );
        self.linear_mass = k.inverse();

        let angular = i_a + i_b;
        self.angular_mass = if angular > 0.0 { 1.0 / angular } else { 0.0 };

        if step.warm_starting {
            self.linear_impulse *= step.dt_ratio;
            self.angular_impulse *= step.dt_ratio;

            let p = self.linear_impulse;
            velocities[info_a.index].v -= p * m_a;
            velocities[info_a.index].w -= i_a * (self.r_a.cross(p) + self.angular_impulse);
            velocities[info_b.index].v += p * m_b;
            velocities[info_b.index].w += i_b * (self.r_b.cross(p) + self.angular_impulse);
        } else {
            self.linear_impulse = Vec2::ZERO;
            self.angular_impulse = 0.0;
        }
    }

    pub(crate) fn solve_velocity(&mut self, step: &TimeStep, velocities: &mut [Velocity]) {
        let (ia, ib) = (self.info_a, self.info_b);
        let m_a = ia.inv_mass;
        let m_b = ib.inv_mass;
        let i_a = ia.inv_i;
        let i_b = ib.inv_i;

        let mut v_a = velocities[ia.index].v;
        let mut w_a = velocities[ia.index].w;
        let mut v_b = velocities[ib.index].v;
        let mut w_b = velocities[ib.index].w;

        let h = step.dt;

        // Angular friction
        {
            let cdot = w_b - w_a;
            let mut impulse = -self.angular_mass * cdot;

            let old_impulse = self.angular_impulse;
            let max_impulse = h * self.max_torque;
            self.angular_impulse = clamp(old_impulse + impulse, -max_impulse, max_impulse);
            impulse = self.angular_impulse - old_impulse;

            w_a -= i_a * impulse;
            w_b += i_b * impulse;
        }

        // Linear friction
        {
            let cdot = v_b + Vec2::scalar_cross(w_b, self.r_b)
                - v_a
                - Vec2::scalar_cross(w_a, self.r_a);

            let mut impulse = -(self.linear_mass.mul_vec(cdot));
            let old_impulse = self.linear_impulse;
            self.linear_impulse += impulse;

            let max_impulse = h * self.max_force;
            if self.linear_impulse.dot(self.linear_impulse) > max_impulse * max_impulse {
                self.linear_impulse *= max_impulse / self.linear_impulse.length();
            }
            impulse = self.linear_impulse - old_impulse;

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
}

// ============================================================================
// Motor joint
// ============================================================================

/// Motor joint definition
#[derive(Clone, Copy, Debug)]
pub struct MotorJointDef {
    /// Common fields
    pub base: JointBaseDef,
    /// Target position of B in A's frame
    pub linear_offset: Vec2,
    /// Target angle of B relative to A
    pub angular_offset: f32,
    /// Force budget
    pub max_force: f32,
    /// Torque budget
    pub max_torque: f32,
    /// Fraction of the error corrected per step, in (0, 1]
    pub correction_factor: f32,
}

/// Servo that drives body B toward a pose relative to body A using bounded
/// force and torque
#[derive(Clone, Debug)]
pub struct MotorJoint {
    /// Target position of B in A's frame
    pub linear_offset: Vec2,
    /// Target angle of B relative to A
    pub angular_offset: f32,
    /// Force budget
    pub max_force: f32,
    /// Torque budget
    pub max_torque: f32,
    /// Error-correction gain
    pub correction_factor: f32,

    linear_impulse: Vec2,
    angular_impulse: f32,

    info_a: BodySolverInfo,
    info_b: BodySolverInfo,
    r_a: Vec2,
    r_b: Vec2,
    linear_error: Vec2,
    angular_error: f32,
    linear_mass: Mat22,
    angular_mass: f32,
}

impl MotorJoint {
    pub(crate) fn from_def(def: &MotorJointDef) -> Self {
        Self {
            linear_offset: def.linear_offset,
            angular_offset: def.angular_offset,
            max_force: def.max_force,
            max_torque: def.max_torque,
            correction_factor: def.correction_factor,
            linear_impulse: Vec2::ZERO,
            angular_impulse: 0.0,
            info_a: BodySolverInfo::default(),
            info_b: BodySolverInfo::default(),
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            linear_error: Vec2::ZERO,
            angular_error: 0.0,
            linear_mass: Mat22::default(),
            angular_mass: 0.0,
        }
    }

    pub(crate) fn init(
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

        self.r_a = q_a.rotate(-info_a.local_center);
        self.r_b = q_b.rotate(-info_b.local_center);

        let m_a = info_a.inv_mass;
        let m_b = info_b.inv_mass;
        let i_a = info_a.inv_i;
        let i_b = info_b.inv_i;

        let k = Mat22::new(
            Vec2::new(
                m_a + m_b + i_a * self.r_a.y * self.r_a.y + i_b * self.r_b.y * self.r_b.y,
                -i_a * self.r_a.x * self.r_a.y - i_b * self.r_b.x * self.r_b.y,
            ),
            Vec2::new(
                -i_a * self.r_a.x * self.r_a.y - i_b * self.r_b.x * self.r_b.y,
                m_a + m_b + i_a * self.r_a.x * self.r_a.x + i_b * self.r_b.x * self.r_b.x,
            ),
        );
        self.linear_mass = k.inverse();

        let angular = i_a + i_b;
        self.angular_mass = if angular > 0.0 { 1.0 / angular } else { 0.0 };

        self.linear_error = c_b + self.r_b - c_a - self.r_a - q_a.rotate(self.linear_offset);
        self.angular_error = a_b - a_a - self.angular_offset;

        if step.warm_starting {
            self.linear_impulse *= step.dt_ratio;
            self.angular_impulse *= step.dt_ratio;

            let p = self.linear_impulse;
            velocities[info_a.index].v -= p * m_a;
            velocities[info_a.index].w -= i_a * (self.r_a.cross(p) + self.angular_impulse);
            velocities[info_b.index].v += p * m_b;
            velocities[info_b.index].w += i_b * (self.r_b.cross(p) + self.angular_impulse);
        } else {
            self.linear_impulse = Vec2::ZERO;
            self.angular_impulse = 0.0;
        }
    }

    pub(crate) fn solve_velocity(&mut self, step: &TimeStep, velocities: &mut [Velocity]) {
        let (ia, ib) = (self.info_a, self.info_b);
        let m_a = ia.inv_mass;
        let m_b = ib.inv_mass;
        let i_a = ia.inv_i;
        let i_b = ib.inv_i;

        let mut v_a = velocities[ia.index].v;
        let mut w_a = velocities[ia.index].w;
        let mut v_b = velocities[ib.index].v;
        let mut w_b = velocities[ib.index].w;

        let h = step.dt;
        let inv_h = step.inv_dt;

        // Angular servo
        {
            let cdot = w_b - w_a + inv_h * self.correction_factor * self.angular_error;
            let mut impulse = -self.angular_mass * cdot;

            let old_impulse = self.angular_impulse;
            let max_impulse = h * self.max_torque;
            self.angular_impulse = clamp(old_impulse + impulse, -max_impulse, max_impulse);
            impulse = self.angular_impulse - old_impulse;

            w_a -= i_a * impulse;
            w_b += i_b * impulse;
        }

        // Linear servo
        {
            let cdot = v_b + Vec2::scalar_cross(w_b, self.r_b)
                - v_a
                - Vec2::scalar_cross(w_a, self.r_a)
                + self.linear_error * (inv_h * self.correction_factor);

            let mut impulse = -(self.linear_mass.mul_vec(cdot));
            let old_impulse = self.linear_impulse;
            self.linear_impulse += impulse;

            let max_impulse = h * self.max_force;
            if self.linear_impulse.dot(self.linear_impulse) > max_impulse * max_impulse {
                self.linear_impulse *= max_impulse / self.linear_impulse.length();
            }
            impulse = self.linear_impulse - old_impulse;

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
}

// ============================================================================
// Pulley joint
// ============================================================================

/// Pulley joint definition
#[derive(Clone, Copy, Debug)]
pub struct PulleyJointDef {
    /// Common fields
    pub base: JointBaseDef,
    /// Fixed world anchor above body A
    pub ground_anchor_a: Vec2,
    /// Fixed world anchor above body B
    pub ground_anchor_b: Vec2,
    /// Rope attachment in body A's frame
    pub local_anchor_a: Vec2,
    /// Rope attachment in body B's frame
    pub local_anchor_b: Vec2,
    /// Rope length on the A side at rest
    pub length_a: f32,
    /// Rope length on the B side at rest
    pub length_b: f32,
    /// Mechanical advantage; side B's rope counts `ratio` times
    pub ratio: f32,
}

/// Idealized rope over two pulleys: `length_a + ratio · length_b` is held
/// constant
#[derive(Clone, Debug)]
pub struct PulleyJoint {
    /// Fixed world anchor above body A
    pub ground_anchor_a: Vec2,
    /// Fixed world anchor above body B
    pub ground_anchor_b: Vec2,
    /// Rope attachment in body A's frame
    pub local_anchor_a: Vec2,
    /// Rope attachment in body B's frame
    pub local_anchor_b: Vec2,
    /// Mechanical advantage
    pub ratio: f32,
    constant: f32,

    impulse: f32,

    info_a: BodySolverInfo,
    info_b: BodySolverInfo,
    u_a: Vec2,
    u_b: Vec2,
    r_a: Vec2,
    r_b: Vec2,
    mass: f32,
}

impl PulleyJoint {
    pub(crate) fn from_def(def: &PulleyJointDef) -> Self {
        debug_assert!(def.ratio > f32::EPSILON);
        Self {
            ground_anchor_a: def.ground_anchor_a,
            ground_anchor_b: def.ground_anchor_b,
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            ratio: def.ratio,
            constant: def.length_a + def.ratio * def.length_b,
            impulse: 0.0,
            info_a: BodySolverInfo::default(),
            info_b: BodySolverInfo::default(),
            u_a: Vec2::ZERO,
            u_b: Vec2::ZERO,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            mass: 0.0,
        }
    }

    pub(crate) fn init(
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

        self.u_a = c_a + self.r_a - self.ground_anchor_a;
        self.u_b = c_b + self.r_b - self.ground_anchor_b;

        // Rope ends too close to their pulleys lose their direction
        if self.u_a.normalize() <= 10.0 * LINEAR_SLOP {
            self.u_a = Vec2::ZERO;
        }
        if self.u_b.normalize() <= 10.0 * LINEAR_SLOP {
            self.u_b = Vec2::ZERO;
        }

        let ru_a = self.r_a.cross(self.u_a);
        let ru_b = self.r_b.cross(self.u_b);

        let m_a = info_a.inv_mass + info_a.inv_i * ru_a * ru_a;
        let m_b = info_b.inv_mass + info_b.inv_i * ru_b * ru_b;

        self.mass = m_a + self.ratio * self.ratio * m_b;
        if self.mass > 0.0 {
            self.mass = 1.0 / self.mass;
        }

        if step.warm_starting {
            self.impulse *= step.dt_ratio;

            let p_a = self.u_a * -self.impulse;
            let p_b = self.u_b * (-self.ratio * self.impulse);

            velocities[info_a.index].v += p_a * info_a.inv_mass;
            velocities[info_a.index].w += info_a.inv_i * self.r_a.cross(p_a);
            velocities[info_b.index].v += p_b * info_b.inv_mass;
            velocities[info_b.index].w += info_b.inv_i * self.r_b.cross(p_b);
        } else {
            self.impulse = 0.0;
        }
    }

    pub(crate) fn solve_velocity(&mut self, _step: &TimeStep, velocities: &mut [Velocity]) {
        let (ia, ib) = (self.info_a, self.info_b);

        let mut v_a = velocities[ia.index].v;
        let mut w_a = velocities[ia.index].w;
        let mut v_b = velocities[ib.index].v;
        let mut w_b = velocities[ib.index].w;

        let vp_a = v_a + Vec2::scalar_cross(w_a, self.r_a);
        let vp_b = v_b + Vec2::scalar_cross(w_b, self.r_b);

        let cdot = -self.u_a.dot(vp_a) - self.ratio * self.u_b.dot(vp_b);
        let impulse = -self.mass * cdot;
        self.impulse += impulse;

        let p_a = self.u_a * -impulse;
        let p_b = self.u_b * (-self.ratio * impulse);

        v_a += p_a * ia.inv_mass;
        w_a += ia.inv_i * self.r_a.cross(p_a);
        v_b += p_b * ib.inv_mass;
        w_b += ib.inv_i * self.r_b.cross(p_b);

        velocities[ia.index].v = v_a;
        velocities[ia.index].w = w_a;
        velocities[ib.index].v = v_b;
        velocities[ib.index].w = w_b;
    }

    pub(crate) fn solve_position(&mut self, positions: &mut [Position]) -> bool {
        let (ia, ib) = (self.info_a, self.info_b);
        let mut c_a = positions[ia.index].c;
        let mut a_a = positions[ia.index].a;
        let mut c_b = positions[ib.index].c;
        let mut a_b = positions[ib.index].a;

        let q_a = Rot::from_angle(a_a);
        let q_b = Rot::from_angle(a_b);

        let r_a = q_a.rotate(self.local_anchor_a - ia.local_center);
        let r_b = q_b.rotate(self.local_anchor_b - ib.local_center);

        let mut u_a = c_a + r_a - self.ground_anchor_a;
        let mut u_b = c_b + r_b - self.ground_anchor_b;

        let length_a = u_a.normalize();
        let length_b = u_b.normalize();
        if length_a <= 10.0 * LINEAR_SLOP {
            u_a = Vec2::ZERO;
        }
        if length_b <= 10.0 * LINEAR_SLOP {
            u_b = Vec2::ZERO;
        }

        let ru_a = r_a.cross(u_a);
        let ru_b = r_b.cross(u_b);

        let m_a = ia.inv_mass + ia.inv_i * ru_a * ru_a;
        let m_b = ib.inv_mass + ib.inv_i * ru_b * ru_b;

        let mut mass = m_a + self.ratio * self.ratio * m_b;
        if mass > 0.0 {
            mass = 1.0 / mass;
        }

        let c = self.constant - length_a - self.ratio * length_b;
        let linear_error = c.abs();

        let impulse = -mass * c;

        let p_a = u_a * -impulse;
        let p_b = u_b * (-self.ratio * impulse);

        c_a += p_a * ia.inv_mass;
        a_a += ia.inv_i * r_a.cross(p_a);
        c_b += p_b * ib.inv_mass;
        a_b += ib.inv_i * r_b.cross(p_b);

        positions[ia.index].c = c_a;
        positions[ia.index].a = a_a;
        positions[ib.index].c = c_b;
        positions[ib.index].a = a_b;

        linear_error < LINEAR_SLOP
    }
}

// ============================================================================
// Gear joint
// ============================================================================

/// Gear joint definition: constrains two existing revolute/prismatic joints
#[derive(Clone, Copy, Debug)]
pub struct GearJointDef {
    /// Common fields: body A is joint1's moving body, body B joint2's
    pub base: JointBaseDef,
    /// First joint (revolute or prismatic)
    pub joint1: JointId,
    /// Second joint (revolute or prismatic)
    pub joint2: JointId,
    /// `coordinate1 + ratio · coordinate2` is held constant
    pub ratio: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GearCoordinate {
    Revolute,
    Prismatic,
}

/// Couples the coordinates of two joints with a fixed ratio, modelling gear
/// teeth or a rack and pinion.
///
/// Destroy a gear before destroying either joint it references.
#[derive(Clone, Debug)]
pub struct GearJoint {
    /// Gear ratio
    pub ratio: f32,
    constant: f32,

    kind_a: GearCoordinate,
    kind_b: GearCoordinate,

    // Body C is joint1's ground side, body D joint2's
    body_c: BodyId,
    body_d: BodyId,

    local_anchor_a: Vec2,
    local_anchor_b: Vec2,
    local_anchor_c: Vec2,
    local_anchor_d: Vec2,
    local_axis_c: Vec2,
    local_axis_d: Vec2,
    reference_angle_a: f32,
    reference_angle_b: f32,

    impulse: f32,

    // Per-solve cache
    info_a: BodySolverInfo,
    info_b: BodySolverInfo,
    info_c: BodySolverInfo,
    info_d: BodySolverInfo,
    jv_ac: Vec2,
    jv_bd: Vec2,
    jw_a: f32,
    jw_b: f32,
    jw_c: f32,
    jw_d: f32,
    mass: f32,
    body_a: BodyId,
    body_b: BodyId,
}

impl GearJoint {
    /// Snapshot the frames of the two constituent joints. The def's bodies
    /// must be the moving sides of `joint1`/`joint2`.
    pub(crate) fn new(
        def: &GearJointDef,
        joint1: &Joint,
        joint2: &Joint,
        bodies: &Pool<Body>,
    ) -> Result<Self, PhysicsError> {
        let (kind_a, local_anchor_c, local_anchor_a, local_axis_c, reference_angle_a) =
            match &joint1.kind {
                JointKind::Revolute(j) => (
                    GearCoordinate::Revolute,
                    j.local_anchor_a,
                    j.local_anchor_b,
                    Vec2::UNIT_X,
                    j.reference_angle,
                ),
                JointKind::Prismatic(j) => (
                    GearCoordinate::Prismatic,
                    j.local_anchor_a,
                    j.local_anchor_b,
                    j.local_axis_a,
                    j.reference_angle,
                ),
                _ => {
                    return Err(PhysicsError::InvalidJointDef {
                        reason: "gear joint1 must be revolute or prismatic",
                    })
                }
            };

        let (kind_b, local_anchor_d, local_anchor_b, local_axis_d, reference_angle_b) =
            match &joint2.kind {
                JointKind::Revolute(j) => (
                    GearCoordinate::Revolute,
                    j.local_anchor_a,
                    j.local_anchor_b,
                    Vec2::UNIT_X,
                    j.reference_angle,
                ),
                JointKind::Prismatic(j) => (
                    GearCoordinate::Prismatic,
                    j.local_anchor_a,
                    j.local_anchor_b,
                    j.local_axis_a,
                    j.reference_angle,
                ),
                _ => {
                    return Err(PhysicsError::InvalidJointDef {
                        reason: "gear joint2 must be revolute or prismatic",
                    })
                }
            };

        let body_a = joint1.body_b();
        let body_c = joint1.body_a();
        let body_b = joint2.body_b();
        let body_d = joint2.body_a();

        if def.base.body_a != body_a || def.base.body_b != body_b {
            return Err(PhysicsError::InvalidJointDef {
                reason: "gear bodies must be the moving sides of the referenced joints",
            });
        }

        let xf_a = bodies[body_a].transform();
        let xf_b = bodies[body_b].transform();
        let xf_c = bodies[body_c].transform();
        let xf_d = bodies[body_d].transform();

        let coordinate_a = match kind_a {
            GearCoordinate::Revolute => xf_a.q.angle() - xf_c.q.angle() - reference_angle_a,
            GearCoordinate::Prismatic => {
                let p_c = local_anchor_c;
                let p_a = xf_c.inv_transform_point(xf_a.transform_point(local_anchor_a));
                (p_a - p_c).dot(local_axis_c)
            }
        };
        let coordinate_b = match kind_b {
            GearCoordinate::Revolute => xf_b.q.angle() - xf_d.q.angle() - reference_angle_b,
            GearCoordinate::Prismatic => {
                let p_d = local_anchor_d;
                let p_b = xf_d.inv_transform_point(xf_b.transform_point(local_anchor_b));
                (p_b - p_d).dot(local_axis_d)
            }
        };

        debug_assert!(def.ratio != 0.0);

        Ok(Self {
            ratio: def.ratio,
            constant: coordinate_a + def.ratio * coordinate_b,
            kind_a,
            kind_b,
            body_c,
            body_d,
            local_anchor_a,
            local_anchor_b,
            local_anchor_c,
            local_anchor_d,
            local_axis_c,
            local_axis_d,
            reference_angle_a,
            reference_angle_b,
            impulse: 0.0,
            info_a: BodySolverInfo::default(),
            info_b: BodySolverInfo::default(),
            info_c: BodySolverInfo::default(),
            info_d: BodySolverInfo::default(),
            jv_ac: Vec2::ZERO,
            jv_bd: Vec2::ZERO,
            jw_a: 0.0,
            jw_b: 0.0,
            jw_c: 0.0,
            jw_d: 0.0,
            mass: 0.0,
            body_a,
            body_b,
        })
    }

    pub(crate) fn init(
        &mut self,
        step: &TimeStep,
        positions: &[Position],
        velocities: &mut [Velocity],
        bodies: &Pool<Body>,
    ) {
        self.info_a = BodySolverInfo::from_body(&bodies[self.body_a]);
        self.info_b = BodySolverInfo::from_body(&bodies[self.body_b]);
        self.info_c = BodySolverInfo::from_body(&bodies[self.body_c]);
        self.info_d = BodySolverInfo::from_body(&bodies[self.body_d]);

        let (ia, ib, ic, id) = (self.info_a, self.info_b, self.info_c, self.info_d);

        let a_a = positions[ia.index].a;
        let a_b = positions[ib.index].a;
        let a_c = positions[ic.index].a;
        let a_d = positions[id.index].a;

        let q_a = Rot::from_angle(a_a);
        let q_b = Rot::from_angle(a_b);
        let q_c = Rot::from_angle(a_c);
        let q_d = Rot::from_angle(a_d);

        self.mass = 0.0;

        match self.kind_a {
            GearCoordinate::Revolute => {
                self.jv_ac = Vec2::ZERO;
                self.jw_a = 1.0;
                self.jw_c = 1.0;
                self.mass += ia.inv_i + ic.inv_i;
            }
            GearCoordinate::Prismatic => {
                let u = q_c.rotate(self.local_axis_c);
                let r_c = q_c.rotate(self.local_anchor_c - ic.local_center);
                let r_a = q_a.rotate(self.local_anchor_a - ia.local_center);
                self.jv_ac = u;
                self.jw_c = r_c.cross(u);
                self.jw_a = r_a.cross(u);
                self.mass += ic.inv_mass
                    + ia.inv_mass
                    + ic.inv_i * self.jw_c * self.jw_c
                    + ia.inv_i * self.jw_a * self.jw_a;
            }
        }

        match self.kind_b {
            GearCoordinate::Revolute => {
                self.jv_bd = Vec2::ZERO;
                self.jw_b = self.ratio;
                self.jw_d = self.ratio;
                self.mass += self.ratio * self.ratio * (ib.inv_i + id.inv_i);
            }
            GearCoordinate::Prismatic => {
                let u = q_d.rotate(self.local_axis_d);
                let r_d = q_d.rotate(self.local_anchor_d - id.local_center);
                let r_b = q_b.rotate(self.local_anchor_b - ib.local_center);
                self.jv_bd = u * self.ratio;
                self.jw_d = self.ratio * r_d.cross(u);
                self.jw_b = self.ratio * r_b.cross(u);
                self.mass += self.ratio * self.ratio * (id.inv_mass + ib.inv_mass)
                    + id.inv_i * self.jw_d * self.jw_d
                    + ib.inv_i * self.jw_b * self.jw_b;
            }
        }

        self.mass = if self.mass > 0.0 { 1.0 / self.mass } else { 0.0 };

        if step.warm_starting {
            self.apply_impulse(self.impulse, velocities);
        } else {
            self.impulse = 0.0;
        }
    }

    fn apply_impulse(&self, impulse: f32, velocities: &mut [Velocity]) {
        let (ia, ib, ic, id) = (self.info_a, self.info_b, self.info_c, self.info_d);

        velocities[ia.index].v += self.jv_ac * (ia.inv_mass * impulse);
        velocities[ia.index].w += ia.inv_i * impulse * self.jw_a;
        velocities[ib.index].v += self.jv_bd * (ib.inv_mass * impulse);
        velocities[ib.index].w += ib.inv_i * impulse * self.jw_b;
        velocities[ic.index].v -= self.jv_ac * (ic.inv_mass * impulse);
        velocities[ic.index].w -= ic.inv_i * impulse * self.jw_c;
        velocities[id.index].v -= self.jv_bd * (id.inv_mass * impulse);
        velocities[id.index].w -= id.inv_i * impulse * self.jw_d;
    }

    pub(crate) fn solve_velocity(&mut self, _step: &TimeStep, velocities: &mut [Velocity]) {
        let (ia, ib, ic, id) = (self.info_a, self.info_b, self.info_c, self.info_d);

        let v_a = velocities[ia.index].v;
        let w_a = velocities[ia.index].w;
        let v_b = velocities[ib.index].v;
        let w_b = velocities[ib.index].w;
        let v_c = velocities[ic.index].v;
        let w_c = velocities[ic.index].w;
        let v_d = velocities[id.index].v;
        let w_d = velocities[id.index].w;

        let cdot = self.jv_ac.dot(v_a - v_c) + self.jv_bd.dot(v_b - v_d) + self.jw_a * w_a
            - self.jw_c * w_c
            + self.jw_b * w_b
            - self.jw_d * w_d;

        let impulse = -self.mass * cdot;
        self.impulse += impulse;
        self.apply_impulse(impulse, velocities);
    }

    pub(crate) fn solve_position(&mut self, positions: &mut [Position]) -> bool {
        let (ia, ib, ic, id) = (self.info_a, self.info_b, self.info_c, self.info_d);

        let mut c_a = positions[ia.index].c;
        let mut a_a = positions[ia.index].a;
        let mut c_b = positions[ib.index].c;
        let mut a_b = positions[ib.index].a;
        let mut c_c = positions[ic.index].c;
        let mut a_c = positions[ic.index].a;
        let mut c_d = positions[id.index].c;
        let mut a_d = positions[id.index].a;

        let q_a = Rot::from_angle(a_a);
        let q_b = Rot::from_angle(a_b);
        let q_c = Rot::from_angle(a_c);
        let q_d = Rot::from_angle(a_d);

        let mut mass = 0.0_f32;

        let (jv_ac, jw_a, jw_c, coordinate_a);
        match self.kind_a {
            GearCoordinate::Revolute => {
                jv_ac = Vec2::ZERO;
                jw_a = 1.0;
                jw_c = 1.0;
                mass += ia.inv_i + ic.inv_i;
                coordinate_a = a_a - a_c - self.reference_angle_a;
            }
            GearCoordinate::Prismatic => {
                let u = q_c.rotate(self.local_axis_c);
                let r_c = q_c.rotate(self.local_anchor_c - ic.local_center);
                let r_a = q_a.rotate(self.local_anchor_a - ia.local_center);
                jv_ac = u;
                jw_c = r_c.cross(u);
                jw_a = r_a.cross(u);
                mass += ic.inv_mass + ia.inv_mass + ic.inv_i * jw_c * jw_c + ia.inv_i * jw_a * jw_a;

                let p_c = self.local_anchor_c - ic.local_center;
                let p_a = q_c.inv_rotate(r_a + (c_a - c_c));
                coordinate_a = (p_a - p_c).dot(self.local_axis_c);
            }
        }

        let (jv_bd, jw_b, jw_d, coordinate_b);
        match self.kind_b {
            GearCoordinate::Revolute => {
                jv_bd = Vec2::ZERO;
                jw_b = self.ratio;
                jw_d = self.ratio;
                mass += self.ratio * self.ratio * (ib.inv_i + id.inv_i);
                coordinate_b = a_b - a_d - self.reference_angle_b;
            }
            GearCoordinate::Prismatic => {
                let u = q_d.rotate(self.local_axis_d);
                let r_d = q_d.rotate(self.local_anchor_d - id.local_center);
                let r_b = q_b.rotate(self.local_anchor_b - ib.local_center);
                jv_bd = u * self.ratio;
                jw_d = self.ratio * r_d.cross(u);
                jw_b = self.ratio * r_b.cross(u);
                mass += self.ratio * self.ratio * (id.inv_mass + ib.inv_mass)
                    + id.inv_i * jw_d * jw_d
                    + ib.inv_i * jw_b * jw_b;

                let p_d = self.local_anchor_d - id.local_center;
                let p_b = q_d.inv_rotate(r_b + (c_b - c_d));
                coordinate_b = (p_b - p_d).dot(self.local_axis_d);
            }
        }

        let c = (coordinate_a + self.ratio * coordinate_b) - self.constant;

        let impulse = if mass > 0.0 { -c / mass } else { 0.0 };

        c_a += jv_ac * (ia.inv_mass * impulse);
        a_a += ia.inv_i * impulse * jw_a;
        c_b += jv_bd * (ib.inv_mass * impulse);
        a_b += ib.inv_i * impulse * jw_b;
        c_c -= jv_ac * (ic.inv_mass * impulse);
        a_c -= ic.inv_i * impulse * jw_c;
        c_d -= jv_bd * (id.inv_mass * impulse);
        a_d -= id.inv_i * impulse * jw_d;

        positions[ia.index].c = c_a;
        positions[ia.index].a = a_a;
        positions[ib.index].c = c_b;
        positions[ib.index].a = a_b;
        positions[ic.index].c = c_c;
        positions[ic.index].a = a_c;
        positions[id.index].c = c_d;
        positions[id.index].a = a_d;

        c.abs() < LINEAR_SLOP
    }
}

// ============================================================================
// Wheel joint
// ============================================================================

/// Wheel joint definition
#[derive(Clone, Copy, Debug)]
pub struct WheelJointDef {
    /// Common fields; A is the chassis, B the wheel
    pub base: JointBaseDef,
    /// Anchor in body A's frame
    pub local_anchor_a: Vec2,
    /// Anchor in body B's frame
    pub local_anchor_b: Vec2,
    /// Suspension axis in body A's frame
    pub local_axis_a: Vec2,
    /// Constrain suspension travel to [lower, upper]
    pub enable_limit: bool,
    /// Lower travel limit
    pub lower_translation: f32,
    /// Upper travel limit
    pub upper_translation: f32,
    /// Drive the wheel's rotation
    pub enable_motor: bool,
    /// Target wheel speed (rad/s)
    pub motor_speed: f32,
    /// Motor torque budget
    pub max_motor_torque: f32,
    /// Suspension spring stiffness
    pub stiffness: f32,
    /// Suspension spring damping
    pub damping: f32,
}

/// Wheel: the body slides along a suspension axis with a spring, rotates
/// freely (or driven), and never translates perpendicular to the axis
#[derive(Clone, Debug)]
pub struct WheelJoint {
    /// Anchor in body A's frame
    pub local_anchor_a: Vec2,
    /// Anchor in body B's frame
    pub local_anchor_b: Vec2,
    /// Suspension axis in body A's frame
    pub local_axis_a: Vec2,

    /// Limit enabled
    pub enable_limit: bool,
    /// Lower travel limit
    pub lower_translation: f32,
    /// Upper travel limit
    pub upper_translation: f32,
    /// Motor enabled
    pub enable_motor: bool,
    /// Target wheel speed
    pub motor_speed: f32,
    /// Motor torque budget
    pub max_motor_torque: f32,
    /// Suspension stiffness
    pub stiffness: f32,
    /// Suspension damping
    pub damping: f32,

    impulse: f32,
    motor_impulse: f32,
    spring_impulse: f32,
    lower_impulse: f32,
    upper_impulse: f32,

    // Per-solve cache
    info_a: BodySolverInfo,
    info_b: BodySolverInfo,
    ax: Vec2,
    ay: Vec2,
    s_ax: f32,
    s_bx: f32,
    s_ay: f32,
    s_by: f32,
    mass: f32,
    motor_mass: f32,
    axial_mass: f32,
    spring_mass: f32,
    bias: f32,
    gamma: f32,
    translation: f32,
}

impl WheelJoint {
    pub(crate) fn from_def(def: &WheelJointDef) -> Self {
        Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            local_axis_a: def.local_axis_a.normalized(),
            enable_limit: def.enable_limit,
            lower_translation: def.lower_translation,
            upper_translation: def.upper_translation,
            enable_motor: def.enable_motor,
            motor_speed: def.motor_speed,
            max_motor_torque: def.max_motor_torque,
            stiffness: def.stiffness,
            damping: def.damping,
            impulse: 0.0,
            motor_impulse: 0.0,
            spring_impulse: 0.0,
            lower_impulse: 0.0,
            upper_impulse: 0.0,
            info_a: BodySolverInfo::default(),
            info_b: BodySolverInfo::default(),
            ax: Vec2::ZERO,
            ay: Vec2::ZERO,
            s_ax: 0.0,
            s_bx: 0.0,
            s_ay: 0.0,
            s_by: 0.0,
            mass: 0.0,
            motor_mass: 0.0,
            axial_mass: 0.0,
            spring_mass: 0.0,
            bias: 0.0,
            gamma: 0.0,
            translation: 0.0,
        }
    }

    pub(crate) fn init(
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

        // Point-on-line (perpendicular) constraint
        self.ay = q_a.rotate(self.local_axis_a.skew());
        self.s_ay = (d + r_a).cross(self.ay);
        self.s_by = r_b.cross(self.ay);

        let inv_mass_perp = m_a + m_b + i_a * self.s_ay * self.s_ay + i_b * self.s_by * self.s_by;
        self.mass = if inv_mass_perp > 0.0 {
            1.0 / inv_mass_perp
        } else {
            0.0
        };

        // Axial (spring + limit) terms
        self.ax = q_a.rotate(self.local_axis_a);
        self.s_ax = (d + r_a).cross(self.ax);
        self.s_bx = r_b.cross(self.ax);

        let inv_mass_axial = m_a + m_b + i_a * self.s_ax * self.s_ax + i_b * self.s_bx * self.s_bx;
        self.axial_mass = if inv_mass_axial > 0.0 {
            1.0 / inv_mass_axial
        } else {
            0.0
        };

        self.spring_mass = 0.0;
        self.bias = 0.0;
        self.gamma = 0.0;

        if self.stiffness > 0.0 && inv_mass_axial > 0.0 {
            let c = d.dot(self.ax);
            let h = step.dt;
            self.gamma = h * (self.damping + h * self.stiffness);
            if self.gamma > 0.0 {
                self.gamma = 1.0 / self.gamma;
            }
            self.bias = c * h * self.stiffness * self.gamma;
            let soft = inv_mass_axial + self.gamma;
            self.spring_mass = if soft > 0.0 { 1.0 / soft } else { 0.0 };
        } else {
            self.spring_impulse = 0.0;
        }

        self.translation = d.dot(self.ax);
        if !self.enable_limit {
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }

        if self.enable_motor {
            let motor = i_a + i_b;
            self.motor_mass = if motor > 0.0 { 1.0 / motor } else { 0.0 };
        } else {
            self.motor_mass = 0.0;
            self.motor_impulse = 0.0;
        }

        if step.warm_starting {
            self.impulse *= step.dt_ratio;
            self.spring_impulse *= step.dt_ratio;
            self.motor_impulse *= step.dt_ratio;
            self.lower_impulse *= step.dt_ratio;
            self.upper_impulse *= step.dt_ratio;

            let axial_impulse = self.spring_impulse + self.lower_impulse - self.upper_impulse;
            let p = self.ay * self.impulse + self.ax * axial_impulse;
            let l_a = self.impulse * self.s_ay + axial_impulse * self.s_ax + self.motor_impulse;
            let l_b = self.impulse * self.s_by + axial_impulse * self.s_bx + self.motor_impulse;

            velocities[info_a.index].v -= p * m_a;
            velocities[info_a.index].w -= i_a * l_a;
            velocities[info_b.index].v += p * m_b;
            velocities[info_b.index].w += i_b * l_b;
        } else {
            self.impulse = 0.0;
            self.spring_impulse = 0.0;
            self.motor_impulse = 0.0;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
    }

    pub(crate) fn solve_velocity(&mut self, step: &TimeStep, velocities: &mut [Velocity]) {
        let (ia, ib) = (self.info_a, self.info_b);
        let m_a = ia.inv_mass;
        let m_b = ib.inv_mass;
        let i_a = ia.inv_i;
        let i_b = ib.inv_i;

        let mut v_a = velocities[ia.index].v;
        let mut w_a = velocities[ia.index].w;
        let mut v_b = velocities[ib.index].v;
        let mut w_b = velocities[ib.index].w;

        // Suspension spring
        if self.stiffness > 0.0 {
            let cdot = self.ax.dot(v_b - v_a) + self.s_bx * w_b - self.s_ax * w_a;
            let impulse =
                -self.spring_mass * (cdot + self.bias + self.gamma * self.spring_impulse);
            self.spring_impulse += impulse;

            let p = self.ax * impulse;
            let l_a = impulse * self.s_ax;
            let l_b = impulse * self.s_bx;

            v_a -= p * m_a;
            w_a -= i_a * l_a;
            v_b += p * m_b;
            w_b += i_b * l_b;
        }

        // Wheel motor
        if self.enable_motor {
            let cdot = w_b - w_a - self.motor_speed;
            let mut impulse = -self.motor_mass * cdot;

            let old_impulse = self.motor_impulse;
            let max_impulse = step.dt * self.max_motor_torque;
            self.motor_impulse = clamp(old_impulse + impulse, -max_impulse, max_impulse);
            impulse = self.motor_impulse - old_impulse;

            w_a -= i_a * impulse;
            w_b += i_b * impulse;
        }

        // Travel limits
        if self.enable_limit {
            // Lower
            {
                let c = self.translation - self.lower_translation;
                let cdot = self.ax.dot(v_b - v_a) + self.s_bx * w_b - self.s_ax * w_a;
                let mut impulse = -self.axial_mass * (cdot + c.min(0.0) * step.inv_dt);
                let old_impulse = self.lower_impulse;
                self.lower_impulse = (old_impulse + impulse).max(0.0);
                impulse = self.lower_impulse - old_impulse;

                let p = self.ax * impulse;
                v_a -= p * m_a;
                w_a -= i_a * impulse * self.s_ax;
                v_b += p * m_b;
                w_b += i_b * impulse * self.s_bx;
            }
            // Upper
            {
                let c = self.upper_translation - self.translation;
                let cdot = self.ax.dot(v_a - v_b) + self.s_ax * w_a - self.s_bx * w_b;
                let mut impulse = -self.axial_mass * (cdot + c.min(0.0) * step.inv_dt);
                let old_impulse = self.upper_impulse;
                self.upper_impulse = (old_impulse + impulse).max(0.0);
                impulse = self.upper_impulse - old_impulse;

                let p = self.ax * impulse;
                v_a += p * m_a;
                w_a += i_a * impulse * self.s_ax;
                v_b -= p * m_b;
                w_b -= i_b * impulse * self.s_bx;
            }
        }

        // Perpendicular point-on-line constraint
        {
            let cdot = self.ay.dot(v_b - v_a) + self.s_by * w_b - self.s_ay * w_a;
            let impulse = -self.mass * cdot;
            self.impulse += impulse;

            let p = self.ay * impulse;
            let l_a = impulse * self.s_ay;
            let l_b = impulse * self.s_by;

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

    pub(crate) fn solve_position(&mut self, positions: &mut [Position]) -> bool {
        let (ia, ib) = (self.info_a, self.info_b);
        let mut c_a = positions[ia.index].c;
        let mut a_a = positions[ia.index].a;
        let mut c_b = positions[ib.index].c;
        let mut a_b = positions[ib.index].a;

        let mut linear_error = 0.0_f32;

        // Travel limit correction
        if self.enable_limit {
            let q_a = Rot::from_angle(a_a);
            let q_b = Rot::from_angle(a_b);

            let r_a = q_a.rotate(self.local_anchor_a - ia.local_center);
            let r_b = q_b.rotate(self.local_anchor_b - ib.local_center);
            let d = c_b + r_b - c_a - r_a;

            let ax = q_a.rotate(self.local_axis_a);
            let s_ax = (d + r_a).cross(ax);
            let s_bx = r_b.cross(ax);

            let translation = ax.dot(d);
            let mut c = 0.0;
            if (self.upper_translation - self.lower_translation).abs() < 2.0 * LINEAR_SLOP {
                c = translation;
            } else if translation <= self.lower_translation {
                c = (translation - self.lower_translation + LINEAR_SLOP).min(0.0);
            } else if translation >= self.upper_translation {
                c = (translation - self.upper_translation - LINEAR_SLOP).max(0.0);
            }

            if c != 0.0 {
                let inv_mass = ia.inv_mass
                    + ib.inv_mass
                    + ia.inv_i * s_ax * s_ax
                    + ib.inv_i * s_bx * s_bx;
                let impulse = if inv_mass != 0.0 { -c / inv_mass } else { 0.0 };

                let p = ax * impulse;
                c_a -= p * ia.inv_mass;
                a_a -= ia.inv_i * impulse * s_ax;
                c_b += p * ib.inv_mass;
                a_b += ib.inv_i * impulse * s_bx;

                linear_error = c.abs();
            }
        }

        // Perpendicular correction
        {
            let q_a = Rot::from_angle(a_a);
            let q_b = Rot::from_angle(a_b);

            let r_a = q_a.rotate(self.local_anchor_a - ia.local_center);
            let r_b = q_b.rotate(self.local_anchor_b - ib.local_center);
            let d = c_b + r_b - c_a - r_a;

            let ay = q_a.rotate(self.local_axis_a.skew());
            let s_ay = (d + r_a).cross(ay);
            let s_by = r_b.cross(ay);

            let c = d.dot(ay);
            let inv_mass = ia.inv_mass
                + ib.inv_mass
                + ia.inv_i * self.s_ay * self.s_ay
                + ib.inv_i * self.s_by * self.s_by;
            let impulse = if inv_mass != 0.0 { -c / inv_mass } else { 0.0 };

            let p = ay * impulse;
            let l_a = impulse * s_ay;
            let l_b = impulse * s_by;

            c_a -= p * ia.inv_mass;
            a_a -= ia.inv_i * l_a;
            c_b += p * ib.inv_mass;
            a_b += ib.inv_i * l_b;

            linear_error = linear_error.max(c.abs());
        }

        positions[ia.index].c = c_a;
        positions[ia.index].a = a_a;
        positions[ib.index].c = c_b;
        positions[ib.index].a = a_b;

        linear_error <= LINEAR_SLOP
    }
}
