//! Sequential-Impulse Contact Solver
//!
//! Velocity and position constraint solving for contact manifolds.
//!
//! # Features
//!
//! - **Warm starting**: previous-step impulses are applied up front so the
//!   iteration count buys convergence, not re-discovery
//! - **Friction cone**: tangent impulses clamped to ±μ·normal
//! - **Restitution**: applied as a velocity bias only above a threshold
//! - **Block solver**: 2-point manifolds solve both normals together when
//!   the coupling matrix is well-conditioned
//! - **Position correction**: pseudo-impulses push penetration below the
//!   slop, with a stiffer variant for TOI sub-steps
//!
//! Author: Moroya Sakamoto

use crate::body::{Body, ContactId};
use crate::contact::Contact;
use crate::fixture::Fixture;
use crate::island::{Position, TimeStep, Velocity};
use crate::manifold::{Manifold, ManifoldType, WorldManifold};
use crate::math::{clamp, Mat22, Rot, Transform, Vec2};
use crate::pool::Pool;
use crate::tuning::{
    BAUMGARTE, LINEAR_SLOP, MAX_LINEAR_CORRECTION, MAX_MANIFOLD_POINTS, TOI_BAUMGARTE,
    VELOCITY_THRESHOLD,
};

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

// Ill-conditioned 2x2 blocks fall back to point-by-point solving
const MAX_CONDITION_NUMBER: f32 = 1000.0;

/// Per-point velocity constraint state
#[derive(Clone, Copy, Debug, Default)]
struct VelocityConstraintPoint {
    r_a: Vec2,
    r_b: Vec2,
    normal_impulse: f32,
    tangent_impulse: f32,
    normal_mass: f32,
    tangent_mass: f32,
    velocity_bias: f32,
}

/// Velocity constraint for one contact
#[derive(Clone, Copy, Debug, Default)]
pub struct ContactVelocityConstraint {
    points: [VelocityConstraintPoint; MAX_MANIFOLD_POINTS],
    normal: Vec2,
    normal_mass: Mat22,
    k: Mat22,
    index_a: usize,
    index_b: usize,
    inv_mass_a: f32,
    inv_mass_b: f32,
    inv_i_a: f32,
    inv_i_b: f32,
    friction: f32,
    restitution: f32,
    tangent_speed: f32,
    point_count: usize,
    /// Contact this constraint came from (for impulse write-back)
    pub contact_id: ContactId,
}

impl ContactVelocityConstraint {
    /// Accumulated normal impulse of one point (PostSolve reporting)
    #[inline]
    pub fn normal_impulse(&self, index: usize) -> f32 {
        self.points[index].normal_impulse
    }

    /// Accumulated tangent impulse of one point
    #[inline]
    pub fn tangent_impulse(&self, index: usize) -> f32 {
        self.points[index].tangent_impulse
    }

    /// Live point count
    #[inline]
    pub fn point_count(&self) -> usize {
        self.point_count
    }
}

/// Position constraint for one contact
#[derive(Clone, Copy, Debug, Default)]
struct ContactPositionConstraint {
    local_points: [Vec2; MAX_MANIFOLD_POINTS],
    local_normal: Vec2,
    local_point: Vec2,
    index_a: usize,
    index_b: usize,
    inv_mass_a: f32,
    inv_mass_b: f32,
    local_center_a: Vec2,
    local_center_b: Vec2,
    inv_i_a: f32,
    inv_i_b: f32,
    kind: ManifoldType,
    radius_a: f32,
    radius_b: f32,
    point_count: usize,
}

/// Normal, point, and separation of one position-constraint point at the
/// current trial positions
struct PositionSolverManifold {
    normal: Vec2,
    point: Vec2,
    separation: f32,
}

impl PositionSolverManifold {
    fn new(
        pc: &ContactPositionConstraint,
        xf_a: &Transform,
        xf_b: &Transform,
        index: usize,
    ) -> Self {
        debug_assert!(pc.point_count > 0);

        match pc.kind {
            ManifoldType::Circles => {
                let point_a = xf_a.transform_point(pc.local_point);
                let point_b = xf_b.transform_point(pc.local_points[0]);
                let normal = (point_b - point_a).normalized();
                let point = (point_a + point_b) * 0.5;
                let separation = (point_b - point_a).dot(normal) - pc.radius_a - pc.radius_b;
                Self {
                    normal,
                    point,
                    separation,
                }
            }
            ManifoldType::FaceA => {
                let normal = xf_a.q.rotate(pc.local_normal);
                let plane_point = xf_a.transform_point(pc.local_point);
                let clip_point = xf_b.transform_point(pc.local_points[index]);
                let separation =
                    (clip_point - plane_point).dot(normal) - pc.radius_a - pc.radius_b;
                Self {
                    normal,
                    point: clip_point,
                    separation,
                }
            }
            ManifoldType::FaceB => {
                let normal = xf_b.q.rotate(pc.local_normal);
                let plane_point = xf_b.transform_point(pc.local_point);
                let clip_point = xf_a.transform_point(pc.local_points[index]);
                let separation =
                    (clip_point - plane_point).dot(normal) - pc.radius_a - pc.radius_b;
                Self {
                    // Report from A to B
                    normal: -normal,
                    point: clip_point,
                    separation,
                }
            }
        }
    }
}

/// Contact constraint solver for one island
pub struct ContactSolver {
    velocity_constraints: Vec<ContactVelocityConstraint>,
    position_constraints: Vec<ContactPositionConstraint>,
    enable_restitution: bool,
}

impl ContactSolver {
    /// Gather constraint data from the island's contacts.
    ///
    /// `contact_ids` index the contact pool; bodies must already carry their
    /// island indices. The TOI solver passes `enable_restitution = false` so
    /// sub-stepped impacts do not bounce.
    pub fn new(
        step: TimeStep,
        contact_ids: &[ContactId],
        contacts: &Pool<Contact>,
        fixtures: &Pool<Fixture>,
        bodies: &Pool<Body>,
        enable_restitution: bool,
    ) -> Self {
        let mut solver = Self {
            velocity_constraints: Vec::with_capacity(contact_ids.len()),
            position_constraints: Vec::with_capacity(contact_ids.len()),
            enable_restitution,
        };

        for &contact_id in contact_ids {
            let contact = &contacts[contact_id];
            let fixture_a = &fixtures[contact.fixture_a()];
            let fixture_b = &fixtures[contact.fixture_b()];
            let radius_a = fixture_a.shape.radius();
            let radius_b = fixture_b.shape.radius();
            let body_a = &bodies[contact.body_a()];
            let body_b = &bodies[contact.body_b()];
            let manifold = &contact.manifold;

            debug_assert!(manifold.point_count > 0);

            let mut vc = ContactVelocityConstraint {
                friction: contact.friction(),
                restitution: contact.restitution(),
                tangent_speed: contact.tangent_speed,
                index_a: body_a.island_index,
                index_b: body_b.island_index,
                inv_mass_a: body_a.inv_mass,
                inv_mass_b: body_b.inv_mass,
                inv_i_a: body_a.inv_inertia,
                inv_i_b: body_b.inv_inertia,
                contact_id,
                point_count: manifold.point_count,
                k: Mat22::default(),
                normal_mass: Mat22::default(),
                normal: Vec2::ZERO,
                points: Default::default(),
            };

            let mut pc = ContactPositionConstraint {
                index_a: body_a.island_index,
                index_b: body_b.island_index,
                inv_mass_a: body_a.inv_mass,
                inv_mass_b: body_b.inv_mass,
                local_center_a: body_a.sweep.local_center,
                local_center_b: body_b.sweep.local_center,
                inv_i_a: body_a.inv_inertia,
                inv_i_b: body_b.inv_inertia,
                local_normal: manifold.local_normal,
                local_point: manifold.local_point,
                point_count: manifold.point_count,
                radius_a,
                radius_b,
                kind: manifold.kind,
                local_points: [Vec2::ZERO; MAX_MANIFOLD_POINTS],
            };

            for j in 0..manifold.point_count {
                let mp = &manifold.points[j];
                let vcp = &mut vc.points[j];

                // Warm-start scaling keeps impulses sane across dt changes
                vcp.normal_impulse = warm_impulse(&step, mp.normal_impulse);
                vcp.tangent_impulse = warm_impulse(&step, mp.tangent_impulse);

                pc.local_points[j] = mp.local_point;
            }

            solver.velocity_constraints.push(vc);
            solver.position_constraints.push(pc);
        }

        solver
    }

    /// Constraint views for PostSolve reporting
    #[inline]
    pub fn velocity_constraints(&self) -> &[ContactVelocityConstraint] {
        &self.velocity_constraints
    }

    /// Compute effective masses and restitution biases at the current state
    pub fn initialize_velocity_constraints(
        &mut self,
        positions: &[Position],
        velocities: &[Velocity],
    ) {
        let enable_restitution = self.enable_restitution;
        for (vc, pc) in self
            .velocity_constraints
            .iter_mut()
            .zip(self.position_constraints.iter())
        {
            let radius_a = pc.radius_a;
            let radius_b = pc.radius_b;

            let index_a = vc.index_a;
            let index_b = vc.index_b;

            let m_a = vc.inv_mass_a;
            let m_b = vc.inv_mass_b;
            let i_a = vc.inv_i_a;
            let i_b = vc.inv_i_b;
            let local_center_a = pc.local_center_a;
            let local_center_b = pc.local_center_b;

            let c_a = positions[index_a].c;
            let a_a = positions[index_a].a;
            let v_a = velocities[index_a].v;
            let w_a = velocities[index_a].w;

            let c_b = positions[index_b].c;
            let a_b = positions[index_b].a;
            let v_b = velocities[index_b].v;
            let w_b = velocities[index_b].w;

            let q_a = Rot::from_angle(a_a);
            let q_b = Rot::from_angle(a_b);
            let xf_a = Transform {
                q: q_a,
                p: c_a - q_a.rotate(local_center_a),
            };
            let xf_b = Transform {
                q: q_b,
                p: c_b - q_b.rotate(local_center_b),
            };

            // Rebuild the manifold geometry in world space
            let manifold = Manifold {
                kind: pc.kind,
                local_normal: pc.local_normal,
                local_point: pc.local_point,
                point_count: pc.point_count,
                points: {
                    let mut pts: [crate::manifold::ManifoldPoint; MAX_MANIFOLD_POINTS] =
                        Default::default();
                    for (dst, src) in pts.iter_mut().zip(pc.local_points.iter()) {
                        dst.local_point = *src;
                    }
                    pts
                },
            };
            let world_manifold = WorldManifold::new(&manifold, &xf_a, radius_a, &xf_b, radius_b);

            vc.normal = world_manifold.normal;

            for j in 0..vc.point_count {
                let vcp = &mut vc.points[j];

                vcp.r_a = world_manifold.points[j] - c_a;
                vcp.r_b = world_manifold.points[j] - c_b;

                let rn_a = vcp.r_a.cross(vc.normal);
                let rn_b = vcp.r_b.cross(vc.normal);
                let k_normal = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;
                vcp.normal_mass = if k_normal > 0.0 { 1.0 / k_normal } else { 0.0 };

                let tangent = vc.normal.cross_scalar(1.0);
                let rt_a = vcp.r_a.cross(tangent);
                let rt_b = vcp.r_b.cross(tangent);
                let k_tangent = m_a + m_b + i_a * rt_a * rt_a + i_b * rt_b * rt_b;
                vcp.tangent_mass = if k_tangent > 0.0 { 1.0 / k_tangent } else { 0.0 };

                // Restitution bias from the approach speed
                vcp.velocity_bias = 0.0;
                let v_rel = vc.normal.dot(
                    v_b + Vec2::scalar_cross(w_b, vcp.r_b)
                        - v_a
                        - Vec2::scalar_cross(w_a, vcp.r_a),
                );
                if enable_restitution && v_rel < -VELOCITY_THRESHOLD {
                    vcp.velocity_bias = -vc.restitution * v_rel;
                }
            }

            // Coupled normal mass for the 2-point block solve
            if vc.point_count == 2 {
                let vcp1 = vc.points[0];
                let vcp2 = vc.points[1];

                let rn1_a = vcp1.r_a.cross(vc.normal);
                let rn1_b = vcp1.r_b.cross(vc.normal);
                let rn2_a = vcp2.r_a.cross(vc.normal);
                let rn2_b = vcp2.r_b.cross(vc.normal);

                let k11 = m_a + m_b + i_a * rn1_a * rn1_a + i_b * rn1_b * rn1_b;
                let k22 = m_a + m_b + i_a * rn2_a * rn2_a + i_b * rn2_b * rn2_b;
                let k12 = m_a + m_b + i_a * rn1_a * rn2_a + i_b * rn1_b * rn2_b;

                if k11 * k11 < MAX_CONDITION_NUMBER * (k11 * k22 - k12 * k12) {
                    vc.k = Mat22::new(Vec2::new(k11, k12), Vec2::new(k12, k22));
                    vc.normal_mass = vc.k.inverse();
                } else {
                    // Degenerate: drop to one point
                    vc.point_count = 1;
                }
            }
        }
    }

    /// Apply the carried-over impulses before iterating
    pub fn warm_start(&mut self, velocities: &mut [Velocity]) {
        for vc in &self.velocity_constraints {
            let index_a = vc.index_a;
            let index_b = vc.index_b;
            let m_a = vc.inv_mass_a;
            let i_a = vc.inv_i_a;
            let m_b = vc.inv_mass_b;
            let i_b = vc.inv_i_b;

            let mut v_a = velocities[index_a].v;
            let mut w_a = velocities[index_a].w;
            let mut v_b = velocities[index_b].v;
            let mut w_b = velocities[index_b].w;

            let normal = vc.normal;
            let tangent = normal.cross_scalar(1.0);

            for j in 0..vc.point_count {
                let vcp = &vc.points[j];
                let p = normal * vcp.normal_impulse + tangent * vcp.tangent_impulse;
                w_a -= i_a * vcp.r_a.cross(p);
                v_a -= p * m_a;
                w_b += i_b * vcp.r_b.cross(p);
                v_b += p * m_b;
            }

            velocities[index_a].v = v_a;
            velocities[index_a].w = w_a;
            velocities[index_b].v = v_b;
            velocities[index_b].w = w_b;
        }
    }

    /// One velocity iteration over all constraints
    pub fn solve_velocity_constraints(&mut self, velocities: &mut [Velocity]) {
        for vc in &mut self.velocity_constraints {
            let index_a = vc.index_a;
            let index_b = vc.index_b;
            let m_a = vc.inv_mass_a;
            let i_a = vc.inv_i_a;
            let m_b = vc.inv_mass_b;
            let i_b = vc.inv_i_b;
            let point_count = vc.point_count;

            let mut v_a = velocities[index_a].v;
            let mut w_a = velocities[index_a].w;
            let mut v_b = velocities[index_b].v;
            let mut w_b = velocities[index_b].w;

            let normal = vc.normal;
            let tangent = normal.cross_scalar(1.0);
            let friction = vc.friction;

            debug_assert!(point_count == 1 || point_count == 2);

            // Friction first, using the normal impulse from the last
            // iteration as the cone bound
            for j in 0..point_count {
                let vcp = &mut vc.points[j];

                let dv = v_b + Vec2::scalar_cross(w_b, vcp.r_b)
                    - v_a
                    - Vec2::scalar_cross(w_a, vcp.r_a);

                let vt = dv.dot(tangent) - vc.tangent_speed;
                let mut lambda = vcp.tangent_mass * (-vt);

                // Clamp the accumulated impulse to the friction cone
                let max_friction = friction * vcp.normal_impulse;
                let new_impulse = clamp(vcp.tangent_impulse + lambda, -max_friction, max_friction);
                lambda = new_impulse - vcp.tangent_impulse;
                vcp.tangent_impulse = new_impulse;

                let p = tangent * lambda;
                v_a -= p * m_a;
                w_a -= i_a * vcp.r_a.cross(p);
                v_b += p * m_b;
                w_b += i_b * vcp.r_b.cross(p);
            }

            // Normal impulses
            if point_count == 1 {
                let vcp = &mut vc.points[0];

                let dv = v_b + Vec2::scalar_cross(w_b, vcp.r_b)
                    - v_a
                    - Vec2::scalar_cross(w_a, vcp.r_a);
                let vn = dv.dot(normal);
                let mut lambda = -vcp.normal_mass * (vn - vcp.velocity_bias);

                // Accumulated impulse stays non-negative
                let new_impulse = (vcp.normal_impulse + lambda).max(0.0);
                lambda = new_impulse - vcp.normal_impulse;
                vcp.normal_impulse = new_impulse;

                let p = normal * lambda;
                v_a -= p * m_a;
                w_a -= i_a * vcp.r_a.cross(p);
                v_b += p * m_b;
                w_b += i_b * vcp.r_b.cross(p);
            } else {
                // Block solve: both points together when possible.
                //
                // The LCP has four cases (both active, one active each way,
                // both inactive); try them in order and accept the first
                // whose solution is feasible.
                let cp1_ra = vc.points[0].r_a;
                let cp1_rb = vc.points[0].r_b;
                let cp2_ra = vc.points[1].r_a;
                let cp2_rb = vc.points[1].r_b;

                let a = Vec2::new(vc.points[0].normal_impulse, vc.points[1].normal_impulse);
                debug_assert!(a.x >= 0.0 && a.y >= 0.0);

                let dv1 =
                    v_b + Vec2::scalar_cross(w_b, cp1_rb) - v_a - Vec2::scalar_cross(w_a, cp1_ra);
                let dv2 =
                    v_b + Vec2::scalar_cross(w_b, cp2_rb) - v_a - Vec2::scalar_cross(w_a, cp2_ra);

                let vn1 = dv1.dot(normal);
                let vn2 = dv2.dot(normal);

                // b' = b - K * a
                let mut b = Vec2::new(
                    vn1 - vc.points[0].velocity_bias,
                    vn2 - vc.points[1].velocity_bias,
                );
                b -= vc.k.mul_vec(a);

                loop {
                    // Case 1: both points active: x = -M^-1 * b'
                    let x = -(vc.normal_mass.mul_vec(b));
                    if x.x >= 0.0 && x.y >= 0.0 {
                        let d = x - a;
                        let p1 = normal * d.x;
                        let p2 = normal * d.y;
                        v_a -= (p1 + p2) * m_a;
                        w_a -= i_a * (cp1_ra.cross(p1) + cp2_ra.cross(p2));
                        v_b += (p1 + p2) * m_b;
                        w_b += i_b * (cp1_rb.cross(p1) + cp2_rb.cross(p2));
                        vc.points[0].normal_impulse = x.x;
                        vc.points[1].normal_impulse = x.y;
                        break;
                    }

                    // Case 2: point 1 active, point 2 inactive
                    let x1 = -vc.points[0].normal_mass * b.x;
                    let vn2 = vc.k.ex.y * x1 + b.y;
                    if x1 >= 0.0 && vn2 >= 0.0 {
                        let x = Vec2::new(x1, 0.0);
                        let d = x - a;
                        let p1 = normal * d.x;
                        let p2 = normal * d.y;
                        v_a -= (p1 + p2) * m_a;
                        w_a -= i_a * (cp1_ra.cross(p1) + cp2_ra.cross(p2));
                        v_b += (p1 + p2) * m_b;
                        w_b += i_b * (cp1_rb.cross(p1) + cp2_rb.cross(p2));
                        vc.points[0].normal_impulse = x.x;
                        vc.points[1].normal_impulse = x.y;
                        break;
                    }

                    // Case 3: point 2 active, point 1 inactive
                    let x2 = -vc.points[1].normal_mass * b.y;
                    let vn1 = vc.k.ey.x * x2 + b.x;
                    if x2 >= 0.0 && vn1 >= 0.0 {
                        let x = Vec2::new(0.0, x2);
                        let d = x - a;
                        let p1 = normal * d.x;
                        let p2 = normal * d.y;
                        v_a -= (p1 + p2) * m_a;
                        w_a -= i_a * (cp1_ra.cross(p1) + cp2_ra.cross(p2));
                        v_b += (p1 + p2) * m_b;
                        w_b += i_b * (cp1_rb.cross(p1) + cp2_rb.cross(p2));
                        vc.points[0].normal_impulse = x.x;
                        vc.points[1].normal_impulse = x.y;
                        break;
                    }

                    // Case 4: both inactive
                    if b.x >= 0.0 && b.y >= 0.0 {
                        let x = Vec2::ZERO;
                        let d = x - a;
                        let p1 = normal * d.x;
                        let p2 = normal * d.y;
                        v_a -= (p1 + p2) * m_a;
                        w_a -= i_a * (cp1_ra.cross(p1) + cp2_ra.cross(p2));
                        v_b += (p1 + p2) * m_b;
                        w_b += i_b * (cp1_rb.cross(p1) + cp2_rb.cross(p2));
                        vc.points[0].normal_impulse = x.x;
                        vc.points[1].normal_impulse = x.y;
                        break;
                    }

                    // No feasible case (numerical trouble): keep the
                    // impulses from the previous iteration.
                    break;
                }
            }

            velocities[index_a].v = v_a;
            velocities[index_a].w = w_a;
            velocities[index_b].v = v_b;
            velocities[index_b].w = w_b;
        }
    }

    /// Write accumulated impulses back into the manifolds for next step's
    /// warm start
    pub fn store_impulses(&self, contacts: &mut Pool<Contact>) {
        for vc in &self.velocity_constraints {
            let manifold = &mut contacts[vc.contact_id].manifold;
            for j in 0..vc.point_count {
                manifold.points[j].normal_impulse = vc.points[j].normal_impulse;
                manifold.points[j].tangent_impulse = vc.points[j].tangent_impulse;
            }
        }
    }

    /// One position iteration. Returns true when the worst penetration is
    /// within tolerance.
    pub fn solve_position_constraints(&mut self, positions: &mut [Position]) -> bool {
        self.solve_position_constraints_impl(positions, None)
    }

    /// TOI flavor: only the two sub-stepped bodies get mass; the correction
    /// factor is stiffer.
    pub fn solve_toi_position_constraints(
        &mut self,
        positions: &mut [Position],
        toi_index_a: usize,
        toi_index_b: usize,
    ) -> bool {
        self.solve_position_constraints_impl(positions, Some((toi_index_a, toi_index_b)))
    }

    fn solve_position_constraints_impl(
        &mut self,
        positions: &mut [Position],
        toi_indices: Option<(usize, usize)>,
    ) -> bool {
        let baumgarte = if toi_indices.is_some() {
            TOI_BAUMGARTE
        } else {
            BAUMGARTE
        };
        let mut min_separation = 0.0_f32;

        for pc in &self.position_constraints {
            let index_a = pc.index_a;
            let index_b = pc.index_b;
            let local_center_a = pc.local_center_a;
            let local_center_b = pc.local_center_b;

            let (m_a, i_a, m_b, i_b) = match toi_indices {
                None => (pc.inv_mass_a, pc.inv_i_a, pc.inv_mass_b, pc.inv_i_b),
                Some((toi_a, toi_b)) => {
                    // Only the sub-stepped bodies move in a TOI solve
                    let mass_a = if index_a == toi_a || index_a == toi_b {
                        (pc.inv_mass_a, pc.inv_i_a)
                    } else {
                        (0.0, 0.0)
                    };
                    let mass_b = if index_b == toi_a || index_b == toi_b {
                        (pc.inv_mass_b, pc.inv_i_b)
                    } else {
                        (0.0, 0.0)
                    };
                    (mass_a.0, mass_a.1, mass_b.0, mass_b.1)
                }
            };

            let mut c_a = positions[index_a].c;
            let mut a_a = positions[index_a].a;
            let mut c_b = positions[index_b].c;
            let mut a_b = positions[index_b].a;

            for j in 0..pc.point_count {
                let q_a = Rot::from_angle(a_a);
                let q_b = Rot::from_angle(a_b);
                let xf_a = Transform {
                    q: q_a,
                    p: c_a - q_a.rotate(local_center_a),
                };
                let xf_b = Transform {
                    q: q_b,
                    p: c_b - q_b.rotate(local_center_b),
                };

                let psm = PositionSolverManifold::new(pc, &xf_a, &xf_b, j);
                let normal = psm.normal;
                let point = psm.point;
                let separation = psm.separation;

                let r_a = point - c_a;
                let r_b = point - c_b;

                min_separation = min_separation.min(separation);

                // Clamped correction toward the slop band
                let c = clamp(
                    baumgarte * (separation + LINEAR_SLOP),
                    -MAX_LINEAR_CORRECTION,
                    0.0,
                );

                let rn_a = r_a.cross(normal);
                let rn_b = r_b.cross(normal);
                let k = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;

                let impulse = if k > 0.0 { -c / k } else { 0.0 };
                let p = normal * impulse;

                c_a -= p * m_a;
                a_a -= i_a * r_a.cross(p);
                c_b += p * m_b;
                a_b += i_b * r_b.cross(p);
            }

            positions[index_a].c = c_a;
            positions[index_a].a = a_a;
            positions[index_b].c = c_b;
            positions[index_b].a = a_b;
        }

        // Allow up to 3 slops of residual; position correction cannot be
        // exact without fighting the velocity solver
        min_separation >= -3.0 * LINEAR_SLOP
    }
}

/// Warm-start impulse scaled by the step-size ratio
#[inline]
fn warm_impulse(step: &TimeStep, impulse: f32) -> f32 {
    if step.warm_starting {
        step.dt_ratio * impulse
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hand-built one-point constraint: unit masses, head-on approach
    fn simple_constraint(restitution: f32) -> ContactVelocityConstraint {
        let mut vc = ContactVelocityConstraint {
            normal: Vec2::UNIT_X,
            index_a: 0,
            index_b: 1,
            inv_mass_a: 1.0,
            inv_mass_b: 1.0,
            inv_i_a: 0.0,
            inv_i_b: 0.0,
            friction: 0.0,
            restitution,
            point_count: 1,
            ..Default::default()
        };
        vc.points[0].normal_mass = 1.0 / 2.0; // mA + mB
        vc.points[0].tangent_mass = 1.0 / 2.0;
        vc
    }

    #[test]
    fn test_normal_impulse_stops_approach() {
        let mut solver = ContactSolver {
            velocity_constraints: vec![simple_constraint(0.0)],
            position_constraints: vec![],
            enable_restitution: true,
        };

        let mut velocities = [
            Velocity {
                v: Vec2::new(1.0, 0.0),
                w: 0.0,
            },
            Velocity {
                v: Vec2::new(-1.0, 0.0),
                w: 0.0,
            },
        ];

        for _ in 0..8 {
            solver.solve_velocity_constraints(&mut velocities);
        }

        // Closing velocity along the normal must be eliminated
        let vn = (velocities[1].v - velocities[0].v).dot(Vec2::UNIT_X);
        assert!(vn.abs() < 1e-4, "vn = {vn}");
        // Impulse accumulated, not negative
        assert!(solver.velocity_constraints[0].normal_impulse(0) > 0.0);
    }

    #[test]
    fn test_separating_contact_gets_no_impulse() {
        let mut solver = ContactSolver {
            velocity_constraints: vec![simple_constraint(0.0)],
            position_constraints: vec![],
            enable_restitution: true,
        };

        let mut velocities = [
            Velocity {
                v: Vec2::new(-1.0, 0.0),
                w: 0.0,
            },
            Velocity {
                v: Vec2::new(1.0, 0.0),
                w: 0.0,
            },
        ];

        solver.solve_velocity_constraints(&mut velocities);
        assert_eq!(solver.velocity_constraints[0].normal_impulse(0), 0.0);
        assert_eq!(velocities[0].v, Vec2::new(-1.0, 0.0));
    }

    #[test]
    fn test_restitution_bias_bounces() {
        let mut vc = simple_constraint(1.0);
        // Approach speed 2 along +x ⇒ bias = restitution * 2
        vc.points[0].velocity_bias = 2.0;

        let mut solver = ContactSolver {
            velocity_constraints: vec![vc],
            position_constraints: vec![],
            enable_restitution: true,
        };

        let mut velocities = [
            Velocity {
                v: Vec2::new(1.0, 0.0),
                w: 0.0,
            },
            Velocity {
                v: Vec2::new(-1.0, 0.0),
                w: 0.0,
            },
        ];

        for _ in 0..8 {
            solver.solve_velocity_constraints(&mut velocities);
        }

        // Full restitution: relative normal velocity flips sign
        let vn = (velocities[1].v - velocities[0].v).dot(Vec2::UNIT_X);
        assert!((vn - 2.0).abs() < 1e-3, "vn = {vn}");
    }
}
