//! Island Solver
//!
//! A transient group of bodies connected by touching contacts and joints,
//! solved as one unit and discarded. The world assembles islands each step
//! by flooding the contact/joint graph from every awake dynamic body.
//!
//! # Solve order
//!
//! 1. Integrate velocities (gravity, forces, damping)
//! 2. Warm-start and iterate the velocity constraints
//! 3. Integrate positions with per-step translation/rotation caps
//! 4. Iterate the position constraints until penetration is inside the slop
//! 5. Put the whole island to sleep when every body stayed slow long enough
//!
//! Author: Moroya Sakamoto

use crate::body::{Body, BodyId, BodyType, ContactId};
use crate::callbacks::{ContactImpulse, ContactListener};
use crate::contact::Contact;
use crate::contact_solver::ContactSolver;
use crate::fixture::Fixture;
use crate::joint::{Joint, JointId};
use crate::math::Vec2;
use crate::pool::Pool;
use crate::tuning::{
    ANGULAR_SLEEP_TOLERANCE, LINEAR_SLEEP_TOLERANCE, MAX_ROTATION, MAX_ROTATION_SQUARED,
    MAX_TRANSLATION, MAX_TRANSLATION_SQUARED, TIME_TO_SLEEP,
};

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

// ============================================================================
// Solver data
// ============================================================================

/// Timestep parameters shared by all constraints
#[derive(Clone, Copy, Debug)]
pub struct TimeStep {
    /// Step duration in seconds
    pub dt: f32,
    /// 1/dt (0 for a zero step)
    pub inv_dt: f32,
    /// dt divided by the previous step's dt, for warm-start scaling
    pub dt_ratio: f32,
    /// Velocity solver iterations
    pub velocity_iterations: usize,
    /// Position solver iterations
    pub position_iterations: usize,
    /// Apply carried-over impulses before iterating
    pub warm_starting: bool,
}

/// Center-of-mass position state during a solve
#[derive(Clone, Copy, Debug, Default)]
pub struct Position {
    /// World center of mass
    pub c: Vec2,
    /// Angle
    pub a: f32,
}

/// Velocity state during a solve
#[derive(Clone, Copy, Debug, Default)]
pub struct Velocity {
    /// Linear velocity
    pub v: Vec2,
    /// Angular velocity
    pub w: f32,
}

// ============================================================================
// Island
// ============================================================================

/// One connected component of the contact/joint graph
pub struct Island {
    /// Island bodies; `Body::island_index` indexes this array
    pub bodies: Vec<BodyId>,
    /// Touching, enabled, solvable contacts
    pub contacts: Vec<ContactId>,
    /// Joints in the island
    pub joints: Vec<JointId>,

    positions: Vec<Position>,
    velocities: Vec<Velocity>,
}

impl Island {
    /// Create an empty island; capacity is reused across islands and steps
    pub fn new() -> Self {
        Self {
            bodies: Vec::new(),
            contacts: Vec::new(),
            joints: Vec::new(),
            positions: Vec::new(),
            velocities: Vec::new(),
        }
    }

    /// Reset for the next island without freeing capacity
    pub fn clear(&mut self) {
        self.bodies.clear();
        self.contacts.clear();
        self.joints.clear();
        self.positions.clear();
        self.velocities.clear();
    }

    /// Add a body, assigning its island index
    pub fn add_body(&mut self, body_id: BodyId, body: &mut Body) {
        body.island_index = self.bodies.len();
        self.bodies.push(body_id);
    }

    /// Add a contact
    #[inline]
    pub fn add_contact(&mut self, contact_id: ContactId) {
        self.contacts.push(contact_id);
    }

    /// Add a joint
    #[inline]
    pub fn add_joint(&mut self, joint_id: JointId) {
        self.joints.push(joint_id);
    }

    /// Discrete solve: velocities, positions, sleep.
    #[allow(clippy::too_many_arguments)]
    pub fn solve(
        &mut self,
        step: &TimeStep,
        gravity: Vec2,
        allow_sleep: bool,
        bodies: &mut Pool<Body>,
        contacts: &mut Pool<Contact>,
        joints: &mut Pool<Joint>,
        fixtures: &Pool<Fixture>,
        listener: &mut dyn ContactListener,
    ) {
        let h = step.dt;

        // Integrate velocities and stage solver state
        self.positions.clear();
        self.velocities.clear();
        for &body_id in &self.bodies {
            let b = &mut bodies[body_id];

            let c = b.sweep.c;
            let a = b.sweep.a;
            let mut v = b.linear_velocity;
            let mut w = b.angular_velocity;

            // Store the pre-solve state for TOI sweeps
            b.sweep.c0 = c;
            b.sweep.a0 = a;

            if b.body_type() == BodyType::Dynamic {
                v += (gravity * b.gravity_scale + b.force * b.inv_mass) * h;
                w += h * b.inv_inertia * b.torque;

                // Damping as the Padé approximation of an exponential decay
                v *= 1.0 / (1.0 + h * b.linear_damping);
                w *= 1.0 / (1.0 + h * b.angular_damping);
            }

            self.positions.push(Position { c, a });
            self.velocities.push(Velocity { v, w });
        }

        let mut contact_solver =
            ContactSolver::new(*step, &self.contacts, contacts, fixtures, bodies, true);
        contact_solver.initialize_velocity_constraints(&self.positions, &self.velocities);
        if step.warm_starting {
            contact_solver.warm_start(&mut self.velocities);
        }

        for &joint_id in &self.joints {
            joints[joint_id].init_velocity_constraints(step, &self.positions, &mut self.velocities, bodies);
        }

        for _ in 0..step.velocity_iterations {
            for &joint_id in &self.joints {
                joints[joint_id].solve_velocity_constraints(step, &mut self.velocities);
            }
            contact_solver.solve_velocity_constraints(&mut self.velocities);
        }

        contact_solver.store_impulses(contacts);

        // Integrate positions with the translation and rotation caps
        for i in 0..self.bodies.len() {
            let mut c = self.positions[i].c;
            let mut a = self.positions[i].a;
            let mut v = self.velocities[i].v;
            let mut w = self.velocities[i].w;

            let translation = v * h;
            if translation.dot(translation) > MAX_TRANSLATION_SQUARED {
                v *= MAX_TRANSLATION / translation.length();
            }
            let rotation = h * w;
            if rotation * rotation > MAX_ROTATION_SQUARED {
                w *= MAX_ROTATION / rotation.abs();
            }

            c += v * h;
            a += h * w;

            self.positions[i] = Position { c, a };
            self.velocities[i] = Velocity { v, w };
        }

        // Position correction
        let mut position_solved = false;
        for _ in 0..step.position_iterations {
            let contacts_okay = contact_solver.solve_position_constraints(&mut self.positions);

            let mut joints_okay = true;
            for &joint_id in &self.joints {
                joints_okay &= joints[joint_id].solve_position_constraints(&mut self.positions);
            }

            if contacts_okay && joints_okay {
                position_solved = true;
                break;
            }
        }

        // Copy state back
        for (i, &body_id) in self.bodies.iter().enumerate() {
            let b = &mut bodies[body_id];
            b.sweep.c = self.positions[i].c;
            b.sweep.a = self.positions[i].a;
            b.linear_velocity = self.velocities[i].v;
            b.angular_velocity = self.velocities[i].w;
            b.synchronize_transform();
        }

        report(&contact_solver, contacts, listener);

        // Whole-island sleep
        if allow_sleep {
            let mut min_sleep_time = f32::MAX;

            let lin_tol_sqr = LINEAR_SLEEP_TOLERANCE * LINEAR_SLEEP_TOLERANCE;
            let ang_tol_sqr = ANGULAR_SLEEP_TOLERANCE * ANGULAR_SLEEP_TOLERANCE;

            for &body_id in &self.bodies {
                let b = &mut bodies[body_id];
                if b.body_type() == BodyType::Static {
                    continue;
                }

                if !b.allow_sleep
                    || b.angular_velocity * b.angular_velocity > ang_tol_sqr
                    || b.linear_velocity.dot(b.linear_velocity) > lin_tol_sqr
                {
                    b.sleep_time = 0.0;
                    min_sleep_time = 0.0;
                } else {
                    b.sleep_time += h;
                    min_sleep_time = min_sleep_time.min(b.sleep_time);
                }
            }

            if min_sleep_time >= TIME_TO_SLEEP && position_solved {
                for &body_id in &self.bodies {
                    bodies[body_id].set_awake(false);
                }
            }
        }
    }

    /// TOI sub-step solve: positions first (with only the two advanced
    /// bodies mobile), then a short velocity pass with restitution already
    /// disabled by the caller via the contact data. Joints do not
    /// participate; the discrete solver picks them up next step.
    #[allow(clippy::too_many_arguments)]
    pub fn solve_toi(
        &mut self,
        sub_step: &TimeStep,
        toi_index_a: usize,
        toi_index_b: usize,
        bodies: &mut Pool<Body>,
        contacts: &mut Pool<Contact>,
        fixtures: &Pool<Fixture>,
        listener: &mut dyn ContactListener,
    ) {
        debug_assert!(toi_index_a < self.bodies.len());
        debug_assert!(toi_index_b < self.bodies.len());

        self.positions.clear();
        self.velocities.clear();
        for &body_id in &self.bodies {
            let b = &bodies[body_id];
            self.positions.push(Position {
                c: b.sweep.c,
                a: b.sweep.a,
            });
            self.velocities.push(Velocity {
                v: b.linear_velocity,
                w: b.angular_velocity,
            });
        }

        // Restitution is off for TOI sub-steps; bouncing happens in the next
        // discrete solve
        let mut contact_solver =
            ContactSolver::new(*sub_step, &self.contacts, contacts, fixtures, bodies, false);

        // Push the bodies out of overlap at the impact configuration
        for _ in 0..sub_step.position_iterations {
            if contact_solver.solve_toi_position_constraints(
                &mut self.positions,
                toi_index_a,
                toi_index_b,
            ) {
                break;
            }
        }

        // The solved impact positions become the sweep start of the two
        // advanced bodies so the next TOI query sees them there
        bodies[self.bodies[toi_index_a]].sweep.c0 = self.positions[toi_index_a].c;
        bodies[self.bodies[toi_index_a]].sweep.a0 = self.positions[toi_index_a].a;
        bodies[self.bodies[toi_index_b]].sweep.c0 = self.positions[toi_index_b].c;
        bodies[self.bodies[toi_index_b]].sweep.a0 = self.positions[toi_index_b].a;

        // Velocity pass; no warm starting (sub_step.warm_starting = false),
        // impulses are not stored back
        contact_solver.initialize_velocity_constraints(&self.positions, &self.velocities);
        for _ in 0..sub_step.velocity_iterations {
            contact_solver.solve_velocity_constraints(&mut self.velocities);
        }

        // Integrate the remaining interval
        let h = sub_step.dt;
        for i in 0..self.bodies.len() {
            let mut c = self.positions[i].c;
            let mut a = self.positions[i].a;
            let mut v = self.velocities[i].v;
            let mut w = self.velocities[i].w;

            let translation = v * h;
            if translation.dot(translation) > MAX_TRANSLATION_SQUARED {
                v *= MAX_TRANSLATION / translation.length();
            }
            let rotation = h * w;
            if rotation * rotation > MAX_ROTATION_SQUARED {
                w *= MAX_ROTATION / rotation.abs();
            }

            c += v * h;
            a += h * w;

            self.positions[i] = Position { c, a };
            self.velocities[i] = Velocity { v, w };

            let b = &mut bodies[self.bodies[i]];
            b.sweep.c = c;
            b.sweep.a = a;
            b.linear_velocity = v;
            b.angular_velocity = w;
            b.synchronize_transform();
        }

        report(&contact_solver, contacts, listener);
    }
}

impl Default for Island {
    fn default() -> Self {
        Self::new()
    }
}

/// Report accumulated impulses through `post_solve`
fn report(
    contact_solver: &ContactSolver,
    contacts: &Pool<Contact>,
    listener: &mut dyn ContactListener,
) {
    for vc in contact_solver.velocity_constraints() {
        let contact = &contacts[vc.contact_id];

        let mut impulse = ContactImpulse {
            count: vc.point_count(),
            ..Default::default()
        };
        for j in 0..vc.point_count() {
            impulse.normal_impulses[j] = vc.normal_impulse(j);
            impulse.tangent_impulses[j] = vc.tangent_impulse(j);
        }

        listener.post_solve(contact, &impulse);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyDef;
    use crate::callbacks::DefaultListener;

    fn make_step(dt: f32) -> TimeStep {
        TimeStep {
            dt,
            inv_dt: if dt > 0.0 { 1.0 / dt } else { 0.0 },
            dt_ratio: 1.0,
            velocity_iterations: 8,
            position_iterations: 3,
            warm_starting: true,
        }
    }

    #[test]
    fn test_gravity_integration() {
        let mut bodies = Pool::new();
        let mut contacts = Pool::new();
        let mut joints = Pool::new();
        let fixtures = Pool::new();

        let id = bodies.insert(Body::from_def(&BodyDef::dynamic_at(Vec2::new(0.0, 10.0))));
        bodies[id].reset_mass_data(&fixtures);

        let mut island = Island::new();
        island.add_body(id, &mut bodies[id]);

        let step = make_step(1.0 / 60.0);
        let mut listener = DefaultListener;
        island.solve(
            &step,
            Vec2::new(0.0, -10.0),
            true,
            &mut bodies,
            &mut contacts,
            &mut joints,
            &fixtures,
            &mut listener,
        );

        // One step of gravity: v = -10/60, y moved down by v*h
        let b = &bodies[id];
        assert!((b.linear_velocity().y + 10.0 / 60.0).abs() < 1e-5);
        assert!(b.position().y < 10.0);
    }

    #[test]
    fn test_velocity_clamped_to_max_translation() {
        let mut bodies = Pool::new();
        let mut contacts = Pool::new();
        let mut joints = Pool::new();
        let fixtures = Pool::new();

        let id = bodies.insert(Body::from_def(&BodyDef::dynamic_at(Vec2::ZERO)));
        bodies[id].reset_mass_data(&fixtures);
        bodies[id].linear_velocity = Vec2::new(100000.0, 0.0);

        let mut island = Island::new();
        island.add_body(id, &mut bodies[id]);

        let step = make_step(1.0 / 60.0);
        let mut listener = DefaultListener;
        island.solve(
            &step,
            Vec2::ZERO,
            false,
            &mut bodies,
            &mut contacts,
            &mut joints,
            &fixtures,
            &mut listener,
        );

        // Motion capped at MAX_TRANSLATION per step
        assert!(bodies[id].position().x <= MAX_TRANSLATION + 1e-3);
    }

    #[test]
    fn test_island_sleep_after_idle() {
        let mut bodies = Pool::new();
        let mut contacts = Pool::new();
        let mut joints = Pool::new();
        let fixtures = Pool::new();

        let id = bodies.insert(Body::from_def(&BodyDef::dynamic_at(Vec2::ZERO)));
        bodies[id].reset_mass_data(&fixtures);

        let step = make_step(1.0 / 60.0);
        let mut listener = DefaultListener;

        // No gravity, no motion: the body must fall asleep after TIME_TO_SLEEP
        let steps_needed = (TIME_TO_SLEEP / step.dt) as usize + 2;
        for _ in 0..steps_needed {
            let mut island = Island::new();
            island.add_body(id, &mut bodies[id]);
            island.solve(
                &step,
                Vec2::ZERO,
                true,
                &mut bodies,
                &mut contacts,
                &mut joints,
                &fixtures,
                &mut listener,
            );
        }

        assert!(!bodies[id].is_awake(), "idle body should sleep");
    }

    #[test]
    fn test_damping_slows_body() {
        let mut bodies = Pool::new();
        let mut contacts = Pool::new();
        let mut joints = Pool::new();
        let fixtures = Pool::new();

        let mut def = BodyDef::dynamic_at(Vec2::ZERO);
        def.linear_damping = 5.0;
        let id = bodies.insert(Body::from_def(&def));
        bodies[id].reset_mass_data(&fixtures);
        bodies[id].linear_velocity = Vec2::new(1.0, 0.0);

        let step = make_step(1.0 / 60.0);
        let mut listener = DefaultListener;
        let mut island = Island::new();
        island.add_body(id, &mut bodies[id]);
        island.solve(
            &step,
            Vec2::ZERO,
            false,
            &mut bodies,
            &mut contacts,
            &mut joints,
            &fixtures,
            &mut listener,
        );

        let expected = 1.0 / (1.0 + step.dt * 5.0);
        assert!((bodies[id].linear_velocity().x - expected).abs() < 1e-5);
    }
}
