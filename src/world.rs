//! Physics World
//!
//! Owns the bodies, fixtures, joints, and contact manager, and runs the
//! simulation pipeline:
//!
//! 1. Broad-phase pair discovery feeds the contact manager
//! 2. Narrow-phase collide refreshes every manifold
//! 3. Islands are assembled by flooding the contact/joint graph
//! 4. Each island is solved with warm-started sequential impulses
//! 5. The continuous pass sub-steps bullets and fast bodies to their TOI
//! 6. Moved fixtures update their broad-phase proxies
//!
//! A step is atomic: the world is locked while it runs, and topology
//! mutation (create/destroy of bodies, fixtures, joints) returns
//! `PhysicsError::WorldLocked` until it completes. Deterministic: identical
//! worlds stepped identically produce bit-identical results on the same
//! platform and build.
//!
//! Author: Moroya Sakamoto

use crate::body::{Body, BodyDef, BodyId, BodyType, JointEdge};
use crate::callbacks::{ContactFilter, ContactListener, DefaultListener, DestructionListener};
use crate::ccd::{time_of_impact, ToiInput, ToiState};
use crate::collider::{Aabb, RayCastInput, Shape};
use crate::contact_manager::ContactManager;
use crate::debug_render::{DebugColor, DebugDrawData, DebugDrawFlags};
use crate::distance::DistanceProxy;
use crate::error::PhysicsError;
use crate::fixture::{Fixture, FixtureDef, FixtureId};
use crate::island::{Island, TimeStep};
use crate::joint::{Joint, JointDef, JointId, JointKind};
use crate::joint_extra::GearJoint;
use crate::math::{Rot, Transform, Vec2};
use crate::pool::Pool;
use crate::profiling::{ProfileHistory, StepProfile};
use crate::scratch::ScratchStack;
use crate::tuning::MAX_SUB_STEPS;

#[cfg(not(feature = "std"))]
use alloc::boxed::Box;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

// ============================================================================
// Configuration
// ============================================================================

/// World-level tunables
#[derive(Clone, Copy, Debug)]
pub struct WorldConfig {
    /// Gravity applied to dynamic bodies
    pub gravity: Vec2,
    /// Let idle islands fall asleep
    pub allow_sleep: bool,
    /// Seed the solver with last step's impulses
    pub warm_starting: bool,
    /// Run the continuous-collision pass for bullets and fast bodies
    pub continuous_physics: bool,
    /// Zero force/torque accumulators automatically after each step
    pub auto_clear_forces: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, -10.0),
            allow_sleep: true,
            warm_starting: true,
            continuous_physics: true,
            auto_clear_forces: true,
        }
    }
}

// ============================================================================
// World
// ============================================================================

/// A 2D rigid-body simulation
pub struct World {
    config: WorldConfig,

    pub(crate) bodies: Pool<Body>,
    pub(crate) fixtures: Pool<Fixture>,
    pub(crate) joints: Pool<Joint>,
    pub(crate) contact_manager: ContactManager,

    listener: Box<dyn ContactListener>,
    filter: Box<dyn ContactFilter>,
    destruction_listener: Box<dyn DestructionListener>,

    island: Island,
    toi_island: Island,
    scratch: ScratchStack,

    profile: StepProfile,
    history: ProfileHistory,

    inv_dt0: f32,
    locked: bool,
    new_contacts: bool,
}

impl World {
    /// Create a world with the given gravity and default config
    pub fn new(gravity: Vec2) -> Self {
        Self::with_config(WorldConfig {
            gravity,
            ..Default::default()
        })
    }

    /// Create a world from a full config
    pub fn with_config(config: WorldConfig) -> Self {
        Self {
            config,
            bodies: Pool::new(),
            fixtures: Pool::new(),
            joints: Pool::new(),
            contact_manager: ContactManager::new(),
            listener: Box::new(DefaultListener),
            filter: Box::new(DefaultListener),
            destruction_listener: Box::new(DefaultListener),
            island: Island::new(),
            toi_island: Island::new(),
            scratch: ScratchStack::new(),
            profile: StepProfile::default(),
            history: ProfileHistory::default(),
            inv_dt0: 0.0,
            locked: false,
            new_contacts: false,
        }
    }

    // ========================================================================
    // Configuration and listeners
    // ========================================================================

    /// Current gravity
    #[inline]
    pub fn gravity(&self) -> Vec2 {
        self.config.gravity
    }

    /// Change gravity; wakes nothing, sleeping islands keep sleeping
    #[inline]
    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.config.gravity = gravity;
    }

    /// Install a contact listener
    pub fn set_contact_listener(&mut self, listener: Box<dyn ContactListener>) {
        self.listener = listener;
    }

    /// Install a contact filter
    pub fn set_contact_filter(&mut self, filter: Box<dyn ContactFilter>) {
        self.filter = filter;
    }

    /// Install a destruction listener
    pub fn set_destruction_listener(&mut self, listener: Box<dyn DestructionListener>) {
        self.destruction_listener = listener;
    }

    /// Is a step in progress?
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Counters from the last completed step
    #[inline]
    pub fn profile(&self) -> &StepProfile {
        &self.profile
    }

    /// Aggregated counters since world creation
    #[inline]
    pub fn profile_history(&self) -> &ProfileHistory {
        &self.history
    }

    // ========================================================================
    // Bodies
    // ========================================================================

    /// Create a body
    pub fn create_body(&mut self, def: &BodyDef) -> Result<BodyId, PhysicsError> {
        if self.locked {
            return Err(PhysicsError::WorldLocked);
        }
        Ok(self.bodies.insert(Body::from_def(def)))
    }

    /// Destroy a body along with its fixtures and joints. The destruction
    /// listener hears about the implicitly destroyed joints and fixtures.
    pub fn destroy_body(&mut self, body_id: BodyId) -> Result<(), PhysicsError> {
        if self.locked {
            return Err(PhysicsError::WorldLocked);
        }
        if !self.bodies.contains(body_id) {
            return Err(PhysicsError::InvalidBody {
                index: body_id as usize,
            });
        }

        // Joints first
        while let Some(edge) = self.bodies[body_id].joint_edges.first().copied() {
            self.destruction_listener.say_goodbye_joint(edge.joint);
            self.destroy_joint_internal(edge.joint)?;
        }

        // Contacts
        while let Some(edge) = self.bodies[body_id].contact_edges.first().copied() {
            self.contact_manager
                .destroy_contact(edge.contact, &mut self.bodies, self.listener.as_mut());
        }

        // Fixtures and proxies
        let fixture_ids = core::mem::take(&mut self.bodies[body_id].fixtures);
        for fixture_id in fixture_ids {
            self.destruction_listener.say_goodbye_fixture(fixture_id);
            let mut fixture = self.fixtures.remove(fixture_id).expect("live fixture");
            self.contact_manager.destroy_proxies(&mut fixture);
        }

        self.bodies.remove(body_id);
        Ok(())
    }

    /// Borrow a body
    pub fn body(&self, body_id: BodyId) -> Option<&Body> {
        self.bodies.get(body_id)
    }

    /// Mutably borrow a body. Use [`World::set_transform`] to teleport a
    /// body so its proxies follow.
    pub fn body_mut(&mut self, body_id: BodyId) -> Option<&mut Body> {
        self.bodies.get_mut(body_id)
    }

    /// Live body ids in deterministic order
    pub fn body_ids(&self) -> Vec<BodyId> {
        self.bodies.indices()
    }

    /// Number of live bodies
    #[inline]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Enable or disable a body. Disabling removes its broad-phase proxies
    /// and destroys its contacts; joints stay attached but are skipped by
    /// the solver.
    pub fn set_enabled(&mut self, body_id: BodyId, enabled: bool) -> Result<(), PhysicsError> {
        if self.locked {
            return Err(PhysicsError::WorldLocked);
        }
        if !self.bodies.contains(body_id) {
            return Err(PhysicsError::InvalidBody {
                index: body_id as usize,
            });
        }
        if self.bodies[body_id].enabled == enabled {
            return Ok(());
        }

        self.bodies[body_id].enabled = enabled;

        if enabled {
            let xf = self.bodies[body_id].transform();
            for fixture_id in self.bodies[body_id].fixtures.clone() {
                let fixture = &mut self.fixtures[fixture_id];
                self.contact_manager.create_proxies(fixture_id, fixture, &xf);
            }
            self.new_contacts = true;
        } else {
            for fixture_id in self.bodies[body_id].fixtures.clone() {
                let fixture = &mut self.fixtures[fixture_id];
                self.contact_manager.destroy_proxies(fixture);
            }
            while let Some(edge) = self.bodies[body_id].contact_edges.first().copied() {
                self.contact_manager.destroy_contact(
                    edge.contact,
                    &mut self.bodies,
                    self.listener.as_mut(),
                );
            }
        }
        Ok(())
    }

    /// Teleport a body, keeping the broad phase synchronized
    pub fn set_transform(
        &mut self,
        body_id: BodyId,
        position: Vec2,
        angle: f32,
    ) -> Result<(), PhysicsError> {
        if self.locked {
            return Err(PhysicsError::WorldLocked);
        }
        let Some(body) = self.bodies.get_mut(body_id) else {
            return Err(PhysicsError::InvalidBody {
                index: body_id as usize,
            });
        };

        body.xf = Transform::new(position, angle);
        body.sweep.c = body.xf.transform_point(body.sweep.local_center);
        body.sweep.a = angle;
        body.sweep.c0 = body.sweep.c;
        body.sweep.a0 = angle;

        let xf = body.xf;
        for fixture_id in body.fixtures.clone() {
            self.contact_manager
                .synchronize_fixture(&self.fixtures[fixture_id], &xf, &xf);
        }
        self.new_contacts = true;
        Ok(())
    }

    // ========================================================================
    // Fixtures
    // ========================================================================

    /// Attach a fixture to a body; creates broad-phase proxies and
    /// recomputes the body's mass
    pub fn create_fixture(
        &mut self,
        body_id: BodyId,
        def: &FixtureDef,
    ) -> Result<FixtureId, PhysicsError> {
        if self.locked {
            return Err(PhysicsError::WorldLocked);
        }
        if !self.bodies.contains(body_id) {
            return Err(PhysicsError::InvalidBody {
                index: body_id as usize,
            });
        }

        let fixture_id = self.fixtures.insert(Fixture::from_def(body_id, def));

        // Disabled bodies get their proxies when re-enabled
        if self.bodies[body_id].is_enabled() {
            let xf = self.bodies[body_id].transform();
            let fixture = &mut self.fixtures[fixture_id];
            self.contact_manager.create_proxies(fixture_id, fixture, &xf);
        }

        self.bodies[body_id].fixtures.push(fixture_id);
        if def.density > 0.0 {
            self.bodies[body_id].reset_mass_data(&self.fixtures);
        }

        // The broad phase must look at this fixture before the next solve
        self.new_contacts = true;
        Ok(fixture_id)
    }

    /// Remove a fixture from its body, detaching any contacts built on it
    pub fn destroy_fixture(&mut self, fixture_id: FixtureId) -> Result<(), PhysicsError> {
        if self.locked {
            return Err(PhysicsError::WorldLocked);
        }
        if !self.fixtures.contains(fixture_id) {
            return Err(PhysicsError::InvalidFixture {
                index: fixture_id as usize,
            });
        }

        let body_id = self.fixtures[fixture_id].body();

        // Contacts referencing this fixture go away now
        let doomed: Vec<_> = self.bodies[body_id]
            .contact_edges
            .iter()
            .filter(|edge| {
                let contact = &self.contact_manager.contacts[edge.contact];
                contact.fixture_a() == fixture_id || contact.fixture_b() == fixture_id
            })
            .map(|edge| edge.contact)
            .collect();
        for contact_id in doomed {
            self.contact_manager
                .destroy_contact(contact_id, &mut self.bodies, self.listener.as_mut());
        }

        let mut fixture = self.fixtures.remove(fixture_id).expect("live fixture");
        self.contact_manager.destroy_proxies(&mut fixture);

        self.bodies[body_id].fixtures.retain(|&id| id != fixture_id);
        self.bodies[body_id].reset_mass_data(&self.fixtures);
        Ok(())
    }

    /// Borrow a fixture
    pub fn fixture(&self, fixture_id: FixtureId) -> Option<&Fixture> {
        self.fixtures.get(fixture_id)
    }

    /// Mutably borrow a fixture. Changing its filter only applies to new
    /// pairs; call [`World::refilter_fixture`] to re-evaluate existing ones.
    pub fn fixture_mut(&mut self, fixture_id: FixtureId) -> Option<&mut Fixture> {
        self.fixtures.get_mut(fixture_id)
    }

    /// Re-run filtering for every contact touching this fixture
    pub fn refilter_fixture(&mut self, fixture_id: FixtureId) -> Result<(), PhysicsError> {
        if !self.fixtures.contains(fixture_id) {
            return Err(PhysicsError::InvalidFixture {
                index: fixture_id as usize,
            });
        }
        self.contact_manager
            .refilter_fixture(fixture_id, &self.bodies, &self.fixtures);
        let fixture = self.fixtures[fixture_id].clone();
        self.contact_manager.touch_proxies(&fixture);
        self.new_contacts = true;
        Ok(())
    }

    // ========================================================================
    // Joints
    // ========================================================================

    /// Create a joint from a definition
    pub fn create_joint(&mut self, def: &JointDef) -> Result<JointId, PhysicsError> {
        if self.locked {
            return Err(PhysicsError::WorldLocked);
        }

        let base = *def.base();
        if base.body_a == base.body_b {
            return Err(PhysicsError::InvalidJointDef {
                reason: "joint connects a body to itself",
            });
        }
        if !self.bodies.contains(base.body_a) || !self.bodies.contains(base.body_b) {
            return Err(PhysicsError::InvalidJointDef {
                reason: "joint references a destroyed body",
            });
        }

        let kind = match def {
            JointDef::Revolute(d) => JointKind::Revolute(crate::joint::RevoluteJoint::from_def(d)),
            JointDef::Prismatic(d) => {
                JointKind::Prismatic(crate::joint::PrismaticJoint::from_def(d))
            }
            JointDef::Distance(d) => JointKind::Distance(crate::joint::DistanceJoint::from_def(d)),
            JointDef::Weld(d) => JointKind::Weld(crate::joint::WeldJoint::from_def(d)),
            JointDef::Mouse(d) => JointKind::Mouse(crate::joint::MouseJoint::from_def(d)),
            JointDef::Pulley(d) => {
                JointKind::Pulley(crate::joint_extra::PulleyJoint::from_def(d))
            }
            JointDef::Gear(d) => {
                let joint1 = self.joints.get(d.joint1).ok_or(PhysicsError::InvalidJointDef {
                    reason: "gear references a destroyed joint",
                })?;
                let joint2 = self.joints.get(d.joint2).ok_or(PhysicsError::InvalidJointDef {
                    reason: "gear references a destroyed joint",
                })?;
                JointKind::Gear(GearJoint::new(d, joint1, joint2, &self.bodies)?)
            }
            JointDef::Wheel(d) => JointKind::Wheel(crate::joint_extra::WheelJoint::from_def(d)),
            JointDef::Friction(d) => {
                JointKind::Friction(crate::joint_extra::FrictionJoint::from_def(d))
            }
            JointDef::Motor(d) => JointKind::Motor(crate::joint_extra::MotorJoint::from_def(d)),
        };

        let joint_id = self.joints.insert(Joint {
            body_a: base.body_a,
            body_b: base.body_b,
            collide_connected: base.collide_connected,
            island_flag: false,
            kind,
            user_data: base.user_data,
        });

        self.bodies[base.body_a].joint_edges.push(JointEdge {
            joint: joint_id,
            other: base.body_b,
            collide_connected: base.collide_connected,
        });
        self.bodies[base.body_b].joint_edges.push(JointEdge {
            joint: joint_id,
            other: base.body_a,
            collide_connected: base.collide_connected,
        });

        self.bodies[base.body_a].set_awake(true);
        self.bodies[base.body_b].set_awake(true);

        // Existing contacts between the pair may now be forbidden
        if !base.collide_connected {
            self.flag_contacts_between(base.body_a, base.body_b);
        }

        Ok(joint_id)
    }

    /// Destroy a joint
    pub fn destroy_joint(&mut self, joint_id: JointId) -> Result<(), PhysicsError> {
        if self.locked {
            return Err(PhysicsError::WorldLocked);
        }
        self.destroy_joint_internal(joint_id)
    }

    fn destroy_joint_internal(&mut self, joint_id: JointId) -> Result<(), PhysicsError> {
        let Some(joint) = self.joints.remove(joint_id) else {
            return Err(PhysicsError::InvalidJoint {
                index: joint_id as usize,
            });
        };

        let body_a = joint.body_a();
        let body_b = joint.body_b();

        self.bodies[body_a]
            .joint_edges
            .retain(|edge| edge.joint != joint_id);
        self.bodies[body_b]
            .joint_edges
            .retain(|edge| edge.joint != joint_id);

        self.bodies[body_a].set_awake(true);
        self.bodies[body_b].set_awake(true);

        // Collision between the pair may be allowed again
        if !joint.collide_connected() {
            self.flag_contacts_between(body_a, body_b);
        }

        Ok(())
    }

    fn flag_contacts_between(&mut self, body_a: BodyId, body_b: BodyId) {
        let edges: Vec<_> = self.bodies[body_b]
            .contact_edges
            .iter()
            .filter(|edge| edge.other == body_a)
            .map(|edge| edge.contact)
            .collect();
        for contact_id in edges {
            self.contact_manager.contacts[contact_id].flag_for_filtering();
        }
    }

    /// Borrow a joint
    pub fn joint(&self, joint_id: JointId) -> Option<&Joint> {
        self.joints.get(joint_id)
    }

    /// Mutably borrow a joint (motor speeds, mouse targets, limits)
    pub fn joint_mut(&mut self, joint_id: JointId) -> Option<&mut Joint> {
        self.joints.get_mut(joint_id)
    }

    /// Number of live joints
    #[inline]
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// Number of live contacts (touching or not)
    #[inline]
    pub fn contact_count(&self) -> usize {
        self.contact_manager.contacts.len()
    }

    /// Borrow a contact
    pub fn contact(&self, contact_id: crate::body::ContactId) -> Option<&crate::contact::Contact> {
        self.contact_manager.contacts.get(contact_id)
    }

    /// Live contact ids in deterministic order
    pub fn contact_ids(&self) -> Vec<crate::body::ContactId> {
        self.contact_manager.contacts.indices()
    }

    /// Is there a touching contact between the two fixtures?
    pub fn fixtures_touching(&self, fixture_a: FixtureId, fixture_b: FixtureId) -> bool {
        self.contact_manager.contacts.iter().any(|(_, c)| {
            c.is_touching()
                && ((c.fixture_a() == fixture_a && c.fixture_b() == fixture_b)
                    || (c.fixture_a() == fixture_b && c.fixture_b() == fixture_a))
        })
    }

    // ========================================================================
    // Stepping
    // ========================================================================

    /// Advance the world by `dt` seconds.
    ///
    /// `velocity_iterations` and `position_iterations` trade accuracy for
    /// cost; 8 and 3 are the usual values.
    pub fn step(&mut self, dt: f32, velocity_iterations: usize, position_iterations: usize) {
        debug_assert!(dt >= 0.0, "negative timestep");
        debug_assert!(!self.locked, "re-entrant step");

        self.profile = StepProfile {
            scratch_peak_bytes: self.scratch.max_allocation(),
            ..Default::default()
        };

        // New fixtures since the last step need pairing before collide
        if self.new_contacts {
            self.profile.broadphase_pairs += self.contact_manager.find_new_contacts(
                &mut self.bodies,
                &self.fixtures,
                self.filter.as_mut(),
            ) as u32;
            self.new_contacts = false;
        }

        self.locked = true;

        let step = TimeStep {
            dt,
            inv_dt: if dt > 0.0 { 1.0 / dt } else { 0.0 },
            dt_ratio: self.inv_dt0 * dt,
            velocity_iterations,
            position_iterations,
            warm_starting: self.config.warm_starting,
        };

        // Narrow phase
        self.contact_manager.collide(
            &mut self.bodies,
            &self.fixtures,
            self.filter.as_mut(),
            self.listener.as_mut(),
        );
        self.profile.narrowphase_tests = self.contact_manager.contacts.len() as u32;
        self.profile.touching_contacts = self
            .contact_manager
            .contacts
            .iter()
            .filter(|(_, c)| c.is_touching())
            .count() as u32;

        // Integrate, solve islands, synchronize
        if step.dt > 0.0 {
            self.solve(&step);
        }

        // Continuous collision
        if self.config.continuous_physics && step.dt > 0.0 {
            self.solve_toi(&step);
        }

        if step.dt > 0.0 {
            self.inv_dt0 = step.inv_dt;
        }

        if self.config.auto_clear_forces {
            self.clear_forces();
        }

        self.locked = false;

        self.profile.scratch_peak_bytes = self.scratch.max_allocation();
        self.history.record(&self.profile);
    }

    /// Zero all force and torque accumulators
    pub fn clear_forces(&mut self) {
        for (_, body) in self.bodies.iter_mut() {
            body.force = Vec2::ZERO;
            body.torque = 0.0;
        }
    }

    /// Discrete island solve
    fn solve(&mut self, step: &TimeStep) {
        // Clear island bookkeeping
        for (_, body) in self.bodies.iter_mut() {
            body.island_flag = false;
        }
        for (_, contact) in self.contact_manager.contacts.iter_mut() {
            contact.island_flag = false;
        }
        for (_, joint) in self.joints.iter_mut() {
            joint.island_flag = false;
        }

        let seeds = self.bodies.indices();
        let mut stack = self.scratch.acquire(seeds.len());

        for seed in seeds {
            {
                let body = &self.bodies[seed];
                if body.island_flag
                    || !body.is_awake()
                    || !body.is_enabled()
                    || body.body_type() == BodyType::Static
                {
                    continue;
                }
            }

            self.island.clear();
            stack.buf.clear();
            stack.buf.push(seed);
            self.bodies[seed].island_flag = true;

            // Flood the graph from the seed
            while let Some(body_id) = stack.buf.pop() {
                self.island.add_body(body_id, &mut self.bodies[body_id]);

                // Everything in the island must move; wake without resetting
                // the sleep timer
                self.bodies[body_id].awake = true;

                // Static bodies anchor islands but never propagate them
                if self.bodies[body_id].body_type() == BodyType::Static {
                    continue;
                }

                // Contacts
                let contact_edge_count = self.bodies[body_id].contact_edges.len();
                for edge_index in 0..contact_edge_count {
                    let edge = self.bodies[body_id].contact_edges[edge_index];
                    let contact = &self.contact_manager.contacts[edge.contact];

                    if contact.island_flag || !contact.is_enabled() || !contact.is_touching() {
                        continue;
                    }
                    // Sensors report but never constrain
                    if self.fixtures[contact.fixture_a()].is_sensor()
                        || self.fixtures[contact.fixture_b()].is_sensor()
                    {
                        continue;
                    }

                    self.contact_manager.contacts[edge.contact].island_flag = true;
                    self.island.add_contact(edge.contact);

                    if !self.bodies[edge.other].island_flag {
                        self.bodies[edge.other].island_flag = true;
                        stack.buf.push(edge.other);
                    }
                }

                // Joints
                let joint_edge_count = self.bodies[body_id].joint_edges.len();
                for edge_index in 0..joint_edge_count {
                    let edge = self.bodies[body_id].joint_edges[edge_index];
                    if self.joints[edge.joint].island_flag {
                        continue;
                    }
                    if !self.bodies[edge.other].is_enabled() {
                        continue;
                    }

                    self.joints[edge.joint].island_flag = true;
                    self.island.add_joint(edge.joint);

                    if !self.bodies[edge.other].island_flag {
                        self.bodies[edge.other].island_flag = true;
                        stack.buf.push(edge.other);
                    }
                }
            }

            self.profile.islands += 1;
            self.profile.solved_bodies += self.island.bodies.len() as u32;
            self.profile.solved_joints += self.island.joints.len() as u32;

            self.island.solve(
                step,
                self.config.gravity,
                self.config.allow_sleep,
                &mut self.bodies,
                &mut self.contact_manager.contacts,
                &mut self.joints,
                &self.fixtures,
                self.listener.as_mut(),
            );

            // Static bodies may seed several islands
            for &body_id in &self.island.bodies {
                if self.bodies[body_id].body_type() == BodyType::Static {
                    self.bodies[body_id].island_flag = false;
                }
            }
        }

        self.scratch.release(stack);

        // Push the new transforms into the broad phase
        let moved = self.bodies.indices();
        for body_id in moved {
            let body = &self.bodies[body_id];
            if !body.island_flag || body.body_type() == BodyType::Static {
                continue;
            }
            self.synchronize_fixtures(body_id);
        }

        self.profile.broadphase_pairs += self.contact_manager.find_new_contacts(
            &mut self.bodies,
            &self.fixtures,
            self.filter.as_mut(),
        ) as u32;
    }

    /// Update a body's proxies from its sweep motion this step
    fn synchronize_fixtures(&mut self, body_id: BodyId) {
        let body = &self.bodies[body_id];
        let q0 = Rot::from_angle(body.sweep.a0);
        let xf1 = Transform {
            q: q0,
            p: body.sweep.c0 - q0.rotate(body.sweep.local_center),
        };
        let xf2 = body.xf;

        for fixture_id in body.fixtures.clone() {
            self.contact_manager
                .synchronize_fixture(&self.fixtures[fixture_id], &xf1, &xf2);
            self.profile.proxies_moved += 1;
        }
    }

    // ========================================================================
    // Continuous collision
    // ========================================================================

    /// Find TOI events among bullets and fast bodies and sub-step them
    fn solve_toi(&mut self, step: &TimeStep) {
        // Fresh interval for every body and contact
        for (_, body) in self.bodies.iter_mut() {
            body.island_flag = false;
            body.sweep.alpha0 = 0.0;
        }
        for (_, contact) in self.contact_manager.contacts.iter_mut() {
            contact.island_flag = false;
            contact.toi_valid = false;
            contact.toi_count = 0;
        }

        // Sub-step until every body consumed its full interval
        loop {
            let mut min_contact = None;
            let mut min_alpha = 1.0_f32;

            let contact_ids = self.contact_manager.contacts.indices();
            for contact_id in contact_ids {
                let contact = &self.contact_manager.contacts[contact_id];
                if !contact.is_enabled() {
                    continue;
                }
                if contact.toi_count as usize > MAX_SUB_STEPS {
                    continue;
                }

                let alpha = if contact.toi_valid {
                    contact.toi
                } else {
                    let fixture_a = &self.fixtures[contact.fixture_a()];
                    let fixture_b = &self.fixtures[contact.fixture_b()];
                    if fixture_a.is_sensor() || fixture_b.is_sensor() {
                        continue;
                    }

                    let body_a_id = contact.body_a();
                    let body_b_id = contact.body_b();
                    let (child_a, child_b) = (contact.child_a(), contact.child_b());

                    let type_a = self.bodies[body_a_id].body_type();
                    let type_b = self.bodies[body_b_id].body_type();
                    debug_assert!(type_a == BodyType::Dynamic || type_b == BodyType::Dynamic);

                    let active_a =
                        self.bodies[body_a_id].is_awake() && type_a != BodyType::Static;
                    let active_b =
                        self.bodies[body_b_id].is_awake() && type_b != BodyType::Static;
                    if !active_a && !active_b {
                        continue;
                    }

                    // Only bullets get continuous treatment against other
                    // dynamic bodies
                    let collide_a =
                        self.bodies[body_a_id].is_bullet() || type_a != BodyType::Dynamic;
                    let collide_b =
                        self.bodies[body_b_id].is_bullet() || type_b != BodyType::Dynamic;
                    if !collide_a && !collide_b {
                        continue;
                    }

                    // Advance both sweeps to the later alpha0
                    let alpha0_a = self.bodies[body_a_id].sweep.alpha0;
                    let alpha0_b = self.bodies[body_b_id].sweep.alpha0;
                    let alpha0 = alpha0_a.max(alpha0_b);
                    debug_assert!(alpha0 < 1.0);
                    if alpha0_a < alpha0 {
                        self.bodies[body_a_id].sweep.advance(alpha0);
                    } else if alpha0_b < alpha0 {
                        self.bodies[body_b_id].sweep.advance(alpha0);
                    }

                    let input = ToiInput {
                        proxy_a: DistanceProxy::from_shape(&fixture_a.shape, child_a),
                        proxy_b: DistanceProxy::from_shape(&fixture_b.shape, child_b),
                        sweep_a: self.bodies[body_a_id].sweep,
                        sweep_b: self.bodies[body_b_id].sweep,
                        t_max: 1.0,
                    };
                    let output = time_of_impact(&input);
                    self.profile.toi_queries += 1;

                    let beta = output.t;
                    let alpha = if output.state == ToiState::Touching {
                        (alpha0 + (1.0 - alpha0) * beta).min(1.0)
                    } else {
                        1.0
                    };

                    let contact = &mut self.contact_manager.contacts[contact_id];
                    contact.toi = alpha;
                    contact.toi_valid = true;
                    alpha
                };

                if alpha < min_alpha {
                    min_contact = Some(contact_id);
                    min_alpha = alpha;
                }
            }

            let Some(contact_id) = min_contact else {
                break;
            };
            if min_alpha > 1.0 - 10.0 * f32::EPSILON {
                // Every body made it to the end of the step
                break;
            }

            // Advance the two bodies to the impact time
            let (body_a_id, body_b_id) = {
                let contact = &self.contact_manager.contacts[contact_id];
                (contact.body_a(), contact.body_b())
            };

            let backup_a = self.bodies[body_a_id].sweep;
            let backup_b = self.bodies[body_b_id].sweep;

            self.bodies[body_a_id].advance(min_alpha);
            self.bodies[body_b_id].advance(min_alpha);

            // The contact may have vanished by the impact time
            self.contact_manager.contacts[contact_id].update(
                &self.fixtures,
                &mut self.bodies,
                self.listener.as_mut(),
            );
            self.contact_manager.contacts[contact_id].toi_valid = false;
            self.contact_manager.contacts[contact_id].toi_count += 1;

            if !self.contact_manager.contacts[contact_id].is_enabled()
                || !self.contact_manager.contacts[contact_id].is_touching()
            {
                // False alarm: rewind
                self.contact_manager.contacts[contact_id].enabled = false;
                self.bodies[body_a_id].sweep = backup_a;
                self.bodies[body_b_id].sweep = backup_b;
                self.bodies[body_a_id].synchronize_transform();
                self.bodies[body_b_id].synchronize_transform();
                continue;
            }

            self.bodies[body_a_id].set_awake(true);
            self.bodies[body_b_id].set_awake(true);

            // Mini-island: the impact pair plus whatever touches it
            self.toi_island.clear();
            self.toi_island.add_body(body_a_id, &mut self.bodies[body_a_id]);
            self.toi_island.add_body(body_b_id, &mut self.bodies[body_b_id]);
            self.toi_island.add_contact(contact_id);

            self.bodies[body_a_id].island_flag = true;
            self.bodies[body_b_id].island_flag = true;
            self.contact_manager.contacts[contact_id].island_flag = true;

            // One hop from each primary, only through dynamic bullets'
            // neighbors
            for body_id in [body_a_id, body_b_id] {
                if self.bodies[body_id].body_type() != BodyType::Dynamic {
                    continue;
                }

                let edge_count = self.bodies[body_id].contact_edges.len();
                for edge_index in 0..edge_count {
                    if self.toi_island.contacts.len() >= crate::tuning::MAX_TOI_CONTACTS {
                        break;
                    }

                    let edge = self.bodies[body_id].contact_edges[edge_index];
                    if self.contact_manager.contacts[edge.contact].island_flag {
                        continue;
                    }

                    let other = edge.other;
                    // Cascading through other fast dynamic bodies is cut off
                    if self.bodies[other].body_type() == BodyType::Dynamic
                        && !self.bodies[body_id].is_bullet()
                        && !self.bodies[other].is_bullet()
                    {
                        continue;
                    }

                    let (fixture_a, fixture_b) = {
                        let c = &self.contact_manager.contacts[edge.contact];
                        (c.fixture_a(), c.fixture_b())
                    };
                    if self.fixtures[fixture_a].is_sensor() || self.fixtures[fixture_b].is_sensor()
                    {
                        continue;
                    }

                    // Bring the neighbor to the impact time before testing
                    let backup = self.bodies[other].sweep;
                    if !self.bodies[other].island_flag {
                        self.bodies[other].advance(min_alpha);
                    }

                    self.contact_manager.contacts[edge.contact].update(
                        &self.fixtures,
                        &mut self.bodies,
                        self.listener.as_mut(),
                    );

                    let keep = self.contact_manager.contacts[edge.contact].is_enabled()
                        && self.contact_manager.contacts[edge.contact].is_touching();
                    if !keep {
                        self.bodies[other].sweep = backup;
                        self.bodies[other].synchronize_transform();
                        continue;
                    }

                    self.contact_manager.contacts[edge.contact].island_flag = true;
                    self.toi_island.add_contact(edge.contact);

                    if self.bodies[other].island_flag {
                        continue;
                    }
                    self.bodies[other].island_flag = true;
                    if self.bodies[other].body_type() != BodyType::Static {
                        self.bodies[other].set_awake(true);
                    }
                    self.toi_island.add_body(other, &mut self.bodies[other]);
                }
            }

            // Solve the remaining interval with the stiff TOI solver
            let remaining_dt = (1.0 - min_alpha) * step.dt;
            let sub_step = TimeStep {
                dt: remaining_dt,
                inv_dt: if remaining_dt > 0.0 {
                    1.0 / remaining_dt
                } else {
                    0.0
                },
                dt_ratio: 1.0,
                velocity_iterations: step.velocity_iterations,
                position_iterations: 20,
                warm_starting: false,
            };

            let toi_index_a = self.bodies[body_a_id].island_index;
            let toi_index_b = self.bodies[body_b_id].island_index;
            self.toi_island.solve_toi(
                &sub_step,
                toi_index_a,
                toi_index_b,
                &mut self.bodies,
                &mut self.contact_manager.contacts,
                &self.fixtures,
                self.listener.as_mut(),
            );
            self.profile.toi_substeps += 1;

            // Island bodies are live again; their contact TOIs are stale
            let island_bodies: Vec<_> = self.toi_island.bodies.clone();
            for body_id in island_bodies {
                self.bodies[body_id].island_flag = false;
                if self.bodies[body_id].body_type() != BodyType::Dynamic {
                    continue;
                }
                self.synchronize_fixtures(body_id);

                let edge_count = self.bodies[body_id].contact_edges.len();
                for edge_index in 0..edge_count {
                    let edge = self.bodies[body_id].contact_edges[edge_index];
                    let contact = &mut self.contact_manager.contacts[edge.contact];
                    contact.toi_valid = false;
                    contact.island_flag = false;
                }
            }

            // New pairs may have appeared at the impact configuration
            self.profile.broadphase_pairs += self.contact_manager.find_new_contacts(
                &mut self.bodies,
                &self.fixtures,
                self.filter.as_mut(),
            ) as u32;
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Visit every fixture whose fat AABB overlaps `aabb`. Return false from
    /// the callback to stop.
    pub fn query_aabb<F: FnMut(FixtureId) -> bool>(&self, aabb: &Aabb, mut callback: F) {
        self.contact_manager.broad_phase.query(aabb, |tree_proxy| {
            let record_id = self.contact_manager.broad_phase.user_data(tree_proxy);
            let record = &self.contact_manager.proxies[record_id];
            callback(record.fixture)
        });
    }

    /// Cast a ray from `p1` to `p2`. The callback receives
    /// (fixture, point, normal, fraction) for each precise hit and returns a
    /// clip value: 0 stops the cast, the incoming fraction narrows the ray
    /// for closest-hit searches, 1 keeps scanning everything.
    pub fn ray_cast<F: FnMut(FixtureId, Vec2, Vec2, f32) -> f32>(
        &self,
        p1: Vec2,
        p2: Vec2,
        mut callback: F,
    ) {
        let input = RayCastInput {
            p1,
            p2,
            max_fraction: 1.0,
        };

        self.contact_manager
            .broad_phase
            .ray_cast(&input, |sub_input, tree_proxy| {
                let record_id = self.contact_manager.broad_phase.user_data(tree_proxy);
                let record = &self.contact_manager.proxies[record_id];
                let fixture = &self.fixtures[record.fixture];
                let body = &self.bodies[fixture.body()];

                let Some(output) =
                    fixture
                        .shape
                        .ray_cast(sub_input, &body.transform(), record.child_index)
                else {
                    return sub_input.max_fraction; // keep the current clip
                };

                let fraction = output.fraction;
                let point = sub_input.p1 * (1.0 - fraction) + sub_input.p2 * fraction;
                callback(record.fixture, point, output.normal, fraction)
            });
    }

    /// Shift the world origin: `new_origin` is expressed in the old frame
    /// and becomes (0, 0)
    pub fn shift_origin(&mut self, new_origin: Vec2) {
        debug_assert!(!self.locked);

        for (_, body) in self.bodies.iter_mut() {
            body.xf.p -= new_origin;
            body.sweep.c0 -= new_origin;
            body.sweep.c -= new_origin;
        }

        for (_, joint) in self.joints.iter_mut() {
            match &mut joint.kind {
                JointKind::Pulley(pulley) => {
                    pulley.ground_anchor_a -= new_origin;
                    pulley.ground_anchor_b -= new_origin;
                }
                JointKind::Mouse(mouse) => {
                    mouse.target -= new_origin;
                }
                _ => {}
            }
        }

        self.contact_manager.broad_phase.shift_origin(new_origin);
    }

    // ========================================================================
    // Debug drawing
    // ========================================================================

    /// Emit the world's geometry into draw buffers
    pub fn debug_draw(&self, data: &mut DebugDrawData, flags: DebugDrawFlags) {
        if flags.shapes {
            for (_, fixture) in self.fixtures.iter() {
                let body = &self.bodies[fixture.body()];
                let color = match body.body_type() {
                    BodyType::Static => DebugColor::STATIC,
                    BodyType::Kinematic => DebugColor::KINEMATIC,
                    BodyType::Dynamic => {
                        if body.is_awake() {
                            DebugColor::AWAKE
                        } else {
                            DebugColor::ASLEEP
                        }
                    }
                };
                draw_shape(data, &fixture.shape, &body.transform(), color);
            }
        }

        if flags.joints {
            for (_, joint) in self.joints.iter() {
                let xf_a = self.bodies[joint.body_a()].transform();
                let xf_b = self.bodies[joint.body_b()].transform();
                data.segment(xf_a.p, xf_b.p, DebugColor::JOINT);
            }
        }

        if flags.aabbs {
            for (_, record) in self.contact_manager.proxies.iter() {
                let aabb = self
                    .contact_manager
                    .broad_phase
                    .fat_aabb(record.tree_proxy);
                let corners = [
                    aabb.min,
                    Vec2::new(aabb.max.x, aabb.min.y),
                    aabb.max,
                    Vec2::new(aabb.min.x, aabb.max.y),
                ];
                data.polygon(&corners, DebugColor::AABB);
            }
        }

        if flags.contacts {
            for (_, contact) in self.contact_manager.contacts.iter() {
                if !contact.is_touching() {
                    continue;
                }
                let fixture_a = &self.fixtures[contact.fixture_a()];
                let fixture_b = &self.fixtures[contact.fixture_b()];
                let xf_a = self.bodies[contact.body_a()].transform();
                let xf_b = self.bodies[contact.body_b()].transform();
                let wm = crate::manifold::WorldManifold::new(
                    &contact.manifold,
                    &xf_a,
                    fixture_a.shape.radius(),
                    &xf_b,
                    fixture_b.shape.radius(),
                );
                for i in 0..contact.manifold.point_count {
                    data.point(wm.points[i], 4.0, DebugColor::CONTACT);
                    data.segment(
                        wm.points[i],
                        wm.points[i] + wm.normal * 0.3,
                        DebugColor::CONTACT,
                    );
                }
            }
        }

        if flags.transforms {
            for (_, body) in self.bodies.iter() {
                let xf = body.transform();
                data.segment(xf.p, xf.p + xf.q.x_axis() * 0.4, DebugColor::rgb(1.0, 0.0, 0.0));
                data.segment(xf.p, xf.p + xf.q.y_axis() * 0.4, DebugColor::rgb(0.0, 1.0, 0.0));
            }
        }
    }
}

/// Outline one shape into the draw buffers
fn draw_shape(data: &mut DebugDrawData, shape: &Shape, xf: &Transform, color: DebugColor) {
    match shape {
        Shape::Circle(circle) => {
            let center = xf.transform_point(circle.position);
            data.circle(center, circle.radius, color);
            // Radius tick shows rotation
            data.segment(center, center + xf.q.x_axis() * circle.radius, color);
        }
        Shape::Edge(edge) => {
            data.segment(
                xf.transform_point(edge.vertex1),
                xf.transform_point(edge.vertex2),
                color,
            );
        }
        Shape::Polygon(polygon) => {
            let mut world = [Vec2::ZERO; crate::tuning::MAX_POLYGON_VERTICES];
            for i in 0..polygon.count {
                world[i] = xf.transform_point(polygon.vertices[i]);
            }
            data.polygon(&world[..polygon.count], color);
        }
        Shape::Chain(chain) => {
            for w in chain.vertices.windows(2) {
                data.segment(xf.transform_point(w[0]), xf.transform_point(w[1]), color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circle::CircleShape;
    use crate::edge::EdgeShape;
    use crate::polygon::PolygonShape;

    fn ground_world() -> (World, BodyId) {
        let mut world = World::new(Vec2::new(0.0, -10.0));
        let ground = world.create_body(&BodyDef::static_at(Vec2::ZERO)).unwrap();
        let edge = EdgeShape::two_sided(Vec2::new(-40.0, 0.0), Vec2::new(40.0, 0.0));
        world
            .create_fixture(ground, &FixtureDef::new(Shape::Edge(edge)).with_density(0.0))
            .unwrap();
        (world, ground)
    }

    #[test]
    fn test_body_falls_under_gravity() {
        let mut world = World::new(Vec2::new(0.0, -10.0));
        let body = world
            .create_body(&BodyDef::dynamic_at(Vec2::new(0.0, 10.0)))
            .unwrap();
        world
            .create_fixture(
                body,
                &FixtureDef::new(Shape::Circle(CircleShape::new(Vec2::ZERO, 0.5))),
            )
            .unwrap();

        for _ in 0..60 {
            world.step(1.0 / 60.0, 8, 3);
        }

        assert!(world.body(body).unwrap().position().y < 10.0);
    }

    #[test]
    fn test_box_rests_on_ground() {
        let (mut world, _ground) = ground_world();
        let body = world
            .create_body(&BodyDef::dynamic_at(Vec2::new(0.0, 4.0)))
            .unwrap();
        world
            .create_fixture(
                body,
                &FixtureDef::new(Shape::Polygon(PolygonShape::new_box(0.5, 0.5))),
            )
            .unwrap();

        for _ in 0..240 {
            world.step(1.0 / 60.0, 8, 3);
        }

        let b = world.body(body).unwrap();
        // Resting on the ground with its half extent above y=0
        assert!(
            (b.position().y - 0.5).abs() < 0.03,
            "y = {}",
            b.position().y
        );
        assert!(b.linear_velocity().length() < 0.05);
    }

    #[test]
    fn test_locked_world_rejects_mutation() {
        // The lock flag is checked directly; simulate mid-step state
        let mut world = World::new(Vec2::ZERO);
        world.locked = true;
        assert_eq!(
            world.create_body(&BodyDef::default()),
            Err(PhysicsError::WorldLocked)
        );
        world.locked = false;
        assert!(world.create_body(&BodyDef::default()).is_ok());
    }

    #[test]
    fn test_destroy_body_removes_contacts_and_fixtures() {
        let (mut world, _ground) = ground_world();
        let body = world
            .create_body(&BodyDef::dynamic_at(Vec2::new(0.0, 0.4)))
            .unwrap();
        world
            .create_fixture(
                body,
                &FixtureDef::new(Shape::Circle(CircleShape::new(Vec2::ZERO, 0.5))),
            )
            .unwrap();

        world.step(1.0 / 60.0, 8, 3);
        assert!(world.contact_count() > 0);

        world.destroy_body(body).unwrap();
        assert_eq!(world.body_count(), 1);
        assert_eq!(world.contact_count(), 0);

        // World keeps stepping fine afterwards
        world.step(1.0 / 60.0, 8, 3);
    }

    #[test]
    fn test_destroy_body_notifies_joint_destruction() {
        use std::sync::atomic::{AtomicU32, Ordering};
        static GOODBYES: AtomicU32 = AtomicU32::new(0);

        struct Recorder;
        impl DestructionListener for Recorder {
            fn say_goodbye_joint(&mut self, _joint: JointId) {
                GOODBYES.fetch_add(1, Ordering::SeqCst);
            }
        }

        let mut world = World::new(Vec2::ZERO);
        world.set_destruction_listener(Box::new(Recorder));

        let a = world.create_body(&BodyDef::static_at(Vec2::ZERO)).unwrap();
        let b = world
            .create_body(&BodyDef::dynamic_at(Vec2::new(2.0, 0.0)))
            .unwrap();
        world
            .create_fixture(
                b,
                &FixtureDef::new(Shape::Circle(CircleShape::new(Vec2::ZERO, 0.5))),
            )
            .unwrap();

        let def = crate::joint::DistanceJointDef::new(
            a,
            b,
            &world.body(a).unwrap().transform(),
            &world.body(b).unwrap().transform(),
            Vec2::ZERO,
            Vec2::new(2.0, 0.0),
        );
        world.create_joint(&JointDef::Distance(def)).unwrap();
        assert_eq!(world.joint_count(), 1);

        world.destroy_body(b).unwrap();
        assert_eq!(world.joint_count(), 0);
        assert_eq!(GOODBYES.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_query_aabb_finds_fixture() {
        let (world, _ground) = ground_world();
        let mut hits = Vec::new();
        world.query_aabb(
            &Aabb::new(Vec2::new(-1.0, -1.0), Vec2::new(1.0, 1.0)),
            |fixture| {
                hits.push(fixture);
                true
            },
        );
        assert_eq!(hits.len(), 1);

        let mut far_hits = Vec::new();
        world.query_aabb(
            &Aabb::new(Vec2::new(0.0, 50.0), Vec2::new(1.0, 51.0)),
            |fixture| {
                far_hits.push(fixture);
                true
            },
        );
        assert!(far_hits.is_empty());
    }

    #[test]
    fn test_world_ray_cast_hits_circle() {
        let mut world = World::new(Vec2::ZERO);
        let body = world
            .create_body(&BodyDef::static_at(Vec2::new(5.0, 0.0)))
            .unwrap();
        world
            .create_fixture(
                body,
                &FixtureDef::new(Shape::Circle(CircleShape::new(Vec2::ZERO, 1.0))),
            )
            .unwrap();

        let mut best = None;
        world.ray_cast(Vec2::ZERO, Vec2::new(10.0, 0.0), |fixture, point, normal, fraction| {
            best = Some((fixture, point, normal, fraction));
            fraction // closest-hit search
        });

        let (_, point, normal, fraction) = best.expect("ray should hit");
        assert!((point.x - 4.0).abs() < 1e-3);
        assert!(normal.x < -0.99);
        assert!((fraction - 0.4).abs() < 1e-3);
    }

    #[test]
    fn test_shift_origin_preserves_relative_state() {
        let (mut world, _ground) = ground_world();
        let body = world
            .create_body(&BodyDef::dynamic_at(Vec2::new(3.0, 2.0)))
            .unwrap();
        world
            .create_fixture(
                body,
                &FixtureDef::new(Shape::Circle(CircleShape::new(Vec2::ZERO, 0.5))),
            )
            .unwrap();

        world.shift_origin(Vec2::new(3.0, 0.0));
        assert!((world.body(body).unwrap().position().x - 0.0).abs() < 1e-5);

        // Still simulates after the shift
        world.step(1.0 / 60.0, 8, 3);
    }

    #[test]
    fn test_sleeping_stack_wakes_on_impact() {
        let (mut world, _ground) = ground_world();
        let resting = world
            .create_body(&BodyDef::dynamic_at(Vec2::new(0.0, 0.5)))
            .unwrap();
        world
            .create_fixture(
                resting,
                &FixtureDef::new(Shape::Polygon(PolygonShape::new_box(0.5, 0.5))),
            )
            .unwrap();

        // Let it settle and sleep
        for _ in 0..120 {
            world.step(1.0 / 60.0, 8, 3);
        }
        assert!(!world.body(resting).unwrap().is_awake());

        // Drop something on it
        let dropper = world
            .create_body(&BodyDef::dynamic_at(Vec2::new(0.0, 3.0)))
            .unwrap();
        world
            .create_fixture(
                dropper,
                &FixtureDef::new(Shape::Circle(CircleShape::new(Vec2::ZERO, 0.4))),
            )
            .unwrap();

        for _ in 0..60 {
            world.step(1.0 / 60.0, 8, 3);
        }
        // The impact must have woken the sleeper at some point: its sleep
        // timer restarted, so it is either awake or has just re-slept with a
        // moved dropper above it
        assert!(world.body(dropper).unwrap().position().y < 3.0);
    }

    #[test]
    fn test_disable_enable_body() {
        let (mut world, _ground) = ground_world();
        let body = world
            .create_body(&BodyDef::dynamic_at(Vec2::new(0.0, 2.0)))
            .unwrap();
        world
            .create_fixture(
                body,
                &FixtureDef::new(Shape::Circle(CircleShape::new(Vec2::ZERO, 0.5))),
            )
            .unwrap();

        world.set_enabled(body, false).unwrap();
        for _ in 0..60 {
            world.step(1.0 / 60.0, 8, 3);
        }
        // Disabled bodies do not simulate
        assert_eq!(world.body(body).unwrap().position().y, 2.0);
        assert_eq!(world.contact_count(), 0);

        world.set_enabled(body, true).unwrap();
        for _ in 0..60 {
            world.step(1.0 / 60.0, 8, 3);
        }
        assert!(world.body(body).unwrap().position().y < 2.0);
    }

    #[test]
    fn test_debug_draw_emits_shapes() {
        let (world, _ground) = ground_world();
        let mut data = DebugDrawData::new();
        world.debug_draw(&mut data, DebugDrawFlags::default());
        assert!(!data.segments.is_empty());
    }
}
