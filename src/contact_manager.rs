//! Contact Manager
//!
//! Owns the broad phase, the fixture proxies, and the global contact list.
//! Broad-phase pairs become contacts here (subject to filters and joint
//! connectivity); the collide pass keeps every contact's manifold current
//! and destroys contacts whose proxies no longer overlap.

use crate::body::{Body, ContactEdge, ContactId};
use crate::broadphase::BroadPhase;
use crate::callbacks::{ContactFilter, ContactListener};
use crate::contact::{Contact, ContactKey};
use crate::fixture::{Fixture, FixtureId, FixtureProxy};
use crate::math::Transform;
use crate::pool::Pool;

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Broad-phase pairing and contact lifecycle
pub struct ContactManager {
    /// The broad phase
    pub broad_phase: BroadPhase,
    /// Per-child fixture proxy records; tree user data indexes this pool
    pub(crate) proxies: Pool<FixtureProxy>,
    /// All contacts, live and potential
    pub contacts: Pool<Contact>,
    /// Pair scratch reused across steps
    pair_scratch: Vec<(u32, u32)>,
}

impl ContactManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self {
            broad_phase: BroadPhase::new(),
            proxies: Pool::new(),
            contacts: Pool::new(),
            pair_scratch: Vec::new(),
        }
    }

    // ========================================================================
    // Proxy lifecycle
    // ========================================================================

    /// Create one broad-phase proxy per shape child of a fixture
    pub(crate) fn create_proxies(
        &mut self,
        fixture_id: FixtureId,
        fixture: &mut Fixture,
        xf: &Transform,
    ) {
        debug_assert!(fixture.proxy_ids.is_empty());
        for child_index in 0..fixture.shape.child_count() {
            let aabb = fixture.shape.compute_aabb(xf, child_index);
            let record_id = self.proxies.insert(FixtureProxy {
                fixture: fixture_id,
                child_index,
                tree_proxy: 0,
                aabb,
            });
            let tree_proxy = self.broad_phase.create_proxy(aabb, record_id);
            self.proxies[record_id].tree_proxy = tree_proxy;
            fixture.proxy_ids.push(record_id);
        }
    }

    /// Destroy a fixture's proxies
    pub(crate) fn destroy_proxies(&mut self, fixture: &mut Fixture) {
        for &record_id in &fixture.proxy_ids {
            let record = self.proxies.remove(record_id).expect("live proxy record");
            self.broad_phase.destroy_proxy(record.tree_proxy);
        }
        fixture.proxy_ids.clear();
    }

    /// Update a fixture's proxies for a body that moved from `xf1` to `xf2`
    pub(crate) fn synchronize_fixture(
        &mut self,
        fixture: &Fixture,
        xf1: &Transform,
        xf2: &Transform,
    ) {
        for &record_id in &fixture.proxy_ids {
            let record = &mut self.proxies[record_id];
            // Cover both endpoints of the motion
            let aabb1 = fixture.shape.compute_aabb(xf1, record.child_index);
            let aabb2 = fixture.shape.compute_aabb(xf2, record.child_index);
            record.aabb = aabb1.union(&aabb2);
            let displacement = aabb2.center() - aabb1.center();
            self.broad_phase
                .move_proxy(record.tree_proxy, record.aabb, displacement);
        }
    }

    /// Force re-pairing of a fixture (filter changed, body re-enabled)
    pub(crate) fn touch_proxies(&mut self, fixture: &Fixture) {
        for &record_id in &fixture.proxy_ids {
            let tree_proxy = self.proxies[record_id].tree_proxy;
            self.broad_phase.touch_proxy(tree_proxy);
        }
    }

    // ========================================================================
    // Pair management
    // ========================================================================

    /// Pull new pairs out of the broad phase and create contacts for them.
    /// Returns the number of candidate pairs the broad phase produced.
    pub(crate) fn find_new_contacts(
        &mut self,
        bodies: &mut Pool<Body>,
        fixtures: &Pool<Fixture>,
        filter: &mut dyn ContactFilter,
    ) -> usize {
        let mut pairs = core::mem::take(&mut self.pair_scratch);
        pairs.clear();
        self.broad_phase.update_pairs(|a, b| pairs.push((a, b)));

        for &(record_a, record_b) in &pairs {
            self.add_pair(record_a, record_b, bodies, fixtures, filter);
        }

        let count = pairs.len();
        self.pair_scratch = pairs;
        count
    }

    fn add_pair(
        &mut self,
        record_a: u32,
        record_b: u32,
        bodies: &mut Pool<Body>,
        fixtures: &Pool<Fixture>,
        filter: &mut dyn ContactFilter,
    ) {
        let proxy_a = self.proxies[record_a];
        let proxy_b = self.proxies[record_b];

        let fixture_a = proxy_a.fixture;
        let fixture_b = proxy_b.fixture;

        let fa = &fixtures[fixture_a];
        let fb = &fixtures[fixture_b];

        let body_a = fa.body();
        let body_b = fb.body();

        // A body never collides with itself
        if body_a == body_b {
            return;
        }

        // Already tracked? The pair shows up again whenever either proxy moves.
        let key = ContactKey {
            fixture_a,
            child_a: proxy_a.child_index,
            fixture_b,
            child_b: proxy_b.child_index,
        };
        for edge in bodies[body_b].contact_edges() {
            if edge.other == body_a && self.contacts[edge.contact].matches(&key) {
                return;
            }
        }

        // Joint connectivity and static-static rejection
        if !bodies[body_b].should_collide(body_a, &bodies[body_a]) {
            return;
        }

        // User filter
        if !filter.should_collide(fa, fb) {
            return;
        }

        let Some(contact) = Contact::new(
            fixture_a,
            proxy_a.child_index,
            fixture_b,
            proxy_b.child_index,
            fixtures,
        ) else {
            return;
        };

        // Contact::new may have swapped the fixtures; use its body order
        let body_a = contact.body_a();
        let body_b = contact.body_b();
        let contact_id = self.contacts.insert(contact);

        bodies[body_a].contact_edges.push(ContactEdge {
            contact: contact_id,
            other: body_b,
        });
        bodies[body_b].contact_edges.push(ContactEdge {
            contact: contact_id,
            other: body_a,
        });
    }

    /// Destroy a contact, firing `end_contact` when it was touching
    pub(crate) fn destroy_contact(
        &mut self,
        contact_id: ContactId,
        bodies: &mut Pool<Body>,
        listener: &mut dyn ContactListener,
    ) {
        let contact = self.contacts.remove(contact_id).expect("live contact");

        if contact.is_touching() {
            listener.end_contact(&contact);
            // Separation wakes both participants
            bodies[contact.body_a()].set_awake(true);
            bodies[contact.body_b()].set_awake(true);
        }

        bodies[contact.body_a()]
            .contact_edges
            .retain(|edge| edge.contact != contact_id);
        bodies[contact.body_b()]
            .contact_edges
            .retain(|edge| edge.contact != contact_id);
    }

    /// Tree proxy id backing one (fixture, child) pair
    pub(crate) fn tree_proxy_of(&self, fixture: &Fixture, child_index: usize) -> u32 {
        let record_id = fixture.proxy_ids[child_index];
        self.proxies[record_id].tree_proxy
    }

    // ========================================================================
    // Narrow phase driver
    // ========================================================================

    /// Update every contact's manifold; destroy contacts whose fat AABBs
    /// separated or whose filter now rejects the pair.
    pub(crate) fn collide(
        &mut self,
        bodies: &mut Pool<Body>,
        fixtures: &Pool<Fixture>,
        filter: &mut dyn ContactFilter,
        listener: &mut dyn ContactListener,
    ) {
        let contact_ids = self.contacts.indices();

        for contact_id in contact_ids {
            let (body_a, body_b, fixture_a, fixture_b, child_a, child_b, filter_pending) = {
                let c = &self.contacts[contact_id];
                (
                    c.body_a(),
                    c.body_b(),
                    c.fixture_a(),
                    c.fixture_b(),
                    c.child_a(),
                    c.child_b(),
                    c.filter_pending,
                )
            };

            if filter_pending {
                self.contacts[contact_id].filter_pending = false;

                let keep = bodies[body_b].should_collide(body_a, &bodies[body_a])
                    && filter.should_collide(&fixtures[fixture_a], &fixtures[fixture_b]);
                if !keep {
                    self.destroy_contact(contact_id, bodies, listener);
                    continue;
                }
            }

            // Both bodies resting: leave the contact as-is
            let active_a = bodies[body_a].is_awake()
                && bodies[body_a].body_type() != crate::body::BodyType::Static;
            let active_b = bodies[body_b].is_awake()
                && bodies[body_b].body_type() != crate::body::BodyType::Static;
            if !active_a && !active_b {
                continue;
            }

            // Fat AABBs separated: the pair is gone until the broad phase
            // reports it again
            let proxy_a = self.tree_proxy_of(&fixtures[fixture_a], child_a);
            let proxy_b = self.tree_proxy_of(&fixtures[fixture_b], child_b);
            if !self.broad_phase.test_overlap(proxy_a, proxy_b) {
                self.destroy_contact(contact_id, bodies, listener);
                continue;
            }

            self.contacts[contact_id].update(fixtures, bodies, listener);
        }
    }

    /// Flag every contact of a fixture for re-filtering
    pub(crate) fn refilter_fixture(&mut self, fixture_id: FixtureId, bodies: &Pool<Body>, fixtures: &Pool<Fixture>) {
        let body_id = fixtures[fixture_id].body();
        for edge in bodies[body_id].contact_edges() {
            let contact = &mut self.contacts[edge.contact];
            if contact.fixture_a() == fixture_id || contact.fixture_b() == fixture_id {
                contact.flag_for_filtering();
            }
        }
    }
}

impl Default for ContactManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyDef;
    use crate::callbacks::DefaultListener;
    use crate::circle::CircleShape;
    use crate::collider::Shape;
    use crate::fixture::FixtureDef;
    use crate::math::Vec2;

    struct TestWorldBits {
        manager: ContactManager,
        bodies: Pool<Body>,
        fixtures: Pool<Fixture>,
    }

    /// Two unit-circle dynamic bodies at the given x positions
    fn setup(x_a: f32, x_b: f32) -> TestWorldBits {
        let mut bits = TestWorldBits {
            manager: ContactManager::new(),
            bodies: Pool::new(),
            fixtures: Pool::new(),
        };

        for x in [x_a, x_b] {
            let body_id = bits
                .bodies
                .insert(Body::from_def(&BodyDef::dynamic_at(Vec2::new(x, 0.0))));
            let def = FixtureDef::new(Shape::Circle(CircleShape::new(Vec2::ZERO, 1.0)));
            let fixture_id = bits.fixtures.insert(Fixture::from_def(body_id, &def));
            bits.bodies[body_id].fixtures.push(fixture_id);
            let xf = bits.bodies[body_id].transform();
            let fixture = &mut bits.fixtures[fixture_id];
            bits.manager.create_proxies(fixture_id, fixture, &xf);
        }

        bits
    }

    #[test]
    fn test_pair_creates_contact() {
        let mut bits = setup(0.0, 1.5);
        let mut listener = DefaultListener;
        bits.manager
            .find_new_contacts(&mut bits.bodies, &bits.fixtures, &mut listener);
        assert_eq!(bits.manager.contacts.len(), 1);
        assert_eq!(bits.bodies[0].contact_edges().len(), 1);
        assert_eq!(bits.bodies[1].contact_edges().len(), 1);
    }

    #[test]
    fn test_duplicate_pair_ignored() {
        let mut bits = setup(0.0, 1.5);
        let mut listener = DefaultListener;
        bits.manager
            .find_new_contacts(&mut bits.bodies, &bits.fixtures, &mut listener);

        // Touch the proxies: the same pair comes out of the broad phase again
        let fixture = bits.fixtures[0].clone();
        bits.manager.touch_proxies(&fixture);
        bits.manager
            .find_new_contacts(&mut bits.bodies, &bits.fixtures, &mut listener);
        assert_eq!(bits.manager.contacts.len(), 1);
    }

    #[test]
    fn test_collide_updates_manifold() {
        let mut bits = setup(0.0, 1.5);
        let mut listener = DefaultListener;
        let mut filter = DefaultListener;
        bits.manager
            .find_new_contacts(&mut bits.bodies, &bits.fixtures, &mut listener);
        bits.manager
            .collide(&mut bits.bodies, &bits.fixtures, &mut filter, &mut listener);

        let (_, contact) = bits.manager.contacts.iter().next().unwrap();
        assert!(contact.is_touching());
        assert_eq!(contact.manifold.point_count, 1);
    }

    #[test]
    fn test_far_pair_not_created() {
        let mut bits = setup(0.0, 50.0);
        let mut listener = DefaultListener;
        bits.manager
            .find_new_contacts(&mut bits.bodies, &bits.fixtures, &mut listener);
        assert_eq!(bits.manager.contacts.len(), 0);
    }

    #[test]
    fn test_filtered_pair_rejected() {
        let mut bits = setup(0.0, 1.5);
        // Same negative group: never collide
        bits.fixtures[0].filter.group_index = -7;
        bits.fixtures[1].filter.group_index = -7;
        let mut listener = DefaultListener;
        bits.manager
            .find_new_contacts(&mut bits.bodies, &bits.fixtures, &mut listener);
        assert_eq!(bits.manager.contacts.len(), 0);
    }

    #[test]
    fn test_refilter_destroys_contact() {
        let mut bits = setup(0.0, 1.5);
        let mut listener = DefaultListener;
        let mut filter = DefaultListener;
        bits.manager
            .find_new_contacts(&mut bits.bodies, &bits.fixtures, &mut listener);
        assert_eq!(bits.manager.contacts.len(), 1);

        // Change the filter, flag, and run a collide pass
        bits.fixtures[0].filter.group_index = -7;
        bits.fixtures[1].filter.group_index = -7;
        bits.manager.refilter_fixture(0, &bits.bodies, &bits.fixtures);
        bits.manager
            .collide(&mut bits.bodies, &bits.fixtures, &mut filter, &mut listener);
        assert_eq!(bits.manager.contacts.len(), 0);
        assert!(bits.bodies[0].contact_edges().is_empty());
    }
}
