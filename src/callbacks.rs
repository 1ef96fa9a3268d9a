//! World Callbacks
//!
//! The capability set a world exposes to user code: contact lifecycle
//! notifications, contact filtering, and destruction notifications.
//!
//! Every method has a no-op or pass-through default, so listeners implement
//! only what they need and the world never branches on "is a listener set".
//!
//! Callbacks run synchronously inside `step()`. They may inspect the data
//! they are handed and flip the per-contact enable switch, but must not
//! create or destroy bodies, fixtures, or joints; the world is locked while
//! a step runs.

use crate::contact::Contact;
use crate::filter::Filter;
use crate::fixture::{Fixture, FixtureId};
use crate::joint::JointId;
use crate::manifold::Manifold;
use crate::tuning::MAX_MANIFOLD_POINTS;

/// Impulses applied by one contact over the last velocity solve, reported
/// through [`ContactListener::post_solve`]
#[derive(Clone, Copy, Debug, Default)]
pub struct ContactImpulse {
    /// Normal impulse per manifold point
    pub normal_impulses: [f32; MAX_MANIFOLD_POINTS],
    /// Tangent impulse per manifold point
    pub tangent_impulses: [f32; MAX_MANIFOLD_POINTS],
    /// Number of live entries
    pub count: usize,
}

/// Contact lifecycle notifications.
///
/// `pre_solve` returns whether the contact stays enabled for this step;
/// returning false is how one-way platforms drop a touching contact.
pub trait ContactListener {
    /// Two fixtures began touching
    fn begin_contact(&mut self, _contact: &Contact) {}

    /// Two fixtures stopped touching
    fn end_contact(&mut self, _contact: &Contact) {}

    /// A touching contact is about to be solved. `old_manifold` is the
    /// manifold from the previous step. Return false to disable the contact
    /// for this step.
    fn pre_solve(&mut self, _contact: &Contact, _old_manifold: &Manifold) -> bool {
        true
    }

    /// A contact was solved; reports the accumulated impulses
    fn post_solve(&mut self, _contact: &Contact, _impulse: &ContactImpulse) {}
}

/// Pair acceptance test run when the broad phase proposes a new pair
pub trait ContactFilter {
    /// Whether the two fixtures may generate a contact. The default applies
    /// the category/mask/group rule of [`Filter`].
    fn should_collide(&mut self, fixture_a: &Fixture, fixture_b: &Fixture) -> bool {
        Filter::should_collide(&fixture_a.filter, &fixture_b.filter)
    }
}

/// Notifications for objects destroyed implicitly (fixtures and joints torn
/// down because their body was destroyed)
pub trait DestructionListener {
    /// A joint is about to be destroyed because one of its bodies is going away
    fn say_goodbye_joint(&mut self, _joint: JointId) {}

    /// A fixture is about to be destroyed because its body is going away
    fn say_goodbye_fixture(&mut self, _fixture: FixtureId) {}
}

/// No-op listener installed by default
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultListener;

impl ContactListener for DefaultListener {}
impl ContactFilter for DefaultListener {}
impl DestructionListener for DefaultListener {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_uses_filter_rule() {
        use crate::circle::CircleShape;
        use crate::collider::Shape;
        use crate::fixture::FixtureDef;
        use crate::math::Vec2;

        let mut listener = DefaultListener;
        let def = FixtureDef::new(Shape::Circle(CircleShape::new(Vec2::ZERO, 1.0)));

        let mut fa = Fixture::from_def(0, &def);
        let mut fb = Fixture::from_def(1, &def);
        assert!(listener.should_collide(&fa, &fb));

        fa.filter.group_index = -2;
        fb.filter.group_index = -2;
        assert!(!listener.should_collide(&fa, &fb));
    }
}
