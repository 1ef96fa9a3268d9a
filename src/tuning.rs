//! Solver and Collision Tuning Constants
//!
//! Length-unit constants assume meters-kilograms-seconds with bodies in the
//! 0.1–10 m range. Config structs throughout the crate default to these
//! values; they can be overridden per world where a config field exists.

use crate::math::PI;

/// Maximum contact points in a manifold
pub const MAX_MANIFOLD_POINTS: usize = 2;

/// Maximum vertices in a convex polygon shape
pub const MAX_POLYGON_VERTICES: usize = 8;

/// Collision/constraint tolerance. Chosen to be significant but small enough
/// that penetration is not visible.
pub const LINEAR_SLOP: f32 = 0.005;

/// Angular analogue of [`LINEAR_SLOP`] (2 degrees)
pub const ANGULAR_SLOP: f32 = 2.0 / 180.0 * PI;

/// Radius of the rounded corners of polygon shapes. Should not be modified:
/// the position solver relies on polygons staying this far from their hulls.
pub const POLYGON_RADIUS: f32 = 2.0 * LINEAR_SLOP;

/// Fattening applied to broad-phase proxy AABBs so that small motion does
/// not trigger tree updates
pub const AABB_EXTENSION: f32 = 0.1;

/// Multiplier on per-step displacement when predicting a moving proxy's
/// future AABB
pub const AABB_MULTIPLIER: f32 = 4.0;

/// Maximum sub-steps the continuous-collision pass may take per frame
pub const MAX_SUB_STEPS: usize = 8;

/// Maximum contacts handled in one TOI mini-island
pub const MAX_TOI_CONTACTS: usize = 32;

/// Relative normal velocity below which restitution is not applied
pub const VELOCITY_THRESHOLD: f32 = 1.0;

/// Maximum penetration recovered per position iteration
pub const MAX_LINEAR_CORRECTION: f32 = 0.2;

/// Maximum angular error recovered per position iteration (8 degrees)
pub const MAX_ANGULAR_CORRECTION: f32 = 8.0 / 180.0 * PI;

/// Maximum translation of a body per step; velocities are clamped to this
pub const MAX_TRANSLATION: f32 = 2.0;

/// Squared form of [`MAX_TRANSLATION`]
pub const MAX_TRANSLATION_SQUARED: f32 = MAX_TRANSLATION * MAX_TRANSLATION;

/// Maximum rotation of a body per step; angular velocities are clamped to this
pub const MAX_ROTATION: f32 = 0.5 * PI;

/// Squared form of [`MAX_ROTATION`]
pub const MAX_ROTATION_SQUARED: f32 = MAX_ROTATION * MAX_ROTATION;

/// Fraction of penetration error resolved per velocity-solver step
pub const BAUMGARTE: f32 = 0.2;

/// Stiffer correction factor used by the TOI position solver
pub const TOI_BAUMGARTE: f32 = 0.75;

/// Seconds a body must stay under the sleep tolerances before sleeping
pub const TIME_TO_SLEEP: f32 = 0.5;

/// Linear velocity tolerance for sleeping
pub const LINEAR_SLEEP_TOLERANCE: f32 = 0.01;

/// Angular velocity tolerance for sleeping (2 degrees per second)
pub const ANGULAR_SLEEP_TOLERANCE: f32 = 2.0 / 180.0 * PI;

/// GJK iteration cap
pub const MAX_GJK_ITERATIONS: usize = 20;

/// TOI outer-loop iteration cap
pub const MAX_TOI_ITERATIONS: usize = 20;

/// TOI root-finder iteration cap
pub const MAX_TOI_ROOT_ITERATIONS: usize = 50;
