//! Physics Error Types
//!
//! Unified error type for the engine. Functions that can fail (body/joint
//! lookup, world mutation at the wrong time, configuration validation)
//! return `Result<T, PhysicsError>` instead of raw booleans or panicking.
//!
//! Numerical trouble inside the step pipeline (solver divergence, root-finder
//! iteration caps) is never reported here; the solver clamps and proceeds.
//!
//! Author: Moroya Sakamoto

use core::fmt;

/// Unified error type for physics operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PhysicsError {
    /// A body handle does not refer to a live body.
    InvalidBody {
        /// The stale or out-of-range handle index
        index: usize,
    },
    /// A joint handle does not refer to a live joint.
    InvalidJoint {
        /// The stale or out-of-range handle index
        index: usize,
    },
    /// A fixture handle does not refer to a live fixture.
    InvalidFixture {
        /// The stale or out-of-range handle index
        index: usize,
    },
    /// The world is mid-step; topology mutation must wait until the step ends.
    WorldLocked,
    /// A joint definition references a body that does not exist or pairs a
    /// body with itself.
    InvalidJointDef {
        /// Human-readable description of the problem
        reason: &'static str,
    },
    /// Invalid configuration parameter.
    InvalidConfiguration {
        /// Description of the invalid configuration
        reason: &'static str,
    },
}

impl fmt::Display for PhysicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBody { index } => write!(f, "invalid body handle (index={index})"),
            Self::InvalidJoint { index } => write!(f, "invalid joint handle (index={index})"),
            Self::InvalidFixture { index } => write!(f, "invalid fixture handle (index={index})"),
            Self::WorldLocked => write!(f, "world is locked (mutation during step)"),
            Self::InvalidJointDef { reason } => write!(f, "invalid joint definition: {reason}"),
            Self::InvalidConfiguration { reason } => {
                write!(f, "invalid configuration: {reason}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PhysicsError {}

// ============================================================================
// Tests
// ============================================================================

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = PhysicsError::InvalidBody { index: 5 };
        let s = format!("{}", e);
        assert!(s.contains("5"), "Should contain index");
    }

    #[test]
    fn test_error_debug() {
        let e = PhysicsError::WorldLocked;
        let s = format!("{:?}", e);
        assert!(s.contains("WorldLocked"));
    }

    #[test]
    fn test_error_variants() {
        let e1 = PhysicsError::InvalidBody { index: 0 };
        let e2 = PhysicsError::WorldLocked;
        let e3 = PhysicsError::InvalidJointDef {
            reason: "body A == body B",
        };
        assert_ne!(e1, e2);
        assert_ne!(e2, e3);
    }

    #[test]
    fn test_invalid_configuration() {
        let e = PhysicsError::InvalidConfiguration {
            reason: "dt must be positive",
        };
        let s = format!("{}", e);
        assert!(s.contains("dt"));
    }
}
