//! Step Profiling
//!
//! Per-step counters for the pipeline stages plus scratch telemetry. Counts
//! are deterministic; wall-clock timing is up to the embedding application.
//!
//! # Profiled Stages
//!
//! - Broad phase (pairs emitted)
//! - Narrow phase (contacts updated, touching manifolds)
//! - Island solve (islands, velocity/position iterations requested)
//! - Continuous collision (TOI queries, sub-steps taken)

/// Counters collected during one `World::step`
#[derive(Clone, Copy, Debug, Default)]
pub struct StepProfile {
    /// Broad-phase pairs handed to the contact manager
    pub broadphase_pairs: u32,
    /// Contacts updated by the narrow phase
    pub narrowphase_tests: u32,
    /// Contacts with a touching manifold after the collide pass
    pub touching_contacts: u32,
    /// Islands assembled and solved
    pub islands: u32,
    /// Bodies that took part in an island solve
    pub solved_bodies: u32,
    /// Joints solved
    pub solved_joints: u32,
    /// Time-of-impact queries issued by the continuous pass
    pub toi_queries: u32,
    /// TOI mini-island sub-steps executed
    pub toi_substeps: u32,
    /// Proxies whose tree nodes moved during synchronization
    pub proxies_moved: u32,
    /// Peak scratch-stack bytes since world creation
    pub scratch_peak_bytes: usize,
}

impl StepProfile {
    /// Zero all per-step counters, preserving nothing
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Running aggregates over many steps
#[derive(Clone, Copy, Debug, Default)]
pub struct ProfileHistory {
    /// Steps recorded
    pub steps: u64,
    /// Sum of broad-phase pairs
    pub total_pairs: u64,
    /// Sum of TOI queries
    pub total_toi_queries: u64,
    /// Peak islands in any one step
    pub peak_islands: u32,
    /// Peak touching contacts in any one step
    pub peak_touching: u32,
}

impl ProfileHistory {
    /// Fold one step's profile into the history
    pub fn record(&mut self, profile: &StepProfile) {
        self.steps += 1;
        self.total_pairs += u64::from(profile.broadphase_pairs);
        self.total_toi_queries += u64::from(profile.toi_queries);
        if profile.islands > self.peak_islands {
            self.peak_islands = profile.islands;
        }
        if profile.touching_contacts > self.peak_touching {
            self.peak_touching = profile.touching_contacts;
        }
    }

    /// Mean broad-phase pairs per step
    pub fn average_pairs(&self) -> u64 {
        if self.steps == 0 {
            0
        } else {
            self.total_pairs / self.steps
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_reset() {
        let mut profile = StepProfile {
            broadphase_pairs: 10,
            islands: 3,
            ..Default::default()
        };
        profile.reset();
        assert_eq!(profile.broadphase_pairs, 0);
        assert_eq!(profile.islands, 0);
    }

    #[test]
    fn test_history_aggregation() {
        let mut history = ProfileHistory::default();
        history.record(&StepProfile {
            broadphase_pairs: 4,
            islands: 2,
            ..Default::default()
        });
        history.record(&StepProfile {
            broadphase_pairs: 8,
            islands: 5,
            touching_contacts: 3,
            ..Default::default()
        });

        assert_eq!(history.steps, 2);
        assert_eq!(history.average_pairs(), 6);
        assert_eq!(history.peak_islands, 5);
        assert_eq!(history.peak_touching, 3);
    }

    #[test]
    fn test_empty_history() {
        let history = ProfileHistory::default();
        assert_eq!(history.average_pairs(), 0);
    }
}
