//! Consolidation-oriented score calculator.

use crate::core::scoring::{ScoreCalculator, UsageSnapshot};
use crate::core::solution::{HardSoftScore, HostVmSolution};

/// Hard score is minus the number of hosts with any exceeded resource, soft score is the number of used hosts.
pub struct BinaryScoreCalculator;

impl ScoreCalculator for BinaryScoreCalculator {
    fn calculate_score(&self, solution: &HostVmSolution) -> HardSoftScore {
        let usage = UsageSnapshot::of(solution);
        HardSoftScore::new(-usage.exceeded_hosts(solution), usage.used_hosts())
    }
}
