//! Power-minimizing score calculator.

use crate::core::scoring::{ScoreCalculator, UsageSnapshot};
use crate::core::solution::{HardSoftScore, HostVmSolution};

/// Hard score is minus the number of hosts with any exceeded resource, soft score is minus the total power of
/// all hosts at their CPU utilization.
pub struct MinPowerScoreCalculator;

impl ScoreCalculator for MinPowerScoreCalculator {
    fn calculate_score(&self, solution: &HostVmSolution) -> HardSoftScore {
        let usage = UsageSnapshot::of(solution);
        let power: f64 = usage
            .iter(solution)
            .map(|(host, usage)| host.power(usage.cpu_utilization(host)))
            .sum();
        HardSoftScore::new(-usage.exceeded_hosts(solution), -power.round() as i64)
    }
}
