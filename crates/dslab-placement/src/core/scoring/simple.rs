//! Cost-minimizing score calculator.

use crate::core::config::filters::CostConfig;
use crate::core::scoring::{ScoreCalculator, UsageSnapshot};
use crate::core::solution::{HardSoftScore, HostVmSolution};

/// Hard score is the sum of capacity shortfalls of exceeded resources, soft score is minus the monetary cost of
/// used hosts.
pub struct SimpleScoreCalculator {
    costs: CostConfig,
}

impl SimpleScoreCalculator {
    pub fn new(costs: CostConfig) -> Self {
        Self { costs }
    }
}

impl ScoreCalculator for SimpleScoreCalculator {
    fn calculate_score(&self, solution: &HostVmSolution) -> HardSoftScore {
        let usage = UsageSnapshot::of(solution);
        let shortfall: f64 = usage.iter(solution).map(|(host, usage)| usage.shortfall(host)).sum();
        let cost = usage.cost(&self.costs);
        HardSoftScore::new(shortfall.round() as i64, -cost.round() as i64)
    }
}
