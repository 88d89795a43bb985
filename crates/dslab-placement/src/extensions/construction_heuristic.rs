//! Construction heuristics.

use crate::core::scoring::{ScoreCalculator, VmCloudletScoreCalculator};
use crate::core::solution::{
    cloudlet_difficulty_cmp, vm_difficulty_cmp, HardSoftScore, HostVmSolution, VmCloudletSolution,
};
use crate::core::solver::{HostVmSolver, VmCloudletSolver};

/// Assigns entities one by one in the order of decreasing difficulty. Each entity gets the value with the best
/// score given the previous choices, or stays unassigned if every value makes the hard score worse than leaving
/// it unassigned. Already assigned entities are kept.
pub struct FirstFitDecreasing;

impl FirstFitDecreasing {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for FirstFitDecreasing {
    fn default() -> Self {
        Self::new()
    }
}

/// Picks the best value for one entity. `evaluate(None)` scores the entity left unassigned.
fn best_value(values: usize, mut evaluate: impl FnMut(Option<usize>) -> HardSoftScore) -> Option<usize> {
    let unassigned = evaluate(None);
    let mut best: Option<(usize, HardSoftScore)> = None;
    for value in 0..values {
        let score = evaluate(Some(value));
        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((value, score));
        }
    }
    match best {
        Some((value, score)) if score.hard >= unassigned.hard => Some(value),
        _ => None,
    }
}

impl HostVmSolver for FirstFitDecreasing {
    fn solve(&mut self, mut problem: HostVmSolution, calculator: &dyn ScoreCalculator) -> HostVmSolution {
        let mut order: Vec<usize> = (0..problem.vms.len())
            .filter(|idx| problem.assignment[*idx].is_none())
            .collect();
        order.sort_by(|a, b| vm_difficulty_cmp(&problem.vms[*b], &problem.vms[*a]));
        for vm_idx in order {
            let hosts = problem.hosts.len();
            let choice = best_value(hosts, |host_idx| {
                problem.assign(vm_idx, host_idx);
                calculator.calculate_score(&problem)
            });
            problem.assign(vm_idx, choice);
        }
        problem.score = Some(calculator.calculate_score(&problem));
        problem
    }
}

impl VmCloudletSolver for FirstFitDecreasing {
    fn solve(&mut self, mut problem: VmCloudletSolution, calculator: &dyn VmCloudletScoreCalculator) -> VmCloudletSolution {
        let mut order: Vec<usize> = (0..problem.cloudlets.len())
            .filter(|idx| problem.assignment[*idx].is_none())
            .collect();
        order.sort_by(|a, b| cloudlet_difficulty_cmp(&problem.cloudlets[*b], &problem.cloudlets[*a]));
        for cloudlet_idx in order {
            let vms = problem.vms.len();
            let choice = best_value(vms, |vm_idx| {
                problem.assign(cloudlet_idx, vm_idx);
                calculator.calculate_score(&problem)
            });
            problem.assign(cloudlet_idx, choice);
        }
        problem.score = Some(calculator.calculate_score(&problem));
        problem
    }
}
