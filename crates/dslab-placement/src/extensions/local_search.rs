//! Local search.

use rand::prelude::*;
use rand_pcg::Pcg64;

use crate::core::scoring::{ScoreCalculator, VmCloudletScoreCalculator};
use crate::core::solution::{HostVmSolution, VmCloudletSolution};
use crate::core::solver::{HostVmSolver, VmCloudletSolver};
use crate::extensions::construction_heuristic::FirstFitDecreasing;

/// Hill climbing over single-entity reassignments, starting from the [`FirstFitDecreasing`] result.
///
/// Every step moves a random entity to a random value (or leaves it unassigned) and keeps the move only if
/// the score strictly improves.
pub struct HillClimbing {
    steps: u64,
    rng: Pcg64,
}

impl HillClimbing {
    pub fn new(steps: u64, seed: u64) -> Self {
        Self {
            steps,
            rng: Pcg64::seed_from_u64(seed),
        }
    }

    /// Returns a random value index or `None` (unassigned), each with equal probability.
    fn random_value(&mut self, values: usize) -> Option<usize> {
        let value = self.rng.gen_range(0..=values);
        (value < values).then_some(value)
    }
}

impl HostVmSolver for HillClimbing {
    fn solve(&mut self, problem: HostVmSolution, calculator: &dyn ScoreCalculator) -> HostVmSolution {
        let mut solution = HostVmSolver::solve(&mut FirstFitDecreasing::new(), problem, calculator);
        if solution.vms.is_empty() {
            return solution;
        }
        let mut score = calculator.calculate_score(&solution);
        for _ in 0..self.steps {
            let vm_idx = self.rng.gen_range(0..solution.vms.len());
            let value = self.random_value(solution.hosts.len());
            let previous = solution.assignment[vm_idx];
            if value == previous {
                continue;
            }
            solution.assign(vm_idx, value);
            let next = calculator.calculate_score(&solution);
            if next > score {
                score = next;
            } else {
                solution.assign(vm_idx, previous);
            }
        }
        solution.score = Some(score);
        solution
    }
}

impl VmCloudletSolver for HillClimbing {
    fn solve(&mut self, problem: VmCloudletSolution, calculator: &dyn VmCloudletScoreCalculator) -> VmCloudletSolution {
        let mut solution = VmCloudletSolver::solve(&mut FirstFitDecreasing::new(), problem, calculator);
        if solution.cloudlets.is_empty() {
            return solution;
        }
        let mut score = calculator.calculate_score(&solution);
        for _ in 0..self.steps {
            let cloudlet_idx = self.rng.gen_range(0..solution.cloudlets.len());
            let value = self.random_value(solution.vms.len());
            let previous = solution.assignment[cloudlet_idx];
            if value == previous {
                continue;
            }
            solution.assign(cloudlet_idx, value);
            let next = calculator.calculate_score(&solution);
            if next > score {
                score = next;
            } else {
                solution.assign(cloudlet_idx, previous);
            }
        }
        solution.score = Some(score);
        solution
    }
}
