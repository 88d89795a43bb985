//! Contract of the search procedures used for batch placement and cloudlet binding.

use crate::core::scoring::{ScoreCalculator, VmCloudletScoreCalculator};
use crate::core::solution::{HostVmSolution, VmCloudletSolution};

/// Search procedure over VM to host assignments.
///
/// Receives a solution with the current assignment (usually all VMs unassigned) and returns the best candidate
/// it found with its score set. The result is advisory: the placement policy replays it through the host ledger.
pub trait HostVmSolver {
    fn solve(&mut self, problem: HostVmSolution, calculator: &dyn ScoreCalculator) -> HostVmSolution;
}

/// Search procedure over cloudlet to VM bindings.
pub trait VmCloudletSolver {
    fn solve(&mut self, problem: VmCloudletSolution, calculator: &dyn VmCloudletScoreCalculator) -> VmCloudletSolution;
}

/// Solver which returns the problem unchanged, i.e. assigns nothing.
pub struct IdentitySolver;

impl HostVmSolver for IdentitySolver {
    fn solve(&mut self, mut problem: HostVmSolution, calculator: &dyn ScoreCalculator) -> HostVmSolution {
        problem.score = Some(calculator.calculate_score(&problem));
        problem
    }
}

impl VmCloudletSolver for IdentitySolver {
    fn solve(&mut self, mut problem: VmCloudletSolution, calculator: &dyn VmCloudletScoreCalculator) -> VmCloudletSolution {
        problem.score = Some(calculator.calculate_score(&problem));
        problem
    }
}
