//! Cloudlet binding score calculator.

use crate::core::scoring::VmCloudletScoreCalculator;
use crate::core::solution::{can_run, HardSoftScore, VmCloudletSolution};

/// Hard score is minus the number of unbound cloudlets and cloudlets bound to a VM with fewer cores than they
/// require, of another owner, or unable to run them at all.
///
/// Soft score is minus the makespan, where the busy time of a VM is the sum of
/// `length / (vm mips * cpu utilization)` over its cloudlets.
pub struct VmCloudletSimpleScoreCalculator;

impl VmCloudletScoreCalculator for VmCloudletSimpleScoreCalculator {
    fn calculate_score(&self, solution: &VmCloudletSolution) -> HardSoftScore {
        let mut violations = 0;
        let mut busy_time = vec![0.; solution.vms.len()];
        for (cloudlet, vm_idx) in solution.cloudlets.iter().zip(&solution.assignment) {
            let Some(vm_idx) = *vm_idx else {
                violations += 1;
                continue;
            };
            let vm = &solution.vms[vm_idx];
            if !can_run(vm, cloudlet) {
                violations += 1;
                continue;
            }
            busy_time[vm_idx] += cloudlet.length as f64 / cloudlet.speed_on(vm);
        }
        let makespan = busy_time.into_iter().fold(0., f64::max);
        HardSoftScore::new(-violations, -makespan.round() as i64)
    }
}
