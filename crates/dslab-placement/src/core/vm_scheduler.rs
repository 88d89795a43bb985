//! VM schedulers turning a VM's requested MIPS share into allocations on host PEs.

use std::collections::BTreeSet;

use dyn_clone::{clone_trait_object, DynClone};

use crate::core::config::options::parse_config_value;
use crate::core::error::ConfigError;
use crate::core::pe::{Pe, PeStatus};

const MIPS_EPSILON: f64 = 1e-9;

/// Distribution of a MIPS share over PEs: (PE index, MIPS) pairs.
type PePlan = Vec<(usize, f64)>;

/// Policy for sharing host PEs between VMs.
///
/// `mips_share` holds one requested MIPS value per VM core. Both [`can_allocate`](VmScheduler::can_allocate) and
/// [`allocate_pes_for_vm`](VmScheduler::allocate_pes_for_vm) must be derived from the same plan so that a
/// feasibility check never disagrees with an actual allocation.
pub trait VmScheduler: DynClone {
    fn pes(&self) -> &[Pe];

    fn pes_mut(&mut self) -> &mut [Pe];

    /// Checks whether the share can be allocated without changing any state.
    fn can_allocate(&self, mips_share: &[f64]) -> bool;

    /// Allocates the share to the VM. Returns false if it does not fit.
    fn allocate_pes_for_vm(&mut self, vm_uid: &str, mips_share: &[f64]) -> bool;

    /// Returns MIPS which can still be allocated in total.
    fn available_mips(&self) -> f64;

    /// UIDs of VMs migrating into the host. Kept by UID so the reservation survives rebuilds of other tables.
    fn vms_migrating_in(&self) -> &BTreeSet<String>;

    fn vms_migrating_in_mut(&mut self) -> &mut BTreeSet<String>;

    /// Releases PEs allocated to the VM.
    fn deallocate_pes_for_vm(&mut self, vm_uid: &str) {
        for pe in self.pes_mut() {
            pe.deallocate(vm_uid);
            if pe.status() == PeStatus::Busy && pe.allocated_mips() == 0. {
                pe.set_status(PeStatus::Free);
            }
        }
    }

    /// Releases all PE allocations.
    fn deallocate_pes_for_all_vms(&mut self) {
        for pe in self.pes_mut() {
            pe.deallocate_all();
            if pe.status() == PeStatus::Busy {
                pe.set_status(PeStatus::Free);
            }
        }
    }

    /// Returns MIPS allocated to the VM on each PE it uses.
    fn allocated_mips_for_vm(&self, vm_uid: &str) -> Vec<f64> {
        self.pes()
            .iter()
            .map(|pe| pe.allocated_mips_for_vm(vm_uid))
            .filter(|mips| *mips > 0.)
            .collect()
    }

    fn total_allocated_mips_for_vm(&self, vm_uid: &str) -> f64 {
        self.allocated_mips_for_vm(vm_uid).iter().sum()
    }

    /// Returns the largest MIPS rating among working PEs, i.e. the largest share a single VM core may request.
    fn pe_capacity(&self) -> f64 {
        self.pes()
            .iter()
            .filter(|pe| !pe.is_failed())
            .map(|pe| pe.mips())
            .fold(0., f64::max)
    }

    /// Returns the largest amount of MIPS available on a single PE.
    fn max_available_mips(&self) -> f64 {
        self.pes().iter().map(|pe| pe.available_mips()).fold(0., f64::max)
    }

    /// Marks all PEs as failed or repaired.
    fn set_failed(&mut self, failed: bool) {
        for pe in self.pes_mut() {
            if failed {
                pe.set_status(PeStatus::Failed);
            } else if pe.allocated_mips() > 0. {
                pe.set_status(PeStatus::Busy);
            } else {
                pe.set_status(PeStatus::Free);
            }
        }
    }
}

clone_trait_object!(VmScheduler);

pub fn vm_scheduler_resolver(config_str: &str, pes: Vec<Pe>) -> Result<Box<dyn VmScheduler>, ConfigError> {
    let (name, _) = parse_config_value(config_str);
    match name.as_str() {
        "TimeShared" | "VmSchedulerTimeShared" => Ok(Box::new(TimeSharedVmScheduler::new(pes))),
        "SpaceShared" | "VmSchedulerSpaceShared" => Ok(Box::new(SpaceSharedVmScheduler::new(pes))),
        _ => Err(ConfigError::UnknownVmScheduler(config_str.to_string())),
    }
}

fn apply_plan(pes: &mut [Pe], vm_uid: &str, plan: PePlan, status: PeStatus) {
    for pe in pes.iter_mut() {
        pe.deallocate(vm_uid);
    }
    for (idx, mips) in plan {
        pes[idx].allocate(vm_uid, mips);
        pes[idx].set_status(status);
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Lets VMs share PEs: each core share may not exceed a PE rating, and the total must fit into the free MIPS.
/// Shares are spread over PEs in order, so one core may span several PEs.
#[derive(Clone)]
pub struct TimeSharedVmScheduler {
    pes: Vec<Pe>,
    vms_migrating_in: BTreeSet<String>,
}

impl TimeSharedVmScheduler {
    pub fn new(pes: Vec<Pe>) -> Self {
        Self {
            pes,
            vms_migrating_in: BTreeSet::new(),
        }
    }

    fn plan(&self, mips_share: &[f64]) -> Option<PePlan> {
        if mips_share.is_empty() {
            return None;
        }
        let pe_capacity = self.pe_capacity();
        if mips_share.iter().any(|mips| *mips > pe_capacity + MIPS_EPSILON) {
            return None;
        }
        let total: f64 = mips_share.iter().sum();
        if total > self.available_mips() + MIPS_EPSILON {
            return None;
        }

        let mut free: Vec<f64> = self.pes.iter().map(|pe| pe.available_mips()).collect();
        let mut plan = PePlan::new();
        for mips in mips_share {
            let mut remaining = *mips;
            for (idx, pe_free) in free.iter_mut().enumerate() {
                if remaining <= MIPS_EPSILON {
                    break;
                }
                if *pe_free <= MIPS_EPSILON {
                    continue;
                }
                let taken = remaining.min(*pe_free);
                *pe_free -= taken;
                remaining -= taken;
                plan.push((idx, taken));
            }
            if remaining > MIPS_EPSILON {
                return None;
            }
        }
        Some(plan)
    }
}

impl VmScheduler for TimeSharedVmScheduler {
    fn pes(&self) -> &[Pe] {
        &self.pes
    }

    fn pes_mut(&mut self) -> &mut [Pe] {
        &mut self.pes
    }

    fn can_allocate(&self, mips_share: &[f64]) -> bool {
        self.plan(mips_share).is_some()
    }

    fn allocate_pes_for_vm(&mut self, vm_uid: &str, mips_share: &[f64]) -> bool {
        match self.plan(mips_share) {
            Some(plan) => {
                apply_plan(&mut self.pes, vm_uid, plan, PeStatus::Busy);
                true
            }
            None => false,
        }
    }

    fn available_mips(&self) -> f64 {
        self.pes.iter().map(|pe| pe.available_mips()).sum()
    }

    fn vms_migrating_in(&self) -> &BTreeSet<String> {
        &self.vms_migrating_in
    }

    fn vms_migrating_in_mut(&mut self) -> &mut BTreeSet<String> {
        &mut self.vms_migrating_in
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Gives each VM core a dedicated free PE whose rating covers the requested share.
#[derive(Clone)]
pub struct SpaceSharedVmScheduler {
    pes: Vec<Pe>,
    vms_migrating_in: BTreeSet<String>,
}

impl SpaceSharedVmScheduler {
    pub fn new(pes: Vec<Pe>) -> Self {
        Self {
            pes,
            vms_migrating_in: BTreeSet::new(),
        }
    }

    fn plan(&self, mips_share: &[f64]) -> Option<PePlan> {
        if mips_share.is_empty() {
            return None;
        }
        let mut used = vec![false; self.pes.len()];
        let mut plan = PePlan::new();
        for mips in mips_share {
            let idx = self
                .pes
                .iter()
                .enumerate()
                .position(|(idx, pe)| !used[idx] && pe.status() == PeStatus::Free && pe.mips() + MIPS_EPSILON >= *mips)?;
            used[idx] = true;
            plan.push((idx, *mips));
        }
        Some(plan)
    }
}

impl VmScheduler for SpaceSharedVmScheduler {
    fn pes(&self) -> &[Pe] {
        &self.pes
    }

    fn pes_mut(&mut self) -> &mut [Pe] {
        &mut self.pes
    }

    fn can_allocate(&self, mips_share: &[f64]) -> bool {
        self.plan(mips_share).is_some()
    }

    fn allocate_pes_for_vm(&mut self, vm_uid: &str, mips_share: &[f64]) -> bool {
        match self.plan(mips_share) {
            Some(plan) => {
                apply_plan(&mut self.pes, vm_uid, plan, PeStatus::Busy);
                true
            }
            None => false,
        }
    }

    fn available_mips(&self) -> f64 {
        self.pes
            .iter()
            .filter(|pe| pe.status() == PeStatus::Free)
            .map(|pe| pe.mips())
            .sum()
    }

    fn vms_migrating_in(&self) -> &BTreeSet<String> {
        &self.vms_migrating_in
    }

    fn vms_migrating_in_mut(&mut self) -> &mut BTreeSet<String> {
        &mut self.vms_migrating_in
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pe::make_pes;

    #[test]
    fn test_time_shared_spreads_share_over_pes() {
        let mut scheduler = TimeSharedVmScheduler::new(make_pes(2, 1000.));
        assert!(scheduler.allocate_pes_for_vm("0-1", &[600.]));
        assert!(scheduler.allocate_pes_for_vm("0-2", &[700.]));
        assert_eq!(scheduler.allocated_mips_for_vm("0-2"), vec![400., 300.]);
        assert_eq!(scheduler.available_mips(), 700.);
        // a single core may never request more than one PE provides
        assert!(!scheduler.can_allocate(&[1200.]));
        assert!(!scheduler.allocate_pes_for_vm("0-3", &[500., 500.]));
        scheduler.deallocate_pes_for_vm("0-1");
        assert_eq!(scheduler.available_mips(), 1300.);
        assert_eq!(scheduler.pes()[0].status(), PeStatus::Busy);
    }

    #[test]
    fn test_space_shared_needs_free_pe_per_core() {
        let mut scheduler = SpaceSharedVmScheduler::new(make_pes(2, 1000.));
        assert!(scheduler.allocate_pes_for_vm("0-1", &[500.]));
        assert_eq!(scheduler.available_mips(), 1000.);
        assert!(!scheduler.can_allocate(&[500., 500.]));
        assert!(scheduler.allocate_pes_for_vm("0-2", &[1000.]));
        scheduler.deallocate_pes_for_all_vms();
        assert!(scheduler.pes().iter().all(|pe| pe.status() == PeStatus::Free));
    }

    #[test]
    fn test_failed_pes_offer_nothing() {
        let mut scheduler = TimeSharedVmScheduler::new(make_pes(2, 1000.));
        scheduler.set_failed(true);
        assert_eq!(scheduler.available_mips(), 0.);
        assert!(!scheduler.can_allocate(&[100.]));
        scheduler.set_failed(false);
        assert!(scheduler.can_allocate(&[100.]));
    }
}
