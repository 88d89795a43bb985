//! Processing elements (CPU cores) of a host.

use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PeStatus {
    Free,
    Busy,
    Failed,
}

/// One CPU core with a fixed MIPS rating and a table of MIPS shares allocated to VMs.
#[derive(Clone, Debug)]
pub struct Pe {
    pub id: u32,
    mips: f64,
    status: PeStatus,
    allocations: BTreeMap<String, f64>,
}

impl Pe {
    pub fn new(id: u32, mips: f64) -> Self {
        Self {
            id,
            mips,
            status: PeStatus::Free,
            allocations: BTreeMap::new(),
        }
    }

    /// Returns the MIPS rating.
    pub fn mips(&self) -> f64 {
        self.mips
    }

    pub fn status(&self) -> PeStatus {
        self.status
    }

    pub fn set_status(&mut self, status: PeStatus) {
        self.status = status;
    }

    pub fn is_failed(&self) -> bool {
        self.status == PeStatus::Failed
    }

    /// Returns MIPS not allocated to any VM. A failed PE offers nothing.
    pub fn available_mips(&self) -> f64 {
        if self.is_failed() {
            return 0.;
        }
        (self.mips - self.allocations.values().sum::<f64>()).max(0.)
    }

    /// Returns MIPS allocated to VMs.
    pub fn allocated_mips(&self) -> f64 {
        self.allocations.values().sum()
    }

    /// Returns MIPS allocated to the specified VM on this PE.
    pub fn allocated_mips_for_vm(&self, vm_uid: &str) -> f64 {
        self.allocations.get(vm_uid).copied().unwrap_or(0.)
    }

    /// Adds MIPS to the VM share on this PE. The caller guarantees the amount fits.
    pub(crate) fn allocate(&mut self, vm_uid: &str, mips: f64) {
        *self.allocations.entry(vm_uid.to_string()).or_insert(0.) += mips;
    }

    pub(crate) fn deallocate(&mut self, vm_uid: &str) {
        self.allocations.remove(vm_uid);
    }

    pub(crate) fn deallocate_all(&mut self) {
        self.allocations.clear();
    }
}

/// Creates `count` identical PEs.
pub fn make_pes(count: u32, mips: f64) -> Vec<Pe> {
    (0..count).map(|id| Pe::new(id, mips)).collect()
}
