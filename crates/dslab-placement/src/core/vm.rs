//! Representations of virtual machine and its status.

use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::core::history::VmHistory;

/// Placement status of virtual machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum VmStatus {
    Unplaced,
    Placed,
    Migrating,
}

impl Display for VmStatus {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            VmStatus::Unplaced => write!(f, "unplaced"),
            VmStatus::Placed => write!(f, "placed"),
            VmStatus::Migrating => write!(f, "migrating"),
        }
    }
}

/// Represents virtual machine (VM).
///
/// VM is characterized by its ID, the owner ID and resource requirements: MIPS per core, number of cores, RAM,
/// bandwidth and disk size. The host back-reference and the history are changed only by the host ledger
/// and by the placement policy orchestrating it.
#[derive(Clone, Debug, Serialize)]
pub struct VirtualMachine {
    pub id: u32,
    pub owner_id: u32,
    pub mips: f64,
    pub cores: u32,
    pub ram: u64,
    pub bw: u64,
    pub size: u64,
    host: Option<u32>,
    in_migration: bool,
    status: VmStatus,
    #[serde(skip)]
    history: VmHistory,
}

impl VirtualMachine {
    pub fn new(id: u32, owner_id: u32, mips: f64, cores: u32, ram: u64, bw: u64, size: u64) -> Self {
        Self {
            id,
            owner_id,
            mips,
            cores,
            ram,
            bw,
            size,
            host: None,
            in_migration: false,
            status: VmStatus::Unplaced,
            history: VmHistory::default(),
        }
    }

    /// Returns identifier unique across owners, used as a key in provisioner and scheduler tables.
    pub fn uid(&self) -> String {
        vm_uid(self.owner_id, self.id)
    }

    /// Returns requested MIPS for every core.
    pub fn mips_share(&self) -> Vec<f64> {
        vec![self.mips; self.cores as usize]
    }

    /// Returns total requested MIPS (MIPS per core × cores).
    pub fn total_mips(&self) -> f64 {
        self.mips * self.cores as f64
    }

    /// Returns ID of the host the VM is placed on.
    pub fn host(&self) -> Option<u32> {
        self.host
    }

    pub fn is_in_migration(&self) -> bool {
        self.in_migration
    }

    pub fn status(&self) -> VmStatus {
        self.status
    }

    pub fn history(&self) -> &VmHistory {
        &self.history
    }

    pub(crate) fn attach(&mut self, host_id: u32) {
        self.host = Some(host_id);
        self.status = if self.in_migration {
            VmStatus::Migrating
        } else {
            VmStatus::Placed
        };
    }

    pub(crate) fn detach(&mut self) {
        self.host = None;
        self.status = VmStatus::Unplaced;
    }

    pub(crate) fn set_in_migration(&mut self, in_migration: bool) {
        self.in_migration = in_migration;
        if self.host.is_some() {
            self.status = if in_migration {
                VmStatus::Migrating
            } else {
                VmStatus::Placed
            };
        }
    }

    pub(crate) fn history_mut(&mut self) -> &mut VmHistory {
        &mut self.history
    }
}

/// Builds VM unique identifier from its owner and ID.
pub fn vm_uid(owner_id: u32, vm_id: u32) -> String {
    format!("{}-{}", owner_id, vm_id)
}
