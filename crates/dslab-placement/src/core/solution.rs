//! Scores and solution snapshots consumed by score calculators and search procedures.

use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::core::cloudlet::Cloudlet;
use crate::core::host::{Host, UtilizationWeights};
use crate::core::power_model::PowerModel;
use crate::core::vm::VirtualMachine;

/// Two-level score: hard part (feasibility) dominates, soft part (quality) breaks ties. Higher is better.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct HardSoftScore {
    pub hard: i64,
    pub soft: i64,
}

impl HardSoftScore {
    pub fn new(hard: i64, soft: i64) -> Self {
        Self { hard, soft }
    }

    pub fn is_feasible(&self) -> bool {
        self.hard >= 0
    }
}

impl Display for HardSoftScore {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}hard/{}soft", self.hard, self.soft)
    }
}

/// Host capacity and usage committed in the ledger at the moment the snapshot was taken.
#[derive(Clone)]
pub struct HostSnapshot {
    pub id: u32,
    pub total_mips: f64,
    pub ram_capacity: u64,
    pub bw_capacity: u64,
    pub storage_capacity: u64,
    pub used_mips: f64,
    pub ram_used: u64,
    pub bw_used: u64,
    pub storage_used: u64,
    pub resident_vms: usize,
    pub weights: UtilizationWeights,
    power_model: Box<dyn PowerModel>,
}

impl HostSnapshot {
    pub fn of(host: &Host) -> Self {
        Self {
            id: host.id,
            total_mips: host.total_mips(),
            ram_capacity: host.ram_capacity(),
            bw_capacity: host.bw_capacity(),
            storage_capacity: host.total_storage(),
            used_mips: host.used_mips(),
            ram_used: host.ram_used(),
            bw_used: host.bw_used(),
            storage_used: host.storage_used(),
            resident_vms: host.vms().len(),
            weights: host.utilization_weights(),
            power_model: dyn_clone::clone_box(host.power_model()),
        }
    }

    pub fn power(&self, utilization: f64) -> f64 {
        self.power_model.get_power(utilization)
    }

    pub fn blend(&self, cpu: f64, ram: f64, bw: f64) -> f64 {
        self.weights.cpu * cpu + self.weights.ram * ram + self.weights.bw * bw
    }
}

/// Resource request of a VM.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct VmDemand {
    pub id: u32,
    pub owner_id: u32,
    pub mips: f64,
    pub cores: u32,
    pub ram: u64,
    pub bw: u64,
    pub size: u64,
}

impl VmDemand {
    pub fn of(vm: &VirtualMachine) -> Self {
        Self {
            id: vm.id,
            owner_id: vm.owner_id,
            mips: vm.mips,
            cores: vm.cores,
            ram: vm.ram,
            bw: vm.bw,
            size: vm.size,
        }
    }

    pub fn total_mips(&self) -> f64 {
        self.mips * self.cores as f64
    }
}

/// Candidate assignment of VMs to hosts. `assignment[i]` is an index into `hosts` or `None` for unassigned.
#[derive(Clone)]
pub struct HostVmSolution {
    pub hosts: Vec<HostSnapshot>,
    pub vms: Vec<VmDemand>,
    pub assignment: Vec<Option<usize>>,
    pub score: Option<HardSoftScore>,
}

impl HostVmSolution {
    /// Creates a solution with every VM unassigned.
    pub fn new(hosts: Vec<HostSnapshot>, vms: Vec<VmDemand>) -> Self {
        let assignment = vec![None; vms.len()];
        Self {
            hosts,
            vms,
            assignment,
            score: None,
        }
    }

    pub fn assign(&mut self, vm_idx: usize, host_idx: Option<usize>) {
        self.assignment[vm_idx] = host_idx;
    }

    /// Returns ID of the host chosen for the VM.
    pub fn host_id_of(&self, vm_idx: usize) -> Option<u32> {
        self.assignment[vm_idx].map(|host_idx| self.hosts[host_idx].id)
    }

    pub fn assigned_count(&self) -> usize {
        self.assignment.iter().filter(|a| a.is_some()).count()
    }
}

/// Processing capacity of a VM offered to cloudlets.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct VmCapacity {
    pub id: u32,
    pub owner_id: u32,
    pub mips: f64,
    pub cores: u32,
}

impl VmCapacity {
    pub fn of(vm: &VirtualMachine) -> Self {
        Self {
            id: vm.id,
            owner_id: vm.owner_id,
            mips: vm.mips,
            cores: vm.cores,
        }
    }
}

/// Cloudlet request with its CPU utilization at the start of execution.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CloudletDemand {
    pub id: u32,
    pub owner_id: u32,
    pub length: u64,
    pub cores: u32,
    pub cpu_utilization: f64,
}

impl CloudletDemand {
    pub fn of(cloudlet: &Cloudlet) -> Self {
        Self {
            id: cloudlet.id,
            owner_id: cloudlet.owner_id,
            length: cloudlet.length,
            cores: cloudlet.cores,
            cpu_utilization: cloudlet.cpu_utilization(0.),
        }
    }

    /// Effective MIPS the cloudlet gets on the VM.
    pub fn speed_on(&self, vm: &VmCapacity) -> f64 {
        vm.mips * self.cpu_utilization
    }
}

/// Whether the VM is able to run the cloudlet: enough cores, the same owner and a positive processing speed.
pub fn can_run(vm: &VmCapacity, cloudlet: &CloudletDemand) -> bool {
    vm.cores >= cloudlet.cores && vm.owner_id == cloudlet.owner_id && cloudlet.speed_on(vm) > 0.
}

/// Candidate binding of cloudlets to VMs. `assignment[i]` is an index into `vms` or `None` for unbound.
#[derive(Clone, Debug)]
pub struct VmCloudletSolution {
    pub vms: Vec<VmCapacity>,
    pub cloudlets: Vec<CloudletDemand>,
    pub assignment: Vec<Option<usize>>,
    pub score: Option<HardSoftScore>,
}

impl VmCloudletSolution {
    pub fn new(vms: Vec<VmCapacity>, cloudlets: Vec<CloudletDemand>) -> Self {
        let assignment = vec![None; cloudlets.len()];
        Self {
            vms,
            cloudlets,
            assignment,
            score: None,
        }
    }

    pub fn assign(&mut self, cloudlet_idx: usize, vm_idx: Option<usize>) {
        self.assignment[cloudlet_idx] = vm_idx;
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Orders VMs from the easiest to the hardest to place. Equal VMs compare equal, so stable sorts keep their order.
pub fn vm_difficulty_cmp(a: &VmDemand, b: &VmDemand) -> Ordering {
    a.total_mips()
        .total_cmp(&b.total_mips())
        .then(a.size.cmp(&b.size))
        .then(a.ram.cmp(&b.ram))
        .then(a.bw.cmp(&b.bw))
}

/// Orders cloudlets from the easiest to the hardest to bind.
pub fn cloudlet_difficulty_cmp(a: &CloudletDemand, b: &CloudletDemand) -> Ordering {
    a.length.cmp(&b.length).then(a.cores.cmp(&b.cores))
}
