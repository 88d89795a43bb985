//! VM allocation policy owning the authoritative VM to host table.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::core::context::PlacementContext;
use crate::core::history::PlacementRecord;
use crate::core::host::Host;
use crate::core::scoring::ScoreCalculator;
use crate::core::solution::{HardSoftScore, HostSnapshot, HostVmSolution, VmDemand};
use crate::core::solver::HostVmSolver;
use crate::core::vm::{vm_uid, VirtualMachine};
use crate::{log_debug, log_error, log_info, log_warn};

/// Outcome of a batch placement.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchPlacement {
    /// Whether each VM of the batch is placed after the call (in the order of the input).
    pub placed: Vec<bool>,
    /// Score of the candidate returned by the solver.
    pub score: HardSoftScore,
}

impl BatchPlacement {
    pub fn placed_count(&self) -> usize {
        self.placed.iter().filter(|p| **p).count()
    }
}

/// Places VMs on hosts either greedily (host with the most free PEs first) or by replaying a solver candidate
/// through the host ledger. Admission by the ledger is authoritative: a VM counts as placed only if its host
/// accepted it.
pub struct VmAllocationPolicy {
    hosts: Vec<Rc<RefCell<Host>>>,
    host_index: HashMap<u32, usize>,
    vm_table: IndexMap<String, u32>,
    used_pes: HashMap<String, u32>,
    free_pes: Vec<i64>,
    migrations: HashMap<String, u32>,
    ctx: PlacementContext,
}

impl VmAllocationPolicy {
    pub fn new(hosts: Vec<Rc<RefCell<Host>>>, ctx: PlacementContext) -> Self {
        let mut policy = Self {
            hosts: Vec::new(),
            host_index: HashMap::new(),
            vm_table: IndexMap::new(),
            used_pes: HashMap::new(),
            free_pes: Vec::new(),
            migrations: HashMap::new(),
            ctx,
        };
        for host in hosts {
            policy.add_host(host);
        }
        policy
    }

    pub fn add_host(&mut self, host: Rc<RefCell<Host>>) {
        let (id, free_pes) = {
            let host = host.borrow();
            (host.id, host.number_of_free_pes())
        };
        self.host_index.insert(id, self.hosts.len());
        self.hosts.push(host);
        self.free_pes.push(free_pes as i64);
    }

    pub fn hosts(&self) -> &[Rc<RefCell<Host>>] {
        &self.hosts
    }

    /// Places the VM on the host with the most free PEs, trying every host at most once.
    /// Ties are broken by host order. Returns false if no host accepted the VM.
    pub fn allocate_host_for_vm(&mut self, vm: &Rc<RefCell<VirtualMachine>>) -> bool {
        let uid = vm.borrow().uid();
        if self.vm_table.contains_key(&uid) {
            log_warn!(self.ctx, "vm {} is already placed", uid);
            return false;
        }
        // counters may be negative on oversubscribed time-shared hosts
        let mut candidates: Vec<Option<i64>> = self.free_pes.iter().map(|free| Some(*free)).collect();
        for _ in 0..self.hosts.len() {
            let mut best: Option<(usize, i64)> = None;
            for (idx, free) in candidates.iter().enumerate() {
                if let Some(free) = *free {
                    if best.map_or(true, |(_, best_free)| free > best_free) {
                        best = Some((idx, free));
                    }
                }
            }
            let Some((idx, _)) = best else {
                break;
            };
            if self.try_admit(vm, idx) {
                return true;
            }
            candidates[idx] = None;
        }
        self.record_unplaced(vm);
        log_debug!(self.ctx, "no host accepted vm {}", uid);
        false
    }

    /// Places the VM on the specified host. Returns false if the host is unknown or rejected the VM.
    pub fn allocate_host_for_vm_on(&mut self, vm: &Rc<RefCell<VirtualMachine>>, host_id: u32) -> bool {
        let uid = vm.borrow().uid();
        if self.vm_table.contains_key(&uid) {
            log_warn!(self.ctx, "vm {} is already placed", uid);
            return false;
        }
        match self.host_index.get(&host_id) {
            Some(idx) => self.try_admit(vm, *idx),
            None => {
                log_warn!(self.ctx, "unknown host {}", host_id);
                false
            }
        }
    }

    /// Places a batch of VMs by asking the solver for a candidate assignment and replaying it through the hosts.
    ///
    /// VMs which are already placed are not passed to the solver. VMs left unassigned by the solver or rejected
    /// by their host get the unplaced record in their history.
    pub fn allocate_hosts_for_vms(
        &mut self,
        vms: &[Rc<RefCell<VirtualMachine>>],
        solver: &mut dyn HostVmSolver,
        calculator: &dyn ScoreCalculator,
    ) -> BatchPlacement {
        let pending: Vec<usize> = (0..vms.len())
            .filter(|idx| !self.vm_table.contains_key(&vms[*idx].borrow().uid()))
            .collect();
        let problem = HostVmSolution::new(
            self.hosts.iter().map(|host| HostSnapshot::of(&host.borrow())).collect(),
            pending.iter().map(|idx| VmDemand::of(&vms[*idx].borrow())).collect(),
        );
        let candidate = solver.solve(problem, calculator);
        let score = candidate
            .score
            .unwrap_or_else(|| calculator.calculate_score(&candidate));

        let by_uid: HashMap<String, usize> = pending.iter().map(|idx| (vms[*idx].borrow().uid(), *idx)).collect();
        let mut replayed = vec![false; vms.len()];
        for (pos, demand) in candidate.vms.iter().enumerate() {
            let Some(&idx) = by_uid.get(&vm_uid(demand.owner_id, demand.id)) else {
                log_warn!(self.ctx, "solver returned unknown vm {}", vm_uid(demand.owner_id, demand.id));
                continue;
            };
            if replayed[idx] {
                continue;
            }
            replayed[idx] = true;
            let vm = &vms[idx];
            let host_idx = candidate
                .assignment
                .get(pos)
                .copied()
                .flatten()
                .and_then(|host_pos| candidate.hosts.get(host_pos))
                .and_then(|host| self.host_index.get(&host.id).copied());
            let placed = match host_idx {
                Some(host_idx) => self.try_admit(vm, host_idx),
                None => false,
            };
            if !placed {
                self.record_unplaced(vm);
            }
        }
        for idx in &pending {
            if !replayed[*idx] {
                self.record_unplaced(&vms[*idx]);
            }
        }

        let placed: Vec<bool> = vms
            .iter()
            .map(|vm| self.vm_table.contains_key(&vm.borrow().uid()))
            .collect();
        let result = BatchPlacement { placed, score };
        log_info!(
            self.ctx,
            "batch placement: {} of {} vms placed, candidate score {}",
            result.placed_count(),
            vms.len(),
            score
        );
        result
    }

    /// Removes the VM from its host and from the table. Returns false if the VM is not placed.
    pub fn deallocate_host_for_vm(&mut self, vm: &Rc<RefCell<VirtualMachine>>) -> bool {
        let uid = vm.borrow().uid();
        if self.migrations.contains_key(&uid) {
            self.cancel_migration(vm);
        }
        let Some(host_id) = self.vm_table.shift_remove(&uid) else {
            return false;
        };
        let idx = self.index_of(host_id, &uid);
        self.hosts[idx].borrow_mut().evict(vm);
        self.free_pes[idx] += self.used_pes.remove(&uid).unwrap_or(0) as i64;
        log_debug!(self.ctx, "vm {} removed from host {}", uid, host_id);
        true
    }

    ////////////////////////////////////////////////////////////////////////////
    // Migration
    ////////////////////////////////////////////////////////////////////////////

    /// Reserves resources for the VM on the destination host. Returns false if the VM is not placed, already
    /// migrating, or the destination can't host it.
    pub fn start_migration(&mut self, vm: &Rc<RefCell<VirtualMachine>>, dest_host_id: u32) -> bool {
        let (uid, cores) = {
            let vm = vm.borrow();
            (vm.uid(), vm.cores)
        };
        let Some(&source_id) = self.vm_table.get(&uid) else {
            log_warn!(self.ctx, "can't migrate vm {}: not placed", uid);
            return false;
        };
        if source_id == dest_host_id || self.migrations.contains_key(&uid) {
            return false;
        }
        let Some(&dest_idx) = self.host_index.get(&dest_host_id) else {
            log_warn!(self.ctx, "can't migrate vm {}: unknown host {}", uid, dest_host_id);
            return false;
        };
        let mut dest = self.hosts[dest_idx].borrow_mut();
        if !dest.is_suitable_for(&vm.borrow()) {
            log_debug!(self.ctx, "host {} is not suitable for migrating vm {}", dest_host_id, uid);
            return false;
        }
        dest.migrate_in(vm);
        drop(dest);
        self.migrations.insert(uid.clone(), dest_host_id);
        self.free_pes[dest_idx] -= cores as i64;
        log_info!(self.ctx, "vm {} started migration {} -> {}", uid, source_id, dest_host_id);
        true
    }

    /// Moves the VM to the destination host of its migration. Returns false if the VM is not migrating.
    pub fn finish_migration(&mut self, vm: &Rc<RefCell<VirtualMachine>>) -> bool {
        let uid = vm.borrow().uid();
        let Some(dest_id) = self.migrations.remove(&uid) else {
            return false;
        };
        let Some(source_id) = self.vm_table.get(&uid).copied() else {
            log_error!(self.ctx, "migrating vm {} is missing in the table", uid);
            panic!("migrating vm {} is missing in the table", uid);
        };
        let source_idx = self.index_of(source_id, &uid);
        let dest_idx = self.index_of(dest_id, &uid);
        self.hosts[source_idx].borrow_mut().evict(vm);
        self.hosts[dest_idx].borrow_mut().complete_migration_in(vm);
        self.vm_table.insert(uid.clone(), dest_id);
        self.free_pes[source_idx] += self.used_pes.get(&uid).copied().unwrap_or(0) as i64;
        log_info!(self.ctx, "vm {} migrated {} -> {}", uid, source_id, dest_id);
        true
    }

    /// Drops the destination reservation of a migrating VM. Returns false if the VM is not migrating.
    pub fn cancel_migration(&mut self, vm: &Rc<RefCell<VirtualMachine>>) -> bool {
        let (uid, cores) = {
            let vm = vm.borrow();
            (vm.uid(), vm.cores)
        };
        let Some(dest_id) = self.migrations.remove(&uid) else {
            return false;
        };
        let dest_idx = self.index_of(dest_id, &uid);
        self.hosts[dest_idx].borrow_mut().migrate_out(vm);
        self.free_pes[dest_idx] += cores as i64;
        log_info!(self.ctx, "vm {} migration to {} cancelled", uid, dest_id);
        true
    }

    ////////////////////////////////////////////////////////////////////////////
    // Lookups
    ////////////////////////////////////////////////////////////////////////////

    /// Returns the VM to host table in placement order.
    pub fn vm_table(&self) -> &IndexMap<String, u32> {
        &self.vm_table
    }

    pub fn host_id_of(&self, vm: &VirtualMachine) -> Option<u32> {
        self.vm_table.get(&vm.uid()).copied()
    }

    pub fn host_of(&self, vm: &VirtualMachine) -> Option<Rc<RefCell<Host>>> {
        self.host_by_ids(vm.id, vm.owner_id)
    }

    pub fn host_by_ids(&self, vm_id: u32, owner_id: u32) -> Option<Rc<RefCell<Host>>> {
        self.vm_table
            .get(&vm_uid(owner_id, vm_id))
            .and_then(|host_id| self.host_by_id(*host_id))
    }

    pub fn host_by_id(&self, host_id: u32) -> Option<Rc<RefCell<Host>>> {
        self.host_index.get(&host_id).map(|idx| self.hosts[*idx].clone())
    }

    /// Returns the destination of a migrating VM.
    pub fn migration_destination(&self, vm: &VirtualMachine) -> Option<u32> {
        self.migrations.get(&vm.uid()).copied()
    }

    /// Returns free PE counters in host order. A counter goes negative when a host runs more VM cores than it has PEs.
    pub fn free_pes(&self) -> &[i64] {
        &self.free_pes
    }

    pub fn free_pes_of(&self, host_id: u32) -> Option<i64> {
        self.host_index.get(&host_id).map(|idx| self.free_pes[*idx])
    }

    pub fn used_pes(&self) -> &HashMap<String, u32> {
        &self.used_pes
    }

    ////////////////////////////////////////////////////////////////////////////

    fn try_admit(&mut self, vm: &Rc<RefCell<VirtualMachine>>, idx: usize) -> bool {
        let verdict = self.hosts[idx].borrow_mut().admit(vm);
        if !verdict.is_success() {
            return false;
        }
        let (uid, cores) = {
            let vm = vm.borrow();
            (vm.uid(), vm.cores)
        };
        let host_id = self.hosts[idx].borrow().id;
        self.vm_table.insert(uid.clone(), host_id);
        self.used_pes.insert(uid.clone(), cores);
        self.free_pes[idx] -= cores as i64;
        log_debug!(self.ctx, "vm {} placed on host {}", uid, host_id);
        true
    }

    fn record_unplaced(&self, vm: &Rc<RefCell<VirtualMachine>>) {
        vm.borrow_mut().history_mut().add_placement(PlacementRecord {
            host: None,
            time: self.ctx.time(),
            power: None,
        });
    }

    fn index_of(&self, host_id: u32, uid: &str) -> usize {
        match self.host_index.get(&host_id) {
            Some(idx) => *idx,
            None => {
                log_error!(self.ctx, "vm {} refers to unknown host {}", uid, host_id);
                panic!("vm {} refers to unknown host {}", uid, host_id);
            }
        }
    }
}
