//! Host capacity ledger.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::core::common::AllocationVerdict;
use crate::core::config::sim_config::HostConfig;
use crate::core::context::PlacementContext;
use crate::core::error::ConfigError;
use crate::core::history::{HostHistory, HostUsageSample, PlacementRecord};
use crate::core::pe::{make_pes, Pe, PeStatus};
use crate::core::power_model::{power_model_resolver, PowerModel};
use crate::core::provisioner::{ResourceProvisioner, SimpleProvisioner};
use crate::core::vm::VirtualMachine;
use crate::core::vm_scheduler::{vm_scheduler_resolver, VmScheduler};
use crate::{log_debug, log_error, log_warn};

const MIPS_TOLERANCE: f64 = 1e-6;
const CPU_OVERSHOOT_TOLERANCE: f64 = 0.01;

/// Coefficients used to blend CPU, RAM and BW utilizations into the single figure passed to the power model.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct UtilizationWeights {
    pub cpu: f64,
    pub ram: f64,
    pub bw: f64,
}

impl Default for UtilizationWeights {
    fn default() -> Self {
        Self {
            cpu: 1.,
            ram: 0.,
            bw: 0.,
        }
    }
}

/// Physical host owning PEs, storage and RAM/BW provisioners.
///
/// All changes of host resource state and of VM back-references go through [`admit`](Host::admit),
/// [`evict`](Host::evict) and the migration methods, each of which either completes fully or leaves the host
/// untouched.
pub struct Host {
    pub id: u32,
    storage: u64,
    total_storage: u64,
    ram_provisioner: Box<dyn ResourceProvisioner>,
    bw_provisioner: Box<dyn ResourceProvisioner>,
    vm_scheduler: Box<dyn VmScheduler>,
    power_model: Box<dyn PowerModel>,
    weights: UtilizationWeights,
    vms: Vec<Rc<RefCell<VirtualMachine>>>,
    vms_migrating_in: Vec<Rc<RefCell<VirtualMachine>>>,
    failed: bool,
    history: HostHistory,
    ctx: PlacementContext,
}

impl Host {
    pub fn new(
        id: u32,
        ram_provisioner: Box<dyn ResourceProvisioner>,
        bw_provisioner: Box<dyn ResourceProvisioner>,
        storage: u64,
        vm_scheduler: Box<dyn VmScheduler>,
        power_model: Box<dyn PowerModel>,
        ctx: PlacementContext,
    ) -> Self {
        Self {
            id,
            storage,
            total_storage: storage,
            ram_provisioner,
            bw_provisioner,
            vm_scheduler,
            power_model,
            weights: UtilizationWeights::default(),
            vms: Vec::new(),
            vms_migrating_in: Vec::new(),
            failed: false,
            history: HostHistory::default(),
            ctx,
        }
    }

    /// Creates host with simple RAM/BW provisioners and the scheduler and power model named in the config.
    pub fn from_config(id: u32, config: &HostConfig, ctx: PlacementContext) -> Result<Self, ConfigError> {
        if config.pes == 0 || config.mips_per_pe <= 0. {
            return Err(ConfigError::InvalidHost(format!(
                "{}: host needs at least one PE with positive MIPS",
                config.name_prefix
            )));
        }
        let scheduler = vm_scheduler_resolver(&config.vm_scheduler, make_pes(config.pes, config.mips_per_pe))?;
        let power_model = power_model_resolver(&config.power_model)?;
        Ok(Self::new(
            id,
            Box::new(SimpleProvisioner::new(config.ram)),
            Box::new(SimpleProvisioner::new(config.bw)),
            config.storage,
            scheduler,
            power_model,
            ctx,
        )
        .with_utilization_weights(config.utilization_weights))
    }

    pub fn with_utilization_weights(mut self, weights: UtilizationWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn context(&self) -> &PlacementContext {
        &self.ctx
    }

    ////////////////////////////////////////////////////////////////////////////
    // Admission and eviction
    ////////////////////////////////////////////////////////////////////////////

    /// Checks whether the VM could be admitted right now, without changing any state.
    /// Returns the verdict of the first failing check in the order storage, RAM, BW, MIPS.
    pub fn can_admit(&self, vm: &VirtualMachine) -> AllocationVerdict {
        let uid = vm.uid();
        if self.storage < vm.size {
            return AllocationVerdict::NotEnoughStorage;
        }
        if !self.ram_provisioner.is_suitable(&uid, vm.ram) {
            return AllocationVerdict::NotEnoughRam;
        }
        if !self.bw_provisioner.is_suitable(&uid, vm.bw) {
            return AllocationVerdict::NotEnoughBw;
        }
        if !self.vm_scheduler.can_allocate(&vm.mips_share()) {
            return AllocationVerdict::NotEnoughMips;
        }
        AllocationVerdict::Success
    }

    /// Pure feasibility predicate. Gives the same answer as [`admit`](Host::admit) would.
    pub fn is_suitable_for(&self, vm: &VirtualMachine) -> bool {
        self.can_admit(vm).is_success()
    }

    /// Reserves storage, RAM, BW and PEs for the VM and makes it resident.
    ///
    /// On any resource shortage, reservations made earlier in this call are released and the failed check is
    /// returned. Panics if the VM is already placed on some host or if a provisioner reports a reservation that
    /// differs from the requested one.
    pub fn admit(&mut self, vm: &Rc<RefCell<VirtualMachine>>) -> AllocationVerdict {
        let mut vm_ref = vm.borrow_mut();
        if let Some(host_id) = vm_ref.host() {
            log_error!(self.ctx, "vm {} is already placed on host {}", vm_ref.uid(), host_id);
            panic!("vm {} is already placed on host {}", vm_ref.uid(), host_id);
        }
        let verdict = self.reserve(&vm_ref);
        if !verdict.is_success() {
            log_debug!(self.ctx, "failed to admit vm {}: {}", vm_ref.uid(), verdict);
            return verdict;
        }
        self.vms.push(vm.clone());
        vm_ref.attach(self.id);
        let power = self.vm_power(&vm_ref);
        vm_ref.history_mut().add_placement(PlacementRecord {
            host: Some(self.id),
            time: self.ctx.time(),
            power: Some(power),
        });
        log_debug!(self.ctx, "admitted vm {}", vm_ref.uid());
        verdict
    }

    /// Releases all resources of the VM and clears its host reference. Never fails.
    pub fn evict(&mut self, vm: &Rc<RefCell<VirtualMachine>>) {
        let mut vm_ref = vm.borrow_mut();
        let uid = vm_ref.uid();
        self.release(&vm_ref);
        if let Some(pos) = self.vms.iter().position(|v| Rc::ptr_eq(v, vm)) {
            self.vms.remove(pos);
            self.storage = (self.storage + vm_ref.size).min(self.total_storage);
        }
        if let Some(pos) = self.vms_migrating_in.iter().position(|v| Rc::ptr_eq(v, vm)) {
            self.vms_migrating_in.remove(pos);
            self.vm_scheduler.vms_migrating_in_mut().remove(&uid);
            vm_ref.set_in_migration(false);
        }
        if vm_ref.host() == Some(self.id) {
            vm_ref.detach();
        }
        log_debug!(self.ctx, "evicted vm {}", uid);
    }

    /// Evicts every resident VM. Reservations of VMs migrating in are dropped too, but the VMs stay in the
    /// migrating-in list so that [`reallocate_migrating_in_vms`](Host::reallocate_migrating_in_vms) can restore
    /// them.
    pub fn evict_all(&mut self) {
        self.ram_provisioner.deallocate_all();
        self.bw_provisioner.deallocate_all();
        self.vm_scheduler.deallocate_pes_for_all_vms();
        for vm in self.vms.drain(..) {
            let mut vm_ref = vm.borrow_mut();
            self.storage = (self.storage + vm_ref.size).min(self.total_storage);
            if vm_ref.host() == Some(self.id) {
                vm_ref.detach();
            }
        }
        log_debug!(self.ctx, "evicted all vms");
    }

    ////////////////////////////////////////////////////////////////////////////
    // Migration bookkeeping
    ////////////////////////////////////////////////////////////////////////////

    /// Reserves resources for a VM migrating to this host. The VM stays attached to its source host until
    /// [`complete_migration_in`](Host::complete_migration_in) is called.
    ///
    /// The caller must check [`is_suitable_for`](Host::is_suitable_for) first: failing to reserve is fatal.
    pub fn migrate_in(&mut self, vm: &Rc<RefCell<VirtualMachine>>) {
        if self.vms_migrating_in.iter().any(|v| Rc::ptr_eq(v, vm)) {
            return;
        }
        let mut vm_ref = vm.borrow_mut();
        let uid = vm_ref.uid();
        vm_ref.set_in_migration(true);
        self.vm_scheduler.vms_migrating_in_mut().insert(uid.clone());
        let verdict = self.reserve(&vm_ref);
        if !verdict.is_success() {
            log_error!(self.ctx, "can't reserve resources for migrating vm {}: {}", uid, verdict);
            panic!("can't reserve resources for migrating vm {} on host {}: {}", uid, self.id, verdict);
        }
        self.vms_migrating_in.push(vm.clone());
        self.vms.push(vm.clone());
        log_debug!(self.ctx, "reserved resources for migrating vm {}", uid);
    }

    /// Drops the reservation of a VM whose migration to this host was cancelled.
    pub fn migrate_out(&mut self, vm: &Rc<RefCell<VirtualMachine>>) {
        let Some(pos) = self.vms_migrating_in.iter().position(|v| Rc::ptr_eq(v, vm)) else {
            return;
        };
        self.vms_migrating_in.remove(pos);
        let mut vm_ref = vm.borrow_mut();
        let uid = vm_ref.uid();
        self.release(&vm_ref);
        if let Some(pos) = self.vms.iter().position(|v| Rc::ptr_eq(v, vm)) {
            self.vms.remove(pos);
            self.storage = (self.storage + vm_ref.size).min(self.total_storage);
        }
        self.vm_scheduler.vms_migrating_in_mut().remove(&uid);
        vm_ref.set_in_migration(false);
        log_debug!(self.ctx, "dropped reservation of migrating vm {}", uid);
    }

    /// Finalizes the migration of the VM to this host. The VM must already be evicted from its source host.
    pub fn complete_migration_in(&mut self, vm: &Rc<RefCell<VirtualMachine>>) {
        let Some(pos) = self.vms_migrating_in.iter().position(|v| Rc::ptr_eq(v, vm)) else {
            let uid = vm.borrow().uid();
            log_error!(self.ctx, "vm {} is not migrating to this host", uid);
            panic!("vm {} is not migrating to host {}", uid, self.id);
        };
        self.vms_migrating_in.remove(pos);
        let mut vm_ref = vm.borrow_mut();
        if let Some(host_id) = vm_ref.host() {
            log_error!(self.ctx, "vm {} is still placed on host {}", vm_ref.uid(), host_id);
            panic!("vm {} is still placed on host {}", vm_ref.uid(), host_id);
        }
        self.vm_scheduler.vms_migrating_in_mut().remove(&vm_ref.uid());
        vm_ref.set_in_migration(false);
        vm_ref.attach(self.id);
        let power = self.vm_power(&vm_ref);
        vm_ref.history_mut().add_placement(PlacementRecord {
            host: Some(self.id),
            time: self.ctx.time(),
            power: Some(power),
        });
        log_debug!(self.ctx, "completed migration of vm {}", vm_ref.uid());
    }

    /// Re-reserves every migrating-in VM whose reservation was dropped by [`evict_all`](Host::evict_all).
    pub fn reallocate_migrating_in_vms(&mut self) {
        for vm in self.vms_migrating_in.clone() {
            if self.vms.iter().any(|v| Rc::ptr_eq(v, &vm)) {
                continue;
            }
            let vm_ref = vm.borrow();
            let uid = vm_ref.uid();
            self.vm_scheduler.vms_migrating_in_mut().insert(uid.clone());
            let verdict = self.reserve(&vm_ref);
            if !verdict.is_success() {
                log_error!(self.ctx, "can't restore reservation of migrating vm {}: {}", uid, verdict);
                panic!("can't restore reservation of migrating vm {} on host {}", uid, self.id);
            }
            drop(vm_ref);
            self.vms.push(vm);
        }
    }

    /// Reserves all resources of the VM with rollback on failure.
    fn reserve(&mut self, vm: &VirtualMachine) -> AllocationVerdict {
        let uid = vm.uid();
        if self.storage < vm.size {
            return AllocationVerdict::NotEnoughStorage;
        }
        if !self.ram_provisioner.allocate(&uid, vm.ram) {
            return AllocationVerdict::NotEnoughRam;
        }
        self.reconcile("RAM", &uid, self.ram_provisioner.allocated_for(&uid) as f64, vm.ram as f64);
        if !self.bw_provisioner.allocate(&uid, vm.bw) {
            self.ram_provisioner.deallocate(&uid);
            return AllocationVerdict::NotEnoughBw;
        }
        self.reconcile("BW", &uid, self.bw_provisioner.allocated_for(&uid) as f64, vm.bw as f64);
        if !self.vm_scheduler.allocate_pes_for_vm(&uid, &vm.mips_share()) {
            self.ram_provisioner.deallocate(&uid);
            self.bw_provisioner.deallocate(&uid);
            return AllocationVerdict::NotEnoughMips;
        }
        self.reconcile(
            "MIPS",
            &uid,
            self.vm_scheduler.total_allocated_mips_for_vm(&uid),
            vm.total_mips(),
        );
        self.storage -= vm.size;
        AllocationVerdict::Success
    }

    fn release(&mut self, vm: &VirtualMachine) {
        let uid = vm.uid();
        self.ram_provisioner.deallocate(&uid);
        self.bw_provisioner.deallocate(&uid);
        self.vm_scheduler.deallocate_pes_for_vm(&uid);
    }

    fn reconcile(&self, resource: &str, uid: &str, allocated: f64, requested: f64) {
        if (allocated - requested).abs() > MIPS_TOLERANCE {
            log_error!(
                self.ctx,
                "{} reservation of vm {} is inconsistent: requested {}, allocated {}",
                resource,
                uid,
                requested,
                allocated
            );
            panic!(
                "{} reservation of vm {} on host {} is inconsistent: requested {}, allocated {}",
                resource, uid, self.id, requested, allocated
            );
        }
    }

    ////////////////////////////////////////////////////////////////////////////
    // Failures
    ////////////////////////////////////////////////////////////////////////////

    /// Marks all PEs as failed (unusable) or repairs them.
    pub fn set_failed(&mut self, failed: bool) {
        self.failed = failed;
        self.vm_scheduler.set_failed(failed);
        if failed {
            log_warn!(self.ctx, "host failed");
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    ////////////////////////////////////////////////////////////////////////////
    // Capacity queries
    ////////////////////////////////////////////////////////////////////////////

    pub fn pes(&self) -> &[Pe] {
        self.vm_scheduler.pes()
    }

    pub fn number_of_pes(&self) -> u32 {
        self.pes().len() as u32
    }

    pub fn number_of_free_pes(&self) -> u32 {
        self.pes().iter().filter(|pe| pe.status() == PeStatus::Free).count() as u32
    }

    pub fn total_mips(&self) -> f64 {
        self.pes().iter().map(|pe| pe.mips()).sum()
    }

    pub fn used_mips(&self) -> f64 {
        self.pes().iter().map(|pe| pe.allocated_mips()).sum()
    }

    pub fn available_mips(&self) -> f64 {
        self.vm_scheduler.available_mips()
    }

    pub fn max_available_mips(&self) -> f64 {
        self.vm_scheduler.max_available_mips()
    }

    pub fn allocated_mips_for_vm(&self, vm: &VirtualMachine) -> Vec<f64> {
        self.vm_scheduler.allocated_mips_for_vm(&vm.uid())
    }

    pub fn ram_capacity(&self) -> u64 {
        self.ram_provisioner.capacity()
    }

    pub fn ram_used(&self) -> u64 {
        self.ram_provisioner.used()
    }

    pub fn bw_capacity(&self) -> u64 {
        self.bw_provisioner.capacity()
    }

    pub fn bw_used(&self) -> u64 {
        self.bw_provisioner.used()
    }

    /// Returns available storage.
    pub fn storage(&self) -> u64 {
        self.storage
    }

    pub fn total_storage(&self) -> u64 {
        self.total_storage
    }

    pub fn storage_used(&self) -> u64 {
        self.total_storage - self.storage
    }

    pub fn vms(&self) -> &[Rc<RefCell<VirtualMachine>>] {
        &self.vms
    }

    pub fn vms_migrating_in(&self) -> &[Rc<RefCell<VirtualMachine>>] {
        &self.vms_migrating_in
    }

    /// Looks up a resident VM by its ID and owner ID.
    pub fn vm_by_ids(&self, vm_id: u32, owner_id: u32) -> Option<Rc<RefCell<VirtualMachine>>> {
        self.vms
            .iter()
            .find(|vm| {
                let vm = vm.borrow();
                vm.id == vm_id && vm.owner_id == owner_id
            })
            .cloned()
    }

    ////////////////////////////////////////////////////////////////////////////
    // Utilization and power
    ////////////////////////////////////////////////////////////////////////////

    /// Returns `1 - available / total` over all PEs, clamped to [0, 1].
    pub fn cpu_utilization(&self) -> f64 {
        let total: f64 = self.pes().iter().map(|pe| pe.mips()).sum();
        if total == 0. {
            return 0.;
        }
        let available: f64 = self.pes().iter().map(|pe| pe.available_mips()).sum();
        let utilization = 1. - available / total;
        if utilization > 1. + CPU_OVERSHOOT_TOLERANCE {
            log_warn!(self.ctx, "cpu utilization {:.4} exceeds 1", utilization);
        }
        utilization.clamp(0., 1.)
    }

    pub fn ram_utilization(&self) -> f64 {
        ratio(self.ram_used() as f64, self.ram_capacity() as f64)
    }

    pub fn bw_utilization(&self) -> f64 {
        ratio(self.bw_used() as f64, self.bw_capacity() as f64)
    }

    pub fn storage_utilization(&self) -> f64 {
        ratio(self.storage_used() as f64, self.total_storage as f64)
    }

    pub fn utilization_weights(&self) -> UtilizationWeights {
        self.weights
    }

    /// Weighted sum of CPU, RAM and BW utilizations.
    pub fn blended_utilization(&self) -> f64 {
        self.blend(self.cpu_utilization(), self.ram_utilization(), self.bw_utilization())
    }

    pub fn blend(&self, cpu: f64, ram: f64, bw: f64) -> f64 {
        self.weights.cpu * cpu + self.weights.ram * ram + self.weights.bw * bw
    }

    /// Returns the current power draw.
    pub fn power(&self) -> f64 {
        self.power_model.get_power(self.blended_utilization())
    }

    pub fn power_model(&self) -> &(dyn PowerModel + 'static) {
        self.power_model.as_ref()
    }

    /// Returns the power draw at the given blended utilization.
    pub fn power_at(&self, utilization: f64) -> f64 {
        self.power_model.get_power(utilization)
    }

    pub fn static_power(&self) -> f64 {
        self.power_model.static_power()
    }

    pub fn max_power(&self) -> f64 {
        self.power_model.max_power()
    }

    /// Estimates power added by the VM alone: power at the VM's own blended resource share minus idle power.
    pub fn vm_power(&self, vm: &VirtualMachine) -> f64 {
        let share = self.blend(
            ratio(vm.total_mips(), self.total_mips()),
            ratio(vm.ram as f64, self.ram_capacity() as f64),
            ratio(vm.bw as f64, self.bw_capacity() as f64),
        );
        self.power_model.get_power(share) - self.power_model.static_power()
    }

    ////////////////////////////////////////////////////////////////////////////
    // History
    ////////////////////////////////////////////////////////////////////////////

    pub fn history(&self) -> &HostHistory {
        &self.history
    }

    /// Appends usage committed by resident VMs and the current power draw to the host history.
    pub fn record_usage(&mut self, time: f64) {
        let mut sample = HostUsageSample {
            time,
            power: self.power(),
            ..Default::default()
        };
        for vm in &self.vms {
            let vm = vm.borrow();
            sample.mips += vm.total_mips();
            sample.ram += vm.ram;
            sample.bw += vm.bw;
            sample.storage += vm.size;
        }
        self.history.push(sample);
    }
}

fn ratio(value: f64, total: f64) -> f64 {
    if total > 0. {
        value / total
    } else {
        0.
    }
}
