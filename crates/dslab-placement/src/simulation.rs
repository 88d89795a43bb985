use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use sugars::{rc, refcell};

use crate::core::clock::ManualClock;
use crate::core::cloudlet::{Cloudlet, CloudletStatus};
use crate::core::config::sim_config::{HostConfig, SimulationConfig};
use crate::core::context::PlacementContext;
use crate::core::error::ConfigError;
use crate::core::history::{BindingInterval, HistoryRecorder, PlacementReport};
use crate::core::host::Host;
use crate::core::placement_policy::VmAllocationPolicy;
use crate::core::scoring::{
    score_calculator_resolver, ScoreCalculator, VmCloudletScoreCalculator, VmCloudletSimpleScoreCalculator,
};
use crate::core::solution::{
    can_run, CloudletDemand, HardSoftScore, HostSnapshot, HostVmSolution, VmCapacity, VmCloudletSolution,
};
use crate::core::solver::{HostVmSolver, VmCloudletSolver};
use crate::core::utilization_model::{ConstUtilizationModel, FullUtilizationModel, UtilizationModel};
use crate::core::vm::VirtualMachine;
use crate::extensions::{cloudlet_solver_resolver, solver_resolver};
use crate::{log_debug, log_info};

/// Owns the clock, hosts, VMs and cloudlets of a scenario and drives placement cycles over them.
pub struct PlacementSimulation {
    clock: ManualClock,
    config: SimulationConfig,
    hosts: Vec<Rc<RefCell<Host>>>,
    vms: Vec<Rc<RefCell<VirtualMachine>>>,
    cloudlets: Vec<Rc<RefCell<Cloudlet>>>,
    policy: VmAllocationPolicy,
    recorder: HistoryRecorder,
    calculator: Box<dyn ScoreCalculator>,
    solver: Box<dyn HostVmSolver>,
    cloudlet_calculator: Box<dyn VmCloudletScoreCalculator>,
    cloudlet_solver: Box<dyn VmCloudletSolver>,
    next_vm_ids: HashMap<u32, u32>,
    next_cloudlet_ids: HashMap<u32, u32>,
    ctx: PlacementContext,
}

impl PlacementSimulation {
    /// Validates the config and creates the hosts, VMs and cloudlets it describes.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let clock = ManualClock::new();
        let ctx = PlacementContext::new("simulation", clock.shared());
        let mut sim = Self {
            policy: VmAllocationPolicy::new(Vec::new(), ctx.derive("vm-allocation-policy")),
            recorder: HistoryRecorder::new(ctx.derive("history")),
            calculator: score_calculator_resolver(&config.scoring, config.costs.as_ref())?,
            solver: solver_resolver(&config.solver)?,
            cloudlet_calculator: Box::new(VmCloudletSimpleScoreCalculator),
            cloudlet_solver: cloudlet_solver_resolver(&config.cloudlet_solver)?,
            clock,
            hosts: Vec::new(),
            vms: Vec::new(),
            cloudlets: Vec::new(),
            next_vm_ids: HashMap::new(),
            next_cloudlet_ids: HashMap::new(),
            ctx,
            config,
        };

        for host_config in sim.config.hosts.clone() {
            for _ in 0..host_config.count {
                sim.add_host(&host_config)?;
            }
        }
        for vm_config in sim.config.vms.clone() {
            for _ in 0..vm_config.count {
                sim.add_vm(
                    vm_config.owner_id,
                    vm_config.mips,
                    vm_config.cores,
                    vm_config.ram,
                    vm_config.bw,
                    vm_config.size,
                );
            }
        }
        for cloudlet_config in sim.config.cloudlets.clone() {
            for _ in 0..cloudlet_config.count {
                let cpu_utilization: Box<dyn UtilizationModel> = match cloudlet_config.cpu_utilization {
                    Some(utilization) => Box::new(ConstUtilizationModel::new(utilization)),
                    None => Box::new(FullUtilizationModel),
                };
                sim.add_cloudlet(
                    cloudlet_config.owner_id,
                    cloudlet_config.length,
                    cloudlet_config.cores,
                    cloudlet_config.input_size,
                    cloudlet_config.output_size,
                    cpu_utilization,
                );
            }
        }
        log_info!(
            sim.ctx,
            "created {} hosts, {} vms, {} cloudlets",
            sim.hosts.len(),
            sim.vms.len(),
            sim.cloudlets.len()
        );
        Ok(sim)
    }

    /// Adds a single host described by the config (its `count` is ignored) and returns the host ID.
    pub fn add_host(&mut self, config: &HostConfig) -> Result<u32, ConfigError> {
        let id = self.hosts.len() as u32;
        let host = Host::from_config(id, config, self.ctx.derive(&format!("{}-{}", config.name_prefix, id)))?;
        self.register_host(host);
        Ok(id)
    }

    /// Adds a host built by the caller from the assigned ID and context, returns the host ID.
    pub fn add_host_with<F>(&mut self, build: F) -> u32
    where
        F: FnOnce(u32, PlacementContext) -> Host,
    {
        let id = self.hosts.len() as u32;
        let host = build(id, self.ctx.derive(&format!("host-{}", id)));
        self.register_host(host);
        id
    }

    fn register_host(&mut self, host: Host) {
        let host = rc!(refcell!(host));
        self.policy.add_host(host.clone());
        self.hosts.push(host);
    }

    /// Creates unplaced VM with the next free ID of the owner.
    pub fn add_vm(
        &mut self,
        owner_id: u32,
        mips: f64,
        cores: u32,
        ram: u64,
        bw: u64,
        size: u64,
    ) -> Rc<RefCell<VirtualMachine>> {
        let next_id = self.next_vm_ids.entry(owner_id).or_insert(0);
        let vm = rc!(refcell!(VirtualMachine::new(*next_id, owner_id, mips, cores, ram, bw, size)));
        *next_id += 1;
        self.vms.push(vm.clone());
        vm
    }

    /// Creates unbound cloudlet with the next free ID of the owner.
    pub fn add_cloudlet(
        &mut self,
        owner_id: u32,
        length: u64,
        cores: u32,
        input_size: u64,
        output_size: u64,
        cpu_utilization: Box<dyn UtilizationModel>,
    ) -> Rc<RefCell<Cloudlet>> {
        let next_id = self.next_cloudlet_ids.entry(owner_id).or_insert(0);
        let cloudlet = Cloudlet::new(*next_id, owner_id, length, cores, input_size, output_size).with_utilization_models(
            cpu_utilization,
            Box::new(FullUtilizationModel),
            Box::new(FullUtilizationModel),
        );
        *next_id += 1;
        let cloudlet = rc!(refcell!(cloudlet));
        self.cloudlets.push(cloudlet.clone());
        cloudlet
    }

    ////////////////////////////////////////////////////////////////////////////
    // Placement
    ////////////////////////////////////////////////////////////////////////////

    /// Places the VM greedily.
    pub fn place_vm(&mut self, vm: &Rc<RefCell<VirtualMachine>>) -> bool {
        self.policy.allocate_host_for_vm(vm)
    }

    /// Places the VMs by the configured solver, or greedily one by one if the solver is disabled.
    pub fn place_vms(&mut self, vms: &[Rc<RefCell<VirtualMachine>>]) -> Vec<bool> {
        if self.config.use_solver {
            self.policy
                .allocate_hosts_for_vms(vms, self.solver.as_mut(), self.calculator.as_ref())
                .placed
        } else {
            vms.iter().map(|vm| self.policy.allocate_host_for_vm(vm)).collect()
        }
    }

    /// Places all VMs which are not placed yet. Returns the number of placed VMs among them.
    pub fn place_pending_vms(&mut self) -> usize {
        let pending: Vec<Rc<RefCell<VirtualMachine>>> = self
            .vms
            .iter()
            .filter(|vm| vm.borrow().host().is_none())
            .cloned()
            .collect();
        self.place_vms(&pending).into_iter().filter(|placed| *placed).count()
    }

    pub fn deallocate_vm(&mut self, vm: &Rc<RefCell<VirtualMachine>>) -> bool {
        self.policy.deallocate_host_for_vm(vm)
    }

    pub fn start_migration(&mut self, vm: &Rc<RefCell<VirtualMachine>>, dest_host_id: u32) -> bool {
        self.policy.start_migration(vm, dest_host_id)
    }

    pub fn finish_migration(&mut self, vm: &Rc<RefCell<VirtualMachine>>) -> bool {
        self.policy.finish_migration(vm)
    }

    pub fn cancel_migration(&mut self, vm: &Rc<RefCell<VirtualMachine>>) -> bool {
        self.policy.cancel_migration(vm)
    }

    /// Binds unbound cloudlets to placed VMs using the cloudlet solver. Returns the number of bound cloudlets.
    ///
    /// Choices of a VM unable to run the cloudlet (too few cores, another owner, zero speed) or of an unknown VM
    /// leave the cloudlet unbound.
    pub fn bind_cloudlets(&mut self) -> usize {
        let vms: Vec<Rc<RefCell<VirtualMachine>>> = self
            .vms
            .iter()
            .filter(|vm| vm.borrow().host().is_some())
            .cloned()
            .collect();
        let cloudlets: Vec<Rc<RefCell<Cloudlet>>> = self
            .cloudlets
            .iter()
            .filter(|cloudlet| cloudlet.borrow().vm().is_none())
            .cloned()
            .collect();
        let problem = VmCloudletSolution::new(
            vms.iter().map(|vm| VmCapacity::of(&vm.borrow())).collect(),
            cloudlets.iter().map(|cloudlet| CloudletDemand::of(&cloudlet.borrow())).collect(),
        );
        let candidate = self.cloudlet_solver.solve(problem, self.cloudlet_calculator.as_ref());

        let mut bound = 0;
        for (cloudlet, choice) in cloudlets.iter().zip(&candidate.assignment) {
            let mut cloudlet = cloudlet.borrow_mut();
            let demand = CloudletDemand::of(&cloudlet);
            let vm = choice.and_then(|idx| vms.get(idx)).map(|vm| vm.borrow());
            match vm {
                Some(vm) if can_run(&VmCapacity::of(&vm), &demand) => {
                    cloudlet.bind(Some(vm.id));
                    bound += 1;
                }
                _ => {
                    cloudlet.bind(None);
                    cloudlet
                        .history_mut()
                        .add_interval(BindingInterval { vm: None, duration: 0. });
                }
            }
        }
        log_info!(self.ctx, "bound {} of {} cloudlets", bound, cloudlets.len());
        bound
    }

    /// Marks a bound queued cloudlet as running since the current time. Returns false otherwise.
    pub fn start_cloudlet(&mut self, cloudlet: &Rc<RefCell<Cloudlet>>) -> bool {
        let mut cloudlet = cloudlet.borrow_mut();
        if cloudlet.vm().is_none() || cloudlet.status() != CloudletStatus::Queued {
            return false;
        }
        cloudlet.mark_running(self.time());
        log_debug!(self.ctx, "cloudlet {} started on vm {:?}", cloudlet.id, cloudlet.vm());
        true
    }

    /// Marks a running cloudlet as completed at the current time. Returns false if it is not running.
    pub fn finish_cloudlet(&mut self, cloudlet: &Rc<RefCell<Cloudlet>>, success: bool) -> bool {
        let mut cloudlet = cloudlet.borrow_mut();
        if cloudlet.status() != CloudletStatus::Running {
            return false;
        }
        cloudlet.mark_finished(self.time(), success);
        log_debug!(self.ctx, "cloudlet {} finished: {}", cloudlet.id, cloudlet.status());
        true
    }

    ////////////////////////////////////////////////////////////////////////////
    // Time and history
    ////////////////////////////////////////////////////////////////////////////

    /// Advances the clock by the duration and records one history cycle.
    pub fn step_for_duration(&mut self, duration: f64) {
        self.clock.advance(duration);
        self.record_cycle();
    }

    /// Advances the clock by the configured cycle duration and records one history cycle.
    pub fn step(&mut self) {
        self.step_for_duration(self.config.cycle_duration);
    }

    pub fn record_cycle(&mut self) {
        log_debug!(self.ctx, "recording cycle");
        self.recorder.record_cycle(&self.hosts, &self.vms, &self.cloudlets);
    }

    /// Scores the committed placement with the configured score calculator.
    pub fn score_current_placement(&self) -> HardSoftScore {
        let solution = HostVmSolution::new(
            self.hosts.iter().map(|host| HostSnapshot::of(&host.borrow())).collect(),
            Vec::new(),
        );
        self.calculator.calculate_score(&solution)
    }

    pub fn report(&self) -> PlacementReport {
        PlacementReport::build(self.time(), &self.hosts, &self.vms)
    }

    pub fn save_host_history(&self, path: &str) -> Result<(), std::io::Error> {
        self.recorder.save_host_history(path, &self.hosts)
    }

    pub fn save_vm_history(&self, path: &str) -> Result<(), std::io::Error> {
        self.recorder.save_vm_history(path, &self.vms)
    }

    pub fn save_cloudlet_history(&self, path: &str) -> Result<(), std::io::Error> {
        self.recorder.save_cloudlet_history(path, &self.cloudlets)
    }

    ////////////////////////////////////////////////////////////////////////////
    // Accessors
    ////////////////////////////////////////////////////////////////////////////

    pub fn time(&self) -> f64 {
        self.ctx.time()
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn hosts(&self) -> &[Rc<RefCell<Host>>] {
        &self.hosts
    }

    pub fn host(&self, id: u32) -> Option<Rc<RefCell<Host>>> {
        self.policy.host_by_id(id)
    }

    pub fn vms(&self) -> &[Rc<RefCell<VirtualMachine>>] {
        &self.vms
    }

    pub fn cloudlets(&self) -> &[Rc<RefCell<Cloudlet>>] {
        &self.cloudlets
    }

    pub fn policy(&self) -> &VmAllocationPolicy {
        &self.policy
    }

    pub fn recorder(&self) -> &HistoryRecorder {
        &self.recorder
    }

    pub fn context(&self) -> &PlacementContext {
        &self.ctx
    }
}
