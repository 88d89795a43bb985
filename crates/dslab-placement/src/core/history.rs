//! Time series of host usage, VM residency and cloudlet binding, plus their export.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::rc::Rc;

use serde::Serialize;

use crate::core::cloudlet::Cloudlet;
use crate::core::common::{id_or_sentinel, UNPLACED};
use crate::core::context::PlacementContext;
use crate::core::host::Host;
use crate::core::vm::VirtualMachine;
use crate::log_debug;

/// Resource usage committed on a host at some moment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct HostUsageSample {
    pub time: f64,
    pub mips: f64,
    pub ram: u64,
    pub bw: u64,
    pub storage: u64,
    pub power: f64,
}

/// Append-only usage series of a host, one sample per placement cycle.
#[derive(Clone, Debug, Default)]
pub struct HostHistory {
    samples: Vec<HostUsageSample>,
}

impl HostHistory {
    pub fn samples(&self) -> &[HostUsageSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn times(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.time).collect()
    }

    pub fn mips(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.mips).collect()
    }

    pub fn ram(&self) -> Vec<u64> {
        self.samples.iter().map(|s| s.ram).collect()
    }

    pub fn bw(&self) -> Vec<u64> {
        self.samples.iter().map(|s| s.bw).collect()
    }

    pub fn storage(&self) -> Vec<u64> {
        self.samples.iter().map(|s| s.storage).collect()
    }

    pub fn power(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.power).collect()
    }

    pub(crate) fn push(&mut self, sample: HostUsageSample) {
        self.samples.push(sample);
    }
}

/// Result of a placement attempt. `host` is `None` if the attempt failed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PlacementRecord {
    pub host: Option<u32>,
    pub time: f64,
    pub power: Option<f64>,
}

/// Interval the VM spent on a host (or unplaced) between two cycles.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ResidencyInterval {
    pub host: Option<u32>,
    pub duration: f64,
    pub power: Option<f64>,
}

#[derive(Clone, Debug, Default)]
pub struct VmHistory {
    placements: Vec<PlacementRecord>,
    intervals: Vec<ResidencyInterval>,
}

impl VmHistory {
    pub fn placements(&self) -> &[PlacementRecord] {
        &self.placements
    }

    pub fn intervals(&self) -> &[ResidencyInterval] {
        &self.intervals
    }

    pub(crate) fn add_placement(&mut self, record: PlacementRecord) {
        self.placements.push(record);
    }

    pub(crate) fn add_interval(&mut self, interval: ResidencyInterval) {
        self.intervals.push(interval);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BindingInterval {
    pub vm: Option<u32>,
    pub duration: f64,
}

#[derive(Clone, Debug, Default)]
pub struct CloudletHistory {
    intervals: Vec<BindingInterval>,
}

impl CloudletHistory {
    pub fn intervals(&self) -> &[BindingInterval] {
        &self.intervals
    }

    pub(crate) fn add_interval(&mut self, interval: BindingInterval) {
        self.intervals.push(interval);
    }
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Serialize)]
struct HostHistoryRow {
    host_id: u32,
    time: f64,
    mips: f64,
    ram: u64,
    bw: u64,
    storage: u64,
    power: f64,
}

#[derive(Serialize)]
struct VmHistoryRow {
    vm_id: u32,
    owner_id: u32,
    host_id: i64,
    duration: f64,
    power: f64,
}

#[derive(Serialize)]
struct CloudletHistoryRow {
    cloudlet_id: u32,
    owner_id: u32,
    vm_id: i64,
    duration: f64,
}

/// Appends one sample per placement cycle to every host, VM and cloudlet series.
pub struct HistoryRecorder {
    last_cycle_time: f64,
    cycles: u64,
    ctx: PlacementContext,
}

impl HistoryRecorder {
    pub fn new(ctx: PlacementContext) -> Self {
        Self {
            last_cycle_time: ctx.time(),
            cycles: 0,
            ctx,
        }
    }

    /// Returns the number of recorded cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Records one cycle ending at the current time.
    pub fn record_cycle(
        &mut self,
        hosts: &[Rc<RefCell<Host>>],
        vms: &[Rc<RefCell<VirtualMachine>>],
        cloudlets: &[Rc<RefCell<Cloudlet>>],
    ) {
        let time = self.ctx.time();
        let duration = time - self.last_cycle_time;

        let mut host_index = HashMap::new();
        for host in hosts {
            let id = host.borrow().id;
            host.borrow_mut().record_usage(time);
            host_index.insert(id, host.clone());
        }

        for vm in vms {
            let host_id = vm.borrow().host();
            let power = host_id
                .and_then(|id| host_index.get(&id))
                .map(|host| host.borrow().vm_power(&vm.borrow()));
            vm.borrow_mut().history_mut().add_interval(ResidencyInterval {
                host: host_id,
                duration,
                power,
            });
        }

        for cloudlet in cloudlets {
            let vm_id = cloudlet.borrow().vm();
            cloudlet
                .borrow_mut()
                .history_mut()
                .add_interval(BindingInterval { vm: vm_id, duration });
        }

        self.last_cycle_time = time;
        self.cycles += 1;
        log_debug!(
            self.ctx,
            "recorded cycle {}: {} hosts, {} vms, {} cloudlets",
            self.cycles,
            hosts.len(),
            vms.len(),
            cloudlets.len()
        );
    }

    /// Saves usage series of all hosts to CSV file.
    pub fn save_host_history(&self, path: &str, hosts: &[Rc<RefCell<Host>>]) -> Result<(), std::io::Error> {
        let mut wtr = csv::Writer::from_writer(File::create(path)?);
        for host in hosts {
            let host = host.borrow();
            for sample in host.history().samples() {
                wtr.serialize(HostHistoryRow {
                    host_id: host.id,
                    time: sample.time,
                    mips: sample.mips,
                    ram: sample.ram,
                    bw: sample.bw,
                    storage: sample.storage,
                    power: sample.power,
                })?;
            }
        }
        wtr.flush()?;
        Ok(())
    }

    /// Saves residency series of all VMs to CSV file. Unplaced intervals have host and power `-1`.
    pub fn save_vm_history(&self, path: &str, vms: &[Rc<RefCell<VirtualMachine>>]) -> Result<(), std::io::Error> {
        let mut wtr = csv::Writer::from_writer(File::create(path)?);
        for vm in vms {
            let vm = vm.borrow();
            for interval in vm.history().intervals() {
                wtr.serialize(VmHistoryRow {
                    vm_id: vm.id,
                    owner_id: vm.owner_id,
                    host_id: id_or_sentinel(interval.host),
                    duration: interval.duration,
                    power: interval.power.unwrap_or(UNPLACED as f64),
                })?;
            }
        }
        wtr.flush()?;
        Ok(())
    }

    /// Saves binding series of all cloudlets to CSV file. Unbound intervals have VM `-1`.
    pub fn save_cloudlet_history(
        &self,
        path: &str,
        cloudlets: &[Rc<RefCell<Cloudlet>>],
    ) -> Result<(), std::io::Error> {
        let mut wtr = csv::Writer::from_writer(File::create(path)?);
        for cloudlet in cloudlets {
            let cloudlet = cloudlet.borrow();
            for interval in cloudlet.history().intervals() {
                wtr.serialize(CloudletHistoryRow {
                    cloudlet_id: cloudlet.id,
                    owner_id: cloudlet.owner_id,
                    vm_id: id_or_sentinel(interval.vm),
                    duration: interval.duration,
                })?;
            }
        }
        wtr.flush()?;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Debug, Serialize)]
pub struct VmPlacementEntry {
    pub vm_id: u32,
    pub owner_id: u32,
    pub host_id: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct HostReport {
    pub id: u32,
    pub pes: u32,
    pub free_pes: u32,
    pub total_mips: f64,
    pub used_mips: f64,
    pub ram_used: u64,
    pub ram_capacity: u64,
    pub bw_used: u64,
    pub bw_capacity: u64,
    pub storage_used: u64,
    pub storage_capacity: u64,
    pub power: f64,
    pub failed: bool,
    pub vms: Vec<String>,
}

/// Snapshot of the current VM to host table and host usage for external printing.
#[derive(Clone, Debug, Serialize)]
pub struct PlacementReport {
    pub time: f64,
    pub placements: Vec<VmPlacementEntry>,
    pub hosts: Vec<HostReport>,
}

impl PlacementReport {
    pub fn build(time: f64, hosts: &[Rc<RefCell<Host>>], vms: &[Rc<RefCell<VirtualMachine>>]) -> Self {
        let placements = vms
            .iter()
            .map(|vm| {
                let vm = vm.borrow();
                VmPlacementEntry {
                    vm_id: vm.id,
                    owner_id: vm.owner_id,
                    host_id: id_or_sentinel(vm.host()),
                }
            })
            .collect();
        let hosts = hosts
            .iter()
            .map(|host| {
                let host = host.borrow();
                HostReport {
                    id: host.id,
                    pes: host.number_of_pes(),
                    free_pes: host.number_of_free_pes(),
                    total_mips: host.total_mips(),
                    used_mips: host.used_mips(),
                    ram_used: host.ram_used(),
                    ram_capacity: host.ram_capacity(),
                    bw_used: host.bw_used(),
                    bw_capacity: host.bw_capacity(),
                    storage_used: host.storage_used(),
                    storage_capacity: host.total_storage(),
                    power: host.power(),
                    failed: host.is_failed(),
                    vms: host.vms().iter().map(|vm| vm.borrow().uid()).collect(),
                }
            })
            .collect();
        Self { time, placements, hosts }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn save(&self, path: &str) -> Result<(), std::io::Error> {
        serde_json::to_writer_pretty(File::create(path)?, self)?;
        Ok(())
    }
}
