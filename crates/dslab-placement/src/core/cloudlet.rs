//! Cloudlets (tasks) executed by virtual machines.

use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::core::history::CloudletHistory;
use crate::core::utilization_model::{FullUtilizationModel, UtilizationModel};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CloudletStatus {
    Queued,
    Running,
    Success,
    Failed,
}

impl Display for CloudletStatus {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            CloudletStatus::Queued => write!(f, "queued"),
            CloudletStatus::Running => write!(f, "running"),
            CloudletStatus::Success => write!(f, "success"),
            CloudletStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A unit of computational work bound to a VM of the same owner.
#[derive(Clone)]
pub struct Cloudlet {
    pub id: u32,
    pub owner_id: u32,
    /// Length in millions of instructions.
    pub length: u64,
    pub cores: u32,
    pub input_size: u64,
    pub output_size: u64,
    cpu_utilization: Box<dyn UtilizationModel>,
    ram_utilization: Box<dyn UtilizationModel>,
    bw_utilization: Box<dyn UtilizationModel>,
    vm: Option<u32>,
    status: CloudletStatus,
    start_time: Option<f64>,
    finish_time: Option<f64>,
    history: CloudletHistory,
}

impl Cloudlet {
    /// Creates cloudlet which fully utilizes every VM resource.
    pub fn new(id: u32, owner_id: u32, length: u64, cores: u32, input_size: u64, output_size: u64) -> Self {
        Self {
            id,
            owner_id,
            length,
            cores,
            input_size,
            output_size,
            cpu_utilization: Box::new(FullUtilizationModel),
            ram_utilization: Box::new(FullUtilizationModel),
            bw_utilization: Box::new(FullUtilizationModel),
            vm: None,
            status: CloudletStatus::Queued,
            start_time: None,
            finish_time: None,
            history: CloudletHistory::default(),
        }
    }

    pub fn with_utilization_models(
        mut self,
        cpu: Box<dyn UtilizationModel>,
        ram: Box<dyn UtilizationModel>,
        bw: Box<dyn UtilizationModel>,
    ) -> Self {
        self.cpu_utilization = cpu;
        self.ram_utilization = ram;
        self.bw_utilization = bw;
        self
    }

    pub fn cpu_utilization(&self, time: f64) -> f64 {
        self.cpu_utilization.get_utilization(time)
    }

    pub fn ram_utilization(&self, time: f64) -> f64 {
        self.ram_utilization.get_utilization(time)
    }

    pub fn bw_utilization(&self, time: f64) -> f64 {
        self.bw_utilization.get_utilization(time)
    }

    /// Returns ID of the VM the cloudlet is bound to.
    pub fn vm(&self) -> Option<u32> {
        self.vm
    }

    pub fn status(&self) -> CloudletStatus {
        self.status
    }

    pub fn start_time(&self) -> Option<f64> {
        self.start_time
    }

    pub fn finish_time(&self) -> Option<f64> {
        self.finish_time
    }

    pub fn history(&self) -> &CloudletHistory {
        &self.history
    }

    /// Marks the cloudlet as started by the execution engine.
    pub fn mark_running(&mut self, time: f64) {
        self.status = CloudletStatus::Running;
        self.start_time = Some(time);
    }

    /// Marks the cloudlet as completed by the execution engine.
    pub fn mark_finished(&mut self, time: f64, success: bool) {
        self.status = if success {
            CloudletStatus::Success
        } else {
            CloudletStatus::Failed
        };
        self.finish_time = Some(time);
    }

    pub(crate) fn bind(&mut self, vm_id: Option<u32>) {
        self.vm = vm_id;
    }

    pub(crate) fn history_mut(&mut self) -> &mut CloudletHistory {
        &mut self.history
    }
}
