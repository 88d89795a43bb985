//! Simulation configuration.

use serde::{Deserialize, Serialize};

use crate::core::config::filters::{CostConfig, ScoringConfig};
use crate::core::error::ConfigError;
use crate::core::host::UtilizationWeights;
use crate::core::power_model::power_model_resolver;
use crate::core::vm_scheduler::vm_scheduler_resolver;

/// Holds raw simulation config parsed from YAML file.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
struct RawSimulationConfig {
    pub cycle_duration: Option<f64>,
    pub use_solver: Option<bool>,
    pub costs: Option<CostConfig>,
    pub scoring: Option<ScoringConfig>,
    pub solver: Option<String>,
    pub cloudlet_solver: Option<String>,
    pub hosts: Option<Vec<HostConfig>>,
    pub vms: Option<Vec<VmConfig>>,
    pub cloudlets: Option<Vec<CloudletConfig>>,
}

/// Holds configuration of a set of identical hosts.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct HostConfig {
    /// Host name prefix.
    /// Full name is produced by appending host ID to the prefix.
    #[serde(default = "default_host_prefix")]
    pub name_prefix: String,
    /// Number of such hosts.
    #[serde(default = "one")]
    pub count: u32,
    /// Number of PEs.
    pub pes: u32,
    /// MIPS rating of each PE.
    pub mips_per_pe: f64,
    /// RAM capacity.
    pub ram: u64,
    /// Bandwidth capacity.
    pub bw: u64,
    /// Storage capacity.
    pub storage: u64,
    /// VM scheduler, `TimeShared` or `SpaceShared`.
    #[serde(default = "default_vm_scheduler")]
    pub vm_scheduler: String,
    /// Power model config string, e.g. `Linear[min_power=20,max_power=120]`.
    pub power_model: String,
    /// Weights of CPU, RAM and BW utilization used for power lookup.
    #[serde(default)]
    pub utilization_weights: UtilizationWeights,
}

/// Holds configuration of a set of identical VMs. VM IDs are assigned sequentially per owner.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct VmConfig {
    #[serde(default)]
    pub owner_id: u32,
    #[serde(default = "one")]
    pub count: u32,
    /// Requested MIPS per core.
    pub mips: f64,
    pub cores: u32,
    pub ram: u64,
    pub bw: u64,
    /// Disk size.
    pub size: u64,
}

/// Holds configuration of a set of identical cloudlets.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct CloudletConfig {
    #[serde(default)]
    pub owner_id: u32,
    #[serde(default = "one")]
    pub count: u32,
    /// Length in millions of instructions.
    pub length: u64,
    #[serde(default = "one")]
    pub cores: u32,
    #[serde(default)]
    pub input_size: u64,
    #[serde(default)]
    pub output_size: u64,
    /// Constant CPU utilization, full utilization if absent.
    pub cpu_utilization: Option<f64>,
}

fn one() -> u32 {
    1
}

fn default_host_prefix() -> String {
    "host".to_string()
}

fn default_vm_scheduler() -> String {
    "TimeShared".to_string()
}

/// Represents simulation configuration.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct SimulationConfig {
    /// Duration of a placement cycle used by the driver to advance the clock.
    pub cycle_duration: f64,
    /// Whether batches of VMs are placed by the solver (otherwise by the greedy algorithm).
    pub use_solver: bool,
    /// Resource costs, required by cost-aware scorers.
    pub costs: Option<CostConfig>,
    /// Score calculator used by the solver.
    pub scoring: ScoringConfig,
    /// Solver config string, e.g. `HillClimbing[steps=1000,seed=42]`, resolved by the simulation.
    pub solver: String,
    /// Cloudlet binding solver config string.
    pub cloudlet_solver: String,
    /// Configurations of hosts.
    pub hosts: Vec<HostConfig>,
    /// Configurations of VMs.
    pub vms: Vec<VmConfig>,
    /// Configurations of cloudlets.
    pub cloudlets: Vec<CloudletConfig>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            cycle_duration: 1.,
            use_solver: true,
            costs: None,
            scoring: ScoringConfig::default(),
            solver: "FirstFitDecreasing".to_string(),
            cloudlet_solver: "FirstFitDecreasing".to_string(),
            hosts: Vec::new(),
            vms: Vec::new(),
            cloudlets: Vec::new(),
        }
    }
}

impl SimulationConfig {
    /// Creates simulation config by reading parameter values from YAML file
    /// (uses default values if some parameters are absent).
    pub fn from_file(file_name: &str) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(file_name).map_err(|source| ConfigError::Io {
            path: file_name.to_string(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }

    /// Creates simulation config from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let raw: RawSimulationConfig = serde_yaml::from_str(yaml)?;
        let default = Self::default();
        Ok(Self {
            cycle_duration: raw.cycle_duration.unwrap_or(default.cycle_duration),
            use_solver: raw.use_solver.unwrap_or(default.use_solver),
            costs: raw.costs,
            scoring: raw.scoring.unwrap_or(default.scoring),
            solver: raw.solver.unwrap_or(default.solver),
            cloudlet_solver: raw.cloudlet_solver.unwrap_or(default.cloudlet_solver),
            hosts: raw.hosts.unwrap_or_default(),
            vms: raw.vms.unwrap_or_default(),
            cloudlets: raw.cloudlets.unwrap_or_default(),
        })
    }

    /// Checks scenario parameters, host models and scoring settings. Solver names are resolved when the
    /// simulation is created.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cycle_duration <= 0. {
            return Err(ConfigError::InvalidOption {
                option: "cycle_duration".to_string(),
                value: self.cycle_duration.to_string(),
            });
        }
        match &self.scoring {
            ScoringConfig::Simple if self.costs.is_none() => {
                return Err(ConfigError::MissingCostParameters("Simple scoring".to_string()));
            }
            ScoringConfig::Custom { filters } => {
                filters.validate()?;
                if filters.max_cost.enabled().is_some() && self.costs.is_none() {
                    return Err(ConfigError::MissingCostParameters("max_cost filter".to_string()));
                }
            }
            _ => {}
        }
        for host in &self.hosts {
            if host.pes == 0 || host.mips_per_pe <= 0. {
                return Err(ConfigError::InvalidHost(format!(
                    "{}: host needs at least one PE with positive MIPS",
                    host.name_prefix
                )));
            }
            power_model_resolver(&host.power_model)?;
            vm_scheduler_resolver(&host.vm_scheduler, Vec::new())?;
        }
        Ok(())
    }

    /// Returns total hosts count.
    pub fn number_of_hosts(&self) -> u32 {
        self.hosts.iter().map(|host| host.count).sum()
    }
}
