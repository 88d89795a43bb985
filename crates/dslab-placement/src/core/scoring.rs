//! Score calculators evaluating candidate placements.
//!
//! Every calculator is a pure function of a solution snapshot: it starts from the usage already committed in
//! the ledger when the snapshot was taken and adds the usage of every VM the candidate assigns to a host.

pub mod binary;
pub mod custom;
pub mod min_power;
pub mod simple;
pub mod vm_cloudlet;

use crate::core::config::filters::{CostConfig, ScoringConfig};
use crate::core::error::ConfigError;
use crate::core::solution::{HardSoftScore, HostSnapshot, HostVmSolution, VmCloudletSolution};

pub use binary::BinaryScoreCalculator;
pub use custom::CustomScoreCalculator;
pub use min_power::MinPowerScoreCalculator;
pub use simple::SimpleScoreCalculator;
pub use vm_cloudlet::VmCloudletSimpleScoreCalculator;

const MIPS_TOLERANCE: f64 = 1e-9;

/// Evaluates a candidate assignment of VMs to hosts.
pub trait ScoreCalculator {
    fn calculate_score(&self, solution: &HostVmSolution) -> HardSoftScore;
}

/// Evaluates a candidate binding of cloudlets to VMs.
pub trait VmCloudletScoreCalculator {
    fn calculate_score(&self, solution: &VmCloudletSolution) -> HardSoftScore;
}

/// Creates VM placement score calculator. Cost-aware calculators require cost parameters.
pub fn score_calculator_resolver(
    scoring: &ScoringConfig,
    costs: Option<&CostConfig>,
) -> Result<Box<dyn ScoreCalculator>, ConfigError> {
    match scoring {
        ScoringConfig::Binary => Ok(Box::new(BinaryScoreCalculator)),
        ScoringConfig::MinPower => Ok(Box::new(MinPowerScoreCalculator)),
        ScoringConfig::Simple => {
            let costs = costs.ok_or_else(|| ConfigError::MissingCostParameters("Simple scoring".to_string()))?;
            Ok(Box::new(SimpleScoreCalculator::new(*costs)))
        }
        ScoringConfig::Custom { filters } => Ok(Box::new(CustomScoreCalculator::new(filters.clone(), costs.copied())?)),
    }
}

/// Resources used on a host by committed VMs plus VMs assigned by the candidate solution.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HostUsage {
    pub mips: f64,
    pub ram: u64,
    pub bw: u64,
    pub storage: u64,
    pub vms: usize,
}

impl HostUsage {
    /// Returns true if at least one VM is resident or assigned.
    pub fn is_used(&self) -> bool {
        self.vms > 0
    }

    pub fn mips_exceeded(&self, host: &HostSnapshot) -> bool {
        self.mips > host.total_mips + MIPS_TOLERANCE
    }

    pub fn ram_exceeded(&self, host: &HostSnapshot) -> bool {
        self.ram > host.ram_capacity
    }

    pub fn bw_exceeded(&self, host: &HostSnapshot) -> bool {
        self.bw > host.bw_capacity
    }

    pub fn storage_exceeded(&self, host: &HostSnapshot) -> bool {
        self.storage > host.storage_capacity
    }

    /// Returns true if any resource exceeds its capacity.
    pub fn exceeded(&self, host: &HostSnapshot) -> bool {
        self.mips_exceeded(host) || self.ram_exceeded(host) || self.bw_exceeded(host) || self.storage_exceeded(host)
    }

    /// Returns the sum of `capacity - used` over exceeded resources (zero or negative).
    pub fn shortfall(&self, host: &HostSnapshot) -> f64 {
        let mut shortfall = 0.;
        if self.mips_exceeded(host) {
            shortfall += host.total_mips - self.mips;
        }
        if self.ram_exceeded(host) {
            shortfall += host.ram_capacity as f64 - self.ram as f64;
        }
        if self.bw_exceeded(host) {
            shortfall += host.bw_capacity as f64 - self.bw as f64;
        }
        if self.storage_exceeded(host) {
            shortfall += host.storage_capacity as f64 - self.storage as f64;
        }
        shortfall
    }

    /// Utilizations are capped at 1 for exceeded resources.
    pub fn cpu_utilization(&self, host: &HostSnapshot) -> f64 {
        capped_ratio(self.mips, host.total_mips)
    }

    pub fn ram_utilization(&self, host: &HostSnapshot) -> f64 {
        capped_ratio(self.ram as f64, host.ram_capacity as f64)
    }

    pub fn bw_utilization(&self, host: &HostSnapshot) -> f64 {
        capped_ratio(self.bw as f64, host.bw_capacity as f64)
    }

    pub fn storage_utilization(&self, host: &HostSnapshot) -> f64 {
        capped_ratio(self.storage as f64, host.storage_capacity as f64)
    }

    /// Returns the power draw at the blended utilization of this usage.
    pub fn power(&self, host: &HostSnapshot) -> f64 {
        host.power(host.blend(
            self.cpu_utilization(host),
            self.ram_utilization(host),
            self.bw_utilization(host),
        ))
    }

    pub fn cost(&self, costs: &CostConfig) -> f64 {
        self.mips * costs.cpu + self.ram as f64 * costs.ram + self.bw as f64 * costs.bw + self.storage as f64 * costs.storage
    }
}

fn capped_ratio(value: f64, total: f64) -> f64 {
    if total > 0. {
        (value / total).min(1.)
    } else {
        0.
    }
}

/// Per-host usage implied by a candidate solution.
pub struct UsageSnapshot {
    pub hosts: Vec<HostUsage>,
}

impl UsageSnapshot {
    pub fn of(solution: &HostVmSolution) -> Self {
        let mut hosts: Vec<HostUsage> = solution
            .hosts
            .iter()
            .map(|host| HostUsage {
                mips: host.used_mips,
                ram: host.ram_used,
                bw: host.bw_used,
                storage: host.storage_used,
                vms: host.resident_vms,
            })
            .collect();
        for (vm, host_idx) in solution.vms.iter().zip(&solution.assignment) {
            if let Some(usage) = host_idx.and_then(|idx| hosts.get_mut(idx)) {
                usage.mips += vm.total_mips();
                usage.ram += vm.ram;
                usage.bw += vm.bw;
                usage.storage += vm.size;
                usage.vms += 1;
            }
        }
        Self { hosts }
    }

    /// Iterates over host snapshots paired with their usage.
    pub fn iter<'a>(&'a self, solution: &'a HostVmSolution) -> impl Iterator<Item = (&'a HostSnapshot, &'a HostUsage)> {
        solution.hosts.iter().zip(&self.hosts)
    }

    pub fn exceeded_hosts(&self, solution: &HostVmSolution) -> i64 {
        self.iter(solution).filter(|(host, usage)| usage.exceeded(host)).count() as i64
    }

    pub fn used_hosts(&self) -> i64 {
        self.hosts.iter().filter(|usage| usage.is_used()).count() as i64
    }

    /// Returns the total cost of used hosts.
    pub fn cost(&self, costs: &CostConfig) -> f64 {
        self.hosts
            .iter()
            .filter(|usage| usage.is_used())
            .map(|usage| usage.cost(costs))
            .sum()
    }
}
