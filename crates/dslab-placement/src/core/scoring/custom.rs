//! Score calculator driven by configurable filters.

use crate::core::config::filters::{CostConfig, CustomFilters, FilterMode, FilterSetting, FILTER_POINTS};
use crate::core::error::ConfigError;
use crate::core::scoring::{HostUsage, ScoreCalculator, UsageSnapshot};
use crate::core::solution::{HardSoftScore, HostSnapshot, HostVmSolution};

type Utilization = fn(&HostUsage, &HostSnapshot) -> f64;

/// Hard score is minus the number of hosts with any exceeded resource, soft score is the number of used hosts.
/// On top of that every enabled filter adds its points to the hard or soft score according to its mode:
///
/// - `max_cost`: +10 if the cost of used hosts does not exceed the threshold;
/// - `min_host` / `max_host`: +10 if the number of used hosts is within the bound;
/// - `max_pow`: +10 if the total power of all hosts does not exceed the threshold, -10 otherwise;
/// - `max_*` / `min_*` utilization (percent): for every host, +10 if its utilization is within the bound,
///   -10 otherwise.
pub struct CustomScoreCalculator {
    filters: CustomFilters,
    costs: Option<CostConfig>,
}

impl CustomScoreCalculator {
    /// Fails if the filters are invalid or if the cost filter is enabled without cost parameters.
    pub fn new(filters: CustomFilters, costs: Option<CostConfig>) -> Result<Self, ConfigError> {
        filters.validate()?;
        if filters.max_cost.enabled().is_some() && costs.is_none() {
            return Err(ConfigError::MissingCostParameters("max_cost filter".to_string()));
        }
        Ok(Self { filters, costs })
    }

    fn utilization_filters(&self) -> [(FilterSetting, Utilization, bool); 8] {
        [
            (self.filters.max_cpu, HostUsage::cpu_utilization, true),
            (self.filters.max_ram, HostUsage::ram_utilization, true),
            (self.filters.max_stor, HostUsage::storage_utilization, true),
            (self.filters.max_bw, HostUsage::bw_utilization, true),
            (self.filters.min_cpu, HostUsage::cpu_utilization, false),
            (self.filters.min_ram, HostUsage::ram_utilization, false),
            (self.filters.min_stor, HostUsage::storage_utilization, false),
            (self.filters.min_bw, HostUsage::bw_utilization, false),
        ]
    }
}

#[derive(Default)]
struct Points {
    hard: i64,
    soft: i64,
}

impl Points {
    fn add(&mut self, mode: FilterMode, points: i64) {
        match mode {
            FilterMode::Hard => self.hard += points,
            FilterMode::Soft => self.soft += points,
        }
    }
}

impl ScoreCalculator for CustomScoreCalculator {
    fn calculate_score(&self, solution: &HostVmSolution) -> HardSoftScore {
        let usage = UsageSnapshot::of(solution);
        let used_hosts = usage.used_hosts();
        let mut points = Points::default();

        if let (Some(max_cost), Some(costs)) = (self.filters.max_cost.enabled(), &self.costs) {
            if usage.cost(costs) <= max_cost as f64 {
                points.add(self.filters.max_cost.mode, FILTER_POINTS);
            }
        }
        if let Some(min_host) = self.filters.min_host.enabled() {
            if used_hosts >= min_host {
                points.add(self.filters.min_host.mode, FILTER_POINTS);
            }
        }
        if let Some(max_host) = self.filters.max_host.enabled() {
            if used_hosts <= max_host {
                points.add(self.filters.max_host.mode, FILTER_POINTS);
            }
        }
        if let Some(max_pow) = self.filters.max_pow.enabled() {
            let power: f64 = usage.iter(solution).map(|(host, usage)| usage.power(host)).sum();
            if power <= max_pow as f64 {
                points.add(self.filters.max_pow.mode, FILTER_POINTS);
            } else {
                points.add(self.filters.max_pow.mode, -FILTER_POINTS);
            }
        }
        for (setting, utilization, is_max) in self.utilization_filters() {
            let Some(threshold) = setting.enabled_percent() else {
                continue;
            };
            for (host, usage) in usage.iter(solution) {
                let percent = utilization(usage, host) * 100.;
                let violated = if is_max {
                    percent > threshold as f64
                } else {
                    percent < threshold as f64
                };
                points.add(setting.mode, if violated { -FILTER_POINTS } else { FILTER_POINTS });
            }
        }

        HardSoftScore::new(
            -usage.exceeded_hosts(solution) + points.hard,
            used_hosts + points.soft,
        )
    }
}
