//! Scoring configuration: scorer selection, cost parameters and custom filters.

use serde::{Deserialize, Serialize};

use crate::core::error::ConfigError;

/// Threshold value which disables a filter.
pub const DISABLED: i64 = -1;

/// Points added or subtracted by a single filter check.
pub const FILTER_POINTS: i64 = 10;

/// Monetary cost of a unit of each host resource.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CostConfig {
    /// Cost of a used MIPS.
    pub cpu: f64,
    /// Cost of a used RAM unit.
    pub ram: f64,
    /// Cost of a used storage unit.
    pub storage: f64,
    /// Cost of a used BW unit.
    pub bw: f64,
}

/// Score calculator used to evaluate VM placements.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScoringConfig {
    #[default]
    Binary,
    MinPower,
    Simple,
    Custom { filters: CustomFilters },
}

/// Whether filter points go to the hard or to the soft score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    Hard,
    #[default]
    Soft,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterSetting {
    #[serde(default = "disabled")]
    pub threshold: i64,
    #[serde(default)]
    pub mode: FilterMode,
}

fn disabled() -> i64 {
    DISABLED
}

impl Default for FilterSetting {
    fn default() -> Self {
        Self {
            threshold: DISABLED,
            mode: FilterMode::Soft,
        }
    }
}

impl FilterSetting {
    pub fn new(threshold: i64, mode: FilterMode) -> Self {
        Self { threshold, mode }
    }

    /// Returns the threshold if the filter is enabled.
    pub fn enabled(&self) -> Option<i64> {
        (self.threshold > DISABLED).then_some(self.threshold)
    }

    /// Returns the threshold if it is a valid percentage.
    pub fn enabled_percent(&self) -> Option<i64> {
        (0..=100).contains(&self.threshold).then_some(self.threshold)
    }
}

/// Filters of the custom score calculator. Every recognized filter is a field, so unknown names fail at load time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CustomFilters {
    /// Maximum total cost of used hosts.
    pub max_cost: FilterSetting,
    /// Minimum number of used hosts.
    pub min_host: FilterSetting,
    /// Maximum number of used hosts.
    pub max_host: FilterSetting,
    /// Maximum total power of all hosts.
    pub max_pow: FilterSetting,
    /// Per-host maximum utilization percentages.
    pub max_cpu: FilterSetting,
    pub max_ram: FilterSetting,
    pub max_stor: FilterSetting,
    pub max_bw: FilterSetting,
    /// Per-host minimum utilization percentages.
    pub min_cpu: FilterSetting,
    pub min_ram: FilterSetting,
    pub min_stor: FilterSetting,
    pub min_bw: FilterSetting,
}

impl CustomFilters {
    /// Parses filters written one per line as `[name](threshold){hard|soft}`. Empty lines and lines starting
    /// with `#` are skipped.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut filters = Self::default();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (name, threshold, mode) = parse_filter_line(line)?;
            *filters.setting_mut(&name)? = FilterSetting::new(threshold, mode);
        }
        filters.validate()?;
        Ok(filters)
    }

    /// Rejects thresholds below the disabled sentinel.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, setting) in self.settings() {
            if setting.threshold < DISABLED {
                return Err(ConfigError::InvalidFilterThreshold {
                    filter: name.to_string(),
                    threshold: setting.threshold,
                });
            }
        }
        Ok(())
    }

    /// Returns all filters with their names.
    pub fn settings(&self) -> [(&'static str, FilterSetting); 12] {
        [
            ("max_cost", self.max_cost),
            ("min_host", self.min_host),
            ("max_host", self.max_host),
            ("max_pow", self.max_pow),
            ("max_cpu", self.max_cpu),
            ("max_ram", self.max_ram),
            ("max_stor", self.max_stor),
            ("max_bw", self.max_bw),
            ("min_cpu", self.min_cpu),
            ("min_ram", self.min_ram),
            ("min_stor", self.min_stor),
            ("min_bw", self.min_bw),
        ]
    }

    fn setting_mut(&mut self, name: &str) -> Result<&mut FilterSetting, ConfigError> {
        match name {
            "max_cost" => Ok(&mut self.max_cost),
            "min_host" => Ok(&mut self.min_host),
            "max_host" => Ok(&mut self.max_host),
            "max_pow" => Ok(&mut self.max_pow),
            "max_cpu" => Ok(&mut self.max_cpu),
            "max_ram" => Ok(&mut self.max_ram),
            "max_stor" => Ok(&mut self.max_stor),
            "max_bw" => Ok(&mut self.max_bw),
            "min_cpu" => Ok(&mut self.min_cpu),
            "min_ram" => Ok(&mut self.min_ram),
            "min_stor" => Ok(&mut self.min_stor),
            "min_bw" => Ok(&mut self.min_bw),
            _ => Err(ConfigError::UnknownFilter(name.to_string())),
        }
    }
}

fn parse_filter_line(line: &str) -> Result<(String, i64, FilterMode), ConfigError> {
    let malformed = || ConfigError::MalformedFilter(line.to_string());
    let rest = line.strip_prefix('[').ok_or_else(malformed)?;
    let (name, rest) = rest.split_once(']').ok_or_else(malformed)?;
    let rest = rest.strip_prefix('(').ok_or_else(malformed)?;
    let (threshold, rest) = rest.split_once(')').ok_or_else(malformed)?;
    let rest = rest.strip_prefix('{').ok_or_else(malformed)?;
    let (mode, rest) = rest.split_once('}').ok_or_else(malformed)?;
    if !rest.trim().is_empty() {
        return Err(malformed());
    }
    let threshold = threshold.trim().parse::<i64>().map_err(|_| malformed())?;
    let mode = match mode.trim() {
        "hard" => FilterMode::Hard,
        "soft" => FilterMode::Soft,
        _ => return Err(malformed()),
    };
    Ok((name.trim().to_string(), threshold, mode))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filter_lines() {
        let filters = CustomFilters::parse("[max_cpu](80){hard}\n\n# comment\n[min_host](2){soft}\n").unwrap();
        assert_eq!(filters.max_cpu, FilterSetting::new(80, FilterMode::Hard));
        assert_eq!(filters.min_host, FilterSetting::new(2, FilterMode::Soft));
        assert_eq!(filters.max_cost.enabled(), None);
    }

    #[test]
    fn test_parse_rejects_bad_lines() {
        assert!(matches!(
            CustomFilters::parse("[max_cpux](80){hard}"),
            Err(ConfigError::UnknownFilter(_))
        ));
        assert!(matches!(
            CustomFilters::parse("[max_cpu](eighty){hard}"),
            Err(ConfigError::MalformedFilter(_))
        ));
        assert!(matches!(
            CustomFilters::parse("[max_cpu](80){medium}"),
            Err(ConfigError::MalformedFilter(_))
        ));
        assert!(matches!(
            CustomFilters::parse("[max_cpu](-5){soft}"),
            Err(ConfigError::InvalidFilterThreshold { .. })
        ));
    }

    #[test]
    fn test_percent_filters_outside_range_are_disabled() {
        assert_eq!(FilterSetting::new(120, FilterMode::Soft).enabled_percent(), None);
        assert_eq!(FilterSetting::new(100, FilterMode::Soft).enabled_percent(), Some(100));
    }
}
