//! Configuration errors.
//!
//! Resource exhaustion is not an error (see [`AllocationVerdict`](crate::core::common::AllocationVerdict)) and broken
//! ledger invariants abort via panic, so this type only covers problems detected before the first placement cycle.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("can't read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("can't parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unknown filter: {0}")]
    UnknownFilter(String),

    #[error("malformed filter line: {0}")]
    MalformedFilter(String),

    #[error("invalid threshold {threshold} for filter {filter}")]
    InvalidFilterThreshold { filter: String, threshold: i64 },

    #[error("cost parameters are required by {0}")]
    MissingCostParameters(String),

    #[error("unknown power model: {0}")]
    UnknownPowerModel(String),

    #[error("unknown VM scheduler: {0}")]
    UnknownVmScheduler(String),

    #[error("unknown solver: {0}")]
    UnknownSolver(String),

    #[error("invalid option {option} in {value}")]
    InvalidOption { option: String, value: String },

    #[error("invalid host config: {0}")]
    InvalidHost(String),
}
