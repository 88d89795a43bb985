//! Search procedures which can be plugged into the placement policy.

pub mod construction_heuristic;
pub mod local_search;

use crate::core::config::options::{option_or, parse_config_value, parse_options};
use crate::core::error::ConfigError;
use crate::core::solver::{HostVmSolver, IdentitySolver, VmCloudletSolver};
use crate::extensions::construction_heuristic::FirstFitDecreasing;
use crate::extensions::local_search::HillClimbing;

const DEFAULT_STEPS: u64 = 1000;
const DEFAULT_SEED: u64 = 123;

/// Creates VM placement solver from a config string, e.g. `HillClimbing[steps=1000,seed=42]`.
pub fn solver_resolver(config_str: &str) -> Result<Box<dyn HostVmSolver>, ConfigError> {
    let (name, options) = parse_config_value(config_str);
    let options = parse_options(&options.unwrap_or_default());
    match name.as_str() {
        "Identity" => Ok(Box::new(IdentitySolver)),
        "FirstFitDecreasing" => Ok(Box::new(FirstFitDecreasing::new())),
        "HillClimbing" => Ok(Box::new(HillClimbing::new(
            option_or(&options, "steps", DEFAULT_STEPS, config_str)?,
            option_or(&options, "seed", DEFAULT_SEED, config_str)?,
        ))),
        _ => Err(ConfigError::UnknownSolver(config_str.to_string())),
    }
}

/// Creates cloudlet binding solver from a config string.
pub fn cloudlet_solver_resolver(config_str: &str) -> Result<Box<dyn VmCloudletSolver>, ConfigError> {
    let (name, options) = parse_config_value(config_str);
    let options = parse_options(&options.unwrap_or_default());
    match name.as_str() {
        "Identity" => Ok(Box::new(IdentitySolver)),
        "FirstFitDecreasing" => Ok(Box::new(FirstFitDecreasing::new())),
        "HillClimbing" => Ok(Box::new(HillClimbing::new(
            option_or(&options, "steps", DEFAULT_STEPS, config_str)?,
            option_or(&options, "seed", DEFAULT_SEED, config_str)?,
        ))),
        _ => Err(ConfigError::UnknownSolver(config_str.to_string())),
    }
}
