//! Simulation configuration.

pub mod filters;
pub mod options;
pub mod sim_config;
