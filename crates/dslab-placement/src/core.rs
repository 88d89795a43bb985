//! Placement and capacity-accounting core.

pub mod clock;
pub mod cloudlet;
pub mod common;
pub mod config;
pub mod context;
pub mod error;
pub mod history;
pub mod host;
pub mod pe;
pub mod placement_policy;
pub mod power_model;
pub mod provisioner;
pub mod scoring;
pub mod solution;
pub mod solver;
pub mod utilization_model;
pub mod vm;
pub mod vm_scheduler;
