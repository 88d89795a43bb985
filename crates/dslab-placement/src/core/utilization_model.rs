//! Resource utilization models of cloudlets.

use dyn_clone::{clone_trait_object, DynClone};

/// Defines which fraction of the VM resource a cloudlet uses at the given time.
pub trait UtilizationModel: DynClone {
    fn get_utilization(&self, time: f64) -> f64;
}

clone_trait_object!(UtilizationModel);

/// The cloudlet always uses the whole resource.
#[derive(Clone)]
pub struct FullUtilizationModel;

impl UtilizationModel for FullUtilizationModel {
    fn get_utilization(&self, _time: f64) -> f64 {
        1.
    }
}

/// The simplest non-trivial model, the constant utilization.
#[derive(Clone)]
pub struct ConstUtilizationModel {
    utilization: f64,
}

impl ConstUtilizationModel {
    pub fn new(utilization: f64) -> Self {
        Self { utilization }
    }
}

impl UtilizationModel for ConstUtilizationModel {
    fn get_utilization(&self, _time: f64) -> f64 {
        self.utilization
    }
}
