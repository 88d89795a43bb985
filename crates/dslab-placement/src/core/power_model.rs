//! Host power consumption models.

use dyn_clone::{clone_trait_object, DynClone};

use crate::core::config::options::{option_or, parse_config_value, parse_options, required_option};
use crate::core::error::ConfigError;

/// Power model is a function, which computes the power consumption of a host based on its blended utilization.
pub trait PowerModel: DynClone {
    /// Returns the power consumption at the given utilization (0-1).
    fn get_power(&self, utilization: f64) -> f64;

    /// Returns the power consumption of an idle host.
    fn static_power(&self) -> f64 {
        self.get_power(0.)
    }

    /// Returns the power consumption of a fully loaded host.
    fn max_power(&self) -> f64 {
        self.get_power(1.)
    }
}

clone_trait_object!(PowerModel);

/// Creates power model from a config string, e.g. `Linear[min_power=20,max_power=120]`.
pub fn power_model_resolver(config_str: &str) -> Result<Box<dyn PowerModel>, ConfigError> {
    let (name, options) = parse_config_value(config_str);
    let options = parse_options(&options.unwrap_or_default());
    match name.as_str() {
        "Linear" => Ok(Box::new(LinearPowerModel::new(
            option_or(&options, "min_power", 0., config_str)?,
            required_option(&options, "max_power", config_str)?,
        ))),
        "LinearStatic" => Ok(Box::new(LinearPowerModel::from_static_percent(
            required_option(&options, "max_power", config_str)?,
            option_or(&options, "static_percent", 0.7, config_str)?,
        ))),
        "Square" => Ok(Box::new(SquarePowerModel::new(
            option_or(&options, "min_power", 0., config_str)?,
            required_option(&options, "max_power", config_str)?,
        ))),
        "Constant" => Ok(Box::new(ConstantPowerModel::new(required_option(
            &options, "power", config_str,
        )?))),
        _ => Err(ConfigError::UnknownPowerModel(config_str.to_string())),
    }
}

/// A power model based on linear interpolation between the idle and maximum power consumption values.
#[derive(Clone)]
pub struct LinearPowerModel {
    min_power: f64,
    max_power: f64,
    factor: f64,
}

impl LinearPowerModel {
    /// Creates a linear power model.
    ///
    /// * `min_power` - The power consumption in Watts at 0% utilization.
    /// * `max_power` - The power consumption in Watts at 100% utilization.
    pub fn new(min_power: f64, max_power: f64) -> Self {
        Self {
            min_power,
            max_power,
            factor: max_power - min_power,
        }
    }

    /// Creates a linear power model whose idle power is the given fraction of the maximum.
    pub fn from_static_percent(max_power: f64, static_percent: f64) -> Self {
        Self::new(max_power * static_percent, max_power)
    }
}

impl PowerModel for LinearPowerModel {
    fn get_power(&self, utilization: f64) -> f64 {
        self.min_power + self.factor * utilization
    }

    fn static_power(&self) -> f64 {
        self.min_power
    }

    fn max_power(&self) -> f64 {
        self.max_power
    }
}

/// A power model based on square interpolation between the idle and maximum power consumption values.
#[derive(Clone)]
pub struct SquarePowerModel {
    min_power: f64,
    factor: f64,
}

impl SquarePowerModel {
    pub fn new(min_power: f64, max_power: f64) -> Self {
        Self {
            min_power,
            factor: max_power - min_power,
        }
    }
}

impl PowerModel for SquarePowerModel {
    fn get_power(&self, utilization: f64) -> f64 {
        self.min_power + self.factor * utilization.powf(2.)
    }
}

/// A power model with constant power consumption value.
#[derive(Clone)]
pub struct ConstantPowerModel {
    power: f64,
}

impl ConstantPowerModel {
    pub fn new(power: f64) -> Self {
        Self { power }
    }
}

impl PowerModel for ConstantPowerModel {
    fn get_power(&self, _utilization: f64) -> f64 {
        self.power
    }
}
