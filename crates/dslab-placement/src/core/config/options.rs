//! Config utils.

use std::collections::HashMap;
use std::str::FromStr;

use crate::core::error::ConfigError;

/// Parses config value string, which consists of two parts - name and options.
/// Example: Linear[min_power=20,max_power=120] parts are name Linear and options string "min_power=20,max_power=120".
pub fn parse_config_value(config_str: &str) -> (String, Option<String>) {
    match config_str.split_once('[') {
        Some((l, r)) => (l.trim().to_string(), Some(r.replace(']', ""))),
        None => (config_str.trim().to_string(), None),
    }
}

/// Parses options string from config value, returns map with option names and values.
pub fn parse_options(options_str: &str) -> HashMap<String, String> {
    let mut options = HashMap::new();
    for option_str in options_str.split(',') {
        if let Some((name, value)) = option_str.split_once('=') {
            options.insert(name.trim().to_string(), value.trim().to_string());
        }
    }
    options
}

/// Reads a required option and parses it into `T`.
pub fn required_option<T: FromStr>(
    options: &HashMap<String, String>,
    name: &str,
    config_str: &str,
) -> Result<T, ConfigError> {
    options
        .get(name)
        .and_then(|value| value.parse::<T>().ok())
        .ok_or_else(|| ConfigError::InvalidOption {
            option: name.to_string(),
            value: config_str.to_string(),
        })
}

/// Reads an optional option, falling back to `default` when it is absent. A present but unparsable value is an error.
pub fn option_or<T: FromStr>(
    options: &HashMap<String, String>,
    name: &str,
    default: T,
    config_str: &str,
) -> Result<T, ConfigError> {
    match options.get(name) {
        None => Ok(default),
        Some(value) => value.parse::<T>().map_err(|_| ConfigError::InvalidOption {
            option: name.to_string(),
            value: config_str.to_string(),
        }),
    }
}
