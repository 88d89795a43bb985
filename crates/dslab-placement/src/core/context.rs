//! Per-component context used for logging and time lookups.

use std::rc::Rc;

use crate::core::clock::Clock;

/// Named handle to the simulation clock owned by each component (host, policy, simulation).
#[derive(Clone)]
pub struct PlacementContext {
    name: String,
    clock: Rc<dyn Clock>,
}

impl PlacementContext {
    pub fn new(name: &str, clock: Rc<dyn Clock>) -> Self {
        Self {
            name: name.to_string(),
            clock,
        }
    }

    /// Returns component name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> f64 {
        self.clock.now()
    }

    /// Creates a context for another component sharing the same clock.
    pub fn derive(&self, name: &str) -> Self {
        Self::new(name, self.clock.clone())
    }
}
