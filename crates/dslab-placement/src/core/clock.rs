//! Simulation clock contract.

use std::cell::Cell;
use std::rc::Rc;

/// Source of the current simulation time.
///
/// The core only reads the clock to tag log and history records, it never schedules anything by it.
pub trait Clock {
    fn now(&self) -> f64;
}

/// Clock advanced explicitly by the driver. Clones share the same time.
#[derive(Clone, Default)]
pub struct ManualClock {
    time: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward by `duration`.
    pub fn advance(&self, duration: f64) {
        self.time.set(self.time.get() + duration);
    }

    /// Sets the current time. Time never goes backwards.
    pub fn set(&self, time: f64) {
        assert!(time >= self.time.get(), "clock cannot go backwards");
        self.time.set(time);
    }

    /// Returns a shared handle usable by contexts.
    pub fn shared(&self) -> Rc<dyn Clock> {
        Rc::new(self.clone())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.time.get()
    }
}
