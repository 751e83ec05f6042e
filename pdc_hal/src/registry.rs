//! Driver registry for bus backends.
//!
//! Provides a `DriverRegistry` for registering and retrieving bus
//! driver factories. Constructor-injection rather than global state:
//! built at startup, populated via `register()`, then handed to
//! whoever wires the controllers.

use std::collections::HashMap;

use pdc_common::bus::BusDriver;
use thiserror::Error;

/// Factory producing a boxed bus driver.
pub type BusFactory = fn() -> Box<dyn BusDriver>;

/// Errors from registry lookups.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// No driver registered under the requested name.
    #[error("driver '{0}' not registered")]
    NotFound(String),
}

/// Registry of available bus drivers.
pub struct DriverRegistry {
    factories: HashMap<&'static str, BusFactory>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a driver factory.
    ///
    /// # Panics
    /// Panics if a driver with the same name is already registered.
    pub fn register(&mut self, name: &'static str, factory: BusFactory) {
        if self.factories.contains_key(name) {
            panic!("Driver '{name}' is already registered");
        }
        self.factories.insert(name, factory);
    }

    /// Get a driver factory by name.
    pub fn get_factory(&self, name: &str) -> Option<BusFactory> {
        self.factories.get(name).copied()
    }

    /// Create a driver instance by name.
    ///
    /// # Errors
    /// Returns `RegistryError::NotFound` if no driver with the given
    /// name is registered.
    pub fn create(&self, name: &str) -> Result<Box<dyn BusDriver>, RegistryError> {
        let factory = self
            .get_factory(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        Ok(factory())
    }

    /// List all registered driver names.
    pub fn list(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimBus;

    fn create_sim() -> Box<dyn BusDriver> {
        Box::new(SimBus::new())
    }

    #[test]
    fn registry_register_and_create() {
        let mut reg = DriverRegistry::new();
        reg.register("sim", create_sim);

        let driver = reg.create("sim").expect("should create");
        assert_eq!(driver.name(), "sim");
    }

    #[test]
    fn registry_driver_not_found() {
        let reg = DriverRegistry::new();
        let result = reg.create("nonexistent");
        assert!(matches!(result, Err(RegistryError::NotFound(_))));
    }

    #[test]
    fn registry_list_drivers() {
        let mut reg = DriverRegistry::new();
        reg.register("alpha", create_sim);
        reg.register("beta", create_sim);

        let mut names = reg.list();
        names.sort();
        assert_eq!(names, vec!["alpha", "beta"]);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn registry_duplicate_panics() {
        let mut reg = DriverRegistry::new();
        reg.register("dup", create_sim);
        reg.register("dup", create_sim);
    }
}
