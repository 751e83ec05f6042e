//! # PDC HAL
//!
//! Hardware backends for the PDC controllers. The only backend shipped
//! here is the simulation one: scriptable in-memory stand-ins for the
//! bus and filesystem collaborators, used by the demo runner and the
//! test suites. Real transaction drivers implement the same
//! `pdc_common` traits out of tree.

pub mod registry;
pub mod sim;

pub use registry::{DriverRegistry, RegistryError};
pub use sim::{SimBus, SimFilesystem};
