//! Simulation backend: scriptable bus and filesystem drivers.

pub mod bus;
pub mod filesystem;

pub use bus::SimBus;
pub use filesystem::{FsOp, SimFilesystem};
