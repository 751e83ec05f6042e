//! PDC Common Library
//!
//! Shared types for the peripheral device controller (PDC) workspace.
//!
//! # Module Structure
//!
//! - [`state`] - Per-device state enumerations
//! - [`fault`] - Sticky fault bitflags and the raw-code accumulator
//! - [`flags`] - Request/status flag sets
//! - [`bus`] - Bus driver collaborator trait and result codes
//! - [`fs`] - Filesystem collaborator trait and result codes
//! - [`config`] - Configuration structs and TOML loading
//! - [`prelude`] - Common re-exports for convenience

pub mod bus;
pub mod config;
pub mod fault;
pub mod flags;
pub mod fs;
pub mod prelude;
pub mod state;
