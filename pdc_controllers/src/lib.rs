//! # PDC Controllers
//!
//! Cooperatively-scheduled device controller state machines. Each
//! controller manages the lifecycle of one slow, fallible peripheral
//! from a single-threaded polling loop: the external scheduler calls
//! `tick()` once per poll, the controller advances its state by exactly
//! one step and performs at most one bounded hardware action.
//!
//! ## Transition priority
//!
//! Identical across all controllers, highest first:
//!
//! 1. non-empty fault code → fault state
//! 2. reset flag → reset state
//! 3. low-power flag → low-power transition
//! 4. device-specific requests → working state
//! 5. otherwise remain in (or return to) the resting state
//!
//! ## Zero-allocation ticks
//!
//! All buffers are fixed-size (`heapless`); the tick path performs no
//! heap allocations.

pub mod controller;
pub mod display;
pub mod link;
pub mod receiver;
pub mod sensor;
pub mod volume;

pub use controller::{Controller, TransitionCause};
pub use display::{DisplayController, LineError};
pub use link::LinkController;
pub use receiver::ReceiverController;
pub use sensor::{SensorController, SensorId, SensorRegistry};
pub use volume::VolumeController;
