//! Shared controller surface for the polling scheduler.
//!
//! Every device controller implements [`Controller`] so the scheduler
//! can drive a heterogeneous set through one loop without knowing the
//! per-device state enums. The per-device typed surface (setters,
//! getters, payload access) stays on the concrete types.

/// Why a controller's transition evaluation chose its next state.
///
/// Ordered by priority, highest first; the evaluation stops at the
/// first cause that applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TransitionCause {
    /// Non-empty fault code forced the fault state.
    Fault,
    /// Reset flag forced the reset state (or reset completed → init).
    Reset,
    /// Low-power flag drove an enter/park/exit step.
    LowPower,
    /// A device-specific request flag selected a working state.
    Request,
    /// No request pending; parked in (or returning to) a resting state.
    Resting,
}

/// Common surface of a tick-polled device controller.
pub trait Controller {
    /// Controller identifier for logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Advance the state machine by exactly one step and perform the
    /// entered state's bounded action.
    fn tick(&mut self);

    /// True while the machine sits in its fault state (or will enter
    /// it on the next tick).
    fn faulted(&self) -> bool;

    /// Raw fault bits, widened for display. Zero when healthy.
    fn fault_bits(&self) -> u32;

    /// Request a full reset; takes effect on the next tick.
    fn request_reset(&mut self);

    /// Short label of the current state, for logs.
    fn state_label(&self) -> &'static str;
}
