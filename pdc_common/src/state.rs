//! State machine enums for the device controllers.
//!
//! All enums use `#[repr(u8)]` for compact layout. Every device has a
//! closed, finite state set with one initial value (`Default`). State
//! transitions happen only inside the owning controller's tick; the
//! resting-state predicates let callers check that a machine has parked.

use serde::{Deserialize, Serialize};

// ─── Volume Controller ──────────────────────────────────────────────

/// Volume controller state (removable medium + single file handle).
///
/// `AccessCheck` is the active resting state (medium presence polled
/// every tick); `Standby` is the low-power resting state (mounted, no
/// polling). `Fault` exits only via reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum VolumeState {
    /// Mount attempt in progress (runs once per startup/reset).
    Init = 0,
    /// Active resting state — presence polled each tick.
    AccessCheck = 1,
    /// Low-power resting state — mounted, no polling.
    Standby = 2,
    /// Tear-down: close file, unmount, land in NotReady.
    Eject = 3,
    /// Medium absent or mount failed; waiting for presence.
    NotReady = 4,
    /// Latched fault — requires reset.
    Fault = 5,
    /// Single-tick cleanup, unconditionally followed by Init.
    Reset = 6,
}

impl VolumeState {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Init),
            1 => Some(Self::AccessCheck),
            2 => Some(Self::Standby),
            3 => Some(Self::Eject),
            4 => Some(Self::NotReady),
            5 => Some(Self::Fault),
            6 => Some(Self::Reset),
            _ => None,
        }
    }

    /// Returns true for states the machine may park in across ticks.
    #[inline]
    pub const fn is_resting(&self) -> bool {
        matches!(self, Self::AccessCheck | Self::Standby | Self::NotReady)
    }
}

impl Default for VolumeState {
    fn default() -> Self {
        Self::Init
    }
}

// ─── Radio Link Controller ──────────────────────────────────────────

/// Radio link controller state.
///
/// The resting state is `NotConnected`/`Connected`, driven by a carrier
/// presence query each tick. `Send` and `Read` are one-shot working
/// states entered only from `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LinkState {
    /// Bus bring-up (runs once per startup/reset).
    Init = 0,
    /// Resting — no peer present.
    NotConnected = 1,
    /// Resting — peer present, requests accepted.
    Connected = 2,
    /// One-shot transmit of the pending payload.
    Send = 3,
    /// One-shot receive into the read buffer.
    Read = 4,
    /// Power-down sequencing.
    LowPowerEnter = 5,
    /// Low-power resting state.
    LowPower = 6,
    /// Power-up sequencing; stale requests are cleared here.
    LowPowerExit = 7,
    /// Latched fault — requires reset.
    Fault = 8,
    /// Single-tick cleanup, unconditionally followed by Init.
    Reset = 9,
}

impl LinkState {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Init),
            1 => Some(Self::NotConnected),
            2 => Some(Self::Connected),
            3 => Some(Self::Send),
            4 => Some(Self::Read),
            5 => Some(Self::LowPowerEnter),
            6 => Some(Self::LowPower),
            7 => Some(Self::LowPowerExit),
            8 => Some(Self::Fault),
            9 => Some(Self::Reset),
            _ => None,
        }
    }

    /// Returns true for states the machine may park in across ticks.
    #[inline]
    pub const fn is_resting(&self) -> bool {
        matches!(self, Self::NotConnected | Self::Connected | Self::LowPower)
    }
}

impl Default for LinkState {
    fn default() -> Self {
        Self::Init
    }
}

// ─── Display Controller ─────────────────────────────────────────────

/// Character display controller state.
///
/// `PowerSave` is a second resting state parallel to `Idle`: the panel
/// stays powered but a backlight-off tick timer runs. Any write, clear,
/// or low-power exit resets that timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DisplayState {
    /// Panel bring-up (runs once per startup/reset).
    Init = 0,
    /// Resting — backlight permanently on.
    Idle = 1,
    /// Resting — backlight-off timer running.
    PowerSave = 2,
    /// One-shot flush of dirty lines.
    Write = 3,
    /// One-shot full clear.
    Clear = 4,
    /// Power-down sequencing.
    LowPowerEnter = 5,
    /// Low-power resting state (panel fully off).
    LowPower = 6,
    /// Power-up sequencing; backlight timer restarts.
    LowPowerExit = 7,
    /// Latched fault — requires reset.
    Fault = 8,
    /// Single-tick cleanup, unconditionally followed by Init.
    Reset = 9,
}

impl DisplayState {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Init),
            1 => Some(Self::Idle),
            2 => Some(Self::PowerSave),
            3 => Some(Self::Write),
            4 => Some(Self::Clear),
            5 => Some(Self::LowPowerEnter),
            6 => Some(Self::LowPower),
            7 => Some(Self::LowPowerExit),
            8 => Some(Self::Fault),
            9 => Some(Self::Reset),
            _ => None,
        }
    }

    /// Returns true for states the machine may park in across ticks.
    #[inline]
    pub const fn is_resting(&self) -> bool {
        matches!(self, Self::Idle | Self::PowerSave | Self::LowPower)
    }
}

impl Default for DisplayState {
    fn default() -> Self {
        Self::Init
    }
}

// ─── Inertial Sensor Controller ─────────────────────────────────────

/// Inertial sensor controller state.
///
/// The `Sampling` resting state performs a time-gated sample and fault
/// check each tick (elapsed ticks vs the configured period). Init runs
/// a self-test and a calibration pass, each exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SensorState {
    /// Self-test + calibration (runs once per startup/reset).
    Init = 0,
    /// Resting — time-gated sample and fault check.
    Sampling = 1,
    /// Writes the hardware sleep bit.
    LowPowerEnter = 2,
    /// Low-power resting state.
    LowPower = 3,
    /// Clears the hardware sleep bit.
    LowPowerExit = 4,
    /// Latched fault — requires reset.
    Fault = 5,
    /// Single-tick cleanup, unconditionally followed by Init.
    Reset = 6,
}

impl SensorState {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Init),
            1 => Some(Self::Sampling),
            2 => Some(Self::LowPowerEnter),
            3 => Some(Self::LowPower),
            4 => Some(Self::LowPowerExit),
            5 => Some(Self::Fault),
            6 => Some(Self::Reset),
            _ => None,
        }
    }

    /// Returns true for states the machine may park in across ticks.
    #[inline]
    pub const fn is_resting(&self) -> bool {
        matches!(self, Self::Sampling | Self::LowPower)
    }
}

impl Default for SensorState {
    fn default() -> Self {
        Self::Init
    }
}

// ─── Receiver Controller ────────────────────────────────────────────

/// Receiver (GPS-like) controller state.
///
/// Two resting states: `ReadContinuous` drains the bus every tick,
/// `ReadOnRequest` only when the read flag is raised. `WakeWait` holds
/// after low-power exit until the device answers again, bounded by a
/// configured tick timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ReceiverState {
    /// Bus bring-up (runs once per startup/reset).
    Init = 0,
    /// Resting — read every tick.
    ReadContinuous = 1,
    /// Resting — read only when flagged.
    ReadOnRequest = 2,
    /// One-shot flagged read.
    Read = 3,
    /// Power-down sequencing.
    LowPowerEnter = 4,
    /// Low-power resting state.
    LowPower = 5,
    /// Waiting (bounded) for the device to resume responding.
    WakeWait = 6,
    /// Latched fault — requires reset.
    Fault = 7,
    /// Single-tick cleanup, unconditionally followed by Init.
    Reset = 8,
}

impl ReceiverState {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Init),
            1 => Some(Self::ReadContinuous),
            2 => Some(Self::ReadOnRequest),
            3 => Some(Self::Read),
            4 => Some(Self::LowPowerEnter),
            5 => Some(Self::LowPower),
            6 => Some(Self::WakeWait),
            7 => Some(Self::Fault),
            8 => Some(Self::Reset),
            _ => None,
        }
    }

    /// Returns true for states the machine may park in across ticks.
    ///
    /// `WakeWait` is transient but bounded; it is not a resting state.
    #[inline]
    pub const fn is_resting(&self) -> bool {
        matches!(
            self,
            Self::ReadContinuous | Self::ReadOnRequest | Self::LowPower
        )
    }
}

impl Default for ReceiverState {
    fn default() -> Self {
        Self::Init
    }
}
