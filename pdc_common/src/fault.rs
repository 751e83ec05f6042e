//! Sticky fault bitflags for the device controllers.
//!
//! All fault types use the `bitflags` crate. Fault bits are set only by
//! controller actions, OR-accumulate monotonically, and are cleared by
//! the reset action alone. A non-empty fault code drives the machine
//! into its fault state on the next tick.

use bitflags::bitflags;

use crate::fs::FsError;

bitflags! {
    /// Volume controller fault bits — one per filesystem operation
    /// category plus free space and transport.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VolumeFault: u16 {
        /// `open` returned a non-OK code.
        const OPEN_FAILED    = 0x0001;
        /// `close` returned a non-OK code.
        const CLOSE_FAILED   = 0x0002;
        /// `read` returned a non-OK code.
        const READ_FAILED    = 0x0004;
        /// `write` returned a non-OK code.
        const WRITE_FAILED   = 0x0008;
        /// `seek` returned a non-OK code.
        const SEEK_FAILED    = 0x0010;
        /// Directory-entry operation (mkdir/unlink/stat) failed.
        const DIR_FAILED     = 0x0020;
        /// Free space fell below the configured threshold.
        const FREE_SPACE_LOW = 0x0040;
        /// Volume metadata transaction (label/free-space) failed.
        const COMMS          = 0x0080;
    }
}

impl Default for VolumeFault {
    fn default() -> Self {
        Self::empty()
    }
}

bitflags! {
    /// Radio link controller fault bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LinkFault: u8 {
        /// Bus transaction failed (init or carrier query).
        const COMMS       = 0x01;
        /// Transmit of a pending payload failed.
        const SEND_FAILED = 0x02;
        /// Receive into the read buffer failed.
        const READ_FAILED = 0x04;
    }
}

impl Default for LinkFault {
    fn default() -> Self {
        Self::empty()
    }
}

bitflags! {
    /// Display controller fault bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DisplayFault: u8 {
        /// Bus transaction failed (init/backlight/clear).
        const COMMS        = 0x01;
        /// Flushing a dirty line failed.
        const WRITE_FAILED = 0x02;
    }
}

impl Default for DisplayFault {
    fn default() -> Self {
        Self::empty()
    }
}

bitflags! {
    /// Inertial sensor controller fault bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SensorFault: u8 {
        /// Bus transaction failed.
        const COMMS       = 0x01;
        /// Power-on self-test failed.
        const SELF_TEST   = 0x02;
        /// Calibration read failed.
        const CALIBRATION = 0x04;
        /// The device reported a fault in its own status register.
        const DEVICE      = 0x08;
    }
}

impl Default for SensorFault {
    fn default() -> Self {
        Self::empty()
    }
}

bitflags! {
    /// Receiver controller fault bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ReceiverFault: u8 {
        /// Bus transaction failed.
        const COMMS        = 0x01;
        /// Device did not resume responding within the wake timeout.
        const WAKE_TIMEOUT = 0x02;
    }
}

impl Default for ReceiverFault {
    fn default() -> Self {
        Self::empty()
    }
}

/// Secondary fault mask for the volume controller: records *which* raw
/// filesystem code caused each fault bit, for diagnostics.
///
/// Bit `1 << code` is set when a filesystem call fails with `code`.
/// Same accumulate/clear lifecycle as the fault code itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultMode(u32);

impl FaultMode {
    /// Empty mask.
    #[inline]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Accumulate the raw code of a failed operation.
    #[inline]
    pub fn record(&mut self, code: FsError) {
        self.0 |= 1 << code.code();
    }

    /// Raw accumulated bits.
    #[inline]
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Returns true if `code` has been recorded since the last clear.
    #[inline]
    pub const fn contains(&self, code: FsError) -> bool {
        self.0 & (1 << code.code()) != 0
    }

    /// Returns true if nothing has been recorded.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Clear all recorded codes (reset action only).
    #[inline]
    pub fn clear(&mut self) {
        self.0 = 0;
    }
}
