//! Bus driver collaborator boundary.
//!
//! The physical transaction drivers (two-wire, SPI, serial) live below
//! this trait; the controllers see only synchronous, bounded primitives
//! with a closed error set. Chip register layouts stay inside the
//! drivers — the controllers address device functions through the named
//! [`ioctl`] codes instead.

use thiserror::Error;

/// Synchronous readiness reported by a bus driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BusStatus {
    /// Device responds to transactions.
    Ready = 0,
    /// Device is present but settling (e.g. waking up).
    Busy = 1,
    /// Device is powered down or absent.
    Offline = 2,
}

/// Error codes for bus transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BusError {
    /// No response within the driver's internal retry budget.
    #[error("bus transaction timed out")]
    Timeout,
    /// Peer rejected the transaction.
    #[error("peer rejected the transaction (nack)")]
    Nack,
    /// Driver used before `init()`.
    #[error("bus is not initialized")]
    NotInitialized,
    /// Transfer ended short.
    #[error("transfer incomplete: {done} of {requested} bytes")]
    Partial {
        /// Bytes actually transferred.
        done: usize,
        /// Bytes requested.
        requested: usize,
    },
    /// Unknown ioctl code for this driver.
    #[error("invalid ioctl code {0:#04x}")]
    BadIoctl(u32),
}

/// Caller-usage error: a payload does not fit the fixed-size buffer.
///
/// This is not a device fault and never touches a fault code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("payload of {given} bytes exceeds the {max}-byte buffer")]
pub struct PayloadTooLarge {
    /// Bytes offered by the caller.
    pub given: usize,
    /// Buffer capacity.
    pub max: usize,
}

/// Named ioctl codes understood across the PDC drivers.
///
/// Drivers translate these to their chip-specific register writes;
/// unsupported codes yield [`BusError::BadIoctl`].
pub mod ioctl {
    /// Query carrier/peer presence. Returns 1 when present.
    pub const CARRIER_SENSE: u32 = 0x01;
    /// Power the device up.
    pub const POWER_UP: u32 = 0x02;
    /// Power the device down.
    pub const POWER_DOWN: u32 = 0x03;
    /// Write the sleep bit (arg 1 = sleep, 0 = wake).
    pub const SLEEP_BIT: u32 = 0x04;
    /// Switch the backlight on.
    pub const BACKLIGHT_ON: u32 = 0x05;
    /// Switch the backlight off.
    pub const BACKLIGHT_OFF: u32 = 0x06;
    /// Run the device self-test. Returns 1 on pass.
    pub const SELF_TEST: u32 = 0x07;
    /// Read the device's own fault/status register. Returns raw bits.
    pub const SAMPLE_STATUS: u32 = 0x08;
    /// Clear the whole display.
    pub const DISPLAY_CLEAR: u32 = 0x09;
}

/// Interface to a physical bus transaction driver.
///
/// All methods are blocking but bounded: a driver must fail with
/// [`BusError::Timeout`] rather than wait indefinitely. The controllers
/// never retry beyond what their per-action contracts document.
pub trait BusDriver {
    /// Driver identifier (e.g. "sim", "twi0").
    fn name(&self) -> &'static str;

    /// Current readiness without performing a transaction.
    fn status(&mut self) -> BusStatus;

    /// One-time bring-up of the bus peripheral.
    fn init(&mut self) -> Result<(), BusError>;

    /// Read up to `dst.len()` bytes; returns bytes read (0 = no data).
    fn read(&mut self, dst: &mut [u8]) -> Result<usize, BusError>;

    /// Write all of `src`.
    fn write(&mut self, src: &[u8]) -> Result<(), BusError>;

    /// Device-function control; returns a code-specific value.
    fn ioctl(&mut self, code: u32, arg: u32) -> Result<u32, BusError>;
}

impl<T: BusDriver + ?Sized> BusDriver for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }
    fn status(&mut self) -> BusStatus {
        (**self).status()
    }
    fn init(&mut self) -> Result<(), BusError> {
        (**self).init()
    }
    fn read(&mut self, dst: &mut [u8]) -> Result<usize, BusError> {
        (**self).read(dst)
    }
    fn write(&mut self, src: &[u8]) -> Result<(), BusError> {
        (**self).write(src)
    }
    fn ioctl(&mut self, code: u32, arg: u32) -> Result<u32, BusError> {
        (**self).ioctl(code, arg)
    }
}
