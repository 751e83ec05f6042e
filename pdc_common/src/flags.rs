//! Request and status flag sets for the device controllers.
//!
//! Each flag is a single bit, independently settable by any caller
//! between ticks and independently clearable by the controller. The
//! original packed status bytes are expressed as typed `bitflags` sets,
//! keeping the set/clear semantics without relying on memory layout.
//!
//! The low three bits are the same in every set: `RESET`, `LOW_POWER`,
//! `STARTUP`. Device-specific requests follow above them.

use bitflags::bitflags;
use static_assertions::const_assert_eq;

bitflags! {
    /// Volume controller request/status flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VolumeFlags: u16 {
        /// Request a full reset (universal cancellation).
        const RESET     = 0x0001;
        /// Hold the low-power resting state.
        const LOW_POWER = 0x0002;
        /// Init action has not run yet for this power-on/reset.
        const STARTUP   = 0x0004;
        /// Request medium tear-down (close, unmount, not-ready).
        const EJECT     = 0x0008;
        /// Request an immediate free-space re-read.
        const CHECK     = 0x0010;
        /// Status: medium is mounted.
        const MOUNTED   = 0x0020;
        /// Status: a file handle is currently held.
        const OPEN_FILE = 0x0040;
        /// Status: medium absent or mount failed.
        const NOT_READY = 0x0080;
    }
}

bitflags! {
    /// Radio link controller request/status flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LinkFlags: u8 {
        /// Request a full reset.
        const RESET     = 0x01;
        /// Hold the low-power resting state.
        const LOW_POWER = 0x02;
        /// Init action has not run yet for this power-on/reset.
        const STARTUP   = 0x04;
        /// Status: carrier present on the last poll.
        const CONNECTED = 0x08;
        /// Request a one-shot transmit of the pending payload.
        const SEND      = 0x10;
        /// Request a one-shot receive.
        const READ      = 0x20;
        /// Status: the read buffer holds fresh data.
        const READ_DONE = 0x40;
    }
}

bitflags! {
    /// Display controller request/status flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DisplayFlags: u8 {
        /// Request a full reset.
        const RESET     = 0x01;
        /// Hold the low-power resting state (panel fully off).
        const LOW_POWER = 0x02;
        /// Init action has not run yet for this power-on/reset.
        const STARTUP   = 0x04;
        /// Request a flush of dirty lines.
        const WRITE     = 0x08;
        /// Request a full clear.
        const CLEAR     = 0x10;
        /// Select the power-save resting state (backlight timer).
        const PWR_SAVE  = 0x20;
    }
}

bitflags! {
    /// Inertial sensor controller request/status flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SensorFlags: u8 {
        /// Request a full reset.
        const RESET     = 0x01;
        /// Hold the low-power resting state (sleep bit set).
        const LOW_POWER = 0x02;
        /// Init action has not run yet for this power-on/reset.
        const STARTUP   = 0x04;
        /// Request an immediate sample regardless of the period gate.
        const CHECK     = 0x08;
    }
}

bitflags! {
    /// Receiver controller request/status flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ReceiverFlags: u8 {
        /// Request a full reset.
        const RESET      = 0x01;
        /// Hold the low-power resting state.
        const LOW_POWER  = 0x02;
        /// Init action has not run yet for this power-on/reset.
        const STARTUP    = 0x04;
        /// Request a one-shot read (read-on-request mode).
        const READ       = 0x08;
        /// Select the read-continuously resting state.
        const CONTINUOUS = 0x10;
        /// Status: the read buffer holds fresh data.
        const DATA_READY = 0x20;
    }
}

// Flag sets travel in trackers and diagnostics snapshots; keep their
// widths pinned.
const_assert_eq!(size_of::<VolumeFlags>(), 2);
const_assert_eq!(size_of::<LinkFlags>(), 1);
const_assert_eq!(size_of::<DisplayFlags>(), 1);
const_assert_eq!(size_of::<SensorFlags>(), 1);
const_assert_eq!(size_of::<ReceiverFlags>(), 1);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_bits_line_up() {
        assert_eq!(VolumeFlags::RESET.bits(), LinkFlags::RESET.bits() as u16);
        assert_eq!(
            VolumeFlags::LOW_POWER.bits(),
            DisplayFlags::LOW_POWER.bits() as u16
        );
        assert_eq!(
            SensorFlags::STARTUP.bits(),
            ReceiverFlags::STARTUP.bits()
        );
    }

    #[test]
    fn independent_set_and_clear() {
        let mut flags = VolumeFlags::empty();
        flags.insert(VolumeFlags::EJECT);
        flags.insert(VolumeFlags::MOUNTED);
        flags.remove(VolumeFlags::EJECT);
        assert!(!flags.contains(VolumeFlags::EJECT));
        assert!(flags.contains(VolumeFlags::MOUNTED));
    }

    #[test]
    fn clearing_a_clear_flag_is_a_noop() {
        let mut flags = LinkFlags::CONNECTED;
        let before = flags;
        flags.remove(LinkFlags::READ);
        assert_eq!(flags, before);
    }

    #[test]
    fn link_flags_bits_roundtrip() {
        for flag in [
            LinkFlags::RESET,
            LinkFlags::LOW_POWER,
            LinkFlags::STARTUP,
            LinkFlags::CONNECTED,
            LinkFlags::SEND,
            LinkFlags::READ,
            LinkFlags::READ_DONE,
        ] {
            assert_eq!(LinkFlags::from_bits(flag.bits()).unwrap(), flag);
        }
    }
}
