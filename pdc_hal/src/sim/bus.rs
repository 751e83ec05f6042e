//! Scriptable simulation bus driver.
//!
//! `SimBus` stands in for a physical transaction driver. Tests and the
//! demo runner script its behavior: queue receive bytes, set ioctl
//! query values, inject one-shot failures per operation, and delay the
//! wake-up after a power-up so the receiver's wake wait is observable.

use std::collections::{HashMap, VecDeque};

use pdc_common::bus::{BusDriver, BusError, BusStatus, ioctl};
use tracing::debug;

/// In-memory bus driver with failure injection.
#[derive(Debug, Default)]
pub struct SimBus {
    initialized: bool,
    powered_down: bool,
    /// status() calls still answering Busy after a power-up.
    busy_ticks: u32,
    /// Busy duration applied on the next power-up.
    wake_delay: u32,
    /// One-shot failure scripts, consumed by the next matching call.
    fail_init: Option<BusError>,
    fail_read: Option<BusError>,
    fail_write: Option<BusError>,
    fail_ioctl: Option<BusError>,
    /// Values answered by query ioctls (carrier sense, self-test, ...).
    ioctl_values: HashMap<u32, u32>,
    /// Last arg written per ioctl code (sleep bit, backlight, ...).
    ioctl_writes: HashMap<u32, u32>,
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    /// Transaction counters for assertions.
    pub reads: u64,
    /// Write transaction count.
    pub writes: u64,
    /// Ioctl transaction count.
    pub ioctls: u64,
}

impl SimBus {
    /// Create an idle simulation bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the value a query ioctl will answer with.
    pub fn set_ioctl_value(&mut self, code: u32, value: u32) {
        self.ioctl_values.insert(code, value);
    }

    /// Convenience: script carrier presence.
    pub fn set_carrier(&mut self, present: bool) {
        self.set_ioctl_value(ioctl::CARRIER_SENSE, present as u32);
    }

    /// Convenience: script the self-test answer.
    pub fn set_self_test_pass(&mut self, pass: bool) {
        self.set_ioctl_value(ioctl::SELF_TEST, pass as u32);
    }

    /// Last arg written with the given ioctl code, if any.
    pub fn ioctl_written(&self, code: u32) -> Option<u32> {
        self.ioctl_writes.get(&code).copied()
    }

    /// Queue bytes to be handed out by `read()`.
    pub fn push_rx(&mut self, data: &[u8]) {
        self.rx.extend(data.iter().copied());
    }

    /// Drain and return everything written so far.
    pub fn take_tx(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.tx)
    }

    /// Fail the next `init()` with `err`.
    pub fn fail_next_init(&mut self, err: BusError) {
        self.fail_init = Some(err);
    }

    /// Fail the next `read()` with `err`.
    pub fn fail_next_read(&mut self, err: BusError) {
        self.fail_read = Some(err);
    }

    /// Fail the next `write()` with `err`.
    pub fn fail_next_write(&mut self, err: BusError) {
        self.fail_write = Some(err);
    }

    /// Fail the next `ioctl()` with `err`.
    pub fn fail_next_ioctl(&mut self, err: BusError) {
        self.fail_ioctl = Some(err);
    }

    /// Answer Busy for `ticks` status() calls after the next power-up.
    pub fn script_wake_delay(&mut self, ticks: u32) {
        self.wake_delay = ticks;
    }

    /// True once the device has been powered down via ioctl.
    pub fn is_powered_down(&self) -> bool {
        self.powered_down
    }
}

impl BusDriver for SimBus {
    fn name(&self) -> &'static str {
        "sim"
    }

    fn status(&mut self) -> BusStatus {
        if self.powered_down {
            return BusStatus::Offline;
        }
        if self.busy_ticks > 0 {
            self.busy_ticks -= 1;
            return BusStatus::Busy;
        }
        BusStatus::Ready
    }

    fn init(&mut self) -> Result<(), BusError> {
        if let Some(err) = self.fail_init.take() {
            debug!(?err, "scripted init failure consumed");
            return Err(err);
        }
        self.initialized = true;
        self.powered_down = false;
        Ok(())
    }

    fn read(&mut self, dst: &mut [u8]) -> Result<usize, BusError> {
        self.reads += 1;
        if !self.initialized {
            return Err(BusError::NotInitialized);
        }
        if let Some(err) = self.fail_read.take() {
            debug!(?err, "scripted read failure consumed");
            return Err(err);
        }
        let mut n = 0;
        while n < dst.len() {
            match self.rx.pop_front() {
                Some(byte) => {
                    dst[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }

    fn write(&mut self, src: &[u8]) -> Result<(), BusError> {
        self.writes += 1;
        if !self.initialized {
            return Err(BusError::NotInitialized);
        }
        if let Some(err) = self.fail_write.take() {
            debug!(?err, "scripted write failure consumed");
            return Err(err);
        }
        self.tx.extend_from_slice(src);
        Ok(())
    }

    fn ioctl(&mut self, code: u32, arg: u32) -> Result<u32, BusError> {
        self.ioctls += 1;
        if let Some(err) = self.fail_ioctl.take() {
            debug!(?err, "scripted ioctl failure consumed");
            return Err(err);
        }
        match code {
            ioctl::POWER_DOWN => {
                self.powered_down = true;
                Ok(0)
            }
            ioctl::POWER_UP => {
                self.powered_down = false;
                self.busy_ticks = self.wake_delay;
                Ok(0)
            }
            ioctl::CARRIER_SENSE | ioctl::SELF_TEST | ioctl::SAMPLE_STATUS => {
                Ok(self.ioctl_values.get(&code).copied().unwrap_or(0))
            }
            ioctl::SLEEP_BIT
            | ioctl::BACKLIGHT_ON
            | ioctl::BACKLIGHT_OFF
            | ioctl::DISPLAY_CLEAR => {
                self.ioctl_writes.insert(code, arg);
                Ok(0)
            }
            other => Err(BusError::BadIoctl(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_before_init_fails() {
        let mut bus = SimBus::new();
        let mut buf = [0u8; 4];
        assert_eq!(bus.read(&mut buf), Err(BusError::NotInitialized));
    }

    #[test]
    fn rx_queue_drains_across_reads() {
        let mut bus = SimBus::new();
        bus.init().unwrap();
        bus.push_rx(&[1, 2, 3, 4, 5]);
        let mut buf = [0u8; 3];
        assert_eq!(bus.read(&mut buf).unwrap(), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(bus.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[4, 5]);
        assert_eq!(bus.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn one_shot_failure_injection() {
        let mut bus = SimBus::new();
        bus.init().unwrap();
        bus.fail_next_write(BusError::Nack);
        assert_eq!(bus.write(&[0xAA]), Err(BusError::Nack));
        // Failure script is consumed.
        bus.write(&[0xBB]).unwrap();
        assert_eq!(bus.take_tx(), vec![0xBB]);
    }

    #[test]
    fn power_down_and_wake_delay() {
        let mut bus = SimBus::new();
        bus.init().unwrap();
        assert_eq!(bus.status(), BusStatus::Ready);

        bus.ioctl(ioctl::POWER_DOWN, 0).unwrap();
        assert_eq!(bus.status(), BusStatus::Offline);

        bus.script_wake_delay(2);
        bus.ioctl(ioctl::POWER_UP, 0).unwrap();
        assert_eq!(bus.status(), BusStatus::Busy);
        assert_eq!(bus.status(), BusStatus::Busy);
        assert_eq!(bus.status(), BusStatus::Ready);
    }

    #[test]
    fn carrier_sense_scripting() {
        let mut bus = SimBus::new();
        assert_eq!(bus.ioctl(ioctl::CARRIER_SENSE, 0).unwrap(), 0);
        bus.set_carrier(true);
        assert_eq!(bus.ioctl(ioctl::CARRIER_SENSE, 0).unwrap(), 1);
    }

    #[test]
    fn sleep_bit_writes_recorded() {
        let mut bus = SimBus::new();
        bus.ioctl(ioctl::SLEEP_BIT, 1).unwrap();
        assert_eq!(bus.ioctl_written(ioctl::SLEEP_BIT), Some(1));
        bus.ioctl(ioctl::SLEEP_BIT, 0).unwrap();
        assert_eq!(bus.ioctl_written(ioctl::SLEEP_BIT), Some(0));
    }

    #[test]
    fn unknown_ioctl_rejected() {
        let mut bus = SimBus::new();
        assert_eq!(bus.ioctl(0x7777, 0), Err(BusError::BadIoctl(0x7777)));
    }
}
