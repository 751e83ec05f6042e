//! Inertial sensor controller.
//!
//! Init is two-phase and each-once-only: a hardware self-test, then a
//! calibration pass that stores the current reading as the zero offset.
//! The `Sampling` resting state time-gates a sample plus device fault
//! check against the configured period. Low power is a hardware sleep
//! bit written over the bus, not a pin toggle.
//!
//! Several physical units can coexist; [`SensorRegistry`] maps a
//! [`SensorId`] to its controller and lookup returns an absence result
//! instead of a dangling handle.

use std::collections::HashMap;

use pdc_common::bus::{BusDriver, BusError, ioctl};
use pdc_common::config::SensorConfig;
use pdc_common::fault::SensorFault;
use pdc_common::flags::SensorFlags;
use pdc_common::state::SensorState;
use tracing::{debug, info, warn};

use crate::controller::{Controller, TransitionCause};

/// Identifier of one physical sensor unit.
pub type SensorId = u8;

/// One three-axis reading, zero-offset corrected.
pub type Sample = [i16; 3];

/// State machine managing one inertial sensor.
pub struct SensorController<B: BusDriver> {
    bus: B,
    config: SensorConfig,
    state: SensorState,
    fault: SensorFault,
    flags: SensorFlags,
    ticks_since_sample: u32,
    zero_offset: Sample,
    last_sample: Option<Sample>,
}

impl<B: BusDriver> SensorController<B> {
    /// Create a controller in the init state.
    pub fn new(bus: B, config: SensorConfig) -> Self {
        Self {
            bus,
            config,
            state: SensorState::Init,
            fault: SensorFault::empty(),
            flags: SensorFlags::STARTUP,
            ticks_since_sample: 0,
            zero_offset: [0; 3],
            last_sample: None,
        }
    }

    // ─── Transition evaluation ──────────────────────────────────────

    fn next_state(&self) -> (SensorState, TransitionCause) {
        use SensorState::*;

        if self.state == Fault {
            return if self.flags.contains(SensorFlags::RESET) {
                (Reset, TransitionCause::Reset)
            } else {
                (Fault, TransitionCause::Fault)
            };
        }
        if !self.fault.is_empty() {
            return (Fault, TransitionCause::Fault);
        }
        if self.flags.contains(SensorFlags::RESET) {
            return (Reset, TransitionCause::Reset);
        }
        if self.state == Reset || self.flags.contains(SensorFlags::STARTUP) {
            return (Init, TransitionCause::Reset);
        }
        if self.flags.contains(SensorFlags::LOW_POWER) {
            let next = match self.state {
                LowPowerEnter | LowPower => LowPower,
                _ => LowPowerEnter,
            };
            return (next, TransitionCause::LowPower);
        }
        if matches!(self.state, LowPowerEnter | LowPower) {
            return (LowPowerExit, TransitionCause::LowPower);
        }
        (Sampling, TransitionCause::Resting)
    }

    // ─── State actions ──────────────────────────────────────────────

    /// Two-phase init: self-test, then calibration. Runs once per
    /// startup/reset.
    fn act_init(&mut self) {
        self.flags.remove(SensorFlags::STARTUP);
        if self.bus.init().is_err() {
            self.latch(SensorFault::COMMS);
            self.state = SensorState::Sampling;
            return;
        }
        match self.bus.ioctl(ioctl::SELF_TEST, 0) {
            Ok(1) => {}
            Ok(_) => self.latch(SensorFault::SELF_TEST),
            Err(_) => self.latch(SensorFault::COMMS),
        }
        // Calibration: the at-rest reading becomes the zero offset.
        match self.read_raw() {
            Ok(Some(raw)) => {
                self.zero_offset = raw;
                info!(offset = ?raw, "sensor calibrated");
            }
            Ok(None) | Err(_) => self.latch(SensorFault::CALIBRATION),
        }
        self.ticks_since_sample = 0;
        self.state = SensorState::Sampling;
    }

    fn act_sampling(&mut self) {
        self.ticks_since_sample = self.ticks_since_sample.saturating_add(1);
        let due = self.ticks_since_sample >= self.config.sample_period_ticks;
        let forced = self.flags.contains(SensorFlags::CHECK);
        if !due && !forced {
            return;
        }
        self.flags.remove(SensorFlags::CHECK);
        self.ticks_since_sample = 0;

        match self.read_raw() {
            Ok(Some(raw)) => {
                self.last_sample = Some([
                    raw[0].wrapping_sub(self.zero_offset[0]),
                    raw[1].wrapping_sub(self.zero_offset[1]),
                    raw[2].wrapping_sub(self.zero_offset[2]),
                ]);
            }
            // No fresh data this period; try again next time.
            Ok(None) => return,
            Err(_) => {
                self.latch(SensorFault::COMMS);
                return;
            }
        }
        // Fault check rides along with every sample.
        match self.bus.ioctl(ioctl::SAMPLE_STATUS, 0) {
            Ok(0) => {}
            Ok(bits) => {
                debug!(bits, "device fault register non-zero");
                self.latch(SensorFault::DEVICE);
            }
            Err(_) => self.latch(SensorFault::COMMS),
        }
    }

    fn act_low_power_enter(&mut self) {
        if self.bus.ioctl(ioctl::SLEEP_BIT, 1).is_err() {
            self.latch(SensorFault::COMMS);
        }
    }

    fn act_low_power_exit(&mut self) {
        if self.bus.ioctl(ioctl::SLEEP_BIT, 0).is_err() {
            self.latch(SensorFault::COMMS);
        }
        self.ticks_since_sample = 0;
    }

    fn act_reset(&mut self) {
        let _ = self.bus.ioctl(ioctl::SLEEP_BIT, 0);
        self.fault = SensorFault::empty();
        self.flags = SensorFlags::STARTUP;
        self.ticks_since_sample = 0;
        self.zero_offset = [0; 3];
        self.last_sample = None;
        info!("sensor reset");
    }

    /// One bus read of the three axis registers (2 bytes each, LE).
    /// `Ok(None)` when the device has no complete reading available.
    fn read_raw(&mut self) -> Result<Option<Sample>, BusError> {
        let mut buf = [0u8; 6];
        let n = self.bus.read(&mut buf)?;
        if n < buf.len() {
            return Ok(None);
        }
        Ok(Some([
            i16::from_le_bytes([buf[0], buf[1]]),
            i16::from_le_bytes([buf[2], buf[3]]),
            i16::from_le_bytes([buf[4], buf[5]]),
        ]))
    }

    fn latch(&mut self, bit: SensorFault) {
        warn!(fault = ?bit, "sensor fault latched");
        self.fault.insert(bit);
    }

    // ─── Setters ────────────────────────────────────────────────────

    /// Request an immediate sample on the next tick, bypassing the
    /// period gate.
    pub fn set_check(&mut self) {
        self.flags.insert(SensorFlags::CHECK);
    }

    /// Request a full reset.
    pub fn set_reset(&mut self) {
        self.flags.insert(SensorFlags::RESET);
    }

    /// Put the device to sleep.
    pub fn set_low_power(&mut self) {
        self.flags.insert(SensorFlags::LOW_POWER);
    }

    /// Wake the device.
    pub fn clear_low_power(&mut self) {
        self.flags.remove(SensorFlags::LOW_POWER);
    }

    // ─── Getters ────────────────────────────────────────────────────

    /// Current state.
    pub fn state(&self) -> SensorState {
        self.state
    }

    /// Accumulated fault bits.
    pub fn fault(&self) -> SensorFault {
        self.fault
    }

    /// Current request/status flags.
    pub fn flags(&self) -> SensorFlags {
        self.flags
    }

    /// Most recent offset-corrected reading, if any.
    pub fn last_sample(&self) -> Option<Sample> {
        self.last_sample
    }

    /// Zero offset captured at calibration.
    pub fn zero_offset(&self) -> Sample {
        self.zero_offset
    }

    /// Access the bus driver (diagnostics, sim scripting).
    pub fn bus_handle(&self) -> &B {
        &self.bus
    }

    /// Mutable access to the bus driver.
    pub fn bus_handle_mut(&mut self) -> &mut B {
        &mut self.bus
    }
}

impl<B: BusDriver> Controller for SensorController<B> {
    fn name(&self) -> &'static str {
        "sensor"
    }

    fn tick(&mut self) {
        let (next, cause) = self.next_state();
        if next != self.state {
            debug!(from = ?self.state, to = ?next, ?cause, "sensor transition");
        }
        self.state = next;
        match next {
            SensorState::Init => self.act_init(),
            SensorState::Sampling => self.act_sampling(),
            SensorState::LowPowerEnter => self.act_low_power_enter(),
            SensorState::LowPower => {}
            SensorState::LowPowerExit => self.act_low_power_exit(),
            SensorState::Fault => {}
            SensorState::Reset => self.act_reset(),
        }
    }

    fn faulted(&self) -> bool {
        self.state == SensorState::Fault || !self.fault.is_empty()
    }

    fn fault_bits(&self) -> u32 {
        self.fault.bits() as u32
    }

    fn request_reset(&mut self) {
        self.set_reset();
    }

    fn state_label(&self) -> &'static str {
        match self.state {
            SensorState::Init => "init",
            SensorState::Sampling => "sampling",
            SensorState::LowPowerEnter => "low-power-enter",
            SensorState::LowPower => "low-power",
            SensorState::LowPowerExit => "low-power-exit",
            SensorState::Fault => "fault",
            SensorState::Reset => "reset",
        }
    }
}

// ─── Multi-instance registry ────────────────────────────────────────

/// Owned map of sensor units, keyed by [`SensorId`].
pub struct SensorRegistry<B: BusDriver> {
    sensors: HashMap<SensorId, SensorController<B>>,
}

impl<B: BusDriver> SensorRegistry<B> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sensors: HashMap::new(),
        }
    }

    /// Register a sensor unit.
    ///
    /// # Panics
    /// Panics if the id is already registered.
    pub fn register(&mut self, id: SensorId, sensor: SensorController<B>) {
        if self.sensors.contains_key(&id) {
            panic!("Sensor {id} is already registered");
        }
        self.sensors.insert(id, sensor);
    }

    /// Look up a unit; `None` when the id is unknown.
    pub fn get(&self, id: SensorId) -> Option<&SensorController<B>> {
        self.sensors.get(&id)
    }

    /// Mutable lookup; `None` when the id is unknown.
    pub fn get_mut(&mut self, id: SensorId) -> Option<&mut SensorController<B>> {
        self.sensors.get_mut(&id)
    }

    /// Tick every registered unit once.
    pub fn tick_all(&mut self) {
        for sensor in self.sensors.values_mut() {
            sensor.tick();
        }
    }

    /// Number of registered units.
    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    /// True when no unit is registered.
    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// Registered ids, unordered.
    pub fn ids(&self) -> impl Iterator<Item = SensorId> + '_ {
        self.sensors.keys().copied()
    }
}

impl<B: BusDriver> Default for SensorRegistry<B> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdc_common::bus::BusError;
    use pdc_hal::sim::SimBus;

    fn config() -> SensorConfig {
        SensorConfig {
            sample_period_ticks: 4,
        }
    }

    fn scripted_bus(reading: Sample) -> SimBus {
        let mut bus = SimBus::new();
        bus.set_self_test_pass(true);
        push_reading(&mut bus, reading);
        bus
    }

    fn push_reading(bus: &mut SimBus, reading: Sample) {
        for axis in reading {
            bus.push_rx(&axis.to_le_bytes());
        }
    }

    fn calibrated_controller() -> SensorController<SimBus> {
        let mut sc = SensorController::new(scripted_bus([100, -50, 10]), config());
        sc.tick();
        assert_eq!(sc.state(), SensorState::Sampling);
        assert!(sc.fault().is_empty());
        sc
    }

    #[test]
    fn init_runs_self_test_and_calibration_once() {
        let sc = calibrated_controller();
        assert_eq!(sc.zero_offset(), [100, -50, 10]);
        assert!(!sc.flags().contains(SensorFlags::STARTUP));
        assert!(sc.last_sample().is_none());
    }

    #[test]
    fn failed_self_test_latches_fault() {
        let mut bus = SimBus::new();
        bus.set_self_test_pass(false);
        push_reading(&mut bus, [0, 0, 0]);
        let mut sc = SensorController::new(bus, config());
        sc.tick();
        assert!(sc.fault().contains(SensorFault::SELF_TEST));
        sc.tick();
        assert_eq!(sc.state(), SensorState::Fault);
    }

    #[test]
    fn failed_calibration_read_latches_fault() {
        let mut bus = SimBus::new();
        bus.set_self_test_pass(true);
        // No rx bytes queued: the 6-byte read comes back short.
        let mut sc = SensorController::new(bus, config());
        sc.tick();
        assert!(sc.fault().contains(SensorFault::CALIBRATION));
    }

    #[test]
    fn sampling_is_time_gated() {
        let mut sc = calibrated_controller();
        push_reading(&mut sc.bus, [110, -45, 10]);
        // Period is 4: the first three ticks must not touch the bus.
        let reads_before = sc.bus.reads;
        for _ in 0..3 {
            sc.tick();
        }
        assert_eq!(sc.bus.reads, reads_before);
        assert!(sc.last_sample().is_none());

        sc.tick();
        assert_eq!(sc.last_sample(), Some([10, 5, 0]));
    }

    #[test]
    fn check_flag_forces_immediate_sample() {
        let mut sc = calibrated_controller();
        push_reading(&mut sc.bus, [101, -50, 11]);
        sc.set_check();
        sc.tick();
        assert_eq!(sc.last_sample(), Some([1, 0, 1]));
        assert!(!sc.flags().contains(SensorFlags::CHECK));
    }

    #[test]
    fn device_fault_register_latches_device_fault() {
        let mut sc = calibrated_controller();
        push_reading(&mut sc.bus, [100, -50, 10]);
        sc.bus.set_ioctl_value(ioctl::SAMPLE_STATUS, 0b100);
        sc.set_check();
        sc.tick();
        assert!(sc.fault().contains(SensorFault::DEVICE));
        sc.tick();
        assert_eq!(sc.state(), SensorState::Fault);
    }

    #[test]
    fn low_power_writes_sleep_bit_both_ways() {
        let mut sc = calibrated_controller();
        sc.set_low_power();
        sc.tick();
        assert_eq!(sc.state(), SensorState::LowPowerEnter);
        assert_eq!(sc.bus.ioctl_written(ioctl::SLEEP_BIT), Some(1));
        sc.tick();
        assert_eq!(sc.state(), SensorState::LowPower);

        sc.clear_low_power();
        sc.tick();
        assert_eq!(sc.state(), SensorState::LowPowerExit);
        assert_eq!(sc.bus.ioctl_written(ioctl::SLEEP_BIT), Some(0));
        sc.tick();
        assert_eq!(sc.state(), SensorState::Sampling);
    }

    #[test]
    fn reset_recalibrates() {
        let mut sc = calibrated_controller();
        push_reading(&mut sc.bus, [100, -50, 10]);
        sc.set_check();
        sc.tick();
        assert!(sc.last_sample().is_some());

        sc.set_reset();
        sc.tick();
        assert_eq!(sc.state(), SensorState::Reset);
        // Re-init runs the self-test and calibration again.
        sc.bus.set_self_test_pass(true);
        push_reading(&mut sc.bus, [7, 7, 7]);
        sc.tick();
        assert_eq!(sc.state(), SensorState::Sampling);
        assert_eq!(sc.zero_offset(), [7, 7, 7]);
        assert!(sc.last_sample().is_none());
        assert!(sc.fault().is_empty());
    }

    #[test]
    fn short_read_skips_sample_without_fault() {
        let mut sc = calibrated_controller();
        // Only half a reading available.
        sc.bus.push_rx(&[1, 2, 3]);
        sc.set_check();
        sc.tick();
        assert!(sc.last_sample().is_none());
        assert!(sc.fault().is_empty());
        assert_eq!(sc.state(), SensorState::Sampling);
    }

    #[test]
    fn comms_failure_during_sample_latches() {
        let mut sc = calibrated_controller();
        sc.bus.fail_next_read(BusError::Timeout);
        sc.set_check();
        sc.tick();
        assert!(sc.fault().contains(SensorFault::COMMS));
        sc.tick();
        assert_eq!(sc.state(), SensorState::Fault);
    }

    // ─── Registry ───────────────────────────────────────────────────

    #[test]
    fn registry_lookup_hit_and_miss() {
        let mut reg = SensorRegistry::new();
        reg.register(1, SensorController::new(scripted_bus([0; 3]), config()));
        reg.register(2, SensorController::new(scripted_bus([0; 3]), config()));
        assert_eq!(reg.len(), 2);
        assert!(reg.get(1).is_some());
        assert!(reg.get(9).is_none());
        assert!(reg.get_mut(9).is_none());

        let mut ids: Vec<_> = reg.ids().collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn registry_tick_all_advances_every_unit() {
        let mut reg = SensorRegistry::new();
        reg.register(1, SensorController::new(scripted_bus([0; 3]), config()));
        reg.register(2, SensorController::new(scripted_bus([0; 3]), config()));
        reg.tick_all();
        for id in [1, 2] {
            assert_eq!(
                reg.get(id).map(|s| s.state()),
                Some(SensorState::Sampling)
            );
        }
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn registry_duplicate_id_panics() {
        let mut reg = SensorRegistry::new();
        reg.register(1, SensorController::new(scripted_bus([0; 3]), config()));
        reg.register(1, SensorController::new(scripted_bus([0; 3]), config()));
    }
}
