//! Receiver (GPS-like) controller.
//!
//! Two selectable resting states: `ReadContinuous` drains the bus on
//! every tick; `ReadOnRequest` reads only when the read flag is raised.
//! Low-power exit does not assume an immediate wake — the machine holds
//! in `WakeWait` until the device answers status queries again, bounded
//! by a configured tick timeout that latches a fault when exceeded.

use pdc_common::bus::{BusDriver, BusStatus, ioctl};
use pdc_common::config::ReceiverConfig;
use pdc_common::fault::ReceiverFault;
use pdc_common::flags::ReceiverFlags;
use pdc_common::state::ReceiverState;
use tracing::{debug, info, warn};

use crate::controller::{Controller, TransitionCause};

/// Receive buffer capacity; enough for one NMEA-size sentence.
pub const RX_BUF: usize = 96;

/// State machine managing one receiver peripheral.
pub struct ReceiverController<B: BusDriver> {
    bus: B,
    config: ReceiverConfig,
    state: ReceiverState,
    fault: ReceiverFault,
    flags: ReceiverFlags,
    buf: heapless::Vec<u8, RX_BUF>,
    /// Ticks spent in WakeWait so far.
    wake_ticks: u32,
}

impl<B: BusDriver> ReceiverController<B> {
    /// Create a controller in the init state. The configured mode
    /// selects the resting state entered after init.
    pub fn new(bus: B, config: ReceiverConfig) -> Self {
        let mut flags = ReceiverFlags::STARTUP;
        if config.continuous {
            flags.insert(ReceiverFlags::CONTINUOUS);
        }
        Self {
            bus,
            config,
            state: ReceiverState::Init,
            fault: ReceiverFault::empty(),
            flags,
            buf: heapless::Vec::new(),
            wake_ticks: 0,
        }
    }

    // ─── Transition evaluation ──────────────────────────────────────

    fn next_state(&self) -> (ReceiverState, TransitionCause) {
        use ReceiverState::*;

        if self.state == Fault {
            return if self.flags.contains(ReceiverFlags::RESET) {
                (Reset, TransitionCause::Reset)
            } else {
                (Fault, TransitionCause::Fault)
            };
        }
        if !self.fault.is_empty() {
            return (Fault, TransitionCause::Fault);
        }
        if self.flags.contains(ReceiverFlags::RESET) {
            return (Reset, TransitionCause::Reset);
        }
        if self.state == Reset || self.flags.contains(ReceiverFlags::STARTUP) {
            return (Init, TransitionCause::Reset);
        }
        if self.flags.contains(ReceiverFlags::LOW_POWER) {
            let next = match self.state {
                LowPowerEnter | LowPower => LowPower,
                _ => LowPowerEnter,
            };
            return (next, TransitionCause::LowPower);
        }
        if matches!(self.state, LowPowerEnter | LowPower | WakeWait) {
            // Wake path: hold until the device proves it is back.
            return (WakeWait, TransitionCause::LowPower);
        }
        if self.flags.contains(ReceiverFlags::READ)
            && !self.flags.contains(ReceiverFlags::CONTINUOUS)
        {
            return (Read, TransitionCause::Request);
        }
        (self.resting_state(), TransitionCause::Resting)
    }

    fn resting_state(&self) -> ReceiverState {
        if self.flags.contains(ReceiverFlags::CONTINUOUS) {
            ReceiverState::ReadContinuous
        } else {
            ReceiverState::ReadOnRequest
        }
    }

    // ─── State actions ──────────────────────────────────────────────

    fn act_init(&mut self) {
        self.flags.remove(ReceiverFlags::STARTUP);
        if self.bus.init().is_err() {
            self.latch(ReceiverFault::COMMS);
        } else {
            info!(continuous = self.flags.contains(ReceiverFlags::CONTINUOUS), "receiver ready");
        }
        self.state = self.resting_state();
    }

    fn act_read_continuous(&mut self) {
        self.drain_bus();
    }

    fn act_read(&mut self) {
        self.flags.remove(ReceiverFlags::READ);
        self.drain_bus();
        self.state = self.resting_state();
    }

    fn act_low_power_enter(&mut self) {
        if self.bus.ioctl(ioctl::POWER_DOWN, 0).is_err() {
            self.latch(ReceiverFault::COMMS);
        }
    }

    fn act_wake_wait(&mut self) {
        if self.wake_ticks == 0 {
            // First wake tick: start the power-up sequence.
            if self.bus.ioctl(ioctl::POWER_UP, 0).is_err() {
                self.latch(ReceiverFault::COMMS);
                return;
            }
        }
        if self.bus.status() == BusStatus::Ready {
            debug!(ticks = self.wake_ticks, "receiver awake");
            self.wake_ticks = 0;
            self.state = self.resting_state();
            return;
        }
        self.wake_ticks = self.wake_ticks.saturating_add(1);
        if self.wake_ticks >= self.config.wake_timeout_ticks {
            self.wake_ticks = 0;
            self.latch(ReceiverFault::WAKE_TIMEOUT);
        }
    }

    fn act_reset(&mut self) {
        let _ = self.bus.ioctl(ioctl::POWER_DOWN, 0);
        self.fault = ReceiverFault::empty();
        self.flags = ReceiverFlags::STARTUP;
        if self.config.continuous {
            self.flags.insert(ReceiverFlags::CONTINUOUS);
        }
        self.buf.clear();
        self.wake_ticks = 0;
        info!("receiver reset");
    }

    /// Pull whatever the device has buffered into the local buffer.
    fn drain_bus(&mut self) {
        let room = RX_BUF - self.buf.len();
        if room == 0 {
            return;
        }
        let mut tmp = [0u8; RX_BUF];
        match self.bus.read(&mut tmp[..room]) {
            Ok(0) => {}
            Ok(n) => {
                let _ = self.buf.extend_from_slice(&tmp[..n]);
                self.flags.insert(ReceiverFlags::DATA_READY);
            }
            Err(_) => self.latch(ReceiverFault::COMMS),
        }
    }

    fn latch(&mut self, bit: ReceiverFault) {
        warn!(fault = ?bit, "receiver fault latched");
        self.fault.insert(bit);
    }

    // ─── Setters ────────────────────────────────────────────────────

    /// Request a one-shot read (read-on-request mode only).
    pub fn set_read(&mut self) {
        self.flags.insert(ReceiverFlags::READ);
    }

    /// Withdraw a pending read request.
    pub fn clear_read(&mut self) {
        self.flags.remove(ReceiverFlags::READ);
    }

    /// Select the read-continuously resting state.
    pub fn set_continuous(&mut self) {
        self.flags.insert(ReceiverFlags::CONTINUOUS);
    }

    /// Select the read-on-request resting state.
    pub fn clear_continuous(&mut self) {
        self.flags.remove(ReceiverFlags::CONTINUOUS);
    }

    /// Request a full reset.
    pub fn set_reset(&mut self) {
        self.flags.insert(ReceiverFlags::RESET);
    }

    /// Power the device down.
    pub fn set_low_power(&mut self) {
        self.flags.insert(ReceiverFlags::LOW_POWER);
    }

    /// Start the bounded wake sequence.
    pub fn clear_low_power(&mut self) {
        self.flags.remove(ReceiverFlags::LOW_POWER);
        self.wake_ticks = 0;
    }

    // ─── Getters ────────────────────────────────────────────────────

    /// Current state.
    pub fn state(&self) -> ReceiverState {
        self.state
    }

    /// Accumulated fault bits.
    pub fn fault(&self) -> ReceiverFault {
        self.fault
    }

    /// Current request/status flags.
    pub fn flags(&self) -> ReceiverFlags {
        self.flags
    }

    /// Take the accumulated data, clearing the data-ready status.
    /// Returns `None` when nothing fresh arrived.
    pub fn take_data(&mut self) -> Option<heapless::Vec<u8, RX_BUF>> {
        if !self.flags.contains(ReceiverFlags::DATA_READY) {
            return None;
        }
        self.flags.remove(ReceiverFlags::DATA_READY);
        Some(core::mem::take(&mut self.buf))
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

impl<B: BusDriver> Controller for ReceiverController<B> {
    fn name(&self) -> &'static str {
        "receiver"
    }

    fn tick(&mut self) {
        let (next, cause) = self.next_state();
        if next != self.state {
            debug!(from = ?self.state, to = ?next, ?cause, "receiver transition");
        }
        self.state = next;
        match next {
            ReceiverState::Init => self.act_init(),
            ReceiverState::ReadContinuous => self.act_read_continuous(),
            ReceiverState::ReadOnRequest => {}
            ReceiverState::Read => self.act_read(),
            ReceiverState::LowPowerEnter => self.act_low_power_enter(),
            ReceiverState::LowPower => {}
            ReceiverState::WakeWait => self.act_wake_wait(),
            ReceiverState::Fault => {}
            ReceiverState::Reset => self.act_reset(),
        }
    }

    fn faulted(&self) -> bool {
        self.state == ReceiverState::Fault || !self.fault.is_empty()
    }

    fn fault_bits(&self) -> u32 {
        self.fault.bits() as u32
    }

    fn request_reset(&mut self) {
        self.set_reset();
    }

    fn state_label(&self) -> &'static str {
        match self.state {
            ReceiverState::Init => "init",
            ReceiverState::ReadContinuous => "read-continuous",
            ReceiverState::ReadOnRequest => "read-on-request",
            ReceiverState::Read => "read",
            ReceiverState::LowPowerEnter => "low-power-enter",
            ReceiverState::LowPower => "low-power",
            ReceiverState::WakeWait => "wake-wait",
            ReceiverState::Fault => "fault",
            ReceiverState::Reset => "reset",
        }
    }
}
