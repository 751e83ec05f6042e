//! Radio link controller.
//!
//! Resting state is `NotConnected`/`Connected`, driven by a carrier
//! presence query every tick. `Send` and `Read` are one-shot working
//! states entered only from `Connected`. Low-power exit clears any
//! stale connect/send/read flags so no request fires immediately after
//! wake-up.

use pdc_common::bus::{BusDriver, PayloadTooLarge, ioctl};
use pdc_common::config::LinkConfig;
use pdc_common::fault::LinkFault;
use pdc_common::flags::LinkFlags;
use pdc_common::state::LinkState;
use tracing::{debug, info, warn};

use crate::controller::{Controller, TransitionCause};

/// Payload buffer capacity; `LinkConfig::payload_max` trims within it.
pub const LINK_BUF: usize = 64;

/// State machine managing one radio link peripheral.
pub struct LinkController<B: BusDriver> {
    bus: B,
    config: LinkConfig,
    state: LinkState,
    fault: LinkFault,
    flags: LinkFlags,
    send_buf: heapless::Vec<u8, LINK_BUF>,
    read_buf: heapless::Vec<u8, LINK_BUF>,
}

impl<B: BusDriver> LinkController<B> {
    /// Create a controller in the init state.
    pub fn new(bus: B, config: LinkConfig) -> Self {
        Self {
            bus,
            config,
            state: LinkState::Init,
            fault: LinkFault::empty(),
            flags: LinkFlags::STARTUP,
            send_buf: heapless::Vec::new(),
            read_buf: heapless::Vec::new(),
        }
    }

    // ─── Transition evaluation ──────────────────────────────────────

    fn next_state(&self) -> (LinkState, TransitionCause) {
        use LinkState::*;

        if self.state == Fault {
            return if self.flags.contains(LinkFlags::RESET) {
                (Reset, TransitionCause::Reset)
            } else {
                (Fault, TransitionCause::Fault)
            };
        }
        if !self.fault.is_empty() {
            return (Fault, TransitionCause::Fault);
        }
        if self.flags.contains(LinkFlags::RESET) {
            return (Reset, TransitionCause::Reset);
        }
        if self.state == Reset || self.flags.contains(LinkFlags::STARTUP) {
            return (Init, TransitionCause::Reset);
        }
        if self.flags.contains(LinkFlags::LOW_POWER) {
            let next = match self.state {
                LowPowerEnter | LowPower => LowPower,
                _ => LowPowerEnter,
            };
            return (next, TransitionCause::LowPower);
        }
        if matches!(self.state, LowPowerEnter | LowPower) {
            return (LowPowerExit, TransitionCause::LowPower);
        }
        if self.flags.contains(LinkFlags::CONNECTED) {
            if self.flags.contains(LinkFlags::SEND) {
                return (Send, TransitionCause::Request);
            }
            if self.flags.contains(LinkFlags::READ) {
                return (Read, TransitionCause::Request);
            }
            return (Connected, TransitionCause::Resting);
        }
        (NotConnected, TransitionCause::Resting)
    }

    // ─── State actions ──────────────────────────────────────────────

    fn act_init(&mut self) {
        self.flags.remove(LinkFlags::STARTUP);
        if self.bus.init().is_err() {
            self.latch(LinkFault::COMMS);
        } else {
            info!("link ready");
        }
        self.state = LinkState::NotConnected;
    }

    /// Resting action for both NotConnected and Connected: refresh the
    /// carrier status flag.
    fn act_poll_carrier(&mut self) {
        match self.bus.ioctl(ioctl::CARRIER_SENSE, 0) {
            Ok(1) => self.flags.insert(LinkFlags::CONNECTED),
            Ok(_) => self.flags.remove(LinkFlags::CONNECTED),
            Err(err) => {
                debug!(?err, "carrier query failed");
                self.latch(LinkFault::COMMS);
            }
        }
    }

    fn act_send(&mut self) {
        self.flags.remove(LinkFlags::SEND);
        if self.bus.write(&self.send_buf).is_err() {
            self.latch(LinkFault::SEND_FAILED);
        }
        self.state = LinkState::Connected;
    }

    fn act_read(&mut self) {
        self.flags.remove(LinkFlags::READ);
        let mut buf = [0u8; LINK_BUF];
        match self.bus.read(&mut buf) {
            Ok(n) => {
                self.read_buf.clear();
                let _ = self.read_buf.extend_from_slice(&buf[..n]);
                self.flags.insert(LinkFlags::READ_DONE);
            }
            Err(_) => self.latch(LinkFault::READ_FAILED),
        }
        self.state = LinkState::Connected;
    }

    fn act_low_power_enter(&mut self) {
        if self.bus.ioctl(ioctl::POWER_DOWN, 0).is_err() {
            self.latch(LinkFault::COMMS);
        }
    }

    fn act_low_power_exit(&mut self) {
        if self.bus.ioctl(ioctl::POWER_UP, 0).is_err() {
            self.latch(LinkFault::COMMS);
        }
        // Stale requests from before the power-down must not fire on
        // the first tick after wake.
        self.flags
            .remove(LinkFlags::CONNECTED | LinkFlags::SEND | LinkFlags::READ);
    }

    fn act_reset(&mut self) {
        let _ = self.bus.ioctl(ioctl::POWER_DOWN, 0);
        self.fault = LinkFault::empty();
        self.flags = LinkFlags::STARTUP;
        self.send_buf.clear();
        self.read_buf.clear();
        info!("link reset");
    }

    fn latch(&mut self, bit: LinkFault) {
        warn!(fault = ?bit, "link fault latched");
        self.fault.insert(bit);
    }

    // ─── Setters ────────────────────────────────────────────────────

    /// Stage a payload and request a one-shot transmit. Oversized
    /// payloads are a caller usage error, not a device fault.
    pub fn set_send(&mut self, payload: &[u8]) -> Result<(), PayloadTooLarge> {
        if payload.len() > self.config.payload_max {
            return Err(PayloadTooLarge {
                given: payload.len(),
                max: self.config.payload_max,
            });
        }
        self.send_buf.clear();
        let _ = self.send_buf.extend_from_slice(payload);
        self.flags.insert(LinkFlags::SEND);
        Ok(())
    }

    /// Request a one-shot receive.
    pub fn set_read(&mut self) {
        self.flags.insert(LinkFlags::READ);
    }

    /// Withdraw a pending read request.
    pub fn clear_read(&mut self) {
        self.flags.remove(LinkFlags::READ);
    }

    /// Request a full reset.
    pub fn set_reset(&mut self) {
        self.flags.insert(LinkFlags::RESET);
    }

    /// Enter the low-power resting state.
    pub fn set_low_power(&mut self) {
        self.flags.insert(LinkFlags::LOW_POWER);
    }

    /// Leave the low-power resting state.
    pub fn clear_low_power(&mut self) {
        self.flags.remove(LinkFlags::LOW_POWER);
    }

    // ─── Getters ────────────────────────────────────────────────────

    /// Current state.
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Accumulated fault bits.
    pub fn fault(&self) -> LinkFault {
        self.fault
    }

    /// Current request/status flags.
    pub fn flags(&self) -> LinkFlags {
        self.flags
    }

    /// Take the received payload, clearing the read-done status.
    /// Returns `None` when no fresh data is available.
    pub fn take_read_data(&mut self) -> Option<heapless::Vec<u8, LINK_BUF>> {
        if !self.flags.contains(LinkFlags::READ_DONE) {
            return None;
        }
        self.flags.remove(LinkFlags::READ_DONE);
        Some(core::mem::take(&mut self.read_buf))
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

impl<B: BusDriver> Controller for LinkController<B> {
    fn name(&self) -> &'static str {
        "link"
    }

    fn tick(&mut self) {
        let (next, cause) = self.next_state();
        if next != self.state {
            debug!(from = ?self.state, to = ?next, ?cause, "link transition");
        }
        self.state = next;
        match next {
            LinkState::Init => self.act_init(),
            LinkState::NotConnected | LinkState::Connected => self.act_poll_carrier(),
            LinkState::Send => self.act_send(),
            LinkState::Read => self.act_read(),
            LinkState::LowPowerEnter => self.act_low_power_enter(),
            LinkState::LowPower => {}
            LinkState::LowPowerExit => self.act_low_power_exit(),
            LinkState::Fault => {}
            LinkState::Reset => self.act_reset(),
        }
    }

    fn faulted(&self) -> bool {
        self.state == LinkState::Fault || !self.fault.is_empty()
    }

    fn fault_bits(&self) -> u32 {
        self.fault.bits() as u32
    }

    fn request_reset(&mut self) {
        self.set_reset();
    }

    fn state_label(&self) -> &'static str {
        match self.state {
            LinkState::Init => "init",
            LinkState::NotConnected => "not-connected",
            LinkState::Connected => "connected",
            LinkState::Send => "send",
            LinkState::Read => "read",
            LinkState::LowPowerEnter => "low-power-enter",
            LinkState::LowPower => "low-power",
            LinkState::LowPowerExit => "low-power-exit",
            LinkState::Fault => "fault",
            LinkState::Reset => "reset",
        }
    }
}
