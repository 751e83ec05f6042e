//! Character display controller.
//!
//! Two resting states: `Idle` keeps the backlight on permanently;
//! `PowerSave` runs a backlight-off tick timer that any write, clear,
//! or wake restarts. The write action flushes only the lines flagged
//! dirty since the last flush, not the whole frame.

use pdc_common::bus::{BusDriver, ioctl};
use pdc_common::config::DisplayConfig;
use pdc_common::fault::DisplayFault;
use pdc_common::flags::DisplayFlags;
use pdc_common::state::DisplayState;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::controller::{Controller, TransitionCause};

/// Number of text lines on the panel.
pub const DISPLAY_LINES: usize = 4;

/// Characters per line.
pub const LINE_WIDTH: usize = 20;

/// Fixed-capacity line buffer.
pub type LineString = heapless::String<LINE_WIDTH>;

/// Caller usage errors for line staging. Never touch the fault code.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LineError {
    /// Line index outside the panel.
    #[error("line index {0} out of range (0..{DISPLAY_LINES})")]
    BadIndex(usize),
    /// Text does not fit one line.
    #[error("text of {given} chars exceeds the {LINE_WIDTH}-char line")]
    TooLong {
        /// Characters offered by the caller.
        given: usize,
    },
}

/// State machine managing one character display.
pub struct DisplayController<B: BusDriver> {
    bus: B,
    config: DisplayConfig,
    state: DisplayState,
    fault: DisplayFault,
    flags: DisplayFlags,
    lines: [LineString; DISPLAY_LINES],
    /// Bit `1 << i` set while line `i` needs a flush.
    dirty: u8,
    /// Ticks spent in PowerSave since the last wake.
    backlight_ticks: u32,
    backlight_on: bool,
}

impl<B: BusDriver> DisplayController<B> {
    /// Create a controller in the init state.
    pub fn new(bus: B, config: DisplayConfig) -> Self {
        Self {
            bus,
            config,
            state: DisplayState::Init,
            fault: DisplayFault::empty(),
            flags: DisplayFlags::STARTUP,
            lines: Default::default(),
            dirty: 0,
            backlight_ticks: 0,
            backlight_on: false,
        }
    }

    // ─── Transition evaluation ──────────────────────────────────────

    fn next_state(&self) -> (DisplayState, TransitionCause) {
        use DisplayState::*;

        if self.state == Fault {
            return if self.flags.contains(DisplayFlags::RESET) {
                (Reset, TransitionCause::Reset)
            } else {
                (Fault, TransitionCause::Fault)
            };
        }
        if !self.fault.is_empty() {
            return (Fault, TransitionCause::Fault);
        }
        if self.flags.contains(DisplayFlags::RESET) {
            return (Reset, TransitionCause::Reset);
        }
        if self.state == Reset || self.flags.contains(DisplayFlags::STARTUP) {
            return (Init, TransitionCause::Reset);
        }
        if self.flags.contains(DisplayFlags::LOW_POWER) {
            let next = match self.state {
                LowPowerEnter | LowPower => LowPower,
                _ => LowPowerEnter,
            };
            return (next, TransitionCause::LowPower);
        }
        if matches!(self.state, LowPowerEnter | LowPower) {
            return (LowPowerExit, TransitionCause::LowPower);
        }
        if self.flags.contains(DisplayFlags::CLEAR) {
            return (Clear, TransitionCause::Request);
        }
        if self.flags.contains(DisplayFlags::WRITE) {
            return (Write, TransitionCause::Request);
        }
        (self.resting_state(), TransitionCause::Resting)
    }

    fn resting_state(&self) -> DisplayState {
        if self.flags.contains(DisplayFlags::PWR_SAVE) {
            DisplayState::PowerSave
        } else {
            DisplayState::Idle
        }
    }

    // ─── State actions ──────────────────────────────────────────────

    fn act_init(&mut self) {
        self.flags.remove(DisplayFlags::STARTUP);
        if self.bus.init().is_err() {
            self.latch(DisplayFault::COMMS);
        }
        self.wake_backlight();
        info!("display ready");
        self.state = self.resting_state();
    }

    fn act_power_save(&mut self) {
        self.backlight_ticks = self.backlight_ticks.saturating_add(1);
        if self.backlight_on && self.backlight_ticks >= self.config.backlight_timeout_ticks {
            debug!("backlight timeout");
            if self.bus.ioctl(ioctl::BACKLIGHT_OFF, 0).is_err() {
                self.latch(DisplayFault::COMMS);
            }
            self.backlight_on = false;
        }
    }

    fn act_write(&mut self) {
        self.flags.remove(DisplayFlags::WRITE);
        self.wake_backlight();
        for i in 0..DISPLAY_LINES {
            if self.dirty & (1 << i) == 0 {
                continue;
            }
            // Frame: line index byte followed by the line text.
            let mut frame = heapless::Vec::<u8, { LINE_WIDTH + 1 }>::new();
            let _ = frame.push(i as u8);
            let _ = frame.extend_from_slice(self.lines[i].as_bytes());
            if self.bus.write(&frame).is_err() {
                self.latch(DisplayFault::WRITE_FAILED);
                break;
            }
            self.dirty &= !(1 << i);
        }
        self.state = self.resting_state();
    }

    fn act_clear(&mut self) {
        self.flags.remove(DisplayFlags::CLEAR);
        self.wake_backlight();
        if self.bus.ioctl(ioctl::DISPLAY_CLEAR, 0).is_err() {
            self.latch(DisplayFault::COMMS);
        }
        for line in &mut self.lines {
            line.clear();
        }
        self.dirty = 0;
        self.state = self.resting_state();
    }

    fn act_low_power_enter(&mut self) {
        if self.bus.ioctl(ioctl::POWER_DOWN, 0).is_err() {
            self.latch(DisplayFault::COMMS);
        }
        self.backlight_on = false;
    }

    fn act_low_power_exit(&mut self) {
        if self.bus.ioctl(ioctl::POWER_UP, 0).is_err() {
            self.latch(DisplayFault::COMMS);
        }
        self.wake_backlight();
        // Panel RAM did not survive the power-down; every populated
        // line needs a redraw.
        for (i, line) in self.lines.iter().enumerate() {
            if !line.is_empty() {
                self.dirty |= 1 << i;
            }
        }
        if self.dirty != 0 {
            self.flags.insert(DisplayFlags::WRITE);
        }
    }

    fn act_reset(&mut self) {
        let _ = self.bus.ioctl(ioctl::POWER_DOWN, 0);
        self.fault = DisplayFault::empty();
        self.flags = DisplayFlags::STARTUP;
        for line in &mut self.lines {
            line.clear();
        }
        self.dirty = 0;
        self.backlight_ticks = 0;
        self.backlight_on = false;
        info!("display reset");
    }

    fn wake_backlight(&mut self) {
        self.backlight_ticks = 0;
        if !self.backlight_on {
            if self.bus.ioctl(ioctl::BACKLIGHT_ON, 0).is_err() {
                self.latch(DisplayFault::COMMS);
            }
            self.backlight_on = true;
        }
    }

    fn latch(&mut self, bit: DisplayFault) {
        warn!(fault = ?bit, "display fault latched");
        self.fault.insert(bit);
    }

    // ─── Setters ────────────────────────────────────────────────────

    /// Stage text for one line and mark it dirty. The flush itself
    /// waits for [`set_write`](Self::set_write).
    pub fn set_line(&mut self, index: usize, text: &str) -> Result<(), LineError> {
        if index >= DISPLAY_LINES {
            return Err(LineError::BadIndex(index));
        }
        let mut line = LineString::new();
        line.push_str(text).map_err(|_| LineError::TooLong {
            given: text.chars().count(),
        })?;
        if self.lines[index] != line {
            self.lines[index] = line;
            self.dirty |= 1 << index;
        }
        Ok(())
    }

    /// Request a flush of the dirty lines.
    pub fn set_write(&mut self) {
        self.flags.insert(DisplayFlags::WRITE);
    }

    /// Request a full panel clear.
    pub fn set_clear(&mut self) {
        self.flags.insert(DisplayFlags::CLEAR);
    }

    /// Select the power-save resting state (backlight timer).
    pub fn set_power_save(&mut self) {
        self.flags.insert(DisplayFlags::PWR_SAVE);
    }

    /// Return to the always-lit Idle resting state.
    pub fn clear_power_save(&mut self) {
        self.flags.remove(DisplayFlags::PWR_SAVE);
        self.backlight_ticks = 0;
    }

    /// Request a full reset.
    pub fn set_reset(&mut self) {
        self.flags.insert(DisplayFlags::RESET);
    }

    /// Power the panel down entirely.
    pub fn set_low_power(&mut self) {
        self.flags.insert(DisplayFlags::LOW_POWER);
    }

    /// Power the panel back up.
    pub fn clear_low_power(&mut self) {
        self.flags.remove(DisplayFlags::LOW_POWER);
    }

    // ─── Getters ────────────────────────────────────────────────────

    /// Current state.
    pub fn state(&self) -> DisplayState {
        self.state
    }

    /// Accumulated fault bits.
    pub fn fault(&self) -> DisplayFault {
        self.fault
    }

    /// Current request/status flags.
    pub fn flags(&self) -> DisplayFlags {
        self.flags
    }

    /// Staged text of one line.
    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(|l| l.as_str())
    }

    /// Dirty-line bitmask (bit `1 << i` = line `i` pending).
    pub fn dirty_mask(&self) -> u8 {
        self.dirty
    }

    /// True while the backlight is lit.
    pub fn backlight_on(&self) -> bool {
        self.backlight_on
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

impl<B: BusDriver> Controller for DisplayController<B> {
    fn name(&self) -> &'static str {
        "display"
    }

    fn tick(&mut self) {
        let (next, cause) = self.next_state();
        if next != self.state {
            debug!(from = ?self.state, to = ?next, ?cause, "display transition");
        }
        self.state = next;
        match next {
            DisplayState::Init => self.act_init(),
            DisplayState::Idle => {}
            DisplayState::PowerSave => self.act_power_save(),
            DisplayState::Write => self.act_write(),
            DisplayState::Clear => self.act_clear(),
            DisplayState::LowPowerEnter => self.act_low_power_enter(),
            DisplayState::LowPower => {}
            DisplayState::LowPowerExit => self.act_low_power_exit(),
            DisplayState::Fault => {}
            DisplayState::Reset => self.act_reset(),
        }
    }

    fn faulted(&self) -> bool {
        self.state == DisplayState::Fault || !self.fault.is_empty()
    }

    fn fault_bits(&self) -> u32 {
        self.fault.bits() as u32
    }

    fn request_reset(&mut self) {
        self.set_reset();
    }

    fn state_label(&self) -> &'static str {
        match self.state {
            DisplayState::Init => "init",
            DisplayState::Idle => "idle",
            DisplayState::PowerSave => "power-save",
            DisplayState::Write => "write",
            DisplayState::Clear => "clear",
            DisplayState::LowPowerEnter => "low-power-enter",
            DisplayState::LowPower => "low-power",
            DisplayState::LowPowerExit => "low-power-exit",
            DisplayState::Fault => "fault",
            DisplayState::Reset => "reset",
        }
    }
}
