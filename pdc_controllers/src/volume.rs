//! Volume controller: mount lifecycle of one removable medium plus a
//! single exclusive file handle.
//!
//! The hardest controller in the family. It owns medium presence
//! detection, mount/unmount, base-directory creation, free-space
//! supervision, and the translation of every filesystem result code
//! into sticky fault bits — while guaranteeing that an eject or reset
//! never leaves a file handle dangling.
//!
//! Resting states: `AccessCheck` (active, presence polled every tick),
//! `Standby` (low-power, no polling), `NotReady` (medium absent or
//! mount failed, waits for reinsertion).

use pdc_common::config::VolumeConfig;
use pdc_common::fault::{FaultMode, VolumeFault};
use pdc_common::flags::VolumeFlags;
use pdc_common::fs::{
    FileId, Filesystem, FreeSpace, FsError, OpenMode, PathString, VolumeLabel,
};
use pdc_common::state::VolumeState;
use tracing::{debug, info, warn};

use crate::controller::{Controller, TransitionCause};

/// State machine managing one removable medium.
pub struct VolumeController<F: Filesystem> {
    fs: F,
    config: VolumeConfig,
    state: VolumeState,
    fault: VolumeFault,
    fault_mode: FaultMode,
    flags: VolumeFlags,
    label: VolumeLabel,
    free: FreeSpace,
    file: Option<FileId>,
    /// Active subdirectory; empty means files live in the base path.
    subdir: PathString,
    /// NotReady only re-inits after the medium has actually been seen
    /// absent, so an eject with the medium still inserted holds.
    seen_absent: bool,
}

impl<F: Filesystem> VolumeController<F> {
    /// Create a controller in the init state, mount pending.
    pub fn new(fs: F, config: VolumeConfig) -> Self {
        Self {
            fs,
            config,
            state: VolumeState::Init,
            fault: VolumeFault::empty(),
            fault_mode: FaultMode::empty(),
            flags: VolumeFlags::STARTUP,
            label: VolumeLabel::default(),
            free: FreeSpace::default(),
            file: None,
            subdir: PathString::new(),
            seen_absent: false,
        }
    }

    // ─── Transition evaluation ──────────────────────────────────────

    fn next_state(&self) -> (VolumeState, TransitionCause) {
        use VolumeState::*;

        if self.state == Fault {
            return if self.flags.contains(VolumeFlags::RESET) {
                (Reset, TransitionCause::Reset)
            } else {
                (Fault, TransitionCause::Fault)
            };
        }
        if !self.fault.is_empty() {
            return (Fault, TransitionCause::Fault);
        }
        if self.flags.contains(VolumeFlags::RESET) {
            return (Reset, TransitionCause::Reset);
        }
        if self.state == Reset || self.flags.contains(VolumeFlags::STARTUP) {
            return (Init, TransitionCause::Reset);
        }
        if self.flags.contains(VolumeFlags::NOT_READY) {
            // Tear down through eject if still mounted, so close and
            // unmount run before parking in NotReady.
            return if self.flags.contains(VolumeFlags::MOUNTED) {
                (Eject, TransitionCause::Request)
            } else {
                (NotReady, TransitionCause::Resting)
            };
        }
        if self.flags.contains(VolumeFlags::EJECT) {
            return (Eject, TransitionCause::Request);
        }
        if self.flags.contains(VolumeFlags::LOW_POWER) {
            return (Standby, TransitionCause::LowPower);
        }
        (AccessCheck, TransitionCause::Resting)
    }

    // ─── State actions ──────────────────────────────────────────────

    fn act_init(&mut self) {
        self.flags.remove(VolumeFlags::STARTUP);
        self.seen_absent = false;

        if let Err(code) = self.fs.mount() {
            debug!(?code, "mount failed, retreating to not-ready");
            self.flags.insert(VolumeFlags::NOT_READY);
            self.flags.remove(VolumeFlags::MOUNTED);
            // Some filesystem engines leave partial mount state behind
            // after a failed mount; it blocks the next retry unless
            // cleared here.
            let _ = self.fs.unmount();
            self.state = VolumeState::NotReady;
            return;
        }
        self.flags.insert(VolumeFlags::MOUNTED);
        self.flags.remove(VolumeFlags::NOT_READY);

        match self.fs.get_label() {
            Ok(label) => self.label = label,
            Err(code) => self.latch(VolumeFault::COMMS, code),
        }
        self.read_free_space();
        self.ensure_base_dir();

        info!(
            label = self.label.name.as_str(),
            free_bytes = self.free.free_bytes(),
            "volume mounted"
        );
        // Faults latched above are observed on the next tick.
        self.state = VolumeState::AccessCheck;
    }

    fn act_access_check(&mut self) {
        if !self.fs.medium_present() {
            debug!("medium removed");
            self.flags.insert(VolumeFlags::NOT_READY);
            return;
        }
        if self.flags.contains(VolumeFlags::CHECK) {
            self.flags.remove(VolumeFlags::CHECK);
            self.read_free_space();
        }
    }

    fn act_eject(&mut self) {
        // Best-effort: a close failure must not block the unmount.
        if let Some(id) = self.file.take() {
            let _ = self.fs.close(id);
            self.flags.remove(VolumeFlags::OPEN_FILE);
        }
        let _ = self.fs.unmount();
        self.flags.remove(VolumeFlags::MOUNTED | VolumeFlags::EJECT);
        self.flags.insert(VolumeFlags::NOT_READY);
        info!("volume ejected");
        self.state = VolumeState::NotReady;
    }

    fn act_not_ready(&mut self) {
        if !self.fs.medium_present() {
            self.seen_absent = true;
        } else if self.seen_absent {
            debug!("medium back, scheduling re-init");
            self.flags.remove(VolumeFlags::NOT_READY);
            self.flags.insert(VolumeFlags::STARTUP);
        }
    }

    fn act_reset(&mut self) {
        if let Some(id) = self.file.take() {
            let _ = self.fs.close(id);
        }
        if self.flags.contains(VolumeFlags::MOUNTED) {
            let _ = self.fs.unmount();
        }
        self.subdir.clear();
        self.fault = VolumeFault::empty();
        self.fault_mode.clear();
        self.flags = VolumeFlags::STARTUP;
        info!("volume reset");
    }

    // ─── Internals ──────────────────────────────────────────────────

    fn latch(&mut self, bit: VolumeFault, code: FsError) {
        warn!(fault = ?bit, ?code, "volume fault latched");
        self.fault.insert(bit);
        self.fault_mode.record(code);
    }

    fn read_free_space(&mut self) {
        match self.fs.get_free() {
            Ok(free) => {
                self.free = free;
                let floor = self.config.free_space_min_kib as u64 * 1024;
                if free.free_bytes() < floor {
                    warn!(
                        free_bytes = free.free_bytes(),
                        floor, "free space below threshold"
                    );
                    self.fault.insert(VolumeFault::FREE_SPACE_LOW);
                }
            }
            Err(code) => self.latch(VolumeFault::COMMS, code),
        }
    }

    fn ensure_base_dir(&mut self) {
        let exists = match self.fs.stat(&self.config.base_path) {
            Ok(info) => info.is_dir,
            Err(FsError::NoFile) | Err(FsError::NoPath) => false,
            Err(code) => {
                self.latch(VolumeFault::DIR_FAILED, code);
                return;
            }
        };
        if !exists {
            if let Err(code) = self.fs.mkdir(&self.config.base_path) {
                self.latch(VolumeFault::DIR_FAILED, code);
            }
        }
    }

    fn compose_path(&self, name: &str) -> Result<PathString, FsError> {
        if name.is_empty() || name.contains('/') {
            return Err(FsError::InvalidName);
        }
        let mut path = PathString::new();
        path.push_str(&self.config.base_path)
            .map_err(|_| FsError::InvalidName)?;
        if !self.subdir.is_empty() {
            path.push('/').map_err(|_| FsError::InvalidName)?;
            path.push_str(&self.subdir)
                .map_err(|_| FsError::InvalidName)?;
        }
        path.push('/').map_err(|_| FsError::InvalidName)?;
        path.push_str(name).map_err(|_| FsError::InvalidName)?;
        Ok(path)
    }

    // ─── File operations (callable between ticks) ───────────────────

    /// Open the single file slot. A second concurrent open is a caller
    /// usage error and returns `TooManyOpenFiles` without touching the
    /// fault code.
    pub fn open(&mut self, name: &str, mode: OpenMode) -> Result<(), FsError> {
        if self.file.is_some() {
            return Err(FsError::TooManyOpenFiles);
        }
        let path = self.compose_path(name)?;
        match self.fs.open(&path, mode) {
            Ok(id) => {
                self.file = Some(id);
                self.flags.insert(VolumeFlags::OPEN_FILE);
                Ok(())
            }
            Err(code) => {
                self.latch(VolumeFault::OPEN_FAILED, code);
                Err(code)
            }
        }
    }

    /// Close the open file. Always clears the open-file status, even
    /// when the underlying close fails, so the slot can be reused.
    pub fn close(&mut self) -> Result<(), FsError> {
        let Some(id) = self.file.take() else {
            return Ok(());
        };
        self.flags.remove(VolumeFlags::OPEN_FILE);
        if let Err(code) = self.fs.close(id) {
            self.latch(VolumeFault::CLOSE_FAILED, code);
            return Err(code);
        }
        Ok(())
    }

    /// Read from the open file at the current position.
    pub fn read(&mut self, dst: &mut [u8]) -> Result<usize, FsError> {
        let id = self.file.ok_or(FsError::InvalidObject)?;
        match self.fs.read(id, dst) {
            Ok(n) => Ok(n),
            Err(code) => {
                self.latch(VolumeFault::READ_FAILED, code);
                Err(code)
            }
        }
    }

    /// Write to the open file at the current position.
    pub fn write(&mut self, src: &[u8]) -> Result<usize, FsError> {
        let id = self.file.ok_or(FsError::InvalidObject)?;
        match self.fs.write(id, src) {
            Ok(n) => Ok(n),
            Err(code) => {
                self.latch(VolumeFault::WRITE_FAILED, code);
                Err(code)
            }
        }
    }

    /// Seek the open file to an absolute byte offset.
    pub fn seek(&mut self, offset: u32) -> Result<(), FsError> {
        let id = self.file.ok_or(FsError::InvalidObject)?;
        if let Err(code) = self.fs.seek(id, offset) {
            self.latch(VolumeFault::SEEK_FAILED, code);
            return Err(code);
        }
        Ok(())
    }

    /// Delete a file under the composed path.
    pub fn delete(&mut self, name: &str) -> Result<(), FsError> {
        let path = self.compose_path(name)?;
        if let Err(code) = self.fs.unlink(&path) {
            self.latch(VolumeFault::DIR_FAILED, code);
            return Err(code);
        }
        Ok(())
    }

    /// Select the subdirectory used by the path composition. Persists
    /// until changed or until reset clears it.
    pub fn set_subdir(&mut self, name: &str) -> Result<(), FsError> {
        if name.is_empty() || name.contains('/') {
            return Err(FsError::InvalidName);
        }
        let mut subdir = PathString::new();
        subdir.push_str(name).map_err(|_| FsError::InvalidName)?;
        self.subdir = subdir;
        Ok(())
    }

    /// Drop back to the base path.
    pub fn clear_subdir(&mut self) {
        self.subdir.clear();
    }

    // ─── Setters (callable from any context between ticks) ──────────

    /// Request a full reset.
    pub fn set_reset(&mut self) {
        self.flags.insert(VolumeFlags::RESET);
    }

    /// Park in the low-power resting state (Standby).
    pub fn set_low_power(&mut self) {
        self.flags.insert(VolumeFlags::LOW_POWER);
    }

    /// Return to active presence polling.
    pub fn clear_low_power(&mut self) {
        self.flags.remove(VolumeFlags::LOW_POWER);
    }

    /// Request medium tear-down.
    pub fn set_eject(&mut self) {
        self.flags.insert(VolumeFlags::EJECT);
    }

    /// Withdraw a pending eject request.
    pub fn clear_eject(&mut self) {
        self.flags.remove(VolumeFlags::EJECT);
    }

    /// Request an immediate free-space re-read on the next tick.
    pub fn set_check(&mut self) {
        self.flags.insert(VolumeFlags::CHECK);
    }

    // ─── Getters ────────────────────────────────────────────────────

    /// Current state.
    pub fn state(&self) -> VolumeState {
        self.state
    }

    /// Accumulated fault bits.
    pub fn fault(&self) -> VolumeFault {
        self.fault
    }

    /// Raw filesystem codes behind the fault bits.
    pub fn fault_mode(&self) -> FaultMode {
        self.fault_mode
    }

    /// Current request/status flags.
    pub fn flags(&self) -> VolumeFlags {
        self.flags
    }

    /// Label read at mount.
    pub fn label(&self) -> &VolumeLabel {
        &self.label
    }

    /// Free-space report from the last read.
    pub fn free_space(&self) -> FreeSpace {
        self.free
    }

    /// True while a file handle is held.
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Access the filesystem collaborator (diagnostics, sim scripting).
    pub fn fs_handle(&self) -> &F {
        &self.fs
    }

    /// Mutable access to the filesystem collaborator.
    pub fn fs_handle_mut(&mut self) -> &mut F {
        &mut self.fs
    }
}

impl<F: Filesystem> Controller for VolumeController<F> {
    fn name(&self) -> &'static str {
        "volume"
    }

    fn tick(&mut self) {
        let (next, cause) = self.next_state();
        if next != self.state {
            debug!(from = ?self.state, to = ?next, ?cause, "volume transition");
        }
        self.state = next;
        match next {
            VolumeState::Init => self.act_init(),
            VolumeState::AccessCheck => self.act_access_check(),
            VolumeState::Standby => {}
            VolumeState::Eject => self.act_eject(),
            VolumeState::NotReady => self.act_not_ready(),
            VolumeState::Fault => {}
            VolumeState::Reset => self.act_reset(),
        }
    }

    fn faulted(&self) -> bool {
        self.state == VolumeState::Fault || !self.fault.is_empty()
    }

    fn fault_bits(&self) -> u32 {
        self.fault.bits() as u32
    }

    fn request_reset(&mut self) {
        self.set_reset();
    }

    fn state_label(&self) -> &'static str {
        match self.state {
            VolumeState::Init => "init",
            VolumeState::AccessCheck => "access-check",
            VolumeState::Standby => "standby",
            VolumeState::Eject => "eject",
            VolumeState::NotReady => "not-ready",
            VolumeState::Fault => "fault",
            VolumeState::Reset => "reset",
        }
    }
}
