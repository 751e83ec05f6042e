//! Scriptable in-memory filesystem over a removable medium.
//!
//! `SimFilesystem` models the behaviors the volume controller has to
//! survive: an absent medium, a mount that fails and leaves partial
//! state, any operation answering a scripted error code, and handles
//! invalidated by an unmount.

use std::collections::{HashMap, HashSet};

use pdc_common::fs::{
    FileId, FileInfo, Filesystem, FreeSpace, FsError, OpenMode, VolumeLabel,
};
use tracing::debug;

/// Filesystem operations addressable by failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsOp {
    Mount,
    Unmount,
    Open,
    Close,
    Read,
    Write,
    Seek,
    Stat,
    Mkdir,
    Unlink,
    GetLabel,
    GetFree,
}

#[derive(Debug)]
struct OpenFile {
    path: String,
    pos: usize,
    mode: OpenMode,
}

/// In-memory removable medium with failure injection.
#[derive(Debug)]
pub struct SimFilesystem {
    present: bool,
    mounted: bool,
    label: VolumeLabel,
    free: FreeSpace,
    files: HashMap<String, Vec<u8>>,
    dirs: HashSet<String>,
    handles: HashMap<FileId, OpenFile>,
    next_id: FileId,
    /// One-shot failure scripts per operation.
    fail: HashMap<FsOp, FsError>,
    /// Mount/unmount counters for assertions.
    pub mounts: u64,
    /// Unmount call count.
    pub unmounts: u64,
}

impl Default for SimFilesystem {
    fn default() -> Self {
        Self::new()
    }
}

impl SimFilesystem {
    /// Create a present, unmounted medium with a generous free space.
    pub fn new() -> Self {
        let mut label = VolumeLabel::default();
        // Label truncation cannot fail for a literal this short.
        let _ = label.name.push_str("PDC_VOL");
        label.serial = 0x1234_5678;
        Self {
            present: true,
            mounted: false,
            label,
            free: FreeSpace {
                free_clusters: 8192,
                cluster_size: 4096,
            },
            files: HashMap::new(),
            dirs: HashSet::new(),
            handles: HashMap::new(),
            next_id: 1,
            fail: HashMap::new(),
            mounts: 0,
            unmounts: 0,
        }
    }

    /// Insert or remove the medium.
    pub fn set_present(&mut self, present: bool) {
        self.present = present;
    }

    /// Script the free-space report.
    pub fn set_free(&mut self, free_clusters: u32, cluster_size: u32) {
        self.free = FreeSpace {
            free_clusters,
            cluster_size,
        };
    }

    /// Fail the next call of `op` with `err`.
    pub fn inject(&mut self, op: FsOp, err: FsError) {
        self.fail.insert(op, err);
    }

    /// True while the medium is mounted.
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Number of live file handles.
    pub fn open_count(&self) -> usize {
        self.handles.len()
    }

    /// Whether a directory has been created.
    pub fn has_dir(&self, path: &str) -> bool {
        self.dirs.contains(path)
    }

    /// Pre-populate a file on the medium.
    pub fn put_file(&mut self, path: &str, data: &[u8]) {
        self.files.insert(path.to_string(), data.to_vec());
    }

    /// Raw contents of a file, if it exists.
    pub fn file_contents(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(|v| v.as_slice())
    }

    fn take_fail(&mut self, op: FsOp) -> Result<(), FsError> {
        match self.fail.remove(&op) {
            Some(err) => {
                debug!(?op, ?err, "scripted failure consumed");
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn require_mounted(&self) -> Result<(), FsError> {
        if !self.mounted {
            return Err(FsError::NotReady);
        }
        Ok(())
    }
}

impl Filesystem for SimFilesystem {
    fn medium_present(&mut self) -> bool {
        self.present
    }

    fn mount(&mut self) -> Result<(), FsError> {
        self.mounts += 1;
        if !self.present {
            return Err(FsError::NotReady);
        }
        self.take_fail(FsOp::Mount).inspect_err(|_| {
            // A failed mount leaves partial state behind, like the FAT
            // engines this stands in for; only unmount() clears it.
            self.mounted = true;
        })?;
        self.mounted = true;
        Ok(())
    }

    fn unmount(&mut self) -> Result<(), FsError> {
        self.unmounts += 1;
        self.take_fail(FsOp::Unmount)?;
        self.mounted = false;
        self.handles.clear();
        Ok(())
    }

    fn open(&mut self, path: &str, mode: OpenMode) -> Result<FileId, FsError> {
        self.require_mounted()?;
        self.take_fail(FsOp::Open)?;
        if !self.files.contains_key(path) {
            if !mode.contains(OpenMode::CREATE) {
                return Err(FsError::NoFile);
            }
            self.files.insert(path.to_string(), Vec::new());
        } else if mode.contains(OpenMode::TRUNCATE) {
            self.files.insert(path.to_string(), Vec::new());
        }
        let pos = if mode.contains(OpenMode::APPEND) {
            self.files[path].len()
        } else {
            0
        };
        let id = self.next_id;
        self.next_id += 1;
        self.handles.insert(
            id,
            OpenFile {
                path: path.to_string(),
                pos,
                mode,
            },
        );
        Ok(id)
    }

    fn close(&mut self, file: FileId) -> Result<(), FsError> {
        self.take_fail(FsOp::Close)?;
        self.handles
            .remove(&file)
            .map(|_| ())
            .ok_or(FsError::InvalidObject)
    }

    fn read(&mut self, file: FileId, dst: &mut [u8]) -> Result<usize, FsError> {
        self.require_mounted()?;
        self.take_fail(FsOp::Read)?;
        let handle = self.handles.get_mut(&file).ok_or(FsError::InvalidObject)?;
        if !handle.mode.contains(OpenMode::READ) {
            return Err(FsError::Denied);
        }
        let data = self.files.get(&handle.path).ok_or(FsError::Internal)?;
        let start = handle.pos.min(data.len());
        let n = (data.len() - start).min(dst.len());
        dst[..n].copy_from_slice(&data[start..start + n]);
        handle.pos = start + n;
        Ok(n)
    }

    fn write(&mut self, file: FileId, src: &[u8]) -> Result<usize, FsError> {
        self.require_mounted()?;
        self.take_fail(FsOp::Write)?;
        let handle = self.handles.get_mut(&file).ok_or(FsError::InvalidObject)?;
        if !handle.mode.contains(OpenMode::WRITE) {
            return Err(FsError::Denied);
        }
        let data = self.files.get_mut(&handle.path).ok_or(FsError::Internal)?;
        if data.len() < handle.pos {
            data.resize(handle.pos, 0);
        }
        let end = handle.pos + src.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[handle.pos..end].copy_from_slice(src);
        handle.pos = end;
        Ok(src.len())
    }

    fn seek(&mut self, file: FileId, offset: u32) -> Result<(), FsError> {
        self.require_mounted()?;
        self.take_fail(FsOp::Seek)?;
        let handle = self.handles.get_mut(&file).ok_or(FsError::InvalidObject)?;
        handle.pos = offset as usize;
        Ok(())
    }

    fn stat(&mut self, path: &str) -> Result<FileInfo, FsError> {
        self.require_mounted()?;
        self.take_fail(FsOp::Stat)?;
        if self.dirs.contains(path) {
            return Ok(FileInfo {
                size: 0,
                is_dir: true,
            });
        }
        match self.files.get(path) {
            Some(data) => Ok(FileInfo {
                size: data.len() as u32,
                is_dir: false,
            }),
            None => Err(FsError::NoFile),
        }
    }

    fn mkdir(&mut self, path: &str) -> Result<(), FsError> {
        self.require_mounted()?;
        self.take_fail(FsOp::Mkdir)?;
        if self.dirs.contains(path) {
            return Err(FsError::Exists);
        }
        self.dirs.insert(path.to_string());
        Ok(())
    }

    fn unlink(&mut self, path: &str) -> Result<(), FsError> {
        self.require_mounted()?;
        self.take_fail(FsOp::Unlink)?;
        if self.files.remove(path).is_some() || self.dirs.remove(path) {
            Ok(())
        } else {
            Err(FsError::NoFile)
        }
    }

    fn get_label(&mut self) -> Result<VolumeLabel, FsError> {
        self.require_mounted()?;
        self.take_fail(FsOp::GetLabel)?;
        Ok(self.label.clone())
    }

    fn get_free(&mut self) -> Result<FreeSpace, FsError> {
        self.require_mounted()?;
        self.take_fail(FsOp::GetFree)?;
        Ok(self.free)
    }
}
