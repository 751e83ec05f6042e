//! Filesystem collaborator boundary for the volume controller.
//!
//! The underlying FAT engine is external; this module defines the call
//! boundary only: the [`Filesystem`] trait, the closed [`FsError`]
//! result-code enumeration, and the small value types that cross it.
//! Every non-OK code maps to exactly one fault-category bit in the
//! volume tracker, plus the raw code recorded in its fault mode.

use bitflags::bitflags;
use thiserror::Error;

/// Maximum composed path length (base / subdirectory / name).
pub const MAX_PATH: usize = 64;

/// Fixed-capacity path string used for all file-level operations.
pub type PathString = heapless::String<MAX_PATH>;

/// Opaque handle to an open file, owned by the filesystem collaborator.
pub type FileId = u32;

/// Closed result-code enumeration for filesystem operations.
///
/// Code 0 is reserved for success (`Ok(_)` on the Rust side); every
/// error variant carries a stable non-zero code via [`FsError::code`],
/// which the volume controller accumulates into its fault mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[repr(u8)]
pub enum FsError {
    /// Low-level disk I/O failed.
    #[error("low-level disk I/O error")]
    DiskError = 1,
    /// Internal filesystem assertion failed.
    #[error("internal filesystem error")]
    Internal = 2,
    /// Medium not ready (absent or not spun up).
    #[error("medium not ready")]
    NotReady = 3,
    /// No such file.
    #[error("no such file")]
    NoFile = 4,
    /// No such path.
    #[error("no such path")]
    NoPath = 5,
    /// Path name invalid or too long.
    #[error("invalid path name")]
    InvalidName = 6,
    /// Access denied (mode conflict, directory as file, ...).
    #[error("access denied")]
    Denied = 7,
    /// Object already exists.
    #[error("object already exists")]
    Exists = 8,
    /// File handle is invalid or stale.
    #[error("invalid file handle")]
    InvalidObject = 9,
    /// Medium is write protected.
    #[error("medium is write protected")]
    WriteProtected = 10,
    /// No valid filesystem found on the medium.
    #[error("no valid filesystem on medium")]
    NoFilesystem = 11,
    /// Operation timed out.
    #[error("filesystem operation timed out")]
    Timeout = 12,
    /// File locked by another operation.
    #[error("file is locked")]
    Locked = 13,
    /// Too many open files (the controller allows exactly one).
    #[error("too many open files")]
    TooManyOpenFiles = 14,
    /// Parameter out of range.
    #[error("invalid parameter")]
    InvalidParameter = 15,
}

impl FsError {
    /// Stable raw code, suitable for fault-mode accumulation.
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Convert from a raw code. Returns `None` for 0 (success) and
    /// out-of-range values.
    #[inline]
    pub const fn from_code(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::DiskError),
            2 => Some(Self::Internal),
            3 => Some(Self::NotReady),
            4 => Some(Self::NoFile),
            5 => Some(Self::NoPath),
            6 => Some(Self::InvalidName),
            7 => Some(Self::Denied),
            8 => Some(Self::Exists),
            9 => Some(Self::InvalidObject),
            10 => Some(Self::WriteProtected),
            11 => Some(Self::NoFilesystem),
            12 => Some(Self::Timeout),
            13 => Some(Self::Locked),
            14 => Some(Self::TooManyOpenFiles),
            15 => Some(Self::InvalidParameter),
            _ => None,
        }
    }
}

bitflags! {
    /// File open mode flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenMode: u8 {
        /// Open for reading.
        const READ     = 0x01;
        /// Open for writing.
        const WRITE    = 0x02;
        /// Create the file if it does not exist.
        const CREATE   = 0x04;
        /// Position at end of file after opening.
        const APPEND   = 0x08;
        /// Truncate an existing file to zero length.
        const TRUNCATE = 0x10;
    }
}

/// Volume label and serial as reported by the medium.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeLabel {
    /// Short label (FAT volume labels are at most 11 characters).
    pub name: heapless::String<12>,
    /// Volume serial number.
    pub serial: u32,
}

/// Free-space report: free space = `free_clusters * cluster_size`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FreeSpace {
    /// Number of free clusters.
    pub free_clusters: u32,
    /// Cluster size [bytes].
    pub cluster_size: u32,
}

impl FreeSpace {
    /// Free space in bytes.
    #[inline]
    pub const fn free_bytes(&self) -> u64 {
        self.free_clusters as u64 * self.cluster_size as u64
    }
}

/// Result of a `stat` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileInfo {
    /// File size [bytes]; 0 for directories.
    pub size: u32,
    /// True if the path names a directory.
    pub is_dir: bool,
}

/// Interface to the external filesystem engine.
///
/// All methods are synchronous and bounded; the volume controller wraps
/// each file-level operation in exactly one call and never retries on
/// its own. Implementations report failures through the closed
/// [`FsError`] code set.
pub trait Filesystem {
    /// Query medium presence (card-detect level, not a transaction).
    fn medium_present(&mut self) -> bool;

    /// Mount the medium. A failed mount may leave partial state behind;
    /// callers are expected to unmount defensively afterwards.
    fn mount(&mut self) -> Result<(), FsError>;

    /// Unmount the medium. Invalidates all open handles.
    fn unmount(&mut self) -> Result<(), FsError>;

    /// Open a file by absolute path.
    fn open(&mut self, path: &str, mode: OpenMode) -> Result<FileId, FsError>;

    /// Close an open file.
    fn close(&mut self, file: FileId) -> Result<(), FsError>;

    /// Read from the current position; returns bytes read.
    fn read(&mut self, file: FileId, dst: &mut [u8]) -> Result<usize, FsError>;

    /// Write at the current position; returns bytes written.
    fn write(&mut self, file: FileId, src: &[u8]) -> Result<usize, FsError>;

    /// Move the read/write position to an absolute byte offset.
    fn seek(&mut self, file: FileId, offset: u32) -> Result<(), FsError>;

    /// Stat a path.
    fn stat(&mut self, path: &str) -> Result<FileInfo, FsError>;

    /// Create a directory.
    fn mkdir(&mut self, path: &str) -> Result<(), FsError>;

    /// Delete a file or empty directory.
    fn unlink(&mut self, path: &str) -> Result<(), FsError>;

    /// Read the volume label.
    fn get_label(&mut self) -> Result<VolumeLabel, FsError>;

    /// Read the free-space report.
    fn get_free(&mut self) -> Result<FreeSpace, FsError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_error_code_roundtrip() {
        for v in 1..=15u8 {
            let err = FsError::from_code(v).unwrap();
            assert_eq!(err.code(), v);
        }
        assert!(FsError::from_code(0).is_none());
        assert!(FsError::from_code(16).is_none());
    }

    #[test]
    fn fs_error_display() {
        assert_eq!(
            FsError::TooManyOpenFiles.to_string(),
            "too many open files"
        );
        assert_eq!(FsError::NotReady.to_string(), "medium not ready");
    }

    #[test]
    fn free_space_bytes() {
        let free = FreeSpace {
            free_clusters: 128,
            cluster_size: 4096,
        };
        assert_eq!(free.free_bytes(), 128 * 4096);

        // No overflow at the u32 extremes.
        let max = FreeSpace {
            free_clusters: u32::MAX,
            cluster_size: u32::MAX,
        };
        assert!(max.free_bytes() > u32::MAX as u64);
    }

    #[test]
    fn open_mode_combinations() {
        let mode = OpenMode::READ | OpenMode::WRITE | OpenMode::CREATE;
        assert!(mode.contains(OpenMode::CREATE));
        assert!(!mode.contains(OpenMode::APPEND));
    }
}
