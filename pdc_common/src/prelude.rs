//! Common re-exports for PDC workspace crates.

pub use crate::bus::{BusDriver, BusError, BusStatus, PayloadTooLarge, ioctl};
pub use crate::config::{
    ControllersConfig, DisplayConfig, LinkConfig, ReceiverConfig, SensorConfig, VolumeConfig,
};
pub use crate::fault::{
    DisplayFault, FaultMode, LinkFault, ReceiverFault, SensorFault, VolumeFault,
};
pub use crate::flags::{DisplayFlags, LinkFlags, ReceiverFlags, SensorFlags, VolumeFlags};
pub use crate::fs::{
    FileId, FileInfo, Filesystem, FreeSpace, FsError, OpenMode, PathString, VolumeLabel,
};
pub use crate::state::{DisplayState, LinkState, ReceiverState, SensorState, VolumeState};
