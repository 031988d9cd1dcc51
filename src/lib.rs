pub mod capture;
mod client;
pub mod config;
mod device;
mod error;
mod h264;
pub mod input;
pub mod link;
mod mp4;
mod png;
mod pool;
mod protocol;
mod sync;
mod tracker;

pub use client::AdbClient;
pub use device::{DeviceInfo, DeviceState};
pub use error::{AdbError, AdbResult};
pub use h264::{AnnexBDemuxer, NalUnit};
pub use input::{InputSource, MotionAction};
pub use mp4::{parse_metadata as parse_mp4_metadata, RecordingMetadata};
pub use png::{parse_dimensions as parse_png_dimensions, PngDimensions};
pub use pool::RestartCoordinator;
pub use protocol::{HostCommand, LocalCommand};
pub use sync::{DentEntry, StatResponse, SyncHeader, SyncId, SYNC_DATA_MAX};
pub use tracker::DeviceTracker;
