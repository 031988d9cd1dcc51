mod forwarder;
mod record;
mod session;
mod store;

pub use forwarder::{discover_servers, LinkConnection, LinkServerDescriptor};
pub use record::{schema_newer_than_supported, LinkRecord, NetworkEvent};
pub use session::{LinkOutbound, LinkSession};
pub use store::{RequestRecord, RequestStore, WebSocketLifecycle, WebSocketRecord};

use thiserror::Error;

/// The schema version this build understands; used to decide whether an
/// incoming `Hello.schemaVersion` is newer than what this crate can parse.
pub const SUPPORTED_SCHEMA_VERSION: u64 = 1;

/// Failure modes specific to the Snap-O Link protocol, kept separate from
/// [`crate::error::AdbError`] since Link runs over a forwarded TCP socket
/// speaking an entirely different (NDJSON) wire format from the ADB host
/// protocol.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ADB error: {0}")]
    Adb(#[from] crate::error::AdbError),

    #[error("no Snap-O Link socket found on device {0}")]
    SocketNotFound(String),

    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("NDJSON line exceeded the {0} byte cap")]
    LineTooLong(usize),
}

pub type LinkResult<T> = Result<T, LinkError>;
