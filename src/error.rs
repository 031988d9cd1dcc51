use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdbError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ADB server returned FAIL: {0}")]
    ServerFail(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid response: expected {expected}, got {actual}")]
    InvalidResponse { expected: String, actual: String },

    #[error("No device connected")]
    NoDevice,

    #[error("Multiple devices connected; specify a serial number")]
    MultipleDevices,

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Connection refused: is the ADB server running? (try 'adb start-server')")]
    ConnectionRefused,

    #[error("Sync protocol error: {0}")]
    SyncError(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Connect failed and either no `adb` binary path is configured, or the
    /// one bounded restart attempt did not bring the server back up.
    #[error("ADB server unavailable at {0}")]
    ServerUnavailable(String),

    /// The device is present in the tracker's list but in a state (e.g.
    /// `unauthorized`) that cannot serve the requested operation.
    #[error("Device {serial} is not authorized (state: {state})")]
    NotAuthorized { serial: String, state: String },

    /// A second capture/recording/preview of the same `(serial, kind)` was
    /// requested while one was already in flight.
    #[error("{kind} already in progress for device {serial}")]
    AlreadyInProgress { serial: String, kind: String },

    /// A bounded wait (connect, restart, recording stop) was exceeded.
    #[error("timed out waiting for {op}")]
    Timeout { op: String },

    /// An NDJSON line parsed as JSON but violated the Link record schema.
    #[error("invalid {type_} record: {reason}")]
    InvalidRecord { type_: String, reason: String },
}

pub type AdbResult<T> = Result<T, AdbError>;
