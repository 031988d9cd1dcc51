use std::path::PathBuf;

/// Runtime configuration for the ADB client and session layer, mirroring
/// the handful of flags `main.rs`'s CLI struct feeds into
/// `AdbClient::with_address`.
#[derive(Debug, Clone)]
pub struct SnapoConfig {
    /// ADB server host, normally `127.0.0.1`.
    pub host: String,
    /// ADB server port, normally `5037`.
    pub port: u16,
    /// Path to the `adb` binary used to restart the server when the
    /// connection is refused. Falls back to `"adb"` on `PATH`.
    pub adb_binary: String,
    /// Root directory for capture/recording/preview temp artifacts.
    pub temp_dir: PathBuf,
}

impl SnapoConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            adb_binary: "adb".to_string(),
            temp_dir: std::env::temp_dir().join("snapo"),
        }
    }

    pub fn with_adb_binary(mut self, path: impl Into<String>) -> Self {
        self.adb_binary = path.into();
        self
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }
}

impl Default for SnapoConfig {
    fn default() -> Self {
        Self::new("127.0.0.1", 5037)
    }
}
