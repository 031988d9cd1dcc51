use crate::error::{AdbError, AdbResult};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, Notify};
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, warn};

/// How long to wait for the restarted server's listening socket to accept
/// connections before giving up.
const RESTART_WAIT_TIMEOUT: Duration = Duration::from_secs(5);
const RESTART_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Coordinates `adb start-server` restarts so that concurrent callers racing
/// a dropped ADB server share a single restart attempt instead of each
/// spawning their own `adb` process.
///
/// The mutex here guards only the `Option<Arc<Notify>>` slot, never the
/// restart itself: the first caller to observe `None` installs a `Notify`
/// and releases the lock before running `adb start-server`; everyone else
/// sees `Some` and awaits the same `Notify` without holding the lock.
pub struct RestartCoordinator {
    adb_path: String,
    host: String,
    port: u16,
    inflight: Mutex<Option<Arc<Notify>>>,
}

impl RestartCoordinator {
    pub fn new(adb_path: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            adb_path: adb_path.into(),
            host: host.into(),
            port,
            inflight: Mutex::new(None),
        }
    }

    /// Ensure the ADB server is running, restarting it if necessary. Safe to
    /// call from many tasks at once after each observes `ConnectionRefused`.
    pub async fn ensure_running(&self) -> AdbResult<()> {
        let notify = {
            let mut slot = self.inflight.lock().await;
            match slot.as_ref() {
                Some(notify) => Some(notify.clone()),
                None => {
                    let notify = Arc::new(Notify::new());
                    *slot = Some(notify.clone());
                    None
                }
            }
        };

        if let Some(notify) = notify {
            debug!("waiting for in-flight adb start-server to finish");
            notify.notified().await;
            return Ok(());
        }

        let result = self.restart().await;

        let notify = {
            let mut slot = self.inflight.lock().await;
            slot.take()
        };
        if let Some(notify) = notify {
            notify.notify_waiters();
        }

        result
    }

    async fn restart(&self) -> AdbResult<()> {
        warn!("ADB server unreachable, attempting 'adb start-server'");
        let status = tokio::process::Command::new(&self.adb_path)
            .arg("start-server")
            .status()
            .await
            .map_err(AdbError::Io)?;

        if !status.success() {
            return Err(AdbError::ServerUnavailable(self.adb_path.clone()));
        }

        self.wait_for_port().await;
        Ok(())
    }

    /// Poll the server's address until it accepts connections or
    /// `RESTART_WAIT_TIMEOUT` elapses. Best-effort: if the port never comes
    /// up, the caller's own retry still runs and reports the real error.
    async fn wait_for_port(&self) {
        let addr = format!("{}:{}", self.host, self.port);
        let deadline = Instant::now() + RESTART_WAIT_TIMEOUT;
        loop {
            if TcpStream::connect(&addr).await.is_ok() {
                return;
            }
            if Instant::now() >= deadline {
                warn!(
                    "ADB server did not accept connections at {} within {:?} of restart",
                    addr, RESTART_WAIT_TIMEOUT
                );
                return;
            }
            sleep(RESTART_POLL_INTERVAL).await;
        }
    }
}
