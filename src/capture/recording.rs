use crate::capture::{spawn_background, stop_background};
use crate::client::AdbClient;
use crate::error::AdbResult;
use crate::input::ShowTouchesGuard;
use crate::mp4::{self, RecordingMetadata};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

/// A recording in progress. Dropping this without calling [`stop`] leaves the
/// on-device `screenrecord` process running; callers should always stop or
/// let the capture manager's claim table own the lifetime.
pub struct RecordingSession {
    pub serial: String,
    pub remote_path: String,
    pid: u32,
    client: Arc<AdbClient>,
    started_at: tokio::time::Instant,
    show_touches: ShowTouchesGuard,
    /// Resolves once the underlying `screenrecord` shell command's stream
    /// hits EOF, i.e. the process has actually exited.
    completion: oneshot::Receiver<()>,
    _watcher: JoinHandle<()>,
}

/// Result of a completed recording: the local file it was pulled to, plus
/// whatever `mp4.rs` could recover from the MP4 container.
#[derive(Debug, Clone)]
pub struct RecordingResult {
    pub local_path: std::path::PathBuf,
    pub metadata: MetadataResult,
}

/// `mp4::parse_metadata` can fail on a corrupt/truncated capture; the
/// recording itself still succeeded, so metadata failure is reported
/// alongside the result rather than failing the whole operation.
pub type MetadataResult = Result<RecordingMetadata, String>;

impl RecordingSession {
    /// Start `screenrecord` in the background and begin watching its shell
    /// stream for EOF.
    pub async fn start(client: Arc<AdbClient>, serial: &str) -> AdbResult<Self> {
        let show_touches = ShowTouchesGuard::enable(&client, serial).await;

        let remote_path = format!("/data/local/tmp/snapo-{}.mp4", Uuid::new_v4());
        let command = format!("screenrecord '{}'", remote_path);
        let pid = match spawn_background(&client, serial, &command).await {
            Ok(pid) => pid,
            Err(e) => {
                show_touches.release(&client, serial).await;
                return Err(e);
            }
        };

        let (tx, rx) = oneshot::channel();
        let watch_client = client.clone();
        let watch_serial = serial.to_string();
        let watcher = tokio::spawn(async move {
            // Poll for process exit rather than holding a second shell
            // stream open; screenrecord was started detached, so there is
            // no stream left to watch for EOF.
            loop {
                tokio::time::sleep(Duration::from_millis(300)).await;
                let running = watch_client
                    .shell(
                        Some(&watch_serial),
                        &format!("kill -0 {} 2>/dev/null; echo $?", pid),
                    )
                    .await
                    .map(|out| out.trim() == "0")
                    .unwrap_or(false);
                if !running {
                    let _ = tx.send(());
                    return;
                }
            }
        });

        info!(
            "recording started on {} (pid {}), writing to {}",
            serial, pid, remote_path
        );

        Ok(Self {
            serial: serial.to_string(),
            remote_path,
            pid,
            client,
            started_at: tokio::time::Instant::now(),
            show_touches,
            completion: rx,
            _watcher: watcher,
        })
    }

    /// Stop the recording (SIGINT, escalate to SIGKILL after a bounded
    /// timeout if needed), pull the finished file, parse its metadata, and
    /// remove the remote copy.
    pub async fn stop(mut self, local_path: &std::path::Path) -> AdbResult<RecordingResult> {
        stop_background(&self.client, &self.serial, self.pid).await?;
        // The watcher task may already have observed exit; either way, wait
        // for its signal (or time out defensively) before pulling the file.
        let _ = tokio::time::timeout(Duration::from_secs(2), &mut self.completion).await;

        self.show_touches.release(&self.client, &self.serial).await;

        self.client
            .pull(Some(&self.serial), &self.remote_path, local_path)
            .await?;

        let _ = self
            .client
            .shell(Some(&self.serial), &format!("rm -f '{}'", self.remote_path))
            .await;

        let file_data = tokio::fs::read(local_path).await?;
        let metadata = mp4::parse_metadata(&file_data).map_err(|e| e.to_string());

        debug!(
            "recording on {} stopped after {:?}",
            self.serial,
            self.started_at.elapsed()
        );

        Ok(RecordingResult {
            local_path: local_path.to_path_buf(),
            metadata,
        })
    }
}
