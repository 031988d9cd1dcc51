use crate::client::AdbClient;
use crate::error::AdbResult;
use crate::h264::{AnnexBDemuxer, NalUnit};
use crate::input::ShowTouchesGuard;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Why a live preview session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewStopCause {
    /// The caller called [`PreviewSession::stop`].
    Requested,
    /// The device disconnected or the shell stream hit EOF on its own.
    StreamEnded,
    /// Reading the stream or demuxing NALs failed.
    Error,
}

/// A live H.264 preview session. NAL units arrive on `units`; the session
/// ends (and `units` closes) when [`PreviewStopCause`] is reached.
pub struct PreviewSession {
    pub serial: String,
    pub units: mpsc::Receiver<NalUnit>,
    client: Arc<AdbClient>,
    show_touches: ShowTouchesGuard,
    stop_tx: Option<tokio::sync::oneshot::Sender<()>>,
    task: JoinHandle<PreviewStopCause>,
}

impl PreviewSession {
    /// Start streaming `screenrecord`'s H.264 elementary stream and demux it
    /// into NAL units as they arrive.
    pub async fn start(client: Arc<AdbClient>, serial: &str) -> AdbResult<Self> {
        let show_touches = ShowTouchesGuard::enable(&client, serial).await;

        let mut stream = match client
            .shell_stream(
                Some(serial),
                "screenrecord --output-format=h264 --size 0x0 -",
            )
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                show_touches.release(&client, serial).await;
                return Err(e);
            }
        };

        let (units_tx, units_rx) = mpsc::channel(64);
        let (stop_tx, mut stop_rx) = tokio::sync::oneshot::channel();
        let task_serial = serial.to_string();

        let task = tokio::spawn(async move {
            let mut demux = AnnexBDemuxer::new();
            let mut chunk = [0u8; 64 * 1024];

            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        debug!("preview session on {} stopped by caller", task_serial);
                        return PreviewStopCause::Requested;
                    }
                    read = stream.read(&mut chunk) => {
                        match read {
                            Ok(0) => {
                                debug!("preview stream on {} ended", task_serial);
                                return PreviewStopCause::StreamEnded;
                            }
                            Ok(n) => {
                                for unit in demux.push(&chunk[..n]) {
                                    if units_tx.send(unit).await.is_err() {
                                        // Receiver dropped; nothing left to do.
                                        return PreviewStopCause::Requested;
                                    }
                                }
                            }
                            Err(e) => {
                                warn!("preview stream on {} read error: {}", task_serial, e);
                                return PreviewStopCause::Error;
                            }
                        }
                    }
                }
            }
        });

        Ok(Self {
            serial: serial.to_string(),
            units: units_rx,
            client,
            show_touches,
            stop_tx: Some(stop_tx),
            task,
        })
    }

    /// Request the session stop, wait for the reader task to finish, and
    /// release the `show_touches` override regardless of how the session
    /// ended.
    pub async fn stop(mut self) -> PreviewStopCause {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        let cause = self.task.await.unwrap_or(PreviewStopCause::Error);
        self.show_touches.release(&self.client, &self.serial).await;
        cause
    }
}
