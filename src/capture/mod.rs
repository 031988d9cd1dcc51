mod manager;
mod preview;
mod recording;
mod screenshot;

pub use manager::{CaptureKind, CaptureManager};
pub use preview::{PreviewSession, PreviewStopCause};
pub use recording::{RecordingResult, RecordingSession};
pub use screenshot::Screenshot;

use crate::client::AdbClient;
use crate::error::{AdbError, AdbResult};
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// How long to wait after `kill -2` (SIGINT) before escalating to `kill -9`.
const GRACEFUL_STOP_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(150);

/// Launch a shell command in the background on the device and return the
/// backgrounded process's PID, so it can be stopped independently of the
/// foreground shell connection that started it.
///
/// `adb shell` normally ties a command's lifetime to the connection; `& echo`
/// detaches it and reports the PID on the same connection before it closes,
/// which is the shape both recording and live preview need: start once, stop
/// later over a second connection.
pub(crate) async fn spawn_background(
    client: &AdbClient,
    serial: &str,
    command: &str,
) -> AdbResult<u32> {
    let wrapped = format!("{} & echo __SNAPO_PID__:$!", command);
    let output = client.shell(Some(serial), &wrapped).await?;
    let pid = output
        .lines()
        .find_map(|line| line.strip_prefix("__SNAPO_PID__:"))
        .and_then(|s| s.trim().parse::<u32>().ok())
        .ok_or_else(|| AdbError::Protocol("could not determine background PID".into()))?;
    debug!("spawned background process {} on {}: {}", pid, serial, command);
    Ok(pid)
}

/// Send SIGINT, then poll `kill -0` until the process exits or the bounded
/// timeout elapses, at which point escalate to SIGKILL.
pub(crate) async fn stop_background(client: &AdbClient, serial: &str, pid: u32) -> AdbResult<()> {
    client.shell(Some(serial), &format!("kill -2 {}", pid)).await?;

    let wait_for_exit = async {
        loop {
            let still_running = client
                .shell(Some(serial), &format!("kill -0 {} 2>/dev/null; echo $?", pid))
                .await
                .map(|out| out.trim() == "0")
                .unwrap_or(false);
            if !still_running {
                return;
            }
            sleep(POLL_INTERVAL).await;
        }
    };

    if timeout(GRACEFUL_STOP_TIMEOUT, wait_for_exit).await.is_err() {
        warn!(
            "process {} on {} did not exit within {:?} after SIGINT, sending SIGKILL",
            pid, serial, GRACEFUL_STOP_TIMEOUT
        );
        client.shell(Some(serial), &format!("kill -9 {}", pid)).await?;
    }

    Ok(())
}
