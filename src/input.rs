use crate::client::AdbClient;
use crate::error::AdbResult;
use tracing::warn;

/// Input device class accepted by the on-device `input` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    Touchscreen,
    Mouse,
}

impl InputSource {
    fn as_str(&self) -> &'static str {
        match self {
            InputSource::Touchscreen => "touchscreen",
            InputSource::Mouse => "mouse",
        }
    }
}

/// A single `motionevent` action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionAction {
    Down,
    Up,
    Move,
    Cancel,
}

impl MotionAction {
    fn as_str(&self) -> &'static str {
        match self {
            MotionAction::Down => "DOWN",
            MotionAction::Up => "UP",
            MotionAction::Move => "MOVE",
            MotionAction::Cancel => "CANCEL",
        }
    }
}

/// Inject a synthetic pointer event via `input <source> -d <display> motionevent <action> <x> <y>`.
/// Used to mirror pointer interactions captured during a live preview back
/// onto the device.
pub async fn send_motion_event(
    client: &AdbClient,
    serial: &str,
    source: InputSource,
    display_id: u32,
    action: MotionAction,
    x: i32,
    y: i32,
) -> AdbResult<()> {
    let command = format!(
        "input {} -d {} motionevent {} {} {}",
        source.as_str(),
        display_id,
        action.as_str(),
        x,
        y
    );
    client.shell(Some(serial), &command).await?;
    Ok(())
}

/// Read the current `show_touches` system setting.
pub async fn get_show_touches(client: &AdbClient, serial: &str) -> AdbResult<bool> {
    let output = client
        .shell(Some(serial), "settings get system show_touches")
        .await?;
    Ok(output.trim() == "1")
}

/// Set the `show_touches` system setting.
pub async fn set_show_touches(client: &AdbClient, serial: &str, enabled: bool) -> AdbResult<()> {
    let value = if enabled { "1" } else { "0" };
    client
        .shell(
            Some(serial),
            &format!("settings put system show_touches {}", value),
        )
        .await?;
    Ok(())
}

/// Remembers the `show_touches` value in effect before a recording or
/// preview session forced it on, so it can be restored when the session
/// ends or is cancelled.
pub struct ShowTouchesGuard {
    prior: bool,
}

impl ShowTouchesGuard {
    /// Read the current value and force `show_touches` on. If reading the
    /// prior value fails, assumes it was off so cleanup turns it back off
    /// rather than leaving it on indefinitely.
    pub async fn enable(client: &AdbClient, serial: &str) -> Self {
        let prior = get_show_touches(client, serial).await.unwrap_or(false);
        if !prior {
            if let Err(e) = set_show_touches(client, serial, true).await {
                warn!("failed to enable show_touches on {}: {}", serial, e);
            }
        }
        Self { prior }
    }

    /// Restore the prior value. Best-effort: failures are logged and
    /// ignored, matching the cleanup-action error policy used for
    /// `killforward` and remote file removal.
    pub async fn release(self, client: &AdbClient, serial: &str) {
        if !self.prior {
            if let Err(e) = set_show_touches(client, serial, false).await {
                warn!("failed to restore show_touches on {}: {}", serial, e);
            }
        }
    }
}
