use crate::capture::preview::PreviewSession;
use crate::capture::recording::RecordingSession;
use crate::capture::screenshot::{self, Screenshot};
use crate::client::AdbClient;
use crate::error::{AdbError, AdbResult};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// The kind of capture operation claiming a device, so recording and live
/// preview (which both monopolize `screenrecord`) can be mutually excluded
/// while independent screenshots on other devices proceed freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureKind {
    Screenshot,
    Recording,
    Preview,
}

impl std::fmt::Display for CaptureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureKind::Screenshot => write!(f, "screenshot"),
            CaptureKind::Recording => write!(f, "recording"),
            CaptureKind::Preview => write!(f, "preview"),
        }
    }
}

/// Single-flight claim table for capture operations, keyed by
/// `(serial, kind)`, plus `Recording`/`Preview` mutual exclusion per serial
/// (both drive the same on-device `screenrecord` process). Backed by a set
/// rather than a single slot so independent devices and independent
/// screenshot calls aren't serialized against each other.
pub struct CaptureManager {
    client: Arc<AdbClient>,
    claims: Mutex<HashSet<(String, CaptureKind)>>,
    /// Most recent screenshot per serial, used to serve an instant preview
    /// before a fresh `screencap` round-trip completes.
    preload: RwLock<HashMap<String, Screenshot>>,
}

impl CaptureManager {
    pub fn new(client: Arc<AdbClient>) -> Self {
        Self {
            client,
            claims: Mutex::new(HashSet::new()),
            preload: RwLock::new(HashMap::new()),
        }
    }

    /// The last screenshot taken for this serial, if any, without touching
    /// the device. Used to paint something immediately while a fresh
    /// `screenshot` call is in flight.
    pub async fn preloaded(&self, serial: &str) -> Option<Screenshot> {
        self.preload.read().await.get(serial).cloned()
    }

    async fn claim(&self, serial: &str, kind: CaptureKind) -> AdbResult<()> {
        let mut claims = self.claims.lock().await;
        let conflicting = match kind {
            CaptureKind::Screenshot => CaptureKind::Screenshot,
            CaptureKind::Recording => CaptureKind::Preview,
            CaptureKind::Preview => CaptureKind::Recording,
        };
        if claims.contains(&(serial.to_string(), kind))
            || claims.contains(&(serial.to_string(), conflicting))
        {
            return Err(AdbError::AlreadyInProgress {
                serial: serial.to_string(),
                kind: kind.to_string(),
            });
        }
        claims.insert((serial.to_string(), kind));
        Ok(())
    }

    async fn release(&self, serial: &str, kind: CaptureKind) {
        self.claims.lock().await.remove(&(serial.to_string(), kind));
    }

    /// Take a screenshot. Screenshots don't conflict with recording/preview
    /// and aren't claimed long-term, but still pass through the claim table
    /// so two concurrent screenshot requests for the same device serialize
    /// rather than race two `screencap` shell invocations.
    pub async fn screenshot(&self, serial: &str) -> AdbResult<Screenshot> {
        self.claim(serial, CaptureKind::Screenshot).await?;
        let result = screenshot::take(&self.client, serial).await;
        self.release(serial, CaptureKind::Screenshot).await;
        if let Ok(shot) = &result {
            self.preload
                .write()
                .await
                .insert(serial.to_string(), shot.clone());
        }
        result
    }

    /// Start a recording session, claiming `(serial, Recording)` until the
    /// returned session is stopped or dropped.
    pub async fn start_recording(&self, serial: &str) -> AdbResult<RecordingSession> {
        self.claim(serial, CaptureKind::Recording).await?;
        match RecordingSession::start(self.client.clone(), serial).await {
            Ok(session) => Ok(session),
            Err(e) => {
                self.release(serial, CaptureKind::Recording).await;
                Err(e)
            }
        }
    }

    pub async fn stop_recording(
        &self,
        session: RecordingSession,
        local_path: &std::path::Path,
    ) -> AdbResult<crate::capture::RecordingResult> {
        let serial = session.serial.clone();
        let result = session.stop(local_path).await;
        self.release(&serial, CaptureKind::Recording).await;
        result
    }

    /// Start a live preview session, claiming `(serial, Preview)`.
    pub async fn start_preview(&self, serial: &str) -> AdbResult<PreviewSession> {
        self.claim(serial, CaptureKind::Preview).await?;
        match PreviewSession::start(self.client.clone(), serial).await {
            Ok(session) => Ok(session),
            Err(e) => {
                self.release(serial, CaptureKind::Preview).await;
                Err(e)
            }
        }
    }

    pub async fn stop_preview(&self, session: PreviewSession) -> crate::capture::PreviewStopCause {
        let serial = session.serial.clone();
        let cause = session.stop().await;
        self.release(&serial, CaptureKind::Preview).await;
        cause
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_and_preview_mutually_exclude() {
        let manager = CaptureManager::new(Arc::new(AdbClient::with_address("127.0.0.1", 1)));
        manager
            .claim("emulator-5554", CaptureKind::Recording)
            .await
            .unwrap();

        let result = manager.claim("emulator-5554", CaptureKind::Preview).await;
        assert!(matches!(result, Err(AdbError::AlreadyInProgress { .. })));
    }

    #[tokio::test]
    async fn test_same_kind_claim_twice_fails() {
        let manager = CaptureManager::new(Arc::new(AdbClient::with_address("127.0.0.1", 1)));
        manager
            .claim("emulator-5554", CaptureKind::Recording)
            .await
            .unwrap();
        let result = manager.claim("emulator-5554", CaptureKind::Recording).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_independent_devices_dont_conflict() {
        let manager = CaptureManager::new(Arc::new(AdbClient::with_address("127.0.0.1", 1)));
        manager
            .claim("emulator-5554", CaptureKind::Recording)
            .await
            .unwrap();
        manager
            .claim("emulator-5556", CaptureKind::Recording)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_preloaded_empty_by_default() {
        let manager = CaptureManager::new(Arc::new(AdbClient::with_address("127.0.0.1", 1)));
        assert!(manager.preloaded("emulator-5554").await.is_none());
    }

    #[tokio::test]
    async fn test_release_allows_reclaim() {
        let manager = CaptureManager::new(Arc::new(AdbClient::with_address("127.0.0.1", 1)));
        manager
            .claim("emulator-5554", CaptureKind::Recording)
            .await
            .unwrap();
        manager.release("emulator-5554", CaptureKind::Recording).await;
        manager
            .claim("emulator-5554", CaptureKind::Recording)
            .await
            .unwrap();
    }
}
