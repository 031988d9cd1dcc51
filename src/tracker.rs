use crate::client::AdbClient;
use crate::device::{DeviceInfo, DeviceState};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{sleep, Duration};
use tracing::{debug, trace, warn};

/// How long to wait before reconnecting a `track-devices` stream that ended
/// (either the ADB server restarted, or the connection dropped).
const RESTART_BACKOFF: Duration = Duration::from_millis(300);

/// Capacity of the broadcast channel; a slow subscriber that falls behind by
/// this many snapshots sees `RecvError::Lagged` rather than blocking the
/// tracker loop, since publishers must never block on readers.
const CHANNEL_CAPACITY: usize = 16;

/// Background task that keeps a live, enriched device list by following
/// `host:track-devices`, restarting the stream if it ends, and memoizing
/// per-serial `getprop` lookups so they aren't repeated on every snapshot.
/// Runs as a `tokio::spawn`ed task publishing over a `tokio::sync::broadcast`
/// channel so any number of subscribers can follow the same live list.
pub struct DeviceTracker {
    client: Arc<AdbClient>,
    tx: broadcast::Sender<Vec<DeviceInfo>>,
    enriched: RwLock<HashMap<String, DeviceInfo>>,
}

impl DeviceTracker {
    pub fn new(client: Arc<AdbClient>) -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Arc::new(Self {
            client,
            tx,
            enriched: RwLock::new(HashMap::new()),
        })
    }

    /// Subscribe to device-list snapshots. Every snapshot is a full,
    /// ordered, deduped list, not a diff.
    pub fn subscribe(&self) -> broadcast::Receiver<Vec<DeviceInfo>> {
        self.tx.subscribe()
    }

    /// Spawn the background loop. The returned handle runs until the
    /// process exits; the loop itself never returns early on a single
    /// dropped connection, it just backs off and reconnects.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(self: Arc<Self>) {
        loop {
            match self.client.track_devices().await {
                Ok(stream) => {
                    debug!("track-devices stream established");
                    self.consume(stream).await;
                    warn!("track-devices stream ended, reconnecting");
                }
                Err(e) => {
                    warn!("failed to open track-devices stream: {}", e);
                }
            }
            sleep(RESTART_BACKOFF).await;
        }
    }

    async fn consume(self: &Arc<Self>, mut stream: tokio::net::TcpStream) {
        loop {
            match AdbClient::read_length_prefixed(&mut stream).await {
                Ok(data) => {
                    let text = String::from_utf8_lossy(&data);
                    let raw = DeviceInfo::parse_device_list(&text);
                    trace!("track-devices snapshot: {} device(s)", raw.len());
                    let enriched = self.enrich_all(raw).await;
                    // A receiver-less send (no subscribers yet) is not an error.
                    let _ = self.tx.send(enriched);
                }
                Err(_) => break,
            }
        }
    }

    /// Merge a freshly parsed snapshot with memoized `getprop` results,
    /// querying any device seen for the first time (or re-seen after being
    /// offline) and caching the result.
    ///
    /// Rows not in the `device` state are dropped entirely here: they are
    /// never exposed to subscribers and never cached, matching a device in
    /// `unauthorized`/`offline`/etc. being absent from the published list.
    async fn enrich_all(self: &Arc<Self>, raw: Vec<DeviceInfo>) -> Vec<DeviceInfo> {
        let mut result = Vec::with_capacity(raw.len());
        for info in raw {
            if info.state != DeviceState::Device {
                continue;
            }
            let cached = self.enriched.read().await.get(&info.serial).cloned();
            let merged = match cached {
                Some(mut cached) if cached.is_enriched() => {
                    cached.state = info.state;
                    cached
                }
                _ => {
                    let enriched = self.query_properties(info).await;
                    self.enriched
                        .write()
                        .await
                        .insert(enriched.serial.clone(), enriched.clone());
                    enriched
                }
            };
            result.push(merged);
        }
        // Ordered, deduped by construction: one entry per distinct serial,
        // in the order ADB emitted them in the source snapshot.
        result
    }

    async fn query_properties(&self, mut info: DeviceInfo) -> DeviceInfo {
        let serial = Some(info.serial.as_str());
        if let Ok(v) = self.client.getprop(serial, "ro.product.model").await {
            if !v.is_empty() {
                info.model = Some(v);
            }
        }
        if let Ok(v) = self
            .client
            .getprop(serial, "ro.build.version.release")
            .await
        {
            if !v.is_empty() {
                info.android_release = Some(v);
            }
        }
        if let Ok(v) = self
            .client
            .getprop(serial, "ro.product.manufacturer")
            .await
        {
            if !v.is_empty() {
                info.manufacturer = Some(v);
            }
        }
        if let Ok(v) = self.client.getprop(serial, "ro.boot.qemu.avd_name").await {
            if !v.is_empty() {
                info.avd_name = Some(v);
            }
        }
        info
    }
}
