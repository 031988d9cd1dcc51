use crate::link::forwarder::LinkConnection;
use crate::link::record::LinkRecord;
use crate::link::{LinkError, LinkResult};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Literal handshake sent immediately after connecting; the device doesn't
/// reply to it directly, but a connection that never sends it never
/// receives anything past an initial `hello` record.
const HANDSHAKE: &[u8] = b"HelloSnapO\n";

/// Hard cap on a single NDJSON line. A line that exceeds this without a
/// newline is discarded wholesale and the reader resyncs on the next
/// newline, rather than growing the buffer without bound.
const MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

/// Something queued to be written to the connection as one NDJSON line.
#[derive(Debug, Clone)]
pub struct LinkOutbound(pub Value);

/// A live Snap-O Link connection: a reader task parsing NDJSON into
/// [`LinkRecord`]s, and a single writer task serializing outbound messages,
/// so callers never interleave two concurrent writers on one socket.
///
/// The writer side uses one `mpsc::Sender` feeding a single consumer task so
/// two callers never interleave writes on the same socket; the reader's
/// `read_until`-based framing hand-rolls line segmentation instead of
/// reaching for a streaming JSON parser.
pub struct LinkSession {
    pub descriptor: crate::link::LinkServerDescriptor,
    pub records: mpsc::Receiver<LinkRecord>,
    pub outbound: mpsc::Sender<LinkOutbound>,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
}

impl LinkSession {
    /// Perform the handshake and spawn the reader/writer tasks.
    pub async fn start(connection: LinkConnection) -> LinkResult<Self> {
        let LinkConnection {
            descriptor, stream, ..
        } = connection;
        let (mut read_half, mut write_half) = stream.into_split();

        write_half
            .write_all(HANDSHAKE)
            .await
            .map_err(LinkError::Io)?;

        let (records_tx, records_rx) = mpsc::channel(256);
        let reader_task = tokio::spawn(async move {
            run_reader(&mut read_half, records_tx).await;
        });

        let (outbound_tx, outbound_rx) = mpsc::channel(256);
        let writer_task = tokio::spawn(async move {
            run_writer(&mut write_half, outbound_rx).await;
        });

        Ok(Self {
            descriptor,
            records: records_rx,
            outbound: outbound_tx,
            reader_task,
            writer_task,
        })
    }

    /// Send a feature-scoped command to the device, e.g. requesting a
    /// capability be opened before events for it start flowing.
    pub async fn send_feature_command(&self, feature: &str, payload: Value) -> LinkResult<()> {
        let message = serde_json::json!({
            "type": "FeatureCommand",
            "feature": feature,
            "payload": payload,
        });
        self.outbound
            .send(LinkOutbound(message))
            .await
            .map_err(|_| LinkError::HandshakeFailed("writer task exited".into()))
    }

    /// Tell the device a feature is now being observed and should start
    /// emitting events for it.
    pub async fn send_feature_opened(&self, feature: &str) -> LinkResult<()> {
        let message = serde_json::json!({
            "type": "FeatureOpened",
            "feature": feature,
        });
        self.outbound
            .send(LinkOutbound(message))
            .await
            .map_err(|_| LinkError::HandshakeFailed("writer task exited".into()))
    }

    /// Abort both background tasks. Does not remove the port forward; the
    /// caller owns the `LinkConnection`'s teardown for that.
    pub fn shutdown(&self) {
        self.reader_task.abort();
        self.writer_task.abort();
    }
}

async fn run_reader(stream: &mut OwnedReadHalf, tx: mpsc::Sender<LinkRecord>) {
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();

    loop {
        line.clear();
        match read_capped_line(&mut reader, &mut line).await {
            Ok(true) => {}
            Ok(false) => {
                debug!("link reader: connection closed");
                return;
            }
            Err(e) => {
                warn!("link reader error: {}", e);
                return;
            }
        }

        if line.is_empty() {
            continue;
        }

        let text = String::from_utf8_lossy(&line);
        match LinkRecord::parse(&text) {
            Ok(record) => {
                trace!("link record: {:?}", record);
                if tx.send(record).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                warn!("malformed link record, skipping: {}", e);
            }
        }
    }
}

/// Read one NDJSON line into `out`, applying the size cap with
/// newline-resync. Returns `Ok(true)` if a line (possibly empty after
/// overflow-discard) was read, `Ok(false)` on clean EOF.
async fn read_capped_line<R: AsyncBufReadExt + Unpin>(
    reader: &mut R,
    out: &mut Vec<u8>,
) -> LinkResult<bool> {
    loop {
        let n = reader.read_until(b'\n', out).await.map_err(LinkError::Io)?;
        if n == 0 {
            return Ok(false);
        }
        if out.last() == Some(&b'\n') {
            out.pop();
        }
        if out.len() <= MAX_LINE_BYTES {
            return Ok(true);
        }

        warn!(
            "link line exceeded {} bytes, discarding and resyncing on the next newline",
            MAX_LINE_BYTES
        );
        // `read_until` reads until it finds the delimiter or hits EOF, so by
        // the time we're here the newline (if any) is already consumed;
        // discard the oversized buffer and let the loop read the next line.
        out.clear();
    }
}

async fn run_writer(stream: &mut OwnedWriteHalf, mut rx: mpsc::Receiver<LinkOutbound>) {
    while let Some(LinkOutbound(value)) = rx.recv().await {
        let mut line = match serde_json::to_vec(&value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("failed to serialize outbound link message: {}", e);
                continue;
            }
        };
        line.push(b'\n');
        if let Err(e) = stream.write_all(&line).await {
            warn!("link writer error, stopping: {}", e);
            return;
        }
    }
}
