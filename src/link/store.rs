use crate::link::record::NetworkEvent;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Everything observed so far for one network request, merged
/// order-independently: a `ResponseReceived` arriving before its
/// `WillBeSent` (out-of-order delivery over the Link connection is expected,
/// not a protocol violation) still ends up attached to the same record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestRecord {
    pub will_be_sent: Option<Value>,
    pub response_received: Option<Value>,
    pub failed: Option<Value>,
    pub stream_events: Vec<Value>,
    pub stream_closed: bool,
}

impl RequestRecord {
    /// A request is done once it has either a response or a failure; its
    /// absence means it's still in flight (or its `WillBeSent` hasn't
    /// arrived yet).
    pub fn is_complete(&self) -> bool {
        self.response_received.is_some() || self.failed.is_some()
    }

    /// Still relevant to a long-lived connection even once `is_complete()`:
    /// it's mid-stream, or its headers look like an event-stream response
    /// that just hasn't produced its first event yet.
    fn is_streaming(&self) -> bool {
        (!self.stream_events.is_empty() && !self.stream_closed) || self.looks_like_event_stream()
    }

    fn looks_like_event_stream(&self) -> bool {
        [&self.will_be_sent, &self.response_received]
            .into_iter()
            .flatten()
            .any(headers_contain_event_stream)
    }

    /// `stream_events`, sorted by `sequence` then `tWallMs` as exposed to
    /// consumers; storage order is arrival order, which is not the same
    /// thing for replayed or multiplexed streams.
    pub fn ordered_stream_events(&self) -> Vec<Value> {
        let mut events = self.stream_events.clone();
        events.sort_by_key(stream_event_sort_key);
        events
    }
}

fn stream_event_sort_key(event: &Value) -> (i64, i64) {
    let sequence = event.get("sequence").and_then(Value::as_i64).unwrap_or(i64::MAX);
    let wall_ms = event.get("tWallMs").and_then(Value::as_i64).unwrap_or(i64::MAX);
    (sequence, wall_ms)
}

fn headers_contain_event_stream(data: &Value) -> bool {
    let headers = data
        .get("request")
        .and_then(|r| r.get("headers"))
        .or_else(|| data.get("response").and_then(|r| r.get("headers")))
        .or_else(|| data.get("headers"));

    let Some(Value::Object(map)) = headers else {
        return false;
    };
    map.iter().any(|(k, v)| {
        (k.eq_ignore_ascii_case("content-type") || k.eq_ignore_ascii_case("accept"))
            && v.as_str()
                .is_some_and(|s| s.to_ascii_lowercase().contains("text/event-stream"))
    })
}

/// The lifecycle stages a WebSocket connection reports over the Link
/// protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebSocketLifecycle {
    WillOpen,
    Opened,
    Closing,
    Closed,
    Failed,
    CloseRequested,
    Cancelled,
}

/// Everything observed for one WebSocket connection: its current lifecycle
/// stage and the combined outgoing+incoming message log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebSocketRecord {
    pub lifecycle: Option<WebSocketLifecycle>,
    messages: Vec<Value>,
}

impl WebSocketRecord {
    /// The message log, sorted by `sequence` then wall-clock as exposed to
    /// consumers.
    pub fn ordered_messages(&self) -> Vec<Value> {
        let mut messages = self.messages.clone();
        messages.sort_by_key(stream_event_sort_key);
        messages
    }
}

/// Insertion-order-preserving table keyed by `(server_id, request_id)`.
/// Hand-rolled rather than pulling in an ordered-map crate for one use site:
/// a `Vec` of keys tracks arrival order, a `HashMap` gives O(1) lookup.
#[derive(Default)]
struct OrderedRequests {
    order: Vec<(String, String)>,
    records: HashMap<(String, String), RequestRecord>,
}

impl OrderedRequests {
    fn entry(&mut self, key: (String, String)) -> &mut RequestRecord {
        if !self.records.contains_key(&key) {
            self.order.push(key.clone());
            self.records.insert(key.clone(), RequestRecord::default());
        }
        self.records.get_mut(&key).expect("just inserted")
    }

    fn retain(&mut self, mut keep: impl FnMut(&RequestRecord) -> bool) {
        let records = &mut self.records;
        self.order.retain(|key| match records.get(key) {
            Some(record) if keep(record) => true,
            _ => {
                records.remove(key);
                false
            }
        });
    }

    fn retain_server(&mut self, server_id: &str) {
        self.order.retain(|(sid, _)| sid != server_id);
        self.records.retain(|(sid, _), _| sid != server_id);
    }
}

/// Per-`(server_id, request_id)` store of network events, plus a parallel
/// per-`(server_id, socket_id)` store for WebSocket connections. Both are
/// `RwLock`-guarded with snapshot accessors that return owned clones, so
/// callers never hold a lock across an await point or a UI render.
pub struct RequestStore {
    requests: RwLock<OrderedRequests>,
    websockets: RwLock<HashMap<(String, String), WebSocketRecord>>,
}

impl RequestStore {
    pub fn new() -> Self {
        Self {
            requests: RwLock::new(OrderedRequests::default()),
            websockets: RwLock::new(HashMap::new()),
        }
    }

    /// Merge one network event into its request's record.
    pub async fn merge(&self, server_id: &str, event: NetworkEvent) {
        let key = (server_id.to_string(), event.request_id().to_string());
        let mut requests = self.requests.write().await;
        let record = requests.entry(key);
        match event {
            NetworkEvent::WillBeSent { data, .. } => record.will_be_sent = Some(data),
            NetworkEvent::ResponseReceived { data, .. } => record.response_received = Some(data),
            NetworkEvent::Failed { data, .. } => record.failed = Some(data),
            NetworkEvent::StreamEvent { data, .. } => record.stream_events.push(data),
            NetworkEvent::StreamClosed { data, .. } => {
                record.stream_events.push(data);
                record.stream_closed = true;
            }
        }
    }

    /// An immutable clone of the current record for one request, if any.
    pub async fn snapshot(&self, server_id: &str, request_id: &str) -> Option<RequestRecord> {
        self.requests
            .read()
            .await
            .records
            .get(&(server_id.to_string(), request_id.to_string()))
            .cloned()
    }

    /// All request records currently known for a server, in the order their
    /// first event arrived.
    pub async fn snapshot_all(&self, server_id: &str) -> Vec<(String, RequestRecord)> {
        let requests = self.requests.read().await;
        requests
            .order
            .iter()
            .filter(|(sid, _)| sid == server_id)
            .filter_map(|key| requests.records.get(key).map(|r| (key.1.clone(), r.clone())))
            .collect()
    }

    /// Drop requests that are fully done: a response or failure has
    /// arrived, any stream has been explicitly closed, and nothing about it
    /// suggests it's still an open event-stream. In-flight, actively
    /// streaming, and likely-streaming (event-stream content type) requests
    /// are kept to bound memory use without losing state a consumer would
    /// still want.
    pub async fn clear_completed(&self) {
        self.requests
            .write()
            .await
            .retain(|record| !record.is_complete() || record.is_streaming());
    }

    /// Set a WebSocket connection's current lifecycle stage.
    pub async fn set_websocket_lifecycle(
        &self,
        server_id: &str,
        socket_id: &str,
        lifecycle: WebSocketLifecycle,
    ) {
        let key = (server_id.to_string(), socket_id.to_string());
        self.websockets
            .write()
            .await
            .entry(key)
            .or_default()
            .lifecycle = Some(lifecycle);
    }

    /// Append a frame (outgoing or incoming) to a WebSocket's message log.
    /// Frames should carry `sequence`/`tWallMs` fields; the log is exposed
    /// sorted by those, not by arrival order.
    pub async fn push_websocket_frame(&self, server_id: &str, socket_id: &str, frame: Value) {
        let key = (server_id.to_string(), socket_id.to_string());
        self.websockets
            .write()
            .await
            .entry(key)
            .or_default()
            .messages
            .push(frame);
    }

    pub async fn websocket_record(&self, server_id: &str, socket_id: &str) -> Option<WebSocketRecord> {
        self.websockets
            .read()
            .await
            .get(&(server_id.to_string(), socket_id.to_string()))
            .cloned()
    }

    pub async fn websocket_frames(&self, server_id: &str, socket_id: &str) -> Vec<Value> {
        self.websocket_record(server_id, socket_id)
            .await
            .map(|r| r.ordered_messages())
            .unwrap_or_default()
    }

    /// Remove all state for a server, e.g. once its Link connection closes.
    pub async fn clear_server(&self, server_id: &str) {
        self.requests.write().await.retain_server(server_id);
        self.websockets
            .write()
            .await
            .retain(|(sid, _), _| sid != server_id);
    }
}

impl Default for RequestStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn will_be_sent(request_id: &str) -> NetworkEvent {
        NetworkEvent::WillBeSent {
            request_id: request_id.to_string(),
            data: json!({"request": {"url": "https://example.com", "headers": {}}}),
        }
    }

    fn response_received(request_id: &str) -> NetworkEvent {
        NetworkEvent::ResponseReceived {
            request_id: request_id.to_string(),
            data: json!({"response": {"status": 200, "headers": {}}}),
        }
    }

    #[tokio::test]
    async fn test_merge_in_order() {
        let store = RequestStore::new();
        store.merge("srv1", will_be_sent("r1")).await;
        store.merge("srv1", response_received("r1")).await;

        let record = store.snapshot("srv1", "r1").await.unwrap();
        assert!(record.will_be_sent.is_some());
        assert!(record.response_received.is_some());
        assert!(record.is_complete());
    }

    #[tokio::test]
    async fn test_merge_out_of_order() {
        let store = RequestStore::new();
        // ResponseReceived arrives before WillBeSent.
        store.merge("srv1", response_received("r1")).await;
        store.merge("srv1", will_be_sent("r1")).await;

        let record = store.snapshot("srv1", "r1").await.unwrap();
        assert!(record.will_be_sent.is_some());
        assert!(record.response_received.is_some());
    }

    #[tokio::test]
    async fn test_clear_completed_keeps_in_flight() {
        let store = RequestStore::new();
        store.merge("srv1", will_be_sent("r1")).await;
        store.merge("srv1", will_be_sent("r2")).await;
        store.merge("srv1", response_received("r2")).await;

        store.clear_completed().await;

        assert!(store.snapshot("srv1", "r1").await.is_some());
        assert!(store.snapshot("srv1", "r2").await.is_none());
    }

    #[tokio::test]
    async fn test_clear_completed_keeps_open_stream() {
        let store = RequestStore::new();
        store.merge("srv1", will_be_sent("r1")).await;
        store.merge("srv1", response_received("r1")).await;
        store
            .merge(
                "srv1",
                NetworkEvent::StreamEvent {
                    request_id: "r1".to_string(),
                    data: json!({"sequence": 1, "tWallMs": 10}),
                },
            )
            .await;

        store.clear_completed().await;
        assert!(
            store.snapshot("srv1", "r1").await.is_some(),
            "a request with an open stream must survive clear_completed"
        );
    }

    #[tokio::test]
    async fn test_clear_completed_drops_closed_stream() {
        let store = RequestStore::new();
        store.merge("srv1", will_be_sent("r1")).await;
        store.merge("srv1", response_received("r1")).await;
        store
            .merge(
                "srv1",
                NetworkEvent::StreamClosed {
                    request_id: "r1".to_string(),
                    data: json!({"sequence": 1, "tWallMs": 10}),
                },
            )
            .await;

        store.clear_completed().await;
        assert!(store.snapshot("srv1", "r1").await.is_none());
    }

    #[tokio::test]
    async fn test_clear_completed_keeps_event_stream_content_type() {
        let store = RequestStore::new();
        store.merge("srv1", will_be_sent("r1")).await;
        store
            .merge(
                "srv1",
                NetworkEvent::ResponseReceived {
                    request_id: "r1".to_string(),
                    data: json!({"response": {"headers": {"Content-Type": "text/event-stream"}}}),
                },
            )
            .await;

        store.clear_completed().await;
        assert!(store.snapshot("srv1", "r1").await.is_some());
    }

    #[tokio::test]
    async fn test_stream_events_sorted_by_sequence_then_wall_time() {
        let store = RequestStore::new();
        store.merge("srv1", will_be_sent("r1")).await;
        for (sequence, wall_ms) in [(2, 5), (1, 20), (1, 10)] {
            store
                .merge(
                    "srv1",
                    NetworkEvent::StreamEvent {
                        request_id: "r1".to_string(),
                        data: json!({"sequence": sequence, "tWallMs": wall_ms}),
                    },
                )
                .await;
        }

        let record = store.snapshot("srv1", "r1").await.unwrap();
        let ordered = record.ordered_stream_events();
        let pairs: Vec<(i64, i64)> = ordered
            .iter()
            .map(|e| {
                (
                    e["sequence"].as_i64().unwrap(),
                    e["tWallMs"].as_i64().unwrap(),
                )
            })
            .collect();
        assert_eq!(pairs, vec![(1, 10), (1, 20), (2, 5)]);
    }

    #[tokio::test]
    async fn test_snapshot_all_preserves_insertion_order() {
        let store = RequestStore::new();
        store.merge("srv1", will_be_sent("r2")).await;
        store.merge("srv1", will_be_sent("r1")).await;
        store.merge("srv1", will_be_sent("r3")).await;

        let snapshot = store.snapshot_all("srv1").await;
        let ids: Vec<&str> = snapshot.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["r2", "r1", "r3"]);
    }

    #[tokio::test]
    async fn test_separate_servers_dont_collide() {
        let store = RequestStore::new();
        store.merge("srv1", will_be_sent("r1")).await;
        store.merge("srv2", will_be_sent("r1")).await;

        let snap1 = store.snapshot_all("srv1").await;
        let snap2 = store.snapshot_all("srv2").await;
        assert_eq!(snap1.len(), 1);
        assert_eq!(snap2.len(), 1);
    }

    #[tokio::test]
    async fn test_websocket_lifecycle_and_message_order() {
        let store = RequestStore::new();
        store
            .set_websocket_lifecycle("srv1", "ws1", WebSocketLifecycle::WillOpen)
            .await;
        store
            .set_websocket_lifecycle("srv1", "ws1", WebSocketLifecycle::Opened)
            .await;
        store
            .push_websocket_frame("srv1", "ws1", json!({"sequence": 2, "tWallMs": 5, "data": "b"}))
            .await;
        store
            .push_websocket_frame("srv1", "ws1", json!({"sequence": 1, "tWallMs": 1, "data": "a"}))
            .await;

        let record = store.websocket_record("srv1", "ws1").await.unwrap();
        assert_eq!(record.lifecycle, Some(WebSocketLifecycle::Opened));

        let frames = store.websocket_frames("srv1", "ws1").await;
        assert_eq!(frames[0]["data"], "a");
        assert_eq!(frames[1]["data"], "b");
    }

    #[tokio::test]
    async fn test_clear_server_removes_all_state() {
        let store = RequestStore::new();
        store.merge("srv1", will_be_sent("r1")).await;
        store
            .push_websocket_frame("srv1", "ws1", json!({"op": "text"}))
            .await;

        store.clear_server("srv1").await;

        assert!(store.snapshot("srv1", "r1").await.is_none());
        assert!(store.websocket_frames("srv1", "ws1").await.is_empty());
    }
}
