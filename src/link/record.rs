use serde_json::Value;

/// A single NDJSON record read off a Snap-O Link connection.
///
/// Parsed by hand from the record's `type` field rather than via a single
/// `#[serde(tag = "type")]` enum, since an internally-tagged enum has no
/// graceful way to keep the raw payload for a tag it doesn't recognize. The
/// `Unknown` fallback variant exists precisely for forward compatibility with
/// record types this client doesn't know about yet.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkRecord {
    Hello {
        schema_version: Value,
    },
    AppIcon {
        payload: Value,
    },
    ReplayComplete {
        payload: Value,
    },
    FeatureEvent {
        feature: String,
        payload: Value,
    },
    /// A syntactically valid JSON object whose `type` wasn't recognized.
    Unknown(Value),
}

impl LinkRecord {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(line)?;
        let record_type = value.get("type").and_then(Value::as_str).unwrap_or("");

        Ok(match record_type {
            "Hello" => LinkRecord::Hello {
                schema_version: value
                    .get("schemaVersion")
                    .cloned()
                    .unwrap_or(Value::Null),
            },
            "AppIcon" => LinkRecord::AppIcon { payload: value },
            "ReplayComplete" => LinkRecord::ReplayComplete { payload: value },
            "FeatureEvent" => {
                let feature = value
                    .get("feature")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string();
                let payload = value.get("payload").cloned().unwrap_or(Value::Null);
                LinkRecord::FeatureEvent { feature, payload }
            }
            _ => LinkRecord::Unknown(value),
        })
    }
}

/// Checks whether an incoming `Hello.schemaVersion` (which may be a JSON
/// number or a dotted-numeric string) indicates a schema newer than this
/// crate supports.
///
/// Numbers compare directly. Strings are split on `.` and compared
/// component-by-component as integers, using only the leading component
/// against `supported` (a coarse major-version gate — finer-grained minor
/// version skew is expected to stay wire-compatible). Anything else —
/// non-numeric strings, booleans, missing field — conservatively reports
/// "newer than supported" rather than silently assuming compatibility.
pub fn schema_newer_than_supported(schema_version: &Value, supported: u64) -> bool {
    match schema_version {
        Value::Number(n) => n.as_u64().map(|v| v > supported).unwrap_or(true),
        Value::String(s) => {
            let components: Vec<u64> = s.split('.').filter_map(|part| part.parse().ok()).collect();
            match components.first() {
                Some(major) => *major > supported,
                None => true,
            }
        }
        _ => true,
    }
}

/// CDP-style network events nested inside a `FeatureEvent` whose `feature`
/// field is `"network"`: `{"method":"Network.<name>","params":{"requestId":…}}`.
/// Only the fields needed for request correlation and stream-lifecycle
/// tracking are interpreted; `data` keeps the raw `params` object.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    WillBeSent { request_id: String, data: Value },
    ResponseReceived { request_id: String, data: Value },
    Failed { request_id: String, data: Value },
    StreamEvent { request_id: String, data: Value },
    StreamClosed { request_id: String, data: Value },
}

impl NetworkEvent {
    pub fn request_id(&self) -> &str {
        match self {
            NetworkEvent::WillBeSent { request_id, .. }
            | NetworkEvent::ResponseReceived { request_id, .. }
            | NetworkEvent::Failed { request_id, .. }
            | NetworkEvent::StreamEvent { request_id, .. }
            | NetworkEvent::StreamClosed { request_id, .. } => request_id,
        }
    }

    /// Parse a `FeatureEvent`'s payload as a CDP-style network event:
    /// `{"method":"Network.requestWillBeSent","params":{"requestId":"r1",…}}`.
    /// Returns `None` if the payload doesn't carry a recognized `method` or
    /// a `params.requestId` — callers should treat that as "ignore", not as
    /// a protocol error, since new event kinds are expected to show up
    /// before this crate knows about them.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let method = payload.get("method")?.as_str()?;
        let params = payload.get("params").cloned().unwrap_or(Value::Null);
        let request_id = params.get("requestId")?.as_str()?.to_string();

        match method {
            "Network.requestWillBeSent" => Some(NetworkEvent::WillBeSent {
                request_id,
                data: params,
            }),
            "Network.responseReceived" => Some(NetworkEvent::ResponseReceived {
                request_id,
                data: params,
            }),
            "Network.loadingFailed" => Some(NetworkEvent::Failed {
                request_id,
                data: params,
            }),
            "Network.eventSourceMessageReceived" => Some(NetworkEvent::StreamEvent {
                request_id,
                data: params,
            }),
            "Network.loadingFinished" => Some(NetworkEvent::StreamClosed {
                request_id,
                data: params,
            }),
            _ => None,
        }
    }
}
