//! Wire frames.
//!
//! Every HTTP exchange carries a JSON array. Requests hold exactly one
//! [`OutboundFrame`]; responses hold zero or more [`ServerFrame`]s.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::{CONNECTION_TYPE, channel::Channel, id::ClientId};

/// A frame sent to the server.
///
/// Channel-specific fields (handshake negotiation, `subscription`, `data`)
/// are flattened into the top level of the frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundFrame {
    /// Channel the frame is published on.
    pub channel: Channel,

    /// Message id, unique and increasing per session.
    pub id: u64,

    /// Always [`CONNECTION_TYPE`].
    #[serde(rename = "connectionType")]
    pub connection_type: &'static str,

    /// Present once a handshake has assigned one.
    #[serde(rename = "clientId", skip_serializing_if = "Option::is_none")]
    pub client_id: Option<ClientId>,

    /// Channel-specific fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl OutboundFrame {
    /// Build a frame. Prefer [`Session::frame`](crate::session::Session::frame),
    /// which assigns the id and client id.
    #[must_use]
    pub fn new(
        channel: Channel,
        id: u64,
        client_id: Option<ClientId>,
        fields: Map<String, Value>,
    ) -> Self {
        Self {
            channel,
            id,
            connection_type: CONNECTION_TYPE,
            client_id,
            fields,
        }
    }
}

/// Server advice attached to a frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advice {
    /// Set when the server sees several clients sharing one browser/cookie session.
    #[serde(
        rename = "multiple-clients",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub multiple_clients: Option<bool>,

    /// Long-poll hold time in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Delay before the next poll in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,

    /// Reconnect policy (`retry`, `handshake`, `none`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect: Option<String>,
}

/// A frame received from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerFrame {
    /// Channel the frame was delivered on.
    pub channel: String,

    /// Whether the request this frame answers succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successful: Option<bool>,

    /// Assigned client id (handshake responses).
    #[serde(rename = "clientId", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<ClientId>,

    /// Error description for unsuccessful frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Server advice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advice: Option<Advice>,

    /// Application payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ServerFrame {
    /// An empty frame on `channel`.
    #[must_use]
    pub fn on(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            successful: None,
            client_id: None,
            error: None,
            advice: None,
            data: None,
        }
    }

    /// Whether the server explicitly marked this frame unsuccessful.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        self.successful == Some(false)
    }

    /// Whether the frame carries `multiple-clients` advice.
    #[must_use]
    pub fn advises_multiple_clients(&self) -> bool {
        self.advice
            .as_ref()
            .and_then(|a| a.multiple_clients)
            .unwrap_or(false)
    }
}

/// Problem encoding or decoding a frame batch.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The frame could not be serialized.
    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),

    /// The body is not a JSON array of frames.
    #[error("malformed frame batch: {0}")]
    Malformed(#[source] serde_json::Error),
}

/// Encode `frame` as a singleton batch.
///
/// # Errors
///
/// Returns [`FrameError::Encode`] if serialization fails.
pub fn encode_batch(frame: &OutboundFrame) -> Result<Vec<u8>, FrameError> {
    serde_json::to_vec(&[frame]).map_err(FrameError::Encode)
}

/// Decode a response body into frames.
///
/// # Errors
///
/// Returns [`FrameError::Malformed`] unless the body is a JSON array of frame objects.
pub fn decode_batch(body: &[u8]) -> Result<Vec<ServerFrame>, FrameError> {
    serde_json::from_slice(body).map_err(FrameError::Malformed)
}

/// Fields of the handshake frame.
#[must_use]
pub fn handshake_fields() -> Map<String, Value> {
    object(json!({
        "version": "1.0",
        "minimumVersion": "0.9",
        "supportedConnectionTypes": [CONNECTION_TYPE],
        "advice": { "timeout": 60_000, "interval": 0 },
    }))
}

/// Fields of a subscribe frame for `channel`.
#[must_use]
pub fn subscribe_fields(channel: Channel) -> Map<String, Value> {
    object(json!({ "subscription": channel.path() }))
}

/// Fields of a query frame wrapping `payload`.
#[must_use]
pub fn query_fields(payload: Map<String, Value>) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("data".into(), Value::Object(payload));
    fields
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testresult::TestResult;

    #[test]
    fn outbound_frame_is_a_singleton_array_with_flattened_fields() -> TestResult {
        let frame = OutboundFrame::new(
            Channel::Subscribe,
            3,
            Some(ClientId::new("c1")),
            subscribe_fields(Channel::Messaging),
        );
        let value: Value = serde_json::from_slice(&encode_batch(&frame)?)?;

        assert_eq!(
            value,
            json!([{
                "channel": "/meta/subscribe",
                "id": 3,
                "connectionType": "long-polling",
                "clientId": "c1",
                "subscription": "/messaging",
            }])
        );
        Ok(())
    }

    #[test]
    fn client_id_is_omitted_before_handshake() -> TestResult {
        let frame = OutboundFrame::new(Channel::Handshake, 1, None, handshake_fields());
        let value: Value = serde_json::from_slice(&encode_batch(&frame)?)?;

        assert!(value[0].get("clientId").is_none());
        assert_eq!(value[0]["minimumVersion"], "0.9");
        assert_eq!(value[0]["advice"]["timeout"], 60_000);
        Ok(())
    }

    #[test]
    fn decodes_sparse_server_frames() -> TestResult {
        let body = br#"[
            {"channel":"/meta/handshake","successful":true,"clientId":"abc","version":"1.0"},
            {"channel":"/meta/connect","advice":{"multiple-clients":true,"timeout":60000}},
            {"channel":"/messaging","data":{"type":"SPAWN","requestId":"7"}}
        ]"#;
        let frames = decode_batch(body)?;

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].client_id, Some(ClientId::new("abc")));
        assert!(frames[1].advises_multiple_clients());
        assert_eq!(frames[1].advice.as_ref().and_then(|a| a.timeout), Some(60_000));
        assert!(!frames[2].is_rejection());
        Ok(())
    }

    #[test]
    fn empty_array_is_a_valid_batch() -> TestResult {
        assert!(decode_batch(b"[]")?.is_empty());
        Ok(())
    }

    #[test]
    fn non_array_bodies_are_malformed() {
        assert!(matches!(
            decode_batch(b"{\"channel\":\"/meta/connect\"}"),
            Err(FrameError::Malformed(_))
        ));
        assert!(matches!(
            decode_batch(b"<html>Bad gateway</html>"),
            Err(FrameError::Malformed(_))
        ));
    }
}
