//! Classification of inbound frames.
//!
//! The server multiplexes session control and query lifecycle traffic over
//! the same response batches. [`Signal`] separates them so the engine can
//! match exhaustively instead of probing loose JSON fields.

use serde_json::{Value, json};

use crate::{UNKNOWN_CLIENT_ERROR, channel::Channel, frame::ServerFrame, id::RequestId};

/// What a single [`ServerFrame`] means to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// The server saw more than one client on this session.
    MultipleClients,

    /// The request this frame answers was refused.
    Rejected {
        /// The server no longer knows our client id.
        unknown_client: bool,

        /// Raw error string, if any.
        error: Option<String>,
    },

    /// A message about one of our queries.
    Push(QueryMessage),

    /// Anything else (acknowledgements, foreign channels).
    Ack,
}

impl Signal {
    /// Classify `frame`.
    ///
    /// Checks run in a fixed order: duplicate-session advice, rejection,
    /// query push. The first match wins.
    #[must_use]
    pub fn classify(frame: &ServerFrame) -> Self {
        if frame.advises_multiple_clients() {
            return Self::MultipleClients;
        }

        if frame.is_rejection() {
            return Self::Rejected {
                unknown_client: frame.error.as_deref() == Some(UNKNOWN_CLIENT_ERROR),
                error: frame.error.clone(),
            };
        }

        if frame.channel == Channel::Messaging.path()
            && let Some(data) = &frame.data
            && let Some(message) = QueryMessage::from_data(data.clone())
        {
            return Self::Push(message);
        }

        Self::Ack
    }
}

/// Lifecycle step reported for a query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    /// `SPAWN`: the server created another unit of work.
    Spawned,

    /// `INIT` or `START`: a unit of work began.
    Started,

    /// `STOP`: a unit of work completed.
    Completed,

    /// `MESSAGE`: result data, no effect on progress.
    Data,

    /// Synthetic: the client disconnected before the query finished.
    Disconnected,

    /// Any other type string (empty when absent).
    Other(String),
}

impl Lifecycle {
    /// Parse the `type` field of a push payload.
    #[must_use]
    pub fn from_type(kind: Option<&str>) -> Self {
        match kind {
            Some("SPAWN") => Self::Spawned,
            Some("INIT" | "START") => Self::Started,
            Some("STOP") => Self::Completed,
            Some("MESSAGE") => Self::Data,
            Some("DISCONNECT") => Self::Disconnected,
            Some(other) => Self::Other(other.to_owned()),
            None => Self::Other(String::new()),
        }
    }
}

/// A pushed message correlated to a query by its [`RequestId`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMessage {
    /// The query this message belongs to.
    pub request_id: RequestId,

    /// Parsed `type`.
    pub event: Lifecycle,

    /// The full `data` object as pushed by the server.
    pub data: Value,
}

impl QueryMessage {
    /// Build a message from a pushed `data` object.
    ///
    /// Returns `None` when there is no usable `requestId`. Numeric ids are
    /// accepted and compared by their decimal form.
    #[must_use]
    pub fn from_data(data: Value) -> Option<Self> {
        let request_id = match data.get("requestId")? {
            Value::String(s) => RequestId::new(s.as_str()),
            Value::Number(n) => RequestId::new(n.to_string()),
            _ => return None,
        };
        let event = Lifecycle::from_type(data.get("type").and_then(Value::as_str));

        Some(Self {
            request_id,
            event,
            data,
        })
    }

    /// The synthetic message delivered to queries cut short by a disconnect.
    #[must_use]
    pub fn disconnected(request_id: RequestId) -> Self {
        let data = json!({ "type": "DISCONNECT", "requestId": request_id.as_str() });
        Self {
            request_id,
            event: Lifecycle::Disconnected,
            data,
        }
    }

    /// Result rows carried by a `MESSAGE`, if any.
    #[must_use]
    pub fn results(&self) -> Option<&Value> {
        self.field("results")
    }

    /// Error classification reported by the remote service, if any.
    #[must_use]
    pub fn error_type(&self) -> Option<&Value> {
        self.field("errorType")
    }

    // The service nests the payload one level down (`data.data.results`);
    // look there too.
    fn field(&self, name: &str) -> Option<&Value> {
        self.data
            .get(name)
            .or_else(|| self.data.get("data").and_then(|inner| inner.get(name)))
    }
}
