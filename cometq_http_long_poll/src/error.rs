//! Error types for the HTTP long-poll engine.
//!
//! None of these cross the public API as a panic: every failure surfaces as
//! one of the `Err` variants below, or as a log line when it happens on a
//! background task.

use cometq_core::{Channel, frame::FrameError};
use thiserror::Error;

/// A single protocol exchange failed at the transport level.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The HTTP request itself failed.
    #[error("HTTP request error: {0}")]
    Transport(#[source] Box<dyn core::error::Error + Send + Sync>),

    /// The server answered with something other than 200.
    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus {
        /// The HTTP status code.
        status: u16,
        /// The response body, lossily decoded.
        body: String,
    },

    /// The body could not be encoded or decoded as a frame batch.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// The request URL could not be built.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl RequestError {
    pub(crate) fn transport(err: impl core::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Box::new(err))
    }
}

/// Problem while connecting.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The handshake exchange failed.
    #[error("handshake failed: {0}")]
    Handshake(#[source] RequestError),

    /// The server answered the handshake without granting a client id.
    #[error("handshake rejected: {reason}")]
    HandshakeRejected {
        /// Server error string, or a description of what was missing.
        reason: String,
    },

    /// Subscribing was attempted without a client id.
    #[error("subscribe requires a completed handshake")]
    NotHandshaken,

    /// The subscribe exchange failed.
    #[error("subscribe failed: {0}")]
    Subscribe(#[source] RequestError),

    /// The server refused the subscription.
    #[error("subscription to {channel} rejected: {reason}")]
    SubscribeRejected {
        /// The channel we tried to subscribe to.
        channel: Channel,
        /// Server error string.
        reason: String,
    },

    /// A disconnect started while the connect was in flight.
    #[error("disconnected while connecting")]
    Interrupted,

    /// A disconnect is still running.
    #[error("a disconnect is in progress")]
    Disconnecting,
}

/// Problem while issuing a query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// `connect()` has not completed.
    #[error("not connected: call connect() before query()")]
    NotConnected,

    /// `connect()` is still running.
    #[error("still connecting: wait for connect() to finish before query()")]
    StillConnecting,

    /// Query payloads must be JSON objects.
    #[error("query payload must be a JSON object")]
    InvalidPayload,

    /// The query frame could not be published.
    #[error("failed to publish query: {0}")]
    Publish(#[from] RequestError),

    /// The server refused the query frame.
    #[error("query rejected: {reason}")]
    Rejected {
        /// Server error string.
        reason: String,
    },
}

/// Problem while logging in.
#[derive(Debug, Error)]
pub enum LoginError {
    /// The login request failed.
    #[error("login request failed: {0}")]
    Request(#[from] RequestError),

    /// The server refused the credentials.
    #[error("login rejected with status {status}")]
    Rejected {
        /// The HTTP status code.
        status: u16,
    },
}

/// Problem building a client from its configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The comet endpoint or login URL is not a valid URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    /// The transport could not be constructed.
    #[error("failed to build transport: {0}")]
    Transport(#[source] Box<dyn core::error::Error + Send + Sync>),
}
