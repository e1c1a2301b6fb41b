//! Per-client session state.
//!
//! A [`Session`] holds the negotiated client id, the connection state, and the
//! message id counter. State only moves through the transition methods below;
//! each one refuses to act from a state where the transition makes no sense.
//!
//! ```text
//!                begin_connect             mark_connected
//! Disconnected ──────────────► Connecting ──────────────► Connected
//!    ▲    ▲                        │                          │
//!    │    └──── abort_connect ─────┘                          │ begin_disconnect
//!    │                                                        ▼ (from any state)
//!    └───────────────── finish_disconnect ─────────────── Disconnecting
//! ```

use serde_json::{Map, Value};

use crate::{channel::Channel, frame::OutboundFrame, id::ClientId};

/// Where the client is in its connection lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No session.
    #[default]
    Disconnected,

    /// Handshake/subscribe in flight.
    Connecting,

    /// Subscribed; the long-poll loop is running.
    Connected,

    /// Tearing down; new requests are refused and rejections ignored.
    Disconnecting,
}

/// Outcome of [`Session::begin_disconnect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectStart {
    /// Teardown started. Holds the client id to send the disconnect frame with.
    Started(Option<ClientId>),

    /// Another teardown is already running.
    AlreadyDisconnecting,
}

/// Session store for one client.
#[derive(Debug, Clone)]
pub struct Session {
    client_id: Option<ClientId>,
    state: ConnectionState,
    next_message_id: u64,
    epoch: u64,
}

impl Session {
    /// A fresh, disconnected session. Message ids start at 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            client_id: None,
            state: ConnectionState::Disconnected,
            next_message_id: 1,
            epoch: 0,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// The negotiated client id, if any.
    #[must_use]
    pub const fn client_id(&self) -> Option<&ClientId> {
        self.client_id.as_ref()
    }

    /// Counter bumped whenever a poll loop starts or a disconnect begins.
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Build the next outbound frame on `channel`.
    pub fn frame(&mut self, channel: Channel, fields: Map<String, Value>) -> OutboundFrame {
        let id = self.next_message_id;
        self.next_message_id += 1;
        OutboundFrame::new(channel, id, self.client_id.clone(), fields)
    }

    /// Move from `Disconnected` to `Connecting`.
    ///
    /// # Errors
    ///
    /// Returns the current state if it is not `Disconnected`.
    pub const fn begin_connect(&mut self) -> Result<(), ConnectionState> {
        match self.state {
            ConnectionState::Disconnected => {
                self.state = ConnectionState::Connecting;
                Ok(())
            }
            other => Err(other),
        }
    }

    /// Store the client id from a successful handshake.
    ///
    /// Returns `false` (and stores nothing) if a disconnect overtook the connect.
    pub fn establish(&mut self, client_id: ClientId) -> bool {
        if self.state != ConnectionState::Connecting {
            return false;
        }
        self.client_id = Some(client_id);
        true
    }

    /// Move from `Connecting` to `Connected`, returning the epoch the new poll loop owns.
    ///
    /// Returns `None` if a disconnect overtook the connect.
    pub const fn mark_connected(&mut self) -> Option<u64> {
        if !matches!(self.state, ConnectionState::Connecting) {
            return None;
        }
        self.state = ConnectionState::Connected;
        self.epoch += 1;
        Some(self.epoch)
    }

    /// Give up on a failed connect.
    pub fn abort_connect(&mut self) {
        if self.state == ConnectionState::Connecting {
            self.state = ConnectionState::Disconnected;
            self.client_id = None;
        }
    }

    /// Start tearing the session down from any state.
    ///
    /// Any running poll loop stops at its next check.
    pub fn begin_disconnect(&mut self) -> DisconnectStart {
        if self.state == ConnectionState::Disconnecting {
            return DisconnectStart::AlreadyDisconnecting;
        }
        self.state = ConnectionState::Disconnecting;
        self.epoch += 1;
        DisconnectStart::Started(self.client_id.clone())
    }

    /// Complete a teardown: forget the client id and go back to `Disconnected`.
    pub fn finish_disconnect(&mut self) {
        self.client_id = None;
        self.state = ConnectionState::Disconnected;
    }

    /// Whether the poll loop started at `epoch` should issue another connect.
    #[must_use]
    pub fn is_polling(&self, epoch: u64) -> bool {
        self.state == ConnectionState::Connected && self.epoch == epoch
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
