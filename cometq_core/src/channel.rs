//! Reserved Bayeux channels.

use core::fmt;

use serde::{Serialize, Serializer};

/// A channel a frame can be published on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// `/meta/handshake`: negotiates a client id.
    Handshake,

    /// `/meta/subscribe`: registers interest in a message channel.
    Subscribe,

    /// `/meta/connect`: the long-poll request.
    Connect,

    /// `/meta/disconnect`: ends the session.
    Disconnect,

    /// `/messaging`: every query result is pushed here.
    Messaging,

    /// `/service/query`: queries are published here.
    Query,
}

impl Channel {
    /// The channel path as it appears in frames.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Handshake => "/meta/handshake",
            Self::Subscribe => "/meta/subscribe",
            Self::Connect => "/meta/connect",
            Self::Disconnect => "/meta/disconnect",
            Self::Messaging => "/messaging",
            Self::Query => "/service/query",
        }
    }

    /// The suffix appended to the comet endpoint when publishing on this channel.
    #[must_use]
    pub const fn endpoint_suffix(self) -> Option<&'static str> {
        match self {
            Self::Handshake => Some("handshake"),
            Self::Connect => Some("connect"),
            Self::Subscribe | Self::Disconnect | Self::Messaging | Self::Query => None,
        }
    }

    /// Look up a reserved channel by path.
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        [
            Self::Handshake,
            Self::Subscribe,
            Self::Connect,
            Self::Disconnect,
            Self::Messaging,
            Self::Query,
        ]
        .into_iter()
        .find(|c| c.path() == path)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl Serialize for Channel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.path())
    }
}
