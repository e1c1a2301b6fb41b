//! # cometq core
//!
//! Sans-IO building blocks for a Bayeux/CometD long-polling query client.
//!
//! Nothing in this crate performs I/O. It describes what goes on the wire
//! ([`frame`]), what comes back ([`push`]), the per-client [`session`] state,
//! and the [`tracker`] that decides when a remote query has finished.
//!
//! ```text
//!  outbound                               inbound
//!  ────────                               ───────
//!  Session::frame ──► encode_batch        decode_batch ──► ServerFrame::classify
//!                                                              │
//!                                      ┌───────────────────────┼────────────────┐
//!                                      ▼                       ▼                ▼
//!                              MultipleClients / Rejected     Push            Ack
//!                              (session handling)              │
//!                                                              ▼
//!                                                 QueryTracker::on_message
//!                                                              │
//!                                                              ▼
//!                                                  QueryUpdate { finished, .. }
//! ```

pub mod backoff;
pub mod channel;
pub mod frame;
pub mod id;
pub mod push;
pub mod session;
pub mod tracker;

pub use channel::Channel;
pub use id::{ClientId, RequestId};
pub use push::{Lifecycle, QueryMessage, Signal};
pub use session::{ConnectionState, Session};
pub use tracker::{QueryTracker, QueryUpdate};

/// The only connection type this client negotiates.
pub const CONNECTION_TYPE: &str = "long-polling";

/// Error string the server uses when it no longer recognises a client id.
pub const UNKNOWN_CLIENT_ERROR: &str = "402::Unknown client";
