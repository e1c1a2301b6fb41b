//! # cometq HTTP Long Poll
//!
//! Issues queries to a Bayeux/CometD service and streams back lifecycle
//! messages about each query until it completes.
//!
//! ```text
//! ┌──────────┐                               ┌──────────┐
//! │  Client  │                               │  Server  │
//! └────┬─────┘                               └────┬─────┘
//!      │  POST …/handshake   [/meta/handshake]    │
//!      │ ───────────────────────────────────────► │
//!      │  [{successful, clientId}]                │
//!      │ ◄─────────────────────────────────────── │
//!      │  POST …/            [/meta/subscribe]    │
//!      │ ───────────────────────────────────────► │
//!      │  POST …/connect     [/meta/connect]      │
//!      │ ───────────────────────────────────────► │  held open
//!      │  POST …/            [/service/query]     │
//!      │ ───────────────────────────────────────► │
//!      │  [{/messaging SPAWN}, {START}, …]        │
//!      │ ◄─────────────────────────────────────── │  connect returns
//!      │  POST …/connect     [/meta/connect]      │
//!      │ ───────────────────────────────────────► │  re-issued at once
//! ```
//!
//! Every request body is a JSON array holding one frame; every response is
//! a JSON array of zero or more frames. Server pushes only ever arrive on the
//! long-poll (`/meta/connect`) responses.
//!
//! ## Features
//!
//! - `reqwest` (default): [`ReqwestTransport`](transport::reqwest_transport::ReqwestTransport)

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod client;
pub mod config;
pub mod error;
pub mod handle;
pub mod transport;

pub use client::{CometClient, ConnectOutcome};
pub use config::{ApiKey, ClientConfig};
pub use handle::QueryHandle;

/// Default service domain.
pub const DEFAULT_DOMAIN: &str = "import.io";

/// Path of the comet endpoint below the query host.
pub const COMET_PATH: &str = "/query/comet/";

/// Content type of protocol requests.
pub const JSON_CONTENT_TYPE: &str = "application/json;charset=UTF-8";

/// Content type of the login request.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Header naming the client implementation.
pub const CLIENT_NAME_HEADER: &str = "import-io-client";

/// Header carrying the client version.
pub const CLIENT_VERSION_HEADER: &str = "import-io-client-version";
