//! The protocol engine.
//!
//! [`CometClient`] owns the [`Session`] and the [`QueryTracker`] behind one
//! lock. Every response batch, whether it answers a handshake, a query
//! publish or a long-poll, is dispatched under that lock, so lifecycle
//! counters are applied in exactly the order the transport delivered them.
//! A long-poll that returns after its session was replaced only delivers
//! query pushes; its session advice belongs to a client id that is gone.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                        CometClient                         │
//! │                                                            │
//! │  connect() ──► handshake ──► subscribe ──► spawn poll_loop │
//! │  query()   ──► tracker.register ──► POST /service/query    │
//! │                                                            │
//! │  poll_loop ──► POST /meta/connect ──► dispatch_batch ─┐    │
//! │       ▲                                               │    │
//! │       └───────────── while Connected ◄────────────────┘    │
//! │                                                            │
//! │  dispatch_batch: MultipleClients ──► teardown              │
//! │                  402 Unknown client ──► teardown+reconnect │
//! │                  Push ──► tracker.on_message ──► handle    │
//! └────────────────────────────────────────────────────────────┘
//! ```

mod poll_loop;

use std::sync::Arc;

use async_lock::Mutex;
use cometq_core::{
    Channel, ClientId, ConnectionState, QueryTracker, RequestId, Session, Signal,
    frame::{self, OutboundFrame, ServerFrame},
    session::DisconnectStart,
    tracker::UnknownRequest,
};
use futures::{FutureExt, future::BoxFuture};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
    CLIENT_NAME_HEADER, CLIENT_VERSION_HEADER, FORM_CONTENT_TYPE, JSON_CONTENT_TYPE,
    config::ClientConfig,
    error::{ConfigError, ConnectError, LoginError, QueryError, RequestError},
    handle::QueryHandle,
    transport::HttpTransport,
};

use poll_loop::poll_loop;

/// What [`CometClient::connect`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Handshake and subscribe succeeded; the poll loop is running.
    Connected,

    /// Nothing to do, already connected.
    AlreadyConnected,

    /// Nothing to do, another connect is in flight.
    AlreadyConnecting,
}

/// What to do once a teardown has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AfterTeardown {
    Stay,
    Reconnect,
}

#[derive(Debug, Default)]
struct EngineState {
    session: Session,
    tracker: QueryTracker,

    /// Set by [`CometClient::disconnect`], cleared by the next successful
    /// [`CometClient::connect`]. An automatic reconnect never overrides it.
    disconnect_requested: bool,
}

impl EngineState {
    fn begin_disconnect(&mut self, finish_queries: bool) -> DisconnectStart {
        if finish_queries {
            let count = self.tracker.finish_all_disconnected();
            if count > 0 {
                info!(count, "finished outstanding queries on disconnect");
            }
        }
        self.session.begin_disconnect()
    }
}

#[derive(Debug)]
struct Inner<T> {
    config: ClientConfig,
    endpoint: Url,
    login_url: Url,
    transport: T,
    state: Mutex<EngineState>,
}

/// A Bayeux long-polling client for issuing queries.
///
/// Cheap to clone; clones share one session.
#[derive(Debug)]
pub struct CometClient<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for CometClient<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

#[cfg(feature = "reqwest")]
impl CometClient<crate::transport::reqwest_transport::ReqwestTransport> {
    /// Build a client on the default [`reqwest`] transport.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the endpoint is invalid or the HTTP client
    /// cannot be built.
    pub fn with_reqwest(config: ClientConfig) -> Result<Self, ConfigError> {
        let transport = crate::transport::reqwest_transport::ReqwestTransport::with_timeout(
            config.request_timeout,
        )
        .map_err(|e| ConfigError::Transport(Box::new(e)))?;
        Self::new(config, transport)
    }
}

impl<T: HttpTransport> CometClient<T> {
    /// Build a client. No network traffic happens until [`connect`](Self::connect).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEndpoint`] if the configured domain does not form a URL.
    pub fn new(config: ClientConfig, transport: T) -> Result<Self, ConfigError> {
        let endpoint = config.endpoint()?;
        let login_url = config.login_url()?;

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                endpoint,
                login_url,
                transport,
                state: Mutex::new(EngineState::default()),
            }),
        })
    }

    /// The comet endpoint this client talks to.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    /// The configuration the client was built with.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// The underlying transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// Current connection state.
    pub async fn state(&self) -> ConnectionState {
        self.inner.state.lock().await.session.state()
    }

    /// The client id negotiated by the last successful handshake.
    pub async fn client_id(&self) -> Option<ClientId> {
        self.inner.state.lock().await.session.client_id().cloned()
    }

    /// Number of queries still waiting to finish.
    pub async fn outstanding_queries(&self) -> usize {
        self.inner.state.lock().await.tracker.len()
    }

    /// Log in with a username and password.
    ///
    /// The session cookie the server sets is kept by the transport and
    /// authenticates later requests.
    ///
    /// # Errors
    ///
    /// Returns [`LoginError::Rejected`] for any status other than 200, or
    /// [`LoginError::Request`] if the request could not be made.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), LoginError> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("username", username)
            .append_pair("password", password)
            .finish();

        debug!(url = %self.inner.login_url, "logging in");
        let response = self
            .inner
            .transport
            .post(
                self.inner.login_url.as_str(),
                &[("content-type", FORM_CONTENT_TYPE)],
                body.into_bytes(),
            )
            .await
            .map_err(RequestError::transport)?;

        if response.status == 200 {
            info!("logged in");
            Ok(())
        } else {
            warn!(status = response.status, "login rejected");
            Err(LoginError::Rejected {
                status: response.status,
            })
        }
    }

    /// Handshake, subscribe to the messaging channel, and start the poll loop.
    ///
    /// Calls made while already connected or connecting do nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError`] if the handshake or subscribe fails, or if a
    /// disconnect interrupts the attempt. The loop is not started and the
    /// client is left disconnected.
    pub async fn connect(&self) -> Result<ConnectOutcome, ConnectError> {
        let begun = {
            let mut state = self.inner.state.lock().await;
            let begun = state.session.begin_connect();
            if begun.is_ok() {
                state.disconnect_requested = false;
            }
            begun
        };
        self.start(begun).await
    }

    /// Run a connect attempt that `begun` reports on.
    async fn start(
        &self,
        begun: Result<(), ConnectionState>,
    ) -> Result<ConnectOutcome, ConnectError> {
        match begun {
            Ok(()) => {}
            Err(ConnectionState::Connected) => return Ok(ConnectOutcome::AlreadyConnected),
            Err(ConnectionState::Connecting) => return Ok(ConnectOutcome::AlreadyConnecting),
            Err(ConnectionState::Disconnecting | ConnectionState::Disconnected) => {
                return Err(ConnectError::Disconnecting);
            }
        }

        info!(endpoint = %self.inner.endpoint, "connecting");
        match self.establish().await {
            Ok(epoch) => {
                tokio::spawn(poll_loop(self.clone(), epoch));
                info!("connected");
                Ok(ConnectOutcome::Connected)
            }
            Err(e) => {
                self.inner.state.lock().await.session.abort_connect();
                warn!(error = %e, "connect failed");
                Err(e)
            }
        }
    }

    async fn establish(&self) -> Result<u64, ConnectError> {
        let client_id = self.handshake().await?;
        if !self.inner.state.lock().await.session.establish(client_id) {
            return Err(ConnectError::Interrupted);
        }

        self.subscribe(Channel::Messaging).await?;

        self.inner
            .state
            .lock()
            .await
            .session
            .mark_connected()
            .ok_or(ConnectError::Interrupted)
    }

    /// Negotiate a client id.
    async fn handshake(&self) -> Result<ClientId, ConnectError> {
        let frames = self
            .exchange(Channel::Handshake, frame::handshake_fields())
            .await
            .map_err(ConnectError::Handshake)?;

        let first = frames.first().ok_or_else(|| ConnectError::HandshakeRejected {
            reason: "empty handshake response".into(),
        })?;

        if first.is_rejection() {
            return Err(ConnectError::HandshakeRejected {
                reason: first.error.clone().unwrap_or_default(),
            });
        }

        let client_id = first
            .client_id
            .clone()
            .ok_or_else(|| ConnectError::HandshakeRejected {
                reason: "no clientId in handshake response".into(),
            })?;

        debug!(%client_id, "handshake completed");
        Ok(client_id)
    }

    /// Subscribe to `channel`. Needs a client id from a prior handshake.
    async fn subscribe(&self, channel: Channel) -> Result<(), ConnectError> {
        if self.inner.state.lock().await.session.client_id().is_none() {
            return Err(ConnectError::NotHandshaken);
        }

        let frames = self
            .exchange(Channel::Subscribe, frame::subscribe_fields(channel))
            .await
            .map_err(ConnectError::Subscribe)?;

        if let Some(rejected) = frames.iter().find(|f| f.is_rejection()) {
            return Err(ConnectError::SubscribeRejected {
                channel,
                reason: rejected.error.clone().unwrap_or_default(),
            });
        }

        debug!(%channel, "subscribed");
        Ok(())
    }

    /// Finish every outstanding query with a `DISCONNECT` update, tell the
    /// server goodbye, and forget the session.
    ///
    /// Best effort: a failed disconnect request is logged, and the local
    /// session is cleared regardless.
    pub async fn disconnect(&self) {
        let start = {
            let mut state = self.inner.state.lock().await;
            state.disconnect_requested = true;
            state.begin_disconnect(true)
        };
        match start {
            DisconnectStart::Started(client_id) => self.finish_disconnect(client_id).await,
            DisconnectStart::AlreadyDisconnecting => debug!("disconnect already in progress"),
        }
    }

    async fn finish_disconnect(&self, client_id: Option<ClientId>) {
        if client_id.is_some()
            && let Err(e) = self.exchange(Channel::Disconnect, Map::new()).await
        {
            warn!(error = %e, "disconnect request failed");
        }

        self.inner.transport.reset_session().await;
        self.inner.state.lock().await.session.finish_disconnect();
        info!("disconnected");
    }

    // Boxed so the future type does not depend on itself through
    // dispatch -> teardown -> start -> poll_loop -> dispatch.
    fn teardown(self, client_id: Option<ClientId>, after: AfterTeardown) -> BoxFuture<'static, ()> {
        async move {
            self.finish_disconnect(client_id).await;
            if after == AfterTeardown::Stay {
                return;
            }

            let begun = {
                let mut state = self.inner.state.lock().await;
                if state.disconnect_requested {
                    info!("disconnect requested during reconnect, staying disconnected");
                    return;
                }
                state.session.begin_connect()
            };

            match self.start(begun).await {
                Ok(outcome) => {
                    let outstanding = self.outstanding_queries().await;
                    info!(?outcome, outstanding, "reconnected");
                }
                Err(e) => {
                    let count = self
                        .inner
                        .state
                        .lock()
                        .await
                        .tracker
                        .finish_all_disconnected();
                    error!(error = %e, count, "reconnect failed, finished outstanding queries");
                }
            }
        }
        .boxed()
    }

    /// Issue a query. Updates for it arrive on the returned handle.
    ///
    /// A fresh request id is written into `payload` as `requestId` and the
    /// payload is published as `{ "data": payload }` on the query channel.
    /// This does not wait for the query to finish.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::NotConnected`]/[`QueryError::StillConnecting`]
    /// without sending anything unless [`connect`](Self::connect) has
    /// completed, [`QueryError::InvalidPayload`] for non-object payloads, and
    /// [`QueryError::Publish`]/[`QueryError::Rejected`] if the query frame
    /// was not accepted. No updates are ever delivered for a rejected query.
    pub async fn query(&self, payload: Value) -> Result<QueryHandle, QueryError> {
        let Value::Object(mut payload) = payload else {
            return Err(QueryError::InvalidPayload);
        };

        let (request_id, updates) = {
            let mut state = self.inner.state.lock().await;
            match state.session.state() {
                ConnectionState::Connected => {}
                ConnectionState::Connecting => {
                    warn!("wait for connect() to finish before calling query()");
                    return Err(QueryError::StillConnecting);
                }
                ConnectionState::Disconnected | ConnectionState::Disconnecting => {
                    warn!("call and wait for connect() before calling query()");
                    return Err(QueryError::NotConnected);
                }
            }

            loop {
                let request_id = RequestId::random();
                if let Some(updates) = state.tracker.register(request_id.clone()) {
                    break (request_id, updates);
                }
            }
        };

        payload.insert("requestId".into(), Value::String(request_id.to_string()));

        let published = match self
            .exchange(Channel::Query, frame::query_fields(payload))
            .await
        {
            Ok(frames) => frames
                .iter()
                .find(|f| f.channel == Channel::Query.path() && f.is_rejection())
                .map_or(Ok(()), |f| {
                    Err(QueryError::Rejected {
                        reason: f.error.clone().unwrap_or_default(),
                    })
                }),
            Err(e) => Err(QueryError::Publish(e)),
        };

        if let Err(e) = published {
            self.inner.state.lock().await.tracker.remove(&request_id);
            warn!(%request_id, error = %e, "query not accepted");
            return Err(e);
        }

        debug!(%request_id, "query published");
        Ok(QueryHandle::new(request_id, updates))
    }

    /// Apply a batch of server frames, in order.
    ///
    /// - `multiple-clients` advice tears the session down.
    /// - `402::Unknown client` while connected triggers one disconnect and
    ///   reconnect; outstanding queries survive it.
    /// - Other rejections are logged and skipped.
    /// - Query pushes update their query; pushes for unknown request ids are
    ///   logged and dropped.
    pub async fn dispatch_batch(&self, frames: &[ServerFrame]) {
        self.dispatch(frames, None).await;
    }

    /// Apply a batch returned to the poll loop started at `epoch`.
    ///
    /// Once that loop has been superseded its session is gone, so session
    /// advice and rejections in the batch are dropped. Query pushes are still
    /// delivered.
    async fn dispatch_polled(&self, frames: &[ServerFrame], epoch: u64) {
        self.dispatch(frames, Some(epoch)).await;
    }

    async fn dispatch(&self, frames: &[ServerFrame], poll_epoch: Option<u64>) {
        let mut state = self.inner.state.lock().await;

        for frame in frames {
            let stale = poll_epoch.is_some_and(|epoch| !state.session.is_polling(epoch));

            match Signal::classify(frame) {
                Signal::MultipleClients | Signal::Rejected { .. } if stale => {
                    debug!(channel = %frame.channel, "dropping session signal from a superseded poll");
                }
                Signal::MultipleClients => {
                    error!("multiple clients detected, disconnecting");
                    if let DisconnectStart::Started(client_id) = state.begin_disconnect(true) {
                        tokio::spawn(self.clone().teardown(client_id, AfterTeardown::Stay));
                    }
                }
                Signal::Rejected {
                    unknown_client,
                    error,
                } => {
                    if state.session.state() != ConnectionState::Connected {
                        debug!(channel = %frame.channel, ?error, "ignoring rejection outside Connected");
                    } else if unknown_client {
                        warn!("server no longer knows this client, reconnecting");
                        if let DisconnectStart::Started(client_id) = state.begin_disconnect(false) {
                            tokio::spawn(self.clone().teardown(client_id, AfterTeardown::Reconnect));
                        }
                    } else {
                        warn!(channel = %frame.channel, ?error, "unsuccessful request");
                    }
                }
                Signal::Push(message) => match state.tracker.on_message(message) {
                    Ok(delivery) => {
                        if delivery.finished {
                            debug!(?delivery.progress, "query finished");
                        }
                    }
                    Err(UnknownRequest(request_id)) => {
                        warn!(%request_id, "message does not match any outstanding query");
                    }
                },
                Signal::Ack => {}
            }
        }
    }

    /// Publish one frame on `channel` and dispatch whatever comes back.
    async fn exchange(
        &self,
        channel: Channel,
        fields: Map<String, Value>,
    ) -> Result<Vec<ServerFrame>, RequestError> {
        let frame = self.inner.state.lock().await.session.frame(channel, fields);
        let frames = self.post_frame(frame).await?;
        self.dispatch_batch(&frames).await;
        Ok(frames)
    }

    /// The next connect frame for the poll loop started at `epoch`, or `None`
    /// once that loop should stop.
    async fn poll_frame(&self, epoch: u64) -> Option<OutboundFrame> {
        let mut state = self.inner.state.lock().await;
        state
            .session
            .is_polling(epoch)
            .then(|| state.session.frame(Channel::Connect, Map::new()))
    }

    /// POST `frame` and decode the response batch without dispatching it.
    async fn post_frame(&self, frame: OutboundFrame) -> Result<Vec<ServerFrame>, RequestError> {
        let url = self.url_for(frame.channel)?;
        let body = frame::encode_batch(&frame)?;

        debug!(channel = %frame.channel, id = frame.id, "sending frame");
        let response = self
            .inner
            .transport
            .post(
                url.as_str(),
                &[
                    ("content-type", JSON_CONTENT_TYPE),
                    (CLIENT_NAME_HEADER, self.inner.config.client_name.as_str()),
                    (CLIENT_VERSION_HEADER, self.inner.config.client_version.as_str()),
                ],
                body,
            )
            .await
            .map_err(RequestError::transport)?;

        if response.status != 200 {
            return Err(RequestError::UnexpectedStatus {
                status: response.status,
                body: response.body_text(),
            });
        }

        Ok(frame::decode_batch(&response.body)?)
    }

    fn url_for(&self, channel: Channel) -> Result<Url, RequestError> {
        let mut url = match channel.endpoint_suffix() {
            Some(suffix) => self.inner.endpoint.join(suffix)?,
            None => self.inner.endpoint.clone(),
        };

        if let Some(credentials) = &self.inner.config.credentials {
            url.query_pairs_mut()
                .append_pair("_user", &credentials.user_id)
                .append_pair("_apikey", &credentials.api_key);
        }

        Ok(url)
    }
}
