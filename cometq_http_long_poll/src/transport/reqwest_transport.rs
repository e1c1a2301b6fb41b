//! [`reqwest`]-backed implementation of [`HttpTransport`].

use core::time::Duration;
use std::sync::Arc;

use async_lock::RwLock;
use futures::{FutureExt, future::BoxFuture};
use reqwest::cookie::Jar;

use super::{HttpResponse, HttpTransport};

/// Error type for the reqwest-based transport.
#[derive(Debug, thiserror::Error)]
#[error("HTTP request failed: {0}")]
pub struct ReqwestTransportError(#[from] reqwest::Error);

/// A [`reqwest`]-backed transport with an in-memory cookie jar.
///
/// [`reset_session`](HttpTransport::reset_session) swaps in a fresh client
/// with an empty jar; requests already in flight finish on the old one.
#[derive(Debug)]
pub struct ReqwestTransport {
    inner: RwLock<reqwest::Client>,
    request_timeout: Option<Duration>,
}

impl ReqwestTransport {
    /// Create a transport without a request timeout.
    ///
    /// Long-poll requests are held open by the server for as long as it
    /// advised during handshake, so no client-side limit is applied by default.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self, ReqwestTransportError> {
        Self::with_timeout(None)
    }

    /// Create a transport that abandons requests after `request_timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn with_timeout(request_timeout: Option<Duration>) -> Result<Self, ReqwestTransportError> {
        Ok(Self {
            inner: RwLock::new(build_client(request_timeout)?),
            request_timeout,
        })
    }
}

fn build_client(request_timeout: Option<Duration>) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder().cookie_provider(Arc::new(Jar::default()));
    if let Some(timeout) = request_timeout {
        builder = builder.timeout(timeout);
    }
    builder.build()
}

impl HttpTransport for ReqwestTransport {
    type Error = ReqwestTransportError;

    fn post(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: Vec<u8>,
    ) -> BoxFuture<'_, Result<HttpResponse, Self::Error>> {
        let url = url.to_owned();
        let headers: Vec<(String, String)> = headers
            .iter()
            .map(|&(name, value)| (name.to_owned(), value.to_owned()))
            .collect();

        async move {
            let client = self.inner.read().await.clone();

            let mut builder = client.post(url);
            for (name, value) in headers {
                builder = builder.header(name, value);
            }

            let resp = builder.body(body).send().await?;
            let status = resp.status().as_u16();

            let resp_headers: Vec<(String, String)> = resp
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_lowercase(), v.to_string()))
                })
                .collect();

            let body = resp.bytes().await?.to_vec();

            Ok(HttpResponse {
                status,
                body,
                headers: resp_headers,
            })
        }
        .boxed()
    }

    fn reset_session(&self) -> BoxFuture<'_, ()> {
        async move {
            match build_client(self.request_timeout) {
                Ok(fresh) => {
                    *self.inner.write().await = fresh;
                    tracing::debug!("cookie jar reset");
                }
                Err(e) => tracing::error!("failed to rebuild HTTP client, keeping cookies: {e}"),
            }
        }
        .boxed()
    }
}
