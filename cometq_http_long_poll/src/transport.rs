//! The HTTP seam.
//!
//! The engine only ever needs "POST these bytes, give me status and body",
//! plus a way to throw away session cookies on disconnect. Everything else
//! (TLS, pooling, cookie persistence) belongs to the [`HttpTransport`]
//! implementation chosen when the client is built.

#[cfg(feature = "reqwest")]
#[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
pub mod reqwest_transport;

use futures::future::BoxFuture;

/// A minimal async HTTP client for POST requests.
///
/// Implementations must persist cookies set by responses and attach them to
/// later requests, so that a login exchange authenticates the session.
pub trait HttpTransport: Send + Sync + 'static {
    /// The error type for HTTP operations.
    type Error: core::error::Error + Send + Sync + 'static;

    /// Send an HTTP POST request and return the response.
    fn post(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: Vec<u8>,
    ) -> BoxFuture<'_, Result<HttpResponse, Self::Error>>;

    /// Drop every cookie collected so far.
    fn reset_session(&self) -> BoxFuture<'_, ()>;
}

/// A minimal HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// The HTTP status code.
    pub status: u16,

    /// The response body bytes.
    pub body: Vec<u8>,

    /// Selected response headers (lowercase keys).
    pub headers: Vec<(String, String)>,
}

impl HttpResponse {
    /// A response with no headers.
    #[must_use]
    pub const fn new(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            body,
            headers: Vec::new(),
        }
    }

    /// Look up a response header by name (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        let lower = name.to_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| k == &lower)
            .map(|(_, v)| v.as_str())
    }

    /// The body as text, for diagnostics.
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let response = HttpResponse {
            status: 200,
            body: Vec::new(),
            headers: vec![("set-cookie".into(), "a=b".into())],
        };
        assert_eq!(response.header("Set-Cookie"), Some("a=b"));
        assert_eq!(response.header("content-type"), None);
    }
}
