//! Client configuration.

use core::{fmt, time::Duration};

use cometq_core::backoff::PollBackoff;
use url::Url;

use crate::{COMET_PATH, DEFAULT_DOMAIN, error::ConfigError};

/// Key-based credentials, sent as query-string parameters on every protocol request.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey {
    /// The account's user id.
    pub user_id: String,

    /// The account's API key.
    pub api_key: String,
}

impl ApiKey {
    /// Bundle a user id with its API key.
    #[must_use]
    pub fn new(user_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            api_key: api_key.into(),
        }
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKey")
            .field("user_id", &self.user_id)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Everything a [`CometClient`](crate::client::CometClient) needs to know
/// before it talks to the server.
///
/// ```
/// use cometq_http_long_poll::config::{ApiKey, ClientConfig};
///
/// let config = ClientConfig::default()
///     .with_credentials(ApiKey::new("user", "secret"))
///     .with_random_host(false);
/// assert_eq!(config.endpoint().map(|u| u.to_string()).ok().as_deref(),
///            Some("https://query.import.io/query/comet/"));
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Service domain; the comet endpoint lives under `query.<domain>`.
    pub domain: String,

    /// API-key credentials. Without them the session must be authenticated by
    /// [`login`](crate::client::CometClient::login) first.
    pub credentials: Option<ApiKey>,

    /// Prefix the host with a random label so several clients in one cookie
    /// scope do not share a session.
    pub random_host: bool,

    /// Use `https` for the comet endpoint.
    pub https: bool,

    /// Sent in the client name header.
    pub client_name: String,

    /// Sent in the client version header.
    pub client_version: String,

    /// Delay between polls after transport failures. `None` re-polls immediately.
    pub poll_backoff: Option<PollBackoff>,

    /// Per-request timeout for transports that support one. `None` leaves
    /// long-polls bounded only by the server.
    pub request_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_owned(),
            credentials: None,
            random_host: true,
            https: true,
            client_name: "cometq Rust client".to_owned(),
            client_version: env!("CARGO_PKG_VERSION").to_owned(),
            poll_backoff: None,
            request_timeout: None,
        }
    }
}

impl ClientConfig {
    /// Set the service domain.
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Authenticate every request with an API key.
    #[must_use]
    pub fn with_credentials(mut self, credentials: ApiKey) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Enable or disable the random host prefix.
    #[must_use]
    pub fn with_random_host(mut self, random_host: bool) -> Self {
        self.random_host = random_host;
        self
    }

    /// Use `https` (`true`) or plain `http` (`false`).
    #[must_use]
    pub fn with_https(mut self, https: bool) -> Self {
        self.https = https;
        self
    }

    /// Identify this client to the server.
    #[must_use]
    pub fn with_client_identity(
        mut self,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        self.client_name = name.into();
        self.client_version = version.into();
        self
    }

    /// Set (or disable, with `None`) the poll backoff.
    #[must_use]
    pub fn with_poll_backoff(mut self, backoff: Option<PollBackoff>) -> Self {
        self.poll_backoff = backoff;
        self
    }

    /// Set a per-request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// The comet endpoint: `http(s)://[<random>.]query.<domain>/query/comet/`.
    ///
    /// With `random_host` each call picks a new label; the client calls this
    /// once and keeps the result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEndpoint`] if the domain does not form a valid URL.
    pub fn endpoint(&self) -> Result<Url, ConfigError> {
        let scheme = if self.https { "https" } else { "http" };
        let host = if self.random_host {
            format!("{}.query.{}", rand::random::<u64>(), self.domain)
        } else {
            format!("query.{}", self.domain)
        };
        Ok(Url::parse(&format!("{scheme}://{host}{COMET_PATH}"))?)
    }

    /// The login endpoint: `https://api.<domain>/auth/login`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEndpoint`] if the domain does not form a valid URL.
    pub fn login_url(&self) -> Result<Url, ConfigError> {
        Ok(Url::parse(&format!("https://api.{}/auth/login", self.domain))?)
    }
}
