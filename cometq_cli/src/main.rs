//! `cometq`: issue queries over a Bayeux long-poll session from the command line.

mod query;

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use clap::Parser;
use cometq_http_long_poll::{
    ApiKey, ClientConfig, CometClient, DEFAULT_DOMAIN, error::QueryError, transport::HttpTransport,
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Arguments::parse();

    let token = CancellationToken::new();
    let hits = Arc::new(AtomicUsize::new(0));
    {
        let token = token.clone();
        tokio::spawn(async move {
            loop {
                if tokio::signal::ctrl_c().await.is_ok() {
                    if hits.fetch_add(1, Ordering::Relaxed) == 0 {
                        eprintln!("Ctrl+C, disconnecting (press again to force)");
                        token.cancel();
                    } else {
                        eprintln!("Force exiting.");
                        std::process::exit(130);
                    }
                }
            }
        });
    }

    let payloads = args
        .queries
        .iter()
        .map(|raw| serde_json::from_str::<Value>(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let mut config = ClientConfig::default()
        .with_domain(args.domain)
        .with_random_host(!args.no_random_host)
        .with_https(!args.insecure);
    if let (Some(user_id), Some(api_key)) = (args.user_id, args.api_key) {
        config = config.with_credentials(ApiKey::new(user_id, api_key));
    }

    let client = CometClient::with_reqwest(config)?;
    let login = args.username.as_deref().zip(args.password.as_deref());

    let outcome = run_session(&client, login, payloads, &token).await;
    client.disconnect().await;

    match outcome? {
        Some(outcomes) => {
            for (n, outcome) in outcomes.into_iter().enumerate() {
                match outcome {
                    Ok(results) => println!("query {n}: {}", Value::Array(results)),
                    Err(e) => eprintln!("query {n} failed: {e}"),
                }
            }
        }
        None => tracing::info!("cancelled, abandoning outstanding queries"),
    }

    Ok(())
}

/// Log in if asked, connect, and run every query concurrently.
///
/// Cancelling `token` abandons whichever step is in progress and yields `None`.
async fn run_session<T: HttpTransport>(
    client: &CometClient<T>,
    login: Option<(&str, &str)>,
    payloads: Vec<Value>,
    token: &CancellationToken,
) -> anyhow::Result<Option<Vec<Result<Vec<Value>, QueryError>>>> {
    let session = async {
        if let Some((username, password)) = login {
            client.login(username, password).await?;
        }
        client.connect().await?;

        let outcomes = futures::future::join_all(
            payloads
                .into_iter()
                .map(|payload| query::run(client, payload)),
        )
        .await;
        anyhow::Ok(outcomes)
    };

    tokio::select! {
        outcome = session => outcome.map(Some),
        () = token.cancelled() => Ok(None),
    }
}

#[derive(Debug, Parser)]
#[command(version, about = "Issue queries over a Bayeux long-poll session")]
struct Arguments {
    /// Query payloads, one JSON object each.
    #[arg(required = true)]
    queries: Vec<String>,

    /// Service domain.
    #[arg(long, default_value = DEFAULT_DOMAIN)]
    domain: String,

    /// User id for API-key authentication.
    #[arg(long, env = "COMETQ_USER_ID", requires = "api_key")]
    user_id: Option<String>,

    /// API key for API-key authentication.
    #[arg(long, env = "COMETQ_API_KEY", requires = "user_id", hide_env_values = true)]
    api_key: Option<String>,

    /// Username for cookie login.
    #[arg(long, requires = "password")]
    username: Option<String>,

    /// Password for cookie login.
    #[arg(long, requires = "username")]
    password: Option<String>,

    /// Talk to `query.<domain>` instead of a random subdomain.
    #[arg(long)]
    no_random_host: bool,

    /// Use plain HTTP.
    #[arg(long)]
    insecure: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use cometq_http_long_poll::transport::HttpResponse;
    use futures::{FutureExt, future::BoxFuture};
    use testresult::TestResult;

    /// A server that never answers.
    #[derive(Debug)]
    struct Unresponsive;

    impl HttpTransport for Unresponsive {
        type Error = std::io::Error;

        fn post(
            &self,
            _url: &str,
            _headers: &[(&str, &str)],
            _body: Vec<u8>,
        ) -> BoxFuture<'_, Result<HttpResponse, Self::Error>> {
            futures::future::pending().boxed()
        }

        fn reset_session(&self) -> BoxFuture<'_, ()> {
            async {}.boxed()
        }
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_hanging_connect() -> TestResult {
        let client = CometClient::new(ClientConfig::default(), Unresponsive)?;
        let token = CancellationToken::new();
        token.cancel();

        let outcome = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            run_session(&client, None, vec![serde_json::json!({})], &token),
        )
        .await??;
        assert!(outcome.is_none());
        Ok(())
    }

    #[test]
    fn arguments_are_well_formed() {
        Arguments::command().debug_assert();
    }

    #[test]
    fn api_key_needs_user_id() {
        let parsed = Arguments::try_parse_from(["cometq", "--api-key", "k", "{}"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn defaults() {
        let args = Arguments::try_parse_from(["cometq", "{\"input\":{}}"]);
        assert!(args.is_ok_and(|args| {
            args.domain == DEFAULT_DOMAIN && !args.insecure && !args.no_random_host
        }));
    }
}
