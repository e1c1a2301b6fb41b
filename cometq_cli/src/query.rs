use cometq_core::Lifecycle;
use cometq_http_long_poll::{CometClient, error::QueryError, transport::HttpTransport};
use serde_json::Value;
use tracing::{info, warn};

/// Issue one query and gather the results of every data message it produces.
pub(crate) async fn run<T: HttpTransport>(
    client: &CometClient<T>,
    payload: Value,
) -> Result<Vec<Value>, QueryError> {
    let handle = client.query(payload).await?;
    let request_id = handle.request_id().clone();
    let mut results = Vec::new();

    for update in handle.collect_until_finished().await {
        let message = update.message;
        if let Some(error_type) = message.error_type() {
            warn!(%request_id, %error_type, "query reported an error");
        }

        match message.event {
            Lifecycle::Data => {
                if let Some(Value::Array(rows)) = message.results() {
                    info!(%request_id, rows = rows.len(), "results");
                    results.extend(rows.iter().cloned());
                }
            }
            Lifecycle::Disconnected => warn!(%request_id, "disconnected before the query finished"),
            _ => {}
        }
    }

    Ok(results)
}
