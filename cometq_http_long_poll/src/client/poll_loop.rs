//! Background long-poll task.

use tracing::{debug, info, warn};

use super::CometClient;
use crate::transport::HttpTransport;

/// Keep a `/meta/connect` request open until the session leaves `Connected`.
///
/// `epoch` is the value [`Session::mark_connected`] handed out when this
/// loop was started. A disconnect or reconnect bumps the session's epoch, so
/// a stale loop exits at its next check even if the client has since
/// reconnected.
///
/// [`Session::mark_connected`]: cometq_core::Session::mark_connected
pub(super) async fn poll_loop<T: HttpTransport>(client: CometClient<T>, epoch: u64) {
    info!(epoch, "starting poll loop");

    let mut backoff = client.config().poll_backoff;

    while let Some(frame) = client.poll_frame(epoch).await {
        match client.post_frame(frame).await {
            Ok(frames) => {
                debug!(count = frames.len(), "poll returned");
                client.dispatch_polled(&frames, epoch).await;
                if let Some(backoff) = backoff.as_mut() {
                    backoff.reset();
                }
            }
            Err(e) => {
                if let Some(backoff) = backoff.as_mut() {
                    let delay = backoff.next_delay();
                    warn!(error = %e, failures = backoff.failures(), ?delay, "poll failed, retrying");
                    tokio::time::sleep(delay).await;
                } else {
                    warn!(error = %e, "poll failed, retrying");
                }
            }
        }
    }

    info!(epoch, "poll loop exiting");
}
