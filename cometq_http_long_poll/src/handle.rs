//! Caller-side view of one outstanding query.

use cometq_core::{QueryUpdate, RequestId};

/// Receives the updates for one query.
///
/// Updates arrive in the order the server emitted them. The last one has
/// `finished == true`, either because the query completed or because the
/// client disconnected; the handle yields nothing after it.
#[derive(Debug)]
pub struct QueryHandle {
    request_id: RequestId,
    updates: async_channel::Receiver<QueryUpdate>,
}

impl QueryHandle {
    pub(crate) const fn new(
        request_id: RequestId,
        updates: async_channel::Receiver<QueryUpdate>,
    ) -> Self {
        Self {
            request_id,
            updates,
        }
    }

    /// The id the server uses to tag messages for this query.
    #[must_use]
    pub const fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Wait for the next update. `None` once the final update has been taken.
    pub async fn next_update(&self) -> Option<QueryUpdate> {
        self.updates.recv().await.ok()
    }

    /// Wait for every remaining update, up to and including the finished one.
    pub async fn collect_until_finished(self) -> Vec<QueryUpdate> {
        let mut updates = Vec::new();
        while let Some(update) = self.next_update().await {
            let finished = update.finished;
            updates.push(update);
            if finished {
                break;
            }
        }
        updates
    }

    /// The updates as a [`Stream`](futures::Stream).
    #[must_use]
    pub fn into_stream(self) -> async_channel::Receiver<QueryUpdate> {
        self.updates
    }
}
