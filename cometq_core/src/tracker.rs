//! Query lifecycle tracking.
//!
//! A remote query fans out into units of work. The server reports each unit
//! with `SPAWN`, `INIT`/`START` and `STOP` messages, interleaved with
//! `MESSAGE`s carrying results. Nothing marks the end of a query explicitly;
//! the client infers it from the running counts (see [`Progress::is_finished`]).

use std::collections::HashMap;

use thiserror::Error;

use crate::{
    id::RequestId,
    push::{Lifecycle, QueryMessage},
};

/// One update delivered to the caller that issued a query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryUpdate {
    /// Whether this is the last update for the query.
    pub finished: bool,

    /// The message that triggered the update.
    pub message: QueryMessage,
}

/// Running tally of lifecycle signals for one query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Progress {
    spawned: u32,
    started: u32,
    completed: u32,
}

impl Progress {
    /// Count one lifecycle event. Events that are not lifecycle steps leave the tally unchanged.
    pub const fn apply(&mut self, event: &Lifecycle) {
        match event {
            Lifecycle::Spawned => self.spawned = self.spawned.saturating_add(1),
            Lifecycle::Started => self.started = self.started.saturating_add(1),
            Lifecycle::Completed => self.completed = self.completed.saturating_add(1),
            Lifecycle::Data | Lifecycle::Disconnected | Lifecycle::Other(_) => {}
        }
    }

    /// Every spawned unit, plus the implicit initial one, has started, and
    /// every started unit has completed.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.started > 0
            && self.started == self.completed
            && matches!(self.spawned.checked_add(1), Some(expected) if expected == self.started)
    }

    /// `SPAWN`s seen.
    #[must_use]
    pub const fn spawned(&self) -> u32 {
        self.spawned
    }

    /// `INIT`/`START`s seen.
    #[must_use]
    pub const fn started(&self) -> u32 {
        self.started
    }

    /// `STOP`s seen.
    #[must_use]
    pub const fn completed(&self) -> u32 {
        self.completed
    }
}

/// A pushed message named a request id with no outstanding query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no outstanding query for request id {0}")]
pub struct UnknownRequest(pub RequestId);

/// Result of routing a message to its query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    /// Tally after applying the message.
    pub progress: Progress,

    /// Whether the query finished (and was removed).
    pub finished: bool,
}

#[derive(Debug)]
struct QueryRecord {
    progress: Progress,
    updates: async_channel::Sender<QueryUpdate>,
}

impl QueryRecord {
    fn deliver(&self, update: QueryUpdate) {
        if self.updates.try_send(update).is_err() {
            tracing::debug!("query update dropped: receiver gone");
        }
    }
}

/// Outstanding queries keyed by request id.
#[derive(Debug, Default)]
pub struct QueryTracker {
    records: HashMap<RequestId, QueryRecord>,
}

impl QueryTracker {
    /// An empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `request_id`, returning the receiving end of its updates.
    ///
    /// Returns `None` if the id is already tracked.
    pub fn register(
        &mut self,
        request_id: RequestId,
    ) -> Option<async_channel::Receiver<QueryUpdate>> {
        if self.records.contains_key(&request_id) {
            return None;
        }

        let (updates, rx) = async_channel::unbounded();
        self.records.insert(
            request_id,
            QueryRecord {
                progress: Progress::default(),
                updates,
            },
        );
        Some(rx)
    }

    /// Stop tracking `request_id` without notifying anyone.
    pub fn remove(&mut self, request_id: &RequestId) -> bool {
        self.records.remove(request_id).is_some()
    }

    /// Apply a pushed message to its query and deliver it.
    ///
    /// The query is removed once it finishes, so later messages for the same
    /// id are reported as unknown.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownRequest`] if no query with that id is outstanding.
    pub fn on_message(&mut self, message: QueryMessage) -> Result<Delivery, UnknownRequest> {
        let Some(record) = self.records.get_mut(&message.request_id) else {
            return Err(UnknownRequest(message.request_id));
        };

        record.progress.apply(&message.event);
        let progress = record.progress;
        let finished = progress.is_finished();

        tracing::debug!(
            request_id = %message.request_id,
            event = ?message.event,
            spawned = progress.spawned(),
            started = progress.started(),
            completed = progress.completed(),
            finished,
            "query progress"
        );

        if finished {
            if let Some(record) = self.records.remove(&message.request_id) {
                record.deliver(QueryUpdate { finished, message });
            }
        } else {
            record.deliver(QueryUpdate { finished, message });
        }

        Ok(Delivery { progress, finished })
    }

    /// Finish every outstanding query with a synthetic `DISCONNECT` update and
    /// empty the tracker. Returns how many queries were cut short.
    pub fn finish_all_disconnected(&mut self) -> usize {
        let count = self.records.len();
        for (request_id, record) in self.records.drain() {
            record.deliver(QueryUpdate {
                finished: true,
                message: QueryMessage::disconnected(request_id),
            });
        }
        count
    }

    /// Progress of an outstanding query.
    #[must_use]
    pub fn progress(&self, request_id: &RequestId) -> Option<Progress> {
        self.records.get(request_id).map(|r| r.progress)
    }

    /// Whether `request_id` is outstanding.
    #[must_use]
    pub fn contains(&self, request_id: &RequestId) -> bool {
        self.records.contains_key(request_id)
    }

    /// Number of outstanding queries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no queries are outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
