//! Message types for the sampler actor

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use crate::Snapshot;
use crate::history::HistoryResult;

/// Event published after every successfully stored sampling pass
///
/// Subscribers (the process log, the snapshot file sink) get the full
/// snapshot; the broadcast channel may lag and drop events for slow
/// subscribers, which is acceptable since the actor-owned history stays
/// complete either way.
#[derive(Debug, Clone)]
pub struct SampleEvent {
    pub snapshot: Snapshot,
}

/// Commands that can be sent to the sampler actor
#[derive(Debug)]
pub enum SamplerCommand {
    /// Run a sampling pass immediately, bypassing the interval timer
    SampleNow {
        /// Answers with the capture time of the stored snapshot
        respond_to: oneshot::Sender<HistoryResult<DateTime<Utc>>>,
    },

    /// Replace the sampling period
    ///
    /// Takes effect immediately; the next tick happens one new period from
    /// now.
    UpdateInterval { period_secs: u64 },

    /// Range query over the actor-owned history (inclusive bounds)
    Range {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        respond_to: oneshot::Sender<HistoryResult<Vec<Snapshot>>>,
    },

    /// The most recently stored snapshot, if any
    Latest {
        respond_to: oneshot::Sender<Option<Snapshot>>,
    },

    /// Gracefully shut down
    ///
    /// Honored between passes only, so the history is never left with a
    /// partial append.
    Shutdown,
}
