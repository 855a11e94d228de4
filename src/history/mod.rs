//! History store
//!
//! An append-only, time-ordered sequence of snapshots with inclusive range
//! queries. The store has exactly one writer (the sampler daemon owns it);
//! everything handed out by queries is a copy, so readers can never disturb
//! the stored order.
//!
//! There is no deletion or eviction: retention is bounded by process
//! lifetime, and durable retention is the concern of whatever sink consumes
//! the daemon's sample events.

pub mod error;

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::Snapshot;

pub use error::{HistoryError, HistoryResult};

#[derive(Debug, Default)]
pub struct History {
    snapshots: Vec<Snapshot>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a history from stored snapshots (e.g. a replayed snapshot
    /// log), re-validating the ordering invariant on the way in.
    pub fn from_snapshots(
        snapshots: impl IntoIterator<Item = Snapshot>,
    ) -> HistoryResult<Self> {
        let mut history = Self::new();
        for snapshot in snapshots {
            history.append(snapshot)?;
        }
        Ok(history)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }

    /// Append a snapshot, enforcing monotonically non-decreasing capture
    /// times. A rejected snapshot leaves the store untouched.
    pub fn append(&mut self, snapshot: Snapshot) -> HistoryResult<()> {
        if let Some(last) = self.snapshots.last()
            && snapshot.captured_at < last.captured_at
        {
            return Err(HistoryError::OutOfOrder {
                last: last.captured_at,
                attempted: snapshot.captured_at,
            });
        }

        trace!("appending snapshot captured at {}", snapshot.captured_at);
        self.snapshots.push(snapshot);
        Ok(())
    }

    /// Snapshots with `start <= captured_at <= end`, both bounds inclusive.
    ///
    /// An empty result is an empty vec, not an error; an inverted range is
    /// an error.
    pub fn range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> HistoryResult<Vec<Snapshot>> {
        if start > end {
            return Err(HistoryError::InvalidRange { start, end });
        }

        Ok(self
            .snapshots
            .iter()
            .filter(|snapshot| snapshot.captured_at >= start && snapshot.captured_at <= end)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SnapshotSubsystems;
    use assert_matches::assert_matches;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn snapshot_at(secs: i64) -> Snapshot {
        Snapshot {
            captured_at: Utc.timestamp_opt(secs, 0).unwrap(),
            subsystems: SnapshotSubsystems::default(),
        }
    }

    #[test]
    fn test_append_keeps_order() {
        let mut history = History::new();
        history.append(snapshot_at(100)).unwrap();
        history.append(snapshot_at(200)).unwrap();
        history.append(snapshot_at(300)).unwrap();

        assert_eq!(history.len(), 3);
        assert_eq!(history.latest().unwrap().captured_at.timestamp(), 300);
    }

    #[test]
    fn test_append_allows_equal_timestamps() {
        let mut history = History::new();
        history.append(snapshot_at(100)).unwrap();
        history.append(snapshot_at(100)).unwrap();
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_append_rejects_clock_regression() {
        let mut history = History::new();
        history.append(snapshot_at(100)).unwrap();

        let result = history.append(snapshot_at(50));
        assert_matches!(result, Err(HistoryError::OutOfOrder { .. }));

        // the rejected snapshot left the store untouched
        assert_eq!(history.len(), 1);
        assert_eq!(history.latest().unwrap().captured_at.timestamp(), 100);
    }

    #[test]
    fn test_range_is_inclusive_on_both_bounds() {
        let mut history = History::new();
        for secs in [100, 200, 300, 400] {
            history.append(snapshot_at(secs)).unwrap();
        }

        let result = history
            .range(
                Utc.timestamp_opt(200, 0).unwrap(),
                Utc.timestamp_opt(300, 0).unwrap(),
            )
            .unwrap();

        let times: Vec<i64> = result.iter().map(|s| s.captured_at.timestamp()).collect();
        assert_eq!(times, vec![200, 300]);
    }

    #[test]
    fn test_range_with_no_matches_is_empty_not_error() {
        let mut history = History::new();
        history.append(snapshot_at(100)).unwrap();

        let result = history
            .range(
                Utc.timestamp_opt(500, 0).unwrap(),
                Utc.timestamp_opt(600, 0).unwrap(),
            )
            .unwrap();

        assert_eq!(result, Vec::new());
    }

    #[test]
    fn test_range_rejects_inverted_bounds() {
        let history = History::new();

        let result = history.range(
            Utc.timestamp_opt(300, 0).unwrap(),
            Utc.timestamp_opt(100, 0).unwrap(),
        );
        assert_matches!(result, Err(HistoryError::InvalidRange { .. }));
    }

    #[test]
    fn test_full_range_round_trips_whole_history() {
        let mut history = History::new();
        for secs in [100, 200, 300] {
            history.append(snapshot_at(secs)).unwrap();
        }

        let result = history
            .range(
                Utc.timestamp_opt(100, 0).unwrap(),
                Utc.timestamp_opt(300, 0).unwrap(),
            )
            .unwrap();

        assert_eq!(result.len(), 3);
        let times: Vec<i64> = result.iter().map(|s| s.captured_at.timestamp()).collect();
        assert_eq!(times, vec![100, 200, 300]);
    }

    #[test]
    fn test_from_snapshots_revalidates_order() {
        let ordered = History::from_snapshots([snapshot_at(100), snapshot_at(200)]);
        assert_eq!(ordered.unwrap().len(), 2);

        let unordered = History::from_snapshots([snapshot_at(200), snapshot_at(100)]);
        assert_matches!(unordered, Err(HistoryError::OutOfOrder { .. }));
    }
}
