//! Query engine
//!
//! Two operations, orthogonal to where the data comes from: `list` over an
//! assembled snapshot, and `detail` over either a snapshot or live state.
//! "Not found" is a query outcome, never an error.

use tracing::trace;

use crate::assembler::Assembler;
use crate::collectors::{CollectorError, CollectorResult};
use crate::{Record, Snapshot, Subsystem};

/// Outcome of a detail query. Distinct from `CollectorError`: a missing key
/// is data, an unreachable subsystem is a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Found(Record),
    NotFound,
}

/// Point and list queries over snapshots and live collectors.
///
/// Borrows the assembler explicitly; there is no ambient state to read
/// through.
pub struct QueryEngine<'a> {
    assembler: &'a Assembler,
}

impl<'a> QueryEngine<'a> {
    pub fn new(assembler: &'a Assembler) -> Self {
        Self { assembler }
    }

    /// The subsystem's records, verbatim, in collector order.
    ///
    /// Callers needing sorted output sort explicitly. Needs no live
    /// collectors, so it is usable against replayed history as well.
    pub fn list<'s>(snapshot: &'s Snapshot, subsystem: Subsystem) -> &'s [Record] {
        &snapshot.subsystems.report(subsystem).records
    }

    /// Look up one record by key.
    ///
    /// With a snapshot, the lookup runs against its already-collected
    /// records; a miss in a subsystem whose collector failed surfaces that
    /// failure instead of claiming NotFound. Without a snapshot the query
    /// delegates to the collector's `collect_one`, so a one-off detail query
    /// reflects current state rather than a previous enumeration.
    pub async fn detail(
        &self,
        subsystem: Subsystem,
        key: &str,
        snapshot: Option<&Snapshot>,
    ) -> CollectorResult<QueryOutcome> {
        match snapshot {
            Some(snapshot) => {
                let report = snapshot.subsystems.report(subsystem);

                if let Some(record) = report.records.iter().find(|record| record.key() == key) {
                    return Ok(QueryOutcome::Found(record.clone()));
                }

                if let Some(reason) = &report.error {
                    return Err(CollectorError::Unavailable(reason.clone()));
                }

                Ok(QueryOutcome::NotFound)
            }
            None => {
                trace!("live detail query: {} '{}'", subsystem, key);

                let collector = self.assembler.collector(subsystem).ok_or_else(|| {
                    CollectorError::Unavailable("no collector registered".to_string())
                })?;

                match collector.collect_one(key).await? {
                    Some(record) => Ok(QueryOutcome::Found(record)),
                    None => Ok(QueryOutcome::NotFound),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::Collector;
    use crate::{PortRecord, SnapshotSubsystems, SubsystemReport};
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    struct StaticCollector {
        subsystem: Subsystem,
        records: Vec<Record>,
    }

    #[async_trait]
    impl Collector for StaticCollector {
        fn subsystem(&self) -> Subsystem {
            self.subsystem
        }

        async fn collect_all(&self) -> CollectorResult<Vec<Record>> {
            Ok(self.records.clone())
        }

        async fn collect_one(&self, key: &str) -> CollectorResult<Option<Record>> {
            Ok(self.records.iter().find(|r| r.key() == key).cloned())
        }
    }

    fn nginx_port(port: u16) -> Record {
        Record::Port(PortRecord {
            port,
            service_name: Some("nginx".into()),
            pid: Some(10),
            owner_user: Some("www-data".into()),
            executable_path: Some("/usr/sbin/nginx".into()),
        })
    }

    fn assembler_with_ports(records: Vec<Record>) -> Assembler {
        Assembler::new(vec![Box::new(StaticCollector {
            subsystem: Subsystem::Ports,
            records,
        })])
    }

    fn snapshot_with_ports(report: SubsystemReport) -> Snapshot {
        Snapshot {
            captured_at: Utc::now(),
            subsystems: SnapshotSubsystems {
                ports: report,
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_list_preserves_enumeration_order() {
        let snapshot =
            snapshot_with_ports(SubsystemReport::ok(vec![nginx_port(80), nginx_port(443)]));

        let records = QueryEngine::list(&snapshot, Subsystem::Ports);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].key(), "80");
        assert_eq!(records[1].key(), "443");
    }

    #[tokio::test]
    async fn test_detail_in_snapshot() {
        let assembler = assembler_with_ports(vec![]);
        let engine = QueryEngine::new(&assembler);

        let snapshot =
            snapshot_with_ports(SubsystemReport::ok(vec![nginx_port(80), nginx_port(443)]));

        let outcome = engine
            .detail(Subsystem::Ports, "80", Some(&snapshot))
            .await
            .unwrap();
        assert_eq!(outcome, QueryOutcome::Found(nginx_port(80)));

        let outcome = engine
            .detail(Subsystem::Ports, "8080", Some(&snapshot))
            .await
            .unwrap();
        assert_eq!(outcome, QueryOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_detail_surfaces_recorded_collector_failure() {
        let assembler = assembler_with_ports(vec![]);
        let engine = QueryEngine::new(&assembler);

        let snapshot = snapshot_with_ports(SubsystemReport::failed("socket table not readable"));

        let result = engine.detail(Subsystem::Ports, "80", Some(&snapshot)).await;
        assert_matches!(result, Err(CollectorError::Unavailable(reason)) => {
            assert_eq!(reason, "socket table not readable");
        });
    }

    #[tokio::test]
    async fn test_detail_without_snapshot_queries_live_state() {
        let assembler = assembler_with_ports(vec![nginx_port(8443)]);
        let engine = QueryEngine::new(&assembler);

        let outcome = engine.detail(Subsystem::Ports, "8443", None).await.unwrap();
        assert_eq!(outcome, QueryOutcome::Found(nginx_port(8443)));

        let outcome = engine.detail(Subsystem::Ports, "1234", None).await.unwrap();
        assert_eq!(outcome, QueryOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_detail_unregistered_subsystem_is_unavailable() {
        let assembler = assembler_with_ports(vec![]);
        let engine = QueryEngine::new(&assembler);

        let result = engine.detail(Subsystem::Containers, "cache", None).await;
        assert_matches!(result, Err(CollectorError::Unavailable(_)));
    }
}
