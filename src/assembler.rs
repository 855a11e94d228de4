//! Snapshot assembly
//!
//! The assembler owns the registered collectors and turns one invocation
//! into one immutable [`Snapshot`]. Collectors run isolated from each other:
//! one failing (or being absent) never stops the others, it only marks its
//! own subsystem as unavailable inside the snapshot.

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, warn};

use crate::collectors::{self, Collector};
use crate::{Snapshot, SnapshotSubsystems, Subsystem, SubsystemReport};

pub struct Assembler {
    collectors: Vec<Box<dyn Collector>>,
}

impl Assembler {
    pub fn new(collectors: Vec<Box<dyn Collector>>) -> Self {
        Self { collectors }
    }

    /// Assembler over the four real host collectors.
    pub fn with_host_collectors() -> Self {
        Self::new(collectors::host_collectors())
    }

    /// The registered collector for a subsystem, if any.
    pub fn collector(&self, subsystem: Subsystem) -> Option<&dyn Collector> {
        self.collectors
            .iter()
            .find(|collector| collector.subsystem() == subsystem)
            .map(|collector| collector.as_ref())
    }

    /// Capture one snapshot of every subsystem.
    ///
    /// The timestamp is taken once, before any collector runs, and shared by
    /// all subsystems: the snapshot is one moment's view even though the
    /// collectors take variable time. Collector outcomes fold into the same
    /// snapshot regardless of completion order. Never fails; failures are
    /// per-subsystem error markers.
    pub async fn assemble(&self) -> Snapshot {
        let captured_at = Utc::now();

        let outcomes = join_all(self.collectors.iter().map(|collector| async move {
            (collector.subsystem(), collector.collect_all().await)
        }))
        .await;

        let mut subsystems = SnapshotSubsystems {
            ports: SubsystemReport::failed("no collector registered"),
            containers: SubsystemReport::failed("no collector registered"),
            proxy_hosts: SubsystemReport::failed("no collector registered"),
            accounts: SubsystemReport::failed("no collector registered"),
        };

        for (subsystem, outcome) in outcomes {
            *subsystems.report_mut(subsystem) = match outcome {
                Ok(records) => {
                    debug!("{}: collected {} records", subsystem, records.len());
                    SubsystemReport::ok(records)
                }
                Err(err) => {
                    warn!("{}: collection failed: {}", subsystem, err);
                    SubsystemReport::failed(err.to_string())
                }
            };
        }

        Snapshot {
            captured_at,
            subsystems,
        }
    }
}
