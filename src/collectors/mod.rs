//! Subsystem collectors
//!
//! One collector per subsystem, each independent of the others. A collector
//! translates one corner of live host state (socket table, container runtime,
//! reverse-proxy configuration, account database) into normalized records.
//!
//! ## Contract
//!
//! - `collect_all` returns the subsystem's full record list, or a
//!   `CollectorError` when the underlying dependency is unreachable. It never
//!   returns a partial list: individual records may carry nulled fields, but
//!   an enumeration either completes or fails as a whole.
//! - `collect_one` is logically `collect_all` filtered by key, but
//!   implementations may short-circuit (a direct runtime lookup, a single
//!   file scan). `Ok(None)` means "valid key, nothing matched" and is distinct
//!   from an error.
//!
//! All collectors are read-only against the host.

pub mod accounts;
pub mod docker;
pub mod error;
pub mod nginx;
pub mod ports;

use async_trait::async_trait;

use crate::{Record, Subsystem};

pub use error::{CollectorError, CollectorResult};

/// A source of records for exactly one subsystem
#[async_trait]
pub trait Collector: Send + Sync {
    /// The subsystem this collector populates
    fn subsystem(&self) -> Subsystem;

    /// Enumerate every record of the subsystem, in source order
    async fn collect_all(&self) -> CollectorResult<Vec<Record>>;

    /// Look up a single record by key
    ///
    /// Both operations agree on record shape; `collect_one` may resolve
    /// fields the list view leaves null (e.g. container command and port
    /// mappings).
    async fn collect_one(&self, key: &str) -> CollectorResult<Option<Record>>;
}

/// The four real host collectors, in snapshot order.
pub fn host_collectors() -> Vec<Box<dyn Collector>> {
    vec![
        Box::new(ports::PortsCollector::new()),
        Box::new(docker::DockerCollector::new()),
        Box::new(nginx::NginxCollector::new()),
        Box::new(accounts::AccountsCollector::new()),
    ]
}
