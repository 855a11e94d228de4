pub mod actors;
pub mod assembler;
pub mod collectors;
pub mod config;
pub mod history;
pub mod query;
pub mod render;
pub mod util;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The four subsystems this tool can introspect.
///
/// A closed enumeration: collectors and queries are keyed by this type, so a
/// snapshot can never grow a subsystem that has no collector behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subsystem {
    Ports,
    Containers,
    ProxyHosts,
    Accounts,
}

impl Subsystem {
    pub const ALL: [Subsystem; 4] = [
        Subsystem::Ports,
        Subsystem::Containers,
        Subsystem::ProxyHosts,
        Subsystem::Accounts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Subsystem::Ports => "ports",
            Subsystem::Containers => "containers",
            Subsystem::ProxyHosts => "proxy_hosts",
            Subsystem::Accounts => "accounts",
        }
    }
}

impl std::fmt::Display for Subsystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One listening socket and its owning process.
///
/// Process fields are `None` when the owner could not be resolved (the
/// process exited between enumeration and resolution, or procfs denied the
/// lookup). The socket itself is still reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortRecord {
    pub port: u16,
    pub service_name: Option<String>,
    pub pid: Option<u32>,
    pub owner_user: Option<String>,
    pub executable_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    Image,
    Container,
}

impl std::fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerKind::Image => write!(f, "image"),
            ContainerKind::Container => write!(f, "container"),
        }
    }
}

/// One container or image known to the container runtime.
///
/// The list view leaves `command` and `published_ports` unresolved; the
/// detail view fills them from the runtime's inspect output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub name: String,
    pub kind: ContainerKind,
    pub status: Option<String>,
    pub image: Option<String>,
    pub command: Option<String>,
    pub published_ports: Option<String>,
}

/// One reverse-proxy virtual host: domain plus where it forwards to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyHostRecord {
    pub domain: String,
    pub listen: Option<String>,
    pub upstream: Option<String>,
}

/// One local account from the system account database.
///
/// `last_login` is `None` for accounts that never logged in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub username: String,
    pub uid: u32,
    pub gid: u32,
    pub home_dir: Option<String>,
    pub shell: Option<String>,
    pub last_login: Option<String>,
}

/// One normalized unit of subsystem state.
///
/// Each variant is produced by exactly one collector; the tag keeps records
/// self-describing when snapshots are serialized and replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Port(PortRecord),
    Container(ContainerRecord),
    ProxyHost(ProxyHostRecord),
    Account(AccountRecord),
}

impl Record {
    pub fn subsystem(&self) -> Subsystem {
        match self {
            Record::Port(_) => Subsystem::Ports,
            Record::Container(_) => Subsystem::Containers,
            Record::ProxyHost(_) => Subsystem::ProxyHosts,
            Record::Account(_) => Subsystem::Accounts,
        }
    }

    /// The key `collect_one` and `detail` look this record up by.
    pub fn key(&self) -> String {
        match self {
            Record::Port(r) => r.port.to_string(),
            Record::Container(r) => r.name.clone(),
            Record::ProxyHost(r) => r.domain.clone(),
            Record::Account(r) => r.username.clone(),
        }
    }

    /// Ordered field pairs for rendering. Fields within one subsystem always
    /// come back in the same order and count; absent values stay `None`.
    pub fn fields(&self) -> Vec<(&'static str, Option<String>)> {
        match self {
            Record::Port(r) => vec![
                ("port", Some(r.port.to_string())),
                ("service", r.service_name.clone()),
                ("pid", r.pid.map(|p| p.to_string())),
                ("user", r.owner_user.clone()),
                ("executable", r.executable_path.clone()),
            ],
            Record::Container(r) => vec![
                ("name", Some(r.name.clone())),
                ("kind", Some(r.kind.to_string())),
                ("status", r.status.clone()),
                ("image", r.image.clone()),
                ("command", r.command.clone()),
                ("ports", r.published_ports.clone()),
            ],
            Record::ProxyHost(r) => vec![
                ("domain", Some(r.domain.clone())),
                ("listen", r.listen.clone()),
                ("upstream", r.upstream.clone()),
            ],
            Record::Account(r) => vec![
                ("username", Some(r.username.clone())),
                ("uid", Some(r.uid.to_string())),
                ("gid", Some(r.gid.to_string())),
                ("home", r.home_dir.clone()),
                ("shell", r.shell.clone()),
                ("last_login", r.last_login.clone()),
            ],
        }
    }
}

/// Outcome of one collector inside one snapshot: either its full record list,
/// or an empty list plus the reason it failed. Never a partial list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubsystemReport {
    pub records: Vec<Record>,
    pub error: Option<String>,
}

impl SubsystemReport {
    pub fn ok(records: Vec<Record>) -> Self {
        Self {
            records,
            error: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            records: Vec::new(),
            error: Some(reason.into()),
        }
    }
}

/// Per-subsystem reports of one snapshot.
///
/// A struct rather than a map: every snapshot carries exactly the four known
/// subsystems, nothing else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSubsystems {
    pub ports: SubsystemReport,
    pub containers: SubsystemReport,
    pub proxy_hosts: SubsystemReport,
    pub accounts: SubsystemReport,
}

impl SnapshotSubsystems {
    pub fn report(&self, subsystem: Subsystem) -> &SubsystemReport {
        match subsystem {
            Subsystem::Ports => &self.ports,
            Subsystem::Containers => &self.containers,
            Subsystem::ProxyHosts => &self.proxy_hosts,
            Subsystem::Accounts => &self.accounts,
        }
    }

    pub(crate) fn report_mut(&mut self, subsystem: Subsystem) -> &mut SubsystemReport {
        match subsystem {
            Subsystem::Ports => &mut self.ports,
            Subsystem::Containers => &mut self.containers,
            Subsystem::ProxyHosts => &mut self.proxy_hosts,
            Subsystem::Accounts => &mut self.accounts,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Subsystem, &SubsystemReport)> {
        Subsystem::ALL.iter().map(|s| (*s, self.report(*s)))
    }
}

/// One immutable, timestamped capture of all subsystem states.
///
/// `captured_at` is stamped once per assembly pass and shared by every
/// subsystem in the snapshot. There is no mutation API after assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub captured_at: DateTime<Utc>,
    pub subsystems: SnapshotSubsystems,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_keys_match_subsystem() {
        let port = Record::Port(PortRecord {
            port: 8080,
            service_name: Some("nginx".into()),
            pid: Some(10),
            owner_user: Some("root".into()),
            executable_path: None,
        });
        assert_eq!(port.subsystem(), Subsystem::Ports);
        assert_eq!(port.key(), "8080");

        let host = Record::ProxyHost(ProxyHostRecord {
            domain: "example.com".into(),
            listen: Some("80".into()),
            upstream: Some("http://127.0.0.1:3000".into()),
        });
        assert_eq!(host.subsystem(), Subsystem::ProxyHosts);
        assert_eq!(host.key(), "example.com");
    }

    #[test]
    fn test_fields_keep_absent_values_explicit() {
        let record = Record::Port(PortRecord {
            port: 631,
            service_name: None,
            pid: None,
            owner_user: Some("root".into()),
            executable_path: None,
        });

        let fields = record.fields();
        assert_eq!(fields.len(), 5);
        assert_eq!(fields[0], ("port", Some("631".to_string())));
        assert_eq!(fields[1], ("service", None));
        assert_eq!(fields[2], ("pid", None));
    }

    #[test]
    fn test_snapshot_serde_round_trip() {
        let snapshot = Snapshot {
            captured_at: Utc::now(),
            subsystems: SnapshotSubsystems {
                ports: SubsystemReport::ok(vec![Record::Port(PortRecord {
                    port: 22,
                    service_name: Some("sshd".into()),
                    pid: Some(615),
                    owner_user: Some("root".into()),
                    executable_path: Some("/usr/sbin/sshd".into()),
                })]),
                proxy_hosts: SubsystemReport::failed("nginx binary not found"),
                ..Default::default()
            },
        };

        let json = serde_json::to_string(&snapshot).unwrap();
        let back: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
        assert_eq!(
            back.subsystems.proxy_hosts.error.as_deref(),
            Some("nginx binary not found")
        );
    }

    #[test]
    fn test_subsystem_display_names_are_stable() {
        let names: Vec<&str> = Subsystem::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["ports", "containers", "proxy_hosts", "accounts"]);
    }
}
