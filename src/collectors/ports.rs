//! Listening-port collector
//!
//! Enumerates LISTEN sockets from the kernel socket table (`/proc/net/tcp`
//! and `/proc/net/tcp6`) and resolves each socket's owning process through
//! procfs fd links plus `sysinfo`.
//!
//! A socket whose owning process cannot be resolved (the process exited
//! between enumeration and resolution, or its fd directory is unreadable)
//! still yields a record, with the process fields nulled.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use sysinfo::{Pid, System, Users};
use tracing::trace;

use crate::{PortRecord, Record, Subsystem};

use super::{Collector, CollectorError, CollectorResult};

/// TCP state code for LISTEN in the socket table
const TCP_LISTEN: &str = "0A";

pub struct PortsCollector {
    proc_root: String,
}

/// One LISTEN entry parsed out of the socket table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ListenSocket {
    port: u16,
    inode: u64,
}

impl PortsCollector {
    pub fn new() -> Self {
        Self {
            proc_root: "/proc".to_string(),
        }
    }

    /// Enumerate sockets and resolve owners. Shared by both operations.
    fn enumerate(&self) -> CollectorResult<Vec<PortRecord>> {
        let sockets = self.listening_sockets()?;
        trace!("found {} listening sockets", sockets.len());

        let inode_to_pid = self.socket_owners();

        let mut sys = System::new();
        sys.refresh_processes(sysinfo::ProcessesToUpdate::All, true);
        let users = Users::new_with_refreshed_list();

        let mut seen = HashSet::new();
        let mut records = Vec::new();

        for socket in sockets {
            // v4 and v6 listeners on the same port collapse to one record
            if !seen.insert(socket.port) {
                continue;
            }

            let mut record = PortRecord {
                port: socket.port,
                service_name: None,
                pid: None,
                owner_user: None,
                executable_path: None,
            };

            if let Some(&pid) = inode_to_pid.get(&socket.inode)
                && let Some(process) = sys.process(Pid::from_u32(pid))
            {
                record.pid = Some(pid);
                record.service_name = Some(process.name().to_string_lossy().to_string());
                record.executable_path =
                    process.exe().map(|path| path.to_string_lossy().to_string());
                record.owner_user = process
                    .user_id()
                    .and_then(|uid| users.get_user_by_id(uid))
                    .map(|user| user.name().to_string());
            }

            records.push(record);
        }

        Ok(records)
    }

    /// Parse `/proc/net/tcp` and `/proc/net/tcp6` for LISTEN entries.
    ///
    /// Both tables missing is an error (no socket table to read); one
    /// missing (e.g. IPv6 disabled) is fine.
    fn listening_sockets(&self) -> CollectorResult<Vec<ListenSocket>> {
        let tables = ["net/tcp", "net/tcp6"];
        let mut sockets = Vec::new();
        let mut read_any = false;

        for table in tables {
            let path = Path::new(&self.proc_root).join(table);
            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(CollectorError::Io(err)),
            };
            read_any = true;

            for line in content.lines().skip(1) {
                if let Some(socket) = parse_socket_line(line) {
                    sockets.push(socket);
                }
            }
        }

        if !read_any {
            return Err(CollectorError::Unavailable(
                "socket table not readable (no /proc/net/tcp or /proc/net/tcp6)".to_string(),
            ));
        }

        Ok(sockets)
    }

    /// Map socket inodes to pids by walking `/proc/<pid>/fd` symlinks.
    ///
    /// Entries we may not read (other users' processes without privilege)
    /// are skipped; affected sockets end up with nulled process fields.
    fn socket_owners(&self) -> HashMap<u64, u32> {
        let mut owners = HashMap::new();

        let Ok(proc_entries) = fs::read_dir(&self.proc_root) else {
            return owners;
        };

        for entry in proc_entries.flatten() {
            let name = entry.file_name();
            let Some(pid) = name.to_str().and_then(|n| n.parse::<u32>().ok()) else {
                continue;
            };

            let fd_dir = entry.path().join("fd");
            let Ok(fds) = fs::read_dir(&fd_dir) else {
                continue;
            };

            for fd in fds.flatten() {
                let Ok(target) = fs::read_link(fd.path()) else {
                    continue;
                };
                if let Some(inode) = parse_socket_link(&target.to_string_lossy()) {
                    owners.entry(inode).or_insert(pid);
                }
            }
        }

        owners
    }
}

impl Default for PortsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Collector for PortsCollector {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Ports
    }

    async fn collect_all(&self) -> CollectorResult<Vec<Record>> {
        Ok(self.enumerate()?.into_iter().map(Record::Port).collect())
    }

    async fn collect_one(&self, key: &str) -> CollectorResult<Option<Record>> {
        // A key that is not a port number cannot match any record
        let Ok(port) = key.parse::<u16>() else {
            return Ok(None);
        };

        Ok(self
            .enumerate()?
            .into_iter()
            .find(|record| record.port == port)
            .map(Record::Port))
    }
}

/// Parse one data line of the socket table; `None` for non-LISTEN entries
/// and malformed lines.
fn parse_socket_line(line: &str) -> Option<ListenSocket> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 10 {
        return None;
    }

    if fields[3] != TCP_LISTEN {
        return None;
    }

    // local_address is "<hex ip>:<hex port>"
    let (_, port_hex) = fields[1].rsplit_once(':')?;
    let port = u16::from_str_radix(port_hex, 16).ok()?;
    let inode = fields[9].parse::<u64>().ok()?;

    Some(ListenSocket { port, inode })
}

/// Extract the inode from a `socket:[12345]` fd link target.
fn parse_socket_link(target: &str) -> Option<u64> {
    target
        .strip_prefix("socket:[")?
        .strip_suffix(']')?
        .parse()
        .ok()
}
