//! Local-account collector
//!
//! Reads the system account database (`/etc/passwd`) and joins it with login
//! history from `lastlog`. The whole login table is fetched in one `lastlog`
//! run and indexed by username; the detail path asks for a single user via
//! `lastlog -u`.
//!
//! `lastlog` being unusable degrades to records with a null `last_login`,
//! the same shape the ports collector uses for unresolvable processes. An
//! unknown username is NotFound, not an error.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::warn;

use crate::{AccountRecord, Record, Subsystem};

use super::{Collector, CollectorError, CollectorResult};

pub struct AccountsCollector {
    passwd_path: PathBuf,
    lastlog_binary: String,
}

#[derive(Debug, Clone, PartialEq)]
struct PasswdEntry {
    username: String,
    uid: u32,
    gid: u32,
    home_dir: String,
    shell: String,
}

impl AccountsCollector {
    pub fn new() -> Self {
        Self {
            passwd_path: PathBuf::from("/etc/passwd"),
            lastlog_binary: "lastlog".to_string(),
        }
    }

    fn read_passwd(&self) -> CollectorResult<Vec<PasswdEntry>> {
        let content = fs::read_to_string(&self.passwd_path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                CollectorError::Unavailable(format!(
                    "account database {} not found",
                    self.passwd_path.display()
                ))
            } else {
                CollectorError::Io(err)
            }
        })?;

        Ok(parse_passwd(&content))
    }

    async fn last_logins(&self, args: &[&str]) -> Option<HashMap<String, Option<String>>> {
        let output = Command::new(&self.lastlog_binary)
            .args(args)
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => {
                Some(parse_lastlog(&String::from_utf8_lossy(&output.stdout)))
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                warn!("lastlog failed, login times unresolved: {}", stderr.trim());
                None
            }
            Err(err) => {
                warn!("lastlog not runnable, login times unresolved: {}", err);
                None
            }
        }
    }

    fn into_record(entry: PasswdEntry, last_login: Option<String>) -> Record {
        Record::Account(AccountRecord {
            username: entry.username,
            uid: entry.uid,
            gid: entry.gid,
            home_dir: Some(entry.home_dir),
            shell: Some(entry.shell),
            last_login,
        })
    }
}

impl Default for AccountsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Collector for AccountsCollector {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Accounts
    }

    async fn collect_all(&self) -> CollectorResult<Vec<Record>> {
        let entries = self.read_passwd()?;
        let logins = self.last_logins(&[]).await.unwrap_or_default();

        Ok(entries
            .into_iter()
            .map(|entry| {
                let last_login = logins.get(&entry.username).cloned().flatten();
                Self::into_record(entry, last_login)
            })
            .collect())
    }

    async fn collect_one(&self, key: &str) -> CollectorResult<Option<Record>> {
        let Some(entry) = self
            .read_passwd()?
            .into_iter()
            .find(|entry| entry.username == key)
        else {
            return Ok(None);
        };

        let last_login = self
            .last_logins(&["-u", key])
            .await
            .and_then(|logins| logins.get(key).cloned().flatten());

        Ok(Some(Self::into_record(entry, last_login)))
    }
}

/// Parse `/etc/passwd` content. Malformed lines are skipped.
fn parse_passwd(content: &str) -> Vec<PasswdEntry> {
    content
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() < 7 {
                return None;
            }
            Some(PasswdEntry {
                username: fields[0].to_string(),
                uid: fields[2].parse().ok()?,
                gid: fields[3].parse().ok()?,
                home_dir: fields[5].to_string(),
                shell: fields[6].to_string(),
            })
        })
        .collect()
}

/// Parse `lastlog` output into username → latest-login.
///
/// The `Latest` column is located via the header line, since the preceding
/// `Port`/`From` columns may be blank and break token counting. `None`
/// values are accounts that never logged in.
fn parse_lastlog(output: &str) -> HashMap<String, Option<String>> {
    let mut logins = HashMap::new();

    let mut lines = output.lines();
    let Some(header) = lines.next() else {
        return logins;
    };
    let Some(latest_offset) = header.find("Latest") else {
        return logins;
    };

    for line in lines {
        let Some(username) = line.split_whitespace().next() else {
            continue;
        };

        let latest = line.get(latest_offset..).unwrap_or("").trim();
        let value = if latest.is_empty() || latest.contains("Never logged in") {
            None
        } else {
            Some(latest.to_string())
        };

        logins.insert(username.to_string(), value);
    }

    logins
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PASSWD: &str = "root:x:0:0:root:/root:/bin/bash\n\
daemon:x:1:1:daemon:/usr/sbin:/usr/sbin/nologin\n\
broken line without colons\n\
ubuntu:x:1000:1000:Ubuntu:/home/ubuntu:/bin/bash\n";

    const LASTLOG: &str = "\
Username         Port     From             Latest\n\
root                                       **Never logged in**\n\
ubuntu           pts/0    203.0.113.5      Mon Aug  4 09:15:03 +0000 2026\n\
daemon                                     **Never logged in**\n";

    #[test]
    fn test_parse_passwd() {
        let entries = parse_passwd(PASSWD);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].username, "root");
        assert_eq!(entries[0].uid, 0);
        assert_eq!(entries[0].shell, "/bin/bash");
        assert_eq!(entries[2].username, "ubuntu");
        assert_eq!(entries[2].home_dir, "/home/ubuntu");
    }

    #[test]
    fn test_parse_passwd_skips_malformed_lines() {
        let entries = parse_passwd("no fields here\nalso:not:enough\n");
        assert_eq!(entries, Vec::new());
    }

    #[test]
    fn test_parse_lastlog_indexes_latest_column() {
        let logins = parse_lastlog(LASTLOG);

        assert_eq!(logins.get("root"), Some(&None));
        assert_eq!(logins.get("daemon"), Some(&None));
        assert_eq!(
            logins.get("ubuntu"),
            Some(&Some("Mon Aug  4 09:15:03 +0000 2026".to_string()))
        );
    }

    #[test]
    fn test_parse_lastlog_empty_output() {
        assert!(parse_lastlog("").is_empty());
        // a header alone carries no accounts
        assert!(parse_lastlog("Username  Port  From  Latest\n").is_empty());
    }

    #[tokio::test]
    async fn test_collect_one_unknown_user_is_not_found() {
        let collector = AccountsCollector {
            passwd_path: PathBuf::from("/etc/passwd"),
            lastlog_binary: "lastlog".to_string(),
        };

        // skip when the host has no account database at all
        if collector.read_passwd().is_err() {
            return;
        }

        let result = collector
            .collect_one("no-such-user-hostfetch-test")
            .await
            .unwrap();
        assert_eq!(result, None);
    }
}
