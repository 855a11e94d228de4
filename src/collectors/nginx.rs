//! Reverse-proxy virtual-host collector
//!
//! Runs `nginx -T` (dump the full live configuration) and parses the dump
//! into domain → upstream mappings: one record per `server_name` entry, with
//! the block's first `listen` and first `proxy_pass` attached.
//!
//! The parser tracks brace depth line by line, so `proxy_pass` directives
//! nested in `location` blocks are attributed to the enclosing `server`
//! block. Comments are stripped before matching.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use tracing::trace;

use crate::{ProxyHostRecord, Record, Subsystem};

use super::{Collector, CollectorError, CollectorResult};

static SERVER_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^server\s*\{").expect("valid regex"));
static SERVER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^server_name\s+([^;]+);").expect("valid regex"));
static LISTEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^listen\s+([^;]+);").expect("valid regex"));
static PROXY_PASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^proxy_pass\s+([^;]+);").expect("valid regex"));

pub struct NginxCollector {
    binary: String,
}

impl NginxCollector {
    pub fn new() -> Self {
        Self {
            binary: "nginx".to_string(),
        }
    }

    async fn dump_config(&self) -> CollectorResult<String> {
        let output = Command::new(&self.binary)
            .arg("-T")
            .output()
            .await
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::NotFound => {
                    CollectorError::Unavailable(format!("{} binary not found", self.binary))
                }
                _ => CollectorError::Io(err),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CollectorError::Command {
                command: format!("{} -T", self.binary),
                detail: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for NginxCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Collector for NginxCollector {
    fn subsystem(&self) -> Subsystem {
        Subsystem::ProxyHosts
    }

    async fn collect_all(&self) -> CollectorResult<Vec<Record>> {
        let config = self.dump_config().await?;
        let hosts = parse_config(&config);
        trace!("nginx config declared {} virtual hosts", hosts.len());
        Ok(hosts.into_iter().map(Record::ProxyHost).collect())
    }

    async fn collect_one(&self, key: &str) -> CollectorResult<Option<Record>> {
        let config = self.dump_config().await?;
        Ok(parse_config(&config)
            .into_iter()
            .find(|host| host.domain == key)
            .map(Record::ProxyHost))
    }
}

#[derive(Debug, Default)]
struct ServerBlock {
    names: Vec<String>,
    listen: Option<String>,
    upstream: Option<String>,
}

impl ServerBlock {
    fn flush_into(self, records: &mut Vec<ProxyHostRecord>) {
        for domain in self.names {
            records.push(ProxyHostRecord {
                domain,
                listen: self.listen.clone(),
                upstream: self.upstream.clone(),
            });
        }
    }
}

/// Parse a full configuration dump into virtual-host records.
///
/// Server blocks without a `server_name` directive contribute nothing; a
/// block naming several domains contributes one record per domain.
fn parse_config(config: &str) -> Vec<ProxyHostRecord> {
    let mut records = Vec::new();
    let mut depth: usize = 0;
    let mut block: Option<ServerBlock> = None;
    let mut block_depth = 0;
    let mut pending_server = false;

    for raw_line in config.lines() {
        let code = raw_line.split('#').next().unwrap_or_default();
        let trimmed = code.trim();

        if block.is_none() {
            if SERVER_OPEN.is_match(trimmed) {
                block = Some(ServerBlock::default());
                block_depth = depth + 1;
                pending_server = false;
            } else if trimmed == "server" {
                pending_server = true;
            } else if pending_server && trimmed.starts_with('{') {
                block = Some(ServerBlock::default());
                block_depth = depth + 1;
                pending_server = false;
            } else if !trimmed.is_empty() {
                pending_server = false;
            }
        } else if let Some(current) = block.as_mut() {
            if let Some(captures) = SERVER_NAME.captures(trimmed) {
                current
                    .names
                    .extend(captures[1].split_whitespace().map(str::to_string));
            } else if let Some(captures) = LISTEN.captures(trimmed) {
                if current.listen.is_none() {
                    current.listen = Some(captures[1].trim().to_string());
                }
            } else if let Some(captures) = PROXY_PASS.captures(trimmed) {
                if current.upstream.is_none() {
                    current.upstream = Some(captures[1].trim().to_string());
                }
            }
        }

        for ch in code.chars() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth = depth.saturating_sub(1);
                    if depth < block_depth
                        && let Some(finished) = block.take()
                    {
                        finished.flush_into(&mut records);
                    }
                }
                _ => {}
            }
        }
    }

    // unterminated trailing block (truncated dump)
    if let Some(finished) = block.take() {
        finished.flush_into(&mut records);
    }

    records
}
