//! Container-runtime collector
//!
//! Talks to the `docker` CLI, the one interface that is present wherever the
//! runtime is, and parses its `--format '{{json .}}'` output. Enumeration
//! covers images and containers in every run state; the detail view runs
//! `docker inspect` to additionally resolve the configured command and the
//! published-port mapping.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::trace;

use crate::{ContainerKind, ContainerRecord, Record, Subsystem};

use super::{Collector, CollectorError, CollectorResult};

pub struct DockerCollector {
    binary: String,
}

impl DockerCollector {
    pub fn new() -> Self {
        Self {
            binary: "docker".to_string(),
        }
    }

    async fn run(&self, args: &[&str]) -> CollectorResult<std::process::Output> {
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::NotFound => {
                    CollectorError::Unavailable(format!("{} binary not found", self.binary))
                }
                _ => CollectorError::Io(err),
            })?;

        Ok(output)
    }

    async fn run_checked(&self, args: &[&str]) -> CollectorResult<String> {
        let output = self.run(args).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CollectorError::Command {
                command: format!("{} {}", self.binary, args.join(" ")),
                detail: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for DockerCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Collector for DockerCollector {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Containers
    }

    async fn collect_all(&self) -> CollectorResult<Vec<Record>> {
        let images = self
            .run_checked(&["images", "--format", "{{json .}}"])
            .await?;
        let containers = self
            .run_checked(&["ps", "--all", "--format", "{{json .}}"])
            .await?;

        let mut records = Vec::new();
        for row in parse_json_lines::<ImageRow>(&images)? {
            records.push(Record::Container(row.into_record()));
        }
        for row in parse_json_lines::<ContainerRow>(&containers)? {
            records.push(Record::Container(row.into_record()));
        }

        trace!("docker reported {} records", records.len());
        Ok(records)
    }

    async fn collect_one(&self, key: &str) -> CollectorResult<Option<Record>> {
        let output = self
            .run(&["inspect", "--type", "container", key])
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // inspect uses the same exit code for "unknown name" and real
            // failures; the message tells them apart
            if stderr.contains("No such container") || stderr.contains("No such object") {
                return Ok(None);
            }
            return Err(CollectorError::Command {
                command: format!("{} inspect {}", self.binary, key),
                detail: stderr.trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let record = parse_inspect_output(&stdout)?;
        Ok(record.map(Record::Container))
    }
}

fn parse_json_lines<T: for<'de> Deserialize<'de>>(output: &str) -> CollectorResult<Vec<T>> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str(line)
                .map_err(|err| CollectorError::Parse(format!("docker json row: {}", err)))
        })
        .collect()
}

/// Parse `docker inspect` output (a JSON array) into a detail record.
fn parse_inspect_output(output: &str) -> CollectorResult<Option<ContainerRecord>> {
    let inspected: Vec<Inspect> = serde_json::from_str(output)
        .map_err(|err| CollectorError::Parse(format!("docker inspect output: {}", err)))?;

    Ok(inspected.into_iter().next().map(Inspect::into_record))
}

#[derive(Debug, Deserialize)]
struct ImageRow {
    #[serde(rename = "Repository")]
    repository: String,
    #[serde(rename = "Tag")]
    tag: String,
}

impl ImageRow {
    fn into_record(self) -> ContainerRecord {
        ContainerRecord {
            name: format!("{}:{}", self.repository, self.tag),
            kind: ContainerKind::Image,
            status: None,
            image: None,
            command: None,
            published_ports: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ContainerRow {
    #[serde(rename = "Names")]
    names: String,
    #[serde(rename = "Image")]
    image: Option<String>,
    #[serde(rename = "Status")]
    status: Option<String>,
}

impl ContainerRow {
    fn into_record(self) -> ContainerRecord {
        ContainerRecord {
            name: self.names,
            kind: ContainerKind::Container,
            status: self.status,
            image: self.image,
            command: None,
            published_ports: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Inspect {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "State")]
    state: Option<InspectState>,
    #[serde(rename = "Config")]
    config: Option<InspectConfig>,
    #[serde(rename = "NetworkSettings")]
    network: Option<InspectNetwork>,
}

#[derive(Debug, Deserialize)]
struct InspectState {
    #[serde(rename = "Status")]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InspectConfig {
    #[serde(rename = "Cmd")]
    cmd: Option<Vec<String>>,
    #[serde(rename = "Image")]
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InspectNetwork {
    #[serde(rename = "Ports")]
    ports: Option<BTreeMap<String, Option<Vec<PortBinding>>>>,
}

#[derive(Debug, Deserialize)]
struct PortBinding {
    #[serde(rename = "HostIp")]
    host_ip: Option<String>,
    #[serde(rename = "HostPort")]
    host_port: Option<String>,
}

impl Inspect {
    fn into_record(self) -> ContainerRecord {
        // inspect reports names with a leading slash
        let name = self.name.trim_start_matches('/').to_string();
        let status = self.state.and_then(|state| state.status);
        let (command, image) = match self.config {
            Some(config) => (config.cmd.map(|cmd| cmd.join(" ")), config.image),
            None => (None, None),
        };
        let published_ports = self
            .network
            .and_then(|network| network.ports)
            .and_then(|ports| format_port_bindings(&ports));

        ContainerRecord {
            name,
            kind: ContainerKind::Container,
            status,
            image,
            command,
            published_ports,
        }
    }
}

/// Render the inspect port map as "0.0.0.0:8080->80/tcp, 443/tcp".
fn format_port_bindings(ports: &BTreeMap<String, Option<Vec<PortBinding>>>) -> Option<String> {
    if ports.is_empty() {
        return None;
    }

    let mut parts = Vec::new();
    for (container_port, bindings) in ports {
        match bindings {
            Some(bindings) if !bindings.is_empty() => {
                for binding in bindings {
                    let host_ip = binding.host_ip.as_deref().unwrap_or("0.0.0.0");
                    let host_port = binding.host_port.as_deref().unwrap_or("?");
                    parts.push(format!("{}:{}->{}", host_ip, host_port, container_port));
                }
            }
            _ => parts.push(container_port.clone()),
        }
    }

    Some(parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_image_rows() {
        let output = r#"{"Repository":"nginx","Tag":"1.27","ID":"0123456789ab","CreatedSince":"3 weeks ago","Size":"192MB"}
{"Repository":"redis","Tag":"latest","ID":"ba9876543210","CreatedSince":"2 months ago","Size":"117MB"}
"#;

        let rows = parse_json_lines::<ImageRow>(output).unwrap();
        let records: Vec<ContainerRecord> = rows.into_iter().map(ImageRow::into_record).collect();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "nginx:1.27");
        assert_eq!(records[0].kind, ContainerKind::Image);
        assert_eq!(records[0].status, None);
        assert_eq!(records[1].name, "redis:latest");
    }

    #[test]
    fn test_parse_container_rows() {
        let output = r#"{"Command":"\"docker-entrypoint.s…\"","CreatedAt":"2026-08-01 10:00:00 +0000 UTC","ID":"abcdef012345","Image":"redis:latest","Names":"cache","Ports":"6379/tcp","State":"running","Status":"Up 2 days"}
{"Command":"\"/bin/sh\"","CreatedAt":"2026-07-15 08:30:00 +0000 UTC","ID":"fedcba987654","Image":"alpine:3.20","Names":"scratchpad","Ports":"","State":"exited","Status":"Exited (0) 3 weeks ago"}
"#;

        let rows = parse_json_lines::<ContainerRow>(output).unwrap();
        let records: Vec<ContainerRecord> =
            rows.into_iter().map(ContainerRow::into_record).collect();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "cache");
        assert_eq!(records[0].kind, ContainerKind::Container);
        assert_eq!(records[0].status.as_deref(), Some("Up 2 days"));
        assert_eq!(records[0].image.as_deref(), Some("redis:latest"));
        // stopped containers are enumerated too
        assert_eq!(records[1].status.as_deref(), Some("Exited (0) 3 weeks ago"));
    }

    #[test]
    fn test_parse_json_lines_rejects_garbage() {
        let result = parse_json_lines::<ContainerRow>("not json at all");
        assert!(matches!(result, Err(CollectorError::Parse(_))));
    }

    #[test]
    fn test_parse_inspect_output() {
        let output = r#"[
  {
    "Id": "abcdef012345",
    "Name": "/cache",
    "State": { "Status": "running", "Running": true },
    "Config": {
      "Cmd": ["redis-server", "--appendonly", "yes"],
      "Image": "redis:latest"
    },
    "NetworkSettings": {
      "Ports": {
        "6379/tcp": [{ "HostIp": "0.0.0.0", "HostPort": "6379" }],
        "16379/tcp": null
      }
    }
  }
]"#;

        let record = parse_inspect_output(output).unwrap().unwrap();
        assert_eq!(record.name, "cache");
        assert_eq!(record.status.as_deref(), Some("running"));
        assert_eq!(record.image.as_deref(), Some("redis:latest"));
        assert_eq!(
            record.command.as_deref(),
            Some("redis-server --appendonly yes")
        );
        assert_eq!(
            record.published_ports.as_deref(),
            Some("16379/tcp, 0.0.0.0:6379->6379/tcp")
        );
    }

    #[test]
    fn test_parse_inspect_empty_array() {
        assert_eq!(parse_inspect_output("[]").unwrap(), None);
    }

    #[test]
    fn test_format_port_bindings_empty_map() {
        assert_eq!(format_port_bindings(&BTreeMap::new()), None);
    }
}
