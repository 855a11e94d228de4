use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDateTime, Utc};
use clap::{ArgGroup, Parser};
use hostfetch::assembler::Assembler;
use hostfetch::history::History;
use hostfetch::query::{QueryEngine, QueryOutcome};
use hostfetch::render::{record_detail, record_table};
use hostfetch::{Snapshot, Subsystem};
use tracing::{level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Parser)]
#[command(
    name = "hostfetch",
    about = "Inspect listening ports, containers, proxy hosts and local accounts",
    group = ArgGroup::new("mode").required(true).multiple(true)
)]
struct Args {
    /// List listening ports, or show one port
    #[arg(short, long, value_name = "PORT", num_args = 0..=1, group = "mode")]
    port: Option<Option<u16>>,

    /// List images and containers, or show one container
    #[arg(short, long, value_name = "NAME", num_args = 0..=1, group = "mode")]
    docker: Option<Option<String>>,

    /// List proxy virtual hosts, or show one domain
    #[arg(short, long, value_name = "DOMAIN", num_args = 0..=1, group = "mode")]
    nginx: Option<Option<String>>,

    /// List local accounts with last login, or show one account
    #[arg(short, long, value_name = "USERNAME", num_args = 0..=1, group = "mode")]
    users: Option<Option<String>>,

    /// Query recorded history: "<start>,<end>", each %Y-%m-%d %H:%M:%S (UTC).
    /// Combine with a subsystem flag to list that subsystem per snapshot.
    #[arg(short, long, value_name = "START,END", group = "mode")]
    time: Option<String>,

    /// Snapshot log written by hostfetchd
    #[arg(long, value_name = "FILE", default_value = "./history.jsonl")]
    history: PathBuf,
}

/// An optional-value mode flag, made explicit: the flag alone means "list
/// everything", the flag with a value means "show this one".
#[derive(Debug, Clone)]
enum Selector<T> {
    List,
    Detail(T),
}

impl<T> From<Option<T>> for Selector<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            None => Selector::List,
            Some(value) => Selector::Detail(value),
        }
    }
}

fn init() {
    let filter = filter::Targets::new().with_target("hostfetch", LevelFilter::WARN);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    // a time range scopes the whole invocation to recorded history
    if let Some(raw_range) = &args.time {
        return run_time_query(&args, raw_range);
    }

    let assembler = Assembler::with_host_collectors();
    let engine = QueryEngine::new(&assembler);

    if let Some(selection) = &args.port {
        let selector = Selector::from(selection.map(|port| port.to_string()));
        run_subsystem(&assembler, &engine, Subsystem::Ports, selector).await?;
    }

    if let Some(selection) = &args.docker {
        run_subsystem(
            &assembler,
            &engine,
            Subsystem::Containers,
            Selector::from(selection.clone()),
        )
        .await?;
    }

    if let Some(selection) = &args.nginx {
        run_subsystem(
            &assembler,
            &engine,
            Subsystem::ProxyHosts,
            Selector::from(selection.clone()),
        )
        .await?;
    }

    if let Some(selection) = &args.users {
        run_subsystem(
            &assembler,
            &engine,
            Subsystem::Accounts,
            Selector::from(selection.clone()),
        )
        .await?;
    }

    Ok(())
}

/// One live query against the host.
///
/// Unlike the daemon's tolerant sampling, a failure of an explicitly
/// requested subsystem here is a visible failure: it propagates and the
/// process exits non-zero. NotFound is data and exits zero.
async fn run_subsystem(
    assembler: &Assembler,
    engine: &QueryEngine<'_>,
    subsystem: Subsystem,
    selector: Selector<String>,
) -> anyhow::Result<()> {
    match selector {
        Selector::List => {
            let collector = assembler
                .collector(subsystem)
                .ok_or_else(|| anyhow!("{}: no collector registered", subsystem))?;
            let records = collector
                .collect_all()
                .await
                .map_err(|err| anyhow!("{}: {}", subsystem, err))?;
            print!("{}", record_table(&records));
        }
        Selector::Detail(key) => {
            let outcome = engine
                .detail(subsystem, &key, None)
                .await
                .map_err(|err| anyhow!("{}: {}", subsystem, err))?;
            match outcome {
                QueryOutcome::Found(record) => print!("{}", record_detail(&record)),
                QueryOutcome::NotFound => println!("{}: no record for '{}'", subsystem, key),
            }
        }
    }

    Ok(())
}

fn run_time_query(args: &Args, raw_range: &str) -> anyhow::Result<()> {
    let (start, end) = parse_time_range(raw_range)?;
    let history = load_history(&args.history)?;
    let snapshots = history.range(start, end)?;

    if snapshots.is_empty() {
        println!("no snapshots between {} and {}", start, end);
        return Ok(());
    }

    let selected = selected_subsystems(args);
    for snapshot in &snapshots {
        print_snapshot(snapshot, &selected);
    }

    Ok(())
}

/// Subsystem flags present on the command line, in display order.
fn selected_subsystems(args: &Args) -> Vec<Subsystem> {
    let mut selected = Vec::new();
    if args.port.is_some() {
        selected.push(Subsystem::Ports);
    }
    if args.docker.is_some() {
        selected.push(Subsystem::Containers);
    }
    if args.nginx.is_some() {
        selected.push(Subsystem::ProxyHosts);
    }
    if args.users.is_some() {
        selected.push(Subsystem::Accounts);
    }
    selected
}

fn print_snapshot(snapshot: &Snapshot, selected: &[Subsystem]) {
    println!("=== {}", snapshot.captured_at.format(TIME_FORMAT));

    if selected.is_empty() {
        // summary view: record count or failure reason per subsystem
        for (subsystem, report) in snapshot.subsystems.iter() {
            match &report.error {
                None => println!("{}: {} records", subsystem, report.records.len()),
                Some(reason) => println!("{}: unavailable: {}", subsystem, reason),
            }
        }
    } else {
        for subsystem in selected {
            println!("[{}]", subsystem);
            match &snapshot.subsystems.report(*subsystem).error {
                None => print!("{}", record_table(QueryEngine::list(snapshot, *subsystem))),
                Some(reason) => println!("unavailable: {}", reason),
            }
        }
    }

    println!();
}

fn parse_time_range(raw: &str) -> anyhow::Result<(DateTime<Utc>, DateTime<Utc>)> {
    let (start_raw, end_raw) = raw
        .split_once(',')
        .with_context(|| format!("expected \"<start>,<end>\", got '{}'", raw))?;

    Ok((parse_timestamp(start_raw)?, parse_timestamp(end_raw)?))
}

fn parse_timestamp(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw.trim(), TIME_FORMAT)
        .with_context(|| format!("unparsable timestamp '{}' (expected {})", raw.trim(), TIME_FORMAT))?;
    Ok(naive.and_utc())
}

/// Rebuild a history from the daemon's snapshot log (one JSON snapshot per
/// line), re-validating capture-time ordering.
fn load_history(path: &Path) -> anyhow::Result<History> {
    let content = fs::read_to_string(path).with_context(|| {
        format!(
            "no recorded history at {} (is hostfetchd running?)",
            path.display()
        )
    })?;

    let mut snapshots: Vec<Snapshot> = Vec::new();
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        snapshots.push(
            serde_json::from_str(line)
                .with_context(|| format!("malformed snapshot on line {}", index + 1))?,
        );
    }

    History::from_snapshots(snapshots)
        .context("history file violates capture-time ordering")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_time_range() {
        let (start, end) =
            parse_time_range("2026-08-01 00:00:00,2026-08-02 12:30:00").unwrap();
        assert_eq!(start.format(TIME_FORMAT).to_string(), "2026-08-01 00:00:00");
        assert_eq!(end.format(TIME_FORMAT).to_string(), "2026-08-02 12:30:00");
    }

    #[test]
    fn test_parse_time_range_requires_two_timestamps() {
        assert!(parse_time_range("2026-08-01 00:00:00").is_err());
        assert!(parse_time_range("nonsense,2026-08-02 12:30:00").is_err());
        assert!(parse_time_range("2026-08-01 00:00:00,later").is_err());
    }

    #[test]
    fn test_selector_from_optional_value() {
        assert!(matches!(Selector::<String>::from(None), Selector::List));
        assert!(matches!(
            Selector::from(Some("cache".to_string())),
            Selector::Detail(name) if name == "cache"
        ));
    }

    #[test]
    fn test_load_history_round_trip() {
        use hostfetch::{SnapshotSubsystems, SubsystemReport};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");

        let mut lines = String::new();
        for secs in [100, 200] {
            let snapshot = Snapshot {
                captured_at: chrono::TimeZone::timestamp_opt(&Utc, secs, 0).unwrap(),
                subsystems: SnapshotSubsystems {
                    ports: SubsystemReport::ok(vec![]),
                    ..Default::default()
                },
            };
            lines.push_str(&serde_json::to_string(&snapshot).unwrap());
            lines.push('\n');
        }
        fs::write(&path, lines).unwrap();

        let history = load_history(&path).unwrap();
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_load_history_rejects_out_of_order_log() {
        use hostfetch::SnapshotSubsystems;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");

        let mut lines = String::new();
        for secs in [200, 100] {
            let snapshot = Snapshot {
                captured_at: chrono::TimeZone::timestamp_opt(&Utc, secs, 0).unwrap(),
                subsystems: SnapshotSubsystems::default(),
            };
            lines.push_str(&serde_json::to_string(&snapshot).unwrap());
            lines.push('\n');
        }
        fs::write(&path, lines).unwrap();

        assert!(load_history(&path).is_err());
    }
}
