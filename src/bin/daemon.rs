use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use clap::Parser;
use hostfetch::Snapshot;
use hostfetch::actors::SamplerHandle;
use hostfetch::assembler::Assembler;
use hostfetch::config::{Config, read_config_file};
use hostfetch::util::{get_history_override, get_interval_override};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(name = "hostfetchd", about = "Continuously sample host state")]
struct Args {
    /// Config file (JSON); defaults apply when omitted
    #[arg(short)]
    file: Option<String>,
}

fn init() {
    dotenv::dotenv().ok();

    let filter = filter::Targets::new().with_targets(vec![
        ("hostfetch", LevelFilter::TRACE),
        ("hostfetchd", LevelFilter::TRACE),
    ]);
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

    let mut config = match &args.file {
        Some(path) => read_config_file(path)?,
        None => Config::default(),
    };

    // environment wins over the config file
    if let Some(interval_secs) = get_interval_override() {
        config.interval_secs = interval_secs;
    }
    if let Some(history_path) = get_history_override() {
        config.history_path = history_path;
    }

    info!(
        "sampling every {}s, snapshot log at {}",
        config.interval_secs,
        config.history_path.display()
    );

    let assembler = Assembler::with_host_collectors();
    let handle = SamplerHandle::spawn(assembler, Duration::from_secs(config.interval_secs));

    // snapshot log sink: one JSON snapshot per line, append-only
    let mut events = handle.subscribe();
    let history_path = config.history_path.clone();
    let sink = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Err(err) = append_snapshot(&history_path, &event.snapshot) {
                        error!("failed to write snapshot log: {:#}", err);
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!("snapshot log sink lagged, {missed} snapshots not written");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    // the sampler finishes any in-flight pass before honoring this
    handle.shutdown().await?;
    drop(handle);
    let _ = sink.await;

    Ok(())
}

fn append_snapshot(path: &Path, snapshot: &Snapshot) -> anyhow::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let line = serde_json::to_string(snapshot)?;
    writeln!(file, "{line}")?;
    Ok(())
}
