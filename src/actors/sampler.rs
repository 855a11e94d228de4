//! SamplerActor - periodic snapshot capture into the history store

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, instrument, warn};

use crate::Snapshot;
use crate::assembler::Assembler;
use crate::history::{History, HistoryResult};

use super::messages::{SampleEvent, SamplerCommand};

/// Actor that samples the host on a fixed period and stores the snapshots
///
/// The loop alternates between idle and one sampling pass at a time. A pass
/// is awaited inline in the select arm, so a timer expiry during a pass is
/// deferred rather than overlapped, and shutdown is only honored between
/// passes.
pub struct SamplerActor {
    /// Snapshot assembler over the registered collectors
    assembler: Assembler,

    /// The stored history; this actor is its only writer
    history: History,

    /// Command receiver for control messages
    command_rx: mpsc::Receiver<SamplerCommand>,

    /// Broadcast sender for publishing stored snapshots
    event_tx: broadcast::Sender<SampleEvent>,

    /// Current sampling period
    interval_duration: Duration,
}

impl SamplerActor {
    fn new(
        assembler: Assembler,
        interval_duration: Duration,
        command_rx: mpsc::Receiver<SamplerCommand>,
        event_tx: broadcast::Sender<SampleEvent>,
    ) -> Self {
        Self {
            assembler,
            history: History::new(),
            command_rx,
            event_tx,
            interval_duration,
        }
    }

    /// Run the actor's main loop
    ///
    /// Runs until a Shutdown command arrives or the command channel closes.
    /// The first tick fires immediately, so a fresh daemon has a snapshot
    /// right away instead of after one full period.
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!(
            "starting sampler with period {}s",
            self.interval_duration.as_secs()
        );

        let mut ticker = interval(self.interval_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.sample().await {
                        warn!("sample skipped: {}", err);
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        SamplerCommand::SampleNow { respond_to } => {
                            debug!("received SampleNow command");
                            let result = self.sample().await;
                            let _ = respond_to.send(result);
                        }

                        SamplerCommand::UpdateInterval { period_secs } => {
                            debug!("updating period to {period_secs}s");
                            self.interval_duration = Duration::from_secs(period_secs);
                            ticker = interval(self.interval_duration);
                            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                            // the fresh ticker's immediate first tick is fine,
                            // it just samples once at the switchover
                        }

                        SamplerCommand::Range { start, end, respond_to } => {
                            let _ = respond_to.send(self.history.range(start, end));
                        }

                        SamplerCommand::Latest { respond_to } => {
                            let _ = respond_to.send(self.history.latest().cloned());
                        }

                        SamplerCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        debug!("sampler stopped with {} stored snapshots", self.history.len());
    }

    /// One sampling pass: assemble, log the per-subsystem outcomes, append,
    /// publish.
    ///
    /// A snapshot with degraded subsystems is still stored; partial
    /// visibility beats a gap in history. An out-of-order append (clock
    /// regression) skips this sample and keeps the loop alive.
    async fn sample(&mut self) -> HistoryResult<DateTime<Utc>> {
        let snapshot = self.assembler.assemble().await;
        let captured_at = snapshot.captured_at;

        for (subsystem, report) in snapshot.subsystems.iter() {
            match &report.error {
                None => info!(
                    "sampled {} at {}: {} records",
                    subsystem,
                    captured_at,
                    report.records.len()
                ),
                Some(reason) => warn!(
                    "sampled {} at {}: unavailable: {}",
                    subsystem, captured_at, reason
                ),
            }
        }

        self.history.append(snapshot.clone())?;

        // It's OK if there are no subscribers; the history is the source of
        // truth and events are a convenience for sinks.
        let _ = self.event_tx.send(SampleEvent { snapshot });

        Ok(captured_at)
    }
}

/// Handle for controlling a running sampler actor
///
/// Cloneable; all access to the actor-owned history goes through here.
#[derive(Clone)]
pub struct SamplerHandle {
    sender: mpsc::Sender<SamplerCommand>,
    event_tx: broadcast::Sender<SampleEvent>,
}

impl SamplerHandle {
    /// Spawn a sampler actor as a tokio task and return its handle.
    pub fn spawn(assembler: Assembler, interval_duration: Duration) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (event_tx, _) = broadcast::channel(16);

        let actor = SamplerActor::new(assembler, interval_duration, cmd_rx, event_tx.clone());
        tokio::spawn(actor.run());

        Self {
            sender: cmd_tx,
            event_tx,
        }
    }

    /// Subscribe to stored-snapshot events.
    pub fn subscribe(&self) -> broadcast::Receiver<SampleEvent> {
        self.event_tx.subscribe()
    }

    /// Trigger an immediate sampling pass and return its capture time.
    pub async fn sample_now(&self) -> Result<DateTime<Utc>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SamplerCommand::SampleNow { respond_to: tx })
            .await
            .context("failed to send SampleNow command")?;

        let captured_at = rx.await.context("failed to receive response")??;
        Ok(captured_at)
    }

    /// Update the sampling period.
    pub async fn update_interval(&self, period_secs: u64) -> Result<()> {
        self.sender
            .send(SamplerCommand::UpdateInterval { period_secs })
            .await
            .context("failed to send UpdateInterval command")?;
        Ok(())
    }

    /// Inclusive range query over the stored history.
    pub async fn range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Snapshot>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SamplerCommand::Range {
                start,
                end,
                respond_to: tx,
            })
            .await
            .context("failed to send Range command")?;

        let snapshots = rx.await.context("failed to receive response")??;
        Ok(snapshots)
    }

    /// The most recently stored snapshot, if any.
    pub async fn latest(&self) -> Result<Option<Snapshot>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SamplerCommand::Latest { respond_to: tx })
            .await
            .context("failed to send Latest command")?;

        let snapshot = rx.await.context("failed to receive response")?;
        Ok(snapshot)
    }

    /// Gracefully shut down the sampler.
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(SamplerCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
