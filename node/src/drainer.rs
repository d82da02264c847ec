use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::NodeResult;
use crate::service::{ForgeOutcome, NodeService};

/// Receives a notice for each transfer the drainer manages to commit.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify(&self, outcome: &ForgeOutcome) -> NodeResult<()>;
}

/// Posts outcomes as JSON to a front-end endpoint.
pub struct HttpAlertSink {
    client: reqwest::Client,
    url: String,
}

impl HttpAlertSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> NodeResult<Self> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl AlertSink for HttpAlertSink {
    async fn notify(&self, outcome: &ForgeOutcome) -> NodeResult<()> {
        self.client
            .post(&self.url)
            .json(outcome)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub attempted: usize,
    pub committed: usize,
    pub deferred: usize,
    pub rejected: usize,
}

/// Resubmits deferred transactions on a fixed cadence.
pub struct TransactionDrainer {
    service: Arc<NodeService>,
    alerts: Option<Arc<dyn AlertSink>>,
    interval: Duration,
    pop_timeout: Duration,
}

pub struct DrainerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl DrainerHandle {
    /// Signals the loop and waits for it to exit. A cycle already in
    /// progress finishes first.
    pub async fn stop(self) -> NodeResult<()> {
        let _ = self.shutdown.send(true);
        self.task.await?;
        Ok(())
    }
}

impl TransactionDrainer {
    pub fn new(service: Arc<NodeService>, alerts: Option<Arc<dyn AlertSink>>) -> Self {
        let interval = service.config().drain_interval();
        let pop_timeout = service.config().drain_pop_timeout();
        Self {
            service,
            alerts,
            interval,
            pop_timeout,
        }
    }

    pub fn with_timing(mut self, interval: Duration, pop_timeout: Duration) -> Self {
        self.interval = interval;
        self.pop_timeout = pop_timeout;
        self
    }

    pub fn spawn(self) -> DrainerHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        match self.drain_once().await {
                            Ok(report) if report.attempted == 0 => debug!("retry queue idle"),
                            Ok(report) => info!(?report, "drain cycle finished"),
                            Err(err) => warn!(?err, "drain cycle failed"),
                        }
                    }
                }
            }
            debug!("transaction drainer stopped");
        });
        DrainerHandle { shutdown, task }
    }

    /// One pass over the queue. Only the items present when the pass starts
    /// are attempted, so a deferral cannot loop within a single pass. The
    /// head entry leaves the queue only after its outcome is persisted.
    pub async fn drain_once(&self) -> NodeResult<DrainReport> {
        let budget = self.service.queue_len().max(1);
        let mut report = DrainReport::default();
        for attempt in 0..budget {
            let next = if attempt == 0 {
                self.service.retry_queue().peek_timeout(self.pop_timeout).await?
            } else {
                self.service.retry_queue().try_peek()?
            };
            let Some(entry) = next else {
                break;
            };
            report.attempted += 1;
            let key = entry.transaction.business_key();
            let outcome = match self.service.resubmit_queued(entry).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(%key, ?err, "resubmission failed; entry stays queued");
                    return Err(err);
                }
            };
            match &outcome {
                ForgeOutcome::Committed { block } => {
                    report.committed += 1;
                    info!(%key, index = block.index, "queued transaction committed");
                    self.alert(&outcome).await;
                }
                ForgeOutcome::Deferred { .. } => {
                    // Peers are still unreachable; leave the rest for the next pass.
                    report.deferred += 1;
                    break;
                }
                ForgeOutcome::Rejected { .. } => {
                    report.rejected += 1;
                    info!(%key, "queued transaction already committed elsewhere; dropped");
                }
            }
        }
        Ok(report)
    }

    async fn alert(&self, outcome: &ForgeOutcome) {
        if let Some(alerts) = &self.alerts {
            if let Err(err) = alerts.notify(outcome).await {
                warn!(?err, "failed to deliver commit alert");
            }
        }
    }
}
