//! Poll Loop - pulls ops from the gateway into the entity view.
//!
//! ```text
//! Connected ──poll/apply──► Connected ──Disconnect op──► Disconnected
//!     │
//!     └──Fatal log op──► RemoteFatal (process terminates)
//! ```

use crate::error::WorkerError;
use crate::shared::SharedState;
use corsair_env::{Gateway, LogLevel, Op, WorkerContext};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Counters for a finished poll loop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollReport {
    /// Non-empty batches received
    pub batches: u64,
    pub ops_applied: u64,
    pub ops_dropped: u64,
    pub remote_logs: u64,
    pub poll_errors: u64,
    pub disconnect_reason: Option<String>,
}

pub struct PollLoop<Ctx, G> {
    context: Arc<Ctx>,
    gateway: Arc<G>,
    shared: Arc<SharedState>,
    timeout: Duration,
}

impl<Ctx, G> PollLoop<Ctx, G>
where
    Ctx: WorkerContext,
    G: Gateway,
{
    pub fn new(context: Arc<Ctx>, gateway: Arc<G>, shared: Arc<SharedState>, timeout: Duration) -> Self {
        Self {
            context,
            gateway,
            shared,
            timeout,
        }
    }

    /// Polls until a `Disconnect` op arrives.
    ///
    /// This loop is the only writer of the connected flag. A fatal remote
    /// log ends it with [`WorkerError::RemoteFatal`] without flipping the
    /// flag; the caller is expected to terminate.
    pub async fn run(self) -> Result<PollReport, WorkerError> {
        let mut report = PollReport::default();
        info!(timeout_ms = self.timeout.as_millis() as u64, "poll loop started");

        while self.shared.is_connected() {
            let ops = match self.gateway.poll(self.timeout).await {
                Ok(ops) => ops,
                Err(e) => {
                    report.poll_errors += 1;
                    warn!(error = %e, "poll failed, retrying next iteration");
                    self.context.sleep(self.timeout).await;
                    continue;
                }
            };
            if ops.is_empty() {
                continue;
            }
            report.batches += 1;
            self.process(&ops, &mut report).await?;
        }

        info!(
            batches = report.batches,
            applied = report.ops_applied,
            dropped = report.ops_dropped,
            "poll loop stopped"
        );
        Ok(report)
    }

    /// Applies one batch under the view lock, then handles control ops in order.
    ///
    /// Control ops after a `Disconnect` in the same batch are not handled.
    async fn process(&self, ops: &[Op], report: &mut PollReport) -> Result<(), WorkerError> {
        let stats = {
            let mut view = self.shared.lock_view().await;
            view.apply(ops)
        };
        report.ops_applied += stats.applied as u64;
        report.ops_dropped += stats.dropped as u64;
        debug!(ops = ops.len(), applied = stats.applied, dropped = stats.dropped, "applied batch");

        for op in ops {
            match op {
                Op::LogMessage { level, message } if level.is_fatal() => {
                    error!(target: "remote", "Fatal error: {}", message);
                    return Err(WorkerError::RemoteFatal(message.clone()));
                }
                Op::LogMessage { level, message } => {
                    report.remote_logs += 1;
                    echo_remote_log(*level, message);
                }
                Op::Disconnect { reason } => {
                    warn!(%reason, "disconnected from fabric");
                    report.disconnect_reason = Some(reason.clone());
                    self.shared.mark_disconnected().await;
                    break;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn echo_remote_log(level: LogLevel, message: &str) {
    match level {
        LogLevel::Debug => debug!(target: "remote", "{}", message),
        LogLevel::Info => info!(target: "remote", "{}", message),
        LogLevel::Warn => warn!(target: "remote", "{}", message),
        LogLevel::Error | LogLevel::Fatal => error!(target: "remote", "{}", message),
    }
}
