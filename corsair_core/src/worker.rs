//! Worker Runtime - runs the poll and steering loops side by side.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────── Worker ─────────────────────────────┐
//! │  Context: WorkerContext (sleep, uniform draws)                  │
//! │  Gateway: Gateway       (poll ops, send updates)                │
//! │                                                                 │
//! │  ┌────────────┐     Arc<SharedState>      ┌────────────────┐    │
//! │  │ Poll Loop  │──► view lock / flag ◄─────│ Steering Loop  │    │
//! │  │  (task)    │                           │    (task)      │    │
//! │  └────────────┘        send lock ◄────────└────────────────┘    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use corsair_core::{Worker, WorkerConfig};
//! use corsair_env::{TcpGateway, TokioContext};
//!
//! let worker = Worker::new(TokioContext::shared(), Arc::new(gateway), WorkerConfig::default());
//! worker.announce().await?;
//! let report = worker.run().await?;
//! ```

use crate::error::WorkerError;
use crate::poll::{PollLoop, PollReport};
use crate::shared::SharedState;
use crate::steering::{SteeringLimits, SteeringLoop, SteeringReport};
use corsair_env::{Gateway, LogLevel, WorkerContext};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Logger name attached to log messages this worker sends to the fabric.
pub const LOGGER_NAME: &str = "corsair_worker";

/// Configuration for a ship worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Upper bound on one gateway poll (default: 100 ms)
    pub poll_timeout: Duration,

    /// Delay between steering passes (default: 5 s)
    pub steering_period: Duration,

    /// Bounds for the random steering draws
    pub limits: SteeringLimits,

    /// Logger name for messages sent to the fabric
    pub logger_name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(100),
            steering_period: Duration::from_secs(5),
            limits: SteeringLimits::default(),
            logger_name: LOGGER_NAME.to_string(),
        }
    }
}

/// What both loops did before shutdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerReport {
    pub poll: PollReport,
    pub steering: SteeringReport,
}

/// A connected ship worker.
///
/// Generic over the context and gateway implementations, so the same loops
/// run against the real fabric or the deterministic harness.
pub struct Worker<Ctx, G>
where
    Ctx: WorkerContext,
    G: Gateway,
{
    context: Arc<Ctx>,
    gateway: Arc<G>,
    shared: Arc<SharedState>,
    config: WorkerConfig,
}

impl<Ctx, G> Worker<Ctx, G>
where
    Ctx: WorkerContext,
    G: Gateway,
{
    /// Creates a worker over an established gateway session.
    pub fn new(context: Arc<Ctx>, gateway: Arc<G>, config: WorkerConfig) -> Self {
        Self::with_shared(context, gateway, config, Arc::new(SharedState::new()))
    }

    /// Creates a worker around caller-provided shared state.
    pub fn with_shared(
        context: Arc<Ctx>,
        gateway: Arc<G>,
        config: WorkerConfig,
        shared: Arc<SharedState>,
    ) -> Self {
        Self {
            context,
            gateway,
            shared,
            config,
        }
    }

    pub fn shared(&self) -> &Arc<SharedState> {
        &self.shared
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn worker_id(&self) -> &str {
        self.gateway.worker_id()
    }

    /// Tells the fabric the worker is up.
    pub async fn announce(&self) -> Result<(), WorkerError> {
        self.shared
            .send_log_message(
                self.gateway.as_ref(),
                LogLevel::Info,
                &self.config.logger_name,
                "Connected successfully",
            )
            .await?;
        Ok(())
    }

    /// Runs both loops until disconnect and joins them.
    ///
    /// On a fatal remote log the steering task is aborted, not joined, and
    /// [`WorkerError::RemoteFatal`] is returned for the caller to terminate on.
    pub async fn run(self) -> Result<WorkerReport, WorkerError> {
        info!(
            worker_id = self.gateway.worker_id(),
            seed = self.context.seed(),
            "listening to ops"
        );

        let poll = PollLoop::new(
            Arc::clone(&self.context),
            Arc::clone(&self.gateway),
            Arc::clone(&self.shared),
            self.config.poll_timeout,
        );
        let steering = SteeringLoop::new(
            Arc::clone(&self.context),
            Arc::clone(&self.gateway),
            Arc::clone(&self.shared),
            self.config.steering_period,
            self.config.limits.clone(),
        );

        let poll_task = tokio::spawn(poll.run());
        let steering_task = tokio::spawn(steering.run());

        let poll_report = match poll_task.await {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                steering_task.abort();
                return Err(e);
            }
            Err(join_error) => {
                error!(error = %join_error, "poll loop task failed");
                steering_task.abort();
                return Err(WorkerError::Task(join_error.to_string()));
            }
        };

        let steering_report = steering_task
            .await
            .map_err(|e| WorkerError::Task(e.to_string()))?;

        Ok(WorkerReport {
            poll: poll_report,
            steering: steering_report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingGateway, SeededContext};
    use corsair_env::{ComponentUpdate, EntityId, Op};
    use std::sync::atomic::Ordering;

    fn fast_config() -> WorkerConfig {
        WorkerConfig {
            poll_timeout: Duration::from_millis(5),
            steering_period: Duration::from_millis(20),
            ..WorkerConfig::default()
        }
    }

    fn ships(ids: &[i64]) -> Vec<Op> {
        ids.iter()
            .map(|id| Op::AddEntity {
                entity_id: EntityId(*id),
                components: vec![],
            })
            .collect()
    }

    #[test]
    fn test_worker_config_default() {
        let config = WorkerConfig::default();
        assert_eq!(config.poll_timeout, Duration::from_millis(100));
        assert_eq!(config.steering_period, Duration::from_secs(5));
        assert_eq!(config.limits, SteeringLimits::default());
        assert_eq!(config.logger_name, "corsair_worker");
    }

    #[tokio::test]
    async fn test_announce_sends_info_log() {
        let gateway = Arc::new(RecordingGateway::new());
        let worker = Worker::new(Arc::new(SeededContext::new(1)), Arc::clone(&gateway), fast_config());

        worker.announce().await.unwrap();

        let logs = gateway.logs.lock().unwrap().clone();
        assert_eq!(logs, vec![(LogLevel::Info, "Connected successfully".to_string())]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_run_until_disconnect() {
        let gateway = Arc::new(RecordingGateway::with_send_delay(Duration::from_millis(1)));
        gateway.push_batch(ships(&[1, 2, 3]));

        let worker = Worker::new(Arc::new(SeededContext::new(9)), Arc::clone(&gateway), fast_config());
        let handle = tokio::spawn(worker.run());

        while gateway.sent_updates().len() < 9 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        gateway.push_batch(vec![Op::Disconnect {
            reason: "shutdown".to_string(),
        }]);

        let report = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("worker did not shut down")
            .unwrap()
            .unwrap();

        assert_eq!(report.poll.disconnect_reason.as_deref(), Some("shutdown"));
        assert!(report.steering.passes >= 3);
        assert_eq!(report.steering.sends as usize, gateway.sent_updates().len());
        assert_eq!(gateway.overlaps.load(Ordering::SeqCst), 0);

        let limits = SteeringLimits::default();
        for (_, update) in gateway.sent_updates() {
            let ComponentUpdate::ShipControls(u) = update else {
                panic!("unexpected update {:?}", update);
            };
            assert!(limits.speed.contains(&u.target_speed.unwrap()));
            assert!(limits.steering.contains(&u.target_steering.unwrap()));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_remote_fatal_aborts_without_waiting_for_steering() {
        let gateway = Arc::new(RecordingGateway::new());
        gateway.push_batch(ships(&[1]));
        gateway.push_batch(vec![Op::LogMessage {
            level: LogLevel::Fatal,
            message: "out of memory".to_string(),
        }]);

        let config = WorkerConfig {
            steering_period: Duration::from_secs(3600),
            ..fast_config()
        };
        let worker = Worker::new(Arc::new(SeededContext::new(3)), Arc::clone(&gateway), config);

        let result = tokio::time::timeout(Duration::from_secs(5), worker.run())
            .await
            .expect("fatal log did not end the worker");

        assert!(matches!(result, Err(WorkerError::RemoteFatal(_))));
    }
}
