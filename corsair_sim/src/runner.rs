//! Scenario runner - drives a real worker against the simulated fabric.
//!
//! The worker's steering loop sleeps on the virtual clock, so one completed
//! steering pass advances virtual time by one period. The driver watches the
//! clock, and for every completed pass it feeds the worker's orders into the
//! fleet, moves the fleet, and fires the scenario's faults.

use crate::context::SimContext;
use crate::fleet::Fleet;
use crate::gateway::SimGateway;
use crate::scenarios::ScenarioId;

use corsair_core::{
    SharedState, SteeringCommand, SteeringLimits, Worker, WorkerConfig, WorkerError,
    WorkerReport, LOGGER_NAME,
};
use corsair_env::{
    ComponentUpdate, EntityId, EnvError, LogLevel, Op, WorkerContext, SHIP_WORKER_TYPE,
};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How long a disconnected worker may take to join both loops.
pub const SHUTDOWN_BOUND: Duration = Duration::from_secs(2);

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub scenario: ScenarioId,
    pub seed: u64,
    pub worker_id: String,

    /// Whether every check held
    pub passed: bool,

    /// Steering passes the driver observed
    pub passes: u64,

    pub sends: usize,

    /// Sends that started while another send was in flight
    pub overlaps: usize,

    /// Steering commands outside the configured limits
    pub out_of_bounds: usize,

    /// Sends that reached the gateway after the connected flag went down
    pub sends_after_disconnect: usize,

    /// Orders for ships that had already sunk
    pub stray_orders: u64,

    pub ships_afloat: usize,
    pub virtual_time_secs: f64,

    /// Wall time from disconnect delivery to worker exit
    pub shutdown_ms: Option<u64>,

    pub failure_reason: Option<String>,

    /// `None` when the worker ended in error
    pub worker_report: Option<WorkerReport>,
}

/// Runs one scenario per call against a fresh worker.
pub struct ScenarioRunner {
    seed: u64,
    ships: usize,

    /// Completed steering passes before the fabric disconnects
    passes: u64,

    /// Virtual steering period
    steering_period: Duration,

    /// Wall-clock pause per virtual sleep
    real_tick: Duration,

    poll_timeout: Duration,

    /// Wall-clock limit for one run
    deadline: Duration,
}

impl ScenarioRunner {
    pub fn new(seed: u64, ships: usize) -> Self {
        Self {
            seed,
            ships,
            passes: 10,
            steering_period: Duration::from_secs(5),
            real_tick: Duration::from_millis(1),
            poll_timeout: Duration::from_millis(5),
            deadline: Duration::from_secs(30),
        }
    }

    pub fn with_passes(mut self, passes: u64) -> Self {
        self.passes = passes.max(1);
        self
    }

    pub fn with_steering_period(mut self, period: Duration) -> Self {
        self.steering_period = period.max(Duration::from_millis(1));
        self
    }

    pub fn with_real_tick(mut self, tick: Duration) -> Self {
        self.real_tick = tick;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Runs a scenario and returns the result.
    pub async fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!(scenario = %scenario, seed = self.seed, ships = self.ships, "starting scenario");

        let context = Arc::new(SimContext::new(self.seed).with_real_tick(self.real_tick));
        // Ship placement is independent of the worker's draws
        let mut fleet = Fleet::new(self.seed.wrapping_mul(0x9e3779b97f4a7c15));

        let worker_id = format!("{}_{}", SHIP_WORKER_TYPE, context.random_alphanumeric(4));
        let gateway = Arc::new(SimGateway::new(worker_id.clone()));
        let shared = Arc::new(SharedState::new());
        gateway.watch(Arc::clone(&shared));

        if scenario == ScenarioId::Storm {
            gateway.set_send_delay(self.real_tick * 2);
        }

        let config = WorkerConfig {
            poll_timeout: self.poll_timeout,
            steering_period: self.steering_period,
            ..WorkerConfig::default()
        };
        let limits = config.limits.clone();
        let worker = Worker::with_shared(
            Arc::clone(&context),
            Arc::clone(&gateway),
            config,
            Arc::clone(&shared),
        );

        let mut run = Run::new(scenario, self.seed, worker_id);

        if let Err(e) = worker.announce().await {
            run.fail(format!("announce failed: {}", e));
            return run.finish(&gateway, &fleet, &context, &limits);
        }
        gateway.deliver(fleet.spawn_ships(self.ships));

        let chatter = (scenario == ScenarioId::Storm)
            .then(|| tokio::spawn(chatter(Arc::clone(&gateway), Arc::clone(&shared))));
        let handle = tokio::spawn(worker.run());

        let started = Instant::now();
        let mut cursor = 0;
        let mut disconnect_at: Option<Instant> = None;

        while !handle.is_finished() {
            if started.elapsed() > self.deadline {
                handle.abort();
                run.fail(format!("worker still running after {:?}", self.deadline));
                break;
            }
            tokio::time::sleep(self.real_tick).await;

            let completed = (context.now().as_nanos() / self.steering_period.as_nanos()) as u64;
            while run.passes < completed && disconnect_at.is_none() {
                run.passes += 1;
                cursor = ingest(&gateway, &mut fleet, cursor);
                gateway.deliver(fleet.step(self.steering_period.as_secs_f64()));
                self.fire_faults(scenario, run.passes, &mut fleet, &gateway);

                let last_pass = match scenario {
                    ScenarioId::PortCall => 1,
                    _ => self.passes,
                };
                if run.passes >= last_pass {
                    debug!(pass = run.passes, "delivering disconnect");
                    gateway.disconnect("scenario complete");
                    disconnect_at = Some(Instant::now());
                }
            }
        }

        let outcome = handle.await;
        run.shutdown_ms = disconnect_at.map(|at| at.elapsed().as_millis() as u64);
        if let Some(chatter) = chatter {
            chatter.abort();
        }
        ingest(&gateway, &mut fleet, cursor);

        match outcome {
            Ok(Ok(report)) => {
                if scenario.expects_fatal() {
                    run.fail("worker shut down cleanly, expected a remote fatal".to_string());
                }
                let view = shared.lock_view().await.snapshot();
                let afloat: BTreeSet<EntityId> = fleet.ids().into_iter().collect();
                if view != afloat {
                    run.fail(format!(
                        "worker view has {} ships, fleet has {}",
                        view.len(),
                        afloat.len()
                    ));
                }
                run.worker_report = Some(report);
            }
            Ok(Err(WorkerError::RemoteFatal(message))) if scenario.expects_fatal() => {
                info!(%message, "worker terminated on remote fatal as expected");
            }
            Ok(Err(e)) => run.fail(format!("worker failed: {}", e)),
            Err(e) if e.is_cancelled() => {}
            Err(e) => run.fail(format!("worker task panicked: {}", e)),
        }

        if let Some(ms) = run.shutdown_ms {
            if !scenario.expects_fatal() && ms > SHUTDOWN_BOUND.as_millis() as u64 {
                run.fail(format!("shutdown took {} ms", ms));
            }
        }

        run.finish(&gateway, &fleet, &context, &limits)
    }

    /// Scenario-specific events after pass `pass`.
    fn fire_faults(&self, scenario: ScenarioId, pass: u64, fleet: &mut Fleet, gateway: &SimGateway) {
        match scenario {
            ScenarioId::CalmSeas | ScenarioId::PortCall => {}
            ScenarioId::Shipwreck => {
                let mut batch: Vec<Op> = fleet.sink_random().into_iter().collect();
                batch.push(fleet.spawn_ship());
                debug!(pass, ops = batch.len(), "shipwreck");
                gateway.deliver(batch);
            }
            ScenarioId::Mutiny => {
                if pass == (self.passes / 2).max(1) {
                    warn!(pass, "mutiny aboard");
                    gateway.log(LogLevel::Fatal, "the crew has taken the ship");
                }
            }
            ScenarioId::Storm => {
                gateway.log(LogLevel::Warn, "squall on the horizon");
                gateway.log(LogLevel::Info, "barometer falling");
            }
        }
    }
}

/// Log traffic from a second producer sharing the send lock.
async fn chatter(gateway: Arc<SimGateway>, shared: Arc<SharedState>) {
    while shared.is_connected() {
        let sent = shared
            .send_log_message(gateway.as_ref(), LogLevel::Info, LOGGER_NAME, "all hands on deck")
            .await;
        if let Err(EnvError::Disconnected) = sent {
            break;
        }
        tokio::task::yield_now().await;
    }
}

/// Feeds sends past `cursor` into the fleet; returns the new cursor.
fn ingest(gateway: &SimGateway, fleet: &mut Fleet, cursor: usize) -> usize {
    let fresh = gateway.sent_updates_since(cursor);
    for sent in &fresh {
        fleet.apply_controls(sent.entity_id, &sent.update);
    }
    cursor + fresh.len()
}

fn command_of(update: &ComponentUpdate) -> Option<SteeringCommand> {
    match update {
        ComponentUpdate::ShipControls(u) => Some(SteeringCommand {
            target_speed: u.target_speed?,
            target_steering: u.target_steering?,
        }),
        ComponentUpdate::Position(_) => None,
    }
}

/// Result under construction.
struct Run {
    scenario: ScenarioId,
    seed: u64,
    worker_id: String,
    passes: u64,
    shutdown_ms: Option<u64>,
    failures: Vec<String>,
    worker_report: Option<WorkerReport>,
}

impl Run {
    fn new(scenario: ScenarioId, seed: u64, worker_id: String) -> Self {
        Self {
            scenario,
            seed,
            worker_id,
            passes: 0,
            shutdown_ms: None,
            failures: Vec::new(),
            worker_report: None,
        }
    }

    fn fail(&mut self, reason: String) {
        warn!(scenario = %self.scenario, %reason, "check failed");
        self.failures.push(reason);
    }

    fn finish(
        mut self,
        gateway: &SimGateway,
        fleet: &Fleet,
        context: &SimContext,
        limits: &SteeringLimits,
    ) -> ScenarioResult {
        let sent = gateway.sent_updates();
        let out_of_bounds = sent
            .iter()
            .filter(|s| !command_of(&s.update).is_some_and(|c| limits.admits(&c)))
            .count();

        if gateway.overlaps() > 0 {
            self.fail(format!("{} overlapping sends", gateway.overlaps()));
        }
        if out_of_bounds > 0 {
            self.fail(format!("{} commands out of bounds", out_of_bounds));
        }
        if gateway.sends_after_disconnect() > 0 {
            self.fail(format!(
                "{} sends after disconnect",
                gateway.sends_after_disconnect()
            ));
        }
        let announced = gateway
            .sent_logs()
            .first()
            .is_some_and(|log| log.message == "Connected successfully" && log.logger_name == LOGGER_NAME);
        if !announced {
            self.fail("worker did not announce itself first".to_string());
        }
        if self.scenario == ScenarioId::CalmSeas {
            let idle = fleet.ships().filter(|ship| ship.orders == 0).count();
            if idle > 0 && self.passes > 1 {
                self.fail(format!("{} ships never received an order", idle));
            }
        }

        let result = ScenarioResult {
            scenario: self.scenario,
            seed: self.seed,
            worker_id: self.worker_id,
            passed: self.failures.is_empty(),
            passes: self.passes,
            sends: sent.len(),
            overlaps: gateway.overlaps(),
            out_of_bounds,
            sends_after_disconnect: gateway.sends_after_disconnect(),
            stray_orders: fleet.stray_orders(),
            ships_afloat: fleet.len(),
            virtual_time_secs: context.now().as_secs_f64(),
            shutdown_ms: self.shutdown_ms,
            failure_reason: (!self.failures.is_empty()).then(|| self.failures.join("; ")),
            worker_report: self.worker_report,
        };

        if result.passed {
            info!(scenario = %result.scenario, sends = result.sends, passes = result.passes, "scenario passed");
        } else {
            warn!(scenario = %result.scenario, reason = ?result.failure_reason, "scenario failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_of_requires_both_fields() {
        let mut update = corsair_env::ShipControlsUpdate::default();
        update.set_target_speed(0.5);
        assert_eq!(command_of(&ComponentUpdate::ShipControls(update)), None);

        update.set_target_steering(3.0);
        assert_eq!(
            command_of(&ComponentUpdate::ShipControls(update)),
            Some(SteeringCommand {
                target_speed: 0.5,
                target_steering: 3.0
            })
        );
    }

    #[test]
    fn test_builder_clamps_degenerate_values() {
        let runner = ScenarioRunner::new(1, 3)
            .with_passes(0)
            .with_steering_period(Duration::ZERO);
        assert_eq!(runner.passes, 1);
        assert_eq!(runner.steering_period, Duration::from_millis(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_calm_seas_passes() {
        let result = ScenarioRunner::new(42, 4).with_passes(5).run(ScenarioId::CalmSeas).await;

        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.worker_id.starts_with("PirateShipMovement_"));
        assert_eq!(result.ships_afloat, 4);
        assert!(result.sends > 0);
    }
}
