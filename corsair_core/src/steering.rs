//! Steering Loop - periodic randomized `ShipControls` updates.
//!
//! Every period the loop takes the view lock for one full pass, so the set
//! of ships cannot change under it, and sends one update per ship. Each send
//! goes through the send lock.

use crate::shared::SharedState;
use corsair_env::{ComponentUpdate, EntityId, EnvError, Gateway, ShipControlsUpdate, WorkerContext};
use serde::Serialize;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Bounds for the random draws, both inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct SteeringLimits {
    pub speed: RangeInclusive<f32>,

    /// Kept small so ships don't suddenly turn around
    pub steering: RangeInclusive<f32>,
}

impl Default for SteeringLimits {
    fn default() -> Self {
        Self {
            speed: 0.0..=1.0,
            steering: -15.0..=15.0,
        }
    }
}

impl SteeringLimits {
    /// Whether a command lies within these limits.
    pub fn admits(&self, command: &SteeringCommand) -> bool {
        self.speed.contains(&command.target_speed) && self.steering.contains(&command.target_steering)
    }
}

/// One randomized steering order for one ship.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SteeringCommand {
    pub target_speed: f32,
    pub target_steering: f32,
}

impl SteeringCommand {
    /// Draws speed and steering independently from `limits`.
    pub fn random<Ctx: WorkerContext + ?Sized>(ctx: &Ctx, limits: &SteeringLimits) -> Self {
        Self {
            target_speed: ctx.uniform(*limits.speed.start(), *limits.speed.end()),
            target_steering: ctx.uniform(*limits.steering.start(), *limits.steering.end()),
        }
    }

    pub fn into_update(self) -> ComponentUpdate {
        let mut update = ShipControlsUpdate::default();
        update
            .set_target_speed(self.target_speed)
            .set_target_steering(self.target_steering);
        ComponentUpdate::ShipControls(update)
    }
}

/// Counters for a finished steering loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SteeringReport {
    pub passes: u64,
    pub sends: u64,
    pub send_failures: u64,
}

pub struct SteeringLoop<Ctx, G> {
    context: Arc<Ctx>,
    gateway: Arc<G>,
    shared: Arc<SharedState>,
    period: Duration,
    limits: SteeringLimits,
}

impl<Ctx, G> SteeringLoop<Ctx, G>
where
    Ctx: WorkerContext,
    G: Gateway,
{
    pub fn new(
        context: Arc<Ctx>,
        gateway: Arc<G>,
        shared: Arc<SharedState>,
        period: Duration,
        limits: SteeringLimits,
    ) -> Self {
        Self {
            context,
            gateway,
            shared,
            period,
            limits,
        }
    }

    /// Runs passes until the worker disconnects.
    ///
    /// The flag is checked before every pass and before every send, and the
    /// sleep between passes ends early on disconnect.
    pub async fn run(self) -> SteeringReport {
        let mut report = SteeringReport::default();
        info!(period_ms = self.period.as_millis() as u64, "steering loop started");

        while self.shared.is_connected() {
            self.steer_once(&mut report).await;
            self.shared
                .sleep_while_connected(self.context.sleep(self.period))
                .await;
        }

        info!(
            passes = report.passes,
            sends = report.sends,
            failures = report.send_failures,
            "steering loop stopped"
        );
        report
    }

    /// One pass over every ship in the view.
    pub async fn steer_once(&self, report: &mut SteeringReport) {
        let view = self.shared.lock_view().await;
        let ships = view.snapshot();
        debug!(ships = ships.len(), "steering pass");

        for entity_id in ships {
            if !self.steer_ship(entity_id, report).await {
                debug!("disconnected mid-pass, skipping remaining ships");
                break;
            }
        }

        drop(view);
        report.passes += 1;
    }

    /// Sends one command. Returns `false` once the worker is disconnected.
    async fn steer_ship(&self, entity_id: EntityId, report: &mut SteeringReport) -> bool {
        if !self.shared.is_connected() {
            return false;
        }
        let command = SteeringCommand::random(self.context.as_ref(), &self.limits);
        let result = self
            .shared
            .send_component_update(self.gateway.as_ref(), entity_id, command.into_update())
            .await;

        match result {
            Ok(()) => report.sends += 1,
            Err(EnvError::Disconnected) => return false,
            Err(e) => {
                report.send_failures += 1;
                warn!(entity = %entity_id, error = %e, "steering update failed");
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity_view::EntityView;
    use crate::test_support::{RecordingGateway, SeededContext};
    use corsair_env::{LogLevel, Op};
    use proptest::prelude::*;
    use std::sync::atomic::Ordering;

    fn view_with(ids: &[i64]) -> EntityView {
        let mut view = EntityView::new();
        let ops: Vec<Op> = ids
            .iter()
            .map(|id| Op::AddEntity {
                entity_id: EntityId(*id),
                components: vec![],
            })
            .collect();
        view.apply(&ops);
        view
    }

    fn steering_loop(
        gateway: &Arc<RecordingGateway>,
        shared: &Arc<SharedState>,
        period: Duration,
    ) -> SteeringLoop<SeededContext, RecordingGateway> {
        SteeringLoop::new(
            Arc::new(SeededContext::new(7)),
            Arc::clone(gateway),
            Arc::clone(shared),
            period,
            SteeringLimits::default(),
        )
    }

    fn command_of(update: &ComponentUpdate) -> SteeringCommand {
        match update {
            ComponentUpdate::ShipControls(u) => SteeringCommand {
                target_speed: u.target_speed.unwrap(),
                target_steering: u.target_steering.unwrap(),
            },
            other => panic!("unexpected update {:?}", other),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_one_pass_sends_once_per_ship_without_overlap() {
        let gateway = Arc::new(RecordingGateway::with_send_delay(Duration::from_millis(5)));
        let shared = Arc::new(SharedState::with_view(view_with(&[1, 2, 3])));
        let steering = steering_loop(&gateway, &shared, Duration::from_secs(5));

        // A second producer hammering the send path at the same time
        let chatter = {
            let gateway = Arc::clone(&gateway);
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                for _ in 0..5 {
                    shared
                        .send_log_message(gateway.as_ref(), LogLevel::Info, "test", "ahoy")
                        .await
                        .unwrap();
                }
            })
        };

        let mut report = SteeringReport::default();
        steering.steer_once(&mut report).await;
        chatter.await.unwrap();

        let updates = gateway.sent_updates();
        let ids: Vec<EntityId> = updates.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![EntityId(1), EntityId(2), EntityId(3)]);
        assert_eq!(report, SteeringReport { passes: 1, sends: 3, send_failures: 0 });
        assert_eq!(gateway.overlaps.load(Ordering::SeqCst), 0);

        let limits = SteeringLimits::default();
        for (_, update) in &updates {
            assert!(limits.admits(&command_of(update)));
        }
    }

    #[tokio::test]
    async fn test_failed_send_does_not_stop_the_pass() {
        let gateway = Arc::new(RecordingGateway::new());
        gateway.fail_sends(true);
        let shared = Arc::new(SharedState::with_view(view_with(&[10, 11])));
        let steering = steering_loop(&gateway, &shared, Duration::from_secs(5));

        let mut report = SteeringReport::default();
        steering.steer_once(&mut report).await;

        assert_eq!(report, SteeringReport { passes: 1, sends: 0, send_failures: 2 });
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_no_sends_after_disconnect() {
        let gateway = Arc::new(RecordingGateway::new());
        let shared = Arc::new(SharedState::with_view(view_with(&[1, 2])));
        let period = Duration::from_millis(20);
        let handle = tokio::spawn(steering_loop(&gateway, &shared, period).run());

        while gateway.sent_updates().len() < 6 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        // Flip while holding the view lock so no pass is in progress.
        let sent_at_flip = {
            let _view = shared.lock_view().await;
            shared.mark_disconnected().await;
            gateway.sent_updates().len()
        };

        let report = tokio::time::timeout(period * 10, handle)
            .await
            .expect("steering loop did not stop")
            .unwrap();

        assert_eq!(gateway.sent_updates().len(), sent_at_flip);
        assert_eq!(report.sends as usize, sent_at_flip);
    }

    #[tokio::test]
    async fn test_loop_exits_promptly_despite_long_period() {
        let gateway = Arc::new(RecordingGateway::new());
        let shared = Arc::new(SharedState::with_view(view_with(&[1])));
        let handle = tokio::spawn(steering_loop(&gateway, &shared, Duration::from_secs(3600)).run());

        while gateway.sent_updates().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        shared.mark_disconnected().await;

        let report = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("steering loop did not wake on disconnect")
            .unwrap();
        assert_eq!(report.passes, 1);
    }

    #[test]
    fn test_degenerate_limits() {
        let ctx = SeededContext::new(1);
        let limits = SteeringLimits {
            speed: 1.0..=1.0,
            steering: -15.0..=-15.0,
        };
        let command = SteeringCommand::random(&ctx, &limits);
        assert_eq!(command.target_speed, 1.0);
        assert_eq!(command.target_steering, -15.0);
    }

    proptest! {
        #[test]
        fn prop_commands_stay_in_bounds(seed in any::<u64>()) {
            let ctx = SeededContext::new(seed);
            let limits = SteeringLimits::default();
            for _ in 0..32 {
                let command = SteeringCommand::random(&ctx, &limits);
                prop_assert!(limits.admits(&command), "{:?}", command);
            }
        }
    }
}
