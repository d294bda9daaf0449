//! In-crate doubles for the gateway and context, used by the loop tests.

use async_trait::async_trait;
use corsair_env::{ComponentUpdate, EntityId, EnvError, Gateway, LogLevel, Op, WorkerContext};
use rand::distributions::Alphanumeric;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Gateway that replays scripted batches and records every send.
pub struct RecordingGateway {
    batches: Mutex<VecDeque<Vec<Op>>>,
    pub updates: Mutex<Vec<(EntityId, ComponentUpdate)>>,
    pub logs: Mutex<Vec<(LogLevel, String)>>,
    in_flight: AtomicUsize,
    pub overlaps: AtomicUsize,
    send_delay: Duration,
    fail_sends: AtomicBool,
    failing_polls: AtomicUsize,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::with_send_delay(Duration::ZERO)
    }

    pub fn with_send_delay(send_delay: Duration) -> Self {
        Self {
            batches: Mutex::new(VecDeque::new()),
            updates: Mutex::new(Vec::new()),
            logs: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            overlaps: AtomicUsize::new(0),
            send_delay,
            fail_sends: AtomicBool::new(false),
            failing_polls: AtomicUsize::new(0),
        }
    }

    pub fn push_batch(&self, ops: Vec<Op>) {
        self.batches.lock().unwrap().push_back(ops);
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Makes the next `count` polls fail before any batch is handed out.
    pub fn fail_polls(&self, count: usize) {
        self.failing_polls.store(count, Ordering::SeqCst);
    }

    pub fn sent_updates(&self) -> Vec<(EntityId, ComponentUpdate)> {
        self.updates.lock().unwrap().clone()
    }

    async fn enter_send(&self) -> Result<(), EnvError> {
        if self.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        if !self.send_delay.is_zero() {
            tokio::time::sleep(self.send_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(EnvError::network("injected send failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl Gateway for RecordingGateway {
    async fn poll(&self, timeout: Duration) -> Result<Vec<Op>, EnvError> {
        let failing = self
            .failing_polls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(EnvError::network("injected poll failure"));
        }
        let next = self.batches.lock().unwrap().pop_front();
        match next {
            Some(ops) => Ok(ops),
            None => {
                tokio::time::sleep(timeout).await;
                Ok(Vec::new())
            }
        }
    }

    async fn send_component_update(
        &self,
        entity_id: EntityId,
        update: ComponentUpdate,
    ) -> Result<(), EnvError> {
        self.enter_send().await?;
        self.updates.lock().unwrap().push((entity_id, update));
        Ok(())
    }

    async fn send_log_message(
        &self,
        level: LogLevel,
        _logger_name: &str,
        message: &str,
    ) -> Result<(), EnvError> {
        self.enter_send().await?;
        self.logs.lock().unwrap().push((level, message.to_string()));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn worker_id(&self) -> &str {
        "PirateShipMovement_test"
    }
}

/// Seeded draws on the real clock.
pub struct SeededContext {
    seed: u64,
    rng: Mutex<ChaCha8Rng>,
    start: Instant,
}

impl SeededContext {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
            start: Instant::now(),
        }
    }
}

#[async_trait]
impl WorkerContext for SeededContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn uniform(&self, low: f32, high: f32) -> f32 {
        self.rng.lock().unwrap().gen_range(low..=high)
    }

    fn random_alphanumeric(&self, len: usize) -> String {
        let mut rng = self.rng.lock().unwrap();
        (0..len).map(|_| char::from(rng.sample(Alphanumeric))).collect()
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}
