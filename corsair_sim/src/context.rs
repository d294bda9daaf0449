//! Seeded, virtual-clock `WorkerContext` for the harness.

use async_trait::async_trait;
use corsair_env::WorkerContext;
use rand::distributions::Alphanumeric;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Context whose clock only moves when someone sleeps on it.
///
/// Steering draws and worker-id suffixes come from a ChaCha8 stream seeded
/// once, so a seed pins down every value the worker picks. Each `sleep`
/// also waits one real tick so the poll task gets scheduled between passes.
///
/// Clones share the clock and the stream.
#[derive(Clone)]
pub struct SimContext {
    seed: u64,
    clock_ns: Arc<AtomicU64>,
    stream: Arc<Mutex<ChaCha8Rng>>,
    real_tick: Duration,
}

impl SimContext {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            clock_ns: Arc::new(AtomicU64::new(0)),
            stream: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
            real_tick: Duration::from_millis(1),
        }
    }

    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    /// Wall-clock wait per `sleep`. Zero only yields.
    pub fn with_real_tick(mut self, real_tick: Duration) -> Self {
        self.real_tick = real_tick;
        self
    }

    /// Moves the virtual clock forward without waiting.
    pub fn advance(&self, by: Duration) {
        self.clock_ns.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl WorkerContext for SimContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.clock_ns.load(Ordering::SeqCst))
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        if self.real_tick.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.real_tick).await;
        }
    }

    fn uniform(&self, low: f32, high: f32) -> f32 {
        self.stream.lock().unwrap().gen_range(low..=high)
    }

    fn random_alphanumeric(&self, len: usize) -> String {
        let mut stream = self.stream.lock().unwrap();
        (0..len).map(|_| char::from(stream.sample(Alphanumeric))).collect()
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}
