//! `WorkerContext` for the deployed worker.

use crate::WorkerContext;
use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Wall clock plus `thread_rng`. Unseeded, so every run draws differently.
pub struct TokioContext {
    started: Instant,
}

impl TokioContext {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkerContext for TokioContext {
    fn now(&self) -> Duration {
        self.started.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn uniform(&self, low: f32, high: f32) -> f32 {
        rand::thread_rng().gen_range(low..=high)
    }

    fn random_alphanumeric(&self, len: usize) -> String {
        let rng = rand::thread_rng();
        rng.sample_iter(&Alphanumeric).take(len).map(char::from).collect()
    }

    fn seed(&self) -> u64 {
        0
    }
}
