//! Core environment context trait for Corsair workers.

use async_trait::async_trait;
use std::time::Duration;

/// The central interface for time and randomness.
///
/// The worker loops never touch the clock or an RNG directly, so the same
/// loop code runs in production and under the deterministic harness.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`, `thread_rng`
/// - **Simulation**: `SimContext` - virtual clock, seeded `ChaCha8Rng`
#[async_trait]
pub trait WorkerContext: Send + Sync + 'static {
    /// Returns the monotonic time since context creation.
    ///
    /// Under the harness this is virtual time.
    fn now(&self) -> Duration;

    /// Waits for `duration`.
    ///
    /// Deployed: `tokio::time::sleep`.
    /// Harness: advances the virtual clock, then yields briefly.
    async fn sleep(&self, duration: Duration);

    /// Draws a value uniformly from `[low, high]`, both bounds inclusive.
    fn uniform(&self, low: f32, high: f32) -> f32;

    /// Returns `len` random characters from `[0-9A-Za-z]`.
    ///
    /// Used to synthesize worker ids when none is assigned.
    fn random_alphanumeric(&self, len: usize) -> String;

    /// Seed behind the random draws, logged at startup.
    ///
    /// Zero when unseeded.
    fn seed(&self) -> u64;
}
