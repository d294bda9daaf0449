//! Corsair deterministic simulation harness.
//!
//! Runs the real worker loops against a simulated fabric. Everything the
//! worker cannot observe directly is controlled from one seed:
//! - **Time**: the steering loop sleeps on a virtual clock
//! - **Randomness**: steering draws and worker ids come from a seeded RNG
//! - **Fabric**: ops are scripted per pass, and every send is audited
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────── ScenarioRunner ────────────────────────┐
//! │   Fleet (ground truth) ──ops──► SimGateway ──poll──► Worker    │
//! │        ▲                            │                  │       │
//! │        └────── ShipControls ◄───────┴──── send ◄───────┘       │
//! │                                  (overlap / post-disconnect    │
//! │                                   audits)                      │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use corsair_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42, 5).run(ScenarioId::Storm).await;
//! assert!(result.passed);
//! ```

mod context;
mod fleet;
mod gateway;
mod runner;
pub mod scenarios;

pub use context::SimContext;
pub use fleet::{Fleet, Ship, MAX_SHIP_SPEED};
pub use gateway::{SentLog, SentUpdate, SimGateway};
pub use runner::{ScenarioResult, ScenarioRunner, SHUTDOWN_BOUND};
