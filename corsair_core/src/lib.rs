//! Corsair Core - the pirate-ship movement worker.
//!
//! Two loops share one entity view:
//! 1. **Poll Loop**: pulls ops from the fabric and applies them to the view
//! 2. **Steering Loop**: every period, sends a random `ShipControls` update
//!    to every ship in the view
//!
//! They coordinate through [`SharedState`]: a view lock, a send lock and a
//! connected flag that the poll loop flips once on disconnect.

pub mod entity_view;
pub mod error;
pub mod poll;
pub mod shared;
pub mod steering;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use entity_view::{ApplyStats, EntityRecord, EntityView};
pub use error::WorkerError;
pub use poll::{PollLoop, PollReport};
pub use shared::SharedState;
pub use steering::{SteeringCommand, SteeringLimits, SteeringLoop, SteeringReport};
pub use worker::{Worker, WorkerConfig, WorkerReport, LOGGER_NAME};
