//! Session abstraction between a worker and the simulation fabric.

use async_trait::async_trait;
use crate::component::ComponentUpdate;
use crate::error::EnvError;
use crate::op::Op;
use crate::types::{EntityId, LogLevel};
use std::time::Duration;

/// An established session with the simulation fabric.
///
/// # Implementations
///
/// - **Production**: `TcpGateway` - newline-delimited JSON over TCP
/// - **Simulation**: `SimGateway` - scripted ops, recorded sends
///
/// # Op Flow
///
/// ```text
/// Fabric                     Gateway                    Worker
///   |-- ops ------------------->|                          |
///   |                           |<--------- poll(timeout) -|
///   |                           |-- Vec<Op> -------------->|
///   |<-- component update ------|<-- send_component_update-|
/// ```
///
/// # Sending
///
/// The send path is not assumed to be reentrant. Callers must serialize
/// every `send_*` call; `corsair_core::SharedState` owns the lock for that.
#[async_trait]
pub trait Gateway: Send + Sync + 'static {
    /// Fetches the ops that arrived since the last poll.
    ///
    /// Blocks for at most `timeout`. A timeout is not an error: it yields an
    /// empty batch. Ops are returned in delivery order.
    async fn poll(&self, timeout: Duration) -> Result<Vec<Op>, EnvError>;

    /// Sends a component update for an entity.
    async fn send_component_update(
        &self,
        entity_id: EntityId,
        update: ComponentUpdate,
    ) -> Result<(), EnvError>;

    /// Sends a log message to the fabric.
    async fn send_log_message(
        &self,
        level: LogLevel,
        logger_name: &str,
        message: &str,
    ) -> Result<(), EnvError>;

    /// Whether the session is still open.
    fn is_connected(&self) -> bool;

    /// The id this worker registered with.
    fn worker_id(&self) -> &str;
}
