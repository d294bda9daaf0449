//! State shared by the poll and steering loops.
//!
//! ```text
//!            ┌──────────────── SharedState ────────────────┐
//! Poll  ────►│ connected: AtomicBool  (written once, by poll)│◄──── Steering
//!   apply ──►│ view: Mutex<EntityView> (one batch / one pass)│◄── snapshot
//!            │ send_lock: Mutex<()>   (one gateway send)     │◄── send
//!            └───────────────────────────────────────────────┘
//! ```
//!
//! Lock order: view lock before send lock. A task holding the send lock
//! never takes the view lock.

use crate::entity_view::EntityView;
use corsair_env::{ComponentUpdate, EnvError, EntityId, Gateway, LogLevel};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, MutexGuard, Notify};

/// Handle bundling the connected flag and both locks.
///
/// Passed to both loops as an `Arc` at startup.
#[derive(Debug)]
pub struct SharedState {
    connected: AtomicBool,
    disconnected: Notify,
    view: Mutex<EntityView>,
    send_lock: Mutex<()>,
}

impl SharedState {
    /// Creates state for a freshly connected worker.
    pub fn new() -> Self {
        Self::with_view(EntityView::new())
    }

    /// Creates state around an existing view (tests, warm starts).
    pub fn with_view(view: EntityView) -> Self {
        Self {
            connected: AtomicBool::new(true),
            disconnected: Notify::new(),
            view: Mutex::new(view),
            send_lock: Mutex::new(()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Flips the flag to disconnected.
    ///
    /// Takes the send lock first, so the flip waits for an in-flight send
    /// and no send can start once it returns. Returns `true` only for the
    /// call that performed the transition; the flag never goes back to
    /// connected.
    pub async fn mark_disconnected(&self) -> bool {
        let _send = self.send_lock.lock().await;
        let was_connected = self.connected.swap(false, Ordering::AcqRel);
        if was_connected {
            self.disconnected.notify_waiters();
        }
        was_connected
    }

    /// Awaits `sleep`, returning early if the worker disconnects meanwhile.
    pub async fn sleep_while_connected<F>(&self, sleep: F)
    where
        F: std::future::Future<Output = ()>,
    {
        let notified = self.disconnected.notified();
        tokio::pin!(notified);
        // Register before re-checking so a flip in between is not missed.
        notified.as_mut().enable();
        if !self.is_connected() {
            return;
        }
        tokio::select! {
            _ = sleep => {}
            _ = notified => {}
        }
    }

    /// Acquires the view lock.
    pub async fn lock_view(&self) -> MutexGuard<'_, EntityView> {
        self.view.lock().await
    }

    /// Sends a component update while holding the send lock.
    ///
    /// Fails with [`EnvError::Disconnected`] once the flag is down.
    pub async fn send_component_update<G: Gateway + ?Sized>(
        &self,
        gateway: &G,
        entity_id: EntityId,
        update: ComponentUpdate,
    ) -> Result<(), EnvError> {
        let _send = self.send_lock.lock().await;
        if !self.is_connected() {
            return Err(EnvError::Disconnected);
        }
        gateway.send_component_update(entity_id, update).await
    }

    /// Sends a log message while holding the send lock.
    pub async fn send_log_message<G: Gateway + ?Sized>(
        &self,
        gateway: &G,
        level: LogLevel,
        logger_name: &str,
        message: &str,
    ) -> Result<(), EnvError> {
        let _send = self.send_lock.lock().await;
        if !self.is_connected() {
            return Err(EnvError::Disconnected);
        }
        gateway.send_log_message(level, logger_name, message).await
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
