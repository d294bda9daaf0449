//! Simulated fabric session with fault injection and send auditing.

use async_trait::async_trait;
use corsair_core::SharedState;
use corsair_env::{ComponentUpdate, EntityId, EnvError, Gateway, LogLevel, Op};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// A component update the worker sent.
#[derive(Debug, Clone, PartialEq)]
pub struct SentUpdate {
    pub entity_id: EntityId,
    pub update: ComponentUpdate,

    /// Wall time since the gateway was created
    pub started: Duration,
    pub finished: Duration,
}

/// A log message the worker sent.
#[derive(Debug, Clone, PartialEq)]
pub struct SentLog {
    pub level: LogLevel,
    pub logger_name: String,
    pub message: String,
}

/// In-memory gateway driven by the scenario runner.
///
/// Ops queued with [`SimGateway::deliver`] come out of `poll` one batch at a
/// time. Every send is recorded and audited:
/// - `overlaps`: sends that began while another send was in flight
/// - `sends_after_disconnect`: sends that began after the watched worker's
///   connected flag went down
pub struct SimGateway {
    worker_id: String,

    /// Batches waiting to be polled
    inbox: Mutex<VecDeque<Vec<Op>>>,
    ready: Notify,

    sent: Mutex<Vec<SentUpdate>>,
    logs: Mutex<Vec<SentLog>>,

    in_flight: AtomicUsize,
    overlaps: AtomicUsize,
    sends_after_disconnect: AtomicUsize,

    /// Artificial duration of every send, in microseconds
    send_delay_us: AtomicU64,
    fail_sends: AtomicBool,

    connected: AtomicBool,
    witness: Mutex<Option<Arc<SharedState>>>,
    start: Instant,
}

impl SimGateway {
    pub fn new(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            inbox: Mutex::new(VecDeque::new()),
            ready: Notify::new(),
            sent: Mutex::new(Vec::new()),
            logs: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            overlaps: AtomicUsize::new(0),
            sends_after_disconnect: AtomicUsize::new(0),
            send_delay_us: AtomicU64::new(0),
            fail_sends: AtomicBool::new(false),
            connected: AtomicBool::new(true),
            witness: Mutex::new(None),
            start: Instant::now(),
        }
    }

    /// Queues one batch of ops for the next poll.
    pub fn deliver(&self, ops: Vec<Op>) {
        if ops.is_empty() {
            return;
        }
        self.inbox.lock().unwrap().push_back(ops);
        self.ready.notify_one();
    }

    /// Queues a disconnect.
    pub fn disconnect(&self, reason: &str) {
        self.deliver(vec![Op::Disconnect {
            reason: reason.to_string(),
        }]);
    }

    /// Queues a log message from the fabric.
    pub fn log(&self, level: LogLevel, message: &str) {
        self.deliver(vec![Op::LogMessage {
            level,
            message: message.to_string(),
        }]);
    }

    /// Makes every send take at least `delay`.
    pub fn set_send_delay(&self, delay: Duration) {
        self.send_delay_us
            .store(delay.as_micros() as u64, Ordering::Relaxed);
    }

    /// Makes sends fail with a network error.
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::Relaxed);
    }

    /// Audits sends against a worker's connected flag.
    pub fn watch(&self, shared: Arc<SharedState>) {
        *self.witness.lock().unwrap() = Some(shared);
    }

    pub fn sent_updates(&self) -> Vec<SentUpdate> {
        self.sent.lock().unwrap().clone()
    }

    /// Updates sent after the first `cursor` ones.
    pub fn sent_updates_since(&self, cursor: usize) -> Vec<SentUpdate> {
        let sent = self.sent.lock().unwrap();
        sent.get(cursor..).map(<[SentUpdate]>::to_vec).unwrap_or_default()
    }

    pub fn sent_logs(&self) -> Vec<SentLog> {
        self.logs.lock().unwrap().clone()
    }

    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    pub fn sends_after_disconnect(&self) -> usize {
        self.sends_after_disconnect.load(Ordering::SeqCst)
    }

    pub fn pending_batches(&self) -> usize {
        self.inbox.lock().unwrap().len()
    }

    /// Shared bookkeeping for both send kinds. Returns the send start time.
    async fn begin_send(&self) -> Result<Duration, EnvError> {
        let started = self.start.elapsed();
        if self.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        let flag_down = self
            .witness
            .lock()
            .unwrap()
            .as_ref()
            .map(|shared| !shared.is_connected())
            .unwrap_or(false);
        if flag_down {
            self.sends_after_disconnect.fetch_add(1, Ordering::SeqCst);
        }

        let delay = self.send_delay_us.load(Ordering::Relaxed);
        if delay > 0 {
            tokio::time::sleep(Duration::from_micros(delay)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if !self.connected.load(Ordering::SeqCst) {
            return Err(EnvError::Disconnected);
        }
        if self.fail_sends.load(Ordering::Relaxed) {
            return Err(EnvError::network("simulated send failure"));
        }
        Ok(started)
    }

    fn pop_batch(&self) -> Option<Vec<Op>> {
        let batch = self.inbox.lock().unwrap().pop_front()?;
        if batch.iter().any(|op| matches!(op, Op::Disconnect { .. })) {
            self.connected.store(false, Ordering::SeqCst);
        }
        Some(batch)
    }
}

#[async_trait]
impl Gateway for SimGateway {
    async fn poll(&self, timeout: Duration) -> Result<Vec<Op>, EnvError> {
        if let Some(batch) = self.pop_batch() {
            return Ok(batch);
        }
        if !self.connected.load(Ordering::SeqCst) {
            tokio::time::sleep(timeout).await;
            return Ok(Vec::new());
        }
        // notify_one stores a permit, so a delivery racing this wait is kept
        let _ = tokio::time::timeout(timeout, self.ready.notified()).await;
        Ok(self.pop_batch().unwrap_or_default())
    }

    async fn send_component_update(
        &self,
        entity_id: EntityId,
        update: ComponentUpdate,
    ) -> Result<(), EnvError> {
        let started = self.begin_send().await?;
        self.sent.lock().unwrap().push(SentUpdate {
            entity_id,
            update,
            started,
            finished: self.start.elapsed(),
        });
        Ok(())
    }

    async fn send_log_message(
        &self,
        level: LogLevel,
        logger_name: &str,
        message: &str,
    ) -> Result<(), EnvError> {
        self.begin_send().await?;
        self.logs.lock().unwrap().push(SentLog {
            level,
            logger_name: logger_name.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn worker_id(&self) -> &str {
        &self.worker_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corsair_env::ShipControlsUpdate;

    fn update() -> ComponentUpdate {
        ComponentUpdate::ShipControls(ShipControlsUpdate::default())
    }

    #[tokio::test]
    async fn test_batches_come_out_in_order() {
        let gateway = SimGateway::new("w");
        gateway.deliver(vec![Op::RemoveEntity {
            entity_id: EntityId(1),
        }]);
        gateway.deliver(vec![]);
        gateway.log(LogLevel::Info, "hello");

        let first = gateway.poll(Duration::from_millis(1)).await.unwrap();
        let second = gateway.poll(Duration::from_millis(1)).await.unwrap();
        let third = gateway.poll(Duration::from_millis(1)).await.unwrap();

        assert!(matches!(first[0], Op::RemoveEntity { .. }));
        assert!(matches!(second[0], Op::LogMessage { .. }));
        assert!(third.is_empty());
    }

    #[tokio::test]
    async fn test_poll_wakes_on_delivery() {
        let gateway = Arc::new(SimGateway::new("w"));
        let sender = Arc::clone(&gateway);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            sender.disconnect("bye");
        });

        let start = Instant::now();
        let ops = gateway.poll(Duration::from_secs(10)).await.unwrap();

        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(matches!(ops[0], Op::Disconnect { .. }));
        assert!(!gateway.is_connected());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_unserialized_sends_are_caught() {
        let gateway = Arc::new(SimGateway::new("w"));
        gateway.set_send_delay(Duration::from_millis(5));

        let mut handles = Vec::new();
        for id in 0..4 {
            let gateway = Arc::clone(&gateway);
            handles.push(tokio::spawn(async move {
                gateway.send_component_update(EntityId(id), update()).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(gateway.sent_updates().len(), 4);
        assert!(gateway.overlaps() > 0);
    }

    #[tokio::test]
    async fn test_sends_after_flag_down_are_counted() {
        let gateway = SimGateway::new("w");
        let shared = Arc::new(SharedState::new());
        gateway.watch(Arc::clone(&shared));

        gateway.send_component_update(EntityId(1), update()).await.unwrap();
        shared.mark_disconnected().await;
        // Bypassing SharedState on purpose
        gateway.send_component_update(EntityId(1), update()).await.unwrap();

        assert_eq!(gateway.sends_after_disconnect(), 1);
        assert_eq!(gateway.sent_updates_since(1).len(), 1);
    }

    #[tokio::test]
    async fn test_send_failure_injection() {
        let gateway = SimGateway::new("w");
        gateway.set_fail_sends(true);

        let err = gateway
            .send_log_message(LogLevel::Info, "test", "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, EnvError::NetworkError(_)));
        assert!(gateway.sent_logs().is_empty());
    }
}
