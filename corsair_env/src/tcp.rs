//! Production gateway: newline-delimited JSON frames over TCP.
//!
//! ```text
//! worker -> fabric   {"type":"handshake", ...}
//! fabric -> worker   {"type":"accepted"} | {"type":"rejected","reason":...}
//! fabric -> worker   {"op":"add_entity", ...}         (one op per line)
//! worker -> fabric   {"type":"component_update", ...} (one frame per line)
//! ```

use crate::component::ComponentUpdate;
use crate::error::EnvError;
use crate::gateway::Gateway;
use crate::op::Op;
use crate::params::{ConnectionParameters, NetworkConnectionType};
use crate::types::{EntityId, LogLevel};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Upper bound on ops returned by a single poll.
pub const MAX_OPS_PER_POLL: usize = 512;

/// Frames written by the worker.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame<'a> {
    Handshake {
        worker_type: &'a str,
        worker_id: &'a str,
        connection_type: NetworkConnectionType,
        use_external_ip: bool,
    },
    ComponentUpdate {
        entity_id: EntityId,
        update: ComponentUpdate,
    },
    LogMessage {
        level: LogLevel,
        logger_name: &'a str,
        message: &'a str,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum HandshakeReply {
    Accepted,
    Rejected { reason: String },
}

/// Read half plus the bytes of the line being assembled.
///
/// `read_until` appends into `line` as bytes arrive, so a read cancelled by
/// a poll timeout leaves the partial frame here for the next poll to finish.
/// Lines stay raw bytes until decoded; a line that is not UTF-8 is just
/// another undecodable frame.
struct OpReader {
    reader: BufReader<OwnedReadHalf>,
    line: Vec<u8>,
}

impl OpReader {
    /// Reads one complete line. `Ok(None)` on EOF.
    async fn next_line(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        let n = self.reader.read_until(b'\n', &mut self.line).await?;
        if n == 0 && self.line.is_empty() {
            return Ok(None);
        }
        Ok(Some(std::mem::take(&mut self.line)))
    }
}

/// Session with the fabric over a single TCP stream.
pub struct TcpGateway {
    worker_id: String,
    reader: Mutex<OpReader>,
    writer: Mutex<OwnedWriteHalf>,
    connected: AtomicBool,
    undecodable: AtomicU64,
}

impl TcpGateway {
    /// Connects to the receptionist at `host:port` and performs the handshake.
    ///
    /// Connect and handshake together are bounded by
    /// `params.network.connect_timeout`.
    pub async fn connect(
        host: &str,
        port: u16,
        worker_id: &str,
        params: &ConnectionParameters,
    ) -> Result<Self, EnvError> {
        let limit = params.network.connect_timeout;
        tokio::time::timeout(limit, Self::establish(host, port, worker_id, params))
            .await
            .map_err(|_| EnvError::Timeout(limit.as_millis() as u64))?
    }

    async fn establish(
        host: &str,
        port: u16,
        worker_id: &str,
        params: &ConnectionParameters,
    ) -> Result<Self, EnvError> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| EnvError::connection(format!("{}:{}: {}", host, port, e)))?;
        stream
            .set_nodelay(true)
            .map_err(|e| EnvError::connection(e.to_string()))?;

        let (read_half, mut write_half) = stream.into_split();

        let handshake = ClientFrame::Handshake {
            worker_type: &params.worker_type,
            worker_id,
            connection_type: params.network.connection_type,
            use_external_ip: params.network.use_external_ip,
        };
        write_frame(&mut write_half, &handshake).await?;

        let mut reader = OpReader {
            reader: BufReader::new(read_half),
            line: Vec::new(),
        };
        let reply = reader
            .next_line()
            .await
            .map_err(|e| EnvError::network(e.to_string()))?
            .ok_or_else(|| EnvError::Handshake("connection closed during handshake".to_string()))?;

        match serde_json::from_slice::<HandshakeReply>(&reply)? {
            HandshakeReply::Accepted => {
                info!(worker_id, host, port, "handshake accepted");
            }
            HandshakeReply::Rejected { reason } => return Err(EnvError::Handshake(reason)),
        }

        Ok(Self {
            worker_id: worker_id.to_string(),
            reader: Mutex::new(reader),
            writer: Mutex::new(write_half),
            connected: AtomicBool::new(true),
            undecodable: AtomicU64::new(0),
        })
    }

    /// Number of inbound lines dropped because they did not decode as an op.
    pub fn undecodable_frames(&self) -> u64 {
        self.undecodable.load(Ordering::Relaxed)
    }

    async fn send_frame(&self, frame: &ClientFrame<'_>) -> Result<(), EnvError> {
        if !self.is_connected() {
            return Err(EnvError::Disconnected);
        }
        let mut writer = self.writer.lock().await;
        write_frame(&mut writer, frame).await
    }

    fn closed(&self, reason: String) -> Op {
        self.connected.store(false, Ordering::Release);
        Op::Disconnect { reason }
    }
}

async fn write_frame(writer: &mut OwnedWriteHalf, frame: &ClientFrame<'_>) -> Result<(), EnvError> {
    let mut bytes = serde_json::to_vec(frame)?;
    bytes.push(b'\n');
    writer
        .write_all(&bytes)
        .await
        .map_err(|e| EnvError::network(e.to_string()))
}

#[async_trait]
impl Gateway for TcpGateway {
    async fn poll(&self, timeout: Duration) -> Result<Vec<Op>, EnvError> {
        if !self.is_connected() {
            return Ok(Vec::new());
        }

        let mut reader = self.reader.lock().await;
        let mut ops = Vec::new();
        let mut wait = timeout;

        while ops.len() < MAX_OPS_PER_POLL {
            let line = match tokio::time::timeout(wait, reader.next_line()).await {
                Err(_) => break,
                Ok(Ok(Some(line))) => line,
                Ok(Ok(None)) => {
                    ops.push(self.closed("connection closed by fabric".to_string()));
                    break;
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "read failed, closing session");
                    ops.push(self.closed(e.to_string()));
                    break;
                }
            };

            // Only the first line is waited for; the rest of the batch is
            // whatever is already buffered.
            wait = Duration::ZERO;

            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice::<Op>(&line) {
                Ok(op) => ops.push(op),
                Err(e) => {
                    self.undecodable.fetch_add(1, Ordering::Relaxed);
                    debug!(error = %e, "dropping undecodable frame");
                }
            }
        }

        Ok(ops)
    }

    async fn send_component_update(
        &self,
        entity_id: EntityId,
        update: ComponentUpdate,
    ) -> Result<(), EnvError> {
        self.send_frame(&ClientFrame::ComponentUpdate { entity_id, update })
            .await
    }

    async fn send_log_message(
        &self,
        level: LogLevel,
        logger_name: &str,
        message: &str,
    ) -> Result<(), EnvError> {
        self.send_frame(&ClientFrame::LogMessage {
            level,
            logger_name,
            message,
        })
        .await
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn worker_id(&self) -> &str {
        &self.worker_id
    }
}
