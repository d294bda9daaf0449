//! Connection parameters sent to the fabric during the handshake.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Worker type this repo registers as.
pub const SHIP_WORKER_TYPE: &str = "PirateShipMovement";

/// Transport used for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkConnectionType {
    /// Reliable, ordered stream
    Tcp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkParameters {
    pub connection_type: NetworkConnectionType,

    /// Whether the fabric should hand out public addresses
    pub use_external_ip: bool,

    /// Bound on TCP connect + handshake
    pub connect_timeout: Duration,
}

impl Default for NetworkParameters {
    fn default() -> Self {
        Self {
            connection_type: NetworkConnectionType::Tcp,
            use_external_ip: false,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParameters {
    pub worker_type: String,
    pub network: NetworkParameters,
}

impl Default for ConnectionParameters {
    fn default() -> Self {
        Self {
            worker_type: SHIP_WORKER_TYPE.to_string(),
            network: NetworkParameters::default(),
        }
    }
}
