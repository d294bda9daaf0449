//! Command line of the worker binary.

use clap::{Parser, ValueEnum};
use corsair_core::WorkerConfig;
use corsair_env::{ConnectionParameters, SHIP_WORKER_TYPE};
use std::time::Duration;

pub const USAGE: &str = "\
Usage: pirate-ship-movement receptionist <hostname> <port> <worker_id>
Connects to the fabric and steers every pirate ship it can see.
    <hostname>      - hostname of the receptionist to connect to
    <port>          - port of the receptionist
    <worker_id>     - (optional) name of the worker assigned by the fabric
With no arguments, connects to receptionist localhost 7777.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    Receptionist,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LaunchError {
    #[error("expected 0, 3 or 4 positional arguments")]
    Usage,
}

/// Pirate-ship movement worker
#[derive(Parser, Debug)]
#[command(name = "pirate-ship-movement", override_usage = "pirate-ship-movement [receptionist <hostname> <port> [<worker_id>]]")]
pub struct Args {
    /// Connection mode
    #[arg(value_enum)]
    pub mode: Option<Mode>,

    /// Receptionist hostname
    pub hostname: Option<String>,

    /// Receptionist port
    pub port: Option<u16>,

    /// Worker id (synthesized when omitted)
    pub worker_id: Option<String>,

    /// Positionals past the worker id; any makes the command line invalid
    #[arg(hide = true)]
    pub extra: Vec<String>,

    /// Delay between steering passes
    #[arg(long, env = "CORSAIR_STEERING_PERIOD_MS", default_value = "5000")]
    pub steering_period_ms: u64,

    /// Upper bound on one poll of the fabric
    #[arg(long, env = "CORSAIR_POLL_TIMEOUT_MS", default_value = "100")]
    pub poll_timeout_ms: u64,

    /// Bound on connect plus handshake
    #[arg(long, env = "CORSAIR_CONNECT_TIMEOUT_MS", default_value = "10000")]
    pub connect_timeout_ms: u64,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Where and as whom to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchTarget {
    pub hostname: String,
    pub port: u16,
    pub worker_id: String,
}

impl Args {
    /// Resolves the positional arguments.
    ///
    /// `suffix` is only called when the worker id has to be synthesized.
    pub fn target(&self, suffix: impl FnOnce() -> String) -> Result<LaunchTarget, LaunchError> {
        if !self.extra.is_empty() {
            return Err(LaunchError::Usage);
        }
        match (&self.mode, &self.hostname, self.port, &self.worker_id) {
            (None, None, None, None) => Ok(LaunchTarget {
                hostname: "localhost".to_string(),
                port: 7777,
                worker_id: format!("{}_{}", SHIP_WORKER_TYPE, suffix()),
            }),
            (Some(Mode::Receptionist), Some(hostname), Some(port), worker_id) => Ok(LaunchTarget {
                hostname: hostname.clone(),
                port,
                worker_id: match worker_id {
                    Some(id) => id.clone(),
                    None => format!("{}_{}", SHIP_WORKER_TYPE, suffix()),
                },
            }),
            _ => Err(LaunchError::Usage),
        }
    }

    pub fn connection_parameters(&self) -> ConnectionParameters {
        let mut params = ConnectionParameters::default();
        params.network.connect_timeout = Duration::from_millis(self.connect_timeout_ms);
        params
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            poll_timeout: Duration::from_millis(self.poll_timeout_ms),
            steering_period: Duration::from_millis(self.steering_period_ms),
            ..WorkerConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("pirate-ship-movement").chain(argv.iter().copied()))
    }

    #[test]
    fn test_no_arguments_means_local_receptionist() {
        let target = parse(&[]).unwrap().target(|| "a1B2".to_string()).unwrap();
        assert_eq!(
            target,
            LaunchTarget {
                hostname: "localhost".to_string(),
                port: 7777,
                worker_id: "PirateShipMovement_a1B2".to_string(),
            }
        );
    }

    #[test]
    fn test_three_arguments_synthesize_worker_id() {
        let target = parse(&["receptionist", "fabric.local", "22000"])
            .unwrap()
            .target(|| "Zz09".to_string())
            .unwrap();
        assert_eq!(target.hostname, "fabric.local");
        assert_eq!(target.port, 22000);
        assert_eq!(target.worker_id, "PirateShipMovement_Zz09");
    }

    #[test]
    fn test_four_arguments_keep_given_worker_id() {
        let target = parse(&["receptionist", "h", "1", "ship_worker_3"])
            .unwrap()
            .target(|| unreachable!("suffix must not be drawn"))
            .unwrap();
        assert_eq!(target.worker_id, "ship_worker_3");
    }

    #[test]
    fn test_partial_arguments_are_a_usage_error() {
        for argv in [&["receptionist"][..], &["receptionist", "h"][..]] {
            let args = parse(argv).unwrap();
            assert_eq!(args.target(String::new), Err(LaunchError::Usage));
        }
    }

    #[test]
    fn test_bad_mode_or_port_rejected_by_parser() {
        assert!(parse(&["locator", "h", "1"]).is_err());
        assert!(parse(&["receptionist", "h", "port"]).is_err());
    }

    #[test]
    fn test_too_many_arguments_are_a_usage_error() {
        for argv in [
            &["receptionist", "h", "1", "id", "extra"][..],
            &["receptionist", "h", "1", "id", "a", "b"][..],
        ] {
            let args = parse(argv).unwrap();
            assert_eq!(args.target(String::new), Err(LaunchError::Usage));
        }
    }

    #[test]
    fn test_flags_flow_into_config() {
        let args = parse(&["--steering-period-ms", "250", "--connect-timeout-ms", "50"]).unwrap();
        assert_eq!(args.worker_config().steering_period, Duration::from_millis(250));
        assert_eq!(args.worker_config().poll_timeout, Duration::from_millis(100));
        assert_eq!(
            args.connection_parameters().network.connect_timeout,
            Duration::from_millis(50)
        );
    }
}
