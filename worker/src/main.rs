//! Pirate-ship movement worker
//!
//! Connects to the fabric, announces itself, then runs the poll and
//! steering loops until the fabric disconnects it.
//!
//! Exit status: 0 after a clean disconnect, 1 on usage error, connection
//! failure or a fatal log from the fabric.

mod launch;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use corsair_core::{Worker, WorkerError};
use corsair_env::{TcpGateway, TokioContext, WorkerContext};
use launch::{Args, LaunchError, USAGE};
use std::sync::Arc;
use tracing::{error, info};

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            eprintln!("{}", e.kind());
            println!("{}", USAGE);
            std::process::exit(1);
        }
    };
    init_tracing(args.verbose);

    let context = TokioContext::shared();
    let target = match args.target(|| context.random_alphanumeric(4)) {
        Ok(target) => target,
        Err(LaunchError::Usage) => {
            println!("{}", USAGE);
            std::process::exit(1);
        }
    };
    info!(worker_id = %target.worker_id, host = %target.hostname, port = target.port, "Worker started");

    let gateway = TcpGateway::connect(
        &target.hostname,
        target.port,
        &target.worker_id,
        &args.connection_parameters(),
    )
    .await
    .with_context(|| format!("connecting to receptionist {}:{}", target.hostname, target.port))?;

    let worker = Worker::new(context, Arc::new(gateway), args.worker_config());
    worker.announce().await.context("announcing worker")?;

    match worker.run().await {
        Ok(report) => {
            info!(report = %serde_json::to_string(&report)?, "disconnected, shutting down");
            Ok(())
        }
        Err(WorkerError::RemoteFatal(message)) => {
            error!(%message, "fatal log from fabric, terminating");
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}
