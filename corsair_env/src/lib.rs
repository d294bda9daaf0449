//! Corsair Environment Abstraction Layer
//!
//! This crate holds everything the ship worker needs from the outside world,
//! behind traits, so the worker loops run unchanged against the real fabric
//! (TCP) and against the deterministic harness in `corsair_sim`.
//!
//! - Time and randomness: [`WorkerContext`]
//! - The fabric session: [`Gateway`] (poll ops, send updates, send logs)
//! - The data model: [`EntityId`], [`Op`], the ship components
//!
//! # Example
//!
//! ```ignore
//! use corsair_env::{ConnectionParameters, Gateway, TcpGateway};
//! use std::time::Duration;
//!
//! let params = ConnectionParameters::default();
//! let gateway = TcpGateway::connect("localhost", 7777, "PirateShipMovement_x1Y2", &params).await?;
//! let ops = gateway.poll(Duration::from_millis(100)).await?;
//! ```

mod component;
mod context;
mod error;
mod gateway;
mod op;
mod params;
mod tcp;
mod tokio_impl;
mod types;

pub use component::{
    ComponentData, ComponentKind, ComponentUpdate, Coordinates, Position, PositionUpdate,
    ShipControls, ShipControlsUpdate,
};
pub use context::WorkerContext;
pub use error::EnvError;
pub use gateway::Gateway;
pub use op::Op;
pub use params::{ConnectionParameters, NetworkConnectionType, NetworkParameters, SHIP_WORKER_TYPE};
pub use tcp::{TcpGateway, MAX_OPS_PER_POLL};
pub use tokio_impl::TokioContext;
pub use types::{EntityId, LogLevel};
