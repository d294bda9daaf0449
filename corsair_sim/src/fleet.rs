//! Ground truth for the simulated sea.
//!
//! The fleet owns every ship the harness has spawned, turns spawns and
//! sinkings into ops for the worker, and moves ships according to the
//! `ShipControls` the worker sends back.

use corsair_env::{
    ComponentData, ComponentUpdate, Coordinates, EntityId, Op, Position, PositionUpdate,
    ShipControls,
};
use nalgebra::Vector3;
use rand::seq::IteratorRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal, Uniform};
use serde::Serialize;
use std::collections::BTreeMap;

/// Top speed in m/s at `target_speed == 1.0`.
pub const MAX_SHIP_SPEED: f64 = 8.0;

/// One ship as the harness sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ship {
    pub id: EntityId,

    /// Position in meters; z stays at sea level
    pub position: Vector3<f64>,

    /// Heading in degrees, normalized to [0, 360)
    pub heading: f64,

    pub controls: ShipControls,

    /// Steering updates received for this ship
    pub orders: u64,
}

impl Ship {
    /// Velocity implied by heading and throttle.
    pub fn velocity(&self) -> Vector3<f64> {
        let speed = f64::from(self.controls.target_speed).clamp(0.0, 1.0) * MAX_SHIP_SPEED;
        let heading = self.heading.to_radians();
        Vector3::new(heading.cos() * speed, heading.sin() * speed, 0.0)
    }

    fn position_component(&self) -> Position {
        Position {
            coords: to_coords(&self.position),
        }
    }
}

fn to_coords(v: &Vector3<f64>) -> Coordinates {
    Coordinates {
        x: v.x,
        y: v.y,
        z: v.z,
    }
}

/// Wraps into [0, 360). `rem_euclid` rounds tiny negatives up to 360.
fn normalize_heading(degrees: f64) -> f64 {
    let heading = degrees.rem_euclid(360.0);
    if heading >= 360.0 {
        0.0
    } else {
        heading
    }
}

/// All ships afloat, keyed by id.
pub struct Fleet {
    rng: ChaCha8Rng,
    ships: BTreeMap<EntityId, Ship>,
    next_id: i64,

    /// Spawn scatter around the harbor, in meters
    spawn_spread: Normal<f64>,
    headings: Uniform<f64>,

    /// Updates addressed to ships no longer afloat
    stray_orders: u64,
}

impl Fleet {
    /// Creates an empty fleet. Spawns are reproducible for a given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            ships: BTreeMap::new(),
            next_id: 1,
            spawn_spread: Normal::new(0.0, 250.0).expect("constant std dev is finite"),
            headings: Uniform::new(0.0, 360.0),
            stray_orders: 0,
        }
    }

    /// Spawns one ship and returns the `AddEntity` op announcing it.
    pub fn spawn_ship(&mut self) -> Op {
        let id = EntityId(self.next_id);
        self.next_id += 1;

        let ship = Ship {
            id,
            position: Vector3::new(
                self.spawn_spread.sample(&mut self.rng),
                self.spawn_spread.sample(&mut self.rng),
                0.0,
            ),
            heading: self.headings.sample(&mut self.rng),
            controls: ShipControls::default(),
            orders: 0,
        };
        let op = Op::AddEntity {
            entity_id: id,
            components: vec![
                ComponentData::ShipControls(ship.controls),
                ComponentData::Position(ship.position_component()),
            ],
        };
        self.ships.insert(id, ship);
        op
    }

    /// Spawns `count` ships as a single batch.
    pub fn spawn_ships(&mut self, count: usize) -> Vec<Op> {
        (0..count).map(|_| self.spawn_ship()).collect()
    }

    /// Sinks a ship. Returns `None` if it is not afloat.
    pub fn sink_ship(&mut self, id: EntityId) -> Option<Op> {
        self.ships.remove(&id)?;
        Some(Op::RemoveEntity { entity_id: id })
    }

    /// Sinks a randomly chosen ship, if any are afloat.
    pub fn sink_random(&mut self) -> Option<Op> {
        let id = *self.ships.keys().choose(&mut self.rng)?;
        self.sink_ship(id)
    }

    /// Integrates a steering update from the worker.
    ///
    /// Returns `false` for ships that are not afloat or non-control updates.
    pub fn apply_controls(&mut self, id: EntityId, update: &ComponentUpdate) -> bool {
        let (Some(ship), ComponentUpdate::ShipControls(update)) = (self.ships.get_mut(&id), update)
        else {
            self.stray_orders += 1;
            return false;
        };
        update.apply_to(&mut ship.controls);
        ship.heading = normalize_heading(ship.heading + f64::from(ship.controls.target_steering));
        ship.orders += 1;
        true
    }

    /// Moves every ship forward by `dt_secs` and reports new positions.
    pub fn step(&mut self, dt_secs: f64) -> Vec<Op> {
        self.ships
            .values_mut()
            .map(|ship| {
                let velocity = ship.velocity();
                ship.position += velocity * dt_secs;
                Op::ComponentUpdate {
                    entity_id: ship.id,
                    update: ComponentUpdate::Position(PositionUpdate {
                        coords: Some(to_coords(&ship.position)),
                    }),
                }
            })
            .collect()
    }

    pub fn ship(&self, id: EntityId) -> Option<&Ship> {
        self.ships.get(&id)
    }

    pub fn ships(&self) -> impl Iterator<Item = &Ship> {
        self.ships.values()
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.ships.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.ships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ships.is_empty()
    }

    pub fn stray_orders(&self) -> u64 {
        self.stray_orders
    }
}
