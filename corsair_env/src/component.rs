//! Component schema shared with the fabric.
//!
//! A ship entity carries `ShipControls` (what the worker writes) and
//! `Position` (what the physics side writes back).

use serde::{Deserialize, Serialize};

/// Movement controls of a ship.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ShipControls {
    /// Throttle in [0.0, 1.0]
    pub target_speed: f32,

    /// Steering change in degrees
    pub target_steering: f32,
}

/// World coordinates in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub coords: Coordinates,
}

/// Component type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    ShipControls,
    Position,
}

/// A full component value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "component", rename_all = "snake_case")]
pub enum ComponentData {
    ShipControls(ShipControls),
    Position(Position),
}

impl ComponentData {
    pub fn kind(&self) -> ComponentKind {
        match self {
            ComponentData::ShipControls(_) => ComponentKind::ShipControls,
            ComponentData::Position(_) => ComponentKind::Position,
        }
    }
}

/// Partial update of `ShipControls`; only `Some` fields are written.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ShipControlsUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_speed: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_steering: Option<f32>,
}

impl ShipControlsUpdate {
    pub fn set_target_speed(&mut self, speed: f32) -> &mut Self {
        self.target_speed = Some(speed);
        self
    }

    pub fn set_target_steering(&mut self, steering: f32) -> &mut Self {
        self.target_steering = Some(steering);
        self
    }

    /// Writes the set fields into `controls`.
    pub fn apply_to(&self, controls: &mut ShipControls) {
        if let Some(speed) = self.target_speed {
            controls.target_speed = speed;
        }
        if let Some(steering) = self.target_steering {
            controls.target_steering = steering;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PositionUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coords: Option<Coordinates>,
}

impl PositionUpdate {
    pub fn apply_to(&self, position: &mut Position) {
        if let Some(coords) = self.coords {
            position.coords = coords;
        }
    }
}

/// A partial update addressed to one component of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "component", rename_all = "snake_case")]
pub enum ComponentUpdate {
    ShipControls(ShipControlsUpdate),
    Position(PositionUpdate),
}

impl ComponentUpdate {
    pub fn kind(&self) -> ComponentKind {
        match self {
            ComponentUpdate::ShipControls(_) => ComponentKind::ShipControls,
            ComponentUpdate::Position(_) => ComponentKind::Position,
        }
    }

    /// Merges this update into a stored component of the same kind.
    ///
    /// Returns `false` (and leaves `data` untouched) on a kind mismatch.
    pub fn merge_into(&self, data: &mut ComponentData) -> bool {
        match (self, data) {
            (ComponentUpdate::ShipControls(update), ComponentData::ShipControls(controls)) => {
                update.apply_to(controls);
                true
            }
            (ComponentUpdate::Position(update), ComponentData::Position(position)) => {
                update.apply_to(position);
                true
            }
            _ => false,
        }
    }
}
