//! Events ("ops") delivered by the fabric.

use crate::component::{ComponentData, ComponentKind, ComponentUpdate};
use crate::types::{EntityId, LogLevel};
use serde::{Deserialize, Serialize};

/// One event from the fabric, in delivery order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    /// Entity entered the worker's view with its initial components.
    AddEntity {
        entity_id: EntityId,
        #[serde(default)]
        components: Vec<ComponentData>,
    },

    /// Entity left the view (deleted or out of interest).
    RemoveEntity { entity_id: EntityId },

    AddComponent {
        entity_id: EntityId,
        data: ComponentData,
    },

    RemoveComponent {
        entity_id: EntityId,
        component: ComponentKind,
    },

    ComponentUpdate {
        entity_id: EntityId,
        update: ComponentUpdate,
    },

    /// The session ended; no more ops will follow.
    Disconnect { reason: String },

    LogMessage { level: LogLevel, message: String },
}

impl Op {
    /// True for ops that change the entity view.
    pub fn is_view_op(&self) -> bool {
        !matches!(self, Op::Disconnect { .. } | Op::LogMessage { .. })
    }

    /// Entity this op refers to, if any.
    pub fn entity_id(&self) -> Option<EntityId> {
        match self {
            Op::AddEntity { entity_id, .. }
            | Op::RemoveEntity { entity_id }
            | Op::AddComponent { entity_id, .. }
            | Op::RemoveComponent { entity_id, .. }
            | Op::ComponentUpdate { entity_id, .. } => Some(*entity_id),
            Op::Disconnect { .. } | Op::LogMessage { .. } => None,
        }
    }
}
