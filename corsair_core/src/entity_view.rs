//! Entity View - the worker's read model of the entities it can see.
//!
//! Built purely from the op stream: add/update ops insert or overwrite,
//! remove ops erase. The view has no lock of its own; it lives inside
//! `SharedState`'s view lock and every reader and writer goes through that.

use corsair_env::{ComponentData, ComponentKind, EntityId, Op, Position, ShipControls};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Components known for one entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityRecord {
    components: HashMap<ComponentKind, ComponentData>,
}

impl EntityRecord {
    fn with_components(components: &[ComponentData]) -> Self {
        let mut record = Self::default();
        for data in components {
            record.components.insert(data.kind(), *data);
        }
        record
    }

    pub fn component(&self, kind: ComponentKind) -> Option<&ComponentData> {
        self.components.get(&kind)
    }

    pub fn ship_controls(&self) -> Option<&ShipControls> {
        match self.components.get(&ComponentKind::ShipControls) {
            Some(ComponentData::ShipControls(controls)) => Some(controls),
            _ => None,
        }
    }

    pub fn position(&self) -> Option<&Position> {
        match self.components.get(&ComponentKind::Position) {
            Some(ComponentData::Position(position)) => Some(position),
            _ => None,
        }
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }
}

/// Outcome of applying one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApplyStats {
    /// View ops that changed (or re-confirmed) the view
    pub applied: usize,

    /// View ops referring to entities/components the view does not hold
    pub dropped: usize,
}

impl std::ops::AddAssign for ApplyStats {
    fn add_assign(&mut self, other: Self) {
        self.applied += other.applied;
        self.dropped += other.dropped;
    }
}

/// Mapping from entity id to the components known for it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityView {
    entities: BTreeMap<EntityId, EntityRecord>,
}

impl EntityView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a batch of ops in order.
    ///
    /// `Disconnect` and `LogMessage` are not view ops and are skipped without
    /// being counted. Ops that reference something the view does not hold
    /// are dropped and counted in [`ApplyStats::dropped`].
    pub fn apply(&mut self, ops: &[Op]) -> ApplyStats {
        let mut stats = ApplyStats::default();
        for op in ops.iter().filter(|op| op.is_view_op()) {
            if self.apply_one(op) {
                stats.applied += 1;
            } else {
                stats.dropped += 1;
                debug!(?op, "dropping op the view cannot apply");
            }
        }
        stats
    }

    fn apply_one(&mut self, op: &Op) -> bool {
        match op {
            Op::AddEntity {
                entity_id,
                components,
            } => {
                self.entities
                    .insert(*entity_id, EntityRecord::with_components(components));
                true
            }
            Op::RemoveEntity { entity_id } => self.entities.remove(entity_id).is_some(),
            Op::AddComponent { entity_id, data } => match self.entities.get_mut(entity_id) {
                Some(record) => {
                    record.components.insert(data.kind(), *data);
                    true
                }
                None => false,
            },
            Op::RemoveComponent {
                entity_id,
                component,
            } => self
                .entities
                .get_mut(entity_id)
                .and_then(|record| record.components.remove(component))
                .is_some(),
            Op::ComponentUpdate { entity_id, update } => self
                .entities
                .get_mut(entity_id)
                .and_then(|record| record.components.get_mut(&update.kind()))
                .map(|data| update.merge_into(data))
                .unwrap_or(false),
            Op::Disconnect { .. } | Op::LogMessage { .. } => false,
        }
    }

    /// Current entity ids, in ascending order.
    pub fn snapshot(&self) -> BTreeSet<EntityId> {
        self.entities.keys().copied().collect()
    }

    pub fn get(&self, entity_id: EntityId) -> Option<&EntityRecord> {
        self.entities.get(&entity_id)
    }

    pub fn contains(&self, entity_id: EntityId) -> bool {
        self.entities.contains_key(&entity_id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
