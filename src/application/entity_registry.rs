// Entity registry - Current summary state per (device, circuit)
use crate::domain::entity::{DeviceId, EntityId, EntitySummary, SummaryPatch};
use std::collections::BTreeMap;

/// Summaries keyed by entity, iterated in (device, circuit) order.
/// Updates are last-write-wins per field in arrival order.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entries: BTreeMap<EntityId, EntitySummary>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, entity_id: EntityId, patch: SummaryPatch) -> &EntitySummary {
        let summary = self
            .entries
            .entry(entity_id)
            .or_insert_with(|| EntitySummary::new(entity_id));
        summary.merge(patch);
        summary
    }

    pub fn get(&self, entity_id: &EntityId) -> Option<&EntitySummary> {
        self.entries.get(entity_id)
    }

    pub fn remove(&mut self, entity_id: &EntityId) -> Option<EntitySummary> {
        self.entries.remove(entity_id)
    }

    pub fn contains(&self, entity_id: &EntityId) -> bool {
        self.entries.contains_key(entity_id)
    }

    pub fn for_device(&self, device_id: DeviceId) -> impl Iterator<Item = &EntitySummary> {
        self.entries
            .range(EntityId::new(device_id, 0)..=EntityId::new(device_id, u32::MAX))
            .map(|(_, summary)| summary)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntitySummary> {
        self.entries.values()
    }
}
