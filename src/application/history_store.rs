// History store - Bounded per-entity rolling sample log
use crate::domain::entity::EntityId;
use crate::domain::telemetry::Sample;
use std::collections::{HashMap, VecDeque};

pub const DEFAULT_CAPACITY: usize = 50;

#[derive(Debug)]
pub struct HistoryStore {
    capacity: usize,
    entries: HashMap<EntityId, VecDeque<Sample>>,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl HistoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
        }
    }

    /// Appends in arrival order, evicting the oldest sample past capacity.
    pub fn append(&mut self, entity_id: EntityId, sample: Sample) {
        let capacity = self.capacity;
        let ring = self
            .entries
            .entry(entity_id)
            .or_insert_with(|| VecDeque::with_capacity(capacity));
        while ring.len() >= capacity {
            ring.pop_front();
        }
        ring.push_back(sample);
    }

    /// Replaces the retained samples, keeping the newest `capacity` of them.
    pub fn replace(&mut self, entity_id: EntityId, samples: Vec<Sample>) {
        let skip = samples.len().saturating_sub(self.capacity);
        let ring: VecDeque<Sample> = samples.into_iter().skip(skip).collect();
        self.entries.insert(entity_id, ring);
    }

    pub fn snapshot(&self, entity_id: &EntityId) -> Vec<Sample> {
        self.entries
            .get(entity_id)
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, entity_id: &EntityId) -> usize {
        self.entries.get(entity_id).map_or(0, VecDeque::len)
    }

    pub fn clear(&mut self, entity_id: &EntityId) {
        self.entries.remove(entity_id);
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
    }
}
