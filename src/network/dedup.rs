//! Bounded memory of message UUIDs.
//!
//! Retransmissions carry the same UUID as the original, so a node remembers which UUIDs it
//! has already acted on and skips the side effects the second time around.

use std::collections::{HashSet, VecDeque};
use uuid::Uuid;

/// Remembers the last `capacity` UUIDs inserted. The oldest is forgotten first.
#[derive(Debug, Clone)]
pub struct UuidCache {
    order: VecDeque<Uuid>,
    seen: HashSet<Uuid>,
    capacity: usize,
}

impl UuidCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Records `uuid`. Returns `true` if it was not already remembered.
    pub fn insert(&mut self, uuid: Uuid) -> bool {
        if !self.seen.insert(uuid) {
            return false;
        }
        self.order.push_back(uuid);
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }

    #[cfg(test)]
    fn contains(&self, uuid: &Uuid) -> bool {
        self.seen.contains(uuid)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.order.len()
    }
}
