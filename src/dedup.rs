//! Bounded dedup set for relay suppression.
//!
//! The reference implementation keeps an unbounded Python `set()` of
//! packet IDs, a memory leak over any long-running deployment. This
//! gateway instead bounds it to a fixed capacity and evicts in FIFO
//! order: the dedup window only needs to cover the time a packet could
//! plausibly still be in flight across the mesh, not the full history of
//! the process.
use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

pub struct DedupSet<T> {
    capacity: usize,
    order: VecDeque<T>,
    seen: HashSet<T>,
}

impl<T: Eq + Hash + Clone> DedupSet<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "dedup set capacity must be positive");
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
        }
    }

    pub fn contains(&self, id: &T) -> bool {
        self.seen.contains(id)
    }

    /// Records `id` as seen. A duplicate insert is a no-op rather than
    /// refreshing recency — once seen, a packet ID stays due for
    /// eviction on its original schedule.
    pub fn insert(&mut self, id: T) {
        if self.seen.contains(&id) {
            return;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.order.push_back(id.clone());
        self.seen.insert(id);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seen_id_is_not_relayed_again() {
        let mut set = DedupSet::new(8);
        set.insert(42u32);
        assert!(set.contains(&42));
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let mut set = DedupSet::new(2);
        set.insert(1u32);
        set.insert(2u32);
        set.insert(3u32);
        assert!(!set.contains(&1));
        assert!(set.contains(&2));
        assert!(set.contains(&3));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn duplicate_insert_is_idempotent() {
        let mut set = DedupSet::new(2);
        set.insert(1u32);
        set.insert(1u32);
        assert_eq!(set.len(), 1);
    }
}
