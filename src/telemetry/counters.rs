use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

struct CounterSlot {
    /// Spelling of the first key recorded.
    key: String,
    /// Insertion order, used to break ties when ranking.
    sequence: u64,
    count: AtomicU64,
}

/// Case-insensitive map of monotonically increasing counters.
///
/// Incrementing an existing key only takes the read lock; the write lock is
/// held just long enough to insert a new slot.
#[derive(Default)]
pub struct KeyedCounters {
    slots: RwLock<HashMap<String, CounterSlot>>,
    next_sequence: AtomicU64,
}

impl KeyedCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, key: &str) {
        let normalized = key.to_lowercase();
        {
            let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
            if let Some(slot) = slots.get(&normalized) {
                slot.count.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }

        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        let slot = slots.entry(normalized).or_insert_with(|| CounterSlot {
            key: key.to_string(),
            sequence: self.next_sequence.fetch_add(1, Ordering::Relaxed),
            count: AtomicU64::new(0),
        });
        slot.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, key: &str) -> u64 {
        let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
        slots
            .get(&key.to_lowercase())
            .map(|slot| slot.count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.slots.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counts sorted descending, ties in first-insertion order.
    pub fn ranked(&self, limit: Option<usize>) -> Vec<(String, u64)> {
        let mut entries: Vec<(u64, String, u64)> = {
            let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
            slots
                .values()
                .map(|slot| {
                    (
                        slot.sequence,
                        slot.key.clone(),
                        slot.count.load(Ordering::Relaxed),
                    )
                })
                .collect()
        };
        entries.sort_by(|a, b| b.2.cmp(&a.2).then(a.0.cmp(&b.0)));
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        entries
            .into_iter()
            .map(|(_, key, count)| (key, count))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn keys_are_case_insensitive_and_keep_first_spelling() {
        let counters = KeyedCounters::new();
        counters.increment("Rock");
        counters.increment("ROCK");
        counters.increment("rock");

        assert_eq!(counters.len(), 1);
        assert_eq!(counters.get("rOcK"), 3);
        assert_eq!(counters.ranked(None), vec![("Rock".to_string(), 3)]);
    }

    #[test]
    fn ranking_breaks_ties_by_insertion() {
        let counters = KeyedCounters::new();
        for key in ["b", "a", "c", "a", "c"] {
            counters.increment(key);
        }

        assert_eq!(
            counters.ranked(None),
            vec![
                ("a".to_string(), 2),
                ("c".to_string(), 2),
                ("b".to_string(), 1)
            ]
        );
        assert_eq!(counters.ranked(Some(1)).len(), 1);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let counters = Arc::new(KeyedCounters::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let counters = counters.clone();
                std::thread::spawn(move || {
                    for i in 0..1000 {
                        counters.increment(if i % 2 == 0 { "shared" } else { "SHARED" });
                        counters.increment(&format!("own-{}", t));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counters.get("shared"), 8000);
        assert_eq!(counters.get("own-3"), 1000);
        assert_eq!(counters.len(), 9);
    }
}
