//! Bounded in-memory cache of generation outcomes.
//!
//! Keyed by the request fingerprint. Oldest entries are evicted first.
//! A capacity of zero disables the cache entirely.

use std::collections::{HashMap, VecDeque};

use tokio::sync::RwLock;

#[derive(Debug)]
struct Entries<V> {
    values: HashMap<String, V>,
    order: VecDeque<String>,
}

/// FIFO cache shared between requests.
#[derive(Debug)]
pub struct ResultCache<V> {
    capacity: usize,
    entries: RwLock<Entries<V>>,
}

impl<V: Clone> ResultCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: RwLock::new(Entries {
                values: HashMap::with_capacity(capacity),
                order: VecDeque::with_capacity(capacity),
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        if !self.is_enabled() {
            return None;
        }
        self.entries.read().await.values.get(key).cloned()
    }

    /// Insert or replace. Replacing does not refresh the entry's position.
    pub async fn insert(&self, key: String, value: V) {
        if !self.is_enabled() {
            return;
        }
        let mut entries = self.entries.write().await;
        if entries.values.insert(key.clone(), value).is_some() {
            return;
        }
        entries.order.push_back(key);
        while entries.order.len() > self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                entries.values.remove(&oldest);
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.values.len()
    }
}
