//! Adaptive-replacement cache core.
//!
//! Implements the ARC algorithm (Megiddo & Modha, FAST '03): two resident
//! lists split recency (T1) from frequency (T2), two ghost lists (B1, B2)
//! remember recently evicted keys, and the target size `p` of T1 adapts on
//! ghost hits. Compared with plain LRU this resists one-off scans: a burst
//! of single-use keys cannot flush the frequently reused ones.
//!
//! All state sits behind one mutex, so concurrent lookups and stores need
//! no external locking. Values are [`Bytes`]: a stored entry is served
//! byte-identical until evicted, never mutated in place.

use std::collections::{HashMap, VecDeque};

use bytes::Bytes;
use parking_lot::Mutex;

pub struct AdaptiveCache {
    state: Mutex<State>,
}

struct State {
    capacity: usize,
    /// Adaptive target size for T1.
    p: usize,
    t1: VecDeque<String>,
    t2: VecDeque<String>,
    b1: VecDeque<String>,
    b2: VecDeque<String>,
    values: HashMap<String, Bytes>,
}

fn remove(list: &mut VecDeque<String>, key: &str) -> bool {
    if let Some(idx) = list.iter().position(|k| k == key) {
        list.remove(idx);
        true
    } else {
        false
    }
}

impl AdaptiveCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State {
                capacity: capacity.max(1),
                p: 0,
                t1: VecDeque::new(),
                t2: VecDeque::new(),
                b1: VecDeque::new(),
                b2: VecDeque::new(),
                values: HashMap::new(),
            }),
        }
    }

    /// Resident hit promotes the key to the frequency list.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        let mut state = self.state.lock();
        if remove(&mut state.t1, key) || remove(&mut state.t2, key) {
            state.t2.push_back(key.to_string());
            return state.values.get(key).cloned();
        }
        None
    }

    pub fn put(&self, key: &str, value: Bytes) {
        self.state.lock().put(key, value);
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        let state = self.state.lock();
        state.t1.len() + state.t2.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().values.contains_key(key)
    }
}

impl State {
    fn put(&mut self, key: &str, value: Bytes) {
        // resident: refresh the value, treat as a frequency hit
        if remove(&mut self.t1, key) || remove(&mut self.t2, key) {
            self.t2.push_back(key.to_string());
            self.values.insert(key.to_string(), value);
            return;
        }

        // recency ghost hit: grow the recency target
        if self.b1.iter().any(|k| k == key) {
            let delta = if self.b1.len() >= self.b2.len() {
                1
            } else {
                self.b2.len() / self.b1.len()
            };
            self.p = (self.p + delta).min(self.capacity);
            remove(&mut self.b1, key);
            self.replace(false);
            self.t2.push_back(key.to_string());
            self.values.insert(key.to_string(), value);
            return;
        }

        // frequency ghost hit: shrink the recency target
        if self.b2.iter().any(|k| k == key) {
            let delta = if self.b2.len() >= self.b1.len() {
                1
            } else {
                self.b1.len() / self.b2.len()
            };
            self.p = self.p.saturating_sub(delta);
            remove(&mut self.b2, key);
            self.replace(true);
            self.t2.push_back(key.to_string());
            self.values.insert(key.to_string(), value);
            return;
        }

        // miss everywhere
        let l1 = self.t1.len() + self.b1.len();
        if l1 == self.capacity {
            if self.t1.len() < self.capacity {
                self.b1.pop_front();
                self.replace(false);
            } else if let Some(victim) = self.t1.pop_front() {
                // L1 is all resident; evict without leaving a ghost
                self.values.remove(&victim);
            }
        } else {
            let total = self.t1.len() + self.t2.len() + self.b1.len() + self.b2.len();
            if total >= self.capacity {
                if total == 2 * self.capacity {
                    self.b2.pop_front();
                }
                self.replace(false);
            }
        }
        self.t1.push_back(key.to_string());
        self.values.insert(key.to_string(), value);
    }

    /// Demote one resident entry to the ghost list indicated by `p`.
    fn replace(&mut self, b2_hit: bool) {
        let t1_len = self.t1.len();
        if t1_len >= 1 && (t1_len > self.p || (b2_hit && t1_len == self.p)) {
            if let Some(victim) = self.t1.pop_front() {
                self.values.remove(&victim);
                self.b1.push_back(victim);
            }
        } else if let Some(victim) = self.t2.pop_front() {
            self.values.remove(&victim);
            self.b2.push_back(victim);
        }
    }
}
