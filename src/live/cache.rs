use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

use crate::models::{CacheSpec, EvictionPolicy};

/// One cached key's bookkeeping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
    pub inserted_at: u64,
    pub last_access_at: u64,
    pub access_count: u64,
}

/// Bounded key table with policy-driven eviction, advanced one tick at a
/// time by the live runner.
pub struct CacheSim {
    spec: CacheSpec,
    entries: HashMap<String, CacheEntry>,
    tick: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
    next_key: u64,
    rng: StdRng,
}

impl CacheSim {
    pub fn new(spec: CacheSpec, seed: u64) -> Self {
        Self {
            spec,
            entries: HashMap::new(),
            tick: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
            expirations: 0,
            next_key: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn reconfigure(&mut self, spec: CacheSpec) {
        self.spec = spec;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    pub fn expirations(&self) -> u64 {
        self.expirations
    }

    /// Advances the simulator clock, proactively expiring entries past their
    /// TTL.
    pub fn tick(&mut self) {
        self.tick += 1;
        if self.spec.ttl_secs == 0 {
            return;
        }
        let deadline = self.tick.saturating_sub(self.spec.ttl_secs);
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.inserted_at < deadline)
            .map(|(key, _)| key.clone())
            .collect();
        self.expirations += expired.len() as u64;
        for key in expired {
            self.entries.remove(&key);
        }
    }

    /// Deterministic hit/miss decision for a single traced request: hit while
    /// the observed ratio trails the configured target, miss otherwise. Keeps
    /// the realized ratio tracking the target without randomness.
    pub fn decide(&mut self, target_hit_rate: f64) -> bool {
        let total = self.hits + self.misses;
        let observed = if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        };
        let hit = observed < target_hit_rate;
        if hit {
            self.record_hit();
        } else {
            self.record_miss();
        }
        hit
    }

    /// Looks up a key, inserting (and evicting if needed) on miss.
    pub fn access(&mut self, key: &str) -> bool {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.last_access_at = self.tick;
            entry.access_count += 1;
            self.hits += 1;
            return true;
        }
        self.misses += 1;
        self.insert(key.to_string());
        false
    }

    fn record_hit(&mut self) {
        self.hits += 1;
        // Touch the warmest entry so access counts stay meaningful.
        if let Some(key) = self
            .entries
            .iter()
            .max_by_key(|(_, entry)| entry.inserted_at)
            .map(|(key, _)| key.clone())
        {
            if let Some(entry) = self.entries.get_mut(&key) {
                entry.last_access_at = self.tick;
                entry.access_count += 1;
            }
        }
    }

    fn record_miss(&mut self) {
        self.misses += 1;
        let key = format!("obj-{}", self.next_key);
        self.next_key += 1;
        self.insert(key);
    }

    fn insert(&mut self, key: String) {
        if self.spec.max_entries > 0 && self.entries.len() >= self.spec.max_entries {
            self.evict_one();
        }
        self.entries.insert(
            key,
            CacheEntry {
                inserted_at: self.tick,
                last_access_at: self.tick,
                access_count: 1,
            },
        );
    }

    fn evict_one(&mut self) {
        let candidate = match self.spec.eviction {
            EvictionPolicy::Lru => self
                .entries
                .iter()
                .min_by(|a, b| (a.1.last_access_at, a.0).cmp(&(b.1.last_access_at, b.0)))
                .map(|(key, _)| key.clone()),
            EvictionPolicy::Lfu => self
                .entries
                .iter()
                .min_by(|a, b| (a.1.access_count, a.0).cmp(&(b.1.access_count, b.0)))
                .map(|(key, _)| key.clone()),
            EvictionPolicy::Fifo | EvictionPolicy::Ttl => self
                .entries
                .iter()
                .min_by(|a, b| (a.1.inserted_at, a.0).cmp(&(b.1.inserted_at, b.0)))
                .map(|(key, _)| key.clone()),
            EvictionPolicy::Random => {
                let keys: Vec<&String> = self.entries.keys().collect();
                if keys.is_empty() {
                    None
                } else {
                    let pick = self.rng.gen_range(0..keys.len());
                    Some(keys[pick].clone())
                }
            }
        };
        if let Some(key) = candidate {
            self.entries.remove(&key);
            self.evictions += 1;
        }
    }
}
