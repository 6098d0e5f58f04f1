use crate::component::{
    degrade, memory_for, per_instance_capacity, ComponentModel, ComponentState, LatencyCurve,
};
use crate::models::{CacheSpec, ComponentKind, EvictionPolicy, SharedConfig};

pub struct CacheModel {
    shared: SharedConfig,
    spec: CacheSpec,
}

impl CacheModel {
    pub fn new(shared: SharedConfig, spec: CacheSpec) -> Self {
        Self { shared, spec }
    }
}

/// Hit rate derived from the cache configuration. The result is always
/// clamped to [0.10, 0.99]: a cache never absorbs everything and never
/// absorbs nothing.
pub fn cache_hit_rate(spec: &CacheSpec) -> f64 {
    let mut rate = 0.80;
    rate += match spec.eviction {
        EvictionPolicy::Lfu => 0.07,
        EvictionPolicy::Lru => 0.05,
        EvictionPolicy::Ttl => 0.02,
        EvictionPolicy::Fifo => 0.0,
        EvictionPolicy::Random => -0.05,
    };
    // Longer TTLs keep entries warm; an hour buys the full bonus.
    rate += (spec.ttl_secs as f64 / 3600.0).min(1.0) * 0.10;
    if !spec.write_through {
        rate -= 0.05;
    }
    rate.clamp(0.10, 0.99)
}

impl ComponentModel for CacheModel {
    fn process(&self, load_qps: f64, connections: u32) -> ComponentState {
        let capacity = self.max_capacity_qps();
        let utilization = load_qps / capacity;
        let degradation = degrade(1.0, utilization, 3.0, LatencyCurve::Linear);
        ComponentState {
            cpu_pct: degradation.cpu_pct,
            memory_pct: memory_for(utilization),
            latency_ms: degradation.latency_ms,
            error_rate: degradation.error_rate,
            healthy: degradation.healthy,
            connections,
            throughput_qps: load_qps.min(capacity),
        }
    }

    fn max_capacity_qps(&self) -> f64 {
        per_instance_capacity(&self.shared, ComponentKind::Cache) * self.shared.instances as f64
    }

    fn hit_rate(&self) -> Option<f64> {
        Some(cache_hit_rate(&self.spec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_stays_clamped_across_configurations() {
        let policies = [
            EvictionPolicy::Lru,
            EvictionPolicy::Lfu,
            EvictionPolicy::Fifo,
            EvictionPolicy::Random,
            EvictionPolicy::Ttl,
        ];
        for eviction in policies {
            for ttl_secs in [0, 1, 60, 300, 3600, 86_400] {
                for write_through in [true, false] {
                    let spec = CacheSpec {
                        eviction,
                        ttl_secs,
                        max_entries: 100,
                        write_through,
                    };
                    let rate = cache_hit_rate(&spec);
                    assert!(
                        (0.10..=0.99).contains(&rate),
                        "{:?}/{}/{} -> {}",
                        eviction,
                        ttl_secs,
                        write_through,
                        rate
                    );
                }
            }
        }
    }

    #[test]
    fn lfu_beats_random_for_equal_ttl() {
        let lfu = CacheSpec {
            eviction: EvictionPolicy::Lfu,
            ..Default::default()
        };
        let random = CacheSpec {
            eviction: EvictionPolicy::Random,
            ..Default::default()
        };
        assert!(cache_hit_rate(&lfu) > cache_hit_rate(&random));
    }
}
