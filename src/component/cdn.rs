use crate::component::{
    degrade, memory_for, per_instance_capacity, ComponentModel, ComponentState, LatencyCurve,
};
use crate::models::{CdnSpec, ComponentKind, SharedConfig};

pub struct CdnModel {
    shared: SharedConfig,
    spec: CdnSpec,
}

impl CdnModel {
    pub fn new(shared: SharedConfig, spec: CdnSpec) -> Self {
        Self { shared, spec }
    }
}

impl ComponentModel for CdnModel {
    fn process(&self, load_qps: f64, connections: u32) -> ComponentState {
        let capacity = self.max_capacity_qps();
        let utilization = load_qps / capacity;
        let degradation = degrade(15.0, utilization, 3.0, LatencyCurve::Linear);
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
        per_instance_capacity(&self.shared, ComponentKind::Cdn) * self.shared.instances as f64
    }

    fn hit_rate(&self) -> Option<f64> {
        // Edge caches run hot; a two-hour TTL buys the full bonus.
        let rate = 0.85 + (self.spec.edge_ttl_secs as f64 / 7200.0).min(1.0) * 0.10;
        Some(rate.clamp(0.10, 0.99))
    }
}
