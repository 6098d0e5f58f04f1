use crate::component::{
    degrade, memory_for, per_instance_capacity, ComponentModel, ComponentState, LatencyCurve,
};
use crate::models::{ComponentKind, SharedConfig};

/// Fallback linear model for kinds without a dedicated formula, so the engine
/// never fails on an unrecognized palette entry.
pub struct GenericModel {
    shared: SharedConfig,
    kind: ComponentKind,
}

impl GenericModel {
    pub fn new(shared: SharedConfig, kind: ComponentKind) -> Self {
        Self { shared, kind }
    }
}

impl ComponentModel for GenericModel {
    fn process(&self, load_qps: f64, connections: u32) -> ComponentState {
        let capacity = self.max_capacity_qps();
        let utilization = load_qps / capacity;
        let degradation = degrade(10.0, utilization, 3.0, LatencyCurve::Linear);
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
        per_instance_capacity(&self.shared, self.kind) * self.shared.instances.max(1) as f64
    }
}
