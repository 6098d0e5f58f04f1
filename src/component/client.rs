use crate::component::{
    degrade, memory_for, per_instance_capacity, ComponentModel, ComponentState, LatencyCurve,
};
use crate::models::{ClientSpec, ComponentKind, SharedConfig};

/// Traffic source. Clients emit load rather than serve it, so the model is
/// nearly free: tiny latency, effectively uncapped capacity.
pub struct ClientModel {
    shared: SharedConfig,
    spec: ClientSpec,
}

impl ClientModel {
    pub fn new(shared: SharedConfig, spec: ClientSpec) -> Self {
        Self { shared, spec }
    }

    pub fn requests_per_sec(&self) -> f64 {
        self.spec.requests_per_sec
    }
}

impl ComponentModel for ClientModel {
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
        per_instance_capacity(&self.shared, ComponentKind::Client) * self.shared.instances as f64
    }
}
