use crate::component::{
    memory_for, per_instance_capacity, ComponentModel, ComponentState, LatencyCurve,
};
use crate::models::{ComponentKind, ObjectStoreSpec, SharedConfig};

/// Object store. Overflow is throttled gracefully: the store sheds half of
/// the overflow fraction instead of failing 1:1, and latency grows modestly.
pub struct ObjectStoreModel {
    shared: SharedConfig,
    #[allow(dead_code)]
    spec: ObjectStoreSpec,
}

impl ObjectStoreModel {
    pub fn new(shared: SharedConfig, spec: ObjectStoreSpec) -> Self {
        Self { shared, spec }
    }
}

impl ComponentModel for ObjectStoreModel {
    fn process(&self, load_qps: f64, connections: u32) -> ComponentState {
        let capacity = self.max_capacity_qps();
        let utilization = (load_qps / capacity).max(0.0);
        let base_latency_ms = 50.0;

        if utilization >= 1.0 {
            let overflow = utilization - 1.0;
            return ComponentState {
                cpu_pct: 100.0,
                memory_pct: memory_for(utilization),
                latency_ms: base_latency_ms * 4.0,
                error_rate: (overflow * 0.5).clamp(0.01, 1.0),
                healthy: false,
                connections,
                throughput_qps: capacity,
            };
        }

        let degradation =
            crate::component::degrade(base_latency_ms, utilization, 4.0, LatencyCurve::Linear);
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
        per_instance_capacity(&self.shared, ComponentKind::ObjectStore)
            * self.shared.instances as f64
    }
}
