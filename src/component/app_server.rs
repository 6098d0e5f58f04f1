use crate::component::{
    degrade, memory_for, per_instance_capacity, ComponentModel, ComponentState, LatencyCurve,
};
use crate::models::{AppServerSpec, ComponentKind, SharedConfig};

/// Application server with optional auto-scaling: when enabled, effective
/// capacity is computed from a 70%-utilization replica target, capped at the
/// configured maximum.
pub struct AppServerModel {
    shared: SharedConfig,
    #[allow(dead_code)]
    spec: AppServerSpec,
}

const SCALING_TARGET_UTILIZATION: f64 = 0.7;

impl AppServerModel {
    pub fn new(shared: SharedConfig, spec: AppServerSpec) -> Self {
        Self { shared, spec }
    }

    pub fn replicas_for(&self, load_qps: f64) -> u32 {
        if !self.shared.auto_scaling {
            return self.shared.instances.max(1);
        }
        let per_instance = per_instance_capacity(&self.shared, ComponentKind::AppServer);
        let required = (load_qps / (per_instance * SCALING_TARGET_UTILIZATION)).ceil() as u32;
        required
            .max(self.shared.instances.max(1))
            .min(self.shared.max_replicas.max(1))
    }

    fn capacity_at(&self, load_qps: f64) -> f64 {
        per_instance_capacity(&self.shared, ComponentKind::AppServer)
            * self.replicas_for(load_qps) as f64
    }
}

impl ComponentModel for AppServerModel {
    fn process(&self, load_qps: f64, connections: u32) -> ComponentState {
        let capacity = self.capacity_at(load_qps);
        let utilization = load_qps / capacity;
        let degradation = degrade(20.0, utilization, 5.0, LatencyCurve::Queueing);
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
        let per_instance = per_instance_capacity(&self.shared, ComponentKind::AppServer);
        if self.shared.auto_scaling {
            per_instance * self.shared.max_replicas.max(1) as f64
        } else {
            per_instance * self.shared.instances.max(1) as f64
        }
    }
}
