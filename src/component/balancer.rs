use crate::component::{
    degrade, memory_for, per_instance_capacity, ComponentModel, ComponentState, LatencyCurve,
};
use crate::models::{ComponentKind, LbAlgorithm, LoadBalancerSpec, SharedConfig};

pub struct LoadBalancerModel {
    shared: SharedConfig,
    spec: LoadBalancerSpec,
}

impl LoadBalancerModel {
    pub fn new(shared: SharedConfig, spec: LoadBalancerSpec) -> Self {
        Self { shared, spec }
    }

    pub fn algorithm(&self) -> LbAlgorithm {
        self.spec.algorithm
    }
}

impl ComponentModel for LoadBalancerModel {
    fn process(&self, load_qps: f64, connections: u32) -> ComponentState {
        let capacity = self.max_capacity_qps();
        let utilization = load_qps / capacity;
        let degradation = degrade(2.0, utilization, 3.0, LatencyCurve::Linear);
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
        per_instance_capacity(&self.shared, ComponentKind::LoadBalancer)
            * self.shared.instances as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_scales_with_instances() {
        let single = LoadBalancerModel::new(SharedConfig::default(), LoadBalancerSpec::default());
        let shared = SharedConfig {
            instances: 3,
            ..Default::default()
        };
        let triple = LoadBalancerModel::new(shared, LoadBalancerSpec::default());
        assert_eq!(triple.max_capacity_qps(), single.max_capacity_qps() * 3.0);
    }
}
