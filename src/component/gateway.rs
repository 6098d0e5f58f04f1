use crate::component::{
    degrade, memory_for, per_instance_capacity, ComponentModel, ComponentState, LatencyCurve,
};
use crate::models::{ApiGatewaySpec, ComponentKind, SharedConfig};

/// API gateway: linear latency, plus an explicit rate-limit rejection path
/// that produces partial rejects below hard overload.
pub struct ApiGatewayModel {
    shared: SharedConfig,
    spec: ApiGatewaySpec,
}

impl ApiGatewayModel {
    pub fn new(shared: SharedConfig, spec: ApiGatewaySpec) -> Self {
        Self { shared, spec }
    }

    pub fn rate_limit_rps(&self) -> f64 {
        self.shared.rate_limit_rps.unwrap_or(self.spec.rate_limit_rps)
    }
}

impl ComponentModel for ApiGatewayModel {
    fn process(&self, load_qps: f64, connections: u32) -> ComponentState {
        let capacity = self.max_capacity_qps();
        let utilization = load_qps / capacity;
        let degradation = degrade(5.0, utilization, 3.0, LatencyCurve::Linear);

        // Rate limiting rejects the excess fraction even while the gateway
        // itself is healthy.
        let limit = self.rate_limit_rps();
        let rejected = if load_qps > limit && load_qps > 0.0 {
            1.0 - limit / load_qps
        } else {
            0.0
        };
        let error_rate = degradation.error_rate.max(rejected).min(1.0);

        ComponentState {
            cpu_pct: degradation.cpu_pct,
            memory_pct: memory_for(utilization),
            latency_ms: degradation.latency_ms,
            error_rate,
            healthy: degradation.healthy,
            connections,
            throughput_qps: load_qps.min(limit).min(capacity),
        }
    }

    fn max_capacity_qps(&self) -> f64 {
        per_instance_capacity(&self.shared, ComponentKind::ApiGateway)
            * self.shared.instances as f64
    }
}
