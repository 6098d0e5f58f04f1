use crate::component::{
    degrade, memory_for, per_instance_capacity, ComponentModel, ComponentState, LatencyCurve,
};
use crate::models::{ComponentKind, MessageQueueSpec, SharedConfig};

/// Message queue. FIFO ordering costs roughly 70% of standard throughput;
/// partitions add parallel drain capacity.
pub struct MessageQueueModel {
    shared: SharedConfig,
    spec: MessageQueueSpec,
}

const FIFO_THROUGHPUT_FACTOR: f64 = 0.3;

impl MessageQueueModel {
    pub fn new(shared: SharedConfig, spec: MessageQueueSpec) -> Self {
        Self { shared, spec }
    }
}

impl ComponentModel for MessageQueueModel {
    fn process(&self, load_qps: f64, connections: u32) -> ComponentState {
        let capacity = self.max_capacity_qps();
        let utilization = load_qps / capacity;
        let degradation = degrade(3.0, utilization, 5.0, LatencyCurve::Linear);
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
        let base = per_instance_capacity(&self.shared, ComponentKind::MessageQueue)
            * self.shared.instances as f64;
        let partitioned = base * (self.spec.partitions.max(1) as f64 / 4.0).max(1.0);
        if self.spec.fifo {
            partitioned * FIFO_THROUGHPUT_FACTOR
        } else {
            partitioned
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_queue_has_thirty_pct_of_standard_throughput() {
        let standard = MessageQueueModel::new(SharedConfig::default(), MessageQueueSpec::default());
        let fifo = MessageQueueModel::new(
            SharedConfig::default(),
            MessageQueueSpec {
                fifo: true,
                ..Default::default()
            },
        );
        assert!((fifo.max_capacity_qps() - standard.max_capacity_qps() * 0.3).abs() < 1e-9);
    }

    #[test]
    fn extra_partitions_raise_capacity() {
        let base = MessageQueueModel::new(SharedConfig::default(), MessageQueueSpec::default());
        let wide = MessageQueueModel::new(
            SharedConfig::default(),
            MessageQueueSpec {
                partitions: 8,
                ..Default::default()
            },
        );
        assert!(wide.max_capacity_qps() > base.max_capacity_qps());
    }
}
