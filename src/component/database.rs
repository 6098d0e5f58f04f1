use crate::component::{
    degrade, memory_for, per_instance_capacity, ComponentModel, ComponentState, LatencyCurve,
};
use crate::models::{
    ComponentKind, ConsistencyLevel, NoSqlDatabaseSpec, SharedConfig, SqlDatabaseSpec, SqlEngine,
};

/// Relational database. Connection pooling raises the safe concurrent
/// connection ceiling; crossing it degrades latency and sheds a fraction of
/// requests before the capacity-overload path kicks in.
pub struct SqlDatabaseModel {
    shared: SharedConfig,
    spec: SqlDatabaseSpec,
}

const POOLED_CONNECTIONS_PER_INSTANCE: u32 = 500;
const UNPOOLED_CONNECTIONS_PER_INSTANCE: u32 = 100;

impl SqlDatabaseModel {
    pub fn new(shared: SharedConfig, spec: SqlDatabaseSpec) -> Self {
        Self { shared, spec }
    }

    pub fn connection_ceiling(&self) -> u32 {
        let per_instance = if self.spec.connection_pooling {
            POOLED_CONNECTIONS_PER_INSTANCE
        } else {
            UNPOOLED_CONNECTIONS_PER_INSTANCE
        };
        per_instance * self.shared.instances.max(1)
    }

    fn engine_multiplier(&self) -> f64 {
        match self.spec.engine {
            SqlEngine::Postgres => 1.0,
            SqlEngine::Mysql => 1.0,
            SqlEngine::Sqlite => 0.4,
        }
    }
}

impl ComponentModel for SqlDatabaseModel {
    fn process(&self, load_qps: f64, connections: u32) -> ComponentState {
        let capacity = self.max_capacity_qps();
        let utilization = load_qps / capacity;
        let degradation = degrade(10.0, utilization, 10.0, LatencyCurve::Queueing);

        let ceiling = self.connection_ceiling();
        let (latency_ms, error_rate) = if connections > ceiling {
            let excess = (connections - ceiling) as f64 / ceiling as f64;
            (
                degradation.latency_ms * 1.5,
                degradation.error_rate.max((excess * 0.1).min(1.0)),
            )
        } else {
            (degradation.latency_ms, degradation.error_rate)
        };

        ComponentState {
            cpu_pct: degradation.cpu_pct,
            memory_pct: memory_for(utilization),
            latency_ms,
            error_rate,
            healthy: degradation.healthy,
            connections,
            throughput_qps: load_qps.min(capacity),
        }
    }

    fn max_capacity_qps(&self) -> f64 {
        per_instance_capacity(&self.shared, ComponentKind::SqlDatabase)
            * self.shared.instances as f64
            * self.engine_multiplier()
    }
}

/// NoSQL database. Strong consistency doubles read latency; capacity scales
/// with the replication factor.
pub struct NoSqlDatabaseModel {
    shared: SharedConfig,
    spec: NoSqlDatabaseSpec,
}

impl NoSqlDatabaseModel {
    pub fn new(shared: SharedConfig, spec: NoSqlDatabaseSpec) -> Self {
        Self { shared, spec }
    }

    fn consistency_latency_multiplier(&self) -> f64 {
        match self.spec.consistency {
            ConsistencyLevel::Eventual => 1.0,
            ConsistencyLevel::Strong => 2.0,
        }
    }
}

impl ComponentModel for NoSqlDatabaseModel {
    fn process(&self, load_qps: f64, connections: u32) -> ComponentState {
        let capacity = self.max_capacity_qps();
        let utilization = load_qps / capacity;
        let degradation = degrade(5.0, utilization, 8.0, LatencyCurve::Queueing);
        ComponentState {
            cpu_pct: degradation.cpu_pct,
            memory_pct: memory_for(utilization),
            latency_ms: degradation.latency_ms * self.consistency_latency_multiplier(),
            error_rate: degradation.error_rate,
            healthy: degradation.healthy,
            connections,
            throughput_qps: load_qps.min(capacity),
        }
    }

    fn max_capacity_qps(&self) -> f64 {
        per_instance_capacity(&self.shared, ComponentKind::NoSqlDatabase)
            * self.shared.instances as f64
            * self.shared.replication_factor.max(1) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pooling_raises_the_connection_ceiling() {
        let pooled = SqlDatabaseModel::new(SharedConfig::default(), SqlDatabaseSpec::default());
        let unpooled = SqlDatabaseModel::new(
            SharedConfig::default(),
            SqlDatabaseSpec {
                connection_pooling: false,
                ..Default::default()
            },
        );
        assert!(pooled.connection_ceiling() > unpooled.connection_ceiling());
    }

    #[test]
    fn exceeding_connection_ceiling_degrades_latency() {
        let model = SqlDatabaseModel::new(
            SharedConfig::default(),
            SqlDatabaseSpec {
                connection_pooling: false,
                ..Default::default()
            },
        );
        let within = model.process(1000.0, 50);
        let beyond = model.process(1000.0, 300);
        assert!(beyond.latency_ms > within.latency_ms);
        assert!(beyond.error_rate > 0.0);
    }

    #[test]
    fn strong_consistency_doubles_read_latency() {
        let eventual = NoSqlDatabaseModel::new(SharedConfig::default(), NoSqlDatabaseSpec::default());
        let strong = NoSqlDatabaseModel::new(
            SharedConfig::default(),
            NoSqlDatabaseSpec {
                consistency: ConsistencyLevel::Strong,
            },
        );
        let load = 1000.0;
        let eventual_state = eventual.process(load, 0);
        let strong_state = strong.process(load, 0);
        assert!((strong_state.latency_ms - eventual_state.latency_ms * 2.0).abs() < 1e-9);
    }

    #[test]
    fn replication_factor_scales_nosql_capacity() {
        let shared = SharedConfig {
            replication_factor: 3,
            ..Default::default()
        };
        let replicated = NoSqlDatabaseModel::new(shared, NoSqlDatabaseSpec::default());
        let single = NoSqlDatabaseModel::new(SharedConfig::default(), NoSqlDatabaseSpec::default());
        assert_eq!(
            replicated.max_capacity_qps(),
            single.max_capacity_qps() * 3.0
        );
    }
}
