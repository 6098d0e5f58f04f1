mod app_server;
mod balancer;
mod cache;
mod cdn;
mod client;
mod database;
mod gateway;
mod generic;
mod queue;
mod storage;

use crate::models::{ComponentKind, KindSpec, Node, SharedConfig};

pub use app_server::AppServerModel;
pub use balancer::LoadBalancerModel;
pub use cache::CacheModel;
pub use cdn::CdnModel;
pub use client::ClientModel;
pub use database::{NoSqlDatabaseModel, SqlDatabaseModel};
pub use gateway::ApiGatewayModel;
pub use generic::GenericModel;
pub use queue::MessageQueueModel;
pub use storage::ObjectStoreModel;

/// Performance state of one node under a given offered load. Recomputed every
/// tick; never stored as identity.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ComponentState {
    pub cpu_pct: f64,
    pub memory_pct: f64,
    pub latency_ms: f64,
    pub error_rate: f64,
    pub healthy: bool,
    pub connections: u32,
    pub throughput_qps: f64,
}

/// Behavior strategy for one component kind: offered load in, performance
/// state out.
pub trait ComponentModel: Send {
    fn process(&self, load_qps: f64, connections: u32) -> ComponentState;

    fn max_capacity_qps(&self) -> f64;

    /// Fraction of inbound load absorbed locally. Only cache-like kinds
    /// report one.
    fn hit_rate(&self) -> Option<f64> {
        None
    }
}

pub fn build_model(node: &Node) -> Box<dyn ComponentModel> {
    let shared = node.shared.clone();
    match node.resolved_spec() {
        KindSpec::Client(spec) => Box::new(ClientModel::new(shared, spec)),
        KindSpec::Cdn(spec) => Box::new(CdnModel::new(shared, spec)),
        KindSpec::LoadBalancer(spec) => Box::new(LoadBalancerModel::new(shared, spec)),
        KindSpec::ApiGateway(spec) => Box::new(ApiGatewayModel::new(shared, spec)),
        KindSpec::AppServer(spec) => Box::new(AppServerModel::new(shared, spec)),
        KindSpec::Cache(spec) => Box::new(CacheModel::new(shared, spec)),
        KindSpec::SqlDatabase(spec) => Box::new(SqlDatabaseModel::new(shared, spec)),
        KindSpec::NoSqlDatabase(spec) => Box::new(NoSqlDatabaseModel::new(shared, spec)),
        KindSpec::ObjectStore(spec) => Box::new(ObjectStoreModel::new(shared, spec)),
        KindSpec::MessageQueue(spec) => Box::new(MessageQueueModel::new(shared, spec)),
        KindSpec::Custom(_) => Box::new(GenericModel::new(shared, node.kind)),
    }
}

/// Per-instance capacity default, used when the shared config leaves it at 0.
pub fn default_capacity_per_instance(kind: ComponentKind) -> f64 {
    match kind {
        ComponentKind::Client => 1_000_000.0,
        ComponentKind::Cdn => 50_000.0,
        ComponentKind::LoadBalancer => 20_000.0,
        ComponentKind::ApiGateway => 10_000.0,
        ComponentKind::AppServer => 1_000.0,
        ComponentKind::Cache => 30_000.0,
        ComponentKind::SqlDatabase => 5_000.0,
        ComponentKind::NoSqlDatabase => 10_000.0,
        ComponentKind::ObjectStore => 20_000.0,
        ComponentKind::MessageQueue => 15_000.0,
        ComponentKind::Custom => 5_000.0,
    }
}

pub(crate) fn per_instance_capacity(shared: &SharedConfig, kind: ComponentKind) -> f64 {
    if shared.capacity_per_instance > 0.0 {
        shared.capacity_per_instance
    } else {
        default_capacity_per_instance(kind)
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum LatencyCurve {
    /// Latency grows linearly with utilization.
    Linear,
    /// M/M/1-flavored tail: `base / sqrt(1 - utilization)`, blowing up as
    /// utilization approaches 1 without a discontinuity.
    Queueing,
}

pub(crate) struct Degradation {
    pub cpu_pct: f64,
    pub latency_ms: f64,
    pub error_rate: f64,
    pub healthy: bool,
}

/// Shared degradation shape for every kind: soft curve below capacity, a hard
/// latency multiplier and a non-zero error floor at or above it.
pub(crate) fn degrade(
    base_latency_ms: f64,
    utilization: f64,
    overload_multiplier: f64,
    curve: LatencyCurve,
) -> Degradation {
    let utilization = utilization.max(0.0);
    if utilization >= 1.0 {
        let error_rate = (utilization - 1.0).clamp(0.01, 1.0);
        return Degradation {
            cpu_pct: 100.0,
            latency_ms: base_latency_ms * overload_multiplier,
            error_rate,
            healthy: false,
        };
    }

    let latency_ms = match curve {
        LatencyCurve::Linear => base_latency_ms * (1.0 + utilization),
        LatencyCurve::Queueing => base_latency_ms / (1.0 - utilization).sqrt(),
    };
    Degradation {
        cpu_pct: utilization * 100.0,
        latency_ms,
        error_rate: 0.0,
        healthy: true,
    }
}

pub(crate) fn memory_for(utilization: f64) -> f64 {
    (30.0 + utilization.max(0.0) * 60.0).min(100.0)
}
