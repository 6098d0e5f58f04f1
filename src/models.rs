use serde::{Deserialize, Serialize};

/// A full graph snapshot as supplied by the caller: the nodes, the directed
/// connections between them, and optional scenario overrides.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GraphSpec {
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
    #[serde(default)]
    pub duration_secs: Option<u64>,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Node {
    pub id: String,
    pub kind: ComponentKind,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub shared: SharedConfig,
    #[serde(default)]
    pub spec: Option<KindSpec>,
}

impl Node {
    /// Display label: the configured name, falling back to the id.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    /// Kind-specific configuration, defaulted when absent and ignored when
    /// the stored variant does not match the node's kind.
    pub fn resolved_spec(&self) -> KindSpec {
        match &self.spec {
            Some(spec) if spec.kind() == self.kind => spec.clone(),
            _ => KindSpec::defaults_for(self.kind),
        }
    }
}

/// Canvas placement. Carried through for the caller's benefit; the simulation
/// never reads it.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentKind {
    Client,
    Cdn,
    LoadBalancer,
    ApiGateway,
    AppServer,
    Cache,
    SqlDatabase,
    NoSqlDatabase,
    ObjectStore,
    MessageQueue,
    #[serde(other)]
    Custom,
}

impl ComponentKind {
    /// Leaf kinds absorb requests instead of forwarding them.
    pub fn is_leaf(self) -> bool {
        matches!(
            self,
            ComponentKind::SqlDatabase
                | ComponentKind::NoSqlDatabase
                | ComponentKind::ObjectStore
                | ComponentKind::MessageQueue
        )
    }

    /// Priority used when ordering a node's successors: storage tiers are
    /// considered before generic fan-out targets.
    pub fn flow_priority(self) -> u8 {
        match self {
            ComponentKind::Cache => 0,
            ComponentKind::SqlDatabase | ComponentKind::NoSqlDatabase => 1,
            ComponentKind::ObjectStore | ComponentKind::MessageQueue => 2,
            _ => 3,
        }
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ComponentKind::Client => "client",
            ComponentKind::Cdn => "cdn",
            ComponentKind::LoadBalancer => "load-balancer",
            ComponentKind::ApiGateway => "api-gateway",
            ComponentKind::AppServer => "app-server",
            ComponentKind::Cache => "cache",
            ComponentKind::SqlDatabase => "sql-database",
            ComponentKind::NoSqlDatabase => "no-sql-database",
            ComponentKind::ObjectStore => "object-store",
            ComponentKind::MessageQueue => "message-queue",
            ComponentKind::Custom => "custom",
        };
        f.write_str(label)
    }
}

/// Configuration shared by every kind.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SharedConfig {
    pub region: String,
    pub instances: u32,
    /// Per-instance capacity in requests/sec; 0 means "use the kind default".
    pub capacity_per_instance: f64,
    pub replication_factor: u32,
    pub circuit_breaker: bool,
    pub retries: bool,
    pub rate_limit_rps: Option<f64>,
    pub auto_scaling: bool,
    pub max_replicas: u32,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            instances: 1,
            capacity_per_instance: 0.0,
            replication_factor: 1,
            circuit_breaker: false,
            retries: false,
            rate_limit_rps: None,
            auto_scaling: false,
            max_replicas: 10,
        }
    }
}

/// Kind-specific configuration, one strongly-typed variant per kind.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum KindSpec {
    Client(ClientSpec),
    Cdn(CdnSpec),
    LoadBalancer(LoadBalancerSpec),
    ApiGateway(ApiGatewaySpec),
    AppServer(AppServerSpec),
    Cache(CacheSpec),
    SqlDatabase(SqlDatabaseSpec),
    NoSqlDatabase(NoSqlDatabaseSpec),
    ObjectStore(ObjectStoreSpec),
    MessageQueue(MessageQueueSpec),
    Custom(CustomSpec),
}

impl KindSpec {
    pub fn kind(&self) -> ComponentKind {
        match self {
            KindSpec::Client(_) => ComponentKind::Client,
            KindSpec::Cdn(_) => ComponentKind::Cdn,
            KindSpec::LoadBalancer(_) => ComponentKind::LoadBalancer,
            KindSpec::ApiGateway(_) => ComponentKind::ApiGateway,
            KindSpec::AppServer(_) => ComponentKind::AppServer,
            KindSpec::Cache(_) => ComponentKind::Cache,
            KindSpec::SqlDatabase(_) => ComponentKind::SqlDatabase,
            KindSpec::NoSqlDatabase(_) => ComponentKind::NoSqlDatabase,
            KindSpec::ObjectStore(_) => ComponentKind::ObjectStore,
            KindSpec::MessageQueue(_) => ComponentKind::MessageQueue,
            KindSpec::Custom(_) => ComponentKind::Custom,
        }
    }

    pub fn defaults_for(kind: ComponentKind) -> Self {
        match kind {
            ComponentKind::Client => KindSpec::Client(ClientSpec::default()),
            ComponentKind::Cdn => KindSpec::Cdn(CdnSpec::default()),
            ComponentKind::LoadBalancer => KindSpec::LoadBalancer(LoadBalancerSpec::default()),
            ComponentKind::ApiGateway => KindSpec::ApiGateway(ApiGatewaySpec::default()),
            ComponentKind::AppServer => KindSpec::AppServer(AppServerSpec::default()),
            ComponentKind::Cache => KindSpec::Cache(CacheSpec::default()),
            ComponentKind::SqlDatabase => KindSpec::SqlDatabase(SqlDatabaseSpec::default()),
            ComponentKind::NoSqlDatabase => KindSpec::NoSqlDatabase(NoSqlDatabaseSpec::default()),
            ComponentKind::ObjectStore => KindSpec::ObjectStore(ObjectStoreSpec::default()),
            ComponentKind::MessageQueue => KindSpec::MessageQueue(MessageQueueSpec::default()),
            ComponentKind::Custom => KindSpec::Custom(CustomSpec::default()),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ClientSpec {
    pub requests_per_sec: f64,
}

impl Default for ClientSpec {
    fn default() -> Self {
        Self {
            requests_per_sec: 1000.0,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CdnSpec {
    pub edge_ttl_secs: u64,
}

impl Default for CdnSpec {
    fn default() -> Self {
        Self {
            edge_ttl_secs: 3600,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoadBalancerSpec {
    pub algorithm: LbAlgorithm,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LbAlgorithm {
    #[default]
    RoundRobin,
    LeastConnections,
    Random,
    Weighted,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ApiGatewaySpec {
    pub rate_limit_rps: f64,
}

impl Default for ApiGatewaySpec {
    fn default() -> Self {
        Self {
            rate_limit_rps: 10_000.0,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AppServerSpec {
    pub threads_per_instance: u32,
}

impl Default for AppServerSpec {
    fn default() -> Self {
        Self {
            threads_per_instance: 8,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CacheSpec {
    pub eviction: EvictionPolicy,
    pub ttl_secs: u64,
    pub max_entries: usize,
    pub write_through: bool,
}

impl Default for CacheSpec {
    fn default() -> Self {
        Self {
            eviction: EvictionPolicy::Lru,
            ttl_secs: 300,
            max_entries: 10_000,
            write_through: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EvictionPolicy {
    #[default]
    Lru,
    Lfu,
    Fifo,
    Random,
    Ttl,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SqlDatabaseSpec {
    pub engine: SqlEngine,
    pub connection_pooling: bool,
}

impl Default for SqlDatabaseSpec {
    fn default() -> Self {
        Self {
            engine: SqlEngine::Postgres,
            connection_pooling: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SqlEngine {
    #[default]
    Postgres,
    Mysql,
    Sqlite,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct NoSqlDatabaseSpec {
    pub consistency: ConsistencyLevel,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ConsistencyLevel {
    #[default]
    Eventual,
    Strong,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObjectStoreSpec {
    pub versioning: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MessageQueueSpec {
    pub partitions: u32,
    pub fifo: bool,
}

impl Default for MessageQueueSpec {
    fn default() -> Self {
        Self {
            partitions: 4,
            fifo: false,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CustomSpec {
    pub note: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Connection {
    #[serde(default)]
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub bidirectional: bool,
}

/// A named load multiplier applied during one static evaluation run.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Scenario {
    pub name: String,
    pub load_multiplier: f64,
}

impl Scenario {
    pub fn defaults() -> Vec<Scenario> {
        vec![
            Scenario {
                name: "Normal Load".to_string(),
                load_multiplier: 1.0,
            },
            Scenario {
                name: "Peak Load".to_string(),
                load_multiplier: 2.0,
            },
        ]
    }
}
