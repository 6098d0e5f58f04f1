use serde::Serialize;

pub type TraceId = u64;

/// One unit of in-flight simulated traffic traveling along a connection. A
/// particle usually stands in for many logical requests so the active set
/// stays bounded; traced debug particles carry exactly one.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Particle {
    pub id: u64,
    pub source: String,
    pub target: String,
    /// 0 at the source, 1 at the target.
    pub progress: f64,
    pub request_count: f64,
    pub severity: ParticleSeverity,
    pub trace_id: Option<TraceId>,
}

/// Color tag for the rendering surface.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ParticleSeverity {
    Normal,
    Degraded,
    Error,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct TraceEvent {
    pub node_id: String,
    pub action: TraceAction,
    pub tick: u64,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TraceAction {
    Emitted,
    Forwarded,
    Routed { backend: String },
    CacheHit,
    CacheMiss,
    RateLimited,
    Enqueued,
    Absorbed,
    DeadEnd,
}

/// Ordered per-node actions recorded for one user-injected debug request.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct RequestTrace {
    pub id: TraceId,
    pub events: Vec<TraceEvent>,
    pub completed: bool,
}

impl RequestTrace {
    pub fn new(id: TraceId) -> Self {
        Self {
            id,
            events: Vec::new(),
            completed: false,
        }
    }

    pub fn push(&mut self, node_id: &str, action: TraceAction, tick: u64) {
        self.events.push(TraceEvent {
            node_id: node_id.to_string(),
            action,
            tick,
        });
    }
}
