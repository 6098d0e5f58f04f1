use std::collections::{HashMap, VecDeque};

use crate::component::{build_model, ComponentModel};
use crate::live::cache::CacheSim;
use crate::models::{ComponentKind, KindSpec, Node};

/// Rolling-RPS sampling window and EMA smoothing constants.
pub const RPS_WINDOW_MS: f64 = 500.0;
pub const RPS_EMA_ALPHA: f64 = 0.6;

/// Kind-specific internal state a node carries between live steps.
pub enum KindState {
    Cache(CacheSim),
    LoadBalancer(LbState),
    Queue(QueueState),
    Gateway(GatewayState),
    Stateless,
}

#[derive(Clone, Debug, Default)]
pub struct LbState {
    pub cursor: usize,
    pub sent: HashMap<String, u64>,
}

#[derive(Clone, Debug, Default)]
pub struct QueueState {
    pub backlog: f64,
    pub enqueued: f64,
    pub processed: f64,
    pub dead_lettered: f64,
}

#[derive(Clone, Debug, Default)]
pub struct GatewayState {
    /// Requests admissible in the current step; recomputed each step from the
    /// configured limit and the step's fraction of a second.
    pub allowance: f64,
    pub dropped: f64,
}

/// Everything the live runner tracks for one node.
pub struct NodeRuntime {
    pub node: Node,
    pub model: Box<dyn ComponentModel>,
    pub kind_state: KindState,
    pub active_connections: u32,
    pub ema_rps: f64,
    pub last_throughput: f64,
    pub processed: f64,
    pub errors: f64,
    pub latency_sum_ms: f64,
    arrivals: VecDeque<(f64, f64)>,
}

impl NodeRuntime {
    pub fn new(node: Node, seed: u64) -> Self {
        let model = build_model(&node);
        let kind_state = kind_state_for(&node, seed);
        Self {
            node,
            model,
            kind_state,
            active_connections: 0,
            ema_rps: 0.0,
            last_throughput: 0.0,
            processed: 0.0,
            errors: 0.0,
            latency_sum_ms: 0.0,
            arrivals: VecDeque::new(),
        }
    }

    /// Hot-reconfigure from an updated node without resetting counters.
    pub fn reconfigure(&mut self, node: Node) {
        self.model = build_model(&node);
        if let (KindState::Cache(sim), KindSpec::Cache(spec)) =
            (&mut self.kind_state, node.resolved_spec())
        {
            sim.reconfigure(spec);
        }
        self.node = node;
    }

    pub fn record_arrival(&mut self, now_ms: f64, count: f64) {
        self.arrivals.push_back((now_ms, count));
    }

    /// Smoothed requests/sec over the sampling window. Snaps to zero when the
    /// window is empty so idle nodes do not keep a decaying tail forever.
    pub fn smoothed_rps(&mut self, now_ms: f64) -> f64 {
        while let Some((at, _)) = self.arrivals.front() {
            if now_ms - at > RPS_WINDOW_MS {
                self.arrivals.pop_front();
            } else {
                break;
            }
        }
        if self.arrivals.is_empty() {
            self.ema_rps = 0.0;
            return 0.0;
        }
        let window_count: f64 = self.arrivals.iter().map(|(_, count)| count).sum();
        let instant = window_count / (RPS_WINDOW_MS / 1000.0);
        self.ema_rps = RPS_EMA_ALPHA * instant + (1.0 - RPS_EMA_ALPHA) * self.ema_rps;
        self.ema_rps
    }

    pub fn avg_latency_ms(&self) -> f64 {
        if self.processed > 0.0 {
            self.latency_sum_ms / self.processed
        } else {
            0.0
        }
    }

    pub fn error_rate(&self) -> f64 {
        if self.processed > 0.0 {
            (self.errors / self.processed).min(1.0)
        } else {
            0.0
        }
    }

    pub fn reset_counters(&mut self, seed: u64) {
        self.kind_state = kind_state_for(&self.node, seed);
        self.active_connections = 0;
        self.ema_rps = 0.0;
        self.last_throughput = 0.0;
        self.processed = 0.0;
        self.errors = 0.0;
        self.latency_sum_ms = 0.0;
        self.arrivals.clear();
    }
}

fn kind_state_for(node: &Node, seed: u64) -> KindState {
    match node.resolved_spec() {
        KindSpec::Cache(spec) => KindState::Cache(CacheSim::new(spec, seed)),
        KindSpec::LoadBalancer(_) => KindState::LoadBalancer(LbState::default()),
        KindSpec::MessageQueue(_) => KindState::Queue(QueueState::default()),
        KindSpec::ApiGateway(_) => KindState::Gateway(GatewayState::default()),
        _ => {
            if node.kind == ComponentKind::Cdn {
                KindState::Cache(CacheSim::new(Default::default(), seed))
            } else {
                KindState::Stateless
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SharedConfig;

    fn runtime(kind: ComponentKind) -> NodeRuntime {
        NodeRuntime::new(
            Node {
                id: "n".to_string(),
                kind,
                name: String::new(),
                position: Default::default(),
                shared: SharedConfig::default(),
                spec: None,
            },
            0,
        )
    }

    #[test]
    fn smoothed_rps_snaps_to_zero_on_empty_window() {
        let mut runtime = runtime(ComponentKind::AppServer);
        runtime.record_arrival(0.0, 100.0);
        assert!(runtime.smoothed_rps(100.0) > 0.0);
        // Past the window: no tail decay, straight to zero.
        assert_eq!(runtime.smoothed_rps(1000.0), 0.0);
    }

    #[test]
    fn smoothed_rps_converges_toward_steady_rate() {
        let mut runtime = runtime(ComponentKind::AppServer);
        // 100 requests every 100 ms is 1000 rps.
        let mut now = 0.0;
        let mut smoothed = 0.0;
        for _ in 0..50 {
            runtime.record_arrival(now, 100.0);
            smoothed = runtime.smoothed_rps(now);
            now += 100.0;
        }
        assert!((smoothed - 1000.0).abs() < 150.0, "smoothed={}", smoothed);
    }

    #[test]
    fn kind_state_matches_kind() {
        assert!(matches!(
            runtime(ComponentKind::Cache).kind_state,
            KindState::Cache(_)
        ));
        assert!(matches!(
            runtime(ComponentKind::LoadBalancer).kind_state,
            KindState::LoadBalancer(_)
        ));
        assert!(matches!(
            runtime(ComponentKind::MessageQueue).kind_state,
            KindState::Queue(_)
        ));
        assert!(matches!(
            runtime(ComponentKind::ApiGateway).kind_state,
            KindState::Gateway(_)
        ));
        assert!(matches!(
            runtime(ComponentKind::SqlDatabase).kind_state,
            KindState::Stateless
        ));
    }

    #[test]
    fn reset_zeroes_counters_but_keeps_config() {
        let mut runtime = runtime(ComponentKind::AppServer);
        runtime.processed = 10.0;
        runtime.errors = 2.0;
        runtime.latency_sum_ms = 50.0;
        runtime.active_connections = 3;
        runtime.reset_counters(0);
        assert_eq!(runtime.processed, 0.0);
        assert_eq!(runtime.error_rate(), 0.0);
        assert_eq!(runtime.active_connections, 0);
        assert_eq!(runtime.node.kind, ComponentKind::AppServer);
    }
}
