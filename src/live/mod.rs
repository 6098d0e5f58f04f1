mod cache;
mod particle;
mod state;

pub use cache::{CacheEntry, CacheSim};
pub use particle::{Particle, ParticleSeverity, RequestTrace, TraceAction, TraceEvent, TraceId};
pub use state::{GatewayState, KindState, LbState, NodeRuntime, QueueState};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::HashMap;

use crate::graph::Topology;
use crate::models::{ComponentKind, GraphSpec, KindSpec, LbAlgorithm, Node};
use crate::routing::{split_load, SuccessorLoad};

/// Nominal frame duration at 60 steps/sec.
pub const STEP_MS: f64 = 1000.0 / 60.0;
/// Wall time a particle spends traversing one connection at speed 1.
const TRAVEL_TIME_MS: f64 = 500.0;
/// Coarse particle emission rate per client; each particle carries
/// `rps × load_factor / PARTICLES_PER_SEC` logical requests.
const PARTICLES_PER_SEC: f64 = 10.0;
/// Smallest request count worth a particle of its own.
const MIN_PARTICLE_COUNT: f64 = 0.5;
/// Safety cap for `step_until_next_arrival`.
const ARRIVAL_SCAN_CAP: usize = 300;
/// A backlog deeper than this many seconds of drain capacity dead-letters.
const QUEUE_DEAD_LETTER_SECS: f64 = 5.0;

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct NodeLiveMetrics {
    pub node_id: String,
    pub rps: f64,
    pub utilization: f64,
    pub healthy: bool,
    pub active_connections: u32,
    pub avg_latency_ms: f64,
    pub error_rate: f64,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct LiveMetrics {
    /// Sum of smoothed per-node arrival rates; a volume gauge, not a count
    /// of distinct logical requests.
    pub total_rps: f64,
    pub avg_latency_ms: f64,
    pub error_rate: f64,
    pub nodes: Vec<NodeLiveMetrics>,
}

/// Payload emitted exactly once per step, after all movement and spawning.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct TickSnapshot {
    pub particles: Vec<Particle>,
    pub metrics: LiveMetrics,
    pub tick: u64,
    pub debug_step: bool,
}

/// Event-driven, frame-paced simulation over the architecture graph.
/// All state is owned here; callers drive it through `step`-family methods
/// and the mutators, never concurrently.
pub struct LiveRunner {
    nodes: HashMap<String, NodeRuntime>,
    node_order: Vec<String>,
    topology: Topology,
    particles: Vec<Particle>,
    traces: HashMap<TraceId, RequestTrace>,
    completed: Vec<RequestTrace>,
    running: bool,
    speed: f64,
    load_factor: f64,
    tick: u64,
    clock_ms: f64,
    cache_tick_accum: f64,
    next_particle_id: u64,
    next_trace_id: u64,
    spawn_budget: HashMap<String, f64>,
    traced_arrival_seen: bool,
    seed: u64,
    rng: StdRng,
}

impl LiveRunner {
    pub fn new(spec: &GraphSpec) -> Self {
        let seed = spec.seed.unwrap_or(0);
        let topology = Topology::build(&spec.nodes, &spec.connections);
        let nodes: HashMap<String, NodeRuntime> = spec
            .nodes
            .iter()
            .map(|node| (node.id.clone(), NodeRuntime::new(node.clone(), seed)))
            .collect();
        let node_order = spec.nodes.iter().map(|node| node.id.clone()).collect();
        Self {
            nodes,
            node_order,
            topology,
            particles: Vec::new(),
            traces: HashMap::new(),
            completed: Vec::new(),
            running: false,
            speed: 1.0,
            load_factor: 1.0,
            tick: 0,
            clock_ms: 0.0,
            cache_tick_accum: 0.0,
            next_particle_id: 0,
            next_trace_id: 0,
            spawn_budget: HashMap::new(),
            traced_arrival_seen: false,
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    /// Idempotent; the hosting timer must already be stopped when this runs.
    pub fn pause(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed.clamp(0.1, 10.0);
    }

    pub fn set_load_factor(&mut self, load_factor: f64) {
        self.load_factor = load_factor.clamp(0.1, 100.0);
    }

    /// Hot-reconfigures nodes without resetting counters; unknown ids are
    /// added as fresh runtimes (they stay inert until connected).
    pub fn update_nodes(&mut self, nodes: Vec<Node>) {
        for node in nodes {
            match self.nodes.get_mut(&node.id) {
                Some(runtime) => runtime.reconfigure(node),
                None => {
                    self.node_order.push(node.id.clone());
                    self.nodes
                        .insert(node.id.clone(), NodeRuntime::new(node, self.seed));
                }
            }
        }
    }

    /// Clears all counters, traces, particles, and id counters; equivalent to
    /// a fresh construction over the same graph.
    pub fn reset(&mut self) {
        for runtime in self.nodes.values_mut() {
            runtime.reset_counters(self.seed);
        }
        self.particles.clear();
        self.traces.clear();
        self.completed.clear();
        self.running = false;
        self.tick = 0;
        self.clock_ms = 0.0;
        self.cache_tick_accum = 0.0;
        self.next_particle_id = 0;
        self.next_trace_id = 0;
        self.spawn_budget.clear();
        self.traced_arrival_seen = false;
        self.rng = StdRng::seed_from_u64(self.seed);
    }

    pub fn drain_completed_traces(&mut self) -> Vec<RequestTrace> {
        std::mem::take(&mut self.completed)
    }

    /// Regular frame advance.
    pub fn step(&mut self, delta_ms: f64) -> TickSnapshot {
        self.advance(delta_ms, true, false)
    }

    /// One forced frame, optionally suppressing client spawns (debug
    /// stepping).
    pub fn step_once(&mut self, allow_spawn: bool) -> TickSnapshot {
        self.advance(STEP_MS, allow_spawn, true)
    }

    /// Advances frames (spawns suppressed) until a traced particle completes
    /// a hop, or the safety cap is hit.
    pub fn step_until_next_arrival(&mut self) -> TickSnapshot {
        let mut snapshot = self.advance(STEP_MS, false, true);
        for _ in 1..ARRIVAL_SCAN_CAP {
            if self.traced_arrival_seen {
                break;
            }
            snapshot = self.advance(STEP_MS, false, true);
        }
        snapshot
    }

    /// Creates one traced debug request at the given client. Returns the
    /// trace id, or None when the id is unknown or not a client.
    pub fn inject_request(&mut self, client_id: &str) -> Option<TraceId> {
        let runtime = self.nodes.get(client_id)?;
        if runtime.node.kind != ComponentKind::Client {
            return None;
        }
        let trace_id = self.next_trace_id;
        self.next_trace_id += 1;
        let mut trace = RequestTrace::new(trace_id);
        trace.push(client_id, TraceAction::Emitted, self.tick);

        let successors = self.ordered_successors_of(client_id);
        match successors.first() {
            Some(target) => {
                let target = target.clone();
                self.traces.insert(trace_id, trace);
                self.spawn_particle(
                    client_id,
                    &target,
                    1.0,
                    ParticleSeverity::Normal,
                    Some(trace_id),
                );
            }
            None => {
                trace.push(client_id, TraceAction::DeadEnd, self.tick);
                self.completed.push(trace);
            }
        }
        Some(trace_id)
    }

    fn advance(&mut self, delta_ms: f64, allow_spawn: bool, debug_step: bool) -> TickSnapshot {
        let effective_ms = delta_ms * self.speed;
        let step_secs = effective_ms / 1000.0;
        self.clock_ms += effective_ms;
        self.tick += 1;
        self.traced_arrival_seen = false;

        self.tick_caches(step_secs);
        self.refill_gateways(step_secs);
        self.drain_queues(step_secs);

        // Move particles; collect arrivals in flight order.
        let mut arrivals = Vec::new();
        let mut remaining = Vec::with_capacity(self.particles.len());
        for mut particle in std::mem::take(&mut self.particles) {
            particle.progress += effective_ms / TRAVEL_TIME_MS;
            if particle.progress >= 1.0 {
                arrivals.push(particle);
            } else {
                remaining.push(particle);
            }
        }
        self.particles = remaining;

        for particle in arrivals {
            self.process_arrival(particle);
        }

        if allow_spawn {
            self.spawn_from_clients(step_secs);
        }

        TickSnapshot {
            particles: self.particles.clone(),
            metrics: self.collect_metrics(),
            tick: self.tick,
            debug_step,
        }
    }

    fn tick_caches(&mut self, step_secs: f64) {
        self.cache_tick_accum += step_secs;
        while self.cache_tick_accum >= 1.0 {
            self.cache_tick_accum -= 1.0;
            for runtime in self.nodes.values_mut() {
                if let KindState::Cache(sim) = &mut runtime.kind_state {
                    sim.tick();
                }
            }
        }
    }

    fn refill_gateways(&mut self, step_secs: f64) {
        for runtime in self.nodes.values_mut() {
            if let KindState::Gateway(gateway) = &mut runtime.kind_state {
                let limit = match runtime.node.resolved_spec() {
                    KindSpec::ApiGateway(spec) => runtime
                        .node
                        .shared
                        .rate_limit_rps
                        .unwrap_or(spec.rate_limit_rps),
                    _ => f64::MAX,
                };
                gateway.allowance = limit * step_secs;
            }
        }
    }

    fn drain_queues(&mut self, step_secs: f64) {
        for runtime in self.nodes.values_mut() {
            let capacity = runtime.model.max_capacity_qps();
            if let KindState::Queue(queue) = &mut runtime.kind_state {
                let drained = queue.backlog.min(capacity * step_secs);
                queue.backlog -= drained;
                queue.processed += drained;
                let ceiling = capacity * QUEUE_DEAD_LETTER_SECS;
                if queue.backlog > ceiling {
                    queue.dead_lettered += queue.backlog - ceiling;
                    queue.backlog = ceiling;
                }
            }
        }
    }

    fn spawn_from_clients(&mut self, step_secs: f64) {
        let clients: Vec<(String, f64)> = self
            .node_order
            .iter()
            .filter_map(|id| {
                let runtime = self.nodes.get(id)?;
                match runtime.node.resolved_spec() {
                    KindSpec::Client(spec) => Some((id.clone(), spec.requests_per_sec)),
                    _ => None,
                }
            })
            .collect();

        for (client_id, rps) in clients {
            let successors = self.ordered_successors_of(&client_id);
            if successors.is_empty() {
                continue;
            }
            let budget = self.spawn_budget.entry(client_id.clone()).or_insert(0.0);
            *budget += PARTICLES_PER_SEC * step_secs;
            let mut emissions = 0;
            while *budget >= 1.0 {
                *budget -= 1.0;
                emissions += 1;
            }
            if emissions == 0 {
                continue;
            }
            let count = rps * self.load_factor / PARTICLES_PER_SEC;
            for _ in 0..emissions {
                for target in &successors {
                    self.spawn_particle(
                        &client_id,
                        target,
                        count,
                        ParticleSeverity::Normal,
                        None,
                    );
                }
            }
        }
    }

    fn process_arrival(&mut self, particle: Particle) {
        let target_id = particle.target.clone();
        let count = particle.request_count;
        let trace_id = particle.trace_id;
        if trace_id.is_some() {
            self.traced_arrival_seen = true;
        }

        let info = match self.nodes.get_mut(&target_id) {
            Some(runtime) => {
                runtime.active_connections = runtime.active_connections.saturating_sub(1);
                runtime.record_arrival(self.clock_ms, count);
                let rps = runtime.smoothed_rps(self.clock_ms);
                let capacity = runtime.model.max_capacity_qps();
                let state = runtime.model.process(rps, runtime.active_connections);
                runtime.last_throughput = state.throughput_qps;
                runtime.processed += count;
                runtime.latency_sum_ms += state.latency_ms * count;
                let overloaded = rps > capacity;
                if overloaded {
                    runtime.errors += count * ((rps / capacity) - 1.0).min(1.0);
                }
                Some((runtime.node.kind, runtime.model.hit_rate(), rps, capacity, overloaded))
            }
            None => None,
        };

        let (kind, hit_rate, rps, capacity, overloaded) = match info {
            Some(info) => info,
            None => {
                if let Some(trace_id) = trace_id {
                    self.finalize_trace(trace_id, &target_id, TraceAction::DeadEnd, false);
                }
                return;
            }
        };

        let severity = if overloaded {
            ParticleSeverity::Error
        } else if rps > capacity * 0.8 {
            ParticleSeverity::Degraded
        } else {
            ParticleSeverity::Normal
        };

        if kind.is_leaf() {
            self.absorb_at_leaf(&target_id, kind, count, trace_id);
            return;
        }

        match kind {
            ComponentKind::Cache | ComponentKind::Cdn => {
                self.route_through_cache(&target_id, count, hit_rate, severity, trace_id)
            }
            ComponentKind::ApiGateway => {
                self.route_through_gateway(&target_id, count, severity, trace_id)
            }
            ComponentKind::LoadBalancer => {
                self.route_through_balancer(&target_id, count, severity, trace_id)
            }
            _ => self.broadcast_onward(&target_id, count, severity, trace_id),
        }
    }

    fn absorb_at_leaf(
        &mut self,
        node_id: &str,
        kind: ComponentKind,
        count: f64,
        trace_id: Option<TraceId>,
    ) {
        if kind == ComponentKind::MessageQueue {
            if let Some(runtime) = self.nodes.get_mut(node_id) {
                if let KindState::Queue(queue) = &mut runtime.kind_state {
                    queue.backlog += count;
                    queue.enqueued += count;
                }
            }
            if let Some(trace_id) = trace_id {
                self.trace_event(trace_id, node_id, TraceAction::Enqueued);
                self.finalize_trace(trace_id, node_id, TraceAction::Absorbed, true);
            }
            return;
        }
        if let Some(trace_id) = trace_id {
            self.finalize_trace(trace_id, node_id, TraceAction::Absorbed, true);
        }
    }

    fn route_through_cache(
        &mut self,
        node_id: &str,
        count: f64,
        hit_rate: Option<f64>,
        severity: ParticleSeverity,
        trace_id: Option<TraceId>,
    ) {
        let hit_rate = hit_rate.unwrap_or(0.0);
        let successors = self.ordered_successors_of(node_id);

        if let Some(trace_id) = trace_id {
            let hit = match self
                .nodes
                .get_mut(node_id)
                .map(|runtime| &mut runtime.kind_state)
            {
                Some(KindState::Cache(sim)) => sim.decide(hit_rate),
                _ => false,
            };
            if hit {
                self.finalize_trace(trace_id, node_id, TraceAction::CacheHit, true);
                return;
            }
            self.trace_event(trace_id, node_id, TraceAction::CacheMiss);
            match successors.first() {
                Some(target) => {
                    let target = target.clone();
                    self.spawn_particle(node_id, &target, count, severity, Some(trace_id));
                }
                None => self.finalize_trace(trace_id, node_id, TraceAction::DeadEnd, false),
            }
            return;
        }

        let forwarded = count * (1.0 - hit_rate);
        if forwarded < MIN_PARTICLE_COUNT {
            return;
        }
        for target in &successors {
            self.spawn_particle(node_id, target, forwarded, severity, None);
        }
    }

    fn route_through_gateway(
        &mut self,
        node_id: &str,
        count: f64,
        severity: ParticleSeverity,
        trace_id: Option<TraceId>,
    ) {
        let admitted = match self
            .nodes
            .get_mut(node_id)
            .map(|runtime| &mut runtime.kind_state)
        {
            Some(KindState::Gateway(gateway)) => {
                let admitted = count.min(gateway.allowance);
                gateway.allowance -= admitted;
                gateway.dropped += count - admitted;
                admitted
            }
            _ => count,
        };
        let rejected = count - admitted;
        if rejected > 0.0 {
            if let Some(runtime) = self.nodes.get_mut(node_id) {
                runtime.errors += rejected;
            }
        }

        if let Some(trace_id) = trace_id {
            if admitted < 1.0 {
                self.finalize_trace(trace_id, node_id, TraceAction::RateLimited, false);
                return;
            }
            self.trace_event(trace_id, node_id, TraceAction::Forwarded);
            let successors = self.ordered_successors_of(node_id);
            match successors.first() {
                Some(target) => {
                    let target = target.clone();
                    self.spawn_particle(node_id, &target, 1.0, severity, Some(trace_id));
                }
                None => self.finalize_trace(trace_id, node_id, TraceAction::DeadEnd, false),
            }
            return;
        }

        if admitted < MIN_PARTICLE_COUNT {
            return;
        }
        let successors = self.ordered_successors_of(node_id);
        for target in &successors {
            self.spawn_particle(node_id, target, admitted, severity, None);
        }
    }

    fn route_through_balancer(
        &mut self,
        node_id: &str,
        count: f64,
        severity: ParticleSeverity,
        trace_id: Option<TraceId>,
    ) {
        let successors = self.ordered_successors_of(node_id);
        if successors.is_empty() {
            if let Some(trace_id) = trace_id {
                self.finalize_trace(trace_id, node_id, TraceAction::DeadEnd, false);
            }
            return;
        }
        let algorithm = match self
            .nodes
            .get(node_id)
            .map(|runtime| runtime.node.resolved_spec())
        {
            Some(KindSpec::LoadBalancer(spec)) => spec.algorithm,
            _ => LbAlgorithm::RoundRobin,
        };
        let loads: Vec<SuccessorLoad> = successors
            .iter()
            .map(|succ| {
                let runtime = self.nodes.get(succ);
                SuccessorLoad {
                    id: succ.clone(),
                    current_load: runtime.map(|r| r.ema_rps).unwrap_or(0.0),
                    prev_throughput: runtime.map(|r| r.last_throughput).unwrap_or(0.0),
                }
            })
            .collect();

        if let Some(trace_id) = trace_id {
            let backend = self.pick_backend(node_id, algorithm, &loads);
            self.trace_event(
                trace_id,
                node_id,
                TraceAction::Routed {
                    backend: backend.clone(),
                },
            );
            self.record_sent(node_id, &backend, 1);
            self.spawn_particle(node_id, &backend, 1.0, severity, Some(trace_id));
            return;
        }

        let shares = split_load(algorithm, count, &loads, &mut self.rng);
        self.advance_cursor(node_id);
        for (target, share) in successors.iter().zip(shares) {
            if share < MIN_PARTICLE_COUNT {
                continue;
            }
            self.record_sent(node_id, target, share.round() as u64);
            self.spawn_particle(node_id, target, share, severity, None);
        }
    }

    fn broadcast_onward(
        &mut self,
        node_id: &str,
        count: f64,
        severity: ParticleSeverity,
        trace_id: Option<TraceId>,
    ) {
        let successors = self.ordered_successors_of(node_id);
        if let Some(trace_id) = trace_id {
            match successors.first() {
                Some(target) => {
                    let target = target.clone();
                    self.trace_event(trace_id, node_id, TraceAction::Forwarded);
                    self.spawn_particle(node_id, &target, count, severity, Some(trace_id));
                }
                None => self.finalize_trace(trace_id, node_id, TraceAction::DeadEnd, false),
            }
            return;
        }
        if count < MIN_PARTICLE_COUNT {
            return;
        }
        for target in &successors {
            self.spawn_particle(node_id, target, count, severity, None);
        }
    }

    fn pick_backend(
        &mut self,
        node_id: &str,
        algorithm: LbAlgorithm,
        loads: &[SuccessorLoad],
    ) -> String {
        match algorithm {
            LbAlgorithm::RoundRobin | LbAlgorithm::Weighted => {
                let cursor = self.advance_cursor(node_id);
                loads[cursor % loads.len()].id.clone()
            }
            LbAlgorithm::LeastConnections => loads
                .iter()
                .min_by(|a, b| {
                    let score_a = a.current_load + 0.5 * a.prev_throughput;
                    let score_b = b.current_load + 0.5 * b.prev_throughput;
                    score_a
                        .partial_cmp(&score_b)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|load| load.id.clone())
                .unwrap_or_default(),
            LbAlgorithm::Random => {
                let pick = self.rng.gen_range(0..loads.len());
                loads[pick].id.clone()
            }
        }
    }

    fn advance_cursor(&mut self, node_id: &str) -> usize {
        if let Some(runtime) = self.nodes.get_mut(node_id) {
            if let KindState::LoadBalancer(lb) = &mut runtime.kind_state {
                let cursor = lb.cursor;
                lb.cursor = lb.cursor.wrapping_add(1);
                return cursor;
            }
        }
        0
    }

    fn record_sent(&mut self, node_id: &str, backend: &str, count: u64) {
        if let Some(runtime) = self.nodes.get_mut(node_id) {
            if let KindState::LoadBalancer(lb) = &mut runtime.kind_state {
                *lb.sent.entry(backend.to_string()).or_insert(0) += count;
            }
        }
    }

    fn ordered_successors_of(&self, node_id: &str) -> Vec<String> {
        let mut successors: Vec<String> = self.topology.successors(node_id).to_vec();
        successors.sort_by_key(|id| {
            self.nodes
                .get(id)
                .map(|runtime| runtime.node.kind.flow_priority())
                .unwrap_or(u8::MAX)
        });
        successors
    }

    fn spawn_particle(
        &mut self,
        source: &str,
        target: &str,
        count: f64,
        severity: ParticleSeverity,
        trace_id: Option<TraceId>,
    ) {
        if let Some(runtime) = self.nodes.get_mut(target) {
            runtime.active_connections += 1;
        }
        let id = self.next_particle_id;
        self.next_particle_id += 1;
        self.particles.push(Particle {
            id,
            source: source.to_string(),
            target: target.to_string(),
            progress: 0.0,
            request_count: count,
            severity,
            trace_id,
        });
    }

    fn trace_event(&mut self, trace_id: TraceId, node_id: &str, action: TraceAction) {
        if let Some(trace) = self.traces.get_mut(&trace_id) {
            trace.push(node_id, action, self.tick);
        }
    }

    fn finalize_trace(
        &mut self,
        trace_id: TraceId,
        node_id: &str,
        action: TraceAction,
        completed: bool,
    ) {
        if let Some(mut trace) = self.traces.remove(&trace_id) {
            trace.push(node_id, action, self.tick);
            trace.completed = completed;
            tracing::debug!(trace_id, completed, "trace finalized");
            self.completed.push(trace);
        }
    }

    fn collect_metrics(&mut self) -> LiveMetrics {
        let clock_ms = self.clock_ms;
        let mut nodes = Vec::with_capacity(self.node_order.len());
        let mut total_rps = 0.0;
        let mut latency_weight = 0.0;
        let mut latency_sum = 0.0;
        let mut processed = 0.0;
        let mut errors = 0.0;
        for id in &self.node_order {
            let runtime = match self.nodes.get_mut(id) {
                Some(runtime) => runtime,
                None => continue,
            };
            let rps = runtime.smoothed_rps(clock_ms);
            let capacity = runtime.model.max_capacity_qps();
            let utilization = if capacity > 0.0 { rps / capacity } else { 0.0 };
            total_rps += rps;
            latency_sum += runtime.latency_sum_ms;
            latency_weight += runtime.processed;
            processed += runtime.processed;
            errors += runtime.errors;
            nodes.push(NodeLiveMetrics {
                node_id: id.clone(),
                rps,
                utilization,
                healthy: utilization < 1.0,
                active_connections: runtime.active_connections,
                avg_latency_ms: runtime.avg_latency_ms(),
                error_rate: runtime.error_rate(),
            });
        }
        LiveMetrics {
            total_rps,
            avg_latency_ms: if latency_weight > 0.0 {
                latency_sum / latency_weight
            } else {
                0.0
            },
            error_rate: if processed > 0.0 {
                (errors / processed).min(1.0)
            } else {
                0.0
            },
            nodes,
        }
    }
}
