use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{HashMap, HashSet};

use crate::component::{build_model, ComponentModel, ComponentState};
use crate::error::{Error, Result};
use crate::graph::Topology;
use crate::metrics::{
    estimated_monthly_cost, load_diagnostic, percentile, round_to, spof_diagnostics,
    AggregateMetrics, NodeSummary, ScenarioResult, SimulationReport,
};
use crate::models::{ComponentKind, GraphSpec, KindSpec, Node, Scenario};
use crate::routing::{forward_fraction, ordered_successors, split_load, SuccessorLoad};

pub const DEFAULT_DURATION_SECS: u64 = 60;
const DEFAULT_ROOT_RPS: f64 = 1000.0;
const PASS_SCORE: u32 = 60;
const PASS_ERROR_RATE: f64 = 0.01;

/// Runs every configured scenario over the graph and aggregates the results.
/// Synchronous and single-threaded; safe to call per request.
pub fn run_simulation(spec: &GraphSpec) -> Result<SimulationReport> {
    validate(spec)?;

    let scenarios = if spec.scenarios.is_empty() {
        Scenario::defaults()
    } else {
        spec.scenarios.clone()
    };
    let duration = spec.duration_secs.unwrap_or(DEFAULT_DURATION_SECS);
    let seed = spec.seed.unwrap_or(0);

    let topology = Topology::build(&spec.nodes, &spec.connections);
    if !topology.unresolved.is_empty() {
        tracing::debug!(
            unresolved = topology.unresolved.len(),
            "graph contains cycles; dependency order is best-effort"
        );
    }
    let models: HashMap<&str, Box<dyn ComponentModel>> = spec
        .nodes
        .iter()
        .map(|node| (node.id.as_str(), build_model(node)))
        .collect();

    tracing::info!(
        nodes = spec.nodes.len(),
        scenarios = scenarios.len(),
        duration,
        "starting static simulation"
    );

    let mut results = Vec::with_capacity(scenarios.len());
    for (index, scenario) in scenarios.iter().enumerate() {
        results.push(run_scenario(
            spec,
            &topology,
            &models,
            scenario,
            duration,
            seed.wrapping_add(index as u64),
        ));
    }

    let overall_score = if results.is_empty() {
        0
    } else {
        let total: u32 = results.iter().map(|result| result.score).sum();
        (total as f64 / results.len() as f64).round() as u32
    };

    Ok(SimulationReport {
        scenarios: results,
        spof_diagnostics: spof_diagnostics(&spec.nodes, &topology),
        overall_score,
    })
}

fn validate(spec: &GraphSpec) -> Result<()> {
    if spec.nodes.is_empty() {
        return Err(Error::EmptyGraph);
    }
    let mut ids = HashSet::new();
    for node in &spec.nodes {
        if node.id.trim().is_empty() {
            return Err(Error::EmptyNodeId);
        }
        if !ids.insert(node.id.as_str()) {
            return Err(Error::DuplicateNodeId(node.id.clone()));
        }
    }
    if let Some(0) = spec.duration_secs {
        return Err(Error::InvalidDuration(0));
    }
    for scenario in &spec.scenarios {
        if scenario.load_multiplier <= 0.0 {
            return Err(Error::InvalidLoadMultiplier(
                scenario.name.clone(),
                scenario.load_multiplier,
            ));
        }
    }
    Ok(())
}

struct NodeAccumulator {
    cpu_sum: f64,
    latency_sum: f64,
    error_sum: f64,
    peak_throughput: f64,
    last_state: ComponentState,
}

impl NodeAccumulator {
    fn new() -> Self {
        Self {
            cpu_sum: 0.0,
            latency_sum: 0.0,
            error_sum: 0.0,
            peak_throughput: 0.0,
            last_state: ComponentState::default(),
        }
    }
}

fn run_scenario(
    spec: &GraphSpec,
    topology: &Topology,
    models: &HashMap<&str, Box<dyn ComponentModel>>,
    scenario: &Scenario,
    duration: u64,
    seed: u64,
) -> ScenarioResult {
    let nodes_by_id: HashMap<String, &Node> = spec
        .nodes
        .iter()
        .map(|node| (node.id.clone(), node))
        .collect();
    let has_clients = spec
        .nodes
        .iter()
        .any(|node| node.kind == ComponentKind::Client);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut accumulators: HashMap<&str, NodeAccumulator> = spec
        .nodes
        .iter()
        .map(|node| (node.id.as_str(), NodeAccumulator::new()))
        .collect();
    let mut latencies: Vec<f64> = Vec::with_capacity(spec.nodes.len() * duration as usize);
    let mut prev_throughput: HashMap<&str, f64> = HashMap::new();
    let mut score = 100.0_f64;
    let mut seeded_total = 0.0_f64;

    for tick in 0..duration {
        // Smooth oscillation around the scenario multiplier emulates bursty
        // real traffic without discontinuities.
        let oscillation =
            scenario.load_multiplier * (1.0 + 0.2 * (tick as f64 / 10.0).sin());

        let mut inbound: HashMap<&str, f64> = HashMap::new();
        for node in &spec.nodes {
            let is_source = if has_clients {
                node.kind == ComponentKind::Client
            } else {
                // Root-injection fallback for graphs drawn without a client.
                topology.is_root(&node.id)
            };
            if is_source {
                let rps = match node.resolved_spec() {
                    KindSpec::Client(client) => client.requests_per_sec,
                    _ => DEFAULT_ROOT_RPS,
                };
                *inbound.entry(node.id.as_str()).or_insert(0.0) += rps * oscillation;
            }
        }
        seeded_total += inbound.values().sum::<f64>();

        let mut tick_throughput: HashMap<&str, f64> = HashMap::new();
        for id in &topology.order {
            let node = match nodes_by_id.get(id.as_str()) {
                Some(node) => *node,
                None => continue,
            };
            let model = match models.get(id.as_str()) {
                Some(model) => model,
                None => continue,
            };
            let load = inbound.get(id.as_str()).copied().unwrap_or(0.0);
            // Concurrency proxy: ~100ms average holding time per request.
            let connections = (load / 10.0).round() as u32;
            let state = model.process(load, connections);

            if !state.healthy {
                score -= 1.0;
            }
            score -= state.error_rate * 10.0;

            latencies.push(state.latency_ms);
            let accumulator = accumulators
                .entry(id.as_str())
                .or_insert_with(NodeAccumulator::new);
            accumulator.cpu_sum += state.cpu_pct;
            accumulator.latency_sum += state.latency_ms;
            accumulator.error_sum += state.error_rate;
            accumulator.peak_throughput = accumulator.peak_throughput.max(state.throughput_qps);
            tick_throughput.insert(id.as_str(), state.throughput_qps);
            accumulator.last_state = state;

            let successors = topology.successors(id);
            if successors.is_empty() || load <= 0.0 {
                continue;
            }
            let ordered = ordered_successors(successors, &nodes_by_id);
            let outbound = load * forward_fraction(node.kind, model.hit_rate());
            if outbound <= 0.0 {
                continue;
            }

            match node.resolved_spec() {
                KindSpec::LoadBalancer(lb) => {
                    let loads: Vec<SuccessorLoad> = ordered
                        .iter()
                        .map(|succ| SuccessorLoad {
                            id: succ.to_string(),
                            current_load: inbound.get(*succ).copied().unwrap_or(0.0),
                            prev_throughput: prev_throughput.get(*succ).copied().unwrap_or(0.0),
                        })
                        .collect();
                    let shares = split_load(lb.algorithm, outbound, &loads, &mut rng);
                    for (succ, share) in ordered.iter().zip(shares) {
                        let entry = inbound.entry(*succ).or_insert(0.0);
                        *entry += share;
                    }
                }
                _ => {
                    // Broadcast models parallel invocation, not request
                    // forking: total offered load multiplies by fan-out.
                    for succ in &ordered {
                        let entry = inbound.entry(*succ).or_insert(0.0);
                        *entry += outbound;
                    }
                }
            }
        }

        prev_throughput.clear();
        for (id, throughput) in tick_throughput {
            prev_throughput.insert(id, throughput);
        }
    }

    build_result(
        spec,
        scenario,
        duration,
        score,
        seeded_total,
        latencies,
        &accumulators,
    )
}

fn build_result(
    spec: &GraphSpec,
    scenario: &Scenario,
    duration: u64,
    score: f64,
    seeded_total: f64,
    mut latencies: Vec<f64>,
    accumulators: &HashMap<&str, NodeAccumulator>,
) -> ScenarioResult {
    let ticks = duration.max(1) as f64;
    latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let node_count = spec.nodes.len().max(1) as f64;
    let total_error: f64 = accumulators
        .values()
        .map(|accumulator| accumulator.error_sum)
        .sum();
    let error_rate = total_error / (node_count * ticks);

    let mut node_summaries = Vec::with_capacity(spec.nodes.len());
    let mut diagnostics = Vec::new();
    let mut bottlenecks = Vec::new();
    for node in &spec.nodes {
        let accumulator = match accumulators.get(node.id.as_str()) {
            Some(accumulator) => accumulator,
            None => continue,
        };
        let avg_cpu = accumulator.cpu_sum / ticks;
        let summary = NodeSummary {
            node_id: node.id.clone(),
            node_name: node.label().to_string(),
            kind: node.kind,
            avg_cpu_pct: round_to(avg_cpu, 2),
            avg_latency_ms: round_to(accumulator.latency_sum / ticks, 2),
            avg_error_rate: round_to(accumulator.error_sum / ticks, 4),
            peak_throughput_qps: round_to(accumulator.peak_throughput, 2),
            healthy: accumulator.last_state.healthy,
        };
        if !summary.healthy || avg_cpu > 90.0 {
            bottlenecks.push(summary.node_name.clone());
        }
        if let Some(diagnostic) =
            load_diagnostic(node, accumulator.last_state.error_rate, avg_cpu)
        {
            diagnostics.push(diagnostic);
        }
        node_summaries.push(summary);
    }

    let score = score.clamp(0.0, 100.0).round() as u32;
    let metrics = AggregateMetrics {
        throughput_qps: round_to(seeded_total / ticks * (1.0 - error_rate.min(1.0)), 2),
        latency_p50_ms: percentile(&latencies, 0.50).unwrap_or(0.0),
        latency_p95_ms: percentile(&latencies, 0.95).unwrap_or(0.0),
        latency_p99_ms: percentile(&latencies, 0.99).unwrap_or(0.0),
        error_rate: round_to(error_rate, 4),
        monthly_cost: estimated_monthly_cost(&spec.nodes),
        bottlenecks,
    };

    ScenarioResult {
        name: scenario.name.clone(),
        passed: score > PASS_SCORE && error_rate < PASS_ERROR_RATE,
        score,
        metrics,
        diagnostics,
        node_summaries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ClientSpec, Connection, LbAlgorithm, LoadBalancerSpec, SharedConfig,
    };

    fn node(id: &str, kind: ComponentKind) -> Node {
        Node {
            id: id.to_string(),
            kind,
            name: String::new(),
            position: Default::default(),
            shared: Default::default(),
            spec: None,
        }
    }

    fn edge(source: &str, target: &str) -> Connection {
        Connection {
            id: String::new(),
            source: source.to_string(),
            target: target.to_string(),
            protocol: String::new(),
            bidirectional: false,
        }
    }

    /// client (1000 rps) -> round-robin LB -> two app servers (1000 qps each).
    fn balanced_graph() -> GraphSpec {
        let mut client = node("client", ComponentKind::Client);
        client.spec = Some(KindSpec::Client(ClientSpec {
            requests_per_sec: 1000.0,
        }));
        let mut lb = node("lb", ComponentKind::LoadBalancer);
        lb.spec = Some(KindSpec::LoadBalancer(LoadBalancerSpec {
            algorithm: LbAlgorithm::RoundRobin,
        }));
        lb.shared = SharedConfig {
            instances: 2,
            ..Default::default()
        };
        let app_a = node("app-a", ComponentKind::AppServer);
        let app_b = node("app-b", ComponentKind::AppServer);

        GraphSpec {
            nodes: vec![client, lb, app_a, app_b],
            connections: vec![edge("client", "lb"), edge("lb", "app-a"), edge("lb", "app-b")],
            scenarios: Vec::new(),
            duration_secs: None,
            seed: Some(0),
        }
    }

    #[test]
    fn balanced_graph_passes_normal_load() {
        let report = run_simulation(&balanced_graph()).unwrap();
        let normal = &report.scenarios[0];
        assert_eq!(normal.name, "Normal Load");
        assert!(normal.passed, "score={} err={}", normal.score, normal.metrics.error_rate);
        assert_eq!(normal.metrics.error_rate, 0.0);

        // Round robin halves the load: each backend peaks near 600 qps.
        for summary in &normal.node_summaries {
            if summary.node_id.starts_with("app") {
                assert!(summary.peak_throughput_qps > 400.0);
                assert!(summary.peak_throughput_qps < 700.0);
                assert!(summary.healthy);
            }
        }
    }

    #[test]
    fn peak_load_overloads_backends() {
        let report = run_simulation(&balanced_graph()).unwrap();
        let peak = &report.scenarios[1];
        assert_eq!(peak.name, "Peak Load");
        assert!(peak.score < 60);
        assert!(
            !peak.diagnostics.is_empty(),
            "overload or high utilization expected"
        );
        assert!(peak
            .node_summaries
            .iter()
            .any(|summary| summary.node_id.starts_with("app") && summary.avg_error_rate > 0.0));
    }

    #[test]
    fn report_is_deterministic_for_fixed_seed() {
        let spec = balanced_graph();
        let first = run_simulation(&spec).unwrap();
        let second = run_simulation(&spec).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn spof_respects_instance_count() {
        let mut spec = balanced_graph();
        let report = run_simulation(&spec).unwrap();
        let flagged: Vec<&str> = report
            .spof_diagnostics
            .iter()
            .map(|diagnostic| diagnostic.node_id.as_str())
            .collect();
        // The LB has two instances; the single-instance app servers are SPOFs.
        assert!(flagged.contains(&"app-a"));
        assert!(!flagged.contains(&"lb"));
        assert!(!flagged.contains(&"client"));

        spec.nodes[2].shared.instances = 2;
        let report = run_simulation(&spec).unwrap();
        assert!(!report
            .spof_diagnostics
            .iter()
            .any(|diagnostic| diagnostic.node_id == "app-a"));
    }

    #[test]
    fn clientless_graph_uses_root_injection() {
        let spec = GraphSpec {
            nodes: vec![
                node("api", ComponentKind::AppServer),
                node("db", ComponentKind::SqlDatabase),
            ],
            connections: vec![edge("api", "db")],
            scenarios: vec![Scenario {
                name: "Normal".to_string(),
                load_multiplier: 1.0,
            }],
            duration_secs: Some(10),
            seed: Some(0),
        };
        let report = run_simulation(&spec).unwrap();
        let summary = &report.scenarios[0].node_summaries[1];
        assert!(summary.peak_throughput_qps > 0.0, "db saw injected load");
    }

    #[test]
    fn cyclic_graph_still_produces_a_report() {
        let spec = GraphSpec {
            nodes: vec![
                node("a", ComponentKind::AppServer),
                node("b", ComponentKind::AppServer),
            ],
            connections: vec![edge("a", "b"), edge("b", "a")],
            scenarios: vec![Scenario {
                name: "Normal".to_string(),
                load_multiplier: 1.0,
            }],
            duration_secs: Some(5),
            seed: Some(0),
        };
        let report = run_simulation(&spec).unwrap();
        assert_eq!(report.scenarios.len(), 1);
    }

    #[test]
    fn empty_graph_is_rejected() {
        let spec = GraphSpec {
            nodes: Vec::new(),
            connections: Vec::new(),
            scenarios: Vec::new(),
            duration_secs: None,
            seed: None,
        };
        assert!(matches!(run_simulation(&spec), Err(Error::EmptyGraph)));
    }

    #[test]
    fn duplicate_node_ids_are_rejected() {
        let spec = GraphSpec {
            nodes: vec![
                node("x", ComponentKind::AppServer),
                node("x", ComponentKind::Cache),
            ],
            connections: Vec::new(),
            scenarios: Vec::new(),
            duration_secs: None,
            seed: None,
        };
        assert!(matches!(
            run_simulation(&spec),
            Err(Error::DuplicateNodeId(_))
        ));
    }

    #[test]
    fn overall_score_is_the_rounded_scenario_mean() {
        let report = run_simulation(&balanced_graph()).unwrap();
        let expected = ((report.scenarios[0].score + report.scenarios[1].score) as f64 / 2.0)
            .round() as u32;
        assert_eq!(report.overall_score, expected);
    }
}
