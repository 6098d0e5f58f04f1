use serde::Serialize;

use crate::graph::Topology;
use crate::models::{ComponentKind, Node};

/// Index-based percentile selection over an already sorted sample. `p` is a
/// fraction in (0, 1]; the result is always a member of the sample.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (p * sorted.len() as f64).ceil() as usize;
    let idx = rank.saturating_sub(1).min(sorted.len() - 1);
    Some(sorted[idx])
}

pub fn round_to(value: f64, decimals: u32) -> f64 {
    if decimals == 0 {
        return value.round();
    }
    let factor = 10_f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Flat monthly cost per instance by kind. Deliberately provider-neutral.
pub fn monthly_cost_per_instance(kind: ComponentKind) -> f64 {
    match kind {
        ComponentKind::Client => 0.0,
        ComponentKind::Cdn => 50.0,
        ComponentKind::LoadBalancer => 20.0,
        ComponentKind::ApiGateway => 30.0,
        ComponentKind::AppServer => 25.0,
        ComponentKind::Cache => 40.0,
        ComponentKind::SqlDatabase => 100.0,
        ComponentKind::NoSqlDatabase => 80.0,
        ComponentKind::ObjectStore => 10.0,
        ComponentKind::MessageQueue => 15.0,
        ComponentKind::Custom => 20.0,
    }
}

pub fn estimated_monthly_cost(nodes: &[Node]) -> f64 {
    nodes
        .iter()
        .map(|node| monthly_cost_per_instance(node.kind) * node.shared.instances.max(1) as f64)
        .sum()
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    Overloaded,
    HighUtilization,
    SinglePointOfFailure,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub node_id: String,
    pub node_name: String,
    pub kind: DiagnosticKind,
    pub message: String,
    pub suggestion: String,
    pub metric: Option<f64>,
}

/// Structural single-point-of-failure scan, independent of any scenario: a
/// non-client node with one instance that participates in at least one
/// connection.
pub fn spof_diagnostics(nodes: &[Node], topology: &Topology) -> Vec<Diagnostic> {
    nodes
        .iter()
        .filter(|node| {
            node.kind != ComponentKind::Client
                && node.shared.instances <= 1
                && topology.degree(&node.id) >= 1
        })
        .map(|node| Diagnostic {
            severity: Severity::Critical,
            node_id: node.id.clone(),
            node_name: node.label().to_string(),
            kind: DiagnosticKind::SinglePointOfFailure,
            message: format!(
                "{} runs a single instance on an active path",
                node.label()
            ),
            suggestion: "Add at least one more instance or replica".to_string(),
            metric: None,
        })
        .collect()
}

/// Steady-state load diagnostic for one node, derived from the last simulated
/// tick and the tick-averaged CPU so transient spikes are not flagged.
pub fn load_diagnostic(node: &Node, last_error_rate: f64, avg_cpu_pct: f64) -> Option<Diagnostic> {
    if last_error_rate > 0.01 {
        return Some(Diagnostic {
            severity: Severity::Critical,
            node_id: node.id.clone(),
            node_name: node.label().to_string(),
            kind: DiagnosticKind::Overloaded,
            message: format!(
                "{} is dropping {:.1}% of requests at steady state",
                node.label(),
                last_error_rate * 100.0
            ),
            suggestion: "Scale out or reduce inbound load".to_string(),
            metric: Some(round_to(last_error_rate, 4)),
        });
    }
    if avg_cpu_pct > 80.0 {
        return Some(Diagnostic {
            severity: Severity::Warning,
            node_id: node.id.clone(),
            node_name: node.label().to_string(),
            kind: DiagnosticKind::HighUtilization,
            message: format!(
                "{} averages {:.0}% CPU over the run",
                node.label(),
                avg_cpu_pct
            ),
            suggestion: "Add headroom before the next traffic peak".to_string(),
            metric: Some(round_to(avg_cpu_pct, 1)),
        });
    }
    None
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct AggregateMetrics {
    pub throughput_qps: f64,
    pub latency_p50_ms: f64,
    pub latency_p95_ms: f64,
    pub latency_p99_ms: f64,
    pub error_rate: f64,
    pub monthly_cost: f64,
    pub bottlenecks: Vec<String>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct NodeSummary {
    pub node_id: String,
    pub node_name: String,
    pub kind: ComponentKind,
    pub avg_cpu_pct: f64,
    pub avg_latency_ms: f64,
    pub avg_error_rate: f64,
    pub peak_throughput_qps: f64,
    pub healthy: bool,
}

/// Outcome of one scenario; immutable once built.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ScenarioResult {
    pub name: String,
    pub passed: bool,
    pub score: u32,
    pub metrics: AggregateMetrics,
    pub diagnostics: Vec<Diagnostic>,
    pub node_summaries: Vec<NodeSummary>,
}

/// Full static-engine output: every scenario plus the run-level structural
/// diagnostics and the rounded mean score.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct SimulationReport {
    pub scenarios: Vec<ScenarioResult>,
    pub spof_diagnostics: Vec<Diagnostic>,
    pub overall_score: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_returns_sample_members_non_decreasing_in_p() {
        let sorted: Vec<f64> = (1..=100).map(f64::from).collect();
        let p50 = percentile(&sorted, 0.50).unwrap();
        let p95 = percentile(&sorted, 0.95).unwrap();
        let p99 = percentile(&sorted, 0.99).unwrap();
        assert!(p50 <= p95 && p95 <= p99);
        for value in [p50, p95, p99] {
            assert!(sorted.contains(&value));
        }
        assert_eq!(p50, 50.0);
        assert_eq!(p95, 95.0);
        assert_eq!(p99, 99.0);
    }

    #[test]
    fn percentile_of_singleton_is_that_value() {
        assert_eq!(percentile(&[7.5], 0.5), Some(7.5));
        assert_eq!(percentile(&[7.5], 0.99), Some(7.5));
    }

    #[test]
    fn percentile_of_empty_sample_is_none() {
        assert_eq!(percentile(&[], 0.5), None);
    }

    #[test]
    fn overloaded_wins_over_high_utilization() {
        let node = test_node("db", ComponentKind::SqlDatabase, 1);
        let diagnostic = load_diagnostic(&node, 0.05, 95.0).unwrap();
        assert_eq!(diagnostic.kind, DiagnosticKind::Overloaded);
        assert_eq!(diagnostic.severity, Severity::Critical);
    }

    #[test]
    fn high_cpu_without_errors_is_a_warning() {
        let node = test_node("api", ComponentKind::AppServer, 2);
        let diagnostic = load_diagnostic(&node, 0.0, 85.0).unwrap();
        assert_eq!(diagnostic.kind, DiagnosticKind::HighUtilization);
        assert_eq!(diagnostic.severity, Severity::Warning);
    }

    #[test]
    fn calm_node_has_no_load_diagnostic() {
        let node = test_node("api", ComponentKind::AppServer, 2);
        assert!(load_diagnostic(&node, 0.001, 40.0).is_none());
    }

    fn test_node(id: &str, kind: ComponentKind, instances: u32) -> Node {
        Node {
            id: id.to_string(),
            kind,
            name: String::new(),
            position: Default::default(),
            shared: crate::models::SharedConfig {
                instances,
                ..Default::default()
            },
            spec: None,
        }
    }

    #[test]
    fn spof_flags_single_instance_connected_nodes_only() {
        use crate::models::Connection;
        let nodes = vec![
            test_node("client", ComponentKind::Client, 1),
            test_node("db", ComponentKind::SqlDatabase, 1),
            test_node("replicated", ComponentKind::AppServer, 2),
            test_node("island", ComponentKind::Cache, 1),
        ];
        let connections = vec![
            Connection {
                id: String::new(),
                source: "client".to_string(),
                target: "db".to_string(),
                protocol: String::new(),
                bidirectional: false,
            },
            Connection {
                id: String::new(),
                source: "client".to_string(),
                target: "replicated".to_string(),
                protocol: String::new(),
                bidirectional: false,
            },
        ];
        let topology = Topology::build(&nodes, &connections);
        let diagnostics = spof_diagnostics(&nodes, &topology);

        let flagged: Vec<&str> = diagnostics
            .iter()
            .map(|diagnostic| diagnostic.node_id.as_str())
            .collect();
        // Clients are exempt, replicated nodes are safe, islands have no path.
        assert_eq!(flagged, vec!["db"]);
    }

    #[test]
    fn cost_sums_per_kind_per_instance() {
        let nodes = vec![
            test_node("db", ComponentKind::SqlDatabase, 2),
            test_node("cache", ComponentKind::Cache, 1),
        ];
        assert_eq!(estimated_monthly_cost(&nodes), 2.0 * 100.0 + 40.0);
    }
}
