use crate::metrics::{round_to, ScenarioResult, SimulationReport};

pub trait Formatter {
    fn write(&self, report: &SimulationReport) -> String;
}

/// Full per-scenario breakdown with node summaries and diagnostics.
pub struct HumanFormatter;

/// One line per scenario plus the overall verdict.
pub struct SummaryFormatter;

/// The whole report as pretty-printed JSON.
pub struct JsonFormatter;

impl Formatter for HumanFormatter {
    fn write(&self, report: &SimulationReport) -> String {
        let mut out = String::new();
        for scenario in &report.scenarios {
            out.push_str(&scenario_block(scenario));
            out.push('\n');
        }
        if !report.spof_diagnostics.is_empty() {
            out.push_str("Single points of failure:\n");
            for diag in &report.spof_diagnostics {
                out.push_str(&format!("  [{:?}] {}: {}\n", diag.severity, diag.node_name, diag.message));
                out.push_str(&format!("      suggestion: {}\n", diag.suggestion));
            }
            out.push('\n');
        }
        out.push_str(&format!("Overall score: {}\n", report.overall_score));
        out
    }
}

impl Formatter for SummaryFormatter {
    fn write(&self, report: &SimulationReport) -> String {
        let mut out = String::from("Summary:\n");
        for scenario in &report.scenarios {
            out.push_str(&format!(
                "{}: {} (score {}, p95 {}ms, errors {}%)\n",
                scenario.name,
                if scenario.passed { "PASS" } else { "FAIL" },
                scenario.score,
                round_to(scenario.metrics.latency_p95_ms, 1),
                round_to(scenario.metrics.error_rate * 100.0, 2),
            ));
        }
        out.push_str(&format!("Overall score: {}\n", report.overall_score));
        out
    }
}

impl Formatter for JsonFormatter {
    fn write(&self, report: &SimulationReport) -> String {
        // Serialization of the report cannot fail; every field is a plain
        // value type.
        let mut out = serde_json::to_string_pretty(report).unwrap_or_default();
        out.push('\n');
        out
    }
}

fn scenario_block(scenario: &ScenarioResult) -> String {
    let mut out = format!(
        "Scenario '{}': {} (score {})\n",
        scenario.name,
        if scenario.passed { "PASS" } else { "FAIL" },
        scenario.score
    );
    let m = &scenario.metrics;
    out.push_str(&format!(
        "  throughput: {} qps, latency p50/p95/p99: {}/{}/{} ms, errors: {}%\n",
        round_to(m.throughput_qps, 1),
        round_to(m.latency_p50_ms, 1),
        round_to(m.latency_p95_ms, 1),
        round_to(m.latency_p99_ms, 1),
        round_to(m.error_rate * 100.0, 2),
    ));
    out.push_str(&format!("  estimated monthly cost: ${}\n", round_to(m.monthly_cost, 2)));
    if !m.bottlenecks.is_empty() {
        out.push_str(&format!("  bottlenecks: {}\n", m.bottlenecks.join(", ")));
    }
    for node in &scenario.node_summaries {
        out.push_str(&format!(
            "  {}: cpu {}%, latency {}ms, errors {}%, peak {} qps\n",
            node.node_id,
            round_to(node.avg_cpu_pct, 1),
            round_to(node.avg_latency_ms, 1),
            round_to(node.avg_error_rate * 100.0, 2),
            round_to(node.peak_throughput_qps, 1),
        ));
    }
    for diag in &scenario.diagnostics {
        out.push_str(&format!(
            "  [{:?}] {}: {}\n      suggestion: {}\n",
            diag.severity, diag.node_name, diag.message, diag.suggestion
        ));
    }
    out
}
