use rand::rngs::StdRng;
use rand::Rng;
use std::collections::HashMap;

use crate::models::{ComponentKind, LbAlgorithm, Node};

/// Per-successor observations used by load-aware split algorithms.
#[derive(Clone, Debug)]
pub struct SuccessorLoad {
    pub id: String,
    pub current_load: f64,
    pub prev_throughput: f64,
}

/// Splits a load balancer's inbound load across its successors.
///
/// Round-robin and weighted both divide equally over a one-second window;
/// least-connections weights inversely by `current_load + 0.5 × previous
/// throughput` (a tunable proxy for true connection counts, not a queueing
/// model); random draws an independent uniform weight per successor.
pub fn split_load(
    algorithm: LbAlgorithm,
    load_qps: f64,
    successors: &[SuccessorLoad],
    rng: &mut StdRng,
) -> Vec<f64> {
    if successors.is_empty() {
        return Vec::new();
    }

    match algorithm {
        LbAlgorithm::RoundRobin | LbAlgorithm::Weighted => {
            let share = load_qps / successors.len() as f64;
            vec![share; successors.len()]
        }
        LbAlgorithm::LeastConnections => {
            let weights: Vec<f64> = successors
                .iter()
                .map(|successor| {
                    1.0 / (1.0 + successor.current_load + 0.5 * successor.prev_throughput)
                })
                .collect();
            normalize(load_qps, &weights)
        }
        LbAlgorithm::Random => {
            let weights: Vec<f64> = successors.iter().map(|_| rng.gen::<f64>()).collect();
            normalize(load_qps, &weights)
        }
    }
}

fn normalize(load_qps: f64, weights: &[f64]) -> Vec<f64> {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        let share = load_qps / weights.len() as f64;
        return vec![share; weights.len()];
    }
    weights
        .iter()
        .map(|weight| load_qps * weight / total)
        .collect()
}

/// Fraction of inbound load a node forwards downstream. Cache-like kinds
/// absorb their hit fraction; everything else forwards in full.
pub fn forward_fraction(kind: ComponentKind, hit_rate: Option<f64>) -> f64 {
    match kind {
        ComponentKind::Cache | ComponentKind::Cdn => 1.0 - hit_rate.unwrap_or(0.0),
        _ => 1.0,
    }
}

/// Successor ids sorted by flow priority (caches and databases before generic
/// fan-out targets), ties kept in connection order.
pub fn ordered_successors<'a>(
    successors: &'a [String],
    nodes: &HashMap<String, &Node>,
) -> Vec<&'a str> {
    let mut ordered: Vec<&str> = successors.iter().map(String::as_str).collect();
    ordered.sort_by_key(|id| {
        nodes
            .get(*id)
            .map(|node| node.kind.flow_priority())
            .unwrap_or(u8::MAX)
    });
    ordered
}
