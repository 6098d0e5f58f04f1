use std::collections::{HashMap, HashSet, VecDeque};

use crate::models::{Connection, Node};

/// Adjacency structure plus a best-effort topological processing order.
///
/// Cyclic graphs are tolerated: nodes left with residual in-degree after
/// Kahn's queue drains are appended in input order, so the order is always a
/// permutation of the input and only loses dependency precision for the
/// cyclic subset. `unresolved` names that subset.
#[derive(Clone, Debug, Default)]
pub struct Topology {
    pub adjacency: HashMap<String, Vec<String>>,
    pub incoming: HashMap<String, u32>,
    pub outgoing: HashMap<String, u32>,
    pub order: Vec<String>,
    pub unresolved: Vec<String>,
}

impl Topology {
    pub fn build(nodes: &[Node], connections: &[Connection]) -> Self {
        let ids: HashSet<&str> = nodes.iter().map(|node| node.id.as_str()).collect();

        let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
        let mut incoming: HashMap<String, u32> = HashMap::new();
        let mut outgoing: HashMap<String, u32> = HashMap::new();
        for node in nodes {
            adjacency.insert(node.id.clone(), Vec::new());
            incoming.insert(node.id.clone(), 0);
            outgoing.insert(node.id.clone(), 0);
        }

        for connection in connections {
            // Dangling endpoints and self-loops are structurally inert.
            if !ids.contains(connection.source.as_str())
                || !ids.contains(connection.target.as_str())
            {
                tracing::debug!(
                    source = %connection.source,
                    target = %connection.target,
                    "dropping connection with unknown endpoint"
                );
                continue;
            }
            if connection.source == connection.target {
                continue;
            }
            if let Some(targets) = adjacency.get_mut(&connection.source) {
                targets.push(connection.target.clone());
            }
            if let Some(count) = incoming.get_mut(&connection.target) {
                *count += 1;
            }
            if let Some(count) = outgoing.get_mut(&connection.source) {
                *count += 1;
            }
        }

        let (order, unresolved) = topological_order(nodes, &adjacency, &incoming);

        Self {
            adjacency,
            incoming,
            outgoing,
            order,
            unresolved,
        }
    }

    pub fn successors(&self, id: &str) -> &[String] {
        self.adjacency.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of connections (in or out) the node participates in.
    pub fn degree(&self, id: &str) -> u32 {
        self.incoming.get(id).copied().unwrap_or(0) + self.outgoing.get(id).copied().unwrap_or(0)
    }

    pub fn is_root(&self, id: &str) -> bool {
        self.incoming.get(id).copied().unwrap_or(0) == 0
    }
}

fn topological_order(
    nodes: &[Node],
    adjacency: &HashMap<String, Vec<String>>,
    incoming: &HashMap<String, u32>,
) -> (Vec<String>, Vec<String>) {
    let mut degrees: HashMap<&str, u32> = incoming
        .iter()
        .map(|(id, count)| (id.as_str(), *count))
        .collect();

    let mut queue: VecDeque<&str> = nodes
        .iter()
        .filter(|node| degrees.get(node.id.as_str()).copied().unwrap_or(0) == 0)
        .map(|node| node.id.as_str())
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    let mut placed: HashSet<&str> = HashSet::with_capacity(nodes.len());

    while let Some(id) = queue.pop_front() {
        order.push(id.to_string());
        placed.insert(id);
        if let Some(targets) = adjacency.get(id) {
            for target in targets {
                if let Some(degree) = degrees.get_mut(target.as_str()) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        queue.push_back(target.as_str());
                    }
                }
            }
        }
    }

    // Cycle residue: append in input order so the result stays deterministic.
    let mut unresolved = Vec::new();
    for node in nodes {
        if !placed.contains(node.id.as_str()) {
            order.push(node.id.clone());
            unresolved.push(node.id.clone());
        }
    }

    (order, unresolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ComponentKind;

    fn node(id: &str) -> Node {
        Node {
            id: id.to_string(),
            kind: ComponentKind::AppServer,
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

    fn position_of(order: &[String], id: &str) -> usize {
        order.iter().position(|entry| entry == id).unwrap()
    }

    #[test]
    fn acyclic_order_respects_edges() {
        let nodes = vec![node("a"), node("b"), node("c"), node("d")];
        let connections = vec![edge("a", "b"), edge("b", "c"), edge("a", "d"), edge("d", "c")];
        let topology = Topology::build(&nodes, &connections);

        for connection in &connections {
            assert!(
                position_of(&topology.order, &connection.source)
                    < position_of(&topology.order, &connection.target),
                "{} must precede {}",
                connection.source,
                connection.target
            );
        }
        assert!(topology.unresolved.is_empty());
    }

    #[test]
    fn cyclic_graph_keeps_every_node_exactly_once() {
        let nodes = vec![node("a"), node("b"), node("c")];
        let connections = vec![edge("a", "b"), edge("b", "c"), edge("c", "a")];
        let topology = Topology::build(&nodes, &connections);

        assert_eq!(topology.order.len(), 3);
        let unique: HashSet<&String> = topology.order.iter().collect();
        assert_eq!(unique.len(), 3);
        assert_eq!(topology.unresolved, vec!["a", "b", "c"]);
    }

    #[test]
    fn partial_cycle_appends_residue_after_resolved_prefix() {
        let nodes = vec![node("root"), node("x"), node("y")];
        let connections = vec![edge("root", "x"), edge("x", "y"), edge("y", "x")];
        let topology = Topology::build(&nodes, &connections);

        assert_eq!(topology.order[0], "root");
        assert_eq!(topology.order.len(), 3);
        assert_eq!(topology.unresolved, vec!["x", "y"]);
    }

    #[test]
    fn self_loops_are_inert() {
        let nodes = vec![node("a"), node("b")];
        let connections = vec![edge("a", "a"), edge("a", "b")];
        let topology = Topology::build(&nodes, &connections);

        assert_eq!(topology.order, vec!["a", "b"]);
        assert!(topology.unresolved.is_empty());
        assert_eq!(topology.degree("a"), 1);
    }

    #[test]
    fn dangling_connections_are_dropped() {
        let nodes = vec![node("a")];
        let connections = vec![edge("a", "ghost"), edge("ghost", "a")];
        let topology = Topology::build(&nodes, &connections);

        assert_eq!(topology.order, vec!["a"]);
        assert!(topology.successors("a").is_empty());
        assert_eq!(topology.degree("a"), 0);
    }

    #[test]
    fn build_is_deterministic() {
        let nodes = vec![node("a"), node("b"), node("c"), node("d")];
        let connections = vec![edge("a", "c"), edge("b", "c"), edge("c", "d")];
        let first = Topology::build(&nodes, &connections);
        let second = Topology::build(&nodes, &connections);
        assert_eq!(first.order, second.order);
    }
}
