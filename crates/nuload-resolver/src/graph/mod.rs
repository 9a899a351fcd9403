//! Dependency graph of a resolved selection using petgraph
//!
//! Provides dependencies-first ordering of the selected packages and cycle
//! reporting.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet};

use nuload_core::types::normalize_id;
use nuload_core::{CandidatePackage, DependencyEdge, PackageIdentity};

/// Graph over selected packages; an edge points from dependent to dependency
#[derive(Debug, Default)]
pub struct ResolvedGraph {
    graph: DiGraph<CandidatePackage, DependencyEdge>,
    /// Lowercase id -> node
    node_map: HashMap<String, NodeIndex>,
}

impl ResolvedGraph {
    /// Build the graph for one selection (one candidate per id)
    ///
    /// Edges to ids outside the selection are left out.
    pub fn new(selection: Vec<CandidatePackage>) -> Self {
        let mut resolved = Self::default();

        for package in selection {
            resolved.add_package(package);
        }

        let edges: Vec<(NodeIndex, NodeIndex, DependencyEdge)> = resolved
            .graph
            .node_indices()
            .flat_map(|from| {
                let node_map = &resolved.node_map;
                resolved.graph[from]
                    .dependencies
                    .iter()
                    .filter_map(move |edge| {
                        node_map
                            .get(&normalize_id(&edge.id))
                            .map(|&to| (from, to, edge.clone()))
                    })
            })
            .collect();

        for (from, to, edge) in edges {
            resolved.graph.add_edge(from, to, edge);
        }

        resolved
    }

    /// Add a package node, returning the existing node for a known id
    fn add_package(&mut self, package: CandidatePackage) -> NodeIndex {
        let key = normalize_id(package.id());
        if let Some(&existing) = self.node_map.get(&key) {
            return existing;
        }

        let node = self.graph.add_node(package);
        self.node_map.insert(key, node);
        node
    }

    /// Get package node by id
    pub fn get_package(&self, id: &str) -> Option<&CandidatePackage> {
        let node = self.node_map.get(&normalize_id(id))?;
        self.graph.node_weight(*node)
    }

    /// Get number of packages in the graph
    pub fn package_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get number of dependencies in the graph
    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Detect cycles in the dependency graph
    pub fn detect_cycles(&self) -> Result<(), Vec<PackageIdentity>> {
        match petgraph::algo::toposort(&self.graph, None) {
            Ok(_) => Ok(()),
            Err(cycle) => Err(self.extract_cycle_path(cycle.node_id())),
        }
    }

    /// Walk from a node known to be on a cycle until a node repeats
    fn extract_cycle_path(&self, start: NodeIndex) -> Vec<PackageIdentity> {
        let mut visited = HashSet::new();
        let mut path: Vec<NodeIndex> = Vec::new();
        let mut current = start;

        loop {
            if !visited.insert(current) {
                let cycle_start = path.iter().position(|&n| n == current).unwrap_or(0);
                return path[cycle_start..]
                    .iter()
                    .map(|&n| self.graph[n].identity.clone())
                    .collect();
            }
            path.push(current);

            // Follow the first outgoing edge that stays inside a cycle
            let next = self
                .graph
                .edges(current)
                .map(|e| e.target())
                .find(|&target| petgraph::algo::has_path_connecting(&self.graph, target, current, None));

            match next {
                Some(target) => current = target,
                None => break,
            }
        }

        path.iter().map(|&n| self.graph[n].identity.clone()).collect()
    }

    /// Format cycle as "A.1.0.0 -> B.1.0.0 -> A.1.0.0"
    pub fn format_cycle(cycle: &[PackageIdentity]) -> String {
        match cycle.first() {
            None => "No cycle".to_string(),
            Some(first) => {
                let mut names: Vec<String> = cycle.iter().map(ToString::to_string).collect();
                names.push(first.to_string());
                names.join(" -> ")
            },
        }
    }

    /// Packages with dependencies before their dependents, or an error naming a cycle
    pub fn dependency_order(&self) -> Result<Vec<&CandidatePackage>, String> {
        match petgraph::algo::toposort(&self.graph, None) {
            // toposort puts dependents first; reverse for install order
            Ok(sorted) => Ok(sorted.into_iter().rev().map(|n| &self.graph[n]).collect()),
            Err(cycle) => {
                let path = self.extract_cycle_path(cycle.node_id());
                Err(format!(
                    "Circular dependency detected: {}",
                    Self::format_cycle(&path)
                ))
            },
        }
    }
}
