//! Directed Acyclic Graph for builder ordering.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use pybundle_core::{BundleError, Result};

/// Dependency graph over named nodes, indexed by declaration order.
///
/// Edges run from a dependency to its dependent, so a topological order is
/// an execution order.
#[derive(Debug, Clone)]
pub struct BuildGraph {
    graph: DiGraph<String, ()>,
}

impl BuildGraph {
    /// Creates a graph with one node per name, in the given order.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut graph = DiGraph::new();
        for name in names {
            graph.add_node(name.into());
        }
        Self { graph }
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Position of a node by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.graph
            .node_indices()
            .find(|idx| self.graph[*idx] == name)
            .map(NodeIndex::index)
    }

    pub fn name(&self, index: usize) -> &str {
        &self.graph[NodeIndex::new(index)]
    }

    /// Records that `dependent` must run after `dependency`.
    pub fn add_dependency(&mut self, dependent: usize, dependency: usize) {
        self.graph
            .update_edge(NodeIndex::new(dependency), NodeIndex::new(dependent), ());
    }

    /// Direct dependencies of a node, in declaration order.
    pub fn dependencies(&self, index: usize) -> Vec<usize> {
        let mut deps: Vec<usize> = self
            .graph
            .neighbors_directed(NodeIndex::new(index), Direction::Incoming)
            .map(NodeIndex::index)
            .collect();
        deps.sort_unstable();
        deps
    }

    /// Returns the nodes of one cycle, in edge order, if the graph has any.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        for component in tarjan_scc(&self.graph) {
            let start = match component.as_slice() {
                [single] if !self.graph.contains_edge(*single, *single) => continue,
                nodes => nodes.iter().min_by_key(|n| n.index()).copied()?,
            };
            let members: HashSet<NodeIndex> = component.iter().copied().collect();
            return Some(self.walk_cycle(start, &members));
        }
        None
    }

    /// Follows edges inside one strongly connected component until a node repeats.
    fn walk_cycle(&self, start: NodeIndex, members: &HashSet<NodeIndex>) -> Vec<String> {
        let mut path = vec![start];
        let mut current = start;
        loop {
            let next = self
                .graph
                .neighbors_directed(current, Direction::Outgoing)
                .filter(|n| members.contains(n))
                .min_by_key(|n| n.index());
            let Some(next) = next else {
                break;
            };
            if let Some(pos) = path.iter().position(|n| *n == next) {
                let mut cycle: Vec<String> =
                    path[pos..].iter().map(|n| self.graph[*n].clone()).collect();
                cycle.push(self.graph[next].clone());
                return cycle;
            }
            path.push(next);
            current = next;
        }
        path.iter().map(|n| self.graph[*n].clone()).collect()
    }

    /// Fails with [`BundleError::DependencyCycle`] naming the nodes of a cycle.
    pub fn check_acyclic(&self) -> Result<()> {
        match self.find_cycle() {
            Some(cycle) => Err(BundleError::DependencyCycle(cycle.join(" -> "))),
            None => Ok(()),
        }
    }

    /// Topological order, ties broken by declaration order.
    pub fn execution_order(&self) -> Result<Vec<usize>> {
        self.check_acyclic()?;

        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|n| {
                self.graph
                    .neighbors_directed(n, Direction::Incoming)
                    .count()
            })
            .collect();

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(idx, _)| Reverse(idx))
            .collect();

        let mut order = Vec::with_capacity(self.len());
        while let Some(Reverse(idx)) = ready.pop() {
            order.push(idx);
            for next in self
                .graph
                .neighbors_directed(NodeIndex::new(idx), Direction::Outgoing)
            {
                let degree = &mut in_degree[next.index()];
                *degree -= 1;
                if *degree == 0 {
                    ready.push(Reverse(next.index()));
                }
            }
        }

        Ok(order)
    }
}
