//! Dependency graph - normalizes relationships and fixes the apply order
//!
//! All four relationship shapes collapse into two edge kinds. The graph is
//! validated up front (duplicates, dangling references, cycles) so that an
//! invalid declaration never reaches a collaborator. The topological order
//! breaks ties by declaration order, which keeps runs reproducible.

use crate::declaration::{Declaration, Target};
use crate::error::GraphError;
use crate::resource::Resource;
use crate::types::ResourceId;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;

/// Kind of a normalized edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// `from` is materialized before `to`
    Order,
    /// Ordering plus a refresh of `to` when `from` changed
    Notify,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Order => f.write_str("order"),
            Self::Notify => f.write_str("notify"),
        }
    }
}

/// A directed edge between two resources, by declaration index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub from: usize,
    pub to: usize,
    pub kind: EdgeKind,
}

/// Validated resource graph with a precomputed apply order
#[derive(Debug)]
pub struct DependencyGraph {
    resources: Vec<Resource>,
    index: HashMap<ResourceId, usize>,
    edges: Vec<Edge>,
    incoming: Vec<Vec<usize>>,
    outgoing: Vec<Vec<usize>>,
    order: Vec<usize>,
}

impl DependencyGraph {
    /// Build and validate the graph for a declaration
    pub fn build(declaration: &Declaration) -> Result<Self, GraphError> {
        let resources = declaration.resources.clone();

        let mut index = HashMap::with_capacity(resources.len());
        for (i, resource) in resources.iter().enumerate() {
            if index.insert(resource.id.clone(), i).is_some() {
                return Err(GraphError::DuplicateResource(resource.id.clone()));
            }
        }

        let mut edges: Vec<Edge> = Vec::new();
        let mut seen: HashMap<(usize, usize), usize> = HashMap::new();

        for relationship in &declaration.relationships {
            let subject = relationship.subject().to_string();
            let (from, to, notify) = relationship.endpoints();
            let kind = if notify {
                EdgeKind::Notify
            } else {
                EdgeKind::Order
            };

            let sources = resolve(declaration, &index, from, &subject)?;
            let targets = resolve(declaration, &index, to, &subject)?;

            for &f in &sources {
                for &t in &targets {
                    match seen.get(&(f, t)) {
                        Some(&pos) => {
                            if kind == EdgeKind::Notify {
                                edges[pos].kind = EdgeKind::Notify;
                            }
                        }
                        None => {
                            seen.insert((f, t), edges.len());
                            edges.push(Edge {
                                from: f,
                                to: t,
                                kind,
                            });
                        }
                    }
                }
            }
        }

        let mut incoming = vec![Vec::new(); resources.len()];
        let mut outgoing = vec![Vec::new(); resources.len()];
        for (pos, edge) in edges.iter().enumerate() {
            outgoing[edge.from].push(pos);
            incoming[edge.to].push(pos);
        }

        let mut graph = Self {
            resources,
            index,
            edges,
            incoming,
            outgoing,
            order: Vec::new(),
        };

        if let Some(path) = graph.find_cycle() {
            return Err(GraphError::Cycle {
                path: path
                    .into_iter()
                    .map(|i| graph.resources[i].id.clone())
                    .collect(),
            });
        }

        graph.order = graph.topological_order();
        log::debug!(
            "graph built: {} resources, {} edges",
            graph.resources.len(),
            graph.edges.len()
        );
        Ok(graph)
    }

    /// Depth-first search with an explicit stack of `(node, next edge)`.
    ///
    /// Returns the cycle as declaration indices with the first repeated at
    /// the end.
    fn find_cycle(&self) -> Option<Vec<usize>> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Unvisited,
            OnStack,
            Done,
        }

        let mut marks = vec![Mark::Unvisited; self.resources.len()];
        let mut stack: Vec<(usize, usize)> = Vec::new();

        for start in 0..self.resources.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }
            marks[start] = Mark::OnStack;
            stack.push((start, 0));

            while let Some(top) = stack.last_mut() {
                let (node, cursor) = *top;
                let Some(&pos) = self.outgoing[node].get(cursor) else {
                    marks[node] = Mark::Done;
                    stack.pop();
                    continue;
                };
                top.1 += 1;

                let next = self.edges[pos].to;
                match marks[next] {
                    Mark::OnStack => {
                        let from = stack.iter().position(|&(n, _)| n == next).unwrap_or(0);
                        let mut path: Vec<usize> = stack[from..].iter().map(|&(n, _)| n).collect();
                        path.push(next);
                        return Some(path);
                    }
                    Mark::Unvisited => {
                        marks[next] = Mark::OnStack;
                        stack.push((next, 0));
                    }
                    Mark::Done => {}
                }
            }
        }
        None
    }

    /// Kahn's algorithm; the lowest declaration index among ready nodes wins
    fn topological_order(&self) -> Vec<usize> {
        let mut remaining: Vec<usize> = self.incoming.iter().map(Vec::len).collect();
        let mut ready: BinaryHeap<Reverse<usize>> = remaining
            .iter()
            .enumerate()
            .filter(|(_, count)| **count == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(self.resources.len());
        while let Some(Reverse(node)) = ready.pop() {
            order.push(node);
            for &pos in &self.outgoing[node] {
                let to = self.edges[pos].to;
                remaining[to] -= 1;
                if remaining[to] == 0 {
                    ready.push(Reverse(to));
                }
            }
        }
        order
    }

    /// Declaration indices in apply order
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Resources in apply order
    pub fn ordered(&self) -> impl Iterator<Item = &Resource> {
        self.order.iter().map(|&i| &self.resources[i])
    }

    /// Resources in declaration order
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn resource(&self, idx: usize) -> &Resource {
        &self.resources[idx]
    }

    pub fn index_of(&self, id: &ResourceId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// All normalized edges, in first-declaration order
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Incoming edges of a resource
    pub fn dependencies(&self, idx: usize) -> impl Iterator<Item = &Edge> {
        self.incoming[idx].iter().map(|&pos| &self.edges[pos])
    }

    /// Outgoing edges of a resource
    pub fn dependents(&self, idx: usize) -> impl Iterator<Item = &Edge> {
        self.outgoing[idx].iter().map(|&pos| &self.edges[pos])
    }

    /// Sources of NOTIFY edges into a resource
    pub fn notifiers(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        self.dependencies(idx)
            .filter(|e| e.kind == EdgeKind::Notify)
            .map(|e| e.from)
    }

    /// Layers of pairwise-independent resources
    ///
    /// A resource's wave is the length of the longest path reaching it, so
    /// every edge goes from an earlier wave to a later one. Within a wave,
    /// resources keep apply order.
    pub fn waves(&self) -> Vec<Vec<usize>> {
        let mut depth = vec![0usize; self.resources.len()];
        let mut waves: Vec<Vec<usize>> = Vec::new();

        for &node in &self.order {
            let d = self
                .dependencies(node)
                .map(|e| depth[e.from] + 1)
                .max()
                .unwrap_or(0);
            depth[node] = d;
            if waves.len() <= d {
                waves.resize_with(d + 1, Vec::new);
            }
            waves[d].push(node);
        }
        waves
    }
}

/// Expand a relationship endpoint to declaration indices
fn resolve(
    declaration: &Declaration,
    index: &HashMap<ResourceId, usize>,
    target: &Target,
    subject: &str,
) -> Result<Vec<usize>, GraphError> {
    let dangling = || GraphError::DanglingReference {
        subject: subject.to_string(),
        missing: target.to_string(),
    };

    match target {
        Target::Resource(id) => index.get(id).map(|&i| vec![i]).ok_or_else(dangling),
        Target::Group(name) => {
            if !declaration.has_group(name) {
                return Err(dangling());
            }
            Ok(declaration
                .members(name)
                .filter_map(|r| index.get(&r.id).copied())
                .collect())
        }
    }
}
