use std::collections::BTreeMap;

use serde::Serialize;

/// A cycle found while ordering a graph. The path starts and ends with the
/// node that closed the cycle, e.g. `[a, b, a]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyCycle<N> {
    pub path: Vec<N>,
}

impl<N: PartialEq> DependencyCycle<N> {
    /// Distinct members of the cycle in path order.
    pub fn members(&self) -> impl Iterator<Item = &N> {
        let len = self.path.len().saturating_sub(1);
        self.path.iter().take(len)
    }
}

/// Module dependency edges collected before ordering.
#[derive(Debug, Clone)]
pub struct DependencyGraph<N> {
    edges: BTreeMap<N, Vec<N>>,
}

impl<N: Ord + Clone> Default for DependencyGraph<N> {
    fn default() -> Self {
        Self {
            edges: BTreeMap::new(),
        }
    }
}

impl<N: Ord + Clone> DependencyGraph<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `node` with no dependencies if it is not known yet.
    pub fn add_node(&mut self, node: N) {
        self.edges.entry(node).or_default();
    }

    /// Records that `from` depends on `to`. Repeated edges are kept once.
    pub fn add_dependency(&mut self, from: N, to: N) {
        let dependencies = self.edges.entry(from).or_default();
        if !dependencies.contains(&to) {
            dependencies.push(to);
        }
    }

    pub fn dependencies(&self, node: &N) -> &[N] {
        self.edges.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn sort(&self) -> Result<Vec<N>, DependencyCycle<N>> {
        topological_sort(&self.edges)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Orders `graph` so every node comes after the nodes it points to. A
/// dependency that is not a key of the graph is emitted as a leaf.
pub fn topological_sort<N>(graph: &BTreeMap<N, Vec<N>>) -> Result<Vec<N>, DependencyCycle<N>>
where
    N: Ord + Clone,
{
    let mut sorter = Sorter {
        graph,
        marks: BTreeMap::new(),
        stack: Vec::new(),
        order: Vec::with_capacity(graph.len()),
    };
    for node in graph.keys() {
        sorter.visit(node)?;
    }
    Ok(sorter.order)
}

struct Sorter<'a, N> {
    graph: &'a BTreeMap<N, Vec<N>>,
    marks: BTreeMap<N, Mark>,
    stack: Vec<N>,
    order: Vec<N>,
}

impl<'a, N: Ord + Clone> Sorter<'a, N> {
    fn visit(&mut self, node: &N) -> Result<(), DependencyCycle<N>> {
        match self.marks.get(node) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => {
                let start = self
                    .stack
                    .iter()
                    .position(|entry| entry == node)
                    .unwrap_or(0);
                let mut path = self.stack[start..].to_vec();
                path.push(node.clone());
                return Err(DependencyCycle { path });
            }
            None => {}
        }

        self.marks.insert(node.clone(), Mark::InProgress);
        self.stack.push(node.clone());

        let graph = self.graph;
        if let Some(dependencies) = graph.get(node) {
            for dependency in dependencies {
                self.visit(dependency)?;
            }
        }

        self.stack.pop();
        self.marks.insert(node.clone(), Mark::Done);
        self.order.push(node.clone());
        Ok(())
    }
}
