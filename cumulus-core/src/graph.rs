//! Graph - Explicit dependency graph between declared resources
//!
//! Edges are derived from the references a resource holds in its attributes,
//! so ordering never depends on the sequence in which declarations were made.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::resource::{Resource, ResourceId};

/// Dependency between resources
#[derive(Debug, Clone, PartialEq)]
pub struct Dependency {
    /// Target resource
    pub target: ResourceId,
    /// Referenced attribute (e.g., "id")
    pub attribute: String,
    /// Where this reference is used (e.g., "vpc_id")
    pub used_in: String,
}

/// Dependency graph for a declaration set
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Resource -> list of dependencies
    pub edges: HashMap<ResourceId, Vec<Dependency>>,
    /// Reverse edges: target -> resources that depend on it
    pub reverse_edges: HashMap<ResourceId, Vec<ResourceId>>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph from the references held by each resource
    pub fn from_resources<'a>(resources: impl IntoIterator<Item = &'a Resource>) -> Self {
        let mut graph = Self::new();
        for resource in resources {
            for (used_in, reference) in resource.references() {
                graph.add_edge(
                    resource.id.clone(),
                    Dependency {
                        target: reference.target.clone(),
                        attribute: reference.attribute.clone(),
                        used_in: used_in.to_string(),
                    },
                );
            }
        }
        graph
    }

    /// Add a dependency edge
    pub fn add_edge(&mut self, from: ResourceId, dependency: Dependency) {
        let target = dependency.target.clone();
        self.edges.entry(from.clone()).or_default().push(dependency);
        let dependents = self.reverse_edges.entry(target).or_default();
        if !dependents.contains(&from) {
            dependents.push(from);
        }
    }

    /// Resources with dependents but no dependencies of their own
    pub fn roots(&self) -> Vec<ResourceId> {
        let mut roots: Vec<_> = self
            .reverse_edges
            .keys()
            .filter(|id| !self.edges.contains_key(*id))
            .cloned()
            .collect();
        roots.sort();
        roots
    }

    /// Resources with dependencies that nothing depends on
    pub fn leaves(&self) -> Vec<ResourceId> {
        let mut leaves: Vec<_> = self
            .edges
            .keys()
            .filter(|id| !self.reverse_edges.contains_key(*id))
            .cloned()
            .collect();
        leaves.sort();
        leaves
    }

    /// Get direct dependencies of a resource
    pub fn dependencies_of(&self, resource: &ResourceId) -> &[Dependency] {
        self.edges.get(resource).map_or(&[], |v| v.as_slice())
    }

    /// Distinct resources this resource depends on directly, sorted
    pub fn targets_of(&self, resource: &ResourceId) -> Vec<ResourceId> {
        let targets: BTreeSet<_> = self
            .dependencies_of(resource)
            .iter()
            .map(|d| d.target.clone())
            .collect();
        targets.into_iter().collect()
    }

    /// Get resources that depend on this resource
    pub fn dependents_of(&self, resource: &ResourceId) -> &[ResourceId] {
        self.reverse_edges
            .get(resource)
            .map_or(&[], |v| v.as_slice())
    }

    /// Check if the graph has any cycles
    pub fn has_cycle(&self) -> bool {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();

        for node in self.edges.keys() {
            if self.has_cycle_util(node, &mut visited, &mut rec_stack) {
                return true;
            }
        }
        false
    }

    fn has_cycle_util(
        &self,
        node: &ResourceId,
        visited: &mut HashSet<ResourceId>,
        rec_stack: &mut HashSet<ResourceId>,
    ) -> bool {
        if rec_stack.contains(node) {
            return true;
        }
        if visited.contains(node) {
            return false;
        }

        visited.insert(node.clone());
        rec_stack.insert(node.clone());

        if let Some(deps) = self.edges.get(node) {
            for dep in deps {
                if self.has_cycle_util(&dep.target, visited, rec_stack) {
                    return true;
                }
            }
        }

        rec_stack.remove(node);
        false
    }

    /// Order `declared` so every resource comes after its dependencies.
    ///
    /// Among resources that are ready at the same time, the one declared first
    /// wins, so the result is stable. Returns `None` if the graph has a cycle.
    pub fn topological_order(&self, declared: &[ResourceId]) -> Option<Vec<ResourceId>> {
        let position: HashMap<&ResourceId, usize> =
            declared.iter().enumerate().map(|(i, id)| (id, i)).collect();

        let mut pending: HashMap<&ResourceId, usize> = declared
            .iter()
            .map(|id| (id, self.targets_of(id).len()))
            .collect();

        let mut ready: BTreeSet<usize> = pending
            .iter()
            .filter(|(_, n)| **n == 0)
            .map(|(id, _)| position[id])
            .collect();

        let mut order = Vec::with_capacity(declared.len());
        while let Some(index) = ready.pop_first() {
            let id = &declared[index];
            order.push(id.clone());
            for dependent in self.dependents_of(id) {
                if let Some(count) = pending.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(position[dependent]);
                    }
                }
            }
        }

        if order.len() == declared.len() {
            Some(order)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(t: &str, n: &str) -> ResourceId {
        ResourceId::new(t, n)
    }

    fn dep(target: ResourceId, used_in: &str) -> Dependency {
        Dependency {
            target,
            attribute: "id".to_string(),
            used_in: used_in.to_string(),
        }
    }

    fn sample() -> (DependencyGraph, Vec<ResourceId>) {
        let vpc = id("vpc", "main");
        let igw = id("internet_gateway", "igw");
        let subnet = id("subnet", "public");
        let rt = id("route_table", "rt");

        let mut graph = DependencyGraph::new();
        graph.add_edge(igw.clone(), dep(vpc.clone(), "vpc_id"));
        graph.add_edge(subnet.clone(), dep(vpc.clone(), "vpc_id"));
        graph.add_edge(rt.clone(), dep(vpc.clone(), "vpc_id"));
        graph.add_edge(rt.clone(), dep(igw.clone(), "gateway_id"));

        (graph, vec![rt, subnet, igw, vpc])
    }

    #[test]
    fn roots_and_leaves() {
        let (graph, _) = sample();
        assert_eq!(graph.roots(), vec![id("vpc", "main")]);
        assert_eq!(
            graph.leaves(),
            vec![id("route_table", "rt"), id("subnet", "public")]
        );
    }

    #[test]
    fn dependents_are_not_duplicated() {
        let vpc = id("vpc", "main");
        let sg = id("security_group", "web");
        let mut graph = DependencyGraph::new();
        graph.add_edge(sg.clone(), dep(vpc.clone(), "vpc_id"));
        graph.add_edge(sg.clone(), dep(vpc.clone(), "other"));
        assert_eq!(graph.dependents_of(&vpc), &[sg.clone()]);
        assert_eq!(graph.dependencies_of(&sg).len(), 2);
        assert_eq!(graph.targets_of(&sg), vec![vpc]);
    }

    #[test]
    fn topological_order_respects_dependencies() {
        let (graph, declared) = sample();
        let order = graph.topological_order(&declared).unwrap();

        let pos = |r: &ResourceId| order.iter().position(|o| o == r).unwrap();
        for resource in &declared {
            for target in graph.targets_of(resource) {
                assert!(pos(&target) < pos(resource));
            }
        }
        // Ties resolved by declaration order: subnet was declared before igw
        assert_eq!(
            order,
            vec![
                id("vpc", "main"),
                id("subnet", "public"),
                id("internet_gateway", "igw"),
                id("route_table", "rt"),
            ]
        );
    }

    #[test]
    fn cycle_is_detected() {
        let a = id("x", "a");
        let b = id("x", "b");
        let mut graph = DependencyGraph::new();
        graph.add_edge(a.clone(), dep(b.clone(), "ref"));
        graph.add_edge(b.clone(), dep(a.clone(), "ref"));

        assert!(graph.has_cycle());
        assert_eq!(graph.topological_order(&[a, b]), None);
    }

    #[test]
    fn acyclic_graph_has_no_cycle() {
        let (graph, _) = sample();
        assert!(!graph.has_cycle());
    }
}
