//! Static checks over the declared dependency graph.
//!
//! Only parameters declared through [`Factory::inject`](crate::Factory::inject)
//! are visible here; lookups a factory performs through its registry
//! back-reference are not.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::RegistryError;
use crate::registry::Registry;
use crate::service_type::ServiceType;

/// Directed graph: service -> services its factory declares as parameters
#[derive(Debug, Default)]
pub struct DependencyGraph {
    dependencies: HashMap<ServiceType, Vec<ServiceType>>,
    dependents: HashMap<ServiceType, HashSet<ServiceType>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, service: ServiceType) {
        self.dependencies.entry(service).or_default();
    }

    /// `dependent` needs `dependency`
    pub fn add_dependency(&mut self, dependent: ServiceType, dependency: ServiceType) {
        let edges = self.dependencies.entry(dependent).or_default();
        if !edges.contains(&dependency) {
            edges.push(dependency);
        }
        self.dependents.entry(dependency).or_default().insert(dependent);
    }

    pub fn dependencies_of(&self, service: &ServiceType) -> &[ServiceType] {
        self.dependencies
            .get(service)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn dependents_of(&self, service: &ServiceType) -> Vec<ServiceType> {
        self.dependents
            .get(service)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every cycle reachable by DFS, each as a path whose last element
    /// depends on its first
    pub fn find_cycles(&self) -> Vec<Vec<ServiceType>> {
        let mut cycles = Vec::new();
        let mut visited = HashSet::new();
        let mut on_stack = HashSet::new();
        let mut path = Vec::new();

        let mut roots: Vec<&ServiceType> = self.dependencies.keys().collect();
        roots.sort_by_key(|service| service.name());

        for node in roots {
            if !visited.contains(node) {
                self.visit(*node, &mut visited, &mut on_stack, &mut path, &mut cycles);
            }
        }
        cycles
    }

    fn visit(
        &self,
        node: ServiceType,
        visited: &mut HashSet<ServiceType>,
        on_stack: &mut HashSet<ServiceType>,
        path: &mut Vec<ServiceType>,
        cycles: &mut Vec<Vec<ServiceType>>,
    ) {
        visited.insert(node);
        on_stack.insert(node);
        path.push(node);

        for neighbor in self.dependencies_of(&node) {
            if !visited.contains(neighbor) {
                self.visit(*neighbor, visited, on_stack, path, cycles);
            } else if on_stack.contains(neighbor) {
                if let Some(start) = path.iter().position(|entry| entry == neighbor) {
                    cycles.push(path[start..].to_vec());
                }
            }
        }

        on_stack.remove(&node);
        path.pop();
    }

    /// Services ordered so that every dependency precedes its dependents
    /// (Kahn's algorithm). `None` when the graph has a cycle.
    pub fn creation_order(&self) -> Option<Vec<ServiceType>> {
        let mut nodes: HashSet<ServiceType> = self.dependencies.keys().copied().collect();
        nodes.extend(self.dependents.keys().copied());

        let mut pending: HashMap<ServiceType, usize> = nodes
            .iter()
            .map(|node| (*node, self.dependencies_of(node).len()))
            .collect();

        let mut ready: Vec<ServiceType> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(node, _)| *node)
            .collect();
        ready.sort_by_key(|service| service.name());
        let mut queue: VecDeque<ServiceType> = ready.into();

        let mut order = Vec::with_capacity(nodes.len());
        while let Some(node) = queue.pop_front() {
            order.push(node);
            let mut unlocked = Vec::new();
            for dependent in self.dependents_of(&node) {
                if let Some(count) = pending.get_mut(&dependent) {
                    *count -= 1;
                    if *count == 0 {
                        unlocked.push(dependent);
                    }
                }
            }
            unlocked.sort_by_key(|service| service.name());
            queue.extend(unlocked);
        }

        (order.len() == nodes.len()).then_some(order)
    }

    pub fn edge_count(&self) -> usize {
        self.dependencies.values().map(Vec::len).sum()
    }
}

/// A declared parameter with no registration behind it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingDependency {
    pub service: String,
    pub dependency: String,
}

/// Result of [`Registry::validate`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub services: usize,
    pub missing: Vec<MissingDependency>,
    /// Each cycle as service names, first repeated at the end
    pub cycles: Vec<Vec<String>>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.missing.is_empty() && self.cycles.is_empty()
    }

    pub fn summary(&self) -> String {
        let mut problems: Vec<String> = self
            .missing
            .iter()
            .map(|m| format!("{} requires unregistered {}", m.service, m.dependency))
            .collect();
        problems.extend(self.cycles.iter().map(|cycle| format!("cycle {}", cycle.join(" -> "))));
        if problems.is_empty() {
            format!("{} services, no problems", self.services)
        } else {
            problems.join("; ")
        }
    }

    pub fn into_result(self) -> Result<(), RegistryError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(RegistryError::InvalidGraph {
                summary: self.summary(),
            })
        }
    }
}

impl Registry {
    /// Declared dependency graph of the current registrations
    pub fn dependency_graph(&self) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for descriptor in self.descriptors() {
            graph.add_node(descriptor.service);
            for dependency in descriptor.factory.dependencies() {
                graph.add_dependency(descriptor.service, dependency);
            }
        }
        graph
    }

    /// Check that every declared parameter is registered and that the
    /// declared graph has no cycles. Nothing is instantiated.
    pub fn validate(&self) -> ValidationReport {
        let graph = self.dependency_graph();
        let registered = self.list_types();

        let mut missing = Vec::new();
        for descriptor in self.descriptors() {
            for dependency in descriptor.factory.dependencies() {
                if !registered.contains(&dependency) {
                    missing.push(MissingDependency {
                        service: descriptor.service.name().to_string(),
                        dependency: dependency.name().to_string(),
                    });
                }
            }
        }
        missing.sort_by(|a, b| (&a.service, &a.dependency).cmp(&(&b.service, &b.dependency)));

        let cycles: Vec<Vec<String>> = graph
            .find_cycles()
            .into_iter()
            .map(|cycle| {
                let mut names: Vec<String> = cycle.iter().map(|s| s.name().to_string()).collect();
                if let Some(first) = names.first().cloned() {
                    names.push(first);
                }
                names
            })
            .collect();

        let report = ValidationReport {
            services: registered.len(),
            missing,
            cycles,
        };
        if report.is_valid() {
            debug!(
                services = report.services,
                edges = graph.edge_count(),
                "dependency graph validated"
            );
        } else {
            warn!(summary = %report.summary(), "dependency graph has problems");
        }
        report
    }
}
