//! Cycle detection over type containment and inheritance
//!
//! Complex types contain complex types, complex and entity types extend their
//! base types, and entity types contain complex types. Any strongly connected
//! component of that graph is a cycle.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

use crate::error::BuildError;
use crate::models::FullQualifiedName;
use crate::registry::{ElementKind, Registry};

type TypeNode = (ElementKind, FullQualifiedName);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Contains,
    Extends,
}

#[derive(Default)]
struct TypeGraph {
    graph: DiGraph<TypeNode, Edge>,
    nodes: HashMap<TypeNode, NodeIndex>,
}

impl TypeGraph {
    fn node(&mut self, kind: ElementKind, name: &FullQualifiedName) -> NodeIndex {
        let key = (kind, name.clone());
        if let Some(&index) = self.nodes.get(&key) {
            return index;
        }
        let index = self.graph.add_node(key.clone());
        self.nodes.insert(key, index);
        index
    }

    fn edge(&mut self, from: (ElementKind, &FullQualifiedName), to: (ElementKind, &FullQualifiedName), edge: Edge) {
        let a = self.node(from.0, from.1);
        let b = self.node(to.0, to.1);
        self.graph.add_edge(a, b, edge);
    }
}

fn type_graph(registry: &Registry) -> TypeGraph {
    let mut graph = TypeGraph::default();
    for complex_type in registry.complex_types() {
        let this = (ElementKind::ComplexType, &complex_type.name);
        graph.node(this.0, this.1);
        if let Some(base) = &complex_type.base_type {
            graph.edge(this, (ElementKind::ComplexType, base), Edge::Extends);
        }
        for nested in complex_type.nested_types() {
            graph.edge(this, (ElementKind::ComplexType, nested), Edge::Contains);
        }
    }
    for entity_type in registry.entity_types() {
        let this = (ElementKind::EntityType, &entity_type.name);
        graph.node(this.0, this.1);
        if let Some(base) = &entity_type.base_type {
            graph.edge(this, (ElementKind::EntityType, base), Edge::Extends);
        }
        for complex in entity_type.properties.iter().filter_map(|p| p.property_type.as_complex()) {
            graph.edge(this, (ElementKind::ComplexType, complex), Edge::Contains);
        }
    }
    graph
}

/// One error per cycle found among the registered types
pub fn find_cycles(registry: &Registry) -> Vec<BuildError> {
    let TypeGraph { graph, .. } = type_graph(registry);
    let mut cycles = Vec::new();
    for component in tarjan_scc(&graph) {
        let cyclic = component.len() > 1
            || component
                .first()
                .is_some_and(|&n| graph.find_edge(n, n).is_some());
        if !cyclic {
            continue;
        }

        let mut members: Vec<&TypeNode> = component.iter().map(|&n| &graph[n]).collect();
        members.sort();
        let all_complex = members.iter().all(|(kind, _)| *kind == ElementKind::ComplexType);
        let (kind, first) = members[0].clone();
        if all_complex && component_has_containment(&graph, &component) {
            let mut path: Vec<FullQualifiedName> = members.iter().map(|(_, name)| name.clone()).collect();
            path.push(first.clone());
            cycles.push(BuildError::CyclicComplexType {
                complex_type: first,
                path,
            });
        } else {
            cycles.push(BuildError::CyclicBuildError {
                kind,
                element: first.to_string(),
            });
        }
    }
    cycles
}

fn component_has_containment(graph: &DiGraph<TypeNode, Edge>, component: &[NodeIndex]) -> bool {
    component.iter().any(|&from| {
        graph
            .edges(from)
            .any(|e| *e.weight() == Edge::Contains && component.contains(&e.target()))
    })
}
