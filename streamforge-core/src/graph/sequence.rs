//! Alternating vertex/edge sequences over the logical graph.
//!
//! A declared latency constraint names only its begin and end node; the
//! [`SequenceFinder`] expands it into every vertex/edge path connecting the
//! two, and each discovered sequence is woven into the physical graph
//! separately.

use std::collections::HashSet;

use crate::graph::stream_graph::StreamGraph;
use crate::types::NodeId;

/// One step of a logical sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSequenceElement {
    Vertex {
        id: NodeId,
    },
    Edge {
        source: NodeId,
        target: NodeId,
        /// Position of this edge among the source's outgoing edges. Must
        /// match the output gate index computed during weaving.
        output_index: usize,
        /// Position of this edge among the target's incoming edges.
        input_index: usize,
    },
}

impl StreamSequenceElement {
    pub fn is_vertex(&self) -> bool {
        matches!(self, StreamSequenceElement::Vertex { .. })
    }
}

/// An ordered alternation of vertex and edge elements, starting and ending
/// with a vertex.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamSequence {
    pub elements: Vec<StreamSequenceElement>,
}

impl StreamSequence {
    pub fn first_vertex(&self) -> Option<NodeId> {
        self.elements.first().and_then(|e| match e {
            StreamSequenceElement::Vertex { id } => Some(*id),
            _ => None,
        })
    }

    pub fn last_vertex(&self) -> Option<NodeId> {
        self.elements.last().and_then(|e| match e {
            StreamSequenceElement::Vertex { id } => Some(*id),
            _ => None,
        })
    }
}

/// A declared constraint expanded to one concrete sequence.
#[derive(Debug, Clone)]
pub struct ResolvedConstraint {
    pub sequence: StreamSequence,
    pub max_latency_ms: u64,
    pub name: Option<String>,
}

/// Enumerates all alternating vertex/edge paths between two nodes.
pub struct SequenceFinder<'a> {
    graph: &'a StreamGraph,
}

impl<'a> SequenceFinder<'a> {
    pub fn new(graph: &'a StreamGraph) -> Self {
        Self { graph }
    }

    /// All sequences from `begin` to `end`, in depth-first edge order.
    pub fn find_all_sequences_between(&self, begin: NodeId, end: NodeId) -> Vec<StreamSequence> {
        let mut found = Vec::new();
        let mut path = Vec::new();
        let mut on_path = HashSet::new();
        self.visit(begin, end, &mut path, &mut on_path, &mut found);
        found
    }

    /// Expand every declared constraint into its sequences.
    pub fn resolve_constraints(&self) -> Vec<ResolvedConstraint> {
        let mut resolved = Vec::new();
        for spec in &self.graph.constraints {
            for sequence in self.find_all_sequences_between(spec.begin, spec.end) {
                resolved.push(ResolvedConstraint {
                    sequence,
                    max_latency_ms: spec.max_latency_ms,
                    name: spec.name.clone(),
                });
            }
        }
        resolved
    }

    fn visit(
        &self,
        current: NodeId,
        end: NodeId,
        path: &mut Vec<StreamSequenceElement>,
        on_path: &mut HashSet<NodeId>,
        found: &mut Vec<StreamSequence>,
    ) {
        path.push(StreamSequenceElement::Vertex { id: current });
        on_path.insert(current);

        if current == end {
            found.push(StreamSequence {
                elements: path.clone(),
            });
        } else {
            for (output_index, edge) in self.graph.out_edges(current).enumerate() {
                if on_path.contains(&edge.target) {
                    continue;
                }
                let input_index = self
                    .graph
                    .in_edges(edge.target)
                    .position(|e| std::ptr::eq(e, edge))
                    .unwrap_or(0);
                path.push(StreamSequenceElement::Edge {
                    source: current,
                    target: edge.target,
                    output_index,
                    input_index,
                });
                self.visit(edge.target, end, path, on_path, found);
                path.pop();
            }
        }

        on_path.remove(&current);
        path.pop();
    }
}

/// Derive the persisted name of a constraint from its declaration or its
/// endpoint vertex names.
pub fn constraint_name(declared: Option<&str>, first_vertex: &str, last_vertex: &str) -> String {
    match declared {
        Some(name) => name.to_string(),
        None => format!("{} -> {}", first_vertex, last_vertex),
    }
}

#[cfg(test)]
#[path = "tests/sequence_tests.rs"]
mod tests;
