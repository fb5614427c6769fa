//! Logical-to-physical compilation.
//!
//! The compiler partitions the logical graph into chains of operators, fuses
//! each chain into one physical vertex, connects the chain-crossing edges
//! with the right distribution pattern, assigns slot-sharing and co-location
//! groups, and finally weaves declared latency constraints into per-vertex
//! QoS reporter configurations.

use std::collections::{HashMap, HashSet};

use crate::error::CompileError;
use crate::graph::job_graph::{
    DistributionPattern, JobGraph, JobGraphSequence, LatencyConstraint, TaskConfig,
};
use crate::graph::sequence::{SequenceFinder, StreamSequenceElement, constraint_name};
use crate::graph::stream_graph::{ChainingStrategy, StreamEdge, StreamGraph};
use crate::qos::config::{EdgeQosReporterConfig, QosReporterConfig, VertexQosReporterConfig};
use crate::types::{DataSetId, NodeId, VertexId};

/// Compile a logical graph into a deployable job graph.
pub fn build_job_graph(graph: &StreamGraph, job_name: &str) -> Result<JobGraph, CompileError> {
    JobGraphCompiler::new(graph, job_name).run()
}

/// Compiler state threaded through the passes: chain building, physical
/// in-edge grouping, slot sharing, and constraint weaving. One instance
/// compiles one graph and is consumed by [`run`](Self::run).
pub struct JobGraphCompiler<'a> {
    graph: &'a StreamGraph,
    job_graph: JobGraph,
    /// Physical vertex owning each chain head.
    job_vertices: HashMap<NodeId, VertexId>,
    built: HashSet<NodeId>,
    /// Configs of non-head chain members, keyed by chain head.
    chained_configs: HashMap<NodeId, HashMap<NodeId, TaskConfig>>,
    /// Configs of chain heads, keyed by head node until installation.
    vertex_configs: HashMap<NodeId, TaskConfig>,
    /// Composite operator names, computed children-first.
    chained_names: HashMap<NodeId, String>,
    /// Chain-crossing edges in discovery order.
    physical_edges_in_order: Vec<StreamEdge>,
}

impl<'a> JobGraphCompiler<'a> {
    pub fn new(graph: &'a StreamGraph, job_name: &str) -> Self {
        let mut job_graph = JobGraph::new(job_name);
        job_graph.checkpointing_enabled = graph.checkpointing_enabled;
        job_graph.checkpointing_interval_ms = graph.checkpointing_interval_ms;
        Self {
            graph,
            job_graph,
            job_vertices: HashMap::new(),
            built: HashSet::new(),
            chained_configs: HashMap::new(),
            vertex_configs: HashMap::new(),
            chained_names: HashMap::new(),
            physical_edges_in_order: Vec::new(),
        }
    }

    pub fn run(mut self) -> Result<JobGraph, CompileError> {
        for source in self.graph.sources() {
            self.create_chain(source, source)?;
        }
        self.set_physical_edges()?;
        self.set_slot_sharing()?;
        if self.graph.has_constraints() {
            self.weave_constraints()?;
        }
        self.install_configs()?;
        tracing::debug!(
            "compiled {} logical nodes into {} physical vertices",
            self.graph.nodes.len(),
            self.job_graph.vertices.len()
        );
        Ok(self.job_graph)
    }

    /// Build the chain rooted at `chain_head`, currently visiting `current`.
    /// Returns the chain's transitive out edges: every edge discovered below
    /// `current` that crosses a chain boundary, in depth-first order.
    fn create_chain(
        &mut self,
        chain_head: NodeId,
        current: NodeId,
    ) -> Result<Vec<StreamEdge>, CompileError> {
        if self.built.contains(&current) {
            return Ok(Vec::new());
        }
        let graph = self.graph;
        let node = graph.node(current).ok_or_else(|| {
            CompileError::InvariantViolation(format!("edge references unknown node {}", current))
        })?;

        let mut chainable: Vec<StreamEdge> = Vec::new();
        let mut non_chainable: Vec<StreamEdge> = Vec::new();
        for edge in graph.out_edges(current) {
            if self.is_chainable(edge)? {
                chainable.push(edge.clone());
            } else {
                non_chainable.push(edge.clone());
            }
        }

        let mut transitive_out_edges = Vec::new();
        for edge in &chainable {
            transitive_out_edges.extend(self.create_chain(chain_head, edge.target)?);
        }
        for edge in &non_chainable {
            transitive_out_edges.push(edge.clone());
            self.create_chain(edge.target, edge.target)?;
        }

        // Children recursed first, so their composite names are known.
        let name = self.chained_name(&node.operator_name, &chainable);
        self.chained_names.insert(current, name);

        let mut config = if current == chain_head {
            self.create_job_vertex(chain_head)?
        } else {
            TaskConfig::default()
        };
        self.populate_config(current, &mut config, &chainable, &non_chainable)?;

        if current == chain_head {
            config.chain_start = true;
            config.out_edges_in_order = transitive_out_edges.clone();
            config.out_edges = graph.out_edges(current).cloned().collect();
            self.vertex_configs.insert(current, config);

            for edge in &transitive_out_edges {
                self.connect(chain_head, edge)?;
            }

            let chained = self.chained_configs.remove(&chain_head).unwrap_or_default();
            self.vertex_configs
                .get_mut(&current)
                .expect("head config inserted above")
                .chained_task_configs = chained;
        } else {
            self.chained_configs
                .entry(chain_head)
                .or_default()
                .insert(current, config);
        }

        self.built.insert(current);
        Ok(transitive_out_edges)
    }

    /// An edge may be fused iff all six conditions hold; any violation makes
    /// its target the head of a new physical vertex.
    fn is_chainable(&self, edge: &StreamEdge) -> Result<bool, CompileError> {
        let graph = self.graph;
        let upstream = graph.node(edge.source).ok_or_else(|| {
            CompileError::InvariantViolation(format!("edge references unknown node {}", edge.source))
        })?;
        let downstream = graph.node(edge.target).ok_or_else(|| {
            CompileError::InvariantViolation(format!("edge references unknown node {}", edge.target))
        })?;

        Ok(graph.in_edges(edge.target).count() == 1
            && downstream
                .operator
                .as_ref()
                .is_some_and(|op| op.chaining == ChainingStrategy::Always)
            && upstream.operator.as_ref().is_some_and(|op| {
                matches!(op.chaining, ChainingStrategy::Head | ChainingStrategy::Always)
            })
            && (edge.partitioner.is_forward() || downstream.parallelism == 1)
            && upstream.parallelism == downstream.parallelism
            && graph.chaining_enabled)
    }

    /// Composite display name of a node and its chained children.
    fn chained_name(&self, operator_name: &str, chainable: &[StreamEdge]) -> String {
        let child_name = |edge: &StreamEdge| {
            self.chained_names
                .get(&edge.target)
                .cloned()
                .unwrap_or_default()
        };
        match chainable {
            [] => operator_name.to_string(),
            [only] => format!("{} -> {}", operator_name, child_name(only)),
            many => {
                let children: Vec<String> = many.iter().map(child_name).collect();
                format!("{} -> ({})", operator_name, children.join(", "))
            }
        }
    }

    /// Instantiate the physical vertex for a chain head and return its
    /// primary config.
    fn create_job_vertex(&mut self, node_id: NodeId) -> Result<TaskConfig, CompileError> {
        let node = self.graph.node(node_id).ok_or_else(|| {
            CompileError::InvariantViolation(format!("chain head {} is not a node", node_id))
        })?;
        let name = self
            .chained_names
            .get(&node_id)
            .cloned()
            .unwrap_or_else(|| node.operator_name.clone());

        let vertex_id = self.job_graph.add_vertex(
            name,
            node.kind,
            node.parallelism,
            node.input_format.clone(),
        );
        tracing::debug!("parallelism set: {} for node {}", node.parallelism, node_id);
        self.job_vertices.insert(node_id, vertex_id);
        Ok(TaskConfig::default())
    }

    fn populate_config(
        &self,
        current: NodeId,
        config: &mut TaskConfig,
        chainable: &[StreamEdge],
        non_chainable: &[StreamEdge],
    ) -> Result<(), CompileError> {
        let node = self.graph.node(current).ok_or_else(|| {
            CompileError::InvariantViolation(format!("config requested for unknown node {}", current))
        })?;

        config.node_id = current;
        config.operator_name = self
            .chained_names
            .get(&current)
            .cloned()
            .unwrap_or_else(|| node.operator_name.clone());
        config.buffer_timeout_ms = node.buffer_timeout_ms;
        config.input_type = node.input_type.clone();
        config.output_type = node.output_type.clone();
        config.operator = node.operator.clone();
        config.number_of_outputs = non_chainable.len() as u32;
        config.non_chained_outputs = non_chainable.to_vec();
        config.chained_outputs = chainable.to_vec();
        config.checkpointing = self.graph.checkpointing_enabled;

        if node.kind.is_iterative() {
            let stream_loop = self.graph.loop_for_node(current).ok_or_else(|| {
                CompileError::InvariantViolation(format!(
                    "iteration node {} belongs to no loop",
                    current
                ))
            })?;
            config.iteration_id = Some(stream_loop.id);
            config.iteration_timeout_ms = Some(stream_loop.timeout_ms);
        }

        for edge in chainable.iter().chain(non_chainable.iter()) {
            config
                .selected_names
                .insert(edge.target, edge.selected_names.clone());
        }
        Ok(())
    }

    /// Physically connect a chain head to the target of one of its
    /// transitive out edges.
    fn connect(&mut self, head: NodeId, edge: &StreamEdge) -> Result<(), CompileError> {
        self.physical_edges_in_order.push(edge.clone());

        let source_vertex = self.physical_vertex(head)?;
        let target_vertex = self.physical_vertex(edge.target)?;
        let pattern = if edge.partitioner.is_forward() {
            DistributionPattern::Pointwise
        } else {
            DistributionPattern::AllToAll
        };
        self.job_graph.connect(source_vertex, target_vertex, pattern)?;

        let target_config = self.vertex_configs.get_mut(&edge.target).ok_or_else(|| {
            CompileError::InvariantViolation(format!(
                "no task config for connected node {}",
                edge.target
            ))
        })?;
        target_config.number_of_inputs += 1;

        tracing::debug!("connected: {:?} {} -> {}", pattern, head, edge.target);
        Ok(())
    }

    /// Edges are discovered in chain-traversal order; per-vertex configs need
    /// them grouped by target for input gate assignment.
    fn set_physical_edges(&mut self) -> Result<(), CompileError> {
        let mut in_edges_per_target: HashMap<NodeId, Vec<StreamEdge>> = HashMap::new();
        for edge in &self.physical_edges_in_order {
            in_edges_per_target
                .entry(edge.target)
                .or_default()
                .push(edge.clone());
        }

        for (target, edges) in in_edges_per_target {
            let config = self.vertex_configs.get_mut(&target).ok_or_else(|| {
                CompileError::InvariantViolation(format!(
                    "no task config for edge target {}",
                    target
                ))
            })?;
            config.in_physical_edges = edges;
        }
        Ok(())
    }

    /// All vertices may share slots; every loop's head and tail must
    /// additionally co-locate, since the feedback channel is executor-local.
    fn set_slot_sharing(&mut self) -> Result<(), CompileError> {
        const SHARED_GROUP: u32 = 0;
        for vertex in self.job_graph.vertices.values_mut() {
            vertex.slot_sharing_group = Some(SHARED_GROUP);
        }

        for (group, stream_loop) in self.graph.loops.iter().enumerate() {
            if stream_loop.head == stream_loop.tail {
                return Err(CompileError::InvariantViolation(format!(
                    "loop {} has identical head and tail node {}",
                    stream_loop.id, stream_loop.head
                )));
            }
            let head_vertex = self.physical_vertex(stream_loop.head)?;
            let tail_vertex = self.physical_vertex(stream_loop.tail)?;
            for vertex_id in [head_vertex, tail_vertex] {
                self.job_graph
                    .vertex_mut(vertex_id)
                    .ok_or_else(|| {
                        CompileError::InvariantViolation(format!(
                            "loop vertex {} missing from job graph",
                            vertex_id
                        ))
                    })?
                    .co_location_group = Some(group as u32);
            }
        }
        Ok(())
    }

    fn weave_constraints(&mut self) -> Result<(), CompileError> {
        if self.graph.chaining_enabled {
            return Err(CompileError::ConfigurationConflict(
                "latency constraints require chaining to be disabled".to_string(),
            ));
        }

        self.job_graph.custom_statistics_enabled = true;
        self.job_graph.central_report_interval_ms = self.graph.qos_report_interval_ms;
        self.job_graph.forwarder_report_interval_ms = self.graph.qos_report_interval_ms;

        for constraint in SequenceFinder::new(self.graph).resolve_constraints() {
            let mut sequence = JobGraphSequence::new();
            let mut last_input_gate: i32 = -1;

            for element in &constraint.sequence.elements {
                let StreamSequenceElement::Edge {
                    source,
                    target,
                    output_index,
                    ..
                } = element
                else {
                    continue;
                };
                let source_vertex = self.physical_vertex(*source)?;
                let target_vertex = self.physical_vertex(*target)?;

                // Locate the physical edge by produced-data-set identity.
                let (input_gate, job_edge) = self
                    .job_graph
                    .vertex(target_vertex)
                    .ok_or_else(|| {
                        CompileError::InvariantViolation(format!(
                            "constraint references missing vertex {}",
                            target_vertex
                        ))
                    })?
                    .inputs
                    .iter()
                    .enumerate()
                    .find(|(_, e)| e.source == source_vertex)
                    .map(|(i, e)| (i, *e))
                    .ok_or_else(|| {
                        CompileError::InvariantViolation(format!(
                            "no physical edge between vertices {} and {}",
                            source_vertex, target_vertex
                        ))
                    })?;

                let output_gate = self
                    .job_graph
                    .vertex(source_vertex)
                    .ok_or_else(|| {
                        CompileError::InvariantViolation(format!(
                            "constraint references missing vertex {}",
                            source_vertex
                        ))
                    })?
                    .produced_data_sets
                    .iter()
                    .position(|ds| *ds == job_edge.data_set)
                    .ok_or_else(|| {
                        CompileError::InvariantViolation(format!(
                            "data set {} not produced by vertex {}",
                            job_edge.data_set, source_vertex
                        ))
                    })?;

                if *output_index != output_gate {
                    return Err(CompileError::InvariantViolation(format!(
                        "declared target index {} does not match computed output gate {}",
                        output_index, output_gate
                    )));
                }

                self.add_vertex_qos_config(
                    &mut sequence,
                    *source,
                    source_vertex,
                    last_input_gate,
                    output_gate as i32,
                )?;
                self.add_edge_qos_config(
                    &mut sequence,
                    job_edge.data_set,
                    (*source, source_vertex, output_gate),
                    (*target, target_vertex, input_gate),
                )?;
                last_input_gate = input_gate as i32;
            }

            let last_node = constraint.sequence.last_vertex().ok_or_else(|| {
                CompileError::InvariantViolation("constraint sequence has no vertices".to_string())
            })?;
            let last_vertex = self.physical_vertex(last_node)?;
            self.add_vertex_qos_config(&mut sequence, last_node, last_vertex, last_input_gate, -1)?;

            let name = constraint_name(
                constraint.name.as_deref(),
                sequence.first_vertex_name().unwrap_or_default(),
                sequence.last_vertex_name().unwrap_or_default(),
            );
            self.job_graph.persist_constraint(LatencyConstraint {
                name,
                sequence,
                max_latency_ms: constraint.max_latency_ms,
            })?;
        }
        Ok(())
    }

    /// Append a vertex element to the sequence and attach the matching
    /// vertex reporter to that vertex's task config.
    fn add_vertex_qos_config(
        &mut self,
        sequence: &mut JobGraphSequence,
        node: NodeId,
        vertex: VertexId,
        input_gate: i32,
        output_gate: i32,
    ) -> Result<(), CompileError> {
        let name = self
            .job_graph
            .vertex(vertex)
            .ok_or_else(|| {
                CompileError::InvariantViolation(format!(
                    "constraint references missing vertex {}",
                    vertex
                ))
            })?
            .name
            .clone();
        sequence.push_vertex(vertex, name.clone(), input_gate, output_gate);

        let config = self.vertex_configs.get_mut(&node).ok_or_else(|| {
            CompileError::InvariantViolation(format!("no task config for node {}", node))
        })?;
        config
            .qos_reporters
            .push(QosReporterConfig::Vertex(VertexQosReporterConfig {
                vertex,
                name,
                input_gate,
                output_gate,
            }));
        Ok(())
    }

    /// Append an edge element and attach the source-side and target-side
    /// reporters of the same logical edge to the two endpoint configs.
    fn add_edge_qos_config(
        &mut self,
        sequence: &mut JobGraphSequence,
        data_set: DataSetId,
        (source_node, source_vertex, output_gate): (NodeId, VertexId, usize),
        (target_node, target_vertex, input_gate): (NodeId, VertexId, usize),
    ) -> Result<(), CompileError> {
        sequence.push_edge(source_vertex, output_gate, target_vertex, input_gate);

        let vertex_name = |id: VertexId| {
            self.job_graph
                .vertex(id)
                .map(|v| v.name.clone())
                .unwrap_or_default()
        };
        let name = format!("{} -> {}", vertex_name(source_vertex), vertex_name(target_vertex));

        let source_config = self.vertex_configs.get_mut(&source_node).ok_or_else(|| {
            CompileError::InvariantViolation(format!("no task config for node {}", source_node))
        })?;
        source_config
            .qos_reporters
            .push(QosReporterConfig::Edge(
                EdgeQosReporterConfig::source_task_config(data_set, output_gate, input_gate, &name),
            ));

        let target_config = self.vertex_configs.get_mut(&target_node).ok_or_else(|| {
            CompileError::InvariantViolation(format!("no task config for node {}", target_node))
        })?;
        target_config
            .qos_reporters
            .push(QosReporterConfig::Edge(
                EdgeQosReporterConfig::target_task_config(data_set, output_gate, input_gate, &name),
            ));
        Ok(())
    }

    /// Move the head configs into the job graph, re-keyed by vertex id.
    fn install_configs(&mut self) -> Result<(), CompileError> {
        for (node, config) in self.vertex_configs.drain() {
            let vertex_id = *self.job_vertices.get(&node).ok_or_else(|| {
                CompileError::InvariantViolation(format!("no physical vertex for node {}", node))
            })?;
            self.job_graph.task_configs.insert(vertex_id, config);
        }
        Ok(())
    }

    fn physical_vertex(&self, node: NodeId) -> Result<VertexId, CompileError> {
        self.job_vertices.get(&node).copied().ok_or_else(|| {
            CompileError::InvariantViolation(format!("no physical vertex for node {}", node))
        })
    }
}

#[cfg(test)]
#[path = "tests/compiler_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "tests/constraint_tests.rs"]
mod constraint_tests;
