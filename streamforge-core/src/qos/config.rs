//! Reporter configurations woven into task configs, and QoS actions sent
//! back to nodes by the central monitor.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::types::{DataSetId, VertexId};

/// Which end of a monitored edge a reporter config is deployed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReporterSide {
    Source,
    Target,
}

/// Reporter role for one monitored edge.
///
/// The source-side and target-side configs for the same edge differ only in
/// [`side`](Self::side); everything else (data set, gate indices, name) is
/// shared so both ends report under the same identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeQosReporterConfig {
    pub data_set: DataSetId,
    pub output_gate: usize,
    pub input_gate: usize,
    pub side: ReporterSide,
    pub name: String,
}

impl EdgeQosReporterConfig {
    pub fn source_task_config(
        data_set: DataSetId,
        output_gate: usize,
        input_gate: usize,
        name: impl Into<String>,
    ) -> Self {
        Self {
            data_set,
            output_gate,
            input_gate,
            side: ReporterSide::Source,
            name: name.into(),
        }
    }

    pub fn target_task_config(
        data_set: DataSetId,
        output_gate: usize,
        input_gate: usize,
        name: impl Into<String>,
    ) -> Self {
        Self {
            data_set,
            output_gate,
            input_gate,
            side: ReporterSide::Target,
            name: name.into(),
        }
    }

    pub fn is_source_task_config(&self) -> bool {
        self.side == ReporterSide::Source
    }
}

/// Reporter role for one monitored vertex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexQosReporterConfig {
    pub vertex: VertexId,
    pub name: String,
    /// -1 when the vertex has no monitored input in the sequence.
    pub input_gate: i32,
    /// -1 when the vertex has no monitored output in the sequence.
    pub output_gate: i32,
}

/// Reporter config attached to a task config by the constraint weaver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QosReporterConfig {
    Vertex(VertexQosReporterConfig),
    Edge(EdgeQosReporterConfig),
}

/// Monitor-issued action limiting the buffer size of one output gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitBufferSizeAction {
    vertex: VertexId,
    output_gate: usize,
    buffer_size: u32,
}

impl LimitBufferSizeAction {
    pub fn new(vertex: VertexId, output_gate: usize, buffer_size: u32) -> Result<Self> {
        if buffer_size == 0 {
            return Err(anyhow!("buffer size must be greater than zero"));
        }
        Ok(Self {
            vertex,
            output_gate,
            buffer_size,
        })
    }

    pub fn vertex(&self) -> VertexId {
        self.vertex
    }

    pub fn output_gate(&self) -> usize {
        self.output_gate
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }
}
