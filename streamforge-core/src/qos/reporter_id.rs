//! Reporter identities for QoS-monitored graph elements.
//!
//! A reporter id is the join key between measurement records, reporter
//! configuration, and report aggregation. Two kinds exist: an edge reporter
//! watches one data channel between two physical vertices, a vertex reporter
//! watches one physical task between an input and an output gate.

use serde::{Deserialize, Serialize};

use crate::qos::wire::{WireReader, WireWriter};
use crate::types::VertexId;

/// Identity of a monitored data channel between two physical vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeReporterId {
    pub source_vertex: VertexId,
    pub output_gate: u32,
    pub target_vertex: VertexId,
    pub input_gate: u32,
}

impl EdgeReporterId {
    pub fn new(
        source_vertex: VertexId,
        output_gate: u32,
        target_vertex: VertexId,
        input_gate: u32,
    ) -> Self {
        Self {
            source_vertex,
            output_gate,
            target_vertex,
            input_gate,
        }
    }

    pub fn write(&self, out: &mut WireWriter) {
        out.write_u32(self.source_vertex);
        out.write_u32(self.output_gate);
        out.write_u32(self.target_vertex);
        out.write_u32(self.input_gate);
    }

    pub fn read(input: &mut WireReader<'_>) -> anyhow::Result<Self> {
        Ok(Self {
            source_vertex: input.read_u32()?,
            output_gate: input.read_u32()?,
            target_vertex: input.read_u32()?,
            input_gate: input.read_u32()?,
        })
    }
}

/// Identity of a monitored physical task.
///
/// Gate indices are -1 when the vertex sits at the start (no monitored input)
/// or end (no monitored output) of a constrained sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VertexReporterId {
    pub vertex: VertexId,
    pub input_gate: i32,
    pub output_gate: i32,
}

impl VertexReporterId {
    pub fn new(vertex: VertexId, input_gate: i32, output_gate: i32) -> Self {
        Self {
            vertex,
            input_gate,
            output_gate,
        }
    }

    pub fn write(&self, out: &mut WireWriter) {
        out.write_u32(self.vertex);
        out.write_i32(self.input_gate);
        out.write_i32(self.output_gate);
    }

    pub fn read(input: &mut WireReader<'_>) -> anyhow::Result<Self> {
        Ok(Self {
            vertex: input.read_u32()?,
            input_gate: input.read_i32()?,
            output_gate: input.read_i32()?,
        })
    }
}
