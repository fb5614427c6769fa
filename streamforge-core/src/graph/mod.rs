//! Logical graph, physical graph, and the compiler between them.

pub mod compiler;
pub mod job_graph;
pub mod sequence;
pub mod stream_graph;

pub use compiler::{JobGraphCompiler, build_job_graph};
pub use job_graph::{
    DistributionPattern, JobEdge, JobGraph, JobGraphSequence, JobVertex, LatencyConstraint,
    SequenceElement, TaskConfig,
};
pub use sequence::{ResolvedConstraint, SequenceFinder, StreamSequence, StreamSequenceElement};
pub use stream_graph::{
    ChainingStrategy, LatencyConstraintSpec, OperatorSpec, PartitionStrategy, StreamEdge,
    StreamGraph, StreamLoop, StreamNode, TaskKind,
};
