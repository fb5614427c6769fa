/// Unique identifier for logical graph nodes.
pub type NodeId = u32;

/// Unique identifier for physical job vertices.
pub type VertexId = u32;

/// Unique identifier for an intermediate data set produced by a job vertex.
///
/// One data set is created per physical edge at connect time; its position
/// among the producer's data sets is the output gate index.
pub type DataSetId = u64;

/// Unique identifier for a feedback loop in the logical graph.
pub type LoopId = u32;
