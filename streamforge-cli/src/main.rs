use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Deserialize;
use streamforge_core::graph::{
    ChainingStrategy, OperatorSpec, PartitionStrategy, StreamGraph, TaskKind, build_job_graph,
};
use streamforge_core::qos::report::QosReport;
use streamforge_core::types::NodeId;

#[derive(Parser, Debug)]
#[command(name = "streamforge")]
#[command(about = "StreamForge job graph CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile a JSON topology into a deployable job graph.
    Compile {
        topology: PathBuf,
        /// Write the serialized plan here instead of only printing a summary.
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        job_name: Option<String>,
    },
    /// Decode a QoS report blob and print its records.
    InspectReport { report: PathBuf },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ChainingDto {
    Head,
    Always,
    Never,
}

impl From<ChainingDto> for ChainingStrategy {
    fn from(dto: ChainingDto) -> Self {
        match dto {
            ChainingDto::Head => ChainingStrategy::Head,
            ChainingDto::Always => ChainingStrategy::Always,
            ChainingDto::Never => ChainingStrategy::Never,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum PartitionerDto {
    Forward,
    Rebalance,
    Hash,
    Broadcast,
    Global,
}

impl From<PartitionerDto> for PartitionStrategy {
    fn from(dto: PartitionerDto) -> Self {
        match dto {
            PartitionerDto::Forward => PartitionStrategy::Forward,
            PartitionerDto::Rebalance => PartitionStrategy::Rebalance,
            PartitionerDto::Hash => PartitionStrategy::Hash,
            PartitionerDto::Broadcast => PartitionStrategy::Broadcast,
            PartitionerDto::Global => PartitionStrategy::Global,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum KindDto {
    Source,
    OneInput,
    IterationHead,
    IterationTail,
}

impl From<KindDto> for TaskKind {
    fn from(dto: KindDto) -> Self {
        match dto {
            KindDto::Source => TaskKind::Source,
            KindDto::OneInput => TaskKind::OneInput,
            KindDto::IterationHead => TaskKind::IterationHead,
            KindDto::IterationTail => TaskKind::IterationTail,
        }
    }
}

#[derive(Debug, Deserialize)]
struct NodeDto {
    name: String,
    #[serde(default = "default_parallelism")]
    parallelism: u32,
    kind: KindDto,
    /// User function registry id; iteration markers carry none.
    udf: Option<String>,
    #[serde(default = "default_chaining")]
    chaining: ChainingDto,
    #[serde(default = "default_buffer_timeout")]
    buffer_timeout_ms: i64,
    input_type: Option<String>,
    output_type: Option<String>,
    input_format: Option<String>,
}

fn default_parallelism() -> u32 {
    1
}

fn default_chaining() -> ChainingDto {
    ChainingDto::Always
}

fn default_buffer_timeout() -> i64 {
    -1
}

#[derive(Debug, Deserialize)]
struct EdgeDto {
    source: usize,
    target: usize,
    partitioner: PartitionerDto,
    #[serde(default)]
    selected_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LoopDto {
    head: usize,
    tail: usize,
    timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
struct ConstraintDto {
    begin: usize,
    end: usize,
    max_latency_ms: u64,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TopologyDto {
    name: String,
    #[serde(default = "default_chaining_enabled")]
    chaining: bool,
    #[serde(default)]
    checkpointing_interval_ms: Option<u64>,
    #[serde(default)]
    qos_report_interval_ms: Option<u64>,
    nodes: Vec<NodeDto>,
    #[serde(default)]
    edges: Vec<EdgeDto>,
    #[serde(default)]
    loops: Vec<LoopDto>,
    #[serde(default)]
    constraints: Vec<ConstraintDto>,
}

fn default_chaining_enabled() -> bool {
    true
}

impl TopologyDto {
    /// Materialize the declared topology; node references are indices into
    /// the `nodes` array.
    fn into_stream_graph(self) -> anyhow::Result<(String, StreamGraph)> {
        let mut graph = StreamGraph::new();
        graph.chaining_enabled = self.chaining;
        if let Some(interval) = self.checkpointing_interval_ms {
            graph.checkpointing_enabled = true;
            graph.checkpointing_interval_ms = interval;
        }
        if let Some(interval) = self.qos_report_interval_ms {
            graph.qos_report_interval_ms = interval;
        }

        let mut ids: Vec<NodeId> = Vec::with_capacity(self.nodes.len());
        for node in self.nodes {
            let operator = node
                .udf
                .map(|udf| OperatorSpec::new(udf, node.chaining.into()));
            let id = graph.add_node(node.name, node.parallelism, node.kind.into(), operator);
            {
                let stream_node = graph
                    .node_mut(id)
                    .ok_or_else(|| anyhow::anyhow!("node {} vanished after insertion", id))?;
                stream_node.buffer_timeout_ms = node.buffer_timeout_ms;
                stream_node.input_type = node.input_type;
                stream_node.output_type = node.output_type;
                stream_node.input_format = node.input_format;
            }
            ids.push(id);
        }

        let resolve = |index: usize| -> anyhow::Result<NodeId> {
            ids.get(index)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("node index {} out of range", index))
        };
        for edge in self.edges {
            let source = resolve(edge.source)?;
            let target = resolve(edge.target)?;
            graph.add_edge(source, target, edge.partitioner.into());
            if !edge.selected_names.is_empty() {
                if let Some(stream_edge) = graph.edges.last_mut() {
                    stream_edge.selected_names = edge.selected_names;
                }
            }
        }
        for stream_loop in self.loops {
            graph.add_loop(
                resolve(stream_loop.head)?,
                resolve(stream_loop.tail)?,
                stream_loop.timeout_ms,
            );
        }
        for constraint in self.constraints {
            graph.add_constraint(
                resolve(constraint.begin)?,
                resolve(constraint.end)?,
                constraint.max_latency_ms,
                constraint.name,
            );
        }
        Ok((self.name, graph))
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Compile {
            topology,
            out,
            job_name,
        } => {
            let text = std::fs::read_to_string(&topology)?;
            let dto: TopologyDto = serde_json::from_str(&text)?;
            let (declared_name, graph) = dto.into_stream_graph()?;
            let name = job_name.unwrap_or(declared_name);

            let job_graph = build_job_graph(&graph, &name)?;

            println!("job: {}", job_graph.name);
            println!("vertices: {}", job_graph.vertices.len());
            let mut vertex_ids: Vec<_> = job_graph.vertices.keys().copied().collect();
            vertex_ids.sort_unstable();
            for id in vertex_ids {
                let vertex = &job_graph.vertices[&id];
                let chained = job_graph
                    .task_configs
                    .get(&id)
                    .map(|c| c.chained_task_configs.len())
                    .unwrap_or(0);
                println!(
                    "  [{}] {:?} parallelism={} chained_operators={} inputs={}",
                    vertex.name,
                    vertex.kind,
                    vertex.parallelism,
                    chained,
                    vertex.inputs.len()
                );
            }
            if job_graph.custom_statistics_enabled {
                println!(
                    "constraints: {} (report interval {} ms)",
                    job_graph.constraints.len(),
                    job_graph.central_report_interval_ms
                );
                for constraint in &job_graph.constraints {
                    println!("  {} <= {} ms", constraint.name, constraint.max_latency_ms);
                }
            }

            if let Some(path) = out {
                std::fs::write(&path, job_graph.to_bytes()?)?;
                println!("plan written to {}", path.display());
            }
        }
        Commands::InspectReport { report } => {
            let bytes = std::fs::read(&report)?;
            let report = QosReport::decode(&bytes)?;

            for latency in report.edge_latencies() {
                println!(
                    "edge latency {:?}: {:.3} ms",
                    latency.reporter_id(),
                    latency.latency_ms()
                );
            }
            for stats in report.edge_statistics() {
                println!(
                    "edge stats {:?}: throughput={:.1} obl={:.3} rpb={:.2} rps={:.1}",
                    stats.reporter_id(),
                    stats.throughput(),
                    stats.output_buffer_lifetime(),
                    stats.records_per_buffer(),
                    stats.records_per_second()
                );
            }
            for stats in report.vertex_statistics() {
                println!(
                    "vertex stats {:?}: latency={:.3} ms consumed/s={:.1} emitted/s={:.1}",
                    stats.reporter_id(),
                    stats.vertex_latency(),
                    stats.records_consumed_per_second(),
                    stats.records_emitted_per_second()
                );
            }
            if report.is_empty() {
                println!("report is empty");
            }
        }
    }
    Ok(())
}
