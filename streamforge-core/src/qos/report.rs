//! Batched QoS report message and the per-node collector that fills it.

use std::sync::Mutex;

use ahash::AHashMap;
use anyhow::{Result, anyhow};

use crate::qos::records::{EdgeLatency, EdgeStatistics, VertexStatistics};
use crate::qos::reporter_id::{EdgeReporterId, VertexReporterId};
use crate::qos::wire::{WireReader, WireWriter};

/// Batched QoS measurements, keyed by reporter id, to be shipped to the
/// central monitor in one message.
///
/// All three maps are allocated lazily: most reporting cycles on most nodes
/// produce nothing, and an untouched report should cost next to no memory.
/// Adding a second record for an already-present reporter id combines the two
/// per the record kind's rule instead of replacing the entry.
///
/// Wire format: three independently count-prefixed blocks in fixed order
/// (latencies, edge statistics, vertex statistics). Each block starts with a
/// 4-byte record count (0 for a never-created map), followed by that many
/// records, each led by its reporter id's own encoding.
#[derive(Debug, Default)]
pub struct QosReport {
    edge_latencies: Option<AHashMap<EdgeReporterId, EdgeLatency>>,
    edge_statistics: Option<AHashMap<EdgeReporterId, EdgeStatistics>>,
    vertex_statistics: Option<AHashMap<VertexReporterId, VertexStatistics>>,
}

impl QosReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_edge_latency(&mut self, latency: EdgeLatency) {
        let map = self.edge_latencies.get_or_insert_with(AHashMap::new);
        match map.get_mut(&latency.reporter_id()) {
            Some(existing) => existing.add(&latency),
            None => {
                map.insert(latency.reporter_id(), latency);
            }
        }
    }

    pub fn add_edge_statistics(&mut self, stats: EdgeStatistics) {
        let map = self.edge_statistics.get_or_insert_with(AHashMap::new);
        let fused = match map.get(&stats.reporter_id()) {
            Some(existing) => existing.fuse_with(&stats),
            None => stats,
        };
        map.insert(stats.reporter_id(), fused);
    }

    pub fn add_vertex_statistics(&mut self, stats: VertexStatistics) {
        let map = self.vertex_statistics.get_or_insert_with(AHashMap::new);
        let fused = match map.get(&stats.reporter_id()) {
            Some(existing) => existing.fuse_with(&stats),
            None => stats,
        };
        map.insert(stats.reporter_id(), fused);
    }

    /// Read-only view over the batched latencies. Never allocates.
    pub fn edge_latencies(&self) -> impl Iterator<Item = &EdgeLatency> {
        self.edge_latencies.iter().flat_map(|m| m.values())
    }

    /// Read-only view over the batched channel statistics. Never allocates.
    pub fn edge_statistics(&self) -> impl Iterator<Item = &EdgeStatistics> {
        self.edge_statistics.iter().flat_map(|m| m.values())
    }

    /// Read-only view over the batched vertex statistics. Never allocates.
    pub fn vertex_statistics(&self) -> impl Iterator<Item = &VertexStatistics> {
        self.vertex_statistics.iter().flat_map(|m| m.values())
    }

    /// True iff none of the three maps was ever created.
    pub fn is_empty(&self) -> bool {
        self.edge_latencies.is_none()
            && self.edge_statistics.is_none()
            && self.vertex_statistics.is_none()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = WireWriter::new();
        self.write_edge_latencies(&mut out);
        self.write_edge_statistics(&mut out);
        self.write_vertex_statistics(&mut out);
        out.into_bytes()
    }

    fn write_edge_latencies(&self, out: &mut WireWriter) {
        match &self.edge_latencies {
            Some(map) => {
                out.write_i32(map.len() as i32);
                for (id, latency) in map {
                    id.write(out);
                    out.write_f64(latency.latency_ms());
                }
            }
            None => out.write_i32(0),
        }
    }

    fn write_edge_statistics(&self, out: &mut WireWriter) {
        match &self.edge_statistics {
            Some(map) => {
                out.write_i32(map.len() as i32);
                for (id, stats) in map {
                    id.write(out);
                    out.write_f64(stats.throughput());
                    out.write_f64(stats.output_buffer_lifetime());
                    out.write_f64(stats.records_per_buffer());
                    out.write_f64(stats.records_per_second());
                }
            }
            None => out.write_i32(0),
        }
    }

    fn write_vertex_statistics(&self, out: &mut WireWriter) {
        match &self.vertex_statistics {
            Some(map) => {
                out.write_i32(map.len() as i32);
                for stats in map.values() {
                    stats.write(out);
                }
            }
            None => out.write_i32(0),
        }
    }

    /// Decode the exact mirror of [`encode`](Self::encode). Any truncation or
    /// negative count fails the whole message.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut input = WireReader::new(bytes);
        let mut report = QosReport::new();
        report.read_edge_latencies(&mut input)?;
        report.read_edge_statistics(&mut input)?;
        report.read_vertex_statistics(&mut input)?;
        Ok(report)
    }

    fn read_count(input: &mut WireReader<'_>, block: &str) -> Result<usize> {
        let count = input.read_i32()?;
        if count < 0 {
            return Err(anyhow!("negative {} record count: {}", block, count));
        }
        Ok(count as usize)
    }

    fn read_edge_latencies(&mut self, input: &mut WireReader<'_>) -> Result<()> {
        let count = Self::read_count(input, "edge latency")?;
        for _ in 0..count {
            let id = EdgeReporterId::read(input)?;
            let latency = EdgeLatency::new(id, input.read_f64()?);
            self.edge_latencies
                .get_or_insert_with(AHashMap::new)
                .insert(id, latency);
        }
        Ok(())
    }

    fn read_edge_statistics(&mut self, input: &mut WireReader<'_>) -> Result<()> {
        let count = Self::read_count(input, "edge statistics")?;
        for _ in 0..count {
            let id = EdgeReporterId::read(input)?;
            let stats = EdgeStatistics::new(
                id,
                input.read_f64()?,
                input.read_f64()?,
                input.read_f64()?,
                input.read_f64()?,
            );
            self.edge_statistics
                .get_or_insert_with(AHashMap::new)
                .insert(id, stats);
        }
        Ok(())
    }

    fn read_vertex_statistics(&mut self, input: &mut WireReader<'_>) -> Result<()> {
        let count = Self::read_count(input, "vertex statistics")?;
        for _ in 0..count {
            let stats = VertexStatistics::read(input)?;
            self.vertex_statistics
                .get_or_insert_with(AHashMap::new)
                .insert(stats.reporter_id(), stats);
        }
        Ok(())
    }
}

/// Shared accumulation point for one reporting interval.
///
/// Many measurement call sites on the same node add records concurrently;
/// the mutex makes each combine atomic per reporter id and keeps draining
/// exclusive with in-flight adds. [`drain`](Self::drain) swaps in a fresh
/// report so producers never block on the shipping path.
#[derive(Debug, Default)]
pub struct QosReportCollector {
    active: Mutex<QosReport>,
}

impl QosReportCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_edge_latency(&self, latency: EdgeLatency) {
        self.active
            .lock()
            .expect("qos report lock poisoned")
            .add_edge_latency(latency);
    }

    pub fn add_edge_statistics(&self, stats: EdgeStatistics) {
        self.active
            .lock()
            .expect("qos report lock poisoned")
            .add_edge_statistics(stats);
    }

    pub fn add_vertex_statistics(&self, stats: VertexStatistics) {
        self.active
            .lock()
            .expect("qos report lock poisoned")
            .add_vertex_statistics(stats);
    }

    /// Take the interval's report, leaving an empty one in place.
    pub fn drain(&self) -> QosReport {
        std::mem::take(&mut *self.active.lock().expect("qos report lock poisoned"))
    }
}

#[cfg(test)]
#[path = "tests/report_tests.rs"]
mod tests;
