//! Measurement records shipped inside a [`QosReport`](crate::qos::QosReport).
//!
//! Each record kind carries its own combine rule, applied when two records
//! for the same reporter id meet in one report: edge latencies accumulate in
//! place via [`EdgeLatency::add`], while the statistics kinds produce a new
//! fused record via `fuse_with`. The asymmetry is part of the protocol.

use crate::qos::reporter_id::{EdgeReporterId, VertexReporterId};
use crate::qos::wire::{WireReader, WireWriter};

/// Accumulated latency measured on one monitored channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeLatency {
    reporter_id: EdgeReporterId,
    latency_ms: f64,
}

impl EdgeLatency {
    pub fn new(reporter_id: EdgeReporterId, latency_ms: f64) -> Self {
        Self {
            reporter_id,
            latency_ms,
        }
    }

    pub fn reporter_id(&self) -> EdgeReporterId {
        self.reporter_id
    }

    pub fn latency_ms(&self) -> f64 {
        self.latency_ms
    }

    /// Accumulate another measurement into this one. Repeated adds sum up,
    /// they do not overwrite.
    pub fn add(&mut self, other: &EdgeLatency) {
        self.latency_ms += other.latency_ms;
    }
}

/// Channel statistics sampled on one monitored channel.
///
/// Internally keeps per-sample sums plus a sample counter so that
/// [`fuse_with`](Self::fuse_with) is commutative and associative; the public
/// accessors expose the four mean values that also go on the wire. Equality
/// compares the observable means, not the internal sums.
#[derive(Debug, Clone, Copy)]
pub struct EdgeStatistics {
    reporter_id: EdgeReporterId,
    counter: u32,
    throughput_sum: f64,
    output_buffer_lifetime_sum: f64,
    records_per_buffer_sum: f64,
    records_per_second_sum: f64,
}

impl EdgeStatistics {
    pub fn new(
        reporter_id: EdgeReporterId,
        throughput: f64,
        output_buffer_lifetime: f64,
        records_per_buffer: f64,
        records_per_second: f64,
    ) -> Self {
        Self {
            reporter_id,
            counter: 1,
            throughput_sum: throughput,
            output_buffer_lifetime_sum: output_buffer_lifetime,
            records_per_buffer_sum: records_per_buffer,
            records_per_second_sum: records_per_second,
        }
    }

    pub fn reporter_id(&self) -> EdgeReporterId {
        self.reporter_id
    }

    pub fn throughput(&self) -> f64 {
        self.throughput_sum / self.counter as f64
    }

    pub fn output_buffer_lifetime(&self) -> f64 {
        self.output_buffer_lifetime_sum / self.counter as f64
    }

    pub fn records_per_buffer(&self) -> f64 {
        self.records_per_buffer_sum / self.counter as f64
    }

    pub fn records_per_second(&self) -> f64 {
        self.records_per_second_sum / self.counter as f64
    }

    /// Combine two records for the same channel into a new one. Neither
    /// input is mutated; the result replaces the map entry.
    pub fn fuse_with(&self, other: &EdgeStatistics) -> EdgeStatistics {
        EdgeStatistics {
            reporter_id: self.reporter_id,
            counter: self.counter + other.counter,
            throughput_sum: self.throughput_sum + other.throughput_sum,
            output_buffer_lifetime_sum: self.output_buffer_lifetime_sum
                + other.output_buffer_lifetime_sum,
            records_per_buffer_sum: self.records_per_buffer_sum + other.records_per_buffer_sum,
            records_per_second_sum: self.records_per_second_sum + other.records_per_second_sum,
        }
    }
}

impl PartialEq for EdgeStatistics {
    fn eq(&self, other: &Self) -> bool {
        self.reporter_id == other.reporter_id
            && self.throughput() == other.throughput()
            && self.output_buffer_lifetime() == other.output_buffer_lifetime()
            && self.records_per_buffer() == other.records_per_buffer()
            && self.records_per_second() == other.records_per_second()
    }
}

/// Task-level statistics sampled on one monitored vertex.
///
/// Unlike the edge record kinds, this record serializes itself: the report
/// treats its field layout as opaque beyond the reporter id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexStatistics {
    reporter_id: VertexReporterId,
    counter: u32,
    vertex_latency_sum: f64,
    records_consumed_per_second_sum: f64,
    records_emitted_per_second_sum: f64,
}

impl VertexStatistics {
    pub fn new(
        reporter_id: VertexReporterId,
        vertex_latency: f64,
        records_consumed_per_second: f64,
        records_emitted_per_second: f64,
    ) -> Self {
        Self {
            reporter_id,
            counter: 1,
            vertex_latency_sum: vertex_latency,
            records_consumed_per_second_sum: records_consumed_per_second,
            records_emitted_per_second_sum: records_emitted_per_second,
        }
    }

    pub fn reporter_id(&self) -> VertexReporterId {
        self.reporter_id
    }

    pub fn vertex_latency(&self) -> f64 {
        self.vertex_latency_sum / self.counter as f64
    }

    pub fn records_consumed_per_second(&self) -> f64 {
        self.records_consumed_per_second_sum / self.counter as f64
    }

    pub fn records_emitted_per_second(&self) -> f64 {
        self.records_emitted_per_second_sum / self.counter as f64
    }

    /// Combine two records for the same vertex into a new one.
    pub fn fuse_with(&self, other: &VertexStatistics) -> VertexStatistics {
        VertexStatistics {
            reporter_id: self.reporter_id,
            counter: self.counter + other.counter,
            vertex_latency_sum: self.vertex_latency_sum + other.vertex_latency_sum,
            records_consumed_per_second_sum: self.records_consumed_per_second_sum
                + other.records_consumed_per_second_sum,
            records_emitted_per_second_sum: self.records_emitted_per_second_sum
                + other.records_emitted_per_second_sum,
        }
    }

    pub fn write(&self, out: &mut WireWriter) {
        self.reporter_id.write(out);
        out.write_u32(self.counter);
        out.write_f64(self.vertex_latency_sum);
        out.write_f64(self.records_consumed_per_second_sum);
        out.write_f64(self.records_emitted_per_second_sum);
    }

    pub fn read(input: &mut WireReader<'_>) -> anyhow::Result<Self> {
        Ok(Self {
            reporter_id: VertexReporterId::read(input)?,
            counter: input.read_u32()?,
            vertex_latency_sum: input.read_f64()?,
            records_consumed_per_second_sum: input.read_f64()?,
            records_emitted_per_second_sum: input.read_f64()?,
        })
    }
}
