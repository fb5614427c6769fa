//! # StreamForge Core
//!
//! Compile-time planning for distributed stream jobs.
//!
//! This crate turns a logical dataflow graph into a deployable physical plan
//! and configures the QoS monitoring overlay on top of it:
//!
//! - [`graph`] — Logical [`StreamGraph`](graph::StreamGraph), the
//!   [`JobGraphCompiler`](graph::JobGraphCompiler) that chains operators into
//!   physical vertices, and the physical [`JobGraph`](graph::JobGraph) it
//!   produces, including woven latency constraints.
//! - [`qos`] — QoS reporter identities, measurement records, the batched
//!   [`QosReport`](qos::QosReport) wire message, and the per-node collector
//!   and forwarder used at runtime.
//! - [`types`] — Shared id types.
//! - [`error`] — The compiler's fatal error taxonomy.

pub mod error;
pub mod graph;
pub mod qos;
pub mod types;
