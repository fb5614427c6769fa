//! QoS-domain modules: reporter identities, measurement records, the batched
//! report message, reporter configuration, and the shipping loop.

pub mod config;
pub mod forwarder;
pub mod records;
pub mod report;
pub mod reporter_id;
pub mod wire;

pub use config::*;
pub use forwarder::*;
pub use records::*;
pub use report::*;
pub use reporter_id::*;
