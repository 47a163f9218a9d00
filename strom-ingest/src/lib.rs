pub mod config;
pub mod metrics_server;
pub mod observability;
pub mod pipeline;
pub mod sinks;
pub mod snapshot;
pub mod sources;
pub mod transform;

pub use pipeline::{Envelope, Pipeline};
