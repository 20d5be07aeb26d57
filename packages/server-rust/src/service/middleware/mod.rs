//! Tower middleware layers for the dispatch pipeline.
//!
//! - [`metrics`]: Dispatch timing and counting via `tracing` spans and `metrics`
//! - [`concurrency`]: Semaphore-based concurrency limiting
//! - [`pipeline`]: Composes all layers around the speaker pool

pub mod concurrency;
pub mod metrics;
pub mod pipeline;

pub use concurrency::ConcurrencyLayer;
pub use metrics::MetricsLayer;
pub use pipeline::{build_dispatch_pipeline, DispatchPipeline};
