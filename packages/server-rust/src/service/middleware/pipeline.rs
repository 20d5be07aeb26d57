//! Pipeline composition: wraps the speaker pool in the dispatch middleware.

use tower::ServiceBuilder;

use super::concurrency::{ConcurrencyLayer, ConcurrencyService};
use super::metrics::{MetricsLayer, MetricsService};
use crate::service::pool::SpeakerPool;

/// The full dispatch stack handed to every connection.
pub type DispatchPipeline = MetricsService<ConcurrencyService<SpeakerPool>>;

/// Build the dispatch pipeline around `pool`.
///
/// Layer order (outermost to innermost):
/// 1. `MetricsLayer` -- span, counter and latency (including permit wait)
/// 2. `ConcurrencyLayer` -- cap concurrently running handlers
///
/// The returned service is `Clone`; clones share the same permits.
#[must_use]
pub fn build_dispatch_pipeline(pool: SpeakerPool, max_concurrent: usize) -> DispatchPipeline {
    ServiceBuilder::new()
        .layer(MetricsLayer)
        .layer(ConcurrencyLayer::new(max_concurrent))
        .service(pool)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
