//! Metrics middleware for inbound messages.
//!
//! Wraps each dispatch in a `tracing` span and records a counter and a
//! latency histogram through the `metrics` facade.

use std::task::{Context, Poll};
use std::time::Instant;

use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::service::inbound::{DispatchError, DispatchFuture, InboundMessage};

pub const MESSAGES_TOTAL: &str = "pktinject_messages_total";
pub const MESSAGE_DURATION_SECONDS: &str = "pktinject_message_duration_seconds";

const UNROUTED: &str = "unrouted";

// ---------------------------------------------------------------------------
// MetricsLayer
// ---------------------------------------------------------------------------

/// Tower layer that instruments dispatches with timing and counting.
#[derive(Debug, Clone)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

// ---------------------------------------------------------------------------
// MetricsService
// ---------------------------------------------------------------------------

/// Service wrapper that records dispatch duration and outcome.
#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
}

impl<S> MetricsService<S> {
    /// The wrapped service.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}

impl<S> Service<InboundMessage> for MetricsService<S>
where
    S: Service<InboundMessage, Response = (), Error = DispatchError> + Send,
    S::Future: Send + 'static,
{
    type Response = ();
    type Error = DispatchError;
    type Future = DispatchFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, inbound: InboundMessage) -> Self::Future {
        let namespace = inbound.message.namespace.clone();
        let msg_type = inbound.message.msg_type.clone();
        let call_id = inbound.call_id;

        let span = info_span!(
            "dispatch",
            namespace = %namespace,
            msg_type = %msg_type,
            call_id,
            connection = %inbound.speaker.id(),
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let fut = self.inner.call(inbound);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;
                let elapsed = start.elapsed();

                let outcome = match &result {
                    Ok(()) => "ok",
                    Err(DispatchError::UnknownNamespace { .. }) => UNROUTED,
                    Err(_) => "error",
                };
                // Client-chosen namespaces that nothing handles share one label.
                let label = if outcome == UNROUTED {
                    UNROUTED.to_string()
                } else {
                    namespace
                };

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = elapsed.as_millis() as u64;
                tracing::Span::current().record("duration_ms", duration_ms);
                tracing::Span::current().record("outcome", outcome);
                tracing::debug!(duration_ms, outcome, "message dispatched");

                metrics::counter!(MESSAGES_TOTAL, "namespace" => label.clone(), "outcome" => outcome)
                    .increment(1);
                metrics::histogram!(MESSAGE_DURATION_SECONDS, "namespace" => label)
                    .record(elapsed.as_secs_f64());

                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
