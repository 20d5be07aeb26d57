//! Concurrency-limiting middleware for inbound messages.
//!
//! Caps the number of handlers executing at once. A message that arrives
//! while every permit is taken waits for one; nothing is shed, so every
//! request still gets its reply.

use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::Semaphore;
use tower::{Layer, Service};

use crate::service::inbound::{DispatchError, DispatchFuture, InboundMessage};

// ---------------------------------------------------------------------------
// ConcurrencyLayer
// ---------------------------------------------------------------------------

/// Tower layer that limits concurrent dispatches via a semaphore.
#[derive(Debug, Clone)]
pub struct ConcurrencyLayer {
    semaphore: Arc<Semaphore>,
}

impl ConcurrencyLayer {
    /// Creates a layer allowing `max_concurrent` dispatches at once (minimum 1).
    #[must_use]
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }
}

impl<S> Layer<S> for ConcurrencyLayer {
    type Service = ConcurrencyService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ConcurrencyService {
            inner,
            semaphore: Arc::clone(&self.semaphore),
        }
    }
}

// ---------------------------------------------------------------------------
// ConcurrencyService
// ---------------------------------------------------------------------------

/// Service wrapper that holds a semaphore permit for the whole dispatch.
#[derive(Debug, Clone)]
pub struct ConcurrencyService<S> {
    inner: S,
    semaphore: Arc<Semaphore>,
}

impl<S> ConcurrencyService<S> {
    /// The wrapped service.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Permits currently free.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

impl<S> Service<InboundMessage> for ConcurrencyService<S>
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
        let semaphore = Arc::clone(&self.semaphore);
        let fut = self.inner.call(inbound);
        Box::pin(async move {
            let permit = semaphore
                .acquire_owned()
                .await
                .map_err(|_| DispatchError::Closed)?;
            let result = fut.await;
            drop(permit);
            result
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use pktinject_core::JsonMessage;
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::traits::JsonSpeaker;

    struct NullSpeaker;

    #[async_trait]
    impl JsonSpeaker for NullSpeaker {
        fn id(&self) -> String {
            "null".to_string()
        }

        async fn send_message(&self, _message: JsonMessage) -> anyhow::Result<()> {
            Ok(())
        }
    }

    /// Sleeps, tracking the peak number of concurrent calls.
    #[derive(Clone)]
    struct SlowService {
        delay: Duration,
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl Service<InboundMessage> for SlowService {
        type Response = ();
        type Error = DispatchError;
        type Future = DispatchFuture;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _inbound: InboundMessage) -> Self::Future {
            let this = self.clone();
            Box::pin(async move {
                let now = this.running.fetch_add(1, Ordering::SeqCst) + 1;
                this.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(this.delay).await;
                this.running.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
        }
    }

    fn slow(delay_ms: u64) -> SlowService {
        SlowService {
            delay: Duration::from_millis(delay_ms),
            running: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn inbound() -> InboundMessage {
        InboundMessage::new(
            Arc::new(NullSpeaker),
            JsonMessage::new("ns", "Ping", &json!(null)).unwrap(),
        )
    }

    #[tokio::test]
    async fn allows_messages_under_limit() {
        let svc = ConcurrencyLayer::new(10).layer(slow(1));
        svc.oneshot(inbound()).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_a_permit_instead_of_rejecting() {
        let inner = slow(50);
        let peak = Arc::clone(&inner.peak);
        let svc = ConcurrencyLayer::new(2).layer(inner);

        let calls: Vec<_> = (0..6)
            .map(|_| {
                let svc = svc.clone();
                tokio::spawn(async move { svc.oneshot(inbound()).await })
            })
            .collect();

        for call in calls {
            call.await.unwrap().unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(svc.available_permits(), 2);
    }

    #[test]
    fn zero_limit_is_raised_to_one() {
        let svc = ConcurrencyLayer::new(0).layer(slow(1));
        assert_eq!(svc.available_permits(), 1);
    }
}
