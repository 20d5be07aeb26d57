//! `/health` report and orchestrator checks.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use super::AppState;
use crate::network::HealthState;

/// Service snapshot as JSON. Always 200; read `state` for readiness.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let dispatch = state.pipeline.get_ref();
    Json(json!({
        "state": state.shutdown.health_state().as_str(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "connections": state.registry.count(),
        "namespaces": dispatch.get_ref().namespaces(),
        "in_flight_messages": state.shutdown.in_flight_count(),
        "available_dispatch_slots": dispatch.available_permits(),
        "active_injections": state.tracking.len(),
    }))
}

pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// 200 while `Ready`, 503 otherwise.
pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    match state.shutdown.health_state() {
        HealthState::Ready => StatusCode::OK,
        HealthState::Starting | HealthState::Draining | HealthState::Stopped => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use async_trait::async_trait;
    use pktinject_core::{JsonMessage, TrackingId, NAMESPACE};

    use super::*;
    use crate::network::{ConnectionRegistry, NetworkConfig, SessionConfig, ShutdownController};
    use crate::service::{build_dispatch_pipeline, SpeakerPool, TrackingRegistry};
    use crate::traits::{JsonMessageHandler, JsonSpeaker};

    struct SilentHandler;

    #[async_trait]
    impl JsonMessageHandler for SilentHandler {
        async fn on_message(&self, _speaker: Arc<dyn JsonSpeaker>, _message: JsonMessage) {}
    }

    fn app_state() -> AppState {
        let pool = SpeakerPool::new();
        pool.add_message_handler(Arc::new(SilentHandler), &[NAMESPACE])
            .unwrap();
        AppState {
            registry: Arc::new(ConnectionRegistry::new()),
            shutdown: Arc::new(ShutdownController::new()),
            config: Arc::new(NetworkConfig::default()),
            pipeline: build_dispatch_pipeline(pool, 4),
            tracking: Arc::new(TrackingRegistry::new()),
            start_time: Instant::now(),
        }
    }

    #[tokio::test]
    async fn report_describes_sessions_and_jobs() {
        let state = app_state();
        state.shutdown.set_ready();
        let (_conn, _rx) = state.registry.register(&SessionConfig::default());
        let _busy = state.shutdown.in_flight_guard();
        let (signal, _ticket) = state.tracking.issue(TrackingId::new("job-1"));
        state
            .tracking
            .register(TrackingId::new("job-1"), signal)
            .unwrap();

        let Json(report) = health_handler(State(state)).await;

        assert_eq!(report["state"], "ready");
        assert_eq!(report["connections"], 1);
        assert_eq!(report["namespaces"], json!([NAMESPACE]));
        assert_eq!(report["in_flight_messages"], 1);
        assert_eq!(report["available_dispatch_slots"], 4);
        assert_eq!(report["active_injections"], 1);
        assert!(report["uptime_secs"].is_u64());
    }

    async fn ready(state: &AppState) -> StatusCode {
        readiness_handler(State(state.clone())).await
    }

    #[tokio::test]
    async fn readiness_follows_the_lifecycle() {
        let state = app_state();
        assert_eq!(ready(&state).await, StatusCode::SERVICE_UNAVAILABLE);

        state.shutdown.set_ready();
        assert_eq!(ready(&state).await, StatusCode::OK);

        state.shutdown.trigger_shutdown();
        assert_eq!(ready(&state).await, StatusCode::SERVICE_UNAVAILABLE);
        let Json(report) = health_handler(State(state)).await;
        assert_eq!(report["state"], "draining");
    }

    #[tokio::test]
    async fn liveness_is_unconditional() {
        assert_eq!(liveness_handler().await, StatusCode::OK);
    }
}
