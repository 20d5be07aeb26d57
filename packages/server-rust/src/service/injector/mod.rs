//! Packet injection control service.
//!
//! Registered on the speaker pool as the exclusive handler of the
//! `Packet_Injector` namespace:
//!
//! - `InjectRequest` → [`InjectionDispatcher`] → `InjectResult`
//! - `StopRequest` → [`CancellationHandler`] → `StopResult`
//!
//! Every recognized request produces exactly one correlated reply, with
//! status 200 on success and 400 plus an error string on failure. Other
//! message types are ignored.

pub mod cancel;
pub mod dispatch;
pub mod error;
pub mod tracking;

pub use cancel::CancellationHandler;
pub use dispatch::InjectionDispatcher;
pub use error::{InjectorError, TrackingError};
pub use tracking::{CancellationSignal, JobTicket, TrackingRegistry};

use std::sync::Arc;

use async_trait::async_trait;
use pktinject_core::{
    message_types, JsonMessage, PacketInjectorReply, TopologyGraph, NAMESPACE, STATUS_BAD_REQUEST,
    STATUS_OK,
};
use tracing::{debug, error, info, warn};

use crate::service::inbound::DispatchError;
use crate::service::pool::SpeakerPool;
use crate::service::lifecycle::{ManagedService, ServiceContext};
use crate::traits::{JsonMessageHandler, JsonSpeaker, PacketInjector};

/// Lifecycle name of the service.
pub const SERVICE_NAME: &str = "packet_injector";

/// Routes packet injector messages and owns the tracking registry.
pub struct PacketInjectorServer {
    dispatcher: InjectionDispatcher,
    cancellation: CancellationHandler,
    tracking: Arc<TrackingRegistry>,
}

impl PacketInjectorServer {
    /// Creates the service and registers it on `pool` for [`NAMESPACE`].
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::NamespaceTaken` if another handler already
    /// owns the namespace.
    pub fn new(
        graph: Arc<dyn TopologyGraph>,
        engine: Arc<dyn PacketInjector>,
        pool: &SpeakerPool,
    ) -> Result<Arc<Self>, DispatchError> {
        let tracking = Arc::new(TrackingRegistry::new());
        let server = Arc::new(Self {
            dispatcher: InjectionDispatcher::new(graph, engine, Arc::clone(&tracking)),
            cancellation: CancellationHandler::new(Arc::clone(&tracking)),
            tracking,
        });
        pool.add_message_handler(
            Arc::clone(&server) as Arc<dyn JsonMessageHandler>,
            &[NAMESPACE],
        )?;
        Ok(server)
    }

    /// The registry of stoppable jobs, shared with engines.
    #[must_use]
    pub fn tracking(&self) -> Arc<TrackingRegistry> {
        Arc::clone(&self.tracking)
    }

    /// Handles one message and builds its reply.
    ///
    /// Returns `None` for message types this service does not answer.
    pub async fn handle(&self, message: &JsonMessage) -> Option<JsonMessage> {
        let (reply_type, outcome) = match message.msg_type.as_str() {
            message_types::INJECT_REQUEST => (
                message_types::INJECT_RESULT,
                self.dispatcher
                    .dispatch(message)
                    .await
                    .map(PacketInjectorReply::injected),
            ),
            message_types::STOP_REQUEST => (
                message_types::STOP_RESULT,
                self.cancellation
                    .stop(message)
                    .map(|_| PacketInjectorReply::stopped()),
            ),
            other => {
                debug!(msg_type = other, "ignoring message");
                return None;
            }
        };

        let (obj, status) = match outcome {
            Ok(reply) => (reply, STATUS_OK),
            Err(err) => {
                log_failure(message, &err);
                let obj = if reply_type == message_types::INJECT_RESULT {
                    PacketInjectorReply::injection_failed(err.to_string())
                } else {
                    PacketInjectorReply::failed(err.to_string())
                };
                (obj, STATUS_BAD_REQUEST)
            }
        };

        match message.reply(&obj, reply_type, status) {
            Ok(reply) => Some(reply),
            Err(err) => {
                error!(error = %err, reply_type, "failed to encode reply");
                None
            }
        }
    }
}

fn log_failure(message: &JsonMessage, err: &InjectorError) {
    let uuid = message.uuid.as_deref().unwrap_or_default();
    match err {
        InjectorError::Decode { .. } => warn!(uuid, error = %err, "malformed request"),
        InjectorError::InjectionFailed(_) => error!(uuid, error = %err, "injection failed"),
        InjectorError::UnknownTrackingId(id) => {
            debug!(uuid, tracking_id = %id, "stop requested for unknown injection");
        }
    }
}

#[async_trait]
impl JsonMessageHandler for PacketInjectorServer {
    async fn on_message(&self, speaker: Arc<dyn JsonSpeaker>, message: JsonMessage) {
        let Some(reply) = self.handle(&message).await else {
            return;
        };
        if let Err(err) = speaker.send_message(reply).await {
            warn!(connection = %speaker.id(), error = %err, "failed to deliver reply");
        }
    }
}

#[async_trait]
impl ManagedService for PacketInjectorServer {
    fn name(&self) -> &'static str {
        SERVICE_NAME
    }

    async fn init(&self, ctx: &ServiceContext) -> anyhow::Result<()> {
        info!(node_id = %ctx.config.node_id, namespace = NAMESPACE, "packet injector ready");
        Ok(())
    }

    async fn shutdown(&self, _terminate: bool) -> anyhow::Result<()> {
        let cancelled = self.tracking.cancel_all();
        if cancelled > 0 {
            info!(cancelled, "stopped in-flight injections");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
