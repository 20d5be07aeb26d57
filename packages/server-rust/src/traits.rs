use std::sync::Arc;

use async_trait::async_trait;
use pktinject_core::{JsonMessage, PacketInjectionParams, TopologyGraph, TrackingId};

use crate::service::injector::{CancellationSignal, TrackingRegistry};

/// One end of a persistent connection that can carry JSON envelopes.
#[async_trait]
pub trait JsonSpeaker: Send + Sync {
    /// Stable identifier of the connection, for logging.
    fn id(&self) -> String;

    /// Queue a message for delivery to the peer.
    async fn send_message(&self, message: JsonMessage) -> anyhow::Result<()>;
}

/// Receives every inbound message on the namespaces it registered for.
///
/// Invocations run concurrently; implementations must not assume any
/// ordering between two messages.
#[async_trait]
pub trait JsonMessageHandler: Send + Sync {
    async fn on_message(&self, speaker: Arc<dyn JsonSpeaker>, message: JsonMessage);
}

/// A started injection job as reported by the engine.
#[derive(Debug)]
pub struct InjectionHandle {
    /// Identifier the client will use to stop the job.
    pub tracking_id: TrackingId,
    /// Signal that asks the job to stop; handed to the tracking registry.
    pub signal: CancellationSignal,
}

/// Packet crafting and sending engine.
///
/// `inject` must return as soon as the job is scheduled; the packets are
/// sent from a separate task. The engine obtains the signal/ticket pair
/// from [`TrackingRegistry::issue`], keeps the ticket inside the running job
/// (dropping it on completion clears the registry entry), and returns the
/// signal in the [`InjectionHandle`].
#[async_trait]
pub trait PacketInjector: Send + Sync {
    async fn inject(
        &self,
        params: PacketInjectionParams,
        graph: Arc<dyn TopologyGraph>,
        tracker: Arc<TrackingRegistry>,
    ) -> anyhow::Result<InjectionHandle>;
}
