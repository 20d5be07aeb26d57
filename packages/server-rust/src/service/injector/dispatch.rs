//! Injection dispatcher: decode, start the engine, register the job.

use std::sync::Arc;

use pktinject_core::{JsonMessage, PacketInjectionParams, TopologyGraph, TrackingId};
use tracing::debug;

use super::error::{InjectorError, TrackingError};
use super::tracking::TrackingRegistry;
use crate::traits::{InjectionHandle, PacketInjector};

/// Starts injection jobs on behalf of `InjectRequest` messages.
pub struct InjectionDispatcher {
    graph: Arc<dyn TopologyGraph>,
    engine: Arc<dyn PacketInjector>,
    tracking: Arc<TrackingRegistry>,
}

impl InjectionDispatcher {
    pub fn new(
        graph: Arc<dyn TopologyGraph>,
        engine: Arc<dyn PacketInjector>,
        tracking: Arc<TrackingRegistry>,
    ) -> Self {
        Self {
            graph,
            engine,
            tracking,
        }
    }

    /// Starts the job described by `message` and returns its tracking id.
    ///
    /// The job is registered before this returns, so a stop request sent
    /// after the reply always finds it (unless the job already finished).
    ///
    /// # Errors
    ///
    /// `Decode` for a malformed payload, `InjectionFailed` if the engine
    /// fails or hands back an id that is already in use.
    pub async fn dispatch(&self, message: &JsonMessage) -> Result<TrackingId, InjectorError> {
        let params: PacketInjectionParams =
            message
                .decode_obj()
                .map_err(|source| InjectorError::Decode {
                    what: "packet inject param message",
                    source,
                })?;

        let InjectionHandle {
            tracking_id,
            signal,
        } = self
            .engine
            .inject(params, Arc::clone(&self.graph), Arc::clone(&self.tracking))
            .await
            .map_err(InjectorError::InjectionFailed)?;

        match self.tracking.register(tracking_id.clone(), signal) {
            Ok(()) => {}
            Err(TrackingError::JobFinished(id)) => {
                debug!(tracking_id = %id, "injection finished before registration");
            }
            Err(err @ TrackingError::AlreadyRegistered(_)) => {
                return Err(InjectorError::InjectionFailed(err.into()));
            }
        }

        Ok(tracking_id)
    }
}
