//! Cancellation handler: stop one in-flight job by tracking id.

use std::sync::Arc;

use pktinject_core::{JsonMessage, TrackingId};
use tracing::debug;

use super::error::InjectorError;
use super::tracking::TrackingRegistry;

/// Stops injection jobs on behalf of `StopRequest` messages.
pub struct CancellationHandler {
    tracking: Arc<TrackingRegistry>,
}

impl CancellationHandler {
    pub fn new(tracking: Arc<TrackingRegistry>) -> Self {
        Self { tracking }
    }

    /// Signals the job named by `message` and returns its id.
    ///
    /// Cancellation is advisory: this returns once the signal is handed
    /// over, without waiting for the job to wind down.
    ///
    /// # Errors
    ///
    /// `Decode` for a payload that is not a bare string, `UnknownTrackingId`
    /// if no stoppable job has that id.
    pub fn stop(&self, message: &JsonMessage) -> Result<TrackingId, InjectorError> {
        let tracking_id: TrackingId =
            message
                .decode_obj()
                .map_err(|source| InjectorError::Decode {
                    what: "stop request",
                    source,
                })?;

        let Some(signal) = self.tracking.take(tracking_id.as_str()) else {
            return Err(InjectorError::UnknownTrackingId(tracking_id));
        };

        if !signal.cancel() {
            debug!(tracking_id = %tracking_id, "injection ended before the stop was delivered");
        }
        Ok(tracking_id)
    }
}
