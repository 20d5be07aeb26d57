use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use pktinject_core::JsonMessage;

use crate::traits::JsonSpeaker;

static NEXT_CALL_ID: AtomicU64 = AtomicU64::new(1);

/// Future returned by every service in the dispatch pipeline.
pub type DispatchFuture = Pin<Box<dyn Future<Output = Result<(), DispatchError>> + Send>>;

/// One decoded envelope travelling through the dispatch pipeline, together
/// with the speaker that replies should go back to.
pub struct InboundMessage {
    /// Process-unique id used to correlate log lines for this message.
    pub call_id: u64,
    pub speaker: Arc<dyn JsonSpeaker>,
    pub message: JsonMessage,
}

impl InboundMessage {
    #[must_use]
    pub fn new(speaker: Arc<dyn JsonSpeaker>, message: JsonMessage) -> Self {
        Self {
            call_id: NEXT_CALL_ID.fetch_add(1, Ordering::Relaxed),
            speaker,
            message,
        }
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.message.namespace
    }
}

impl fmt::Debug for InboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundMessage")
            .field("call_id", &self.call_id)
            .field("speaker", &self.speaker.id())
            .field("namespace", &self.message.namespace)
            .field("msg_type", &self.message.msg_type)
            .finish()
    }
}

/// Errors raised while routing a message to its namespace handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("no handler registered for namespace: {namespace}")]
    UnknownNamespace { namespace: String },
    #[error("namespace already has a handler: {namespace}")]
    NamespaceTaken { namespace: String },
    #[error("dispatch pipeline is closed")]
    Closed,
}
