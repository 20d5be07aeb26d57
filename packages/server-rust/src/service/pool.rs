//! Speaker pool: routes inbound envelopes to handlers by `Namespace`.

use std::collections::HashMap;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::RwLock;
use tower::Service;

use super::inbound::{DispatchError, DispatchFuture, InboundMessage};
use crate::traits::JsonMessageHandler;

type HandlerTable = HashMap<String, Arc<dyn JsonMessageHandler>>;

// ---------------------------------------------------------------------------
// SpeakerPool
// ---------------------------------------------------------------------------

/// Namespace → handler table shared by every connection.
///
/// Each namespace has at most one handler. Cloning the pool is cheap and all
/// clones see the same table.
#[derive(Clone, Default)]
pub struct SpeakerPool {
    handlers: Arc<RwLock<HandlerTable>>,
}

impl SpeakerPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for every namespace in `namespaces`.
    ///
    /// Registration is all-or-nothing: if any namespace is already taken,
    /// nothing is inserted.
    ///
    /// # Errors
    ///
    /// `DispatchError::NamespaceTaken` naming the first conflicting namespace.
    pub fn add_message_handler(
        &self,
        handler: Arc<dyn JsonMessageHandler>,
        namespaces: &[&str],
    ) -> Result<(), DispatchError> {
        let mut table = self.handlers.write();
        if let Some(taken) = namespaces.iter().find(|ns| table.contains_key(**ns)) {
            return Err(DispatchError::NamespaceTaken {
                namespace: (*taken).to_string(),
            });
        }
        for namespace in namespaces {
            table.insert((*namespace).to_string(), Arc::clone(&handler));
        }
        Ok(())
    }

    #[must_use]
    pub fn handler(&self, namespace: &str) -> Option<Arc<dyn JsonMessageHandler>> {
        self.handlers.read().get(namespace).cloned()
    }

    /// Registered namespaces, sorted.
    #[must_use]
    pub fn namespaces(&self) -> Vec<String> {
        let mut namespaces: Vec<String> = self.handlers.read().keys().cloned().collect();
        namespaces.sort_unstable();
        namespaces
    }
}

impl std::fmt::Debug for SpeakerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeakerPool")
            .field("namespaces", &self.namespaces())
            .finish()
    }
}

impl Service<InboundMessage> for SpeakerPool {
    type Response = ();
    type Error = DispatchError;
    type Future = DispatchFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, inbound: InboundMessage) -> Self::Future {
        let handler = self.handler(inbound.namespace());
        Box::pin(async move {
            let Some(handler) = handler else {
                return Err(DispatchError::UnknownNamespace {
                    namespace: inbound.message.namespace,
                });
            };
            handler.on_message(inbound.speaker, inbound.message).await;
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
