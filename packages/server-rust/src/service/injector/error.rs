use pktinject_core::TrackingId;

/// Failures reported back to the client in a `BadRequest` reply.
#[derive(Debug, thiserror::Error)]
pub enum InjectorError {
    /// The request payload did not decode; nothing was changed.
    #[error("Unable to decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    /// The engine refused or failed to start the job; nothing was registered.
    #[error("Failed to inject packet: {0:#}")]
    InjectionFailed(anyhow::Error),
    /// No stoppable job carries this id (finished, stopped, or never issued).
    #[error("No PI running on this ID: {0}")]
    UnknownTrackingId(TrackingId),
}

/// Rejected tracking registry insertions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackingError {
    #[error("tracking id already registered: {0}")]
    AlreadyRegistered(TrackingId),
    #[error("injection already finished: {0}")]
    JobFinished(TrackingId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_id_message_names_the_id() {
        let err = InjectorError::UnknownTrackingId(TrackingId::new("abc123"));
        assert_eq!(err.to_string(), "No PI running on this ID: abc123");
    }

    #[test]
    fn injection_failure_includes_cause_chain() {
        let cause = anyhow::anyhow!("socket refused").context("bind failed");
        let err = InjectorError::InjectionFailed(cause);
        assert_eq!(
            err.to_string(),
            "Failed to inject packet: bind failed: socket refused"
        );
    }

    #[test]
    fn decode_message_names_the_payload() {
        let source = serde_json::from_str::<String>("{").unwrap_err();
        let err = InjectorError::Decode {
            what: "stop request",
            source,
        };
        let text = err.to_string();
        assert!(text.starts_with("Unable to decode stop request: "));
    }
}
