use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier of one injection job.
///
/// Issued by the injection engine when a job starts. Serializes as a bare
/// JSON string, which is also the payload of a stop request.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TrackingId(String);

impl TrackingId {
    /// Wraps an engine-issued identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the identifier, returning the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for TrackingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TrackingId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for TrackingId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl Borrow<str> for TrackingId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn serializes_as_bare_string() {
        let id = TrackingId::new("abc123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc123\"");

        let decoded: TrackingId = serde_json::from_str("\"abc123\"").unwrap();
        assert_eq!(decoded, id);
    }

    #[test]
    fn rejects_non_string_payload() {
        assert!(serde_json::from_str::<TrackingId>("42").is_err());
        let object = serde_json::from_str::<TrackingId>(r#"{"id":"x"}"#);
        assert!(object.is_err());
    }

    #[test]
    fn hash_map_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(TrackingId::new("job-1"), 1);
        assert_eq!(map.get("job-1"), Some(&1));
        assert!(map.get("job-2").is_none());
    }

    #[test]
    fn display_is_raw_value() {
        assert_eq!(TrackingId::from("xyz").to_string(), "xyz");
    }
}
