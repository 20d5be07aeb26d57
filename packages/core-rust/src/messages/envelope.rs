//! Request/reply envelope shared by every namespace.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reply status for a successfully handled request.
pub const STATUS_OK: u16 = 200;

/// Reply status for a request that could not be honored.
pub const STATUS_BAD_REQUEST: u16 = 400;

/// A structured message exchanged over a persistent connection.
///
/// Requests carry a `UUID` chosen by the sender; replies built with
/// [`JsonMessage::reply`] copy it so the sender can correlate them.
/// `Status` is zero (and omitted) on requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JsonMessage {
    pub namespace: String,
    #[serde(rename = "Type")]
    pub msg_type: String,
    #[serde(rename = "UUID", skip_serializing_if = "Option::is_none", default)]
    pub uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub obj: Option<Value>,
    #[serde(skip_serializing_if = "is_zero", default)]
    pub status: u16,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(status: &u16) -> bool {
    *status == 0
}

impl JsonMessage {
    /// Builds a request message without a correlation id.
    ///
    /// # Errors
    ///
    /// Returns an error if `obj` cannot be represented as JSON.
    pub fn new(
        namespace: impl Into<String>,
        msg_type: impl Into<String>,
        obj: &impl Serialize,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            namespace: namespace.into(),
            msg_type: msg_type.into(),
            uuid: None,
            obj: Some(serde_json::to_value(obj)?),
            status: 0,
        })
    }

    /// Sets the correlation id.
    #[must_use]
    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    /// Decodes the payload into `T`.
    ///
    /// A missing payload decodes as JSON `null`, so it fails for any `T`
    /// that requires a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload does not match `T`.
    pub fn decode_obj<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        match &self.obj {
            Some(value) => T::deserialize(value),
            None => T::deserialize(&Value::Null),
        }
    }

    /// Builds the reply to this message: same namespace and correlation id,
    /// the given reply type, payload, and status.
    ///
    /// # Errors
    ///
    /// Returns an error if `obj` cannot be represented as JSON.
    pub fn reply(
        &self,
        obj: &impl Serialize,
        msg_type: impl Into<String>,
        status: u16,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            namespace: self.namespace.clone(),
            msg_type: msg_type.into(),
            uuid: self.uuid.clone(),
            obj: Some(serde_json::to_value(obj)?),
            status,
        })
    }

    /// Returns `true` for a reply carrying a 2xx status.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
