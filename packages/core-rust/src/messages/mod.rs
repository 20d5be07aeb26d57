//! Wire messages for the `pktinject` protocol.
//!
//! Every message travels inside a [`JsonMessage`] envelope carrying a
//! namespace, a type tag, a correlation UUID, and an opaque JSON payload.
//! Field names are `PascalCase` on the wire.

pub mod envelope;
pub mod injector;

pub use envelope::{JsonMessage, STATUS_BAD_REQUEST, STATUS_OK};
pub use injector::{message_types, PacketInjectionParams, PacketInjectorReply, PacketType, NAMESPACE};
