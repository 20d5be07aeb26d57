//! `pktinject` core: wire envelope, packet injection messages, and topology contracts.

pub mod messages;
pub mod topology;
pub mod types;

pub use messages::{
    message_types, JsonMessage, PacketInjectionParams, PacketInjectorReply, PacketType, NAMESPACE,
    STATUS_BAD_REQUEST, STATUS_OK,
};
pub use topology::{Node, TopologyGraph};
pub use types::TrackingId;

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
