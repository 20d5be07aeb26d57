//! Reference injection engines.

pub mod udp;

pub use udp::{EngineError, UdpInjector};
