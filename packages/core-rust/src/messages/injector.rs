//! Packet injector namespace: request parameters and reply payloads.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::types::TrackingId;

/// Namespace the packet injector service registers on the transport.
pub const NAMESPACE: &str = "Packet_Injector";

/// Message type tags used within [`NAMESPACE`].
pub mod message_types {
    /// Start an injection; payload is `PacketInjectionParams`.
    pub const INJECT_REQUEST: &str = "InjectRequest";
    /// Reply to [`INJECT_REQUEST`].
    pub const INJECT_RESULT: &str = "InjectResult";
    /// Stop an injection; payload is a bare tracking id string.
    pub const STOP_REQUEST: &str = "StopRequest";
    /// Reply to [`STOP_REQUEST`].
    pub const STOP_RESULT: &str = "StopResult";
}

/// Shape of the packets an injection produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketType {
    Icmp4,
    Icmp6,
    Tcp4,
    Tcp6,
    Udp4,
    Udp6,
}

impl PacketType {
    /// Returns `true` for the IPv6 variants.
    #[must_use]
    pub fn is_ipv6(self) -> bool {
        matches!(self, Self::Icmp6 | Self::Tcp6 | Self::Udp6)
    }

    /// Wire name of the packet type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Icmp4 => "icmp4",
            Self::Icmp6 => "icmp6",
            Self::Tcp4 => "tcp4",
            Self::Tcp6 => "tcp6",
            Self::Udp4 => "udp4",
            Self::Udp6 => "udp6",
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of one injection job.
///
/// `src` and `dst` reference topology nodes; explicit addresses and ports
/// override whatever the engine would derive from those nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PacketInjectionParams {
    pub src: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dst: Option<String>,
    #[serde(rename = "SrcIP", skip_serializing_if = "Option::is_none", default)]
    pub src_ip: Option<IpAddr>,
    #[serde(rename = "DstIP", skip_serializing_if = "Option::is_none", default)]
    pub dst_ip: Option<IpAddr>,
    #[serde(rename = "SrcMAC", skip_serializing_if = "Option::is_none", default)]
    pub src_mac: Option<String>,
    #[serde(rename = "DstMAC", skip_serializing_if = "Option::is_none", default)]
    pub dst_mac: Option<String>,
    #[serde(default)]
    pub src_port: u16,
    #[serde(default)]
    pub dst_port: u16,
    #[serde(rename = "Type")]
    pub packet_type: PacketType,
    #[serde(default = "default_count")]
    pub count: u64,
    /// Delay between two packets, in milliseconds.
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub payload: Option<String>,
    #[serde(rename = "TTL", skip_serializing_if = "Option::is_none", default)]
    pub ttl: Option<u8>,
}

fn default_count() -> u64 {
    1
}

fn default_interval() -> u64 {
    1000
}

impl PacketInjectionParams {
    /// Minimal parameters: one packet of `packet_type` from node `src`.
    pub fn new(src: impl Into<String>, packet_type: PacketType) -> Self {
        Self {
            src: src.into(),
            dst: None,
            src_ip: None,
            dst_ip: None,
            src_mac: None,
            dst_mac: None,
            src_port: 0,
            dst_port: 0,
            packet_type,
            count: default_count(),
            interval: default_interval(),
            payload: None,
            ttl: None,
        }
    }
}

/// Reply payload for both `InjectResult` and `StopResult`.
///
/// Stop replies never carry a tracking id. Inject replies always do, empty
/// when the injection failed. Failed replies carry the error's display string.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PacketInjectorReply {
    #[serde(
        rename = "TrackingID",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub tracking_id: Option<TrackingId>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl PacketInjectorReply {
    /// Successful inject reply.
    #[must_use]
    pub fn injected(tracking_id: TrackingId) -> Self {
        Self {
            tracking_id: Some(tracking_id),
            error: None,
        }
    }

    /// Successful stop reply.
    #[must_use]
    pub fn stopped() -> Self {
        Self::default()
    }

    /// Failed inject reply: an empty tracking id plus `error`.
    #[must_use]
    pub fn injection_failed(error: impl Into<String>) -> Self {
        Self {
            tracking_id: Some(TrackingId::new("")),
            error: Some(error.into()),
        }
    }

    /// Failed stop reply carrying `error`.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            tracking_id: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use serde_json::json;

    use super::*;

    #[test]
    fn params_defaults_applied() {
        let params: PacketInjectionParams =
            serde_json::from_value(json!({"Src": "node-a", "Type": "udp4"})).unwrap();

        assert_eq!(
            params,
            PacketInjectionParams::new("node-a", PacketType::Udp4)
        );
        assert_eq!(params.count, 1);
        assert_eq!(params.interval, 1000);
    }

    #[test]
    fn params_full_wire_format() {
        let params: PacketInjectionParams = serde_json::from_value(json!({
            "Src": "node-a",
            "Dst": "node-b",
            "SrcIP": "10.0.0.1",
            "DstIP": "10.0.0.2",
            "SrcMAC": "aa:bb:cc:dd:ee:01",
            "DstMAC": "aa:bb:cc:dd:ee:02",
            "SrcPort": 4000,
            "DstPort": 5000,
            "Type": "udp4",
            "Count": 3,
            "Interval": 10,
            "Payload": "hello",
            "TTL": 12
        }))
        .unwrap();

        assert_eq!(params.dst.as_deref(), Some("node-b"));
        assert_eq!(params.src_ip, Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))));
        assert_eq!(params.dst_port, 5000);
        assert_eq!(params.count, 3);
        assert_eq!(params.ttl, Some(12));
        assert_eq!(params.payload.as_deref(), Some("hello"));
    }

    #[test]
    fn unknown_packet_type_rejected() {
        let result = serde_json::from_value::<PacketInjectionParams>(
            json!({"Src": "node-a", "Type": "sctp4"}),
        );
        assert!(result.is_err());
    }

    #[test]
    fn malformed_ip_rejected() {
        let result = serde_json::from_value::<PacketInjectionParams>(
            json!({"Src": "node-a", "Type": "udp4", "DstIP": "10.0.0"}),
        );
        assert!(result.is_err());
    }

    #[test]
    fn missing_source_rejected() {
        let result =
            serde_json::from_value::<PacketInjectionParams>(json!({"Type": "udp4"}));
        assert!(result.is_err());
    }

    #[test]
    fn packet_type_family() {
        assert!(PacketType::Udp6.is_ipv6());
        assert!(!PacketType::Icmp4.is_ipv6());
        assert_eq!(PacketType::Tcp6.to_string(), "tcp6");
    }

    #[test]
    fn inject_reply_wire_format() {
        let value =
            serde_json::to_value(PacketInjectorReply::injected(TrackingId::new("abc123"))).unwrap();
        assert_eq!(value, json!({"TrackingID": "abc123"}));
    }

    #[test]
    fn failed_inject_reply_keeps_empty_tracking_id() {
        let value =
            serde_json::to_value(PacketInjectorReply::injection_failed("no route")).unwrap();
        assert_eq!(value, json!({"TrackingID": "", "Error": "no route"}));
    }

    #[test]
    fn stop_reply_wire_format() {
        assert_eq!(
            serde_json::to_value(PacketInjectorReply::stopped()).unwrap(),
            json!({})
        );
        assert_eq!(
            serde_json::to_value(PacketInjectorReply::failed("boom")).unwrap(),
            json!({"Error": "boom"})
        );
    }
}
