//! UDP datagram injection.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pktinject_core::{PacketInjectionParams, PacketType, TopologyGraph, TrackingId};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::service::injector::{JobTicket, TrackingRegistry};
use crate::traits::{InjectionHandle, PacketInjector};

/// Reasons the UDP engine refuses to start a job.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("packet type {0} is not supported by the UDP engine")]
    UnsupportedType(PacketType),
    #[error("packet count must be at least 1")]
    ZeroCount,
    #[error("source node {0} not found")]
    UnknownSource(String),
    #[error("destination node {0} not found")]
    UnknownDestination(String),
    #[error("no {family} destination address: set DstIP or a Dst node with one")]
    NoDestinationAddress { family: &'static str },
    #[error("{addr} does not match packet type {packet_type}")]
    AddressFamily {
        addr: IpAddr,
        packet_type: PacketType,
    },
    #[error("destination port must be non-zero")]
    MissingDestinationPort,
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to set TTL: {0}")]
    Ttl(#[source] io::Error),
}

/// Everything a running job needs once its parameters are resolved.
#[derive(Debug)]
struct UdpJob {
    /// `Name` metadata of the source node, for logs.
    src_name: Option<String>,
    socket: UdpSocket,
    dst: SocketAddr,
    payload: Vec<u8>,
    count: u64,
    interval: Duration,
}

/// Sends `Count` UDP datagrams from an optional source address to a
/// destination taken from the request or the destination node's metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpInjector;

impl UdpInjector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Validates `params` against the graph and binds the sending socket.
    async fn prepare(
        params: &PacketInjectionParams,
        graph: &dyn TopologyGraph,
    ) -> Result<UdpJob, EngineError> {
        let ipv6 = match params.packet_type {
            PacketType::Udp4 => false,
            PacketType::Udp6 => true,
            other => return Err(EngineError::UnsupportedType(other)),
        };
        if params.count == 0 {
            return Err(EngineError::ZeroCount);
        }
        let src_node = graph
            .get_node(&params.src)
            .ok_or_else(|| EngineError::UnknownSource(params.src.clone()))?;

        let dst_node = match &params.dst {
            Some(id) => Some(
                graph
                    .get_node(id)
                    .ok_or_else(|| EngineError::UnknownDestination(id.clone()))?,
            ),
            None => None,
        };
        let dst_ip = params
            .dst_ip
            .or_else(|| dst_node.as_ref().and_then(|node| node.first_address(ipv6)))
            .ok_or(EngineError::NoDestinationAddress {
                family: if ipv6 { "IPv6" } else { "IPv4" },
            })?;
        check_family(dst_ip, params.packet_type)?;
        if params.dst_port == 0 {
            return Err(EngineError::MissingDestinationPort);
        }

        let src_ip = match params.src_ip {
            Some(ip) => {
                check_family(ip, params.packet_type)?;
                ip
            }
            None if ipv6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };
        let bind_addr = SocketAddr::new(src_ip, params.src_port);
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|source| EngineError::Bind {
                addr: bind_addr,
                source,
            })?;

        if let Some(ttl) = params.ttl {
            if ipv6 {
                debug!(ttl, "TTL ignored for IPv6 datagrams");
            } else {
                socket.set_ttl(u32::from(ttl)).map_err(EngineError::Ttl)?;
            }
        }

        Ok(UdpJob {
            src_name: src_node.name().map(str::to_owned),
            socket,
            dst: SocketAddr::new(dst_ip, params.dst_port),
            payload: params.payload.clone().unwrap_or_default().into_bytes(),
            count: params.count,
            interval: Duration::from_millis(params.interval),
        })
    }
}

fn check_family(addr: IpAddr, packet_type: PacketType) -> Result<(), EngineError> {
    if addr.is_ipv6() == packet_type.is_ipv6() {
        Ok(())
    } else {
        Err(EngineError::AddressFamily { addr, packet_type })
    }
}

#[async_trait]
impl PacketInjector for UdpInjector {
    async fn inject(
        &self,
        params: PacketInjectionParams,
        graph: Arc<dyn TopologyGraph>,
        tracker: Arc<TrackingRegistry>,
    ) -> anyhow::Result<InjectionHandle> {
        let job = Self::prepare(&params, graph.as_ref()).await?;

        let tracking_id = TrackingId::new(Uuid::new_v4().to_string());
        let (signal, ticket) = tracker.issue(tracking_id.clone());
        info!(
            tracking_id = %tracking_id,
            src = %params.src,
            interface = job.src_name.as_deref().unwrap_or("-"),
            dst = %job.dst,
            count = job.count,
            "starting UDP injection"
        );
        tokio::spawn(run_job(job, ticket));

        Ok(InjectionHandle {
            tracking_id,
            signal,
        })
    }
}

/// Sends the job's datagrams until done or stopped. Dropping `ticket` on
/// return clears the job's registry entry.
async fn run_job(job: UdpJob, mut ticket: JobTicket) {
    let tracking_id = ticket.tracking_id().clone();
    let mut sent = 0u64;

    for index in 0..job.count {
        if index > 0 {
            tokio::select! {
                biased;
                () = ticket.cancelled() => {
                    info!(tracking_id = %tracking_id, sent, "injection stopped");
                    return;
                }
                () = tokio::time::sleep(job.interval) => {}
            }
        } else if ticket.is_cancelled() {
            info!(tracking_id = %tracking_id, sent, "injection stopped");
            return;
        }

        if let Err(err) = job.socket.send_to(&job.payload, job.dst).await {
            warn!(tracking_id = %tracking_id, error = %err, sent, "send failed, ending injection");
            return;
        }
        sent += 1;
    }

    info!(tracking_id = %tracking_id, sent, "injection finished");
}
