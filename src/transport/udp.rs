//! # UDP Channel
//!
//! The server owns one UDP socket shared by every session. Sessions register
//! the endpoint announced in their `UdpInitRequest`; inbound datagrams are
//! routed back to the owning session by source address.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, Weak};

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::core::packet::Packet;
use crate::protocol::dispatcher::{process_packet, GameHandler};
use crate::transport::outbound::WireSink;
use crate::transport::session::Session;
use crate::utils::global_metrics;

/// Shared UDP socket and the endpoint-to-session map
#[derive(Debug)]
pub struct UdpChannel {
    socket: UdpSocket,
    endpoints: Mutex<HashMap<SocketAddr, Weak<Session>>>,
}

impl UdpChannel {
    pub async fn bind(addr: &str) -> io::Result<Arc<Self>> {
        let socket = UdpSocket::bind(addr).await?;
        info!(address = %socket.local_addr()?, "UDP channel bound");
        Ok(Arc::new(Self::from_socket(socket)))
    }

    pub fn from_socket(socket: UdpSocket) -> Self {
        Self {
            socket,
            endpoints: Mutex::new(HashMap::new()),
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn register(&self, endpoint: SocketAddr, session: &Arc<Session>) {
        if let Ok(mut endpoints) = self.endpoints.lock() {
            endpoints.retain(|_, s| s.strong_count() > 0);
            endpoints.insert(endpoint, Arc::downgrade(session));
        }
    }

    pub fn unregister(&self, endpoint: SocketAddr) {
        if let Ok(mut endpoints) = self.endpoints.lock() {
            endpoints.remove(&endpoint);
        }
    }

    pub fn lookup(&self, endpoint: &SocketAddr) -> Option<Arc<Session>> {
        self.endpoints
            .lock()
            .ok()?
            .get(endpoint)
            .and_then(Weak::upgrade)
    }

    pub async fn send_to(&self, buf: &[u8], endpoint: SocketAddr) -> io::Result<()> {
        let sent = self.socket.send_to(buf, endpoint).await?;
        if sent != buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("datagram truncated: {sent} of {} bytes", buf.len()),
            ));
        }
        Ok(())
    }
}

/// The UDP queue of one session, bound to its current endpoint
#[derive(Debug, Clone)]
pub struct UdpTarget {
    pub channel: Arc<UdpChannel>,
    pub endpoint: SocketAddr,
}

impl WireSink for UdpTarget {
    async fn write(&self, buf: Bytes) -> io::Result<()> {
        self.channel.send_to(&buf, self.endpoint).await
    }
}

/// Receive datagrams until `shutdown` fires, dispatching each to its session
#[instrument(skip_all, fields(local = ?channel.local_addr().ok()))]
pub async fn run_udp_loop<H: GameHandler>(
    channel: Arc<UdpChannel>,
    handler: Arc<H>,
    shutdown: CancellationToken,
) {
    let mut buf = vec![0u8; crate::config::MAX_PACKET_SIZE];
    loop {
        let received = tokio::select! {
            _ = shutdown.cancelled() => break,
            r = channel.socket.recv_from(&mut buf) => r,
        };

        let (len, from) = match received {
            Ok(r) => r,
            Err(e) => {
                // ICMP unreachable from a vanished client surfaces here
                debug!(error = %e, "UDP receive failed");
                continue;
            }
        };

        let Some(session) = channel.lookup(&from) else {
            debug!(%from, len, "Datagram from unknown endpoint");
            continue;
        };

        match Packet::from_udp_frame(&buf[..len]) {
            Ok((packet, _sequence)) => {
                global_metrics().packet_received(len as u64);
                process_packet(&session, packet, handler.as_ref());
            }
            Err(e) => warn!(%from, error = %e, "Malformed datagram"),
        }
    }
    info!("UDP loop stopped");
}
