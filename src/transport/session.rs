//! # Client Session
//!
//! Per-connection state and the outbound send path.
//!
//! A session starts in [`SessionState::Connecting`], binds its protocol
//! version exactly once during negotiation and from then on encodes every
//! [`OutboundMessage`] through the tables of that version.
//!
//! ## Send path
//! - TCP frames go straight to the TCP [`SendQueue`].
//! - UDP frames go to the UDP queue with the next wrapping sequence number
//!   (the first datagram carries 1),
//!   unless there is no endpoint or the endpoint is unconfirmed and the
//!   packet is not forced. Those are reframed to TCP instead.
//! - Frames above the configured maximum are logged with a hexdump and a
//!   backtrace, then either dropped or fatal to the connection.

use std::backtrace::Backtrace;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncWrite;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ProtocolConfig;
use crate::core::packet::{reframe_udp_to_tcp, stamp_udp_sequence};
use crate::error::{ProtocolError, Result};
use crate::protocol::codec::{Channel, EncodeContext, ResolvedCodec};
use crate::protocol::handshake::ClientHello;
use crate::protocol::inbound::HandlerTable;
use crate::protocol::message::OutboundMessage;
use crate::protocol::preprocess::ClientPhase;
use crate::protocol::registry::Registry;
use crate::protocol::version::ProtocolVersion;
use crate::transport::history::{Direction, PacketHistory};
use crate::transport::outbound::{drain, SendQueue, StreamSink};
use crate::transport::udp::{UdpChannel, UdpTarget};
use crate::utils::buffer_pool::BufferPool;
use crate::utils::{global_metrics, hexdump};

/// Shared handle passed to game handlers
pub type SessionHandle = Arc<Session>;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Connection lifecycle; `Closed` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum SessionState {
    Connecting = 0,
    Negotiating = 1,
    Active = 2,
    Disconnecting = 3,
    Closed = 4,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SessionState::Connecting,
            1 => SessionState::Negotiating,
            2 => SessionState::Active,
            3 => SessionState::Disconnecting,
            _ => SessionState::Closed,
        }
    }
}

/// Tables a session is bound to after negotiation
#[derive(Debug, Clone, Copy)]
pub struct Binding {
    pub hello: ClientHello,
    pub codec: &'static ResolvedCodec,
    pub handlers: &'static HandlerTable,
}

#[derive(Debug, Default)]
struct UdpState {
    endpoint: Option<SocketAddr>,
    confirmed: bool,
    last_ping: Option<Instant>,
    sequence: u16,
}

impl UdpState {
    /// Datagrams are numbered from 1, wrapping through 0 after `u16::MAX`
    fn next_sequence(&mut self) -> u16 {
        self.sequence = self.sequence.wrapping_add(1);
        self.sequence
    }
}

/// Server-wide resources every session shares
#[derive(Debug, Clone)]
pub struct SessionResources {
    pub config: Arc<ProtocolConfig>,
    pub pool: BufferPool,
    pub udp: Option<Arc<UdpChannel>>,
}

impl SessionResources {
    pub fn new(config: Arc<ProtocolConfig>, udp: Option<Arc<UdpChannel>>) -> Self {
        let pool = BufferPool::new(
            config.transport.buffer_pool_size,
            config.transport.send_buffer_size,
        );
        Self { config, pool, udp }
    }
}

/// One connected client
pub struct Session {
    id: u16,
    peer: SocketAddr,
    resources: SessionResources,
    state: AtomicU8,
    phase: Mutex<ClientPhase>,
    binding: OnceLock<Binding>,
    account_name: Mutex<String>,
    tcp_queue: SendQueue,
    udp_queue: SendQueue,
    tcp_sink: StreamSink<BoxedWriter>,
    udp: Mutex<UdpState>,
    history: PacketHistory,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("state", &self.state())
            .field("version", &self.version())
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new<W>(
        id: u16,
        peer: SocketAddr,
        writer: W,
        resources: SessionResources,
        cancel: CancellationToken,
    ) -> SessionHandle
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Arc::new(Self {
            id,
            peer,
            resources,
            state: AtomicU8::new(SessionState::Connecting as u8),
            phase: Mutex::new(ClientPhase::PreLogin),
            binding: OnceLock::new(),
            account_name: Mutex::new(String::new()),
            tcp_queue: SendQueue::new(),
            udp_queue: SendQueue::new(),
            tcp_sink: StreamSink::new(Box::new(writer) as BoxedWriter),
            udp: Mutex::new(UdpState::default()),
            history: PacketHistory::new(),
            cancel,
        })
    }

    #[inline]
    pub fn id(&self) -> u16 {
        self.id
    }

    #[inline]
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.resources.config
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.state() >= SessionState::Disconnecting
    }

    pub fn phase(&self) -> ClientPhase {
        self.phase.lock().map(|p| *p).unwrap_or_default()
    }

    pub fn set_phase(&self, phase: ClientPhase) {
        if let Ok(mut current) = self.phase.lock() {
            debug!(session = self.id, from = %*current, to = %phase, "Client phase changed");
            *current = phase;
        }
    }

    pub fn account_name(&self) -> String {
        self.account_name
            .lock()
            .map(|n| n.clone())
            .unwrap_or_default()
    }

    pub fn set_account_name(&self, name: impl Into<String>) {
        if let Ok(mut current) = self.account_name.lock() {
            *current = name.into();
        }
    }

    pub fn history(&self) -> &PacketHistory {
        &self.history
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Bind the tables of `hello.version`; a second call is an error
    pub fn bind(&self, hello: ClientHello) -> Result<&Binding> {
        if self.binding.get().is_some() {
            return Err(ProtocolError::AlreadyNegotiated);
        }

        let registry = Registry::global();
        let binding = Binding {
            hello,
            codec: registry.codec(hello.version)?,
            handlers: registry.handlers(hello.version)?,
        };
        self.binding
            .set(binding)
            .map_err(|_| ProtocolError::AlreadyNegotiated)?;
        self.set_state(SessionState::Active);

        info!(session = self.id, version = %hello.version, "Session bound");
        self.binding.get().ok_or(ProtocolError::NotNegotiated)
    }

    pub fn binding(&self) -> Option<&Binding> {
        self.binding.get()
    }

    pub fn version(&self) -> Option<ProtocolVersion> {
        self.binding.get().map(|b| b.hello.version)
    }

    pub fn codec(&self) -> Result<&'static ResolvedCodec> {
        self.binding
            .get()
            .map(|b| b.codec)
            .ok_or(ProtocolError::NotNegotiated)
    }

    pub fn handlers(&self) -> Result<&'static HandlerTable> {
        self.binding
            .get()
            .map(|b| b.handlers)
            .ok_or(ProtocolError::NotNegotiated)
    }

    /// Encode `msg` for this session's version and queue the result
    pub fn send(self: &Arc<Self>, msg: &OutboundMessage) -> Result<()> {
        let binding = self.binding.get().ok_or(ProtocolError::NotNegotiated)?;
        if self.is_closed() {
            return Err(ProtocolError::ConnectionClosed);
        }

        let account_name = self.account_name();
        let server = &self.resources.config.server;
        let ctx = EncodeContext {
            hello: binding.hello,
            session_id: self.id,
            account_name: &account_name,
            server_name_short: &server.server_name_short,
            server_id: server.server_id,
            phase: self.phase(),
        };

        for out in binding.codec.encode(&ctx, msg)? {
            match out.channel {
                Channel::Tcp => self.send_tcp(out.packet.to_tcp_frame().freeze())?,
                Channel::Udp { forced } => self.send_udp(out.packet.to_udp_frame(), forced)?,
            }
        }
        Ok(())
    }

    /// Queue a complete TCP frame
    pub fn send_tcp(self: &Arc<Self>, frame: Bytes) -> Result<()> {
        if frame.len() > self.resources.config.transport.max_packet_size {
            return self.reject_oversized(&frame);
        }

        let opcode = frame.get(2).copied().unwrap_or_default();
        self.history.record(Direction::Outbound, opcode, frame.clone());
        if self.tcp_queue.enqueue(frame) {
            self.spawn_tcp_drain();
        }
        Ok(())
    }

    /// Queue a UDP frame, falling back to TCP when UDP is not usable
    pub fn send_udp(self: &Arc<Self>, mut frame: BytesMut, forced: bool) -> Result<()> {
        let mut udp = self.udp.lock().map_err(|_| lock_poisoned())?;
        self.lapse_confirmation(&mut udp);

        let target = match (udp.endpoint, &self.resources.udp) {
            (Some(endpoint), Some(channel)) if udp.confirmed || forced => UdpTarget {
                channel: Arc::clone(channel),
                endpoint,
            },
            _ => {
                drop(udp);
                global_metrics().udp_fallback();
                let tcp = reframe_udp_to_tcp(&frame)?;
                return self.send_tcp(tcp.freeze());
            }
        };

        if frame.len() > self.resources.config.transport.max_packet_size {
            drop(udp);
            return self.reject_oversized(&frame);
        }

        stamp_udp_sequence(&mut frame, udp.next_sequence())?;
        let frame = frame.freeze();
        let opcode = frame.get(4).copied().unwrap_or_default();
        self.history.record(Direction::Outbound, opcode, frame.clone());

        // enqueue under the UDP lock so sequence order is queue order
        let start_drain = self.udp_queue.enqueue(frame);
        drop(udp);

        if start_drain {
            self.spawn_udp_drain(target);
        }
        Ok(())
    }

    fn lapse_confirmation(&self, udp: &mut UdpState) {
        if !udp.confirmed || self.phase() != ClientPhase::InWorld {
            return;
        }
        let timeout = self.resources.config.transport.udp_confirm_timeout;
        let stale = udp.last_ping.map_or(true, |t| t.elapsed() > timeout);
        if stale {
            debug!(session = self.id, "UDP confirmation lapsed");
            udp.confirmed = false;
        }
    }

    fn reject_oversized(self: &Arc<Self>, frame: &[u8]) -> Result<()> {
        global_metrics().oversized_packet();
        let transport = &self.resources.config.transport;
        let backtrace = Backtrace::force_capture();
        error!(
            session = self.id,
            len = frame.len(),
            max = transport.max_packet_size,
            dump = %hexdump("Oversized packet", frame),
            %backtrace,
            "Outgoing packet exceeds the client limit"
        );

        if transport.ignore_oversized_outgoing {
            warn!(session = self.id, "Dropping oversized packet");
            return Ok(());
        }
        self.disconnect();
        Err(ProtocolError::OversizedPacket(frame.len()))
    }

    // Non-async wrapper so the `Send` bound on the drain future is checked
    // with a concrete lifetime rather than inside the spawned async block.
    fn drain_tcp(
        &self,
        size: usize,
    ) -> impl std::future::Future<Output = std::io::Result<()>> + Send + '_ {
        drain(&self.tcp_queue, &self.tcp_sink, &self.resources.pool, size)
    }

    fn spawn_tcp_drain(self: &Arc<Self>) {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            let size = session.resources.config.transport.send_buffer_size;
            let result = tokio::select! {
                _ = session.cancel.cancelled() => {
                    session.tcp_queue.clear();
                    return;
                }
                r = session.drain_tcp(size) => r,
            };
            if let Err(e) = result {
                error!(session = session.id, error = %e, "TCP write failed");
                global_metrics().connection_error();
                session.disconnect();
            }
        });
    }

    fn spawn_udp_drain(self: &Arc<Self>, target: UdpTarget) {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            let size = session.resources.config.transport.send_buffer_size;
            let result = tokio::select! {
                _ = session.cancel.cancelled() => {
                    session.udp_queue.clear();
                    return;
                }
                r = drain(&session.udp_queue, &target, &session.resources.pool, size) => r,
            };
            if let Err(e) = result {
                warn!(session = session.id, endpoint = %target.endpoint, error = %e, "UDP send failed");
                if let Ok(mut udp) = session.udp.lock() {
                    udp.confirmed = false;
                }
            }
        });
    }

    /// Register the UDP port announced by the client
    pub fn register_udp_endpoint(self: &Arc<Self>, port: u16) -> SocketAddr {
        let endpoint = SocketAddr::new(self.peer.ip(), port);
        if let Some(channel) = &self.resources.udp {
            channel.register(endpoint, self);
        }
        if let Ok(mut udp) = self.udp.lock() {
            if let (Some(old), Some(channel)) = (udp.endpoint, &self.resources.udp) {
                if old != endpoint {
                    channel.unregister(old);
                }
            }
            udp.endpoint = Some(endpoint);
            udp.confirmed = false;
        }
        debug!(session = self.id, %endpoint, "UDP endpoint registered");
        endpoint
    }

    /// Mark the endpoint confirmed after a UDP ping
    pub fn confirm_udp(&self) {
        if let Ok(mut udp) = self.udp.lock() {
            if !udp.confirmed {
                debug!(session = self.id, "UDP endpoint confirmed");
            }
            udp.confirmed = true;
            udp.last_ping = Some(Instant::now());
        }
    }

    pub fn udp_confirmed(&self) -> bool {
        self.udp.lock().map(|u| u.confirmed).unwrap_or(false)
    }

    pub fn udp_endpoint(&self) -> Option<SocketAddr> {
        self.udp.lock().ok().and_then(|u| u.endpoint)
    }

    /// Address the client should send UDP to, if UDP is enabled
    pub fn server_udp_addr(&self) -> Option<SocketAddr> {
        self.resources.udp.as_ref().and_then(|c| c.local_addr().ok())
    }

    /// Cancel the drain tasks and drop everything queued
    pub fn disconnect(&self) {
        let previous = self
            .state
            .fetch_max(SessionState::Disconnecting as u8, Ordering::AcqRel);
        if previous >= SessionState::Disconnecting as u8 {
            return;
        }

        info!(session = self.id, peer = %self.peer, "Disconnecting");
        self.cancel.cancel();
        self.tcp_queue.clear();
        self.udp_queue.clear();
        if let (Some(channel), Some(endpoint)) = (&self.resources.udp, self.udp_endpoint()) {
            channel.unregister(endpoint);
        }
    }

    /// Terminal state; releases the history buffers
    pub fn close(&self) {
        self.disconnect();
        self.set_state(SessionState::Closed);
        self.history.clear();
    }

    /// Flush the TCP writer and close it
    pub async fn shutdown_writer(&self) {
        if let Err(e) = self.tcp_sink.shutdown().await {
            debug!(session = self.id, error = %e, "Writer shutdown failed");
        }
    }
}

fn lock_poisoned() -> ProtocolError {
    ProtocolError::Custom(crate::error::constants::ERR_LOCK_POISONED.to_string())
}
