//! # Game Server
//!
//! TCP accept loop and per-connection reader tasks.
//!
//! Each accepted connection gets a [`Session`] and one reader task. The
//! reader reassembles frames with [`GameCodec`], negotiates the protocol
//! version from the first packet and then dispatches every packet in
//! arrival order. Integrity failures close only the offending connection.
//!
//! ## Usage
//! ```rust,no_run
//! use game_protocol::config::ProtocolConfig;
//! use game_protocol::error::Result;
//! use game_protocol::protocol::dispatcher::GameHandler;
//! use game_protocol::protocol::inbound::ClientMessage;
//! use game_protocol::transport::server::GameServer;
//! use game_protocol::transport::session::SessionHandle;
//!
//! struct World;
//!
//! impl GameHandler for World {
//!     fn handle(&self, _session: &SessionHandle, _message: ClientMessage) -> Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! # async fn run() -> Result<()> {
//! GameServer::new(ProtocolConfig::default(), World).run().await
//! # }
//! ```

use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::ProtocolConfig;
use crate::core::codec::GameCodec;
use crate::core::packet::Packet;
use crate::error::constants::ERR_HANDLER_PANICKED;
use crate::error::{ProtocolError, Result};
use crate::protocol::dispatcher::{process_packet, record_inbound, GameHandler};
use crate::protocol::handshake::{negotiate_version, CRYPT_KEY_REQUEST};
use crate::protocol::inbound::ClientMessage;
use crate::protocol::message::OutboundMessage;
use crate::protocol::registry::Registry;
use crate::transport::session::{Session, SessionHandle, SessionResources, SessionState};
use crate::transport::udp::{run_udp_loop, UdpChannel};
use crate::utils::global_metrics;

/// Server accepting game clients on TCP, plus the shared UDP channel
pub struct GameServer<H> {
    config: Arc<ProtocolConfig>,
    handler: Arc<H>,
    next_session_id: Arc<AtomicU16>,
    active: Arc<AtomicUsize>,
}

impl<H: GameHandler> GameServer<H> {
    pub fn new(config: ProtocolConfig, handler: H) -> Self {
        Self {
            config: Arc::new(config),
            handler: Arc::new(handler),
            next_session_id: Arc::new(AtomicU16::new(1)),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    /// Number of open connections
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Run until CTRL+C
    pub async fn run(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received CTRL+C signal, shutting down");
                let _ = shutdown_tx.send(()).await;
            }
        });

        self.run_with_shutdown(shutdown_rx).await
    }

    /// Bind the configured addresses and serve until `shutdown_rx` fires
    pub async fn run_with_shutdown(self, shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        self.config.validate_strict()?;
        for warning in self.config.warnings() {
            warn!("{warning}");
        }
        Registry::global().warm_up()?;

        let listener = TcpListener::bind(&self.config.server.tcp_address).await?;
        let udp = match &self.config.server.udp_address {
            Some(addr) => Some(UdpChannel::bind(addr).await?),
            None => None,
        };
        self.serve(listener, udp, shutdown_rx).await
    }

    /// Serve on an already bound listener
    #[instrument(skip_all, fields(local = ?listener.local_addr().ok()))]
    pub async fn serve(
        self,
        listener: TcpListener,
        udp: Option<Arc<UdpChannel>>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) -> Result<()> {
        let shutdown = CancellationToken::new();
        let resources = SessionResources::new(Arc::clone(&self.config), udp.clone());

        if let Some(channel) = udp {
            tokio::spawn(run_udp_loop(
                channel,
                Arc::clone(&self.handler),
                shutdown.child_token(),
            ));
        }

        info!(address = ?listener.local_addr().ok(), "Game server listening");

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Shutting down server. Waiting for connections to close...");
                    shutdown.cancel();
                    self.wait_for_connections().await;
                    global_metrics().log_metrics();
                    return Ok(());
                }

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer)) => self.accept(stream, peer, &resources, &shutdown),
                        Err(e) => {
                            error!(error = %e, "Error accepting connection");
                            global_metrics().connection_error();
                        }
                    }
                }
            }
        }
    }

    fn accept(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        resources: &SessionResources,
        shutdown: &CancellationToken,
    ) {
        if self.active.load(Ordering::Acquire) >= self.config.server.max_connections {
            warn!(%peer, max = self.config.server.max_connections, "Connection limit reached");
            return;
        }
        if let Err(e) = stream.set_nodelay(true) {
            debug!(%peer, error = %e, "Failed to set TCP_NODELAY");
        }

        let id = self.allocate_session_id();
        let (reader, writer) = stream.into_split();
        let session = Session::new(id, peer, writer, resources.clone(), shutdown.child_token());

        self.active.fetch_add(1, Ordering::AcqRel);
        global_metrics().connection_established();
        info!(%peer, session = id, "New connection established");

        let handler = Arc::clone(&self.handler);
        let active = Arc::clone(&self.active);
        tokio::spawn(async move {
            run_connection(reader, session, handler).await;
            active.fetch_sub(1, Ordering::AcqRel);
        });
    }

    fn allocate_session_id(&self) -> u16 {
        loop {
            let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return id;
            }
        }
    }

    async fn wait_for_connections(&self) {
        let timeout = tokio::time::sleep(self.config.server.shutdown_timeout);
        tokio::pin!(timeout);

        loop {
            tokio::select! {
                _ = &mut timeout => {
                    warn!("Shutdown timeout reached, forcing exit");
                    break;
                }
                _ = tokio::time::sleep(std::time::Duration::from_millis(100)) => {
                    let connections = self.active.load(Ordering::Acquire);
                    debug!(connections, "Waiting for connections to close");
                    if connections == 0 {
                        info!("All connections closed, shutting down");
                        break;
                    }
                }
            }
        }
    }
}

impl<H> std::fmt::Debug for GameServer<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameServer")
            .field("active", &self.active.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Read, negotiate and dispatch until the connection ends.
///
/// Calls [`GameHandler::on_disconnect`] exactly once on the way out.
#[instrument(skip_all, fields(session = session.id(), peer = %session.peer()))]
pub async fn run_connection<R, H>(reader: R, session: SessionHandle, handler: Arc<H>)
where
    R: AsyncRead + Unpin,
    H: GameHandler,
{
    let capacity = session.config().transport.receive_buffer_size;
    let mut frames = FramedRead::with_capacity(reader, GameCodec, capacity);
    let cancel = session.cancellation_token().clone();

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = frames.next() => next,
        };

        match next {
            Some(Ok(packet)) => {
                global_metrics().packet_received(packet.tcp_frame_len() as u64);
                record_inbound(&session, &packet);

                if session.binding().is_none() {
                    if let Err(e) = negotiate(&session, &packet, handler.as_ref()) {
                        warn!(error = %e, "Negotiation failed");
                        break;
                    }
                    continue;
                }
                process_packet(&session, packet, handler.as_ref());
            }
            Some(Err(ProtocolError::ChecksumMismatch { packet, calculated })) => {
                warn!(
                    packet = format_args!("0x{packet:04X}"),
                    calculated = format_args!("0x{calculated:04X}"),
                    "Bad TCP packet checksum, closing connection"
                );
                global_metrics().checksum_failure();
                if session.config().logging.log_packet_history {
                    warn!(history = %session.history().dump(), "Last packets before checksum failure");
                }
                break;
            }
            Some(Err(e)) => {
                if e.is_integrity() {
                    warn!(error = %e, "Stream integrity lost, closing connection");
                } else {
                    debug!(error = %e, "Read failed");
                }
                global_metrics().connection_error();
                break;
            }
            None => {
                debug!("Client closed the connection");
                break;
            }
        }
    }

    session.disconnect();
    handler.on_disconnect(&session);
    session.shutdown_writer().await;
    session.close();
    global_metrics().connection_closed();
    info!("Connection closed");
}

/// Bind the session to the version announced in its first packet
fn negotiate<H: GameHandler + ?Sized>(
    session: &SessionHandle,
    packet: &Packet,
    handler: &H,
) -> Result<()> {
    session.set_state(SessionState::Negotiating);
    if packet.opcode != CRYPT_KEY_REQUEST {
        return Err(ProtocolError::UnknownOpcode(packet.opcode));
    }

    let hello = negotiate_version(&packet.payload)?;
    session.bind(hello)?;
    session.send(&OutboundMessage::VersionAndCryptKey)?;

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        handler.handle(session, ClientMessage::CryptKeyRequest(hello))
    }))
    .unwrap_or_else(|_| Err(ProtocolError::Handler(ERR_HANDLER_PANICKED.into())));
    if let Err(e) = outcome {
        error!(error = %e, "Packet handler failed");
        global_metrics().handler_error();
    }
    Ok(())
}
