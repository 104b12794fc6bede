//! # Inbound Dispatch
//!
//! Routes decoded client packets to the game.
//!
//! Each packet is checked against the session phase, decoded with the
//! session's [`HandlerTable`](crate::protocol::inbound::HandlerTable) and
//! handed to the [`GameHandler`]. Handler errors and panics are contained
//! per packet: they are logged and counted, and the connection survives.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use tracing::{debug, error, warn};

use crate::core::packet::Packet;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::inbound::ClientMessage;
use crate::protocol::preprocess::can_process;
use crate::transport::history::Direction;
use crate::transport::session::SessionHandle;
use crate::utils::{global_metrics, hexdump};

/// Game-side consumer of decoded client messages
pub trait GameHandler: Send + Sync + 'static {
    /// Handle one message; runs on the connection's reader task
    fn handle(&self, session: &SessionHandle, message: ClientMessage) -> Result<()>;

    /// Called exactly once when the connection ends
    fn on_disconnect(&self, _session: &SessionHandle) {}
}

/// What became of one inbound packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Handled,
    /// Gated by the preprocessor
    Dropped,
    UnknownOpcode,
    DecodeFailed,
    HandlerFailed,
}

/// Run one inbound packet through preprocessing, decoding and the handler
pub fn process_packet<H: GameHandler + ?Sized>(
    session: &SessionHandle,
    packet: Packet,
    handler: &H,
) -> Dispatch {
    let opcode = packet.opcode;
    let table = match session.handlers() {
        Ok(table) => table,
        Err(e) => {
            warn!(session = session.id(), opcode, error = %e, "Packet before negotiation");
            return Dispatch::DecodeFailed;
        }
    };

    let Some(entry) = table.get(opcode) else {
        error!(
            session = session.id(),
            dump = %hexdump(&format!("Unknown opcode 0x{opcode:02X}"), &packet.payload),
            "No handler for inbound opcode"
        );
        return Dispatch::UnknownOpcode;
    };

    let phase = session.phase();
    if !can_process(phase, entry.required) {
        debug!(
            session = session.id(),
            handler = entry.name,
            %phase,
            "Dropped packet not allowed in this phase"
        );
        global_metrics().preprocessor_drop();
        return Dispatch::Dropped;
    }

    let message = match table.decode(&packet) {
        Ok(message) => message,
        Err(e) => {
            warn!(session = session.id(), handler = entry.name, error = %e, "Failed to decode packet");
            global_metrics().handler_error();
            return Dispatch::DecodeFailed;
        }
    };

    observe(session, &message);

    let started = Instant::now();
    let outcome = catch_unwind(AssertUnwindSafe(|| handler.handle(session, message)))
        .unwrap_or_else(|_| Err(ProtocolError::Handler(constants::ERR_HANDLER_PANICKED.into())));
    let elapsed = started.elapsed();

    let threshold = session.config().transport.slow_handler_threshold;
    if elapsed > threshold {
        warn!(
            session = session.id(),
            handler = entry.name,
            opcode,
            elapsed_ms = elapsed.as_millis() as u64,
            "Slow packet handler"
        );
    }

    match outcome {
        Ok(()) => Dispatch::Handled,
        Err(e) => {
            error!(session = session.id(), handler = entry.name, error = %e, "Packet handler failed");
            global_metrics().handler_error();
            Dispatch::HandlerFailed
        }
    }
}

/// Transport bookkeeping some messages carry besides their game meaning
fn observe(session: &SessionHandle, message: &ClientMessage) {
    match message {
        ClientMessage::UdpInitRequest { local_port, .. } => {
            session.register_udp_endpoint(*local_port);
        }
        ClientMessage::UdpPing => session.confirm_udp(),
        ClientMessage::LoginRequest(login) => session.set_account_name(login.username.clone()),
        _ => {}
    }
}

/// Record an inbound TCP frame in the session history
pub(crate) fn record_inbound(session: &SessionHandle, packet: &Packet) {
    session
        .history()
        .record(Direction::Inbound, packet.opcode, packet.to_tcp_frame().freeze());
}
