//! Example: a minimal realm server
//!
//! Accepts clients of every supported version, answers pings, walks them
//! from login to the character screen and logs everything else.
//!
//! Run with: `cargo run --example realm_server [config.toml]`
//! Without a file the `GAME_PROTOCOL_*` environment variables apply.

use game_protocol::config::ProtocolConfig;
use game_protocol::error::Result;
use game_protocol::protocol::dispatcher::GameHandler;
use game_protocol::protocol::inbound::ClientMessage;
use game_protocol::protocol::message::{OutboundMessage, UdpInitReply};
use game_protocol::protocol::preprocess::ClientPhase;
use game_protocol::transport::server::GameServer;
use game_protocol::transport::session::SessionHandle;
use game_protocol::utils::logging::init_logging;
use tracing::info;

struct Realm;

impl GameHandler for Realm {
    fn handle(&self, session: &SessionHandle, message: ClientMessage) -> Result<()> {
        match message {
            ClientMessage::LoginRequest(login) => {
                info!(session = session.id(), user = %login.username, "Login");
                session.send(&OutboundMessage::LoginGranted { color: 0 })?;
                session.send(&OutboundMessage::SessionId)?;
                session.set_phase(ClientPhase::CharacterSelect);
                Ok(())
            }
            ClientMessage::PingRequest { timestamp } => session.send(&OutboundMessage::PingReply {
                timestamp,
                sequence: 0,
            }),
            ClientMessage::UdpInitRequest { .. } => {
                let endpoint = session
                    .server_udp_addr()
                    .map(|addr| (addr.ip().to_string(), addr.port()));
                session.send(&OutboundMessage::UdpInitReply(UdpInitReply {
                    endpoint,
                    ..Default::default()
                }))
            }
            other => {
                info!(session = session.id(), message = ?other, "Unhandled");
                Ok(())
            }
        }
    }

    fn on_disconnect(&self, session: &SessionHandle) {
        info!(session = session.id(), account = %session.account_name(), "Left the realm");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => ProtocolConfig::from_file(path)?,
        None => ProtocolConfig::from_env()?,
    };
    init_logging(&config.logging)?;

    GameServer::new(config, Realm).run().await
}
