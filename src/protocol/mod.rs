//! # Protocol Layer
//!
//! Everything that depends on the negotiated client version.
//!
//! ## Components
//! - **Version / Handshake**: version numbers and negotiation from the first packet
//! - **Message / Opcodes**: logical outbound messages and opcode identities
//! - **Codec**: per-version encoders folded from a revision chain
//! - **Inbound**: per-version decoders of client packets
//! - **Registry**: lazily resolved tables shared by all sessions
//! - **Preprocess / Dispatcher**: phase gating and delivery to the game

pub mod codec;
pub mod dispatcher;
pub mod handshake;
pub mod inbound;
pub mod message;
pub mod opcodes;
pub mod preprocess;
pub mod registry;
pub mod version;

#[cfg(test)]
mod tests;
