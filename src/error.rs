//! # Error Types
//!
//! Error handling for the game wire protocol.
//!
//! Every failure below the transport boundary surfaces as a [`ProtocolError`].
//! What happens next depends on the category:
//!
//! ## Error Categories
//! - **Integrity**: bad checksum, malformed header. Fatal to the one connection.
//! - **Encoding**: oversized outbound packet, or a list too long to index.
//!   Fatal unless the compatibility override is configured.
//! - **Handler**: a game-logic handler failed. Logged, connection survives.
//! - **I/O**: socket failures. Fatal to the connection.
//! - **Negotiation**: unknown client version. Fatal at negotiation only.
//!
//! ## Example Usage
//! ```rust
//! use game_protocol::error::{ProtocolError, Result};
//! use tracing::error;
//!
//! fn check_len(len: usize) -> Result<()> {
//!     if len > 2048 {
//!         return Err(ProtocolError::OversizedPacket(len));
//!     }
//!     Ok(())
//! }
//!
//! if let Err(e) = check_len(4096) {
//!     error!(error = %e, "Refusing packet");
//! }
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Registry errors
    pub const ERR_BASE_REVISION_INCOMPLETE: &str = "Base revision does not define every operation";
    pub const ERR_PARENT_NOT_OLDER: &str = "Revision parent must be an older version";
    pub const ERR_PARENT_UNKNOWN: &str = "Revision parent is not registered";

    /// Framing errors
    pub const ERR_INVALID_HEADER: &str = "Invalid packet header";
    pub const ERR_TRUNCATED: &str = "Packet ended before the expected field";
    pub const ERR_OVERSIZED_PACKET: &str = "Packet exceeds maximum size";

    /// Session errors
    pub const ERR_ALREADY_NEGOTIATED: &str = "Session already bound to a protocol version";
    pub const ERR_NOT_NEGOTIATED: &str = "Session has not negotiated a protocol version";
    pub const ERR_CONNECTION_CLOSED: &str = "Connection closed";
    pub const ERR_HANDLER_PANICKED: &str = "Packet handler panicked";
    pub const ERR_LOCK_POISONED: &str = "Synchronization primitive poisoned";
}

/// Primary error type for all protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Bad TCP packet checksum (packet:0x{packet:04X} calculated:0x{calculated:04X})")]
    ChecksumMismatch { packet: u16, calculated: u16 },

    #[error("Invalid packet header")]
    InvalidHeader,

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("List of {entries} entries cannot be indexed by its packets")]
    ListTooLong { entries: usize },

    #[error("Packet truncated: needed {needed} more bytes")]
    Truncated { needed: usize },

    #[error("Unsupported client version: {0}")]
    UnsupportedVersion(u16),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Session already bound to a protocol version")]
    AlreadyNegotiated,

    #[error("Session has not negotiated a protocol version")]
    NotNegotiated,

    #[error("Encoder for {expected} received a different message kind")]
    MessageMismatch { expected: &'static str },

    #[error("Unknown opcode 0x{0:02X}")]
    UnknownOpcode(u8),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl ProtocolError {
    /// Integrity errors poison the stream: nothing after them can be parsed.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            ProtocolError::ChecksumMismatch { .. } | ProtocolError::InvalidHeader
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_message_is_hex() {
        let err = ProtocolError::ChecksumMismatch {
            packet: 0x1234,
            calculated: 0xABCD,
        };
        assert_eq!(
            err.to_string(),
            "Bad TCP packet checksum (packet:0x1234 calculated:0xABCD)"
        );
        assert!(err.is_integrity());
    }

    #[test]
    fn test_handler_error_is_not_integrity() {
        assert!(!ProtocolError::Handler("boom".into()).is_integrity());
        assert!(!ProtocolError::OversizedPacket(4096).is_integrity());
    }
}
