//! Version negotiation from the first client packet.
//!
//! The first TCP packet of every connection announces the client build.
//! Two payload shapes exist:
//!
//! ```text
//! legacy: [type][major][minor][build]                     -> major*100 + minor*10 + build (+900 from 1.100)
//! modern: [type][major][minor][build][rev][build:u16]     -> major*1000 + minor*100 + build
//! ```
//!
//! A version the server has no tables for fails negotiation and closes only
//! that connection.

use crate::error::{ProtocolError, Result};
use crate::protocol::version::ProtocolVersion;

use tracing::{debug, instrument};

/// Opcode of the version announcement packet
pub const CRYPT_KEY_REQUEST: u8 = 0xF4;

const LEGACY_LEN: usize = 4;
const MODERN_LEN: usize = 7;

/// Everything the client told us about itself in its first packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientHello {
    pub version: ProtocolVersion,
    pub client_type: u8,
    /// Minor revision letter, `0` when the client predates it
    pub revision: u8,
    /// Raw build bytes, echoed back by 1.125+ servers
    pub build: [u8; 2],
}

impl ClientHello {
    /// Revision letter as sent in version strings (`"1.125d"`)
    pub fn revision_suffix(&self) -> Option<char> {
        (self.revision.is_ascii_alphabetic()).then_some(char::from(self.revision))
    }
}

/// Compute the protocol version announced by a first-packet payload
#[instrument(skip(payload), fields(len = payload.len()))]
pub fn negotiate_version(payload: &[u8]) -> Result<ClientHello> {
    if payload.len() < LEGACY_LEN {
        return Err(ProtocolError::Truncated {
            needed: LEGACY_LEN - payload.len(),
        });
    }

    let (client_type, major, minor, build) = (
        payload[0],
        u32::from(payload[1]),
        u32::from(payload[2]),
        u32::from(payload[3]),
    );

    let hello = if payload.len() >= MODERN_LEN {
        ClientHello {
            version: announced(major * 1000 + minor * 100 + build)?,
            client_type,
            revision: payload[4],
            build: [payload[5], payload[6]],
        }
    } else {
        let mut raw = major * 100 + minor * 10 + build;
        if raw >= 200 {
            raw += 900;
        }
        ClientHello {
            version: announced(raw)?,
            client_type,
            revision: 0,
            build: [0, 0],
        }
    };

    if !hello.version.is_known() {
        return Err(ProtocolError::UnsupportedVersion(hello.version.get()));
    }

    debug!(version = %hello.version, client_type, "Client version negotiated");
    Ok(hello)
}

/// Hostile byte values can push the sum past `u16`; those are never a known build.
fn announced(raw: u32) -> Result<ProtocolVersion> {
    u16::try_from(raw)
        .map(ProtocolVersion::new)
        .map_err(|_| ProtocolError::UnsupportedVersion(u16::MAX))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_legacy_version() {
        let hello = negotiate_version(&[0x03, 1, 6, 8]).unwrap();
        assert_eq!(hello.version, ProtocolVersion::V168);
        assert_eq!(hello.client_type, 0x03);
        assert_eq!(hello.revision_suffix(), None);
    }

    #[test]
    fn test_legacy_hundred_series_shifts() {
        // 1.10.4 -> 204 -> 1104
        let hello = negotiate_version(&[0x03, 1, 10, 4]).unwrap();
        assert_eq!(hello.version.get(), 1104);
    }

    #[test]
    fn test_modern_version() {
        let hello = negotiate_version(&[0x03, 1, 1, 25, b'd', 0x2A, 0x07]).unwrap();
        assert_eq!(hello.version, ProtocolVersion::V1125);
        assert_eq!(hello.revision_suffix(), Some('d'));
        assert_eq!(hello.build, [0x2A, 0x07]);
    }

    #[test]
    fn test_unknown_version_rejected() {
        assert!(matches!(
            negotiate_version(&[0x03, 1, 5, 0]),
            Err(ProtocolError::UnsupportedVersion(150))
        ));
        assert!(matches!(
            negotiate_version(&[0x03, 1, 2]),
            Err(ProtocolError::Truncated { needed: 1 })
        ));
    }

    #[test]
    fn test_out_of_range_bytes_rejected() {
        // 255*1000 does not fit the version width
        assert!(matches!(
            negotiate_version(&[0x03, 255, 1, 25, b'd', 0, 0]),
            Err(ProtocolError::UnsupportedVersion(u16::MAX))
        ));
        assert!(matches!(
            negotiate_version(&[0x03, 255, 255, 255]),
            Err(ProtocolError::UnsupportedVersion(_))
        ));
        assert!(negotiate_version(&[0xFF; 7]).is_err());
    }
}
