//! Client protocol versions.
//!
//! Versions are stored as the integer the client reports after negotiation:
//! `168` for 1.68, `1125` for 1.125. Two contiguous ranges are served.

use std::fmt;

const LEGACY_RANGE: std::ops::RangeInclusive<u16> = 168..=199;
const MODERN_RANGE: std::ops::RangeInclusive<u16> = 1100..=1126;

/// Number of versions the server accepts
pub const KNOWN_VERSION_COUNT: usize = 32 + 27;

/// A negotiated client protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtocolVersion(u16);

impl ProtocolVersion {
    pub const V168: Self = Self(168);
    pub const V171: Self = Self(171);
    pub const V172: Self = Self(172);
    pub const V173: Self = Self(173);
    pub const V174: Self = Self(174);
    pub const V175: Self = Self(175);
    pub const V176: Self = Self(176);
    pub const V180: Self = Self(180);
    pub const V186: Self = Self(186);
    pub const V1110: Self = Self(1110);
    pub const V1115: Self = Self(1115);
    pub const V1125: Self = Self(1125);

    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn get(self) -> u16 {
        self.0
    }

    /// Whether the server has tables for this version
    pub fn is_known(self) -> bool {
        self.index().is_some()
    }

    /// Dense position of this version among the known versions
    pub fn index(self) -> Option<usize> {
        if LEGACY_RANGE.contains(&self.0) {
            Some((self.0 - LEGACY_RANGE.start()) as usize)
        } else if MODERN_RANGE.contains(&self.0) {
            Some(LEGACY_RANGE.len() + (self.0 - MODERN_RANGE.start()) as usize)
        } else {
            None
        }
    }

    /// The version immediately before this one, if it is known
    pub fn predecessor(self) -> Option<Self> {
        match self.0 {
            1100 => Some(Self(199)),
            v => Some(Self(v.checked_sub(1)?)).filter(|p| p.is_known()),
        }
    }

    /// `(major, minor)` bytes used by the pre-1.125 login replies.
    ///
    /// 1.68 gives `(1, 6)`; 1.109 gives `(11, 0)`.
    pub fn header_bytes(self) -> (u8, u8) {
        let v = self.0;
        ((v / 100) as u8, ((v % 100) / 10) as u8)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= 1000 {
            write!(f, "1.{}", self.0 - 1000)
        } else {
            write!(f, "1.{}", self.0 - 100)
        }
    }
}

/// Every version the server accepts, oldest first
pub fn known_versions() -> impl Iterator<Item = ProtocolVersion> {
    LEGACY_RANGE.chain(MODERN_RANGE).map(ProtocolVersion)
}
