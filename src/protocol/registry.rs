//! # Version Registry
//!
//! Process-wide store of resolved per-version tables.
//!
//! Each known version owns one write-once slot for its [`ResolvedCodec`] and
//! one for its [`HandlerTable`]. A slot is filled the first time a session of
//! that version needs it; concurrent first uses race on the cell and exactly
//! one resolution is kept. After that every lookup is a lock-free read.

use std::sync::OnceLock;

use once_cell::sync::Lazy;
use tracing::{debug, info};

use crate::error::{ProtocolError, Result};
use crate::protocol::codec::{validate_revisions, ResolvedCodec, REVISIONS};
use crate::protocol::inbound::{validate_handler_revisions, HandlerTable, HANDLER_REVISIONS};
use crate::protocol::version::{known_versions, ProtocolVersion, KNOWN_VERSION_COUNT};
use crate::utils::metrics::Timer;

struct VersionSlot {
    codec: OnceLock<ResolvedCodec>,
    handlers: OnceLock<HandlerTable>,
}

/// Lazily resolved codec and handler tables for every known version
pub struct Registry {
    slots: Vec<VersionSlot>,
}

static GLOBAL: Lazy<Registry> = Lazy::new(Registry::new);

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        let slots = (0..KNOWN_VERSION_COUNT)
            .map(|_| VersionSlot {
                codec: OnceLock::new(),
                handlers: OnceLock::new(),
            })
            .collect();
        Self { slots }
    }

    /// The registry shared by every session in the process
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    fn slot(&self, version: ProtocolVersion) -> Result<&VersionSlot> {
        version
            .index()
            .and_then(|i| self.slots.get(i))
            .ok_or(ProtocolError::UnsupportedVersion(version.get()))
    }

    /// Outbound tables of `version`, resolved on first use
    pub fn codec(&self, version: ProtocolVersion) -> Result<&ResolvedCodec> {
        let slot = self.slot(version)?;
        if let Some(codec) = slot.codec.get() {
            return Ok(codec);
        }
        let resolved = ResolvedCodec::resolve(version, REVISIONS)?;
        debug!(%version, "Codec tables resolved");
        // a concurrent resolver may have won; its result is identical
        Ok(slot.codec.get_or_init(|| resolved))
    }

    /// Inbound handler table of `version`, resolved on first use
    pub fn handlers(&self, version: ProtocolVersion) -> Result<&HandlerTable> {
        let slot = self.slot(version)?;
        if let Some(table) = slot.handlers.get() {
            return Ok(table);
        }
        let resolved = HandlerTable::resolve(version, HANDLER_REVISIONS)?;
        debug!(%version, "Handler table resolved");
        Ok(slot.handlers.get_or_init(|| resolved))
    }

    /// Validate the revision lists and resolve every version up front
    pub fn warm_up(&self) -> Result<()> {
        let _timer = Timer::start("registry_warm_up");
        validate_revisions(REVISIONS)?;
        validate_handler_revisions(HANDLER_REVISIONS)?;
        for version in known_versions() {
            self.codec(version)?;
            self.handlers(version)?;
        }
        info!(versions = KNOWN_VERSION_COUNT, "Protocol registry warmed up");
        Ok(())
    }

    /// Number of versions whose codec has been resolved
    pub fn resolved_count(&self) -> usize {
        self.slots.iter().filter(|s| s.codec.get().is_some()).count()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("resolved", &self.resolved_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_lazy_resolution() {
        let registry = Registry::new();
        assert_eq!(registry.resolved_count(), 0);
        registry.codec(ProtocolVersion::V174).unwrap();
        assert_eq!(registry.resolved_count(), 1);
        registry.codec(ProtocolVersion::V174).unwrap();
        assert_eq!(registry.resolved_count(), 1);
    }

    #[test]
    fn test_unknown_version() {
        let registry = Registry::new();
        assert!(matches!(
            registry.codec(ProtocolVersion::new(1200)),
            Err(ProtocolError::UnsupportedVersion(1200))
        ));
        assert!(registry.handlers(ProtocolVersion::new(100)).is_err());
    }

    #[test]
    fn test_concurrent_first_use_keeps_one_table() {
        let registry = Arc::new(Registry::new());
        let addrs: Vec<usize> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let registry = registry.clone();
                    s.spawn(move || {
                        registry.codec(ProtocolVersion::V1125).unwrap() as *const ResolvedCodec
                            as usize
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(addrs.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_warm_up_resolves_everything() {
        let registry = Registry::new();
        registry.warm_up().unwrap();
        assert_eq!(registry.resolved_count(), KNOWN_VERSION_COUNT);
    }
}
