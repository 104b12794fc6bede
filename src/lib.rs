//! # Game Protocol
//!
//! Server-side wire protocol for a session-oriented binary game client.
//!
//! One server process speaks to clients of every supported historical
//! version. A client announces its version in its first packet; from then on
//! its session encodes and decodes through the flat tables resolved for that
//! version.
//!
//! ## Layout
//! - [`core`]: binary primitives, checksum and frame codec
//! - [`protocol`]: versions, messages, the codec revision chain, inbound
//!   decoding and dispatch
//! - [`transport`]: sessions, coalesced send queues, TCP server and UDP channel
//! - [`config`], [`error`], [`utils`]: configuration, errors, logging and metrics

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use error::{ProtocolError, Result};
