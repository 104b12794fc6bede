//! # Transport Layer
//!
//! Session processing over TCP and UDP.
//!
//! ## Components
//! - **Server**: TCP accept loop and per-connection reader tasks
//! - **Session**: version binding, phase and the outbound send path
//! - **Outbound**: coalescing send queues, one write in flight per transport
//! - **UDP**: the shared UDP socket and endpoint lookup
//! - **History**: the last packets of a session for post-mortem logging

pub mod history;
pub mod outbound;
pub mod server;
pub mod session;
pub mod udp;
