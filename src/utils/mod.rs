//! # Utility Modules
//!
//! Supporting utilities shared by the codec and the transport.
//!
//! ## Components
//! - **Buffer Pool**: reusable send buffers for coalesced writes
//! - **Hexdump**: packet rendering for diagnostics
//! - **Logging**: `tracing-subscriber` setup from [`LoggingConfig`](crate::config::LoggingConfig)
//! - **Metrics**: process-wide atomic counters

pub mod buffer_pool;
pub mod hexdump;
pub mod logging;
pub mod metrics;

pub use hexdump::hexdump;
pub use metrics::global_metrics;
