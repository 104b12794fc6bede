//! Observability and Metrics
//!
//! Process-wide counters for the protocol layer. Every counter is a relaxed
//! atomic so recording never contends with other connections.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Global metrics collector for protocol operations
#[derive(Debug)]
pub struct Metrics {
    /// Total connections accepted
    pub connections_total: AtomicU64,
    /// Currently open connections
    pub connections_active: AtomicU64,
    /// Packets handed to the socket
    pub packets_sent: AtomicU64,
    /// Packets reassembled from the wire
    pub packets_received: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub bytes_received: AtomicU64,
    /// Socket writes that carried more than one packet
    pub coalesced_writes: AtomicU64,
    /// UDP packets rerouted over TCP
    pub udp_fallbacks: AtomicU64,
    pub checksum_failures: AtomicU64,
    /// Inbound packets refused for the session's phase
    pub preprocessor_drops: AtomicU64,
    /// Handlers that returned an error or panicked
    pub handler_errors: AtomicU64,
    /// Outbound frames above the client limit
    pub oversized_packets: AtomicU64,
    /// Connections that ended on an I/O error
    pub connection_errors: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            packets_sent: AtomicU64::new(0),
            packets_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            coalesced_writes: AtomicU64::new(0),
            udp_fallbacks: AtomicU64::new(0),
            checksum_failures: AtomicU64::new(0),
            preprocessor_drops: AtomicU64::new(0),
            handler_errors: AtomicU64::new(0),
            oversized_packets: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn connection_established(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record one socket write of `packets` frames totalling `byte_count`
    pub fn write_completed(&self, packets: u64, byte_count: u64) {
        self.packets_sent.fetch_add(packets, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
        if packets > 1 {
            self.coalesced_writes.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn packet_received(&self, byte_count: u64) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn udp_fallback(&self) {
        self.udp_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn checksum_failure(&self) {
        self.checksum_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn preprocessor_drop(&self) {
        self.preprocessor_drops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handler_error(&self) {
        self.handler_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn oversized_packet(&self) {
        self.oversized_packets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_error(&self) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            coalesced_writes: self.coalesced_writes.load(Ordering::Relaxed),
            udp_fallbacks: self.udp_fallbacks.load(Ordering::Relaxed),
            checksum_failures: self.checksum_failures.load(Ordering::Relaxed),
            preprocessor_drops: self.preprocessor_drops.load(Ordering::Relaxed),
            handler_errors: self.handler_errors.load(Ordering::Relaxed),
            oversized_packets: self.oversized_packets.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let s = self.snapshot();
        info!(
            connections_total = s.connections_total,
            connections_active = s.connections_active,
            packets_sent = s.packets_sent,
            packets_received = s.packets_received,
            bytes_sent = s.bytes_sent,
            bytes_received = s.bytes_received,
            coalesced_writes = s.coalesced_writes,
            udp_fallbacks = s.udp_fallbacks,
            checksum_failures = s.checksum_failures,
            preprocessor_drops = s.preprocessor_drops,
            handler_errors = s.handler_errors,
            oversized_packets = s.oversized_packets,
            connection_errors = s.connection_errors,
            uptime_seconds = s.uptime_seconds,
            "Protocol metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connections_active: u64,
    pub packets_sent: u64,
    pub packets_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub coalesced_writes: u64,
    pub udp_fallbacks: u64,
    pub checksum_failures: u64,
    pub preprocessor_drops: u64,
    pub handler_errors: u64,
    pub oversized_packets: u64,
    pub connection_errors: u64,
    pub uptime_seconds: u64,
}

static METRICS: once_cell::sync::Lazy<Metrics> = once_cell::sync::Lazy::new(Metrics::new);

/// Get the global metrics instance
pub fn global_metrics() -> &'static Metrics {
    &METRICS
}

/// Timer that logs how long an operation took when dropped
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        debug!(
            operation = self.operation,
            duration_ms = self.start.elapsed().as_millis(),
            "Operation completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coalesced_write_counted_once() {
        let m = Metrics::new();
        m.write_completed(1, 100);
        m.write_completed(3, 1400);
        let s = m.snapshot();
        assert_eq!(s.packets_sent, 4);
        assert_eq!(s.bytes_sent, 1500);
        assert_eq!(s.coalesced_writes, 1);
    }

    #[test]
    fn test_connection_gauge() {
        let m = Metrics::new();
        m.connection_established();
        m.connection_established();
        m.connection_closed();
        let s = m.snapshot();
        assert_eq!(s.connections_total, 2);
        assert_eq!(s.connections_active, 1);
    }
}
