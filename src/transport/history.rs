//! Per-session ring of the most recent packets.
//!
//! Kept for post-mortem logging only: when a session fails an integrity
//! check the ring is dumped so the bytes leading up to the failure are
//! visible in the log.

use std::collections::VecDeque;
use std::fmt::Write;
use std::sync::Mutex;

use bytes::Bytes;

use crate::config::PACKET_HISTORY_SIZE;
use crate::utils::hexdump;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub direction: Direction,
    pub opcode: u8,
    pub frame: Bytes,
}

/// Bounded FIFO of the last [`PACKET_HISTORY_SIZE`] packets
#[derive(Debug, Default)]
pub struct PacketHistory {
    entries: Mutex<VecDeque<HistoryEntry>>,
}

impl PacketHistory {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(PACKET_HISTORY_SIZE)),
        }
    }

    pub fn record(&self, direction: Direction, opcode: u8, frame: Bytes) {
        if let Ok(mut entries) = self.entries.lock() {
            if entries.len() == PACKET_HISTORY_SIZE {
                entries.pop_front();
            }
            entries.push_back(HistoryEntry {
                direction,
                opcode,
                frame,
            });
        }
    }

    /// Oldest first
    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries
            .lock()
            .map(|e| e.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    /// Hexdump of every recorded packet, oldest first
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (i, entry) in self.snapshot().iter().enumerate() {
            let arrow = match entry.direction {
                Direction::Inbound => "<=",
                Direction::Outbound => "=>",
            };
            let title = format!("#{i} {arrow} 0x{:02X}", entry.opcode);
            let _ = write!(out, "{}", hexdump(&title, &entry.frame));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_keeps_last_sixteen() {
        let history = PacketHistory::new();
        for op in 0..20u8 {
            history.record(Direction::Inbound, op, Bytes::from(vec![op]));
        }
        let entries = history.snapshot();
        assert_eq!(entries.len(), PACKET_HISTORY_SIZE);
        assert_eq!(entries[0].opcode, 4);
        assert_eq!(entries[PACKET_HISTORY_SIZE - 1].opcode, 19);
    }

    #[test]
    fn test_dump_marks_direction() {
        let history = PacketHistory::new();
        history.record(Direction::Inbound, 0xA9, Bytes::from_static(&[0, 2, 0xA9, 0]));
        history.record(Direction::Outbound, 0x29, Bytes::from_static(&[0, 2, 0x29, 0]));
        let dump = history.dump();
        assert!(dump.contains("#0 <= 0xA9"));
        assert!(dump.contains("#1 => 0x29"));

        history.clear();
        assert!(history.is_empty());
    }
}
