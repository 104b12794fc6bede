//! Continuation packets for lists that outgrow one packet.
//!
//! Two shapes exist.
//!
//! Indexed lists (the skill list) carry `[count][subtype][first]` after a
//! fixed prefix. A list encoder calls [`SplitState::step`] before writing
//! each entry. When the current payload has grown past the layout's
//! threshold, or already holds [`MAX_LIST_ENTRIES`], the triple of that
//! packet is patched, the payload is handed back to the caller, and a fresh
//! payload with a continuation header takes its place. [`SplitState::close`]
//! patches and returns the last one.
//!
//! Counted lists repeat one header with a per-packet entry count.
//! [`pack_list`] measures every entry before placing it, so each payload
//! stays within [`MAX_PAYLOAD_SIZE`].

use crate::config::MAX_PAYLOAD_SIZE;
use crate::core::buffer::PacketWriter;
use crate::error::{ProtocolError, Result};

/// Entries one packet can announce in its count byte
pub const MAX_LIST_ENTRIES: usize = u8::MAX as usize;

/// Largest threshold that still leaves room for one entry of `max_entry` bytes
pub const fn threshold_for(max_entry: usize) -> usize {
    MAX_PAYLOAD_SIZE - max_entry
}

/// Split policy of one indexed list layout
#[derive(Debug, Clone, Copy)]
pub struct SplitRule {
    /// Payload length past which the packet is closed
    pub threshold: usize,
    /// Subtype patched into the first packet when it is closed early
    pub first_subtype: u8,
    /// Subtype of every other packet
    pub subtype: u8,
    /// Bytes preceding the patched triple in every packet
    pub prefix: &'static [u8],
}

impl SplitRule {
    fn header_len(&self) -> usize {
        self.prefix.len() + 3
    }
}

/// Progress through a list: current payload, entries seen, first index
#[derive(Debug)]
pub struct SplitState {
    pub writer: PacketWriter,
    pub count: usize,
    pub first: usize,
}

impl SplitState {
    /// Start a list with its opening header
    pub fn open(rule: &SplitRule) -> Self {
        let mut writer = PacketWriter::new();
        write_header(&mut writer, rule, 0, 0);
        Self {
            writer,
            count: 0,
            first: 0,
        }
    }

    /// Make room for one more entry.
    ///
    /// Returns the state to write the entry into and the payload that was
    /// closed to make room, if any.
    pub fn step(mut self, rule: &SplitRule) -> Result<(Self, Option<Vec<u8>>)> {
        let mut closed = None;

        let held = self.count - self.first;
        if held > 0 && (self.writer.len() > rule.threshold || held >= MAX_LIST_ENTRIES) {
            let subtype = if self.first == 0 {
                rule.first_subtype
            } else {
                rule.subtype
            };
            self.patch(rule, subtype)?;

            let mut writer = PacketWriter::new();
            write_header(&mut writer, rule, self.count, self.first);
            closed = Some(std::mem::replace(&mut self.writer, writer).finish());
            self.first = self.count;
        }

        self.count += 1;
        Ok((self, closed))
    }

    /// Patch the final header and return the last payload, if it holds entries
    pub fn close(mut self, rule: &SplitRule) -> Result<Option<Vec<u8>>> {
        if self.writer.len() <= rule.header_len() {
            return Ok(None);
        }
        self.patch(rule, rule.subtype)?;
        Ok(Some(self.writer.finish()))
    }

    fn patch(&mut self, rule: &SplitRule, subtype: u8) -> Result<()> {
        let first = u8::try_from(self.first).map_err(|_| ProtocolError::ListTooLong {
            entries: self.count,
        })?;
        let base = rule.prefix.len();
        self.writer.patch_u8(base, (self.count - self.first) as u8)?;
        self.writer.patch_u8(base + 1, subtype)?;
        self.writer.patch_u8(base + 2, first)
    }
}

fn write_header(writer: &mut PacketWriter, rule: &SplitRule, count: usize, first: usize) {
    writer.write_bytes(rule.prefix);
    writer.write_u8(count as u8);
    writer.write_u8(rule.subtype);
    writer.write_u8(first as u8);
}

/// Layout of a list whose packets each repeat the same header
#[derive(Debug, Clone, Copy)]
pub struct ListLayout<'a> {
    /// Bytes opening every packet
    pub header: &'a [u8],
    /// Offset in `header` patched with the entry count of each packet
    pub count_at: Option<usize>,
    /// Bytes closing every packet
    pub trailer: &'a [u8],
    /// Entries one packet may hold
    pub max_entries: usize,
}

impl<'a> ListLayout<'a> {
    /// Header with a count byte at `count_at` and no trailer
    pub const fn counted(header: &'a [u8], count_at: usize) -> Self {
        Self {
            header,
            count_at: Some(count_at),
            trailer: &[],
            max_entries: MAX_LIST_ENTRIES,
        }
    }

    pub const fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub const fn with_trailer(mut self, trailer: &'a [u8]) -> Self {
        self.trailer = trailer;
        self
    }
}

/// Pack `entries` into as many payloads as needed.
///
/// An empty list still yields one payload announcing zero entries.
pub fn pack_list<T>(
    layout: &ListLayout<'_>,
    entries: impl IntoIterator<Item = T>,
    mut write: impl FnMut(&mut PacketWriter, T),
) -> Result<Vec<Vec<u8>>> {
    let budget = MAX_PAYLOAD_SIZE - layout.trailer.len();
    let mut payloads = Vec::new();
    let mut current = PacketWriter::new();
    current.write_bytes(layout.header);
    let mut held = 0usize;

    for entry in entries {
        let mut scratch = PacketWriter::new();
        write(&mut scratch, entry);
        let bytes = scratch.finish();
        if layout.header.len() + bytes.len() > budget {
            return Err(ProtocolError::OversizedPacket(
                layout.header.len() + bytes.len() + layout.trailer.len(),
            ));
        }

        if held > 0 && (held >= layout.max_entries || current.len() + bytes.len() > budget) {
            let full = std::mem::replace(&mut current, PacketWriter::new());
            payloads.push(seal(layout, full, held)?);
            current.write_bytes(layout.header);
            held = 0;
        }
        current.write_bytes(&bytes);
        held += 1;
    }

    if held > 0 || payloads.is_empty() {
        payloads.push(seal(layout, current, held)?);
    }
    Ok(payloads)
}

fn seal(layout: &ListLayout<'_>, mut writer: PacketWriter, held: usize) -> Result<Vec<u8>> {
    if let Some(at) = layout.count_at {
        writer.patch_u8(at, held as u8)?;
    }
    writer.write_bytes(layout.trailer);
    Ok(writer.finish())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    const RULE: SplitRule = SplitRule {
        threshold: 10,
        first_subtype: 99,
        subtype: 0x03,
        prefix: &[0x01],
    };

    fn run(rule: &SplitRule, entries: usize, entry_len: usize) -> Result<Vec<Vec<u8>>> {
        let mut state = SplitState::open(rule);
        let mut packets = Vec::new();
        for _ in 0..entries {
            let (mut next, closed) = state.step(rule)?;
            packets.extend(closed);
            next.writer.fill(0xAA, entry_len);
            state = next;
        }
        packets.extend(state.close(rule)?);
        Ok(packets)
    }

    #[test]
    fn test_large_threshold_one_packet() {
        let rule = SplitRule {
            threshold: threshold_for(8),
            ..RULE
        };
        let packets = run(&rule, 100, 8).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(&packets[0][..4], &[0x01, 100, 0x03, 0]);
    }

    #[test]
    fn test_split_patches_header_and_continues() {
        // header 4, then 8 and 12 bytes: the third entry opens a new packet
        let packets = run(&RULE, 3, 4).unwrap();
        assert_eq!(packets.len(), 2);
        assert_eq!(&packets[0][..4], &[0x01, 2, 99, 0]);
        assert_eq!(packets[0].len(), 12);
        assert_eq!(&packets[1][..4], &[0x01, 1, 0x03, 2]);
    }

    #[test]
    fn test_count_byte_never_wraps() {
        let rule = SplitRule {
            threshold: threshold_for(1),
            ..RULE
        };
        let packets = run(&rule, 300, 1).unwrap();
        assert_eq!(packets.len(), 2);
        assert_eq!(&packets[0][..4], &[0x01, 255, 99, 0]);
        assert_eq!(&packets[1][..4], &[0x01, 45, 0x03, 255]);
    }

    #[test]
    fn test_unindexable_list_rejected() {
        let rule = SplitRule {
            threshold: threshold_for(1),
            ..RULE
        };
        assert!(matches!(
            run(&rule, 600, 1),
            Err(ProtocolError::ListTooLong { .. })
        ));
    }

    #[test]
    fn test_empty_list_sends_nothing() {
        assert!(run(&RULE, 0, 4).unwrap().is_empty());
    }

    #[test]
    fn test_pack_list_splits_on_size() {
        let layout = ListLayout::counted(&[0x06, 0, 0x01], 1);
        let payloads = pack_list(&layout, 0..10u8, |w, i| w.fill(i, 500)).unwrap();
        assert_eq!(payloads.len(), 3);
        assert_eq!(&payloads[0][..3], &[0x06, 4, 0x01]);
        assert_eq!(&payloads[2][..3], &[0x06, 2, 0x01]);
        assert!(payloads.iter().all(|p| p.len() <= MAX_PAYLOAD_SIZE));
        assert_eq!(payloads[1][3], 4);
    }

    #[test]
    fn test_pack_list_entry_cap_and_trailer() {
        let layout = ListLayout::counted(&[0], 0)
            .with_max_entries(2)
            .with_trailer(&[0xEE]);
        let payloads = pack_list(&layout, [1u8, 2, 3], |w, b| w.write_u8(b)).unwrap();
        assert_eq!(payloads, vec![vec![2, 1, 2, 0xEE], vec![1, 3, 0xEE]]);
    }

    #[test]
    fn test_pack_list_empty_announces_zero() {
        let layout = ListLayout::counted(&[9, 0xFF], 1);
        let payloads = pack_list(&layout, std::iter::empty::<u8>(), |w, b| w.write_u8(b)).unwrap();
        assert_eq!(payloads, vec![vec![9, 0]]);
    }

    #[test]
    fn test_pack_list_rejects_entry_larger_than_a_packet() {
        let layout = ListLayout::counted(&[0], 0);
        let result = pack_list(&layout, [()], |w, _| w.fill(0, MAX_PAYLOAD_SIZE));
        assert!(matches!(result, Err(ProtocolError::OversizedPacket(_))));
    }
}
