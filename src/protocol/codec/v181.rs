//! 1.81: the spell list is closed by an empty line packet.

use super::base::{push_spell_lines, SpellListLayout, SPELL_LIST_168};
use super::{mismatch, CodecRevision, EncodeContext, Outbox};
use crate::error::Result;
use crate::protocol::message::{OperationId as Op, OutboundMessage as Msg};
use crate::protocol::version::ProtocolVersion;

pub(super) const REVISION: CodecRevision = CodecRevision {
    version: ProtocolVersion::new(181),
    parent: Some(ProtocolVersion::V180),
    encoders: &[(Op::SpellList, spell_list)],
    opcodes: &[],
};

pub(super) const SPELL_LIST_181: SpellListLayout = SpellListLayout {
    terminator: true,
    ..SPELL_LIST_168
};

fn spell_list(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::SpellList(lines) = msg else {
        return Err(mismatch(Op::SpellList));
    };
    push_spell_lines(out, lines, SPELL_LIST_181)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::protocol::codec::testing::encode_at;
    use crate::protocol::message::SpellLine;

    #[test]
    fn test_spell_list_terminated_from_181() {
        let msg = Msg::SpellList(vec![SpellLine {
            name: "Fire".into(),
            spells: Vec::new(),
        }]);
        assert_eq!(encode_at(ProtocolVersion::V180, &msg).len(), 1);

        let packets = encode_at(ProtocolVersion::new(181), &msg);
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[1].payload, vec![0x02, 0x00, 99, 0x00]);
    }
}
