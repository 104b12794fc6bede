#![no_main]

use game_protocol::core::packet::Packet;
use game_protocol::protocol::handshake::negotiate_version;
use game_protocol::protocol::registry::Registry;
use game_protocol::protocol::version::{known_versions, KNOWN_VERSION_COUNT};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = negotiate_version(data);

    // [version index][opcode][payload..] decoded with that version's handlers
    let [index, opcode, payload @ ..] = data else {
        return;
    };
    let Some(version) = known_versions().nth(*index as usize % KNOWN_VERSION_COUNT) else {
        return;
    };
    if let Ok(table) = Registry::global().handlers(version) {
        let _ = table.decode(&Packet::new(*opcode, payload.to_vec()));
    }
});
