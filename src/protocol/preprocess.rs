//! Inbound packet gating.
//!
//! Every inbound handler declares the least client status it needs. Packets
//! arriving before the session reached that status are dropped without a
//! response.

use std::fmt;

/// Coarse session state as far as inbound gating is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ClientPhase {
    #[default]
    PreLogin,
    CharacterSelect,
    InWorld,
}

impl fmt::Display for ClientPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClientPhase::PreLogin => "pre-login",
            ClientPhase::CharacterSelect => "character-select",
            ClientPhase::InWorld => "in-world",
        };
        f.write_str(name)
    }
}

/// Requirement attached to an inbound handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClientStatus {
    #[default]
    None,
    LoggedIn,
    PlayerInGame,
}

/// Whether a packet gated by `required` may run in `phase`
#[inline]
pub fn can_process(phase: ClientPhase, required: ClientStatus) -> bool {
    match required {
        ClientStatus::None => true,
        ClientStatus::LoggedIn => phase >= ClientPhase::CharacterSelect,
        ClientStatus::PlayerInGame => phase == ClientPhase::InWorld,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gating_table() {
        use ClientPhase::*;

        for phase in [PreLogin, CharacterSelect, InWorld] {
            assert!(can_process(phase, ClientStatus::None));
        }

        assert!(!can_process(PreLogin, ClientStatus::LoggedIn));
        assert!(can_process(CharacterSelect, ClientStatus::LoggedIn));
        assert!(can_process(InWorld, ClientStatus::LoggedIn));

        assert!(!can_process(PreLogin, ClientStatus::PlayerInGame));
        assert!(!can_process(CharacterSelect, ClientStatus::PlayerInGame));
        assert!(can_process(InWorld, ClientStatus::PlayerInGame));
    }
}
