//! Players, roles and the roster the engine owns

use std::fmt;

/// Index of a player in the engine's roster
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlayerId(pub usize);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Secret role of a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Villager,
    Wolf,
}

impl Role {
    pub fn is_wolf(self) -> bool {
        self == Role::Wolf
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Villager => "villager",
            Role::Wolf => "wolf",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Highest value the free-form annotation can hold
pub const MAX_NOTE: u8 = 3;

/// A seat at the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub role: Role,
    pub alive: bool,
    /// Free-form annotation (0-3), cleared on death
    pub note: u8,
    /// Speech voice used when this player's lines are spoken
    pub voice_id: String,
}

impl Player {
    pub fn new(id: PlayerId, name: &str, role: Role, voice_id: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            role,
            alive: true,
            note: 0,
            voice_id: voice_id.to_string(),
        }
    }

    /// Set the annotation, saturating at [`MAX_NOTE`]
    pub fn set_note(&mut self, note: u8) {
        self.note = note.min(MAX_NOTE);
    }

    pub(crate) fn kill(&mut self) {
        self.alive = false;
        self.note = 0;
    }
}
