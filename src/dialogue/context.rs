//! Snapshot of public and secret game state handed to dialogue backends

use crate::game::{Phase, Role};

/// Number of recent chat lines a backend gets to see
pub const HISTORY_WINDOW: usize = 6;

/// A living player as seen by a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerView {
    pub name: String,
    pub role: Role,
}

/// Everything a backend needs to write one discussion
///
/// Built by the engine on the consumer thread and moved to whichever thread
/// runs the backend; it holds no references back into the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameContext {
    pub round: u32,
    pub phase: Phase,
    pub alive: Vec<PlayerView>,
    pub eliminated: Vec<String>,
    pub found_wolves: Vec<String>,
    /// Most recent public lines, oldest first: (speaker, text)
    pub history: Vec<(String, String)>,
    /// Number of lines the discussion should contain
    pub lines: usize,
    /// Seed for any randomness the backend needs
    pub seed: u64,
}

impl GameContext {
    pub fn alive_names(&self) -> Vec<&str> {
        self.alive.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn is_alive(&self, name: &str) -> bool {
        self.alive.iter().any(|p| p.name == name)
    }

    pub fn role_of(&self, name: &str) -> Option<Role> {
        self.alive.iter().find(|p| p.name == name).map(|p| p.role)
    }
}

#[cfg(test)]
pub(crate) fn sample_context(names: &[(&str, Role)], lines: usize, seed: u64) -> GameContext {
    GameContext {
        round: 1,
        phase: Phase::DayDiscussion,
        alive: names
            .iter()
            .map(|(name, role)| PlayerView {
                name: name.to_string(),
                role: *role,
            })
            .collect(),
        eliminated: Vec::new(),
        found_wolves: Vec::new(),
        history: Vec::new(),
        lines,
        seed,
    }
}
