//! Character roster: the names and voices players are drawn from
//!
//! Loaded once at startup from JSON:
//!
//! ```json
//! { "characters": [ { "name": "Ada", "voice_id": "en-f-1" } ] }
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("cannot read roster {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid roster: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("roster has no characters")]
    Empty,
    #[error("roster lists {0} more than once")]
    DuplicateName(String),
}

/// A named character with a speech voice
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Character {
    pub name: String,
    #[serde(default)]
    pub voice_id: String,
}

impl Character {
    pub fn new(name: &str, voice_id: &str) -> Self {
        Self {
            name: name.to_string(),
            voice_id: voice_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Roster {
    characters: Vec<Character>,
}

impl Roster {
    /// Build a roster, rejecting empty rosters and repeated names
    pub fn new(characters: Vec<Character>) -> Result<Self, RosterError> {
        let roster = Self { characters };
        roster.validate()?;
        Ok(roster)
    }

    pub fn from_json(text: &str) -> Result<Self, RosterError> {
        let roster: Roster = serde_json::from_str(text)?;
        roster.validate()?;
        Ok(roster)
    }

    pub fn load(path: &Path) -> Result<Self, RosterError> {
        let text = fs::read_to_string(path).map_err(|source| RosterError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    fn validate(&self) -> Result<(), RosterError> {
        if self.characters.is_empty() {
            return Err(RosterError::Empty);
        }
        let mut seen = HashSet::new();
        for c in &self.characters {
            if !seen.insert(c.name.as_str()) {
                return Err(RosterError::DuplicateName(c.name.clone()));
            }
        }
        Ok(())
    }

    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    /// Twenty villagers, enough for the largest table
    pub fn builtin() -> Self {
        const NAMES: [(&str, &str); 20] = [
            ("Ada", "alto-1"),
            ("Bram", "bass-1"),
            ("Cleo", "soprano-1"),
            ("Dov", "tenor-1"),
            ("Elin", "alto-2"),
            ("Fenn", "baritone-1"),
            ("Greta", "soprano-2"),
            ("Hugo", "bass-2"),
            ("Iris", "alto-3"),
            ("Jonas", "tenor-2"),
            ("Kira", "soprano-3"),
            ("Lars", "baritone-2"),
            ("Mira", "alto-4"),
            ("Nils", "tenor-3"),
            ("Odile", "soprano-4"),
            ("Piet", "bass-3"),
            ("Quinn", "alto-5"),
            ("Rosa", "soprano-5"),
            ("Sven", "baritone-3"),
            ("Tova", "alto-6"),
        ];
        Self {
            characters: NAMES
                .iter()
                .map(|(name, voice)| Character::new(name, voice))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_roster_covers_largest_table() {
        let roster = Roster::builtin();
        assert_eq!(roster.len(), 20);
        assert!(roster.validate().is_ok());
    }

    #[test]
    fn test_load_roster_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"characters": [{{"name": "Ada", "voice_id": "v1"}}, {{"name": "Bram"}}]}}"#
        )
        .unwrap();

        let roster = Roster::load(file.path()).unwrap();
        assert_eq!(
            roster.characters(),
            &[Character::new("Ada", "v1"), Character::new("Bram", "")]
        );
    }

    #[test]
    fn test_rejects_duplicates_and_empty() {
        let dup = r#"{"characters": [{"name": "Ada"}, {"name": "Ada"}]}"#;
        assert!(matches!(
            Roster::from_json(dup),
            Err(RosterError::DuplicateName(name)) if name == "Ada"
        ));
        assert!(matches!(
            Roster::from_json(r#"{"characters": []}"#),
            Err(RosterError::Empty)
        ));
        assert!(matches!(
            Roster::from_json("not json"),
            Err(RosterError::Parse(_))
        ));
    }
}
