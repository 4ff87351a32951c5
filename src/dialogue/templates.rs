//! Template bank for offline dialogue
//!
//! Templates are short sentences with four placeholders:
//! `{target}` (a player name), `{c}` (connector), `{s}` (softener) and
//! `{e}` (ending). Each role has one bank per [`Action`]; a missing bank
//! falls back to `hedge`, which every role must provide.
//!
//! The on-disk format is JSON:
//!
//! ```json
//! {
//!   "villager": { "hedge": ["..."], "accuse": ["..."] },
//!   "wolf":     { "hedge": ["..."], "deflect": ["..."] },
//!   "common":   { "connectors": [""], "softeners": [""], "endings": ["."] }
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use super::agent::Action;
use crate::game::Role;

/// Error loading a template bank
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("cannot read template file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid template file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("the {0} templates have no non-empty \"hedge\" bank")]
    MissingHedge(Role),
}

/// Phrases mixed into every template
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommonPhrases {
    #[serde(default)]
    pub connectors: Vec<String>,
    #[serde(default)]
    pub softeners: Vec<String>,
    #[serde(default)]
    pub endings: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateBank {
    villager: HashMap<String, Vec<String>>,
    wolf: HashMap<String, Vec<String>>,
    #[serde(default)]
    common: CommonPhrases,
}

impl TemplateBank {
    /// Parse and validate a bank from JSON text
    pub fn from_json(text: &str) -> Result<Self, TemplateError> {
        let bank: TemplateBank = serde_json::from_str(text)?;
        bank.validate()?;
        Ok(bank)
    }

    /// Load a bank from a JSON file
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let text = fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    fn validate(&self) -> Result<(), TemplateError> {
        for role in [Role::Villager, Role::Wolf] {
            let has_hedge = self
                .role_banks(role)
                .get(Action::Hedge.as_str())
                .is_some_and(|bank| !bank.is_empty());
            if !has_hedge {
                return Err(TemplateError::MissingHedge(role));
            }
        }
        Ok(())
    }

    fn role_banks(&self, role: Role) -> &HashMap<String, Vec<String>> {
        match role {
            Role::Villager => &self.villager,
            Role::Wolf => &self.wolf,
        }
    }

    /// Templates for an action, or the role's hedge bank when there are none
    pub fn bank(&self, role: Role, action: Action) -> &[String] {
        let banks = self.role_banks(role);
        banks
            .get(action.as_str())
            .filter(|bank| !bank.is_empty())
            .or_else(|| banks.get(Action::Hedge.as_str()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn common(&self) -> &CommonPhrases {
        &self.common
    }

    /// The bank compiled into the binary
    pub fn builtin() -> Self {
        let bank = |entries: &[(&str, &[&str])]| -> HashMap<String, Vec<String>> {
            entries
                .iter()
                .map(|(action, lines)| {
                    (
                        action.to_string(),
                        lines.iter().map(|l| l.to_string()).collect(),
                    )
                })
                .collect()
        };
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();

        Self {
            villager: bank(&[
                (
                    "hedge",
                    &[
                        "{c}{s}I don't have a clear read yet{e}",
                        "{c}{s}we should hear from {target} before deciding{e}",
                        "{c}nobody has said anything useful so far{e}",
                    ],
                ),
                (
                    "question",
                    &[
                        "{c}{target}, where were you when the screams started{e}",
                        "{c}{s}{target} has been very quiet, why is that{e}",
                        "{c}{target}, who do you suspect then{e}",
                    ],
                ),
                (
                    "accuse",
                    &[
                        "{c}{s}{target} is hiding something{e}",
                        "{c}I'm voting {target} if nothing changes{e}",
                        "{c}{target} keeps changing their story{e}",
                    ],
                ),
                (
                    "agree",
                    &[
                        "{c}{s}I agree with what was said about {target}{e}",
                        "{c}same feeling here about {target}{e}",
                    ],
                ),
            ]),
            wolf: bank(&[
                (
                    "hedge",
                    &[
                        "{c}{s}it's too early to point fingers{e}",
                        "{c}let's not rush, {target} could be innocent{e}",
                    ],
                ),
                (
                    "deflect",
                    &[
                        "{c}why is everyone ignoring {target}{e}",
                        "{c}{s}{target} is steering the vote a little too hard{e}",
                        "{c}I'd rather look at {target} than at me{e}",
                    ],
                ),
                (
                    "accuse",
                    &[
                        "{c}{s}{target} is the wolf, it's obvious{e}",
                        "{c}{target} was acting strange last night{e}",
                    ],
                ),
                (
                    "agree",
                    &["{c}{s}you're right about {target}{e}", "{c}good point about {target}{e}"],
                ),
            ]),
            common: CommonPhrases {
                connectors: strings(&["", "Honestly, ", "Frankly, ", "Look, ", "Personally, "]),
                softeners: strings(&["", "I think ", "it seems ", "maybe "]),
                endings: strings(&[".", "...", "!", "."]),
            },
        }
    }
}

/// Fill a template's placeholders
pub fn render(template: &str, target: &str, connector: &str, softener: &str, ending: &str) -> String {
    let text = template
        .replace("{target}", target)
        .replace("{c}", connector)
        .replace("{s}", softener)
        .replace("{e}", ending);
    capitalize_first(text.trim())
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
