//! Offline speaker model
//!
//! Each player gets an [`Agent`] that keeps suspicion scores about the
//! others, updated from the recent public chat. The scores decide what kind
//! of line the agent says next (hedge, question, accuse, agree, deflect) and
//! who it is about.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

use super::templates::{render, TemplateBank};
use crate::game::Role;

/// Suspicion added to a speaker who uses a suspicious word
const SUSPICIOUS_WORD_WEIGHT: f64 = 0.15;

/// Suspicion added to a player who is mentioned by name
const MENTION_WEIGHT: f64 = 0.10;

const MAX_SUSPICION: f64 = 5.0;

const SUSPICIOUS_WORDS: &[&str] = &["suspect", "hiding", "strange", "wolf", "lying"];

/// Kind of line an agent decides to say
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Hedge,
    Question,
    Accuse,
    Agree,
    Deflect,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Hedge => "hedge",
            Action::Question => "question",
            Action::Accuse => "accuse",
            Action::Agree => "agree",
            Action::Deflect => "deflect",
        }
    }
}

/// One player's private view of the table
#[derive(Debug, Clone)]
pub struct Agent {
    name: String,
    role: Role,
    rng: StdRng,
    suspicion: BTreeMap<String, f64>,
}

impl Agent {
    pub fn new(name: &str, role: Role, seed: u64) -> Self {
        Self {
            name: name.to_string(),
            role,
            rng: StdRng::seed_from_u64(seed),
            suspicion: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn suspicion_of(&self, name: &str) -> f64 {
        self.suspicion.get(name).copied().unwrap_or(0.0)
    }

    /// Update suspicion from the living players and the recent chat
    pub fn observe(&mut self, alive: &[&str], recent: &[(String, String)]) {
        for name in alive {
            if *name != self.name {
                self.suspicion.entry(name.to_string()).or_insert(0.0);
            }
        }

        for (speaker, text) in recent {
            let lower = text.to_lowercase();
            if *speaker != self.name && SUSPICIOUS_WORDS.iter().any(|w| lower.contains(w)) {
                *self.suspicion.entry(speaker.clone()).or_insert(0.0) += SUSPICIOUS_WORD_WEIGHT;
            }
            for (target, score) in self.suspicion.iter_mut() {
                if text.contains(target.as_str()) {
                    *score += MENTION_WEIGHT;
                }
            }
        }

        for score in self.suspicion.values_mut() {
            *score = score.clamp(0.0, MAX_SUSPICION);
        }
    }

    /// Pick what to say next, rendered from the template bank
    pub fn decide_message(&mut self, alive: &[&str], bank: &TemplateBank) -> String {
        let candidates: Vec<&str> = alive.iter().copied().filter(|n| *n != self.name).collect();
        if candidates.is_empty() {
            return "...".to_string();
        }

        let action = match self.role {
            Role::Villager => choose_action_for_villager(&mut self.rng, &self.suspicion),
            Role::Wolf => choose_action_for_wolf(&mut self.rng, &self.suspicion),
        };

        let target = if action == Action::Hedge {
            candidates.choose(&mut self.rng).map(|s| s.to_string())
        } else {
            pick_target_weighted(&mut self.rng, &self.suspicion, &candidates)
        }
        .unwrap_or_default();

        let template = bank
            .bank(self.role, action)
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_else(|| "{target}...".to_string());

        let common = bank.common();
        let pick = |rng: &mut StdRng, items: &[String]| items.choose(rng).cloned().unwrap_or_default();
        let connector = pick(&mut self.rng, &common.connectors);
        let softener = pick(&mut self.rng, &common.softeners);
        let ending = pick(&mut self.rng, &common.endings);

        render(&template, &target, &connector, &softener, &ending)
    }
}

fn top_suspicion(suspicion: &BTreeMap<String, f64>) -> Option<f64> {
    suspicion.values().copied().reduce(f64::max)
}

fn weighted_action(rng: &mut StdRng, choices: &[(Action, f64)]) -> Action {
    choices
        .choose_weighted(rng, |(_, weight)| *weight)
        .map(|(action, _)| *action)
        .unwrap_or(Action::Hedge)
}

/// Villagers press harder the more suspicious someone looks
pub fn choose_action_for_villager(rng: &mut StdRng, suspicion: &BTreeMap<String, f64>) -> Action {
    match top_suspicion(suspicion) {
        None => Action::Hedge,
        Some(top) if top > 2.0 => {
            weighted_action(rng, &[(Action::Accuse, 0.7), (Action::Question, 0.3)])
        }
        Some(top) if top > 1.0 => weighted_action(
            rng,
            &[(Action::Question, 0.5), (Action::Accuse, 0.2), (Action::Hedge, 0.3)],
        ),
        Some(_) => weighted_action(
            rng,
            &[(Action::Hedge, 0.6), (Action::Question, 0.25), (Action::Agree, 0.15)],
        ),
    }
}

/// Wolves mostly deflect, and pile on once the table has a suspect
pub fn choose_action_for_wolf(rng: &mut StdRng, suspicion: &BTreeMap<String, f64>) -> Action {
    match top_suspicion(suspicion) {
        None => weighted_action(rng, &[(Action::Hedge, 0.5), (Action::Deflect, 0.5)]),
        Some(top) if top > 1.5 => weighted_action(
            rng,
            &[(Action::Accuse, 0.55), (Action::Deflect, 0.35), (Action::Agree, 0.10)],
        ),
        Some(_) => weighted_action(
            rng,
            &[(Action::Deflect, 0.55), (Action::Hedge, 0.30), (Action::Agree, 0.15)],
        ),
    }
}

/// Pick a candidate with probability proportional to its suspicion
///
/// Falls back to a uniform pick when nobody is suspected at all.
pub fn pick_target_weighted(
    rng: &mut StdRng,
    weights: &BTreeMap<String, f64>,
    candidates: &[&str],
) -> Option<String> {
    let items: Vec<(&str, f64)> = candidates
        .iter()
        .map(|c| (*c, weights.get(*c).copied().unwrap_or(0.0).max(0.0)))
        .collect();
    let total: f64 = items.iter().map(|(_, w)| w).sum();
    if total <= 1e-9 {
        return candidates.choose(rng).map(|c| c.to_string());
    }

    let mut roll = rng.random::<f64>() * total;
    for (name, weight) in &items {
        if roll <= *weight {
            return Some(name.to_string());
        }
        roll -= weight;
    }
    items.last().map(|(name, _)| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(lines: &[(&str, &str)]) -> Vec<(String, String)> {
        lines
            .iter()
            .map(|(s, t)| (s.to_string(), t.to_string()))
            .collect()
    }

    #[test]
    fn test_observe_scores_suspicious_speakers_and_mentions() {
        let mut agent = Agent::new("Ada", Role::Villager, 7);
        agent.observe(
            &["Ada", "Bram", "Cleo"],
            &history(&[("Bram", "Cleo is hiding something"), ("Cleo", "fine")]),
        );
        assert!((agent.suspicion_of("Bram") - 0.15).abs() < 1e-9);
        assert!((agent.suspicion_of("Cleo") - 0.10).abs() < 1e-9);
        assert_eq!(agent.suspicion_of("Ada"), 0.0);
    }

    #[test]
    fn test_observe_clamps_scores() {
        let mut agent = Agent::new("Ada", Role::Villager, 7);
        let noisy: Vec<(String, String)> = (0..100)
            .map(|_| ("Bram".to_string(), "I suspect everyone, Bram included".to_string()))
            .collect();
        agent.observe(&["Ada", "Bram"], &noisy);
        assert_eq!(agent.suspicion_of("Bram"), MAX_SUSPICION);
    }

    #[test]
    fn test_villager_without_suspicion_hedges() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            choose_action_for_villager(&mut rng, &BTreeMap::new()),
            Action::Hedge
        );
    }

    #[test]
    fn test_high_suspicion_villager_never_hedges() {
        let mut rng = StdRng::seed_from_u64(5);
        let scores = BTreeMap::from([("Bram".to_string(), 3.0)]);
        for _ in 0..50 {
            let action = choose_action_for_villager(&mut rng, &scores);
            assert!(matches!(action, Action::Accuse | Action::Question));
        }
    }

    #[test]
    fn test_weighted_target_prefers_only_weighted_candidate() {
        let mut rng = StdRng::seed_from_u64(11);
        let scores = BTreeMap::from([("Bram".to_string(), 2.0), ("Cleo".to_string(), 0.0)]);
        for _ in 0..20 {
            let target = pick_target_weighted(&mut rng, &scores, &["Bram", "Cleo"]);
            assert_eq!(target.as_deref(), Some("Bram"));
        }
    }

    #[test]
    fn test_decide_message_mentions_someone_else() {
        let bank = TemplateBank::builtin();
        let mut agent = Agent::new("Ada", Role::Wolf, 3);
        let alive = ["Ada", "Bram", "Cleo"];
        agent.observe(&alive, &[]);
        for _ in 0..10 {
            let msg = agent.decide_message(&alive, &bank);
            assert!(!msg.is_empty());
            assert!(!msg.contains('{'), "unrendered placeholder in {msg}");
        }
    }

    #[test]
    fn test_lonely_agent_stays_silent() {
        let bank = TemplateBank::builtin();
        let mut agent = Agent::new("Ada", Role::Villager, 3);
        assert_eq!(agent.decide_message(&["Ada"], &bank), "...");
    }
}
