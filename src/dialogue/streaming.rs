//! Streaming dialogue backed by the template agents
//!
//! [`TemplateBackend`] opens one [`TemplateStream`] per discussion. Each pull
//! picks a speaker, asks the optional [`LineGenerator`] for a line and falls
//! back to the speaker's [`Agent`] when the generator fails, so a pull always
//! yields a line until the discussion length is used up.

use std::collections::VecDeque;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

use super::agent::Agent;
use super::context::{GameContext, HISTORY_WINDOW};
use super::templates::TemplateBank;
use super::{DialogueLine, DialogueStream, GenerationError, StreamItem, StreamingBackend};
use crate::game::Role;

/// Recently rendered lines remembered to avoid repeats
const RECENT_WINDOW: usize = 60;

/// Attempts at rendering a line that was not said recently
const REPEAT_RETRIES: usize = 3;

/// Local text generator tried before the templates
pub trait LineGenerator: Send + Sync {
    fn generate_line(
        &self,
        speaker: &str,
        role: Role,
        ctx: &GameContext,
    ) -> Result<String, GenerationError>;
}

/// Streaming backend that never runs out of things to say
pub struct TemplateBackend {
    bank: Arc<TemplateBank>,
    generator: Option<Arc<dyn LineGenerator>>,
    rng: StdRng,
}

impl TemplateBackend {
    pub fn new(bank: Arc<TemplateBank>, seed: u64) -> Self {
        Self {
            bank,
            generator: None,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Try `generator` first for every line
    pub fn with_generator(mut self, generator: Arc<dyn LineGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }
}

impl StreamingBackend for TemplateBackend {
    fn open(&mut self, ctx: &GameContext) -> Box<dyn DialogueStream> {
        let seed = self.rng.random::<u64>() ^ ctx.seed;
        Box::new(TemplateStream::new(
            ctx.clone(),
            Arc::clone(&self.bank),
            self.generator.clone(),
            seed,
        ))
    }
}

/// One discussion's worth of lines
pub struct TemplateStream {
    ctx: GameContext,
    bank: Arc<TemplateBank>,
    generator: Option<Arc<dyn LineGenerator>>,
    agents: Vec<Agent>,
    rng: StdRng,
    remaining: usize,
    last_speaker: Option<String>,
    recent: VecDeque<String>,
    history: Vec<(String, String)>,
}

impl TemplateStream {
    pub fn new(
        ctx: GameContext,
        bank: Arc<TemplateBank>,
        generator: Option<Arc<dyn LineGenerator>>,
        seed: u64,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let agents = ctx
            .alive
            .iter()
            .map(|p| Agent::new(&p.name, p.role, rng.random::<u64>()))
            .collect();
        let history = ctx.history.clone();
        let remaining = if ctx.alive.is_empty() { 0 } else { ctx.lines };

        Self {
            ctx,
            bank,
            generator,
            agents,
            rng,
            remaining,
            last_speaker: None,
            recent: VecDeque::with_capacity(RECENT_WINDOW),
            history,
        }
    }

    /// Lines still to be produced
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    fn pick_speaker(&mut self) -> Option<usize> {
        let indices: Vec<usize> = (0..self.agents.len())
            .filter(|&i| {
                self.agents.len() == 1
                    || self.last_speaker.as_deref() != Some(self.agents[i].name())
            })
            .collect();
        indices.choose(&mut self.rng).copied()
    }

    fn template_line(&mut self, speaker: usize) -> String {
        let alive = self.ctx.alive_names();
        let start = self.history.len().saturating_sub(HISTORY_WINDOW);
        let agent = &mut self.agents[speaker];
        agent.observe(&alive, &self.history[start..]);

        let mut text = agent.decide_message(&alive, &self.bank);
        for _ in 1..REPEAT_RETRIES {
            let key = format!("{}:{}", agent.name(), text);
            if !self.recent.contains(&key) {
                break;
            }
            text = agent.decide_message(&alive, &self.bank);
        }
        text
    }

    fn remember(&mut self, speaker: &str, text: &str) {
        if self.recent.len() == RECENT_WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back(format!("{speaker}:{text}"));
        self.history.push((speaker.to_string(), text.to_string()));
    }
}

impl DialogueStream for TemplateStream {
    fn stream_next(&mut self) -> StreamItem {
        if self.remaining == 0 {
            return StreamItem::End;
        }
        let Some(speaker) = self.pick_speaker() else {
            self.remaining = 0;
            return StreamItem::End;
        };
        let name = self.agents[speaker].name().to_string();

        let generated = self.generator.as_ref().map(|generator| {
            let role = self.ctx.role_of(&name).unwrap_or(Role::Villager);
            generator.generate_line(&name, role, &self.ctx)
        });
        let text = match generated {
            Some(Ok(text)) if !text.trim().is_empty() => text.trim().to_string(),
            Some(Ok(_)) => self.template_line(speaker),
            Some(Err(err)) => {
                log::debug!("line generator failed for {}: {}", name, err);
                self.template_line(speaker)
            }
            None => self.template_line(speaker),
        };

        self.remember(&name, &text);
        self.last_speaker = Some(name.clone());
        self.remaining -= 1;
        StreamItem::Line(DialogueLine::player(name, text))
    }
}
