//! Batch dialogue backends
//!
//! A batch backend writes a whole discussion in one blocking call. The
//! completion backend asks an external text-completion service to narrate
//! the discussion and parses its `Name: text` rows; the simulated backend
//! stands in for it in demos and tests.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::context::GameContext;
use super::streaming::TemplateStream;
use super::templates::TemplateBank;
use super::{BatchBackend, DialogueLine, DialogueStream, GenerationError, StreamItem};

/// Lower bound of lines asked from the narrator
const MIN_PROMPT_LINES: usize = 8;

/// Text-completion service used by [`CompletionBatch`]
pub trait CompletionClient: Send + Sync {
    fn complete(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Batch backend built on a [`CompletionClient`]
pub struct CompletionBatch<C> {
    client: C,
    bank: Arc<TemplateBank>,
}

impl<C: CompletionClient> CompletionBatch<C> {
    pub fn new(client: C, bank: Arc<TemplateBank>) -> Self {
        Self { client, bank }
    }
}

impl<C: CompletionClient> BatchBackend for CompletionBatch<C> {
    fn generate_batch(&self, ctx: &GameContext) -> Result<Vec<DialogueLine>, GenerationError> {
        let prompt = build_prompt(ctx);
        let reply = self.client.complete(&prompt)?;
        let lines = parse_discussion(&reply, ctx);
        if lines.is_empty() {
            log::warn!("completion reply had no usable lines, using templates");
            return Ok(template_discussion(ctx, &self.bank));
        }
        Ok(lines)
    }
}

/// Narrator prompt for one discussion
pub fn build_prompt(ctx: &GameContext) -> String {
    let join = |names: &[String]| {
        if names.is_empty() {
            "none".to_string()
        } else {
            names.join(", ")
        }
    };
    let alive: Vec<String> = ctx.alive.iter().map(|p| p.name.clone()).collect();
    let roles: Vec<String> = ctx
        .alive
        .iter()
        .map(|p| format!("{}={}", p.name, p.role))
        .collect();
    let history = if ctx.history.is_empty() {
        "(nothing yet)".to_string()
    } else {
        ctx.history
            .iter()
            .map(|(speaker, text)| format!("{speaker}: {text}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let lo = ctx.lines.max(MIN_PROMPT_LINES);
    let hi = lo + 2;

    format!(
        "You narrate a game of werewolf. Day {round}.\n\
         Alive players: {alive}\n\
         Eliminated: {eliminated}\n\
         Confirmed wolves: {wolves}\n\
         Recent discussion:\n{history}\n\
         Secret roles (never reveal them): {roles}\n\
         \n\
         Write the next {lo} to {hi} messages of the village discussion.\n\
         Rules:\n\
         - one message per line, formatted exactly as Name: text\n\
         - only alive players speak\n\
         - wolves lie and protect each other, villagers try to find them\n\
         - no narration, no stage directions",
        round = ctx.round,
        alive = join(&alive),
        eliminated = join(&ctx.eliminated),
        wolves = join(&ctx.found_wolves),
        roles = join(&roles),
    )
}

/// Parse `Name: text` rows, keeping only rows spoken by alive players
pub fn parse_discussion(text: &str, ctx: &GameContext) -> Vec<DialogueLine> {
    text.lines()
        .filter_map(|row| {
            let row = row.trim().trim_start_matches(['-', '*', ' ']);
            let (name, said) = row.split_once(':')?;
            let name = name.trim().trim_matches('*').trim();
            let said = said.trim();
            if said.is_empty() || !ctx.is_alive(name) {
                return None;
            }
            Some(DialogueLine::player(name, said))
        })
        .collect()
}

/// A full discussion written by the template agents
pub fn template_discussion(ctx: &GameContext, bank: &Arc<TemplateBank>) -> Vec<DialogueLine> {
    let mut stream = TemplateStream::new(ctx.clone(), Arc::clone(bank), None, ctx.seed);
    let mut lines = Vec::with_capacity(ctx.lines);
    while let StreamItem::Line(line) = stream.stream_next() {
        lines.push(line);
    }
    lines
}

/// Template discussion delivered after an artificial delay
pub struct SimulatedBatch {
    bank: Arc<TemplateBank>,
    latency: Duration,
    failure: Option<String>,
}

impl SimulatedBatch {
    pub fn new(bank: Arc<TemplateBank>, latency: Duration) -> Self {
        Self {
            bank,
            latency,
            failure: None,
        }
    }

    /// Fail every call with `reason` after the delay
    pub fn failing(mut self, reason: impl Into<String>) -> Self {
        self.failure = Some(reason.into());
        self
    }
}

impl BatchBackend for SimulatedBatch {
    fn generate_batch(&self, ctx: &GameContext) -> Result<Vec<DialogueLine>, GenerationError> {
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        match &self.failure {
            Some(reason) => Err(GenerationError::failed(reason.clone())),
            None => Ok(template_discussion(ctx, &self.bank)),
        }
    }
}
