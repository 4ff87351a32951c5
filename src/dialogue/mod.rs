//! Dialogue sources
//!
//! One interface over the two shapes a dialogue backend can take:
//!
//! - **Streaming**: a pull-based [`DialogueStream`] yielding one line per
//!   call. Calls may block briefly (local inference) but are cheap enough to
//!   make from the consumer thread. Generator failures are absorbed per line
//!   by falling back to the template bank.
//! - **Batch**: a [`BatchBackend`] returning the whole discussion after a
//!   long, unpredictable blocking call. Only ever invoked from the
//!   background job worker (see [`crate::jobs`]).
//!
//! Which shape a backend has is fixed when the [`DialogueSource`] is built;
//! it is never chosen per call. Backends report failure through the generic
//! [`GenerationError`] so the engine never depends on a provider.

pub mod agent;
pub mod batch;
pub mod context;
pub mod streaming;
pub mod templates;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

pub use agent::{Action, Agent};
pub use batch::{
    build_prompt, parse_discussion, template_discussion, CompletionBatch, CompletionClient,
    SimulatedBatch,
};
pub use context::{GameContext, PlayerView, HISTORY_WINDOW};
pub use streaming::{LineGenerator, TemplateBackend, TemplateStream};
pub use templates::{TemplateBank, TemplateError};

/// Display name used for hidden speakers at night
pub const HIDDEN_SPEAKER: &str = "???";

/// Display name used for engine announcements
pub const SYSTEM_SPEAKER: &str = "System";

/// Who produced a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Speaker {
    /// The game itself (announcements, narration)
    System,
    /// A player, by name
    Player(String),
}

/// One line of dialogue
///
/// Immutable once produced; ownership moves from the source to the
/// scheduler and then to whoever displays it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogueLine {
    pub speaker: Speaker,
    pub text: String,
    /// False at night: the speaker's identity must not be shown
    pub visible: bool,
}

impl DialogueLine {
    /// An announcement from the game
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::System,
            text: text.into(),
            visible: true,
        }
    }

    /// Narration whose speaker is hidden
    pub fn hidden(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::System,
            text: text.into(),
            visible: false,
        }
    }

    /// A line said out loud by a player
    pub fn player(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Player(name.into()),
            text: text.into(),
            visible: true,
        }
    }

    /// The name a presentation layer may show for this line
    pub fn display_name(&self) -> &str {
        if !self.visible {
            return HIDDEN_SPEAKER;
        }
        match &self.speaker {
            Speaker::System => SYSTEM_SPEAKER,
            Speaker::Player(name) => name,
        }
    }

    /// Name of the speaking player, if a player said it
    pub fn player_name(&self) -> Option<&str> {
        match &self.speaker {
            Speaker::Player(name) => Some(name),
            Speaker::System => None,
        }
    }

    /// Whether this line should be sent to speech synthesis
    pub fn is_speakable(&self) -> bool {
        self.visible && self.player_name().is_some() && !self.text.trim().is_empty()
    }
}

impl fmt::Display for DialogueLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.display_name(), self.text)
    }
}

/// Failure of a dialogue backend, stripped of any provider detail
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("generation failed: {0}")]
    GenerationFailed(String),
}

impl GenerationError {
    pub fn failed(reason: impl Into<String>) -> Self {
        GenerationError::GenerationFailed(reason.into())
    }

    pub fn reason(&self) -> &str {
        match self {
            GenerationError::GenerationFailed(reason) => reason,
        }
    }
}

/// Result of pulling a stream once
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    Line(DialogueLine),
    End,
}

/// Pull-based dialogue for one discussion
///
/// After returning [`StreamItem::End`] a stream keeps returning `End`.
pub trait DialogueStream: Send {
    fn stream_next(&mut self) -> StreamItem;
}

/// Backend that produces dialogue one line at a time
pub trait StreamingBackend: Send {
    /// Start the discussion described by `ctx`
    fn open(&mut self, ctx: &GameContext) -> Box<dyn DialogueStream>;
}

/// Backend that produces a whole discussion from one blocking call
pub trait BatchBackend: Send + Sync {
    fn generate_batch(&self, ctx: &GameContext) -> Result<Vec<DialogueLine>, GenerationError>;
}

/// Shape of a configured backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Streaming,
    Batch,
}

/// The dialogue backend the engine was configured with
pub enum DialogueSource {
    Streaming(Box<dyn StreamingBackend>),
    Batch(Arc<dyn BatchBackend>),
}

impl DialogueSource {
    pub fn streaming(backend: impl StreamingBackend + 'static) -> Self {
        DialogueSource::Streaming(Box::new(backend))
    }

    pub fn batch(backend: impl BatchBackend + 'static) -> Self {
        DialogueSource::Batch(Arc::new(backend))
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            DialogueSource::Streaming(_) => BackendKind::Streaming,
            DialogueSource::Batch(_) => BackendKind::Batch,
        }
    }
}

impl fmt::Debug for DialogueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DialogueSource::{:?}", self.kind())
    }
}
