//! Voice output for player lines
//!
//! - [`backend`]: the speech synthesis boundary and its error classes
//! - [`output`]: the device side (null output, rodio output with the
//!   `playback` feature)
//! - [`pipeline`]: the two-worker pipeline tying them together

pub mod backend;
pub mod output;
pub mod pipeline;

use thiserror::Error;

use crate::threading::ThreadError;

pub use backend::{AudioTask, ReadyAudio, SilenceBackend, SpeechBackend, SynthesisError};
pub use output::{AudioOutput, NullOutput};
pub use pipeline::{AudioPipeline, DEFAULT_TASK_CAPACITY};

#[cfg(feature = "playback")]
pub use output::RodioOutput;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("cannot start voice worker: {0}")]
    Spawn(#[from] ThreadError),
    #[error("audio output unavailable: {0}")]
    Output(String),
    #[error("cannot play clip: {0}")]
    Playback(String),
}
