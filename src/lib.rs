//! Werewolf: phase engine, paced dialogue delivery, background generation
//! and voice playback for a generated-dialogue social deduction game.

pub mod audio;
pub mod cli;
pub mod config;
pub mod dialogue;
pub mod game;
pub mod jobs;
pub mod logging;
pub mod roster;
pub mod scheduler;
pub mod threading;

pub use cli::Cli;
pub use config::Options;
pub use game::{GameSession, Phase, PhaseEngine, Winner};
pub use logging::LogLevel;
pub use scheduler::EventScheduler;
