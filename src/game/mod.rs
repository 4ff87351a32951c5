//! The game itself
//!
//! - [`phase`]: phases, the transition table and win detection
//! - [`player`]: players and roles
//! - [`engine`]: the phase state machine driving a game
//! - [`session`]: the consumer-side tick loop around an engine

pub mod engine;
pub mod phase;
pub mod player;
pub mod session;

pub use engine::{EngineConfig, GameError, PhaseEngine, MAX_PLAYERS, MIN_PLAYERS};
pub use phase::{Phase, Winner, FIRST_VOTING_ROUND};
pub use player::{Player, PlayerId, Role, MAX_NOTE};
pub use session::{GameSession, SessionConfig};
