//! Phase state machine
//!
//! [`PhaseEngine`] owns the table: players, roles, the current phase and
//! round, and whatever dialogue production is in flight for the current
//! discussion. It lives on the consumer thread and is never shared.
//!
//! Every transition method returns the announcement lines it produced
//! (for the caller to queue) and is a no-op returning nothing when called
//! in the wrong phase. Discussion lines do not go through the return
//! values: a streaming source is attached to the scheduler, and batch
//! results are queued by [`PhaseEngine::poll_generation`].
//!
//! # Design Notes
//!
//! - A batch call runs on the [`JobRunner`] worker; its `Error` result ends
//!   the game in `ConnectionLost`.
//! - `force_end_discussion` abandons the outstanding job instead of waiting
//!   for it. If the next day starts while that stale job is still running,
//!   the new job is deferred until the stale result has been consumed.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, SeedableRng};
use thiserror::Error;

use super::phase::{Phase, Winner, FIRST_VOTING_ROUND};
use super::player::{Player, PlayerId, Role};
use crate::dialogue::{
    DialogueLine, DialogueSource, GameContext, PlayerView, Speaker, HISTORY_WINDOW,
};
use crate::jobs::{JobError, JobMessage, JobRunner};
use crate::roster::Roster;
use crate::scheduler::EventScheduler;

pub const MIN_PLAYERS: usize = 6;
pub const MAX_PLAYERS: usize = 20;

/// Default number of lines in one discussion
pub const DEFAULT_DISCUSSION_LINES: usize = 8;

const NIGHTFALL: [&str; 2] = ["Night falls over the village...", "...footsteps in the dark..."];

#[derive(Debug, Error)]
pub enum GameError {
    #[error("a game needs between {min} and {max} players, got {requested}")]
    PlayerCount {
        requested: usize,
        min: usize,
        max: usize,
    },
    #[error("the roster has {available} characters but {needed} players were requested")]
    RosterTooSmall { needed: usize, available: usize },
    #[error(transparent)]
    Jobs(#[from] JobError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub players: usize,
    pub seed: u64,
    pub lines_per_discussion: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            players: MIN_PLAYERS,
            seed: 0,
            lines_per_discussion: DEFAULT_DISCUSSION_LINES,
        }
    }
}

pub struct PhaseEngine {
    players: Vec<Player>,
    phase: Phase,
    round: u32,
    rng: StdRng,
    source: DialogueSource,
    scheduler: Arc<EventScheduler>,
    jobs: Option<JobRunner>,
    lines_per_discussion: usize,
    discussion_open: bool,
    deferred_day: Option<GameContext>,
    found: Vec<PlayerId>,
    history: Vec<(String, String)>,
    last_victim: Option<PlayerId>,
    connection_lost: Option<String>,
    reveal: Vec<(String, Role)>,
}

impl PhaseEngine {
    /// Seat the table and deal roles
    ///
    /// Names are drawn from `roster` and roles shuffled with a generator
    /// seeded from `config.seed`, so the same seed deals the same game.
    ///
    /// # Errors
    /// `GameError::PlayerCount` outside `MIN_PLAYERS..=MAX_PLAYERS`,
    /// `GameError::RosterTooSmall` when the roster cannot fill the table,
    /// `GameError::Jobs` when a batch source's worker cannot start
    pub fn new(
        config: EngineConfig,
        roster: &Roster,
        source: DialogueSource,
        scheduler: Arc<EventScheduler>,
    ) -> Result<Self, GameError> {
        let n = config.players;
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&n) {
            return Err(GameError::PlayerCount {
                requested: n,
                min: MIN_PLAYERS,
                max: MAX_PLAYERS,
            });
        }
        if roster.len() < n {
            return Err(GameError::RosterTooSmall {
                needed: n,
                available: roster.len(),
            });
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        let seats: Vec<_> = roster.characters().choose_multiple(&mut rng, n).collect();
        let wolves = (n / 4).max(1);
        let mut roles: Vec<Role> = (0..n)
            .map(|i| if i < wolves { Role::Wolf } else { Role::Villager })
            .collect();
        roles.shuffle(&mut rng);

        let players = seats
            .into_iter()
            .zip(roles)
            .enumerate()
            .map(|(i, (c, role))| Player::new(PlayerId(i), &c.name, role, &c.voice_id))
            .collect();

        let jobs = match source {
            DialogueSource::Batch(_) => Some(JobRunner::new()?),
            DialogueSource::Streaming(_) => None,
        };
        log::info!("new game: {} players, {} wolves, {:?}", n, wolves, source);

        Ok(Self {
            players,
            phase: Phase::DayDiscussion,
            round: 1,
            rng,
            source,
            scheduler,
            jobs,
            lines_per_discussion: config.lines_per_discussion,
            discussion_open: false,
            deferred_day: None,
            found: Vec::new(),
            history: Vec::new(),
            last_victim: None,
            connection_lost: None,
            reveal: Vec::new(),
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn scheduler(&self) -> &Arc<EventScheduler> {
        &self.scheduler
    }

    /// Why the game ended in `ConnectionLost`
    pub fn connection_lost_reason(&self) -> Option<&str> {
        self.connection_lost.as_deref()
    }

    /// Every player's true role, once the game is over
    pub fn role_reveal(&self) -> &[(String, Role)] {
        &self.reveal
    }

    pub fn last_victim(&self) -> Option<PlayerId> {
        self.last_victim
    }

    /// Public lines said so far, oldest first
    pub fn history(&self) -> &[(String, String)] {
        &self.history
    }

    pub fn voice_of(&self, name: &str) -> Option<&str> {
        self.players
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.voice_id.as_str())
    }

    /// Whether the current day's discussion has been opened
    pub fn is_discussion_open(&self) -> bool {
        self.discussion_open
    }

    /// Whether a generation result the engine still cares about is pending
    pub fn is_generating(&self) -> bool {
        self.jobs
            .as_ref()
            .and_then(JobRunner::current)
            .is_some_and(|job| !job.abandoned)
            || self.deferred_day.is_some()
    }

    /// Remember a line that was shown to the players
    pub fn record_line(&mut self, line: &DialogueLine) {
        if let (true, Speaker::Player(name)) = (line.visible, &line.speaker) {
            self.history.push((name.clone(), line.text.clone()));
        }
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Announce the day and open its discussion
    pub fn start_day(&mut self) -> Vec<DialogueLine> {
        if self.phase != Phase::DayDiscussion || self.discussion_open {
            log::debug!("start_day ignored in {} (open: {})", self.phase, self.discussion_open);
            return Vec::new();
        }
        if self.is_generating() {
            log::debug!("start_day rejected: a generation job is outstanding");
            return Vec::new();
        }

        let mut events = vec![DialogueLine::system(format!("Day {} begins.", self.round))];
        let ctx = self.context();
        self.discussion_open = true;

        let is_batch = match &mut self.source {
            DialogueSource::Streaming(backend) => {
                self.scheduler.attach_stream(backend.open(&ctx));
                false
            }
            DialogueSource::Batch(_) => true,
        };
        if is_batch {
            self.scheduler.begin_production();
            if self.jobs.as_ref().is_some_and(JobRunner::is_busy) {
                log::debug!("deferring day {} until the abandoned job returns", self.round);
                self.deferred_day = Some(ctx);
            } else {
                events.extend(self.submit_batch(ctx));
            }
        }
        events
    }

    /// Close the discussion and call the vote (round 2 onwards)
    pub fn start_vote(&mut self) -> Vec<DialogueLine> {
        if self.phase != Phase::DayDiscussion || self.round < FIRST_VOTING_ROUND {
            log::debug!("start_vote ignored in {} round {}", self.phase, self.round);
            return Vec::new();
        }
        if self.is_generating() {
            log::debug!("start_vote rejected: a generation job is outstanding");
            return Vec::new();
        }
        if !self.enter(Phase::Vote) {
            return Vec::new();
        }
        vec![DialogueLine::system(format!(
            "Day {}: the village gathers to vote.",
            self.round
        ))]
    }

    /// Eliminate the player at `index`
    pub fn cast_vote(&mut self, index: usize) -> Vec<DialogueLine> {
        if self.phase != Phase::Vote {
            log::debug!("cast_vote ignored in {}", self.phase);
            return Vec::new();
        }
        let Some(target) = self.players.get_mut(index).filter(|p| p.alive) else {
            log::debug!("cast_vote ignored: no alive player at {}", index);
            return Vec::new();
        };

        target.kill();
        let (id, name, role) = (target.id, target.name.clone(), target.role);
        if role.is_wolf() {
            self.found.push(id);
        }
        let mut events = vec![DialogueLine::system(format!(
            "The village eliminated {name}. {name} was a {role}."
        ))];

        if let Some(winner) = self.get_winner() {
            events.extend(self.finish(winner));
            return events;
        }
        events.extend(self.nightfall());
        events
    }

    /// Resolve the night: one wolf kill, then the next morning
    pub fn resolve_night(&mut self) -> Vec<DialogueLine> {
        if self.phase != Phase::Night {
            log::debug!("resolve_night ignored in {}", self.phase);
            return Vec::new();
        }

        let candidates: Vec<usize> = self
            .players
            .iter()
            .enumerate()
            .filter(|(_, p)| p.alive && !p.role.is_wolf())
            .map(|(i, _)| i)
            .collect();
        let victim = candidates.choose(&mut self.rng).copied();

        self.round += 1;
        let mut events = Vec::new();
        match victim {
            Some(i) => {
                let player = &mut self.players[i];
                player.kill();
                self.last_victim = Some(player.id);
                events.push(DialogueLine::system(format!(
                    "Morning: {} was found dead.",
                    player.name
                )));
            }
            None => {
                self.last_victim = None;
                events.push(DialogueLine::system("Morning: nobody died."));
            }
        }

        if let Some(winner) = self.get_winner() {
            events.extend(self.finish(winner));
            return events;
        }
        if !self.enter(Phase::DayDiscussion) {
            return events;
        }
        self.discussion_open = false;
        events.extend(self.start_day());
        events
    }

    /// Move to whatever comes next from the current phase
    pub fn advance(&mut self) -> Vec<DialogueLine> {
        if self.is_generating() {
            log::debug!("advance rejected: a generation job is outstanding");
            return Vec::new();
        }
        match self.phase {
            Phase::DayDiscussion => self.end_discussion(),
            Phase::Night => self.resolve_night(),
            _ => Vec::new(),
        }
    }

    /// Cut the discussion short, abandoning any generation in flight
    pub fn force_end_discussion(&mut self) -> Vec<DialogueLine> {
        if self.phase != Phase::DayDiscussion {
            return Vec::new();
        }
        if let Some(jobs) = &self.jobs {
            if jobs.abandon_current() {
                log::info!("abandoning generation for day {}", self.round);
            }
        }
        self.deferred_day = None;
        self.end_discussion()
    }

    /// Collect a finished generation job, if any
    pub fn poll_generation(&mut self) -> Vec<DialogueLine> {
        let Some((job, message)) = self.jobs.as_ref().and_then(JobRunner::poll) else {
            return Vec::new();
        };

        match message {
            JobMessage::Error(reason) => {
                log::error!("generation job {} failed: {}", job.id, reason);
                self.lose_connection(reason)
            }
            JobMessage::Events(lines) => {
                let current = !job.abandoned
                    && job.round == self.round
                    && self.phase == Phase::DayDiscussion;
                if current {
                    log::debug!("generation job {} delivered {} lines", job.id, lines.len());
                    self.scheduler.extend(lines);
                    self.scheduler.finish_production();
                } else {
                    log::debug!("discarding {} lines from stale job {}", lines.len(), job.id);
                }

                match self.deferred_day.take() {
                    Some(ctx) => self.submit_batch(ctx),
                    None => Vec::new(),
                }
            }
        }
    }

    /// Decide the game from the alive counts
    pub fn get_winner(&self) -> Option<Winner> {
        let alive_wolves = self
            .players
            .iter()
            .filter(|p| p.alive && p.role.is_wolf())
            .count();
        let alive_others = self
            .players
            .iter()
            .filter(|p| p.alive && !p.role.is_wolf())
            .count();
        Winner::from_counts(alive_wolves, alive_others)
    }

    /// Wolves eliminated by vote, by id
    pub fn found_wolves(&self) -> Vec<PlayerId> {
        let mut found = self.found.clone();
        found.sort();
        found
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn enter(&mut self, to: Phase) -> bool {
        if !self.phase.can_transition(to, self.round) {
            log::error!("illegal transition {} -> {} in round {}", self.phase, to, self.round);
            return false;
        }
        log::debug!("phase {} -> {} (round {})", self.phase, to, self.round);
        self.phase = to;
        true
    }

    fn end_discussion(&mut self) -> Vec<DialogueLine> {
        if self.round >= FIRST_VOTING_ROUND {
            self.start_vote()
        } else {
            self.nightfall()
        }
    }

    fn nightfall(&mut self) -> Vec<DialogueLine> {
        if !self.enter(Phase::Night) {
            return Vec::new();
        }
        NIGHTFALL.iter().map(|text| DialogueLine::hidden(*text)).collect()
    }

    fn submit_batch(&mut self, ctx: GameContext) -> Vec<DialogueLine> {
        let (Some(jobs), DialogueSource::Batch(backend)) = (&self.jobs, &self.source) else {
            return Vec::new();
        };
        let backend = Arc::clone(backend);
        let started = jobs.start(self.phase, self.round, move || {
            match backend.generate_batch(&ctx) {
                Ok(lines) => JobMessage::Events(lines),
                Err(err) => JobMessage::Error(err.reason().to_string()),
            }
        });

        match started {
            Ok(_) => Vec::new(),
            Err(err) => {
                log::error!("cannot start generation: {}", err);
                self.lose_connection(err.to_string())
            }
        }
    }

    fn context(&mut self) -> GameContext {
        let name_of = |id: &PlayerId| self.players[id.0].name.clone();
        let start = self.history.len().saturating_sub(HISTORY_WINDOW);
        GameContext {
            round: self.round,
            phase: self.phase,
            alive: self
                .players
                .iter()
                .filter(|p| p.alive)
                .map(|p| PlayerView {
                    name: p.name.clone(),
                    role: p.role,
                })
                .collect(),
            eliminated: self
                .players
                .iter()
                .filter(|p| !p.alive)
                .map(|p| p.name.clone())
                .collect(),
            found_wolves: self.found.iter().map(name_of).collect(),
            history: self.history[start..].to_vec(),
            lines: self.lines_per_discussion,
            seed: self.rng.random::<u64>(),
        }
    }

    fn snapshot_roles(&mut self) -> Vec<DialogueLine> {
        self.reveal = self
            .players
            .iter()
            .map(|p| (p.name.clone(), p.role))
            .collect();
        self.reveal
            .iter()
            .map(|(name, role)| DialogueLine::system(format!("{name} was a {role}.")))
            .collect()
    }

    fn finish(&mut self, winner: Winner) -> Vec<DialogueLine> {
        if !self.enter(winner.phase()) {
            return Vec::new();
        }
        self.discussion_open = false;
        let headline = match winner {
            Winner::Village => "The village wins: every wolf is gone.",
            Winner::Wolves => "The wolves win: they now rule the village.",
        };
        let mut events = vec![DialogueLine::system(headline)];
        events.extend(self.snapshot_roles());
        events
    }

    fn lose_connection(&mut self, reason: String) -> Vec<DialogueLine> {
        if !self.enter(Phase::ConnectionLost) {
            return Vec::new();
        }
        self.discussion_open = false;
        self.deferred_day = None;
        self.scheduler.finish_production();
        let mut events = vec![DialogueLine::system(format!("Connection lost: {reason}"))];
        self.connection_lost = Some(reason);
        events.extend(self.snapshot_roles());
        events
    }
}
