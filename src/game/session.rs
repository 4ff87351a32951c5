//! Consumer-side tick loop
//!
//! A [`GameSession`] ties a [`PhaseEngine`] to its [`EventScheduler`] and an
//! optional [`AudioPipeline`]. The presentation layer calls
//! [`GameSession::tick`] on its own schedule and displays whatever line
//! comes out; everything else (polling the generation job, enforcing the
//! discussion budget, auto-advancing, speaking lines) happens inside the
//! tick.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::engine::PhaseEngine;
use super::phase::Phase;
use crate::audio::AudioPipeline;
use crate::dialogue::DialogueLine;
use crate::scheduler::EventScheduler;

/// Default wall-clock budget of one discussion
pub const DEFAULT_DISCUSSION_BUDGET: Duration = Duration::from_secs(90);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// A discussion still running after this long is cut short
    pub discussion_budget: Duration,
    /// Leave discussions and nights on their own once their lines are shown
    pub auto_advance: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            discussion_budget: DEFAULT_DISCUSSION_BUDGET,
            auto_advance: true,
        }
    }
}

pub struct GameSession {
    engine: PhaseEngine,
    scheduler: Arc<EventScheduler>,
    audio: Option<AudioPipeline>,
    config: SessionConfig,
    seen: Option<(Phase, u32)>,
    discussion_started: Option<Instant>,
}

impl GameSession {
    pub fn new(engine: PhaseEngine, audio: Option<AudioPipeline>, config: SessionConfig) -> Self {
        let scheduler = Arc::clone(engine.scheduler());
        Self {
            engine,
            scheduler,
            audio,
            config,
            seen: None,
            discussion_started: None,
        }
    }

    pub fn engine(&self) -> &PhaseEngine {
        &self.engine
    }

    pub fn phase(&self) -> Phase {
        self.engine.phase()
    }

    pub fn is_over(&self) -> bool {
        self.engine.phase().is_terminal()
    }

    /// Nothing left to show and nothing being produced
    pub fn is_drained(&self) -> bool {
        self.scheduler.is_idle() && !self.engine.is_generating()
    }

    /// Open the first day
    pub fn begin(&mut self, now: Instant) {
        let events = self.engine.start_day();
        self.queue(events, now);
    }

    /// Vote out the player at `index`
    pub fn cast_vote(&mut self, index: usize, now: Instant) {
        let events = self.engine.cast_vote(index);
        self.queue(events, now);
    }

    /// Skip ahead without waiting for the lines to drain
    pub fn advance(&mut self, now: Instant) {
        let events = self.engine.advance();
        self.queue(events, now);
    }

    /// Run one step of the loop; returns the line to display, if one is due
    pub fn tick(&mut self, now: Instant) -> Option<DialogueLine> {
        let events = self.engine.poll_generation();
        self.queue(events, now);

        if self.over_budget(now) {
            log::info!(
                "day {} discussion ran past {:?}, cutting it short",
                self.engine.round(),
                self.config.discussion_budget
            );
            self.scheduler.reset();
            let events = self.engine.force_end_discussion();
            self.queue(events, now);
        }

        let tick = self.scheduler.tick(now);
        if let Some(line) = &tick.line {
            self.deliver(line);
        }
        if tick.advance {
            let events = self.engine.advance();
            self.queue(events, now);
        }
        tick.line
    }

    /// Hand over everything queued right away, ignoring the pacing
    pub fn flush(&mut self) -> Vec<DialogueLine> {
        let lines = self.scheduler.flush();
        for line in &lines {
            self.deliver(line);
        }
        lines
    }

    /// Take the one-shot voice notice, if speech was switched off
    pub fn pop_notice(&self) -> Option<String> {
        self.audio.as_ref().and_then(AudioPipeline::pop_notice)
    }

    /// Stop the voice workers
    pub fn shutdown(&mut self) {
        if let Some(audio) = self.audio.take() {
            audio.stop_all();
            audio.shutdown();
        }
    }

    fn over_budget(&self, now: Instant) -> bool {
        self.engine.phase() == Phase::DayDiscussion
            && self.discussion_started.is_some_and(|started| {
                now.saturating_duration_since(started) >= self.config.discussion_budget
            })
    }

    fn queue(&mut self, events: Vec<DialogueLine>, now: Instant) {
        if !events.is_empty() {
            self.scheduler.extend(events);
        }
        self.sync_phase(now);
    }

    fn deliver(&mut self, line: &DialogueLine) {
        self.engine.record_line(line);
        if !line.is_speakable() {
            return;
        }
        if let (Some(audio), Some(name)) = (&self.audio, line.player_name()) {
            let voice = self.engine.voice_of(name).unwrap_or_default();
            audio.speak(&line.text, voice);
        }
    }

    /// React to the engine having entered a new phase or round
    fn sync_phase(&mut self, now: Instant) {
        let current = (self.engine.phase(), self.engine.round());
        if self.seen == Some(current) {
            return;
        }
        self.seen = Some(current);

        match current.0 {
            Phase::DayDiscussion => {
                self.discussion_started = Some(now);
                self.arm();
            }
            Phase::Night => {
                self.discussion_started = None;
                self.arm();
            }
            _ => {
                self.discussion_started = None;
                self.scheduler.disarm();
            }
        }
    }

    fn arm(&self) {
        if self.config.auto_advance {
            self.scheduler.arm_auto_advance();
        }
    }
}

impl Drop for GameSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue::{DialogueSource, TemplateBackend, TemplateBank};
    use crate::game::engine::EngineConfig;
    use crate::roster::Roster;

    fn session(lines: usize, budget: Duration, auto_advance: bool) -> GameSession {
        let scheduler = Arc::new(EventScheduler::new(Duration::ZERO));
        let backend = TemplateBackend::new(Arc::new(TemplateBank::builtin()), 7);
        let engine = PhaseEngine::new(
            EngineConfig {
                players: 6,
                seed: 17,
                lines_per_discussion: lines,
            },
            &Roster::builtin(),
            DialogueSource::streaming(backend),
            scheduler,
        )
        .unwrap();
        GameSession::new(
            engine,
            None,
            SessionConfig {
                discussion_budget: budget,
                auto_advance,
            },
        )
    }

    #[test]
    fn test_auto_advance_reaches_the_first_vote() {
        let mut s = session(3, Duration::from_secs(600), true);
        let now = Instant::now();
        s.begin(now);

        let mut shown = Vec::new();
        for _ in 0..50 {
            if let Some(line) = s.tick(now) {
                shown.push(line);
            }
            if s.phase() == Phase::Vote {
                break;
            }
        }
        assert_eq!(s.phase(), Phase::Vote);
        assert_eq!(s.engine().round(), 2);
        assert_eq!(shown[0].text, "Day 1 begins.");
        assert!(shown.iter().any(|l| !l.visible));
        assert_eq!(s.engine().history().len(), 6);
    }

    #[test]
    fn test_budget_cuts_the_first_discussion_to_night() {
        let mut s = session(1000, Duration::from_secs(5), true);
        let start = Instant::now();
        s.begin(start);
        for _ in 0..10 {
            s.tick(start);
        }
        assert_eq!(s.phase(), Phase::DayDiscussion);

        s.tick(start + Duration::from_secs(6));
        assert_eq!(s.phase(), Phase::Night);
        assert!(!s.scheduler.has_stream());
    }

    #[test]
    fn test_without_auto_advance_the_day_waits() {
        let mut s = session(2, Duration::from_secs(600), false);
        let now = Instant::now();
        s.begin(now);
        for _ in 0..20 {
            s.tick(now);
        }
        assert_eq!(s.phase(), Phase::DayDiscussion);

        s.advance(now);
        assert_eq!(s.phase(), Phase::Night);
    }

    #[test]
    fn test_flush_delivers_and_records_everything() {
        let mut s = session(4, Duration::from_secs(600), false);
        s.begin(Instant::now());
        let lines = s.flush();
        assert_eq!(lines.len(), 5);
        assert_eq!(s.engine().history().len(), 4);
    }
}
