//! Whole-game scenarios driven through the public API

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use werewolf::dialogue::{
    BatchBackend, DialogueLine, DialogueSource, GameContext, GenerationError, SimulatedBatch,
    TemplateBackend, TemplateBank,
};
use werewolf::game::{EngineConfig, GameSession, Phase, PhaseEngine, SessionConfig};
use werewolf::roster::Roster;
use werewolf::EventScheduler;

fn template_session(players: usize, seed: u64) -> GameSession {
    let bank = Arc::new(TemplateBank::builtin());
    let engine = PhaseEngine::new(
        EngineConfig {
            players,
            seed,
            lines_per_discussion: 3,
        },
        &Roster::builtin(),
        DialogueSource::streaming(TemplateBackend::new(bank, seed)),
        Arc::new(EventScheduler::new(Duration::ZERO)),
    )
    .unwrap();
    GameSession::new(engine, None, SessionConfig::default())
}

/// Play to the end, always voting out the first living player
fn play_out(session: &mut GameSession) -> Vec<String> {
    let now = Instant::now();
    let mut transcript = Vec::new();
    session.begin(now);
    for _ in 0..5_000 {
        if session.is_over() {
            break;
        }
        if let Some(line) = session.tick(now) {
            transcript.push(line.to_string());
        }
        if session.phase() == Phase::Vote && session.is_drained() {
            let first = session
                .engine()
                .players()
                .iter()
                .position(|p| p.alive)
                .unwrap();
            session.cast_vote(first, now);
        }
    }
    transcript.extend(session.flush().iter().map(ToString::to_string));
    transcript
}

#[test]
fn test_template_game_reaches_an_ending() {
    let mut session = template_session(8, 21);
    let transcript = play_out(&mut session);

    assert!(session.is_over());
    assert!(matches!(
        session.phase(),
        Phase::VillageWins | Phase::WolvesWin
    ));
    assert!(transcript[0].ends_with("Day 1 begins."));
    assert_eq!(session.engine().role_reveal().len(), 8);
    assert!(transcript.iter().any(|l| l.contains("The village eliminated")));
}

#[test]
fn test_same_seed_plays_the_same_game() {
    let a = play_out(&mut template_session(10, 4242));
    let b = play_out(&mut template_session(10, 4242));
    assert_eq!(a, b);
}

#[test]
fn test_six_players_means_one_wolf() {
    for seed in 0..20 {
        let session = template_session(6, seed);
        let wolves = session
            .engine()
            .players()
            .iter()
            .filter(|p| p.role.is_wolf())
            .count();
        assert_eq!(wolves, 1, "seed {seed}");
    }
}

/// Succeeds for the first `ok_calls` discussions, then fails with a quota error
struct QuotaAfter {
    ok_calls: usize,
    calls: Arc<AtomicUsize>,
}

impl BatchBackend for QuotaAfter {
    fn generate_batch(&self, ctx: &GameContext) -> Result<Vec<DialogueLine>, GenerationError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n >= self.ok_calls {
            return Err(GenerationError::failed("quota exceeded"));
        }
        let speaker = &ctx.alive[0].name;
        Ok(vec![DialogueLine::player(speaker.clone(), "Quiet night, was it not?")])
    }
}

fn wait_for_generation(engine: &mut PhaseEngine) -> Vec<DialogueLine> {
    let mut events = Vec::new();
    for _ in 0..1_000 {
        events.extend(engine.poll_generation());
        if !engine.is_generating() {
            return events;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    panic!("generation never finished");
}

#[test]
fn test_quota_failure_ends_the_game_once_and_keeps_found_wolves() {
    let calls = Arc::new(AtomicUsize::new(0));
    let scheduler = Arc::new(EventScheduler::new(Duration::ZERO));
    let mut engine = PhaseEngine::new(
        EngineConfig {
            players: 8,
            seed: 77,
            lines_per_discussion: 2,
        },
        &Roster::builtin(),
        DialogueSource::batch(QuotaAfter {
            ok_calls: 2,
            calls: Arc::clone(&calls),
        }),
        Arc::clone(&scheduler),
    )
    .unwrap();

    // Day 1 and night
    engine.start_day();
    wait_for_generation(&mut engine);
    engine.advance();
    assert_eq!(engine.phase(), Phase::Night);
    engine.advance();

    // Day 2, vote out a wolf
    assert_eq!(engine.round(), 2);
    wait_for_generation(&mut engine);
    engine.advance();
    assert_eq!(engine.phase(), Phase::Vote);
    let wolf = engine
        .players()
        .iter()
        .position(|p| p.alive && p.role.is_wolf())
        .unwrap();
    engine.cast_vote(wolf);
    assert_eq!(engine.phase(), Phase::Night);

    // Day 3 fails
    engine.advance();
    assert_eq!(engine.round(), 3);
    let events = wait_for_generation(&mut engine);

    assert_eq!(engine.phase(), Phase::ConnectionLost);
    assert_eq!(engine.connection_lost_reason(), Some("quota exceeded"));
    let notices = events
        .iter()
        .filter(|l| l.text.starts_with("Connection lost"))
        .count();
    assert_eq!(notices, 1);
    assert_eq!(engine.found_wolves().len(), 1);
    assert_eq!(engine.found_wolves()[0].0, wolf);
    assert_eq!(engine.role_reveal().len(), 8);

    // Nothing else happens afterwards
    std::thread::sleep(Duration::from_millis(20));
    assert!(engine.poll_generation().is_empty());
    assert!(engine.advance().is_empty());
    assert!(engine.start_day().is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(!engine.is_generating());
}

#[test]
fn test_batch_session_waits_for_generation_before_voting() {
    let bank = Arc::new(TemplateBank::builtin());
    let engine = PhaseEngine::new(
        EngineConfig {
            players: 6,
            seed: 5,
            lines_per_discussion: 2,
        },
        &Roster::builtin(),
        DialogueSource::batch(SimulatedBatch::new(bank, Duration::from_millis(30))),
        Arc::new(EventScheduler::new(Duration::ZERO)),
    )
    .unwrap();
    let mut session = GameSession::new(engine, None, SessionConfig::default());

    let mut now = Instant::now();
    session.begin(now);
    assert!(!session.is_drained());

    let mut spoken = 0;
    for _ in 0..2_000 {
        if session.phase() == Phase::Vote {
            break;
        }
        if let Some(line) = session.tick(now) {
            if line.player_name().is_some() && line.visible {
                spoken += 1;
            }
        }
        std::thread::sleep(Duration::from_millis(1));
        now = Instant::now();
    }

    assert_eq!(session.phase(), Phase::Vote);
    assert_eq!(session.engine().round(), 2);
    assert!(spoken >= 4);
}

#[test]
fn test_budget_in_round_two_forces_the_vote() {
    let bank = Arc::new(TemplateBank::builtin());
    let engine = PhaseEngine::new(
        EngineConfig {
            players: 8,
            seed: 11,
            lines_per_discussion: 100_000,
        },
        &Roster::builtin(),
        DialogueSource::streaming(TemplateBackend::new(bank, 11)),
        Arc::new(EventScheduler::new(Duration::ZERO)),
    )
    .unwrap();
    let mut session = GameSession::new(
        engine,
        None,
        SessionConfig {
            discussion_budget: Duration::from_secs(30),
            auto_advance: true,
        },
    );

    let start = Instant::now();
    session.begin(start);
    for _ in 0..5 {
        session.tick(start);
    }

    // Day 1 runs out of time and goes to night, then the night auto-advances
    let mut now = start + Duration::from_secs(31);
    for _ in 0..10 {
        session.tick(now);
        if session.engine().round() == 2 {
            break;
        }
    }
    assert_eq!(session.engine().round(), 2);
    assert_eq!(session.phase(), Phase::DayDiscussion);
    for _ in 0..5 {
        session.tick(now);
    }

    now += Duration::from_secs(31);
    session.tick(now);
    assert_eq!(session.phase(), Phase::Vote);
    assert!(!session.engine().scheduler().has_stream());

    // The abandoned discussion is never pulled again
    let heard = session.engine().history().len();
    for _ in 0..20 {
        session.tick(now);
    }
    assert_eq!(session.engine().history().len(), heard);
}
