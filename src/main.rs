use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;

use werewolf::audio::{AudioOutput, AudioPipeline, NullOutput, SilenceBackend, DEFAULT_TASK_CAPACITY};
use werewolf::config::{self, BackendChoice, Options};
use werewolf::dialogue::{DialogueSource, SimulatedBatch, TemplateBackend, TemplateBank};
use werewolf::game::{EngineConfig, GameSession, Phase, PhaseEngine, SessionConfig};
use werewolf::roster::Roster;
use werewolf::{logging, Cli, EventScheduler};

/// How often the loop wakes up to tick the session
const LOOP_SLEEP: Duration = Duration::from_millis(20);

fn main() -> Result<()> {
    let cli = Cli::parse();

    let options = config::load_config(cli.config.as_deref())?;
    let options = cli.merge_into_options(options)?;

    logging::init(options.log_level).context("Cannot install logger")?;
    log::info!("starting with {:?}", options);

    let seed = options.seed.unwrap_or_else(rand::random);
    let mut session = build_session(&options, seed)?;
    println!("Game seed: {seed}");
    print_table(&session);

    run(&mut session, &options, seed)?;
    report(&session);
    session.shutdown();
    Ok(())
}

fn build_session(options: &Options, seed: u64) -> Result<GameSession> {
    let roster = match &options.roster_path {
        Some(path) => Roster::load(path)?,
        None => Roster::builtin(),
    };
    let bank = Arc::new(match &options.template_path {
        Some(path) => TemplateBank::load(path)?,
        None => TemplateBank::builtin(),
    });

    let source = match options.backend {
        BackendChoice::Templates => DialogueSource::streaming(TemplateBackend::new(bank, seed)),
        BackendChoice::Simulated => {
            let backend = SimulatedBatch::new(bank, options.batch_latency);
            match &options.simulated_failure {
                Some(reason) => DialogueSource::batch(backend.failing(reason.clone())),
                None => DialogueSource::batch(backend),
            }
        }
    };

    let scheduler = Arc::new(EventScheduler::new(options.tick_interval));
    let engine = PhaseEngine::new(
        EngineConfig {
            players: options.players,
            seed,
            lines_per_discussion: options.lines_per_discussion,
        },
        &roster,
        source,
        scheduler,
    )?;

    let audio = if options.speech {
        let pipeline = AudioPipeline::start(
            Arc::new(SilenceBackend::default()),
            open_output(options.speech_volume),
            DEFAULT_TASK_CAPACITY,
        )?;
        Some(pipeline)
    } else {
        None
    };

    Ok(GameSession::new(
        engine,
        audio,
        SessionConfig {
            discussion_budget: options.discussion_budget,
            auto_advance: options.auto_advance,
        },
    ))
}

#[cfg(feature = "playback")]
fn open_output(volume: f32) -> Box<dyn AudioOutput> {
    match werewolf::audio::RodioOutput::open(volume) {
        Ok(output) => Box::new(output),
        Err(err) => {
            log::warn!("{}, voices will be silent", err);
            Box::new(NullOutput::new())
        }
    }
}

#[cfg(not(feature = "playback"))]
fn open_output(_volume: f32) -> Box<dyn AudioOutput> {
    Box::new(NullOutput::new())
}

fn run(session: &mut GameSession, options: &Options, seed: u64) -> Result<()> {
    let mut votes = StdRng::seed_from_u64(seed ^ 0x5eed);
    let mut input = io::stdin().lock().lines();
    let mut autoplay = options.autoplay;

    session.begin(Instant::now());
    while !session.is_over() {
        if let Some(line) = session.tick(Instant::now()) {
            println!("{line}");
        }
        if let Some(notice) = session.pop_notice() {
            println!("[voice] {notice}");
        }

        if session.is_drained() {
            match session.phase() {
                Phase::Vote => {
                    let choice = if autoplay {
                        random_target(session, &mut votes)
                    } else {
                        match prompt_vote(session, &mut input)? {
                            Some(index) => Some(index),
                            None => {
                                println!("(input closed, voting automatically from now on)");
                                autoplay = true;
                                random_target(session, &mut votes)
                            }
                        }
                    };
                    if let Some(index) = choice {
                        session.cast_vote(index, Instant::now());
                    }
                    continue;
                }
                Phase::DayDiscussion | Phase::Night if !options.auto_advance => {
                    if !autoplay {
                        print!("-- press Enter to continue -- ");
                        io::stdout().flush()?;
                        if input.next().is_none() {
                            autoplay = true;
                        }
                    }
                    session.advance(Instant::now());
                    continue;
                }
                _ => {}
            }
        }
        thread::sleep(LOOP_SLEEP);
    }

    for line in session.flush() {
        println!("{line}");
    }
    Ok(())
}

fn random_target(session: &GameSession, rng: &mut StdRng) -> Option<usize> {
    let alive: Vec<usize> = session
        .engine()
        .players()
        .iter()
        .enumerate()
        .filter(|(_, p)| p.alive)
        .map(|(i, _)| i)
        .collect();
    alive.choose(rng).copied()
}

/// Ask for a vote until a valid index is typed; None once stdin is closed
fn prompt_vote(
    session: &GameSession,
    input: &mut impl Iterator<Item = io::Result<String>>,
) -> Result<Option<usize>> {
    let players = session.engine().players();
    println!("Who should leave the village?");
    for (i, p) in players.iter().enumerate().filter(|(_, p)| p.alive) {
        println!("  [{i}] {}", p.name);
    }

    loop {
        print!("vote> ");
        io::stdout().flush()?;
        let Some(line) = input.next() else {
            return Ok(None);
        };
        let line = line.context("Cannot read vote")?;
        match line.trim().parse::<usize>() {
            Ok(i) if players.get(i).is_some_and(|p| p.alive) => return Ok(Some(i)),
            _ => println!("Type the number of a living player."),
        }
    }
}

fn print_table(session: &GameSession) {
    let names: Vec<&str> = session
        .engine()
        .players()
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    println!("Around the table: {}", names.join(", "));
}

fn report(session: &GameSession) {
    let engine = session.engine();
    println!();
    match engine.phase() {
        Phase::VillageWins => println!("Result: the village wins."),
        Phase::WolvesWin => println!("Result: the wolves win."),
        Phase::ConnectionLost => println!(
            "Result: connection lost ({}).",
            engine.connection_lost_reason().unwrap_or("unknown reason")
        ),
        other => println!("Result: stopped during {other}."),
    }

    let found: Vec<&str> = engine
        .found_wolves()
        .iter()
        .map(|id| engine.players()[id.0].name.as_str())
        .collect();
    if found.is_empty() {
        println!("Wolves found: none");
    } else {
        println!("Wolves found: {}", found.join(", "));
    }
    println!("Days played: {}", engine.round());
}
