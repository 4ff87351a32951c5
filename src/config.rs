use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::game::{MAX_PLAYERS, MIN_PLAYERS};
use crate::logging::LogLevel;

/// Application options that can be set via config file or CLI
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub players: usize,
    /// Fixed seed for a reproducible game; random when unset
    pub seed: Option<u64>,
    pub backend: BackendChoice,
    pub tick_interval: Duration,
    pub discussion_budget: Duration,
    pub lines_per_discussion: usize,
    /// Delay of the simulated batch backend
    pub batch_latency: Duration,
    /// Make every simulated batch call fail with this reason
    pub simulated_failure: Option<String>,
    pub speech: bool,
    pub speech_volume: f32,
    pub auto_advance: bool,
    /// Vote automatically instead of reading stdin
    pub autoplay: bool,
    pub roster_path: Option<PathBuf>,
    pub template_path: Option<PathBuf>,
    pub log_level: LogLevel,
}

/// Which dialogue backend drives the game
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendChoice {
    /// Template agents, streamed line by line
    Templates,
    /// Template discussions delivered as a delayed batch
    Simulated,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            players: 8,
            seed: None,
            backend: BackendChoice::Templates,
            tick_interval: Duration::from_millis(1200),
            discussion_budget: Duration::from_secs(90),
            lines_per_discussion: 8,
            batch_latency: Duration::from_millis(1500),
            simulated_failure: None,
            speech: false,
            speech_volume: 1.0,
            auto_advance: true,
            autoplay: false,
            roster_path: None,
            template_path: None,
            log_level: LogLevel::default(),
        }
    }
}

/// On-disk shape of the config file; every key is optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    players: Option<usize>,
    seed: Option<u64>,
    backend: Option<String>,
    tick_ms: Option<u64>,
    discussion_budget_secs: Option<u64>,
    lines_per_discussion: Option<usize>,
    batch_latency_ms: Option<u64>,
    simulated_failure: Option<String>,
    speech: Option<bool>,
    speech_volume: Option<i32>,
    auto_advance: Option<bool>,
    autoplay: Option<bool>,
    roster: Option<PathBuf>,
    templates: Option<PathBuf>,
    log_level: Option<String>,
}

/// Load options from a TOML file, or the defaults when there is none
pub fn load_config(path: Option<&Path>) -> Result<Options> {
    let Some(path) = path else {
        return Ok(Options::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read config file {}", path.display()))?;
    parse_config(&text).with_context(|| format!("Invalid config file {}", path.display()))
}

/// Apply TOML config text on top of the defaults
pub fn parse_config(text: &str) -> Result<Options> {
    let file: ConfigFile = toml::from_str(text)?;
    let mut opts = Options::default();

    if let Some(players) = file.players {
        opts.players = parse_players(players)?;
    }
    if file.seed.is_some() {
        opts.seed = file.seed;
    }
    if let Some(ref backend) = file.backend {
        opts.backend = parse_backend(backend)?;
    }
    if let Some(ms) = file.tick_ms {
        opts.tick_interval = Duration::from_millis(ms);
    }
    if let Some(secs) = file.discussion_budget_secs {
        opts.discussion_budget = parse_budget(secs)?;
    }
    if let Some(lines) = file.lines_per_discussion {
        opts.lines_per_discussion = parse_lines(lines)?;
    }
    if let Some(ms) = file.batch_latency_ms {
        opts.batch_latency = Duration::from_millis(ms);
    }
    if file.simulated_failure.is_some() {
        opts.simulated_failure = file.simulated_failure;
    }
    if let Some(speech) = file.speech {
        opts.speech = speech;
    }
    if let Some(vol) = file.speech_volume {
        opts.speech_volume = parse_volume(vol);
    }
    if let Some(auto) = file.auto_advance {
        opts.auto_advance = auto;
    }
    if let Some(autoplay) = file.autoplay {
        opts.autoplay = autoplay;
    }
    if file.roster.is_some() {
        opts.roster_path = file.roster;
    }
    if file.templates.is_some() {
        opts.template_path = file.templates;
    }
    if let Some(ref level) = file.log_level {
        opts.log_level = parse_log_level(level)?;
    }

    Ok(opts)
}

/// Parse a volume value (0-100) to a float (0.0-1.0)
pub fn parse_volume(vol: i32) -> f32 {
    if vol < 0 {
        return 0.0;
    }
    if vol > 100 {
        return 1.0;
    }
    vol as f32 / 100.0
}

pub fn parse_players(players: usize) -> Result<usize> {
    if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&players) {
        anyhow::bail!(
            "Player count out of range ({} to {}): {}",
            MIN_PLAYERS,
            MAX_PLAYERS,
            players
        );
    }
    Ok(players)
}

pub fn parse_lines(lines: usize) -> Result<usize> {
    if lines == 0 {
        anyhow::bail!("A discussion needs at least one line");
    }
    Ok(lines)
}

pub fn parse_budget(secs: u64) -> Result<Duration> {
    if secs == 0 {
        anyhow::bail!("Discussion budget must be positive");
    }
    Ok(Duration::from_secs(secs))
}

pub fn parse_backend(s: &str) -> Result<BackendChoice> {
    match s.to_lowercase().as_str() {
        "templates" | "template" | "stream" => Ok(BackendChoice::Templates),
        "simulated" | "batch" => Ok(BackendChoice::Simulated),
        _ => anyhow::bail!("Invalid backend: {}. Valid options: templates, simulated", s),
    }
}

pub fn parse_log_level(s: &str) -> Result<LogLevel> {
    s.parse::<LogLevel>().map_err(anyhow::Error::msg)
}
