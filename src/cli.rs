use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use crate::config::{
    parse_backend, parse_budget, parse_lines, parse_log_level, parse_players, parse_volume,
    Options,
};

/// Werewolf - a village, a few wolves, and a lot of talking
#[derive(Parser, Debug, Default)]
#[command(name = "werewolf")]
#[command(version)]
#[command(about = "Headless werewolf game with generated village dialogue", long_about = None)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Number of players (6-20)
    #[arg(short, long, value_name = "N")]
    pub players: Option<usize>,

    /// Seed for a reproducible game
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Dialogue backend (templates, simulated)
    #[arg(short, long, value_name = "NAME")]
    pub backend: Option<String>,

    /// Milliseconds between two displayed lines
    #[arg(long = "tick", value_name = "MS")]
    pub tick_ms: Option<u64>,

    /// Seconds a discussion may run before it is cut short
    #[arg(long, value_name = "SECS")]
    pub budget: Option<u64>,

    /// Lines per discussion
    #[arg(short, long, value_name = "N")]
    pub lines: Option<usize>,

    /// Delay of the simulated batch backend
    #[arg(long = "latency", value_name = "MS")]
    pub latency_ms: Option<u64>,

    /// Make every simulated batch call fail with this reason
    #[arg(long = "fail", value_name = "REASON")]
    pub fail: Option<String>,

    /// Speak player lines
    #[arg(long)]
    pub speech: bool,

    /// Do not speak player lines
    #[arg(long = "nospeech")]
    pub nospeech: bool,

    /// Speech volume (0-100)
    #[arg(long, value_name = "VOLUME")]
    pub speechvol: Option<String>,

    /// Wait for Enter instead of moving on once a phase's lines are shown
    #[arg(long = "manual")]
    pub manual: bool,

    /// Vote automatically instead of reading from stdin
    #[arg(short, long)]
    pub autoplay: bool,

    /// Character roster (JSON)
    #[arg(long, value_name = "FILE")]
    pub roster: Option<PathBuf>,

    /// Dialogue templates (JSON)
    #[arg(long, value_name = "FILE")]
    pub templates: Option<PathBuf>,

    /// Log level (nothing, user, error, warning, info, debug, all)
    #[arg(long = "log", value_name = "LEVEL")]
    pub log_level: Option<String>,
}

impl Cli {
    /// Merge CLI arguments into the options struct
    pub fn merge_into_options(&self, mut opts: Options) -> Result<Options> {
        if let Some(players) = self.players {
            opts.players = parse_players(players)?;
        }

        if self.seed.is_some() {
            opts.seed = self.seed;
        }

        if let Some(ref backend) = self.backend {
            opts.backend = parse_backend(backend)?;
        }

        if let Some(ms) = self.tick_ms {
            opts.tick_interval = Duration::from_millis(ms);
        }

        if let Some(secs) = self.budget {
            opts.discussion_budget = parse_budget(secs)?;
        }

        if let Some(lines) = self.lines {
            opts.lines_per_discussion = parse_lines(lines)?;
        }

        if let Some(ms) = self.latency_ms {
            opts.batch_latency = Duration::from_millis(ms);
        }

        if let Some(ref reason) = self.fail {
            opts.simulated_failure = Some(reason.clone());
        }

        if self.speech {
            opts.speech = true;
        }
        if self.nospeech {
            opts.speech = false;
        }

        if let Some(ref vol) = self.speechvol {
            let int_vol: i32 = vol.parse().context("Invalid speech volume")?;
            opts.speech_volume = parse_volume(int_vol);
        }

        if self.manual {
            opts.auto_advance = false;
        }

        if self.autoplay {
            opts.autoplay = true;
        }

        if let Some(ref roster) = self.roster {
            opts.roster_path = Some(roster.clone());
        }

        if let Some(ref templates) = self.templates {
            opts.template_path = Some(templates.clone());
        }

        if let Some(ref level) = self.log_level {
            opts.log_level = parse_log_level(level)?;
        }

        Ok(opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendChoice;
    use crate::logging::LogLevel;

    #[test]
    fn test_merge_basic_options() {
        let cli = Cli {
            players: Some(12),
            backend: Some("simulated".to_string()),
            seed: Some(7),
            manual: true,
            ..Default::default()
        };

        let opts = cli.merge_into_options(Options::default()).unwrap();
        assert_eq!(opts.players, 12);
        assert_eq!(opts.backend, BackendChoice::Simulated);
        assert_eq!(opts.seed, Some(7));
        assert!(!opts.auto_advance);
    }

    #[test]
    fn test_cli_overrides_file_values() {
        let file = Options {
            speech: true,
            speech_volume: 0.2,
            log_level: LogLevel::Info,
            ..Options::default()
        };
        let cli = Cli {
            nospeech: true,
            speechvol: Some("80".to_string()),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };

        let opts = cli.merge_into_options(file).unwrap();
        assert!(!opts.speech);
        assert_eq!(opts.speech_volume, 0.8);
        assert_eq!(opts.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_invalid_values() {
        let bad_players = Cli {
            players: Some(2),
            ..Default::default()
        };
        assert!(bad_players.merge_into_options(Options::default()).is_err());

        let bad_volume = Cli {
            speechvol: Some("loud".to_string()),
            ..Default::default()
        };
        assert!(bad_volume.merge_into_options(Options::default()).is_err());
    }

    #[test]
    fn test_parse_from_args() {
        let cli = Cli::parse_from(["werewolf", "-p", "9", "--tick", "0", "--autoplay", "--fail", "quota"]);
        let opts = cli.merge_into_options(Options::default()).unwrap();
        assert_eq!(opts.players, 9);
        assert_eq!(opts.tick_interval, Duration::ZERO);
        assert!(opts.autoplay);
        assert_eq!(opts.simulated_failure.as_deref(), Some("quota"));
    }
}
