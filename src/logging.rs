//! Log levels and logger setup
//!
//! Library code logs through the `log` facade. The binary installs
//! `env_logger` once at startup with the configured [`LogLevel`];
//! `RUST_LOG` still overrides it.

use std::fmt;
use std::str::FromStr;

use log::LevelFilter;

/// Verbosity, numbered from quietest to loudest
#[repr(i32)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Nothing = 0,
    User = 1,
    Error = 2,
    #[default]
    Warning = 3,
    Info = 4,
    Debug = 5,
    All = 6,
}

impl LogLevel {
    /// Create a LogLevel from an integer
    pub fn from_i32(level: i32) -> Self {
        match level {
            0 => LogLevel::Nothing,
            1 => LogLevel::User,
            2 => LogLevel::Error,
            3 => LogLevel::Warning,
            4 => LogLevel::Info,
            5 => LogLevel::Debug,
            6 => LogLevel::All,
            _ => LogLevel::Info,
        }
    }

    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    /// Matching filter for the `log` facade
    pub fn to_filter(self) -> LevelFilter {
        match self {
            LogLevel::Nothing => LevelFilter::Off,
            LogLevel::User | LogLevel::Error => LevelFilter::Error,
            LogLevel::Warning => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::All => LevelFilter::Trace,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Nothing => "nothing",
            LogLevel::User => "user",
            LogLevel::Error => "error",
            LogLevel::Warning => "warning",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::All => "all",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    /// Accepts a level name or its number
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(n) = s.parse::<i32>() {
            if (0..=6).contains(&n) {
                return Ok(LogLevel::from_i32(n));
            }
        }
        match s.to_lowercase().as_str() {
            "nothing" | "off" | "none" => Ok(LogLevel::Nothing),
            "user" => Ok(LogLevel::User),
            "error" => Ok(LogLevel::Error),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "all" | "trace" => Ok(LogLevel::All),
            _ => Err(format!(
                "Invalid log level: {}. Valid options: nothing, user, error, warning, info, debug, all",
                s
            )),
        }
    }
}

/// Install the process-wide logger
///
/// # Errors
/// Fails if a logger has already been installed
pub fn init(level: LogLevel) -> Result<(), log::SetLoggerError> {
    env_logger::Builder::new()
        .filter_level(level.to_filter())
        .parse_default_env()
        .format_timestamp_millis()
        .try_init()
}
