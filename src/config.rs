//! Application-level configuration loading: scoring constants, phase timings and limits.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZ_BLITZ_BACK_CONFIG_PATH";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Points awarded for correct answers.
    pub scoring: ScoringRules,
    /// Durations of the timed phases and accepted question time limits.
    pub timing: PhaseTiming,
    /// Roster and leaderboard limits.
    pub limits: SessionLimits,
    /// Eviction thresholds for idle sessions.
    pub reaper: ReaperSettings,
}

/// Points awarded for a correct answer: a fixed base plus a time-decreasing bonus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScoringRules {
    /// Points every correct answer earns.
    pub base_points: u32,
    /// Maximum bonus, scaled by the fraction of time left.
    pub bonus_points: u32,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            base_points: 1000,
            bonus_points: 500,
        }
    }
}

/// Durations of the server-driven phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PhaseTiming {
    /// Time the correct answer stays revealed before the leaderboard shows up.
    pub results_delay_secs: u64,
    /// Countdown shown on the leaderboard before the next question.
    pub leaderboard_delay_secs: u64,
    /// Time limit applied to questions submitted without one.
    pub default_time_limit_secs: u32,
    /// Lowest accepted question time limit.
    pub min_time_limit_secs: u32,
    /// Highest accepted question time limit.
    pub max_time_limit_secs: u32,
}

impl PhaseTiming {
    /// Delay between the reveal and the leaderboard.
    pub fn results_delay(&self) -> Duration {
        Duration::from_secs(self.results_delay_secs)
    }

    /// Delay between the leaderboard and the next question.
    pub fn leaderboard_delay(&self) -> Duration {
        Duration::from_secs(self.leaderboard_delay_secs)
    }
}

impl Default for PhaseTiming {
    fn default() -> Self {
        Self {
            results_delay_secs: 2,
            leaderboard_delay_secs: 5,
            default_time_limit_secs: 20,
            min_time_limit_secs: 5,
            max_time_limit_secs: 120,
        }
    }
}

/// Roster and leaderboard limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionLimits {
    /// Maximum number of players a session accepts.
    pub max_players: usize,
    /// Number of entries broadcast with the intermediate leaderboard.
    pub leaderboard_size: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_players: 200,
            leaderboard_size: 5,
        }
    }
}

/// Thresholds used to evict sessions nobody drives anymore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReaperSettings {
    /// Finished sessions are dropped from memory after this long.
    pub finished_ttl_secs: u64,
    /// Sessions without any update for this long are dropped from memory.
    pub abandoned_ttl_secs: u64,
    /// Interval between two sweeps.
    pub sweep_interval_secs: u64,
}

impl ReaperSettings {
    /// Idle time after which a finished session leaves memory.
    pub fn finished_ttl(&self) -> Duration {
        Duration::from_secs(self.finished_ttl_secs)
    }

    /// Idle time after which any session leaves memory.
    pub fn abandoned_ttl(&self) -> Duration {
        Duration::from_secs(self.abandoned_ttl_secs)
    }

    /// Interval between two sweeps, never shorter than a second.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl Default for ReaperSettings {
    fn default() -> Self {
        Self {
            finished_ttl_secs: 30 * 60,
            abandoned_ttl_secs: 2 * 60 * 60,
            sweep_interval_secs: 60,
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        base_points = app_config.scoring.base_points,
                        bonus_points = app_config.scoring.bonus_points,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON document, keeping defaults for any omitted section or key.
    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Whether `secs` is an accepted question time limit.
    pub fn accepts_time_limit(&self, secs: u32) -> bool {
        (self.timing.min_time_limit_secs..=self.timing.max_time_limit_secs).contains(&secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    scoring: ScoringRules,
    timing: PhaseTiming,
    limits: SessionLimits,
    reaper: ReaperSettings,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            scoring: value.scoring,
            timing: value.timing,
            limits: value.limits,
            reaper: value.reaper,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
