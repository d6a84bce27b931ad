//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, WlsError};
use crate::shape::schedule::WaveSchedule;

/// Full WLS configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    pub schedule: WaveSchedule,
    pub runner: RunnerConfig,
    pub paths: PathsConfig,
}

/// Runner cadence and rehearsal knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunnerConfig {
    /// Interval between shape polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// Wall-clock compression factor for rehearsal runs. `1.0` is real time;
    /// `10.0` plays a 300-second schedule in 30 wall seconds.
    pub speedup: f64,
}

/// Filesystem paths used by wls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub journal_file: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            speedup: 1.0,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!(
                    "[WLS-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths"
                );
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        let cfg = home_dir.join(".config").join("wls").join("config.toml");
        let data = home_dir.join(".local").join("share").join("wls");
        Self {
            config_file: cfg,
            journal_file: data.join("run-journal.jsonl"),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| WlsError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(WlsError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for journaling.
    ///
    /// Uses FNV-1a for cross-process-stable hashing (no `DefaultHasher` whose
    /// seed may vary across Rust releases).
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        // schedule
        self.apply_schedule_env_overrides_from(env_var)?;

        // runner
        set_env_u64(
            "WLS_RUNNER_POLL_INTERVAL_MS",
            &mut self.runner.poll_interval_ms,
        )?;
        set_env_f64("WLS_RUNNER_SPEEDUP", &mut self.runner.speedup)?;

        // paths
        if let Some(raw) = env_var("WLS_JOURNAL_FILE") {
            self.paths.journal_file = PathBuf::from(raw);
        }

        Ok(())
    }

    fn apply_schedule_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("WLS_SCHEDULE_MAX_USERS") {
            self.schedule.max_users = parse_env_u32("WLS_SCHEDULE_MAX_USERS", &raw)?;
        }

        if let Some(raw) = lookup("WLS_SCHEDULE_RAMP_UP_SECONDS") {
            self.schedule.ramp_up_seconds = parse_env_f64("WLS_SCHEDULE_RAMP_UP_SECONDS", &raw)?;
        }

        if let Some(raw) = lookup("WLS_SCHEDULE_HOLD_SECONDS") {
            self.schedule.hold_seconds = parse_env_f64("WLS_SCHEDULE_HOLD_SECONDS", &raw)?;
        }

        if let Some(raw) = lookup("WLS_SCHEDULE_RAMP_DOWN_SECONDS") {
            self.schedule.ramp_down_seconds =
                parse_env_f64("WLS_SCHEDULE_RAMP_DOWN_SECONDS", &raw)?;
        }

        if let Some(raw) = lookup("WLS_SCHEDULE_SPAWN_RATE") {
            self.schedule.spawn_rate = parse_env_f64("WLS_SCHEDULE_SPAWN_RATE", &raw)?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        // Schedule invariants carry their own error code.
        self.schedule.validate()?;

        if self.runner.poll_interval_ms == 0 {
            return Err(WlsError::InvalidConfig {
                details: "runner.poll_interval_ms must be >= 1".to_string(),
            });
        }

        if !self.runner.speedup.is_finite() || self.runner.speedup <= 0.0 {
            return Err(WlsError::InvalidConfig {
                details: format!(
                    "runner.speedup must be finite and > 0, got {}",
                    self.runner.speedup
                ),
            });
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn set_env_f64(name: &str, slot: &mut f64) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = parse_env_f64(name, &raw)?;
    }
    Ok(())
}

fn set_env_u64(name: &str, slot: &mut u64) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = raw.parse::<u64>().map_err(|error| WlsError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}

fn parse_env_u32(name: &str, raw: &str) -> Result<u32> {
    raw.parse::<u32>().map_err(|error| WlsError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

fn parse_env_f64(name: &str, raw: &str) -> Result<f64> {
    raw.parse::<f64>().map_err(|error| WlsError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}
