//! Environment-driven configuration.
//!
//! Every knob has a default, can be overridden by a `SECRET_AGI_*`
//! environment variable, and (in the binary) by an explicit CLI flag.

use std::env;

/// Default database file when nothing else is configured.
pub const DEFAULT_DB_PATH: &str = "secret_agi.db";

/// Default cap on accepted actions per simulated game.
pub const DEFAULT_MAX_TURNS: u32 = 1000;

/// Runtime settings resolved from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    /// SQLite database path (`SECRET_AGI_DB_PATH`).
    pub db_path: String,
    /// Turn cap for simulations (`SECRET_AGI_MAX_TURNS`).
    pub max_turns: u32,
    /// Setup seed for new games (`SECRET_AGI_SEED`).
    pub seed: Option<u64>,
}

impl Settings {
    /// Reads settings from the environment, falling back to defaults.
    /// Unparsable numeric values fall back as well.
    pub fn from_env() -> Self {
        Self {
            db_path: env::var("SECRET_AGI_DB_PATH").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string()),
            max_turns: env::var("SECRET_AGI_MAX_TURNS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_TURNS),
            seed: env::var("SECRET_AGI_SEED").ok().and_then(|v| v.parse().ok()),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.to_string(),
            max_turns: DEFAULT_MAX_TURNS,
            seed: None,
        }
    }
}
