//! Configuration module for Review-Sweep
//!
//! This module handles loading, parsing, and validating the TOML
//! configuration: browser and pacing settings, pagination limits,
//! authentication timing and credentials, output paths, and the games to
//! crawl with their target URLs.
//!
//! # Example
//!
//! ```no_run
//! use review_sweep::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sweep.toml")).unwrap();
//! for (id, game) in &config.games {
//!     println!("{}: {} targets", id, game.targets.len());
//! }
//! ```

mod parser;
mod types;
mod validation;

pub use validation::{validate_lookback, MAX_LOOKBACK_DAYS};

// Re-export types
pub use types::{
    AuthConfig, BrowserSettings, Config, CredentialEntry, GameConfig, OutputConfig, PacingConfig,
    PaginationConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};

use crate::auth::Credentials;
use crate::record::SiteFamily;

impl Config {
    /// Looks up a game by id
    pub fn game(&self, game_id: &str) -> Option<&GameConfig> {
        self.games.get(game_id)
    }

    /// Resolves credentials for a family
    ///
    /// Configured credentials win; otherwise `<PREFIX>_USER` and
    /// `<PREFIX>_PASS` environment variables are consulted (for example
    /// `BAHAMUT_USER` / `BAHAMUT_PASS`).
    pub fn credentials_for(&self, family: SiteFamily) -> Option<Credentials> {
        if let Some(entry) = self.auth.credentials.get(family.source_name()) {
            return Some(Credentials::new(&entry.username, &entry.password));
        }

        let prefix = family.env_prefix();
        let username = std::env::var(format!("{}_USER", prefix)).ok()?;
        let password = std::env::var(format!("{}_PASS", prefix)).ok()?;
        if username.is_empty() {
            return None;
        }
        Some(Credentials::new(&username, &password))
    }
}
