//! Review-Sweep: incremental multi-source review ingestion
//!
//! This crate collects user commentary about a game from app-store review
//! feeds, video comment sections, forums and chat platforms into a
//! deduplicated SQLite store, bounded by a per-run recency cutoff.

pub mod adapters;
pub mod auth;
pub mod browser;
pub mod config;
pub mod crawler;
pub mod date;
pub mod output;
pub mod record;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Review-Sweep operations
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Unknown game '{0}'")]
    UnknownGame(String),

    #[error("No adapter routes {url}")]
    Unrouted { url: String },

    #[error("Page structure not found on {url}: {what}")]
    MissingStructure { url: String, what: String },

    #[error("Target {url} exceeded its time budget of {seconds}s")]
    TargetTimeout { url: String, seconds: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Browser session errors
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("Browser protocol error: {0}")]
    Protocol(String),

    #[error("Page is closed")]
    PageClosed,
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL: {0}")]
    MissingHost(String),
}

/// Authentication state machine errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid auth transition: {from:?} on {event:?}")]
    InvalidTransition {
        from: state::AuthState,
        event: state::AuthEvent,
    },
}

/// Result type alias for Review-Sweep operations
pub type Result<T> = std::result::Result<T, SweepError>;

/// Result type alias for browser operations
pub type BrowserResult<T> = std::result::Result<T, BrowserError>;

// Re-export commonly used types
pub use config::Config;
pub use date::{normalize, normalize_at, NormalizedDate};
pub use record::{identify, ContentRecord, SiteFamily, SourceTarget};
pub use state::{AuthState, SessionStatus};
