use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for Review-Sweep
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserSettings,

    #[serde(default)]
    pub pacing: PacingConfig,

    #[serde(default)]
    pub pagination: PaginationConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    pub output: OutputConfig,

    /// Games keyed by game id
    #[serde(default)]
    pub games: BTreeMap<String, GameConfig>,
}

/// Browser session configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BrowserSettings {
    /// Run without a visible window. Human-assisted logins need a window.
    #[serde(default)]
    pub headless: bool,

    /// Explicit Chrome/Chromium executable; auto-detected when absent
    #[serde(default)]
    pub chrome_executable: Option<String>,

    /// DevTools WebSocket URL of an already running browser
    #[serde(default)]
    pub remote_url: Option<String>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_window_width")]
    pub window_width: u32,

    #[serde(default = "default_window_height")]
    pub window_height: u32,

    /// Navigation timeout in seconds
    #[serde(default = "default_page_timeout")]
    pub page_timeout_secs: u64,

    /// Inject anti-automation evasion scripts after each navigation
    #[serde(default = "default_true")]
    pub stealth: bool,

    /// Extra Chrome command-line arguments
    #[serde(default)]
    pub chrome_args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: false,
            chrome_executable: None,
            remote_url: None,
            user_agent: default_user_agent(),
            window_width: default_window_width(),
            window_height: default_window_height(),
            page_timeout_secs: default_page_timeout(),
            stealth: true,
            chrome_args: Vec::new(),
        }
    }
}

/// Randomized pacing between browser actions
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PacingConfig {
    #[serde(default = "default_min_delay")]
    pub min_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Wall-clock ceiling for one target, in seconds
    #[serde(default = "default_target_timeout")]
    pub target_timeout_secs: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay(),
            max_delay_ms: default_max_delay(),
            target_timeout_secs: default_target_timeout(),
        }
    }
}

/// Pagination stopping limits shared by all adapters
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PaginationConfig {
    /// Consecutive attempts without new items before giving up
    #[serde(default = "default_stall_limit")]
    pub stall_limit: u32,

    /// Hard ceiling on pagination attempts per listing
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Hard ceiling on revealed items per listing
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// Number of most recently revealed items checked against the cutoff
    #[serde(default = "default_tail_window")]
    pub tail_window: usize,

    /// Maximum threads/videos/cards visited per target
    #[serde(default = "default_max_threads")]
    pub max_threads: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            stall_limit: default_stall_limit(),
            max_attempts: default_max_attempts(),
            max_items: default_max_items(),
            tail_window: default_tail_window(),
            max_threads: default_max_threads(),
        }
    }
}

/// Authentication timing and credentials
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AuthConfig {
    /// How long to wait for a login form to render
    #[serde(default = "default_form_timeout")]
    pub form_timeout_secs: u64,

    /// How long a human operator has to clear a challenge
    #[serde(default = "default_challenge_timeout")]
    pub challenge_timeout_secs: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Credentials keyed by source name (e.g. `bahamut`, `discord`)
    #[serde(default)]
    pub credentials: BTreeMap<String, CredentialEntry>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            form_timeout_secs: default_form_timeout(),
            challenge_timeout_secs: default_challenge_timeout(),
            poll_interval_ms: default_poll_interval(),
            credentials: BTreeMap::new(),
        }
    }
}

/// Login for one source family
#[derive(Clone, Deserialize)]
pub struct CredentialEntry {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for CredentialEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialEntry")
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database file
    pub database_path: String,

    /// Directory holding the per-source JSON-lines backup ledgers
    pub backup_dir: String,
}

/// One game and the sources to crawl for it
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GameConfig {
    pub display_name: String,

    /// How many days back a crawl looks by default
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    /// Target URLs, routed to adapters by host
    #[serde(default)]
    pub targets: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    800
}

fn default_page_timeout() -> u64 {
    60
}

fn default_min_delay() -> u64 {
    2000
}

fn default_max_delay() -> u64 {
    4000
}

fn default_target_timeout() -> u64 {
    3600
}

fn default_stall_limit() -> u32 {
    5
}

fn default_max_attempts() -> u32 {
    200
}

fn default_max_items() -> usize {
    5000
}

fn default_tail_window() -> usize {
    5
}

fn default_max_threads() -> usize {
    150
}

fn default_form_timeout() -> u64 {
    15
}

fn default_challenge_timeout() -> u64 {
    120
}

fn default_poll_interval() -> u64 {
    2000
}

fn default_lookback_days() -> u32 {
    365
}
