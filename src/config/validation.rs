use crate::config::types::{
    AuthConfig, Config, GameConfig, OutputConfig, PacingConfig, PaginationConfig,
};
use crate::record::SiteFamily;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_pacing_config(&config.pacing)?;
    validate_pagination_config(&config.pagination)?;
    validate_auth_config(&config.auth)?;
    validate_output_config(&config.output)?;
    for (game_id, game) in &config.games {
        validate_game(game_id, game)?;
    }
    Ok(())
}

/// Validates pacing configuration
fn validate_pacing_config(config: &PacingConfig) -> Result<(), ConfigError> {
    if config.min_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "min-delay-ms ({}) must not exceed max-delay-ms ({})",
            config.min_delay_ms, config.max_delay_ms
        )));
    }

    if config.target_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "target-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates pagination limits
fn validate_pagination_config(config: &PaginationConfig) -> Result<(), ConfigError> {
    if config.stall_limit < 1 {
        return Err(ConfigError::Validation(
            "stall-limit must be >= 1".to_string(),
        ));
    }

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(
            "max-attempts must be >= 1".to_string(),
        ));
    }

    if config.max_items < 1 || config.max_threads < 1 {
        return Err(ConfigError::Validation(
            "max-items and max-threads must be >= 1".to_string(),
        ));
    }

    if config.tail_window < 1 {
        return Err(ConfigError::Validation(
            "tail-window must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates authentication timing and credential keys
fn validate_auth_config(config: &AuthConfig) -> Result<(), ConfigError> {
    if config.challenge_timeout_secs == 0 || config.challenge_timeout_secs > 3600 {
        return Err(ConfigError::Validation(format!(
            "challenge-timeout-secs must be between 1 and 3600, got {}",
            config.challenge_timeout_secs
        )));
    }

    if config.poll_interval_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "poll-interval-ms must be >= 100ms, got {}ms",
            config.poll_interval_ms
        )));
    }

    for (source, entry) in &config.credentials {
        if SiteFamily::from_source_name(source).is_none() {
            return Err(ConfigError::Validation(format!(
                "Credentials given for unknown source '{}'",
                source
            )));
        }
        if entry.username.is_empty() {
            return Err(ConfigError::Validation(format!(
                "Credentials for '{}' have an empty username",
                source
            )));
        }
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.backup_dir.is_empty() {
        return Err(ConfigError::Validation(
            "backup-dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Longest lookback a run accepts, about a century
pub const MAX_LOOKBACK_DAYS: u32 = 36_500;

/// Checks a lookback window, from config or a `--days` override
pub fn validate_lookback(days: u32) -> Result<(), ConfigError> {
    if !(1..=MAX_LOOKBACK_DAYS).contains(&days) {
        return Err(ConfigError::Validation(format!(
            "lookback of {} days is outside 1..={}",
            days, MAX_LOOKBACK_DAYS
        )));
    }
    Ok(())
}

/// Validates one game entry
fn validate_game(game_id: &str, game: &GameConfig) -> Result<(), ConfigError> {
    if game_id.is_empty()
        || !game_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "game id '{}' must be non-empty and contain only [A-Za-z0-9_-]",
            game_id
        )));
    }

    if !(1..=MAX_LOOKBACK_DAYS).contains(&game.lookback_days) {
        return Err(ConfigError::Validation(format!(
            "lookback-days for '{}' must be between 1 and {}",
            game_id, MAX_LOOKBACK_DAYS
        )));
    }

    for target in &game.targets {
        let url = Url::parse(target).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid target URL '{}': {}", target, e))
        })?;

        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(ConfigError::InvalidUrl(format!(
                "Target URL '{}' must use http or https",
                target
            )));
        }
    }

    Ok(())
}
