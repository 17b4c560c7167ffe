use crate::config::types::{Config, CrawlerConfig, DatabaseConfig, FetcherConfig, IngestionConfig};
use crate::ConfigError;

const MAX_TIMEOUT_SECS: u64 = 300;
const MAX_REDIRECTS: usize = 20;
const MAX_WORKERS: usize = 64;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_database_config(&config.database)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_crawler_config(&config.crawler)?;
    validate_ingestion_config(&config.ingestion)?;
    Ok(())
}

fn validate_database_config(config: &DatabaseConfig) -> Result<(), ConfigError> {
    if config.path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates fetcher configuration
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.timeout_secs == 0 || config.timeout_secs > MAX_TIMEOUT_SECS {
        return Err(ConfigError::Validation(format!(
            "timeout-secs must be between 1 and {}, got {}",
            MAX_TIMEOUT_SECS, config.timeout_secs
        )));
    }

    if config.max_redirects > MAX_REDIRECTS {
        return Err(ConfigError::Validation(format!(
            "max-redirects must be at most {}, got {}",
            MAX_REDIRECTS, config.max_redirects
        )));
    }

    validate_user_agent(&config.user_agent)
}

/// User agents go out as a header value, so they must be printable ASCII
fn validate_user_agent(user_agent: &str) -> Result<(), ConfigError> {
    if user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if !user_agent.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) {
        return Err(ConfigError::Validation(format!(
            "user-agent must be printable ASCII, got '{}'",
            user_agent
        )));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, config.workers
        )));
    }
    Ok(())
}

fn validate_ingestion_config(config: &IngestionConfig) -> Result<(), ConfigError> {
    if config.queue_capacity < 1 {
        return Err(ConfigError::Validation(format!(
            "queue-capacity must be >= 1, got {}",
            config.queue_capacity
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_timeout() {
        let mut config = FetcherConfig::default();
        config.timeout_secs = 0;
        assert!(validate_fetcher_config(&config).is_err());

        config.timeout_secs = MAX_TIMEOUT_SECS + 1;
        assert!(validate_fetcher_config(&config).is_err());

        config.timeout_secs = 30;
        assert!(validate_fetcher_config(&config).is_ok());
    }

    #[test]
    fn test_validate_user_agent() {
        assert!(validate_user_agent("AuroraCrawler/0.1").is_ok());
        assert!(validate_user_agent("Bot (+https://example.com/bot)").is_ok());

        assert!(validate_user_agent("").is_err());
        assert!(validate_user_agent("   ").is_err());
        assert!(validate_user_agent("bot\nInjected: header").is_err());
        assert!(validate_user_agent("bøt").is_err());
    }

    #[test]
    fn test_validate_workers() {
        let mut config = CrawlerConfig::default();
        config.workers = 0;
        assert!(validate_crawler_config(&config).is_err());

        config.workers = MAX_WORKERS + 1;
        assert!(validate_crawler_config(&config).is_err());

        config.workers = 8;
        assert!(validate_crawler_config(&config).is_ok());
    }

    #[test]
    fn test_validate_queue_capacity() {
        let config = IngestionConfig { queue_capacity: 0 };
        assert!(validate_ingestion_config(&config).is_err());
    }
}
