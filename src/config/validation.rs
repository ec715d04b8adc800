use crate::config::types::{Config, CrawlerConfig, PathsConfig, SearchConfig, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_user_agent_config(&config.user_agent)?;
    validate_crawler_config(&config.crawler)?;
    validate_paths_config(&config.paths)?;
    validate_search_config(&config.search)?;
    validate_seeds(&config.seeds)?;
    Ok(())
}

fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_bytes == 0 {
        return Err(ConfigError::Validation(
            "max_bytes must be > 0".to_string(),
        ));
    }

    if config.max_text_chars == 0 {
        return Err(ConfigError::Validation(
            "max_text_chars must be > 0".to_string(),
        ));
    }

    if config.max_pages_per_domain == 0 {
        return Err(ConfigError::Validation(
            "max_pages_per_domain must be > 0".to_string(),
        ));
    }

    if config.fetch_threads == 0 {
        return Err(ConfigError::Validation(
            "fetch_threads must be > 0".to_string(),
        ));
    }

    if config.parse_threads == 0 {
        return Err(ConfigError::Validation(
            "parse_threads must be > 0".to_string(),
        ));
    }

    if config.batch_size == 0 {
        return Err(ConfigError::Validation(
            "batch_size must be > 0".to_string(),
        ));
    }

    if config.fetch_queue_capacity == 0 {
        return Err(ConfigError::Validation(
            "fetch_queue_capacity must be > 0".to_string(),
        ));
    }

    if config.connect_timeout_secs == 0 || config.read_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "connect/read timeouts must be > 0 seconds".to_string(),
        ));
    }

    Ok(())
}

fn validate_paths_config(config: &PathsConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("crawl-db", &config.crawl_db),
        ("storage-db", &config.storage_db),
        ("search-db", &config.search_db),
    ] {
        if value.is_empty() {
            return Err(ConfigError::Validation(format!(
                "{} path cannot be empty",
                name
            )));
        }
    }
    Ok(())
}

fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    if config.rate_limit_requests == 0 {
        return Err(ConfigError::Validation(
            "search.rate-limit-requests must be > 0".to_string(),
        ));
    }
    if config.rate_limit_window_secs == 0 {
        return Err(ConfigError::Validation(
            "search.rate-limit-window-secs must be > 0".to_string(),
        ));
    }
    if config.results_per_page == 0 {
        return Err(ConfigError::Validation(
            "search.results-per-page must be > 0".to_string(),
        ));
    }
    Ok(())
}

fn validate_seeds(seeds: &[String]) -> Result<(), ConfigError> {
    for seed in seeds {
        Url::parse(seed).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e))
        })?;
    }
    Ok(())
}

/// Basic email validation: non-empty local and domain parts, domain has a dot.
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let (local, domain) = (parts[0], parts[1]);
    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{BloomConfig, CrawlerConfig, PathsConfig, SearchConfig, UserAgentConfig};

    fn base_config() -> Config {
        Config {
            user_agent: UserAgentConfig {
                crawler_name: "SumiRipple".to_string(),
                crawler_version: "1.0".to_string(),
                contact_url: "https://example.com/about".to_string(),
                contact_email: "crawler@example.com".to_string(),
            },
            crawler: CrawlerConfig {
                max_bytes: 6_000_000,
                max_text_chars: 200_000,
                max_pages_per_domain: 10_000,
                crawl_delay_secs: 1,
                crawl_epoch: 1,
                fetch_threads: 200,
                parse_threads: 75,
                batch_size: 2_000,
                fetch_queue_capacity: 5_000,
                connect_timeout_secs: 3,
                read_timeout_secs: 10,
                max_retries: 2,
                dispatch_batch_size: 500,
            },
            paths: PathsConfig {
                crawl_db: "./crawl.db".to_string(),
                storage_db: "./storage.db".to_string(),
                search_db: "./search.db".to_string(),
                log_path: "./sumi-ripple.log".to_string(),
                indexer_state_path: "./indexer_state.txt".to_string(),
                bloom_hot_path: "./bloom_hot.bin".to_string(),
                bloom_cold_path: "./bloom_cold.bin".to_string(),
                authority_csv: None,
            },
            search: SearchConfig::default(),
            bloom: BloomConfig::default(),
            seeds: vec!["https://example.com/".to_string()],
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&base_config()).is_ok());
    }

    #[test]
    fn test_zero_max_bytes_rejected() {
        let mut config = base_config();
        config.crawler.max_bytes = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_fetch_threads_rejected() {
        let mut config = base_config();
        config.crawler.fetch_threads = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_db_path_rejected() {
        let mut config = base_config();
        config.paths.crawl_db = String::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_seed_rejected() {
        let mut config = base_config();
        config.seeds.push("not a url".to_string());
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@domain").is_err());
    }
}
