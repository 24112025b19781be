use crate::config::types::{Config, HttpConfig, ScanConfig, ScopeConfig};
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Validates the entire configuration
///
/// # Arguments
///
/// * `config` - The parsed configuration
///
/// # Returns
///
/// * `Ok(())` - Every section is valid
/// * `Err(ConfigError)` - The first problem found, checking `[scan]`, then
///   `[scope]`, then `[http]`
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    let target = validate_scan_config(&config.scan)?;
    validate_scope_config(&config.scope, &target)?;
    validate_http_config(&config.http)?;
    Ok(())
}

/// Validates scan limits and returns the parsed target URL
fn validate_scan_config(config: &ScanConfig) -> Result<Url, ConfigError> {
    let target = Url::parse(&config.url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid target URL '{}': {}", config.url, e)))?;

    if target.scheme() != "http" && target.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Target URL '{}' must use HTTP or HTTPS",
            config.url
        )));
    }

    if target.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "Target URL '{}' has no host",
            config.url
        )));
    }

    if config.max_tries < 1 {
        return Err(ConfigError::Validation(format!(
            "max-tries must be >= 1, got {}",
            config.max_tries
        )));
    }

    if config.page_queue_size < 1 || config.page_queue_size > 10_000 {
        return Err(ConfigError::Validation(format!(
            "page-queue-size must be between 1 and 10000, got {}",
            config.page_queue_size
        )));
    }

    if config.url_queue_size == Some(0) {
        return Err(ConfigError::Validation(
            "url-queue-size must be >= 1 when set".to_string(),
        ));
    }

    if config.page_limit == Some(0) {
        return Err(ConfigError::Validation(
            "page-limit must be >= 1 when set".to_string(),
        ));
    }

    Ok(target)
}

/// Validates scope rules against the target
fn validate_scope_config(config: &ScopeConfig, target: &Url) -> Result<(), ConfigError> {
    for domain in &config.domains {
        validate_domain_pattern(domain)?;
    }

    let patterns = config
        .include
        .iter()
        .chain(&config.exclude)
        .chain(&config.exclude_content)
        .chain(config.redundant.iter().map(|rule| &rule.pattern));
    for pattern in patterns {
        Regex::new(pattern)
            .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))?;
    }

    for path in config.extend_paths.iter().chain(&config.restrict_paths) {
        if crate::url::to_absolute(path, target).is_none() {
            return Err(ConfigError::InvalidUrl(format!(
                "Seed path '{}' does not resolve against the target",
                path
            )));
        }
    }

    Ok(())
}

/// Validates HTTP transport settings
fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.timeout == 0 || config.connect_timeout == 0 {
        return Err(ConfigError::Validation(format!(
            "timeouts must be > 0, got timeout={} connect-timeout={}",
            config.timeout, config.connect_timeout
        )));
    }

    Ok(())
}

/// Validates a domain pattern (supports wildcards)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    match pattern.strip_prefix("*.") {
        Some(domain) => validate_domain_string(domain),
        None => validate_domain_string(pattern),
    }
}

/// Validates a domain string (without wildcard prefix)
///
/// Single-label hosts such as `localhost` are accepted.
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    Ok(())
}
