use crate::config::types::{ApiConfig, Config, CrawlerConfig, OutputConfig, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_api_config(&config.api)?;
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates endpoint configuration
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    let base = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if base.scheme() != "https" && base.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url '{}' must use http or https",
            config.base_url
        )));
    }

    for (name, path) in [
        ("category_path", &config.category_path),
        ("product_path", &config.product_path),
    ] {
        if !path.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "{} must start with '/', got '{}'",
                name, path
            )));
        }
    }

    if config.category_prefix.is_empty() {
        return Err(ConfigError::Validation(
            "category_prefix cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.page_size < 1 || config.page_size > 100 {
        return Err(ConfigError::Validation(format!(
            "page_size must be between 1 and 100, got {}",
            config.page_size
        )));
    }

    if config.max_workers < 1 || config.max_workers > 64 {
        return Err(ConfigError::Validation(format!(
            "max_workers must be between 1 and 64, got {}",
            config.max_workers
        )));
    }

    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    if config.max_pages_per_category < 1 || config.test_page_limit < 1 {
        return Err(ConfigError::Validation(
            "page limits must be >= 1".to_string(),
        ));
    }

    if config.test_category_limit < 1 {
        return Err(ConfigError::Validation(format!(
            "test_category_limit must be >= 1, got {}",
            config.test_category_limit
        )));
    }

    if config.post_timeout == 0 || config.get_timeout == 0 {
        return Err(ConfigError::Validation(
            "request timeouts must be non-zero".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.value.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent value cannot be empty".to_string(),
        ));
    }

    if config.value.chars().any(|c| c.is_control()) {
        return Err(ConfigError::Validation(
            "user-agent value cannot contain control characters".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    let names = [
        ("categories_file", &config.categories_file),
        ("products_csv", &config.products_csv),
        ("products_jsonl", &config.products_jsonl),
        ("test_products_csv", &config.test_products_csv),
        ("test_products_jsonl", &config.test_products_jsonl),
        ("unique_products_jsonl", &config.unique_products_jsonl),
        ("category_mapping_csv", &config.category_mapping_csv),
        ("unique_stockcodes_csv", &config.unique_stockcodes_csv),
    ];

    for (key, name) in names {
        validate_file_name(key, name)?;
    }

    // The full and test logs must not collide, or a test run would append to the real log
    if config.products_csv == config.test_products_csv
        || config.products_jsonl == config.test_products_jsonl
    {
        return Err(ConfigError::Validation(
            "test run output files must differ from full run output files".to_string(),
        ));
    }

    Ok(())
}

/// Output names are plain file names inside the output directory
fn validate_file_name(key: &str, name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::Validation(format!("{} cannot be empty", key)));
    }

    if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
        return Err(ConfigError::Validation(format!(
            "{} must be a plain file name, got '{}'",
            key, name
        )));
    }

    Ok(())
}
