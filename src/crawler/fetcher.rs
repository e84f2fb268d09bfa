//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the harvester, including:
//! - Building the shared session client (cookies, default headers, compression)
//! - The session warm-up GET against the site root
//! - Fetching the category discovery document
//! - Posting browse requests and classifying the response

use crate::config::{Config, UserAgentConfig};
use crate::crawler::page::BrowseRequest;
use crate::HarvestError;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, ORIGIN, REFERER};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// Result of a browse request
#[derive(Debug)]
pub enum FetchResult {
    /// The endpoint answered with a success status
    Success {
        /// HTTP status code
        status_code: u16,
        /// Response body
        body: String,
    },

    /// Transient failure worth another attempt (5xx, 429, timeout, transport error)
    Retryable {
        /// Error description for the log
        reason: String,
    },

    /// Non-retryable HTTP status
    Rejected {
        /// The HTTP status code
        status_code: u16,
    },
}

/// Builds the session client shared by every worker
///
/// The client keeps cookies set by the warm-up request and sends the
/// configured User-Agent and Accept-Language on every request.
///
/// # Arguments
///
/// * `config` - The user agent configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use pantry_harvest::config::UserAgentConfig;
/// use pantry_harvest::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     value: "Mozilla/5.0 (X11; Linux x86_64)".to_string(),
///     accept_language: "en-GB,en;q=0.8".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    if let Ok(language) = HeaderValue::from_str(&config.accept_language) {
        headers.insert(ACCEPT_LANGUAGE, language);
    }

    Client::builder()
        .user_agent(config.value.clone())
        .default_headers(headers)
        .cookie_store(true)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Issues the initial GET that establishes session cookies
///
/// A failure is logged and otherwise ignored.
pub async fn warm_up_session(client: &Client, config: &Config) {
    let url = config.api.site_root();
    tracing::info!("Attempting initial GET to activate session...");

    let result = client
        .get(url)
        .timeout(Duration::from_secs(config.crawler.get_timeout))
        .send()
        .await
        .and_then(|response| response.error_for_status());

    match result {
        Ok(response) => tracing::info!("Initial GET OK ({}). Session active.", response.status()),
        Err(e) => tracing::warn!("Initial GET failed: {}. Proceeding anyway.", e),
    }
}

/// Fetches the category discovery document
///
/// # Returns
///
/// * `Ok(Value)` - The decoded discovery response
/// * `Err(HarvestError)` - Network failure, error status, or undecodable body
pub async fn fetch_category_tree(client: &Client, config: &Config) -> Result<Value, HarvestError> {
    let url = config.api.category_url();
    tracing::info!("Fetching category structure from {}...", url);

    let response = client
        .get(&url)
        .timeout(Duration::from_secs(config.crawler.get_timeout))
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|source| HarvestError::Http {
            url: url.clone(),
            source,
        })?;

    tracing::info!("Category data received (Status: {}).", response.status());

    let body = response.text().await.map_err(|source| HarvestError::Http {
        url: url.clone(),
        source,
    })?;

    serde_json::from_str(&body).map_err(|e| HarvestError::UnexpectedResponse {
        url,
        message: format!("category response is not JSON: {}", e),
    })
}

/// Posts one browse request and classifies the outcome
///
/// # Retry Classification
///
/// | Condition | Result |
/// |-----------|--------|
/// | HTTP 2xx | Success |
/// | HTTP 500, 502, 503, 504 | Retryable |
/// | HTTP 429 | Retryable |
/// | Timeout / connection / other transport error | Retryable |
/// | Any other status | Rejected |
///
/// # Arguments
///
/// * `client` - The shared session client
/// * `config` - Harvest configuration (endpoint, site root, timeouts)
/// * `request` - The browse payload
/// * `browse_path` - Browse page path of the category, used as the referer
pub async fn fetch_page(
    client: &Client,
    config: &Config,
    request: &BrowseRequest,
    browse_path: &str,
) -> FetchResult {
    let site_root = config.api.site_root();
    let referer = format!("{}{}", site_root, browse_path);

    let response = client
        .post(config.api.product_url())
        .timeout(Duration::from_secs(config.crawler.post_timeout))
        .header(ACCEPT, "application/json, text/plain, */*")
        .header(ORIGIN, site_root)
        .header(REFERER, referer)
        .header("Sec-Fetch-Dest", "empty")
        .header("Sec-Fetch-Mode", "cors")
        .header("Sec-Fetch-Site", "same-origin")
        .json(request)
        .send()
        .await;

    let response = match response {
        Ok(response) => response,
        Err(e) => return classify_transport_error(&e),
    };

    let status = response.status();
    if is_retryable_status(status) {
        return FetchResult::Retryable {
            reason: format!("Server error ({})", status.as_u16()),
        };
    }

    if !status.is_success() {
        return FetchResult::Rejected {
            status_code: status.as_u16(),
        };
    }

    match response.text().await {
        Ok(body) => FetchResult::Success {
            status_code: status.as_u16(),
            body,
        },
        Err(e) => classify_transport_error(&e),
    }
}

/// Returns true for statuses that are worth retrying
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
}

fn classify_transport_error(e: &reqwest::Error) -> FetchResult {
    let reason = if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        format!("Connection error: {}", e)
    } else {
        format!("Request error: {}", e)
    };

    FetchResult::Retryable { reason }
}
