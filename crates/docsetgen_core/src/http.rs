use std::thread::sleep;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::{Client, Response};
use tracing::debug;

use crate::config::HttpSection;

/// Network seam for every GET the pipeline issues.
pub trait WikiApi {
    fn get_text(&mut self, url: &Url) -> Result<String>;
    fn get_bytes(&mut self, url: &Url) -> Result<Vec<u8>>;
    fn request_count(&self) -> usize;
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub user_agent: String,
    pub timeout_ms: u64,
    pub rate_limit_ms: u64,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl HttpClientConfig {
    pub fn from_section(section: &HttpSection) -> Self {
        Self {
            user_agent: section.user_agent(),
            timeout_ms: section.timeout_ms(),
            rate_limit_ms: section.rate_limit_ms.unwrap_or(0),
            max_retries: section.max_retries(),
            retry_delay_ms: section.retry_delay_ms.unwrap_or(500),
        }
    }
}

pub struct WikiHttpClient {
    client: Client,
    config: HttpClientConfig,
    last_request_at: Option<Instant>,
    request_count: usize,
}

impl WikiHttpClient {
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("failed to build wiki HTTP client")?;

        Ok(Self {
            client,
            config,
            last_request_at: None,
            request_count: 0,
        })
    }

    fn get(&mut self, url: &Url) -> Result<Response> {
        for attempt in 0..=self.config.max_retries {
            self.apply_rate_limit();
            debug!(url = %url, attempt, "GET");
            let response = self
                .client
                .get(url.clone())
                .header("User-Agent", self.config.user_agent.clone())
                .send();

            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    if attempt < self.config.max_retries && is_retryable_status(status) {
                        self.wait_before_retry(attempt);
                        continue;
                    }
                    bail!("HTTP {} while fetching {url}", status.as_u16());
                }
                Err(error) => {
                    if attempt < self.config.max_retries && is_retryable_error(&error) {
                        self.wait_before_retry(attempt);
                        continue;
                    }
                    return Err(error).with_context(|| format!("failed to fetch {url}"));
                }
            }
        }

        bail!("request to {url} exhausted retry budget")
    }

    fn apply_rate_limit(&mut self) {
        if let Some(last) = self.last_request_at {
            let elapsed = last.elapsed();
            let required = Duration::from_millis(self.config.rate_limit_ms);
            if elapsed < required {
                sleep(required - elapsed);
            }
        }
        self.last_request_at = Some(Instant::now());
        self.request_count = self.request_count.saturating_add(1);
    }

    fn wait_before_retry(&self, attempt: usize) {
        let exponent = u32::try_from(attempt).unwrap_or(8).min(8);
        let scale = 1u64.checked_shl(exponent).unwrap_or(256);
        let base = self.config.retry_delay_ms.saturating_mul(scale);
        let jitter = (u64::try_from(attempt).unwrap_or(0) * 17 + 31) % 97;
        sleep(Duration::from_millis(base.saturating_add(jitter)));
    }
}

impl WikiApi for WikiHttpClient {
    fn get_text(&mut self, url: &Url) -> Result<String> {
        self.get(url)?
            .text()
            .with_context(|| format!("failed to read response body from {url}"))
    }

    fn get_bytes(&mut self, url: &Url) -> Result<Vec<u8>> {
        let bytes = self
            .get(url)?
            .bytes()
            .with_context(|| format!("failed to read response body from {url}"))?;
        Ok(bytes.to_vec())
    }

    fn request_count(&self) -> usize {
        self.request_count
    }
}

/// Resolves a site-relative or absolute reference against the site base URL.
pub fn resolve_url(base: &Url, reference: &str) -> Result<Url> {
    base.join(reference)
        .with_context(|| format!("failed to resolve `{reference}` against {base}"))
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}


#[cfg(test)]
mod tests {
    use reqwest::Url;

    use super::resolve_url;

    #[test]
    fn resolve_url_handles_relative_and_absolute_references() {
        let base = Url::parse("https://love2d.org").expect("base");
        assert_eq!(
            resolve_url(&base, "/wiki/love.load").expect("join").as_str(),
            "https://love2d.org/wiki/love.load"
        );
        assert_eq!(
            resolve_url(&base, "https://cdn.example.org/main.css")
                .expect("join")
                .as_str(),
            "https://cdn.example.org/main.css"
        );
        assert_eq!(
            resolve_url(&base, "/w/index.php?title=Special:Ask&offset=500")
                .expect("join")
                .as_str(),
            "https://love2d.org/w/index.php?title=Special:Ask&offset=500"
        );
    }
}
