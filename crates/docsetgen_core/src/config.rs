use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://love2d.org";
pub const DEFAULT_TITLE_SUFFIX: &str = "LOVE";
pub const DEFAULT_USER_AGENT: &str = "docsetgen/0.1 (+https://love2d.org)";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct DocsetConfig {
    #[serde(default)]
    pub site: SiteSection,
    #[serde(default)]
    pub http: HttpSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct SiteSection {
    pub base_url: Option<String>,
    pub media_base_url: Option<String>,
    pub title_suffix: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct HttpSection {
    pub user_agent: Option<String>,
    pub timeout_ms: Option<u64>,
    pub rate_limit_ms: Option<u64>,
    pub max_retries: Option<usize>,
    pub retry_delay_ms: Option<u64>,
}

impl SiteSection {
    /// Resolve the wiki base URL: env DOCSETGEN_BASE_URL > config > DEFAULT_BASE_URL.
    pub fn base_url(&self) -> Result<Url> {
        let raw = env_override("DOCSETGEN_BASE_URL")
            .or_else(|| self.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Url::parse(&raw).with_context(|| format!("invalid site base URL: {raw}"))
    }

    /// Media is fetched from the base URL unless a separate host is configured.
    pub fn media_base_url(&self) -> Result<Url> {
        match &self.media_base_url {
            Some(raw) => Url::parse(raw).with_context(|| format!("invalid media base URL: {raw}")),
            None => self.base_url(),
        }
    }

    pub fn title_suffix(&self) -> &str {
        self.title_suffix.as_deref().unwrap_or(DEFAULT_TITLE_SUFFIX)
    }
}

impl HttpSection {
    /// Resolve user agent: env DOCSETGEN_USER_AGENT > config > DEFAULT_USER_AGENT.
    pub fn user_agent(&self) -> String {
        env_override("DOCSETGEN_USER_AGENT")
            .or_else(|| self.user_agent.clone())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
    }

    pub fn timeout_ms(&self) -> u64 {
        env_override("DOCSETGEN_HTTP_TIMEOUT_MS")
            .and_then(|value| value.parse::<u64>().ok())
            .or(self.timeout_ms)
            .unwrap_or(DEFAULT_TIMEOUT_MS)
    }

    /// Failed requests abort the run unless retries are configured.
    pub fn max_retries(&self) -> usize {
        env_override("DOCSETGEN_HTTP_RETRIES")
            .and_then(|value| value.parse::<usize>().ok())
            .or(self.max_retries)
            .unwrap_or(0)
    }
}

/// Load a DocsetConfig from a TOML file. Returns default if the file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<DocsetConfig> {
    if !config_path.exists() {
        return Ok(DocsetConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: DocsetConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

fn env_override(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
