use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_USER_AGENT: &str = "mwtools/0.3 (+https://www.mediawiki.org/wiki/API:Etiquette)";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Hosts whose category layout the scraper does not understand.
pub const BUILTIN_SCRAPE_DENYLIST: &[&str] = &["wikia.", "fandom.com"];

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct WikiConfig {
    #[serde(default)]
    pub wiki: WikiSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct WikiSection {
    pub api_url: Option<String>,
    pub user_agent: Option<String>,
    pub timeout_ms: Option<u64>,
    pub max_workers: Option<usize>,
    pub probe_api: Option<bool>,
    #[serde(default)]
    pub scrape_denylist: Vec<String>,
    #[serde(default)]
    pub extra_namespaces: Vec<String>,
}

impl WikiConfig {
    /// Resolve an explicit API endpoint: env WIKI_API_URL > config > None.
    pub fn api_url_owned(&self) -> Option<String> {
        if let Some(value) = env_trimmed("WIKI_API_URL") {
            return Some(value);
        }
        self.wiki
            .api_url
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToString::to_string)
    }

    /// Resolve user agent: env WIKI_USER_AGENT > config > DEFAULT_USER_AGENT.
    pub fn user_agent(&self) -> String {
        if let Some(value) = env_trimmed("WIKI_USER_AGENT") {
            return value;
        }
        self.wiki
            .user_agent
            .clone()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
    }

    /// Resolve the per-request timeout: env WIKI_HTTP_TIMEOUT_MS > config > default.
    pub fn timeout_ms(&self) -> u64 {
        env_trimmed("WIKI_HTTP_TIMEOUT_MS")
            .and_then(|value| value.parse::<u64>().ok())
            .or(self.wiki.timeout_ms)
            .unwrap_or(DEFAULT_TIMEOUT_MS)
    }

    /// Worker count for subcategory expansion, never below one.
    pub fn max_workers(&self) -> usize {
        env_trimmed("MWTOOLS_MAX_WORKERS")
            .and_then(|value| value.parse::<usize>().ok())
            .or(self.wiki.max_workers)
            .unwrap_or(DEFAULT_MAX_WORKERS)
            .max(1)
    }

    pub fn probe_api(&self) -> bool {
        self.wiki.probe_api.unwrap_or(true)
    }

    pub fn scrape_denylist(&self) -> Vec<String> {
        let mut entries = BUILTIN_SCRAPE_DENYLIST
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        for entry in &self.wiki.scrape_denylist {
            let entry = entry.trim();
            if !entry.is_empty() && !entries.iter().any(|known| known == entry) {
                entries.push(entry.to_string());
            }
        }
        entries
    }

    pub fn extra_namespaces(&self) -> &[String] {
        &self.wiki.extra_namespaces
    }
}

/// Load and parse a WikiConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<WikiConfig> {
    if !config_path.exists() {
        return Ok(WikiConfig::default());
    }
    let content = fs::read_to_string(config_path).map_err(|error| {
        Error::Config(format!("failed to read {}: {error}", config_path.display()))
    })?;
    toml::from_str::<WikiConfig>(&content).map_err(|error| {
        Error::Config(format!("failed to parse {}: {error}", config_path.display()))
    })
}

fn env_trimmed(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
