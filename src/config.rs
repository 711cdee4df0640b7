use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub engine: EngineConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Hosted search engine connection settings. The API key itself never
/// appears in the config file — only the name of the environment
/// variable holding it.
#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    pub url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_api_key_env() -> String {
    "MINDMARK_SEARCH_API_KEY".to_string()
}
fn default_collection() -> String {
    "bookmarks".to_string()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_connect_timeout_secs() -> u64 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[serde(default = "default_max_per_page")]
    pub max_per_page: u32,
    #[serde(default = "default_max_facet_values")]
    pub max_facet_values: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            per_page: default_per_page(),
            max_per_page: default_max_per_page(),
            max_facet_values: default_max_facet_values(),
        }
    }
}

fn default_per_page() -> u32 {
    20
}
fn default_max_per_page() -> u32 {
    100
}
fn default_max_facet_values() -> u32 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    250
}
fn default_cache_capacity() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8090".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate engine
    if !config.engine.url.starts_with("http://") && !config.engine.url.starts_with("https://") {
        anyhow::bail!("engine.url must be an http(s) URL, got '{}'", config.engine.url);
    }
    if config.engine.collection.trim().is_empty() {
        anyhow::bail!("engine.collection must not be empty");
    }
    if config.engine.api_key_env.trim().is_empty() {
        anyhow::bail!("engine.api_key_env must not be empty");
    }
    if config.engine.timeout_secs == 0 {
        anyhow::bail!("engine.timeout_secs must be > 0");
    }

    // Validate search
    if config.search.per_page == 0 || config.search.per_page > config.search.max_per_page {
        anyhow::bail!(
            "search.per_page must be in [1, {}], got {}",
            config.search.max_per_page,
            config.search.per_page
        );
    }
    if config.search.max_facet_values == 0 {
        anyhow::bail!("search.max_facet_values must be > 0");
    }

    // Validate session
    if config.session.cache_capacity == 0 {
        anyhow::bail!("session.cache_capacity must be > 0");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(content: &str) -> (TempDir, std::path::PathBuf) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("mindmark.toml");
        fs::write(&path, content).unwrap();
        (tmp, path)
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let (_tmp, path) = write_config(
            r#"[engine]
url = "http://localhost:8108"
"#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.engine.collection, "bookmarks");
        assert_eq!(config.engine.api_key_env, "MINDMARK_SEARCH_API_KEY");
        assert_eq!(config.search.per_page, 20);
        assert_eq!(config.session.debounce_ms, 250);
        assert_eq!(config.session.cache_capacity, 50);
        assert_eq!(config.server.bind, "127.0.0.1:8090");
    }

    #[test]
    fn test_non_http_url_rejected() {
        let (_tmp, path) = write_config(
            r#"[engine]
url = "localhost:8108"
"#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_per_page_above_max_rejected() {
        let (_tmp, path) = write_config(
            r#"[engine]
url = "http://localhost:8108"

[search]
per_page = 500
max_per_page = 100
"#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_zero_cache_capacity_rejected() {
        let (_tmp, path) = write_config(
            r#"[engine]
url = "http://localhost:8108"

[session]
cache_capacity = 0
"#,
        );
        assert!(load_config(&path).is_err());
    }
}
