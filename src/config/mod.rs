//! Configuration management.
//!
//! Settings are layered: built-in defaults, then a TOML file, then
//! environment variables named `LITERATURE_SCOUT__<SECTION>__<KEY>`.
//!
//! # Configuration File Format
//!
//! ```toml
//! contact_email = "me@example.org"
//!
//! [api_keys]
//! core = "your-core-api-key"
//! semantic_scholar = "your-api-key"
//! ncbi = "your-ncbi-key"
//!
//! [http]
//! timeout_secs = 15
//! connect_timeout_secs = 10
//!
//! [retry]
//! max_attempts = 3
//! delay_secs = 5
//!
//! [search]
//! default_limit = 25
//! max_concurrency = 4
//! probe_before_search = false
//! probe_timeout_secs = 10
//!
//! [providers.core]
//! filter = "yearPublished>=2015"
//! sort = "recency"
//!
//! [providers.google_scholar]
//! enabled = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::DEFAULT_LIMIT;
use crate::utils::RetryConfig;

pub use config::ConfigError;

/// Prefix of environment variable overrides
pub const ENV_PREFIX: &str = "LITERATURE_SCOUT";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// API keys for providers that need or accept one
    #[serde(default)]
    pub api_keys: ApiKeys,

    /// Contact address sent to OpenAlex (`mailto`) and NCBI (`email`)
    #[serde(default)]
    pub contact_email: Option<String>,

    #[serde(default)]
    pub http: HttpConfig,

    /// Retry behaviour for rate-limited providers
    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub search: SearchConfig,

    /// Per-provider options
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// API keys for external services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeys {
    /// CORE API key (required by CORE)
    #[serde(default = "env_core_key")]
    pub core: Option<String>,

    /// Semantic Scholar API key (optional, for higher rate limits)
    #[serde(default = "env_semantic_key")]
    pub semantic_scholar: Option<String>,

    /// NCBI E-utilities key (optional, raises the PubMed rate limit)
    #[serde(default = "env_ncbi_key")]
    pub ncbi: Option<String>,
}

impl Default for ApiKeys {
    fn default() -> Self {
        Self {
            core: env_core_key(),
            semantic_scholar: env_semantic_key(),
            ncbi: env_ncbi_key(),
        }
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_core_key() -> Option<String> {
    env_non_empty("CORE_API_KEY")
}

fn env_semantic_key() -> Option<String> {
    env_non_empty("SEMANTIC_SCHOLAR_API_KEY")
}

fn env_ncbi_key() -> Option<String> {
    env_non_empty("NCBI_API_KEY")
}

/// HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Whole-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

fn default_user_agent() -> String {
    format!("literature-scout/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout() -> u64 {
    15
}

fn default_connect_timeout() -> u64 {
    10
}

/// Retry settings as written in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_delay")]
    pub delay_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_secs: default_delay(),
        }
    }
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig::new(self.max_attempts, Duration::from_secs(self.delay_secs))
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_delay() -> u64 {
    5
}

/// Aggregated search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Records requested from each provider when no limit is given
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Providers queried at the same time
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Skip providers that fail a connection probe
    #[serde(default)]
    pub probe_before_search: bool,

    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Upper bound on one search attempt against one provider
    #[serde(default = "default_timeout")]
    pub provider_timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_concurrency: default_max_concurrency(),
            probe_before_search: false,
            probe_timeout_secs: default_probe_timeout(),
            provider_timeout_secs: default_timeout(),
        }
    }
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

fn default_max_concurrency() -> usize {
    4
}

fn default_probe_timeout() -> u64 {
    10
}

/// Per-provider options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub core: CoreConfig,

    #[serde(default)]
    pub google_scholar: GoogleScholarConfig,
}

/// CORE search options passed through verbatim
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub filter: Option<String>,

    #[serde(default)]
    pub sort: Option<String>,
}

/// Google Scholar is scraped, so it stays off unless switched on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleScholarConfig {
    #[serde(default = "env_scholar_enabled")]
    pub enabled: bool,
}

impl Default for GoogleScholarConfig {
    fn default() -> Self {
        Self {
            enabled: env_scholar_enabled(),
        }
    }
}

fn env_scholar_enabled() -> bool {
    env_non_empty("GOOGLE_SCHOLAR_ENABLED")
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

impl Config {
    /// Render the effective configuration as TOML
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Load configuration from a file, with environment overrides on top
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(environment())
        .build()?
        .try_deserialize()
}

/// Configuration from defaults and the environment only
pub fn get_config() -> Result<Config, ConfigError> {
    config::Config::builder()
        .add_source(environment())
        .build()?
        .try_deserialize()
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
}

/// Default location of the config file (`<config_dir>/literature-scout/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("literature-scout").join("config.toml"))
}

/// Find a config file in the working directory or the user config directory
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("literature-scout.toml");
    if local.is_file() {
        return Some(local);
    }
    default_config_path().filter(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.http.timeout_secs, 15);
        assert_eq!(config.http.connect_timeout_secs, 10);
        assert_eq!(config.search.default_limit, 25);
        assert_eq!(config.search.max_concurrency, 4);
        assert!(!config.search.probe_before_search);
        assert_eq!(config.retry.to_retry_config(), RetryConfig::default());
    }

    #[test]
    fn test_load_config_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
contact_email = "lab@example.org"

[api_keys]
core = "core-key"

[search]
max_concurrency = 2
probe_before_search = true

[retry]
max_attempts = 5
delay_secs = 1

[providers.core]
sort = "recency"

[providers.google_scholar]
enabled = true
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.contact_email.as_deref(), Some("lab@example.org"));
        assert_eq!(config.api_keys.core.as_deref(), Some("core-key"));
        assert_eq!(config.search.max_concurrency, 2);
        assert_eq!(config.search.default_limit, 25);
        assert!(config.search.probe_before_search);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.providers.core.sort.as_deref(), Some("recency"));
        assert!(config.providers.google_scholar.enabled);
    }

    #[test]
    fn test_invalid_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[search\nmax_concurrency = ").unwrap();
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_toml_output_round_trips() {
        let mut config = Config::default();
        config.search.max_concurrency = 7;
        let text = config.to_toml_string().unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.search.max_concurrency, 7);
    }
}
