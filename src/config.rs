use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

/// Query bounds and fuzzy-match tuning.
#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_min_query_len")]
    pub min_query_len: usize,
    #[serde(default = "default_max_query_len")]
    pub max_query_len: usize,
    #[serde(default = "default_similar_limit")]
    pub similar_limit: i64,
    #[serde(default)]
    pub similarity: SimilarityConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_query_len: default_min_query_len(),
            max_query_len: default_max_query_len(),
            similar_limit: default_similar_limit(),
            similarity: SimilarityConfig::default(),
        }
    }
}

fn default_min_query_len() -> usize {
    2
}
fn default_max_query_len() -> usize {
    500
}
fn default_similar_limit() -> i64 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct SimilarityConfig {
    /// `substring` or `token_overlap`.
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default = "default_min_token_overlap")]
    pub min_token_overlap: f64,
    /// Queries shorter than this never take the fuzzy path. 0 disables the guard.
    #[serde(default)]
    pub min_query_chars: usize,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            min_token_overlap: default_min_token_overlap(),
            min_query_chars: 0,
        }
    }
}

fn default_strategy() -> String {
    "substring".to_string()
}
fn default_min_token_overlap() -> f64 {
    0.5
}

#[derive(Debug, Deserialize, Clone)]
pub struct AggregationConfig {
    /// Aggregator endpoint. When unset, every miss fails with "Unable to aggregate content".
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Everything the generation client needs, resolved once at load time.
#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Filled from `api_key_env` by [`load_config`] unless set explicitly.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            api_key: None,
            max_tokens: default_max_tokens(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_api_key_env() -> String {
    "AI_API_KEY".to_string()
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;

    if config.generation.api_key.is_none() {
        config.generation.api_key = std::env::var(&config.generation.api_key_env).ok();
    }

    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    let search = &config.search;
    if search.min_query_len == 0 {
        anyhow::bail!("search.min_query_len must be >= 1");
    }
    if search.min_query_len > search.max_query_len {
        anyhow::bail!("search.min_query_len must not exceed search.max_query_len");
    }
    if search.similar_limit < 1 {
        anyhow::bail!("search.similar_limit must be >= 1");
    }

    match search.similarity.strategy.as_str() {
        "substring" | "token_overlap" => {}
        other => anyhow::bail!(
            "Unknown similarity strategy: '{}'. Must be substring or token_overlap.",
            other
        ),
    }
    if !(0.0..=1.0).contains(&search.similarity.min_token_overlap) {
        anyhow::bail!("search.similarity.min_token_overlap must be in [0.0, 1.0]");
    }

    if config.aggregation.timeout_secs == 0 {
        anyhow::bail!("aggregation.timeout_secs must be > 0");
    }
    if config.generation.timeout_secs == 0 {
        anyhow::bail!("generation.timeout_secs must be > 0");
    }

    match config.generation.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    if config.cache.ttl_secs == 0 {
        anyhow::bail!("cache.ttl_secs must be > 0");
    }

    Ok(())
}
