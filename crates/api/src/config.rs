use anyhow::{Context, Result, bail};

#[derive(Debug, Clone)]
pub struct Settings {
    pub project_name: String,
    pub bind_addr: String,
    pub log_level: String,
    pub graph: GraphSettings,
    pub llm: LlmSettings,
    pub retriever: RetrieverSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct GraphSettings {
    pub uri: String,
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub timeout_secs: u64,
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone)]
pub struct RetrieverSettings {
    pub rewrite_on_empty: bool,
    pub max_query_rewrites: usize,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub max_entries: usize,
}

impl Settings {
    /// Read settings from the process environment. `dotenvy` preloading is
    /// the caller's business.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup. Tests inject closures here
    /// instead of mutating the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| -> Result<String> {
            match lookup(key) {
                Some(value) if !value.trim().is_empty() => Ok(value),
                _ => bail!("missing required environment variable {key}"),
            }
        };
        let or_default = |key: &str, default: &str| -> String {
            lookup(key).unwrap_or_else(|| default.to_string())
        };

        Ok(Self {
            project_name: or_default("PROJECT_NAME", "casegraph"),
            bind_addr: or_default("BIND_ADDR", "0.0.0.0:3000"),
            log_level: or_default("LOG_LEVEL", "info"),
            graph: GraphSettings {
                uri: or_default("NEO4J_URI", "bolt://localhost:7687"),
                user: or_default("NEO4J_USER", "neo4j"),
                password: required("NEO4J_PASSWORD")?,
            },
            llm: LlmSettings {
                base_url: or_default("LLM_BASE_URL", "https://api.groq.com/openai/v1"),
                model: or_default("LLM_MODEL", "openai/gpt-oss-120b"),
                api_key: required("LLM_API_KEY")?,
                timeout_secs: parse_number(&lookup, "LLM_TIMEOUT_SECS", 60)?,
                max_retries: parse_number(&lookup, "LLM_MAX_RETRIES", 3)?,
                initial_backoff_ms: parse_number(&lookup, "LLM_INITIAL_BACKOFF_MS", 1000)?,
                max_backoff_ms: parse_number(&lookup, "LLM_MAX_BACKOFF_MS", 10000)?,
            },
            retriever: RetrieverSettings {
                rewrite_on_empty: parse_bool(&lookup, "REWRITE_ON_EMPTY", false)?,
                max_query_rewrites: parse_number(&lookup, "MAX_QUERY_REWRITES", 2)?,
            },
            cache: CacheSettings {
                enabled: parse_bool(&lookup, "ANSWER_CACHE", true)?,
                max_entries: parse_number(&lookup, "ANSWER_CACHE_MAX_ENTRIES", 10000)?,
            },
        })
    }
}

fn parse_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("invalid number in {key}: {value:?}")),
        None => Ok(default),
    }
}

fn parse_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: bool,
) -> Result<bool> {
    match lookup(key) {
        Some(value) => match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            other => bail!("invalid boolean in {key}: {other:?}"),
        },
        None => Ok(default),
    }
}
