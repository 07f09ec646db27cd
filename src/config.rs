use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Which external risk provider assessments may consult.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    None,
    Http,
}

impl ProviderKind {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "" | "none" | "disabled" => Ok(Self::None),
            "http" => Ok(Self::Http),
            other => anyhow::bail!("AI_PROVIDER must be 'none' or 'http', got '{}'", other),
        }
    }
}

/// Settings for the HTTP provider. Present only when `AI_PROVIDER=http`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Postgres URL. When absent the service runs on `snapshot_path`.
    pub database_url: Option<String>,
    pub snapshot_path: Option<PathBuf>,
    pub port: u16,
    pub provider_kind: ProviderKind,
    pub provider: Option<ProviderConfig>,
    pub batch_concurrency: usize,
    pub response_cache_ttl_secs: u64,
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T, hint: &str) -> anyhow::Result<T> {
    match non_empty_var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be {}", name, hint)),
        None => Ok(default),
    }
}

fn validate_database_url(url: String) -> anyhow::Result<String> {
    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
        anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
    }
    Ok(url)
}

fn validate_http_url(name: &str, raw: String) -> anyhow::Result<String> {
    let parsed = url::Url::parse(&raw).map_err(|e| anyhow::anyhow!("{} is not a valid URL: {}", name, e))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(raw)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = non_empty_var("DB_URL")
            .or_else(|| non_empty_var("DATABASE_URL"))
            .map(validate_database_url)
            .transpose()?;

        let snapshot_path = non_empty_var("SNAPSHOT_PATH").map(PathBuf::from);
        if database_url.is_none() && snapshot_path.is_none() {
            anyhow::bail!("Either DB_URL/DATABASE_URL or SNAPSHOT_PATH environment variable required");
        }

        let provider_kind = ProviderKind::parse(&std::env::var("AI_PROVIDER").unwrap_or_default())?;
        let provider = match provider_kind {
            ProviderKind::None => None,
            ProviderKind::Http => Some(ProviderConfig {
                base_url: non_empty_var("AI_BASE_URL")
                    .ok_or_else(|| {
                        anyhow::anyhow!("AI_BASE_URL environment variable required when AI_PROVIDER=http")
                    })
                    .and_then(|url| validate_http_url("AI_BASE_URL", url))?,
                api_key: non_empty_var("AI_API_KEY").ok_or_else(|| {
                    anyhow::anyhow!("AI_API_KEY environment variable required when AI_PROVIDER=http")
                })?,
                model: non_empty_var("AI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
                timeout_secs: parse_var("AI_TIMEOUT_SECS", 20, "a positive number of seconds")
                    .and_then(|secs: u64| {
                        if secs == 0 {
                            anyhow::bail!("AI_TIMEOUT_SECS must be at least 1");
                        }
                        Ok(secs)
                    })?,
            }),
        };

        let config = Self {
            database_url,
            snapshot_path,
            port: parse_var("PORT", 3000, "a valid number between 1-65535")?,
            provider_kind,
            provider,
            batch_concurrency: parse_var("BATCH_CONCURRENCY", 4, "a positive integer").and_then(
                |n: usize| {
                    if n == 0 {
                        anyhow::bail!("BATCH_CONCURRENCY must be at least 1");
                    }
                    Ok(n)
                },
            )?,
            response_cache_ttl_secs: parse_var(
                "RESPONSE_CACHE_TTL_SECS",
                3600,
                "a number of seconds",
            )?,
        };

        tracing::info!(
            "Config: port={}, store={}, provider={:?}, model={}, batch_concurrency={}, cache_ttl={}s",
            config.port,
            if config.database_url.is_some() {
                "postgres"
            } else {
                "snapshot"
            },
            config.provider_kind,
            config
                .provider
                .as_ref()
                .map(|p| p.model.as_str())
                .unwrap_or("-"),
            config.batch_concurrency,
            config.response_cache_ttl_secs
        );

        Ok(config)
    }

    pub fn response_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.response_cache_ttl_secs)
    }
}
