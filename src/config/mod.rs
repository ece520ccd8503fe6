use std::env;
use std::time::Duration;

/// 历史记录存储后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryBackendKind {
    File,
    Redis,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_model: String,
    pub openai_timeout_secs: u64,
    pub blob_token: String,
    pub blob_api_url: String,
    pub image_retention_hours: u64,
    pub rate_limit_requests: u32,
    pub rate_limit_window_ms: u64,
    pub rate_limit_max_keys: usize,
    pub upload_max_bytes: usize,
    pub history_backend: HistoryBackendKind,
    pub history_dir: String,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从任意键值来源构建配置，必填项缺失时返回 `VarError::NotPresent`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, env::VarError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).ok_or(env::VarError::NotPresent);
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.into());

        let history_backend = match or_default("HISTORY_BACKEND", "file")
            .to_ascii_lowercase()
            .as_str()
        {
            "redis" => HistoryBackendKind::Redis,
            _ => HistoryBackendKind::File,
        };

        Ok(Config {
            database_url: required("DATABASE_URL")?,
            redis_url: lookup("REDIS_URL").filter(|url| !url.trim().is_empty()),
            server_host: or_default("SERVER_HOST", "::"),
            server_port: or_default("SERVER_PORT", "3000").parse().unwrap_or(3000),
            api_base_uri: or_default("API_BASE_URI", "/api"),
            openai_api_key: required("OPENAI_API_KEY")?,
            openai_base_url: or_default("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            openai_model: or_default("OPENAI_MODEL", "gpt-4o"),
            openai_timeout_secs: or_default("OPENAI_TIMEOUT_SECS", "90")
                .parse()
                .unwrap_or(90),
            blob_token: required("BLOB_READ_WRITE_TOKEN")?,
            blob_api_url: or_default("BLOB_API_URL", "https://blob.vercel-storage.com"),
            image_retention_hours: or_default("IMAGE_RETENTION_HOURS", "24")
                .trim_end_matches('h')
                .parse()
                .unwrap_or(24),
            rate_limit_requests: or_default("RATE_LIMIT_MAX_REQUESTS", "10")
                .parse()
                .unwrap_or(10),
            rate_limit_window_ms: or_default("RATE_LIMIT_WINDOW_MS", "3600000")
                .parse()
                .unwrap_or(3_600_000),
            rate_limit_max_keys: or_default("RATE_LIMIT_MAX_KEYS", "10000")
                .parse()
                .unwrap_or(10_000),
            upload_max_bytes: or_default("UPLOAD_MAX_BYTES", "10485760")
                .parse()
                .unwrap_or(10 * 1024 * 1024),
            history_backend,
            history_dir: or_default("HISTORY_DIR", "./data/history"),
        })
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit_window_ms)
    }

    pub fn openai_timeout(&self) -> Duration {
        Duration::from_secs(self.openai_timeout_secs)
    }

    pub fn image_retention(&self) -> Duration {
        Duration::from_secs(self.image_retention_hours.saturating_mul(3600))
    }
}
