use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

pub const DEFAULT_JWT_SECRET: &str = "dev-secret-change-me";

/// Server settings, read from `BOLO_*` and `OPENAI_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    /// Base for upload URLs, no trailing slash
    pub public_url: String,
    pub bot_reply_delay: Duration,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset or blank values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port: u16 = match get("BOLO_PORT") {
            Some(v) => v.trim().parse().with_context(|| format!("BOLO_PORT={v}"))?,
            None => 5000,
        };
        let delay_ms: u64 = match get("BOLO_BOT_REPLY_DELAY_MS") {
            Some(v) => v
                .trim()
                .parse()
                .with_context(|| format!("BOLO_BOT_REPLY_DELAY_MS={v}"))?,
            None => 1000,
        };

        let public_url = get("BOLO_PUBLIC_URL")
            .unwrap_or_else(|| format!("http://127.0.0.1:{port}"))
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            jwt_secret: get("BOLO_JWT_SECRET").unwrap_or_else(|| DEFAULT_JWT_SECRET.into()),
            db_path: PathBuf::from(get("BOLO_DB_PATH").unwrap_or_else(|| "bolo.db".into())),
            host: get("BOLO_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            upload_dir: PathBuf::from(get("BOLO_UPLOAD_DIR").unwrap_or_else(|| "uploads".into())),
            public_url,
            bot_reply_delay: Duration::from_millis(delay_ms),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".into()),
            openai_model: get("OPENAI_MODEL").unwrap_or_else(|| "gpt-3.5-turbo".into()),
        })
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}
