use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use tracing::warn;

const DEV_ACCESS_SECRET: &str = "dev-access-secret-change-me";
const DEV_REFRESH_SECRET: &str = "dev-refresh-secret-change-me";

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub media_dir: PathBuf,
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
    pub max_upload_mb: usize,
    /// Allowed CORS origin; any origin when unset.
    pub cors_origin: Option<String>,
    /// Web client base URL used in verification and reset links.
    pub public_url: String,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.into())
}

fn parsed_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} has an invalid value: {raw:?}")),
        Err(_) => Ok(default),
    }
}

fn secret(name: &str, dev_default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| {
        warn!("{} is not set, using an insecure development secret", name);
        dev_default.into()
    })
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            host: var_or("VIDTUBE_HOST", "0.0.0.0"),
            port: parsed_or("VIDTUBE_PORT", 8000)?,
            db_path: PathBuf::from(var_or("VIDTUBE_DB_PATH", "vidtube.db")),
            media_dir: PathBuf::from(var_or("VIDTUBE_MEDIA_DIR", "./media")),
            access_secret: secret("VIDTUBE_ACCESS_SECRET", DEV_ACCESS_SECRET),
            refresh_secret: secret("VIDTUBE_REFRESH_SECRET", DEV_REFRESH_SECRET),
            access_ttl_minutes: parsed_or("VIDTUBE_ACCESS_TTL_MINUTES", 15)?,
            refresh_ttl_days: parsed_or("VIDTUBE_REFRESH_TTL_DAYS", 10)?,
            max_upload_mb: parsed_or("VIDTUBE_MAX_UPLOAD_MB", 200)?,
            cors_origin: std::env::var("VIDTUBE_CORS_ORIGIN")
                .ok()
                .filter(|o| !o.trim().is_empty()),
            public_url: var_or("VIDTUBE_PUBLIC_URL", "http://localhost:5173"),
        })
    }
}
