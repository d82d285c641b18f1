use anyhow::{Context, Result};

const DEFAULT_TEXT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_CLERK_API_URL: &str = "https://api.clerk.com/v1";

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub text_api_key: String,
    pub text_api_base_url: String,
    pub text_model: String,
    pub clipdrop_api_key: String,
    pub cloudinary_cloud_name: String,
    pub cloudinary_api_key: String,
    pub cloudinary_api_secret: String,
    pub clerk_secret_key: String,
    /// PEM-encoded RS256 public key used to verify session tokens locally.
    pub clerk_jwt_key: String,
    pub clerk_api_url: String,
    /// Number of metered actions a free account may run.
    pub free_usage_limit: u32,
    /// Upper bound on every outbound provider call. Calls are never retried.
    pub provider_timeout_secs: u64,
    pub max_resume_bytes: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            db_max_connections: parse_env("DB_MAX_CONNECTIONS", 10)?,
            text_api_key: require_env("GEMINI_API_KEY")?,
            text_api_base_url: optional_env("TEXT_API_BASE_URL", DEFAULT_TEXT_API_BASE_URL),
            text_model: optional_env("TEXT_MODEL", DEFAULT_TEXT_MODEL),
            clipdrop_api_key: require_env("CLIPDROP_API_KEY")?,
            cloudinary_cloud_name: require_env("CLOUDINARY_CLOUD_NAME")?,
            cloudinary_api_key: require_env("CLOUDINARY_API_KEY")?,
            cloudinary_api_secret: require_env("CLOUDINARY_API_SECRET")?,
            clerk_secret_key: require_env("CLERK_SECRET_KEY")?,
            // Keys pasted into a single-line env var usually carry escaped newlines
            clerk_jwt_key: require_env("CLERK_JWT_KEY")?.replace("\\n", "\n"),
            clerk_api_url: optional_env("CLERK_API_URL", DEFAULT_CLERK_API_URL),
            free_usage_limit: parse_env("FREE_USAGE_LIMIT", 10)?,
            provider_timeout_secs: parse_env("PROVIDER_TIMEOUT_SECS", 60)?,
            max_resume_bytes: parse_env("MAX_RESUME_BYTES", 5 * 1024 * 1024)?,
            port: parse_env("PORT", 8080)?,
            rust_log: optional_env("RUST_LOG", "info"),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}
