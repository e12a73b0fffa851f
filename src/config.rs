use crate::services::survey_service::ServiceSettings;
use anyhow::{Context, Result};
use clap::Parser;
use std::{env, fmt, str::FromStr, time::Duration};

/// Used when `SURVEY_ADMIN_PASSWORD` is unset. Startup logs a warning.
pub const PLACEHOLDER_ADMIN_PASSWORD: &str = "change-me";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    /// Shared password for the admin surface. Not a security control.
    pub admin_password: String,
    /// Password required to delete all responses.
    pub reset_password: String,
    pub store_timeout_secs: u64,
    pub max_upload_bytes: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Design rating survey service")]
pub struct Args {
    /// Host to bind to (overrides SURVEY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides SURVEY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where design images are stored (overrides SURVEY_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides SURVEY_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Seconds before a store call is abandoned (overrides SURVEY_STORE_TIMEOUT_SECS)
    #[arg(long)]
    pub store_timeout_secs: Option<u64>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("SURVEY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = env_parse("SURVEY_PORT", 3000u16)?;
        let env_storage =
            env::var("SURVEY_STORAGE_DIR").unwrap_or_else(|_| "./data/designs".into());
        let env_db = env::var("SURVEY_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/survey.db".into());
        let env_timeout = env_parse("SURVEY_STORE_TIMEOUT_SECS", 10u64)?;
        let max_upload_bytes = env_parse("SURVEY_MAX_UPLOAD_BYTES", 10 * 1024 * 1024usize)?;

        let admin_password = match env::var("SURVEY_ADMIN_PASSWORD") {
            Ok(value) if !value.is_empty() => value,
            _ => {
                tracing::warn!(
                    "SURVEY_ADMIN_PASSWORD not set; using the placeholder password. \
                     The admin password only gates the dashboard and is not access control."
                );
                PLACEHOLDER_ADMIN_PASSWORD.to_string()
            }
        };
        let reset_password = env::var("SURVEY_RESET_PASSWORD")
            .ok()
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| admin_password.clone());

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            admin_password,
            reset_password,
            store_timeout_secs: args.store_timeout_secs.unwrap_or(env_timeout).max(1),
            max_upload_bytes,
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            admin_password: self.admin_password.clone(),
            reset_password: self.reset_password.clone(),
            store_timeout: Duration::from_secs(self.store_timeout_secs),
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("storage_dir", &self.storage_dir)
            .field("database_url", &self.database_url)
            .field("admin_password", &"<redacted>")
            .field("reset_password", &"<redacted>")
            .field("store_timeout_secs", &self.store_timeout_secs)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

/// Read and parse an environment variable, falling back to `default` when unset.
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}
