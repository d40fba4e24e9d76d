//! Process configuration, read once at boot from the environment. Parsing
//! `std::env` directly (rather than layering a config-file format) keeps
//! env/config loading a thin, fixed-interface concern rather than a
//! subsystem of its own — the `ServerConfig` default-fn pattern is kept for
//! the handful of values that need a sensible default.

use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostingMode {
    SelfHosted,
    Managed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackend {
    Postgres,
    Sqlite,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub database_type: DatabaseBackend,
    pub database_path: String,
    pub jwt_secret: String,
    pub central_url: Option<String>,
    pub port: u16,
    pub mediasoup_min_port: u16,
    pub mediasoup_max_port: u16,
    pub upload_dir: String,
    pub server_address: Option<String>,
    pub hosting_mode: HostingMode,
    pub allow_local_accounts: bool,
    pub storage_quota_bytes: i64,
    pub max_upload_size_bytes: i64,
}

impl Config {
    /// Loads configuration from the environment. Panics only on
    /// `JWT_SECRET` being unset — every other variable degrades to a
    /// usable default for local/dev use.
    pub fn from_env() -> Self {
        let database_type = match env::var("DATABASE_TYPE").as_deref() {
            Ok("postgres") => DatabaseBackend::Postgres,
            _ => DatabaseBackend::Sqlite,
        };
        let hosting_mode = match env::var("HOSTING_MODE").as_deref() {
            Ok("managed") => HostingMode::Managed,
            _ => HostingMode::SelfHosted,
        };

        Self {
            database_url: env::var("DATABASE_URL").ok(),
            database_type,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "data/ecto.db".into()),
            jwt_secret: env::var("JWT_SECRET")
                .expect("JWT_SECRET must be set — tokens cannot be signed/verified without it"),
            central_url: env::var("CENTRAL_URL").ok().filter(|s| !s.is_empty()),
            port: env_parsed("PORT", 8080),
            mediasoup_min_port: env_parsed("MEDIASOUP_MIN_PORT", 40000),
            mediasoup_max_port: env_parsed("MEDIASOUP_MAX_PORT", 49999),
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".into()),
            server_address: env::var("SERVER_ADDRESS").ok(),
            hosting_mode,
            allow_local_accounts: env_bool("ALLOW_LOCAL_ACCOUNTS", true),
            storage_quota_bytes: env_parsed("STORAGE_QUOTA_BYTES", 10 * 1024 * 1024 * 1024),
            max_upload_size_bytes: env_parsed("MAX_UPLOAD_SIZE_BYTES", 25 * 1024 * 1024),
        }
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key).as_deref() {
        Ok("0") | Ok("false") | Ok("no") => false,
        Ok("1") | Ok("true") | Ok("yes") => true,
        _ => default,
    }
}
