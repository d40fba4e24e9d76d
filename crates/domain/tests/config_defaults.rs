use ecto_domain::config::{Config, DatabaseBackend, HostingMode};

const OPTIONAL_VARS: &[&str] =
    &["DATABASE_URL", "DATABASE_TYPE", "CENTRAL_URL", "PORT", "UPLOAD_DIR", "SERVER_ADDRESS", "HOSTING_MODE", "ALLOW_LOCAL_ACCOUNTS"];

fn clear_optional_vars() {
    for key in OPTIONAL_VARS {
        std::env::remove_var(key);
    }
}

/// `Config::from_env` reads process-wide environment state, so every
/// scenario lives in one test function — separate `#[test]` fns run on
/// different threads by default and would race on the same variables.
#[test]
fn from_env_reads_and_validates_process_environment() {
    clear_optional_vars();
    std::env::set_var("JWT_SECRET", "test-secret");

    let defaults = Config::from_env();
    assert_eq!(defaults.port, 8080);
    assert!(matches!(defaults.database_type, DatabaseBackend::Sqlite));
    assert!(matches!(defaults.hosting_mode, HostingMode::SelfHosted));
    assert!(defaults.allow_local_accounts);
    assert!(defaults.central_url.is_none());

    std::env::set_var("PORT", "3210");
    std::env::set_var("DATABASE_TYPE", "postgres");
    let overridden = Config::from_env();
    assert_eq!(overridden.port, 3210);
    assert!(matches!(overridden.database_type, DatabaseBackend::Postgres));

    clear_optional_vars();
    std::env::remove_var("JWT_SECRET");
    let result = std::panic::catch_unwind(Config::from_env);
    assert!(result.is_err(), "Config::from_env() must panic without JWT_SECRET set");
}
