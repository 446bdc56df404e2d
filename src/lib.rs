//! LinuxDo Keeper
//!
//! Automated daily browsing for linux.do forum accounts: login, randomized
//! topic reading with an occasional like, and a Connect status report per
//! account. Accounts are processed strictly one after another, each in its
//! own Chrome session.

pub mod browser;
pub mod runner;
pub mod status;

use std::path::PathBuf;
use anyhow::{bail, Context};
use tracing::{info, warn};

/// Forum home page. Login and topic browsing start here.
pub const HOME_URL: &str = "https://linux.do/";

/// Third-party status page scraped at the end of each account cycle.
pub const CONNECT_URL: &str = "https://connect.linux.do/";

/// Environment variable holding the JSON-encoded account list.
pub const ACCOUNTS_ENV: &str = "LINUX_DO_ACCOUNTS";

/// Forum account credentials.
///
/// Fields default to empty so that records missing one of them survive
/// parsing; the runner skips those with a warning instead of failing the
/// whole batch.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Account {
    pub username: String,
    pub password: String,
}

impl Account {
    /// Both credential fields present.
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

/// Application configuration, built once at startup and passed into the
/// runner. No session logic reads the environment on its own.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Accounts in the order they will be processed.
    pub accounts: Vec<Account>,
    /// Run Chrome headless.
    pub headless: bool,
    /// Explicit Chrome executable, overriding auto-detection.
    pub chrome_path: Option<String>,
}

impl AppConfig {
    /// Build the configuration from the environment.
    ///
    /// A missing or malformed account list is fatal: nothing starts without
    /// one. `LINUX_DO_HEADLESS=0|false|no` requests a visible browser, which
    /// on Linux still needs a display server (real or Xvfb).
    pub fn from_env() -> anyhow::Result<Self> {
        let raw = std::env::var(ACCOUNTS_ENV)
            .map_err(|_| anyhow::anyhow!("{} environment variable is not set", ACCOUNTS_ENV))?;
        let accounts = parse_accounts(&raw)?;

        let headless_pref = std::env::var("LINUX_DO_HEADLESS")
            .map(|v| !matches!(v.trim(), "0" | "false" | "no"))
            .unwrap_or(true);

        let has_display = std::env::var("DISPLAY").map(|d| !d.is_empty()).unwrap_or(false);
        let headless = if !headless_pref && cfg!(target_os = "linux") && !has_display {
            warn!("No DISPLAY available - forcing headless mode");
            true
        } else {
            headless_pref
        };

        let chrome_path = std::env::var("LINUX_DO_CHROME").ok().filter(|p| !p.is_empty());
        if let Some(ref path) = chrome_path {
            info!("Using Chrome executable from LINUX_DO_CHROME: {}", path);
        }

        Ok(Self {
            accounts,
            headless,
            chrome_path,
        })
    }
}

/// Parse the JSON account list.
///
/// Anything other than an array of objects with string fields is a fatal
/// configuration error. Objects missing a field parse to empty strings and
/// are dealt with per-account by the runner.
pub fn parse_accounts(raw: &str) -> anyhow::Result<Vec<Account>> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .with_context(|| format!("{} is not a valid JSON string", ACCOUNTS_ENV))?;

    if !value.is_array() {
        bail!("{} should be a JSON array of account objects", ACCOUNTS_ENV);
    }

    serde_json::from_value(value)
        .with_context(|| format!("{} entries must be objects with string fields", ACCOUNTS_ENV))
}

/// Get log directory path (shared across modules)
pub fn log_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("linuxdo-keeper").join("logs"))
}

/// Initialize logging: console output plus a daily-rolling log file when a
/// config directory is available.
pub fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false);

    if let Some(log_dir) = log_dir() {
        let _ = std::fs::create_dir_all(&log_dir);
        let file_appender = tracing_appender::rolling::daily(&log_dir, "linuxdo-keeper.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_writer(non_blocking);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        Some(guard)
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .init();

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_account_list() {
        let accounts =
            parse_accounts(r#"[{"username":"a","password":"p1"},{"username":"b","password":"p2"}]"#)
                .unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].username, "a");
        assert_eq!(accounts[1].password, "p2");
        assert!(accounts.iter().all(Account::is_complete));
    }

    #[test]
    fn entry_missing_a_field_parses_but_is_incomplete() {
        let accounts =
            parse_accounts(r#"[{"username":"a","password":"p1"},{"username":"b"}]"#).unwrap();
        assert_eq!(accounts.len(), 2);
        assert!(accounts[0].is_complete());
        assert!(!accounts[1].is_complete());
        assert_eq!(accounts[1].password, "");
    }

    #[test]
    fn malformed_json_is_fatal() {
        assert!(parse_accounts("not json").is_err());
    }

    #[test]
    fn non_array_shape_is_fatal() {
        assert!(parse_accounts(r#"{"username":"a","password":"p"}"#).is_err());
        assert!(parse_accounts(r#""just a string""#).is_err());
    }

    #[test]
    fn array_of_non_objects_is_fatal() {
        assert!(parse_accounts(r#"["a","b"]"#).is_err());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let accounts =
            parse_accounts(r#"[{"username":"a","password":"p","note":"extra"}]"#).unwrap();
        assert_eq!(accounts.len(), 1);
        assert!(accounts[0].is_complete());
    }
}
