//! Shared configuration for SmartTouch tools.
//!
//! TOML file + `SMARTTOUCH_` environment layering, API-key resolution
//! (env var, keyring, plaintext) and translation to
//! `smarttouch_core::ControlConfig`. The CLI adds flag overrides on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use smarttouch_core::{ControlConfig, PresentationMode, ToastDurations};

/// Keyring service name; the account is [`KEYRING_ACCOUNT`].
pub const KEYRING_SERVICE: &str = "smarttouch";
pub const KEYRING_ACCOUNT: &str = "api-key";

/// Environment variable prefix for every config key.
pub const ENV_PREFIX: &str = "SMARTTOUCH_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no API key configured")]
    NoCredentials,

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// API key (plaintext; prefer keyring or env var).
    pub api_key: Option<String>,

    /// Environment variable name containing the API key.
    pub api_key_env: Option<String>,

    /// Vendor API base URL override.
    pub base_url: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Live-state polling period in seconds; 0 disables polling.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    /// Re-discovery period in seconds; 0 means discovery at startup only.
    #[serde(default)]
    pub discovery_interval: u64,

    /// Interaction-lock quiet window in milliseconds.
    #[serde(default = "default_quiet_window_ms")]
    pub quiet_window_ms: u64,

    #[serde(default)]
    pub presentation: PresentationMode,

    #[serde(default)]
    pub toast: ToastConfig,

    #[serde(default)]
    pub defaults: Defaults,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: None,
            base_url: None,
            timeout: default_timeout(),
            poll_interval: default_poll_interval(),
            discovery_interval: 0,
            quiet_window_ms: default_quiet_window_ms(),
            presentation: PresentationMode::default(),
            toast: ToastConfig::default(),
            defaults: Defaults::default(),
        }
    }
}

/// CLI presentation defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
        }
    }
}

/// Toast durations in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ToastConfig {
    pub limitation_ms: u64,
    pub invalid_range_ms: u64,
    pub error_ms: u64,
    pub applied_ms: u64,
    pub unavailable_ms: u64,
}

impl Default for ToastConfig {
    fn default() -> Self {
        let d = ToastDurations::default();
        let ms = |v: Duration| u64::try_from(v.as_millis()).unwrap_or(u64::MAX);
        Self {
            limitation_ms: ms(d.limitation),
            invalid_range_ms: ms(d.invalid_range),
            error_ms: ms(d.error),
            applied_ms: ms(d.applied),
            unavailable_ms: ms(d.unavailable),
        }
    }
}

impl From<ToastConfig> for ToastDurations {
    fn from(t: ToastConfig) -> Self {
        Self {
            limitation: Duration::from_millis(t.limitation_ms),
            invalid_range: Duration::from_millis(t.invalid_range_ms),
            error: Duration::from_millis(t.error_ms),
            applied: Duration::from_millis(t.applied_ms),
            unavailable: Duration::from_millis(t.unavailable_ms),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    10
}
fn default_poll_interval() -> u64 {
    60
}
fn default_quiet_window_ms() -> u64 {
    2000
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "smarttouch", "smarttouch").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("smarttouch");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the default file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from a specific file + environment. A missing file is not an error.
///
/// Nested keys use a double underscore: `SMARTTOUCH_TOAST__ERROR_MS`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution (without CLI flags) ───────────────────────

/// Resolve the API key from the credential chain (no CLI flag step).
pub fn resolve_api_key(cfg: &Config) -> Result<SecretString, ConfigError> {
    // 1. Configured env var
    if let Some(ref env_name) = cfg.api_key_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, KEYRING_ACCOUNT) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config (or SMARTTOUCH_API_KEY via figment)
    if let Some(ref key) = cfg.api_key {
        return Ok(SecretString::from(key.clone()));
    }

    Err(ConfigError::NoCredentials)
}

/// Store the API key in the system keyring.
pub fn store_api_key(key: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_ACCOUNT)?;
    entry.set_password(key)?;
    Ok(())
}

// ── Translation to the core runtime config ──────────────────────────

/// Build a `ControlConfig` from the loaded config and a resolved key.
pub fn to_control_config(
    cfg: &Config,
    api_key: SecretString,
) -> Result<ControlConfig, ConfigError> {
    let base_url = cfg
        .base_url
        .as_deref()
        .map(|raw| {
            raw.parse::<url::Url>().map_err(|_| ConfigError::Validation {
                field: "base_url".into(),
                reason: format!("invalid URL: {raw}"),
            })
        })
        .transpose()?;

    if cfg.timeout == 0 {
        return Err(ConfigError::Validation {
            field: "timeout".into(),
            reason: "must be at least 1 second".into(),
        });
    }

    let period = |secs: u64| (secs > 0).then(|| Duration::from_secs(secs));

    Ok(ControlConfig {
        api_key,
        base_url,
        timeout: Duration::from_secs(cfg.timeout),
        poll_interval: period(cfg.poll_interval),
        discovery_interval: period(cfg.discovery_interval),
        quiet_window: Duration::from_millis(cfg.quiet_window_ms),
        presentation: cfg.presentation,
        toasts: cfg.toast.into(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.timeout, 10);
        assert_eq!(cfg.poll_interval, 60);
        assert_eq!(cfg.quiet_window_ms, 2000);
        assert_eq!(cfg.toast.limitation_ms, 5000);
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
api_key = "abc"
poll_interval = 0
discovery_interval = 300
presentation = "inline"

[toast]
error_ms = 1500
"#,
        )
        .unwrap();

        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.api_key.as_deref(), Some("abc"));
        assert_eq!(cfg.presentation, PresentationMode::InlineExpand);
        assert_eq!(cfg.toast.error_ms, 1500);
        assert_eq!(cfg.toast.invalid_range_ms, 3000);

        let control = to_control_config(&cfg, SecretString::from("abc".to_owned())).unwrap();
        assert_eq!(control.poll_interval, None);
        assert_eq!(control.discovery_interval, Some(Duration::from_secs(300)));
        assert_eq!(control.toasts.error, Duration::from_millis(1500));
        assert_eq!(control.api_key.expose_secret(), "abc");
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let cfg = Config {
            base_url: Some("http://localhost:9999/v1/".into()),
            timeout: 5,
            ..Config::default()
        };
        save_config_to(&cfg, &path).unwrap();
        assert_eq!(load_config_from(&path).unwrap(), cfg);
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let cfg = Config {
            base_url: Some("not a url".into()),
            ..Config::default()
        };
        let err = to_control_config(&cfg, SecretString::from(String::new())).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "base_url"));
    }

    #[test]
    fn plaintext_key_is_last_resort() {
        let cfg = Config {
            api_key: Some("plain".into()),
            api_key_env: Some("SMARTTOUCH_TEST_UNSET_VARIABLE".into()),
            ..Config::default()
        };
        // The keyring may or may not hold a key on the test host; either
        // way resolution succeeds.
        assert!(resolve_api_key(&cfg).is_ok());
    }
}
