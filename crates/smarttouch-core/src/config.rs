// ── Runtime control-plane configuration ──
//
// Built by the binary (usually via `smarttouch-config`) and handed in.
// Core never reads config files.

use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use url::Url;

use smarttouch_api::{DEFAULT_BASE_URL, TransportConfig};

use crate::error::CoreError;
use crate::lock::DEFAULT_QUIET_WINDOW;

/// How a device's control surface is presented. Both modes share the
/// same synchronization rules; only one surface may be open at a time.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PresentationMode {
    /// Dialog over the list.
    #[default]
    Modal,
    /// Row expands in place.
    #[serde(alias = "inline")]
    #[strum(serialize = "inline_expand", serialize = "inline")]
    InlineExpand,
}

/// How long each toast stays on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToastDurations {
    /// Feature rejected by the device model.
    pub limitation: Duration,
    /// Value outside the valid range.
    pub invalid_range: Duration,
    /// Any other failure.
    pub error: Duration,
    /// Bulk settings applied.
    pub applied: Duration,
    /// Tap on a disabled control.
    pub unavailable: Duration,
}

impl Default for ToastDurations {
    fn default() -> Self {
        Self {
            limitation: Duration::from_millis(5000),
            invalid_range: Duration::from_millis(3000),
            error: Duration::from_millis(4000),
            applied: Duration::from_millis(4000),
            unavailable: Duration::from_millis(4000),
        }
    }
}

/// Configuration for one control-plane instance.
#[derive(Debug, Clone)]
pub struct ControlConfig {
    /// Vendor developer API key.
    pub api_key: SecretString,
    /// API base URL; `None` uses the production endpoint.
    pub base_url: Option<Url>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Live-state polling period. `None` disables polling.
    pub poll_interval: Option<Duration>,
    /// Re-discovery period. `None` means discovery only on request.
    pub discovery_interval: Option<Duration>,
    /// Quiet window of the interaction lock.
    pub quiet_window: Duration,
    pub presentation: PresentationMode,
    pub toasts: ToastDurations,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            api_key: SecretString::from(String::new()),
            base_url: None,
            timeout: Duration::from_secs(10),
            poll_interval: Some(Duration::from_secs(60)),
            discovery_interval: None,
            quiet_window: DEFAULT_QUIET_WINDOW,
            presentation: PresentationMode::default(),
            toasts: ToastDurations::default(),
        }
    }
}

impl ControlConfig {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            ..Self::default()
        }
    }

    /// Effective API base URL.
    pub fn base_url(&self) -> Result<Url, CoreError> {
        match &self.base_url {
            Some(url) => Ok(url.clone()),
            None => Url::parse(DEFAULT_BASE_URL).map_err(|e| CoreError::Config {
                message: format!("Invalid URL: {e}"),
            }),
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig::with_timeout(self.timeout)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn defaults() {
        let cfg = ControlConfig::default();
        assert_eq!(cfg.base_url().unwrap().as_str(), DEFAULT_BASE_URL);
        assert_eq!(cfg.quiet_window, Duration::from_millis(2000));
        assert_eq!(cfg.toasts.limitation, Duration::from_millis(5000));
        assert_eq!(cfg.presentation, PresentationMode::Modal);
    }

    #[test]
    fn presentation_mode_names() {
        assert_eq!(
            PresentationMode::from_str("inline").unwrap(),
            PresentationMode::InlineExpand
        );
        assert_eq!(PresentationMode::InlineExpand.to_string(), "inline_expand");
        let m: PresentationMode = serde_json::from_str("\"inline\"").unwrap();
        assert_eq!(m, PresentationMode::InlineExpand);
    }
}
