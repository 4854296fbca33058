//! CLI flag overrides on top of `smarttouch_config`.
//!
//! This is the single place where CLI types cross into the core
//! `ControlConfig`.

use std::path::PathBuf;

use secrecy::SecretString;

use smarttouch_config::Config;
use smarttouch_core::{ControlConfig, PresentationMode};

use crate::cli::{GlobalOpts, PresentationArg};
use crate::error::CliError;

/// Config file in effect: `--config` / `SMARTTOUCH_CONFIG`, else the
/// platform default.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(smarttouch_config::config_path)
}

/// Load file + environment layers. A missing file yields defaults.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(smarttouch_config::load_config_from(&config_path(global))?)
}

/// Apply flag overrides and resolve credentials.
///
/// Key precedence: `--api-key` (or `SMARTTOUCH_API_KEY`), the configured
/// `api_key_env` variable, the system keyring, then plaintext config.
pub fn build_control_config(
    global: &GlobalOpts,
    mut cfg: Config,
) -> Result<ControlConfig, CliError> {
    if let Some(ref url) = global.base_url {
        cfg.base_url = Some(url.clone());
    }
    if let Some(timeout) = global.timeout {
        cfg.timeout = timeout;
    }

    let api_key = match global.api_key {
        Some(ref key) if !key.trim().is_empty() => SecretString::from(key.trim().to_owned()),
        _ => smarttouch_config::resolve_api_key(&cfg)?,
    };

    Ok(smarttouch_config::to_control_config(&cfg, api_key)?)
}

impl From<PresentationArg> for PresentationMode {
    fn from(arg: PresentationArg) -> Self {
        match arg {
            PresentationArg::Modal => Self::Modal,
            PresentationArg::Inline => Self::InlineExpand,
        }
    }
}
