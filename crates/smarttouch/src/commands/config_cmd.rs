//! Config subcommand handlers.

use dialoguer::{Input, Select};

use smarttouch_config::Config;
use smarttouch_core::PresentationMode;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

// ── Helpers ─────────────────────────────────────────────────────────

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: key.into(),
        reason: "must be a non-negative whole number".into(),
    })
}

/// Copy of the config that is safe to print.
fn redacted(cfg: &Config) -> Config {
    let mut shown = cfg.clone();
    if shown.api_key.is_some() {
        shown.api_key = Some("********".into());
    }
    shown
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::config_path(global);

    match args.command {
        // ── Init: interactive wizard ────────────────────────────────
        ConfigCommand::Init => {
            eprintln!("SmartTouch configuration wizard");
            eprintln!("   Config path: {}\n", path.display());

            if path.exists() && !util::confirm("Overwrite the existing config?", global.yes)? {
                return Ok(());
            }

            // 1. API key
            let key = rpassword::prompt_password("Govee API key: ").map_err(prompt_err)?;
            let key = key.trim().to_owned();
            if key.is_empty() {
                return Err(CliError::Validation {
                    field: "api_key".into(),
                    reason: "API key cannot be empty".into(),
                });
            }

            let store_choices = &[
                "Store in system keyring (recommended)",
                "Save to config file (plaintext)",
            ];
            let store_selection = Select::new()
                .with_prompt("Where to store the API key?")
                .items(store_choices)
                .default(0)
                .interact()
                .map_err(prompt_err)?;

            let api_key = if store_selection == 0 {
                smarttouch_config::store_api_key(&key)?;
                eprintln!("   ✓ API key stored in system keyring");
                None
            } else {
                Some(key)
            };

            // 2. Polling
            let poll_interval: u64 = Input::new()
                .with_prompt("State poll interval in seconds (0 disables)")
                .default(60)
                .interact_text()
                .map_err(prompt_err)?;

            // 3. Presentation
            let modes = &["Modal dialog", "Inline row expansion"];
            let presentation = match Select::new()
                .with_prompt("Control surface presentation")
                .items(modes)
                .default(0)
                .interact()
                .map_err(prompt_err)?
            {
                0 => PresentationMode::Modal,
                _ => PresentationMode::InlineExpand,
            };

            let cfg = Config {
                api_key,
                poll_interval,
                presentation,
                ..Config::default()
            };
            smarttouch_config::save_config_to(&cfg, &path)?;

            eprintln!("\n✓ Configuration written to {}", path.display());
            eprintln!("\n  Test it: smarttouch devices list");
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = redacted(&config::load(global)?);
            let out = output::render_single(
                global.output,
                &cfg,
                |c| toml::to_string_pretty(c).unwrap_or_else(|e| format!("{c:#?}\n# {e}")),
                |_| path.display().to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Set <key> <value> ───────────────────────────────────────
        ConfigCommand::Set { key, value } => {
            let mut cfg = smarttouch_config::load_config_from(&path)?;

            match key.replace('-', "_").as_str() {
                "api_key" => cfg.api_key = Some(value),
                "api_key_env" => cfg.api_key_env = Some(value),
                "base_url" => {
                    value.parse::<url::Url>().map_err(|_| CliError::Validation {
                        field: "base_url".into(),
                        reason: format!("invalid URL: {value}"),
                    })?;
                    cfg.base_url = Some(value);
                }
                "timeout" => cfg.timeout = parse_number(&key, &value)?,
                "poll_interval" => cfg.poll_interval = parse_number(&key, &value)?,
                "discovery_interval" => cfg.discovery_interval = parse_number(&key, &value)?,
                "quiet_window_ms" => cfg.quiet_window_ms = parse_number(&key, &value)?,
                "presentation" => {
                    cfg.presentation = value.parse().map_err(|_| CliError::Validation {
                        field: "presentation".into(),
                        reason: "must be 'modal' or 'inline'".into(),
                    })?;
                }
                other => {
                    return Err(CliError::Validation {
                        field: other.into(),
                        reason: format!(
                            "unknown config key '{other}'. Valid keys: api_key, api_key_env, \
                             base_url, timeout, poll_interval, discovery_interval, \
                             quiet_window_ms, presentation"
                        ),
                    });
                }
            }

            smarttouch_config::save_config_to(&cfg, &path)?;
            eprintln!("✓ Set {key}");
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            println!("{}", path.display());
            Ok(())
        }
    }
}
