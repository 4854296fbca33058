//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use smarttouch_core::{ControlEvent, ControlPlane, CoreError, Device};

use crate::error::CliError;

/// Resolve a device id or name against the discovered roster.
pub fn resolve_device(plane: &ControlPlane, identifier: &str) -> Result<Arc<Device>, CliError> {
    plane.find_device(identifier).map_err(|e| match e {
        CoreError::DeviceNotFound { .. } => CliError::device_not_found(identifier),
        other => other.into(),
    })
}

/// Pass result events through; failure events become errors.
pub fn expect_success(event: ControlEvent) -> Result<ControlEvent, CliError> {
    match CliError::from_event(&event) {
        Some(err) => Err(err),
        None => Ok(event),
    }
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))
}

/// Stderr spinner for slow fan-out work. Hidden when quiet or piped.
pub fn spinner(message: impl Into<String>, quiet: bool) -> ProgressBar {
    if quiet || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}
