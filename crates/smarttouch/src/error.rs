//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use smarttouch_config::ConfigError;
use smarttouch_core::{ControlEvent, CoreError, DeviceId, Feature, FailureKind};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const UNSUPPORTED: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const INVALID_RANGE: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the Govee API")]
    #[diagnostic(
        code(smarttouch::connection_failed),
        help(
            "Check your network connection and the base URL.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { reason: String },

    #[error("Request timed out")]
    #[diagnostic(
        code(smarttouch::timeout),
        help("Increase the timeout with --timeout or check the device's connectivity.")
    )]
    Timeout,

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed")]
    #[diagnostic(
        code(smarttouch::auth_failed),
        help(
            "The Govee API rejected the API key.\n\
             Request a new key in the Govee Home app, then run: smarttouch config init"
        )
    )]
    AuthFailed,

    #[error("No API key configured")]
    #[diagnostic(
        code(smarttouch::no_credentials),
        help(
            "Configure a key with: smarttouch config init\n\
             Or set the SMARTTOUCH_API_KEY environment variable."
        )
    )]
    NoCredentials,

    // ── Devices ──────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(smarttouch::not_found),
        help("Run: smarttouch {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("{feature} is not supported by device {device}")]
    #[diagnostic(
        code(smarttouch::unsupported),
        help("This device model rejected the command. The control stays disabled for it.")
    )]
    Unsupported { device: String, feature: String },

    #[error("Invalid {field}: {value} is outside {min}..={max}")]
    #[diagnostic(code(smarttouch::invalid_range))]
    InvalidRange {
        field: String,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("{message}")]
    #[diagnostic(code(smarttouch::invalid_range))]
    OutOfRange { message: String },

    #[error("Device error: {message}")]
    #[diagnostic(code(smarttouch::device_error))]
    Device { message: String },

    #[error("{failed} of {total} devices failed")]
    #[diagnostic(
        code(smarttouch::partial_failure),
        help("Re-run with -o json to see the per-device results.")
    )]
    PartialFailure { failed: usize, total: usize },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(smarttouch::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(smarttouch::config),
        help("Check the config file. Its path is printed by: smarttouch config path")
    )]
    Config(ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(smarttouch::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout => exit_code::TIMEOUT,
            Self::AuthFailed | Self::NoCredentials => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Unsupported { .. } => exit_code::UNSUPPORTED,
            Self::InvalidRange { .. } | Self::OutOfRange { .. } => exit_code::INVALID_RANGE,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    pub fn device_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: "device".into(),
            identifier: identifier.into(),
            list_command: "devices list".into(),
        }
    }

    /// Turn a failure event from the control plane into an error.
    ///
    /// Returns `None` for every other event.
    pub fn from_event(event: &ControlEvent) -> Option<Self> {
        match event {
            ControlEvent::DeviceError {
                id,
                kind,
                feature,
                message,
            } => Some(Self::from_failure(id.as_ref(), *kind, *feature, message)),
            ControlEvent::DiscoveryFailed { message } => Some(Self::ConnectionFailed {
                reason: message.clone(),
            }),
            _ => None,
        }
    }

    fn from_failure(
        id: Option<&DeviceId>,
        kind: FailureKind,
        feature: Option<Feature>,
        message: &str,
    ) -> Self {
        let device = id.map(ToString::to_string).unwrap_or_default();
        match kind {
            FailureKind::NotFound => Self::device_not_found(device),
            FailureKind::UnsupportedFeature => Self::Unsupported {
                device,
                feature: feature.map_or_else(|| "feature".to_owned(), |f| f.label().to_owned()),
            },
            FailureKind::InvalidRange => Self::OutOfRange {
                message: message.to_owned(),
            },
            FailureKind::Transport => Self::Device {
                message: message.to_owned(),
            },
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Transport {
                status: Some(401 | 403),
                ..
            } => CliError::AuthFailed,

            CoreError::Transport {
                status: None,
                message,
            } => CliError::ConnectionFailed { reason: message },

            CoreError::Transport { message, .. } => CliError::Device { message },

            CoreError::Timeout => CliError::Timeout,

            CoreError::UnsupportedFeature { device, feature } => CliError::Unsupported {
                device: device.to_string(),
                feature: feature.label().to_owned(),
            },

            CoreError::InvalidRange {
                field,
                value,
                min,
                max,
            } => CliError::InvalidRange {
                field,
                value,
                min,
                max,
            },

            CoreError::DeviceNotFound { identifier } => CliError::device_not_found(identifier),

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            err @ CoreError::ControlPlaneStopped => CliError::Device {
                message: err.to_string(),
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials => CliError::NoCredentials,
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(other),
        }
    }
}
