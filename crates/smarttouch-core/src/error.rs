// ── Core error types ──
//
// Every remote failure is converted into one of these at the gateway
// boundary. UI-facing messages never carry raw HTTP or JSON errors; the
// `FailureKind` tag is what crosses the notification bus.

use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;

use crate::model::{DeviceId, Feature};

/// How a failed operation should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    /// Network or HTTP failure. Generic device error, no retry.
    Transport,
    /// The device model rejected the feature. Control stays disabled.
    UnsupportedFeature,
    /// Value outside the validated range. Rejected before any request.
    InvalidRange,
    /// Target missing from the registry.
    NotFound,
}

/// Unified error type for the core crate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    // ── Remote ───────────────────────────────────────────────────────
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    #[error("{} is not supported by device {device}", .feature.label())]
    UnsupportedFeature { device: DeviceId, feature: Feature },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid {field}: {value} is outside {min}..={max}")]
    InvalidRange {
        field: String,
        value: i64,
        min: i64,
        max: i64,
    },

    // ── Data ─────────────────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    /// The request exceeded the configured client timeout.
    #[error("Request timed out")]
    Timeout,

    // ── Lifecycle / configuration ────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Control plane is not running")]
    ControlPlaneStopped,
}

impl CoreError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::UnsupportedFeature { .. } => FailureKind::UnsupportedFeature,
            Self::InvalidRange { .. } => FailureKind::InvalidRange,
            Self::DeviceNotFound { .. } => FailureKind::NotFound,
            Self::Transport { .. }
            | Self::Timeout
            | Self::Config { .. }
            | Self::ControlPlaneStopped => {
                FailureKind::Transport
            }
        }
    }

    pub(crate) fn not_found(id: &DeviceId) -> Self {
        Self::DeviceNotFound {
            identifier: id.to_string(),
        }
    }

    pub(crate) fn invalid_range(field: &str, value: i64, min: u32, max: u32) -> Self {
        Self::InvalidRange {
            field: field.into(),
            value,
            min: i64::from(min),
            max: i64::from(max),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<smarttouch_api::Error> for CoreError {
    fn from(err: smarttouch_api::Error) -> Self {
        match err {
            smarttouch_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            ref e if e.is_timeout() => CoreError::Timeout,
            smarttouch_api::Error::InvalidApiKey => CoreError::Transport {
                message: "Invalid API key".into(),
                status: Some(401),
            },
            other => CoreError::Transport {
                status: other.status(),
                message: other
                    .api_message()
                    .map_or_else(|| other.to_string(), str::to_owned),
            },
        }
    }
}
