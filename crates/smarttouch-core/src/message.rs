// ── Host notification bus ──
//
// The two message channels between a UI host and the control plane.
// Both serialize as adjacently tagged JSON so they can cross a process
// boundary one object per line.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, FailureKind};
use crate::model::{
    ColorTempRange, Device, DeviceId, DeviceTarget, Feature, PowerAction, PowerState, StatePatch,
};

// ── UI → control plane ──────────────────────────────────────────────

/// A request from a UI surface.
///
/// Numeric inputs are signed and unchecked: validation is the control
/// plane's job, so out-of-range values become `InvalidRange` errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "request", content = "payload", rename_all_fields = "camelCase")]
pub enum UiRequest {
    /// Full device list plus live state.
    RequestDiscovery,
    /// Live state for one device (sent when a control surface opens).
    RequestFreshState { id: DeviceId, model: String },
    /// Toggle power; the new state is the opposite of `current_state`.
    SetPower {
        id: DeviceId,
        model: String,
        current_state: PowerState,
    },
    SetBrightness {
        id: DeviceId,
        model: String,
        value: i64,
    },
    /// `range` overrides the registry's range for validation when present.
    SetColorTemperature {
        id: DeviceId,
        model: String,
        kelvin: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        range: Option<ColorTempRange>,
    },
    /// Power every listed device (all known devices if the list is empty).
    ToggleAll {
        action: PowerAction,
        #[serde(default)]
        devices: Vec<DeviceTarget>,
    },
    /// Apply one colour temperature and brightness to every device.
    SetAll {
        color_temperature: i64,
        brightness: i64,
    },
}

impl UiRequest {
    /// Device this request targets, if it targets exactly one.
    pub fn device(&self) -> Option<&DeviceId> {
        match self {
            Self::RequestFreshState { id, .. }
            | Self::SetPower { id, .. }
            | Self::SetBrightness { id, .. }
            | Self::SetColorTemperature { id, .. } => Some(id),
            Self::RequestDiscovery | Self::ToggleAll { .. } | Self::SetAll { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::RequestDiscovery => "RequestDiscovery",
            Self::RequestFreshState { .. } => "RequestFreshState",
            Self::SetPower { .. } => "SetPower",
            Self::SetBrightness { .. } => "SetBrightness",
            Self::SetColorTemperature { .. } => "SetColorTemperature",
            Self::ToggleAll { .. } => "ToggleAll",
            Self::SetAll { .. } => "SetAll",
        }
    }
}

// ── Bulk results ────────────────────────────────────────────────────

/// Per-device result of a bulk power command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleOutcome {
    pub device: DeviceId,
    pub success: bool,
    /// Power state after the command; absent when it failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_state: Option<PowerState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-device result of a set-all command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAllOutcome {
    pub device: DeviceId,
    pub color_temp_success: bool,
    pub brightness_success: bool,
}

/// Aggregate of a set-all command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAllReport {
    pub color_temperature: u32,
    pub brightness: u8,
    pub results: Vec<SetAllOutcome>,
    pub color_temp_successes: usize,
    pub brightness_successes: usize,
    pub total: usize,
}

impl SetAllReport {
    pub fn new(color_temperature: u32, brightness: u8, results: Vec<SetAllOutcome>) -> Self {
        Self {
            color_temperature,
            brightness,
            color_temp_successes: results.iter().filter(|r| r.color_temp_success).count(),
            brightness_successes: results.iter().filter(|r| r.brightness_success).count(),
            total: results.len(),
            results,
        }
    }
}

// ── Control plane → UI ──────────────────────────────────────────────

/// An event for UI surfaces. Emitted after the registry has been patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all_fields = "camelCase")]
pub enum ControlEvent {
    DevicesDiscovered {
        devices: Vec<Device>,
    },
    DeviceToggled {
        id: DeviceId,
        new_state: PowerState,
    },
    AllToggled {
        action: PowerAction,
        results: Vec<ToggleOutcome>,
    },
    /// Only the fields that were written.
    DeviceStateUpdated {
        id: DeviceId,
        fields: StatePatch,
    },
    /// Live state read on demand.
    DeviceFreshState {
        id: DeviceId,
        state: StatePatch,
    },
    DeviceError {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<DeviceId>,
        kind: FailureKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        feature: Option<Feature>,
        message: String,
    },
    AllDevicesSet(SetAllReport),
    DiscoveryFailed {
        message: String,
    },
}

impl ControlEvent {
    /// Wrap a failed request for the UI.
    pub fn error(id: Option<DeviceId>, err: &CoreError) -> Self {
        let feature = match err {
            CoreError::UnsupportedFeature { feature, .. } => Some(*feature),
            _ => None,
        };
        Self::DeviceError {
            id,
            kind: err.kind(),
            feature,
            message: err.to_string(),
        }
    }

    /// Device this event is about, if it concerns exactly one.
    pub fn device(&self) -> Option<&DeviceId> {
        match self {
            Self::DeviceToggled { id, .. }
            | Self::DeviceStateUpdated { id, .. }
            | Self::DeviceFreshState { id, .. } => Some(id),
            Self::DeviceError { id, .. } => id.as_ref(),
            Self::DevicesDiscovered { .. }
            | Self::AllToggled { .. }
            | Self::AllDevicesSet(_)
            | Self::DiscoveryFailed { .. } => None,
        }
    }

    /// Whether the event changes roster-level state (list is rebuilt).
    pub fn is_roster_level(&self) -> bool {
        matches!(
            self,
            Self::DevicesDiscovered { .. } | Self::AllToggled { .. } | Self::AllDevicesSet(_)
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use insta::assert_json_snapshot;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn request_wire_format() {
        assert_json_snapshot!(
            UiRequest::SetPower {
                id: DeviceId::new("aa:bb"),
                model: "H6159".into(),
                current_state: PowerState::On,
            },
            @r#"
        {
          "request": "SetPower",
          "payload": {
            "id": "AA:BB",
            "model": "H6159",
            "currentState": "on"
          }
        }
        "#
        );
    }

    #[test]
    fn parses_request_lines() {
        let req: UiRequest = serde_json::from_str(r#"{"request":"RequestDiscovery"}"#).unwrap();
        assert_eq!(req, UiRequest::RequestDiscovery);

        let req: UiRequest = serde_json::from_str(
            r#"{"request":"SetColorTemperature","payload":{"id":"aa","model":"H6159","kelvin":3000}}"#,
        )
        .unwrap();
        assert_eq!(
            req,
            UiRequest::SetColorTemperature {
                id: DeviceId::new("AA"),
                model: "H6159".into(),
                kelvin: 3000,
                range: None,
            }
        );
        assert_eq!(req.device(), Some(&DeviceId::new("aa")));

        let req: UiRequest =
            serde_json::from_str(r#"{"request":"ToggleAll","payload":{"action":"off"}}"#).unwrap();
        assert_eq!(
            req,
            UiRequest::ToggleAll {
                action: PowerAction::Off,
                devices: Vec::new(),
            }
        );
    }

    #[test]
    fn state_update_wire_format() {
        assert_json_snapshot!(
            ControlEvent::DeviceStateUpdated {
                id: DeviceId::new("aa"),
                fields: StatePatch::brightness(40),
            },
            @r#"
        {
          "event": "DeviceStateUpdated",
          "payload": {
            "id": "AA",
            "fields": {
              "brightness": 40
            }
          }
        }
        "#
        );
    }

    #[test]
    fn error_event_carries_kind_and_feature() {
        let err = CoreError::UnsupportedFeature {
            device: DeviceId::new("aa"),
            feature: Feature::ColorTemperature,
        };
        let event = ControlEvent::error(Some(DeviceId::new("aa")), &err);

        assert_json_snapshot!(event, @r#"
        {
          "event": "DeviceError",
          "payload": {
            "id": "AA",
            "kind": "unsupported_feature",
            "feature": "colorTem",
            "message": "color temperature is not supported by device AA"
          }
        }
        "#);
        assert_eq!(event.device(), Some(&DeviceId::new("aa")));
    }

    #[test]
    fn set_all_report_counts() {
        let report = SetAllReport::new(
            3000,
            60,
            vec![
                SetAllOutcome {
                    device: DeviceId::new("a"),
                    color_temp_success: true,
                    brightness_success: true,
                },
                SetAllOutcome {
                    device: DeviceId::new("b"),
                    color_temp_success: false,
                    brightness_success: true,
                },
            ],
        );
        assert_eq!(report.color_temp_successes, 1);
        assert_eq!(report.brightness_successes, 2);
        assert_eq!(report.total, 2);
    }
}
