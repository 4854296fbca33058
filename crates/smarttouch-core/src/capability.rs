// ── Capability resolution ──
//
// Static capabilities come from discovery (`supportCmds` and the reported
// colour-temperature range). Dynamic knowledge comes from failed commands:
// once the vendor says a model cannot do something, the feature is recorded
// here for the rest of the session and controls are disabled up front.

use std::collections::BTreeSet;
use std::str::FromStr;

use dashmap::DashMap;
use tracing::{debug, info};

use smarttouch_api::ApiDevice;

use crate::error::{CoreError, FailureKind};
use crate::model::{ColorTempRange, Device, DeviceId, Feature};

/// Message fragments the vendor uses when a model lacks a command.
const UNSUPPORTED_PATTERNS: &[&str] = &[
    "unsupported",
    "not support",
    "doesn't support",
    "cannot support",
];

/// Message fragments the vendor uses for a rejected parameter value.
const OUT_OF_RANGE_PATTERNS: &[&str] = &[
    "out of range",
    "invalid value",
    "invalid range",
    "must be between",
];

/// Capabilities resolved from one discovery entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub features: BTreeSet<Feature>,
    pub color_temp_range: Option<ColorTempRange>,
}

/// Per-device feature support, seeded at discovery and narrowed by
/// observed command failures. Never persisted.
#[derive(Debug, Default)]
pub struct CapabilityResolver {
    unsupported: DashMap<DeviceId, BTreeSet<Feature>>,
}

impl CapabilityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract capabilities from raw discovery data.
    ///
    /// A device that lists its commands without `colorTem` has colour
    /// temperature marked unsupported immediately. A range is kept only
    /// when the feature may be used.
    pub fn resolve(&self, raw: &ApiDevice) -> Capabilities {
        let id = DeviceId::new(&raw.device);
        let mut features = BTreeSet::new();
        for cmd in &raw.support_cmds {
            match Feature::from_str(cmd) {
                Ok(f) => {
                    features.insert(f);
                }
                Err(_) => debug!(device = %id, command = %cmd, "ignoring unknown command"),
            }
        }

        let color_temp_possible =
            features.is_empty() || features.contains(&Feature::ColorTemperature);
        if !color_temp_possible {
            self.record_unsupported(&id, Feature::ColorTemperature);
        }

        Capabilities {
            color_temp_range: raw
                .color_tem_range()
                .map(ColorTempRange::from)
                .filter(|_| color_temp_possible),
            features,
        }
    }

    /// Remember that `id` cannot do `feature`. Returns `true` if this is new.
    pub fn record_unsupported(&self, id: &DeviceId, feature: Feature) -> bool {
        let inserted = self.unsupported.entry(id.clone()).or_default().insert(feature);
        if inserted {
            info!(device = %id, %feature, "feature marked unsupported");
        }
        inserted
    }

    pub fn is_unsupported(&self, id: &DeviceId, feature: Feature) -> bool {
        self.unsupported
            .get(id)
            .is_some_and(|set| set.contains(&feature))
    }

    /// Features recorded as unsupported for `id`.
    pub fn unsupported(&self, id: &DeviceId) -> BTreeSet<Feature> {
        self.unsupported
            .get(id)
            .map(|set| set.clone())
            .unwrap_or_default()
    }

    /// Whether a control for `feature` should be live for `device`.
    pub fn supports(&self, device: &Device, feature: Feature) -> bool {
        device.advertises(feature) && !self.is_unsupported(&device.id, feature)
    }

    // ── Failure classification ───────────────────────────────────────

    /// Decide how a vendor failure should be treated.
    ///
    /// Only explicit vendor rejections are inspected; anything that never
    /// reached the vendor is a transport failure.
    pub fn classify(err: &smarttouch_api::Error) -> FailureKind {
        let Some(message) = err.api_message() else {
            return FailureKind::Transport;
        };
        if matches!(err.status(), Some(s) if s >= 500) {
            return FailureKind::Transport;
        }

        let message = message.to_ascii_lowercase();
        if UNSUPPORTED_PATTERNS.iter().any(|p| message.contains(p)) {
            FailureKind::UnsupportedFeature
        } else if OUT_OF_RANGE_PATTERNS.iter().any(|p| message.contains(p)) {
            FailureKind::InvalidRange
        } else {
            FailureKind::Transport
        }
    }

    // ── Local validation ─────────────────────────────────────────────

    /// Check `kelvin` against the device range (or the fallback range).
    pub fn validate_color_temperature(
        kelvin: i64,
        range: Option<ColorTempRange>,
    ) -> Result<u32, CoreError> {
        let range = range.unwrap_or(ColorTempRange::FALLBACK);
        u32::try_from(kelvin)
            .ok()
            .filter(|k| range.contains(*k))
            .ok_or_else(|| {
                CoreError::invalid_range("color temperature", kelvin, range.min, range.max)
            })
    }

    /// Brightness is a percentage, 1 through 100.
    pub fn validate_brightness(value: i64) -> Result<u8, CoreError> {
        u8::try_from(value)
            .ok()
            .filter(|v| (1..=100).contains(v))
            .ok_or_else(|| CoreError::invalid_range("brightness", value, 1, 100))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn api_device(cmds: &[&str], range: Option<(u32, u32)>) -> ApiDevice {
        let mut raw = json!({
            "device": "aa:bb",
            "model": "H6159",
            "supportCmds": cmds,
        });
        if let Some((min, max)) = range {
            raw["properties"] = json!({ "colorTem": { "range": { "min": min, "max": max } } });
        }
        serde_json::from_value(raw).unwrap()
    }

    fn rejection(message: &str) -> smarttouch_api::Error {
        smarttouch_api::Error::Api {
            status: 400,
            code: Some(400),
            message: message.into(),
        }
    }

    #[test]
    fn resolves_features_and_range() {
        let resolver = CapabilityResolver::new();
        let caps = resolver.resolve(&api_device(
            &["turn", "brightness", "colorTem", "music"],
            Some((2700, 6500)),
        ));

        assert_eq!(
            caps.features,
            [Feature::Power, Feature::Brightness, Feature::ColorTemperature]
                .into_iter()
                .collect()
        );
        assert_eq!(
            caps.color_temp_range,
            Some(ColorTempRange { min: 2700, max: 6500 })
        );
        assert!(!resolver.is_unsupported(&DeviceId::new("AA:BB"), Feature::ColorTemperature));
    }

    #[test]
    fn missing_color_tem_command_marks_unsupported() {
        let resolver = CapabilityResolver::new();
        let caps = resolver.resolve(&api_device(&["turn", "brightness"], Some((2000, 9000))));

        assert_eq!(caps.color_temp_range, None);
        assert!(resolver.is_unsupported(&DeviceId::new("aa:bb"), Feature::ColorTemperature));
    }

    #[test]
    fn empty_command_list_assumes_support() {
        let resolver = CapabilityResolver::new();
        let caps = resolver.resolve(&api_device(&[], None));
        assert!(caps.features.is_empty());
        assert!(resolver.unsupported(&DeviceId::new("aa:bb")).is_empty());
    }

    #[test]
    fn unsupported_set_grows_monotonically() {
        let resolver = CapabilityResolver::new();
        let id = DeviceId::new("x");
        assert!(resolver.record_unsupported(&id, Feature::ColorTemperature));
        assert!(!resolver.record_unsupported(&id, Feature::ColorTemperature));
        assert!(resolver.record_unsupported(&id, Feature::Color));
        assert_eq!(resolver.unsupported(&id).len(), 2);
    }

    #[test]
    fn classifies_vendor_messages() {
        assert_eq!(
            CapabilityResolver::classify(&rejection("Unsupported Cmd: colorTem")),
            FailureKind::UnsupportedFeature
        );
        assert_eq!(
            CapabilityResolver::classify(&rejection("This device does not support colorTem")),
            FailureKind::UnsupportedFeature
        );
        assert_eq!(
            CapabilityResolver::classify(&rejection("colorTem value out of range")),
            FailureKind::InvalidRange
        );
        assert_eq!(
            CapabilityResolver::classify(&rejection("device offline")),
            FailureKind::Transport
        );
    }

    #[test]
    fn server_errors_and_rate_limits_are_transport() {
        let err = smarttouch_api::Error::Api {
            status: 502,
            code: None,
            message: "unsupported gateway".into(),
        };
        assert_eq!(CapabilityResolver::classify(&err), FailureKind::Transport);
        assert_eq!(
            CapabilityResolver::classify(&smarttouch_api::Error::RateLimited {
                retry_after_secs: 1
            }),
            FailureKind::Transport
        );
    }

    #[test]
    fn color_temperature_uses_fallback_range() {
        assert_eq!(
            CapabilityResolver::validate_color_temperature(9000, None).unwrap(),
            9000
        );
        let err = CapabilityResolver::validate_color_temperature(1999, None).unwrap_err();
        assert_eq!(
            err,
            CoreError::InvalidRange {
                field: "color temperature".into(),
                value: 1999,
                min: 2000,
                max: 9000,
            }
        );
    }

    #[test]
    fn color_temperature_uses_device_range() {
        let range = Some(ColorTempRange { min: 2700, max: 6500 });
        assert!(CapabilityResolver::validate_color_temperature(7000, range).is_err());
        assert!(CapabilityResolver::validate_color_temperature(-5, range).is_err());
        assert_eq!(
            CapabilityResolver::validate_color_temperature(2700, range).unwrap(),
            2700
        );
    }

    #[test]
    fn brightness_bounds() {
        assert_eq!(CapabilityResolver::validate_brightness(1).unwrap(), 1);
        assert_eq!(CapabilityResolver::validate_brightness(100).unwrap(), 100);
        assert!(CapabilityResolver::validate_brightness(0).is_err());
        assert!(CapabilityResolver::validate_brightness(101).is_err());
        assert!(CapabilityResolver::validate_brightness(-1).is_err());
    }
}
