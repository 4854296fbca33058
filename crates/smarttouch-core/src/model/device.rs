use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{ColorTempRange, Feature, PowerState, StatePatch};

// ── DeviceId ────────────────────────────────────────────────────────

/// Vendor MAC-like device identifier, e.g. `AB:CD:EF:01:23:45:67:89`.
///
/// Normalized to uppercase so lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}

// ── DeviceTarget ────────────────────────────────────────────────────

/// Identity pair every vendor command needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceTarget {
    pub id: DeviceId,
    pub model: String,
}

impl DeviceTarget {
    pub fn new(id: impl Into<DeviceId>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
        }
    }
}

// ── Device ──────────────────────────────────────────────────────────

/// One lighting endpoint and its last-known state.
///
/// `id` and `model` are fixed at discovery. The four state fields change
/// only through [`Registry`](crate::Registry) patches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: DeviceId,
    pub model: String,
    pub name: String,
    pub controllable: bool,
    pub retrievable: bool,
    /// Commands advertised at discovery. Empty means "not reported".
    pub features: BTreeSet<Feature>,

    pub power_state: PowerState,
    pub brightness: u8,
    pub color_temperature: Option<u32>,
    pub color_temp_range: Option<ColorTempRange>,
}

impl Device {
    pub fn target(&self) -> DeviceTarget {
        DeviceTarget {
            id: self.id.clone(),
            model: self.model.clone(),
        }
    }

    /// Whether discovery advertised `feature`. Devices that reported no
    /// command list at all are assumed to support everything.
    pub fn advertises(&self, feature: Feature) -> bool {
        self.features.is_empty() || self.features.contains(&feature)
    }

    /// Range used for validation: discovered, or the fallback.
    pub fn effective_color_temp_range(&self) -> ColorTempRange {
        self.color_temp_range.unwrap_or(ColorTempRange::FALLBACK)
    }

    /// Merge `patch` into this device, returning the fields whose value
    /// actually changed.
    pub fn apply(&mut self, patch: &StatePatch) -> StatePatch {
        let mut changed = StatePatch::default();
        if let Some(p) = patch.power_state {
            if self.power_state != p {
                self.power_state = p;
                changed.power_state = Some(p);
            }
        }
        if let Some(b) = patch.brightness {
            if self.brightness != b {
                self.brightness = b;
                changed.brightness = Some(b);
            }
        }
        if let Some(k) = patch.color_temperature {
            if self.color_temperature != Some(k) {
                self.color_temperature = Some(k);
                changed.color_temperature = Some(k);
            }
        }
        if let Some(r) = patch.color_temp_range {
            if self.color_temp_range != Some(r) {
                self.color_temp_range = Some(r);
                changed.color_temp_range = Some(r);
            }
        }
        changed
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A discovered device in a known state, for tests.
    pub(crate) fn device(id: &str, power: PowerState) -> Device {
        Device {
            id: DeviceId::new(id),
            model: "H6159".into(),
            name: format!("Lamp {id}"),
            controllable: true,
            retrievable: true,
            features: [
                Feature::Power,
                Feature::Brightness,
                Feature::ColorTemperature,
            ]
            .into_iter()
            .collect(),
            power_state: power,
            brightness: 80,
            color_temperature: Some(4000),
            color_temp_range: Some(ColorTempRange { min: 2000, max: 9000 }),
        }
    }
}
