use serde::{Deserialize, Serialize};
use strum::Display;

// ── Power ───────────────────────────────────────────────────────────

/// Last-known power state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PowerState {
    On,
    Off,
    #[default]
    Unknown,
}

impl PowerState {
    pub fn is_on(self) -> bool {
        self == Self::On
    }

    /// The action a power toggle sends from this state. Unknown toggles on.
    pub fn toggle_action(self) -> PowerAction {
        if self.is_on() {
            PowerAction::Off
        } else {
            PowerAction::On
        }
    }
}

/// A power command: what the user asked for, never `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PowerAction {
    On,
    Off,
}

impl PowerAction {
    /// The value sent with the vendor's `turn` command.
    pub fn as_vendor_value(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
        }
    }

    /// State a device is in after this action succeeds.
    pub fn resulting_state(self) -> PowerState {
        match self {
            Self::On => PowerState::On,
            Self::Off => PowerState::Off,
        }
    }
}

// ── Colour temperature range ────────────────────────────────────────

/// Inclusive Kelvin range a device accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColorTempRange {
    pub min: u32,
    pub max: u32,
}

impl ColorTempRange {
    /// Range assumed when discovery reported none.
    pub const FALLBACK: Self = Self {
        min: 2000,
        max: 9000,
    };

    pub fn contains(self, kelvin: u32) -> bool {
        (self.min..=self.max).contains(&kelvin)
    }

    /// Default slider position for a device with no reported value.
    pub fn midpoint(self) -> u32 {
        self.min + (self.max - self.min) / 2
    }

    /// Overlap of two ranges, `None` when disjoint.
    pub fn intersect(self, other: Self) -> Option<Self> {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);
        (min <= max).then_some(Self { min, max })
    }

    /// Most restrictive range shared by all `ranges`, starting from the
    /// fallback. `None` if they do not overlap.
    pub fn common(ranges: impl IntoIterator<Item = Self>) -> Option<Self> {
        ranges.into_iter().try_fold(Self::FALLBACK, Self::intersect)
    }
}

impl From<smarttouch_api::ColorTemRange> for ColorTempRange {
    fn from(r: smarttouch_api::ColorTemRange) -> Self {
        Self {
            min: r.min.min(r.max),
            max: r.max.max(r.min),
        }
    }
}

// ── Partial state ───────────────────────────────────────────────────

/// Merge-only update for a device's mutable fields.
///
/// Only `Some` fields are written; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_state: Option<PowerState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_temperature: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_temp_range: Option<ColorTempRange>,
}

impl StatePatch {
    pub fn power(state: PowerState) -> Self {
        Self {
            power_state: Some(state),
            ..Self::default()
        }
    }

    pub fn brightness(value: u8) -> Self {
        Self {
            brightness: Some(value),
            ..Self::default()
        }
    }

    pub fn color_temperature(kelvin: u32) -> Self {
        Self {
            color_temperature: Some(kelvin),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.power_state.is_none()
            && self.brightness.is_none()
            && self.color_temperature.is_none()
            && self.color_temp_range.is_none()
    }

    /// Whether this patch touches a slider-backed field.
    pub fn touches_sliders(&self) -> bool {
        self.brightness.is_some() || self.color_temperature.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_toggles_on() {
        assert_eq!(PowerState::Unknown.toggle_action(), PowerAction::On);
        assert_eq!(PowerState::Off.toggle_action(), PowerAction::On);
        assert_eq!(PowerState::On.toggle_action(), PowerAction::Off);
    }

    #[test]
    fn range_midpoint_rounds_down() {
        let r = ColorTempRange { min: 2700, max: 6500 };
        assert_eq!(r.midpoint(), 4600);
        assert_eq!(ColorTempRange { min: 2000, max: 2001 }.midpoint(), 2000);
    }

    #[test]
    fn range_intersection() {
        let a = ColorTempRange { min: 2000, max: 9000 };
        let b = ColorTempRange { min: 2700, max: 6500 };
        assert_eq!(a.intersect(b), Some(b));
        assert_eq!(
            b.intersect(ColorTempRange { min: 7000, max: 9000 }),
            None
        );
    }

    #[test]
    fn reversed_vendor_range_is_normalized() {
        let r = ColorTempRange::from(smarttouch_api::ColorTemRange { min: 6500, max: 2700 });
        assert_eq!(r, ColorTempRange { min: 2700, max: 6500 });
    }

    #[test]
    fn empty_patch() {
        assert!(StatePatch::default().is_empty());
        assert!(!StatePatch::brightness(4).is_empty());
        assert!(StatePatch::color_temperature(3000).touches_sliders());
        assert!(!StatePatch::power(PowerState::On).touches_sliders());
    }
}
