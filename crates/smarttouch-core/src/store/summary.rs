use serde::Serialize;

use crate::model::{Device, PowerAction, PowerState};

/// Aggregate power counts for the "all devices" control.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub on_count: usize,
    pub off_count: usize,
    pub unknown_count: usize,
    pub total: usize,
    pub all_on: bool,
    pub all_off: bool,
    /// Strict majority on. A tie is not mostly on.
    pub mostly_on: bool,
}

impl Summary {
    pub fn from_devices<'a>(devices: impl IntoIterator<Item = &'a Device>) -> Self {
        let mut s = Self::default();
        for d in devices {
            s.total += 1;
            match d.power_state {
                PowerState::On => s.on_count += 1,
                PowerState::Off => s.off_count += 1,
                PowerState::Unknown => s.unknown_count += 1,
            }
        }
        s.all_on = s.total > 0 && s.on_count == s.total;
        s.all_off = s.on_count == 0;
        s.mostly_on = s.on_count * 2 > s.total;
        s
    }

    /// Direction of the next bulk toggle (majority rule).
    pub fn bulk_action(&self) -> PowerAction {
        if self.mostly_on {
            PowerAction::Off
        } else {
            PowerAction::On
        }
    }
}

/// Mean settings across the roster, used to seed the set-all controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AverageSettings {
    pub brightness: u8,
    pub color_temperature: u32,
}

impl Default for AverageSettings {
    fn default() -> Self {
        Self {
            brightness: 75,
            color_temperature: 4000,
        }
    }
}

impl AverageSettings {
    /// Rounded means over devices that report a colour temperature.
    pub fn from_devices<'a>(devices: impl IntoIterator<Item = &'a Device>) -> Self {
        let (mut n, mut brightness, mut kelvin) = (0u64, 0u64, 0u64);
        for d in devices {
            if let Some(k) = d.color_temperature {
                n += 1;
                brightness += u64::from(d.brightness);
                kelvin += u64::from(k);
            }
        }
        if n == 0 {
            return Self::default();
        }
        let round = |sum: u64| (sum + n / 2) / n;
        Self {
            brightness: u8::try_from(round(brightness)).unwrap_or(100),
            color_temperature: u32::try_from(round(kelvin)).unwrap_or(u32::MAX),
        }
    }
}
