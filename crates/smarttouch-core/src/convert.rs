// ── Vendor response normalization ──
//
// Converts wire types into the canonical model. Live-state bodies have
// shipped in several shapes over the years, so colour temperature is read
// through an ordered table of extractors; new shapes are added as rows.

use serde_json::{Map, Value};

use smarttouch_api::ApiDevice;

use crate::capability::Capabilities;
use crate::model::{Device, DeviceId, PowerState, StatePatch};

/// Colour temperature assumed when no known field carries one.
pub const FALLBACK_COLOR_TEMPERATURE: u32 = 6500;

/// Brightness reported for a device whose state could not be read.
pub const DEGRADED_BRIGHTNESS: u8 = 50;

type Properties = Map<String, Value>;

/// One known location of the colour-temperature value.
struct ColorTempShape {
    name: &'static str,
    extract: fn(&Properties) -> Option<u32>,
}

/// Probed in order; first hit wins.
const COLOR_TEMP_SHAPES: &[ColorTempShape] = &[
    ColorTempShape {
        name: "colorTem",
        extract: |p| p.get("colorTem").and_then(kelvin),
    },
    ColorTempShape {
        name: "colorTemInKelvin",
        extract: |p| p.get("colorTemInKelvin").and_then(kelvin),
    },
    ColorTempShape {
        name: "colorTemperature",
        extract: |p| p.get("colorTemperature").and_then(kelvin),
    },
    ColorTempShape {
        name: "color.colorTem",
        extract: |p| nested(p, "color", "colorTem"),
    },
    ColorTempShape {
        name: "color.colorTemInKelvin",
        extract: |p| nested(p, "color", "colorTemInKelvin"),
    },
];

fn nested(p: &Properties, outer: &str, inner: &str) -> Option<u32> {
    p.get(outer)?.as_object()?.get(inner).and_then(kelvin)
}

/// Positive integer from a JSON number or numeric string. Zero means "unset".
fn kelvin(v: &Value) -> Option<u32> {
    let n = match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    u32::try_from(n).ok().filter(|k| *k > 0)
}

// ── Field extractors ─────────────────────────────────────────────────

/// First colour temperature found by the shape table, with the shape name.
pub fn probe_color_temperature(props: &Properties) -> Option<(u32, &'static str)> {
    COLOR_TEMP_SHAPES
        .iter()
        .find_map(|shape| (shape.extract)(props).map(|k| (k, shape.name)))
}

/// Colour temperature from any known shape, or the documented fallback.
pub fn color_temperature_or_default(props: &Properties) -> u32 {
    probe_color_temperature(props).map_or(FALLBACK_COLOR_TEMPERATURE, |(k, _)| k)
}

/// `powerState` as `"on"`/`"off"` or a boolean.
pub fn power_state(props: &Properties) -> PowerState {
    match props.get("powerState") {
        Some(Value::String(s)) if s.eq_ignore_ascii_case("on") => PowerState::On,
        Some(Value::String(s)) if s.eq_ignore_ascii_case("off") => PowerState::Off,
        Some(Value::Bool(true)) => PowerState::On,
        Some(Value::Bool(false)) => PowerState::Off,
        _ => PowerState::Unknown,
    }
}

/// Brightness clamped into 1..=100.
pub fn brightness(props: &Properties) -> Option<u8> {
    let raw = match props.get("brightness")? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
    let value = raw.round().clamp(1.0, 100.0) as u8;
    Some(value)
}

/// Full live state from a flattened `devices/state` body.
///
/// Colour temperature is only filled in for devices that may use it.
pub fn state_patch(props: &Properties, color_temperature_supported: bool) -> StatePatch {
    StatePatch {
        power_state: Some(power_state(props)),
        brightness: brightness(props),
        color_temperature: color_temperature_supported.then(|| color_temperature_or_default(props)),
        color_temp_range: None,
    }
}

/// State assigned when a per-device read fails: off, half brightness,
/// fallback colour temperature.
pub fn degraded_state(color_temperature_supported: bool) -> StatePatch {
    StatePatch {
        power_state: Some(PowerState::Off),
        brightness: Some(DEGRADED_BRIGHTNESS),
        color_temperature: color_temperature_supported.then_some(FALLBACK_COLOR_TEMPERATURE),
        color_temp_range: None,
    }
}

// ── Discovery ────────────────────────────────────────────────────────

/// Build a device from discovery data. State fields start unknown until a
/// state read (or the degraded default) is applied.
pub fn device_from_api(raw: &ApiDevice, caps: Capabilities) -> Device {
    let id = DeviceId::new(&raw.device);
    let name = raw
        .device_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| id.to_string());

    Device {
        id,
        model: raw.model.clone(),
        name,
        controllable: raw.controllable,
        retrievable: raw.retrievable,
        features: caps.features,
        power_state: PowerState::Unknown,
        brightness: 100,
        color_temperature: None,
        color_temp_range: caps.color_temp_range,
    }
}
