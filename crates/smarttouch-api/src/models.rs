// Wire types for the Govee developer API (v1).
//
// Field names follow the vendor's camelCase JSON. These are deliberately
// loose: live-state properties stay as raw JSON so the core can probe the
// several shapes the cloud has returned over time.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Standard `{ code, message, data }` response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
}

/// Envelope body of an error response (no `data`).
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DeviceList {
    #[serde(default)]
    pub devices: Vec<ApiDevice>,
}

// ── Discovery ───────────────────────────────────────────────────────

/// One entry from `GET devices`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDevice {
    /// MAC-like vendor identifier, e.g. `AB:CD:EF:01:23:45:67:89`.
    pub device: String,
    pub model: String,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub controllable: bool,
    #[serde(default)]
    pub retrievable: bool,
    /// Command names the device accepts (`turn`, `brightness`, `color`, `colorTem`).
    #[serde(default)]
    pub support_cmds: Vec<String>,
    #[serde(default)]
    pub properties: Option<ApiDeviceProperties>,
}

impl ApiDevice {
    /// Discovered colour-temperature range, when the vendor reports one.
    pub fn color_tem_range(&self) -> Option<ColorTemRange> {
        self.properties
            .as_ref()
            .and_then(|p| p.color_tem.as_ref())
            .map(|c| c.range)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDeviceProperties {
    #[serde(default)]
    pub color_tem: Option<ApiColorTem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiColorTem {
    pub range: ColorTemRange,
}

/// Inclusive Kelvin range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorTemRange {
    pub min: u32,
    pub max: u32,
}

// ── Live state ──────────────────────────────────────────────────────

/// Payload of `GET devices/state`.
///
/// `properties` is usually an array of single-key objects
/// (`[{"online": true}, {"powerState": "on"}, ...]`) but older firmware
/// answered with one flat object. Both are accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceState {
    #[serde(default)]
    pub device: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub properties: Value,
}

impl DeviceState {
    /// Merge every property object into one map. Later keys win.
    pub fn flatten_properties(&self) -> Map<String, Value> {
        let mut out = Map::new();
        match &self.properties {
            Value::Array(items) => {
                for item in items {
                    if let Value::Object(obj) = item {
                        for (k, v) in obj {
                            out.insert(k.clone(), v.clone());
                        }
                    }
                }
            }
            Value::Object(obj) => out.clone_from(obj),
            _ => {}
        }
        out
    }
}

// ── Control ─────────────────────────────────────────────────────────

/// A `{name, value}` command for `PUT devices/control`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlCommand {
    pub name: String,
    pub value: Value,
}

impl ControlCommand {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ControlRequest<'a> {
    pub device: &'a str,
    pub model: &'a str,
    pub cmd: &'a ControlCommand,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn discovery_entry_with_range() {
        let dev: ApiDevice = serde_json::from_value(json!({
            "device": "AA:BB:CC:DD:EE:FF:00:11",
            "model": "H6159",
            "deviceName": "Desk",
            "controllable": true,
            "retrievable": true,
            "supportCmds": ["turn", "brightness", "color", "colorTem"],
            "properties": { "colorTem": { "range": { "min": 2000, "max": 9000 } } }
        }))
        .unwrap();

        assert_eq!(dev.device_name.as_deref(), Some("Desk"));
        assert_eq!(dev.color_tem_range(), Some(ColorTemRange { min: 2000, max: 9000 }));
        assert_eq!(dev.support_cmds.len(), 4);
    }

    #[test]
    fn discovery_entry_without_properties() {
        let dev: ApiDevice =
            serde_json::from_value(json!({ "device": "X", "model": "H6001" })).unwrap();
        assert!(dev.color_tem_range().is_none());
        assert!(!dev.controllable);
    }

    #[test]
    fn flattens_array_properties() {
        let state: DeviceState = serde_json::from_value(json!({
            "device": "X",
            "model": "H6159",
            "properties": [
                { "online": true },
                { "powerState": "on" },
                { "brightness": 40 },
                { "colorTem": 3500 }
            ]
        }))
        .unwrap();

        let props = state.flatten_properties();
        assert_eq!(props.get("powerState"), Some(&json!("on")));
        assert_eq!(props.get("colorTem"), Some(&json!(3500)));
        assert_eq!(props.len(), 4);
    }

    #[test]
    fn flattens_object_properties() {
        let state: DeviceState = serde_json::from_value(json!({
            "properties": { "powerState": "off", "brightness": 10 }
        }))
        .unwrap();
        assert_eq!(state.flatten_properties().get("brightness"), Some(&json!(10)));
    }

    #[test]
    fn control_request_shape() {
        let cmd = ControlCommand::new("brightness", 55);
        let body = ControlRequest {
            device: "X",
            model: "H6159",
            cmd: &cmd,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({ "device": "X", "model": "H6159", "cmd": { "name": "brightness", "value": 55 } })
        );
    }
}
