// Integration tests for the gateway and control plane against a mock
// vendor API.
#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use smarttouch_api::{GoveeClient, TransportConfig};
use smarttouch_core::{
    CapabilityResolver, ColorTempRange, ControlConfig, ControlEvent, ControlPlane, DeviceId,
    DeviceTarget, FailureKind, Feature, Gateway, PowerAction, PowerState, UiRequest,
};

// ── Helpers ─────────────────────────────────────────────────────────

const LAMP: &str = "AA:BB:CC:DD:EE:FF:00:01";
const BULB: &str = "AA:BB:CC:DD:EE:FF:00:02";
const STRIP: &str = "AA:BB:CC:DD:EE:FF:00:03";

fn config(server: &MockServer) -> ControlConfig {
    let mut cfg = ControlConfig::new(SecretString::from("test-key".to_owned()));
    cfg.base_url = Some(Url::parse(&format!("{}/v1/", server.uri())).unwrap());
    cfg.poll_interval = None;
    cfg
}

fn client(server: &MockServer) -> GoveeClient {
    let base = Url::parse(&format!("{}/v1/", server.uri())).unwrap();
    let key = SecretString::from("test-key".to_owned());
    GoveeClient::new(base, &key, &TransportConfig::default()).unwrap()
}

fn gateway(server: &MockServer) -> Gateway {
    Gateway::new(client(server), Arc::new(CapabilityResolver::new()))
}

fn ok(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "code": 200,
        "message": "Success",
        "data": data,
    }))
}

fn rejected(message: &str) -> ResponseTemplate {
    ResponseTemplate::new(400).set_body_json(json!({
        "code": 400,
        "message": message,
    }))
}

fn api_device(id: &str, model: &str, cmds: &[&str]) -> Value {
    json!({
        "device": id,
        "model": model,
        "deviceName": format!("Light {model}"),
        "controllable": true,
        "retrievable": true,
        "supportCmds": cmds,
        "properties": { "colorTem": { "range": { "min": 2000, "max": 9000 } } }
    })
}

fn state(id: &str, model: &str, power: &str, brightness: u8, kelvin: u32) -> Value {
    json!({
        "device": id,
        "model": model,
        "properties": [
            { "online": true },
            { "powerState": power },
            { "brightness": brightness },
            { "colorTem": kelvin }
        ]
    })
}

async fn mount_discovery(server: &MockServer) {
    let all = ["turn", "brightness", "color", "colorTem"];
    Mock::given(method("GET"))
        .and(path("/v1/devices"))
        .respond_with(ok(json!({
            "devices": [
                api_device(LAMP, "H6159", &all),
                api_device(BULB, "H6001", &all),
                api_device(STRIP, "H6163", &all),
            ]
        })))
        .mount(server)
        .await;
}

async fn mount_state(server: &MockServer, id: &str, model: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/v1/devices/state"))
        .and(query_param("device", id))
        .and(query_param("model", model))
        .respond_with(response)
        .mount(server)
        .await;
}

async fn mount_all_states(server: &MockServer) {
    mount_state(server, LAMP, "H6159", ok(state(LAMP, "H6159", "on", 80, 4000))).await;
    mount_state(server, BULB, "H6001", ok(state(BULB, "H6001", "on", 60, 3000))).await;
    mount_state(server, STRIP, "H6163", ok(state(STRIP, "H6163", "off", 30, 5000))).await;
}

fn id(s: &str) -> DeviceId {
    DeviceId::new(s)
}

// ── Gateway ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_devices_degrades_failed_state_reads() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    mount_state(&server, LAMP, "H6159", ok(state(LAMP, "H6159", "on", 80, 4000))).await;
    mount_state(&server, BULB, "H6001", ResponseTemplate::new(500)).await;
    mount_state(&server, STRIP, "H6163", ok(state(STRIP, "H6163", "on", 30, 5000))).await;

    let devices = gateway(&server).list_devices().await.unwrap();

    assert_eq!(devices.len(), 3);
    assert_eq!(devices[0].power_state, PowerState::On);
    assert_eq!(devices[0].brightness, 80);
    assert_eq!(devices[0].color_temperature, Some(4000));

    assert_eq!(devices[1].id, id(BULB));
    assert_eq!(devices[1].power_state, PowerState::Off);
    assert_eq!(devices[1].brightness, 50);
    assert_eq!(devices[1].color_temperature, Some(6500));

    assert_eq!(devices[2].brightness, 30);
}

#[tokio::test]
async fn test_discovery_failure_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/devices"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = gateway(&server).list_devices().await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Transport);
}

#[tokio::test]
async fn test_fresh_state_probes_nested_color_shape() {
    let server = MockServer::start().await;
    mount_state(
        &server,
        LAMP,
        "H6159",
        ok(json!({
            "device": LAMP,
            "model": "H6159",
            "properties": [
                { "powerState": "off" },
                { "brightness": 12 },
                { "color": { "colorTemInKelvin": 2700 } }
            ]
        })),
    )
    .await;

    let patch = gateway(&server)
        .fetch_fresh_state(&DeviceTarget::new(LAMP, "H6159"))
        .await
        .unwrap();
    assert_eq!(patch.power_state, Some(PowerState::Off));
    assert_eq!(patch.brightness, Some(12));
    assert_eq!(patch.color_temperature, Some(2700));
}

#[tokio::test]
async fn test_color_temperature_rejected_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/devices/control"))
        .respond_with(ok(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let gw = gateway(&server);
    let target = DeviceTarget::new(LAMP, "H6159");
    for kelvin in [1999, 9001, -5] {
        let err = gw
            .set_color_temperature(&target, kelvin, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidRange);
    }

    let narrow = ColorTempRange { min: 2700, max: 6500 };
    let err = gw
        .set_color_temperature(&target, 7000, Some(narrow))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::InvalidRange);

    let err = gw.set_brightness(&target, 0).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::InvalidRange);
}

#[tokio::test]
async fn test_color_temperature_falls_back_then_records_unsupported() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/devices/control"))
        .and(body_partial_json(json!({ "cmd": { "name": "colorTem" } })))
        .respond_with(rejected("Unsupported Cmd: colorTem"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/devices/control"))
        .and(body_partial_json(json!({ "cmd": { "name": "colorTemInKelvin" } })))
        .respond_with(rejected("device not support this cmd"))
        .expect(1)
        .mount(&server)
        .await;

    let gw = gateway(&server);
    let target = DeviceTarget::new(LAMP, "H6159");

    let err = gw
        .set_color_temperature(&target, 4000, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::UnsupportedFeature);
    assert!(
        gw.capabilities()
            .is_unsupported(&id(LAMP), Feature::ColorTemperature)
    );

    // Known unsupported: no further requests (the mocks expect one each).
    let err = gw
        .set_color_temperature(&target, 4000, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::UnsupportedFeature);
}

#[tokio::test]
async fn test_second_command_variant_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/devices/control"))
        .and(body_partial_json(json!({ "cmd": { "name": "colorTem" } })))
        .respond_with(rejected("Unsupported Cmd: colorTem"))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/devices/control"))
        .and(body_partial_json(json!({ "cmd": { "name": "colorTemInKelvin", "value": 3200 } })))
        .respond_with(ok(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let gw = gateway(&server);
    let kelvin = gw
        .set_color_temperature(&DeviceTarget::new(LAMP, "H6159"), 3200, None)
        .await
        .unwrap();
    assert_eq!(kelvin, 3200);
    assert!(
        !gw.capabilities()
            .is_unsupported(&id(LAMP), Feature::ColorTemperature)
    );
}

#[tokio::test]
async fn test_transport_failure_is_not_recorded_unsupported() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/devices/control"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let gw = gateway(&server);
    let err = gw
        .set_brightness(&DeviceTarget::new(LAMP, "H6159"), 40)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Transport);
    assert!(gw.capabilities().unsupported(&id(LAMP)).is_empty());
}

#[tokio::test]
async fn test_toggle_all_reports_partial_failure() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/devices/control"))
        .and(body_partial_json(json!({ "device": BULB })))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/devices/control"))
        .respond_with(ok(json!({})))
        .mount(&server)
        .await;

    let targets = vec![
        DeviceTarget::new(LAMP, "H6159"),
        DeviceTarget::new(BULB, "H6001"),
        DeviceTarget::new(STRIP, "H6163"),
    ];
    let outcomes = gateway(&server)
        .toggle_all(&targets, PowerAction::Off)
        .await;

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes.iter().filter(|o| !o.success).count(), 1);
    assert!(!outcomes[1].success);
    assert!(outcomes[1].new_state.is_none());
    assert_eq!(outcomes[0].new_state, Some(PowerState::Off));
}

// ── Control plane ───────────────────────────────────────────────────

#[tokio::test]
async fn test_discover_then_toggle_all_off() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    mount_all_states(&server).await;
    Mock::given(method("PUT"))
        .and(path("/v1/devices/control"))
        .and(body_partial_json(json!({ "device": BULB })))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/devices/control"))
        .and(body_partial_json(json!({ "cmd": { "name": "turn", "value": "off" } })))
        .respond_with(ok(json!({})))
        .mount(&server)
        .await;

    let plane = ControlPlane::with_client(config(&server), client(&server));
    plane.start().await.unwrap();
    let mut events = plane.events();

    let event = plane
        .execute(UiRequest::ToggleAll {
            action: PowerAction::Off,
            devices: Vec::new(),
        })
        .await
        .unwrap();

    let ControlEvent::AllToggled { action, results } = event else {
        panic!("unexpected event: {event:?}");
    };
    assert_eq!(action, PowerAction::Off);
    assert_eq!(results.iter().filter(|r| r.success).count(), 2);

    let registry = plane.registry();
    assert_eq!(registry.get(&id(LAMP)).unwrap().power_state, PowerState::Off);
    assert_eq!(registry.get(&id(STRIP)).unwrap().power_state, PowerState::Off);
    // Failed device keeps its prior state.
    assert_eq!(registry.get(&id(BULB)).unwrap().power_state, PowerState::On);

    let broadcast = events.recv().await.unwrap();
    assert!(matches!(broadcast, ControlEvent::AllToggled { .. }));

    plane.shutdown().await;
}

#[tokio::test]
async fn test_set_power_toggles_from_current_state() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    mount_all_states(&server).await;
    Mock::given(method("PUT"))
        .and(path("/v1/devices/control"))
        .and(body_partial_json(json!({
            "device": STRIP,
            "model": "H6163",
            "cmd": { "name": "turn", "value": "on" }
        })))
        .respond_with(ok(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let plane = ControlPlane::with_client(config(&server), client(&server));
    plane.start().await.unwrap();

    let event = plane
        .handle(UiRequest::SetPower {
            id: id(STRIP),
            model: "H6163".into(),
            current_state: PowerState::Off,
        })
        .await;
    assert_eq!(
        event,
        ControlEvent::DeviceToggled {
            id: id(STRIP),
            new_state: PowerState::On
        }
    );
    assert_eq!(
        plane.registry().get(&id(STRIP)).unwrap().power_state,
        PowerState::On
    );
    assert_eq!(plane.registry().summarize().on_count, 3);

    plane.shutdown().await;
}

#[tokio::test]
async fn test_unsupported_feature_event_carries_feature() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    mount_all_states(&server).await;
    Mock::given(method("PUT"))
        .and(path("/v1/devices/control"))
        .respond_with(rejected("Unsupported Cmd"))
        .mount(&server)
        .await;

    let plane = ControlPlane::with_client(config(&server), client(&server));
    plane.start().await.unwrap();

    let event = plane
        .handle(UiRequest::SetColorTemperature {
            id: id(LAMP),
            model: "H6159".into(),
            kelvin: 3000,
            range: None,
        })
        .await;
    let ControlEvent::DeviceError { kind, feature, .. } = event else {
        panic!("unexpected event: {event:?}");
    };
    assert_eq!(kind, FailureKind::UnsupportedFeature);
    assert_eq!(feature, Some(Feature::ColorTemperature));
    // Stored state untouched.
    assert_eq!(
        plane.registry().get(&id(LAMP)).unwrap().color_temperature,
        Some(4000)
    );

    plane.shutdown().await;
}

#[tokio::test]
async fn test_set_all_patches_only_successful_fields() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    mount_all_states(&server).await;
    Mock::given(method("PUT"))
        .and(path("/v1/devices/control"))
        .and(body_partial_json(json!({ "device": BULB, "cmd": { "name": "brightness" } })))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/devices/control"))
        .respond_with(ok(json!({})))
        .mount(&server)
        .await;

    let plane = ControlPlane::with_client(config(&server), client(&server));
    plane.start().await.unwrap();

    let event = plane
        .handle(UiRequest::SetAll {
            color_temperature: 3500,
            brightness: 70,
        })
        .await;
    let ControlEvent::AllDevicesSet(report) = event else {
        panic!("unexpected event: {event:?}");
    };
    assert_eq!(report.total, 3);
    assert_eq!(report.color_temp_successes, 3);
    assert_eq!(report.brightness_successes, 2);

    let bulb = plane.registry().get(&id(BULB)).unwrap();
    assert_eq!(bulb.color_temperature, Some(3500));
    assert_eq!(bulb.brightness, 60);
    assert_eq!(plane.registry().get(&id(LAMP)).unwrap().brightness, 70);

    plane.shutdown().await;
}

#[tokio::test]
async fn test_poll_emits_only_changed_fields() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    // Discovery reads: first response per device.
    mount_state(&server, LAMP, "H6159", ok(state(LAMP, "H6159", "on", 80, 4000)))
        .await;
    mount_state(&server, BULB, "H6001", ok(state(BULB, "H6001", "on", 60, 3000)))
        .await;
    mount_state(&server, STRIP, "H6163", ok(state(STRIP, "H6163", "off", 30, 5000)))
        .await;

    let plane = ControlPlane::with_client(config(&server), client(&server));
    plane.start().await.unwrap();

    // Out-of-band change on the lamp only.
    server.reset().await;
    mount_state(&server, LAMP, "H6159", ok(state(LAMP, "H6159", "on", 25, 4000))).await;
    mount_state(&server, BULB, "H6001", ok(state(BULB, "H6001", "on", 60, 3000))).await;
    mount_state(&server, STRIP, "H6163", ResponseTemplate::new(500)).await;

    let events = plane.poll_once().await;
    assert_eq!(events.len(), 1);
    let ControlEvent::DeviceStateUpdated { id: changed, fields } = &events[0] else {
        panic!("unexpected event: {:?}", events[0]);
    };
    assert_eq!(*changed, id(LAMP));
    assert_eq!(fields.brightness, Some(25));
    assert!(fields.power_state.is_none());
    assert!(fields.color_temperature.is_none());

    // Failed poll leaves stored state alone.
    assert_eq!(
        plane.registry().get(&id(STRIP)).unwrap().power_state,
        PowerState::Off
    );

    plane.shutdown().await;
}

#[tokio::test]
async fn test_requests_rejected_before_start() {
    let server = MockServer::start().await;
    let plane = ControlPlane::new(config(&server)).unwrap();
    let err = plane
        .submit(UiRequest::RequestDiscovery)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Control plane is not running");
}

#[tokio::test]
async fn test_control_plane_restarts_after_shutdown() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    mount_all_states(&server).await;

    let plane = ControlPlane::with_client(config(&server), client(&server));
    plane.start().await.unwrap();
    plane.shutdown().await;
    assert!(!plane.is_running());
    assert!(plane.submit(UiRequest::RequestDiscovery).await.is_err());

    plane.start().await.unwrap();
    assert!(plane.is_running());
    let event = plane.execute(UiRequest::RequestDiscovery).await.unwrap();
    let ControlEvent::DevicesDiscovered { devices } = event else {
        panic!("unexpected event: {event:?}");
    };
    assert_eq!(devices.len(), 3);

    plane.shutdown().await;
    let err = plane
        .execute(UiRequest::RequestDiscovery)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Control plane is not running");
}
