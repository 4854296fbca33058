// Integration tests for `GoveeClient` using wiremock.
#![allow(clippy::unwrap_used)]

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use smarttouch_api::{ColorTemRange, ControlCommand, Error, GoveeClient, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, GoveeClient) {
    let server = MockServer::start().await;
    let base = Url::parse(&format!("{}/v1/", server.uri())).unwrap();
    let client = GoveeClient::with_client(reqwest::Client::new(), base);
    (server, client)
}

// ── Discovery ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_devices() {
    let (server, client) = setup().await;

    let body = json!({
        "code": 200,
        "message": "Success",
        "data": {
            "devices": [
                {
                    "device": "AA:BB:CC:DD:EE:FF:00:01",
                    "model": "H6159",
                    "deviceName": "Desk Lamp",
                    "controllable": true,
                    "retrievable": true,
                    "supportCmds": ["turn", "brightness", "color", "colorTem"],
                    "properties": { "colorTem": { "range": { "min": 2000, "max": 9000 } } }
                },
                {
                    "device": "AA:BB:CC:DD:EE:FF:00:02",
                    "model": "H6001",
                    "deviceName": "Hall Bulb",
                    "controllable": true,
                    "retrievable": true,
                    "supportCmds": ["turn", "brightness"]
                }
            ]
        }
    });

    Mock::given(method("GET"))
        .and(path("/v1/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let devices = client.list_devices().await.unwrap();

    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].device_name.as_deref(), Some("Desk Lamp"));
    assert_eq!(
        devices[0].color_tem_range(),
        Some(ColorTemRange { min: 2000, max: 9000 })
    );
    assert_eq!(devices[1].model, "H6001");
    assert!(devices[1].color_tem_range().is_none());
}

#[tokio::test]
async fn test_api_key_header_is_sent() {
    let server = MockServer::start().await;
    let base = Url::parse(&format!("{}/v1/", server.uri())).unwrap();
    let key = SecretString::from("test-key-123".to_owned());
    let client = GoveeClient::new(base, &key, &TransportConfig::default()).unwrap();

    Mock::given(method("GET"))
        .and(path("/v1/devices"))
        .and(header("Govee-API-Key", "test-key-123"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({
                "code": 200,
                "message": "Success",
                "data": { "devices": [] },
            })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let devices = client.list_devices().await.unwrap();
    assert!(devices.is_empty());
}

// ── Live state ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_device_state_query_and_flatten() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1/devices/state"))
        .and(query_param("device", "AA:BB"))
        .and(query_param("model", "H6159"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "message": "Success",
            "data": {
                "device": "AA:BB",
                "model": "H6159",
                "properties": [
                    { "online": true },
                    { "powerState": "on" },
                    { "brightness": 82 },
                    { "colorTem": 4200 }
                ]
            }
        })))
        .mount(&server)
        .await;

    let state = client.device_state("AA:BB", "H6159").await.unwrap();
    let props = state.flatten_properties();

    assert_eq!(state.model, "H6159");
    assert_eq!(props["powerState"], json!("on"));
    assert_eq!(props["brightness"], json!(82));
    assert_eq!(props["colorTem"], json!(4200));
}

// ── Control ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_control_sends_command_body() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/v1/devices/control"))
        .and(body_json(json!({
            "device": "AA:BB",
            "model": "H6159",
            "cmd": { "name": "turn", "value": "off" }
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "code": 200, "message": "Success", "data": {} })),
        )
        .expect(1)
        .mount(&server)
        .await;

    client
        .control("AA:BB", "H6159", &ControlCommand::new("turn", "off"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_control_envelope_rejection() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/v1/devices/control"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "code": 400, "message": "Unsupported Cmd: colorTem" })),
        )
        .mount(&server)
        .await;

    let err = client
        .control("AA:BB", "H6001", &ControlCommand::new("colorTem", 3000))
        .await
        .unwrap_err();

    match err {
        Error::Api {
            status,
            code,
            message,
        } => {
            assert_eq!(status, 200);
            assert_eq!(code, Some(400));
            assert_eq!(message, "Unsupported Cmd: colorTem");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

// ── Error paths ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_http_400_carries_vendor_message() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/v1/devices/control"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({ "code": 400, "message": "Invalid value for colorTem" })),
        )
        .mount(&server)
        .await;

    let err = client
        .control("AA:BB", "H6159", &ControlCommand::new("colorTem", 12000))
        .await
        .unwrap_err();

    assert_eq!(err.api_message(), Some("Invalid value for colorTem"));
    assert_eq!(err.status(), Some(400));
}

#[tokio::test]
async fn test_rate_limited() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1/devices"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "17"))
        .mount(&server)
        .await;

    let err = client.list_devices().await.unwrap_err();
    assert!(matches!(err, Error::RateLimited { retry_after_secs: 17 }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_unauthorized_maps_to_invalid_key() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1/devices"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client.list_devices().await.unwrap_err();
    assert!(matches!(err, Error::InvalidApiKey));
}

#[tokio::test]
async fn test_malformed_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client.list_devices().await.unwrap_err();
    match err {
        Error::Deserialization { body, .. } => assert!(body.contains("oops")),
        other => panic!("expected Deserialization, got {other:?}"),
    }
}
