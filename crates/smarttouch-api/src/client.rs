// Govee developer API HTTP client
//
// Wraps `reqwest::Client` with the vendor's key header, URL construction and
// `{ code, message, data }` envelope unwrapping. The three endpoints the
// control plane needs live here as inherent methods.

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{
    ApiDevice, ControlCommand, ControlRequest, DeviceList, DeviceState, Envelope, ErrorBody,
};
use crate::transport::TransportConfig;

/// Production endpoint of the v1 developer API.
pub const DEFAULT_BASE_URL: &str = "https://developer-api.govee.com/v1/";

const API_KEY_HEADER: &str = "govee-api-key";
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Raw HTTP client for the Govee developer API.
///
/// All methods return the unwrapped `data` payload; a non-200 envelope
/// code is turned into [`Error::Api`] even when the HTTP status was 200.
#[derive(Debug, Clone)]
pub struct GoveeClient {
    http: reqwest::Client,
    base_url: Url,
}

impl GoveeClient {
    /// Create a client that authenticates every request with `api_key`.
    pub fn new(
        base_url: Url,
        api_key: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut value =
            HeaderValue::from_str(api_key.expose_secret()).map_err(|_| Error::InvalidApiKey)?;
        value.set_sensitive(true);
        headers.insert(API_KEY_HEADER, value);

        let http = transport.build_client_with_headers(headers)?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    ///
    /// The caller is responsible for the API key header. Used by tests
    /// against a mock server.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url: normalize_base(base_url),
        }
    }

    /// The API base URL (always ends in `/`).
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// `GET devices`: enumerate all devices on the account.
    pub async fn list_devices(&self) -> Result<Vec<ApiDevice>, Error> {
        let url = self.api_url("devices")?;
        let list: DeviceList = self.get(url).await?;
        Ok(list.devices)
    }

    /// `GET devices/state`: live state for one device.
    pub async fn device_state(&self, device: &str, model: &str) -> Result<DeviceState, Error> {
        let mut url = self.api_url("devices/state")?;
        url.query_pairs_mut()
            .append_pair("device", device)
            .append_pair("model", model);
        self.get(url).await
    }

    /// `PUT devices/control`: send one command.
    pub async fn control(
        &self,
        device: &str,
        model: &str,
        cmd: &ControlCommand,
    ) -> Result<(), Error> {
        let url = self.api_url("devices/control")?;
        let body = ControlRequest { device, model, cmd };
        let _: serde_json::Value = self.put(url, &body).await?;
        Ok(())
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn api_url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    async fn get<T: DeserializeOwned + Default>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        handle_response(resp).await
    }

    async fn put<T: DeserializeOwned + Default>(
        &self,
        url: Url,
        body: &impl Serialize,
    ) -> Result<T, Error> {
        debug!("PUT {}", url);

        let resp = self
            .http
            .put(url)
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;
        handle_response(resp).await
    }
}

/// Parse the `{ code, message, data }` envelope.
///
/// A missing `data` yields `T::default()`; control acks carry `data: {}` or
/// nothing at all.
async fn handle_response<T: DeserializeOwned + Default>(
    resp: reqwest::Response,
) -> Result<T, Error> {
    let status = resp.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        return Err(Error::RateLimited { retry_after_secs });
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(Error::InvalidApiKey);
    }

    let body = resp.text().await.map_err(Error::Transport)?;

    if !status.is_success() {
        let parsed: Option<ErrorBody> = serde_json::from_str(&body).ok();
        let (code, message) = match parsed {
            Some(ErrorBody { code, message }) => (code, message),
            None => (None, None),
        };
        return Err(Error::Api {
            status: status.as_u16(),
            code,
            message: message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| fallback_message(status, &body)),
        });
    }

    let envelope: Envelope<T> =
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: body.clone(),
        })?;

    match envelope.code {
        Some(200) | None => Ok(envelope.data.unwrap_or_default()),
        Some(code) => Err(Error::Api {
            status: status.as_u16(),
            code: Some(code),
            message: envelope
                .message
                .unwrap_or_else(|| format!("code={code}")),
        }),
    }
}

fn fallback_message(status: StatusCode, body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_owned()
    } else {
        trimmed.to_owned()
    }
}

fn normalize_base(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
