// ── Remote control gateway ──
//
// Issues vendor commands and state reads, converting every failure into a
// `CoreError` before it leaves this module. Bulk operations fan out in
// parallel and join on an all-complete barrier; nothing is retried.

use std::sync::Arc;

use futures_util::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};

use smarttouch_api::{ControlCommand, GoveeClient};

use crate::capability::CapabilityResolver;
use crate::convert;
use crate::error::{CoreError, FailureKind};
use crate::message::{SetAllOutcome, SetAllReport, ToggleOutcome};
use crate::model::{
    ColorTempRange, Device, DeviceTarget, Feature, PowerAction, PowerState, StatePatch,
};

// ── Command plans ────────────────────────────────────────────────────
//
// Vendor command names tried in order. The next name is only tried when
// the previous one was rejected as unsupported.

const POWER_PLAN: &[&str] = &["turn"];
const BRIGHTNESS_PLAN: &[&str] = &["brightness"];
const COLOR_TEMP_PLAN: &[&str] = &["colorTem", "colorTemInKelvin"];

/// Sends commands and reads state through the vendor API.
#[derive(Debug, Clone)]
pub struct Gateway {
    client: GoveeClient,
    capabilities: Arc<CapabilityResolver>,
}

impl Gateway {
    pub fn new(client: GoveeClient, capabilities: Arc<CapabilityResolver>) -> Self {
        Self {
            client,
            capabilities,
        }
    }

    pub fn client(&self) -> &GoveeClient {
        &self.client
    }

    pub fn capabilities(&self) -> &Arc<CapabilityResolver> {
        &self.capabilities
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Discover all devices, then read each one's live state in parallel.
    ///
    /// A failed state read degrades only that device (off, 50%, 6500K).
    /// Only the discovery call itself can fail the whole operation.
    pub async fn list_devices(&self) -> Result<Vec<Device>, CoreError> {
        let raw = self.client.list_devices().await?;
        let mut devices: Vec<Device> = raw
            .iter()
            .map(|r| convert::device_from_api(r, self.capabilities.resolve(r)))
            .collect();

        let states = join_all(devices.iter().map(|d| self.initial_state(d))).await;
        for (device, state) in devices.iter_mut().zip(&states) {
            device.apply(state);
        }

        info!(count = devices.len(), "discovered devices");
        Ok(devices)
    }

    /// On-demand live state for one device.
    pub async fn fetch_fresh_state(&self, target: &DeviceTarget) -> Result<StatePatch, CoreError> {
        let supported = !self
            .capabilities
            .is_unsupported(&target.id, Feature::ColorTemperature);
        let state = self
            .client
            .device_state(target.id.as_str(), &target.model)
            .await?;
        let props = state.flatten_properties();

        match convert::probe_color_temperature(&props) {
            Some((kelvin, shape)) => {
                debug!(device = %target.id, kelvin, shape, "colour temperature");
            }
            None => debug!(device = %target.id, "no colour temperature in state, using fallback"),
        }
        Ok(convert::state_patch(&props, supported))
    }

    async fn initial_state(&self, device: &Device) -> StatePatch {
        let supported = self.capabilities.supports(device, Feature::ColorTemperature);
        if !device.retrievable {
            debug!(device = %device.id, "state not retrievable, using defaults");
            return convert::degraded_state(supported);
        }
        match self.fetch_fresh_state(&device.target()).await {
            Ok(state) => state,
            Err(e) => {
                warn!(device = %device.id, error = %e, "state fetch failed, using defaults");
                convert::degraded_state(supported)
            }
        }
    }

    // ── Single-device commands ───────────────────────────────────────

    pub async fn set_power(
        &self,
        target: &DeviceTarget,
        action: PowerAction,
    ) -> Result<PowerState, CoreError> {
        self.execute(
            target,
            Feature::Power,
            POWER_PLAN,
            Value::from(action.as_vendor_value()),
            CoreError::from,
        )
        .await?;
        Ok(action.resulting_state())
    }

    pub async fn set_brightness(&self, target: &DeviceTarget, value: i64) -> Result<u8, CoreError> {
        let brightness = CapabilityResolver::validate_brightness(value)?;
        self.execute(
            target,
            Feature::Brightness,
            BRIGHTNESS_PLAN,
            Value::from(brightness),
            |_| CoreError::invalid_range("brightness", value, 1, 100),
        )
        .await?;
        Ok(brightness)
    }

    /// Validates against `range` (or the fallback range) before any request.
    pub async fn set_color_temperature(
        &self,
        target: &DeviceTarget,
        kelvin: i64,
        range: Option<ColorTempRange>,
    ) -> Result<u32, CoreError> {
        if self
            .capabilities
            .is_unsupported(&target.id, Feature::ColorTemperature)
        {
            return Err(CoreError::UnsupportedFeature {
                device: target.id.clone(),
                feature: Feature::ColorTemperature,
            });
        }

        let checked = CapabilityResolver::validate_color_temperature(kelvin, range)?;
        let bounds = range.unwrap_or(ColorTempRange::FALLBACK);
        self.execute(
            target,
            Feature::ColorTemperature,
            COLOR_TEMP_PLAN,
            Value::from(checked),
            |_| CoreError::invalid_range("color temperature", kelvin, bounds.min, bounds.max),
        )
        .await?;
        Ok(checked)
    }

    // ── Bulk commands ────────────────────────────────────────────────

    /// Power every target in parallel. Never aborts early: one outcome per
    /// target, in target order.
    pub async fn toggle_all(
        &self,
        targets: &[DeviceTarget],
        action: PowerAction,
    ) -> Vec<ToggleOutcome> {
        let outcomes = join_all(targets.iter().map(|t| async move {
            match self.set_power(t, action).await {
                Ok(state) => ToggleOutcome {
                    device: t.id.clone(),
                    success: true,
                    new_state: Some(state),
                    error: None,
                },
                Err(e) => ToggleOutcome {
                    device: t.id.clone(),
                    success: false,
                    new_state: None,
                    error: Some(e.to_string()),
                },
            }
        }))
        .await;

        let failed = outcomes.iter().filter(|o| !o.success).count();
        info!(%action, total = outcomes.len(), failed, "bulk power complete");
        outcomes
    }

    /// Apply one colour temperature and brightness to every device.
    ///
    /// The colour temperature must fit the range every device shares.
    /// Devices without colour-temperature support only get brightness.
    pub async fn set_all(
        &self,
        devices: &[Arc<Device>],
        kelvin: i64,
        brightness: i64,
    ) -> Result<SetAllReport, CoreError> {
        let brightness = CapabilityResolver::validate_brightness(brightness)?;
        let shared = ColorTempRange::common(devices.iter().filter_map(|d| d.color_temp_range))
            .ok_or_else(|| {
                CoreError::invalid_range(
                    "color temperature",
                    kelvin,
                    ColorTempRange::FALLBACK.min,
                    ColorTempRange::FALLBACK.max,
                )
            })?;
        let kelvin = CapabilityResolver::validate_color_temperature(kelvin, Some(shared))?;

        let results = join_all(devices.iter().map(|d| async move {
            let target = d.target();
            let color_temp_success =
                if self.capabilities.supports(d, Feature::ColorTemperature) {
                    self.set_color_temperature(&target, i64::from(kelvin), Some(shared))
                        .await
                        .inspect_err(|e| {
                            debug!(device = %d.id, error = %e, "set-all colour temperature failed");
                        })
                        .is_ok()
                } else {
                    false
                };
            let brightness_success = self
                .set_brightness(&target, i64::from(brightness))
                .await
                .inspect_err(|e| {
                    debug!(device = %d.id, error = %e, "set-all brightness failed");
                })
                .is_ok();
            SetAllOutcome {
                device: d.id.clone(),
                color_temp_success,
                brightness_success,
            }
        }))
        .await;

        Ok(SetAllReport::new(kelvin, brightness, results))
    }

    // ── Plan execution ───────────────────────────────────────────────

    /// Try each command name of `plan` until one is accepted.
    ///
    /// Moves to the next name only on an "unsupported" rejection. When the
    /// whole plan is rejected that way the feature is recorded unsupported.
    async fn execute(
        &self,
        target: &DeviceTarget,
        feature: Feature,
        plan: &[&'static str],
        value: Value,
        on_range: impl FnOnce(smarttouch_api::Error) -> CoreError,
    ) -> Result<(), CoreError> {
        let unsupported = || CoreError::UnsupportedFeature {
            device: target.id.clone(),
            feature,
        };
        if self.capabilities.is_unsupported(&target.id, feature) {
            return Err(unsupported());
        }

        for name in plan {
            let cmd = ControlCommand::new(*name, value.clone());
            let err = match self
                .client
                .control(target.id.as_str(), &target.model, &cmd)
                .await
            {
                Ok(()) => {
                    debug!(device = %target.id, command = *name, "command accepted");
                    return Ok(());
                }
                Err(e) => e,
            };

            match CapabilityResolver::classify(&err) {
                FailureKind::UnsupportedFeature => {
                    debug!(
                        device = %target.id,
                        command = *name,
                        error = %err,
                        "command variant unsupported"
                    );
                }
                FailureKind::InvalidRange => {
                    warn!(device = %target.id, command = *name, error = %err, "value rejected");
                    return Err(on_range(err));
                }
                FailureKind::Transport | FailureKind::NotFound => {
                    warn!(device = %target.id, command = *name, error = %err, "command failed");
                    return Err(err.into());
                }
            }
        }

        self.capabilities.record_unsupported(&target.id, feature);
        Err(unsupported())
    }
}
