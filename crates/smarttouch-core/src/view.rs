// ── View synchronizer ──
//
// Headless model of the touch panel: the always-visible device list, the
// "all devices" button, and at most one open control surface (modal or
// inline-expanded row). Control-plane events are turned into minimal
// `ViewPatch`es; user gestures are turned into `UiRequest`s. A host
// renders the patches and sends the requests.

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use serde::Serialize;
use strum::Display;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::capability::CapabilityResolver;
use crate::config::{ControlConfig, PresentationMode, ToastDurations};
use crate::convert::FALLBACK_COLOR_TEMPERATURE;
use crate::error::{CoreError, FailureKind};
use crate::lock::InteractionLock;
use crate::message::{ControlEvent, SetAllReport, UiRequest};
use crate::model::{
    ColorTempRange, Device, DeviceId, Feature, PowerAction, PowerState, StatePatch,
};
use crate::store::Registry;

// ── View state ───────────────────────────────────────────────────────

/// A live slider on a control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Control {
    Brightness,
    ColorTemperature,
}

/// Colour-temperature slider: live, or greyed out for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ColorTempControl {
    Enabled { value: u32, range: ColorTempRange },
    Disabled,
}

/// What an open control surface currently displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceView {
    pub device: DeviceId,
    pub model: String,
    pub name: String,
    pub power: PowerState,
    pub brightness: u8,
    pub color_temperature: ColorTempControl,
    /// Slider updates were held back by the interaction lock.
    pub stale: bool,
}

impl SurfaceView {
    fn from_device(device: &Device, color_temp_supported: bool) -> Self {
        let color_temperature = if color_temp_supported {
            let range = device.effective_color_temp_range();
            let value = device
                .color_temperature
                .unwrap_or(FALLBACK_COLOR_TEMPERATURE)
                .clamp(range.min, range.max);
            ColorTempControl::Enabled { value, range }
        } else {
            ColorTempControl::Disabled
        };
        Self {
            device: device.id.clone(),
            model: device.model.clone(),
            name: device.name.clone(),
            power: device.power_state,
            brightness: device.brightness,
            color_temperature,
            stale: false,
        }
    }
}

/// Control-surface state machine: `Closed → Open(device) → Closed`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Surface {
    #[default]
    Closed,
    Open(SurfaceView),
}

impl Surface {
    /// Device shown, if open.
    pub fn device(&self) -> Option<&DeviceId> {
        match self {
            Self::Open(view) => Some(&view.device),
            Self::Closed => None,
        }
    }

    pub fn is_open_for(&self, id: &DeviceId) -> bool {
        self.device() == Some(id)
    }
}

/// One row of the device list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowView {
    pub id: DeviceId,
    pub name: String,
    pub power: PowerState,
}

impl From<&Device> for RowView {
    fn from(d: &Device) -> Self {
        Self {
            id: d.id.clone(),
            name: d.name.clone(),
            power: d.power_state,
        }
    }
}

/// The "all devices" button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateView {
    pub label: String,
    pub action: PowerAction,
    pub on_count: usize,
    pub total: usize,
}

impl Default for AggregateView {
    fn default() -> Self {
        Self {
            label: "Turn All On".into(),
            action: PowerAction::On,
            on_count: 0,
            total: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A timed toast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub level: NotificationLevel,
    pub duration_ms: u64,
}

/// A minimal update for the host to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "patch", rename_all_fields = "camelCase")]
pub enum ViewPatch {
    ListRebuilt { rows: Vec<RowView> },
    RowUpdated { row: RowView },
    AggregateUpdated { aggregate: AggregateView },
    SurfaceOpened { mode: PresentationMode, view: SurfaceView },
    SurfaceClosed { id: DeviceId },
    SurfacePower { id: DeviceId, power: PowerState },
    SurfaceBrightness { id: DeviceId, value: u8 },
    SurfaceColorTemperature { id: DeviceId, value: u32 },
    /// Numeric label under a slider while it is being dragged.
    LabelUpdated { id: DeviceId, control: Control, value: i64 },
    ControlDisabled { id: DeviceId, control: Control },
    Toast { notification: Notification },
}

/// Result of a user gesture: patches to render now, plus an optional
/// request for the control plane.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reaction {
    pub patches: Vec<ViewPatch>,
    pub request: Option<UiRequest>,
}

impl Reaction {
    fn patches(patches: Vec<ViewPatch>) -> Self {
        Self {
            patches,
            request: None,
        }
    }
}

// ── Synchronizer ─────────────────────────────────────────────────────

/// Turns control-plane events into view patches, gated by the
/// interaction lock.
///
/// Reads device state from the shared [`Registry`] only; it never writes
/// to it. Events are expected after the registry has been patched.
#[derive(Debug)]
pub struct ViewSynchronizer {
    registry: Arc<Registry>,
    capabilities: Arc<CapabilityResolver>,
    lock: InteractionLock,
    mode: PresentationMode,
    toasts: ToastDurations,
    surface: Surface,
    rows: IndexMap<DeviceId, RowView>,
    aggregate: AggregateView,
}

impl ViewSynchronizer {
    pub fn new(
        registry: Arc<Registry>,
        capabilities: Arc<CapabilityResolver>,
        config: &ControlConfig,
    ) -> Self {
        let mut sync = Self {
            registry,
            capabilities,
            lock: InteractionLock::new(config.quiet_window),
            mode: config.presentation,
            toasts: config.toasts,
            surface: Surface::Closed,
            rows: IndexMap::new(),
            aggregate: AggregateView::default(),
        };
        sync.rebuild_list();
        sync
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn rows(&self) -> impl Iterator<Item = &RowView> {
        self.rows.values()
    }

    pub fn aggregate(&self) -> &AggregateView {
        &self.aggregate
    }

    pub fn lock(&self) -> &InteractionLock {
        &self.lock
    }

    pub fn mode(&self) -> PresentationMode {
        self.mode
    }

    /// When the interaction lock will release itself, if held.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.lock.deadline()
    }

    // ── List ─────────────────────────────────────────────────────────

    /// Rebuild every row and the aggregate button from the registry.
    pub fn rebuild_list(&mut self) -> Vec<ViewPatch> {
        self.rows = self
            .registry
            .snapshot()
            .iter()
            .map(|d| (d.id.clone(), RowView::from(&**d)))
            .collect();
        self.refresh_aggregate();
        vec![
            ViewPatch::ListRebuilt {
                rows: self.rows.values().cloned().collect(),
            },
            ViewPatch::AggregateUpdated {
                aggregate: self.aggregate.clone(),
            },
        ]
    }

    fn refresh_aggregate(&mut self) -> bool {
        let summary = self.registry.summarize();
        let action = summary.bulk_action();
        let next = AggregateView {
            label: match action {
                PowerAction::Off => "Turn All Off".into(),
                PowerAction::On => "Turn All On".into(),
            },
            action,
            on_count: summary.on_count,
            total: summary.total,
        };
        let changed = next != self.aggregate;
        self.aggregate = next;
        changed
    }

    /// Targeted update of one row plus the aggregate button.
    fn update_row(&mut self, device: &Device, patches: &mut Vec<ViewPatch>) {
        let row = RowView::from(device);
        if self.rows.get(&device.id) != Some(&row) {
            self.rows.insert(device.id.clone(), row.clone());
            patches.push(ViewPatch::RowUpdated { row });
        }
        if self.refresh_aggregate() {
            patches.push(ViewPatch::AggregateUpdated {
                aggregate: self.aggregate.clone(),
            });
        }
    }

    // ── Surface lifecycle ────────────────────────────────────────────

    /// Open the control surface for `id`, closing any other one first.
    ///
    /// Shows the registry's state immediately and asks for fresh state.
    pub fn open(&mut self, id: &DeviceId) -> Result<Reaction, CoreError> {
        let device = self
            .registry
            .get(id)
            .ok_or_else(|| CoreError::not_found(id))?;

        let mut patches = self.close();
        let supported = self
            .capabilities
            .supports(&device, Feature::ColorTemperature);
        let view = SurfaceView::from_device(&device, supported);
        self.surface = Surface::Open(view.clone());
        patches.push(ViewPatch::SurfaceOpened {
            mode: self.mode,
            view,
        });
        debug!(device = %id, mode = %self.mode, "surface opened");

        Ok(Reaction {
            patches,
            request: Some(UiRequest::RequestFreshState {
                id: device.id.clone(),
                model: device.model.clone(),
            }),
        })
    }

    /// Close the open surface. Any held interaction ends with it.
    pub fn close(&mut self) -> Vec<ViewPatch> {
        match std::mem::take(&mut self.surface) {
            Surface::Open(view) => {
                self.lock.release();
                debug!(device = %view.device, "surface closed");
                vec![ViewPatch::SurfaceClosed { id: view.device }]
            }
            Surface::Closed => Vec::new(),
        }
    }

    // ── Gestures ─────────────────────────────────────────────────────

    /// Pointer-down on a slider of the open surface.
    pub fn begin_interaction(&mut self, control: Control) -> bool {
        let Surface::Open(view) = &self.surface else {
            return false;
        };
        if control == Control::ColorTemperature
            && view.color_temperature == ColorTempControl::Disabled
        {
            return false;
        }
        self.lock.begin_interaction(Some(view.device.clone()));
        trace!(device = %view.device, %control, "interaction started");
        true
    }

    /// Slider moved. Only the label follows; nothing is sent yet.
    pub fn input(&mut self, control: Control, value: i64) -> Vec<ViewPatch> {
        if !self.begin_interaction(control) {
            return Vec::new();
        }
        let Surface::Open(view) = &self.surface else {
            return Vec::new();
        };
        vec![ViewPatch::LabelUpdated {
            id: view.device.clone(),
            control,
            value,
        }]
    }

    /// Slider released: end the interaction and send the value.
    pub fn commit(&mut self, control: Control, value: i64) -> Reaction {
        let Surface::Open(view) = &self.surface else {
            return Reaction::default();
        };
        let (id, model) = (view.device.clone(), view.model.clone());

        let request = match (control, view.color_temperature) {
            (Control::ColorTemperature, ColorTempControl::Disabled) => {
                return Reaction::patches(vec![toast(
                    "Feature Not Available",
                    "Color temperature control is not supported by this device.",
                    NotificationLevel::Warning,
                    self.toasts.unavailable,
                )]);
            }
            (Control::ColorTemperature, ColorTempControl::Enabled { range, .. }) => {
                UiRequest::SetColorTemperature {
                    id,
                    model,
                    kelvin: value,
                    range: Some(range),
                }
            }
            (Control::Brightness, _) => UiRequest::SetBrightness { id, model, value },
        };

        self.lock.release();
        let patches = self.resync(Some(control));
        Reaction {
            patches,
            request: Some(request),
        }
    }

    /// Power button on the open surface.
    pub fn toggle_power(&self) -> Reaction {
        match self.surface.device().cloned() {
            Some(id) => self.toggle_device(&id).unwrap_or_else(|e| {
                debug!(device = %id, error = %e, "power toggle for unknown device ignored");
                Reaction::default()
            }),
            None => Reaction::default(),
        }
    }

    /// Power button on a list row.
    pub fn toggle_device(&self, id: &DeviceId) -> Result<Reaction, CoreError> {
        let device = self
            .registry
            .get(id)
            .ok_or_else(|| CoreError::not_found(id))?;
        Ok(Reaction {
            patches: Vec::new(),
            request: Some(UiRequest::SetPower {
                id: device.id.clone(),
                model: device.model.clone(),
                current_state: device.power_state,
            }),
        })
    }

    /// The "all devices" button, in its current majority-rule direction.
    pub fn toggle_all_request(&self) -> UiRequest {
        UiRequest::ToggleAll {
            action: self.registry.summarize().bulk_action(),
            devices: self.registry.targets(),
        }
    }

    // ── Events ───────────────────────────────────────────────────────

    /// Apply one control-plane event to the view.
    pub fn apply(&mut self, event: &ControlEvent) -> Vec<ViewPatch> {
        let mut patches = Vec::new();
        match event {
            ControlEvent::DevicesDiscovered { .. } | ControlEvent::AllToggled { .. } => {
                patches.extend(self.rebuild_list());
                self.refresh_surface(&mut patches);
            }
            ControlEvent::AllDevicesSet(report) => {
                patches.extend(self.rebuild_list());
                self.refresh_surface(&mut patches);
                patches.push(self.applied_toast(report));
            }
            ControlEvent::DeviceToggled { id, new_state } => {
                self.device_changed(id, &StatePatch::power(*new_state), &mut patches);
            }
            ControlEvent::DeviceStateUpdated { id, fields } => {
                self.device_changed(id, fields, &mut patches);
            }
            ControlEvent::DeviceFreshState { id, state } => {
                self.device_changed(id, state, &mut patches);
            }
            ControlEvent::DeviceError {
                id,
                kind,
                feature,
                message,
            } => self.device_error(id.as_ref(), *kind, *feature, message, &mut patches),
            ControlEvent::DiscoveryFailed { message } => {
                patches.push(toast(
                    "Device Error",
                    message,
                    NotificationLevel::Error,
                    self.toasts.error,
                ));
            }
        }
        patches
    }

    /// Release an expired interaction lock and catch the surface up.
    pub fn tick(&mut self) -> Vec<ViewPatch> {
        match self.lock.poll_expired() {
            Some(release) => {
                debug!(device = ?release.device, "interaction lock released");
                self.resync(None)
            }
            None => Vec::new(),
        }
    }

    /// `fields` names what changed; values are read from the registry.
    fn device_changed(&mut self, id: &DeviceId, fields: &StatePatch, patches: &mut Vec<ViewPatch>) {
        let Some(device) = self.registry.get(id) else {
            debug!(device = %id, "event for unknown device ignored");
            return;
        };
        self.update_row(&device, patches);

        if !self.surface.is_open_for(id) {
            return;
        }
        if fields.power_state.is_some() {
            self.patch_surface_power(&device, patches);
        }
        if fields.touches_sliders() || fields.color_temp_range.is_some() {
            self.patch_surface_sliders(&device, None, patches);
        }
    }

    /// Roster-level refresh of whatever surface is open.
    fn refresh_surface(&mut self, patches: &mut Vec<ViewPatch>) {
        let Some(id) = self.surface.device().cloned() else {
            return;
        };
        match self.registry.get(&id) {
            Some(device) => {
                self.patch_surface_power(&device, patches);
                self.patch_surface_sliders(&device, None, patches);
            }
            None => patches.extend(self.close()),
        }
    }

    fn patch_surface_power(&mut self, device: &Device, patches: &mut Vec<ViewPatch>) {
        let Surface::Open(view) = &mut self.surface else {
            return;
        };
        if view.power != device.power_state {
            view.power = device.power_state;
            patches.push(ViewPatch::SurfacePower {
                id: device.id.clone(),
                power: device.power_state,
            });
        }
    }

    /// Move sliders to the registry's values unless the user holds them.
    fn patch_surface_sliders(
        &mut self,
        device: &Device,
        skip: Option<Control>,
        patches: &mut Vec<ViewPatch>,
    ) {
        let locked = self.lock.is_active();
        let supported = self
            .capabilities
            .supports(device, Feature::ColorTemperature);
        let Surface::Open(view) = &mut self.surface else {
            return;
        };
        if locked {
            trace!(device = %device.id, "slider update held by interaction lock");
            view.stale = true;
            return;
        }

        let target = SurfaceView::from_device(device, supported);
        if skip != Some(Control::Brightness) && view.brightness != target.brightness {
            view.brightness = target.brightness;
            patches.push(ViewPatch::SurfaceBrightness {
                id: device.id.clone(),
                value: target.brightness,
            });
        }
        if skip != Some(Control::ColorTemperature) {
            match (view.color_temperature, target.color_temperature) {
                (_, ColorTempControl::Disabled) => {
                    if view.color_temperature != ColorTempControl::Disabled {
                        view.color_temperature = ColorTempControl::Disabled;
                        patches.push(ViewPatch::ControlDisabled {
                            id: device.id.clone(),
                            control: Control::ColorTemperature,
                        });
                    }
                }
                (ColorTempControl::Enabled { value: shown, .. }, next) => {
                    if let ColorTempControl::Enabled { value, .. } = next {
                        if shown != value {
                            patches.push(ViewPatch::SurfaceColorTemperature {
                                id: device.id.clone(),
                                value,
                            });
                        }
                    }
                    view.color_temperature = next;
                }
                // A disabled control stays disabled for the session.
                (ColorTempControl::Disabled, ColorTempControl::Enabled { .. }) => {}
            }
        }
        view.stale = false;
    }

    /// Catch a stale surface up with the registry.
    fn resync(&mut self, skip: Option<Control>) -> Vec<ViewPatch> {
        let mut patches = Vec::new();
        let stale_id = match &self.surface {
            Surface::Open(view) if view.stale => view.device.clone(),
            _ => return patches,
        };
        if let Some(device) = self.registry.get(&stale_id) {
            self.patch_surface_sliders(&device, skip, &mut patches);
        }
        patches
    }

    fn device_error(
        &mut self,
        id: Option<&DeviceId>,
        kind: FailureKind,
        feature: Option<Feature>,
        message: &str,
        patches: &mut Vec<ViewPatch>,
    ) {
        match kind {
            FailureKind::NotFound => {
                debug!(device = ?id, message, "not-found error has no view effect");
            }
            FailureKind::InvalidRange => patches.push(toast(
                "Invalid Range",
                message,
                NotificationLevel::Warning,
                self.toasts.invalid_range,
            )),
            FailureKind::Transport => patches.push(toast(
                "Device Error",
                message,
                NotificationLevel::Error,
                self.toasts.error,
            )),
            FailureKind::UnsupportedFeature => {
                patches.push(toast(
                    "Device Limitation",
                    message,
                    NotificationLevel::Warning,
                    self.toasts.limitation,
                ));
                let open_here = id.is_some_and(|id| self.surface.is_open_for(id));
                if open_here && feature == Some(Feature::ColorTemperature) {
                    if let Surface::Open(view) = &mut self.surface {
                        if view.color_temperature != ColorTempControl::Disabled {
                            view.color_temperature = ColorTempControl::Disabled;
                            patches.push(ViewPatch::ControlDisabled {
                                id: view.device.clone(),
                                control: Control::ColorTemperature,
                            });
                        }
                    }
                }
            }
        }
    }

    fn applied_toast(&self, report: &SetAllReport) -> ViewPatch {
        let message = format!(
            "Color temperature {}K on {}/{} devices, brightness {}% on {}/{} devices",
            report.color_temperature,
            report.color_temp_successes,
            report.total,
            report.brightness,
            report.brightness_successes,
            report.total,
        );
        let level = if report.brightness_successes == report.total {
            NotificationLevel::Success
        } else {
            NotificationLevel::Warning
        };
        toast("Settings Applied", &message, level, self.toasts.applied)
    }
}

fn toast(title: &str, message: &str, level: NotificationLevel, duration: Duration) -> ViewPatch {
    ViewPatch::Toast {
        notification: Notification {
            title: title.into(),
            message: message.into(),
            level,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        },
    }
}
