// ── Control plane ──
//
// One explicit owner of the registry, the capability resolver and the
// gateway. UI requests arrive over an mpsc channel; every result is
// applied to the registry first and then broadcast as a `ControlEvent`.
// Background tasks poll live state and re-run discovery.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use smarttouch_api::GoveeClient;

use crate::capability::CapabilityResolver;
use crate::config::ControlConfig;
use crate::error::CoreError;
use crate::gateway::Gateway;
use crate::message::{ControlEvent, SetAllReport, ToggleOutcome, UiRequest};
use crate::model::{Device, DeviceId, DeviceTarget, StatePatch};
use crate::store::{Registry, Ticket};
use crate::stream::{DeviceStream, Roster};

const REQUEST_CHANNEL_SIZE: usize = 64;
const EVENT_CHANNEL_SIZE: usize = 256;

/// A request plus an optional reply slot for callers that wait.
struct RequestEnvelope {
    request: UiRequest,
    response_tx: Option<oneshot::Sender<ControlEvent>>,
}

// ── ControlPlane ─────────────────────────────────────────────────────

/// The main entry point for hosts.
///
/// Cheaply cloneable via `Arc<Inner>`. Call [`start()`](Self::start) to
/// run the initial discovery and spawn the background tasks.
#[derive(Clone)]
pub struct ControlPlane {
    inner: Arc<Inner>,
}

struct Inner {
    config: ControlConfig,
    registry: Arc<Registry>,
    capabilities: Arc<CapabilityResolver>,
    gateway: Gateway,
    event_tx: broadcast::Sender<ControlEvent>,
    /// Present only while running; replaced on every start.
    request_tx: Mutex<Option<mpsc::Sender<RequestEnvelope>>>,
    running: AtomicBool,
    /// Cancels the tasks of the current run only.
    cancel: Mutex<Option<CancellationToken>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl ControlPlane {
    /// Build a control plane talking to the configured vendor endpoint.
    /// Does not touch the network.
    pub fn new(config: ControlConfig) -> Result<Self, CoreError> {
        let client = GoveeClient::new(config.base_url()?, &config.api_key, &config.transport())?;
        Ok(Self::with_client(config, client))
    }

    /// Build a control plane around an existing client.
    pub fn with_client(config: ControlConfig, client: GoveeClient) -> Self {
        let registry = Arc::new(Registry::new());
        let capabilities = Arc::new(CapabilityResolver::new());
        let gateway = Gateway::new(client, Arc::clone(&capabilities));
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);

        Self {
            inner: Arc::new(Inner {
                config,
                registry,
                capabilities,
                gateway,
                event_tx,
                request_tx: Mutex::new(None),
                running: AtomicBool::new(false),
                cancel: Mutex::new(None),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &ControlConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.registry
    }

    pub fn capabilities(&self) -> &Arc<CapabilityResolver> {
        &self.inner.capabilities
    }

    pub fn gateway(&self) -> &Gateway {
        &self.inner.gateway
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Discover devices, then spawn the request processor and the
    /// optional poll and re-discovery tasks.
    ///
    /// A stopped plane can be started again; starting a running plane
    /// does nothing.
    pub async fn start(&self) -> Result<(), CoreError> {
        if self.is_running() {
            debug!("control plane already running");
            return Ok(());
        }

        if let ControlEvent::DiscoveryFailed { message } =
            self.handle(UiRequest::RequestDiscovery).await
        {
            return Err(CoreError::Transport {
                message,
                status: None,
            });
        }

        let cancel = CancellationToken::new();
        let (request_tx, request_rx) = mpsc::channel(REQUEST_CHANNEL_SIZE);
        let mut handles = self.inner.task_handles.lock().await;

        handles.push(tokio::spawn(request_processor_task(
            self.clone(),
            request_rx,
            cancel.child_token(),
        )));

        if let Some(period) = self.inner.config.poll_interval {
            let cancel = cancel.child_token();
            handles.push(tokio::spawn(poll_task(self.clone(), period, cancel)));
        }

        if let Some(period) = self.inner.config.discovery_interval {
            let cancel = cancel.child_token();
            handles.push(tokio::spawn(discovery_task(self.clone(), period, cancel)));
        }

        *self.inner.request_tx.lock().await = Some(request_tx);
        *self.inner.cancel.lock().await = Some(cancel);
        self.inner.running.store(true, Ordering::SeqCst);
        info!(devices = self.inner.registry.len(), "control plane started");
        Ok(())
    }

    /// Cancel background tasks and wait for them to finish. In-flight
    /// vendor requests are not cancelled.
    pub async fn shutdown(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
        self.inner.request_tx.lock().await.take();
        if let Some(cancel) = self.inner.cancel.lock().await.take() {
            cancel.cancel();
        }

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("control plane stopped");
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    // ── Requests ─────────────────────────────────────────────────────

    /// Queue a request. Its result arrives on [`events()`](Self::events).
    pub async fn submit(&self, request: UiRequest) -> Result<(), CoreError> {
        self.send(request, None).await
    }

    /// Queue a request and wait for its result event.
    pub async fn execute(&self, request: UiRequest) -> Result<ControlEvent, CoreError> {
        let (tx, rx) = oneshot::channel();
        self.send(request, Some(tx)).await?;
        rx.await.map_err(|_| CoreError::ControlPlaneStopped)
    }

    async fn send(
        &self,
        request: UiRequest,
        response_tx: Option<oneshot::Sender<ControlEvent>>,
    ) -> Result<(), CoreError> {
        if !self.is_running() {
            return Err(CoreError::ControlPlaneStopped);
        }
        let request_tx = self
            .inner
            .request_tx
            .lock()
            .await
            .clone()
            .ok_or(CoreError::ControlPlaneStopped)?;
        request_tx
            .send(RequestEnvelope {
                request,
                response_tx,
            })
            .await
            .map_err(|_| CoreError::ControlPlaneStopped)
    }

    /// Run one request now, bypassing the queue. The registry is patched
    /// and the event broadcast before this returns.
    pub async fn handle(&self, request: UiRequest) -> ControlEvent {
        let ticket = self.inner.registry.ticket();
        self.handle_at(request, ticket).await
    }

    async fn handle_at(&self, request: UiRequest, ticket: Ticket) -> ControlEvent {
        debug!(request = request.name(), ?ticket, "handling request");
        let event = self.route(request, ticket).await;
        // No subscribers is fine.
        let _ = self.inner.event_tx.send(event.clone());
        event
    }

    async fn route(&self, request: UiRequest, ticket: Ticket) -> ControlEvent {
        let registry = &self.inner.registry;
        let gateway = &self.inner.gateway;

        match request {
            UiRequest::RequestDiscovery => match gateway.list_devices().await {
                Ok(devices) => {
                    let roster = registry.replace_all_versioned(devices, ticket);
                    ControlEvent::DevicesDiscovered {
                        devices: roster.iter().map(|d| (**d).clone()).collect(),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "discovery failed");
                    ControlEvent::DiscoveryFailed {
                        message: e.to_string(),
                    }
                }
            },

            UiRequest::RequestFreshState { id, model } => {
                let target = DeviceTarget::new(id.clone(), model);
                match gateway.fetch_fresh_state(&target).await {
                    Ok(state) => match registry.patch_versioned(&id, &state, ticket) {
                        Ok(applied) => ControlEvent::DeviceFreshState {
                            id,
                            state: applied.accepted,
                        },
                        Err(e) => not_found(id, &e),
                    },
                    Err(e) => ControlEvent::error(Some(id), &e),
                }
            }

            UiRequest::SetPower {
                id,
                model,
                current_state,
            } => {
                let target = DeviceTarget::new(id.clone(), model);
                match gateway
                    .set_power(&target, current_state.toggle_action())
                    .await
                {
                    Ok(new_state) => {
                        self.record(&id, &StatePatch::power(new_state), ticket);
                        ControlEvent::DeviceToggled { id, new_state }
                    }
                    Err(e) => ControlEvent::error(Some(id), &e),
                }
            }

            UiRequest::SetBrightness { id, model, value } => {
                let target = DeviceTarget::new(id.clone(), model);
                match gateway.set_brightness(&target, value).await {
                    Ok(b) => self.updated(id, StatePatch::brightness(b), ticket),
                    Err(e) => ControlEvent::error(Some(id), &e),
                }
            }

            UiRequest::SetColorTemperature {
                id,
                model,
                kelvin,
                range,
            } => {
                let range = range.or_else(|| registry.get(&id).and_then(|d| d.color_temp_range));
                let target = DeviceTarget::new(id.clone(), model);
                match gateway.set_color_temperature(&target, kelvin, range).await {
                    Ok(k) => self.updated(id, StatePatch::color_temperature(k), ticket),
                    Err(e) => ControlEvent::error(Some(id), &e),
                }
            }

            UiRequest::ToggleAll { action, devices } => {
                let targets = if devices.is_empty() {
                    registry.targets()
                } else {
                    devices
                };
                let results = gateway.toggle_all(&targets, action).await;
                self.record_toggles(&results, ticket);
                ControlEvent::AllToggled { action, results }
            }

            UiRequest::SetAll {
                color_temperature,
                brightness,
            } => {
                let devices = registry.snapshot();
                match gateway
                    .set_all(&devices, color_temperature, brightness)
                    .await
                {
                    Ok(report) => {
                        self.record_set_all(&report, ticket);
                        ControlEvent::AllDevicesSet(report)
                    }
                    Err(e) => ControlEvent::error(None, &e),
                }
            }
        }
    }

    // ── Registry writes ──────────────────────────────────────────────

    /// Apply an acknowledged write. A device that vanished in the
    /// meantime is logged and skipped.
    fn record(&self, id: &DeviceId, patch: &StatePatch, ticket: Ticket) -> Option<StatePatch> {
        match self.inner.registry.patch_versioned(id, patch, ticket) {
            Ok(applied) => Some(applied.accepted),
            Err(e) => {
                debug!(device = %id, error = %e, "acknowledged write for unknown device");
                None
            }
        }
    }

    fn updated(&self, id: DeviceId, patch: StatePatch, ticket: Ticket) -> ControlEvent {
        let fields = self.record(&id, &patch, ticket).unwrap_or(patch);
        ControlEvent::DeviceStateUpdated { id, fields }
    }

    fn record_toggles(&self, results: &[ToggleOutcome], ticket: Ticket) {
        for outcome in results {
            if let Some(state) = outcome.new_state {
                self.record(&outcome.device, &StatePatch::power(state), ticket);
            }
        }
    }

    fn record_set_all(&self, report: &SetAllReport, ticket: Ticket) {
        for outcome in &report.results {
            let patch = StatePatch {
                brightness: outcome.brightness_success.then_some(report.brightness),
                color_temperature: outcome
                    .color_temp_success
                    .then_some(report.color_temperature),
                ..StatePatch::default()
            };
            if !patch.is_empty() {
                self.record(&outcome.device, &patch, ticket);
            }
        }
    }

    // ── Polling ──────────────────────────────────────────────────────

    /// Read live state for every retrievable device in parallel and
    /// broadcast only the fields that changed.
    ///
    /// Failed reads are logged; the stored state is left as it was.
    pub async fn poll_once(&self) -> Vec<ControlEvent> {
        let ticket = self.inner.registry.ticket();
        let roster = self.inner.registry.snapshot();
        let devices: Vec<&Arc<Device>> = roster.iter().filter(|d| d.retrievable).collect();

        let gateway = &self.inner.gateway;
        let states = join_all(
            devices
                .iter()
                .map(|d| async move { gateway.fetch_fresh_state(&d.target()).await }),
        )
        .await;

        let mut events = Vec::new();
        for (device, state) in devices.iter().zip(states) {
            let state = match state {
                Ok(s) => s,
                Err(e) => {
                    warn!(device = %device.id, error = %e, "poll failed");
                    continue;
                }
            };
            let Ok(applied) = self
                .inner
                .registry
                .patch_versioned(&device.id, &state, ticket)
            else {
                continue;
            };
            if applied.changed.is_empty() {
                continue;
            }
            let event = ControlEvent::DeviceStateUpdated {
                id: device.id.clone(),
                fields: applied.changed,
            };
            let _ = self.inner.event_tx.send(event.clone());
            events.push(event);
        }

        debug!(
            polled = devices.len(),
            changed = events.len(),
            "poll complete"
        );
        events
    }

    // ── One-shot convenience ─────────────────────────────────────────

    /// One-shot: start, run closure, shut down.
    ///
    /// Polling and re-discovery are disabled since only one round trip
    /// is needed.
    pub async fn oneshot<F, Fut, T, E>(config: ControlConfig, f: F) -> Result<T, E>
    where
        F: FnOnce(ControlPlane) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CoreError>,
    {
        let mut cfg = config;
        cfg.poll_interval = None;
        cfg.discovery_interval = None;

        let plane = ControlPlane::new(cfg)?;
        plane.start().await?;
        let result = f(plane.clone()).await;
        plane.shutdown().await;
        result
    }

    // ── Observation ──────────────────────────────────────────────────

    /// Subscribe to the event broadcast.
    pub fn events(&self) -> broadcast::Receiver<ControlEvent> {
        self.inner.event_tx.subscribe()
    }

    pub fn devices(&self) -> DeviceStream {
        self.inner.registry.subscribe()
    }

    pub fn devices_snapshot(&self) -> Roster {
        self.inner.registry.snapshot()
    }

    /// Look up a device by id, or by case-insensitive name.
    pub fn find_device(&self, needle: &str) -> Result<Arc<Device>, CoreError> {
        let id = DeviceId::new(needle);
        if let Some(device) = self.inner.registry.get(&id) {
            return Ok(device);
        }
        self.devices_snapshot()
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(needle.trim()))
            .cloned()
            .ok_or_else(|| CoreError::not_found(&id))
    }
}

fn not_found(id: DeviceId, err: &CoreError) -> ControlEvent {
    debug!(device = %id, error = %err, "fresh state for unknown device");
    ControlEvent::error(Some(id), err)
}

// ── Background tasks ─────────────────────────────────────────────────

/// Take requests off the queue. Each is handled on its own task so slow
/// devices do not hold up others; the ticket is taken in arrival order.
async fn request_processor_task(
    plane: ControlPlane,
    mut rx: mpsc::Receiver<RequestEnvelope>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let ticket = plane.inner.registry.ticket();
                let plane = plane.clone();
                tokio::spawn(async move {
                    let event = plane.handle_at(envelope.request, ticket).await;
                    if let Some(tx) = envelope.response_tx {
                        let _ = tx.send(event);
                    }
                });
            }
        }
    }
}

/// Periodically poll live state.
async fn poll_task(plane: ControlPlane, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                plane.poll_once().await;
            }
        }
    }
}

/// Periodically re-run discovery.
async fn discovery_task(plane: ControlPlane, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                plane.handle(UiRequest::RequestDiscovery).await;
            }
        }
    }
}
