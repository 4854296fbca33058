// ── Ordered device registry ──
//
// Insertion-ordered map behind a mutex, with a `watch` snapshot that is
// republished after every mutation while the lock is still held, so the
// snapshot order always matches the mutation order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::{AverageSettings, Summary};
use crate::error::CoreError;
use crate::model::{ColorTempRange, Device, DeviceId, DeviceTarget, StatePatch};
use crate::stream::{DeviceStream, Roster};

/// Monotonic write ticket.
///
/// Take one when a request is issued and apply the response with it. A
/// field only accepts writes whose ticket is at least as new as the one
/// that last wrote it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Ticket(u64);

/// Result of a versioned patch.
#[derive(Debug, Clone)]
pub struct Applied {
    /// The entry after the patch.
    pub device: Arc<Device>,
    /// Fields that were new enough to be written.
    pub accepted: StatePatch,
    /// Accepted fields whose value actually changed.
    pub changed: StatePatch,
}

#[derive(Debug, Clone, Copy, Default)]
struct FieldVersions {
    power_state: Ticket,
    brightness: Ticket,
    color_temperature: Ticket,
    color_temp_range: Ticket,
}

impl FieldVersions {
    fn at(ticket: Ticket) -> Self {
        Self {
            power_state: ticket,
            brightness: ticket,
            color_temperature: ticket,
            color_temp_range: ticket,
        }
    }

    /// Drop the fields of `patch` that a newer write already owns and
    /// stamp the rest with `ticket`.
    fn accept(&mut self, patch: &StatePatch, ticket: Ticket) -> StatePatch {
        fn gate<T: Copy>(value: Option<T>, version: &mut Ticket, ticket: Ticket) -> Option<T> {
            let v = value?;
            if ticket < *version {
                return None;
            }
            *version = ticket;
            Some(v)
        }

        StatePatch {
            power_state: gate(patch.power_state, &mut self.power_state, ticket),
            brightness: gate(patch.brightness, &mut self.brightness, ticket),
            color_temperature: gate(patch.color_temperature, &mut self.color_temperature, ticket),
            color_temp_range: gate(patch.color_temp_range, &mut self.color_temp_range, ticket),
        }
    }
}

struct Entry {
    device: Arc<Device>,
    versions: FieldVersions,
}

#[derive(Default)]
struct Inner {
    entries: IndexMap<DeviceId, Entry>,
    last_discovery: Option<DateTime<Utc>>,
}

/// In-memory roster of devices, unique by id, in discovery order.
///
/// The only place device state is written. UI layers hold `Arc<Device>`
/// snapshots for rendering and route every change back through here.
pub struct Registry {
    inner: Mutex<Inner>,
    clock: AtomicU64,
    snapshot: watch::Sender<Roster>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("devices", &self.len())
            .field("clock", &self.clock.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            inner: Mutex::new(Inner::default()),
            clock: AtomicU64::new(0),
            snapshot,
        }
    }

    /// Issue the next write ticket.
    pub fn ticket(&self) -> Ticket {
        Ticket(self.clock.fetch_add(1, Ordering::SeqCst) + 1)
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Swap the whole roster for a fresh discovery result.
    pub fn replace_all(&self, devices: Vec<Device>) -> Roster {
        let ticket = self.ticket();
        self.replace_all_versioned(devices, ticket)
    }

    /// Swap the whole roster using a ticket taken when discovery was issued.
    ///
    /// Devices absent from `devices` are dropped. For devices already
    /// present, any field written by a newer ticket keeps its value.
    pub fn replace_all_versioned(&self, devices: Vec<Device>, ticket: Ticket) -> Roster {
        let mut inner = self.lock();
        let mut next = IndexMap::with_capacity(devices.len());

        for mut device in devices {
            if next.contains_key(&device.id) {
                warn!(device = %device.id, "duplicate device in discovery, keeping first");
                continue;
            }

            let versions = match inner.entries.get(&device.id) {
                Some(existing) => {
                    let mut v = existing.versions;
                    let current = &existing.device;
                    if ticket < v.power_state {
                        device.power_state = current.power_state;
                    } else {
                        v.power_state = ticket;
                    }
                    if ticket < v.brightness {
                        device.brightness = current.brightness;
                    } else {
                        v.brightness = ticket;
                    }
                    if ticket < v.color_temperature {
                        device.color_temperature = current.color_temperature;
                    } else {
                        v.color_temperature = ticket;
                    }
                    if ticket < v.color_temp_range {
                        device.color_temp_range = current.color_temp_range;
                    } else {
                        v.color_temp_range = ticket;
                    }
                    v
                }
                None => FieldVersions::at(ticket),
            };

            next.insert(
                device.id.clone(),
                Entry {
                    device: Arc::new(device),
                    versions,
                },
            );
        }

        inner.entries = next;
        inner.last_discovery = Some(Utc::now());
        debug!(devices = inner.entries.len(), "roster replaced");
        self.publish(&inner)
    }

    /// Merge `patch` into one device (last write wins).
    pub fn patch(&self, id: &DeviceId, patch: &StatePatch) -> Result<Arc<Device>, CoreError> {
        let ticket = self.ticket();
        self.patch_versioned(id, patch, ticket).map(|a| a.device)
    }

    /// Merge the fields of `patch` that are not older than their last write.
    pub fn patch_versioned(
        &self,
        id: &DeviceId,
        patch: &StatePatch,
        ticket: Ticket,
    ) -> Result<Applied, CoreError> {
        let mut inner = self.lock();
        let entry = inner
            .entries
            .get_mut(id)
            .ok_or_else(|| CoreError::not_found(id))?;

        let accepted = entry.versions.accept(patch, ticket);
        if accepted != *patch {
            debug!(device = %id, ?ticket, "dropped stale fields from patch");
        }

        let mut device = (*entry.device).clone();
        let changed = device.apply(&accepted);
        if changed.is_empty() {
            return Ok(Applied {
                device: Arc::clone(&entry.device),
                accepted,
                changed,
            });
        }

        let device = Arc::new(device);
        entry.device = Arc::clone(&device);
        self.publish(&inner);

        Ok(Applied {
            device,
            accepted,
            changed,
        })
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn get(&self, id: &DeviceId) -> Option<Arc<Device>> {
        self.lock().entries.get(id).map(|e| Arc::clone(&e.device))
    }

    /// Current ordered roster (cheap `Arc` clone).
    pub fn snapshot(&self) -> Roster {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> DeviceStream {
        DeviceStream::new(self.snapshot.subscribe())
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(id, model)` of every device, in roster order.
    pub fn targets(&self) -> Vec<DeviceTarget> {
        self.snapshot().iter().map(|d| d.target()).collect()
    }

    pub fn last_discovery(&self) -> Option<DateTime<Utc>> {
        self.lock().last_discovery
    }

    /// Aggregate power counts for bulk-toggle direction.
    pub fn summarize(&self) -> Summary {
        Summary::from_devices(self.snapshot().iter().map(|d| &**d))
    }

    /// Mean brightness and colour temperature across the roster.
    pub fn average_settings(&self) -> AverageSettings {
        AverageSettings::from_devices(self.snapshot().iter().map(|d| &**d))
    }

    /// Most restrictive colour-temperature range every device accepts,
    /// starting from the fallback range. `None` if the ranges are disjoint.
    pub fn common_color_temp_range(&self) -> Option<ColorTempRange> {
        ColorTempRange::common(self.snapshot().iter().filter_map(|d| d.color_temp_range))
    }

    // ── Internals ────────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &Inner) -> Roster {
        let roster: Roster = Arc::new(
            inner
                .entries
                .values()
                .map(|e| Arc::clone(&e.device))
                .collect(),
        );
        self.snapshot.send_replace(Arc::clone(&roster));
        roster
    }
}
