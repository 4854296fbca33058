// ── Interaction lock ──
//
// One process-wide flag: while the user is touching a live control, state
// pushes must not move sliders. Every input event pushes the deadline out
// by the quiet window; the release is reported exactly once.

use std::time::Duration;

use tokio::time::Instant;

use crate::model::DeviceId;

/// Quiet period after the last input before the lock releases itself.
pub const DEFAULT_QUIET_WINDOW: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone)]
struct Held {
    device: Option<DeviceId>,
    deadline: Instant,
}

/// An automatic release of the lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// Device the lock was held for, if any.
    pub device: Option<DeviceId>,
}

/// Coarse suppression flag for in-progress user interactions.
///
/// Uses `tokio::time::Instant`, so paused test clocks drive it.
#[derive(Debug, Clone)]
pub struct InteractionLock {
    quiet_window: Duration,
    held: Option<Held>,
}

impl Default for InteractionLock {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_WINDOW)
    }
}

impl InteractionLock {
    pub fn new(quiet_window: Duration) -> Self {
        Self {
            quiet_window,
            held: None,
        }
    }

    pub fn quiet_window(&self) -> Duration {
        self.quiet_window
    }

    /// Set (or refresh) the lock for `device` and push the deadline out.
    pub fn begin_interaction(&mut self, device: Option<DeviceId>) {
        let deadline = Instant::now() + self.quiet_window;
        match &mut self.held {
            Some(held) => {
                held.deadline = deadline;
                if device.is_some() {
                    held.device = device;
                }
            }
            None => self.held = Some(Held { device, deadline }),
        }
    }

    /// Active until the deadline passes, even before `poll_expired` runs.
    pub fn is_active(&self) -> bool {
        self.held
            .as_ref()
            .is_some_and(|h| Instant::now() < h.deadline)
    }

    /// Active and held for `device`.
    pub fn is_active_for(&self, device: &DeviceId) -> bool {
        self.is_active()
            && self
                .held
                .as_ref()
                .and_then(|h| h.device.as_ref())
                .is_some_and(|d| d == device)
    }

    /// Device the lock was taken for.
    pub fn device(&self) -> Option<&DeviceId> {
        self.held.as_ref().and_then(|h| h.device.as_ref())
    }

    /// When the lock releases itself, if held.
    pub fn deadline(&self) -> Option<Instant> {
        self.held.as_ref().map(|h| h.deadline)
    }

    /// Release on commit. Returns `true` if the lock was held. No expiry
    /// is reported afterwards.
    pub fn release(&mut self) -> bool {
        self.held.take().is_some()
    }

    /// Report the automatic release once the quiet window has passed.
    ///
    /// Returns `Some` exactly once per expiry; `None` while still active
    /// or when nothing is held.
    pub fn poll_expired(&mut self) -> Option<Release> {
        let expired = self
            .held
            .as_ref()
            .is_some_and(|h| Instant::now() >= h.deadline);
        if expired {
            self.held.take().map(|h| Release { device: h.device })
        } else {
            None
        }
    }

    /// Wait for the automatic release. Pending forever when not held.
    pub async fn expired(&mut self) -> Release {
        loop {
            match self.deadline() {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
            if let Some(release) = self.poll_expired() {
                return release;
            }
        }
    }
}
