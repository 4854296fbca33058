// ── Domain model ──
//
// Canonical device types shared by the registry, gateway and view layer.
// Wire types from `smarttouch-api` are converted into these in `convert`.

mod device;
mod feature;
mod state;

pub use device::{Device, DeviceId, DeviceTarget};
#[cfg(test)]
pub(crate) use device::fixtures as device_fixtures;
pub use feature::Feature;
pub use state::{ColorTempRange, PowerAction, PowerState, StatePatch};
