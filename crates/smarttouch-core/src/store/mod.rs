// ── Device registry ──
//
// The single owner of device state. Everything else reads snapshots.

mod registry;
mod summary;

pub use registry::{Applied, Registry, Ticket};
pub use summary::{AverageSettings, Summary};
