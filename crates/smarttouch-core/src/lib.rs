// smarttouch-core: State synchronization between the Govee cloud and
// touch-panel UI surfaces.

pub mod capability;
pub mod config;
pub mod controller;
pub mod convert;
pub mod error;
pub mod gateway;
pub mod lock;
pub mod message;
pub mod model;
pub mod store;
pub mod stream;
pub mod view;

// ── Primary re-exports ──────────────────────────────────────────────
pub use capability::{Capabilities, CapabilityResolver};
pub use config::{ControlConfig, PresentationMode, ToastDurations};
pub use controller::ControlPlane;
pub use error::{CoreError, FailureKind};
pub use gateway::Gateway;
pub use lock::{InteractionLock, Release};
pub use message::{ControlEvent, SetAllOutcome, SetAllReport, ToggleOutcome, UiRequest};
pub use store::{Applied, AverageSettings, Registry, Summary, Ticket};
pub use stream::DeviceStream;
pub use view::{
    AggregateView, ColorTempControl, Control, Notification, NotificationLevel, Reaction, RowView,
    Surface, SurfaceView, ViewPatch, ViewSynchronizer,
};

pub use model::{
    ColorTempRange, Device, DeviceId, DeviceTarget, Feature, PowerAction, PowerState, StatePatch,
};
