// smarttouch-api: Async Rust client for the Govee developer cloud API

pub mod client;
pub mod error;
pub mod models;
pub mod transport;

pub use client::{DEFAULT_BASE_URL, GoveeClient};
pub use error::Error;
pub use models::{ApiDevice, ColorTemRange, ControlCommand, DeviceState};
pub use transport::TransportConfig;
