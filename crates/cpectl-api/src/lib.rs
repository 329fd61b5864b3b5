// cpectl-api: Async Rust client for the DMP device-management cloud API

pub mod auth;
pub mod client;
pub mod cpe;
pub mod error;
pub mod transport;

pub use auth::{BearerToken, Identity};
pub use client::{DEFAULT_BASE_URL, DmpClient};
pub use cpe::{PARAMETER_TIMEOUT_SECS, RebootAck};
pub use error::Error;
pub use transport::{TlsMode, TransportConfig};
