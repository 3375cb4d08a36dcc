//! Ad-library infrastructure
//!
//! Shared pieces used by the binaries:
//! - Telemetry initialization (tracing to stderr)
//! - Error payloads for tool responses

pub mod error;
pub mod telemetry;

pub use error::ErrorResponse;
pub use telemetry::{init_telemetry, TelemetryOptions};
