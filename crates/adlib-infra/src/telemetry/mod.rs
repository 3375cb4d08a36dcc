//! Tracing initialization
//!
//! Logs always go to stderr: stdout carries the MCP stdio transport.

mod init_basic;

pub use init_basic::{init_telemetry, TelemetryOptions};
