mod service;

pub use service::{CleanupService, CleanupSummary};
