//! Utility functions for dates, formatting and sectional gate labels.

pub mod dates;
pub mod format;
pub mod gates;

pub use format::{age_display, redact_credential, truncate};
