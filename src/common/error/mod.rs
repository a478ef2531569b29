//! Unified error types for docmark.
//!
//! This module provides a single error type shared by the envelope codec,
//! every format strategy and the registry, presenting a consistent API to users.

// Submodule declarations
pub mod conversions;
pub mod types;

// Re-exports
pub use types::{Result, WatermarkError};
