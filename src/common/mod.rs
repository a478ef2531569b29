//! Common types and utilities shared across format strategies.
//!
//! This module provides the unified error type, scoped file IO, binary
//! readers, signature checks and XML helpers used by every strategy.

// Submodule declarations
pub mod binary;
pub mod error;
pub mod fs;
#[cfg(any(feature = "ooxml", feature = "odf"))]
pub mod package;
pub mod signature;
pub mod xml;

// Re-exports for convenience
pub use error::{Result, WatermarkError};
pub use signature::Signature;
