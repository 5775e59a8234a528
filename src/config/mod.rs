//! Configuration module for site flattening
//!
//! This module provides the `InlinerConfig` struct and its type-safe builder
//! with validation and sensible defaults.

// Sub-modules
pub mod builder;
pub mod getters;
pub mod methods;
pub mod types;

// Re-exports for public API
pub use builder::{InlinerConfigBuilder, WithUploadDir};
pub use types::InlinerConfig;
