//! Shared types, errors, and configuration for Tally.
//!
//! This crate provides common types used across all other crates:
//! - Money types with fixed-point decimal precision and a rounding policy
//! - Typed IDs for type-safe entity references
//! - Date ranges for period-scoped reads
//! - The cross-component error taxonomy
//! - Configuration management
//! - Tracing initialisation

pub mod config;
pub mod error;
pub mod telemetry;
pub mod types;

pub use config::EngineConfig;
pub use error::{AppError, AppResult, ErrorKind};
