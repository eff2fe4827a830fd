//! Zero Common - Shared types, utilities, and configuration for the Zero scanner.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration validation
//! - Error types and handling utilities
//! - Logging setup
//! - Utility functions used across the scanner crates

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod config_loader;
pub mod error;
pub mod logging;
pub mod util;
pub mod validation;

pub use config::{Config, ObservabilityConfig, SecretsConfig};
pub use error::{Error, Result};
pub use validation::{Validate, ValidationError, ValidationResult};
