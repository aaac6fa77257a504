//! jinsql Core
//!
//! Shared domain types: project configuration and diagnostics.
//! Never rename diagnostic codes - they are part of the public API.

pub mod diagnostic;
pub mod config;

pub use diagnostic::{Diagnostic, DiagnosticCode, Severity, Location};
pub use config::{Config, ConfigError, PathsConfig, TargetConfig};
