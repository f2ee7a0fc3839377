//! Simulator Error Types.
//!
//! Program errors only. Simulated memory faults are modeled outcomes and
//! travel as [`RepairOutcome`](crate::repair::RepairOutcome) values, never
//! through this type.

use thiserror::Error;

/// Error raised by configuration loading, topology construction, repair
/// or report writing.
#[derive(Debug, Error)]
pub enum FaultSimError {
    /// Reading the configuration file or writing the report failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML or has mistyped values.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A setting is missing, out of range or inconsistent with another.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The device tree or a repair domain violates a structural rule.
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// The configuration selects an algorithm path that has no model.
    #[error("not implemented: {0}")]
    Unimplemented(&'static str),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, FaultSimError>;
