//! Common utilities and types used throughout the simulator.
//!
//! This module provides the error type, unit constants and random stream
//! seeding shared by the fault, domain, repair and simulation layers.

/// Time and reliability unit constants.
pub mod constants;

/// Error types for configuration, invariant and unimplemented-path failures.
pub mod error;

/// Per-device random stream seeding.
pub mod rng;

pub use error::{FaultSimError, Result};
pub use rng::Seeder;

pub use constants::{FIT_DEVICE_HOURS, SECONDS_PER_HOUR, SECONDS_PER_WEEK};
