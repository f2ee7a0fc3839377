//! Fault representation and generation.
//!
//! Faults are symbolic address ranges inside one device. This module owns
//! the range algebra, the device geometry that gives addresses their
//! meaning, the fault-class taxonomy, the FIT tables and the FIT to
//! probability conversion.

/// Fault-class taxonomy and the address fields each class pins.
pub mod class;

/// Device geometry and packed-address layout.
pub mod geometry;

/// Per-class FIT tables for the supported fault models.
pub mod model;

/// The address-range intersection algebra.
pub mod range;

/// FIT to probability and inter-arrival conversion.
pub mod rate;

pub use class::{FaultClass, FixedFields};
pub use geometry::Geometry;
pub use model::FitTable;
pub use range::AddressRange;
pub use rate::{fit_to_probability, mean_hours_between_faults};
