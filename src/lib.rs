//! FaultSim DRAM Reliability Simulator Library.
//!
//! This crate implements a Monte Carlo fault simulator for DRAM memory
//! systems. Faults are injected into the devices of a DIMM rank or a 3D
//! stack at field-measured FIT rates, represented compactly as wildcarded
//! address ranges, and judged by the ECC scheme of the enclosing group.
//! Repeating the lifetime over many trials yields the probability that a
//! system suffers uncorrectable or undetectable errors over time.
//!
//! # Architecture
//!
//! * **Fault**: Address-range algebra, fault classes and FIT tables.
//! * **Domain**: Device, DIMM and stack nodes, including through-silicon vias.
//! * **Repair**: ChipKill, BCH, stack BCH, stack RAID and stack ChipKill.
//! * **Simulation**: Interval and event-driven trial engines.
//!
//! # Modules
//!
//! * `common`: Shared constants, seeding, and error handling.
//! * `config`: Configuration loading and validation.
//! * `domain`: Memory topology and its per-trial protocol.
//! * `fault`: Fault representation and rates.
//! * `repair`: ECC schemes.
//! * `sim`: Trial engines and the simulation driver.
//! * `stats`: Failure histogram and run summary.

/// Shared constants, random seeding, and error handling.
///
/// Provides the crate-wide error type and the seed source from which
/// every device draws its own random stream.
pub mod common;

/// Configuration system for simulation, organization, fault and ECC settings.
///
/// Loads and validates TOML configuration files and decodes the numeric
/// selectors into typed enums.
pub mod config;

/// Memory topology: devices, DIMM ranks and 3D stacks.
///
/// Builds the domain tree from a configuration and implements fault
/// injection, repair dispatch, scrubbing and per-trial bookkeeping.
pub mod domain;

/// Fault representation: address ranges, fault classes and FIT rates.
pub mod fault;

/// ECC repair schemes for DIMM ranks and 3D stacks.
///
/// Each scheme inspects the fault ranges of a group's devices and reports
/// how many codeword errors remain uncorrectable or undetectable.
pub mod repair;

/// Monte Carlo simulation driver and its trial engines.
///
/// Runs independent trials in fixed time ticks or as a pre-sampled event
/// stream and feeds every failed repair into the failure histogram.
pub mod sim;

/// Failure histogram, report CSV and run summary.
pub mod stats;
