//! Test module organization.
//!
//! This module organizes all integration tests for the FaultSim simulator.



/// Address range algebra and geometry tests.
mod range_tests;



/// Trial engine, histogram and report tests.
mod sim_tests;
