//! ECC Repair Schemes.
//!
//! A repair scheme is attached to a group node and judges the faults of
//! the node's child devices against one error-correcting code. Every
//! scheme follows the same pass structure:
//!
//! 1. Clear the `touched` counter of every range in the domain.
//! 2. For every range of every chip (the organizing range), build a query
//!    range widened to the scheme's symbol or codeword and count how many
//!    chips hold an intersecting fault.
//! 3. Compare the count with the correction and detection strengths and
//!    accumulate the excess into the pass outcome.
//!
//! Scans run over shared borrows of the chips; the per-range side effects
//! (`transient_removable` cleared, `touched` bumped) are collected in
//! `Marks` and applied once the scan is over.

/// Device-level BCH codes (SECDED, 3EC4ED, 6EC7ED) on a DIMM.
pub mod bch;

/// BCH codes over a stack's data block.
pub mod bch_cube;

/// Symbol-based ChipKill on a DIMM.
pub mod chipkill;

/// ChipKill across the dies of a 3D stack.
pub mod chipkill_cube;

/// RAID-like parity across the dies of a 3D stack.
pub mod cube_raid;

use std::fmt;

use crate::common::{FaultSimError, Result};
use crate::domain::DomainNode;
use crate::fault::AddressRange;

pub use bch::BchRepair;
pub use bch_cube::BchCubeRepair;
pub use chipkill::ChipKillRepair;
pub use chipkill_cube::ChipKillCubeRepair;
pub use cube_raid::CubeRaidRepair;

/// Result of one repair pass over a domain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairOutcome {
    /// Faults beyond the detection strength.
    pub undetectable: u64,
    /// Faults beyond the correction strength.
    pub uncorrectable: u64,
}

impl RepairOutcome {
    pub fn new(undetectable: u64, uncorrectable: u64) -> Self {
        Self {
            undetectable,
            uncorrectable,
        }
    }

    /// True if the pass left any undetectable or uncorrectable fault.
    pub fn failed(&self) -> bool {
        self.undetectable > 0 || self.uncorrectable > 0
    }

    /// Field-wise minimum: the better of two competing codes.
    pub fn best(self, other: RepairOutcome) -> RepairOutcome {
        RepairOutcome {
            undetectable: self.undetectable.min(other.undetectable),
            uncorrectable: self.uncorrectable.min(other.uncorrectable),
        }
    }
}

/// Run-wide settings a repair pass needs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepairContext {
    /// Keep scanning after the first uncorrectable codeword.
    pub continue_running: bool,
    /// Trace every query and intersection.
    pub debug: bool,
}

/// An error-correcting code applied to the children of a group node.
pub trait RepairScheme: fmt::Debug {
    /// Short name used in reports (e.g. `CK1`, `SECDED`).
    fn name(&self) -> &str;

    /// Judges every fault of `chips` and returns the residual
    /// undetectable and uncorrectable counts.
    ///
    /// # Errors
    ///
    /// Returns `Invariant` if the domain does not have the shape the code
    /// requires, or `Unimplemented` for layouts without a model.
    fn repair(&mut self, chips: &mut [DomainNode], ctx: &RepairContext) -> Result<RepairOutcome>;

    /// Clears per-trial working counters.
    fn clear_counters(&mut self);

    /// Clears whole-run counters.
    fn reset_stats(&mut self);

    /// Repair passes run since the last stats reset.
    fn passes(&self) -> u64;

    /// Repair passes run in the current trial.
    fn trial_passes(&self) -> u64;

    fn print_stats(&self) {
        println!("  [{}] repair passes {}", self.name(), self.passes());
    }
}

/// Trial and run counters of repair passes.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassCounter {
    pub trial: u64,
    pub total: u64,
}

impl PassCounter {
    pub fn record(&mut self) {
        self.trial += 1;
        self.total += 1;
    }

    pub fn clear_trial(&mut self) {
        self.trial = 0;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Borrows the fault ranges of every chip in a repair domain.
///
/// # Errors
///
/// Returns `Invariant` if a child is not a memory device.
pub(crate) fn chip_ranges(chips: &[DomainNode]) -> Result<Vec<&[AddressRange]>> {
    chips
        .iter()
        .map(|chip| {
            chip.as_device().map(|d| d.ranges()).ok_or_else(|| {
                FaultSimError::Invariant(format!(
                    "repair domain child {} is not a memory device",
                    chip.name()
                ))
            })
        })
        .collect()
}

/// Resets the `touched` counter of every range in the domain.
pub(crate) fn clear_touched(chips: &mut [DomainNode]) -> Result<()> {
    for chip in chips.iter_mut() {
        let name = chip.name().to_string();
        let device = chip.as_device_mut().ok_or_else(|| {
            FaultSimError::Invariant(format!(
                "repair domain child {} is not a memory device",
                name
            ))
        })?;
        for range in device.ranges_mut().iter_mut() {
            range.touched = 0;
        }
    }
    Ok(())
}

/// Side effects of a scan, keyed by (chip, range) position.
#[derive(Debug, Default)]
pub(crate) struct Marks {
    keep: Vec<(usize, usize)>,
    touch: Vec<(usize, usize)>,
}

impl Marks {
    /// The range took part in an uncorrectable pattern; scrub must keep it.
    pub fn keep(&mut self, chip: usize, range: usize) {
        self.keep.push((chip, range));
    }

    /// The range was attributed to a correction once more.
    pub fn touch(&mut self, chip: usize, range: usize) {
        self.touch.push((chip, range));
    }

    pub fn apply(self, chips: &mut [DomainNode]) {
        for (c, r) in self.keep {
            if let Some(range) = range_at(chips, c, r) {
                range.transient_removable = false;
            }
        }
        for (c, r) in self.touch {
            if let Some(range) = range_at(chips, c, r) {
                range.touched += 1;
            }
        }
    }
}

fn range_at(chips: &mut [DomainNode], chip: usize, range: usize) -> Option<&mut AddressRange> {
    chips
        .get_mut(chip)?
        .as_device_mut()?
        .ranges_mut()
        .get_mut(range)
}
