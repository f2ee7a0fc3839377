//! Symbol-based ChipKill.
//!
//! Every chip contributes one 8-bit symbol to each codeword; the code
//! corrects `n_correct` bad symbols and detects `n_detect`. A DIMM needs
//! 18 chips per corrected symbol.

use tracing::trace;

use super::{chip_ranges, clear_touched, Marks, PassCounter, RepairContext, RepairOutcome, RepairScheme};
use crate::common::{FaultSimError, Result};
use crate::domain::DomainNode;

/// Chips per corrected symbol.
pub const CHIPS_PER_SYMBOL: usize = 18;

/// Low address bits wildcarded to cover one symbol.
const SYMBOL_MASK: u64 = (1 << 3) - 1;

#[derive(Debug)]
pub struct ChipKillRepair {
    name: String,
    n_correct: u64,
    n_detect: u64,
    counter: PassCounter,
}

impl ChipKillRepair {
    pub fn new(name: impl Into<String>, n_correct: u64, n_detect: u64) -> Self {
        Self {
            name: name.into(),
            n_correct,
            n_detect,
            counter: PassCounter::default(),
        }
    }
}

impl RepairScheme for ChipKillRepair {
    fn name(&self) -> &str {
        &self.name
    }

    /// Counts, for every range, the chips holding a fault in the same
    /// symbol, the organizing chip included.
    ///
    /// A count of at least `n_correct` marks the range non-removable and
    /// adds `count - n_correct` uncorrectable faults; a count of at least
    /// `n_detect` adds `count - n_detect` undetectable ones. The scan
    /// always covers every range.
    fn repair(&mut self, chips: &mut [DomainNode], _ctx: &RepairContext) -> Result<RepairOutcome> {
        let expected = self.n_correct as usize * CHIPS_PER_SYMBOL;
        if chips.len() != expected {
            return Err(FaultSimError::Invariant(format!(
                "{} needs {} chips, domain has {}",
                self.name,
                expected,
                chips.len()
            )));
        }
        self.counter.record();
        clear_touched(chips)?;

        let mut outcome = RepairOutcome::default();
        let mut marks = Marks::default();
        {
            let ranges = chip_ranges(chips)?;
            for (c0, chip0) in ranges.iter().enumerate() {
                for (r0, org) in chip0.iter().enumerate() {
                    let mut query = org.clone();
                    query.wildcard_mask |= SYMBOL_MASK;

                    let mut n = 0u64;
                    if query.touched < query.max_faults {
                        n = ranges
                            .iter()
                            .filter(|chip| chip.iter().any(|fr| query.intersects(fr)))
                            .count() as u64;
                    }
                    trace!(scheme = %self.name, chip = c0, range = r0, n, "symbol check");

                    if n <= self.n_correct && org.wildcard_mask > self.n_correct {
                        marks.keep(c0, r0);
                    }
                    if n >= self.n_correct {
                        outcome.uncorrectable += n - self.n_correct;
                        marks.keep(c0, r0);
                    }
                    if n >= self.n_detect {
                        outcome.undetectable += n - self.n_detect;
                    }
                }
            }
        }
        marks.apply(chips);
        Ok(outcome)
    }

    fn clear_counters(&mut self) {
        self.counter.clear_trial();
    }

    fn reset_stats(&mut self) {
        self.counter.reset();
    }

    fn passes(&self) -> u64 {
        self.counter.total
    }

    fn trial_passes(&self) -> u64 {
        self.counter.trial
    }
}
