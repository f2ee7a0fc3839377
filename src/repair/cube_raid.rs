//! RAID-like Parity across Stack Dies.
//!
//! One die's worth of parity protects a data block striped over the
//! dies. A fault is recoverable while no other die holds a fault in the
//! same block.

use tracing::trace;

use super::{chip_ranges, clear_touched, Marks, PassCounter, RepairContext, RepairOutcome, RepairScheme};
use crate::common::{FaultSimError, Result};
use crate::domain::DomainNode;

#[derive(Debug)]
pub struct CubeRaidRepair {
    name: String,
    n_correct: u64,
    n_detect: u64,
    block_mask: u64,
    counter: PassCounter,
}

impl CubeRaidRepair {
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `data_block_bits` is not a power of two.
    pub fn new(
        name: impl Into<String>,
        n_correct: u64,
        n_detect: u64,
        data_block_bits: u64,
    ) -> Result<Self> {
        if !data_block_bits.is_power_of_two() {
            return Err(FaultSimError::InvalidConfig(format!(
                "RAID block of {} bits is not a power of two",
                data_block_bits
            )));
        }
        Ok(Self {
            name: name.into(),
            n_correct,
            n_detect,
            block_mask: data_block_bits - 1,
            counter: PassCounter::default(),
        })
    }
}

impl RepairScheme for CubeRaidRepair {
    fn name(&self) -> &str {
        &self.name
    }

    /// Counts the other dies with a fault in the organizing range's block.
    ///
    /// The organizing die is skipped, so `n` other dies mean `n + 1`
    /// overlapping faults.
    fn repair(&mut self, chips: &mut [DomainNode], ctx: &RepairContext) -> Result<RepairOutcome> {
        self.counter.record();
        clear_touched(chips)?;

        let mut outcome = RepairOutcome::default();
        let mut marks = Marks::default();
        {
            let ranges = chip_ranges(chips)?;
            'scan: for (c0, chip0) in ranges.iter().enumerate() {
                for (r0, org) in chip0.iter().enumerate() {
                    let mut query = org.clone();
                    query.wildcard_mask |= self.block_mask;

                    let mut n = 0u64;
                    if query.touched < query.max_faults {
                        n = ranges
                            .iter()
                            .enumerate()
                            .filter(|(c1, _)| *c1 != c0)
                            // The query already wildcards the block, which
                            // covers widening the candidate as well.
                            .filter(|(_, chip)| {
                                chip.iter()
                                    .any(|fr| fr.touched < fr.max_faults && query.intersects(fr))
                            })
                            .count() as u64;
                    }
                    trace!(scheme = %self.name, chip = c0, range = r0, n, "block check");

                    let mut halt = false;
                    if n >= self.n_correct {
                        outcome.uncorrectable += n + 1 - self.n_correct;
                        marks.keep(c0, r0);
                        halt = !ctx.continue_running;
                    }
                    if n >= self.n_detect {
                        outcome.undetectable += n + 1 - self.n_detect;
                    }
                    if halt {
                        break 'scan;
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
