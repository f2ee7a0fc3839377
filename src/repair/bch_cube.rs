//! BCH Codes over a Stack Data Block.
//!
//! In a stack every die delivers a whole data block per access, so the
//! codeword lives inside a single die: `data_block_bits` consecutive
//! addresses. Only the organizing die is searched.

use tracing::trace;

use super::{chip_ranges, clear_touched, Marks, PassCounter, RepairContext, RepairOutcome, RepairScheme};
use crate::common::{FaultSimError, Result};
use crate::domain::DomainNode;

#[derive(Debug)]
pub struct BchCubeRepair {
    name: String,
    n_correct: u64,
    n_detect: u64,
    log_block_bits: u32,
    counter: PassCounter,
}

impl BchCubeRepair {
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `data_block_bits` is not a power of two.
    pub fn new(
        name: impl Into<String>,
        n_correct: u64,
        n_detect: u64,
        data_block_bits: u64,
    ) -> Result<Self> {
        if !data_block_bits.is_power_of_two() || data_block_bits.trailing_zeros() >= 32 {
            return Err(FaultSimError::InvalidConfig(format!(
                "BCH block of {} bits is not a supported power of two",
                data_block_bits
            )));
        }
        Ok(Self {
            name: name.into(),
            n_correct,
            n_detect,
            log_block_bits: data_block_bits.trailing_zeros(),
            counter: PassCounter::default(),
        })
    }
}

impl RepairScheme for BchCubeRepair {
    fn name(&self) -> &str {
        &self.name
    }

    /// Walks the block around every range and counts faulty locations.
    ///
    /// After the first hit the query is narrowed to the rows the two
    /// ranges share: mask bits wild in the query but fixed in the hit take
    /// the hit's values, so later locations only count faults in those
    /// same rows.
    fn repair(&mut self, chips: &mut [DomainNode], ctx: &RepairContext) -> Result<RepairOutcome> {
        self.counter.record();
        clear_touched(chips)?;

        let shift = self.log_block_bits;
        let window = 1u64 << shift;
        let lower_mask = window - 1;
        let mut outcome = RepairOutcome::default();
        let mut marks = Marks::default();
        {
            let ranges = chip_ranges(chips)?;
            'scan: for (c0, chip0) in ranges.iter().enumerate() {
                for (r0, org) in chip0.iter().enumerate() {
                    if org.touched >= org.max_faults {
                        continue;
                    }
                    let mut query = org.clone();
                    query.address = (query.address >> shift) << shift;
                    query.wildcard_mask = (query.wildcard_mask >> shift) << shift;
                    if ctx.debug {
                        trace!(scheme = %self.name, chip = c0, range = r0, "outer {:#x}/{:#x}", org.address, org.wildcard_mask);
                    }

                    let mut n = 0u64;
                    for bit in 0..window {
                        let hit = chip0
                            .iter()
                            .find(|fr| fr.touched < fr.max_faults && query.intersects(fr));
                        if let Some(fr) = hit {
                            n += 1;
                            if ctx.debug {
                                trace!(scheme = %self.name, bit, n, "intersect");
                            }
                            let upper = (fr.address >> shift) << shift;
                            let lower = query.address & lower_mask;
                            let old_mask = query.wildcard_mask;
                            query.wildcard_mask &= fr.wildcard_mask;
                            let changed = old_mask ^ query.wildcard_mask;
                            query.address =
                                (upper & changed) | (query.address & !changed) | lower;
                        }
                        query.address = query.address.wrapping_add(1);
                    }

                    let mut halt = false;
                    if n > self.n_correct {
                        outcome.uncorrectable += n - self.n_correct;
                        marks.keep(c0, r0);
                        halt = !ctx.continue_running;
                    }
                    if n >= self.n_detect {
                        outcome.undetectable += n - self.n_detect;
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
