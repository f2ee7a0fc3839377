//! Device-level BCH codes.
//!
//! A BCH codeword spans `2^bit_shift` consecutive addresses of every chip
//! in the rank. SECDED groups 4 locations, 3EC4ED 16 and 6EC7ED 32.

use tracing::trace;

use super::{chip_ranges, clear_touched, Marks, PassCounter, RepairContext, RepairOutcome, RepairScheme};
use crate::common::{FaultSimError, Result};
use crate::domain::DomainNode;

#[derive(Debug)]
pub struct BchRepair {
    name: String,
    n_correct: u64,
    n_detect: u64,
    bit_shift: u32,
    counter: PassCounter,
}

impl BchRepair {
    /// Creates a BCH code correcting `n_correct` bits per codeword.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` unless `n_correct` is 1, 3 or 6.
    pub fn new(name: impl Into<String>, n_correct: u64, n_detect: u64) -> Result<Self> {
        let bit_shift = match n_correct {
            1 => 2,
            3 => 4,
            6 => 5,
            other => {
                return Err(FaultSimError::InvalidConfig(format!(
                    "no BCH codeword layout corrects {} bits",
                    other
                )))
            }
        };
        Ok(Self {
            name: name.into(),
            n_correct,
            n_detect,
            bit_shift,
            counter: PassCounter::default(),
        })
    }

    /// Low address bits covered by one codeword.
    pub fn bit_shift(&self) -> u32 {
        self.bit_shift
    }
}

impl RepairScheme for BchRepair {
    fn name(&self) -> &str {
        &self.name
    }

    fn repair(&mut self, chips: &mut [DomainNode], ctx: &RepairContext) -> Result<RepairOutcome> {
        self.counter.record();
        clear_touched(chips)?;

        let shift = self.bit_shift;
        let window = 1u64 << shift;
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

                    // One hit per chip per location.
                    let mut n = 0u64;
                    for _ in 0..window {
                        n += ranges
                            .iter()
                            .filter(|chip| {
                                chip.iter()
                                    .any(|fr| query.intersects(fr) && fr.touched < fr.max_faults)
                            })
                            .count() as u64;
                        query.address = query.address.wrapping_add(1);
                    }
                    trace!(scheme = %self.name, chip = c0, range = r0, n, "codeword check");

                    let mut failed = false;
                    if n > self.n_correct {
                        outcome.uncorrectable += n - self.n_correct;
                        marks.keep(c0, r0);
                        failed = true;
                    }
                    if n > self.n_detect {
                        outcome.undetectable += n - self.n_detect;
                        failed = true;
                    }
                    if failed && !ctx.continue_running {
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
