//! ChipKill across Stack Dies.
//!
//! Horizontal-channel stacks interleave eight banks over the dies; a
//! codeword pairs the lead die with a partner die, then a quad and an
//! octet, and only partners whose bank index lines up with the lead bank
//! can share the codeword. Vertical-channel stacks have no model.

use tracing::trace;

use super::{chip_ranges, clear_touched, Marks, PassCounter, RepairContext, RepairOutcome, RepairScheme};
use crate::common::{FaultSimError, Result};
use crate::config::CubeModel;
use crate::domain::DomainNode;
use crate::fault::{AddressRange, Geometry};

/// Bytes protected per die: the low six address bits.
const QUERY_MASK: u64 = (1 << 6) - 1;

/// Bank-select bits rewritten for each interleaved bank.
const INTERLEAVE_BITS: u32 = 3;

/// Which ranges of a partner die may count for the codeword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pairing {
    /// Any intersecting range.
    Any,
    /// Partner bank is `lead >> 1`, or wildcarded.
    Pair,
    /// Partner bank is `(lead >> 1) | 4`.
    Quad,
    /// Partner bank is `lead >> 1`.
    Octet,
}

impl Pairing {
    fn admits(self, lead_bank: Option<u64>, bank: Option<u64>) -> bool {
        match self {
            Pairing::Any => true,
            Pairing::Pair => match (lead_bank, bank) {
                (Some(lead), Some(b)) => b == lead >> 1,
                (None, Some(b)) => b < 4,
                (_, None) => true,
            },
            Pairing::Quad => bank == lead_bank.map(|lead| (lead >> 1) | 0x4),
            Pairing::Octet => bank == lead_bank.map(|lead| lead >> 1),
        }
    }
}

fn between(v: u64, lo: u64, hi: u64) -> bool {
    v > lo && v < hi
}

/// Pairing rules that apply to the die at position `chip` for a codeword
/// led by the die at position `lead`. Several rules may apply at once.
fn pairing_rules(lead: u64, chip: u64) -> Vec<Pairing> {
    let mut rules = Vec::new();
    if lead < 2 && chip < 2 {
        rules.push(Pairing::Any);
    }
    if (lead < 2 || chip < 2) && (lead == 4 || chip == 4) {
        rules.push(Pairing::Pair);
    }
    if between(lead, 1, 4) && between(chip, 1, 4) {
        rules.push(Pairing::Any);
    }
    if (between(lead, 1, 4) || between(chip, 1, 4)) && (lead == 4 || chip == 4) {
        rules.push(Pairing::Quad);
    }
    if between(lead, 4, 7) && between(chip, 4, 7) {
        rules.push(Pairing::Any);
    }
    if (between(lead, 4, 7) || between(chip, 4, 7)) && (lead == 7 || chip == 7) {
        rules.push(Pairing::Octet);
    }
    rules
}

/// Bank index of a range, or `None` when every bank is wildcarded.
fn bank_of(range: &AddressRange, geometry: &Geometry) -> Option<u64> {
    let shift = geometry.bank_shift();
    let bank_mask = geometry.banks - 1;
    if (range.wildcard_mask >> shift) & bank_mask == bank_mask {
        None
    } else {
        Some((range.address >> shift) & bank_mask)
    }
}

#[derive(Debug)]
pub struct ChipKillCubeRepair {
    name: String,
    n_correct: u64,
    n_detect: u64,
    model: CubeModel,
    counter: PassCounter,
}

impl ChipKillCubeRepair {
    pub fn new(name: impl Into<String>, n_correct: u64, n_detect: u64, model: CubeModel) -> Self {
        Self {
            name: name.into(),
            n_correct,
            n_detect,
            model,
            counter: PassCounter::default(),
        }
    }

    pub fn model(&self) -> CubeModel {
        self.model
    }

    fn repair_horizontal(&mut self, chips: &mut [DomainNode]) -> Result<RepairOutcome> {
        clear_touched(chips)?;
        let Some(geometry) = chips.first().and_then(|c| c.as_device()).map(|d| *d.geometry())
        else {
            return Ok(RepairOutcome::default());
        };
        let shift = geometry.bank_shift();
        let lower_mask = (1u64 << shift) - 1;

        // The lead die counter never advances, so every codeword is led by
        // die 0 in bank 0.
        let lead: u64 = 0;
        let lead_bank: Option<u64> = Some(0);

        let mut outcome = RepairOutcome::default();
        let mut marks = Marks::default();
        {
            let ranges = chip_ranges(chips)?;
            for (c0, chip0) in ranges.iter().enumerate() {
                for (r0, org) in chip0.iter().enumerate() {
                    let mut query = org.clone();
                    query.wildcard_mask = QUERY_MASK;

                    let mut n = 0u64;
                    let mut position: u64 = 0;
                    for bank in 0..geometry.banks {
                        let lower = query.address & lower_mask;
                        let upper = query
                            .address
                            .checked_shr(INTERLEAVE_BITS + shift)
                            .unwrap_or(0);
                        query.address = (((upper << INTERLEAVE_BITS) + bank) << shift) | lower;

                        for (c1, chip1) in ranges.iter().enumerate() {
                            for rule in pairing_rules(lead, position) {
                                let hit = chip1.iter().position(|fr| {
                                    rule.admits(lead_bank, bank_of(fr, &geometry))
                                        && query.intersects(fr)
                                });
                                if let Some(r1) = hit {
                                    n += 1;
                                    marks.touch(c1, r1);
                                }
                            }
                            position += 1;
                        }
                    }
                    trace!(scheme = %self.name, chip = c0, range = r0, n, "codeword check");

                    if n > self.n_correct {
                        outcome.uncorrectable += n - self.n_correct;
                    }
                    if n > self.n_detect {
                        outcome.undetectable += n - self.n_detect;
                    }
                }
            }
        }
        marks.apply(chips);
        Ok(outcome)
    }
}

impl RepairScheme for ChipKillCubeRepair {
    fn name(&self) -> &str {
        &self.name
    }

    /// # Errors
    ///
    /// Vertical-channel stacks return `Unimplemented`.
    fn repair(&mut self, chips: &mut [DomainNode], _ctx: &RepairContext) -> Result<RepairOutcome> {
        self.counter.record();
        match self.model {
            CubeModel::Horizontal => self.repair_horizontal(chips),
            CubeModel::Vertical => Err(FaultSimError::Unimplemented(
                "ChipKill repair for vertical-channel stacks",
            )),
        }
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

