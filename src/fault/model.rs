//! Per-Class FIT Tables.
//!
//! Rates are FIT per device. The Jaguar table comes from the field study
//! of DRAM faults in the Jaguar supercomputer; the uniform-bit model uses
//! the sum of that table as a pure single-bit rate.

use super::class::FaultClass;

/// Transient and permanent FIT rates for every fault class.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FitTable {
    pub transient: [f64; FaultClass::COUNT],
    pub permanent: [f64; FaultClass::COUNT],
}

impl FitTable {
    /// No faults of any class.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Single-bit faults only.
    pub fn uniform_bit() -> Self {
        let mut table = Self::zero();
        table.set(FaultClass::OneBit, true, 33.05);
        table.set(FaultClass::OneBit, false, 33.05);
        table
    }

    /// Field-study rates for every class.
    pub fn jaguar() -> Self {
        Self {
            transient: [14.2, 1.4, 1.4, 0.2, 0.8, 0.3, 0.9],
            permanent: [18.6, 0.3, 5.6, 8.2, 10.0, 1.4, 2.8],
        }
    }

    pub fn get(&self, class: FaultClass, transient: bool) -> f64 {
        if transient {
            self.transient[class.index()]
        } else {
            self.permanent[class.index()]
        }
    }

    pub fn set(&mut self, class: FaultClass, transient: bool, fit: f64) {
        if transient {
            self.transient[class.index()] = fit;
        } else {
            self.permanent[class.index()] = fit;
        }
    }

    /// Zeroes the transient and/or permanent half of the table.
    pub fn gated(mut self, enable_transient: bool, enable_permanent: bool) -> Self {
        if !enable_transient {
            self.transient = [0.0; FaultClass::COUNT];
        }
        if !enable_permanent {
            self.permanent = [0.0; FaultClass::COUNT];
        }
        self
    }

    /// Drops multi-rank faults, which have no counterpart in a die stack.
    pub fn without_rank_faults(mut self) -> Self {
        self.set(FaultClass::MultiRank, true, 0.0);
        self.set(FaultClass::MultiRank, false, 0.0);
        self
    }

    /// Sum of every rate in the table.
    pub fn total(&self) -> f64 {
        self.transient.iter().chain(self.permanent.iter()).sum()
    }
}
