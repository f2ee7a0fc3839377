//! Faulty Address Ranges.
//!
//! An `AddressRange` is a symbolic set of concrete device addresses: an
//! address plus a wildcard mask. Bits set in the mask take any value; bits
//! clear in the mask must equal the corresponding address bit. One range
//! can therefore stand for a single cell, a row, a column, a bank or a
//! whole device, and two ranges overlap exactly when no fixed bit
//! conflicts.

use std::fmt;

use rand::Rng;

use super::class::{FaultClass, FixedFields};
use super::geometry::Geometry;

/// A faulty region of one DRAM device.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressRange {
    /// Concrete values of the fixed address bits.
    pub address: u64,
    /// Bit positions that are wildcards.
    pub wildcard_mask: u64,
    /// Slot of the device that owns this range within its group.
    pub owner: usize,
    /// Class that produced the range, if it came from random injection.
    pub class: Option<FaultClass>,
    pub transient: bool,
    /// Produced by a through-silicon via failure.
    pub is_tsv: bool,
    /// Number of concrete addresses this range represents.
    pub max_faults: u64,
    /// Times the range was already attributed to a correction in the
    /// current repair pass.
    pub touched: u64,
    /// Cleared by repair when this range took part in an uncorrectable
    /// pattern; scrubbing keeps such ranges.
    pub transient_removable: bool,
    /// Arrival time in seconds (event engine only).
    pub timestamp: f64,
}

impl AddressRange {
    /// Creates a permanent range from an explicit address and mask.
    ///
    /// `max_faults` is the number of addresses the mask spans, saturating
    /// at `u64::MAX`.
    pub fn new(address: u64, wildcard_mask: u64) -> Self {
        let wild_bits = wildcard_mask.count_ones();
        let max_faults = if wild_bits >= 64 {
            u64::MAX
        } else {
            1u64 << wild_bits
        };
        Self {
            address,
            wildcard_mask,
            owner: 0,
            class: None,
            transient: false,
            is_tsv: false,
            max_faults,
            touched: 0,
            transient_removable: true,
            timestamp: 0.0,
        }
    }

    /// Marks the range transient or permanent.
    pub fn with_transient(mut self, transient: bool) -> Self {
        self.transient = transient;
        self
    }

    /// Generates a random range for `geometry`.
    ///
    /// Fixed fields get a uniformly random value, wildcarded fields are
    /// all-ones in the mask. Fields are composed MSB to LSB as rank, bank,
    /// row, column, bit.
    pub fn generate<R: Rng + ?Sized>(
        geometry: &Geometry,
        fixed: FixedFields,
        transient: bool,
        rng: &mut R,
    ) -> Self {
        let mut builder = RangeBuilder::new();
        builder.field(geometry.ranks, geometry.log_ranks(), fixed.rank, rng);
        builder.field(geometry.banks, geometry.log_banks(), fixed.bank, rng);
        builder.field(geometry.rows, geometry.log_rows(), fixed.row, rng);
        builder.field(geometry.cols, geometry.log_cols(), fixed.col, rng);
        builder.field(geometry.bit_width, geometry.log_bits(), fixed.bit, rng);
        builder.finish(transient, false)
    }

    /// Generates a TSV range: every rank, bank and row wildcarded, and the
    /// column and bit fields treated as one field set to `row_bit`.
    pub fn tsv(geometry: &Geometry, row_bit: u64, transient: bool) -> Self {
        let mut builder = RangeBuilder::new();
        builder.wild(geometry.ranks, geometry.log_ranks());
        builder.wild(geometry.banks, geometry.log_banks());
        builder.wild(geometry.rows, geometry.log_rows());
        builder.exact(row_bit, geometry.log_cols() + geometry.log_bits());
        builder.finish(transient, true)
    }

    /// Returns true if some concrete address lies in both ranges.
    ///
    /// Every bit must be wild on at least one side or equal on both.
    #[inline]
    pub fn intersects(&self, other: &AddressRange) -> bool {
        let combined_mask = self.wildcard_mask | other.wildcard_mask;
        let equal_addr = !(self.address ^ other.address);
        !(combined_mask | equal_addr) == 0
    }

    /// Bit-by-bit form of [`intersects`](Self::intersects), kept as a
    /// cross-check.
    pub fn intersects_reference(&self, other: &AddressRange) -> bool {
        let (mut a0, mut m0) = (self.address, self.wildcard_mask);
        let (mut a1, mut m1) = (other.address, other.wildcard_mask);
        for _ in 0..64 {
            let wild = (m0 & 1) == 1 || (m1 & 1) == 1;
            if !wild && (a0 & 1) != (a1 & 1) {
                return false;
            }
            a0 >>= 1;
            m0 >>= 1;
            a1 >>= 1;
            m1 >>= 1;
        }
        true
    }

    /// True if a scrub pass may delete this range.
    pub fn scrubbable(&self) -> bool {
        self.transient && self.transient_removable
    }

    /// Renders the range with its fields decoded against `geometry`.
    pub fn display<'a>(&'a self, geometry: &'a Geometry) -> RangeDisplay<'a> {
        RangeDisplay {
            range: self,
            geometry,
        }
    }
}

/// Human-readable view of an [`AddressRange`].
pub struct RangeDisplay<'a> {
    range: &'a AddressRange,
    geometry: &'a Geometry,
}

impl fmt::Display for RangeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (rank, bank, row, col, bit) = self.geometry.decode(self.range.address);
        let (mrank, mbank, mrow, mcol, mbit) = self.geometry.decode(self.range.wildcard_mask);
        write!(
            f,
            "TSV {} trans {} addr ({},{},{},{},{}) mask 0x({:X},{:X},{:X},{:X},{:X})",
            self.range.is_tsv as u8,
            self.range.transient as u8,
            rank,
            bank,
            row,
            col,
            bit,
            mrank,
            mbank,
            mrow,
            mcol,
            mbit
        )
    }
}

/// Accumulates address fields MSB first.
struct RangeBuilder {
    address: u64,
    mask: u64,
    max_faults: u64,
}

impl RangeBuilder {
    fn new() -> Self {
        Self {
            address: 0,
            mask: 0,
            max_faults: 1,
        }
    }

    fn shift(&mut self, width: u32) {
        self.address <<= width;
        self.mask <<= width;
    }

    fn field<R: Rng + ?Sized>(&mut self, size: u64, width: u32, fixed: bool, rng: &mut R) {
        if fixed {
            let value = rng.gen_range(0..size);
            self.exact(value, width);
        } else {
            self.wild(size, width);
        }
    }

    fn exact(&mut self, value: u64, width: u32) {
        self.shift(width);
        self.address |= value;
    }

    fn wild(&mut self, size: u64, width: u32) {
        self.shift(width);
        self.mask |= size - 1;
        self.max_faults = self.max_faults.saturating_mul(size);
    }

    fn finish(self, transient: bool, is_tsv: bool) -> AddressRange {
        AddressRange {
            address: self.address,
            wildcard_mask: self.mask,
            owner: 0,
            class: None,
            transient,
            is_tsv,
            max_faults: self.max_faults,
            touched: 0,
            transient_removable: true,
            timestamp: 0.0,
        }
    }
}
