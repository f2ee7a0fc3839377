//! DRAM Device Geometry.
//!
//! Describes the addressable layout of one chip. Fault addresses pack the
//! fields MSB to LSB as rank, bank, row, column, bit, each field
//! `log2(size)` bits wide.

use crate::common::{FaultSimError, Result};

/// Physical organization of a single DRAM device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Data bits per column access (device bus width, e.g. x4, x8).
    pub bit_width: u64,
    pub ranks: u64,
    pub banks: u64,
    pub rows: u64,
    pub cols: u64,
}

impl Geometry {
    /// Creates a geometry, requiring every dimension to be a power of two.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if a dimension is zero or not a power of two,
    /// or if the packed address would not fit in 64 bits.
    pub fn new(bit_width: u64, ranks: u64, banks: u64, rows: u64, cols: u64) -> Result<Self> {
        let dims = [
            ("bit width", bit_width),
            ("ranks", ranks),
            ("banks", banks),
            ("rows", rows),
            ("cols", cols),
        ];
        for (name, value) in dims {
            if !value.is_power_of_two() {
                return Err(FaultSimError::InvalidConfig(format!(
                    "device {} must be a non-zero power of two, got {}",
                    name, value
                )));
            }
        }
        let geometry = Self {
            bit_width,
            ranks,
            banks,
            rows,
            cols,
        };
        if geometry.address_bits() > 63 {
            return Err(FaultSimError::InvalidConfig(format!(
                "device address needs {} bits, at most 63 are supported",
                geometry.address_bits()
            )));
        }
        Ok(geometry)
    }

    pub fn log_bits(&self) -> u32 {
        self.bit_width.trailing_zeros()
    }

    pub fn log_ranks(&self) -> u32 {
        self.ranks.trailing_zeros()
    }

    pub fn log_banks(&self) -> u32 {
        self.banks.trailing_zeros()
    }

    pub fn log_rows(&self) -> u32 {
        self.rows.trailing_zeros()
    }

    pub fn log_cols(&self) -> u32 {
        self.cols.trailing_zeros()
    }

    /// Bit position of the lowest bank bit in a packed address.
    pub fn bank_shift(&self) -> u32 {
        self.log_rows() + self.log_cols() + self.log_bits()
    }

    /// Total width of a packed address.
    pub fn address_bits(&self) -> u32 {
        self.log_ranks() + self.log_banks() + self.log_rows() + self.log_cols() + self.log_bits()
    }

    /// Number of bit positions in one row (columns times bus width).
    pub fn row_span(&self) -> u64 {
        self.cols * self.bit_width
    }

    /// Device capacity in gigabits.
    pub fn gbits(&self) -> f64 {
        (self.ranks * self.banks * self.rows * self.cols * self.bit_width) as f64
            / (1024.0 * 1024.0 * 1024.0)
    }

    /// Splits a packed value into `(rank, bank, row, col, bit)` fields.
    pub fn decode(&self, value: u64) -> (u64, u64, u64, u64, u64) {
        let mut v = value;
        let bit = v & (self.bit_width - 1);
        v >>= self.log_bits();
        let col = v & (self.cols - 1);
        v >>= self.log_cols();
        let row = v & (self.rows - 1);
        v >>= self.log_rows();
        let bank = v & (self.banks - 1);
        v >>= self.log_banks();
        let rank = v & (self.ranks - 1);
        (rank, bank, row, col, bit)
    }
}
