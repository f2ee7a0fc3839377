//! DRAM Fault Classes.
//!
//! The field-study fault taxonomy: each class fixes a different subset of
//! the address fields and wildcards the rest.

/// Which address fields a generated range pins to a concrete value.
///
/// A `false` field is wildcarded over its whole extent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedFields {
    pub rank: bool,
    pub bank: bool,
    pub row: bool,
    pub col: bool,
    pub bit: bool,
}

impl FixedFields {
    pub const fn new(rank: bool, bank: bool, row: bool, col: bool, bit: bool) -> Self {
        Self {
            rank,
            bank,
            row,
            col,
            bit,
        }
    }
}

/// Spatial extent of a single DRAM fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaultClass {
    /// One bit cell.
    OneBit,
    /// All bits of one column access.
    OneWord,
    /// One column across every row of a bank.
    OneColumn,
    /// One full row.
    OneRow,
    /// One full bank.
    OneBank,
    /// Every bank of one rank.
    MultiBank,
    /// The whole device.
    MultiRank,
}

impl FaultClass {
    /// Number of fault classes.
    pub const COUNT: usize = 7;

    /// Every class, in table order.
    pub const ALL: [FaultClass; Self::COUNT] = [
        FaultClass::OneBit,
        FaultClass::OneWord,
        FaultClass::OneColumn,
        FaultClass::OneRow,
        FaultClass::OneBank,
        FaultClass::MultiBank,
        FaultClass::MultiRank,
    ];

    /// Position of this class in FIT tables and counters.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Looks a class up by table position.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            FaultClass::OneBit => "1BIT",
            FaultClass::OneWord => "1WORD",
            FaultClass::OneColumn => "1COL",
            FaultClass::OneRow => "1ROW",
            FaultClass::OneBank => "1BANK",
            FaultClass::MultiBank => "NBANK",
            FaultClass::MultiRank => "NRANK",
        }
    }

    /// Address fields this class pins (rank, bank, row, col, bit).
    pub fn fixed_fields(self) -> FixedFields {
        match self {
            FaultClass::OneBit => FixedFields::new(true, true, true, true, true),
            FaultClass::OneWord => FixedFields::new(true, true, true, true, false),
            FaultClass::OneColumn => FixedFields::new(true, true, false, true, false),
            FaultClass::OneRow => FixedFields::new(true, true, true, false, false),
            FaultClass::OneBank => FixedFields::new(true, true, false, false, false),
            FaultClass::MultiBank => FixedFields::new(true, false, false, false, false),
            FaultClass::MultiRank => FixedFields::new(false, false, false, false, false),
        }
    }
}
