//! Integration tests for fault address ranges, classes and geometry.

use faultsim::fault::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn dimm_geometry() -> Geometry {
    Geometry::new(4, 1, 8, 32768, 1024).unwrap()
}

/// Tests that intersection is symmetric for random range pairs.
#[test]
fn test_intersection_symmetric() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..2000 {
        let a = AddressRange::new(rng.gen(), rng.gen::<u64>() & rng.gen::<u64>());
        let b = AddressRange::new(rng.gen(), rng.gen::<u64>() & rng.gen::<u64>());
        assert_eq!(a.intersects(&b), b.intersects(&a));
    }
}

/// Tests that every range intersects itself.
#[test]
fn test_range_intersects_itself() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..1000 {
        let r = AddressRange::new(rng.gen(), rng.gen());
        assert!(r.intersects(&r));
    }
}

/// Tests that exact ranges with different addresses never intersect.
#[test]
fn test_disjoint_exact_ranges() {
    let a = AddressRange::new(0x1234, 0);
    let b = AddressRange::new(0x1235, 0);
    assert!(!a.intersects(&b));
    assert!(!b.intersects(&a));
}

/// Tests that a single wildcard bit bridges the only differing bit.
#[test]
fn test_wildcard_bridges_difference() {
    let a = AddressRange::new(0b1000, 0b0001);
    let b = AddressRange::new(0b1001, 0);
    let c = AddressRange::new(0b1011, 0);
    assert!(a.intersects(&b));
    assert!(!a.intersects(&c));
}

/// Tests that the bitwise intersection agrees with the bit-by-bit
/// reference for random pairs and for the all-wild and zero-wild edges.
#[test]
fn test_fast_intersection_matches_reference() {
    let mut rng = StdRng::seed_from_u64(0xFA17);
    for i in 0..12_000 {
        let (m0, m1) = match i % 4 {
            0 => (u64::MAX, rng.gen()),
            1 => (0, 0),
            2 => (0, rng.gen()),
            _ => (rng.gen::<u64>() & rng.gen::<u64>(), rng.gen::<u64>() & rng.gen::<u64>()),
        };
        let a0: u64 = rng.gen();
        // Flip only a few bits so that both outcomes occur often.
        let a1 = a0 ^ (1u64 << rng.gen_range(0..64u32)) ^ (rng.gen::<u64>() & rng.gen::<u64>() & rng.gen::<u64>());
        let a = AddressRange::new(a0, m0);
        let b = AddressRange::new(a1, m1);
        assert_eq!(a.intersects(&b), a.intersects_reference(&b), "{:#x}/{:#x} vs {:#x}/{:#x}", a0, m0, a1, m1);
    }
}

/// Tests that an all-wild range intersects anything.
#[test]
fn test_all_wild_intersects_everything() {
    let wild = AddressRange::new(0, u64::MAX);
    assert!(wild.intersects(&AddressRange::new(0xDEAD_BEEF, 0)));
    assert!(wild.intersects(&AddressRange::new(u64::MAX, 0)));
    assert_eq!(wild.max_faults, u64::MAX);
}

/// Tests max_faults counting for explicit masks.
#[test]
fn test_max_faults_from_mask() {
    assert_eq!(AddressRange::new(0, 0).max_faults, 1);
    assert_eq!(AddressRange::new(0, 0b111).max_faults, 8);
    assert_eq!(AddressRange::new(0, 0xF0F0).max_faults, 256);
}

/// Tests that a 1BIT range is a single fixed address inside the device.
#[test]
fn test_generate_single_bit() {
    let geom = dimm_geometry();
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..100 {
        let r = AddressRange::generate(&geom, FaultClass::OneBit.fixed_fields(), false, &mut rng);
        assert_eq!(r.wildcard_mask, 0);
        assert_eq!(r.max_faults, 1);
        assert!(r.address < (1u64 << geom.address_bits()));
        assert!(!r.transient);
        assert!(!r.is_tsv);
    }
}

/// Tests the wildcard shapes of the row, column and bank classes.
#[test]
fn test_generate_class_shapes() {
    let geom = dimm_geometry();
    let mut rng = StdRng::seed_from_u64(5);
    let col_bits = geom.log_cols() + geom.log_bits();

    let row = AddressRange::generate(&geom, FaultClass::OneRow.fixed_fields(), true, &mut rng);
    assert_eq!(row.wildcard_mask, (1u64 << col_bits) - 1);
    assert_eq!(row.max_faults, geom.row_span());
    assert!(row.transient);

    let word = AddressRange::generate(&geom, FaultClass::OneWord.fixed_fields(), false, &mut rng);
    assert_eq!(word.wildcard_mask, geom.bit_width - 1);

    let col = AddressRange::generate(&geom, FaultClass::OneColumn.fixed_fields(), false, &mut rng);
    let row_mask = (geom.rows - 1) << col_bits;
    assert_eq!(col.wildcard_mask, row_mask | (geom.bit_width - 1));
    assert_eq!(col.max_faults, geom.rows * geom.bit_width);

    let bank = AddressRange::generate(&geom, FaultClass::OneBank.fixed_fields(), false, &mut rng);
    assert_eq!(bank.wildcard_mask, (1u64 << geom.bank_shift()) - 1);
}

/// Tests that a multi-rank range covers the whole device.
#[test]
fn test_generate_multi_rank_covers_device() {
    let geom = dimm_geometry();
    let mut rng = StdRng::seed_from_u64(9);
    let r = AddressRange::generate(&geom, FaultClass::MultiRank.fixed_fields(), false, &mut rng);
    assert_eq!(r.address, 0);
    assert_eq!(r.wildcard_mask, (1u64 << geom.address_bits()) - 1);
    assert_eq!(r.max_faults, 1u64 << geom.address_bits());
}

/// Tests the TSV range shape: one column/bit position in every row.
#[test]
fn test_tsv_range_shape() {
    let geom = Geometry::new(32, 1, 8, 16384, 256).unwrap();
    let r = AddressRange::tsv(&geom, 300, true);
    let col_bits = geom.log_cols() + geom.log_bits();
    assert!(r.is_tsv);
    assert!(r.transient);
    assert_eq!(r.address, 300);
    assert_eq!(r.wildcard_mask & ((1u64 << col_bits) - 1), 0);
    assert_eq!(r.wildcard_mask >> col_bits, (1u64 << (geom.address_bits() - col_bits)) - 1);
    assert_eq!(r.max_faults, geom.banks * geom.rows);
}

/// Tests that only removable transient ranges are scrubbable.
#[test]
fn test_scrubbable_flags() {
    let permanent = AddressRange::new(0, 0);
    assert!(!permanent.scrubbable());

    let mut transient = AddressRange::new(0, 0).with_transient(true);
    assert!(transient.scrubbable());

    transient.transient_removable = false;
    assert!(!transient.scrubbable());
}

/// Tests the decoded display of a range.
#[test]
fn test_range_display() {
    let geom = Geometry::new(4, 1, 8, 16, 16).unwrap();
    // bank 2, row 3, col 4, bit 1
    let addr = (2 << 10) | (3 << 6) | (4 << 2) | 1;
    let r = AddressRange::new(addr, 0b11).with_transient(true);
    assert_eq!(
        r.display(&geom).to_string(),
        "TSV 0 trans 1 addr (0,2,3,4,1) mask 0x(0,0,0,0,3)"
    );
}

/// Tests geometry validation and derived widths.
#[test]
fn test_geometry() {
    let geom = dimm_geometry();
    assert_eq!(geom.log_bits(), 2);
    assert_eq!(geom.log_cols(), 10);
    assert_eq!(geom.log_rows(), 15);
    assert_eq!(geom.bank_shift(), 27);
    assert_eq!(geom.address_bits(), 30);
    assert_eq!(geom.row_span(), 4096);

    assert!(Geometry::new(4, 1, 8, 1000, 1024).is_err());
    assert!(Geometry::new(0, 1, 8, 1024, 1024).is_err());
    assert!(Geometry::new(1 << 20, 1 << 20, 1 << 20, 1 << 20, 1 << 20).is_err());
}

/// Tests fault class lookup and labels.
#[test]
fn test_fault_class_table() {
    assert_eq!(FaultClass::ALL.len(), FaultClass::COUNT);
    for (i, class) in FaultClass::ALL.iter().enumerate() {
        assert_eq!(class.index(), i);
        assert_eq!(FaultClass::from_index(i), Some(*class));
    }
    assert_eq!(FaultClass::from_index(FaultClass::COUNT), None);
    assert_eq!(FaultClass::OneBit.label(), "1BIT");
    assert_eq!(FaultClass::MultiRank.label(), "NRANK");
}
