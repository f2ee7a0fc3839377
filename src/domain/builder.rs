//! Topology Builder.
//!
//! Wires a DIMM rank or a 3D stack together from the configuration: one
//! group node named `MODULE0`, its devices `MODULE0.DRAM<i>`, and the ECC
//! scheme the repair mode selects.

use tracing::debug;

use super::device::MemoryDevice;
use super::node::DomainNode;
use super::tsv::{CubeGroup, TsvLayout};
use crate::common::{FaultSimError, Result, Seeder};
use crate::config::{Config, CubeModel, FaultModel, Organization, RepairMode};
use crate::fault::{FitTable, Geometry};
use crate::repair::chipkill::CHIPS_PER_SYMBOL;
use crate::repair::{BchCubeRepair, BchRepair, ChipKillCubeRepair, ChipKillRepair, CubeRaidRepair};

const MODULE_NAME: &str = "MODULE0";

/// Builds the memory module the configuration describes.
///
/// # Errors
///
/// Returns `InvalidConfig` for a geometry or repair mode the organization
/// cannot support, `Invariant` for a ChipKill rank with the wrong chip
/// count, and `Unimplemented` for ChipKill on a vertical-channel stack.
pub fn build_module(config: &Config, seeder: &mut Seeder) -> Result<DomainNode> {
    let geometry = config.geometry()?;
    let mut module = match config.org.organization {
        Organization::Dimm => build_dimm(config, geometry, seeder)?,
        Organization::Stack3d => build_cube(config, geometry, seeder)?,
    };
    module.set_output(config.sim.debug, config.sim.verbose);
    Ok(module)
}

/// Per-device FIT table for the configured fault model.
pub fn fit_table(config: &Config) -> FitTable {
    let table = match config.fault.faultmode {
        FaultModel::UniformBit => FitTable::uniform_bit(),
        FaultModel::Jaguar => FitTable::jaguar(),
    }
    .gated(config.fault.enable_transient, config.fault.enable_permanent);

    match config.org.organization {
        Organization::Dimm => table,
        // Rank faults have no counterpart in a stack.
        Organization::Stack3d => table.without_rank_faults(),
    }
}

fn add_devices(
    group: &mut DomainNode,
    config: &Config,
    geometry: Geometry,
    seeder: &mut Seeder,
) {
    let fit = fit_table(config);
    for i in 0..config.org.chips_per_rank {
        let name = format!("{}.DRAM{}", MODULE_NAME, i);
        debug!(
            device = %name,
            ranks = geometry.ranks,
            banks = geometry.banks,
            rows = geometry.rows,
            cols = geometry.cols,
            bitwidth = geometry.bit_width,
            gbits = geometry.gbits(),
            "device"
        );
        let device = MemoryDevice::new(geometry, fit, seeder.next_rng());
        group.add_child(DomainNode::device(name, device));
    }
}

fn build_dimm(config: &Config, geometry: Geometry, seeder: &mut Seeder) -> Result<DomainNode> {
    let mut dimm = DomainNode::dimm(MODULE_NAME);
    add_devices(&mut dimm, config, geometry, seeder);

    let chips = config.org.chips_per_rank as usize;
    let chipkill = |name: &str, n_correct: u64, n_detect: u64| -> Result<ChipKillRepair> {
        let expected = n_correct as usize * CHIPS_PER_SYMBOL;
        if chips != expected {
            return Err(FaultSimError::Invariant(format!(
                "ChipKill {} needs {} chips per rank, configuration has {}",
                name, expected, chips
            )));
        }
        Ok(ChipKillRepair::new(name, n_correct, n_detect))
    };

    match config.ecc.repairmode {
        RepairMode::None => {}
        RepairMode::ChipKillWeak => dimm.add_repair(Box::new(chipkill("CK1", 1, 2)?)),
        RepairMode::ChipKillStrong => dimm.add_repair(Box::new(chipkill("CK2", 2, 4)?)),
        RepairMode::Secded => dimm.add_repair(Box::new(BchRepair::new("SECDED", 1, 2)?)),
        RepairMode::Ec3Ed4 => dimm.add_repair(Box::new(BchRepair::new("3EC4ED", 3, 4)?)),
        RepairMode::Ec6Ed7 => dimm.add_repair(Box::new(BchRepair::new("6EC7ED", 6, 7)?)),
    }
    Ok(dimm)
}

fn build_cube(config: &Config, geometry: Geometry, seeder: &mut Seeder) -> Result<DomainNode> {
    let org = &config.org;
    let layout = TsvLayout {
        model: org.cube_model,
        chips: org.chips_per_rank,
        banks: org.banks,
        burst_bits: org.data_block_bits,
        ecc_tsv: org.cube_ecc_tsv,
        redundant_tsv: org.cube_redun_tsv,
        addr_dec_depth: org.cube_addr_dec_depth,
    };
    debug!(
        model = ?layout.model,
        enable_tsv = config.fault.enable_tsv,
        chips = layout.chips,
        banks = layout.banks,
        burst_bits = layout.burst_bits,
        data_tsv = layout.data_tsv(),
        total_tsv = layout.total_tsv(),
        addr_dec_depth = layout.addr_dec_depth,
        "stack"
    );

    let group = CubeGroup::new(
        layout,
        config.fault.enable_tsv,
        config.fault.tsv_fit,
        seeder.next_rng(),
    );
    let mut cube = DomainNode::cube(MODULE_NAME, group);
    add_devices(&mut cube, config, geometry, seeder);

    let block = org.data_block_bits;
    match config.ecc.repairmode {
        RepairMode::None => {}
        RepairMode::ChipKillWeak => {
            if org.cube_model == CubeModel::Vertical {
                return Err(FaultSimError::Unimplemented(
                    "ChipKill repair for vertical-channel stacks",
                ));
            }
            cube.add_repair(Box::new(ChipKillCubeRepair::new("CK1", 1, 2, org.cube_model)))
        }
        RepairMode::ChipKillStrong => {
            cube.add_repair(Box::new(CubeRaidRepair::new("RAID", 1, 2, block)?))
        }
        RepairMode::Secded => {
            cube.add_repair(Box::new(BchCubeRepair::new("SECDED", 1, 2, block)?))
        }
        RepairMode::Ec3Ed4 => {
            cube.add_repair(Box::new(BchCubeRepair::new("3EC4ED", 3, 4, block)?))
        }
        RepairMode::Ec6Ed7 => {
            cube.add_repair(Box::new(BchCubeRepair::new("6EC7ED", 6, 7, block)?))
        }
    }
    Ok(cube)
}
