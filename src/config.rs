//! Simulator Configuration.
//!
//! The configuration is a flat TOML document with four sections, `[Sim]`,
//! `[Org]`, `[Fault]` and `[ECC]`, whose keys mirror the classic FaultSim
//! INI files. Numeric selectors are decoded into enums at load time, and
//! boolean flags accept either `true`/`false` or `1`/`0`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use crate::common::{FaultSimError, Result};
use crate::fault::Geometry;

const DEFAULT_CUBE_MODEL: i64 = 1;
const DEFAULT_DATA_BLOCK_BITS: u64 = 512;

/// Complete simulator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "Sim")]
    pub sim: SimConfig,
    #[serde(rename = "Org")]
    pub org: OrgConfig,
    #[serde(rename = "Fault")]
    pub fault: FaultConfig,
    #[serde(rename = "ECC")]
    pub ecc: EccConfig,
}

/// Simulation driver settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SimConfig {
    pub sim_mode: SimMode,
    /// Fault-injection tick of the interval engine, in seconds.
    pub interval_s: u64,
    /// Scrub period, in seconds. Must be a multiple of `interval_s`.
    pub scrub_s: u64,
    /// Simulated lifetime of one trial, in seconds.
    pub max_s: u64,
    /// Number of independent trials.
    pub n_sims: u64,
    #[serde(deserialize_with = "flag")]
    pub continue_running: bool,
    #[serde(default)]
    pub verbose: u8,
    #[serde(default, deserialize_with = "flag")]
    pub debug: bool,
    /// Width of one report histogram bucket, in seconds.
    pub output_bucket_s: u64,
    /// 0 for random injection, `k` to force fault class `k - 1` every tick.
    #[serde(default)]
    pub test_mode: u32,
    /// Base seed for reproducible runs; wall-clock seeded when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Physical memory organization.
#[derive(Debug, Clone, Deserialize)]
pub struct OrgConfig {
    pub organization: Organization,
    pub chips_per_rank: u64,
    /// Bus width of one chip in bits.
    pub chip_bus_bits: u64,
    pub ranks: u64,
    pub banks: u64,
    pub rows: u64,
    pub cols: u64,

    #[serde(default = "default_cube_model")]
    pub cube_model: CubeModel,

    #[serde(default)]
    pub cube_addr_dec_depth: u64,

    #[serde(default)]
    pub cube_ecc_tsv: u64,

    #[serde(default)]
    pub cube_redun_tsv: u64,

    /// Bits per transaction; ECC/RAID block size on stacks.
    #[serde(default = "default_data_block_bits")]
    pub data_block_bits: u64,
}

/// Fault model settings.
#[derive(Debug, Clone, Deserialize)]
pub struct FaultConfig {
    pub faultmode: FaultModel,
    /// Multiplier applied to every FIT rate.
    pub fit_factor: f64,
    #[serde(default)]
    pub tsv_fit: f64,
    #[serde(default, deserialize_with = "flag")]
    pub enable_tsv: bool,
    #[serde(deserialize_with = "flag")]
    pub enable_transient: bool,
    #[serde(deserialize_with = "flag")]
    pub enable_permanent: bool,
}

/// Error correction settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EccConfig {
    pub repairmode: RepairMode,
}

/// Which simulation engine drives the trials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "i64")]
pub enum SimMode {
    /// Fixed-tick Monte Carlo.
    Interval,
    /// Pre-generated, time-ordered fault events.
    Event,
}

/// Memory topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "i64")]
pub enum Organization {
    Dimm,
    Stack3d,
}

/// Channel layout of a 3D stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "i64")]
pub enum CubeModel {
    /// One channel per die.
    Horizontal,
    /// Channels span the dies of a vault.
    Vertical,
}

/// Source of per-class FIT rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "i64")]
pub enum FaultModel {
    UniformBit,
    Jaguar,
}

/// ECC scheme selector.
///
/// On a 3D stack, `ChipKillStrong` selects the RAID-like parity scheme
/// instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "i64")]
pub enum RepairMode {
    None,
    ChipKillWeak,
    ChipKillStrong,
    Secded,
    Ec3Ed4,
    Ec6Ed7,
}

impl TryFrom<i64> for SimMode {
    type Error = String;

    fn try_from(value: i64) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(SimMode::Interval),
            2 => Ok(SimMode::Event),
            _ => Err(format!(
                "invalid sim_mode {} (must be 1 (interval-based) or 2 (event-driven))",
                value
            )),
        }
    }
}

impl TryFrom<i64> for Organization {
    type Error = String;

    fn try_from(value: i64) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Organization::Dimm),
            1 => Ok(Organization::Stack3d),
            _ => Err(format!(
                "invalid organization {} (must be 0 (DIMM) or 1 (3D stack))",
                value
            )),
        }
    }
}

impl TryFrom<i64> for CubeModel {
    type Error = String;

    fn try_from(value: i64) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(CubeModel::Horizontal),
            2 => Ok(CubeModel::Vertical),
            _ => Err(format!(
                "invalid cube_model {} (must be 1 (horizontal) or 2 (vertical))",
                value
            )),
        }
    }
}

impl TryFrom<i64> for FaultModel {
    type Error = String;

    fn try_from(value: i64) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(FaultModel::UniformBit),
            1 => Ok(FaultModel::Jaguar),
            _ => Err(format!(
                "invalid faultmode {} (must be 0 (uniform bit) or 1 (Jaguar))",
                value
            )),
        }
    }
}

impl TryFrom<i64> for RepairMode {
    type Error = String;

    fn try_from(value: i64) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(RepairMode::None),
            1 => Ok(RepairMode::ChipKillWeak),
            2 => Ok(RepairMode::ChipKillStrong),
            3 => Ok(RepairMode::Secded),
            4 => Ok(RepairMode::Ec3Ed4),
            5 => Ok(RepairMode::Ec6Ed7),
            _ => Err(format!("invalid repairmode {} (must be 0..=5)", value)),
        }
    }
}

impl Config {
    /// Reads, parses and validates a configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Parses and validates configuration text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Geometry shared by every device of the module.
    pub fn geometry(&self) -> Result<Geometry> {
        Geometry::new(
            self.org.chip_bus_bits,
            self.org.ranks,
            self.org.banks,
            self.org.rows,
            self.org.cols,
        )
    }

    /// Data TSVs per die in a 3D stack (half the burst, DDR).
    pub fn data_tsv(&self) -> u64 {
        self.org.data_block_bits / 2
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        let sim = &self.sim;
        let invalid = |msg: String| Err(FaultSimError::InvalidConfig(msg));

        if sim.interval_s == 0 {
            return invalid("interval_s must be positive".into());
        }
        if sim.scrub_s == 0 {
            return invalid("scrub_s must be positive".into());
        }
        if sim.scrub_s % sim.interval_s != 0 {
            return invalid(format!(
                "scrub interval ({} s) must be a multiple of the simulation time step ({} s)",
                sim.scrub_s, sim.interval_s
            ));
        }
        if sim.n_sims == 0 {
            return invalid("n_sims must be positive".into());
        }
        if sim.output_bucket_s == 0 {
            return invalid("output_bucket_s must be positive".into());
        }
        if sim.max_s < sim.output_bucket_s {
            return invalid(format!(
                "max_s ({} s) must cover at least one output bucket ({} s)",
                sim.max_s, sim.output_bucket_s
            ));
        }
        if sim.test_mode as usize > crate::fault::FaultClass::COUNT {
            return invalid(format!(
                "test_mode {} does not name a fault class",
                sim.test_mode
            ));
        }
        if self.org.chips_per_rank == 0 {
            return invalid("chips_per_rank must be positive".into());
        }
        if !(self.fault.fit_factor >= 0.0) {
            return invalid("fit_factor must be non-negative".into());
        }
        if !(self.fault.tsv_fit >= 0.0) {
            return invalid("tsv_fit must be non-negative".into());
        }

        let geometry = self.geometry()?;

        if self.org.organization == Organization::Stack3d {
            if !self.org.data_block_bits.is_power_of_two() {
                return invalid(format!(
                    "data_block_bits must be a power of two, got {}",
                    self.org.data_block_bits
                ));
            }
            if self.org.data_block_bits.trailing_zeros() >= geometry.address_bits().max(1) + 1 {
                return invalid(format!(
                    "data_block_bits {} exceeds the device address space",
                    self.org.data_block_bits
                ));
            }
            if self.fault.enable_tsv {
                let data = self.data_tsv();
                if data == 0 || data > geometry.row_span() {
                    return invalid(format!(
                        "{} data TSVs cannot cover a row of {} bits",
                        data,
                        geometry.row_span()
                    ));
                }
            }
        }
        Ok(())
    }
}

fn default_cube_model() -> CubeModel {
    CubeModel::try_from(DEFAULT_CUBE_MODEL).unwrap_or(CubeModel::Horizontal)
}

fn default_data_block_bits() -> u64 {
    DEFAULT_DATA_BLOCK_BITS
}

/// Accepts `true`/`false` or the `1`/`0` integers of classic INI files.
fn flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Int(0) => Ok(false),
        Flag::Int(1) => Ok(true),
        Flag::Int(i) => Err(serde::de::Error::custom(format!(
            "flag must be true, false, 0 or 1, got {}",
            i
        ))),
    }
}
