//! Memory topology: devices, groups and stacks.
//!
//! The topology is a strict tree of [`DomainNode`]s. Leaves are DRAM
//! devices holding fault ranges; inner nodes group devices into a DIMM
//! rank or a 3D stack and carry the repair schemes that judge them.

/// Topology construction from a validated configuration.
pub mod builder;

/// Single DRAM chip: fault injection, event sampling and scrubbing.
pub mod device;

/// Composite tree node and the per-trial protocol.
pub mod node;

/// Through-silicon via state of 3D stacks.
pub mod tsv;

pub use builder::build_module;
pub use device::MemoryDevice;
pub use node::{rate_to_fit, DomainNode, DomainStats, NodeKind, TrialCounters};
pub use tsv::{CubeGroup, TsvArray, TsvLayout, TsvState};

use crate::fault::FaultClass;

/// How devices inject faults on an interval tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionMode {
    /// Draw every class against its probability.
    Random,
    /// Inject one transient and one permanent fault of this class, every
    /// tick, on every device.
    Forced(FaultClass),
}

impl InjectionMode {
    /// Decodes the `test_mode` setting: 0 is random injection, `k` forces
    /// class `k - 1`. Values past the last class fall back to random.
    pub fn from_test_mode(test_mode: u32) -> Self {
        match test_mode.checked_sub(1) {
            Some(index) => FaultClass::from_index(index as usize)
                .map(InjectionMode::Forced)
                .unwrap_or(InjectionMode::Random),
            None => InjectionMode::Random,
        }
    }
}
