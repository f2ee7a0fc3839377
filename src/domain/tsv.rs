//! Through-Silicon Via State.
//!
//! A 3D stack shares its vias between dies. The stack group draws via
//! failures on every tick and records them in a `TsvArray`; each die
//! later turns the failed vias it owns into fault ranges. The array is
//! trial-scoped and cleared on reset.

use rand::rngs::StdRng;
use rand::Rng;
use tracing::debug;

use crate::config::CubeModel;
use crate::fault::fit_to_probability;

/// Lifecycle of a single via within one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TsvState {
    Healthy,
    /// Failed, not yet turned into fault ranges.
    Pending { transient: bool },
    /// Failed and already materialized by its die.
    Applied,
}

/// Per-via failure state of one stack.
#[derive(Debug, Clone)]
pub struct TsvArray {
    states: Vec<TsvState>,
    data_per_die: u64,
}

impl TsvArray {
    pub fn new(total: u64, data_per_die: u64) -> Self {
        Self {
            states: vec![TsvState::Healthy; total as usize],
            data_per_die,
        }
    }

    pub fn len(&self) -> u64 {
        self.states.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Data vias owned by each die.
    pub fn data_per_die(&self) -> u64 {
        self.data_per_die
    }

    /// State of via `index`, or `None` past the end of the array.
    pub fn state(&self, index: u64) -> Option<TsvState> {
        self.states.get(index as usize).copied()
    }

    /// Fails a healthy via. Already failed vias keep their state.
    pub fn fail(&mut self, index: u64, transient: bool) -> bool {
        match self.states.get_mut(index as usize) {
            Some(state) if *state == TsvState::Healthy => {
                *state = TsvState::Pending { transient };
                true
            }
            _ => false,
        }
    }

    pub(crate) fn mark_applied(&mut self, index: u64) {
        if let Some(state) = self.states.get_mut(index as usize) {
            *state = TsvState::Applied;
        }
    }

    /// Number of vias that failed in the current trial.
    pub fn failed(&self) -> usize {
        self.states
            .iter()
            .filter(|s| **s != TsvState::Healthy)
            .count()
    }

    pub fn reset(&mut self) {
        self.states.fill(TsvState::Healthy);
    }
}

/// Via layout parameters of a stack.
#[derive(Debug, Clone, Copy)]
pub struct TsvLayout {
    pub model: CubeModel,
    pub chips: u64,
    pub banks: u64,
    /// Bits per transaction; half of them cross data vias (DDR).
    pub burst_bits: u64,
    pub ecc_tsv: u64,
    pub redundant_tsv: u64,
    pub addr_dec_depth: u64,
}

impl TsvLayout {
    /// Data vias per die.
    pub fn data_tsv(&self) -> u64 {
        self.burst_bits / 2
    }

    /// Address vias. Address-via faults are not modeled, so none are
    /// counted regardless of the decode depth.
    pub fn addr_tsv(&self) -> u64 {
        0
    }

    /// Total vias in the stack.
    ///
    /// Horizontal channels give every die its own address, ECC, spare and
    /// data vias. Vertical channels share ECC and data vias per bank.
    pub fn total_tsv(&self) -> u64 {
        match self.model {
            CubeModel::Horizontal => {
                (self.addr_tsv() + self.ecc_tsv + self.redundant_tsv + self.data_tsv()) * self.chips
            }
            CubeModel::Vertical => {
                (self.addr_tsv() + self.redundant_tsv) * self.chips
                    + (self.ecc_tsv + self.data_tsv()) * self.banks
            }
        }
    }
}

/// Stack-level state of a cube group: the via array and its failure
/// process.
#[derive(Debug)]
pub struct CubeGroup {
    layout: TsvLayout,
    enable_tsv: bool,
    tsv_fit: f64,
    p_transient: f64,
    p_permanent: f64,
    tsv: TsvArray,

    n_tsv_transient: u64,
    n_tsv_permanent: u64,

    rng: StdRng,
}

impl CubeGroup {
    pub fn new(layout: TsvLayout, enable_tsv: bool, tsv_fit: f64, rng: StdRng) -> Self {
        let tsv = TsvArray::new(layout.total_tsv(), layout.data_tsv());
        Self {
            layout,
            enable_tsv,
            tsv_fit,
            p_transient: 0.0,
            p_permanent: 0.0,
            tsv,
            n_tsv_transient: 0,
            n_tsv_permanent: 0,
            rng,
        }
    }

    pub fn model(&self) -> CubeModel {
        self.layout.model
    }

    pub fn tsv_enabled(&self) -> bool {
        self.enable_tsv
    }

    pub fn tsv(&self) -> &TsvArray {
        &self.tsv
    }

    /// Via failure events drawn so far in the run (transient, permanent).
    pub fn tsv_events(&self) -> (u64, u64) {
        (self.n_tsv_transient, self.n_tsv_permanent)
    }

    pub fn init(&mut self, interval_s: u64, fit_scale: f64) {
        self.p_transient = fit_to_probability(self.tsv_fit, fit_scale, interval_s);
        self.p_permanent = fit_to_probability(self.tsv_fit, fit_scale, interval_s);
    }

    /// Draws this tick's via failures. Returns true if a via event fired.
    ///
    /// A hit picks a uniformly random via; only a healthy via changes
    /// state.
    pub fn draw(&mut self) -> bool {
        if !self.enable_tsv || self.tsv.is_empty() {
            return false;
        }
        let mut fired = false;
        for transient in [true, false] {
            let u: f64 = self.rng.gen();
            let p = if transient {
                self.p_transient
            } else {
                self.p_permanent
            };
            if u < p {
                if transient {
                    self.n_tsv_transient += 1;
                } else {
                    self.n_tsv_permanent += 1;
                }
                let via = self.rng.gen_range(0..self.tsv.len());
                let changed = self.tsv.fail(via, transient);
                debug!(via, transient, changed, "tsv failure");
                fired = true;
            }
        }
        fired
    }

    /// Splits out the via array so devices can update it while the group
    /// itself stays borrowed.
    pub(crate) fn tsv_for_update(&mut self) -> Option<&mut TsvArray> {
        if self.enable_tsv {
            Some(&mut self.tsv)
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        self.tsv.reset();
    }

    pub fn reset_stats(&mut self) {
        self.n_tsv_transient = 0;
        self.n_tsv_permanent = 0;
    }
}
