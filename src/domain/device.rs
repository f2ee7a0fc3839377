//! DRAM Device.
//!
//! A `MemoryDevice` is one chip: a geometry, a FIT table and the list of
//! fault ranges the chip has suffered during the current trial. Devices
//! inject their own random faults on every interval tick, sample their
//! whole fault timeline up front for the event engine, and pick up TSV
//! failures published by their stack.

use rand::rngs::StdRng;
use rand::Rng;
use tracing::trace;

use super::tsv::{TsvArray, TsvState};
use super::InjectionMode;
use crate::common::SECONDS_PER_HOUR;
use crate::fault::{
    fit_to_probability, mean_hours_between_faults, AddressRange, FaultClass, FitTable, Geometry,
};

const CLASSES: usize = FaultClass::COUNT;

/// One DRAM chip and the faults it currently holds.
#[derive(Debug)]
pub struct MemoryDevice {
    geometry: Geometry,
    slot: usize,
    fit: FitTable,

    p_transient: [f64; CLASSES],
    p_permanent: [f64; CLASSES],
    hours_transient: [Option<f64>; CLASSES],
    hours_permanent: [Option<f64>; CLASSES],

    /// Raw faults in the current trial.
    n_transient: u64,
    n_permanent: u64,

    // Whole-run tallies for the statistics report.
    class_transient: [u64; CLASSES],
    class_permanent: [u64; CLASSES],
    tsv_transient: u64,
    tsv_permanent: u64,

    ranges: Vec<AddressRange>,
    rng: StdRng,
}

impl MemoryDevice {
    /// Creates a fault-free device. Rates stay inactive until
    /// [`init`](Self::init) converts them.
    pub fn new(geometry: Geometry, fit: FitTable, rng: StdRng) -> Self {
        Self {
            geometry,
            slot: 0,
            fit,
            p_transient: [0.0; CLASSES],
            p_permanent: [0.0; CLASSES],
            hours_transient: [None; CLASSES],
            hours_permanent: [None; CLASSES],
            n_transient: 0,
            n_permanent: 0,
            class_transient: [0; CLASSES],
            class_permanent: [0; CLASSES],
            tsv_transient: 0,
            tsv_permanent: 0,
            ranges: Vec::new(),
            rng,
        }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn fit(&self) -> &FitTable {
        &self.fit
    }

    /// Position of the device inside its group.
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub(crate) fn set_slot(&mut self, slot: usize) {
        self.slot = slot;
    }

    pub fn ranges(&self) -> &[AddressRange] {
        &self.ranges
    }

    pub fn ranges_mut(&mut self) -> &mut Vec<AddressRange> {
        &mut self.ranges
    }

    /// Transient faults seen in the current trial.
    pub fn fault_count_transient(&self) -> u64 {
        self.n_transient
    }

    /// Permanent faults seen in the current trial.
    pub fn fault_count_permanent(&self) -> u64 {
        self.n_permanent
    }

    /// Converts the FIT table into per-interval probabilities and mean
    /// inter-arrival times.
    pub fn init(&mut self, interval_s: u64, fit_scale: f64) {
        for class in FaultClass::ALL {
            let i = class.index();
            let t = self.fit.get(class, true);
            let p = self.fit.get(class, false);
            self.p_transient[i] = fit_to_probability(t, fit_scale, interval_s);
            self.p_permanent[i] = fit_to_probability(p, fit_scale, interval_s);
            self.hours_transient[i] = mean_hours_between_faults(t, fit_scale);
            self.hours_permanent[i] = mean_hours_between_faults(p, fit_scale);
        }
    }

    /// Occurrence probability of `class` in one interval.
    pub fn probability(&self, class: FaultClass, transient: bool) -> f64 {
        if transient {
            self.p_transient[class.index()]
        } else {
            self.p_permanent[class.index()]
        }
    }

    /// Runs one interval of fault injection. Returns true if a fault
    /// appeared.
    pub fn inject(&mut self, mode: InjectionMode) -> bool {
        let mut new_fault = false;
        for class in FaultClass::ALL {
            let (hit_transient, hit_permanent) = match mode {
                InjectionMode::Random => {
                    let u_t: f64 = self.rng.gen();
                    let u_p: f64 = self.rng.gen();
                    (
                        u_t < self.p_transient[class.index()],
                        u_p < self.p_permanent[class.index()],
                    )
                }
                InjectionMode::Forced(forced) => (forced == class, forced == class),
            };

            if hit_transient {
                self.add_fault(class, true);
                new_fault = true;
            }
            if hit_permanent {
                self.add_fault(class, false);
                new_fault = true;
            }
        }
        new_fault
    }

    fn add_fault(&mut self, class: FaultClass, transient: bool) {
        let range = self.generate(class, transient);
        trace!(
            slot = self.slot,
            class = class.label(),
            transient,
            addr = range.address,
            mask = range.wildcard_mask,
            "fault injected"
        );
        self.attach(range);
    }

    /// Draws a random range shaped like `class`, owned by this device.
    pub fn generate(&mut self, class: FaultClass, transient: bool) -> AddressRange {
        let mut range =
            AddressRange::generate(&self.geometry, class.fixed_fields(), transient, &mut self.rng);
        range.owner = self.slot;
        range.class = Some(class);
        range
    }

    /// Adds an externally produced range and counts it as a raw fault.
    pub fn attach(&mut self, range: AddressRange) {
        if range.transient {
            self.n_transient += 1;
        } else {
            self.n_permanent += 1;
        }
        if let Some(class) = range.class {
            if range.transient {
                self.class_transient[class.index()] += 1;
            } else {
                self.class_permanent[class.index()] += 1;
            }
        }
        self.ranges.push(range);
    }

    /// Samples every fault this device suffers within `horizon_s`, as
    /// time-stamped ranges not yet attached.
    ///
    /// Arrivals of each class are a Poisson process; inter-arrival gaps
    /// are `-ln(1 - u) * mean_hours * 3600` seconds.
    pub fn sample_events(&mut self, horizon_s: u64) -> Vec<AddressRange> {
        let horizon = horizon_s as f64;
        let mut events = Vec::new();

        for transient in [true, false] {
            for class in FaultClass::ALL {
                let hours = if transient {
                    self.hours_transient[class.index()]
                } else {
                    self.hours_permanent[class.index()]
                };
                let Some(hours) = hours else { continue };

                let mut now = 0.0;
                loop {
                    let u: f64 = self.rng.gen();
                    now += -(1.0 - u).ln() * hours * SECONDS_PER_HOUR;
                    if now > horizon {
                        break;
                    }
                    let mut range = self.generate(class, transient);
                    range.timestamp = now;
                    events.push(range);
                }
            }
        }
        events
    }

    /// Turns pending TSV failures of the vias this device owns into
    /// fault ranges. Returns true if any were materialized.
    ///
    /// The device in slot `s` owns data vias `[s * data, (s + 1) * data)`.
    /// Via `i` corrupts one bit position in every `data`-wide slice of a
    /// row, for every row of every bank.
    pub fn materialize_tsv(&mut self, tsv: &mut TsvArray) -> bool {
        let data = tsv.data_per_die();
        if data == 0 {
            return false;
        }
        let first = self.slot as u64 * data;
        let slices = self.geometry.row_span() / data;
        let mut new_fault = false;

        for via in first..first + data {
            let Some(TsvState::Pending { transient }) = tsv.state(via) else {
                continue;
            };

            for j in 0..slices {
                let row_bit = (via % data) + j * data;
                let mut range = AddressRange::tsv(&self.geometry, row_bit, transient);
                range.owner = self.slot;
                self.ranges.push(range);
            }
            if transient {
                self.n_transient += 1;
                self.tsv_transient += 1;
            } else {
                self.n_permanent += 1;
                self.tsv_permanent += 1;
            }
            tsv.mark_applied(via);
            new_fault = true;
        }
        new_fault
    }

    /// Removes every transient range the last repair judged correctable.
    pub fn scrub(&mut self) {
        self.ranges.retain(|range| !range.scrubbable());
    }

    /// Clears the ranges and per-trial counters.
    pub fn reset(&mut self) {
        self.ranges.clear();
        self.n_transient = 0;
        self.n_permanent = 0;
    }

    /// Clears the whole-run tallies.
    pub fn reset_stats(&mut self) {
        self.class_transient = [0; CLASSES];
        self.class_permanent = [0; CLASSES];
        self.tsv_transient = 0;
        self.tsv_permanent = 0;
    }

    /// Formats the per-class tallies as ` Transient: ... TSV n Permanent: ... TSV n`.
    pub fn class_summary(&self) -> String {
        let join = |counts: &[u64; CLASSES]| {
            counts
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        };
        format!(
            " Transient: {} TSV {} Permanent: {} TSV {}",
            join(&self.class_transient),
            self.tsv_transient,
            join(&self.class_permanent),
            self.tsv_permanent
        )
    }
}
