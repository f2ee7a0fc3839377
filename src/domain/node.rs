//! Fault Domain Tree.
//!
//! A `DomainNode` is one level of the memory topology: a single device, a
//! DIMM rank group or a 3D stack. Nodes own their children and their
//! repair schemes outright; the tree is built once and then driven
//! through the per-trial protocol `reset → (update → repair → scrub)* →
//! finalize`.

use tracing::debug;

use super::device::MemoryDevice;
use super::tsv::{CubeGroup, TsvArray};
use super::InjectionMode;
use crate::common::{FIT_DEVICE_HOURS, SECONDS_PER_HOUR};
use crate::common::Result;
use crate::repair::{RepairContext, RepairOutcome, RepairScheme};

/// What a node stands for in the topology.
#[derive(Debug)]
pub enum NodeKind {
    /// A single DRAM chip.
    Device(MemoryDevice),
    /// A rank of chips on a DIMM.
    Dimm,
    /// A 3D stack; owns the via state shared by its dies.
    Cube(CubeGroup),
}

/// Failure flags of the current trial.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrialCounters {
    /// Repair passes that left undetectable faults.
    pub undetected: u64,
    /// Repair passes that left uncorrectable faults.
    pub uncorrected: u64,
}

/// Whole-run tallies of trial outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DomainStats {
    pub n_simulations: u64,
    /// Trials in which any raw fault occurred.
    pub n_failures: u64,
    pub n_failures_undetected: u64,
    pub n_failures_uncorrected: u64,
}

impl DomainStats {
    /// Fraction of trials counted by `count`.
    pub fn rate(&self, count: u64) -> f64 {
        if self.n_simulations == 0 {
            0.0
        } else {
            count as f64 / self.n_simulations as f64
        }
    }
}

/// Converts a per-trial failure probability over `horizon_s` into FIT.
pub fn rate_to_fit(rate: f64, horizon_s: u64) -> f64 {
    if horizon_s == 0 {
        return 0.0;
    }
    rate * SECONDS_PER_HOUR * FIT_DEVICE_HOURS / horizon_s as f64
}

#[derive(Debug)]
pub struct DomainNode {
    name: String,
    kind: NodeKind,
    children: Vec<DomainNode>,
    schemes: Vec<Box<dyn RepairScheme>>,
    trial: TrialCounters,
    stats: DomainStats,
    debug: bool,
    verbose: u8,
}

impl DomainNode {
    fn with_kind(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            children: Vec::new(),
            schemes: Vec::new(),
            trial: TrialCounters::default(),
            stats: DomainStats::default(),
            debug: false,
            verbose: 0,
        }
    }

    pub fn device(name: impl Into<String>, device: MemoryDevice) -> Self {
        Self::with_kind(name, NodeKind::Device(device))
    }

    pub fn dimm(name: impl Into<String>) -> Self {
        Self::with_kind(name, NodeKind::Dimm)
    }

    pub fn cube(name: impl Into<String>, group: CubeGroup) -> Self {
        Self::with_kind(name, NodeKind::Cube(group))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn children(&self) -> &[DomainNode] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut [DomainNode] {
        &mut self.children
    }

    pub fn schemes(&self) -> &[Box<dyn RepairScheme>] {
        &self.schemes
    }

    pub fn as_device(&self) -> Option<&MemoryDevice> {
        match &self.kind {
            NodeKind::Device(device) => Some(device),
            _ => None,
        }
    }

    pub fn as_device_mut(&mut self) -> Option<&mut MemoryDevice> {
        match &mut self.kind {
            NodeKind::Device(device) => Some(device),
            _ => None,
        }
    }

    pub fn as_cube(&self) -> Option<&CubeGroup> {
        match &self.kind {
            NodeKind::Cube(group) => Some(group),
            _ => None,
        }
    }

    pub fn trial(&self) -> TrialCounters {
        self.trial
    }

    pub fn stats(&self) -> DomainStats {
        self.stats
    }

    /// Appends a child. A device child takes the next slot, which decides
    /// the vias it owns in a stack.
    pub fn add_child(&mut self, mut child: DomainNode) {
        let slot = self.children.len();
        if let Some(device) = child.as_device_mut() {
            device.set_slot(slot);
        }
        self.children.push(child);
    }

    pub fn add_repair(&mut self, scheme: Box<dyn RepairScheme>) {
        self.schemes.push(scheme);
    }

    /// Sets the state-dump switches for the whole subtree.
    pub fn set_output(&mut self, debug: bool, verbose: u8) {
        self.debug = debug;
        self.verbose = verbose;
        for child in &mut self.children {
            child.set_output(debug, verbose);
        }
    }

    /// Converts every rate in the subtree for an `interval_s` tick.
    pub fn init(&mut self, interval_s: u64, fit_scale: f64) {
        match &mut self.kind {
            NodeKind::Device(device) => device.init(interval_s, fit_scale),
            NodeKind::Cube(group) => group.init(interval_s, fit_scale),
            NodeKind::Dimm => {}
        }
        for child in &mut self.children {
            child.init(interval_s, fit_scale);
        }
    }

    /// Runs one tick of fault injection over the subtree. Returns true if
    /// any new fault appeared anywhere below this node.
    ///
    /// A stack draws its via failures before its dies update, so the dies
    /// materialize them in the same tick.
    pub fn update(&mut self, mode: InjectionMode, mut tsv: Option<&mut TsvArray>) -> bool {
        let mut new_fault = false;
        match &mut self.kind {
            NodeKind::Device(device) => {
                for child in &mut self.children {
                    new_fault |= child.update(mode, tsv.as_deref_mut());
                }
                new_fault |= device.inject(mode);
                if let Some(array) = tsv.as_deref_mut() {
                    new_fault |= device.materialize_tsv(array);
                }
            }
            NodeKind::Dimm => {
                for child in &mut self.children {
                    new_fault |= child.update(mode, tsv.as_deref_mut());
                }
            }
            NodeKind::Cube(group) => {
                new_fault |= group.draw();
                let mut own = group.tsv_for_update();
                for child in &mut self.children {
                    new_fault |= child.update(mode, own.as_deref_mut());
                }
            }
        }
        new_fault
    }

    /// Repairs the subtree and returns this node's residual outcome.
    ///
    /// Children are repaired first. The node then starts from its raw
    /// fault count and keeps the best outcome any attached scheme
    /// achieves; with no scheme every raw fault counts as both
    /// undetectable and uncorrectable.
    ///
    /// # Errors
    ///
    /// Propagates scheme errors (malformed domain, unmodeled layout).
    pub fn repair(&mut self, ctx: &RepairContext) -> Result<RepairOutcome> {
        for child in &mut self.children {
            child.repair(ctx)?;
        }

        let baseline = self.fault_count();
        let mut outcome = RepairOutcome::new(baseline, baseline);

        let Self {
            name,
            children,
            schemes,
            debug,
            ..
        } = self;
        for scheme in schemes.iter_mut() {
            let after = scheme.repair(children.as_mut_slice(), ctx)?;
            outcome = outcome.best(after);

            if *debug && baseline != 0 {
                println!(">>> REPAIR {} USING {} (state dump)", name, scheme.name());
                for child in children.iter() {
                    child.dump_state();
                }
                println!(
                    "FAULTS_BEFORE: {} FAULTS_AFTER: {}",
                    baseline, outcome.uncorrectable
                );
                println!("<<< END");
            }
        }

        if baseline != 0 {
            debug!(
                node = %self.name,
                faults = baseline,
                undetectable = outcome.undetectable,
                uncorrectable = outcome.uncorrectable,
                "repair"
            );
        }
        if outcome.undetectable > 0 {
            self.trial.undetected += 1;
        }
        if outcome.uncorrectable > 0 {
            self.trial.uncorrected += 1;
        }
        Ok(outcome)
    }

    /// Drops every scrubbable transient range in the subtree.
    pub fn scrub(&mut self) {
        if let NodeKind::Device(device) = &mut self.kind {
            device.scrub();
        }
        for child in &mut self.children {
            child.scrub();
        }
    }

    /// Starts a new trial: clears ranges, via state and per-trial
    /// counters, and counts the trial.
    pub fn reset(&mut self) {
        self.trial = TrialCounters::default();
        self.stats.n_simulations += 1;
        match &mut self.kind {
            NodeKind::Device(device) => device.reset(),
            NodeKind::Cube(group) => group.reset(),
            NodeKind::Dimm => {}
        }
        for child in &mut self.children {
            child.reset();
        }
    }

    /// Records the outcome of the finished trial.
    pub fn finalize(&mut self) {
        for child in &mut self.children {
            child.finalize();
        }
        if self.fault_count() != 0 {
            self.stats.n_failures += 1;
        }
        if self.trial.undetected != 0 {
            self.stats.n_failures_undetected += 1;
        }
        if self.trial.uncorrected != 0 {
            self.stats.n_failures_uncorrected += 1;
        }
        for scheme in &mut self.schemes {
            scheme.clear_counters();
        }
    }

    pub fn reset_stats(&mut self) {
        self.stats = DomainStats::default();
        match &mut self.kind {
            NodeKind::Device(device) => device.reset_stats(),
            NodeKind::Cube(group) => group.reset_stats(),
            NodeKind::Dimm => {}
        }
        for scheme in &mut self.schemes {
            scheme.reset_stats();
        }
        for child in &mut self.children {
            child.reset_stats();
        }
    }

    /// Transient faults of the current trial in the whole subtree.
    pub fn fault_count_transient(&self) -> u64 {
        let own = self.as_device().map_or(0, |d| d.fault_count_transient());
        own + self
            .children
            .iter()
            .map(|c| c.fault_count_transient())
            .sum::<u64>()
    }

    /// Permanent faults of the current trial in the whole subtree.
    pub fn fault_count_permanent(&self) -> u64 {
        let own = self.as_device().map_or(0, |d| d.fault_count_permanent());
        own + self
            .children
            .iter()
            .map(|c| c.fault_count_permanent())
            .sum::<u64>()
    }

    pub fn fault_count(&self) -> u64 {
        self.fault_count_transient() + self.fault_count_permanent()
    }

    /// Every device in the subtree, depth first.
    pub fn devices(&self) -> Vec<&MemoryDevice> {
        let mut out = Vec::new();
        self.collect_devices(&mut out);
        out
    }

    fn collect_devices<'a>(&'a self, out: &mut Vec<&'a MemoryDevice>) {
        if let NodeKind::Device(device) = &self.kind {
            out.push(device);
        }
        for child in &self.children {
            child.collect_devices(out);
        }
    }

    /// Every device in the subtree, depth first.
    pub fn devices_mut(&mut self) -> Vec<&mut MemoryDevice> {
        let mut out = Vec::new();
        self.collect_devices_mut(&mut out);
        out
    }

    fn collect_devices_mut<'a>(&'a mut self, out: &mut Vec<&'a mut MemoryDevice>) {
        if let NodeKind::Device(device) = &mut self.kind {
            out.push(device);
        }
        for child in &mut self.children {
            child.collect_devices_mut(out);
        }
    }

    /// The `ordinal`-th device of the subtree in [`devices_mut`](Self::devices_mut) order.
    pub fn device_mut(&mut self, ordinal: usize) -> Option<&mut MemoryDevice> {
        self.devices_mut().into_iter().nth(ordinal)
    }

    /// Prints per-domain failure statistics, children first.
    pub fn print_stats(&self, horizon_s: u64) {
        for child in &self.children {
            child.print_stats(horizon_s);
        }

        let s = &self.stats;
        let rate_raw = s.rate(s.n_failures);
        let rate_uncorr = s.rate(s.n_failures_uncorrected);
        let rate_undet = s.rate(s.n_failures_undetected);
        println!(
            "[{}] sims {} failed_sims {} rate_raw {} FIT_raw {} rate_uncorr {} FIT_uncorr {} rate_undet {} FIT_undet {}",
            self.name,
            s.n_simulations,
            s.n_failures,
            rate_raw,
            rate_to_fit(rate_raw, horizon_s),
            rate_uncorr,
            rate_to_fit(rate_uncorr, horizon_s),
            rate_undet,
            rate_to_fit(rate_undet, horizon_s)
        );

        match &self.kind {
            NodeKind::Device(device) => {
                println!("{}", device.class_summary());
                if self.verbose == 2 {
                    for range in device.ranges() {
                        println!("FR {}", range.display(device.geometry()));
                    }
                }
            }
            NodeKind::Cube(group) => {
                let (transient, permanent) = group.tsv_events();
                println!(
                    "  TSV events transient {} permanent {} vias {}",
                    transient,
                    permanent,
                    group.tsv().len()
                );
            }
            NodeKind::Dimm => {}
        }

        for scheme in &self.schemes {
            scheme.print_stats();
        }
    }

    /// Prints every range currently held in the subtree.
    pub fn dump_state(&self) {
        if let NodeKind::Device(device) = &self.kind {
            for range in device.ranges() {
                println!("{} {}", self.name, range.display(device.geometry()));
            }
        }
        for child in &self.children {
            child.dump_state();
        }
    }
}
