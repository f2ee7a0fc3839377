//! Monte Carlo simulation driver.
//!
//! A [`Simulation`] owns the top-level fault domains and runs independent
//! trials through a [`TrialEngine`]. Each trial follows
//! `reset → (inject → repair → scrub when due)* → finalize` and ends
//! either after the full horizon or, unless configured to keep running,
//! at the first failed repair.

/// Pre-sampled, time-ordered fault events.
pub mod event;

/// Fixed-tick fault injection.
pub mod interval;

use std::io::{self, Write};

use tracing::{info, warn};

use crate::common::Result;
use crate::config::{Config, SimMode};
use crate::domain::{DomainNode, InjectionMode};
use crate::repair::RepairContext;
use crate::stats::{FailureHistogram, RunSummary, TrialClass};

pub use event::EventEngine;
pub use interval::IntervalEngine;

/// Run parameters shared by both engines.
#[derive(Debug, Clone, Copy)]
pub struct SimSettings {
    pub interval_s: u64,
    pub scrub_s: u64,
    pub horizon_s: u64,
    pub n_sims: u64,
    pub bucket_s: u64,
    pub fit_scale: f64,
    pub continue_running: bool,
    pub verbose: u8,
    pub debug: bool,
    pub injection: InjectionMode,
}

impl SimSettings {
    pub fn from_config(config: &Config) -> Self {
        let sim = &config.sim;
        Self {
            interval_s: sim.interval_s,
            scrub_s: sim.scrub_s,
            horizon_s: sim.max_s,
            n_sims: sim.n_sims,
            bucket_s: sim.output_bucket_s,
            fit_scale: config.fault.fit_factor,
            continue_running: sim.continue_running,
            verbose: sim.verbose,
            debug: sim.debug,
            injection: InjectionMode::from_test_mode(sim.test_mode),
        }
    }

    pub fn repair_context(&self) -> RepairContext {
        RepairContext {
            continue_running: self.continue_running,
            debug: self.debug,
        }
    }
}

/// How a trial ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialEnd {
    /// Ran the full horizon.
    Completed,
    /// Stopped at the first failed repair.
    Halted,
}

/// Result of one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialReport {
    pub end: TrialEnd,
    /// Failed repair passes recorded during the trial.
    pub failures: u64,
}

impl TrialReport {
    pub fn completed(failures: u64) -> Self {
        Self {
            end: TrialEnd::Completed,
            failures,
        }
    }

    pub fn halted() -> Self {
        Self {
            end: TrialEnd::Halted,
            failures: 1,
        }
    }

    pub fn failed(&self) -> bool {
        self.end == TrialEnd::Halted || self.failures > 0
    }
}

/// Drives one independent trial over the domains.
pub trait TrialEngine {
    fn name(&self) -> &'static str;

    /// Runs a trial from reset to finalize, recording every failed repair
    /// in `histogram`.
    ///
    /// # Errors
    ///
    /// Propagates repair errors; simulated failures are not errors.
    fn run_trial(
        &mut self,
        domains: &mut [DomainNode],
        settings: &SimSettings,
        histogram: &mut FailureHistogram,
    ) -> Result<TrialReport>;
}

pub(crate) fn finalize_all(domains: &mut [DomainNode]) {
    for domain in domains.iter_mut() {
        domain.finalize();
    }
}

pub(crate) fn reset_all(domains: &mut [DomainNode]) {
    for domain in domains.iter_mut() {
        domain.reset();
    }
}

pub(crate) fn scrub_all(domains: &mut [DomainNode]) {
    for domain in domains.iter_mut() {
        domain.scrub();
    }
}

/// Top-level simulation: domains, engine and the run's results.
pub struct Simulation {
    settings: SimSettings,
    domains: Vec<DomainNode>,
    engine: Box<dyn TrialEngine>,
    histogram: FailureHistogram,
    summary: RunSummary,
}

impl Simulation {
    pub fn new(settings: SimSettings, engine: Box<dyn TrialEngine>) -> Self {
        Self {
            histogram: FailureHistogram::new(settings.horizon_s, settings.bucket_s, settings.n_sims),
            summary: RunSummary::default(),
            settings,
            domains: Vec::new(),
            engine,
        }
    }

    /// Creates a simulation with the engine `sim_mode` selects.
    pub fn from_config(config: &Config) -> Self {
        let settings = SimSettings::from_config(config);
        let engine: Box<dyn TrialEngine> = match config.sim.sim_mode {
            SimMode::Interval => Box::new(IntervalEngine::new()),
            SimMode::Event => {
                if config.sim.test_mode != 0 {
                    warn!("test_mode is ignored by the event-driven engine");
                }
                Box::new(EventEngine::new())
            }
        };
        Self::new(settings, engine)
    }

    pub fn settings(&self) -> &SimSettings {
        &self.settings
    }

    /// Registers a top-level domain.
    pub fn add_domain(&mut self, mut domain: DomainNode) {
        domain.set_output(self.settings.debug, self.settings.verbose);
        self.domains.push(domain);
    }

    pub fn domains(&self) -> &[DomainNode] {
        &self.domains
    }

    pub fn domains_mut(&mut self) -> &mut [DomainNode] {
        &mut self.domains
    }

    pub fn histogram(&self) -> &FailureHistogram {
        &self.histogram
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// One-time rate conversion for the configured tick.
    pub fn init(&mut self) {
        for domain in &mut self.domains {
            domain.init(self.settings.interval_s, self.settings.fit_scale);
        }
    }

    /// Raw faults of the current trial across all domains.
    pub fn fault_count(&self) -> u64 {
        self.domains.iter().map(|d| d.fault_count()).sum()
    }

    /// Runs every trial and accumulates the failure histogram.
    ///
    /// # Errors
    ///
    /// Stops at the first repair error.
    pub fn run(&mut self) -> Result<()> {
        let s = self.settings;
        self.histogram = FailureHistogram::new(s.horizon_s, s.bucket_s, s.n_sims);
        self.summary = RunSummary::default();

        info!(
            engine = self.engine.name(),
            trials = s.n_sims,
            horizon_s = s.horizon_s,
            "simulation starts"
        );
        if s.verbose > 0 {
            println!("# ===================================================================");
            println!("# SIMULATION STARTS");
            println!("# ===================================================================\n");
        }

        for _ in 0..s.n_sims {
            let report = self
                .engine
                .run_trial(&mut self.domains, &s, &mut self.histogram)?;
            let class = TrialClass::classify(report.failed(), self.fault_count());
            self.summary.record(class);
            if s.verbose > 0 {
                print!("{}", class.symbol());
                io::stdout().flush().ok();
            }
        }

        if s.verbose > 0 {
            println!("\n\n# ===================================================================");
            println!("# SIMULATION ENDS");
            println!("# ===================================================================");
        }
        info!(
            failed = self.summary.failed,
            corrected = self.summary.corrected,
            clean = self.summary.clean,
            "simulation ends"
        );
        Ok(())
    }

    /// Prints the per-domain statistics and the run summary.
    pub fn print_stats(&self) {
        println!();
        for domain in &self.domains {
            domain.print_stats(self.settings.horizon_s);
        }
        println!();
        self.summary.print();
    }
}
