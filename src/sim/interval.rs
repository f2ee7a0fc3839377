//! Interval Engine.
//!
//! Advances time in fixed ticks of `interval_s`. Every tick each domain
//! draws its faults, a domain with a new fault is repaired at once, and
//! every `scrub_s / interval_s` ticks all transient faults are scrubbed.

use tracing::trace;

use super::{finalize_all, reset_all, scrub_all, SimSettings, TrialEngine, TrialReport};
use crate::common::Result;
use crate::domain::DomainNode;
use crate::stats::FailureHistogram;

/// Fixed-tick trial engine.
#[derive(Debug, Default)]
pub struct IntervalEngine {
    ticks: u64,
    scrubs: u64,
}

impl IntervalEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticks executed across all trials so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Scrub passes across all trials so far.
    pub fn scrubs(&self) -> u64 {
        self.scrubs
    }
}

impl TrialEngine for IntervalEngine {
    fn name(&self) -> &'static str {
        "interval"
    }

    fn run_trial(
        &mut self,
        domains: &mut [DomainNode],
        settings: &SimSettings,
        histogram: &mut FailureHistogram,
    ) -> Result<TrialReport> {
        reset_all(domains);

        let n_ticks = settings.horizon_s / settings.interval_s;
        let scrub_ratio = (settings.scrub_s / settings.interval_s).max(1);
        let ctx = settings.repair_context();
        let mut failures = 0u64;

        for iter in 0..n_ticks {
            self.ticks += 1;
            let now = (iter * settings.interval_s) as f64;

            for d in 0..domains.len() {
                let domain = &mut domains[d];
                if !domain.update(settings.injection, None) {
                    continue;
                }

                if settings.verbose >= 2 {
                    println!("FAULTS INSERTED: BEFORE REPAIR");
                    domain.dump_state();
                }
                let outcome = domain.repair(&ctx)?;
                if settings.verbose >= 2 {
                    println!("FAULTS INSERTED: AFTER REPAIR");
                    domain.dump_state();
                }

                if outcome.failed() {
                    trace!(tick = iter, domain = domain.name(), ?outcome, "repair failed");
                    histogram.record(now, outcome);
                    if !settings.continue_running {
                        finalize_all(domains);
                        return Ok(TrialReport::halted());
                    }
                    failures += 1;
                }
            }

            if iter % scrub_ratio == 0 {
                self.scrubs += 1;
                scrub_all(domains);
            }
        }

        finalize_all(domains);
        Ok(TrialReport::completed(failures))
    }
}
