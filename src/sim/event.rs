//! Event-Driven Engine.
//!
//! Samples every device's fault arrivals for the whole horizon up front,
//! then replays them in time order: attach, repair the owning domain,
//! and scrub whenever the event stream crosses a scrub boundary.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::trace;

use super::{finalize_all, reset_all, scrub_all, SimSettings, TrialEngine, TrialReport};
use crate::common::{FaultSimError, Result};
use crate::domain::DomainNode;
use crate::fault::AddressRange;
use crate::stats::FailureHistogram;

/// A sampled fault waiting to be attached.
#[derive(Debug, Clone)]
pub struct FaultEvent {
    pub timestamp: f64,
    /// Insertion order; breaks timestamp ties.
    pub seq: u64,
    pub domain: usize,
    /// Position of the owning device in its domain's depth-first order.
    pub device: usize,
    pub range: AddressRange,
}

// Reversed so the max-heap pops the earliest event first.
impl Ord for FaultEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .timestamp
            .total_cmp(&self.timestamp)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for FaultEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for FaultEvent {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FaultEvent {}

/// Time-ordered queue of sampled faults.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<FaultEvent>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, domain: usize, device: usize, range: AddressRange) {
        let event = FaultEvent {
            timestamp: range.timestamp,
            seq: self.next_seq,
            domain,
            device,
            range,
        };
        self.next_seq += 1;
        self.heap.push(event);
    }

    pub fn pop(&mut self) -> Option<FaultEvent> {
        self.heap.pop()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.next_seq = 0;
    }

    /// Samples every device of every domain over `horizon_s`.
    pub fn sample(&mut self, domains: &mut [DomainNode], horizon_s: u64) {
        for (d, domain) in domains.iter_mut().enumerate() {
            for (ordinal, device) in domain.devices_mut().into_iter().enumerate() {
                for range in device.sample_events(horizon_s) {
                    self.push(d, ordinal, range);
                }
            }
        }
    }
}

/// Pre-sampled trial engine.
#[derive(Debug, Default)]
pub struct EventEngine {
    queue: EventQueue,
    events: u64,
    scrubs: u64,
}

impl EventEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events replayed across all trials so far.
    pub fn events(&self) -> u64 {
        self.events
    }

    /// Scrub passes across all trials so far.
    pub fn scrubs(&self) -> u64 {
        self.scrubs
    }

    /// Pending events of the current trial.
    pub fn queue_mut(&mut self) -> &mut EventQueue {
        &mut self.queue
    }

    /// Drains the queue in time order: attach, repair, record and scrub
    /// once per scrub interval crossed. Finalizes the domains at the end.
    ///
    /// # Errors
    ///
    /// Returns `Invariant` for an event naming a missing domain or device,
    /// and propagates repair errors.
    pub fn replay(
        &mut self,
        domains: &mut [DomainNode],
        settings: &SimSettings,
        histogram: &mut FailureHistogram,
    ) -> Result<TrialReport> {
        let ctx = settings.repair_context();
        let scrub_s = settings.scrub_s as f64;
        let mut scrub_epoch = 0u64;
        let mut failures = 0u64;

        while let Some(event) = self.queue.pop() {
            self.events += 1;
            let now = event.timestamp;
            let domain = domains.get_mut(event.domain).ok_or_else(|| {
                FaultSimError::Invariant(format!("event for unknown domain {}", event.domain))
            })?;
            let device = domain.device_mut(event.device).ok_or_else(|| {
                FaultSimError::Invariant(format!(
                    "event for unknown device {} of domain {}",
                    event.device, event.domain
                ))
            })?;
            device.attach(event.range);

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
                trace!(time_s = now, ?outcome, "repair failed");
                histogram.record(now, outcome);
                if !settings.continue_running {
                    self.queue.clear();
                    finalize_all(domains);
                    return Ok(TrialReport::halted());
                }
                failures += 1;
            }

            let epoch = (now / scrub_s) as u64;
            if epoch != scrub_epoch {
                self.scrubs += 1;
                scrub_all(domains);
            }
            scrub_epoch = epoch;
        }

        finalize_all(domains);
        Ok(TrialReport::completed(failures))
    }
}

impl TrialEngine for EventEngine {
    fn name(&self) -> &'static str {
        "event"
    }

    fn run_trial(
        &mut self,
        domains: &mut [DomainNode],
        settings: &SimSettings,
        histogram: &mut FailureHistogram,
    ) -> Result<TrialReport> {
        reset_all(domains);
        self.queue.clear();
        self.queue.sample(domains, settings.horizon_s);
        trace!(events = self.queue.len(), "sampled trial");
        self.replay(domains, settings, histogram)
    }
}
