//! Simulation statistics collection and reporting.
//!
//! Collects the time-bucketed failure histogram written to the output CSV
//! and the trial classification printed at the end of a run.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use crate::common::{Result, SECONDS_PER_WEEK};
use crate::repair::RepairOutcome;

/// Column header of the failure-probability report.
pub const CSV_HEADER: &str = "WEEKS,FAULT,FAULT-CUMU,P(FAULT),P(FAULT-CUMU),UNCORRECTABLE,UNCORRECTABLE-CUMU,P(UNCORRECTABLE),P(UNCORRECTABLE-CUMU),UNDETECTABLE,UNDETECTABLE-CUMU,P(UNDETECTABLE),P(UNDETECTABLE-CUMU)";

/// Failed repairs counted per output time bucket.
///
/// A repair counts in `faults` whenever it left anything behind, and in
/// `uncorrectable` / `undetectable` when the respective residual count is
/// non-zero.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureHistogram {
    bucket_s: u64,
    n_trials: u64,
    pub faults: Vec<u64>,
    pub uncorrectable: Vec<u64>,
    pub undetectable: Vec<u64>,
}

impl FailureHistogram {
    /// Creates `horizon_s / bucket_s` empty buckets (at least one).
    pub fn new(horizon_s: u64, bucket_s: u64, n_trials: u64) -> Self {
        let bucket_s = bucket_s.max(1);
        let n_buckets = (horizon_s / bucket_s).max(1) as usize;
        Self {
            bucket_s,
            n_trials,
            faults: vec![0; n_buckets],
            uncorrectable: vec![0; n_buckets],
            undetectable: vec![0; n_buckets],
        }
    }

    pub fn len(&self) -> usize {
        self.faults.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faults.is_empty()
    }

    pub fn bucket_s(&self) -> u64 {
        self.bucket_s
    }

    pub fn n_trials(&self) -> u64 {
        self.n_trials
    }

    /// Bucket holding `time_s`; times at or past the horizon land in the
    /// last bucket.
    pub fn bucket_of(&self, time_s: f64) -> usize {
        let idx = (time_s.max(0.0) / self.bucket_s as f64) as usize;
        idx.min(self.len() - 1)
    }

    /// Records a repair outcome observed at `time_s`. Clean outcomes are
    /// ignored.
    pub fn record(&mut self, time_s: f64, outcome: RepairOutcome) {
        if !outcome.failed() {
            return;
        }
        let idx = self.bucket_of(time_s);
        self.faults[idx] += 1;
        if outcome.uncorrectable > 0 {
            self.uncorrectable[idx] += 1;
        }
        if outcome.undetectable > 0 {
            self.undetectable[idx] += 1;
        }
    }

    pub fn total_faults(&self) -> u64 {
        self.faults.iter().sum()
    }

    pub fn total_uncorrectable(&self) -> u64 {
        self.uncorrectable.iter().sum()
    }

    pub fn total_undetectable(&self) -> u64 {
        self.undetectable.iter().sum()
    }

    pub fn reset(&mut self) {
        self.faults.fill(0);
        self.uncorrectable.fill(0);
        self.undetectable.fill(0);
    }

    /// Writes the report: the header, then one row per bucket with plain
    /// and cumulative counts and their probabilities over all trials.
    ///
    /// # Errors
    ///
    /// Returns any I/O error from the writer.
    pub fn write_csv<W: Write>(&self, mut out: W) -> io::Result<()> {
        let trials = self.n_trials.max(1) as f64;
        let mut columns = [
            Column::default(),
            Column::default(),
            Column::default(),
        ];

        writeln!(out, "{}", CSV_HEADER)?;
        for idx in 0..self.len() {
            let weeks = idx as u64 * self.bucket_s / SECONDS_PER_WEEK;
            write!(out, "{}", weeks)?;
            for (column, counts) in columns
                .iter_mut()
                .zip([&self.faults, &self.uncorrectable, &self.undetectable])
            {
                let count = counts[idx];
                column.cumulative += count;
                column.p_cumulative += count as f64 / trials;
                write!(
                    out,
                    ",{},{},{:.6},{:.6}",
                    count,
                    column.cumulative,
                    count as f64 / trials,
                    column.p_cumulative
                )?;
            }
            writeln!(out)?;
        }
        out.flush()
    }

    /// Writes the report to `path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be created or written.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path)?;
        self.write_csv(BufWriter::new(file))?;
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Column {
    cumulative: u64,
    p_cumulative: f64,
}

/// End state of a single trial, as shown by the progress line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialClass {
    /// At least one repair left a residual fault.
    Failed,
    /// Faults appeared but every repair succeeded.
    Corrected,
    /// No fault at all.
    Clean,
}

impl TrialClass {
    pub fn classify(failed: bool, faults: u64) -> Self {
        if failed {
            TrialClass::Failed
        } else if faults > 0 {
            TrialClass::Corrected
        } else {
            TrialClass::Clean
        }
    }

    pub fn symbol(self) -> char {
        match self {
            TrialClass::Failed => 'F',
            TrialClass::Corrected => 'C',
            TrialClass::Clean => '.',
        }
    }
}

/// Trial tallies for the end-of-run summary.
pub struct RunSummary {
    start_time: Instant,
    pub trials: u64,
    pub failed: u64,
    pub corrected: u64,
    pub clean: u64,
}

impl Default for RunSummary {
    fn default() -> Self {
        Self {
            start_time: Instant::now(),
            trials: 0,
            failed: 0,
            corrected: 0,
            clean: 0,
        }
    }
}

impl RunSummary {
    pub fn record(&mut self, class: TrialClass) {
        self.trials += 1;
        match class {
            TrialClass::Failed => self.failed += 1,
            TrialClass::Corrected => self.corrected += 1,
            TrialClass::Clean => self.clean += 1,
        }
    }

    /// Prints the run summary.
    pub fn print(&self) {
        let seconds = self.start_time.elapsed().as_secs_f64();
        let trials = self.trials.max(1) as f64;
        let rate = if seconds > 0.0 {
            self.trials as f64 / seconds
        } else {
            0.0
        };

        println!("==========================================================");
        println!("FAULTSIM RELIABILITY SUMMARY");
        println!("==========================================================");
        println!("host_seconds             {:.4} s", seconds);
        println!("sim_trials               {}", self.trials);
        println!("sim_trials_per_second    {:.2}", rate);
        println!("----------------------------------------------------------");
        println!("TRIAL OUTCOMES");
        println!(
            "  trials.failed          {} ({:.2}%)",
            self.failed,
            self.failed as f64 / trials * 100.0
        );
        println!(
            "  trials.corrected       {} ({:.2}%)",
            self.corrected,
            self.corrected as f64 / trials * 100.0
        );
        println!(
            "  trials.clean           {} ({:.2}%)",
            self.clean,
            self.clean as f64 / trials * 100.0
        );
        println!("==========================================================");
    }
}
