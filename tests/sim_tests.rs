//! Integration tests for the trial engines, the failure histogram and the
//! CSV report.

use faultsim::common::Seeder;
use faultsim::config::Config;
use faultsim::domain::build_module;
use faultsim::fault::AddressRange;
use faultsim::repair::RepairOutcome;
use faultsim::sim::event::{EventEngine, EventQueue};
use faultsim::sim::interval::IntervalEngine;
use faultsim::sim::*;
use faultsim::stats::*;

const BASE: &str = r#"
[Sim]
sim_mode = 1
interval_s = 86400
scrub_s = 86400
max_s = 31449600
n_sims = 5
continue_running = false
verbose = 0
output_bucket_s = 2419200
seed = 7

[Org]
organization = 0
chips_per_rank = 9
chip_bus_bits = 8
ranks = 1
banks = 8
rows = 32768
cols = 1024

[Fault]
faultmode = 1
fit_factor = 1.0
enable_transient = true
enable_permanent = true

[ECC]
repairmode = 3
"#;

fn simulate(text: &str) -> Simulation {
    let config = Config::from_toml_str(text).unwrap();
    let mut seeder = Seeder::new(config.sim.seed);
    let module = build_module(&config, &mut seeder).unwrap();
    let mut sim = Simulation::from_config(&config);
    sim.add_domain(module);
    sim.init();
    sim.run().unwrap();
    sim
}

fn csv(histogram: &FailureHistogram) -> String {
    let mut out = Vec::new();
    histogram.write_csv(&mut out).unwrap();
    String::from_utf8(out).unwrap()
}

/// Tests that a run with every fault class disabled reports nothing.
#[test]
fn test_end_to_end_no_faults() {
    let text = BASE
        .replace("enable_transient = true", "enable_transient = false")
        .replace("enable_permanent = true", "enable_permanent = false");
    let sim = simulate(&text);

    let h = sim.histogram();
    assert_eq!(h.len(), 13);
    assert_eq!(h.total_faults(), 0);
    assert_eq!(h.total_uncorrectable(), 0);
    assert_eq!(h.total_undetectable(), 0);
    assert_eq!(sim.summary().trials, 5);
    assert_eq!(sim.summary().clean, 5);

    let report = csv(h);
    let mut lines = report.lines();
    assert_eq!(lines.next(), Some(CSV_HEADER));
    let rows: Vec<&str> = lines.collect();
    assert_eq!(rows.len(), 13);
    for row in rows {
        let fields: Vec<&str> = row.split(',').collect();
        assert_eq!(fields.len(), 13);
        for field in &fields[1..] {
            assert!(*field == "0" || *field == "0.000000", "row {}", row);
        }
    }
}

/// Tests the same run on the event engine.
#[test]
fn test_end_to_end_no_faults_event() {
    let text = BASE
        .replace("sim_mode = 1", "sim_mode = 2")
        .replace("enable_transient = true", "enable_transient = false")
        .replace("enable_permanent = true", "enable_permanent = false");
    let sim = simulate(&text);
    assert_eq!(sim.histogram().total_faults(), 0);
    assert_eq!(sim.summary().clean, 5);
}

/// Tests that whole-device faults halt every trial on its first tick.
#[test]
fn test_interval_forced_failure_halts() {
    let text = BASE.replace("verbose = 0", "verbose = 0\ntest_mode = 7");
    let sim = simulate(&text);
    let h = sim.histogram();
    assert_eq!(h.faults[0], 5);
    assert_eq!(h.total_faults(), 5);
    assert_eq!(h.uncorrectable[0], 5);
    assert_eq!(sim.summary().failed, 5);

    let stats = sim.domains()[0].stats();
    assert_eq!(stats.n_simulations, 5);
    assert_eq!(stats.n_failures_uncorrected, 5);
}

/// Tests that a continuing run records a failure on every tick.
#[test]
fn test_interval_forced_failure_continues() {
    let text = BASE
        .replace("verbose = 0", "verbose = 0\ntest_mode = 7")
        .replace("continue_running = false", "continue_running = true")
        .replace("n_sims = 5", "n_sims = 2")
        .replace("max_s = 31449600", "max_s = 4838400");
    let sim = simulate(&text);
    let ticks = 4_838_400 / 86_400;
    assert_eq!(sim.histogram().len(), 2);
    assert_eq!(sim.histogram().total_faults(), 2 * ticks);
    // 28 daily ticks per four-week bucket.
    assert_eq!(sim.histogram().faults[0], 2 * 28);
}

/// Tests the event engine with a rank that has no ECC.
#[test]
fn test_event_engine_unprotected() {
    let text = BASE
        .replace("sim_mode = 1", "sim_mode = 2")
        .replace("faultmode = 1", "faultmode = 0")
        .replace("fit_factor = 1.0", "fit_factor = 1000000.0")
        .replace("repairmode = 3", "repairmode = 0");
    let sim = simulate(&text);
    assert_eq!(sim.histogram().total_faults(), 5);
    assert_eq!(sim.histogram().total_uncorrectable(), 5);
    assert_eq!(sim.summary().failed, 5);
}

/// Tests that a continuing event run counts every fault as a failure.
#[test]
fn test_event_engine_continues() {
    let text = BASE
        .replace("sim_mode = 1", "sim_mode = 2")
        .replace("faultmode = 1", "faultmode = 0")
        .replace("fit_factor = 1.0", "fit_factor = 100000.0")
        .replace("repairmode = 3", "repairmode = 0")
        .replace("continue_running = false", "continue_running = true");
    let sim = simulate(&text);
    let h = sim.histogram();
    assert!(h.total_faults() > 5);
    assert_eq!(h.total_faults(), h.total_uncorrectable());
    assert_eq!(h.total_faults(), h.total_undetectable());
}

/// Tests that the interval engine scrubs every `scrub_s / interval_s`
/// ticks, starting with the first.
#[test]
fn test_interval_scrub_schedule() {
    let text = BASE
        .replace("verbose = 0", "verbose = 0\ntest_mode = 1")
        .replace("continue_running = false", "continue_running = true")
        .replace("scrub_s = 86400", "scrub_s = 259200")
        .replace("max_s = 31449600", "max_s = 691200")
        .replace("output_bucket_s = 2419200", "output_bucket_s = 86400")
        .replace("chips_per_rank = 9", "chips_per_rank = 1")
        .replace("repairmode = 3", "repairmode = 0");
    let config = Config::from_toml_str(&text).unwrap();
    let settings = SimSettings::from_config(&config);
    let mut module = build_module(&config, &mut Seeder::fixed(3)).unwrap();
    module.init(settings.interval_s, settings.fit_scale);
    let mut histogram = FailureHistogram::new(settings.horizon_s, settings.bucket_s, 1);

    let mut engine = IntervalEngine::new();
    let report = engine
        .run_trial(std::slice::from_mut(&mut module), &settings, &mut histogram)
        .unwrap();
    assert_eq!(report.end, TrialEnd::Completed);
    assert_eq!(report.failures, 8);
    assert_eq!(engine.ticks(), 8);
    // Ticks 0, 3 and 6.
    assert_eq!(engine.scrubs(), 3);

    // Every permanent fault stays; only the transient of tick 7 was
    // injected after the last scrub.
    let devices = module.devices();
    let ranges = devices[0].ranges();
    assert_eq!(ranges.iter().filter(|r| !r.transient).count(), 8);
    assert_eq!(ranges.iter().filter(|r| r.transient).count(), 1);
}

fn transient_at(address: u64, timestamp: f64) -> AddressRange {
    let mut range = AddressRange::new(address, 0).with_transient(true);
    range.timestamp = timestamp;
    range
}

/// Tests that the event engine scrubs once when the event stream crosses
/// a scrub boundary, however many events share the new interval.
#[test]
fn test_event_scrub_once_per_boundary() {
    let text = BASE
        .replace("sim_mode = 1", "sim_mode = 2")
        .replace("continue_running = false", "continue_running = true")
        .replace("enable_transient = true", "enable_transient = false")
        .replace("enable_permanent = true", "enable_permanent = false");
    let config = Config::from_toml_str(&text).unwrap();
    let settings = SimSettings::from_config(&config);
    let mut module = build_module(&config, &mut Seeder::fixed(3)).unwrap();
    let mut histogram = FailureHistogram::new(settings.horizon_s, settings.bucket_s, 1);

    let mut engine = EventEngine::new();
    let queue = engine.queue_mut();
    queue.push(0, 0, transient_at(0x100, 1_000.0));
    let mut permanent = AddressRange::new(0x1000, 0);
    permanent.timestamp = 1_500.0;
    queue.push(0, 1, permanent);
    queue.push(0, 0, transient_at(0x200, 2_000.0));
    queue.push(0, 0, transient_at(0x300, 90_000.0));
    queue.push(0, 0, transient_at(0x400, 100_000.0));
    queue.push(0, 0, transient_at(0x500, 110_000.0));

    let report = engine
        .replay(std::slice::from_mut(&mut module), &settings, &mut histogram)
        .unwrap();
    assert_eq!(report, TrialReport::completed(0));
    assert_eq!(engine.events(), 6);
    assert_eq!(engine.scrubs(), 1);

    // The scrub at 90000 s cleared the first day's transients and its own
    // event; the two later events in the same interval survive.
    let devices = module.devices();
    let left: Vec<u64> = devices[0].ranges().iter().map(|r| r.address).collect();
    assert_eq!(left, vec![0x400, 0x500]);
    assert_eq!(devices[1].ranges().len(), 1);
    assert_eq!(histogram.total_faults(), 0);
}

/// Tests that the event queue pops in time order with stable ties.
#[test]
fn test_event_queue_order() {
    let mut queue = EventQueue::new();
    for (domain, t) in [5.0, 1.0, 3.0, 1.0, 0.5].into_iter().enumerate() {
        let mut range = AddressRange::new(0, 0);
        range.timestamp = t;
        queue.push(domain, 0, range);
    }
    assert_eq!(queue.len(), 5);
    let order: Vec<usize> = std::iter::from_fn(|| queue.pop()).map(|e| e.domain).collect();
    assert_eq!(order, vec![4, 1, 3, 2, 0]);
    assert!(queue.is_empty());
}

/// Tests histogram bucketing and clamping at the horizon.
#[test]
fn test_histogram_buckets() {
    let mut h = FailureHistogram::new(100, 10, 4);
    assert_eq!(h.len(), 10);
    assert_eq!(h.bucket_s(), 10);
    assert_eq!(h.n_trials(), 4);
    assert_eq!(h.bucket_of(0.0), 0);
    assert_eq!(h.bucket_of(19.9), 1);
    assert_eq!(h.bucket_of(100.0), 9);
    assert_eq!(h.bucket_of(1e9), 9);

    h.record(100.0, RepairOutcome::new(0, 1));
    h.record(55.0, RepairOutcome::new(2, 0));
    h.record(55.0, RepairOutcome::default());
    assert_eq!(h.faults[9], 1);
    assert_eq!(h.uncorrectable[9], 1);
    assert_eq!(h.faults[5], 1);
    assert_eq!(h.undetectable[5], 1);
    assert_eq!(h.uncorrectable[5], 0);
    assert_eq!(h.total_faults(), 2);

    h.reset();
    assert_eq!(h.total_faults(), 0);
}

/// Tests report formatting of counts, probabilities and cumulative sums.
#[test]
fn test_csv_rows() {
    let week = 604_800;
    let mut h = FailureHistogram::new(3 * week, week, 4);
    h.record(10.0, RepairOutcome::new(0, 1));
    h.record(2.0 * week as f64 + 1.0, RepairOutcome::new(1, 1));

    let report = csv(&h);
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], CSV_HEADER);
    assert_eq!(
        lines[1],
        "0,1,1,0.250000,0.250000,1,1,0.250000,0.250000,0,0,0.000000,0.000000"
    );
    assert_eq!(
        lines[2],
        "1,0,1,0.000000,0.250000,0,1,0.000000,0.250000,0,0,0.000000,0.000000"
    );
    assert_eq!(
        lines[3],
        "2,1,2,0.250000,0.500000,1,2,0.250000,0.500000,1,1,0.250000,0.250000"
    );
}

/// Tests that the report lands on disk.
#[test]
fn test_write_report_file() {
    let h = FailureHistogram::new(1000, 100, 1);
    let path = std::env::temp_dir().join(format!("faultsim_report_{}.csv", std::process::id()));
    h.write_to_file(&path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with(CSV_HEADER));
    assert_eq!(text.lines().count(), 11);
    std::fs::remove_file(&path).ok();
}

/// Tests per-trial classification symbols.
#[test]
fn test_trial_class() {
    assert_eq!(TrialClass::classify(true, 0), TrialClass::Failed);
    assert_eq!(TrialClass::classify(false, 3), TrialClass::Corrected);
    assert_eq!(TrialClass::classify(false, 0), TrialClass::Clean);
    assert_eq!(TrialClass::Failed.symbol(), 'F');
    assert_eq!(TrialClass::Corrected.symbol(), 'C');
    assert_eq!(TrialClass::Clean.symbol(), '.');
}

/// Tests the trial report helpers.
#[test]
fn test_trial_report() {
    assert!(TrialReport::halted().failed());
    assert_eq!(TrialReport::halted().end, TrialEnd::Halted);
    assert!(!TrialReport::completed(0).failed());
    assert!(TrialReport::completed(2).failed());
}

/// Tests that settings mirror the configuration.
#[test]
fn test_sim_settings() {
    let config = Config::from_toml_str(BASE).unwrap();
    let s = SimSettings::from_config(&config);
    assert_eq!(s.interval_s, 86_400);
    assert_eq!(s.horizon_s, 31_449_600);
    assert_eq!(s.bucket_s, 2_419_200);
    assert!(!s.continue_running);
    assert!(!s.repair_context().continue_running);
}
