//! FaultSim CLI.
//!
//! The main executable for the simulator. It parses the command line,
//! loads and validates the configuration, builds the memory module,
//! runs the Monte Carlo trials and writes the failure-probability report.
//!
//! # Exit codes
//!
//! * `0`: success, or `--help` / `--version`.
//! * `1`: invalid command line.
//! * `2`: runtime failure (configuration, invariant violation, report I/O).

use clap::Parser;
use std::process;

use tracing::info;
use tracing_subscriber::EnvFilter;

extern crate faultsim;

use faultsim::common::{Result, Seeder};
use faultsim::config::{Config, Organization};
use faultsim::domain::build_module;
use faultsim::sim::Simulation;

/// Command-line arguments for the FaultSim reliability simulator.
#[derive(Parser, Debug)]
#[command(author, version, about = "FaultSim DRAM Reliability Simulator")]
struct Args {
    /// Path of the failure-probability CSV to write.
    #[arg(long)]
    outfile: String,

    /// Path of the TOML configuration.
    #[arg(long, default_value = "configs/default.toml")]
    configfile: String,
}

/// Installs the fmt subscriber. `RUST_LOG` wins; otherwise the level
/// follows the `verbose` and `debug` settings.
fn init_tracing(verbose: u8, debug: bool) {
    let fallback = if debug {
        "faultsim=trace"
    } else if verbose >= 2 {
        "faultsim=debug"
    } else if verbose == 1 {
        "faultsim=info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_config(config: &Config, configfile: &str, outfile: &str) {
    let sim = &config.sim;
    let org = &config.org;
    let fault = &config.fault;

    println!("Global Configuration");
    println!("--------------------");
    println!("Files:");
    println!("  Config:             {}", configfile);
    println!("  Output:             {}", outfile);
    println!("Simulation:");
    println!("  Mode:               {:?}", sim.sim_mode);
    println!("  Interval:           {} s", sim.interval_s);
    println!("  Scrub:              {} s", sim.scrub_s);
    println!("  Horizon:            {} s", sim.max_s);
    println!("  Trials:             {}", sim.n_sims);
    println!("  Output Bucket:      {} s", sim.output_bucket_s);
    println!("  Continue on Fail:   {}", sim.continue_running);
    println!("  Test Mode:          {}", sim.test_mode);
    match sim.seed {
        Some(seed) => println!("  Seed:               {}", seed),
        None => println!("  Seed:               (clock)"),
    }
    println!("Organization:");
    println!("  Kind:               {:?}", org.organization);
    println!("  Chips per Rank:     {}", org.chips_per_rank);
    println!("  Chip Bus Width:     {} bits", org.chip_bus_bits);
    println!(
        "  Geometry:           {} ranks, {} banks, {} rows, {} cols",
        org.ranks, org.banks, org.rows, org.cols
    );
    if org.organization == Organization::Stack3d {
        println!("  Cube Model:         {:?}", org.cube_model);
        println!("  Data Block:         {} bits", org.data_block_bits);
        println!(
            "  TSVs:               {} ({} ecc, {} redundant, addr depth {})",
            if fault.enable_tsv { "Enabled" } else { "Disabled" },
            org.cube_ecc_tsv,
            org.cube_redun_tsv,
            org.cube_addr_dec_depth
        );
    }
    println!("Faults:");
    println!("  Model:              {:?}", fault.faultmode);
    println!("  FIT Factor:         {}", fault.fit_factor);
    println!(
        "  Transient:          {}",
        if fault.enable_transient { "Enabled" } else { "Disabled" }
    );
    println!(
        "  Permanent:          {}",
        if fault.enable_permanent { "Enabled" } else { "Disabled" }
    );
    if fault.enable_tsv {
        println!("  TSV FIT:            {}", fault.tsv_fit);
    }
    println!("ECC:");
    println!("  Repair Mode:        {:?}", config.ecc.repairmode);
    println!("--------------------");
}

fn run(args: &Args) -> Result<()> {
    let config = Config::from_file(&args.configfile)?;
    init_tracing(config.sim.verbose, config.sim.debug);
    print_config(&config, &args.configfile, &args.outfile);

    let mut seeder = Seeder::new(config.sim.seed);
    let module = build_module(&config, &mut seeder)?;

    let mut sim = Simulation::from_config(&config);
    sim.add_domain(module);
    sim.init();
    sim.run()?;

    sim.histogram().write_to_file(&args.outfile)?;
    info!(path = %args.outfile, "report written");

    sim.print_stats();
    Ok(())
}

/// Main entry point for the FaultSim reliability simulator.
///
/// # Behavior
///
/// 1. **Arguments**: Parses the command line; usage errors exit with 1.
/// 2. **Configuration**: Loads and validates the TOML configuration.
/// 3. **Topology**: Builds the DIMM rank or 3D stack with its ECC scheme.
/// 4. **Simulation**: Runs every trial with the configured engine.
/// 5. **Teardown**: Writes the report CSV and prints statistics. Any
///    runtime error exits with 2.
fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            e.print().ok();
            process::exit(code);
        }
    };

    if let Err(e) = run(&args) {
        eprintln!("\n[!] FATAL: {}", e);
        process::exit(2);
    }
}
