use std::path::PathBuf;
use std::process;

use clap::Parser;

use sim_lib::cpu::{SimPolicy, DEFAULT_POOL_CAPACITY};
use sim_lib::logging;
use sim_lib::run_wrapper;

/// Cycle-accurate 5-stage pipeline simulator for rv32i ELF programs
#[derive(Parser, Debug)]
#[command(name = "sim", version)]
struct Cli {
    /// Program to run
    elf_file: PathBuf,

    /// Stop after this many instructions (0 runs to exit)
    #[arg(short = 'm', long, default_value_t = 0)]
    max_inst: u64,

    /// Number of in-flight instruction records
    #[arg(short, long, default_value_t = DEFAULT_POOL_CAPACITY)]
    pool_capacity: usize,

    /// Trace every executed instruction
    #[arg(short, long)]
    verbose: bool,

    /// Print statistics after the run
    #[arg(short = 'H', long)]
    history: bool,

    /// Print the pipeline latches every cycle
    #[arg(short, long)]
    dump_pipeline: bool,

    /// Write statistics to a CSV file
    #[arg(long)]
    stats_csv: Option<PathBuf>,
}

impl From<&Cli> for SimPolicy {
    fn from(cli: &Cli) -> Self {
        SimPolicy {
            verbose: cli.verbose,
            history: cli.history,
            max_insts: cli.max_inst,
            pool_capacity: cli.pool_capacity,
            dump_pipeline: cli.dump_pipeline,
            stats_csv: cli.stats_csv.clone(),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let policy = SimPolicy::from(&cli);

    // RUST_LOG wins; -v raises the default to the per-instruction trace
    let default_level = if policy.verbose { "debug" } else { "warn" };
    logging::init(default_level);

    if let Err(e) = run_wrapper::run(&cli.elf_file, &policy) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
