use std::path::Path;
use std::process;

use tracing::warn;

use sim_lib::cpu::SimPolicy;
use sim_lib::error::SimulatorResult;
use sim_lib::logging;
use sim_lib::run_wrapper::{run, RunReport};

const PROGRAMS: [&str; 11] = [
    "add",
    "mul-div",
    "n!",
    "qsort",
    "simple-function",
    "ackermann",
    "helloworld",
    "matrixmulti",
    "quicksort",
    "test_arithmetic",
    "test_branch",
];

fn main() {
    // Failed programs are reported at warn level
    logging::init("warn");

    if let Err(e) = run_eval() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run_eval() -> SimulatorResult<()> {
    let mut writer = csv::Writer::from_path("eval/sim_eval.csv")?;
    writer.write_record([
        "Program",
        "Instructions",
        "Cycles",
        "CPI",
        "Stall cycles",
        "Taken branches",
    ])?;

    for program in PROGRAMS {
        let program_path = format!("test/{}.riscv", program);
        eprintln!("Running program: {}", program_path);

        match run(Path::new(&program_path), &SimPolicy::default()) {
            Ok(RunReport { stats, .. }) => writer.write_record([
                program.to_string(),
                stats.sim_num_insn.to_string(),
                stats.sim_cycles.to_string(),
                format!("{:.3}", stats.cpi()),
                stats.sim_stall_cycles.to_string(),
                stats.sim_num_taken.to_string(),
            ])?,
            Err(e) => {
                warn!("failed to run program '{}': {}", program, e);
                writer.write_record([program, "Error", "Error", "Error", "Error", "Error"])?;
            }
        }
    }

    writer.flush()?;
    Ok(())
}
