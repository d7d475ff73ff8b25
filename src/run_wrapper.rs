//! A simulator wrapper: init, load, run and report

use std::fs::File;
use std::path::Path;
use std::time::Instant;

use tracing::info;

use crate::cpu::{CPUState, SimPolicy};
use crate::elf_helper;
use crate::error::{ExecutionError, SimulatorError, SimulatorResult};
use crate::functional::Rv32iCore;
use crate::loader::{self, ProgramLayout};
use crate::memory::mmu::MMU;
use crate::pipelined::Pipeline;
use crate::stats::{SimStats, StatRegistry};

pub const STACK_BASE: u32 = 0x80000000;
pub const STACK_SIZE: u32 = 0x400000;

/// Outcome of a run: the pipeline counters and every registered statistic
#[derive(Debug)]
pub struct RunReport {
    pub stats: SimStats,
    pub db: StatRegistry,
}

/// Run simulation on the given ELF file and return its statistics
pub fn run(elf_file: &Path, policy: &SimPolicy) -> SimulatorResult<RunReport> {
    // Load the ELF file
    let (elf_reader, elf_data) = elf_helper::parse_elf_file(elf_file)?;
    let entry = elf_helper::get_elf_entry(&elf_reader, elf_file)?;
    let segments = elf_helper::get_load_segments(&elf_reader, &elf_data, elf_file)?;

    let mut cpu = CPUState::make();
    let mut mem = MMU::make();
    loader::set_stack(&mut cpu, &mut mem, STACK_BASE, STACK_SIZE);
    let layout = loader::load_elf(&mut cpu, &mut mem, entry, &segments)?;

    simulate(Rv32iCore::new(cpu, mem), layout, policy)
}

/// Run simulation on raw instruction words placed at `base`
pub fn run_image(
    base: u32,
    words: &[u32],
    policy: &SimPolicy,
) -> SimulatorResult<RunReport> {
    let mut cpu = CPUState::make();
    let mut mem = MMU::make();
    loader::set_stack(&mut cpu, &mut mem, STACK_BASE, STACK_SIZE);
    let layout = loader::load_image(&mut cpu, &mut mem, base, words)?;

    simulate(Rv32iCore::new(cpu, mem), layout, policy)
}

fn simulate(
    mut core: Rv32iCore,
    layout: ProgramLayout,
    policy: &SimPolicy,
) -> SimulatorResult<RunReport> {
    if policy.pool_capacity == 0 {
        return Err(SimulatorError::ConfigError(
            "instruction pool capacity must be positive".to_string(),
        ));
    }

    let mut pipe = Pipeline::new(policy, core.cpu.pc.read());
    let start = Instant::now();
    pipe.run_with(&mut core, |pipe, core| {
        let cpu = &core.cpu;
        if cpu.stack_overflow() {
            return Err(ExecutionError::StackOverflow(
                cpu.read_gpr(2),
                cpu.stack_base,
                cpu.stack_size,
            )
            .into());
        }
        if policy.dump_pipeline {
            eprint!("{}", pipe.snapshot(&*core));
        }
        Ok(())
    })?;

    let mut stats = *pipe.stats();
    stats.sim_elapsed_time = start.elapsed().as_secs_f64();
    if let Some(code) = pipe.exit_code() {
        info!("program exited with code {}", code);
    }

    let mut db = StatRegistry::from(&stats);
    layout.register(&mut db);
    core.mem.register_stats(&mut db);
    if policy.history {
        eprint!("{}", db);
    }
    if let Some(path) = &policy.stats_csv {
        db.write_csv(File::create(path)?)?;
    }
    Ok(RunReport { stats, db })
}
