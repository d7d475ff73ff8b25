//! Cycle-accurate in-order scalar pipeline.
//!
//! Five stages (IF, ID, EX, MEM, WB) separated by four latches. All
//! functional work happens in decode through the [`FunctionalCore`];
//! the remaining stages only model occupancy. RAW hazards stall decode
//! until the producer has written back, and a taken control transfer
//! costs one fetch bubble.

use tracing::info;

use crate::cpu::{RegId, SimPolicy};
use crate::error::{PipelineError, SimulatorResult};
use crate::functional::FunctionalCore;
use crate::stats::SimStats;

pub mod display;
pub mod latch;
pub mod pool;
pub mod scoreboard;
pub mod stages;

use latch::{Latch, Latches};
use pool::{InstPool, InstRecord};
use scoreboard::Scoreboard;

/// Cycles allowed for in-flight work to retire once fetch has stopped
const DRAIN_LIMIT: u64 = 1024;

/// Simulator context: everything the stage engines share
pub struct Pipeline {
    pub(crate) cycle: u64,
    pub(crate) fetch_pc: u32,
    /// Pending fetch redirect target
    pub(crate) redirect: Option<u32>,
    pub(crate) next_uid: u64,
    pub(crate) pool: InstPool,
    pub(crate) scoreboard: Scoreboard,
    pub(crate) latches: Latches,
    pub(crate) stats: SimStats,
    /// Instruction budget, 0 for none
    pub(crate) max_insts: u64,
    /// Fetch has stopped; in-flight instructions are retiring
    pub(crate) draining: bool,
    drain_start: Option<u64>,
    pub(crate) exit_code: Option<i32>,
}

impl Pipeline {
    /// Empty pipeline that starts fetching at `entry_pc`
    pub fn new(policy: &SimPolicy, entry_pc: u32) -> Self {
        Self::with_capacity(policy.pool_capacity, policy.max_insts, entry_pc)
    }

    pub fn with_capacity(capacity: usize, max_insts: u64, entry_pc: u32) -> Self {
        info!(
            "starting pipeline simulation @ {:#010x} ({} records, budget {})",
            entry_pc, capacity, max_insts
        );
        Self {
            cycle: 0,
            fetch_pc: entry_pc,
            redirect: None,
            next_uid: 1,
            pool: InstPool::new(capacity),
            scoreboard: Scoreboard::new(),
            latches: Latches::default(),
            stats: SimStats::default(),
            max_insts,
            draining: false,
            drain_start: None,
            exit_code: None,
        }
    }

    /// Cycles simulated so far
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn fetch_pc(&self) -> u32 {
        self.fetch_pc
    }

    pub fn redirect(&self) -> Option<u32> {
        self.redirect
    }

    pub fn stats(&self) -> &SimStats {
        &self.stats
    }

    /// Exit code, once the program has exited
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn pool(&self) -> &InstPool {
        &self.pool
    }

    pub fn scoreboard(&self) -> &Scoreboard {
        &self.scoreboard
    }

    pub fn latches(&self) -> &Latches {
        &self.latches
    }

    /// Record resident in `latch`
    pub fn latch(&self, latch: Latch) -> Option<&InstRecord> {
        self.latches.get(latch).and_then(|handle| self.pool.get(handle))
    }

    /// In-flight producer of `reg`
    pub fn producer(&self, reg: RegId) -> Option<&InstRecord> {
        self.scoreboard.producer(reg).and_then(|handle| self.pool.get(handle))
    }

    pub fn budget_exhausted(&self) -> bool {
        self.max_insts != 0 && self.stats.sim_num_insn >= self.max_insts
    }

    /// Fetch has stopped and every latch is empty
    pub fn is_finished(&self) -> bool {
        self.draining && self.latches.occupied() == 0
    }

    /// Advances every stage by one cycle, tail to head
    pub fn step<C: FunctionalCore>(&mut self, core: &mut C) -> SimulatorResult<()> {
        stages::writeback(self)?;
        stages::memory(self)?;
        stages::execute(self)?;
        stages::decode(self, core)?;
        stages::fetch(self, core)?;

        self.cycle += 1;
        self.stats.sim_cycles = self.cycle;

        if self.draining {
            let start = *self.drain_start.get_or_insert(self.cycle);
            if self.latches.occupied() != 0 && self.cycle - start > DRAIN_LIMIT {
                return Err(PipelineError::DrainTimeout(DRAIN_LIMIT).into());
            }
        }
        Ok(())
    }

    /// Runs until the budget is exhausted or the program exits,
    /// then lets in-flight instructions retire
    pub fn run<C: FunctionalCore>(&mut self, core: &mut C) -> SimulatorResult<()> {
        self.run_with(core, |_, _| Ok(()))
    }

    /// Like [`Pipeline::run`], calling `hook` at every cycle boundary
    pub fn run_with<C, F>(&mut self, core: &mut C, mut hook: F) -> SimulatorResult<()>
    where
        C: FunctionalCore,
        F: FnMut(&Pipeline, &mut C) -> SimulatorResult<()>,
    {
        while !self.is_finished() {
            self.step(core)?;
            hook(self, core)?;
        }
        info!(
            "pipeline finished: {} instructions, {} cycles",
            self.stats.sim_num_insn, self.cycle
        );
        Ok(())
    }
}
