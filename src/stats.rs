//! Timing statistics and a small registry to report them

use std::fmt;
use std::io;

use crate::error::SimulatorResult;

/// Counters maintained by the pipeline
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SimStats {
    /// Instructions executed (decoded)
    pub sim_num_insn: u64,
    pub sim_cycles: u64,
    /// Loads and stores executed
    pub sim_num_refs: u64,
    pub sim_num_loads: u64,
    pub sim_num_stores: u64,
    /// Control-flow instructions executed
    pub sim_num_branches: u64,
    pub sim_num_taken: u64,
    /// Cycles an instruction spent stalled in decode on a RAW hazard
    pub sim_stall_cycles: u64,
    /// Wrong-path fetches dropped on a redirect
    pub sim_num_squashed: u64,
    /// Wall-clock seconds
    pub sim_elapsed_time: f64,
}

impl SimStats {
    /// Cycles per instruction
    pub fn cpi(&self) -> f64 {
        match self.sim_num_insn {
            0 => 0.0,
            n => self.sim_cycles as f64 / n as f64,
        }
    }

    /// Simulation speed in instructions per second
    pub fn inst_rate(&self) -> f64 {
        match self.sim_elapsed_time {
            t if t > 0.0 => self.sim_num_insn as f64 / t,
            _ => 0.0,
        }
    }

    /// Registers every statistic with `db`
    pub fn register(&self, db: &mut StatRegistry) {
        db.reg_counter("sim_num_insn", "total number of instructions executed", self.sim_num_insn);
        db.reg_counter("sim_cycles", "total number of cycles", self.sim_cycles);
        db.reg_formula("sim_cpi", "cycles per instruction (CPI)", self.cpi());
        db.reg_counter(
            "sim_num_refs",
            "total number of loads and stores executed",
            self.sim_num_refs,
        );
        db.reg_counter("sim_num_loads", "total number of loads executed", self.sim_num_loads);
        db.reg_counter("sim_num_stores", "total number of stores executed", self.sim_num_stores);
        db.reg_counter(
            "sim_num_branches",
            "total number of control transfers executed",
            self.sim_num_branches,
        );
        db.reg_counter(
            "sim_num_taken",
            "total number of taken control transfers",
            self.sim_num_taken,
        );
        db.reg_counter(
            "sim_stall_cycles",
            "cycles stalled in decode on RAW hazards",
            self.sim_stall_cycles,
        );
        db.reg_counter(
            "sim_num_squashed",
            "fetched instructions discarded",
            self.sim_num_squashed,
        );
        db.reg_formula(
            "sim_elapsed_time",
            "total simulation time in seconds",
            self.sim_elapsed_time,
        );
        db.reg_formula("sim_inst_rate", "simulation speed (in insts/sec)", self.inst_rate());
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StatValue {
    Counter(u64),
    Formula(f64),
    Address(u32),
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatValue::Counter(n) => write!(f, "{}", n),
            StatValue::Formula(x) => write!(f, "{:.4}", x),
            StatValue::Address(a) => write!(f, "{:#010x}", a),
        }
    }
}

#[derive(Clone, Debug)]
pub struct StatEntry {
    pub name: &'static str,
    pub desc: &'static str,
    pub value: StatValue,
}

/// Ordered set of named statistics
#[derive(Clone, Debug, Default)]
pub struct StatRegistry {
    entries: Vec<StatEntry>,
}

impl StatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reg_counter(&mut self, name: &'static str, desc: &'static str, value: u64) {
        self.entries.push(StatEntry { name, desc, value: StatValue::Counter(value) });
    }

    pub fn reg_formula(&mut self, name: &'static str, desc: &'static str, value: f64) {
        self.entries.push(StatEntry { name, desc, value: StatValue::Formula(value) });
    }

    pub fn reg_addr(&mut self, name: &'static str, desc: &'static str, value: u32) {
        self.entries.push(StatEntry { name, desc, value: StatValue::Address(value) });
    }

    pub fn get(&self, name: &str) -> Option<StatValue> {
        self.entries.iter().find(|e| e.name == name).map(|e| e.value)
    }

    pub fn entries(&self) -> &[StatEntry] {
        &self.entries
    }

    /// Writes `name,value,description` rows
    pub fn write_csv<W: io::Write>(&self, writer: W) -> SimulatorResult<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(["name", "value", "description"])?;
        for entry in &self.entries {
            let value = entry.value.to_string();
            writer.write_record([entry.name, value.as_str(), entry.desc])?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl From<&SimStats> for StatRegistry {
    fn from(stats: &SimStats) -> Self {
        let mut db = StatRegistry::new();
        stats.register(&mut db);
        db
    }
}

impl fmt::Display for StatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(
                f,
                "{:<20} {:>16} # {}",
                entry.name,
                entry.value.to_string(),
                entry.desc
            )?;
        }
        Ok(())
    }
}
