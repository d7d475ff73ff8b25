//! rv32i CPU state: architectural registers and run policy

use std::fmt;
use std::path::PathBuf;

/// Default number of instruction records the pipeline may keep alive
pub const DEFAULT_POOL_CAPACITY: usize = 32;

/// CPU state
#[derive(Clone, Copy)]
pub struct CPUState {
    /// Stack base address
    pub stack_base: u32,
    /// Stack size
    pub stack_size: u32,
    /// Program counter
    pub pc: Register,
    /// Next program counter
    pub npc: Register,
    /// General purpose registers
    gpr: [Register; 32],
    /// Floating point registers (raw bits)
    fpr: [Register; 32],
    /// HI, LO and the FP condition code
    misc: MiscRegisters,
}

/// Miscellaneous registers
#[derive(Clone, Copy, Default, Debug)]
pub struct MiscRegisters {
    pub hi: u32,
    pub lo: u32,
    pub fcc: u32,
}

impl CPUState {
    pub fn make() -> Self {
        Self {
            stack_base: 0,
            stack_size: 0,
            pc: Register::new(0),
            npc: Register::new(4),
            gpr: [Register::new(0); 32],
            fpr: [Register::new(0); 32],
            misc: MiscRegisters::default(),
        }
    }

    /// Points PC at `entry` and NPC at the following instruction
    pub fn set_entry(&mut self, entry: u32) {
        self.pc.write(entry);
        self.npc.write(entry.wrapping_add(4));
    }

    /// Reads a general purpose register; x0 always reads zero
    pub fn read_gpr(&self, n: u32) -> u32 {
        match n {
            0 => 0,
            _ => self.gpr[(n & 0x1f) as usize].read(),
        }
    }

    /// Writes a general purpose register; writes to x0 are dropped
    pub fn write_gpr(&mut self, n: u32, value: u32) {
        if n != 0 {
            self.gpr[(n & 0x1f) as usize].write(value);
        }
    }

    pub fn read_fpr(&self, n: u32) -> u32 {
        self.fpr[(n & 0x1f) as usize].read()
    }

    pub fn write_fpr(&mut self, n: u32, bits: u32) {
        self.fpr[(n & 0x1f) as usize].write(bits);
    }

    pub fn misc(&self) -> &MiscRegisters {
        &self.misc
    }

    pub fn misc_mut(&mut self) -> &mut MiscRegisters {
        &mut self.misc
    }

    /// Checks for stack overflow
    pub fn stack_overflow(&self) -> bool {
        self.stack_size != 0
            && self.read_gpr(2) < self.stack_base - self.stack_size
    }

    /// XOR of every integer register, a cheap fingerprint for traces
    pub fn xor_regs(&self) -> u32 {
        self.gpr.iter().fold(0, |acc, r| acc ^ r.read())
            ^ self.misc.hi
            ^ self.misc.lo
    }
}

/// Register file simulation
#[derive(Clone, Copy)]
pub struct Register {
    /// Current data in the register
    data: u32,
}

impl Register {
    pub fn new(data: u32) -> Self {
        Self { data }
    }

    /// Reads the register
    pub fn read(&self) -> u32 {
        self.data
    }

    /// Writes to register
    pub fn write(&mut self, value: u32) {
        self.data = value;
    }
}

/// Flat architectural register identifier used for dependence tracking.
///
/// General registers occupy 0..32, floating point registers 32..64 and
/// the miscellaneous registers follow. `x0` never names a dependence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RegId(u8);

impl RegId {
    /// Size of the identifier space
    pub const TOTAL: usize = 68;

    pub const HI: RegId = RegId(64);
    pub const LO: RegId = RegId(65);
    pub const FCC: RegId = RegId(66);
    pub const TMP: RegId = RegId(67);

    /// Identifier of general register `n`, or `None` for the zero register
    pub fn gpr(n: u32) -> Option<RegId> {
        match n & 0x1f {
            0 => None,
            n => Some(RegId(n as u8)),
        }
    }

    pub fn fpr(n: u32) -> RegId {
        RegId(32 + (n & 0x1f) as u8)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RegId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            n @ 0..=31 => write!(f, "x{}", n),
            n @ 32..=63 => write!(f, "f{}", n - 32),
            64 => write!(f, "hi"),
            65 => write!(f, "lo"),
            66 => write!(f, "fcc"),
            _ => write!(f, "tmp"),
        }
    }
}

/// Run policy
#[derive(Clone, Debug)]
pub struct SimPolicy {
    /// Emit a per-instruction functional trace
    pub verbose: bool,
    /// Print statistics after simulation
    pub history: bool,
    /// Instruction budget; 0 means run until the program exits
    pub max_insts: u64,
    /// Capacity of the instruction record pool
    pub pool_capacity: usize,
    /// Print the pipeline latches at the end of every cycle
    pub dump_pipeline: bool,
    /// Write the statistics registry to this CSV file after the run
    pub stats_csv: Option<PathBuf>,
}

impl Default for SimPolicy {
    fn default() -> Self {
        Self {
            verbose: false,
            history: false,
            max_insts: 0,
            pool_capacity: DEFAULT_POOL_CAPACITY,
            dump_pipeline: false,
            stats_csv: None,
        }
    }
}
