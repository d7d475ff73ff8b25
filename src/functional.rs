//! Functional collaborator of the timing model.
//!
//! The pipeline never interprets instructions itself. It fetches raw bits,
//! asks the core to decode them into static properties and register
//! identifiers, and asks it to execute them exactly once, in program order.

use std::fmt;

use crate::cpu::{CPUState, RegId};
use crate::error::{MemoryError, SimulatorResult};
use crate::instruction::table::{self, ExecContext, OpFlags};
use crate::instruction::{Instruction, INST_WIDTH};
use crate::memory::mmu::MMU;
use crate::memory::Memory;

/// Decoded instruction as seen by the timing model
#[derive(Clone, Copy, Debug)]
pub struct Decoded<Op> {
    /// Core-specific handle passed back to [`FunctionalCore::execute`]
    pub op: Op,
    pub mnemonic: &'static str,
    pub flags: OpFlags,
    pub sources: [Option<RegId>; 3],
    pub destinations: [Option<RegId>; 2],
}

/// Result of executing one instruction
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Executed {
    /// Architecturally correct next PC
    pub next_pc: u32,
    /// Effective address for memory references
    pub mem_addr: Option<u32>,
    /// Exit code if the program terminated
    pub exit: Option<i32>,
}

/// Entry points the pipeline needs from a functional simulator
pub trait FunctionalCore {
    type Op: Copy + fmt::Debug;

    /// Architectural PC of the next instruction to execute
    fn pc(&self) -> u32;

    /// Raw instruction bits at `pc`
    fn fetch(&mut self, pc: u32) -> Result<u32, MemoryError>;

    /// Decodes raw bits fetched from `pc`
    fn decode(&self, bits: u32, pc: u32) -> SimulatorResult<Decoded<Self::Op>>;

    /// Executes the instruction at the architectural PC and advances it.
    /// Any error is fatal to the run.
    fn execute(&mut self, op: &Decoded<Self::Op>) -> SimulatorResult<Executed>;

    /// Assembler rendering for diagnostics
    fn disassemble(&self, bits: u32, pc: u32) -> String;

    /// Cheap fingerprint of the register file, for traces
    fn fingerprint(&self) -> u32 {
        0
    }
}

/// rv32i functional core over any memory backend
pub struct Rv32iCore<M: Memory = MMU> {
    pub cpu: CPUState,
    pub mem: M,
}

impl<M: Memory> Rv32iCore<M> {
    pub fn new(cpu: CPUState, mem: M) -> Self {
        Self { cpu, mem }
    }
}

impl Default for Rv32iCore<MMU> {
    fn default() -> Self {
        Self::new(CPUState::make(), MMU::make())
    }
}

impl<M: Memory> FunctionalCore for Rv32iCore<M> {
    type Op = Instruction;

    fn pc(&self) -> u32 {
        self.cpu.pc.read()
    }

    fn fetch(&mut self, pc: u32) -> Result<u32, MemoryError> {
        self.mem.get32(pc)
    }

    fn decode(&self, bits: u32, pc: u32) -> SimulatorResult<Decoded<Instruction>> {
        let inst = Instruction::new(bits).map_err(|_| {
            crate::error::SimulatorError::InvalidInstructionError(bits, pc)
        })?;
        let desc = table::descriptor(inst.function);
        Ok(Decoded {
            op: inst,
            mnemonic: desc.name,
            flags: desc.flags,
            sources: desc.sources(&inst),
            destinations: desc.destinations(&inst),
        })
    }

    fn execute(&mut self, op: &Decoded<Instruction>) -> SimulatorResult<Executed> {
        let inst = &op.op;
        let desc = table::descriptor(inst.function);

        let mut ctx = ExecContext::new(&mut self.cpu, &mut self.mem);
        (desc.semantics)(&mut ctx, inst, desc)?;
        let executed = Executed {
            next_pc: ctx.next_pc,
            mem_addr: ctx.mem_addr,
            exit: ctx.exit_code,
        };

        // Go to the next instruction
        self.cpu.pc.write(executed.next_pc);
        self.cpu.npc.write(executed.next_pc.wrapping_add(INST_WIDTH));
        Ok(executed)
    }

    fn disassemble(&self, bits: u32, pc: u32) -> String {
        match Instruction::new(bits) {
            Ok(inst) => table::disassemble(&inst, pc),
            Err(_) => format!(".word {:#010x}", bits),
        }
    }

    fn fingerprint(&self) -> u32 {
        self.cpu.xor_regs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core_with(words: &[u32]) -> Rv32iCore {
        let mut core = Rv32iCore::default();
        core.mem.allocate_page(0);
        for (i, word) in words.iter().enumerate() {
            core.mem.set32(i as u32 * 4, *word).unwrap();
        }
        core.cpu.set_entry(0);
        core
    }

    #[test]
    fn test_execute_advances_pc() {
        // addi x1, x0, 5
        let mut core = core_with(&[0x0050_0093]);
        let bits = core.fetch(0).unwrap();
        let decoded = core.decode(bits, 0).unwrap();
        assert_eq!(decoded.mnemonic, "addi");
        assert_eq!(decoded.sources, [None, None, None]);
        assert_eq!(decoded.destinations, [RegId::gpr(1), None]);

        let executed = core.execute(&decoded).unwrap();
        assert_eq!(executed.next_pc, 4);
        assert_eq!(core.pc(), 4);
        assert_eq!(core.cpu.npc.read(), 8);
        assert_eq!(core.cpu.read_gpr(1), 5);
    }

    #[test]
    fn test_fetch_unmapped_faults() {
        let mut core = Rv32iCore::default();
        assert!(core.fetch(0x8000).is_err());
    }

    #[test]
    fn test_decode_reports_pc_of_bad_word() {
        let core = Rv32iCore::default();
        match core.decode(0, 0x40) {
            Err(crate::error::SimulatorError::InvalidInstructionError(0, 0x40)) => {}
            other => panic!("unexpected {:?}", other.map(|d| d.mnemonic)),
        }
    }

    #[test]
    fn test_exit_syscall() {
        // addi a7, x0, 3; ecall
        let mut core = core_with(&[0x0030_0893, 0x0000_0073]);
        for pc in [0, 4] {
            let bits = core.fetch(pc).unwrap();
            let decoded = core.decode(bits, pc).unwrap();
            let executed = core.execute(&decoded).unwrap();
            if pc == 4 {
                assert_eq!(executed.exit, Some(0));
            }
        }
    }
}
