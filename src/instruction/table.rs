//! Per-opcode descriptor table.
//!
//! Every [`Function`] has one [`OpDescriptor`] holding its static flags,
//! the operand slots it reads and writes, and the function implementing
//! its semantics. The timing model only ever sees the flags and register
//! identifiers; the semantics run against [`ExecContext`].

use std::fmt::Write;

use bitflags::bitflags;

use super::{Format, Function, Instruction, INST_WIDTH};
use crate::alu::{alu, ALUOp};
use crate::cpu::{CPUState, RegId};
use crate::error::{ExecutionError, SimulatorResult};
use crate::memory::Memory;
use crate::system_call::{syscall, SyscallOutcome};

bitflags! {
    /// Static instruction properties
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct OpFlags: u16 {
        /// Integer computation
        const ICOMP = 1 << 0;
        /// Control flow
        const CTRL = 1 << 1;
        const UNCOND = 1 << 2;
        const COND = 1 << 3;
        /// Memory reference
        const MEM = 1 << 4;
        const LOAD = 1 << 5;
        const STORE = 1 << 6;
        const DISP = 1 << 7;
        const DIRJMP = 1 << 8;
        const INDIRJMP = 1 << 9;
        /// Traps into the syscall layer
        const TRAP = 1 << 10;
    }
}

/// Instruction field a register dependence is read from
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Operand {
    None,
    Rd,
    Rs1,
    Rs2,
}

impl Operand {
    /// The dependence identifier for this slot, `None` for x0 or no operand
    pub fn resolve(self, inst: &Instruction) -> Option<RegId> {
        let field = match self {
            Operand::None => return None,
            Operand::Rd => inst.attributes.rd,
            Operand::Rs1 => inst.attributes.rs1,
            Operand::Rs2 => inst.attributes.rs2,
        };
        field.and_then(RegId::gpr)
    }
}

/// Architectural state an opcode's semantics run against
pub struct ExecContext<'a> {
    pub cpu: &'a mut CPUState,
    pub mem: &'a mut dyn Memory,
    /// PC of the executing instruction
    pub pc: u32,
    /// Next PC; sequential unless the semantics redirect it
    pub next_pc: u32,
    /// Effective address of a memory reference
    pub mem_addr: Option<u32>,
    /// Set when the program asked to exit
    pub exit_code: Option<i32>,
}

impl<'a> ExecContext<'a> {
    pub fn new(cpu: &'a mut CPUState, mem: &'a mut dyn Memory) -> Self {
        let pc = cpu.pc.read();
        Self {
            cpu,
            mem,
            pc,
            next_pc: pc.wrapping_add(INST_WIDTH),
            mem_addr: None,
            exit_code: None,
        }
    }

    fn gpr(&self, n: u32) -> i32 {
        self.cpu.read_gpr(n) as i32
    }

    fn set_gpr(&mut self, n: u32, value: i32) {
        self.cpu.write_gpr(n, value as u32);
    }
}

pub type Semantics =
    fn(&mut ExecContext<'_>, &Instruction, &OpDescriptor) -> SimulatorResult<()>;

/// Static description of one opcode
pub struct OpDescriptor {
    pub function: Function,
    pub name: &'static str,
    pub flags: OpFlags,
    pub outputs: [Operand; 2],
    pub inputs: [Operand; 3],
    pub alu_op: ALUOp,
    /// Access width for memory references
    pub mem_step: u32,
    pub semantics: Semantics,
}

impl OpDescriptor {
    pub fn sources(&self, inst: &Instruction) -> [Option<RegId>; 3] {
        self.inputs.map(|operand| operand.resolve(inst))
    }

    pub fn destinations(&self, inst: &Instruction) -> [Option<RegId>; 2] {
        self.outputs.map(|operand| operand.resolve(inst))
    }
}

/// Looks up the descriptor of a decoded function
pub fn descriptor(function: Function) -> &'static OpDescriptor {
    &TABLE[function as usize]
}

use Operand::{None as NA, Rd, Rs1, Rs2};

macro_rules! op {
    (
        $func:ident, $name:literal, $flags:expr,
        [$o1:expr, $o2:expr], [$i1:expr, $i2:expr, $i3:expr],
        $alu:ident, $step:literal, $sem:ident
    ) => {
        OpDescriptor {
            function: Function::$func,
            name: $name,
            flags: $flags,
            outputs: [$o1, $o2],
            inputs: [$i1, $i2, $i3],
            alu_op: ALUOp::$alu,
            mem_step: $step,
            semantics: $sem,
        }
    };
}

const IC: OpFlags = OpFlags::ICOMP;
const BR: OpFlags = OpFlags::CTRL.union(OpFlags::COND).union(OpFlags::DIRJMP);
const LD: OpFlags = OpFlags::MEM.union(OpFlags::LOAD).union(OpFlags::DISP);
const ST: OpFlags = OpFlags::MEM.union(OpFlags::STORE).union(OpFlags::DISP);
const JMP: OpFlags = OpFlags::CTRL.union(OpFlags::UNCOND).union(OpFlags::DIRJMP);
const IJMP: OpFlags = OpFlags::CTRL.union(OpFlags::UNCOND).union(OpFlags::INDIRJMP);

/// Indexed by `Function as usize`
static TABLE: [OpDescriptor; 39] = [
    op!(LUI, "lui", IC, [Rd, NA], [NA, NA, NA], ADD, 0, exec_lui),
    op!(AUIPC, "auipc", IC, [Rd, NA], [NA, NA, NA], ADD, 0, exec_auipc),
    op!(JAL, "jal", JMP, [Rd, NA], [NA, NA, NA], ADD, 0, exec_jal),
    op!(JALR, "jalr", IJMP, [Rd, NA], [Rs1, NA, NA], ADD, 0, exec_jalr),
    op!(BEQ, "beq", BR, [NA, NA], [Rs1, Rs2, NA], BEQ, 0, exec_branch),
    op!(BNE, "bne", BR, [NA, NA], [Rs1, Rs2, NA], BNE, 0, exec_branch),
    op!(BLT, "blt", BR, [NA, NA], [Rs1, Rs2, NA], BLT, 0, exec_branch),
    op!(BGE, "bge", BR, [NA, NA], [Rs1, Rs2, NA], BGE, 0, exec_branch),
    op!(BLTU, "bltu", BR, [NA, NA], [Rs1, Rs2, NA], BLTU, 0, exec_branch),
    op!(BGEU, "bgeu", BR, [NA, NA], [Rs1, Rs2, NA], BGEU, 0, exec_branch),
    op!(LB, "lb", LD, [Rd, NA], [Rs1, NA, NA], ADD, 1, exec_load),
    op!(LH, "lh", LD, [Rd, NA], [Rs1, NA, NA], ADD, 2, exec_load),
    op!(LW, "lw", LD, [Rd, NA], [Rs1, NA, NA], ADD, 4, exec_load),
    op!(LBU, "lbu", LD, [Rd, NA], [Rs1, NA, NA], ADD, 1, exec_load),
    op!(LHU, "lhu", LD, [Rd, NA], [Rs1, NA, NA], ADD, 2, exec_load),
    op!(SB, "sb", ST, [NA, NA], [Rs1, Rs2, NA], ADD, 1, exec_store),
    op!(SH, "sh", ST, [NA, NA], [Rs1, Rs2, NA], ADD, 2, exec_store),
    op!(SW, "sw", ST, [NA, NA], [Rs1, Rs2, NA], ADD, 4, exec_store),
    op!(ADDI, "addi", IC, [Rd, NA], [Rs1, NA, NA], ADD, 0, exec_op_imm),
    op!(SLTI, "slti", IC, [Rd, NA], [Rs1, NA, NA], SLT, 0, exec_op_imm),
    op!(SLTIU, "sltiu", IC, [Rd, NA], [Rs1, NA, NA], SLTU, 0, exec_op_imm),
    op!(XORI, "xori", IC, [Rd, NA], [Rs1, NA, NA], XOR, 0, exec_op_imm),
    op!(ORI, "ori", IC, [Rd, NA], [Rs1, NA, NA], OR, 0, exec_op_imm),
    op!(ANDI, "andi", IC, [Rd, NA], [Rs1, NA, NA], AND, 0, exec_op_imm),
    op!(SLLI, "slli", IC, [Rd, NA], [Rs1, NA, NA], SLL, 0, exec_op_imm),
    op!(SRLI, "srli", IC, [Rd, NA], [Rs1, NA, NA], SRL, 0, exec_op_imm),
    op!(SRAI, "srai", IC, [Rd, NA], [Rs1, NA, NA], SRA, 0, exec_op_imm),
    op!(ADD, "add", IC, [Rd, NA], [Rs1, Rs2, NA], ADD, 0, exec_op),
    op!(SUB, "sub", IC, [Rd, NA], [Rs1, Rs2, NA], SUB, 0, exec_op),
    op!(SLL, "sll", IC, [Rd, NA], [Rs1, Rs2, NA], SLL, 0, exec_op),
    op!(SLT, "slt", IC, [Rd, NA], [Rs1, Rs2, NA], SLT, 0, exec_op),
    op!(SLTU, "sltu", IC, [Rd, NA], [Rs1, Rs2, NA], SLTU, 0, exec_op),
    op!(XOR, "xor", IC, [Rd, NA], [Rs1, Rs2, NA], XOR, 0, exec_op),
    op!(SRL, "srl", IC, [Rd, NA], [Rs1, Rs2, NA], SRL, 0, exec_op),
    op!(SRA, "sra", IC, [Rd, NA], [Rs1, Rs2, NA], SRA, 0, exec_op),
    op!(OR, "or", IC, [Rd, NA], [Rs1, Rs2, NA], OR, 0, exec_op),
    op!(AND, "and", IC, [Rd, NA], [Rs1, Rs2, NA], AND, 0, exec_op),
    op!(FENCE, "fence", OpFlags::empty(), [NA, NA], [NA, NA, NA], ADD, 0, exec_nop),
    op!(ECALL, "ecall", OpFlags::TRAP, [Rd, NA], [Rs1, Rs2, NA], ADD, 0, exec_ecall),
];

fn exec_lui(
    ctx: &mut ExecContext<'_>,
    inst: &Instruction,
    _: &OpDescriptor,
) -> SimulatorResult<()> {
    ctx.set_gpr(inst.rd(), inst.imm());
    Ok(())
}

fn exec_auipc(
    ctx: &mut ExecContext<'_>,
    inst: &Instruction,
    _: &OpDescriptor,
) -> SimulatorResult<()> {
    ctx.set_gpr(inst.rd(), (ctx.pc as i32).wrapping_add(inst.imm()));
    Ok(())
}

fn exec_jal(
    ctx: &mut ExecContext<'_>,
    inst: &Instruction,
    _: &OpDescriptor,
) -> SimulatorResult<()> {
    let link = ctx.pc.wrapping_add(INST_WIDTH);
    ctx.next_pc = ctx.pc.wrapping_add(inst.imm() as u32);
    ctx.set_gpr(inst.rd(), link as i32);
    Ok(())
}

fn exec_jalr(
    ctx: &mut ExecContext<'_>,
    inst: &Instruction,
    _: &OpDescriptor,
) -> SimulatorResult<()> {
    // Read rs1 before rd is overwritten
    let target = (ctx.gpr(inst.rs1()).wrapping_add(inst.imm()) as u32) & !1;
    let link = ctx.pc.wrapping_add(INST_WIDTH);
    ctx.next_pc = target;
    ctx.set_gpr(inst.rd(), link as i32);
    Ok(())
}

fn exec_branch(
    ctx: &mut ExecContext<'_>,
    inst: &Instruction,
    desc: &OpDescriptor,
) -> SimulatorResult<()> {
    if alu(desc.alu_op, ctx.gpr(inst.rs1()), ctx.gpr(inst.rs2())) != 0 {
        ctx.next_pc = ctx.pc.wrapping_add(inst.imm() as u32);
    }
    Ok(())
}

fn exec_load(
    ctx: &mut ExecContext<'_>,
    inst: &Instruction,
    desc: &OpDescriptor,
) -> SimulatorResult<()> {
    let address = ctx.gpr(inst.rs1()).wrapping_add(inst.imm()) as u32;
    ctx.mem_addr = Some(address);
    let pc = ctx.pc;
    let raw = ctx
        .mem
        .get(address, desc.mem_step)
        .map_err(|source| ExecutionError::Fault { pc, source })?;
    let value = match desc.function {
        Function::LB => raw as u8 as i8 as i32,
        Function::LH => raw as u16 as i16 as i32,
        _ => raw as i32,
    };
    ctx.set_gpr(inst.rd(), value);
    Ok(())
}

fn exec_store(
    ctx: &mut ExecContext<'_>,
    inst: &Instruction,
    desc: &OpDescriptor,
) -> SimulatorResult<()> {
    let address = ctx.gpr(inst.rs1()).wrapping_add(inst.imm()) as u32;
    ctx.mem_addr = Some(address);
    let value = ctx.gpr(inst.rs2()) as u32;
    let pc = ctx.pc;
    ctx.mem
        .set(address, desc.mem_step, value)
        .map_err(|source| ExecutionError::Fault { pc, source })?;
    Ok(())
}

fn exec_op(
    ctx: &mut ExecContext<'_>,
    inst: &Instruction,
    desc: &OpDescriptor,
) -> SimulatorResult<()> {
    let result = alu(desc.alu_op, ctx.gpr(inst.rs1()), ctx.gpr(inst.rs2()));
    ctx.set_gpr(inst.rd(), result);
    Ok(())
}

fn exec_op_imm(
    ctx: &mut ExecContext<'_>,
    inst: &Instruction,
    desc: &OpDescriptor,
) -> SimulatorResult<()> {
    let result = alu(desc.alu_op, ctx.gpr(inst.rs1()), inst.imm());
    ctx.set_gpr(inst.rd(), result);
    Ok(())
}

fn exec_nop(
    _: &mut ExecContext<'_>,
    _: &Instruction,
    _: &OpDescriptor,
) -> SimulatorResult<()> {
    Ok(())
}

fn exec_ecall(
    ctx: &mut ExecContext<'_>,
    inst: &Instruction,
    _: &OpDescriptor,
) -> SimulatorResult<()> {
    let arg = ctx.gpr(inst.rs1());
    let call_type = ctx.gpr(inst.rs2());
    match syscall(ctx.pc, arg, call_type, ctx.mem)? {
        SyscallOutcome::Return(value) => ctx.set_gpr(inst.rd(), value),
        SyscallOutcome::Exit(code) => ctx.exit_code = Some(code),
    }
    Ok(())
}

/// Renders an instruction in assembler syntax
pub fn disassemble(inst: &Instruction, pc: u32) -> String {
    let desc = descriptor(inst.function);
    let mut out = String::from(desc.name);
    let (rd, rs1, rs2, imm) = (inst.rd(), inst.rs1(), inst.rs2(), inst.imm());
    // Writing into a String cannot fail
    let _ = match inst.format {
        Format::R => write!(out, " x{}, x{}, x{}", rd, rs1, rs2),
        Format::I if desc.flags.contains(OpFlags::LOAD) || inst.function == Function::JALR => {
            write!(out, " x{}, {}(x{})", rd, imm, rs1)
        }
        Format::I if inst.function == Function::FENCE => Ok(()),
        Format::I => write!(out, " x{}, x{}, {}", rd, rs1, imm),
        Format::S => write!(out, " x{}, {}(x{})", rs2, imm, rs1),
        Format::B => write!(
            out,
            " x{}, x{}, {:#x}",
            rs1,
            rs2,
            pc.wrapping_add(imm as u32)
        ),
        Format::U => write!(out, " x{}, {:#x}", rd, (imm as u32) >> 12),
        Format::J => write!(out, " x{}, {:#x}", rd, pc.wrapping_add(imm as u32)),
        Format::Sys => Ok(()),
    };
    out
}
