//! Instruction representation

use crate::error::SimulatorResult;

pub mod decode_helper;
pub mod table;

/// NOP: ADDI x0, x0, 0
pub const NOP: u32 = 0x13;

/// Width of every rv32i instruction in bytes
pub const INST_WIDTH: u32 = 4;

/// Wrapped instruction
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Instruction {
    /// Raw representation
    pub raw_inst: u32,
    /// Opcode
    pub opcode: Opcode,
    /// Format
    pub format: Format,
    /// Function
    pub function: Function,
    /// Subfields
    pub attributes: Attributes,
}

impl Instruction {
    pub fn new(raw_inst: u32) -> SimulatorResult<Self> {
        let opcode = decode_helper::raw_to_opcode(raw_inst)?;
        let format = decode_helper::opcode_to_format(opcode);
        let attributes = decode_helper::parse_attributes(format, raw_inst);

        let mut inst = Self {
            raw_inst,
            opcode,
            format,
            function: Function::ADDI,
            attributes,
        };
        inst.attributes.imm = decode_helper::get_imm_sign_extended(&inst);
        inst.function = decode_helper::get_function(&inst)?;
        Ok(inst)
    }

    /// Sign-extended immediate, zero when the format has none
    pub fn imm(&self) -> i32 {
        self.attributes.imm.unwrap_or(0) as i32
    }

    pub fn rd(&self) -> u32 {
        self.attributes.rd.unwrap_or(0)
    }

    pub fn rs1(&self) -> u32 {
        self.attributes.rs1.unwrap_or(0)
    }

    pub fn rs2(&self) -> u32 {
        self.attributes.rs2.unwrap_or(0)
    }
}

/// rv32i opcode
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Opcode {
    Lui,
    AuiPc,
    Jal,
    Jalr,
    Branch,
    Load,
    Store,
    Op,
    OpImm,
    MiscMem,
    System,
}

/// rv32i instruction format
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Format {
    R,
    I,
    S,
    B,
    U,
    J,
    Sys,
}

/// rv32i function (instruction?)
///
/// The discriminant indexes the descriptor table in [`table`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Function {
    LUI,
    AUIPC,
    JAL,
    JALR,
    BEQ,
    BNE,
    BLT,
    BGE,
    BLTU,
    BGEU,
    LB,
    LH,
    LW,
    LBU,
    LHU,
    SB,
    SH,
    SW,
    ADDI,
    SLTI,
    SLTIU,
    XORI,
    ORI,
    ANDI,
    SLLI,
    SRLI,
    SRAI,
    ADD,
    SUB,
    SLL,
    SLT,
    SLTU,
    XOR,
    SRL,
    SRA,
    OR,
    AND,
    FENCE,
    ECALL,
}

/// Instruction attributes
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Attributes {
    // Take all you need
    pub opcode: Option<u32>,
    pub rs1: Option<u32>,
    pub rs2: Option<u32>,
    pub rd: Option<u32>,
    pub funct3: Option<u32>,
    pub funct7: Option<u32>,
    pub imm: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_addi() {
        // addi x5, x6, -1
        let inst = Instruction::new(0xfff3_0293).unwrap();
        assert_eq!(inst.opcode, Opcode::OpImm);
        assert_eq!(inst.function, Function::ADDI);
        assert_eq!(inst.rd(), 5);
        assert_eq!(inst.rs1(), 6);
        assert_eq!(inst.imm(), -1);
    }

    #[test]
    fn test_decode_nop() {
        let inst = Instruction::new(NOP).unwrap();
        assert_eq!(inst.function, Function::ADDI);
        assert_eq!(inst.rd(), 0);
    }

    #[test]
    fn test_decode_branch_offset() {
        // beq x1, x2, -8
        let inst = Instruction::new(0xfe20_8ce3).unwrap();
        assert_eq!(inst.function, Function::BEQ);
        assert_eq!(inst.rs1(), 1);
        assert_eq!(inst.rs2(), 2);
        assert_eq!(inst.imm(), -8);
    }

    #[test]
    fn test_decode_sub_and_srai() {
        // sub x3, x1, x2
        assert_eq!(Instruction::new(0x4020_81b3).unwrap().function, Function::SUB);
        // srai x3, x1, 4
        let srai = Instruction::new(0x4040_d193).unwrap();
        assert_eq!(srai.function, Function::SRAI);
        assert_eq!(srai.imm() & 0x1f, 4);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(Instruction::new(0).is_err());
        assert!(Instruction::new(0xffff_ffff).is_err());
    }
}
