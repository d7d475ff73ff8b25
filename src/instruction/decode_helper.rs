//! Decoding helper functions: field extraction, format and mnemonic lookup

use super::Attributes;
use super::Format;
use super::Function;
use super::Instruction;
use super::Opcode;
use crate::error::SimulatorError;
use crate::error::SimulatorResult;

/// Sign-extends the raw immediate according to its format width
pub fn get_imm_sign_extended(inst: &Instruction) -> Option<u32> {
    let shamt = match inst.opcode {
        Opcode::Lui | Opcode::AuiPc => 0,
        Opcode::Jal => 11,
        Opcode::Branch => 19,
        _ => 20,
    };

    inst.attributes.imm.map(|v| (((v as i32) << shamt) >> shamt) as u32)
}

/// Determines an instruction's mnemonic, e.g., JAL, XOR, or SRA
pub fn get_function(inst: &Instruction) -> SimulatorResult<Function> {
    use Function::*;
    use Opcode::*;

    let invalid = || SimulatorError::InvalidInstructionError(inst.raw_inst, 0);

    // Opcode-determined ones
    match inst.opcode {
        Lui => return Ok(LUI),
        AuiPc => return Ok(AUIPC),
        Jal => return Ok(JAL),
        MiscMem => return Ok(FENCE),
        System if inst.raw_inst >> 7 == 0 => return Ok(ECALL),
        System => return Err(invalid()),
        _ => {}
    }

    let funct3 = inst.attributes.funct3.ok_or_else(invalid)?;
    let funct7_bit = (inst.raw_inst & 0x4000_0000) >> 30;

    Ok(match (inst.opcode, funct3, funct7_bit) {
        (Jalr, 0b000, _) => JALR,
        (Branch, 0b000, _) => BEQ,
        (Branch, 0b001, _) => BNE,
        (Branch, 0b100, _) => BLT,
        (Branch, 0b101, _) => BGE,
        (Branch, 0b110, _) => BLTU,
        (Branch, 0b111, _) => BGEU,
        (Load, 0b000, _) => LB,
        (Load, 0b001, _) => LH,
        (Load, 0b010, _) => LW,
        (Load, 0b100, _) => LBU,
        (Load, 0b101, _) => LHU,
        (Store, 0b000, _) => SB,
        (Store, 0b001, _) => SH,
        (Store, 0b010, _) => SW,
        (OpImm, 0b000, _) => ADDI,
        (OpImm, 0b010, _) => SLTI,
        (OpImm, 0b011, _) => SLTIU,
        (OpImm, 0b100, _) => XORI,
        (OpImm, 0b110, _) => ORI,
        (OpImm, 0b111, _) => ANDI,
        (OpImm, 0b001, _) => SLLI,
        (OpImm, 0b101, 0b0) => SRLI,
        (OpImm, 0b101, 0b1) => SRAI,
        (Op, 0b000, 0b0) => ADD,
        (Op, 0b000, 0b1) => SUB,
        (Op, 0b001, _) => SLL,
        (Op, 0b010, _) => SLT,
        (Op, 0b011, _) => SLTU,
        (Op, 0b100, _) => XOR,
        (Op, 0b101, 0b0) => SRL,
        (Op, 0b101, 0b1) => SRA,
        (Op, 0b110, _) => OR,
        (Op, 0b111, _) => AND,
        _ => return Err(invalid()),
    })
}

/// Returns the opcode from a raw instruction
pub fn raw_to_opcode(raw_inst: u32) -> SimulatorResult<Opcode> {
    match get_opcode(raw_inst) {
        0x37 => Ok(Opcode::Lui),
        0x17 => Ok(Opcode::AuiPc),
        0x6f => Ok(Opcode::Jal),
        0x67 => Ok(Opcode::Jalr),
        0x63 => Ok(Opcode::Branch),
        0x03 => Ok(Opcode::Load),
        0x23 => Ok(Opcode::Store),
        0x33 => Ok(Opcode::Op),
        0x13 => Ok(Opcode::OpImm),
        0x0f => Ok(Opcode::MiscMem),
        0x73 => Ok(Opcode::System),
        _ => Err(SimulatorError::InvalidInstructionError(raw_inst, 0)),
    }
}

/// Returns the instruction format from an opcode
pub fn opcode_to_format(opcode: Opcode) -> Format {
    match opcode {
        Opcode::Lui | Opcode::AuiPc => Format::U,
        Opcode::Jal => Format::J,
        Opcode::Jalr | Opcode::Load | Opcode::OpImm | Opcode::MiscMem => {
            Format::I
        }
        Opcode::Branch => Format::B,
        Opcode::Store => Format::S,
        Opcode::Op => Format::R,
        Opcode::System => Format::Sys,
    }
}

/// Splits the raw word into the fields its format defines.
/// The immediate is left unextended.
pub fn parse_attributes(format: Format, raw_inst: u32) -> Attributes {
    match format {
        Format::R => parse_format_r(raw_inst),
        Format::I => parse_format_i(raw_inst),
        Format::S => parse_format_s(raw_inst),
        Format::B => parse_format_b(raw_inst),
        Format::U => parse_format_u(raw_inst),
        Format::J => parse_format_j(raw_inst),
        Format::Sys => parse_format_sys(raw_inst),
    }
}

fn parse_format_r(raw_inst: u32) -> Attributes {
    Attributes {
        opcode: Some(get_opcode(raw_inst)),
        rs1: Some(get_rs1(raw_inst)),
        rs2: Some(get_rs2(raw_inst)),
        rd: Some(get_rd(raw_inst)),
        funct3: Some(get_funct3(raw_inst)),
        funct7: Some(get_funct7(raw_inst)),
        imm: None,
    }
}

fn parse_format_i(raw_inst: u32) -> Attributes {
    let funct3 = get_funct3(raw_inst);
    // Shift-immediates keep the shamt where rs2 would be
    let is_shift = get_opcode(raw_inst) == 0x13 && matches!(funct3, 0b001 | 0b101);
    Attributes {
        opcode: Some(get_opcode(raw_inst)),
        rs1: Some(get_rs1(raw_inst)),
        rs2: None,
        rd: Some(get_rd(raw_inst)),
        funct3: Some(funct3),
        funct7: None,
        imm: Some(match is_shift {
            true => get_rs2(raw_inst),
            false => raw_inst >> 20,
        }),
    }
}

fn parse_format_s(raw_inst: u32) -> Attributes {
    Attributes {
        opcode: Some(get_opcode(raw_inst)),
        rs1: Some(get_rs1(raw_inst)),
        rs2: Some(get_rs2(raw_inst)),
        rd: None,
        funct3: Some(get_funct3(raw_inst)),
        funct7: None,
        imm: Some(((raw_inst >> 25) << 5) | get_rd(raw_inst)),
    }
}

fn parse_format_b(raw_inst: u32) -> Attributes {
    Attributes {
        opcode: Some(get_opcode(raw_inst)),
        rs1: Some(get_rs1(raw_inst)),
        rs2: Some(get_rs2(raw_inst)),
        rd: None,
        funct3: Some(get_funct3(raw_inst)),
        funct7: None,
        imm: Some(
            ((raw_inst & 0x8000_0000) >> 19)
                | ((raw_inst & 0x80) << 4)
                | ((raw_inst & 0x7e00_0000) >> 20)
                | ((raw_inst & 0xf00) >> 7),
        ),
    }
}

fn parse_format_u(raw_inst: u32) -> Attributes {
    Attributes {
        opcode: Some(get_opcode(raw_inst)),
        rd: Some(get_rd(raw_inst)),
        imm: Some(raw_inst & 0xffff_f000),
        ..Attributes::default()
    }
}

fn parse_format_j(raw_inst: u32) -> Attributes {
    Attributes {
        opcode: Some(get_opcode(raw_inst)),
        rd: Some(get_rd(raw_inst)),
        imm: Some(
            ((raw_inst & 0x8000_0000) >> 11)
                | (raw_inst & 0xf_f000)
                | ((raw_inst & 0x10_0000) >> 9)
                | ((raw_inst & 0x7fe0_0000) >> 20),
        ),
        ..Attributes::default()
    }
}

/// ecall reads a0 and a7, writes a0
fn parse_format_sys(raw_inst: u32) -> Attributes {
    Attributes {
        opcode: Some(get_opcode(raw_inst)),
        rs1: Some(10),
        rs2: Some(17),
        rd: Some(10),
        ..Attributes::default()
    }
}

fn get_opcode(raw_inst: u32) -> u32 {
    raw_inst & 0x7f
}

fn get_funct3(raw_inst: u32) -> u32 {
    (raw_inst >> 12) & 0x7
}

fn get_rs1(raw_inst: u32) -> u32 {
    (raw_inst >> 15) & 0x1f
}

fn get_rs2(raw_inst: u32) -> u32 {
    (raw_inst >> 20) & 0x1f
}

fn get_rd(raw_inst: u32) -> u32 {
    (raw_inst >> 7) & 0x1f
}

fn get_funct7(raw_inst: u32) -> u32 {
    (raw_inst >> 25) & 0x7f
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jal_offset_is_sign_extended() {
        // jal x1, -4
        let inst = Instruction::new(0xffdf_f0ef).unwrap();
        assert_eq!(inst.function, Function::JAL);
        assert_eq!(inst.rd(), 1);
        assert_eq!(inst.imm(), -4);
    }

    #[test]
    fn test_store_offset() {
        // sw x2, -4(x1)
        let inst = Instruction::new(0xfe20_ae23).unwrap();
        assert_eq!(inst.function, Function::SW);
        assert_eq!(inst.rs1(), 1);
        assert_eq!(inst.rs2(), 2);
        assert_eq!(inst.imm(), -4);
    }

    #[test]
    fn test_ecall_operands() {
        let inst = Instruction::new(0x0000_0073).unwrap();
        assert_eq!(inst.function, Function::ECALL);
        assert_eq!(inst.attributes.rs1, Some(10));
        assert_eq!(inst.attributes.rs2, Some(17));
        // ebreak is not supported
        assert!(Instruction::new(0x0010_0073).is_err());
    }

    #[test]
    fn test_lui_keeps_upper_bits() {
        // lui x5, 0x12345
        let inst = Instruction::new(0x1234_52b7).unwrap();
        assert_eq!(inst.function, Function::LUI);
        assert_eq!(inst.imm() as u32, 0x1234_5000);
    }
}
