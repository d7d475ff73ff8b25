//! ALU implementation

/// Performs an atomic ALU operation.
/// Branch comparisons yield 1 when the branch is taken.
pub fn alu(op: ALUOp, op1: i32, op2: i32) -> i32 {
    let shamt = (op2 as u32) & 0x1f;
    match op {
        ALUOp::ADD => op1.wrapping_add(op2),
        ALUOp::SUB => op1.wrapping_sub(op2),
        ALUOp::AND => op1 & op2,
        ALUOp::OR => op1 | op2,
        ALUOp::XOR => op1 ^ op2,
        ALUOp::BEQ => (op1 == op2) as i32,
        ALUOp::BNE => (op1 != op2) as i32,
        ALUOp::BLT => (op1 < op2) as i32,
        ALUOp::BLTU => ((op1 as u32) < (op2 as u32)) as i32,
        ALUOp::BGE => (op1 >= op2) as i32,
        ALUOp::BGEU => ((op1 as u32) >= (op2 as u32)) as i32,
        ALUOp::SLL => op1.wrapping_shl(shamt),
        ALUOp::SRL => ((op1 as u32) >> shamt) as i32,
        ALUOp::SRA => op1 >> shamt,
        ALUOp::SLT => (op1 < op2) as i32,
        ALUOp::SLTU => ((op1 as u32) < (op2 as u32)) as i32,
    }
}

/// Set of ALU operations needed for rv32i
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum ALUOp {
    // Arithmetic
    #[default]
    ADD,
    SUB,
    // Logical
    AND,
    OR,
    XOR,
    // Set
    SLT,
    SLTU,
    // Shift
    SLL,
    SRL,
    SRA,
    // Branch
    BEQ,
    BNE,
    BLT,
    BGE,
    BLTU,
    BGEU,
}
