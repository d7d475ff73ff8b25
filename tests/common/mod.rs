//! Hand assembler for rv32i and a pipeline harness
#![allow(dead_code)]

use sim_lib::cpu::CPUState;
use sim_lib::error::SimulatorResult;
use sim_lib::functional::Rv32iCore;
use sim_lib::loader;
use sim_lib::memory::mmu::MMU;
use sim_lib::pipelined::Pipeline;
use sim_lib::run_wrapper::{STACK_BASE, STACK_SIZE};

pub const BASE: u32 = 0x1000;

pub const SP: u32 = 2;
pub const A0: u32 = 10;
pub const A7: u32 = 17;

fn i_type(imm: i32, rs1: u32, funct3: u32, rd: u32, opcode: u32) -> u32 {
    ((imm as u32 & 0xfff) << 20) | (rs1 << 15) | (funct3 << 12) | (rd << 7) | opcode
}

fn r_type(funct7: u32, rs2: u32, rs1: u32, funct3: u32, rd: u32) -> u32 {
    (funct7 << 25) | (rs2 << 20) | (rs1 << 15) | (funct3 << 12) | (rd << 7) | 0x33
}

fn b_type(imm: i32, rs2: u32, rs1: u32, funct3: u32) -> u32 {
    let imm = imm as u32;
    (((imm >> 12) & 1) << 31)
        | (((imm >> 5) & 0x3f) << 25)
        | (rs2 << 20)
        | (rs1 << 15)
        | (funct3 << 12)
        | (((imm >> 1) & 0xf) << 8)
        | (((imm >> 11) & 1) << 7)
        | 0x63
}

pub fn addi(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(imm, rs1, 0b000, rd, 0x13)
}

pub fn add(rd: u32, rs1: u32, rs2: u32) -> u32 {
    r_type(0, rs2, rs1, 0b000, rd)
}

pub fn sub(rd: u32, rs1: u32, rs2: u32) -> u32 {
    r_type(0b0100000, rs2, rs1, 0b000, rd)
}

pub fn lui(rd: u32, imm: u32) -> u32 {
    (imm & 0xffff_f000) | (rd << 7) | 0x37
}

pub fn lw(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(imm, rs1, 0b010, rd, 0x03)
}

pub fn sw(rs2: u32, rs1: u32, imm: i32) -> u32 {
    let imm = imm as u32;
    (((imm >> 5) & 0x7f) << 25)
        | (rs2 << 20)
        | (rs1 << 15)
        | (0b010 << 12)
        | ((imm & 0x1f) << 7)
        | 0x23
}

pub fn beq(rs1: u32, rs2: u32, offset: i32) -> u32 {
    b_type(offset, rs2, rs1, 0b000)
}

pub fn bne(rs1: u32, rs2: u32, offset: i32) -> u32 {
    b_type(offset, rs2, rs1, 0b001)
}

pub fn jal(rd: u32, offset: i32) -> u32 {
    let imm = offset as u32;
    (((imm >> 20) & 1) << 31)
        | (((imm >> 1) & 0x3ff) << 21)
        | (((imm >> 11) & 1) << 20)
        | (((imm >> 12) & 0xff) << 12)
        | (rd << 7)
        | 0x6f
}

pub fn ecall() -> u32 {
    0x0000_0073
}

/// `a0 = code; exit`
pub fn exit_with(code: i32) -> [u32; 3] {
    [addi(A7, 0, 3), addi(A0, 0, code), ecall()]
}

/// `count` instructions with no register dependencies
pub fn independent(count: usize) -> Vec<u32> {
    (0..count).map(|i| addi(5 + (i % 20) as u32, 0, i as i32)).collect()
}

pub struct Harness {
    pub pipe: Pipeline,
    pub core: Rv32iCore,
}

impl Harness {
    pub fn new(words: &[u32], pool_capacity: usize, max_insts: u64) -> Self {
        let mut cpu = CPUState::make();
        let mut mem = MMU::make();
        loader::set_stack(&mut cpu, &mut mem, STACK_BASE, STACK_SIZE);
        loader::load_image(&mut cpu, &mut mem, BASE, words).unwrap();
        Self {
            pipe: Pipeline::with_capacity(pool_capacity, max_insts, BASE),
            core: Rv32iCore::new(cpu, mem),
        }
    }

    /// Runs to completion, checking the structural invariants at every
    /// cycle boundary
    pub fn run(&mut self) -> SimulatorResult<()> {
        self.pipe.run_with(&mut self.core, |pipe, _| {
            check_invariants(pipe);
            Ok(())
        })
    }
}

pub fn check_invariants(pipe: &Pipeline) {
    let pool = pipe.pool();
    let occupants: Vec<_> = pipe.latches().iter().filter_map(|(_, h)| h).collect();

    // Each record sits in exactly one latch, and nothing else is allocated
    for (i, a) in occupants.iter().enumerate() {
        assert!(pool.is_live(*a), "cycle {}: dead record in a latch", pipe.cycle());
        assert!(
            occupants[i + 1..].iter().all(|b| b != a),
            "cycle {}: record in two latches",
            pipe.cycle()
        );
    }
    assert_eq!(pool.in_use(), occupants.len(), "cycle {}: leaked record", pipe.cycle());
    assert_eq!(pool.allocations(), pool.frees() + pool.in_use() as u64);

    // Producers are always in flight
    for (reg, producer) in pipe.scoreboard().pending() {
        assert!(pool.is_live(producer), "cycle {}: stale producer of r{}", pipe.cycle(), reg);
    }

    // Anything past decode has seen all its producers write back
    if let Some(record) = pipe.latch(sim_lib::pipelined::latch::Latch::IdEx) {
        for src in record.src.iter().flatten() {
            assert!(
                !pool.is_live(*src),
                "cycle {}: uid {} left decode early",
                pipe.cycle(),
                record.uid
            );
        }
    }
}
