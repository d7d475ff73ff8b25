mod common;

use common::*;
use pretty_assertions::assert_eq;

use sim_lib::error::{ExecutionError, PipelineError, SimulatorError};
use sim_lib::pipelined::display::InstClass;
use sim_lib::pipelined::latch::Latch;

#[test]
fn test_independent_instructions_fill_then_retire_one_per_cycle() {
    let mut h = Harness::new(&independent(8), 32, 3);
    h.run().unwrap();
    assert_eq!(h.pipe.stats().sim_num_insn, 3);
    assert_eq!(h.pipe.cycle(), 7);
    assert_eq!(h.pipe.stats().sim_stall_cycles, 0);
}

#[test]
fn test_taken_jump_costs_one_cycle() {
    let program = [
        addi(5, 0, 1),
        jal(0, 8),
        addi(6, 0, 1), // skipped
        addi(7, 0, 1),
        addi(8, 0, 1),
        addi(9, 0, 1),
    ];
    let mut h = Harness::new(&program, 32, 4);
    h.run().unwrap();
    let stats = h.pipe.stats();
    assert_eq!(stats.sim_num_insn, 4);
    assert_eq!(stats.sim_num_taken, 1);
    assert_eq!(h.pipe.cycle(), 4 + 4 + 1);
    // The wrong-path instruction never touched the register file
    assert_eq!(h.core.cpu.read_gpr(6), 0);
    assert_eq!(h.core.cpu.read_gpr(8), 1);
}

#[test]
fn test_not_taken_branch_is_free() {
    let program = [addi(5, 0, 1), bne(0, 0, 12), addi(6, 0, 1), addi(7, 0, 1)];
    let mut h = Harness::new(&program, 32, 4);
    h.run().unwrap();
    assert_eq!(h.pipe.stats().sim_num_branches, 1);
    assert_eq!(h.pipe.stats().sim_num_taken, 0);
    assert_eq!(h.pipe.cycle(), 8);
    assert_eq!(h.core.cpu.read_gpr(6), 1);
}

#[test]
fn test_dependent_pair_waits_for_writeback() {
    let program = [addi(5, 0, 21), add(6, 5, 5), addi(7, 0, 0)];
    let mut h = Harness::new(&program, 32, 2);
    h.run().unwrap();
    assert_eq!(h.pipe.stats().sim_stall_cycles, 2);
    assert_eq!(h.pipe.cycle(), 4 + 2 + 2);
    assert_eq!(h.core.cpu.read_gpr(6), 42);
}

#[test]
fn test_consumer_stays_in_decode_until_producer_retires() {
    let program = [addi(5, 0, 1), add(6, 5, 0), addi(7, 0, 0)];
    let mut h = Harness::new(&program, 32, 0);
    let mut stalled_cycles = Vec::new();
    h.pipe
        .run_with(&mut h.core, |pipe, _| {
            check_invariants(pipe);
            if let Some(record) = pipe.latch(Latch::IfId) {
                if record.stalled {
                    stalled_cycles.push(pipe.cycle());
                    assert!(pipe.latch(Latch::IdEx).is_none());
                }
            }
            Ok(())
        })
        .unwrap_err();
    assert_eq!(stalled_cycles, vec![3, 4]);
}

#[test]
fn test_independent_chain_approaches_unit_cpi() {
    let mut h = Harness::new(&independent(500), 32, 400);
    h.run().unwrap();
    let stats = h.pipe.stats();
    assert_eq!(stats.sim_num_insn, 400);
    assert_eq!(stats.sim_cycles, 404);
    assert!(stats.cpi() < 1.02);
}

#[test]
fn test_memory_round_trip_and_exit() {
    let mut program = vec![
        addi(5, 0, 9),
        sw(5, SP, -4),
        lw(6, SP, -4),
        add(7, 6, 6),
        addi(A7, 0, 3),
        addi(A0, 7, 0),
        ecall(),
    ];
    program.extend(independent(4));
    let mut h = Harness::new(&program, 32, 0);
    h.run().unwrap();

    assert_eq!(h.pipe.exit_code(), Some(18));
    let stats = h.pipe.stats();
    assert_eq!(stats.sim_num_insn, 7);
    assert_eq!(stats.sim_num_refs, 2);
    assert_eq!(stats.sim_num_loads, 1);
    assert_eq!(stats.sim_num_stores, 1);
    assert_eq!(h.pipe.pool().in_use(), 0);
}

#[test]
fn test_exit_code_reaches_the_pipeline() {
    let mut program = vec![addi(5, 0, 50), addi(6, 0, 8), sub(7, 5, 6)];
    program.extend(exit_with(42));
    program.extend(independent(2));
    let mut h = Harness::new(&program, 32, 0);
    h.run().unwrap();
    assert_eq!(h.pipe.exit_code(), Some(42));
    assert_eq!(h.core.cpu.read_gpr(7), 42);
    assert_eq!(h.pipe.stats().sim_num_insn, 6);
    // Nothing behind the ecall is fetched once the exit executes
    assert_eq!(h.pipe.pool().allocations(), 6);
}

#[test]
fn test_counted_loop() {
    // x5 = 5; do { x6 += 2; x5 -= 1 } while x5 != 0; exit(x6)
    let mut program = vec![
        addi(5, 0, 5),
        addi(6, 6, 2),
        addi(5, 5, -1),
        bne(5, 0, -8),
        addi(A0, 6, 0),
    ];
    program.extend_from_slice(&[addi(A7, 0, 3), ecall()]);
    let mut h = Harness::new(&program, 32, 0);
    h.run().unwrap();
    assert_eq!(h.pipe.exit_code(), Some(10));
    assert_eq!(h.pipe.stats().sim_num_branches, 5);
    assert_eq!(h.pipe.stats().sim_num_taken, 4);
}

#[test]
fn test_snapshot_classes() {
    let program = [lw(5, SP, -4), beq(0, 0, 8), addi(6, 0, 0), bne(0, 0, 8), addi(7, 0, 0)];
    let mut h = Harness::new(&program, 32, 4);
    let mut classes = Vec::new();
    h.pipe
        .run_with(&mut h.core, |pipe, core| {
            if let Some(view) = pipe.snapshot(&*core).get(Latch::IdEx) {
                classes.push(view.class);
            }
            Ok(())
        })
        .unwrap();
    assert_eq!(
        classes,
        vec![InstClass::Load, InstClass::BranchTaken, InstClass::BranchNotTaken, InstClass::Other]
    );
}

#[test]
fn test_load_fault_is_fatal() {
    let program = [lui(5, 0x4000_0000), lw(6, 5, 0), addi(7, 0, 0)];
    let mut h = Harness::new(&program, 32, 0);
    let err = h.run().unwrap_err();
    match err {
        SimulatorError::ExecutionError(ExecutionError::Fault { pc, .. }) => {
            assert_eq!(pc, BASE + 4)
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_running_off_the_image_is_fatal() {
    let mut h = Harness::new(&independent(2), 32, 0);
    // The image ends mid-page; the zero word after it does not decode
    let err = h.run().unwrap_err();
    assert!(matches!(err, SimulatorError::InvalidInstructionError(0, pc) if pc == BASE + 8));
}

#[test]
fn test_small_pool_is_exhausted() {
    let mut h = Harness::new(&independent(16), 3, 0);
    let err = h.run().unwrap_err();
    assert!(matches!(
        err,
        SimulatorError::PipelineError(PipelineError::PoolExhausted { capacity: 3, .. })
    ));
}

#[test]
fn test_pool_of_pipe_depth_is_enough() {
    let mut h = Harness::new(&independent(64), 4, 60);
    h.run().unwrap();
    assert_eq!(h.pipe.stats().sim_num_insn, 60);
    assert_eq!(h.pipe.pool().allocations(), h.pipe.pool().frees());
}
