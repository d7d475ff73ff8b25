//! The five stage engines.
//!
//! Each stage either moves its resident record into the next latch, stalls
//! (leaving everything in place, which blocks the stage behind it), or sees
//! a bubble. The driver calls them tail-to-head so a stage always observes
//! the vacancy its downstream neighbour created this cycle.

use tracing::{debug, trace};

use super::latch::Latch;
use super::pool::{InstRef, InstStatus};
use super::Pipeline;
use crate::error::{ExecutionError, PipelineError, SimulatorResult};
use crate::functional::FunctionalCore;
use crate::instruction::table::OpFlags;
use crate::instruction::INST_WIDTH;

/// IF stage
pub fn fetch<C: FunctionalCore>(
    pipe: &mut Pipeline,
    core: &mut C,
) -> SimulatorResult<()> {
    if !pipe.latches.is_empty(Latch::IfId) {
        return Ok(()); // pipeline is stalled
    }
    if pipe.draining {
        return Ok(());
    }

    let uid = pipe.next_uid;
    pipe.next_uid += 1;
    let handle = pipe.pool.allocate(uid, pipe.fetch_pc, pipe.cycle)?;

    // Get the instruction bits from the instruction memory
    let bits = core.fetch(pipe.fetch_pc);

    if let Some(target) = pipe.redirect.take() {
        // Wrong path: drop the record and leave IF/ID empty
        trace!(
            "cycle {}: squash fetch @ {:#010x}, redirect to {:#010x}",
            pipe.cycle,
            pipe.fetch_pc,
            target
        );
        pipe.fetch_pc = target;
        pipe.pool.free(handle)?;
        pipe.stats.sim_num_squashed += 1;
        return Ok(());
    }

    let record = pipe.pool.expect_mut(handle)?;
    match bits {
        Ok(bits) => record.inst = bits,
        Err(fault) => record.fetch_fault = Some(fault),
    }
    record.status = InstStatus::Fetched;
    pipe.fetch_pc = pipe.fetch_pc.wrapping_add(INST_WIDTH);
    pipe.latches.put(Latch::IfId, handle);
    Ok(())
}

/// ID stage: functional execution, dependence tracking and branch resolution
pub fn decode<C: FunctionalCore>(
    pipe: &mut Pipeline,
    core: &mut C,
) -> SimulatorResult<()> {
    if !pipe.latches.is_empty(Latch::IdEx) {
        return Ok(()); // stall
    }
    let Some(handle) = pipe.latches.get(Latch::IfId) else {
        return Ok(()); // bubble
    };

    // Fetch stops in the cycle draining starts, so a resident record
    // that has not executed is always on the committed path
    if !pipe.pool.expect(handle)?.executed {
        execute_once(pipe, core, handle)?;
    }

    // Check for RAW hazards
    let (uid, src) = {
        let record = pipe.pool.expect(handle)?;
        (record.uid, record.src)
    };
    for producer in src.iter().flatten() {
        // A producer that is no longer live has written back
        let Some(producer) = pipe.pool.get(*producer) else {
            continue;
        };
        if producer.done_cycle > pipe.cycle {
            trace!(
                "cycle {}: uid {} stalled on uid {}",
                pipe.cycle,
                uid,
                producer.uid
            );
            pipe.pool.expect_mut(handle)?.stalled = true;
            pipe.stats.sim_stall_cycles += 1;
            return Ok(());
        }
    }

    let record = pipe.pool.expect_mut(handle)?;
    if record.taken {
        trace!(
            "cycle {}: uid {} taken, redirect to {:#010x}",
            pipe.cycle,
            record.uid,
            record.next_pc
        );
        pipe.redirect = Some(record.next_pc);
    }
    record.stalled = false;
    record.status = InstStatus::Decoded;
    pipe.latches.advance(Latch::IfId, Latch::IdEx);
    Ok(())
}

/// Runs the functional core for the record in decode. Must happen
/// exactly once per record, however long it later stalls.
fn execute_once<C: FunctionalCore>(
    pipe: &mut Pipeline,
    core: &mut C,
    handle: InstRef,
) -> SimulatorResult<()> {
    let record = pipe.pool.expect(handle)?;
    let (pc, bits) = (record.pc, record.inst);

    let arch_pc = core.pc();
    if pc != arch_pc {
        return Err(PipelineError::PcMismatch { record: pc, arch: arch_pc }.into());
    }
    if let Some(source) = record.fetch_fault {
        return Err(ExecutionError::Fault { pc, source }.into());
    }

    let decoded = core.decode(bits, pc)?;
    let executed = core.execute(&decoded)?;

    // Keep an instruction count
    pipe.stats.sim_num_insn += 1;
    debug!(
        "{:>10} [xor: {:#010x}] @ {:#010x}: {}{}",
        pipe.stats.sim_num_insn,
        core.fingerprint(),
        pc,
        core.disassemble(bits, pc),
        executed
            .mem_addr
            .map(|addr| format!("  mem: {:#010x}", addr))
            .unwrap_or_default()
    );

    if decoded.flags.contains(OpFlags::MEM) {
        pipe.stats.sim_num_refs += 1;
        if decoded.flags.contains(OpFlags::STORE) {
            pipe.stats.sim_num_stores += 1;
        } else {
            pipe.stats.sim_num_loads += 1;
        }
    }

    // Record dependencies on instructions already in the pipeline,
    // then claim the destinations
    let src = decoded
        .sources
        .map(|reg| reg.and_then(|reg| pipe.scoreboard.producer(reg)));
    for reg in decoded.destinations.iter().flatten() {
        pipe.scoreboard.set_producer(*reg, handle);
    }

    let taken = decoded.flags.contains(OpFlags::CTRL)
        && executed.next_pc != pc.wrapping_add(INST_WIDTH);
    if decoded.flags.contains(OpFlags::CTRL) {
        pipe.stats.sim_num_branches += 1;
        pipe.stats.sim_num_taken += taken as u64;
    }

    let record = pipe.pool.expect_mut(handle)?;
    record.next_pc = executed.next_pc;
    record.mnemonic = decoded.mnemonic;
    record.flags = decoded.flags;
    record.src = src;
    record.dst = decoded.destinations;
    record.taken = taken;
    record.executed = true;

    if let Some(code) = executed.exit {
        debug!("program exited with code {} at cycle {}", code, pipe.cycle);
        pipe.exit_code = Some(code);
        pipe.draining = true;
    }
    if pipe.budget_exhausted() {
        pipe.draining = true;
    }
    Ok(())
}

/// EX stage
pub fn execute(pipe: &mut Pipeline) -> SimulatorResult<()> {
    pass_through(pipe, Latch::IdEx, Latch::ExMem, InstStatus::Executed)
}

/// MEM stage
pub fn memory(pipe: &mut Pipeline) -> SimulatorResult<()> {
    pass_through(pipe, Latch::ExMem, Latch::MemWb, InstStatus::MemoryDone)
}

/// Timing-only stage: occupy one cycle of depth, then move on
fn pass_through(
    pipe: &mut Pipeline,
    input: Latch,
    output: Latch,
    status: InstStatus,
) -> SimulatorResult<()> {
    if !pipe.latches.is_empty(output) {
        return Ok(()); // stall
    }
    let Some(handle) = pipe.latches.get(input) else {
        return Ok(()); // bubble
    };
    let record = pipe.pool.expect_mut(handle)?;
    record.stalled = false;
    record.status = status;
    pipe.latches.advance(input, output);
    Ok(())
}

/// WB stage: release scoreboard ownership and retire the record
pub fn writeback(pipe: &mut Pipeline) -> SimulatorResult<()> {
    let Some(handle) = pipe.latches.take(Latch::MemWb) else {
        return Ok(()); // bubble
    };

    let cycle = pipe.cycle;
    let record = pipe.pool.expect_mut(handle)?;
    // A younger writer of the same register keeps its mapping
    for reg in record.dst.iter().flatten() {
        pipe.scoreboard.clear_if_match(*reg, handle);
    }
    record.done_cycle = cycle;
    record.status = InstStatus::Done;
    pipe.pool.free(handle)?;
    Ok(())
}
