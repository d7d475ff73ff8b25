//! Fixed-capacity arena of instruction records.
//!
//! Records are addressed by [`InstRef`] handles carrying the slot index and
//! the uid stamped at allocation, so a handle outliving its record is
//! detected instead of silently aliasing whatever reuses the slot.

use crate::cpu::RegId;
use crate::error::{MemoryError, PipelineError};
use crate::instruction::table::OpFlags;

/// Completion cycle of a record that has not written back
pub const NOT_DONE: u64 = u64::MAX;

/// Handle to a pooled instruction record
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InstRef {
    slot: usize,
    uid: u64,
}

impl InstRef {
    pub fn slot(self) -> usize {
        self.slot
    }

    pub fn uid(self) -> u64 {
        self.uid
    }
}

/// Where the instruction is in the pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum InstStatus {
    Allocated,
    Fetched,
    Decoded,
    Executed,
    MemoryDone,
    Done,
}

/// One in-flight instruction
#[derive(Clone, Debug)]
pub struct InstRecord {
    /// Instruction number
    pub uid: u64,
    /// Instruction address
    pub pc: u32,
    /// Resolved next instruction address
    pub next_pc: u32,
    /// Instruction bits from memory
    pub inst: u32,
    /// Set when the bits could not be read; raised only if executed
    pub fetch_fault: Option<MemoryError>,
    pub mnemonic: &'static str,
    pub flags: OpFlags,
    /// If branch, is it taken?
    pub taken: bool,
    pub status: InstStatus,
    /// Producers of the source operands
    pub src: [Option<InstRef>; 3],
    /// Registers written by this instruction
    pub dst: [Option<RegId>; 2],
    pub stalled: bool,
    /// Functional execution already ran
    pub executed: bool,
    /// Cycle the destination operands became visible
    pub done_cycle: u64,
}

impl InstRecord {
    fn blank() -> Self {
        Self {
            uid: 0,
            pc: 0,
            next_pc: 0,
            inst: 0,
            fetch_fault: None,
            mnemonic: "",
            flags: OpFlags::empty(),
            taken: false,
            status: InstStatus::Allocated,
            src: [None; 3],
            dst: [None; 2],
            stalled: false,
            executed: false,
            done_cycle: NOT_DONE,
        }
    }
}

/// Instruction record allocator
pub struct InstPool {
    records: Vec<InstRecord>,
    live: Vec<bool>,
    free: Vec<usize>,
    allocations: u64,
    frees: u64,
}

impl InstPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: vec![InstRecord::blank(); capacity],
            live: vec![false; capacity],
            // Pop order hands out slot 0 first
            free: (0..capacity).rev().collect(),
            allocations: 0,
            frees: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.records.len()
    }

    /// Number of live records
    pub fn in_use(&self) -> usize {
        self.capacity() - self.free.len()
    }

    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    pub fn frees(&self) -> u64 {
        self.frees
    }

    /// Hands out a fresh record stamped with `uid` and `pc`.
    /// Running dry means a stage leaked a record.
    pub fn allocate(
        &mut self,
        uid: u64,
        pc: u32,
        cycle: u64,
    ) -> Result<InstRef, PipelineError> {
        let slot = self.free.pop().ok_or(PipelineError::PoolExhausted {
            capacity: self.capacity(),
            cycle,
        })?;
        self.live[slot] = true;
        self.allocations += 1;

        let record = &mut self.records[slot];
        *record = InstRecord::blank();
        record.uid = uid;
        record.pc = pc;
        Ok(InstRef { slot, uid })
    }

    /// Returns a record to the pool
    pub fn free(&mut self, handle: InstRef) -> Result<(), PipelineError> {
        if !self.is_live(handle) {
            return Err(PipelineError::DoubleFree(handle.slot));
        }
        self.live[handle.slot] = false;
        self.free.push(handle.slot);
        self.frees += 1;
        Ok(())
    }

    /// True while the record behind `handle` has not been freed
    pub fn is_live(&self, handle: InstRef) -> bool {
        handle.slot < self.records.len()
            && self.live[handle.slot]
            && self.records[handle.slot].uid == handle.uid
    }

    pub fn get(&self, handle: InstRef) -> Option<&InstRecord> {
        match self.is_live(handle) {
            true => Some(&self.records[handle.slot]),
            false => None,
        }
    }

    pub fn get_mut(&mut self, handle: InstRef) -> Option<&mut InstRecord> {
        match self.is_live(handle) {
            true => Some(&mut self.records[handle.slot]),
            false => None,
        }
    }

    /// Like [`InstPool::get`], for handles that must be live
    pub(crate) fn expect(&self, handle: InstRef) -> Result<&InstRecord, PipelineError> {
        self.get(handle)
            .ok_or(PipelineError::DanglingReference(handle.slot))
    }

    pub(crate) fn expect_mut(
        &mut self,
        handle: InstRef,
    ) -> Result<&mut InstRecord, PipelineError> {
        self.get_mut(handle)
            .ok_or(PipelineError::DanglingReference(handle.slot))
    }
}
