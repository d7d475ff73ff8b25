//! Pipeline registers between the five stages

use super::pool::InstRef;

/// Number of pipeline registers
pub const PIPE_DEPTH: usize = 4;

/// Pipeline register, named after the stages it separates
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Latch {
    IfId,
    IdEx,
    ExMem,
    MemWb,
}

impl Latch {
    pub const ALL: [Latch; PIPE_DEPTH] =
        [Latch::IfId, Latch::IdEx, Latch::ExMem, Latch::MemWb];

    pub fn name(self) -> &'static str {
        match self {
            Latch::IfId => "IF/ID",
            Latch::IdEx => "ID/EX",
            Latch::ExMem => "EX/MEM",
            Latch::MemWb => "MEM/WB",
        }
    }
}

/// The four pipeline registers; each holds at most one record
#[derive(Clone, Debug, Default)]
pub struct Latches {
    slots: [Option<InstRef>; PIPE_DEPTH],
}

impl Latches {
    pub fn get(&self, latch: Latch) -> Option<InstRef> {
        self.slots[latch as usize]
    }

    pub fn is_empty(&self, latch: Latch) -> bool {
        self.slots[latch as usize].is_none()
    }

    /// Writes an empty latch
    pub fn put(&mut self, latch: Latch, inst: InstRef) {
        debug_assert!(self.is_empty(latch), "{} written twice", latch.name());
        self.slots[latch as usize] = Some(inst);
    }

    pub fn take(&mut self, latch: Latch) -> Option<InstRef> {
        self.slots[latch as usize].take()
    }

    /// Moves the occupant of `from` into `to`
    pub fn advance(&mut self, from: Latch, to: Latch) {
        if let Some(inst) = self.take(from) {
            self.put(to, inst);
        }
    }

    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Latch, Option<InstRef>)> + '_ {
        Latch::ALL.iter().map(|latch| (*latch, self.get(*latch)))
    }
}
