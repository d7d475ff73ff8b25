//! RAW hazard scoreboard: maps each register identifier to the
//! in-flight record that will produce its value.

use super::pool::InstRef;
use crate::cpu::RegId;

pub struct Scoreboard {
    producers: [Option<InstRef>; RegId::TOTAL],
}

impl Default for Scoreboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Scoreboard {
    pub fn new() -> Self {
        Self { producers: [None; RegId::TOTAL] }
    }

    /// Current producer of `reg`, if one is in flight
    pub fn producer(&self, reg: RegId) -> Option<InstRef> {
        self.producers[reg.index()]
    }

    /// Makes `inst` the producer of `reg`, replacing any older one
    pub fn set_producer(&mut self, reg: RegId, inst: InstRef) {
        self.producers[reg.index()] = Some(inst);
    }

    /// Drops the mapping for `reg` only if `inst` still owns it.
    /// Returns whether the entry was cleared.
    pub fn clear_if_match(&mut self, reg: RegId, inst: InstRef) -> bool {
        let slot = &mut self.producers[reg.index()];
        if *slot == Some(inst) {
            *slot = None;
            return true;
        }
        false
    }

    /// Registers with a pending producer
    pub fn pending(&self) -> impl Iterator<Item = (usize, InstRef)> + '_ {
        self.producers
            .iter()
            .enumerate()
            .filter_map(|(reg, producer)| producer.map(|p| (reg, p)))
    }
}
