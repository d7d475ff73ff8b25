//! Diagnostic view of the pipeline latches at a cycle boundary

use std::fmt;

use super::latch::{Latch, PIPE_DEPTH};
use super::pool::InstRecord;
use super::Pipeline;
use crate::functional::FunctionalCore;
use crate::instruction::table::OpFlags;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstClass {
    Load,
    BranchTaken,
    BranchNotTaken,
    Other,
}

impl InstClass {
    fn of(record: &InstRecord) -> Self {
        if record.flags.contains(OpFlags::LOAD) {
            InstClass::Load
        } else if record.flags.contains(OpFlags::CTRL) {
            match record.taken {
                true => InstClass::BranchTaken,
                false => InstClass::BranchNotTaken,
            }
        } else {
            InstClass::Other
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            InstClass::Load => "L",
            InstClass::BranchTaken => "BT",
            InstClass::BranchNotTaken => "BN",
            InstClass::Other => "",
        }
    }
}

/// One occupied latch
#[derive(Clone, Debug, PartialEq)]
pub struct LatchView {
    pub uid: u64,
    pub pc: u32,
    pub class: InstClass,
    pub text: String,
    pub stalled: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PipelineSnapshot {
    pub cycle: u64,
    pub fetch_pc: u32,
    pub latches: [(Latch, Option<LatchView>); PIPE_DEPTH],
}

impl PipelineSnapshot {
    pub fn get(&self, latch: Latch) -> Option<&LatchView> {
        self.latches[latch as usize].1.as_ref()
    }
}

impl Pipeline {
    /// Captures the four latches, disassembling through `core`
    pub fn snapshot<C: FunctionalCore>(&self, core: &C) -> PipelineSnapshot {
        let view = |latch: Latch| {
            self.latch(latch).map(|record| LatchView {
                uid: record.uid,
                pc: record.pc,
                class: InstClass::of(record),
                text: match record.fetch_fault {
                    Some(_) => "<fetch fault>".to_string(),
                    None => core.disassemble(record.inst, record.pc),
                },
                stalled: record.stalled,
            })
        };
        PipelineSnapshot {
            cycle: self.cycle,
            fetch_pc: self.fetch_pc,
            latches: Latch::ALL.map(|latch| (latch, view(latch))),
        }
    }
}

impl fmt::Display for PipelineSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "** cycle {}, fetch PC {:#010x} **", self.cycle, self.fetch_pc)?;
        for (latch, view) in &self.latches {
            write!(f, "  {:<7}", latch.name())?;
            match view {
                None => writeln!(f, "<bubble>")?,
                Some(view) => {
                    write!(
                        f,
                        "#{:<6} {:<2} {:#010x}  {}",
                        view.uid,
                        view.class.tag(),
                        view.pc,
                        view.text
                    )?;
                    if view.stalled {
                        write!(f, "  *** stalled ***")?;
                    }
                    writeln!(f)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::CPUState;
    use crate::functional::Rv32iCore;
    use crate::memory::mmu::MMU;
    use crate::memory::Memory;

    // addi x1, x0, 1 ; add x2, x1, x1 ; beq x0, x0, 8
    const PROGRAM: [u32; 3] = [0x0010_0093, 0x0010_8133, 0x0000_0463];

    fn core() -> Rv32iCore {
        let mut mem = MMU::make();
        mem.allocate_range(0, 0x100);
        for (i, word) in PROGRAM.iter().enumerate() {
            mem.set32(i as u32 * 4, *word).unwrap();
        }
        let mut cpu = CPUState::make();
        cpu.set_entry(0);
        Rv32iCore::new(cpu, mem)
    }

    #[test]
    fn test_snapshot_marks_stalled_consumer() {
        let mut core = core();
        let mut pipe = Pipeline::with_capacity(8, 0, 0);
        for _ in 0..3 {
            pipe.step(&mut core).unwrap();
        }
        let snap = pipe.snapshot(&core);
        let consumer = snap.get(Latch::IfId).unwrap();
        assert_eq!(consumer.uid, 2);
        assert!(consumer.stalled);
        assert_eq!(snap.get(Latch::ExMem).map(|v| v.uid), Some(1));
        assert_eq!(snap.get(Latch::IdEx), None);

        let text = snap.to_string();
        assert!(text.contains("*** stalled ***"));
        assert!(text.contains("ID/EX  <bubble>"));
    }

    #[test]
    fn test_snapshot_classifies_taken_branch() {
        let mut core = core();
        let mut pipe = Pipeline::with_capacity(8, 0, 0);
        let mut seen = None;
        pipe.run_with(&mut core, |pipe, core| {
            let snap = pipe.snapshot(&*core);
            if let Some(view) = snap.get(Latch::IdEx) {
                if view.pc == 8 {
                    seen = Some(view.class);
                }
            }
            Ok(())
        })
        .unwrap_err();
        assert_eq!(seen, Some(InstClass::BranchTaken));
    }
}
