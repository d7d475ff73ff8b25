//! Utility functions for preparing the CPU and memory for execution

use tracing::{debug, info};

use crate::cpu::CPUState;
use crate::elf_helper::LoadSegment;
use crate::error::SimulatorResult;
use crate::instruction::INST_WIDTH;
use crate::memory::mmu::MMU;
use crate::memory::Memory;
use crate::stats::StatRegistry;

/// Register number of the stack pointer
const SP: u32 = 2;

/// Where the program landed in memory
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ProgramLayout {
    pub prog_entry: u32,
    /// Span of the executable segments
    pub text_base: u32,
    pub text_size: u32,
    /// Span of every other loaded segment
    pub data_base: u32,
    pub data_size: u32,
    pub stack_base: u32,
    pub stack_size: u32,
}

impl ProgramLayout {
    /// Registers the loader statistics with `db`
    pub fn register(&self, db: &mut StatRegistry) {
        db.reg_addr("ld_prog_entry", "program entry point (initial PC)", self.prog_entry);
        db.reg_addr("ld_text_base", "program text (code) segment base", self.text_base);
        db.reg_counter("ld_text_size", "program text (code) size in bytes", self.text_size.into());
        db.reg_addr("ld_data_base", "program data segment base", self.data_base);
        db.reg_counter(
            "ld_data_size",
            "program initialized data and bss size in bytes",
            self.data_size.into(),
        );
        db.reg_addr(
            "ld_stack_base",
            "program stack segment base (highest address in stack)",
            self.stack_base,
        );
        db.reg_counter("ld_stack_size", "program initial stack size", self.stack_size.into());
    }
}

/// Smallest `(base, size)` covering every segment, `(0, 0)` for none
fn span<'a>(segments: impl Iterator<Item = &'a LoadSegment>) -> (u32, u32) {
    let mut bounds: Option<(u32, u32)> = None;
    for segment in segments {
        let end = segment.vaddr + segment.mem_size;
        bounds = Some(match bounds {
            None => (segment.vaddr, end),
            Some((low, high)) => (low.min(segment.vaddr), high.max(end)),
        });
    }
    bounds.map_or((0, 0), |(low, high)| (low, high - low))
}

/// Initializes the stack for the CPU
pub fn set_stack(cpu: &mut CPUState, mem: &mut MMU, stack_base: u32, stack_size: u32) {
    cpu.stack_base = stack_base;
    cpu.stack_size = stack_size;

    // Initialize SP register
    cpu.write_gpr(SP, stack_base);

    // Allocate the stack memory for (stack_base - stack_size, stack_base]
    mem.allocate_range(stack_base.wrapping_sub(stack_size).wrapping_add(1), stack_size);
    info!(
        "stack @ {:#010x}, {:#x} bytes, {} pages mapped",
        stack_base,
        stack_size,
        mem.page_count()
    );
}

/// Maps the ELF segments into memory and points the CPU at `entry`.
/// Call after [`set_stack`] so the layout carries the stack bounds.
pub fn load_elf(
    cpu: &mut CPUState,
    mem: &mut MMU,
    entry: u32,
    segments: &[LoadSegment],
) -> SimulatorResult<ProgramLayout> {
    // Set program entry
    cpu.set_entry(entry);
    info!("initial PC: {:#010x}", entry);

    for segment in segments {
        debug!(
            "loading segment @ {:#010x}: memory size {:#x}, file size {:#x}",
            segment.vaddr,
            segment.mem_size,
            segment.data.len()
        );
        mem.allocate_range(segment.vaddr, segment.mem_size);
        for offset in 0..segment.mem_size {
            // Bytes past the file contents are zero
            let byte = segment.data.get(offset as usize).copied().unwrap_or(0);
            mem.set8(segment.vaddr + offset, byte)?;
        }
    }

    let (text_base, text_size) = span(segments.iter().filter(|s| s.executable));
    let (data_base, data_size) = span(segments.iter().filter(|s| !s.executable));
    Ok(ProgramLayout {
        prog_entry: entry,
        text_base,
        text_size,
        data_base,
        data_size,
        stack_base: cpu.stack_base,
        stack_size: cpu.stack_size,
    })
}

/// Places raw instruction words at `base` and points the CPU there
pub fn load_image(
    cpu: &mut CPUState,
    mem: &mut MMU,
    base: u32,
    words: &[u32],
) -> SimulatorResult<ProgramLayout> {
    let text_size = words.len() as u32 * INST_WIDTH;
    mem.allocate_range(base, text_size);
    for (i, word) in words.iter().enumerate() {
        mem.set32(base + i as u32 * INST_WIDTH, *word)?;
    }
    cpu.set_entry(base);
    info!("loaded {} words @ {:#010x}", words.len(), base);
    Ok(ProgramLayout {
        prog_entry: base,
        text_base: base,
        text_size,
        stack_base: cpu.stack_base,
        stack_size: cpu.stack_size,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_stack() {
        let mut cpu = CPUState::make();
        let mut mem = MMU::make();
        set_stack(&mut cpu, &mut mem, 0x8000_0000, 0x2000);
        assert_eq!(cpu.read_gpr(SP), 0x8000_0000);
        assert!(mem.page_exists(0x8000_0000));
        assert!(mem.page_exists(0x7fff_e001));
        assert!(!mem.page_exists(0x7fff_d000));
        assert_eq!(mem.get8(0x7fff_f000).unwrap(), 0);
    }

    #[test]
    fn test_load_elf_zero_fills_bss() {
        let mut cpu = CPUState::make();
        let mut mem = MMU::make();
        let segments =
            [LoadSegment { vaddr: 0x1000, mem_size: 8, executable: false, data: vec![1, 2, 3] }];
        let layout = load_elf(&mut cpu, &mut mem, 0x1000, &segments).unwrap();
        assert_eq!((layout.data_base, layout.data_size), (0x1000, 8));
        assert_eq!(layout.text_size, 0);
        assert_eq!(cpu.pc.read(), 0x1000);
        assert_eq!(cpu.npc.read(), 0x1004);
        assert_eq!(mem.get32(0x1000).unwrap(), 0x0003_0201);
        assert_eq!(mem.get32(0x1004).unwrap(), 0);
    }

    #[test]
    fn test_load_image() {
        let mut cpu = CPUState::make();
        let mut mem = MMU::make();
        let layout = load_image(&mut cpu, &mut mem, 0x400, &[0x0010_0093, 0x0000_0073]).unwrap();
        assert_eq!((layout.text_base, layout.text_size), (0x400, 8));
        assert_eq!(cpu.pc.read(), 0x400);
        assert_eq!(mem.get32(0x404).unwrap(), 0x0000_0073);
    }

    #[test]
    fn test_layout_splits_text_and_data() {
        let mut cpu = CPUState::make();
        let mut mem = MMU::make();
        set_stack(&mut cpu, &mut mem, 0x8000_0000, 0x1000);
        let segments = [
            LoadSegment { vaddr: 0x1_0000, mem_size: 0x40, executable: true, data: vec![0; 0x40] },
            LoadSegment { vaddr: 0x1_1000, mem_size: 0x20, executable: false, data: vec![7] },
            LoadSegment { vaddr: 0x1_2000, mem_size: 0x10, executable: false, data: vec![] },
        ];
        let layout = load_elf(&mut cpu, &mut mem, 0x1_0004, &segments).unwrap();
        assert_eq!(
            layout,
            ProgramLayout {
                prog_entry: 0x1_0004,
                text_base: 0x1_0000,
                text_size: 0x40,
                data_base: 0x1_1000,
                data_size: 0x1010,
                stack_base: 0x8000_0000,
                stack_size: 0x1000,
            }
        );
    }
}
