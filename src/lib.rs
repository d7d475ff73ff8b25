pub mod alu;
pub mod cpu;
pub mod elf_helper;
pub mod functional;
pub mod instruction;
pub mod loader;
pub mod logging;
pub mod memory;
pub mod run_wrapper;
pub mod stats;
pub mod system_call;

pub mod pipelined;

pub mod error;
