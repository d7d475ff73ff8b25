use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the simulator
#[derive(Error, Debug)]
pub enum SimulatorError {
    #[error("Failed to load ELF file: {0}")]
    ElfLoadError(#[from] ElfError),

    #[error("CPU execution error: {0}")]
    ExecutionError(#[from] ExecutionError),

    #[error("Memory error: {0}")]
    MemoryError(#[from] MemoryError),

    #[error("Pipeline error: {0}")]
    PipelineError(#[from] PipelineError),

    #[error("Invalid instruction: {0:032b} at PC={1:#010x}")]
    InvalidInstructionError(u32, u32),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

/// Errors related to ELF file operations
#[derive(Error, Debug)]
pub enum ElfError {
    #[error("Failed to read ELF file '{0}': {1}")]
    FileReadError(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse ELF file '{0}': {1}")]
    ParseError(PathBuf, String),

    #[error("Memory address out of bounds: {0:#010x}")]
    AddressOutOfBounds(u32),

    #[error("Invalid ELF machine type: {0}")]
    InvalidMachine(u16),
}

/// Errors related to functional execution.
/// Any of these surfacing from decode ends the run.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Fault detected @ {pc:#010x}: {source}")]
    Fault {
        pc: u32,
        #[source]
        source: MemoryError,
    },

    #[error("Stack overflow: SP={0:#010x}, base={1:#010x}, size={2:#x}")]
    StackOverflow(u32, u32, u32),

    #[error("Unknown system call: {0}")]
    UnknownSystemCall(i32),
}

/// Errors related to memory operations
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum MemoryError {
    #[error("Memory access error at address {address:#010x}: {kind}")]
    AccessError { address: u32, kind: MemoryErrorKind },

    #[error("Invalid memory alignment: address {0:#010x} is not aligned to {1} bytes")]
    AlignmentError(u32, u32),
}

/// Specific kinds of memory errors
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum MemoryErrorKind {
    #[error("Attempted to read from unallocated memory")]
    ReadUnallocated,

    #[error("Attempted to write to unallocated memory")]
    WriteUnallocated,

    #[error("Invalid access size: {0}")]
    InvalidSize(u32),
}

/// Structural bugs in the timing model. None of these are
/// legitimate backpressure; they mean a record leaked or was
/// mishandled by a stage.
#[derive(Error, Debug, PartialEq)]
pub enum PipelineError {
    #[error("Instruction pool exhausted ({capacity} records, all live) at cycle {cycle}")]
    PoolExhausted { capacity: usize, cycle: u64 },

    #[error("Instruction record in slot {0} freed twice")]
    DoubleFree(usize),

    #[error("Latch or scoreboard references dead record in slot {0}")]
    DanglingReference(usize),

    #[error("Decode saw PC {record:#010x} but the architectural PC is {arch:#010x}")]
    PcMismatch { record: u32, arch: u32 },

    #[error("Pipeline failed to drain within {0} cycles")]
    DrainTimeout(u64),
}

/// Type alias for Result with SimulatorError
pub type SimulatorResult<T> = Result<T, SimulatorError>;
