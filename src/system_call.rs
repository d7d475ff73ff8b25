//! System call handler

use std::io::{self, Write};

use text_io::scan;
use tracing::debug;

use crate::error::ExecutionError;
use crate::error::SimulatorResult;
use crate::memory::Memory;

/// Syscall numbers, passed in a7
pub const SYS_PRINT_STRING: i32 = 0;
pub const SYS_PRINT_CHAR: i32 = 1;
pub const SYS_PRINT_INT: i32 = 2;
pub const SYS_EXIT: i32 = 3;
pub const SYS_READ_CHAR: i32 = 4;
pub const SYS_READ_INT: i32 = 5;

/// What the syscall did to the program
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SyscallOutcome {
    /// Continue; a0 receives the value
    Return(i32),
    /// Program requested exit with the given code
    Exit(i32),
}

/// Handles a system call. `arg` is a0, `call_type` is a7.
pub fn syscall(
    pc: u32,
    arg: i32,
    call_type: i32,
    mem: &mut dyn Memory,
) -> SimulatorResult<SyscallOutcome> {
    debug!("syscall {} (a0 = {}) @ {:#010x}", call_type, arg, pc);

    let mut stdout = io::stdout();
    let outcome = match call_type {
        SYS_PRINT_STRING => {
            let mut address = arg as u32;
            let mut bytes = Vec::new();
            loop {
                let ch = mem
                    .get8(address)
                    .map_err(|source| ExecutionError::Fault { pc, source })?;
                if ch == 0 {
                    break;
                }
                bytes.push(ch);
                address = address.wrapping_add(1);
            }
            stdout.write_all(&bytes)?;
            stdout.flush()?;
            SyscallOutcome::Return(arg)
        }
        SYS_PRINT_CHAR => {
            write!(stdout, "{}", (arg as u8) as char)?;
            stdout.flush()?;
            SyscallOutcome::Return(arg)
        }
        SYS_PRINT_INT => {
            write!(stdout, "{}", arg)?;
            stdout.flush()?;
            SyscallOutcome::Return(arg)
        }
        SYS_EXIT => SyscallOutcome::Exit(arg),
        SYS_READ_CHAR => {
            let c: char;
            scan!("{}", c);
            SyscallOutcome::Return(c as i32)
        }
        SYS_READ_INT => {
            let n: i32;
            scan!("{}", n);
            SyscallOutcome::Return(n)
        }
        _ => return Err(ExecutionError::UnknownSystemCall(call_type).into()),
    };

    Ok(outcome)
}
