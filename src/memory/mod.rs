//! Memory structure

pub mod mmu;

use crate::error::MemoryError;

/// Memory interface the functional core executes against.
///
/// Only byte access is required; wider accesses are composed
/// little-endian and must be naturally aligned.
pub trait Memory {
    fn get8(&mut self, address: u32) -> Result<u8, MemoryError>;
    fn set8(&mut self, address: u32, value: u8) -> Result<(), MemoryError>;

    fn get16(&mut self, address: u32) -> Result<u16, MemoryError> {
        check_alignment(address, 2)?;
        Ok(self.get8(address)? as u16
            | ((self.get8(address.wrapping_add(1))? as u16) << 8))
    }
    fn get32(&mut self, address: u32) -> Result<u32, MemoryError> {
        check_alignment(address, 4)?;
        Ok(self.get16(address)? as u32
            | ((self.get16(address.wrapping_add(2))? as u32) << 16))
    }

    fn set16(&mut self, address: u32, value: u16) -> Result<(), MemoryError> {
        check_alignment(address, 2)?;
        self.set8(address, value as u8)?;
        self.set8(address.wrapping_add(1), (value >> 8) as u8)
    }
    fn set32(&mut self, address: u32, value: u32) -> Result<(), MemoryError> {
        check_alignment(address, 4)?;
        self.set16(address, value as u16)?;
        self.set16(address.wrapping_add(2), (value >> 16) as u16)
    }

    /// Reads `step` bytes, zero-extended
    fn get(&mut self, address: u32, step: u32) -> Result<u32, MemoryError> {
        match step {
            1 => Ok(self.get8(address)? as u32),
            2 => Ok(self.get16(address)? as u32),
            4 => self.get32(address),
            _ => Err(MemoryError::AccessError {
                address,
                kind: crate::error::MemoryErrorKind::InvalidSize(step),
            }),
        }
    }

    /// Writes the low `step` bytes of `value`
    fn set(
        &mut self,
        address: u32,
        step: u32,
        value: u32,
    ) -> Result<(), MemoryError> {
        match step {
            1 => self.set8(address, value as u8),
            2 => self.set16(address, value as u16),
            4 => self.set32(address, value),
            _ => Err(MemoryError::AccessError {
                address,
                kind: crate::error::MemoryErrorKind::InvalidSize(step),
            }),
        }
    }
}

fn check_alignment(address: u32, width: u32) -> Result<(), MemoryError> {
    if address % width != 0 {
        return Err(MemoryError::AlignmentError(address, width));
    }
    Ok(())
}
