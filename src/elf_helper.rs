//! Helper functions for parsing ELF files

use std::fs;
use std::path::Path;

use object::elf;
use object::read::elf::{FileHeader, ProgramHeader};

use crate::error::ElfError;

pub type ELFReaderType = elf::FileHeader32<object::Endianness>;
pub type Segment = elf::ProgramHeader32<object::Endianness>;

/// A loadable piece of the image: where it goes and what it holds
#[derive(Clone, Debug, PartialEq)]
pub struct LoadSegment {
    pub vaddr: u32,
    pub mem_size: u32,
    /// Mapped with execute permission
    pub executable: bool,
    /// File-backed bytes; the rest of `mem_size` is zero-filled
    pub data: Vec<u8>,
}

/// Returns the pair (ELF reader, binary data)
pub fn parse_elf_file(
    file_path: &Path,
) -> Result<(ELFReaderType, Vec<u8>), ElfError> {
    let data = fs::read(file_path)
        .map_err(|e| ElfError::FileReadError(file_path.to_path_buf(), e))?;
    let elf = parse_elf_data(file_path, &data)?;
    Ok((elf, data))
}

/// Parses and validates an in-memory rv32 ELF image
pub fn parse_elf_data(
    file_path: &Path,
    data: &[u8],
) -> Result<ELFReaderType, ElfError> {
    let elf = elf::FileHeader32::<object::Endianness>::parse(data)
        .map_err(|e| ElfError::ParseError(file_path.to_path_buf(), e.to_string()))?;
    let machine = get_elf_machine(elf, file_path)?;
    if machine != elf::EM_RISCV {
        return Err(ElfError::InvalidMachine(machine));
    }
    Ok(*elf)
}

/// Returns the endianness
pub fn get_elf_endian(
    elf_reader: &ELFReaderType,
    file_path: &Path,
) -> Result<object::Endianness, ElfError> {
    elf_reader
        .endian()
        .map_err(|e| ElfError::ParseError(file_path.to_path_buf(), e.to_string()))
}

/// Returns the program entry address
pub fn get_elf_entry(
    elf_reader: &ELFReaderType,
    file_path: &Path,
) -> Result<u32, ElfError> {
    let endian = get_elf_endian(elf_reader, file_path)?;
    Ok(elf_reader.e_entry(endian))
}

/// Returns the machine type
pub fn get_elf_machine(
    elf_reader: &ELFReaderType,
    file_path: &Path,
) -> Result<u16, ElfError> {
    Ok(elf_reader.e_machine(get_elf_endian(elf_reader, file_path)?))
}

/// Returns the PT_LOAD segments with their file contents
pub fn get_load_segments(
    elf_reader: &ELFReaderType,
    elf_data: &[u8],
    file_path: &Path,
) -> Result<Vec<LoadSegment>, ElfError> {
    let parse_error = |msg: String| ElfError::ParseError(file_path.to_path_buf(), msg);
    let endian = get_elf_endian(elf_reader, file_path)?;
    let headers = elf_reader
        .program_headers(endian, elf_data)
        .map_err(|e| parse_error(e.to_string()))?;

    let mut segments = Vec::new();
    for header in headers.iter().filter(|h| h.p_type(endian) == elf::PT_LOAD) {
        let vaddr = header.p_vaddr(endian);
        let mem_size = header.p_memsz(endian);
        // Can't handle with 32b memory
        if vaddr.checked_add(mem_size).is_none() {
            return Err(ElfError::AddressOutOfBounds(vaddr));
        }
        let data = header
            .data(endian, elf_data)
            .map_err(|_| parse_error(format!("segment @ {:#010x} exceeds the file", vaddr)))?;
        if data.len() as u32 > mem_size {
            return Err(parse_error(format!(
                "segment @ {:#010x} has file size larger than memory size",
                vaddr
            )));
        }
        segments.push(LoadSegment {
            vaddr,
            mem_size,
            executable: header.p_flags(endian) & elf::PF_X != 0,
            data: data.to_vec(),
        });
    }
    Ok(segments)
}
