use std::collections::TryReserveError;

use log::*;

use crate::fault::Exception;
use crate::instruction::Instruction;

use self::parse::ParseErrorKind;

pub mod parse;

pub type Byte = u8; // 1 byte
pub type Word = u32; // 4 bytes

/// Default memory capacity in words
pub const DEFAULT_MEMORY: usize = 8192;

/// Emulates the flat address space of the emulator.
///
/// Addresses below [`Memory::instructions`] form the code region and hold
/// assembled instructions. Every other address holds a plain word. The
/// boundary only moves while a program is assembled.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Memory {
    /// Code region, one instruction per address
    code: Vec<Instruction>,
    /// Word cells for the whole address space. Cells below the boundary are
    /// never touched.
    data: Vec<Word>,
}

impl Default for Memory {
    /// Initializes a memory of [`DEFAULT_MEMORY`] words
    fn default() -> Self {
        Memory {
            code: Vec::new(),
            data: vec![0; DEFAULT_MEMORY],
        }
    }
}

impl Memory {
    /// Allocates a zeroed memory of `capacity` words
    pub fn new(capacity: usize) -> Result<Self, TryReserveError> {
        let mut data = Vec::new();
        data.try_reserve_exact(capacity)?;
        data.resize(capacity, 0);

        Ok(Memory {
            code: Vec::new(),
            data,
        })
    }

    /// Total number of addressable words
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of assembled instructions, which is also the first data address
    pub fn instructions(&self) -> Word {
        self.code.len() as Word
    }

    /// Appends an instruction at the end of the code region.
    ///
    /// Fails with [`ParseErrorKind::NoMemory`] once every word of the memory
    /// holds an instruction.
    pub fn push_instruction(&mut self, instruction: Instruction) -> Result<(), ParseErrorKind> {
        if self.code.len() >= self.capacity() {
            return Err(ParseErrorKind::NoMemory);
        }

        self.code
            .try_reserve(1)
            .map_err(|_| ParseErrorKind::NoMemory)?;
        self.code.push(instruction);
        Ok(())
    }

    /// Returns the instruction stored at `address`
    pub fn instruction(&self, address: Word) -> Option<&Instruction> {
        self.code.get(address as usize)
    }

    /// Whether `address` lies in the code region
    pub fn is_valid_execute(&self, address: Word) -> bool {
        address < self.instructions()
    }

    /// Whether `address` lies in the data region with `range` more cells
    /// after it still in bounds
    pub fn is_valid_read(&self, address: Word, range: Word) -> bool {
        address >= self.instructions() && (address as u64 + range as u64) < self.capacity() as u64
    }

    /// Same rule as [`Memory::is_valid_read`]
    pub fn is_valid_write(&self, address: Word, range: Word) -> bool {
        self.is_valid_read(address, range)
    }

    /// Reads a data word
    pub fn read_word(&self, address: Word) -> Result<Word, Exception> {
        if !self.is_valid_read(address, 1) {
            return Err(Exception::AccessViolation);
        }

        Ok(self.data[address as usize])
    }

    /// Writes a data word
    pub fn write_word(&mut self, address: Word, value: Word) -> Result<(), Exception> {
        if !self.is_valid_write(address, 1) {
            return Err(Exception::AccessViolation);
        }

        self.data[address as usize] = value;
        Ok(())
    }

    /// Writes one word per byte of `data`, starting at `address`. Nothing is
    /// written unless the whole range is valid.
    pub fn write_bytes(&mut self, address: Word, data: &[Byte]) -> Result<(), Exception> {
        if !self.is_valid_write(address, data.len() as Word) {
            return Err(Exception::AccessViolation);
        }

        let start = address as usize;
        for (cell, byte) in self.data[start..start + data.len()].iter_mut().zip(data) {
            *cell = *byte as Word;
        }

        Ok(())
    }

    /// Logs a listing of the code region and every non-zero data word
    pub fn dump(&self) {
        info!(
            "{} instruction(s), {} word(s) of memory",
            self.code.len(),
            self.capacity()
        );

        for (address, instruction) in self.code.iter().enumerate() {
            info!("{:08x}: {}", address, instruction);
        }

        for (address, word) in self.data.iter().enumerate().skip(self.code.len()) {
            if *word != 0 {
                info!("{:08x}: 0x{:08x}", address, word);
            }
        }
    }
}
