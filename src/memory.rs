use std::{fs, io, path::Path};

use log::info;
use thiserror::Error;

use crate::registers::{IndexRegister, ProgramCounter, PROGRAM_START};

pub type TypeAddr = u16; // in reality u12
type FontBytes = [u8; FONT_GLYPH_SIZE * 16];

pub const MEMORY_SIZE: usize = 4096;
pub const FONT_GLYPH_SIZE: usize = 5;
pub const MAX_ROM_SIZE: usize = MEMORY_SIZE - PROGRAM_START as usize;
pub const STACK_SIZE: usize = 16;

const DEFAULT_FONT: FontBytes = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

#[derive(Debug, Error)]
pub enum RomError {
    #[error("failed to load ROM: {} could not be opened", .path.display())]
    RomNotFound {
        path: std::path::PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to load ROM: ROM is too large ({size} bytes), max size is {max_size} bytes")]
    RomTooLarge { size: usize, max_size: usize },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StackError {
    #[error("stack overflow: call with {depth} return addresses already pushed")]
    Overflow { depth: usize },

    #[error("stack underflow: return with an empty call stack")]
    Underflow,
}

/// The 4 KiB address space plus the registers that index into it.
///
/// ```text
/// 0x000..0x050  font glyphs 0-F, 5 bytes each
/// 0x050..0x200  reserved
/// 0x200..0x1000 program
/// ```
///
/// Every access wraps at 0x1000, so an I or pc that has run past the end of
/// the address space reads from the bottom again rather than faulting.
#[derive(Clone)]
pub struct Memory {
    bytes: [u8; MEMORY_SIZE],
    pub pc: ProgramCounter,
    pub index: IndexRegister,
    pub stack: Stack,
}

impl Memory {
    pub fn new() -> Self {
        let mut bytes = [0; MEMORY_SIZE];
        bytes[..DEFAULT_FONT.len()].copy_from_slice(&DEFAULT_FONT);

        Self {
            bytes,
            pc: ProgramCounter::new(),
            index: IndexRegister::default(),
            stack: Stack::new(),
        }
    }

    pub fn set(&mut self, addr: TypeAddr, val: u8) {
        self.bytes[Self::wrap(addr)] = val;
    }

    pub fn get(&self, addr: TypeAddr) -> u8 {
        self.bytes[Self::wrap(addr)]
    }

    pub fn get_indexed(&self, offset: u16) -> u8 {
        self.get(self.index.0.wrapping_add(offset))
    }

    pub fn set_indexed(&mut self, offset: u16, val: u8) {
        self.set(self.index.0.wrapping_add(offset), val);
    }

    fn wrap(addr: TypeAddr) -> usize {
        addr as usize % MEMORY_SIZE
    }

    pub fn increment_pc(&mut self) {
        self.pc.increment();
    }

    // big-endian, pc is not moved
    pub fn next_instruction(&self) -> u16 {
        let (l, r) = (self.get(self.pc.0), self.get(self.pc.0.wrapping_add(1)));
        ((l as u16) << 8) | r as u16
    }

    pub fn set_pc(&mut self, addr: TypeAddr) {
        self.pc.set_addr(addr);
    }

    pub fn set_index(&mut self, addr: TypeAddr) {
        self.index.set_addr(addr);
    }

    /// Address of the font glyph for `digit`. Not masked, so values above 0xF
    /// point past the font table.
    pub fn glyph_addr(digit: u8) -> TypeAddr {
        digit as TypeAddr * FONT_GLYPH_SIZE as TypeAddr
    }

    // loads program bytes starting at address 0x200
    pub fn load_rom(&mut self, bytes: &[u8]) -> Result<(), RomError> {
        if bytes.len() > MAX_ROM_SIZE {
            return Err(RomError::RomTooLarge {
                size: bytes.len(),
                max_size: MAX_ROM_SIZE,
            });
        }

        let start_index = PROGRAM_START as usize;
        self.bytes[start_index..start_index + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    pub fn load_rom_by_file(&mut self, path: impl AsRef<Path>) -> Result<(), RomError> {
        let path = path.as_ref();
        let program = fs::read(path).map_err(|source| RomError::RomNotFound {
            path: path.to_path_buf(),
            source,
        })?;
        info!("ROM size: {} B", program.len());
        self.load_rom(&program)?;
        info!("ROM loaded successfully");
        Ok(())
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

/// Return addresses for 2NNN/00EE.
///
/// `sp` points at the most recently pushed slot, 0 meaning empty, so slot 0 is
/// never written and at most 15 calls can be nested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stack {
    addresses: [TypeAddr; STACK_SIZE],
    pub sp: usize,
}

impl Stack {
    pub fn new() -> Self {
        Self {
            addresses: [0; STACK_SIZE],
            sp: 0,
        }
    }

    pub fn push(&mut self, addr: TypeAddr) -> Result<(), StackError> {
        if self.sp + 1 >= STACK_SIZE {
            return Err(StackError::Overflow { depth: self.sp });
        }
        self.sp += 1;
        self.addresses[self.sp] = addr;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<TypeAddr, StackError> {
        if self.sp == 0 {
            return Err(StackError::Underflow);
        }
        let addr = self.addresses[self.sp];
        self.sp -= 1;
        Ok(addr)
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}
