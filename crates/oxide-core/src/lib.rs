use std::fs;
use std::path::Path;
use thiserror::Error;

// ============================================================================
//  CONTRACTS (TRAITS)
// ============================================================================

/// Anything that executes instructions against a bus.
///
/// The interpreter is the *caller* of the memory system: it computes an
/// address, goes through [`MemoryBus`] and never touches backing stores
/// directly.
pub trait Cpu {
    /// Cold reset (power on).
    fn reset(&mut self);

    /// Reset with bus access (the 68k loads SSP and PC from the reset vectors).
    fn reset_with_bus(&mut self, _bus: &mut dyn MemoryBus) {
        self.reset();
    }

    /// Executes one instruction or atomic step.
    /// Returns the cycles consumed.
    fn step(&mut self, bus: &mut dyn MemoryBus) -> u32;

    /// Current program counter, for debugging.
    fn pc(&self) -> u32;
}

/// Direction of the access that faulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

impl std::fmt::Display for AccessKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessKind::Read => f.write_str("read"),
            AccessKind::Write => f.write_str("write"),
        }
    }
}

/// Faults raised by the memory system. They are handed straight to the
/// interpreter's exception logic; nothing in the bus retries them.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusFault {
    #[error("bus error: {kind} of {size} byte(s) at 0x{addr:08X}")]
    BusError {
        addr: u32,
        size: u8,
        kind: AccessKind,
    },
    #[error("address error: {kind} of {size} byte(s) at odd address 0x{addr:08X}")]
    AddressError {
        addr: u32,
        size: u8,
        kind: AccessKind,
    },
}

impl BusFault {
    pub fn bus(addr: u32, size: u8, kind: AccessKind) -> Self {
        BusFault::BusError { addr, size, kind }
    }

    pub fn address(addr: u32, size: u8, kind: AccessKind) -> Self {
        BusFault::AddressError { addr, size, kind }
    }

    /// Address that caused the fault.
    pub fn addr(&self) -> u32 {
        match *self {
            BusFault::BusError { addr, .. } | BusFault::AddressError { addr, .. } => addr,
        }
    }
}

pub type BusResult<T> = Result<T, BusFault>;

/// Bus contract of a Motorola system (68k / DragonBall).
///
/// Accesses are sized and big endian. Byte accessors are mandatory; word and
/// long accessors default to a big-endian composition with the 68000's
/// even-address rule, so simple test buses only need two methods.
pub trait MemoryBus {
    // --- Required ---
    fn read_byte(&mut self, addr: u32) -> BusResult<u8>;
    fn write_byte(&mut self, addr: u32, val: u8) -> BusResult<()>;

    // --- Provided (default impls) ---

    // 16-bit big-endian read
    fn read_word(&mut self, addr: u32) -> BusResult<u16> {
        if addr & 1 != 0 {
            return Err(BusFault::address(addr, 2, AccessKind::Read));
        }
        let hi = self.read_byte(addr)? as u16;
        let lo = self.read_byte(addr.wrapping_add(1))? as u16;
        Ok((hi << 8) | lo)
    }

    // 32-bit big-endian read
    fn read_long(&mut self, addr: u32) -> BusResult<u32> {
        if addr & 1 != 0 {
            return Err(BusFault::address(addr, 4, AccessKind::Read));
        }
        let hi = self.read_word(addr)? as u32;
        let lo = self.read_word(addr.wrapping_add(2))? as u32;
        Ok((hi << 16) | lo)
    }

    // 16-bit big-endian write
    fn write_word(&mut self, addr: u32, val: u16) -> BusResult<()> {
        if addr & 1 != 0 {
            return Err(BusFault::address(addr, 2, AccessKind::Write));
        }
        self.write_byte(addr, (val >> 8) as u8)?;
        self.write_byte(addr.wrapping_add(1), (val & 0xFF) as u8)
    }

    // 32-bit big-endian write
    fn write_long(&mut self, addr: u32, val: u32) -> BusResult<()> {
        if addr & 1 != 0 {
            return Err(BusFault::address(addr, 4, AccessKind::Write));
        }
        self.write_word(addr, (val >> 16) as u16)?;
        self.write_word(addr.wrapping_add(2), (val & 0xFFFF) as u16)
    }

    /// Wait states added for an opcode fetched from `pc`.
    fn opcode_cycles(&self, _pc: u32) -> u32 {
        0
    }

    // --- Bus Error Signaling (Optional) ---
    // Returns Some(address) if the last operation failed
    fn bus_error(&self) -> Option<u32> {
        None
    }
    fn ack_bus_error(&mut self) {}
}

// ============================================================================
//  ROM LOADER
// ============================================================================

#[derive(Error, Debug)]
pub enum RomError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ROM file is too small or empty")]
    Empty,
    #[error("ROM image of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: usize, max: usize },
}

pub struct Rom {
    pub data: Vec<u8>,
}

impl Rom {
    /// Largest image any Palm device maps (the ROM window is 16 MiB).
    pub const MAX_SIZE: usize = 16 * 1024 * 1024;

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RomError> {
        let data = fs::read(path)?;
        Self::from_bytes(data)
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self, RomError> {
        if data.is_empty() {
            return Err(RomError::Empty);
        }
        if data.len() > Self::MAX_SIZE {
            return Err(RomError::TooLarge {
                size: data.len(),
                max: Self::MAX_SIZE,
            });
        }
        Ok(Self { data })
    }

    /// Zero-filled ROM of a fixed size, for tests.
    pub fn new_empty(size: usize) -> Self {
        Self {
            data: vec![0; size],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlatBus {
        ram: Vec<u8>,
    }

    impl MemoryBus for FlatBus {
        fn read_byte(&mut self, addr: u32) -> BusResult<u8> {
            self.ram
                .get(addr as usize)
                .copied()
                .ok_or(BusFault::bus(addr, 1, AccessKind::Read))
        }
        fn write_byte(&mut self, addr: u32, val: u8) -> BusResult<()> {
            match self.ram.get_mut(addr as usize) {
                Some(b) => {
                    *b = val;
                    Ok(())
                }
                None => Err(BusFault::bus(addr, 1, AccessKind::Write)),
            }
        }
    }

    #[test]
    fn default_helpers_are_big_endian() {
        let mut bus = FlatBus { ram: vec![0; 16] };
        bus.write_long(4, 0x1234_5678).unwrap();
        assert_eq!(&bus.ram[4..8], &[0x12, 0x34, 0x56, 0x78]);
        assert_eq!(bus.read_word(6).unwrap(), 0x5678);
    }

    #[test]
    fn odd_word_access_is_an_address_error() {
        let mut bus = FlatBus { ram: vec![0; 16] };
        assert_eq!(
            bus.read_word(3),
            Err(BusFault::address(3, 2, AccessKind::Read))
        );
        assert_eq!(
            bus.write_long(1, 0),
            Err(BusFault::address(1, 4, AccessKind::Write))
        );
    }

    #[test]
    fn rom_rejects_empty_images() {
        assert!(matches!(Rom::from_bytes(Vec::new()), Err(RomError::Empty)));
        assert_eq!(Rom::new_empty(8).len(), 8);
    }
}
