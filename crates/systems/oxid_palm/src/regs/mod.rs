// crates/systems/oxid_palm/src/regs/mod.rs
//! Memory-mapped register blocks.
//!
//! Every chip owns a window of register space and a [`RegisterMap`]: a
//! byte-granular table of (read, write) handler pairs installed with
//! [`RegisterMap::set_handler`] while the chip is being built. Bytes nobody
//! claimed go through the standard path, which reads and writes the raw
//! big-endian [`RegisterFile`] mirror.
//!
//! Blocks:
//! - DragonBall core (clock/IRQ, GPIO ports, UART, built-in LCD)
//! - SED1376 external LCD controller
//! - SPI master with a touch digitizer slave
//! - storage-card disk I/O
//! - Sony command interface

pub mod command_itf;
pub mod disk;
pub mod dragonball;
pub mod hal;
pub mod sed1376;
pub mod spi;

use crate::memory::access::AccessCtx;
use hal::{HalEvent, HalHandler};
use oxide_core::{AccessKind, BusFault, BusResult};
use std::any::Any;

pub use command_itf::CommandItf;
pub use disk::DiskIo;
pub use dragonball::{DragonBall, DragonBallModel, HardButtons, IrqSource};
pub use sed1376::Sed1376;
pub use spi::{Ads784x, SpiMaster, SpiSlave};

// ============================================================================
//  REGISTER FILE (raw big-endian register mirror)
// ============================================================================

/// Raw register bytes in wire (big-endian) order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFile {
    bytes: Vec<u8>,
}

impl RegisterFile {
    pub fn new(len: usize) -> Self {
        Self {
            bytes: vec![0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn get8(&self, offset: u32) -> u8 {
        self.bytes[offset as usize]
    }

    pub fn get16(&self, offset: u32) -> u16 {
        let o = offset as usize;
        u16::from_be_bytes([self.bytes[o], self.bytes[o + 1]])
    }

    pub fn get32(&self, offset: u32) -> u32 {
        let o = offset as usize;
        u32::from_be_bytes([
            self.bytes[o],
            self.bytes[o + 1],
            self.bytes[o + 2],
            self.bytes[o + 3],
        ])
    }

    pub fn put8(&mut self, offset: u32, value: u8) {
        self.bytes[offset as usize] = value;
    }

    pub fn put16(&mut self, offset: u32, value: u16) {
        let o = offset as usize;
        self.bytes[o..o + 2].copy_from_slice(&value.to_be_bytes());
    }

    pub fn put32(&mut self, offset: u32, value: u32) {
        let o = offset as usize;
        self.bytes[o..o + 4].copy_from_slice(&value.to_be_bytes());
    }

    pub fn get(&self, offset: u32, size: u8) -> u32 {
        match size {
            1 => self.get8(offset) as u32,
            2 => self.get16(offset) as u32,
            _ => self.get32(offset),
        }
    }

    pub fn put(&mut self, offset: u32, size: u8, value: u32) {
        match size {
            1 => self.put8(offset, value as u8),
            2 => self.put16(offset, value as u16),
            _ => self.put32(offset, value),
        }
    }
}

// ============================================================================
//  SUB-RANGE DISPATCH TABLE
// ============================================================================

/// Read handler: (chip, access, offset into the window, size) -> value.
pub type ReadFn<T> = fn(&mut T, &AccessCtx, u32, u8) -> BusResult<u32>;
/// Write handler: (chip, access, offset into the window, size, value).
pub type WriteFn<T> = fn(&mut T, &AccessCtx, u32, u8, u32) -> BusResult<()>;

pub struct Field<T> {
    pub read: ReadFn<T>,
    pub write: WriteFn<T>,
    pub offset: u32,
    pub width: u8,
}

// fn pointers are Copy whatever T is; derive would demand T: Copy.
impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Field<T> {}

/// Byte-granular handler table for one chip's window.
pub struct RegisterMap<T> {
    start: u32,
    range: u32,
    // slot per byte: 0 = unclaimed, n = fields[n - 1]
    slots: Vec<u16>,
    fields: Vec<Field<T>>,
}

impl<T> RegisterMap<T> {
    pub fn new(start: u32, range: u32) -> Self {
        Self {
            start,
            range,
            slots: vec![0; range as usize],
            fields: Vec::new(),
        }
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn range(&self) -> u32 {
        self.range
    }

    /// Claims `width` bytes at `offset` for a (read, write) pair.
    ///
    /// Fields must not overlap: a second claim on a byte is a programmer
    /// error and panics while the chip is being built.
    pub fn set_handler(&mut self, read: ReadFn<T>, write: WriteFn<T>, offset: u32, width: u8) {
        let end = offset as usize + width as usize;
        assert!(
            width > 0 && end <= self.range as usize,
            "field 0x{offset:X}+{width} outside 0x{:X}-byte window",
            self.range
        );
        if let Some(taken) = self.slots[offset as usize..end].iter().position(|&s| s != 0) {
            panic!(
                "field 0x{offset:X}+{width} overlaps the field already claiming offset 0x{:X}",
                offset as usize + taken
            );
        }
        self.fields.push(Field {
            read,
            write,
            offset,
            width,
        });
        let id = self.fields.len() as u16;
        self.slots[offset as usize..end].fill(id);
    }

    /// Claims `len` bytes at `offset` for one (read, write) pair, split into
    /// fields no wider than a `u8` width allows.
    pub fn set_range_handler(&mut self, read: ReadFn<T>, write: WriteFn<T>, offset: u32, len: u32) {
        let end = offset + len;
        let mut at = offset;
        while at < end {
            let width = (end - at).min(u8::MAX as u32) as u8;
            self.set_handler(read, write, at, width);
            at += width as u32;
        }
    }

    pub fn field_at(&self, offset: u32) -> Option<Field<T>> {
        match self.slots.get(offset as usize) {
            Some(&id) if id != 0 => Some(self.fields[id as usize - 1]),
            _ => None,
        }
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

// ============================================================================
//  CONTRACTS (TRAITS)
// ============================================================================

/// A chip as the register bank sees it.
pub trait RegisterBlock: Any {
    fn name(&self) -> &'static str;
    fn start(&self) -> u32;
    fn range(&self) -> u32 {
        self.file().len() as u32
    }

    fn file(&self) -> &RegisterFile;
    fn file_mut(&mut self) -> &mut RegisterFile;

    fn read(&mut self, ctx: &AccessCtx, addr: u32, size: u8) -> BusResult<u32>;
    fn write(&mut self, ctx: &AccessCtx, addr: u32, size: u8, value: u32) -> BusResult<()>;

    /// Raw view of the register file from `addr` on. The bytes are big
    /// endian; callers do their own byte-order work.
    fn real_address(&mut self, addr: u32) -> Option<&mut [u8]> {
        let offset = addr.checked_sub(self.start())? as usize;
        self.file_mut().bytes_mut().get_mut(offset..)
    }

    fn reset(&mut self, hardware: bool);

    /// Raw register image for session persistence. Blocks with state
    /// outside the register file append it after the image.
    fn save(&self) -> Vec<u8> {
        self.file().bytes().to_vec()
    }

    fn load(&mut self, bytes: &[u8]) {
        let file = self.file_mut().bytes_mut();
        let n = file.len().min(bytes.len());
        file[..n].copy_from_slice(&bytes[..n]);
    }

    fn hal(&mut self) -> Option<&mut dyn HalHandler> {
        None
    }

    fn hal_ref(&self) -> Option<&dyn HalHandler> {
        None
    }

    /// Moves capability notifications raised by the last write into `out`.
    fn drain_hal_events(&mut self, _out: &mut Vec<HalEvent>) {}

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Chips that dispatch through a [`RegisterMap`] of their own handlers.
pub trait RegisterChip: RegisterBlock + Sized {
    fn map(&self) -> &RegisterMap<Self>;
}

/// Routes a read to the field covering `addr`.
pub fn dispatch_read<T: RegisterChip>(
    chip: &mut T,
    ctx: &AccessCtx,
    addr: u32,
    size: u8,
) -> BusResult<u32> {
    let offset = window_offset(chip.map(), addr, size, AccessKind::Read)?;
    match chip.map().field_at(offset) {
        Some(field) => (field.read)(chip, ctx, offset, size),
        None => std_read(chip, ctx, offset, size),
    }
}

/// Routes a write to the field covering `addr`.
pub fn dispatch_write<T: RegisterChip>(
    chip: &mut T,
    ctx: &AccessCtx,
    addr: u32,
    size: u8,
    value: u32,
) -> BusResult<()> {
    let offset = window_offset(chip.map(), addr, size, AccessKind::Write)?;
    match chip.map().field_at(offset) {
        Some(field) => (field.write)(chip, ctx, offset, size, value),
        None => std_write(chip, ctx, offset, size, value),
    }
}

fn window_offset<T>(map: &RegisterMap<T>, addr: u32, size: u8, kind: AccessKind) -> BusResult<u32> {
    if size > 1 && addr & 1 != 0 {
        return Err(BusFault::address(addr, size, kind));
    }
    match addr.checked_sub(map.start) {
        Some(offset) if offset as u64 + size as u64 <= map.range as u64 => Ok(offset),
        _ => Err(BusFault::bus(addr, size, kind)),
    }
}

// ============================================================================
//  STANDARD HANDLERS
// ============================================================================

pub fn std_read<T: RegisterChip>(chip: &mut T, _: &AccessCtx, offset: u32, size: u8) -> BusResult<u32> {
    Ok(chip.file().get(offset, size))
}

pub fn std_write<T: RegisterChip>(
    chip: &mut T,
    _: &AccessCtx,
    offset: u32,
    size: u8,
    value: u32,
) -> BusResult<()> {
    chip.file_mut().put(offset, size, value);
    Ok(())
}

/// Read-only silicon: the write is dropped, as the hardware does.
pub fn null_write<T: RegisterChip>(chip: &mut T, _: &AccessCtx, offset: u32, size: u8, value: u32) -> BusResult<()> {
    tracing::debug!(
        "{}: dropped write of 0x{value:X} ({size}) to read-only offset 0x{offset:X}",
        chip.name()
    );
    Ok(())
}

pub fn zero_read<T: RegisterChip>(_: &mut T, _: &AccessCtx, _: u32, _: u8) -> BusResult<u32> {
    Ok(0)
}

/// Faults unless the emulator itself holds full access, in which case the
/// write lands in the register file.
pub fn unsupported_write<T: RegisterChip>(
    chip: &mut T,
    ctx: &AccessCtx,
    offset: u32,
    size: u8,
    value: u32,
) -> BusResult<()> {
    if ctx.access_ok() {
        return std_write(chip, ctx, offset, size, value);
    }
    Err(BusFault::bus(chip.map().start() + offset, size, AccessKind::Write))
}

pub fn invalid_read<T: RegisterChip>(chip: &mut T, _: &AccessCtx, offset: u32, size: u8) -> BusResult<u32> {
    Err(BusFault::bus(chip.map().start() + offset, size, AccessKind::Read))
}
