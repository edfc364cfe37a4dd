// crates/systems/oxid_palm/src/memory/mapped.rs
//! Host buffers overlaid onto the emulated space.
//!
//! Used to hand the emulated program a view of emulator-owned data (a
//! parameter block, a copied resource) without copying it into RAM. Each
//! region keeps its bytes in memory order.

use super::access::AccessCtx;
use super::{bank_index, AddressBank};
use oxide_core::{AccessKind, BusFault, BusResult};

struct Region {
    start: u32,
    data: Vec<u8>,
}

impl Region {
    fn end(&self) -> u64 {
        self.start as u64 + self.data.len() as u64
    }

    fn covers(&self, addr: u32, size: u32) -> bool {
        addr >= self.start && addr as u64 + size as u64 <= self.end()
    }
}

#[derive(Default)]
pub struct MappedBank {
    regions: Vec<Region>,
}

impl MappedBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `data` at `start`, replacing any region already there.
    pub fn map(&mut self, start: u32, data: Vec<u8>) {
        self.regions.retain(|r| r.start != start);
        self.regions.push(Region { start, data });
    }

    pub fn unmap(&mut self, start: u32) -> Option<Vec<u8>> {
        let pos = self.regions.iter().position(|r| r.start == start)?;
        Some(self.regions.swap_remove(pos).data)
    }

    pub fn covers_bank(&self, index: usize) -> bool {
        self.regions.iter().any(|r| {
            !r.data.is_empty()
                && bank_index(r.start) <= index
                && index <= ((r.end() - 1) >> 16) as usize
        })
    }

    fn region(&mut self, addr: u32, size: u8) -> Option<(&mut Region, usize)> {
        let r = self.regions.iter_mut().find(|r| r.covers(addr, size as u32))?;
        let off = (addr - r.start) as usize;
        Some((r, off))
    }

    fn read(&mut self, addr: u32, size: u8) -> BusResult<u32> {
        let (r, off) = self
            .region(addr, size)
            .ok_or(BusFault::bus(addr, size, AccessKind::Read))?;
        Ok(r.data[off..off + size as usize]
            .iter()
            .fold(0u32, |acc, &b| (acc << 8) | b as u32))
    }

    fn write(&mut self, addr: u32, size: u8, value: u32) -> BusResult<()> {
        let (r, off) = self
            .region(addr, size)
            .ok_or(BusFault::bus(addr, size, AccessKind::Write))?;
        let bytes = value.to_be_bytes();
        r.data[off..off + size as usize].copy_from_slice(&bytes[4 - size as usize..]);
        Ok(())
    }
}

impl AddressBank for MappedBank {
    fn name(&self) -> &'static str {
        "mapped"
    }

    fn get_long(&mut self, _: &AccessCtx, addr: u32) -> BusResult<u32> {
        self.read(addr, 4)
    }

    fn get_word(&mut self, _: &AccessCtx, addr: u32) -> BusResult<u16> {
        self.read(addr, 2).map(|v| v as u16)
    }

    fn get_byte(&mut self, _: &AccessCtx, addr: u32) -> BusResult<u8> {
        self.read(addr, 1).map(|v| v as u8)
    }

    fn set_long(&mut self, _: &AccessCtx, addr: u32, value: u32) -> BusResult<()> {
        self.write(addr, 4, value)
    }

    fn set_word(&mut self, _: &AccessCtx, addr: u32, value: u16) -> BusResult<()> {
        self.write(addr, 2, value as u32)
    }

    fn set_byte(&mut self, _: &AccessCtx, addr: u32, value: u8) -> BusResult<()> {
        self.write(addr, 1, value as u32)
    }

    fn translate(&mut self, addr: u32) -> Option<&mut [u8]> {
        let (r, off) = self.region(addr, 1)?;
        r.data.get_mut(off..)
    }

    fn check_range(&self, addr: u32, size: u32) -> bool {
        self.regions.iter().any(|r| r.covers(addr, size))
    }
}
