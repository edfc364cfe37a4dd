// crates/systems/oxid_palm/src/memory/ram.rs
use super::access::AccessCtx;
use super::endian::{storage_len, ByteOrder};
use super::AddressBank;
use oxide_core::{AccessKind, BusFault, BusResult};

/// Meta bit: user-mode code may not touch this byte.
pub const META_NO_USER_ACCESS: u8 = 0x01;

/// Exception vectors and low globals; user code stays out.
const LOW_MEMORY_END: u32 = 0x100;

/// Device RAM, mapped from address 0.
///
/// Below `dynamic_size` is the dynamic heap (DRAM flags apply); above it
/// the storage heap (SRAM flags apply, and `protect_sram_set` guards it
/// against user-mode writes).
pub struct RamBank {
    size: u32,
    dynamic_size: u32,
    order: ByteOrder,
    data: Vec<u8>,
    meta: Vec<u8>,
}

impl RamBank {
    pub fn new(size: u32, dynamic_size: u32, order: ByteOrder) -> Self {
        let len = storage_len(size as usize);
        Self {
            size,
            dynamic_size: dynamic_size.min(size),
            order,
            data: vec![0; len],
            meta: vec![0; len],
        }
    }

    pub fn empty() -> Self {
        Self::new(0, 0, ByteOrder::host())
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn dynamic_size(&self) -> u32 {
        self.dynamic_size
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Wire-order copy of `len` bytes from `addr`.
    pub fn export(&self, addr: u32, len: usize) -> Vec<u8> {
        self.order.export(&self.data, addr as usize, len)
    }

    /// Wire-order store, no flag checks.
    pub fn import(&mut self, addr: u32, bytes: &[u8]) {
        for (i, &b) in bytes.iter().enumerate() {
            let at = addr as usize + i;
            if at < self.size as usize {
                self.order.put8(&mut self.data, at, b);
            }
        }
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
        self.meta.fill(0);
    }

    /// Marks `[addr, addr + len)` with meta bits.
    pub fn set_meta(&mut self, addr: u32, len: u32, bits: u8) {
        let end = (addr as usize + len as usize).min(self.size as usize);
        for m in &mut self.meta[(addr as usize).min(end)..end] {
            *m |= bits;
        }
    }

    pub fn clear_meta(&mut self, addr: u32, len: u32, bits: u8) {
        let end = (addr as usize + len as usize).min(self.size as usize);
        for m in &mut self.meta[(addr as usize).min(end)..end] {
            *m &= !bits;
        }
    }

    fn in_range(&self, addr: u32, size: u8) -> bool {
        addr as u64 + size as u64 <= self.size as u64
    }

    /// Runs every check for one access. `Ok(false)` means the access is
    /// tolerated but has no backing: reads give 0, writes are dropped.
    fn check(&self, ctx: &AccessCtx, addr: u32, size: u8, kind: AccessKind) -> BusResult<bool> {
        let flags = &ctx.flags;
        let write = kind == AccessKind::Write;
        let fault = Err(BusFault::bus(addr, size, kind));

        if !self.in_range(addr, size) {
            let validate = if addr < self.dynamic_size {
                if write { flags.validate_dram_set } else { flags.validate_dram_get }
            } else if write {
                flags.validate_sram_set
            } else {
                flags.validate_sram_get
            };
            return if validate { fault } else { Ok(false) };
        }

        if ctx.user_mode() {
            if addr < LOW_MEMORY_END {
                let prevent = if write {
                    flags.prevent_user_low_memory_set
                } else {
                    flags.prevent_user_low_memory_get
                };
                if prevent {
                    return fault;
                }
            }
            if write && flags.protect_sram_set && addr + size as u32 > self.dynamic_size {
                return fault;
            }
            if flags.check_meta {
                let span = &self.meta[addr as usize..addr as usize + size as usize];
                if span.iter().any(|m| m & META_NO_USER_ACCESS != 0) {
                    return fault;
                }
            }
        }
        Ok(true)
    }
}

impl AddressBank for RamBank {
    fn name(&self) -> &'static str {
        "ram"
    }

    fn get_long(&mut self, ctx: &AccessCtx, addr: u32) -> BusResult<u32> {
        if !self.check(ctx, addr, 4, AccessKind::Read)? {
            return Ok(0);
        }
        Ok(self.order.get32(&self.data, addr as usize))
    }

    fn get_word(&mut self, ctx: &AccessCtx, addr: u32) -> BusResult<u16> {
        if !self.check(ctx, addr, 2, AccessKind::Read)? {
            return Ok(0);
        }
        Ok(self.order.get16(&self.data, addr as usize))
    }

    fn get_byte(&mut self, ctx: &AccessCtx, addr: u32) -> BusResult<u8> {
        if !self.check(ctx, addr, 1, AccessKind::Read)? {
            return Ok(0);
        }
        Ok(self.order.get8(&self.data, addr as usize))
    }

    fn set_long(&mut self, ctx: &AccessCtx, addr: u32, value: u32) -> BusResult<()> {
        if self.check(ctx, addr, 4, AccessKind::Write)? {
            self.order.put32(&mut self.data, addr as usize, value);
        }
        Ok(())
    }

    fn set_word(&mut self, ctx: &AccessCtx, addr: u32, value: u16) -> BusResult<()> {
        if self.check(ctx, addr, 2, AccessKind::Write)? {
            self.order.put16(&mut self.data, addr as usize, value);
        }
        Ok(())
    }

    fn set_byte(&mut self, ctx: &AccessCtx, addr: u32, value: u8) -> BusResult<()> {
        if self.check(ctx, addr, 1, AccessKind::Write)? {
            self.order.put8(&mut self.data, addr as usize, value);
        }
        Ok(())
    }

    fn translate(&mut self, addr: u32) -> Option<&mut [u8]> {
        if addr >= self.size {
            return None;
        }
        self.data.get_mut(addr as usize..)
    }

    fn check_range(&self, addr: u32, size: u32) -> bool {
        addr as u64 + size as u64 <= self.size as u64
    }

    fn translate_meta(&mut self, addr: u32) -> Option<&mut [u8]> {
        if addr >= self.size {
            return None;
        }
        self.meta.get_mut(addr as usize..)
    }
}
