// crates/systems/oxid_palm/src/memory/dummy.rs
use super::access::AccessCtx;
use super::AddressBank;
use oxide_core::{AccessKind, BusFault, BusResult};

/// Catch-all for banks nothing claimed.
#[derive(Debug, Default, Clone, Copy)]
pub struct DummyBank;

impl DummyBank {
    fn read(&self, ctx: &AccessCtx, addr: u32, size: u8) -> BusResult<u32> {
        if ctx.flags.validate_dummy_get {
            return Err(BusFault::bus(addr, size, AccessKind::Read));
        }
        tracing::trace!("unmapped read ({size}) at {addr:#010X}");
        Ok(0)
    }

    fn write(&self, ctx: &AccessCtx, addr: u32, size: u8, value: u32) -> BusResult<()> {
        if ctx.flags.validate_dummy_set {
            return Err(BusFault::bus(addr, size, AccessKind::Write));
        }
        tracing::trace!("unmapped write ({size}) of {value:#X} at {addr:#010X}");
        Ok(())
    }
}

impl AddressBank for DummyBank {
    fn name(&self) -> &'static str {
        "dummy"
    }

    fn get_long(&mut self, ctx: &AccessCtx, addr: u32) -> BusResult<u32> {
        self.read(ctx, addr, 4)
    }

    fn get_word(&mut self, ctx: &AccessCtx, addr: u32) -> BusResult<u16> {
        self.read(ctx, addr, 2).map(|v| v as u16)
    }

    fn get_byte(&mut self, ctx: &AccessCtx, addr: u32) -> BusResult<u8> {
        self.read(ctx, addr, 1).map(|v| v as u8)
    }

    fn set_long(&mut self, ctx: &AccessCtx, addr: u32, value: u32) -> BusResult<()> {
        self.write(ctx, addr, 4, value)
    }

    fn set_word(&mut self, ctx: &AccessCtx, addr: u32, value: u16) -> BusResult<()> {
        self.write(ctx, addr, 2, value as u32)
    }

    fn set_byte(&mut self, ctx: &AccessCtx, addr: u32, value: u8) -> BusResult<()> {
        self.write(ctx, addr, 1, value as u32)
    }

    fn translate(&mut self, _addr: u32) -> Option<&mut [u8]> {
        None
    }

    fn check_range(&self, _addr: u32, _size: u32) -> bool {
        false
    }
}
