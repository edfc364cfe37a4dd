// crates/systems/oxid_palm/src/memory/rom.rs
use super::access::AccessCtx;
use super::endian::{storage_len, ByteOrder};
use super::AddressBank;
use oxide_core::{AccessKind, BusFault, BusResult};

/// Flash/mask ROM wait states per opcode word.
const ROM_WAIT_STATES: u32 = 2;

/// The Palm OS image. One bundle covers every bank the image spans and
/// works out offsets from its base.
pub struct RomBank {
    base: u32,
    size: u32,
    order: ByteOrder,
    data: Vec<u8>,
}

impl RomBank {
    pub fn new(base: u32, image: &[u8], order: ByteOrder) -> Self {
        let mut data = vec![0; storage_len(image.len())];
        order.load_image(&mut data, image);
        Self {
            base,
            size: image.len() as u32,
            order,
            data,
        }
    }

    pub fn empty() -> Self {
        Self::new(0, &[], ByteOrder::host())
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn export(&self) -> Vec<u8> {
        self.order.export(&self.data, 0, self.size as usize)
    }

    /// Offset into the image, or `None` when `[addr, addr + size)` is not
    /// fully inside it.
    fn offset(&self, addr: u32, size: u8) -> Option<usize> {
        let off = addr.checked_sub(self.base)?;
        (off as u64 + size as u64 <= self.size as u64).then_some(off as usize)
    }

    fn read(&self, ctx: &AccessCtx, addr: u32, size: u8) -> BusResult<u32> {
        match self.offset(addr, size) {
            Some(off) => Ok(self.order.get(&self.data, off, size)),
            None if ctx.flags.validate_rom_get => Err(BusFault::bus(addr, size, AccessKind::Read)),
            None => Ok(0),
        }
    }

    fn write(&mut self, ctx: &AccessCtx, addr: u32, size: u8, value: u32) -> BusResult<()> {
        if ctx.flags.validate_rom_set {
            return Err(BusFault::bus(addr, size, AccessKind::Write));
        }
        // Full access may patch the image in place.
        if let Some(off) = self.offset(addr, size) {
            self.order.put(&mut self.data, off, size, value);
        }
        Ok(())
    }
}

impl AddressBank for RomBank {
    fn name(&self) -> &'static str {
        "rom"
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

    fn translate(&mut self, addr: u32) -> Option<&mut [u8]> {
        let off = self.offset(addr, 1)?;
        self.data.get_mut(off..)
    }

    fn check_range(&self, addr: u32, size: u32) -> bool {
        match addr.checked_sub(self.base) {
            Some(off) => off as u64 + size as u64 <= self.size as u64,
            None => false,
        }
    }

    fn add_opcode_cycles(&self) -> u32 {
        ROM_WAIT_STATES
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::access::MemAccessFlags;

    #[test]
    fn writes_fault_unless_unrestricted() {
        let mut rom = RomBank::new(0x1000_0000, &[0xAA, 0xBB, 0xCC, 0xDD], ByteOrder::host());
        let ctx = AccessCtx::default();
        assert_eq!(
            rom.set_word(&ctx, 0x1000_0000, 0),
            Err(BusFault::bus(0x1000_0000, 2, AccessKind::Write))
        );
        let full = AccessCtx {
            flags: MemAccessFlags::UNRESTRICTED,
            full_access_depth: 1,
            ..ctx
        };
        rom.set_word(&full, 0x1000_0002, 0x1234).unwrap();
        assert_eq!(rom.get_long(&ctx, 0x1000_0000).unwrap(), 0xAABB_1234);
        assert_eq!(rom.export(), vec![0xAA, 0xBB, 0x12, 0x34]);
    }

    #[test]
    fn reads_past_the_image_follow_validate_flag() {
        let mut rom = RomBank::new(0x1000_0000, &[1, 2], ByteOrder::BIG_ENDIAN);
        let ctx = AccessCtx::default();
        assert!(rom.get_long(&ctx, 0x1000_0000).is_err());
        let mut lax = ctx;
        lax.flags.validate_rom_get = false;
        assert_eq!(rom.get_long(&lax, 0x1000_0000).unwrap(), 0);
        assert_eq!(rom.get_word(&lax, 0x1000_0000).unwrap(), 0x0102);
    }
}
