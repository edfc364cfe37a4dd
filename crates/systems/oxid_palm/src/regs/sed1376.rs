// crates/systems/oxid_palm/src/regs/sed1376.rs
// Epson SED1376 external LCD controller.
//
// Register file is byte wide and little endian for multi-byte fields. The
// 80 KiB display buffer lives outside this block (mapped host memory at
// `vram_base`); this block only says where the frame starts.

use super::hal::{HalHandler, HalNext, HalResult};
use super::{dispatch_read, dispatch_write, null_write, std_read, std_write, RegisterBlock, RegisterChip, RegisterFile, RegisterMap};
use crate::memory::access::AccessCtx;
use oxide_core::BusResult;
use std::any::Any;

pub const SED1376_RANGE: u32 = 0x100;
pub const SED1376_VRAM_SIZE: u32 = 0x1_4000;

const REV_CODE: u32 = 0x00; // product / revision code (read only)
const DISP_BUFFER_SIZE: u32 = 0x01; // in 4 KiB units (read only)
const HDP: u32 = 0x14; // horizontal display period: width / 8 - 1
const VDP: u32 = 0x1C; // vertical display period (2 bytes LE): height - 1
const DISPLAY_MODE: u32 = 0x70;
const MAIN_START: u32 = 0x74; // main window start address (3 bytes LE, dwords)
const LINE_OFFSET: u32 = 0x78; // main window line offset (2 bytes LE, dwords)
const POWER_SAVE: u32 = 0xA0;

const PRODUCT_CODE: u8 = 0x28;
const DISPLAY_BLANK: u8 = 0x80;
const POWER_SAVE_ON: u8 = 0x01;

pub struct Sed1376 {
    start: u32,
    vram_base: u32,
    map: RegisterMap<Sed1376>,
    file: RegisterFile,
    frame_dirty: bool,
}

impl Sed1376 {
    pub fn new(start: u32, vram_base: u32) -> Self {
        let mut map = RegisterMap::new(start, SED1376_RANGE);
        map.set_handler(std_read, null_write, REV_CODE, 1);
        map.set_handler(std_read, null_write, DISP_BUFFER_SIZE, 1);
        map.set_handler(std_read, write_start_address, MAIN_START, 3);
        let mut chip = Self {
            start,
            vram_base,
            map,
            file: RegisterFile::new(SED1376_RANGE as usize),
            frame_dirty: false,
        };
        chip.reset(true);
        chip
    }

    pub fn vram_base(&self) -> u32 {
        self.vram_base
    }

    pub fn take_frame_dirty(&mut self) -> bool {
        std::mem::take(&mut self.frame_dirty)
    }

    fn le(&self, offset: u32, len: u32) -> u32 {
        (0..len).fold(0, |acc, i| acc | (self.file.get8(offset + i) as u32) << (8 * i))
    }

    fn set_le(&mut self, offset: u32, len: u32, value: u32) {
        for i in 0..len {
            self.file.put8(offset + i, (value >> (8 * i)) as u8);
        }
    }

    pub fn width(&self) -> u32 {
        (self.file.get8(HDP) as u32 + 1) * 8
    }

    pub fn height(&self) -> u32 {
        self.le(VDP, 2) + 1
    }

    /// Frame start, as an emulated address.
    pub fn frame_start(&self) -> u32 {
        self.vram_base.wrapping_add(self.le(MAIN_START, 3) * 4)
    }

    fn row_bytes(&self) -> u32 {
        self.le(LINE_OFFSET, 2) * 4
    }
}

fn write_start_address(chip: &mut Sed1376, ctx: &AccessCtx, offset: u32, size: u8, value: u32) -> BusResult<()> {
    std_write(chip, ctx, offset, size, value)?;
    chip.frame_dirty = true;
    tracing::trace!("SED1376 frame now at {:#010X}", chip.frame_start());
    Ok(())
}

impl RegisterBlock for Sed1376 {
    fn name(&self) -> &'static str {
        "sed1376"
    }

    fn start(&self) -> u32 {
        self.start
    }

    fn file(&self) -> &RegisterFile {
        &self.file
    }

    fn file_mut(&mut self) -> &mut RegisterFile {
        &mut self.file
    }

    fn read(&mut self, ctx: &AccessCtx, addr: u32, size: u8) -> BusResult<u32> {
        dispatch_read(self, ctx, addr, size)
    }

    fn write(&mut self, ctx: &AccessCtx, addr: u32, size: u8, value: u32) -> BusResult<()> {
        dispatch_write(self, ctx, addr, size, value)
    }

    fn reset(&mut self, _hardware: bool) {
        self.file = RegisterFile::new(SED1376_RANGE as usize);
        self.file.put8(REV_CODE, PRODUCT_CODE);
        self.file.put8(DISP_BUFFER_SIZE, (SED1376_VRAM_SIZE / 0x1000) as u8);
        // 160x160, 16 bpp
        self.file.put8(HDP, 160 / 8 - 1);
        self.set_le(VDP, 2, 159);
        self.file.put8(DISPLAY_MODE, 0x04);
        self.set_le(LINE_OFFSET, 2, 160 * 2 / 4);
        self.frame_dirty = true;
    }

    fn hal(&mut self) -> Option<&mut dyn HalHandler> {
        Some(self)
    }

    fn hal_ref(&self) -> Option<&dyn HalHandler> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl RegisterChip for Sed1376 {
    fn map(&self) -> &RegisterMap<Self> {
        &self.map
    }
}

// Backlight is a CPU GPIO on these boards, so that query forwards.
impl HalHandler for Sed1376 {
    fn lcd_screen_on(&self, _: HalNext<'_>) -> HalResult<bool> {
        let blank = self.file.get8(DISPLAY_MODE) & DISPLAY_BLANK != 0;
        let saving = self.file.get8(POWER_SAVE) & POWER_SAVE_ON != 0;
        Ok(!blank && !saving)
    }

    fn lcd_has_frame(&self, _: HalNext<'_>) -> HalResult<bool> {
        Ok(true)
    }

    fn lcd_begin_end(&self, _: HalNext<'_>) -> HalResult<(u32, u32)> {
        let begin = self.frame_start();
        Ok((begin, begin.wrapping_add(self.row_bytes().wrapping_mul(self.height()))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: u32 = 0x1FF8_0000;
    const VRAM: u32 = 0x1FFA_0000;

    #[test]
    fn product_code_ignores_writes() {
        let mut lcd = Sed1376::new(BASE, VRAM);
        let ctx = AccessCtx::default();
        lcd.write(&ctx, BASE + REV_CODE, 1, 0).unwrap();
        assert_eq!(lcd.read(&ctx, BASE + REV_CODE, 1).unwrap(), PRODUCT_CODE as u32);
    }

    #[test]
    fn start_address_write_dirties_the_frame() {
        let mut lcd = Sed1376::new(BASE, VRAM);
        let ctx = AccessCtx::default();
        assert!(lcd.take_frame_dirty());
        assert!(!lcd.take_frame_dirty());

        lcd.write(&ctx, BASE + MAIN_START, 1, 0x10).unwrap();
        assert!(lcd.take_frame_dirty());
        let next = HalNext::new(&[]);
        assert_eq!(
            lcd.lcd_begin_end(next),
            Ok((VRAM + 0x40, VRAM + 0x40 + 320 * 160))
        );
    }

    #[test]
    fn blanking_turns_the_screen_off() {
        let mut lcd = Sed1376::new(BASE, VRAM);
        let ctx = AccessCtx::default();
        let next = HalNext::new(&[]);
        assert_eq!(lcd.lcd_screen_on(next), Ok(true));
        lcd.write(&ctx, BASE + DISPLAY_MODE, 1, 0x84).unwrap();
        assert_eq!(lcd.lcd_screen_on(next), Ok(false));
        // nothing behind it answers the backlight
        assert!(lcd.lcd_backlight_on(next).is_err());
    }
}
