// crates/systems/oxid_palm/src/regs/command_itf.rs
// Sony CLIE command interface ASIC.
//
// The ROM talks to it through a command/parameter pair and polls a
// handshake byte that powers up as 0xFC. The LED and the vibrator hang off
// this chip, not the DragonBall.

use super::hal::{HalHandler, HalNext};
use super::{
    dispatch_read, dispatch_write, std_read, std_write, unsupported_write, RegisterBlock, RegisterChip, RegisterFile,
    RegisterMap,
};
use crate::memory::access::AccessCtx;
use oxide_core::BusResult;
use std::any::Any;

pub const COMMAND_ITF_RANGE: u32 = 0x400;

const COMMAND: u32 = 0x00;
const PARAMETER: u32 = 0x02;
const STATUS: u32 = 0x04;
const HANDSHAKE: u32 = 0x06;
const LED: u32 = 0x08;
const VIBRATE: u32 = 0x0A;

const HANDSHAKE_RESET: u8 = 0xFC;
const HANDSHAKE_PENDING: u16 = 0xFC00;
const HANDSHAKE_ACK: u16 = 0x0001;
const VIBRATE_ON: u16 = 0x0001;

pub struct CommandItf {
    start: u32,
    map: RegisterMap<CommandItf>,
    file: RegisterFile,
}

impl CommandItf {
    pub fn new(start: u32) -> Self {
        let mut map = RegisterMap::new(start, COMMAND_ITF_RANGE);
        map.set_handler(std_read, write_command, COMMAND, 2);
        map.set_handler(std_read, unsupported_write, STATUS, 2);
        map.set_handler(std_read, write_handshake, HANDSHAKE, 1);
        let mut chip = Self {
            start,
            map,
            file: RegisterFile::new(COMMAND_ITF_RANGE as usize),
        };
        chip.reset(true);
        chip
    }

    pub fn led(&self) -> u16 {
        self.file.get16(LED)
    }

    pub fn vibrating(&self) -> bool {
        self.file.get16(VIBRATE) & VIBRATE_ON != 0
    }
}

fn write_command(chip: &mut CommandItf, ctx: &AccessCtx, offset: u32, size: u8, value: u32) -> BusResult<()> {
    std_write(chip, ctx, offset, size, value)?;
    tracing::debug!(
        "CLIE command {:#06X} param {:#06X}",
        chip.file.get16(COMMAND),
        chip.file.get16(PARAMETER)
    );
    Ok(())
}

// A word write while the handshake still reads 0xFC00 acknowledges it.
fn write_handshake(chip: &mut CommandItf, ctx: &AccessCtx, offset: u32, size: u8, value: u32) -> BusResult<()> {
    if size == 2 && chip.file.get16(HANDSHAKE) == HANDSHAKE_PENDING {
        chip.file.put16(HANDSHAKE, HANDSHAKE_ACK);
        return Ok(());
    }
    std_write(chip, ctx, offset, size, value)
}

impl RegisterBlock for CommandItf {
    fn name(&self) -> &'static str {
        "command_itf"
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
        self.file = RegisterFile::new(COMMAND_ITF_RANGE as usize);
        self.file.put8(HANDSHAKE, HANDSHAKE_RESET);
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

impl RegisterChip for CommandItf {
    fn map(&self) -> &RegisterMap<Self> {
        &self.map
    }
}

impl HalHandler for CommandItf {
    fn vibrate_on(&self, _: HalNext<'_>) -> bool {
        self.vibrating()
    }

    fn led_state(&self, _: HalNext<'_>) -> u16 {
        self.led()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::access::MemAccessFlags;

    const BASE: u32 = 0x1100_0000;

    #[test]
    fn handshake_word_write_is_remapped_once() {
        let mut itf = CommandItf::new(BASE);
        let ctx = AccessCtx::default();
        assert_eq!(itf.read(&ctx, BASE + HANDSHAKE, 1).unwrap(), 0xFC);
        itf.write(&ctx, BASE + HANDSHAKE, 2, 0x1234).unwrap();
        assert_eq!(itf.read(&ctx, BASE + HANDSHAKE, 2).unwrap(), 0x0001);
        // no longer 0xFC00: plain store
        itf.write(&ctx, BASE + HANDSHAKE, 2, 0x1234).unwrap();
        assert_eq!(itf.read(&ctx, BASE + HANDSHAKE, 2).unwrap(), 0x1234);
    }

    #[test]
    fn byte_write_to_handshake_stores_as_is() {
        let mut itf = CommandItf::new(BASE);
        let ctx = AccessCtx::default();
        itf.write(&ctx, BASE + HANDSHAKE, 1, 0xFC).unwrap();
        assert_eq!(itf.read(&ctx, BASE + HANDSHAKE, 1).unwrap(), 0xFC);
    }

    #[test]
    fn status_writes_need_full_access() {
        let mut itf = CommandItf::new(BASE);
        let ctx = AccessCtx::default();
        assert!(itf.write(&ctx, BASE + STATUS, 2, 1).is_err());
        let full = AccessCtx {
            flags: MemAccessFlags::UNRESTRICTED,
            full_access_depth: 1,
            system_mode: true,
        };
        itf.write(&full, BASE + STATUS, 2, 1).unwrap();
        assert_eq!(itf.read(&ctx, BASE + STATUS, 2).unwrap(), 1);
    }

    #[test]
    fn led_and_vibrator_answer_the_chain() {
        let mut itf = CommandItf::new(BASE);
        let ctx = AccessCtx::default();
        let next = HalNext::new(&[]);
        assert!(!itf.vibrate_on(next));
        itf.write(&ctx, BASE + VIBRATE, 2, 1).unwrap();
        itf.write(&ctx, BASE + LED, 2, 0x0003).unwrap();
        assert!(itf.vibrate_on(next));
        assert_eq!(itf.led_state(next), 3);
    }
}
