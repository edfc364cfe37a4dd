// crates/systems/oxid_palm/src/regs/spi.rs
//! SPI master and its slaves.
//!
//! Writing the data register only stages a word. Nothing reaches the slave
//! until the control register is written with the exchange (latch enable)
//! bit set; then the staged word is shifted out and the slave's answer
//! replaces the data register. Chip select comes from a CPU GPIO, so the
//! master watches port changes on the capability chain.

use super::hal::{HalHandler, HalNextMut, HalResult};
use super::{dispatch_read, dispatch_write, std_write, RegisterBlock, RegisterChip, RegisterFile, RegisterMap};
use crate::memory::access::AccessCtx;
use oxide_core::BusResult;
use std::any::Any;

pub const SPI_RANGE: u32 = 0x10;

const SPIDATA: u32 = 0x00;
const SPICONT: u32 = 0x02;

const CONT_XCH: u16 = 0x0200; // exchange / latch enable
const CONT_IRQ: u16 = 0x0080; // transfer complete
const CONT_BITS: u16 = 0x000F; // bit count - 1

/// GPIO carrying the slave's chip select (active low).
const CS_PORT: char = 'G';
const CS_BIT: u8 = 0x04;

pub trait SpiSlave: Any {
    fn name(&self) -> &'static str;
    fn select(&mut self, selected: bool);
    /// Shifts `bits` bits of `out` in, returns what the slave shifted out.
    fn exchange(&mut self, out: u16, bits: u8) -> u16;
    fn reset(&mut self) {}
    /// Internal state for session persistence; fixed length per slave.
    fn save(&self) -> Vec<u8> {
        Vec::new()
    }
    fn load(&mut self, _bytes: &[u8]) {}
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub struct SpiMaster {
    start: u32,
    map: RegisterMap<SpiMaster>,
    file: RegisterFile,
    slave: Option<Box<dyn SpiSlave>>,
    selected: bool,
    staged: u16,
}

impl SpiMaster {
    pub fn new(start: u32) -> Self {
        let mut map = RegisterMap::new(start, SPI_RANGE);
        map.set_handler(super::std_read, write_data, SPIDATA, 2);
        map.set_handler(super::std_read, write_control, SPICONT, 2);
        Self {
            start,
            map,
            file: RegisterFile::new(SPI_RANGE as usize),
            slave: None,
            selected: false,
            staged: 0,
        }
    }

    pub fn with_slave(mut self, slave: Box<dyn SpiSlave>) -> Self {
        self.slave = Some(slave);
        self
    }

    pub fn slave_mut<T: SpiSlave>(&mut self) -> Option<&mut T> {
        self.slave.as_mut()?.as_any_mut().downcast_mut::<T>()
    }

    pub fn staged(&self) -> u16 {
        self.staged
    }

    pub fn selected(&self) -> bool {
        self.selected
    }
}

fn write_data(chip: &mut SpiMaster, ctx: &AccessCtx, offset: u32, size: u8, value: u32) -> BusResult<()> {
    std_write(chip, ctx, offset, size, value)?;
    chip.staged = chip.file.get16(SPIDATA);
    Ok(())
}

fn write_control(chip: &mut SpiMaster, ctx: &AccessCtx, offset: u32, size: u8, value: u32) -> BusResult<()> {
    std_write(chip, ctx, offset, size, value)?;
    let ctl = chip.file.get16(SPICONT);
    if ctl & CONT_XCH == 0 {
        return Ok(());
    }
    let bits = (ctl & CONT_BITS) as u8 + 1;
    let answer = match chip.slave.as_mut() {
        Some(slave) if chip.selected => {
            let a = slave.exchange(chip.staged, bits);
            tracing::trace!("SPI {}: out {:#06X} in {a:#06X}", slave.name(), chip.staged);
            a
        }
        _ => 0,
    };
    chip.file.put16(SPIDATA, answer);
    chip.file.put16(SPICONT, (ctl & !CONT_XCH) | CONT_IRQ);
    Ok(())
}

impl RegisterBlock for SpiMaster {
    fn name(&self) -> &'static str {
        "spi"
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
        self.file = RegisterFile::new(SPI_RANGE as usize);
        self.staged = 0;
        self.selected = false;
        if let Some(slave) = self.slave.as_mut() {
            slave.reset();
        }
    }

    // Register image, then the chip-select line, then the slave's state.
    fn save(&self) -> Vec<u8> {
        let mut out = self.file.bytes().to_vec();
        out.push(self.selected as u8);
        if let Some(slave) = self.slave.as_ref() {
            out.extend(slave.save());
        }
        out
    }

    fn load(&mut self, bytes: &[u8]) {
        let file = self.file.bytes_mut();
        let n = file.len().min(bytes.len());
        file[..n].copy_from_slice(&bytes[..n]);
        self.staged = self.file.get16(SPIDATA);
        self.selected = bytes.get(n) == Some(&1);
        if let Some(slave) = self.slave.as_mut() {
            slave.load(bytes.get(n + 1..).unwrap_or_default());
        }
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

impl RegisterChip for SpiMaster {
    fn map(&self) -> &RegisterMap<Self> {
        &self.map
    }
}

impl HalHandler for SpiMaster {
    fn port_data_changed(&mut self, next: HalNextMut<'_, '_>, port: char, old: u8, new: u8) -> HalResult<()> {
        if port == CS_PORT && (old ^ new) & CS_BIT != 0 {
            self.selected = new & CS_BIT == 0;
            if let Some(slave) = self.slave.as_mut() {
                slave.select(self.selected);
            }
        }
        next.port_data_changed(port, old, new)
    }
}

// ============================================================================
//  ADS7843/7846 TOUCH DIGITIZER
// ============================================================================

const ADS_START: u8 = 0x80;
const ADS_CHANNEL_SHIFT: u8 = 4;

/// Resistive touch-screen ADC. The control byte arrives in the low byte of
/// a transfer; the 12-bit result of a conversion is shifted out, left
/// justified, on the following transfer.
#[derive(Debug, Clone, Default)]
pub struct Ads784x {
    selected: bool,
    pen: Option<(u16, u16)>,
    result: u16,
    battery: u16,
}

impl Ads784x {
    pub fn new() -> Self {
        Self {
            battery: 0x0C00,
            ..Self::default()
        }
    }

    /// Raw 12-bit panel coordinates, or `None` with the pen up.
    pub fn set_pen(&mut self, pen: Option<(u16, u16)>) {
        self.pen = pen.map(|(x, y)| (x & 0x0FFF, y & 0x0FFF));
    }

    pub fn pen(&self) -> Option<(u16, u16)> {
        self.pen
    }

    fn convert(&self, channel: u8) -> u16 {
        match (channel, self.pen) {
            (1, Some((_, y))) => y,
            (5, Some((x, _))) => x,
            (3, Some(_)) => 0x0800, // Z1: pressure
            (4, Some(_)) => 0x0400, // Z2
            (2, _) => self.battery,
            _ => 0,
        }
    }
}

impl SpiSlave for Ads784x {
    fn name(&self) -> &'static str {
        "ads784x"
    }

    fn select(&mut self, selected: bool) {
        self.selected = selected;
    }

    fn exchange(&mut self, out: u16, _bits: u8) -> u16 {
        if !self.selected {
            return 0;
        }
        let answer = self.result << 3;
        let control = out as u8;
        if control & ADS_START != 0 {
            self.result = self.convert((control >> ADS_CHANNEL_SHIFT) & 0x07);
        }
        answer
    }

    fn reset(&mut self) {
        self.selected = false;
        self.result = 0;
    }

    // Pen position is host input and is not part of the record.
    fn save(&self) -> Vec<u8> {
        let [hi, lo] = self.result.to_be_bytes();
        vec![self.selected as u8, hi, lo]
    }

    fn load(&mut self, bytes: &[u8]) {
        if let [selected, hi, lo, ..] = *bytes {
            self.selected = selected == 1;
            self.result = u16::from_be_bytes([hi, lo]);
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::hal::HalHandler;

    const BASE: u32 = 0x1FE0_0000;

    fn select(spi: &mut SpiMaster, on: bool) {
        let (old, new) = if on { (CS_BIT, 0) } else { (0, CS_BIT) };
        let mut rest: [&mut dyn HalHandler; 0] = [];
        // Tail is empty; the forward reports it, the select still happened.
        let _ = spi.port_data_changed(HalNextMut::new(&mut rest), CS_PORT, old, new);
    }

    #[test]
    fn data_write_only_stages() {
        let mut digitizer = Ads784x::new();
        digitizer.set_pen(Some((0x123, 0x456)));
        let mut spi = SpiMaster::new(BASE).with_slave(Box::new(digitizer));
        select(&mut spi, true);
        let ctx = AccessCtx::default();

        spi.write(&ctx, BASE + SPIDATA, 2, 0x00D0).unwrap();
        assert_eq!(spi.staged(), 0x00D0);
        assert_eq!(spi.slave_mut::<Ads784x>().unwrap().result, 0);

        spi.write(&ctx, BASE + SPICONT, 2, (CONT_XCH | 0x0F) as u32).unwrap();
        assert_eq!(spi.slave_mut::<Ads784x>().unwrap().result, 0x123);
        let ctl = spi.read(&ctx, BASE + SPICONT, 2).unwrap() as u16;
        assert_eq!(ctl & CONT_XCH, 0);
        assert_ne!(ctl & CONT_IRQ, 0);

        // next exchange shifts the X sample out
        spi.write(&ctx, BASE + SPIDATA, 2, 0x0090).unwrap();
        spi.write(&ctx, BASE + SPICONT, 2, (CONT_XCH | 0x0F) as u32).unwrap();
        assert_eq!(spi.read(&ctx, BASE + SPIDATA, 2).unwrap(), (0x123 << 3) as u32);
    }

    #[test]
    fn saved_state_keeps_chip_select_and_pending_sample() {
        let mut digitizer = Ads784x::new();
        digitizer.set_pen(Some((0x321, 0x654)));
        let mut spi = SpiMaster::new(BASE).with_slave(Box::new(digitizer));
        select(&mut spi, true);
        let ctx = AccessCtx::default();
        spi.write(&ctx, BASE + SPIDATA, 2, 0x00D0).unwrap();
        spi.write(&ctx, BASE + SPICONT, 2, (CONT_XCH | 0x0F) as u32).unwrap();
        let saved = spi.save();
        assert_eq!(saved.len(), SPI_RANGE as usize + 1 + 3);

        let mut back = SpiMaster::new(BASE).with_slave(Box::new(Ads784x::new()));
        back.load(&saved);
        assert!(back.selected());
        back.write(&ctx, BASE + SPIDATA, 2, 0x0000).unwrap();
        back.write(&ctx, BASE + SPICONT, 2, (CONT_XCH | 0x0F) as u32).unwrap();
        assert_eq!(back.read(&ctx, BASE + SPIDATA, 2).unwrap(), (0x321 << 3) as u32);
    }

    #[test]
    fn deselected_slave_sees_nothing() {
        let mut spi = SpiMaster::new(BASE).with_slave(Box::new(Ads784x::new()));
        let ctx = AccessCtx::default();
        spi.write(&ctx, BASE + SPIDATA, 2, 0x00A0).unwrap();
        spi.write(&ctx, BASE + SPICONT, 2, CONT_XCH as u32).unwrap();
        assert_eq!(spi.read(&ctx, BASE + SPIDATA, 2).unwrap(), 0);
        select(&mut spi, true);
        assert!(spi.selected());
        select(&mut spi, false);
        assert!(!spi.selected());
    }
}
