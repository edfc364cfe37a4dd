// crates/systems/oxid_palm/src/regs/dragonball.rs
// Motorola DragonBall EZ/VZ/SZ on-chip registers ($FFFFF000-$FFFFFFFF)
//
// Only the registers Palm OS pokes at during boot and normal operation get
// handlers; everything else is plain storage in the register file.

use super::hal::{HalEvent, HalHandler, HalNext, HalNextMut, HalResult, KeyInfo, LineDriver};
use super::{
    dispatch_read, dispatch_write, null_write, std_read, std_write, RegisterBlock, RegisterChip, RegisterFile,
    RegisterMap,
};
use crate::memory::access::AccessCtx;
use crate::transport::Transport;
use bitflags::bitflags;
use oxide_core::BusResult;
use std::any::Any;
use std::sync::Arc;

pub const DRAGONBALL_BASE: u32 = 0xFFFF_F000;
pub const DRAGONBALL_RANGE: u32 = 0x1000;

// ============================================================================
//  REGISTER OFFSETS
// ============================================================================

const SCR: u32 = 0x000; // System Control
const IDR: u32 = 0x004; // Chip ID (read only)
const PLLCR: u32 = 0x200; // PLL Control
const PLLFSR: u32 = 0x202; // PLL Frequency Select
const IMR: u32 = 0x304; // Interrupt Mask
const ISR: u32 = 0x30C; // Interrupt Status (pending & !mask)
const IPR: u32 = 0x310; // Interrupt Pending

const USTCNT: u32 = 0x900; // UART status/control
const URX: u32 = 0x904; // UART receiver
const UTX: u32 = 0x906; // UART transmitter
const UMISC: u32 = 0x908; // UART misc

const LSSA: u32 = 0xA00; // LCD screen start address
const LVPW: u32 = 0xA05; // LCD virtual page width (words)
const LXMAX: u32 = 0xA08;
const LYMAX: u32 = 0xA0A;
const LCKCON: u32 = 0xA27; // LCD clocking control

const PLLFSR_CLK32: u16 = 0x8000;
const USTCNT_UEN: u16 = 0x8000;
const USTCNT_TXEN: u16 = 0x2000;
const UMISC_IRDAEN: u16 = 0x0010;
const URX_DATA_READY: u16 = 0x2000;
const UTX_TX_AVAIL: u16 = 0x2000;
const LCKCON_LCDON: u8 = 0x80;
const PORTG_BACKLIGHT: u8 = 0x02;

/// GPIO ports: (letter, direction register, data register, pull-up register).
const PORTS: [(char, u32, u32, u32); 9] = [
    ('B', 0x408, 0x409, 0x40A),
    ('C', 0x410, 0x411, 0x412),
    ('D', 0x418, 0x419, 0x41A),
    ('E', 0x420, 0x421, 0x422),
    ('F', 0x428, 0x429, 0x42A),
    ('G', 0x430, 0x431, 0x432),
    ('J', 0x438, 0x439, 0x43A),
    ('K', 0x440, 0x441, 0x442),
    ('M', 0x448, 0x449, 0x44A),
];

fn port(letter: char) -> Option<(u32, u32, u32)> {
    PORTS
        .iter()
        .find(|(l, ..)| *l == letter.to_ascii_uppercase())
        .map(|&(_, dir, data, pullup)| (dir, data, pullup))
}

fn port_by_data(offset: u32) -> Option<char> {
    PORTS.iter().find(|p| p.2 == offset).map(|p| p.0)
}

// ============================================================================
//  FLAGS
// ============================================================================

bitflags! {
    /// Hardware buttons, wired to port D (active low).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HardButtons: u8 {
        const POWER    = 1 << 0;
        const UP       = 1 << 1;
        const DOWN     = 1 << 2;
        const APP1     = 1 << 3; // Agenda
        const APP2     = 1 << 4; // Direcciones
        const APP3     = 1 << 5; // Tareas
        const APP4     = 1 << 6; // Notas
        const CONTRAST = 1 << 7;
    }
}

bitflags! {
    /// Interrupt sources as laid out in IMR/ISR/IPR.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct IrqSource: u32 {
        const SPI   = 1 << 0;
        const TIMER = 1 << 1;
        const UART  = 1 << 2;
        const WDT   = 1 << 3;
        const RTC   = 1 << 4;
        const KB    = 1 << 6;
        const PWM   = 1 << 7;
        const INT0  = 1 << 8;
        const INT1  = 1 << 9;
        const INT2  = 1 << 10;
        const INT3  = 1 << 11;
        const IRQ1  = 1 << 16;
        const IRQ2  = 1 << 17;
        const IRQ3  = 1 << 18;
        const IRQ6  = 1 << 19;
        const PEN   = 1 << 20;
        const SAM   = 1 << 22;
    }
}

impl IrqSource {
    /// 68K interrupt level of the highest-priority source in `self`.
    pub fn level(self) -> Option<u8> {
        if self.is_empty() {
            None
        } else if self.intersects(IrqSource::TIMER | IrqSource::IRQ6) {
            Some(6)
        } else if self.contains(IrqSource::PEN) {
            Some(5)
        } else if !(self - IrqSource::IRQ1 - IrqSource::IRQ2 - IrqSource::IRQ3).is_empty() {
            Some(4)
        } else if self.contains(IrqSource::IRQ3) {
            Some(3)
        } else if self.contains(IrqSource::IRQ2) {
            Some(2)
        } else {
            Some(1)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragonBallModel {
    Ez,
    Vz,
    Sz,
}

impl DragonBallModel {
    fn chip_id(self) -> u32 {
        match self {
            DragonBallModel::Ez => 0x455A_0000,
            DragonBallModel::Vz => 0x565A_0000,
            DragonBallModel::Sz => 0x535A_0000,
        }
    }

    /// PLLCR and PLLFSR at reset.
    fn pll_reset(self) -> (u16, u16) {
        match self {
            DragonBallModel::Ez => (0x2430, 0x0123),
            DragonBallModel::Vz | DragonBallModel::Sz => (0x2430, 0x0347),
        }
    }
}

// ============================================================================
//  CHIP
// ============================================================================

pub struct DragonBall {
    model: DragonBallModel,
    map: RegisterMap<DragonBall>,
    file: RegisterFile,
    buttons: HardButtons,
    serial: Option<Arc<dyn Transport>>,
    events: Vec<HalEvent>,
    frame_dirty: bool,
}

impl DragonBall {
    pub fn new(model: DragonBallModel) -> Self {
        let mut map = RegisterMap::new(DRAGONBALL_BASE, DRAGONBALL_RANGE);
        map.set_handler(std_read, null_write, IDR, 4);
        map.set_handler(read_pllfsr, std_write, PLLFSR, 2);
        map.set_handler(read_isr, write_isr, ISR, 4);
        map.set_handler(std_read, write_ipr, IPR, 4);
        for (_, _, data, _) in PORTS {
            map.set_handler(read_port_data, write_port_data, data, 1);
        }
        map.set_handler(std_read, write_ustcnt, USTCNT, 2);
        map.set_handler(read_urx, null_write, URX, 2);
        map.set_handler(read_utx, write_utx, UTX, 2);
        map.set_handler(std_read, write_lssa, LSSA, 4);

        let mut chip = Self {
            model,
            map,
            file: RegisterFile::new(DRAGONBALL_RANGE as usize),
            buttons: HardButtons::empty(),
            serial: None,
            events: Vec::new(),
            frame_dirty: false,
        };
        chip.reset(true);
        chip
    }

    pub fn model(&self) -> DragonBallModel {
        self.model
    }

    pub fn attach_serial(&mut self, transport: Arc<dyn Transport>) {
        tracing::debug!("UART attached to {}", transport.name());
        self.serial = Some(transport);
    }

    pub fn detach_serial(&mut self) -> Option<Arc<dyn Transport>> {
        self.serial.take()
    }

    pub fn pending_irqs(&self) -> IrqSource {
        IrqSource::from_bits_retain(self.file.get32(IPR))
    }

    pub fn irq_mask(&self) -> IrqSource {
        IrqSource::from_bits_retain(self.file.get32(IMR))
    }

    pub fn raise_irq(&mut self, source: IrqSource) {
        let pending = self.pending_irqs() | source;
        self.file.put32(IPR, pending.bits());
    }

    pub fn clear_irq(&mut self, source: IrqSource) {
        let pending = self.pending_irqs() - source;
        self.file.put32(IPR, pending.bits());
    }

    pub fn buttons(&self) -> HardButtons {
        self.buttons
    }

    /// True once after the LCD start address was rewritten.
    pub fn take_frame_dirty(&mut self) -> bool {
        std::mem::take(&mut self.frame_dirty)
    }

    fn port_input(&self, letter: char) -> u8 {
        let Some((_, _, pullup)) = port(letter) else {
            return 0;
        };
        let mut input = self.file.get8(pullup);
        if letter.eq_ignore_ascii_case(&'D') {
            input &= !self.buttons.bits();
        }
        input
    }

    /// What the CPU reads from a data register: driven bits from the data
    /// latch, the rest from the pins.
    fn port_value(&self, letter: char) -> u8 {
        let Some((dir, data, _)) = port(letter) else {
            return 0;
        };
        let dir = self.file.get8(dir);
        (self.file.get8(data) & dir) | (self.port_input(letter) & !dir)
    }

    fn line_driver(&self) -> LineDriver {
        if self.file.get16(UMISC) & UMISC_IRDAEN != 0 {
            LineDriver::Irda
        } else {
            LineDriver::Rs232
        }
    }

    fn lcd_bounds(&self) -> (u32, u32) {
        let start = self.file.get32(LSSA);
        let row_bytes = self.file.get8(LVPW) as u32 * 2;
        let height = self.file.get16(LYMAX) as u32 + 1;
        // Addresses wrap at 32 bits like the bus.
        (start, start.wrapping_add(row_bytes * height))
    }
}

// ============================================================================
//  HANDLERS
// ============================================================================

// CLK32 toggles on every read; boot code spins on it.
fn read_pllfsr(chip: &mut DragonBall, ctx: &AccessCtx, offset: u32, size: u8) -> BusResult<u32> {
    let v = chip.file.get16(PLLFSR) ^ PLLFSR_CLK32;
    chip.file.put16(PLLFSR, v);
    std_read(chip, ctx, offset, size)
}

fn read_isr(chip: &mut DragonBall, ctx: &AccessCtx, offset: u32, size: u8) -> BusResult<u32> {
    let isr = chip.pending_irqs() - chip.irq_mask();
    chip.file.put32(ISR, isr.bits());
    std_read(chip, ctx, offset, size)
}

// Write one to clear.
fn write_isr(chip: &mut DragonBall, ctx: &AccessCtx, offset: u32, size: u8, value: u32) -> BusResult<()> {
    chip.file.put32(ISR, 0);
    std_write(chip, ctx, offset, size, value)?;
    let cleared = IrqSource::from_bits_retain(chip.file.get32(ISR));
    chip.clear_irq(cleared);
    let isr = chip.pending_irqs() - chip.irq_mask();
    chip.file.put32(ISR, isr.bits());
    Ok(())
}

// IPR mirrors the pin/peripheral state; the CPU cannot set bits in it.
fn write_ipr(chip: &mut DragonBall, ctx: &AccessCtx, offset: u32, size: u8, value: u32) -> BusResult<()> {
    if ctx.access_ok() {
        return std_write(chip, ctx, offset, size, value);
    }
    null_write(chip, ctx, offset, size, value)
}

fn read_port_data(chip: &mut DragonBall, _: &AccessCtx, offset: u32, _: u8) -> BusResult<u32> {
    Ok(port_by_data(offset).map_or(0, |p| chip.port_value(p)) as u32)
}

fn write_port_data(chip: &mut DragonBall, ctx: &AccessCtx, offset: u32, size: u8, value: u32) -> BusResult<()> {
    let old = chip.file.get8(offset);
    std_write(chip, ctx, offset, size, value)?;
    let new = chip.file.get8(offset);
    if old != new {
        if let Some(port) = port_by_data(offset) {
            chip.events.push(HalEvent::PortDataChanged { port, old, new });
        }
    }
    Ok(())
}

fn write_ustcnt(chip: &mut DragonBall, ctx: &AccessCtx, offset: u32, size: u8, value: u32) -> BusResult<()> {
    let was_on = chip.file.get16(USTCNT) & USTCNT_UEN != 0;
    std_write(chip, ctx, offset, size, value)?;
    let on = chip.file.get16(USTCNT) & USTCNT_UEN != 0;
    if on != was_on {
        tracing::debug!("UART {}", if on { "enabled" } else { "disabled" });
        chip.events.push(HalEvent::LineDriverChanged(chip.line_driver()));
    }
    Ok(())
}

// Reading the low byte pops one received byte; the status half alone does not.
fn read_urx(chip: &mut DragonBall, ctx: &AccessCtx, offset: u32, size: u8) -> BusResult<u32> {
    let pops = size == 2 || offset == URX + 1;
    let mut value = 0u16;
    if pops {
        if let Some(b) = chip.serial.as_ref().and_then(|t| t.read_byte()) {
            value = URX_DATA_READY | b as u16;
        }
    } else if chip.serial.as_ref().is_some_and(|t| t.bytes_in_buffer() > 0) {
        value = URX_DATA_READY;
    }
    chip.file.put16(URX, value);
    std_read(chip, ctx, offset, size)
}

fn read_utx(chip: &mut DragonBall, ctx: &AccessCtx, offset: u32, size: u8) -> BusResult<u32> {
    let avail = chip.file.get16(UTX) | UTX_TX_AVAIL;
    chip.file.put16(UTX, avail);
    std_read(chip, ctx, offset, size)
}

fn write_utx(chip: &mut DragonBall, ctx: &AccessCtx, offset: u32, size: u8, value: u32) -> BusResult<()> {
    std_write(chip, ctx, offset, size, value)?;
    if size == 1 && offset == UTX {
        return Ok(());
    }
    let byte = chip.file.get8(UTX + 1);
    let ctl = chip.file.get16(USTCNT);
    let enabled = ctl & USTCNT_UEN != 0 && ctl & USTCNT_TXEN != 0;
    match chip.serial.as_ref() {
        Some(t) if enabled => {
            if let Err(e) = t.write(&[byte]) {
                tracing::warn!("UART transmit on {} failed: {e}", t.name());
            }
        }
        _ => tracing::trace!("UART byte {byte:#04X} dropped (no line)"),
    }
    Ok(())
}

fn write_lssa(chip: &mut DragonBall, ctx: &AccessCtx, offset: u32, size: u8, value: u32) -> BusResult<()> {
    std_write(chip, ctx, offset, size, value)?;
    chip.frame_dirty = true;
    Ok(())
}

// ============================================================================
//  CONTRACTS
// ============================================================================

impl RegisterBlock for DragonBall {
    fn name(&self) -> &'static str {
        "dragonball"
    }

    fn start(&self) -> u32 {
        DRAGONBALL_BASE
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

    fn reset(&mut self, hardware: bool) {
        let (pllcr, pllfsr) = self.model.pll_reset();
        self.file = RegisterFile::new(DRAGONBALL_RANGE as usize);
        self.file.put8(SCR, 0x1C);
        self.file.put32(IDR, self.model.chip_id());
        self.file.put16(PLLCR, pllcr);
        self.file.put16(PLLFSR, pllfsr);
        self.file.put32(IMR, 0x00FF_FFFF);
        for (_, _, _, pullup) in PORTS {
            self.file.put8(pullup, 0xFF);
        }
        self.file.put16(LXMAX, 160);
        self.file.put16(LYMAX, 159);
        self.file.put8(LVPW, 10);
        self.events.clear();
        if hardware {
            self.buttons = HardButtons::empty();
        }
        self.frame_dirty = true;
    }

    fn hal(&mut self) -> Option<&mut dyn HalHandler> {
        Some(self)
    }

    fn hal_ref(&self) -> Option<&dyn HalHandler> {
        Some(self)
    }

    fn drain_hal_events(&mut self, out: &mut Vec<HalEvent>) {
        out.append(&mut self.events);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl RegisterChip for DragonBall {
    fn map(&self) -> &RegisterMap<Self> {
        &self.map
    }
}

/// Last handler of every chain: answers from its own registers and never
/// forwards. Vibrator and LED are not wired to the core, so those two fall
/// through to the tolerant defaults.
impl HalHandler for DragonBall {
    fn lcd_screen_on(&self, _: HalNext<'_>) -> HalResult<bool> {
        Ok(self.file.get8(LCKCON) & LCKCON_LCDON != 0)
    }

    fn lcd_backlight_on(&self, _: HalNext<'_>) -> HalResult<bool> {
        Ok(self.port_value('G') & PORTG_BACKLIGHT != 0)
    }

    fn lcd_has_frame(&self, _: HalNext<'_>) -> HalResult<bool> {
        Ok(true)
    }

    fn lcd_begin_end(&self, _: HalNext<'_>) -> HalResult<(u32, u32)> {
        Ok(self.lcd_bounds())
    }

    fn serial_port_on(&self, _: HalNext<'_>) -> HalResult<bool> {
        Ok(self.file.get16(USTCNT) & USTCNT_UEN != 0)
    }

    fn key_info(&self, _: HalNext<'_>) -> HalResult<KeyInfo> {
        Ok(KeyInfo {
            rows: 1,
            cols: 8,
            pressed: self.buttons,
        })
    }

    fn port_input_value(&self, _: HalNext<'_>, port: char) -> HalResult<u8> {
        Ok(self.port_input(port))
    }

    fn port_internal_value(&self, _: HalNext<'_>, letter: char) -> HalResult<u8> {
        Ok(port(letter).map_or(0, |(_, data, _)| self.file.get8(data)))
    }

    fn interrupt_level(&self, _: HalNext<'_>) -> HalResult<Option<u8>> {
        Ok((self.pending_irqs() - self.irq_mask()).level())
    }

    fn system_clock_frequency(&self, _: HalNext<'_>) -> HalResult<u32> {
        let pllfsr = self.file.get16(PLLFSR);
        let pc = (pllfsr & 0x00FF) as u32;
        let qc = ((pllfsr >> 8) & 0x0F) as u32;
        let vco = 32_768 * (14 * (pc + 1) + qc + 1);
        let divisor = match (self.file.get16(PLLCR) >> 8) & 0x07 {
            0 => 2,
            1 => 4,
            2 => 8,
            3 => 16,
            _ => 1,
        };
        Ok(vco / divisor)
    }

    fn port_data_changed(&mut self, _: HalNextMut<'_, '_>, _: char, _: u8, _: u8) -> HalResult<()> {
        Ok(())
    }

    fn line_driver_changed(&mut self, _: HalNextMut<'_, '_>, _: LineDriver) -> HalResult<()> {
        Ok(())
    }

    fn button_event(&mut self, _: HalNextMut<'_, '_>, buttons: HardButtons, down: bool) -> HalResult<()> {
        let before = self.buttons;
        self.buttons.set(buttons, down);
        if self.buttons != before {
            tracing::debug!("buttons {:?} {}", buttons, if down { "down" } else { "up" });
            self.raise_irq(IrqSource::KB);
        }
        Ok(())
    }
}
