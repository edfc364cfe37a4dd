// crates/systems/oxid_palm/src/regs/hal.rs
//! Capability chain.
//!
//! Screen, audio and UI code ask questions ("is the LCD on?", "what does
//! port D read?") without knowing which chip answers. Handlers form an
//! ordered chain, most recently linked first. Every capability defaults to
//! forwarding to the rest of the chain; a chip overrides only what it
//! understands. Running off the end of the chain is a contract violation
//! ([`HalError::Unanswered`]) except for `vibrate_on` and `led_state`,
//! which fall back to "off".

use crate::error::HalError;
use crate::regs::dragonball::HardButtons;

pub type HalResult<T> = Result<T, HalError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineDriver {
    Rs232,
    Irda,
    Usb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInfo {
    pub rows: u8,
    pub cols: u8,
    pub pressed: HardButtons,
}

/// Notifications raised inside a register write, delivered through the
/// whole chain once the write has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalEvent {
    PortDataChanged { port: char, old: u8, new: u8 },
    LineDriverChanged(LineDriver),
}

// ============================================================================
//  HANDLER CONTRACT
// ============================================================================

pub trait HalHandler {
    fn lcd_screen_on(&self, next: HalNext<'_>) -> HalResult<bool> {
        next.lcd_screen_on()
    }

    fn lcd_backlight_on(&self, next: HalNext<'_>) -> HalResult<bool> {
        next.lcd_backlight_on()
    }

    fn lcd_has_frame(&self, next: HalNext<'_>) -> HalResult<bool> {
        next.lcd_has_frame()
    }

    /// Framebuffer range `[begin, end)` in emulated addresses.
    fn lcd_begin_end(&self, next: HalNext<'_>) -> HalResult<(u32, u32)> {
        next.lcd_begin_end()
    }

    fn serial_port_on(&self, next: HalNext<'_>) -> HalResult<bool> {
        next.serial_port_on()
    }

    fn vibrate_on(&self, next: HalNext<'_>) -> bool {
        next.vibrate_on()
    }

    fn led_state(&self, next: HalNext<'_>) -> u16 {
        next.led_state()
    }

    fn key_info(&self, next: HalNext<'_>) -> HalResult<KeyInfo> {
        next.key_info()
    }

    fn port_input_value(&self, next: HalNext<'_>, port: char) -> HalResult<u8> {
        next.port_input_value(port)
    }

    fn port_internal_value(&self, next: HalNext<'_>, port: char) -> HalResult<u8> {
        next.port_internal_value(port)
    }

    /// Highest pending unmasked interrupt level, if any.
    fn interrupt_level(&self, next: HalNext<'_>) -> HalResult<Option<u8>> {
        next.interrupt_level()
    }

    fn system_clock_frequency(&self, next: HalNext<'_>) -> HalResult<u32> {
        next.system_clock_frequency()
    }

    fn port_data_changed(
        &mut self,
        next: HalNextMut<'_, '_>,
        port: char,
        old: u8,
        new: u8,
    ) -> HalResult<()> {
        next.port_data_changed(port, old, new)
    }

    fn line_driver_changed(&mut self, next: HalNextMut<'_, '_>, driver: LineDriver) -> HalResult<()> {
        next.line_driver_changed(driver)
    }

    fn button_event(
        &mut self,
        next: HalNextMut<'_, '_>,
        buttons: HardButtons,
        down: bool,
    ) -> HalResult<()> {
        next.button_event(buttons, down)
    }
}

// ============================================================================
//  CURSORS OVER THE REST OF THE CHAIN
// ============================================================================

/// The handlers after the current one, for read-only capabilities.
#[derive(Clone, Copy)]
pub struct HalNext<'a> {
    rest: &'a [&'a dyn HalHandler],
}

impl<'a> HalNext<'a> {
    pub fn new(rest: &'a [&'a dyn HalHandler]) -> Self {
        Self { rest }
    }

    pub fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }

    fn split(self, capability: &'static str) -> HalResult<(&'a dyn HalHandler, HalNext<'a>)> {
        match self.rest.split_first() {
            Some((first, rest)) => Ok((*first, HalNext { rest })),
            None => Err(HalError::Unanswered(capability)),
        }
    }

    pub fn lcd_screen_on(self) -> HalResult<bool> {
        let (h, next) = self.split("lcd_screen_on")?;
        h.lcd_screen_on(next)
    }

    pub fn lcd_backlight_on(self) -> HalResult<bool> {
        let (h, next) = self.split("lcd_backlight_on")?;
        h.lcd_backlight_on(next)
    }

    pub fn lcd_has_frame(self) -> HalResult<bool> {
        let (h, next) = self.split("lcd_has_frame")?;
        h.lcd_has_frame(next)
    }

    pub fn lcd_begin_end(self) -> HalResult<(u32, u32)> {
        let (h, next) = self.split("lcd_begin_end")?;
        h.lcd_begin_end(next)
    }

    pub fn serial_port_on(self) -> HalResult<bool> {
        let (h, next) = self.split("serial_port_on")?;
        h.serial_port_on(next)
    }

    pub fn vibrate_on(self) -> bool {
        match self.rest.split_first() {
            Some((h, rest)) => h.vibrate_on(HalNext { rest }),
            None => false,
        }
    }

    pub fn led_state(self) -> u16 {
        match self.rest.split_first() {
            Some((h, rest)) => h.led_state(HalNext { rest }),
            None => 0,
        }
    }

    pub fn key_info(self) -> HalResult<KeyInfo> {
        let (h, next) = self.split("key_info")?;
        h.key_info(next)
    }

    pub fn port_input_value(self, port: char) -> HalResult<u8> {
        let (h, next) = self.split("port_input_value")?;
        h.port_input_value(next, port)
    }

    pub fn port_internal_value(self, port: char) -> HalResult<u8> {
        let (h, next) = self.split("port_internal_value")?;
        h.port_internal_value(next, port)
    }

    pub fn interrupt_level(self) -> HalResult<Option<u8>> {
        let (h, next) = self.split("interrupt_level")?;
        h.interrupt_level(next)
    }

    pub fn system_clock_frequency(self) -> HalResult<u32> {
        let (h, next) = self.split("system_clock_frequency")?;
        h.system_clock_frequency(next)
    }
}

/// The handlers after the current one, for capabilities that mutate.
pub struct HalNextMut<'a, 'b> {
    rest: &'a mut [&'b mut dyn HalHandler],
}

impl<'a, 'b> HalNextMut<'a, 'b> {
    pub fn new(rest: &'a mut [&'b mut dyn HalHandler]) -> Self {
        Self { rest }
    }

    pub fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }

    pub fn port_data_changed(self, port: char, old: u8, new: u8) -> HalResult<()> {
        match self.rest.split_first_mut() {
            Some((h, rest)) => h.port_data_changed(HalNextMut { rest }, port, old, new),
            None => Err(HalError::Unanswered("port_data_changed")),
        }
    }

    pub fn line_driver_changed(self, driver: LineDriver) -> HalResult<()> {
        match self.rest.split_first_mut() {
            Some((h, rest)) => h.line_driver_changed(HalNextMut { rest }, driver),
            None => Err(HalError::Unanswered("line_driver_changed")),
        }
    }

    pub fn button_event(self, buttons: HardButtons, down: bool) -> HalResult<()> {
        match self.rest.split_first_mut() {
            Some((h, rest)) => h.button_event(HalNextMut { rest }, buttons, down),
            None => Err(HalError::Unanswered("button_event")),
        }
    }

    pub fn dispatch(self, event: HalEvent) -> HalResult<()> {
        match event {
            HalEvent::PortDataChanged { port, old, new } => self.port_data_changed(port, old, new),
            HalEvent::LineDriverChanged(driver) => self.line_driver_changed(driver),
        }
    }
}

// ============================================================================
//  CHAIN REGISTRY
// ============================================================================

/// Link order of handler ids, head first. Linking puts a handler at the
/// head, so the most recently built chip answers first.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HalChain {
    order: Vec<usize>,
}

impl HalChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link(&mut self, id: usize) -> HalResult<()> {
        if self.is_linked(id) {
            return Err(HalError::AlreadyLinked(id));
        }
        self.order.insert(0, id);
        Ok(())
    }

    pub fn unlink(&mut self, id: usize) -> HalResult<()> {
        let pos = self
            .order
            .iter()
            .position(|&h| h == id)
            .ok_or(HalError::NotLinked(id))?;
        self.order.remove(pos);
        Ok(())
    }

    pub fn is_linked(&self, id: usize) -> bool {
        self.order.contains(&id)
    }

    pub fn head(&self) -> Option<usize> {
        self.order.first().copied()
    }

    pub fn next_of(&self, id: usize) -> Option<usize> {
        let pos = self.order.iter().position(|&h| h == id)?;
        self.order.get(pos + 1).copied()
    }

    pub fn prev_of(&self, id: usize) -> Option<usize> {
        let pos = self.order.iter().position(|&h| h == id)?;
        pos.checked_sub(1).map(|p| self.order[p])
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.order.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// ============================================================================
//  FACADE
// ============================================================================

/// Capability queries against the live chain of a register bank.
pub struct Hal<'a> {
    bank: &'a mut crate::memory::regs::RegsBank,
}

impl<'a> Hal<'a> {
    pub fn new(bank: &'a mut crate::memory::regs::RegsBank) -> Self {
        Self { bank }
    }

    pub fn lcd_screen_on(&self) -> HalResult<bool> {
        self.bank.with_chain(|next| next.lcd_screen_on())
    }

    pub fn lcd_backlight_on(&self) -> HalResult<bool> {
        self.bank.with_chain(|next| next.lcd_backlight_on())
    }

    pub fn lcd_has_frame(&self) -> HalResult<bool> {
        self.bank.with_chain(|next| next.lcd_has_frame())
    }

    pub fn lcd_begin_end(&self) -> HalResult<(u32, u32)> {
        self.bank.with_chain(|next| next.lcd_begin_end())
    }

    pub fn serial_port_on(&self) -> HalResult<bool> {
        self.bank.with_chain(|next| next.serial_port_on())
    }

    pub fn vibrate_on(&self) -> bool {
        self.bank.with_chain(|next| next.vibrate_on())
    }

    pub fn led_state(&self) -> u16 {
        self.bank.with_chain(|next| next.led_state())
    }

    pub fn key_info(&self) -> HalResult<KeyInfo> {
        self.bank.with_chain(|next| next.key_info())
    }

    pub fn port_input_value(&self, port: char) -> HalResult<u8> {
        self.bank.with_chain(|next| next.port_input_value(port))
    }

    pub fn port_internal_value(&self, port: char) -> HalResult<u8> {
        self.bank.with_chain(|next| next.port_internal_value(port))
    }

    pub fn interrupt_level(&self) -> HalResult<Option<u8>> {
        self.bank.with_chain(|next| next.interrupt_level())
    }

    pub fn system_clock_frequency(&self) -> HalResult<u32> {
        self.bank.with_chain(|next| next.system_clock_frequency())
    }

    pub fn port_data_changed(&mut self, port: char, old: u8, new: u8) -> HalResult<()> {
        self.bank
            .with_chain_mut(|next| next.port_data_changed(port, old, new))
    }

    pub fn line_driver_changed(&mut self, driver: LineDriver) -> HalResult<()> {
        self.bank.with_chain_mut(|next| next.line_driver_changed(driver))
    }

    pub fn button_event(&mut self, buttons: HardButtons, down: bool) -> HalResult<()> {
        self.bank.with_chain_mut(|next| next.button_event(buttons, down))
    }
}
