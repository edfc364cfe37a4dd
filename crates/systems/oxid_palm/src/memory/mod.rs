// crates/systems/oxid_palm/src/memory/mod.rs
//! Bank-indexed memory map.
//!
//! The 32-bit address space is cut into 65536 banks of 64 KiB. Each slot of
//! the table names the bundle that handles its bank; the interpreter's
//! accesses look up `addr >> 16` and call that bundle. Slots nobody claimed
//! name the dummy bundle, which faults instead of touching anything.
//!
//! Palm memory map (DragonBall EZ/VZ):
//! $00000000 - ...       : RAM (dynamic heap, then storage heap)
//! $10000000 - ...       : ROM (Palm OS image)
//! $1xxxxxxx / $Fxxxxxxx : external register blocks (LCD, SPI, disk, Sony chips)
//! $FFFFF000 - $FFFFFFFF : DragonBall on-chip registers

pub mod access;
pub mod dummy;
pub mod endian;
pub mod mapped;
pub mod ram;
pub mod regs;
pub mod rom;

use crate::regs::RegisterBlock;
use access::{AccessCtx, FullAccess, MemAccessFlags};
use dummy::DummyBank;
use mapped::MappedBank;
use oxide_core::{AccessKind, BusFault, BusResult, MemoryBus};
use ram::RamBank;
use regs::{BlockId, RegsBank};
use rom::RomBank;

pub const BANK_COUNT: usize = 0x1_0000;
pub const BANK_SIZE: u32 = 0x1_0000;

#[inline]
pub const fn bank_index(addr: u32) -> usize {
    (addr >> 16) as usize
}

/// Number of banks needed to cover `len` bytes starting at `start`.
pub fn banks_spanned(start: u32, len: u32) -> usize {
    if len == 0 {
        return 0;
    }
    let last = start as u64 + len as u64 - 1;
    (last >> 16) as usize - bank_index(start) + 1
}

// ============================================================================
//  BANK CONTRACT
// ============================================================================

/// One handler bundle. A single bundle serves every bank it is installed
/// in and works out its own offset from the full address.
pub trait AddressBank {
    fn name(&self) -> &'static str;

    fn get_long(&mut self, ctx: &AccessCtx, addr: u32) -> BusResult<u32>;
    fn get_word(&mut self, ctx: &AccessCtx, addr: u32) -> BusResult<u16>;
    fn get_byte(&mut self, ctx: &AccessCtx, addr: u32) -> BusResult<u8>;

    fn set_long(&mut self, ctx: &AccessCtx, addr: u32, value: u32) -> BusResult<()>;
    fn set_word(&mut self, ctx: &AccessCtx, addr: u32, value: u16) -> BusResult<()>;
    fn set_byte(&mut self, ctx: &AccessCtx, addr: u32, value: u8) -> BusResult<()>;

    /// Direct view of the backing store from `addr` to the end of the
    /// region, in storage byte order. `None` where a direct view would
    /// bypass side effects or there is no store.
    fn translate(&mut self, addr: u32) -> Option<&mut [u8]>;

    /// Whether `[addr, addr + size)` lies inside the backing store.
    fn check_range(&self, addr: u32, size: u32) -> bool;

    /// Per-byte meta bits parallel to the store, for regions that keep them.
    fn translate_meta(&mut self, _addr: u32) -> Option<&mut [u8]> {
        None
    }

    /// Wait states charged for each opcode word fetched from this bank.
    fn add_opcode_cycles(&self) -> u32 {
        0
    }
}

/// Which bundle a table slot points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BankId {
    Dummy,
    Ram,
    Rom,
    Regs,
    Mapped,
    Custom(u8),
}

// ============================================================================
//  MEMORY
// ============================================================================

pub struct Memory {
    table: Box<[BankId]>,
    dummy: DummyBank,
    ram: RamBank,
    rom: RomBank,
    regs: RegsBank,
    mapped: MappedBank,
    custom: Vec<Box<dyn AddressBank>>,
    pub(crate) access: AccessCtx,
    last_fault: Option<BusFault>,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    /// Every slot starts on the dummy bundle.
    pub fn new() -> Self {
        Self {
            table: vec![BankId::Dummy; BANK_COUNT].into_boxed_slice(),
            dummy: DummyBank,
            ram: RamBank::empty(),
            rom: RomBank::empty(),
            regs: RegsBank::new(),
            mapped: MappedBank::new(),
            custom: Vec::new(),
            access: AccessCtx::default(),
            last_fault: None,
        }
    }

    /// Points `count` consecutive slots from `start` at `bank`.
    pub fn initialize(&mut self, bank: BankId, start: usize, count: usize) {
        assert!(
            start + count <= BANK_COUNT,
            "bank range {start:#X}+{count:#X} runs past the table"
        );
        if let BankId::Custom(n) = bank {
            assert!((n as usize) < self.custom.len(), "custom bank {n} not registered");
        }
        self.table[start..start + count].fill(bank);
        tracing::debug!("banks {start:#06X}..{:#06X} -> {bank:?}", start + count);
    }

    pub fn bank_at(&self, index: usize) -> BankId {
        self.table[index]
    }

    pub fn bank_for(&self, addr: u32) -> BankId {
        self.table[bank_index(addr)]
    }

    /// Installs RAM at address 0 and maps the banks it spans.
    pub fn attach_ram(&mut self, ram: RamBank) {
        let count = banks_spanned(0, ram.size());
        self.ram = ram;
        self.initialize(BankId::Ram, 0, count);
    }

    /// Installs ROM at its base address and maps the banks it spans.
    pub fn attach_rom(&mut self, rom: RomBank) {
        let start = bank_index(rom.base());
        let count = banks_spanned(rom.base(), rom.size());
        self.rom = rom;
        self.initialize(BankId::Rom, start, count);
    }

    pub fn add_custom_bank(&mut self, bank: Box<dyn AddressBank>) -> BankId {
        assert!(self.custom.len() < u8::MAX as usize, "too many custom banks");
        self.custom.push(bank);
        BankId::Custom((self.custom.len() - 1) as u8)
    }

    /// Adds a register block and routes the banks its window spans to the
    /// register bundle.
    pub fn add_register_block(&mut self, block: Box<dyn RegisterBlock>) -> BlockId {
        let start = bank_index(block.start());
        let count = banks_spanned(block.start(), block.range());
        let id = self.regs.add_block(block);
        self.initialize(BankId::Regs, start, count);
        id
    }

    /// Removes a block; banks no other block covers fall back to dummy.
    pub fn remove_register_block(&mut self, id: BlockId) -> Option<Box<dyn RegisterBlock>> {
        let block = self.regs.remove_block(id)?;
        let start = bank_index(block.start());
        let count = banks_spanned(block.start(), block.range());
        for index in start..start + count {
            if !self.regs.covers_bank(index) {
                self.table[index] = BankId::Dummy;
            }
        }
        Some(block)
    }

    /// Overlays a host buffer onto the emulated space at `start`.
    pub fn map_host(&mut self, start: u32, data: Vec<u8>) {
        let count = banks_spanned(start, data.len() as u32);
        self.mapped.map(start, data);
        self.initialize(BankId::Mapped, bank_index(start), count);
    }

    pub fn unmap_host(&mut self, start: u32) -> Option<Vec<u8>> {
        let data = self.mapped.unmap(start)?;
        let first = bank_index(start);
        for index in first..first + banks_spanned(start, data.len() as u32) {
            if !self.mapped.covers_bank(index) {
                self.table[index] = BankId::Dummy;
            }
        }
        Some(data)
    }

    pub fn ram(&self) -> &RamBank {
        &self.ram
    }

    pub fn ram_mut(&mut self) -> &mut RamBank {
        &mut self.ram
    }

    pub fn rom(&self) -> &RomBank {
        &self.rom
    }

    pub fn regs(&self) -> &RegsBank {
        &self.regs
    }

    pub fn regs_mut(&mut self) -> &mut RegsBank {
        &mut self.regs
    }

    fn bank_mut(&mut self, id: BankId) -> &mut dyn AddressBank {
        match id {
            BankId::Dummy => &mut self.dummy,
            BankId::Ram => &mut self.ram,
            BankId::Rom => &mut self.rom,
            BankId::Regs => &mut self.regs,
            BankId::Mapped => &mut self.mapped,
            BankId::Custom(n) => self.custom[n as usize].as_mut(),
        }
    }

    fn bank_ref(&self, id: BankId) -> &dyn AddressBank {
        match id {
            BankId::Dummy => &self.dummy,
            BankId::Ram => &self.ram,
            BankId::Rom => &self.rom,
            BankId::Regs => &self.regs,
            BankId::Mapped => &self.mapped,
            BankId::Custom(n) => self.custom[n as usize].as_ref(),
        }
    }

    // ------------------------------------------------------------------------
    //  Access flags
    // ------------------------------------------------------------------------

    pub fn access_flags(&self) -> MemAccessFlags {
        self.access.flags
    }

    pub fn set_access_flags(&mut self, flags: MemAccessFlags) {
        self.access.flags = flags;
    }

    pub fn access_ctx(&self) -> AccessCtx {
        self.access
    }

    /// True while a [`FullAccess`] scope is open.
    pub fn access_ok(&self) -> bool {
        self.access.access_ok()
    }

    /// The interpreter reports supervisor/user transitions here.
    pub fn set_system_mode(&mut self, system: bool) {
        self.access.system_mode = system;
    }

    pub fn full_access(&mut self) -> FullAccess<'_> {
        FullAccess::new(self)
    }

    pub fn with_full_access<R>(&mut self, f: impl FnOnce(&mut Memory) -> R) -> R {
        let mut guard = FullAccess::new(self);
        f(&mut guard)
    }

    // ------------------------------------------------------------------------
    //  Dispatch
    // ------------------------------------------------------------------------

    pub fn get_byte(&mut self, addr: u32) -> BusResult<u8> {
        let ctx = self.access;
        let id = self.bank_for(addr);
        self.bank_mut(id).get_byte(&ctx, addr)
    }

    pub fn get_word(&mut self, addr: u32) -> BusResult<u16> {
        if addr & 1 != 0 {
            return Err(BusFault::address(addr, 2, AccessKind::Read));
        }
        let ctx = self.access;
        let id = self.bank_for(addr);
        self.bank_mut(id).get_word(&ctx, addr)
    }

    pub fn get_long(&mut self, addr: u32) -> BusResult<u32> {
        if addr & 1 != 0 {
            return Err(BusFault::address(addr, 4, AccessKind::Read));
        }
        let ctx = self.access;
        let id = self.bank_for(addr);
        self.bank_mut(id).get_long(&ctx, addr)
    }

    pub fn set_byte(&mut self, addr: u32, value: u8) -> BusResult<()> {
        let ctx = self.access;
        let id = self.bank_for(addr);
        self.bank_mut(id).set_byte(&ctx, addr, value)
    }

    pub fn set_word(&mut self, addr: u32, value: u16) -> BusResult<()> {
        if addr & 1 != 0 {
            return Err(BusFault::address(addr, 2, AccessKind::Write));
        }
        let ctx = self.access;
        let id = self.bank_for(addr);
        self.bank_mut(id).set_word(&ctx, addr, value)
    }

    pub fn set_long(&mut self, addr: u32, value: u32) -> BusResult<()> {
        if addr & 1 != 0 {
            return Err(BusFault::address(addr, 4, AccessKind::Write));
        }
        let ctx = self.access;
        let id = self.bank_for(addr);
        self.bank_mut(id).set_long(&ctx, addr, value)
    }

    /// Sized read; `size` is 1, 2 or 4.
    pub fn get(&mut self, addr: u32, size: u8) -> BusResult<u32> {
        match size {
            1 => self.get_byte(addr).map(u32::from),
            2 => self.get_word(addr).map(u32::from),
            4 => self.get_long(addr),
            _ => Err(BusFault::bus(addr, size, AccessKind::Read)),
        }
    }

    /// Sized write; `size` is 1, 2 or 4.
    pub fn put(&mut self, addr: u32, size: u8, value: u32) -> BusResult<()> {
        match size {
            1 => self.set_byte(addr, value as u8),
            2 => self.set_word(addr, value as u16),
            4 => self.set_long(addr, value),
            _ => Err(BusFault::bus(addr, size, AccessKind::Write)),
        }
    }

    /// Direct view of the store behind `addr`. Register space and unmapped
    /// space fault.
    pub fn translate(&mut self, addr: u32) -> BusResult<&mut [u8]> {
        let id = self.bank_for(addr);
        self.bank_mut(id)
            .translate(addr)
            .ok_or(BusFault::bus(addr, 1, AccessKind::Read))
    }

    pub fn translate_meta(&mut self, addr: u32) -> Option<&mut [u8]> {
        let id = self.bank_for(addr);
        self.bank_mut(id).translate_meta(addr)
    }

    pub fn check_range(&self, addr: u32, size: u32) -> bool {
        self.bank_ref(self.bank_for(addr)).check_range(addr, size)
    }

    pub fn opcode_cycles(&self, pc: u32) -> u32 {
        self.bank_ref(self.bank_for(pc)).add_opcode_cycles()
    }

    fn latch<T>(&mut self, result: BusResult<T>) -> BusResult<T> {
        if let Err(fault) = &result {
            tracing::trace!("fault latched: {fault}");
            self.last_fault = Some(*fault);
        }
        result
    }
}

impl MemoryBus for Memory {
    fn read_byte(&mut self, addr: u32) -> BusResult<u8> {
        let r = self.get_byte(addr);
        self.latch(r)
    }

    fn write_byte(&mut self, addr: u32, val: u8) -> BusResult<()> {
        let r = self.set_byte(addr, val);
        self.latch(r)
    }

    fn read_word(&mut self, addr: u32) -> BusResult<u16> {
        let r = self.get_word(addr);
        self.latch(r)
    }

    fn read_long(&mut self, addr: u32) -> BusResult<u32> {
        let r = self.get_long(addr);
        self.latch(r)
    }

    fn write_word(&mut self, addr: u32, val: u16) -> BusResult<()> {
        let r = self.set_word(addr, val);
        self.latch(r)
    }

    fn write_long(&mut self, addr: u32, val: u32) -> BusResult<()> {
        let r = self.set_long(addr, val);
        self.latch(r)
    }

    fn opcode_cycles(&self, pc: u32) -> u32 {
        Memory::opcode_cycles(self, pc)
    }

    fn bus_error(&self) -> Option<u32> {
        self.last_fault.map(|f| f.addr())
    }

    fn ack_bus_error(&mut self) {
        self.last_fault = None;
    }
}
