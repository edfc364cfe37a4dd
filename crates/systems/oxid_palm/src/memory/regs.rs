// crates/systems/oxid_palm/src/memory/regs.rs
//! Register-space bundle.
//!
//! One bundle serves every bank that holds chip registers. It owns the
//! register blocks, finds the block whose window covers an address and
//! hands the access to that block's own sub-range table. It also owns the
//! capability chain the blocks are linked into.

use super::access::AccessCtx;
use super::{bank_index, AddressBank};
use crate::regs::hal::{HalChain, HalEvent, HalHandler, HalNext, HalNextMut};
use crate::regs::RegisterBlock;
use oxide_core::{AccessKind, BusFault, BusResult};

pub type BlockId = usize;

/// Opcode fetches from register space cost one extra cycle.
const REGS_WAIT_STATES: u32 = 1;

pub struct RegsBank {
    blocks: Vec<Option<Box<dyn RegisterBlock>>>,
    chain: HalChain,
    last_hit: Option<BlockId>,
    pending: Vec<HalEvent>,
}

impl Default for RegsBank {
    fn default() -> Self {
        Self::new()
    }
}

impl RegsBank {
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            chain: HalChain::new(),
            last_hit: None,
            pending: Vec::new(),
        }
    }

    /// Adds a block. Blocks carrying a capability handler are linked at the
    /// head of the chain, so add the device's generic core first and the
    /// most specific chip last.
    pub fn add_block(&mut self, block: Box<dyn RegisterBlock>) -> BlockId {
        let (start, end) = window(block.as_ref());
        for other in self.blocks.iter().flatten() {
            let (s, e) = window(other.as_ref());
            assert!(
                end <= s || e <= start,
                "{} window {start:#X}..{end:#X} overlaps {} at {s:#X}..{e:#X}",
                block.name(),
                other.name()
            );
        }
        let has_hal = block.hal_ref().is_some();
        let name = block.name();
        let id = self.blocks.len();
        self.blocks.push(Some(block));
        if has_hal {
            let linked = self.chain.link(id);
            debug_assert!(linked.is_ok(), "fresh block #{id} already linked");
        }
        tracing::debug!("register block {name} added as #{id} ({start:#X}..{end:#X})");
        id
    }

    /// Unlinks and returns a block. Its id is never reused.
    pub fn remove_block(&mut self, id: BlockId) -> Option<Box<dyn RegisterBlock>> {
        let block = self.blocks.get_mut(id)?.take()?;
        if self.chain.is_linked(id) {
            let unlinked = self.chain.unlink(id);
            debug_assert!(unlinked.is_ok(), "block #{id} vanished from the chain");
        }
        if self.last_hit == Some(id) {
            self.last_hit = None;
        }
        tracing::debug!("register block {} removed", block.name());
        Some(block)
    }

    pub fn chain(&self) -> &HalChain {
        &self.chain
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.blocks
            .iter()
            .enumerate()
            .filter_map(|(id, b)| b.as_ref().map(|_| id))
    }

    pub fn block_dyn(&self, id: BlockId) -> Option<&dyn RegisterBlock> {
        self.blocks.get(id)?.as_deref()
    }

    pub fn block_dyn_mut(&mut self, id: BlockId) -> Option<&mut (dyn RegisterBlock + 'static)> {
        self.blocks.get_mut(id)?.as_deref_mut()
    }

    pub fn block<T: RegisterBlock>(&self, id: BlockId) -> Option<&T> {
        self.block_dyn(id)?.as_any().downcast_ref::<T>()
    }

    pub fn block_mut<T: RegisterBlock>(&mut self, id: BlockId) -> Option<&mut T> {
        self.block_dyn_mut(id)?.as_any_mut().downcast_mut::<T>()
    }

    /// First live block of type `T`.
    pub fn find_block<T: RegisterBlock>(&self) -> Option<BlockId> {
        self.block_ids().find(|&id| self.block::<T>(id).is_some())
    }

    pub fn block_by_name(&self, name: &str) -> Option<BlockId> {
        self.block_ids()
            .find(|&id| self.block_dyn(id).is_some_and(|b| b.name() == name))
    }

    /// Whether any live block's window touches bank `index`.
    pub fn covers_bank(&self, index: usize) -> bool {
        self.blocks.iter().flatten().any(|b| {
            let (s, e) = window(b.as_ref());
            e > s && bank_index(s as u32) <= index && index <= ((e - 1) >> 16) as usize
        })
    }

    pub fn reset(&mut self, hardware: bool) {
        for block in self.blocks.iter_mut().flatten() {
            block.reset(hardware);
        }
    }

    fn find(&mut self, addr: u32, size: u8) -> Option<BlockId> {
        let covers = |b: &dyn RegisterBlock| {
            let (s, e) = window(b);
            addr as u64 >= s && (addr as u64 + size as u64) <= e
        };
        if let Some(id) = self.last_hit {
            if self.blocks[id].as_deref().is_some_and(covers) {
                return Some(id);
            }
        }
        let id = self
            .blocks
            .iter()
            .position(|b| b.as_deref().is_some_and(covers))?;
        self.last_hit = Some(id);
        Some(id)
    }

    // ------------------------------------------------------------------------
    //  Capability chain
    // ------------------------------------------------------------------------

    /// Runs `f` with a cursor positioned at the chain head.
    pub fn with_chain<R>(&self, f: impl FnOnce(HalNext<'_>) -> R) -> R {
        let handlers: Vec<&dyn HalHandler> = self
            .chain
            .iter()
            .filter_map(|id| self.blocks.get(id)?.as_ref()?.hal_ref())
            .collect();
        f(HalNext::new(&handlers))
    }

    pub fn with_chain_mut<R>(&mut self, f: impl FnOnce(HalNextMut<'_, '_>) -> R) -> R {
        let mut by_id: Vec<Option<&mut dyn HalHandler>> = self
            .blocks
            .iter_mut()
            .map(|slot| slot.as_mut().and_then(|b| b.hal()))
            .collect();
        let mut handlers: Vec<&mut dyn HalHandler> = self
            .chain
            .iter()
            .filter_map(|id| by_id.get_mut(id)?.take())
            .collect();
        f(HalNextMut::new(&mut handlers))
    }

    fn flush_events(&mut self) {
        let events = std::mem::take(&mut self.pending);
        for event in events {
            if let Err(err) = self.with_chain_mut(|next| next.dispatch(event)) {
                tracing::warn!("{event:?} not handled: {err}");
            }
        }
    }

    // ------------------------------------------------------------------------
    //  Access
    // ------------------------------------------------------------------------

    fn read(&mut self, ctx: &AccessCtx, addr: u32, size: u8) -> BusResult<u32> {
        let Some(id) = self.find(addr, size) else {
            return self.miss(ctx, addr, size, AccessKind::Read).map(|_| 0);
        };
        match self.blocks[id].as_mut() {
            Some(block) => block.read(ctx, addr, size),
            None => Err(BusFault::bus(addr, size, AccessKind::Read)),
        }
    }

    fn write(&mut self, ctx: &AccessCtx, addr: u32, size: u8, value: u32) -> BusResult<()> {
        let Some(id) = self.find(addr, size) else {
            return self.miss(ctx, addr, size, AccessKind::Write);
        };
        let result = match self.blocks[id].as_mut() {
            Some(block) => {
                let r = block.write(ctx, addr, size, value);
                block.drain_hal_events(&mut self.pending);
                r
            }
            None => Err(BusFault::bus(addr, size, AccessKind::Write)),
        };
        if !self.pending.is_empty() {
            self.flush_events();
        }
        result
    }

    fn miss(&self, ctx: &AccessCtx, addr: u32, size: u8, kind: AccessKind) -> BusResult<()> {
        let validate = match kind {
            AccessKind::Read => ctx.flags.validate_register_get,
            AccessKind::Write => ctx.flags.validate_register_set,
        };
        if validate {
            return Err(BusFault::bus(addr, size, kind));
        }
        tracing::trace!("register {kind} at {addr:#010X} outside every block, ignored");
        Ok(())
    }
}

fn window(block: &dyn RegisterBlock) -> (u64, u64) {
    let start = block.start() as u64;
    (start, start + block.range() as u64)
}

impl AddressBank for RegsBank {
    fn name(&self) -> &'static str {
        "regs"
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

    // Register reads have side effects; no direct view.
    fn translate(&mut self, _addr: u32) -> Option<&mut [u8]> {
        None
    }

    fn check_range(&self, addr: u32, size: u32) -> bool {
        self.blocks.iter().flatten().any(|b| {
            let (s, e) = window(b.as_ref());
            addr as u64 >= s && addr as u64 + size as u64 <= e
        })
    }

    fn add_opcode_cycles(&self) -> u32 {
        REGS_WAIT_STATES
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::access::MemAccessFlags;
    use crate::regs::hal::HalResult;
    use crate::regs::{dispatch_read, dispatch_write, std_read, RegisterChip, RegisterFile, RegisterMap};
    use std::any::Any;

    /// A block that raises a port change on every write to offset 0 and
    /// counts the port changes it sees through the chain.
    struct TestChip {
        start: u32,
        map: RegisterMap<TestChip>,
        file: RegisterFile,
        events: Vec<HalEvent>,
        seen: u32,
        screen: Option<bool>,
    }

    fn raise(chip: &mut TestChip, ctx: &AccessCtx, off: u32, size: u8, v: u32) -> BusResult<()> {
        let old = chip.file.get8(off);
        crate::regs::std_write(chip, ctx, off, size, v)?;
        chip.events.push(HalEvent::PortDataChanged {
            port: 'D',
            old,
            new: v as u8,
        });
        Ok(())
    }

    impl TestChip {
        fn new(start: u32, screen: Option<bool>) -> Self {
            let mut map = RegisterMap::new(start, 0x10);
            map.set_handler(std_read, raise, 0, 1);
            Self {
                start,
                map,
                file: RegisterFile::new(0x10),
                events: Vec::new(),
                seen: 0,
                screen,
            }
        }
    }

    impl HalHandler for TestChip {
        fn lcd_screen_on(&self, next: HalNext<'_>) -> HalResult<bool> {
            match self.screen {
                Some(on) => Ok(on),
                None => next.lcd_screen_on(),
            }
        }

        fn port_data_changed(&mut self, next: HalNextMut<'_, '_>, port: char, old: u8, new: u8) -> HalResult<()> {
            self.seen += 1;
            if next.is_empty() {
                return Ok(());
            }
            next.port_data_changed(port, old, new)
        }
    }

    impl RegisterBlock for TestChip {
        fn name(&self) -> &'static str {
            "test chip"
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
        fn reset(&mut self, _: bool) {
            self.file = RegisterFile::new(0x10);
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

    impl RegisterChip for TestChip {
        fn map(&self) -> &RegisterMap<Self> {
            &self.map
        }
    }

    #[test]
    fn accesses_route_to_the_covering_block() {
        let mut bank = RegsBank::new();
        let a = bank.add_block(Box::new(TestChip::new(0xFFFF_F000, None)));
        let b = bank.add_block(Box::new(TestChip::new(0x1F00_0000, Some(true))));
        let ctx = AccessCtx::default();
        bank.set_byte(&ctx, 0x1F00_0004, 0x42).unwrap();
        assert_eq!(bank.block::<TestChip>(b).unwrap().file.get8(4), 0x42);
        assert_eq!(bank.block::<TestChip>(a).unwrap().file.get8(4), 0);
        assert_eq!(bank.get_byte(&ctx, 0x1F00_0004).unwrap(), 0x42);
    }

    #[test]
    fn misses_follow_the_register_flags() {
        let mut bank = RegsBank::new();
        bank.add_block(Box::new(TestChip::new(0xFFFF_F000, None)));
        let mut ctx = AccessCtx::default();
        assert!(bank.get_word(&ctx, 0xFFFF_0000).is_err());
        ctx.flags = MemAccessFlags::UNRESTRICTED;
        assert_eq!(bank.get_word(&ctx, 0xFFFF_0000).unwrap(), 0);
        bank.set_word(&ctx, 0xFFFF_0000, 1).unwrap();
    }

    #[test]
    fn write_events_walk_the_whole_chain() {
        let mut bank = RegsBank::new();
        let a = bank.add_block(Box::new(TestChip::new(0xFFFF_F000, None)));
        let b = bank.add_block(Box::new(TestChip::new(0x1F00_0000, None)));
        let ctx = AccessCtx::default();
        bank.set_byte(&ctx, 0xFFFF_F000, 0x0F).unwrap();
        assert_eq!(bank.block::<TestChip>(a).unwrap().seen, 1);
        assert_eq!(bank.block::<TestChip>(b).unwrap().seen, 1);
    }

    #[test]
    fn most_recent_block_answers_first() {
        let mut bank = RegsBank::new();
        bank.add_block(Box::new(TestChip::new(0xFFFF_F000, Some(false))));
        let top = bank.add_block(Box::new(TestChip::new(0x1F00_0000, Some(true))));
        assert_eq!(bank.with_chain(|n| n.lcd_screen_on()), Ok(true));
        bank.remove_block(top);
        assert_eq!(bank.with_chain(|n| n.lcd_screen_on()), Ok(false));
        assert_eq!(bank.chain().len(), 1);
    }

    #[test]
    fn chain_follows_added_and_removed_blocks() {
        let mut bank = RegsBank::new();
        let a = bank.add_block(Box::new(TestChip::new(0xFFFF_F000, None)));
        let b = bank.add_block(Box::new(TestChip::new(0x1F00_0000, None)));
        assert!(bank.chain().is_linked(a) && bank.chain().is_linked(b));

        assert!(bank.remove_block(a).is_some());
        assert!(!bank.chain().is_linked(a));
        assert!(bank.remove_block(a).is_none());
        assert_eq!(bank.chain().len(), 1);

        let c = bank.add_block(Box::new(TestChip::new(0x1000, None)));
        assert_ne!(c, a);
        assert!(bank.chain().is_linked(c));
        assert_eq!(bank.chain().len(), 2);
    }

    #[test]
    #[should_panic(expected = "overlaps")]
    fn overlapping_windows_are_rejected() {
        let mut bank = RegsBank::new();
        bank.add_block(Box::new(TestChip::new(0x1000, None)));
        bank.add_block(Box::new(TestChip::new(0x1008, None)));
    }

    #[test]
    fn register_space_has_no_direct_view() {
        let mut bank = RegsBank::new();
        bank.add_block(Box::new(TestChip::new(0x1000, None)));
        assert!(bank.translate(0x1000).is_none());
        assert!(bank.check_range(0x1000, 0x10));
        assert!(!bank.check_range(0x1008, 0x10));
        assert_eq!(bank.add_opcode_cycles(), 1);
    }
}
