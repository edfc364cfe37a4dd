// crates/systems/oxid_palm/src/session.rs
//! One emulated device: memory map, chips and the Gremlin driving it.
//!
//! Chips are added generic first, most specific last, so the capability
//! chain asks the add-on chips before the DragonBall core answers.

use crate::config::PalmConfig;
use crate::error::{HalError, SessionError, StreamError};
use crate::gremlins::{EventSink, GremlinInfo, Gremlins, TextServices, Tick, UiState};
use crate::memory::ram::RamBank;
use crate::memory::regs::BlockId;
use crate::memory::rom::RomBank;
use crate::memory::Memory;
use crate::regs::disk::DiskImage;
use crate::regs::hal::Hal;
use crate::regs::sed1376::SED1376_VRAM_SIZE;
use crate::regs::{Ads784x, CommandItf, DiskIo, DragonBall, HardButtons, Sed1376, SpiMaster};
use crate::stream::{StreamReader, StreamWriter};
use crate::transport::Transport;
use oxide_core::{BusResult, Cpu, Rom};
use std::sync::Arc;
use tracing::{debug, info};

// ============================================================================
//  EXTERNAL CHIP MAP
// ============================================================================

pub const SED1376_BASE: u32 = 0x1FF8_0000;
pub const SED1376_VRAM_BASE: u32 = 0x1FFA_0000;
pub const SPI_BASE: u32 = 0x1FE0_0000;
pub const DISK_BASE: u32 = 0x1F10_0000;
pub const COMMAND_ITF_BASE: u32 = 0x1100_0000;

const SESSION_MAGIC: &[u8; 4] = b"OXPS";
pub const SESSION_RECORD_VERSION: u32 = 1;

pub struct Session {
    config: PalmConfig,
    memory: Memory,
    gremlins: Gremlins,
    dragonball: BlockId,
    spi: BlockId,
    disk: Option<BlockId>,
    cycles: u64,
}

impl Session {
    pub fn new(config: PalmConfig, rom: Rom) -> Result<Self, SessionError> {
        config.validate()?;
        let order = config.byte_order();
        let device = config.device;

        let mut memory = Memory::new();
        memory.attach_ram(RamBank::new(config.ram_size, config.dynamic_heap_size, order));
        memory.attach_rom(RomBank::new(config.rom_base, &rom.data, order));

        let dragonball = memory.add_register_block(Box::new(DragonBall::new(device.dragonball())));
        if device.has_sed1376() {
            memory.add_register_block(Box::new(Sed1376::new(SED1376_BASE, SED1376_VRAM_BASE)));
            memory.map_host(SED1376_VRAM_BASE, vec![0; SED1376_VRAM_SIZE as usize]);
        }
        let spi = memory.add_register_block(Box::new(SpiMaster::new(SPI_BASE).with_slave(Box::new(Ads784x::new()))));
        let disk = config.disk_image.as_ref().map(|path| {
            let image = DiskImage::new(path, config.disk_sectors());
            memory.add_register_block(Box::new(DiskIo::new(DISK_BASE, Some(image))))
        });
        if device.has_command_itf() {
            memory.add_register_block(Box::new(CommandItf::new(COMMAND_ITF_BASE)));
        }

        info!(
            "{}: {} KiB RAM, {} KiB ROM at {:#010X}",
            device.name(),
            config.ram_size / 1024,
            rom.len() / 1024,
            config.rom_base
        );

        Ok(Self {
            config,
            memory,
            gremlins: Gremlins::new(),
            dragonball,
            spi,
            disk,
            cycles: 0,
        })
    }

    pub fn config(&self) -> &PalmConfig {
        &self.config
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn gremlins(&self) -> &Gremlins {
        &self.gremlins
    }

    pub fn gremlins_mut(&mut self) -> &mut Gremlins {
        &mut self.gremlins
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn hal(&mut self) -> Hal<'_> {
        Hal::new(self.memory.regs_mut())
    }

    pub fn dragonball_mut(&mut self) -> Option<&mut DragonBall> {
        self.memory.regs_mut().block_mut::<DragonBall>(self.dragonball)
    }

    pub fn digitizer_mut(&mut self) -> Option<&mut Ads784x> {
        self.memory
            .regs_mut()
            .block_mut::<SpiMaster>(self.spi)?
            .slave_mut::<Ads784x>()
    }

    pub fn disk_mut(&mut self) -> Option<&mut DiskIo> {
        let id = self.disk?;
        self.memory.regs_mut().block_mut::<DiskIo>(id)
    }

    pub fn attach_serial(&mut self, transport: Arc<dyn Transport>) {
        if let Some(cpu) = self.dragonball_mut() {
            cpu.attach_serial(transport);
        }
    }

    pub fn press_buttons(&mut self, buttons: HardButtons, down: bool) -> Result<(), HalError> {
        self.hal().button_event(buttons, down)
    }

    // ========================================================================
    //  CPU
    // ========================================================================

    /// Initial SSP and PC from the first two longs of the ROM.
    pub fn reset_vectors(&mut self) -> BusResult<(u32, u32)> {
        let base = self.config.rom_base;
        self.memory
            .with_full_access(|mem| Ok((mem.get_long(base)?, mem.get_long(base + 4)?)))
    }

    /// Power-on: chips back to reset values, RAM cleared on a hard reset.
    pub fn reset(&mut self, hardware: bool) {
        self.memory.regs_mut().reset(hardware);
        if hardware {
            self.memory.ram_mut().clear();
        }
        self.cycles = 0;
        debug!("{} reset", if hardware { "hard" } else { "soft" });
    }

    pub fn boot(&mut self, cpu: &mut dyn Cpu) {
        self.reset(true);
        cpu.reset_with_bus(&mut self.memory);
    }

    /// One instruction. Returns its cycles, wait states included.
    pub fn step_cpu(&mut self, cpu: &mut dyn Cpu) -> u32 {
        let wait = self.memory.opcode_cycles(cpu.pc());
        let cycles = cpu.step(&mut self.memory) + wait;
        self.cycles += cycles as u64;
        cycles
    }

    // ========================================================================
    //  GREMLINS
    // ========================================================================

    pub fn start_gremlin(&mut self, info: GremlinInfo) {
        self.gremlins.initialize(info);
    }

    pub fn gremlin_tick(&mut self, ui: &UiState, text: &dyn TextServices, sink: &mut dyn EventSink) -> Tick {
        self.gremlins.get_fake_event(ui, text, sink)
    }

    /// True when the running Gremlin asked for a save at this step.
    pub fn gremlin_save_due(&self) -> bool {
        let every = self.gremlins.info().save_frequency;
        self.gremlins.is_running() && every != 0 && self.gremlins.counter() % every == 0
    }

    // ========================================================================
    //  PERSISTENCE
    // ========================================================================

    /// RAM, every register block's raw registers (tagged by block name) and
    /// the Gremlins record.
    pub fn save(&self) -> Vec<u8> {
        let mut w = StreamWriter::new();
        w.raw(SESSION_MAGIC).u32(SESSION_RECORD_VERSION);

        let ram = self.memory.ram();
        w.bytes(&ram.export(0, ram.size() as usize));

        let regs = self.memory.regs();
        let blocks: Vec<(&'static str, Vec<u8>)> = regs
            .block_ids()
            .filter_map(|id| regs.block_dyn(id))
            .map(|b| (b.name(), b.save()))
            .collect();
        w.u32(blocks.len() as u32);
        for (name, bytes) in &blocks {
            w.str(name).bytes(bytes);
        }

        self.gremlins.save(&mut w);
        w.into_bytes()
    }

    /// Restores a record from `save`. Nothing changes unless the whole
    /// record parses and matches this device.
    pub fn load(&mut self, bytes: &[u8]) -> Result<(), SessionError> {
        let mut r = StreamReader::new(bytes);
        if r.take(SESSION_MAGIC.len())? != SESSION_MAGIC {
            return Err(StreamError::BadMagic.into());
        }
        let version = r.u32()?;
        if version != SESSION_RECORD_VERSION {
            return Err(StreamError::UnsupportedVersion {
                record: "session",
                found: version,
                max: SESSION_RECORD_VERSION,
            }
            .into());
        }

        let ram = r.bytes()?;
        let ram_size = self.memory.ram().size() as usize;
        if ram.len() != ram_size {
            return Err(SessionError::BlockSizeMismatch {
                name: "ram".into(),
                found: ram.len(),
                expected: ram_size,
            });
        }

        let count = r.u32()?;
        let mut blocks = Vec::new();
        for _ in 0..count {
            let name = r.str("block name")?;
            let data = r.bytes()?;
            let regs = self.memory.regs();
            let id = regs
                .block_by_name(&name)
                .ok_or_else(|| SessionError::UnknownBlock(name.clone()))?;
            let expected = regs.block_dyn(id).map_or(0, |b| b.save().len());
            if data.len() != expected {
                return Err(SessionError::BlockSizeMismatch {
                    name,
                    found: data.len(),
                    expected,
                });
            }
            blocks.push((id, data));
        }

        let mut gremlins = Gremlins::new();
        gremlins.load(&mut r)?;

        self.memory.ram_mut().import(0, ram);
        for (id, data) in blocks {
            if let Some(block) = self.memory.regs_mut().block_dyn_mut(id) {
                block.load(data);
            }
        }
        self.gremlins = gremlins;
        info!("session restored: {} register blocks", count);
        Ok(())
    }
}
