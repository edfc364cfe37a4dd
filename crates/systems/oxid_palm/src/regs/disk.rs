// crates/systems/oxid_palm/src/regs/disk.rs
//! Storage-card disk I/O.
//!
//! The card is a host image file addressed in 512-byte sectors. The driver
//! writes a sector number, then a command; reads land in the data window,
//! writes take the data window to the image. When the image cannot be read
//! or written, the block reformats it and tries exactly once more before
//! reporting the error in its status register.

use super::hal::{HalHandler, HalNext, HalResult};
use super::{
    dispatch_read, dispatch_write, invalid_read, null_write, std_read, std_write, RegisterBlock, RegisterChip,
    RegisterFile, RegisterMap,
};
use crate::error::DiskError;
use crate::memory::access::AccessCtx;
use oxide_core::{AccessKind, BusFault, BusResult};
use std::any::Any;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const SECTOR_SIZE: usize = 512;
pub const DISK_RANGE: u32 = 0x800;

const SECTOR: u32 = 0x00;
const COMMAND: u32 = 0x04;
const STATUS: u32 = 0x06;
const SECTOR_COUNT: u32 = 0x08;
const DATA: u32 = 0x200;
const DATA_END: u32 = DATA + SECTOR_SIZE as u32;

const CMD_READ: u16 = 1;
const CMD_WRITE: u16 = 2;
const CMD_FORMAT: u16 = 3;

const STATUS_ERROR: u16 = 0x0002;
const STATUS_PRESENT: u16 = 0x0004;

/// Card-detect line, reported on port J.
const CARD_DETECT_PORT: char = 'J';
const CARD_DETECT_BIT: u8 = 0x08;

// ============================================================================
//  BACKING IMAGE
// ============================================================================

#[derive(Debug, Clone)]
pub struct DiskImage {
    path: PathBuf,
    sectors: u32,
}

impl DiskImage {
    pub fn new(path: impl AsRef<Path>, sectors: u32) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            sectors,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sectors(&self) -> u32 {
        self.sectors
    }

    fn check(&self, sector: u32) -> Result<u64, DiskError> {
        if sector >= self.sectors {
            return Err(DiskError::SectorOutOfRange {
                sector,
                sectors: self.sectors,
            });
        }
        Ok(sector as u64 * SECTOR_SIZE as u64)
    }

    pub fn read_sector(&self, sector: u32, buf: &mut [u8]) -> Result<(), DiskError> {
        let at = self.check(sector)?;
        let mut f = File::open(&self.path)?;
        f.seek(SeekFrom::Start(at))?;
        f.read_exact(&mut buf[..SECTOR_SIZE])?;
        Ok(())
    }

    pub fn write_sector(&self, sector: u32, buf: &[u8]) -> Result<(), DiskError> {
        let at = self.check(sector)?;
        let mut f = OpenOptions::new().write(true).open(&self.path)?;
        f.seek(SeekFrom::Start(at))?;
        f.write_all(&buf[..SECTOR_SIZE])?;
        Ok(())
    }

    /// Recreates the image as `sectors` zeroed sectors.
    pub fn format(&self) -> Result<(), DiskError> {
        let f = File::create(&self.path)?;
        f.set_len(self.sectors as u64 * SECTOR_SIZE as u64)?;
        tracing::info!("formatted disk image {}", self.path.display());
        Ok(())
    }
}

// ============================================================================
//  CHIP
// ============================================================================

pub struct DiskIo {
    start: u32,
    map: RegisterMap<DiskIo>,
    file: RegisterFile,
    image: Option<DiskImage>,
    last_error: Option<DiskError>,
}

impl DiskIo {
    pub fn new(start: u32, image: Option<DiskImage>) -> Self {
        let mut map = RegisterMap::new(start, DISK_RANGE);
        map.set_handler(std_read, write_command, COMMAND, 2);
        map.set_handler(std_read, null_write, STATUS, 2);
        map.set_handler(std_read, null_write, SECTOR_COUNT, 4);
        // Past the sector buffer: never backed.
        map.set_range_handler(invalid_read, fault_write, DATA_END, DISK_RANGE - DATA_END);
        let mut chip = Self {
            start,
            map,
            file: RegisterFile::new(DISK_RANGE as usize),
            image,
            last_error: None,
        };
        chip.reset(true);
        chip
    }

    pub fn image(&self) -> Option<&DiskImage> {
        self.image.as_ref()
    }

    pub fn take_error(&mut self) -> Option<DiskError> {
        self.last_error.take()
    }

    pub fn data(&self) -> &[u8] {
        &self.file.bytes()[DATA as usize..DATA_END as usize]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.file.bytes_mut()[DATA as usize..DATA_END as usize]
    }

    /// Loads `sector` into the data window, reformatting once on failure.
    pub fn read_sector(&mut self, sector: u32) -> Result<(), DiskError> {
        let image = self.image.clone().ok_or(DiskError::NoImage)?;
        let mut buf = [0u8; SECTOR_SIZE];
        with_recovery(&image, |img| img.read_sector(sector, &mut buf))?;
        self.data_mut().copy_from_slice(&buf);
        Ok(())
    }

    /// Stores the data window into `sector`, reformatting once on failure.
    pub fn write_sector(&mut self, sector: u32) -> Result<(), DiskError> {
        let image = self.image.clone().ok_or(DiskError::NoImage)?;
        let buf = self.data().to_vec();
        with_recovery(&image, |img| img.write_sector(sector, &buf))
    }

    fn run(&mut self, command: u16) {
        let sector = self.file.get32(SECTOR);
        let result = match command {
            CMD_READ => self.read_sector(sector),
            CMD_WRITE => self.write_sector(sector),
            CMD_FORMAT => self.image.as_ref().ok_or(DiskError::NoImage).and_then(|i| i.format()),
            other => {
                tracing::debug!("disk: unknown command {other}");
                Ok(())
            }
        };
        let mut status = self.file.get16(STATUS) & !STATUS_ERROR;
        if let Err(e) = result {
            tracing::warn!("disk command {command} on sector {sector} failed: {e}");
            status |= STATUS_ERROR;
            self.last_error = Some(e);
        }
        self.file.put16(STATUS, status);
        self.file.put16(COMMAND, 0);
    }
}

// Out-of-range sectors are not the image's fault; only IO errors earn the
// reformat.
fn with_recovery(image: &DiskImage, mut op: impl FnMut(&DiskImage) -> Result<(), DiskError>) -> Result<(), DiskError> {
    match op(image) {
        Err(DiskError::Io(e)) => {
            tracing::warn!("disk image {}: {e}; reformatting", image.path().display());
            image.format()?;
            op(image)
        }
        other => other,
    }
}

fn write_command(chip: &mut DiskIo, ctx: &AccessCtx, offset: u32, size: u8, value: u32) -> BusResult<()> {
    std_write(chip, ctx, offset, size, value)?;
    let command = chip.file.get16(COMMAND);
    chip.run(command);
    Ok(())
}

fn fault_write(chip: &mut DiskIo, _: &AccessCtx, offset: u32, size: u8, _: u32) -> BusResult<()> {
    Err(BusFault::bus(chip.start + offset, size, AccessKind::Write))
}

impl RegisterBlock for DiskIo {
    fn name(&self) -> &'static str {
        "disk"
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
        self.file = RegisterFile::new(DISK_RANGE as usize);
        let (status, sectors) = match &self.image {
            Some(img) => (STATUS_PRESENT, img.sectors()),
            None => (0, 0),
        };
        self.file.put16(STATUS, status);
        self.file.put32(SECTOR_COUNT, sectors);
        self.last_error = None;
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

impl RegisterChip for DiskIo {
    fn map(&self) -> &RegisterMap<Self> {
        &self.map
    }
}

impl HalHandler for DiskIo {
    fn port_input_value(&self, next: HalNext<'_>, port: char) -> HalResult<u8> {
        let value = next.port_input_value(port)?;
        if port == CARD_DETECT_PORT && self.image.is_some() {
            return Ok(value | CARD_DETECT_BIT);
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: u32 = 0x1F10_0000;

    fn temp_image(tag: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("oxid_palm_disk_{tag}_{}.img", std::process::id()));
        let _ = std::fs::remove_file(&path);
        path
    }

    #[test]
    fn missing_image_is_reformatted_and_read_retried() {
        let path = temp_image("retry");
        let mut disk = DiskIo::new(BASE, Some(DiskImage::new(&path, 8)));
        let ctx = AccessCtx::default();
        disk.write(&ctx, BASE + DATA, 4, 0xDEAD_BEEF).unwrap();

        disk.write(&ctx, BASE + SECTOR, 4, 3).unwrap();
        disk.write(&ctx, BASE + COMMAND, 2, CMD_READ as u32).unwrap();
        assert!(disk.take_error().is_none());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 8 * SECTOR_SIZE as u64);
        assert_eq!(disk.read(&ctx, BASE + DATA, 4).unwrap(), 0);
        let status = disk.read(&ctx, BASE + STATUS, 2).unwrap() as u16;
        assert_eq!(status & STATUS_ERROR, 0);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn sector_round_trips_through_the_image() {
        let path = temp_image("rw");
        let image = DiskImage::new(&path, 4);
        image.format().unwrap();
        let mut disk = DiskIo::new(BASE, Some(image));
        let ctx = AccessCtx::default();
        disk.write(&ctx, BASE + DATA + 0x10, 2, 0x55AA).unwrap();
        disk.write(&ctx, BASE + SECTOR, 4, 2).unwrap();
        disk.write(&ctx, BASE + COMMAND, 2, CMD_WRITE as u32).unwrap();
        disk.data_mut().fill(0);
        disk.write(&ctx, BASE + COMMAND, 2, CMD_READ as u32).unwrap();
        assert_eq!(disk.read(&ctx, BASE + DATA + 0x10, 2).unwrap(), 0x55AA);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn unrecoverable_image_surfaces_the_error() {
        let path = std::env::temp_dir()
            .join("oxid_palm_no_such_dir")
            .join("card.img");
        let mut disk = DiskIo::new(BASE, Some(DiskImage::new(&path, 4)));
        let ctx = AccessCtx::default();
        disk.write(&ctx, BASE + COMMAND, 2, CMD_READ as u32).unwrap();
        assert!(matches!(disk.take_error(), Some(DiskError::Io(_))));
        let status = disk.read(&ctx, BASE + STATUS, 2).unwrap() as u16;
        assert_ne!(status & STATUS_ERROR, 0);
    }

    #[test]
    fn out_of_range_sector_is_not_reformatted() {
        let path = temp_image("range");
        let image = DiskImage::new(&path, 2);
        image.format().unwrap();
        let mut disk = DiskIo::new(BASE, Some(image));
        assert!(matches!(
            disk.read_sector(9),
            Err(DiskError::SectorOutOfRange { sector: 9, sectors: 2 })
        ));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn writes_past_the_data_window_always_fault() {
        let mut disk = DiskIo::new(BASE, None);
        let mut full = AccessCtx::default();
        full.full_access_depth = 1;
        full.flags = crate::memory::access::MemAccessFlags::UNRESTRICTED;
        assert!(disk.write(&full, BASE + DATA_END, 2, 0).is_err());
        assert!(disk.write(&full, BASE + DISK_RANGE - 1, 1, 0).is_err());
        assert!(disk.write(&full, BASE + DATA_END - 2, 2, 0).is_ok());
    }

    #[test]
    fn card_detect_is_ored_into_port_j() {
        struct Pins;
        impl HalHandler for Pins {
            fn port_input_value(&self, _: HalNext<'_>, _: char) -> HalResult<u8> {
                Ok(0x01)
            }
        }
        let disk = DiskIo::new(BASE, Some(DiskImage::new("unused.img", 1)));
        let pins = Pins;
        let rest: [&dyn HalHandler; 1] = [&pins];
        assert_eq!(disk.port_input_value(HalNext::new(&rest), 'J'), Ok(0x09));
        assert_eq!(disk.port_input_value(HalNext::new(&rest), 'D'), Ok(0x01));
    }
}
