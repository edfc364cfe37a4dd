// crates/systems/oxid_palm/src/config.rs
//! Device description loaded from JSON.

use crate::error::ConfigError;
use crate::gremlins::Language;
use crate::memory::endian::ByteOrder;
use crate::memory::BANK_SIZE;
use crate::regs::disk::SECTOR_SIZE;
use crate::regs::DragonBallModel;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeviceModel {
    /// m100 class: DragonBall EZ, on-chip LCD controller.
    PalmEz,
    /// m500 class: DragonBall VZ with an external SED1376.
    #[default]
    PalmVz,
    PalmSz,
    /// Sony CLIE: VZ, SED1376 and the command interface ASIC.
    ClieVz,
}

impl DeviceModel {
    pub fn dragonball(self) -> DragonBallModel {
        match self {
            DeviceModel::PalmEz => DragonBallModel::Ez,
            DeviceModel::PalmVz | DeviceModel::ClieVz => DragonBallModel::Vz,
            DeviceModel::PalmSz => DragonBallModel::Sz,
        }
    }

    pub fn has_sed1376(self) -> bool {
        !matches!(self, DeviceModel::PalmEz)
    }

    pub fn has_command_itf(self) -> bool {
        matches!(self, DeviceModel::ClieVz)
    }

    pub fn name(self) -> &'static str {
        match self {
            DeviceModel::PalmEz => "Palm (DragonBall EZ)",
            DeviceModel::PalmVz => "Palm (DragonBall VZ)",
            DeviceModel::PalmSz => "Palm (DragonBall SZ)",
            DeviceModel::ClieVz => "Sony CLIE (DragonBall VZ)",
        }
    }
}

fn default_word_swap() -> bool {
    ByteOrder::host().word_swap
}

fn default_unaligned_long() -> bool {
    ByteOrder::host().unaligned_long
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PalmConfig {
    #[serde(default)]
    pub device: DeviceModel,
    #[serde(default = "PalmConfig::default_ram_size")]
    pub ram_size: u32,
    #[serde(default = "PalmConfig::default_dynamic_heap_size")]
    pub dynamic_heap_size: u32,
    #[serde(default = "PalmConfig::default_rom_base")]
    pub rom_base: u32,
    #[serde(default = "default_word_swap")]
    pub word_swap: bool,
    #[serde(default = "default_unaligned_long")]
    pub unaligned_long: bool,
    #[serde(default)]
    pub disk_image: Option<PathBuf>,
    /// Image size in bytes.
    #[serde(default = "PalmConfig::default_disk_size")]
    pub disk_size: u32,
    /// Picks the Gremlin quote pool.
    #[serde(default)]
    pub language: Language,
}

impl Default for PalmConfig {
    fn default() -> Self {
        Self {
            device: DeviceModel::default(),
            ram_size: Self::default_ram_size(),
            dynamic_heap_size: Self::default_dynamic_heap_size(),
            rom_base: Self::default_rom_base(),
            word_swap: default_word_swap(),
            unaligned_long: default_unaligned_long(),
            disk_image: None,
            disk_size: Self::default_disk_size(),
            language: Language::default(),
        }
    }
}

impl PalmConfig {
    fn default_ram_size() -> u32 {
        8 * 1024 * 1024
    }

    fn default_dynamic_heap_size() -> u32 {
        256 * 1024
    }

    fn default_rom_base() -> u32 {
        0x1000_0000
    }

    fn default_disk_size() -> u32 {
        8 * 1024 * 1024
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: PalmConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn byte_order(&self) -> ByteOrder {
        ByteOrder {
            word_swap: self.word_swap,
            unaligned_long: self.unaligned_long,
        }
    }

    pub fn disk_sectors(&self) -> u32 {
        self.disk_size / SECTOR_SIZE as u32
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ram_size == 0 || self.ram_size % BANK_SIZE != 0 {
            return Err(ConfigError::Invalid(format!(
                "ram_size {:#X} must be a non-zero multiple of 64 KiB",
                self.ram_size
            )));
        }
        if self.dynamic_heap_size > self.ram_size {
            return Err(ConfigError::Invalid(format!(
                "dynamic_heap_size {:#X} exceeds ram_size {:#X}",
                self.dynamic_heap_size, self.ram_size
            )));
        }
        if self.rom_base % BANK_SIZE != 0 {
            return Err(ConfigError::Invalid(format!(
                "rom_base {:#010X} is not 64 KiB aligned",
                self.rom_base
            )));
        }
        if self.rom_base < self.ram_size {
            return Err(ConfigError::Invalid(format!(
                "rom_base {:#010X} lies inside RAM",
                self.rom_base
            )));
        }
        if self.disk_image.is_some() && (self.disk_size == 0 || self.disk_size as usize % SECTOR_SIZE != 0) {
            return Err(ConfigError::Invalid(format!(
                "disk_size {} must be a non-zero multiple of {SECTOR_SIZE}",
                self.disk_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_takes_every_default() {
        let config = PalmConfig::from_json_str("{}").unwrap();
        assert_eq!(config, PalmConfig::default());
        assert_eq!(config.byte_order(), ByteOrder::host());
    }

    #[test]
    fn partial_json_overrides() {
        let config = PalmConfig::from_json_str(
            r#"{ "device": "ClieVz", "ram_size": 1048576, "word_swap": false, "language": "Japanese" }"#,
        )
        .unwrap();
        assert_eq!(config.device, DeviceModel::ClieVz);
        assert_eq!(config.ram_size, 0x10_0000);
        assert!(!config.byte_order().word_swap);
        assert_eq!(config.language, Language::Japanese);
        assert!(config.device.has_command_itf());
    }

    #[test]
    fn bad_geometry_is_rejected() {
        for json in [
            r#"{ "ram_size": 1000 }"#,
            r#"{ "ram_size": 65536, "dynamic_heap_size": 131072 }"#,
            r#"{ "rom_base": 268435457 }"#,
            r#"{ "rom_base": 0 }"#,
            r#"{ "disk_image": "card.img", "disk_size": 100 }"#,
        ] {
            assert!(
                matches!(PalmConfig::from_json_str(json), Err(ConfigError::Invalid(_))),
                "{json}"
            );
        }
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(PalmConfig::from_json_str("{ ram_size"), Err(ConfigError::Json(_))));
    }
}
