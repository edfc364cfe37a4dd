// crates/systems/oxid_palm/src/error.rs
use oxide_core::{BusFault, RomError};
use thiserror::Error;

/// Errors from the byte-cursor session stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("unexpected end of stream: needed {needed} byte(s), {remaining} left")]
    UnexpectedEof { needed: usize, remaining: usize },
    #[error("record {record} has version {found}, newest supported is {max}")]
    UnsupportedVersion {
        record: &'static str,
        found: u32,
        max: u32,
    },
    #[error("invalid length {len} for {field}")]
    InvalidLength { field: &'static str, len: usize },
    #[error("not a session record")]
    BadMagic,
}

/// Errors from the storage-card backing image.
#[derive(Error, Debug)]
pub enum DiskError {
    #[error("disk image IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sector {sector} is outside the {sectors}-sector image")]
    SectorOutOfRange { sector: u32, sectors: u32 },
    #[error("no disk image attached")]
    NoImage,
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("transport '{0}' is already open")]
    AlreadyOpen(String),
    #[error("transport '{0}' is not open")]
    NotOpen(String),
    #[error("transport IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Contract violations of the capability chain.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HalError {
    #[error("handler {0} is already linked")]
    AlreadyLinked(usize),
    #[error("handler {0} is not linked")]
    NotLinked(usize),
    #[error("no handler in the chain answers {0}")]
    Unanswered(&'static str),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Rom(#[from] RomError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error(transparent)]
    Disk(#[from] DiskError),
    #[error(transparent)]
    Fault(#[from] BusFault),
    #[error("session file IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("saved state names register block '{0}', which this device does not have")]
    UnknownBlock(String),
    #[error("saved register block '{name}' holds {found} bytes, expected {expected}")]
    BlockSizeMismatch {
        name: String,
        found: usize,
        expected: usize,
    },
}
