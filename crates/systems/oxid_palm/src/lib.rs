// crates/systems/oxid_palm/src/lib.rs
//! Palm OS emulator core.
//!
//! The bank-indexed memory map, the DragonBall family register blocks and
//! their capability chain, scoped full access for the emulator's own memory
//! traffic, and the Gremlins UI fuzzer. The 68K interpreter is a caller of
//! this crate through [`oxide_core::MemoryBus`].

pub mod config;
pub mod error;
pub mod gremlins;
pub mod memory;
pub mod regs;
pub mod session;
pub mod stream;
pub mod transport;

pub use config::{DeviceModel, PalmConfig};
pub use error::{ConfigError, DiskError, HalError, SessionError, StreamError, TransportError};
pub use gremlins::{GremlinInfo, Gremlins, Tick};
pub use memory::access::{FullAccess, MemAccessFlags};
pub use memory::{AddressBank, BankId, Memory};
pub use session::Session;
