// crates/systems/oxid_palm/src/memory/access.rs
use super::Memory;
use std::ops::{Deref, DerefMut};

/// Per-region validation switches.
///
/// `validate_*` on: accesses the region cannot honour (out of range, writes to
/// ROM, reads of unmapped space) fault. Off: they are tolerated (reads give 0
/// or wrap, writes land or are dropped). `prevent_user_*` and `protect_*`
/// only apply while the interpreter reports user mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemAccessFlags {
    pub validate_dummy_get: bool,
    pub validate_dummy_set: bool,
    pub validate_register_get: bool,
    pub validate_register_set: bool,
    pub validate_dram_get: bool,
    pub validate_dram_set: bool,
    pub validate_sram_get: bool,
    pub validate_sram_set: bool,
    pub validate_rom_get: bool,
    pub validate_rom_set: bool,
    pub protect_sram_set: bool,
    pub prevent_user_low_memory_get: bool,
    pub prevent_user_low_memory_set: bool,
    pub check_meta: bool,
}

impl Default for MemAccessFlags {
    fn default() -> Self {
        Self::MASTER_DEFAULTS
    }
}

impl MemAccessFlags {
    /// Session-start configuration.
    pub const MASTER_DEFAULTS: MemAccessFlags = MemAccessFlags {
        validate_dummy_get: true,
        validate_dummy_set: true,
        validate_register_get: true,
        validate_register_set: true,
        validate_dram_get: true,
        validate_dram_set: true,
        validate_sram_get: true,
        validate_sram_set: true,
        validate_rom_get: true,
        validate_rom_set: true,
        protect_sram_set: true,
        prevent_user_low_memory_get: true,
        prevent_user_low_memory_set: true,
        check_meta: true,
    };

    /// Everything off. Installed by [`FullAccess`].
    pub const UNRESTRICTED: MemAccessFlags = MemAccessFlags {
        validate_dummy_get: false,
        validate_dummy_set: false,
        validate_register_get: false,
        validate_register_set: false,
        validate_dram_get: false,
        validate_dram_set: false,
        validate_sram_get: false,
        validate_sram_set: false,
        validate_rom_get: false,
        validate_rom_set: false,
        protect_sram_set: false,
        prevent_user_low_memory_get: false,
        prevent_user_low_memory_set: false,
        check_meta: false,
    };
}

/// What a bank sees about the current access: the live flags, whether a
/// [`FullAccess`] scope is open, and the interpreter's privilege mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessCtx {
    pub flags: MemAccessFlags,
    pub full_access_depth: u32,
    pub system_mode: bool,
}

impl Default for AccessCtx {
    fn default() -> Self {
        Self {
            flags: MemAccessFlags::MASTER_DEFAULTS,
            full_access_depth: 0,
            system_mode: true,
        }
    }
}

impl AccessCtx {
    /// True while the emulator itself holds full access.
    #[inline]
    pub fn access_ok(&self) -> bool {
        self.full_access_depth > 0
    }

    #[inline]
    pub fn user_mode(&self) -> bool {
        !self.system_mode
    }
}

/// Scoped full access for the emulator's own peeks and pokes.
///
/// Construction saves the whole flag record and clears every switch; drop
/// restores exactly what was saved, on every exit path including unwinding.
/// Guards nest through `DerefMut`: an inner guard restores the outer guard's
/// state, not the master defaults.
pub struct FullAccess<'a> {
    mem: &'a mut Memory,
    saved: MemAccessFlags,
}

impl<'a> FullAccess<'a> {
    pub fn new(mem: &'a mut Memory) -> Self {
        let saved = mem.access.flags;
        mem.access.flags = MemAccessFlags::UNRESTRICTED;
        mem.access.full_access_depth += 1;
        Self { mem, saved }
    }
}

impl Drop for FullAccess<'_> {
    fn drop(&mut self) {
        self.mem.access.flags = self.saved;
        self.mem.access.full_access_depth -= 1;
    }
}

impl Deref for FullAccess<'_> {
    type Target = Memory;

    fn deref(&self) -> &Memory {
        self.mem
    }
}

impl DerefMut for FullAccess<'_> {
    fn deref_mut(&mut self) -> &mut Memory {
        self.mem
    }
}
