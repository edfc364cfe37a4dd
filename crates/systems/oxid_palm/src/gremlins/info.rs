// crates/systems/oxid_palm/src/gremlins/info.rs
//! Run parameters carried inside the Gremlins record.

use crate::stream::{StreamReader, StreamResult, StreamWriter};

pub const DB_NAME_LEN: usize = 32;

/// Identifies one database (application) on a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseInfo {
    pub creator: u32,
    pub db_type: u32,
    pub version: u16,
    pub db_id: u32,
    pub card_no: u16,
    pub mod_date: u32,
    pub category: u16,
    pub name: [u8; DB_NAME_LEN],
}

impl DatabaseInfo {
    /// Application entry with `name` truncated to fit, NUL padded.
    pub fn app(creator: u32, name: &str) -> Self {
        let mut buf = [0u8; DB_NAME_LEN];
        let n = name.len().min(DB_NAME_LEN - 1);
        buf[..n].copy_from_slice(&name.as_bytes()[..n]);
        Self {
            creator,
            db_type: u32::from_be_bytes(*b"appl"),
            version: 1,
            db_id: 0,
            card_no: 0,
            mod_date: 0,
            category: 0,
            name: buf,
        }
    }

    pub fn name(&self) -> &[u8] {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(DB_NAME_LEN);
        &self.name[..end]
    }

    pub fn write(&self, w: &mut StreamWriter) {
        w.u32(self.creator)
            .u32(self.db_type)
            .u16(self.version)
            .u32(self.db_id)
            .u16(self.card_no)
            .u32(self.mod_date)
            .u16(self.category)
            .raw(&self.name);
    }

    pub fn read(r: &mut StreamReader<'_>) -> StreamResult<Self> {
        let creator = r.u32()?;
        let db_type = r.u32()?;
        let version = r.u16()?;
        let db_id = r.u32()?;
        let card_no = r.u16()?;
        let mod_date = r.u32()?;
        let category = r.u16()?;
        let mut name = [0u8; DB_NAME_LEN];
        name.copy_from_slice(r.take(DB_NAME_LEN)?);
        Ok(Self {
            creator,
            db_type,
            version,
            db_id,
            card_no,
            mod_date,
            category,
            name,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GremlinInfo {
    pub number: u16,
    pub steps: u32,
    /// Applications the Gremlin may switch to; empty means any.
    pub app_list: Vec<DatabaseInfo>,
    /// Steps between automatic session saves, 0 for never.
    pub save_frequency: u32,
    // Legacy fields, always written.
    pub continue_past_warnings: bool,
    pub unused1: bool,
    pub unused2: bool,
}

impl GremlinInfo {
    pub fn new(number: u16, steps: u32) -> Self {
        Self {
            number,
            steps,
            ..Self::default()
        }
    }

    pub fn write(&self, w: &mut StreamWriter) {
        w.u16(self.number).u32(self.steps).u32(self.app_list.len() as u32);
        for app in &self.app_list {
            app.write(w);
        }
        w.u32(self.save_frequency)
            .bool(self.continue_past_warnings)
            .bool(self.unused1)
            .bool(self.unused2);
    }

    pub fn read(r: &mut StreamReader<'_>) -> StreamResult<Self> {
        let number = r.u16()?;
        let steps = r.u32()?;
        let count = r.u32()? as usize;
        // 56 bytes per entry; never preallocate past the input.
        let mut app_list = Vec::with_capacity(count.min(r.remaining() / 56));
        for _ in 0..count {
            app_list.push(DatabaseInfo::read(r)?);
        }
        Ok(Self {
            number,
            steps,
            app_list,
            save_frequency: r.u32()?,
            continue_past_warnings: r.bool()?,
            unused1: r.bool()?,
            unused2: r.bool()?,
        })
    }
}
