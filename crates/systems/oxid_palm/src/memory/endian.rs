// crates/systems/oxid_palm/src/memory/endian.rs
//
// Emulated memory is big endian. Backing stores may hold it word-swapped
// (each 16-bit word in host order) so that word accesses are a single
// native load on little-endian hosts; bytes then live at `offset ^ 1`.
// Everything here is plain bit arithmetic: no side effects, no branches on
// device identity.

/// Storage policy for a backing buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteOrder {
    /// 16-bit words are stored in little-endian order; bytes XOR the low address bit.
    pub word_swap: bool,
    /// Longs may be assembled with one 4-byte load instead of two word loads.
    pub unaligned_long: bool,
}

impl Default for ByteOrder {
    fn default() -> Self {
        Self::host()
    }
}

impl ByteOrder {
    /// Wire format: bytes in memory order, no swapping.
    pub const BIG_ENDIAN: ByteOrder = ByteOrder {
        word_swap: false,
        unaligned_long: false,
    };

    /// Swap words on little-endian hosts.
    pub const fn host() -> Self {
        Self {
            word_swap: cfg!(target_endian = "little"),
            unaligned_long: true,
        }
    }

    #[inline]
    pub fn byte_index(&self, offset: usize) -> usize {
        offset ^ (self.word_swap as usize)
    }

    #[inline]
    pub fn get8(&self, buf: &[u8], offset: usize) -> u8 {
        buf[self.byte_index(offset)]
    }

    #[inline]
    pub fn put8(&self, buf: &mut [u8], offset: usize, value: u8) {
        buf[self.byte_index(offset)] = value;
    }

    #[inline]
    pub fn get16(&self, buf: &[u8], offset: usize) -> u16 {
        if offset & 1 != 0 {
            // Odd offsets straddle two storage words.
            return ((self.get8(buf, offset) as u16) << 8) | self.get8(buf, offset + 1) as u16;
        }
        let pair = [buf[offset], buf[offset + 1]];
        if self.word_swap {
            u16::from_le_bytes(pair)
        } else {
            u16::from_be_bytes(pair)
        }
    }

    #[inline]
    pub fn put16(&self, buf: &mut [u8], offset: usize, value: u16) {
        if offset & 1 != 0 {
            self.put8(buf, offset, (value >> 8) as u8);
            self.put8(buf, offset + 1, value as u8);
            return;
        }
        let pair = if self.word_swap {
            value.to_le_bytes()
        } else {
            value.to_be_bytes()
        };
        buf[offset] = pair[0];
        buf[offset + 1] = pair[1];
    }

    #[inline]
    pub fn get32(&self, buf: &[u8], offset: usize) -> u32 {
        if self.unaligned_long && !self.word_swap {
            return u32::from_be_bytes([
                buf[offset],
                buf[offset + 1],
                buf[offset + 2],
                buf[offset + 3],
            ]);
        }
        ((self.get16(buf, offset) as u32) << 16) | self.get16(buf, offset + 2) as u32
    }

    #[inline]
    pub fn put32(&self, buf: &mut [u8], offset: usize, value: u32) {
        if self.unaligned_long && !self.word_swap {
            buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
            return;
        }
        self.put16(buf, offset, (value >> 16) as u16);
        self.put16(buf, offset + 2, value as u16);
    }

    /// Sized read; `size` is 1, 2 or 4.
    pub fn get(&self, buf: &[u8], offset: usize, size: u8) -> u32 {
        match size {
            1 => self.get8(buf, offset) as u32,
            2 => self.get16(buf, offset) as u32,
            _ => self.get32(buf, offset),
        }
    }

    pub fn put(&self, buf: &mut [u8], offset: usize, size: u8, value: u32) {
        match size {
            1 => self.put8(buf, offset, value as u8),
            2 => self.put16(buf, offset, value as u16),
            _ => self.put32(buf, offset, value),
        }
    }

    /// Copies a big-endian image into a buffer laid out with this policy.
    pub fn load_image(&self, buf: &mut [u8], image: &[u8]) {
        for (i, &b) in image.iter().enumerate().take(buf.len()) {
            self.put8(buf, i, b);
        }
    }

    /// Inverse of [`load_image`](Self::load_image): wire-format copy of `len` bytes.
    pub fn export(&self, buf: &[u8], offset: usize, len: usize) -> Vec<u8> {
        (offset..offset + len).map(|i| self.get8(buf, i)).collect()
    }
}

/// Rounds a backing-store length up to whole words so `offset ^ 1` stays in bounds.
pub fn storage_len(len: usize) -> usize {
    (len + 1) & !1
}
