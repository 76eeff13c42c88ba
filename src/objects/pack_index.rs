//! Version 2 pack index (`.idx`) lookup
//!
//! Layout: magic, version, 256-entry fanout table, sorted object names,
//! CRC32 table, 32-bit offset table, optional 64-bit offset table.

use crate::error::{RevisionError, RevisionResult};

/// Magic bytes opening every version 2+ index
pub const INDEX_MAGIC: [u8; 4] = [0xff, b't', b'O', b'c'];

/// The only index version understood here
pub const INDEX_VERSION: u32 = 2;

const HEADER_LEN: usize = 8;
const FANOUT_LEN: usize = 256 * 4;
const HASH_LEN: usize = 20;
const CRC_LEN: usize = 4;
const OFFSET_LEN: usize = 4;
const LARGE_OFFSET_LEN: usize = 8;

/// Offset entries with this bit set index the 64-bit offset table
const LARGE_OFFSET_FLAG: u32 = 0x8000_0000;

/// A validated view over the bytes of a pack index.
#[derive(Debug)]
pub struct PackIndex<'a> {
    data: &'a [u8],
    fanout: [u32; 256],
}

impl<'a> PackIndex<'a> {
    /// Validate the header and fanout table.
    pub fn parse(data: &'a [u8]) -> RevisionResult<Self> {
        if data.len() < HEADER_LEN + FANOUT_LEN {
            return Err(RevisionError::MalformedIndex(format!(
                "index too short ({} bytes)",
                data.len()
            )));
        }
        if data[..4] != INDEX_MAGIC {
            return Err(RevisionError::MalformedIndex("bad magic".to_string()));
        }
        let version = read_u32(data, 4);
        if version != INDEX_VERSION {
            return Err(RevisionError::MalformedIndex(format!(
                "unsupported version {}",
                version
            )));
        }

        let mut fanout = [0u32; 256];
        for (slot, value) in fanout.iter_mut().enumerate() {
            *value = read_u32(data, HEADER_LEN + slot * 4);
        }

        let index = Self { data, fanout };
        let required = index.offsets_start() + index.entry_count() * OFFSET_LEN;
        if data.len() < required {
            return Err(RevisionError::MalformedIndex(format!(
                "truncated tables: {} entries need {} bytes, have {}",
                index.entry_count(),
                required,
                data.len()
            )));
        }
        Ok(index)
    }

    /// Total number of objects in the pack (`fanout[255]`).
    pub fn entry_count(&self) -> usize {
        self.fanout[255] as usize
    }

    /// Cumulative object counts per leading hash byte.
    #[cfg(test)]
    pub fn fanout(&self) -> &[u32; 256] {
        &self.fanout
    }

    /// Locate `hash` and return its byte offset in the companion pack.
    ///
    /// Only the fanout range for the first byte is examined, and it is
    /// scanned linearly.
    pub fn find_offset(&self, hash: &[u8; HASH_LEN]) -> RevisionResult<u64> {
        let first = hash[0] as usize;
        let start = if first == 0 {
            0
        } else {
            self.fanout[first - 1] as usize
        };
        let end = self.fanout[first] as usize;
        if start > end || end > self.entry_count() {
            return Err(RevisionError::MalformedIndex(format!(
                "fanout range {}..{} out of order",
                start, end
            )));
        }

        let hashes_start = HEADER_LEN + FANOUT_LEN;
        let position = (start..end)
            .find(|&position| {
                let at = hashes_start + position * HASH_LEN;
                self.data[at..at + HASH_LEN] == hash[..]
            })
            .ok_or(RevisionError::NotFound)?;

        self.offset_at(position)
    }

    fn offsets_start(&self) -> usize {
        HEADER_LEN + FANOUT_LEN + (HASH_LEN + CRC_LEN) * self.entry_count()
    }

    fn offset_at(&self, position: usize) -> RevisionResult<u64> {
        let offset = read_u32(self.data, self.offsets_start() + position * OFFSET_LEN);
        if offset & LARGE_OFFSET_FLAG == 0 {
            return Ok(u64::from(offset));
        }

        let large_index = (offset & !LARGE_OFFSET_FLAG) as usize;
        let at = self.offsets_start()
            + self.entry_count() * OFFSET_LEN
            + large_index * LARGE_OFFSET_LEN;
        let bytes = self
            .data
            .get(at..at + LARGE_OFFSET_LEN)
            .ok_or_else(|| RevisionError::MalformedIndex("large offset out of range".to_string()))?;
        let mut buf = [0u8; LARGE_OFFSET_LEN];
        buf.copy_from_slice(bytes);
        Ok(u64::from_be_bytes(buf))
    }
}

/// Convenience wrapper: parse `data` and look up `hash`.
pub fn find_offset(data: &[u8], hash: &[u8; HASH_LEN]) -> RevisionResult<u64> {
    PackIndex::parse(data)?.find_offset(hash)
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&data[at..at + 4]);
    u32::from_be_bytes(buf)
}

/// Assemble a version 2 index from `(hash, offset)` pairs.
#[cfg(test)]
pub fn build_index(entries: &[([u8; HASH_LEN], u32)]) -> Vec<u8> {
    let mut sorted = entries.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut data = Vec::new();
    data.extend_from_slice(&INDEX_MAGIC);
    data.extend_from_slice(&INDEX_VERSION.to_be_bytes());
    for byte in 0..=255u8 {
        let count = sorted.iter().filter(|(hash, _)| hash[0] <= byte).count() as u32;
        data.extend_from_slice(&count.to_be_bytes());
    }
    for (hash, _) in &sorted {
        data.extend_from_slice(hash);
    }
    for _ in &sorted {
        data.extend_from_slice(&0u32.to_be_bytes());
    }
    for (_, offset) in &sorted {
        data.extend_from_slice(&offset.to_be_bytes());
    }
    // Trailing pack and index checksums
    data.extend_from_slice(&[0u8; 40]);
    data
}
