//! Reading a single entry out of a `.pack` file

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use flate2::read::ZlibDecoder;
use gix_object::Kind;

use crate::error::{RevisionError, RevisionResult};

/// Upper bound on buffer preallocation from an untrusted size header
const MAX_PREALLOC: u64 = 1 << 20;

/// Object type stored in bits 4-6 of an entry's first header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackObjectKind {
    Base(Kind),
    OfsDelta,
    RefDelta,
    Reserved(u8),
}

impl PackObjectKind {
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => PackObjectKind::Base(Kind::Commit),
            2 => PackObjectKind::Base(Kind::Tree),
            3 => PackObjectKind::Base(Kind::Blob),
            4 => PackObjectKind::Base(Kind::Tag),
            6 => PackObjectKind::OfsDelta,
            7 => PackObjectKind::RefDelta,
            other => PackObjectKind::Reserved(other),
        }
    }
}

/// Decoded type/size header of a pack entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackEntryHeader {
    pub kind: PackObjectKind,
    pub size: u64,
}

/// Result of reading an entry: either commit bytes or the kind that was found instead.
#[derive(Debug)]
pub enum PackEntry {
    Commit(Vec<u8>),
    Other(PackObjectKind),
}

/// Decode the variable-length entry header.
///
/// The first byte holds the type in bits 4-6 and the low four size bits;
/// each continuation byte adds seven more size bits. The reader is left
/// positioned at the start of the compressed payload.
pub fn read_entry_header<R: Read>(reader: &mut R) -> io::Result<PackEntryHeader> {
    let mut byte = read_byte(reader)?;
    let kind = PackObjectKind::from_code((byte >> 4) & 0x07);
    let mut size = u64::from(byte & 0x0f);
    let mut shift = 4u32;

    while byte & 0x80 != 0 {
        byte = read_byte(reader)?;
        if shift > 63 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "pack entry size header too long",
            ));
        }
        size |= u64::from(byte & 0x7f) << shift;
        shift += 7;
    }

    Ok(PackEntryHeader { kind, size })
}

/// Read the entry at `offset` in `pack_path`, decompressing it if it is a commit.
pub fn read_object_at(pack_path: &Path, offset: u64) -> RevisionResult<PackEntry> {
    let file = File::open(pack_path)?;
    let mut reader = BufReader::new(file);
    reader.seek(SeekFrom::Start(offset))?;

    let header = read_entry_header(&mut reader).map_err(|e| {
        RevisionError::ReadFailed(format!(
            "entry header at {} in {:?}: {}",
            offset, pack_path, e
        ))
    })?;
    tracing::debug!(
        "Pack entry at {} in {:?}: {:?} ({} bytes)",
        offset,
        pack_path,
        header.kind,
        header.size
    );

    if header.kind != PackObjectKind::Base(Kind::Commit) {
        return Ok(PackEntry::Other(header.kind));
    }

    let mut payload = Vec::with_capacity(header.size.min(MAX_PREALLOC) as usize);
    ZlibDecoder::new(reader)
        .read_to_end(&mut payload)
        .map_err(|e| {
            RevisionError::ReadFailed(format!(
                "decompressing entry at {} in {:?}: {}",
                offset, pack_path, e
            ))
        })?;

    Ok(PackEntry::Commit(payload))
}

fn read_byte<R: Read>(reader: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Encode an entry header with the same bit layout `read_entry_header` expects.
#[cfg(test)]
pub fn encode_entry_header(code: u8, size: u64) -> Vec<u8> {
    let mut remaining = size >> 4;
    let mut first = (code << 4) | (size & 0x0f) as u8;
    if remaining != 0 {
        first |= 0x80;
    }
    let mut out = vec![first];
    while remaining != 0 {
        let mut byte = (remaining & 0x7f) as u8;
        remaining >>= 7;
        if remaining != 0 {
            byte |= 0x80;
        }
        out.push(byte);
    }
    out
}
