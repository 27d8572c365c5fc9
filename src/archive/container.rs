// Copyright 2026 the Veduta Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A minimal named-file container in ZIP layout.
//!
//! Supports store and deflate entries, no zip64, no encryption; entry
//! timestamps are fixed so identical input produces identical bytes.

use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::{Compression, Crc};

use crate::{Error, Result};

const LOCAL_HEADER_SIG: u32 = 0x0403_4b50;
const CENTRAL_DIR_SIG: u32 = 0x0201_4b50;
const END_OF_CENTRAL_SIG: u32 = 0x0605_4b50;
const VERSION: u16 = 20;

const METHOD_STORE: u16 = 0;
const METHOD_DEFLATE: u16 = 8;

/// How entries are compressed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EntryCompression {
    /// Entries are stored verbatim.
    Store,
    /// Entries are deflated at the given level (0..=9).
    #[default]
    Deflate,
}

/// Writes named entries into an in-memory container.
#[derive(Debug, Default)]
pub struct ContainerWriter {
    out: Vec<u8>,
    central: Vec<u8>,
    entries: u16,
}

impl ContainerWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one named entry.
    pub fn add(
        &mut self,
        name: &str,
        data: &[u8],
        compression: EntryCompression,
        level: u32,
    ) -> Result<()> {
        let mut crc = Crc::new();
        crc.update(data);
        let crc = crc.sum();

        let (method, payload) = match compression {
            EntryCompression::Store => (METHOD_STORE, data.to_vec()),
            EntryCompression::Deflate => {
                let mut encoder =
                    DeflateEncoder::new(Vec::new(), Compression::new(level.min(9)));
                encoder
                    .write_all(data)
                    .map_err(|e| Error::invalid(name, "archive write", e.to_string()))?;
                let deflated = encoder
                    .finish()
                    .map_err(|e| Error::invalid(name, "archive write", e.to_string()))?;
                (METHOD_DEFLATE, deflated)
            }
        };

        let offset = self.out.len() as u32;
        let name_bytes = name.as_bytes();

        // Local file header.
        put_u32(&mut self.out, LOCAL_HEADER_SIG);
        put_u16(&mut self.out, VERSION);
        put_u16(&mut self.out, 0); // flags
        put_u16(&mut self.out, method);
        put_u16(&mut self.out, 0); // mod time
        put_u16(&mut self.out, 0x21); // mod date (1980-01-01)
        put_u32(&mut self.out, crc);
        put_u32(&mut self.out, payload.len() as u32);
        put_u32(&mut self.out, data.len() as u32);
        put_u16(&mut self.out, name_bytes.len() as u16);
        put_u16(&mut self.out, 0); // extra length
        self.out.extend_from_slice(name_bytes);
        self.out.extend_from_slice(&payload);

        // Central directory record.
        put_u32(&mut self.central, CENTRAL_DIR_SIG);
        put_u16(&mut self.central, VERSION);
        put_u16(&mut self.central, VERSION);
        put_u16(&mut self.central, 0);
        put_u16(&mut self.central, method);
        put_u16(&mut self.central, 0);
        put_u16(&mut self.central, 0x21);
        put_u32(&mut self.central, crc);
        put_u32(&mut self.central, payload.len() as u32);
        put_u32(&mut self.central, data.len() as u32);
        put_u16(&mut self.central, name_bytes.len() as u16);
        put_u16(&mut self.central, 0); // extra
        put_u16(&mut self.central, 0); // comment
        put_u16(&mut self.central, 0); // disk
        put_u16(&mut self.central, 0); // internal attrs
        put_u32(&mut self.central, 0); // external attrs
        put_u32(&mut self.central, offset);
        self.central.extend_from_slice(name_bytes);

        self.entries += 1;
        Ok(())
    }

    /// Finishes the container and returns its bytes.
    pub fn finish(mut self) -> Vec<u8> {
        let central_offset = self.out.len() as u32;
        self.out.extend_from_slice(&self.central);
        let central_size = self.out.len() as u32 - central_offset;
        put_u32(&mut self.out, END_OF_CENTRAL_SIG);
        put_u16(&mut self.out, 0); // this disk
        put_u16(&mut self.out, 0); // central dir disk
        put_u16(&mut self.out, self.entries);
        put_u16(&mut self.out, self.entries);
        put_u32(&mut self.out, central_size);
        put_u32(&mut self.out, central_offset);
        put_u16(&mut self.out, 0); // comment length
        self.out
    }
}

/// One entry parsed from a container.
#[derive(Clone, Debug)]
pub struct Entry {
    pub name: String,
    pub data: Vec<u8>,
}

/// Parses every entry of a container.
pub fn read_entries(label: &str, bytes: &[u8]) -> Result<Vec<Entry>> {
    let invalid = |reason: &str| Error::invalid(label, "archive read", reason);

    let eocd = find_end_of_central(bytes).ok_or_else(|| invalid("missing end of central directory"))?;
    let entry_count = get_u16(bytes, eocd + 10).ok_or_else(|| invalid("short directory"))? as usize;
    let central_offset =
        get_u32(bytes, eocd + 16).ok_or_else(|| invalid("short directory"))? as usize;

    let mut entries = Vec::with_capacity(entry_count);
    let mut pos = central_offset;
    for _ in 0..entry_count {
        if get_u32(bytes, pos) != Some(CENTRAL_DIR_SIG) {
            return Err(invalid("bad central directory signature"));
        }
        let method = get_u16(bytes, pos + 10).ok_or_else(|| invalid("short record"))?;
        let compressed = get_u32(bytes, pos + 20).ok_or_else(|| invalid("short record"))? as usize;
        let uncompressed =
            get_u32(bytes, pos + 24).ok_or_else(|| invalid("short record"))? as usize;
        let name_len = get_u16(bytes, pos + 28).ok_or_else(|| invalid("short record"))? as usize;
        let extra_len = get_u16(bytes, pos + 30).ok_or_else(|| invalid("short record"))? as usize;
        let comment_len = get_u16(bytes, pos + 32).ok_or_else(|| invalid("short record"))? as usize;
        let local_offset =
            get_u32(bytes, pos + 42).ok_or_else(|| invalid("short record"))? as usize;
        let name = bytes
            .get(pos + 46..pos + 46 + name_len)
            .ok_or_else(|| invalid("short name"))?;
        let name = String::from_utf8(name.to_vec())
            .map_err(|_| invalid("entry name is not UTF-8"))?;

        // The local header repeats the name/extra lengths; the data follows.
        if get_u32(bytes, local_offset) != Some(LOCAL_HEADER_SIG) {
            return Err(invalid("bad local header signature"));
        }
        let local_name_len =
            get_u16(bytes, local_offset + 26).ok_or_else(|| invalid("short local header"))? as usize;
        let local_extra_len =
            get_u16(bytes, local_offset + 28).ok_or_else(|| invalid("short local header"))? as usize;
        let data_start = local_offset + 30 + local_name_len + local_extra_len;
        let payload = bytes
            .get(data_start..data_start + compressed)
            .ok_or_else(|| invalid("entry data out of range"))?;

        let data = match method {
            METHOD_STORE => payload.to_vec(),
            METHOD_DEFLATE => {
                let mut out = Vec::with_capacity(uncompressed);
                DeflateDecoder::new(payload)
                    .read_to_end(&mut out)
                    .map_err(|e| invalid(&format!("deflate error in `{name}`: {e}")))?;
                out
            }
            other => return Err(invalid(&format!("unsupported method {other}"))),
        };
        entries.push(Entry { name, data });
        pos += 46 + name_len + extra_len + comment_len;
    }
    Ok(entries)
}

fn find_end_of_central(bytes: &[u8]) -> Option<usize> {
    // No comment support on the write side, but tolerate a short trailing
    // comment from other producers.
    let min = bytes.len().checked_sub(22)?;
    let floor = min.saturating_sub(1024);
    (floor..=min)
        .rev()
        .find(|&i| get_u32(bytes, i) == Some(END_OF_CENTRAL_SIG))
}

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn get_u16(bytes: &[u8], at: usize) -> Option<u16> {
    bytes
        .get(at..at + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
}

fn get_u32(bytes: &[u8], at: usize) -> Option<u32> {
    bytes
        .get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

#[cfg(test)]
mod tests {
    use super::{read_entries, ContainerWriter, EntryCompression};

    #[test]
    fn store_roundtrip() {
        let mut w = ContainerWriter::new();
        w.add("a.txt", b"hello", EntryCompression::Store, 0).unwrap();
        w.add("b.bin", &[0u8; 100], EntryCompression::Store, 0).unwrap();
        let bytes = w.finish();
        assert_eq!(&bytes[..2], b"PK");
        let entries = read_entries("t", &bytes).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a.txt");
        assert_eq!(entries[0].data, b"hello");
        assert_eq!(entries[1].data, vec![0u8; 100]);
    }

    #[test]
    fn deflate_roundtrip() {
        let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let mut w = ContainerWriter::new();
        w.add("data", &payload, EntryCompression::Deflate, 6).unwrap();
        let bytes = w.finish();
        // Repetitive data must actually shrink.
        assert!(bytes.len() < payload.len());
        let entries = read_entries("t", &bytes).unwrap();
        assert_eq!(entries[0].data, payload);
    }

    #[test]
    fn deterministic_output() {
        let build = || {
            let mut w = ContainerWriter::new();
            w.add("x", b"abc", EntryCompression::Deflate, 9).unwrap();
            w.finish()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(read_entries("t", b"definitely not an archive").is_err());
        assert!(read_entries("t", b"").is_err());
    }

    #[test]
    fn truncated_container_is_rejected() {
        let mut w = ContainerWriter::new();
        w.add("a", &[7u8; 64], EntryCompression::Store, 0).unwrap();
        let bytes = w.finish();
        assert!(read_entries("t", &bytes[..bytes.len() - 10]).is_err());
    }
}
