//! Builds small ZIP archives byte by byte for tests.

#![allow(dead_code)]

use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::Write;

/// 2021-03-14
pub const DOS_DATE: u16 = ((2021 - 1980) << 9) | (3 << 5) | 14;
/// 15:09:26
pub const DOS_TIME: u16 = (15 << 11) | (9 << 5) | 13;

struct FixtureEntry {
    name: Vec<u8>,
    data: Vec<u8>,
    method: u16,
    extra: Vec<u8>,
    comment: Vec<u8>,
}

#[derive(Default)]
pub struct ZipBuilder {
    prefix: Vec<u8>,
    entries: Vec<FixtureEntry>,
    comment: Vec<u8>,
    zip64: bool,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes placed before the archive without fixing up any offsets, the
    /// way a self-extracting stub is concatenated with a ZIP.
    pub fn prefix(mut self, stub: &[u8]) -> Self {
        self.prefix = stub.to_vec();
        self
    }

    pub fn stored(self, name: &str, data: &[u8]) -> Self {
        self.raw(name.as_bytes(), data, 0)
    }

    pub fn deflated(self, name: &str, data: &[u8]) -> Self {
        self.raw(name.as_bytes(), data, 8)
    }

    pub fn directory(self, name: &str) -> Self {
        self.raw(name.as_bytes(), b"", 0)
    }

    /// Arbitrary name bytes and method id. Methods other than 8 store the
    /// data as-is.
    pub fn raw(mut self, name: &[u8], data: &[u8], method: u16) -> Self {
        self.entries.push(FixtureEntry {
            name: name.to_vec(),
            data: data.to_vec(),
            method,
            extra: Vec::new(),
            comment: Vec::new(),
        });
        self
    }

    /// Append an extra field to the most recently added entry's central
    /// directory header.
    pub fn extra_field(mut self, id: u16, body: &[u8]) -> Self {
        if let Some(entry) = self.entries.last_mut() {
            entry.extra.extend_from_slice(&id.to_le_bytes());
            entry.extra.extend_from_slice(&(body.len() as u16).to_le_bytes());
            entry.extra.extend_from_slice(body);
        }
        self
    }

    /// Set the file comment of the most recently added entry.
    pub fn entry_comment(mut self, comment: &[u8]) -> Self {
        if let Some(entry) = self.entries.last_mut() {
            entry.comment = comment.to_vec();
        }
        self
    }

    pub fn comment(mut self, comment: &[u8]) -> Self {
        self.comment = comment.to_vec();
        self
    }

    /// Write every size and offset through Zip64 records and extra fields.
    pub fn zip64(mut self) -> Self {
        self.zip64 = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = self.prefix.clone();
        let base = self.prefix.len();
        let mut central = Vec::new();

        for entry in &self.entries {
            let payload = if entry.method == 8 {
                deflate(&entry.data)
            } else {
                entry.data.clone()
            };
            let crc = crc32fast::hash(&entry.data);
            let offset = (out.len() - base) as u64;
            let compressed = payload.len() as u64;
            let uncompressed = entry.data.len() as u64;

            let (size32, csize32, offset32, mut cd_extra, lfh_extra) = if self.zip64 {
                let mut cd_extra = Vec::new();
                cd_extra.extend_from_slice(&1u16.to_le_bytes());
                cd_extra.extend_from_slice(&24u16.to_le_bytes());
                cd_extra.extend_from_slice(&uncompressed.to_le_bytes());
                cd_extra.extend_from_slice(&compressed.to_le_bytes());
                cd_extra.extend_from_slice(&offset.to_le_bytes());

                let mut lfh_extra = Vec::new();
                lfh_extra.extend_from_slice(&1u16.to_le_bytes());
                lfh_extra.extend_from_slice(&16u16.to_le_bytes());
                lfh_extra.extend_from_slice(&uncompressed.to_le_bytes());
                lfh_extra.extend_from_slice(&compressed.to_le_bytes());

                (u32::MAX, u32::MAX, u32::MAX, cd_extra, lfh_extra)
            } else {
                (
                    uncompressed as u32,
                    compressed as u32,
                    offset as u32,
                    Vec::new(),
                    Vec::new(),
                )
            };

            cd_extra.extend_from_slice(&entry.extra);

            // Local file header
            out.extend_from_slice(&0x04034b50u32.to_le_bytes());
            out.extend_from_slice(&45u16.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&entry.method.to_le_bytes());
            out.extend_from_slice(&DOS_TIME.to_le_bytes());
            out.extend_from_slice(&DOS_DATE.to_le_bytes());
            out.extend_from_slice(&crc.to_le_bytes());
            out.extend_from_slice(&csize32.to_le_bytes());
            out.extend_from_slice(&size32.to_le_bytes());
            out.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
            out.extend_from_slice(&(lfh_extra.len() as u16).to_le_bytes());
            out.extend_from_slice(&entry.name);
            out.extend_from_slice(&lfh_extra);
            out.extend_from_slice(&payload);

            // Central directory header
            central.extend_from_slice(&0x02014b50u32.to_le_bytes());
            central.extend_from_slice(&45u16.to_le_bytes());
            central.extend_from_slice(&45u16.to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&entry.method.to_le_bytes());
            central.extend_from_slice(&DOS_TIME.to_le_bytes());
            central.extend_from_slice(&DOS_DATE.to_le_bytes());
            central.extend_from_slice(&crc.to_le_bytes());
            central.extend_from_slice(&csize32.to_le_bytes());
            central.extend_from_slice(&size32.to_le_bytes());
            central.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
            central.extend_from_slice(&(cd_extra.len() as u16).to_le_bytes());
            central.extend_from_slice(&(entry.comment.len() as u16).to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&0u32.to_le_bytes());
            central.extend_from_slice(&offset32.to_le_bytes());
            central.extend_from_slice(&entry.name);
            central.extend_from_slice(&cd_extra);
            central.extend_from_slice(&entry.comment);
        }

        let cd_offset = (out.len() - base) as u64;
        let cd_size = central.len() as u64;
        let count = self.entries.len() as u64;
        out.extend_from_slice(&central);

        if self.zip64 {
            let record_offset = (out.len() - base) as u64;
            out.extend_from_slice(&0x06064b50u32.to_le_bytes());
            out.extend_from_slice(&44u64.to_le_bytes());
            out.extend_from_slice(&45u16.to_le_bytes());
            out.extend_from_slice(&45u16.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&count.to_le_bytes());
            out.extend_from_slice(&count.to_le_bytes());
            out.extend_from_slice(&cd_size.to_le_bytes());
            out.extend_from_slice(&cd_offset.to_le_bytes());

            out.extend_from_slice(&0x07064b50u32.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&record_offset.to_le_bytes());
            out.extend_from_slice(&1u32.to_le_bytes());
        }

        let (count16, cd_size32, cd_offset32) = if self.zip64 {
            (u16::MAX, u32::MAX, u32::MAX)
        } else {
            (count as u16, cd_size as u32, cd_offset as u32)
        };

        out.extend_from_slice(&0x06054b50u32.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&count16.to_le_bytes());
        out.extend_from_slice(&count16.to_le_bytes());
        out.extend_from_slice(&cd_size32.to_le_bytes());
        out.extend_from_slice(&cd_offset32.to_le_bytes());
        out.extend_from_slice(&(self.comment.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.comment);
        out
    }
}

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Positions of every occurrence of `needle` in `haystack`.
pub fn find_all(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
    haystack
        .windows(needle.len())
        .enumerate()
        .filter(|(_, window)| *window == needle)
        .map(|(i, _)| i)
        .collect()
}

/// Sample text that compresses well.
pub fn lorem() -> Vec<u8> {
    b"Lorem ipsum dolor sit amet, consectetur adipiscing elit. ".repeat(40)
}
