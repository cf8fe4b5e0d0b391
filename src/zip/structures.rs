use byteorder::{LittleEndian, ReadBytesExt};
use chrono::{NaiveDate, NaiveDateTime};
use std::io::{self, Cursor};

use super::bytes::has_signature;
use crate::error::{Error, Result};

/// 32-bit fields set to this value defer to the Zip64 structures.
pub const SENTINEL_U32: u32 = 0xFFFF_FFFF;
/// 16-bit counts set to this value defer to the Zip64 structures.
pub const SENTINEL_U16: u16 = 0xFFFF;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: u32 = 0x0605_4B50;
    pub const SIZE: usize = 22;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || !has_signature(data, 0, Self::SIGNATURE) {
            return Err(Error::invalid("malformed end of central directory"));
        }

        let mut cursor = Cursor::new(&data[4..]);
        Self::read_fields(&mut cursor)
            .map_err(|_| Error::invalid("truncated end of central directory"))
    }

    fn read_fields(cursor: &mut Cursor<&[u8]>) -> io::Result<Self> {
        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    /// True if any field claims its real value lives in a Zip64 record.
    pub fn is_zip64(&self) -> bool {
        self.disk_entries == SENTINEL_U16
            || self.total_entries == SENTINEL_U16
            || self.cd_size == SENTINEL_U32
            || self.cd_offset == SENTINEL_U32
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zip64EOCDLocator {
    pub disk_with_eocd64: u32,
    pub eocd64_offset: u64,
    pub total_disks: u32,
}

impl Zip64EOCDLocator {
    pub const SIGNATURE: u32 = 0x0706_4B50;
    pub const SIZE: usize = 20;

    /// `None` when the bytes are not a locator; that is the normal case for
    /// archives without Zip64 extensions.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE || !has_signature(data, 0, Self::SIGNATURE) {
            return None;
        }

        let mut cursor = Cursor::new(&data[4..]);
        let read = |cursor: &mut Cursor<&[u8]>| -> io::Result<Self> {
            Ok(Self {
                disk_with_eocd64: cursor.read_u32::<LittleEndian>()?,
                eocd64_offset: cursor.read_u64::<LittleEndian>()?,
                total_disks: cursor.read_u32::<LittleEndian>()?,
            })
        };
        read(&mut cursor).ok()
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zip64EOCD {
    pub eocd64_size: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub disk_with_cd: u32,
    pub disk_entries: u64,
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EOCD {
    pub const SIGNATURE: u32 = 0x0606_4B50;
    pub const MIN_SIZE: usize = 56;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::MIN_SIZE || !has_signature(data, 0, Self::SIGNATURE) {
            return Err(Error::invalid("malformed Zip64 end of central directory"));
        }

        let mut cursor = Cursor::new(&data[4..]);
        Self::read_fields(&mut cursor)
            .map_err(|_| Error::invalid("truncated Zip64 end of central directory"))
    }

    fn read_fields(cursor: &mut Cursor<&[u8]>) -> io::Result<Self> {
        Ok(Self {
            eocd64_size: cursor.read_u64::<LittleEndian>()?,
            version_made_by: cursor.read_u16::<LittleEndian>()?,
            version_needed: cursor.read_u16::<LittleEndian>()?,
            disk_number: cursor.read_u32::<LittleEndian>()?,
            disk_with_cd: cursor.read_u32::<LittleEndian>()?,
            disk_entries: cursor.read_u64::<LittleEndian>()?,
            total_entries: cursor.read_u64::<LittleEndian>()?,
            cd_size: cursor.read_u64::<LittleEndian>()?,
            cd_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: u32 = 0x0201_4B50;
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: u32 = 0x0403_4B50;
pub const LFH_SIZE: usize = 30;

/// Header id of the Zip64 extended information extra field.
pub const ZIP64_EXTRA_ID: u16 = 0x0001;

/// Where the central directory lives, after Zip64 values have replaced any
/// sentinel fields but before the offset adjustment is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CentralDirectoryInfo {
    pub entry_count: u64,
    pub cd_offset: u64,
    pub cd_size: u64,
}

/// One file or directory inside an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Full slash-separated path; directories end with `/`.
    pub path: String,
    /// Last path component, without a trailing slash.
    pub name: String,
    pub is_directory: bool,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub modification_time: Option<NaiveDateTime>,
    pub crc32: u32,
    pub compression_method: CompressionMethod,
    /// As recorded in the archive, before any offset adjustment.
    pub local_header_offset: u64,
}

impl ArchiveEntry {
    /// A directory implied by deeper paths but missing from the archive.
    pub fn synthetic_directory(path: String) -> Self {
        Self {
            name: entry_name(&path).to_owned(),
            path,
            is_directory: true,
            compressed_size: 0,
            uncompressed_size: 0,
            modification_time: None,
            crc32: 0,
            compression_method: CompressionMethod::Stored,
            local_header_offset: 0,
        }
    }
}

/// Last `/`-delimited component of an entry path, ignoring a trailing slash.
pub fn entry_name(path: &str) -> &str {
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Convert MS-DOS date and time fields. Returns `None` for values that do
/// not form a real calendar date (e.g. zeroed fields).
pub fn dos_datetime(date: u16, time: u16) -> Option<NaiveDateTime> {
    let day = u32::from(date & 0x1F);
    let month = u32::from((date >> 5) & 0x0F);
    let year = i32::from((date >> 9) & 0x7F) + 1980;

    let second = u32::from(time & 0x1F) * 2;
    let minute = u32::from((time >> 5) & 0x3F);
    let hour = u32::from((time >> 11) & 0x1F);

    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}
