//! Low-level ZIP archive parser.
//!
//! This module handles the binary parsing of ZIP file structures,
//! reading from any source that implements the [`ReadAt`] trait.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. If a Zip64 locator precedes it, read the Zip64 EOCD instead
//! 3. Compare where the central directory should end with where it
//!    actually ends to detect prepended data (self-extracting stubs)
//! 4. Read the Central Directory to get metadata for all files
//!
//! Damage inside the central directory is contained: entries read before
//! a bad header are kept, and unusable names are skipped individually.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::io::ReadAt;

use super::bytes::{has_signature, read_u16_le, read_u32_le, read_u64_le};
use super::encoding::decode_filename;
use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: u64 = 65535;

/// The End of Central Directory record and where it was found.
#[derive(Debug, Clone)]
pub struct LocatedEocd {
    pub record: EndOfCentralDirectory,
    /// Absolute position of the signature.
    pub position: u64,
    /// Raw comment bytes, clamped to what the file actually holds.
    pub comment: Vec<u8>,
}

/// Counters for damage tolerated while reading the central directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Entries dropped because their name was undecodable or empty.
    pub skipped_entries: u64,
    /// Entries never read because the scan hit a corrupt or truncated header.
    pub unread_entries: u64,
}

/// Everything learned from one cold read of an archive.
#[derive(Debug, Clone)]
pub struct ParsedArchive {
    pub entries: Vec<ArchiveEntry>,
    pub info: CentralDirectoryInfo,
    /// Signed skew added to every offset stored in the archive.
    pub offset_adjustment: i64,
    pub comment: String,
    pub stats: ParseStats,
}

/// Why the central directory scan stopped early.
enum ScanStop {
    BadSignature,
    Truncated,
}

/// Low-level ZIP file parser.
///
/// Generic over the reader type so the same code handles files on disk and
/// archives already held in memory.
pub struct ZipParser<R: ReadAt> {
    /// The underlying data source
    reader: Arc<R>,
    /// Total size of the archive in bytes
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Read the whole archive catalogue: locate the trailer, resolve Zip64,
    /// compute the offset adjustment and walk the central directory.
    pub fn parse(&self) -> Result<ParsedArchive> {
        let eocd = self.find_eocd()?;
        tracing::debug!(position = eocd.position, "found end of central directory");

        if eocd.record.disk_number != 0 || eocd.record.disk_with_cd != 0 {
            tracing::warn!(
                disk = eocd.record.disk_number,
                "multi-disk archives are not supported, reading this disk only"
            );
        }

        let (info, cd_end) = match self.read_zip64_eocd(&eocd)? {
            Some((eocd64, position)) => {
                tracing::debug!(position, "using Zip64 end of central directory");
                let info = CentralDirectoryInfo {
                    entry_count: eocd64.total_entries,
                    cd_offset: eocd64.cd_offset,
                    cd_size: eocd64.cd_size,
                };
                (info, position)
            }
            None => {
                let info = CentralDirectoryInfo {
                    entry_count: u64::from(eocd.record.total_entries),
                    cd_offset: u64::from(eocd.record.cd_offset),
                    cd_size: u64::from(eocd.record.cd_size),
                };
                (info, eocd.position)
            }
        };

        let offset_adjustment = offset_adjustment(&info, cd_end)?;
        if offset_adjustment != 0 {
            tracing::debug!(offset_adjustment, "archive has data before its ZIP structures");
        }

        let cd_start = adjusted_offset(info.cd_offset, offset_adjustment)?;
        let (entries, stats) = self.read_central_directory(&info, cd_start)?;

        Ok(ParsedArchive {
            entries,
            info,
            offset_adjustment,
            comment: decode_filename(&eocd.comment).unwrap_or_default(),
            stats,
        })
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// Scanning runs backward from the latest position the record could
    /// start at. A signature that happens to sit inside the comment is only
    /// taken when no candidate's comment length accounts for the trailing
    /// bytes.
    pub fn find_eocd(&self) -> Result<LocatedEocd> {
        let eocd_size = EndOfCentralDirectory::SIZE as u64;
        if self.size < eocd_size {
            return Err(Error::invalid(format!(
                "{} bytes is too small to hold an end of central directory",
                self.size
            )));
        }

        // Optimization: First try the simple case where there's no comment.
        let offset = self.size - eocd_size;
        let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
        self.read_exact(offset, &mut buf, "end of central directory")?;
        if has_signature(&buf, 0, EndOfCentralDirectory::SIGNATURE) && buf[20..22] == [0, 0] {
            return Ok(LocatedEocd {
                record: EndOfCentralDirectory::from_bytes(&buf)?,
                position: offset,
                comment: Vec::new(),
            });
        }

        let search_size = (MAX_COMMENT_SIZE + eocd_size).min(self.size);
        let search_start = self.size - search_size;

        let mut buf = vec![0u8; search_size as usize];
        self.read_exact(search_start, &mut buf, "archive trailer")?;

        // Prefer a candidate whose comment length reaches exactly to the end
        // of the file; otherwise take the latest signature, which tolerates
        // archives with a truncated or padded comment.
        let last = buf.len() - EndOfCentralDirectory::SIZE;
        let mut first_match = None;
        let mut exact_match = None;
        for i in (0..=last).rev() {
            if !has_signature(&buf, i, EndOfCentralDirectory::SIGNATURE) {
                continue;
            }
            first_match.get_or_insert(i);
            let comment_len = read_u16_le(&buf, i + 20).map(usize::from);
            if comment_len == Some(buf.len() - i - EndOfCentralDirectory::SIZE) {
                exact_match = Some(i);
                break;
            }
        }
        let Some(i) = exact_match.or(first_match) else {
            return Err(Error::invalid("no end of central directory signature"));
        };

        let record = EndOfCentralDirectory::from_bytes(&buf[i..i + EndOfCentralDirectory::SIZE])?;
        let comment_start = i + EndOfCentralDirectory::SIZE;
        let comment_end = (comment_start + usize::from(record.comment_len)).min(buf.len());

        Ok(LocatedEocd {
            comment: buf[comment_start..comment_end].to_vec(),
            record,
            position: search_start + i as u64,
        })
    }

    /// Read the ZIP64 End of Central Directory record, if the archive has one.
    ///
    /// Returns the record and the absolute position it was found at. The
    /// locator's stored offset is skewed in prefixed archives, so when no
    /// record sits there the slot directly before the locator is tried.
    ///
    /// # Errors
    ///
    /// Fails when the 32-bit trailer uses sentinel values but no usable
    /// Zip64 structures exist.
    pub fn read_zip64_eocd(&self, eocd: &LocatedEocd) -> Result<Option<(Zip64EOCD, u64)>> {
        let claims_zip64 = eocd.record.is_zip64();
        let missing = |reason: &str| {
            if claims_zip64 {
                Err(Error::invalid(format!(
                    "end of central directory uses Zip64 sentinels but {reason}"
                )))
            } else {
                Ok(None)
            }
        };

        let Some(locator_offset) = eocd.position.checked_sub(Zip64EOCDLocator::SIZE as u64)
        else {
            return missing("there is no room for a Zip64 locator");
        };

        let mut locator_buf = vec![0u8; Zip64EOCDLocator::SIZE];
        self.read_exact(locator_offset, &mut locator_buf, "Zip64 locator")?;
        let Some(locator) = Zip64EOCDLocator::from_bytes(&locator_buf) else {
            return missing("no Zip64 locator is present");
        };

        if locator.total_disks > 1 {
            tracing::warn!(
                disks = locator.total_disks,
                "multi-disk Zip64 archives are not supported, reading this disk only"
            );
        }

        let candidates = [
            Some(locator.eocd64_offset),
            locator_offset.checked_sub(Zip64EOCD::MIN_SIZE as u64),
        ];
        for position in candidates.into_iter().flatten() {
            if let Some(eocd64) = self.try_zip64_record(position) {
                return Ok(Some((eocd64, position)));
            }
        }

        tracing::warn!(
            offset = locator.eocd64_offset,
            "Zip64 locator points at no Zip64 end of central directory"
        );
        missing("the Zip64 end of central directory is missing")
    }

    fn try_zip64_record(&self, position: u64) -> Option<Zip64EOCD> {
        let end = position.checked_add(Zip64EOCD::MIN_SIZE as u64)?;
        if end > self.size {
            return None;
        }
        let mut buf = vec![0u8; Zip64EOCD::MIN_SIZE];
        self.reader.read_exact_at(position, &mut buf).ok()?;
        Zip64EOCD::from_bytes(&buf).ok()
    }

    /// Walk `info.entry_count` central directory headers starting at the
    /// already-adjusted `cd_start`.
    pub fn read_central_directory(
        &self,
        info: &CentralDirectoryInfo,
        cd_start: u64,
    ) -> Result<(Vec<ArchiveEntry>, ParseStats)> {
        let cd_end = cd_start
            .checked_add(info.cd_size)
            .filter(|&end| end <= self.size)
            .ok_or_else(|| Error::invalid("central directory extends past end of file"))?;

        // Read the entire Central Directory in one request
        let mut cd_data = vec![0u8; (cd_end - cd_start) as usize];
        self.read_exact(cd_start, &mut cd_data, "central directory")?;

        let capacity = info.entry_count.min(info.cd_size / CDFH_MIN_SIZE as u64);
        let mut entries = Vec::with_capacity(capacity as usize);
        let mut stats = ParseStats::default();
        let mut pos = 0usize;

        for index in 0..info.entry_count {
            match parse_cdfh(&cd_data, &mut pos) {
                Ok(Some(entry)) => {
                    tracing::trace!(path = %entry.path, "central directory entry");
                    entries.push(entry);
                }
                Ok(None) => stats.skipped_entries += 1,
                Err(stop) => {
                    stats.unread_entries = info.entry_count - index;
                    let reason = match stop {
                        ScanStop::BadSignature => "bad header signature",
                        ScanStop::Truncated => "truncated header",
                    };
                    tracing::warn!(
                        index,
                        unread = stats.unread_entries,
                        "central directory scan stopped: {reason}"
                    );
                    break;
                }
            }
        }

        if stats.skipped_entries > 0 {
            tracing::warn!(
                skipped = stats.skipped_entries,
                "skipped entries with unusable names"
            );
        }

        Ok((entries, stats))
    }

    /// Locate the first payload byte of `entry`.
    ///
    /// The Local File Header has its own variable-length fields that may
    /// differ from the Central Directory entry, so it has to be read.
    pub fn data_offset(&self, entry: &ArchiveEntry, offset_adjustment: i64) -> Result<u64> {
        let lfh_offset = adjusted_offset(entry.local_header_offset, offset_adjustment)?;

        let mut lfh_buf = vec![0u8; LFH_SIZE];
        self.read_exact(lfh_offset, &mut lfh_buf, "local file header")?;

        if !has_signature(&lfh_buf, 0, LFH_SIGNATURE) {
            return Err(Error::invalid(format!(
                "bad local file header signature for `{}`",
                entry.path
            )));
        }

        let file_name_length = read_u16_le(&lfh_buf, 26).unwrap_or_default();
        let extra_field_length = read_u16_le(&lfh_buf, 28).unwrap_or_default();

        // Data starts after: LFH (30 bytes) + filename + extra field
        Ok(lfh_offset
            + LFH_SIZE as u64
            + u64::from(file_name_length)
            + u64::from(extra_field_length))
    }

    /// Read exactly `len` bytes of payload starting at `offset`.
    pub fn read_payload(&self, offset: u64, len: u64) -> Result<Vec<u8>> {
        if offset.checked_add(len).is_none_or(|end| end > self.size) {
            return Err(Error::invalid("entry data extends past end of file"));
        }
        let mut buf = vec![0u8; len as usize];
        self.read_exact(offset, &mut buf, "entry data")?;
        Ok(buf)
    }

    fn read_exact(&self, offset: u64, buf: &mut [u8], what: &str) -> Result<()> {
        self.reader.read_exact_at(offset, buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                Error::invalid(format!("truncated {what}"))
            } else {
                Error::io(format!("read {what}"), e)
            }
        })
    }
}

/// Skew between where the central directory claims to end and where the
/// trailer that follows it actually is.
pub fn offset_adjustment(info: &CentralDirectoryInfo, actual_end: u64) -> Result<i64> {
    let expected_end = i128::from(info.cd_offset) + i128::from(info.cd_size);
    let adjustment = i128::from(actual_end) - expected_end;
    i64::try_from(adjustment).map_err(|_| Error::invalid("central directory offset out of range"))
}

/// Apply the offset adjustment to an offset stored in the archive.
pub fn adjusted_offset(offset: u64, adjustment: i64) -> Result<u64> {
    let adjusted = i128::from(offset) + i128::from(adjustment);
    u64::try_from(adjusted).map_err(|_| {
        Error::invalid(format!(
            "offset {offset} with adjustment {adjustment} falls outside the file"
        ))
    })
}

/// Parse one Central Directory File Header at `*pos`, advancing past it.
///
/// `Ok(None)` means the header was well formed but its name could not be
/// decoded or was empty; the entry is skipped and `*pos` still moves to the
/// next header.
fn parse_cdfh(data: &[u8], pos: &mut usize) -> std::result::Result<Option<ArchiveEntry>, ScanStop> {
    let start = *pos;
    let header = data
        .get(start..start + CDFH_MIN_SIZE)
        .ok_or(ScanStop::Truncated)?;

    if !has_signature(header, 0, CDFH_SIGNATURE) {
        return Err(ScanStop::BadSignature);
    }

    let field16 = |offset| read_u16_le(header, offset).unwrap_or_default();
    let field32 = |offset| read_u32_le(header, offset).unwrap_or_default();

    let compression_method = field16(10);
    let last_mod_time = field16(12);
    let last_mod_date = field16(14);
    let crc32 = field32(16);
    let compressed_size = field32(20);
    let uncompressed_size = field32(24);
    let file_name_length = usize::from(field16(28));
    let extra_field_length = usize::from(field16(30));
    let file_comment_length = usize::from(field16(32));
    let lfh_offset = field32(42);

    let name_start = start + CDFH_MIN_SIZE;
    let extra_start = name_start + file_name_length;
    let comment_start = extra_start + extra_field_length;
    let next = comment_start + file_comment_length;
    if next > data.len() {
        return Err(ScanStop::Truncated);
    }
    *pos = next;

    let Some(decoded) = decode_filename(&data[name_start..extra_start]) else {
        tracing::debug!(offset = start, "no encoding accepts entry name");
        return Ok(None);
    };
    // Absolute names would otherwise hide under an empty root component.
    let path = decoded.trim_start_matches('/');
    if path.is_empty() {
        tracing::debug!(offset = start, name = %decoded, "entry name is empty");
        return Ok(None);
    }
    let path = path.to_owned();

    let extra = &data[extra_start..comment_start];
    let (uncompressed_size, compressed_size, local_header_offset) =
        resolve_zip64_extra(extra, uncompressed_size, compressed_size, lfh_offset);

    let is_directory = path.ends_with('/');

    Ok(Some(ArchiveEntry {
        name: entry_name(&path).to_owned(),
        path,
        is_directory,
        compressed_size,
        uncompressed_size,
        modification_time: dos_datetime(last_mod_date, last_mod_time),
        crc32,
        compression_method: CompressionMethod::from_u16(compression_method),
        local_header_offset,
    }))
}

/// Replace sentinel 32-bit fields with their Zip64 extra field values.
///
/// The Zip64 record holds only the fields whose header value was the
/// sentinel, always in the order uncompressed size, compressed size,
/// local header offset.
fn resolve_zip64_extra(
    extra: &[u8],
    uncompressed_size: u32,
    compressed_size: u32,
    lfh_offset: u32,
) -> (u64, u64, u64) {
    let mut values = [
        (uncompressed_size == SENTINEL_U32, u64::from(uncompressed_size)),
        (compressed_size == SENTINEL_U32, u64::from(compressed_size)),
        (lfh_offset == SENTINEL_U32, u64::from(lfh_offset)),
    ];

    if values.iter().any(|(sentinel, _)| *sentinel) {
        let mut pos = 0usize;
        while let (Some(header_id), Some(field_size)) =
            (read_u16_le(extra, pos), read_u16_le(extra, pos + 2))
        {
            let body_start = pos + 4;
            let body_end = (body_start + usize::from(field_size)).min(extra.len());

            if header_id == ZIP64_EXTRA_ID {
                let body = &extra[body_start..body_end];
                let mut cursor = 0usize;
                for (sentinel, value) in values.iter_mut() {
                    if !*sentinel {
                        continue;
                    }
                    match read_u64_le(body, cursor) {
                        Some(wide) => {
                            *value = wide;
                            cursor += 8;
                        }
                        None => break,
                    }
                }
                break;
            }

            pos = body_end;
        }
    }

    (values[0].1, values[1].1, values[2].1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eocd_bytes(entries: u16, cd_size: u32, cd_offset: u32, comment: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&EndOfCentralDirectory::SIGNATURE.to_le_bytes());
        buf.extend_from_slice(&[0, 0, 0, 0]);
        buf.extend_from_slice(&entries.to_le_bytes());
        buf.extend_from_slice(&entries.to_le_bytes());
        buf.extend_from_slice(&cd_size.to_le_bytes());
        buf.extend_from_slice(&cd_offset.to_le_bytes());
        buf.extend_from_slice(&(comment.len() as u16).to_le_bytes());
        buf.extend_from_slice(comment);
        buf
    }

    fn parser(data: Vec<u8>) -> ZipParser<Vec<u8>> {
        ZipParser::new(Arc::new(data))
    }

    #[test]
    fn empty_archive_parses() {
        let parsed = parser(eocd_bytes(0, 0, 0, b"")).parse().unwrap();
        assert!(parsed.entries.is_empty());
        assert_eq!(parsed.offset_adjustment, 0);
    }

    #[test]
    fn ten_bytes_is_invalid() {
        let err = parser(vec![0u8; 10]).parse().unwrap_err();
        assert!(matches!(err, Error::InvalidArchive(_)));
    }

    #[test]
    fn missing_signature_is_invalid() {
        let err = parser(vec![0u8; 256]).find_eocd().unwrap_err();
        assert!(matches!(err, Error::InvalidArchive(_)));
    }

    #[test]
    fn comment_containing_signature_does_not_shadow_trailer() {
        let mut fake = EndOfCentralDirectory::SIGNATURE.to_le_bytes().to_vec();
        fake.extend_from_slice(&[0u8; 30]);
        let data = eocd_bytes(0, 0, 0, &fake);
        let eocd = parser(data).find_eocd().unwrap();
        assert_eq!(eocd.position, 0);
        assert_eq!(eocd.comment, fake);
    }

    #[test]
    fn truncated_comment_still_finds_trailer() {
        let mut data = eocd_bytes(0, 0, 0, b"a fairly long comment");
        data.truncate(data.len() - 5);
        let eocd = parser(data).find_eocd().unwrap();
        assert_eq!(eocd.position, 0);
        assert_eq!(eocd.comment, b"a fairly long co");
    }

    #[test]
    fn sentinel_without_zip64_is_invalid() {
        let data = eocd_bytes(0xFFFF, 0, 0, b"");
        let err = parser(data).parse().unwrap_err();
        assert!(matches!(err, Error::InvalidArchive(ref m) if m.contains("Zip64")));
    }

    #[test]
    fn prefix_shifts_offset_adjustment() {
        let mut data = vec![0xAAu8; 100];
        data.extend(eocd_bytes(0, 0, 0, b""));
        let parsed = parser(data).parse().unwrap();
        assert_eq!(parsed.offset_adjustment, 100);
    }

    #[test]
    fn negative_adjusted_offset_is_invalid() {
        // Claims a 64-byte directory ending right where the trailer starts,
        // but there are no bytes before the trailer.
        let data = eocd_bytes(1, 64, 0, b"");
        let err = parser(data).parse().unwrap_err();
        assert!(matches!(err, Error::InvalidArchive(_)));
    }

    #[test]
    fn adjusted_offset_bounds() {
        assert_eq!(adjusted_offset(10, 5).unwrap(), 15);
        assert_eq!(adjusted_offset(10, -10).unwrap(), 0);
        assert!(adjusted_offset(10, -11).is_err());
    }

    #[test]
    fn zip64_extra_only_holds_sentinel_fields() {
        // Only the compressed size and offset are sentinels.
        let mut extra = Vec::new();
        extra.extend_from_slice(&0x5455u16.to_le_bytes());
        extra.extend_from_slice(&5u16.to_le_bytes());
        extra.extend_from_slice(&[1, 2, 3, 4, 5]);
        extra.extend_from_slice(&ZIP64_EXTRA_ID.to_le_bytes());
        extra.extend_from_slice(&16u16.to_le_bytes());
        extra.extend_from_slice(&0x1_0000_0000u64.to_le_bytes());
        extra.extend_from_slice(&0x2_0000_0000u64.to_le_bytes());

        let (uncompressed, compressed, offset) =
            resolve_zip64_extra(&extra, 1234, SENTINEL_U32, SENTINEL_U32);
        assert_eq!(uncompressed, 1234);
        assert_eq!(compressed, 0x1_0000_0000);
        assert_eq!(offset, 0x2_0000_0000);
    }

    #[test]
    fn no_sentinels_ignores_extra_field() {
        let mut extra = Vec::new();
        extra.extend_from_slice(&ZIP64_EXTRA_ID.to_le_bytes());
        extra.extend_from_slice(&8u16.to_le_bytes());
        extra.extend_from_slice(&99u64.to_le_bytes());
        assert_eq!(resolve_zip64_extra(&extra, 1, 2, 3), (1, 2, 3));
    }
}
