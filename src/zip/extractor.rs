use flate2::read::DeflateDecoder;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::io::ReadAt;

use super::parser::ZipParser;
use super::structures::{ArchiveEntry, CompressionMethod};

/// Upper bound on up-front allocation for inflated data; the declared size
/// is untrusted.
const MAX_PREALLOC: u64 = 64 * 1024 * 1024;

/// ZIP file extractor
pub struct ZipExtractor<R: ReadAt> {
    parser: ZipParser<R>,
    verify_crc: bool,
}

impl<R: ReadAt> ZipExtractor<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self {
            parser: ZipParser::new(reader),
            verify_crc: true,
        }
    }

    /// Skip the CRC-32 comparison after decoding.
    pub fn verify_crc(mut self, verify: bool) -> Self {
        self.verify_crc = verify;
        self
    }

    /// Extract file data to memory
    pub fn extract_to_memory(&self, entry: &ArchiveEntry, offset_adjustment: i64) -> Result<Vec<u8>> {
        if entry.is_directory {
            return Err(Error::CannotExtractDirectory(entry.path.clone()));
        }
        if let CompressionMethod::Unknown(method) = entry.compression_method {
            return Err(Error::UnsupportedCompression(method));
        }

        let data_offset = self.parser.data_offset(entry, offset_adjustment)?;
        let payload = self.parser.read_payload(data_offset, entry.compressed_size)?;

        let data = match entry.compression_method {
            CompressionMethod::Stored => payload,
            CompressionMethod::Deflate => inflate(&payload, entry.uncompressed_size)?,
            CompressionMethod::Unknown(method) => return Err(Error::UnsupportedCompression(method)),
        };

        if self.verify_crc {
            let crc = crc32fast::hash(&data);
            if crc != entry.crc32 {
                return Err(Error::ExtractionFailed(format!(
                    "CRC-32 mismatch for `{}`: expected {:08x}, got {crc:08x}",
                    entry.path, entry.crc32
                )));
            }
        }

        Ok(data)
    }

    /// Extract file to disk.
    ///
    /// The data is written to a temporary file beside `output_path` and
    /// renamed into place, so readers never see a partial file under the
    /// final name.
    pub fn extract_to_file(
        &self,
        entry: &ArchiveEntry,
        offset_adjustment: i64,
        output_path: &Path,
    ) -> Result<()> {
        let data = self.extract_to_memory(entry, offset_adjustment)?;
        write_atomically(output_path, &data)
    }
}

/// Raw deflate (no zlib or gzip framing), bounded to the declared size.
fn inflate(compressed: &[u8], uncompressed_size: u64) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(uncompressed_size.min(MAX_PREALLOC) as usize);
    DeflateDecoder::new(compressed)
        .take(uncompressed_size.saturating_add(1))
        .read_to_end(&mut out)
        .map_err(|e| Error::ExtractionFailed(format!("inflate failed: {e}")))?;

    if out.len() as u64 != uncompressed_size {
        return Err(Error::ExtractionFailed(format!(
            "inflated {} bytes, expected {uncompressed_size}",
            out.len()
        )));
    }
    Ok(out)
}

fn write_atomically(output_path: &Path, data: &[u8]) -> Result<()> {
    let parent = match output_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)
        .map_err(|e| Error::io(format!("create directory `{}`", parent.display()), e))?;

    let mut temp = tempfile::Builder::new()
        .prefix(".partial-")
        .tempfile_in(parent)
        .map_err(|e| Error::io(format!("create temporary file in `{}`", parent.display()), e))?;
    temp.write_all(data)
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|e| Error::io(format!("write `{}`", temp.path().display()), e))?;

    match temp.persist(output_path) {
        Ok(_) => Ok(()),
        // Another thread won the race with identical content.
        Err(_) if output_path.exists() => Ok(()),
        Err(e) => Err(Error::io(
            format!("move extracted file to `{}`", output_path.display()),
            e.error,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::DeflateEncoder;

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn inflate_checks_declared_size() {
        let data = b"hello hello hello hello".repeat(10);
        let compressed = deflate(&data);
        assert_eq!(inflate(&compressed, data.len() as u64).unwrap(), data);

        let err = inflate(&compressed, 5).unwrap_err();
        assert!(matches!(err, Error::ExtractionFailed(_)));
        let err = inflate(&compressed, data.len() as u64 + 1).unwrap_err();
        assert!(matches!(err, Error::ExtractionFailed(_)));
    }

    #[test]
    fn garbage_fails_to_inflate() {
        let err = inflate(&[0xFF; 16], 100).unwrap_err();
        assert!(matches!(err, Error::ExtractionFailed(_)));
    }

    #[test]
    fn atomic_write_leaves_only_final_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("out.bin");
        write_atomically(&target, b"payload").unwrap();
        write_atomically(&target, b"payload").unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"payload");
        let names: Vec<_> = fs::read_dir(target.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("out.bin")]);
    }
}
