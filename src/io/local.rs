use super::ReadAt;
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// Local file reader with random access support.
///
/// Each reader owns its own handle, so readers opened on the same archive
/// from different threads never share a seek position.
pub struct LocalFileReader {
    file: std::fs::File,
    size: u64,
    modified: SystemTime,
}

impl LocalFileReader {
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = std::fs::File::open(path)?;
        let metadata = file.metadata()?;
        Ok(Self {
            size: metadata.len(),
            modified: metadata.modified()?,
            file,
        })
    }

    /// Modification time observed when the handle was opened.
    pub fn modified(&self) -> SystemTime {
        self.modified
    }
}

impl ReadAt for LocalFileReader {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            self.file.read_at(buf, offset)
        }

        #[cfg(windows)]
        {
            use std::os::windows::fs::FileExt;
            self.file.seek_read(buf, offset)
        }

        #[cfg(not(any(unix, windows)))]
        {
            use std::io::{Read, Seek, SeekFrom};
            let mut file = &self.file;
            file.seek(SeekFrom::Start(offset))?;
            file.read(buf)
        }
    }

    fn size(&self) -> u64 {
        self.size
    }
}
