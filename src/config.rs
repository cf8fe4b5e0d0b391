use std::path::PathBuf;

/// Settings for an [`ArchiveBrowser`](crate::ArchiveBrowser).
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Where extracted entries are materialized. `None` creates a private
    /// temporary directory that is removed when the browser is dropped.
    pub extract_dir: Option<PathBuf>,
    /// Compare each extracted payload against its recorded CRC-32.
    pub verify_crc: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            extract_dir: None,
            verify_crc: true,
        }
    }
}
