pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the archive core can report.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or malformed structures, bad signatures, offsets that point
    /// outside the file, or a requested entry that does not exist.
    #[error("Invalid archive: {0}")]
    InvalidArchive(String),

    #[error("Cannot extract directory entry `{0}`")]
    CannotExtractDirectory(String),

    #[error("Unsupported compression method: {0}")]
    UnsupportedCompression(u16),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    /// The host filesystem failed, not the archive.
    #[error("Cannot {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Error::InvalidArchive(reason.into())
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }
}
