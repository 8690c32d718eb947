use thiserror::Error;

/**
    Errors that may occur when reading or writing the
    archive appended to a standalone executable.
*/
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("footer points at offset {offset}, but the payload area is only {len} bytes")]
    InvalidFooter { offset: u64, len: u64 },
    #[error("archive is truncated")]
    Truncated,
    #[error("archive header is malformed: {0}")]
    Header(#[from] serde_json::Error),
    #[error("archive payload is {actual} bytes, header expected {expected}")]
    PayloadLength { expected: u64, actual: u64 },
    #[error("archive payload is {len} bytes, at most {max} bytes can be compressed")]
    TooLargeToCompress { len: u64, max: u64 },
    #[error("failed to decompress archive payload: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),
    #[error("archive entry '{0}' is not a valid relative path")]
    InvalidPath(String),
    #[error("archive contains more than one entry at '{0}'")]
    DuplicatePath(String),
    #[error("archive entry '{0}' points outside of the payload")]
    EntryOutOfBounds(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PayloadResult<T, E = PayloadError> = std::result::Result<T, E>;
