use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// unrecognized format name passed to `format` or `generate`
    #[error("invalid UUID format {0}")]
    InvalidFormat(String),
    /// state file could not be read or written
    #[error("state file I/O error: {0}")]
    Io(#[from] io::Error),
    /// state file exists but does not hold a valid record
    #[error("corrupt state record")]
    CorruptRecord,
}
