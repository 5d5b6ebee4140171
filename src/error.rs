use std::io::Error as IoError;

use err_derive::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(display = "No header found")]
    NoHeader,
    #[error(display = "IO Error: {}", cause)]
    IoError { cause: IoError },
    #[error(display = "Unsupported MPQ format version: {}", version)]
    UnsupportedVersion { version: u16 },
    #[error(display = "Corrupted archive")]
    Corrupted,
    #[error(display = "File not found")]
    FileNotFound,
    #[error(display = "Compression type unsupported: {}", kind)]
    UnsupportedCompression { kind: String },
    #[error(display = "Invalid sector size: {}", size)]
    InvalidSectorSize { size: u32 },
    #[error(
        display = "Invalid capacity {}: must be a power of two holding {} files",
        requested,
        required
    )]
    InvalidCapacity { requested: u32, required: u32 },
    #[error(display = "Hash table full: {} files do not fit into {} slots", required, capacity)]
    HashTableFull { capacity: u32, required: u32 },
    #[error(display = "Ruleset does not end with a default rule")]
    MissingDefaultRule,
    #[error(display = "{} archive entries have no known file name", count)]
    UnnamedEntries { count: usize },
    #[error(display = "Cannot decrypt a file without knowing its name")]
    MissingFileKey,
    #[error(display = "Signature error: {}", cause)]
    Signature { cause: rsa::Error },
}

impl From<IoError> for Error {
    fn from(other: IoError) -> Self {
        Error::IoError { cause: other }
    }
}

impl From<rsa::Error> for Error {
    fn from(other: rsa::Error) -> Self {
        Error::Signature { cause: other }
    }
}
