use std::io::Error as IoError;

use err_derive::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(display = "{}", cause)]
    Mpq { cause: mpqkit::Error },
    #[error(display = "IO Error: {}", cause)]
    Io { cause: IoError },
    #[error(display = "Could not walk directory: {}", cause)]
    Walk { cause: walkdir::Error },
    #[error(display = "File already exists: {}", path)]
    OutputExists { path: String },
    #[error(
        display = "Unknown locale: {}, expected a 4-digit hex id or one of: {}",
        locale,
        known
    )]
    UnknownLocale { locale: String, known: String },
    #[error(display = "Not a number: {}", value)]
    InvalidNumber { value: String },
    #[error(display = "{}", message)]
    Usage { message: String },
}

impl From<mpqkit::Error> for CliError {
    fn from(other: mpqkit::Error) -> Self {
        CliError::Mpq { cause: other }
    }
}

impl From<IoError> for CliError {
    fn from(other: IoError) -> Self {
        CliError::Io { cause: other }
    }
}

impl From<walkdir::Error> for CliError {
    fn from(other: walkdir::Error) -> Self {
        CliError::Walk { cause: other }
    }
}
