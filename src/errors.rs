/// Error types shared across the storage core.
use std::fmt;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    /// Structural / bounds violation: corrupt file length, out-of-range
    /// page number, sentinel child access. Always fatal.
    Storage(String),
    /// Insert rejected because the key is already present.
    Duplicate(u32),
    /// Malformed input at the command-parsing boundary.
    Usage(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Storage(msg) => write!(f, "Storage error: {}", msg),
            Error::Duplicate(id) => write!(f, "Duplicate key: row with id {} already exists", id),
            Error::Usage(msg) => write!(f, "Usage error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl Error {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Storage(_))
    }
}

#[macro_export]
macro_rules! err {
    ($variant:ident, $($arg:tt)*) => {
        $crate::errors::Error::$variant(format!($($arg)*))
    };
}
