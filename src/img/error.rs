use std::error;
use std::fmt;
use std::io;

/// Errors that can be returned from image operations.  These are generally
/// converted into `io::Error`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImgError {
    /// Unknown error
    Unknown,
    /// The image has been closed
    Closed,
    /// The image ends before the end of the requested block
    ShortRead,
    /// Block data is not exactly one block long
    InvalidBlockLength,
    /// Logical block number lies outside the block table
    InvalidLogicalBlock,
    /// Logical block has no physical block assigned
    UnmappedBlock,
    /// Type tag is not three ASCII characters
    InvalidTag,
    /// Offset out of bounds
    InvalidOffset,
    /// Invalid image header
    InvalidHeader,
    /// No directory entry carries the requested type tag
    EntryNotFound,
}

impl error::Error for ImgError {}

impl fmt::Display for ImgError {
    /// Provide human-readable descriptions of the errors
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", &self.message())
    }
}

impl From<ImgError> for io::Error {
    fn from(error: ImgError) -> io::Error {
        use self::ImgError::*;
        use std::io::ErrorKind::*;
        match error {
            Unknown => io::Error::new(Other, error),
            Closed => io::Error::new(Other, error),
            ShortRead => io::Error::new(UnexpectedEof, error),
            InvalidBlockLength => io::Error::new(InvalidInput, error),
            InvalidLogicalBlock => io::Error::new(InvalidInput, error),
            UnmappedBlock => io::Error::new(InvalidInput, error),
            InvalidTag => io::Error::new(InvalidInput, error),
            InvalidOffset => io::Error::new(InvalidInput, error),
            InvalidHeader => io::Error::new(InvalidData, error),
            EntryNotFound => io::Error::new(NotFound, error),
        }
    }
}

impl From<io::Error> for ImgError {
    fn from(error: io::Error) -> ImgError {
        ImgError::from_io_error(&error).unwrap_or(ImgError::Unknown)
    }
}

impl ImgError {
    /// If the provided `io::Error` contains an `ImgError`, return the
    /// underlying `ImgError`.  If not, return None.
    pub fn from_io_error(error: &io::Error) -> Option<ImgError> {
        error
            .get_ref()
            .and_then(|e| e.downcast_ref::<ImgError>())
            .cloned()
    }

    /// Useful instead of .into() when the compiler doesn't have enough
    /// information to perform type inference.
    pub fn to_io_error(&self) -> io::Error {
        self.clone().into()
    }

    /// Precondition violations: the caller asked for something the format
    /// cannot express.  These are never retried or masked.
    pub fn is_invalid_argument(&self) -> bool {
        use self::ImgError::*;
        matches!(
            *self,
            InvalidBlockLength | InvalidLogicalBlock | UnmappedBlock | InvalidTag | InvalidOffset
        )
    }

    fn message(&self) -> &str {
        use self::ImgError::*;
        match *self {
            Unknown => "unknown error",
            Closed => "image has been closed",
            ShortRead => "short read: image ends inside the requested block",
            InvalidBlockLength => "block data is not exactly one block long",
            InvalidLogicalBlock => "logical block number outside the block table",
            UnmappedBlock => "logical block is not mapped to a physical block",
            InvalidTag => "type tag must be three ASCII characters",
            InvalidOffset => "offset out of bounds",
            InvalidHeader => "invalid image header",
            EntryNotFound => "no directory entry with the requested type tag",
        }
    }
}

impl PartialEq<io::Error> for ImgError {
    fn eq(&self, other: &io::Error) -> bool {
        match ImgError::from_io_error(other) {
            Some(ref e) if e == self => true,
            _ => false,
        }
    }
}

impl PartialEq<ImgError> for io::Error {
    fn eq(&self, other: &ImgError) -> bool {
        match ImgError::from_io_error(self) {
            Some(ref e) if e == other => true,
            _ => false,
        }
    }
}
