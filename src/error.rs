use embedded_io_async::ErrorKind;

/// Error codes shared by the pools, the buffer lists and the UBX codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A handle, length or buffer argument was not acceptable.
    InvalidParameter,
    /// The pool is exhausted, or the reserved storage is too small.
    NoMemory,
    /// No UBX frame was in progress when the input ran out.
    NotFound,
    /// The input ended in the middle of a UBX frame.
    Timeout,
    /// The packet did not fit the destination and was flushed.
    TemporaryFailure,
    NotSupported,
    NotImplemented,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::InvalidParameter => f.write_str("invalid parameter"),
            Error::NoMemory => f.write_str("no memory"),
            Error::NotFound => f.write_str("not found"),
            Error::Timeout => f.write_str("timeout"),
            Error::TemporaryFailure => f.write_str("temporary failure"),
            Error::NotSupported => f.write_str("not supported"),
            Error::NotImplemented => f.write_str("not implemented"),
        }
    }
}

impl embedded_io_async::Error for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidParameter => ErrorKind::InvalidInput,
            Error::NoMemory => ErrorKind::OutOfMemory,
            Error::NotFound => ErrorKind::NotFound,
            Error::Timeout => ErrorKind::TimedOut,
            Error::NotSupported | Error::NotImplemented => ErrorKind::Unsupported,
            Error::TemporaryFailure => ErrorKind::Other,
        }
    }
}

pub type Result<T> = core::result::Result<T, Error>;
