use std::fmt;
use std::io;
use std::str::Utf8Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug)]
pub enum Error {
    /// Occurs when a header read begins with the underlying stream already fully exhausted. This
    /// is the expected terminal condition when iterating over all records in a stream, and is the
    /// only error that doesn't poison the stream position.
    EndOfStream,
    /// Occurs when the magic bytes are absent, truncated, or mismatched, or the stream errored
    /// while they were being read.
    MalformedHeader,
    /// Occurs when a record's declared attribute count is zero. The packager may legally write
    /// such a record, but the decoder rejects it.
    InvalidAttributes,
    /// Occurs when a declared string length is zero.
    InvalidString,
    /// Occurs when decoded string bytes fail UTF-8 validation.
    InvalidEncoding(Utf8Error),
    /// Occurs when a record declares a negative payload length.
    NegativeLength(i64),
    /// Occurs when the stream yields fewer bytes than a length field declared, at any point: the
    /// length field itself, a string body, or the payload body.
    ShortRead {
        step: &'static str,
        expected: u64,
        actual: u64,
    },
    /// Occurs when a new header parse is requested while the previous record's payload has not
    /// been drained.
    PayloadPending { bytes_owed: u64 },
    /// Occurs when a payload drain is requested but no parsed record is pending one.
    NoPayloadPending,
    /// Underlying stream failure while reading or writing.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::EndOfStream => f.write_str("end of stream"),
            Error::MalformedHeader => f.write_str("not in FlowFile-v3 format"),
            Error::InvalidAttributes => f.write_str("flow files cannot have zero attributes"),
            Error::InvalidString => f.write_str("string length cannot be zero"),
            Error::InvalidEncoding(ref err) => write!(f, "invalid UTF-8 bytes: {}", err),
            Error::NegativeLength(len) => {
                write!(f, "payload length cannot be negative, was {}", len)
            }
            Error::ShortRead {
                step,
                expected,
                actual,
            } => write!(
                f,
                "expected {} bytes but got {} on step [{}]",
                expected, actual, step
            ),
            Error::PayloadPending { bytes_owed } => write!(
                f,
                "previous record still has {} undrained payload bytes",
                bytes_owed
            ),
            Error::NoPayloadPending => f.write_str("no parsed record is awaiting a payload drain"),
            Error::Io(ref err) => write!(f, "stream I/O failure: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            Error::InvalidEncoding(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
