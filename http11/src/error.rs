use std::fmt;
use std::io;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the HTTP engine. Malformed input is a protocol
/// violation (the offending header line or frame is rejected); the rest
/// are connection-fatal.
#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Malformed(String),
    Timeout,
    ConnectionClosed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "i/o error: {}", err),
            Error::Malformed(msg) => write!(f, "malformed HTTP data: {}", msg),
            Error::Timeout => write!(f, "operation timed out"),
            Error::ConnectionClosed => write!(f, "connection closed"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Error::Timeout,
            _ => Error::Io(err),
        }
    }
}
