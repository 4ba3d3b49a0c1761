use std::fmt;
use std::io;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the Castlink engine. `Envelope` errors are protocol
/// violations on a single frame (the frame is dropped, the connection
/// stays up); `Io`/`Tls` are connection-fatal; `Timeout` means a
/// `put_and_wait` deadline elapsed without a matching response.
#[derive(Debug)]
pub enum Error {
    Envelope(String),
    Io(io::Error),
    Tls(native_tls::Error),
    Timeout,
    NotConnected,
    /// A launched app reported no `transportId`, so it cannot be driven
    /// over the cast control channel.
    NotCastApiCapable(String),
    /// The plain-HTTP companion endpoint on port 8008 failed.
    Dial(http11::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Envelope(msg) => write!(f, "malformed cast envelope: {}", msg),
            Error::Io(err) => write!(f, "i/o error: {}", err),
            Error::Tls(err) => write!(f, "tls error: {}", err),
            Error::Timeout => write!(f, "request timed out"),
            Error::NotConnected => write!(f, "client is not connected"),
            Error::NotCastApiCapable(app_id) => write!(f, "app {} is not cast-API-capable (no transportId)", app_id),
            Error::Dial(err) => write!(f, "dial endpoint error: {}", err),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<http11::Error> for Error {
    fn from(err: http11::Error) -> Self {
        Error::Dial(err)
    }
}

impl From<native_tls::Error> for Error {
    fn from(err: native_tls::Error) -> Self {
        Error::Tls(err)
    }
}

impl From<native_tls::HandshakeError<std::net::TcpStream>> for Error {
    fn from(err: native_tls::HandshakeError<std::net::TcpStream>) -> Self {
        match err {
            native_tls::HandshakeError::Failure(e) => Error::Tls(e),
            native_tls::HandshakeError::WouldBlock(_) => {
                Error::Io(io::Error::new(io::ErrorKind::WouldBlock, "tls handshake in progress"))
            }
        }
    }
}
