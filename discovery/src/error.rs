use std::fmt;
use std::io;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the discovery engine.
///
/// Per the error-kind table, `Packet` errors are protocol violations (the
/// offending datagram is dropped, never propagated to `find_devices`
/// callers) while `NoInterface` and `Socket` are fatal: they abort discovery
/// outright.
#[derive(Debug)]
pub enum Error {
    /// A datagram could not be decoded as a well-formed DNS message.
    Packet(String),
    /// No local IPv4 egress interface could be determined.
    NoInterface,
    /// The multicast socket could not be created or configured.
    Socket(io::Error),
    /// The discovery deadline elapsed without finding any device.
    Timeout,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Packet(msg) => write!(f, "malformed mDNS packet: {}", msg),
            Error::NoInterface => write!(f, "unable to find local egress interface"),
            Error::Socket(err) => write!(f, "unable to create mDNS socket: {}", err),
            Error::Timeout => write!(f, "discovery deadline reached with no devices"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Socket(err)
    }
}
