use std::fmt;
use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    DeviceNotFound(String),
    Discovery(discovery::Error),
    Http(http11::Error),
    Cast(castlink::Error),
    Encoder(io::Error),
    BindFailed,
    AppleTvRejected(u16),
    StreamingUnsupported(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DeviceNotFound(name) => write!(f, "no receiver named {:?} on the network", name),
            Error::Discovery(err) => write!(f, "discovery error: {}", err),
            Error::Http(err) => write!(f, "http error: {}", err),
            Error::Cast(err) => write!(f, "cast error: {}", err),
            Error::Encoder(err) => write!(f, "encoder subprocess error: {}", err),
            Error::BindFailed => write!(f, "could not bind a local HTTP server after retrying"),
            Error::AppleTvRejected(code) => write!(f, "AppleTV rejected the play request with status {}", code),
            Error::StreamingUnsupported(name) => write!(f, "{} does not advertise HTTP live streaming support", name),
        }
    }
}

impl std::error::Error for Error {}

impl From<discovery::Error> for Error {
    fn from(err: discovery::Error) -> Self {
        Error::Discovery(err)
    }
}

impl From<http11::Error> for Error {
    fn from(err: http11::Error) -> Self {
        Error::Http(err)
    }
}

impl From<castlink::Error> for Error {
    fn from(err: castlink::Error) -> Self {
        Error::Cast(err)
    }
}
