//! A blocking, thread-based client for the Chromecast-style Castv2 control
//! channel: connect over TLS, launch a receiver app, and drive media
//! playback on it.

mod client;
mod dial;
mod envelope;
mod error;
mod session;
mod transport;

pub use client::{ChromecastClient, DEFAULT_APP_ID};
pub use dial::{DeviceDescriptor, DialClient, DIAL_PORT};
pub use envelope::{Envelope, CONNECTION_NS, HEARTBEAT_NS, MEDIA_NS, RECEIVER_NS};
pub use error::{Error, Result};
pub use session::Session;
