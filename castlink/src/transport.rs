//! The I/O worker: owns the socket, frames inbound bytes, and drains the
//! outbound queue. Runs on its own thread so request/response correlation
//! and heartbeat handling can stay purely in-process (see [`crate::client`]).

use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

use byteorder::{BigEndian, ByteOrder};
use native_tls::TlsConnector;

use crate::envelope::Envelope;
use crate::error::Result;

const READ_POLL: Duration = Duration::from_millis(500);
const READ_CHUNK: usize = 2048;

/// Anything the I/O worker can read frames from and write frames to. A
/// TLS-wrapped TCP socket in production, a scripted in-memory stub in
/// tests.
pub trait Transport: Read + Write + Send {}
impl<T: Read + Write + Send> Transport for T {}

/// Connect to a Chromecast-style receiver over TLS. The device's
/// certificate is self-signed and not tied to any CA, so verification is
/// disabled, matching the un-authenticated pairing model this channel
/// actually uses.
pub fn connect(host: &str, port: u16, connect_timeout: Duration) -> Result<Box<dyn Transport>> {
    use std::net::ToSocketAddrs;
    let addr = (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| crate::error::Error::NotConnected)?;
    let tcp = TcpStream::connect_timeout(&addr, connect_timeout)?;
    tcp.set_read_timeout(Some(READ_POLL))?;

    let connector = TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()?;
    let stream = connector.connect(host, tcp)?;
    Ok(Box::new(stream))
}

/// Run the I/O loop until `running` is cleared. Reads available bytes,
/// extracts complete length-prefixed frames and forwards decoded
/// envelopes to `inbound`, and writes whatever pre-encoded frames are
/// waiting on `outbound`.
pub fn run(mut transport: Box<dyn Transport>, inbound: Sender<Envelope>, outbound: Receiver<Vec<u8>>, running: Arc<AtomicBool>) {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];

    while running.load(Ordering::SeqCst) {
        match transport.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
            Err(ref err) if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut => {}
            Err(_) => break,
        }

        while buffer.len() >= 4 {
            let frame_len = BigEndian::read_u32(&buffer[..4]) as usize;
            if buffer.len() < 4 + frame_len {
                break;
            }
            match Envelope::decode(&buffer[4..4 + frame_len]) {
                Ok(envelope) => {
                    if inbound.send(envelope).is_err() {
                        return;
                    }
                }
                Err(err) => log::debug!("dropping malformed cast frame: {}", err),
            }
            buffer.drain(..4 + frame_len);
        }

        while let Ok(frame) = outbound.try_recv() {
            if transport.write_all(&frame).is_err() {
                return;
            }
        }
    }
}
