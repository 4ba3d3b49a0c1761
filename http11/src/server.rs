//! A small multithreaded, keep-alive HTTP/1.1 server: one accept worker
//! plus one worker per accepted connection. Connection workers never share
//! state except through the request/response objects they own and the
//! immutable handler callback.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::request::Request;
use crate::response::Response;

const ACCEPT_POLL: Duration = Duration::from_millis(500);
const CONNECTION_POLL: Duration = Duration::from_millis(500);
const READ_CHUNK: usize = 2048;

/// A request handler. Given a fully-read request, produce the response to
/// send back. Invoked from whichever connection worker read the request;
/// implementations must be safe to call concurrently from many threads.
pub type Handler = Arc<dyn Fn(&Request) -> Response + Send + Sync>;

pub struct HttpServer {
    host: String,
    port: u16,
    handler: Handler,
    running: Arc<AtomicBool>,
    accept_thread: Option<JoinHandle<()>>,
}

impl HttpServer {
    pub fn new(host: impl Into<String>, port: u16, handler: Handler) -> Self {
        HttpServer {
            host: host.into(),
            port,
            handler,
            running: Arc::new(AtomicBool::new(false)),
            accept_thread: None,
        }
    }

    /// Bind the listening socket and spawn the accept worker.
    pub fn start(&mut self) -> Result<()> {
        let listener = TcpListener::bind((self.host.as_str(), self.port))
            .map_err(|_| Error::Malformed(format!("unable to bind {}:{}", self.host, self.port)))?;
        listener.set_nonblocking(true)?;

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let handler = Arc::clone(&self.handler);
        self.accept_thread = Some(thread::spawn(move || accept_loop(listener, running, handler)));
        Ok(())
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.accept_thread.take() {
            let _ = handle.join();
        }
    }
}

fn accept_loop(listener: TcpListener, running: Arc<AtomicBool>, handler: Handler) {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _addr)) => {
                let running = Arc::clone(&running);
                let handler = Arc::clone(&handler);
                thread::spawn(move || connection_loop(stream, running, handler));
            }
            Err(ref err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL);
            }
            Err(_) => break,
        }
    }
}

fn connection_loop(stream: TcpStream, running: Arc<AtomicBool>, handler: Handler) {
    let _ = stream.set_read_timeout(Some(CONNECTION_POLL));
    let mut stream = stream;
    let mut inbound = Vec::new();
    let mut request: Option<Request> = None;
    let mut pending: Vec<Response> = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];

    'conn: while running.load(Ordering::SeqCst) {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                inbound.extend_from_slice(&chunk[..n]);
                if request.is_none() {
                    request = Some(Request::default());
                }
                let req = request.as_mut().unwrap();
                let consumed = req.read_content(&inbound);
                inbound.drain(..consumed);

                if req.is_complete() {
                    let mut resp = handler(req);
                    resp.complete();
                    pending.push(resp);
                    request = None;
                }
            }
            Err(ref err)
                if err.kind() == std::io::ErrorKind::WouldBlock
                    || err.kind() == std::io::ErrorKind::TimedOut => {}
            Err(_) => break,
        }

        while let Some(resp) = pending.first_mut() {
            let data = resp.next_output();
            if data.is_empty() && !resp.send_complete() {
                break;
            }
            if !data.is_empty() && stream.write_all(&data).is_err() {
                break 'conn;
            }
            if resp.send_complete() {
                let close = resp.close_connection();
                pending.remove(0);
                if close {
                    break 'conn;
                }
            } else {
                break;
            }
        }
    }
}
