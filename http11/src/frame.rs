//! Shared machinery between [`crate::request::Request`] and
//! [`crate::response::Response`]: header/body framing, completion
//! tracking, and the packetized `next_output()` send path.

use crate::content::{Body, BodySender};
use crate::headers::Headers;
use crate::range::{self, Range};

#[derive(Debug, Default)]
pub struct Frame {
    pub header: Headers,
    pub body: Body,
    body_reader: crate::content::BodyReader,
    body_materialized: bool,
    sender: Option<BodySender>,
    pub ranges: Vec<Range>,
    pub close_connection: bool,
    pub headers_sent: bool,
    pub headers_only: bool,
}

impl Frame {
    pub fn new() -> Self {
        Frame::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.header.get(key)
    }

    pub fn add_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.header.add_header(key, value);
    }

    pub fn add_headers(&mut self, headers: impl IntoIterator<Item = (String, String)>) {
        self.header.add_headers(headers);
    }

    /// Feed bytes from the wire in. Returns the number of bytes consumed.
    /// Once the header block finishes, body framing (chunked vs.
    /// content-length) is derived from the parsed headers.
    pub fn read_content(&mut self, data: &[u8]) -> usize {
        let mut consumed = 0;
        if !self.header.finished {
            consumed = self.header.read_content(data);
            if self.header.finished {
                self.apply_header_framing();
            }
        }
        consumed += self.body_reader.read_content(&data[consumed..]);
        if self.body_reader.finished && !self.body_materialized {
            self.body = std::mem::take(&mut self.body_reader).into_body();
            self.body_materialized = true;
        }
        consumed
    }

    fn apply_header_framing(&mut self) {
        if let Some(len) = self.header.get_usize("content-length") {
            self.body_reader.content_length = Some(len);
        }
        if let Some(te) = self.header.get("transfer-encoding") {
            if te.eq_ignore_ascii_case("chunked") {
                self.body_reader.chunked = true;
            }
        }
        if let Some(rngs) = self.header.get("range") {
            self.ranges = range::parse_header(rngs);
        }
        if let Some(conn) = self.header.get("connection") {
            if conn.eq_ignore_ascii_case("close") {
                self.close_connection = true;
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.header.finished && self.body_reader.finished
    }

    pub fn set_body(&mut self, body: Body) {
        self.body = body;
    }

    /// Prepare the body for sending: apply compression/ranging and set the
    /// matching `Content-Length`/`Transfer-Encoding`/`Content-Encoding`
    /// headers. Must be called once, after all headers/content are set and
    /// before the first call to [`Frame::next_output`].
    pub fn finish_for_send(&mut self, content_type: Option<String>, compression: Option<&str>) {
        let mut body = std::mem::take(&mut self.body);
        if !self.ranges.is_empty() {
            body = body.into_ranged(&self.ranges, content_type.clone());
        }
        // Content-encoded bodies don't have a length known ahead of the
        // encoder running, so they go out chunked instead of Content-Length.
        let chunked = compression.is_some();
        if let Some(method) = compression {
            body = match method {
                "gzip" => Body::Gzipped(Box::new(body)),
                "deflate" => Body::Deflated(Box::new(body)),
                _ => body,
            };
            self.header.add_header("Content-Encoding", method);
            self.header.add_header("Vary", "Content-Encoding");
        }
        if let Some(ct) = content_type {
            self.header.add_header("Content-Type", ct);
        }
        if chunked {
            self.header.add_header("Transfer-Encoding", "chunked");
        } else if !body.is_empty() {
            self.header.add_header("Content-Length", body.len().to_string());
        }
        self.sender = BodySender::new(&body, chunked).ok();
        self.body = body;
    }

    /// True once headers and the whole body have been handed out via
    /// [`Frame::next_output`].
    pub fn send_complete(&self) -> bool {
        self.headers_sent && self.sender.as_ref().map_or(true, |s| s.finished())
    }

    /// Produce the next outbound packet (headers on the first call, then
    /// up to [`crate::content::MAX_SEND`]-sized body pieces).
    pub fn next_output(&mut self) -> Vec<u8> {
        let mut data = Vec::new();
        if !self.headers_sent {
            data.extend_from_slice(self.header.to_string().as_bytes());
            self.headers_sent = true;
        }
        if self.headers_only {
            return data;
        }
        if let Some(sender) = &mut self.sender {
            data.extend_from_slice(&sender.next(data.len()));
        }
        data
    }
}
