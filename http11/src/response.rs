//! An HTTP/1.1 response, usable both to parse an inbound response (client
//! side) and to build an outbound one (server side).

use crate::content::Body;
use crate::frame::Frame;
use crate::range::Range;

fn status_message(code: u16) -> &'static str {
    match code {
        200 => "OK",
        206 => "Partial Content",
        301 => "Moved permanently",
        401 => "Unauthorised",
        402 => "Payment required",
        403 => "Forbidden",
        404 => "Not found",
        405 => "Method not allowed",
        416 => "Requested range not satisfiable",
        _ => "Unknown status",
    }
}

#[derive(Debug)]
pub struct Response {
    pub code: u16,
    frame: Frame,
    content_type: Option<String>,
    compression: Option<String>,
}

impl Response {
    pub fn new(code: u16) -> Self {
        Response {
            code,
            frame: Frame::new(),
            content_type: None,
            compression: None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.frame.get(key)
    }

    pub fn all(&self, key: &str) -> Vec<&str> {
        self.frame.header.all(key)
    }

    pub fn add_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.frame.add_header(key, value);
    }

    pub fn set_body(&mut self, body: Body) {
        self.frame.set_body(body);
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.content_type = Some(content_type.into());
    }

    pub fn set_compression(&mut self, method: Option<String>) {
        self.compression = method;
    }

    pub fn set_close_connection(&mut self, close: bool) {
        self.frame.close_connection = close;
    }

    pub fn close_connection(&self) -> bool {
        self.frame.close_connection
    }

    pub fn set_headers_only(&mut self, yes: bool) {
        self.frame.headers_only = yes;
    }

    pub fn headers_only(&self) -> bool {
        self.frame.headers_only
    }

    pub fn set_ranges(&mut self, ranges: Vec<Range>) {
        self.frame.ranges = ranges;
    }

    /// Set the response code; requesting a 206 with no ranges downgrades
    /// to 200, and a 4xx/5xx clears any ranges that had been queued.
    pub fn set_code(&mut self, code: u16) {
        self.code = code;
        if code >= 400 {
            self.frame.ranges.clear();
        } else if code == 206 && self.frame.ranges.is_empty() {
            self.code = 200;
        }
    }

    pub fn read_content(&mut self, data: &[u8]) -> usize {
        let was_finished = self.frame.header.finished;
        let consumed = self.frame.read_content(data);
        if !was_finished && self.frame.header.finished {
            if let Some(line) = self.frame.header.status_line.clone() {
                let mut parts = line.splitn(3, ' ');
                if let (Some(_v), Some(code), _) = (parts.next(), parts.next(), parts.next()) {
                    self.code = code.parse().unwrap_or(0);
                }
            }
        }
        consumed
    }

    pub fn is_complete(&self) -> bool {
        self.frame.is_complete()
    }

    pub fn is_keepalive(&self) -> bool {
        !self.frame.close_connection
    }

    /// The body's bytes, decompressed if a `Content-Encoding` of `gzip` or
    /// `deflate` was seen on a parsed (inbound) response.
    pub fn body_bytes(&self) -> Vec<u8> {
        let body = match self.get("content-encoding") {
            Some("gzip") => Body::Gzipped(Box::new(self.frame.body.clone())),
            Some("deflate") => Body::Deflated(Box::new(self.frame.body.clone())),
            _ => self.frame.body.clone(),
        };
        let body = if matches!(body, Body::Gzipped(_) | Body::Deflated(_)) {
            body.decompress().unwrap_or_else(|_| self.frame.body.clone())
        } else {
            body
        };
        body.materialize().unwrap_or_default()
    }

    /// Finalize status line, ranges, and headers ahead of sending. If any
    /// byte range was requested and is unsatisfiable against the actual
    /// body length, the response is forced to `416` and the ranges
    /// dropped.
    pub fn complete(&mut self) {
        if !self.frame.ranges.is_empty() {
            let body_len = self.frame.body.len();
            if self
                .frame
                .ranges
                .iter()
                .any(|r| r.is_unsatisfiable(body_len))
            {
                self.set_code(416);
            } else if self.code == 200 {
                self.code = 206;
            }
        }
        self.frame.header.status_line =
            Some(format!("HTTP/1.1 {} {}", self.code, status_message(self.code)));
        self.frame
            .finish_for_send(self.content_type.clone(), self.compression.as_deref());
    }

    pub fn send_complete(&self) -> bool {
        self.frame.send_complete()
    }

    pub fn next_output(&mut self) -> Vec<u8> {
        self.frame.next_output()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsatisfiable_range_forces_416() {
        let mut resp = Response::new(200);
        resp.set_body(Body::raw(vec![0u8; 10]));
        resp.set_ranges(vec![Range::parse("500", "").unwrap()]);
        resp.complete();
        assert_eq!(resp.code, 416);
    }

    #[test]
    fn satisfiable_range_becomes_206() {
        let mut resp = Response::new(200);
        resp.set_body(Body::raw(vec![0u8; 100]));
        resp.set_ranges(vec![Range::parse("0", "9").unwrap()]);
        resp.complete();
        assert_eq!(resp.code, 206);
    }

    #[test]
    fn compressed_body_goes_out_chunked() {
        let mut resp = Response::new(200);
        resp.set_body(Body::raw(b"hello world".to_vec()));
        resp.set_compression(Some("gzip".to_owned()));
        resp.complete();
        assert_eq!(resp.get("transfer-encoding"), Some("chunked"));
        assert_eq!(resp.get("content-length"), None);
        let mut sent = Vec::new();
        loop {
            let chunk = resp.next_output();
            if chunk.is_empty() {
                break;
            }
            sent.extend_from_slice(&chunk);
        }
        assert!(sent.ends_with(b"0\r\n\r\n"));
        assert!(resp.send_complete());
    }

    #[test]
    fn parses_status_line_from_stream() {
        let mut resp = Response::new(0);
        resp.read_content(b"HTTP/1.1 404 Not found\r\nContent-Length: 0\r\n\r\n");
        assert_eq!(resp.code, 404);
        assert!(resp.is_complete());
    }
}
