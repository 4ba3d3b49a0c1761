//! An HTTP/1.1 request, usable both to parse an inbound request (server
//! side) and to build an outbound one (client side).

use crate::content::Body;
use crate::frame::Frame;
use crate::response::Response;

#[derive(Debug)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub version: String,
    frame: Frame,
}

impl Default for Request {
    fn default() -> Self {
        Request {
            method: "GET".to_owned(),
            path: "/".to_owned(),
            version: "HTTP/1.1".to_owned(),
            frame: Frame::new(),
        }
    }
}

impl Request {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Request {
            method: method.into(),
            path: path.into(),
            ..Request::default()
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.frame.get(key)
    }

    pub fn add_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.frame.add_header(key, value);
    }

    pub fn add_headers(&mut self, headers: impl IntoIterator<Item = (String, String)>) {
        self.frame.add_headers(headers);
    }

    pub fn set_body(&mut self, body: Body) {
        self.frame.set_body(body);
    }

    pub fn ranges(&self) -> &[crate::range::Range] {
        &self.frame.ranges
    }

    pub fn close_connection(&self) -> bool {
        self.frame.close_connection
    }

    /// Feed inbound stream bytes; on the first call that completes the
    /// header block, the request line is parsed into method/path/version.
    pub fn read_content(&mut self, data: &[u8]) -> usize {
        let was_finished = self.frame.header.finished;
        let consumed = self.frame.read_content(data);
        if !was_finished && self.frame.header.finished {
            if let Some(line) = self.frame.header.status_line.clone() {
                let mut parts = line.splitn(3, ' ');
                if let (Some(m), Some(p), Some(v)) = (parts.next(), parts.next(), parts.next()) {
                    self.method = m.to_owned();
                    self.path = p.to_owned();
                    self.version = v.to_owned();
                }
            }
        }
        consumed
    }

    pub fn is_complete(&self) -> bool {
        self.frame.is_complete()
    }

    /// Finalize the request line and headers ahead of sending.
    pub fn complete(&mut self) {
        if !self.frame.ranges.is_empty() {
            let header: Vec<String> = self.frame.ranges.iter().map(|r| r.header()).collect();
            self.frame
                .add_header("Range", format!("bytes={}", header.join(",")));
        }
        self.frame.header.status_line = Some(format!("{} {} {}", self.method, self.path, self.version));
        self.frame.finish_for_send(None, None);
    }

    pub fn send_complete(&self) -> bool {
        self.frame.send_complete()
    }

    pub fn next_output(&mut self) -> Vec<u8> {
        self.frame.next_output()
    }

    /// Build the response this request expects: a `HEAD` request wants
    /// headers only, and a client advertising `gzip` in `Accept-Encoding`
    /// gets a compressed response body.
    pub fn make_response(&self) -> Response {
        let mut resp = Response::new(200);
        resp.set_close_connection(self.frame.close_connection);
        if self.method.eq_ignore_ascii_case("HEAD") {
            resp.set_headers_only(true);
        }
        if let Some(accept) = self.get("accept-encoding") {
            if accept.contains("gzip") {
                resp.set_compression(Some("gzip".to_owned()));
            }
        }
        resp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_request_line_once_headers_complete() {
        let mut req = Request::default();
        req.read_content(b"GET /stream.m3u8 HTTP/1.1\r\nHost: x\r\n\r\n");
        assert_eq!(req.method, "GET");
        assert_eq!(req.path, "/stream.m3u8");
        assert!(req.is_complete());
    }

    #[test]
    fn head_request_yields_headers_only_response() {
        let mut req = Request::new("HEAD", "/seg1.ts");
        req.read_content(b"HEAD /seg1.ts HTTP/1.1\r\n\r\n");
        let resp = req.make_response();
        assert!(resp.headers_only());
    }
}
