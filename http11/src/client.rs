//! A keep-alive HTTP/1.1 client. One [`HttpClient`] owns at most one
//! connected socket at a time; a request blocks the caller until the
//! matching response has been fully read (or the connection times out).

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use url::form_urlencoded;

use crate::content::Body;
use crate::cookie::CookieJar;
use crate::error::{Error, Result};
use crate::request::Request;
use crate::response::Response;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_TIMEOUT: Duration = Duration::from_secs(30);
const READ_CHUNK: usize = 2048;

/// Body for [`HttpClient::post_data`]: either a raw byte payload with an
/// explicit content type, or a set of key/value pairs encoded according to
/// the requested content type (`application/x-www-form-urlencoded` by
/// default, or `key: value\r\n` lines for `text/parameters`).
#[derive(Debug, Clone)]
pub enum PostData {
    Raw(Vec<u8>),
    Form(Vec<(String, String)>),
}

pub struct HttpClient {
    host: String,
    port: u16,
    socket: Option<TcpStream>,
    buffer: Vec<u8>,
    pub cookies: CookieJar,
    pub user_agent: String,
}

impl HttpClient {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        HttpClient {
            host: host.into(),
            port,
            socket: None,
            buffer: Vec::new(),
            cookies: CookieJar::new(),
            user_agent: format!("castbeam/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    fn host_str(&self) -> String {
        if self.port == 80 {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    fn ensure_socket(&mut self) -> Result<()> {
        if self.socket.is_some() {
            return Ok(());
        }
        use std::net::ToSocketAddrs;
        let addr = format!("{}:{}", self.host, self.port);
        let mut addrs = addr
            .to_socket_addrs()
            .map_err(|_| Error::Malformed(format!("unable to resolve host '{}'", self.host)))?;
        let sock_addr = addrs
            .next()
            .ok_or_else(|| Error::Malformed(format!("no addresses for host '{}'", self.host)))?;
        let stream = TcpStream::connect_timeout(&sock_addr, CONNECT_TIMEOUT)?;
        stream.set_read_timeout(Some(READ_TIMEOUT))?;
        stream.set_write_timeout(Some(READ_TIMEOUT))?;
        self.socket = Some(stream);
        Ok(())
    }

    fn close_socket(&mut self) {
        self.socket = None;
        self.buffer.clear();
    }

    pub fn create_request(&self, method: &str, path: &str) -> Request {
        let mut req = Request::new(method, path);
        let cookies = self.cookies.header_for(path);
        if let Some(cookies) = cookies {
            req.add_header("Cookie", cookies);
        }
        req
    }

    pub fn request(&mut self, path: &str) -> Result<Response> {
        let req = self.create_request("GET", path);
        self.send_request(req)
    }

    pub fn simple_request(&mut self, path: &str) -> Result<Vec<u8>> {
        let resp = self.request(path)?;
        Ok(resp.body_bytes())
    }

    /// Submit a POST request with the supplied data. When `content_type` is
    /// omitted and `data` is a [`PostData::Form`], the body is encoded as
    /// `application/x-www-form-urlencoded`; an explicit `text/parameters`
    /// content type instead encodes each pair as a `key: value` CRLF line.
    pub fn post_data(&mut self, path: &str, data: Option<PostData>, content_type: Option<&str>) -> Result<Response> {
        let mut req = self.create_request("POST", path);
        let (body, content_type) = encode_post_body(data, content_type);
        if let Some(body) = body {
            req.set_body(Body::raw(body));
        }
        if let Some(content_type) = content_type {
            req.add_header("Content-Type", content_type);
        }
        self.send_request(req)
    }

    pub fn send_request(&mut self, mut request: Request) -> Result<Response> {
        self.ensure_socket()?;
        request.add_headers(vec![
            ("Host".to_owned(), self.host_str()),
            ("Accept-Encoding".to_owned(), "identity, gzip".to_owned()),
            ("User-Agent".to_owned(), self.user_agent.clone()),
        ]);
        request.complete();

        self.write_request(&mut request)?;
        let response = self.read_response()?;
        for set_cookie in response.all("set-cookie") {
            self.cookies.parse_set_cookie(set_cookie);
        }
        if !response.is_keepalive() {
            self.close_socket();
        }
        Ok(response)
    }

    fn write_request(&mut self, request: &mut Request) -> Result<()> {
        loop {
            if request.send_complete() {
                return Ok(());
            }
            let data = request.next_output();
            if data.is_empty() {
                return Ok(());
            }
            let socket = self.socket.as_mut().ok_or(Error::ConnectionClosed)?;
            match socket.write_all(&data) {
                Ok(()) => {}
                Err(err) => {
                    self.close_socket();
                    return Err(err.into());
                }
            }
        }
    }

    fn read_response(&mut self) -> Result<Response> {
        let mut response = Response::new(0);
        let consumed = response.read_content(&self.buffer);
        self.buffer.drain(..consumed);

        let mut chunk = [0u8; READ_CHUNK];
        while !response.is_complete() {
            let socket = self.socket.as_mut().ok_or(Error::ConnectionClosed)?;
            let n = socket.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            self.buffer.extend_from_slice(&chunk[..n]);
            let consumed = response.read_content(&self.buffer);
            self.buffer.drain(..consumed);
        }
        if !response.is_complete() {
            return Err(Error::ConnectionClosed);
        }
        Ok(response)
    }
}

/// Resolve the body bytes and `Content-Type` for a [`HttpClient::post_data`]
/// call; split out from the method so the encoding rules are testable
/// without a live socket.
fn encode_post_body(data: Option<PostData>, content_type: Option<&str>) -> (Option<Vec<u8>>, Option<String>) {
    let content_type = content_type.map(str::to_owned).or_else(|| match &data {
        Some(PostData::Form(_)) => Some("application/x-www-form-urlencoded".to_owned()),
        _ => None,
    });
    let body = data.map(|data| match (&data, content_type.as_deref()) {
        (PostData::Form(pairs), Some("text/parameters")) => pairs
            .iter()
            .map(|(k, v)| format!("{}: {}\r\n", k, v))
            .collect::<String>()
            .into_bytes(),
        (PostData::Form(pairs), _) => form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish()
            .into_bytes(),
        (PostData::Raw(bytes), _) => bytes.clone(),
    });
    (body, content_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_data_defaults_to_url_encoding() {
        let data = PostData::Form(vec![("a".to_owned(), "1 2".to_owned())]);
        let (body, content_type) = encode_post_body(Some(data), None);
        assert_eq!(content_type.as_deref(), Some("application/x-www-form-urlencoded"));
        assert_eq!(body.unwrap(), b"a=1+2".to_vec());
    }

    #[test]
    fn text_parameters_encodes_as_key_value_lines() {
        let data = PostData::Form(vec![
            ("Content-Location".to_owned(), "http://x/stream.m3u8".to_owned()),
            ("Start-Position".to_owned(), "0".to_owned()),
        ]);
        let (body, content_type) = encode_post_body(Some(data), Some("text/parameters"));
        assert_eq!(content_type.as_deref(), Some("text/parameters"));
        assert_eq!(
            String::from_utf8(body.unwrap()).unwrap(),
            "Content-Location: http://x/stream.m3u8\r\nStart-Position: 0\r\n"
        );
    }

    #[test]
    fn raw_data_passes_through_with_explicit_content_type() {
        let data = PostData::Raw(br#"{"params": "now"}"#.to_vec());
        let (body, content_type) = encode_post_body(Some(data), Some("application/json"));
        assert_eq!(content_type.as_deref(), Some("application/json"));
        assert_eq!(body.unwrap(), br#"{"params": "now"}"#.to_vec());
    }
}

