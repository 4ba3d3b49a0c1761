//! Header block parsing: buffers stream data until a `\r\n\r\n`-terminated
//! block is seen, then splits it into a status line and a case-insensitive
//! `key: value` map.

use std::collections::BTreeMap;

use chrono::Utc;

const CRLF: &[u8] = b"\r\n";
const EOH: &[u8] = b"\r\n\r\n";

#[derive(Clone, Debug, Default)]
pub struct Headers {
    buffer: Vec<u8>,
    pub finished: bool,
    pub status_line: Option<String>,
    map: BTreeMap<String, String>,
}

impl Headers {
    pub fn new() -> Self {
        Headers::default()
    }

    /// Feed stream bytes in. Returns the number of bytes consumed from
    /// `data`; once `\r\n\r\n` is seen the header block is parsed and
    /// `finished` becomes true. Safe to call after `finished` (returns 0).
    pub fn read_content(&mut self, data: &[u8]) -> usize {
        if self.finished {
            return 0;
        }
        let consumed;
        if let Some(idx) = find(data, EOH) {
            consumed = idx + 4;
            self.buffer.extend_from_slice(&data[..idx]);
            self.finished = true;
        } else {
            consumed = data.len();
            let old_len = self.buffer.len();
            self.buffer.extend_from_slice(data);
            if let Some(idx) = find(&self.buffer, EOH) {
                self.buffer.truncate(idx);
                self.finished = true;
                return idx - old_len + 4;
            }
        }
        if self.finished {
            self.parse();
        }
        consumed
    }

    fn parse(&mut self) {
        self.map.clear();
        let mut lines = self.buffer.split(|&b| b == b'\n');
        if let Some(first) = lines.next() {
            let first = strip_cr(first);
            self.status_line = Some(String::from_utf8_lossy(first).into_owned());
        }
        for line in lines {
            let line = strip_cr(line);
            if line.is_empty() {
                continue;
            }
            if let Some(pos) = line.iter().position(|&b| b == b':') {
                let key = String::from_utf8_lossy(&line[..pos]).into_owned();
                let value = String::from_utf8_lossy(&line[pos + 1..])
                    .trim()
                    .to_owned();
                self.map.insert(key, value);
            } else {
                log::debug!("malformed header line: {:?}", String::from_utf8_lossy(line));
            }
        }
    }

    pub fn add_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.map.insert(key.into(), value.into());
    }

    pub fn add_headers(&mut self, headers: impl IntoIterator<Item = (String, String)>) {
        for (k, v) in headers {
            self.map.insert(k, v);
        }
    }

    /// Case-insensitive header lookup.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    pub fn all(&self, key: &str) -> Vec<&str> {
        self.map
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

impl std::fmt::Display for Headers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(status_line) = &self.status_line {
            write!(f, "{}\r\n", status_line)?;
        }
        let mut map = self.map.clone();
        map.insert(
            "Date".to_owned(),
            Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        );
        for (k, v) in &map {
            write!(f, "{}: {}\r\n", k, v)?;
        }
        write!(f, "\r\n")
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn strip_cr(line: &[u8]) -> &[u8] {
    if line.last() == Some(&b'\r') {
        &line[..line.len() - 1]
    } else {
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status_line_and_headers() {
        let mut headers = Headers::new();
        let block = b"GET /stream.m3u8 HTTP/1.1\r\nHost: localhost\r\nAccept: */*\r\n\r\nbody follows";
        let consumed = headers.read_content(block);
        assert!(headers.finished);
        assert_eq!(headers.status_line.as_deref(), Some("GET /stream.m3u8 HTTP/1.1"));
        assert_eq!(headers.get("host"), Some("localhost"));
        assert_eq!(consumed, block.len() - "body follows".len());
    }

    #[test]
    fn handles_split_across_reads() {
        let mut headers = Headers::new();
        let part1 = b"HTTP/1.1 200 OK\r\nContent-Len";
        let part2 = b"gth: 5\r\n\r\nhello";
        let c1 = headers.read_content(part1);
        assert!(!headers.finished);
        assert_eq!(c1, part1.len());
        let c2 = headers.read_content(part2);
        assert!(headers.finished);
        assert_eq!(headers.get("content-length"), Some("5"));
        assert_eq!(&part2[c2..], b"hello");
    }
}
