//! The content (message body) chain.
//!
//! `atavism`'s Python `Content` class forwards every operation down a
//! `_next` linked list so that "this body, gzipped" or "this body, as one
//! range" can be layered onto an original body without mutating it. Here
//! that chain is a single tagged enum: each variant holds the bytes (or
//! file) it actually serves, and wrapping variants (`Gzipped`, `Deflated`,
//! `Ranged`) hold the inner `Body` they were built from.

use std::fs;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use flate2::read::{DeflateDecoder, DeflateEncoder, GzDecoder, GzEncoder};
use flate2::Compression;

use crate::range::Range;

/// Boundary used for `multipart/byteranges` responses. Fixed, as in the
/// source implementation, rather than randomly generated.
pub const RANGE_BOUNDARY: &str = "One_At_A_Time_Please";
/// Packetizer granularity for [`Body::next`].
pub const MAX_SEND: usize = 1500;

#[derive(Clone, Debug)]
pub struct FileBody {
    pub path: PathBuf,
    pub len: u64,
}

impl FileBody {
    pub fn open(path: impl AsRef<Path>) -> io::Result<FileBody> {
        let path = path.as_ref().to_path_buf();
        let len = fs::metadata(&path)?.len();
        Ok(FileBody { path, len })
    }

    pub fn content_type(&self) -> Option<String> {
        mime_guess::from_path(&self.path)
            .first()
            .map(|m| m.essence_str().to_owned())
    }

    fn read_range(&self, start: u64, len: u64) -> io::Result<Vec<u8>> {
        let mut file = fs::File::open(&self.path)?;
        file.seek(SeekFrom::Start(start))?;
        let mut buf = vec![0u8; len as usize];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn read_all(&self) -> io::Result<Vec<u8>> {
        self.read_range(0, self.len)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedRange {
    pub start: u64,
    pub end: u64,
    pub content_range: String,
}

#[derive(Clone, Debug)]
pub enum Body {
    Raw(Vec<u8>),
    File(FileBody),
    Gzipped(Box<Body>),
    Deflated(Box<Body>),
    Ranged {
        inner: Box<Body>,
        ranges: Vec<ResolvedRange>,
        content_type: Option<String>,
    },
}

impl Default for Body {
    fn default() -> Self {
        Body::Raw(Vec::new())
    }
}

impl Body {
    pub fn raw(data: impl Into<Vec<u8>>) -> Self {
        Body::Raw(data.into())
    }

    pub fn len(&self) -> u64 {
        match self {
            Body::Raw(buf) => buf.len() as u64,
            Body::File(f) => f.len,
            Body::Gzipped(_) | Body::Deflated(_) => {
                // Length is unknown until compressed; materialize once.
                self.materialize().map(|b| b.len() as u64).unwrap_or(0)
            }
            Body::Ranged { ranges, .. } if ranges.len() == 1 => {
                ranges[0].end - ranges[0].start + 1
            }
            Body::Ranged { .. } => self.materialize().map(|b| b.len() as u64).unwrap_or(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fully materialize this body's bytes, applying any compression or
    /// range framing. Files are read entirely into memory at this point.
    pub fn materialize(&self) -> io::Result<Vec<u8>> {
        match self {
            Body::Raw(buf) => Ok(buf.clone()),
            Body::File(f) => f.read_all(),
            Body::Gzipped(inner) => {
                let raw = inner.materialize()?;
                let mut encoder = GzEncoder::new(&raw[..], Compression::best());
                let mut out = Vec::new();
                encoder.read_to_end(&mut out)?;
                Ok(out)
            }
            Body::Deflated(inner) => {
                let raw = inner.materialize()?;
                let mut encoder = DeflateEncoder::new(&raw[..], Compression::best());
                let mut out = Vec::new();
                encoder.read_to_end(&mut out)?;
                Ok(out)
            }
            Body::Ranged {
                inner,
                ranges,
                content_type,
            } => {
                if ranges.len() == 1 {
                    let r = &ranges[0];
                    return inner.slice(r.start, r.end);
                }
                let mut out = Vec::new();
                for r in ranges {
                    let piece = inner.slice(r.start, r.end)?;
                    out.extend_from_slice(
                        format!(
                            "--{}\r\nContent-Type: {}\r\nContent-Range: bytes {}\r\n\r\n",
                            RANGE_BOUNDARY,
                            content_type.as_deref().unwrap_or("application/octet-stream"),
                            r.content_range
                        )
                        .as_bytes(),
                    );
                    out.extend_from_slice(&piece);
                    out.extend_from_slice(b"\r\n");
                }
                out.extend_from_slice(format!("--{}--\r\n", RANGE_BOUNDARY).as_bytes());
                Ok(out)
            }
        }
    }

    fn slice(&self, start: u64, end: u64) -> io::Result<Vec<u8>> {
        match self {
            Body::File(f) => f.read_range(start, end - start + 1),
            _ => {
                let full = self.materialize()?;
                let start = start as usize;
                let end = (end as usize).min(full.len().saturating_sub(1));
                Ok(full[start..=end.max(start)].to_vec())
            }
        }
    }

    pub fn decompress(self) -> io::Result<Body> {
        match self {
            Body::Gzipped(inner) => {
                let raw = inner.materialize()?;
                let mut decoder = GzDecoder::new(&raw[..]);
                let mut out = Vec::new();
                decoder.read_to_end(&mut out)?;
                Ok(Body::Raw(out))
            }
            Body::Deflated(inner) => {
                let raw = inner.materialize()?;
                let mut decoder = DeflateDecoder::new(&raw[..]);
                let mut out = Vec::new();
                decoder.read_to_end(&mut out)?;
                Ok(Body::Raw(out))
            }
            other => Ok(other),
        }
    }

    /// Wrap this body so that responding clients see a single- or
    /// multi-range response instead of the full body.
    pub fn into_ranged(self, ranges: &[Range], content_type: Option<String>) -> Body {
        if ranges.is_empty() {
            return self;
        }
        let clen = self.len();
        let resolved = ranges
            .iter()
            .map(|r| {
                let (start, end) = r.absolutes(clen);
                ResolvedRange {
                    start,
                    end,
                    content_range: r.absolute_range(clen),
                }
            })
            .collect();
        Body::Ranged {
            inner: Box::new(self),
            ranges: resolved,
            content_type,
        }
    }
}

/// A chunked-transfer-encoding-aware accumulator for inbound message
/// bodies. Distinct from [`Body`], which represents a body ready to be
/// served: this only ever accumulates into a `Raw` body as bytes arrive
/// off the wire.
#[derive(Debug, Default)]
pub struct BodyReader {
    pub chunked: bool,
    pub content_length: Option<usize>,
    buffer: Vec<u8>,
    pub finished: bool,
}

impl BodyReader {
    pub fn new() -> Self {
        BodyReader::default()
    }

    /// Feed stream bytes; returns the number of bytes consumed.
    pub fn read_content(&mut self, data: &[u8]) -> usize {
        if self.finished {
            return 0;
        }
        if self.chunked {
            return self.read_chunked(data);
        }
        match self.content_length {
            None | Some(0) => {
                self.finished = true;
                0
            }
            Some(len) => {
                let remaining = len - self.buffer.len();
                let take = remaining.min(data.len());
                self.buffer.extend_from_slice(&data[..take]);
                if self.buffer.len() == len {
                    self.finished = true;
                }
                take
            }
        }
    }

    fn read_chunked(&mut self, data: &[u8]) -> usize {
        let mut pos = 0;
        loop {
            let rest = &data[pos..];
            let nl = match rest.iter().position(|&b| b == b'\n') {
                Some(idx) => idx,
                None => return pos,
            };
            let size_line = std::str::from_utf8(&rest[..nl]).unwrap_or("").trim_end_matches('\r');
            let chunk_len = match usize::from_str_radix(size_line, 16) {
                Ok(v) => v,
                Err(_) => {
                    self.finished = true;
                    return pos + nl + 1;
                }
            };
            let header_len = nl + 1;
            if header_len + chunk_len + 2 > rest.len() {
                return pos;
            }
            if chunk_len == 0 {
                self.finished = true;
                return pos + header_len + 2;
            }
            self.buffer
                .extend_from_slice(&rest[header_len..header_len + chunk_len]);
            pos += header_len + chunk_len + 2;
        }
    }

    pub fn into_body(self) -> Body {
        Body::Raw(self.buffer)
    }
}

/// Packetizes a fully-materialized body for outbound sending, honoring
/// [`MAX_SEND`] and, when `chunked` is set, wrapping each piece in its
/// chunked-transfer-encoding size prefix.
#[derive(Debug)]
pub struct BodySender {
    data: Vec<u8>,
    chunked: bool,
    position: usize,
    trailer_sent: bool,
}

impl BodySender {
    pub fn new(body: &Body, chunked: bool) -> io::Result<BodySender> {
        Ok(BodySender {
            data: body.materialize()?,
            chunked,
            position: 0,
            trailer_sent: false,
        })
    }

    pub fn finished(&self) -> bool {
        self.position >= self.data.len() && (!self.chunked || self.trailer_sent)
    }

    /// Produce the next packet, leaving room for `header_len` bytes already
    /// queued ahead of it in the same write.
    pub fn next(&mut self, header_len: usize) -> Vec<u8> {
        if self.position >= self.data.len() {
            if self.chunked && !self.trailer_sent {
                self.trailer_sent = true;
                return b"0\r\n\r\n".to_vec();
            }
            return Vec::new();
        }
        let mut avail = MAX_SEND.saturating_sub(header_len);
        if self.chunked {
            avail = avail.saturating_sub(8);
        }
        let avail = avail.max(1).min(self.data.len() - self.position);
        let chunk = &self.data[self.position..self.position + avail];
        self.position += avail;
        if self.chunked {
            let mut out = format!("{:X}\r\n", chunk.len()).into_bytes();
            out.extend_from_slice(chunk);
            out.extend_from_slice(b"\r\n");
            out
        } else {
            chunk.to_vec()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_round_trips_through_gzip() {
        let body = Body::raw(b"hello world, this is some content to compress".to_vec());
        let gz = Body::Gzipped(Box::new(body));
        let compressed = gz.materialize().unwrap();
        assert_ne!(compressed, b"hello world, this is some content to compress");
        let restored = gz.decompress().unwrap();
        assert_eq!(
            restored.materialize().unwrap(),
            b"hello world, this is some content to compress".to_vec()
        );
    }

    #[test]
    fn single_range_extracts_slice() {
        let body = Body::raw((0..100u8).collect::<Vec<_>>());
        let ranged = body.into_ranged(&[Range::parse("10", "19").unwrap()], None);
        let out = ranged.materialize().unwrap();
        assert_eq!(out, (10..=19u8).collect::<Vec<_>>());
    }

    #[test]
    fn multi_range_uses_fixed_boundary() {
        let body = Body::raw((0..100u8).collect::<Vec<_>>());
        let ranged = body.into_ranged(
            &[
                Range::parse("0", "9").unwrap(),
                Range::parse("20", "29").unwrap(),
            ],
            Some("video/mp2t".to_owned()),
        );
        let out = ranged.materialize().unwrap();
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains(RANGE_BOUNDARY));
        assert!(text.contains("Content-Range: bytes 0-9/100"));
    }

    #[test]
    fn chunked_decode_accumulates_across_reads() {
        let mut reader = BodyReader::new();
        reader.chunked = true;
        let consumed = reader.read_content(b"5\r\nhello\r\n0\r\n\r\n");
        assert!(reader.finished);
        assert_eq!(consumed, "5\r\nhello\r\n0\r\n\r\n".len());
        match reader.into_body() {
            Body::Raw(buf) => assert_eq!(buf, b"hello"),
            _ => panic!("expected raw body"),
        }
    }

    #[test]
    fn sender_packetizes_and_terminates_chunked() {
        let body = Body::raw(vec![b'x'; 10]);
        let mut sender = BodySender::new(&body, true).unwrap();
        let mut total = Vec::new();
        while !sender.finished() {
            total.extend(sender.next(0));
        }
        let text = String::from_utf8(total).unwrap();
        assert!(text.ends_with("0\r\n\r\n"));
        assert!(text.contains("A\r\n"));
    }

    #[test]
    fn content_length_framing_caps_at_length() {
        let mut reader = BodyReader::new();
        reader.content_length = Some(5);
        let consumed = reader.read_content(b"hello extra");
        assert_eq!(consumed, 5);
        assert!(reader.finished);
    }
}
