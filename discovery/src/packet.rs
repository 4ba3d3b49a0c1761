//! Byte-level codec for DNS/mDNS messages (RFC 1035 §4.1).
//!
//! `Packet` is a growable octet buffer with helpers to read and write the
//! on-the-wire name encoding, including the pointer-based compression scheme
//! from RFC 1035 §4.1.4. A single `Packet` is used for the lifetime of one
//! outbound or inbound datagram; the compression dictionary it builds while
//! writing is only ever valid for that one datagram.

use byteorder::{BigEndian, ByteOrder};
use std::collections::HashMap;

use crate::error::{Error, Result};

/// Pointer labels have their top two bits set (RFC 1035 §4.1.4).
const POINTER_TAG: u8 = 0xC0;
/// Refuse to follow more than this many pointers/labels while reading a
/// single name, to bound cyclic or adversarial pointer chains.
const MAX_LABEL_HOPS: usize = 128;

#[derive(Debug, Default)]
pub struct Packet {
    pub data: Vec<u8>,
    /// Maps an already-written name suffix (e.g. `"local"`, `"tcp.local"`) to
    /// the byte offset at which it was first written in this packet.
    suffix_offsets: HashMap<String, u16>,
}

impl Packet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        Packet {
            data,
            suffix_offsets: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read a (possibly pointer-compressed) name starting at `pos`.
    /// Returns the number of bytes consumed *at `pos`* (not following any
    /// pointer, which reads from elsewhere in the buffer) and the decoded,
    /// dot-joined name.
    pub fn read_name(&self, pos: usize) -> Result<(usize, String)> {
        let (consumed, name, _hops) = self.read_name_bounded(pos, 0)?;
        Ok((consumed, name))
    }

    fn read_name_bounded(&self, pos: usize, hops: usize) -> Result<(usize, String, usize)> {
        if hops > MAX_LABEL_HOPS {
            return Err(Error::Packet("name pointer chain too long".into()));
        }
        let start = pos;
        let mut pos = pos;
        let mut parts = Vec::new();
        loop {
            let len_or_ptr = *self
                .data
                .get(pos)
                .ok_or_else(|| Error::Packet(format!("truncated name at {}", pos)))?;
            if len_or_ptr == 0 {
                pos += 1;
                break;
            } else if len_or_ptr & POINTER_TAG == 0 {
                let label_len = len_or_ptr as usize;
                pos += 1;
                let label = self.read_utf8(pos, label_len)?;
                pos += label_len;
                parts.push(label);
            } else if len_or_ptr & POINTER_TAG == POINTER_TAG {
                if pos + 2 > self.data.len() {
                    return Err(Error::Packet("truncated name pointer".into()));
                }
                let offset = (BigEndian::read_u16(&self.data[pos..pos + 2]) & 0x3FFF) as usize;
                pos += 2;
                let (_, tail, _) = self.read_name_bounded(offset, hops + 1)?;
                if !tail.is_empty() {
                    parts.push(tail);
                }
                return Ok((pos - start, parts.join("."), hops + 1));
            } else {
                return Err(Error::Packet(format!("bad label length 0x{:x}", len_or_ptr)));
            }
        }
        Ok((pos - start, parts.join("."), hops))
    }

    fn read_utf8(&self, pos: usize, len: usize) -> Result<String> {
        let bytes = self
            .data
            .get(pos..pos + len)
            .ok_or_else(|| Error::Packet(format!("truncated label at {}", pos)))?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| Error::Packet("label was not valid utf-8".into()))
    }

    /// Write a dotted name, using a back-pointer to a previously written
    /// suffix when one is available. Returns the number of bytes appended.
    pub fn write_name(&mut self, name: &str) -> usize {
        let start = self.data.len();
        if let Some(&offset) = self.suffix_offsets.get(name) {
            self.write_pointer(offset);
            return self.data.len() - start;
        }

        let labels: Vec<&str> = name.split('.').collect();
        let mut wrote_pointer = false;
        for i in 0..labels.len() {
            let suffix = labels[i..].join(".");
            if let Some(&offset) = self.suffix_offsets.get(&suffix) {
                self.write_pointer(offset);
                wrote_pointer = true;
                break;
            }
            if self.data.len() <= 0x3FFF {
                self.suffix_offsets.insert(suffix, self.data.len() as u16);
            }
            let label = labels[i].as_bytes();
            self.data.push(label.len() as u8);
            self.data.extend_from_slice(label);
        }
        if !wrote_pointer {
            self.data.push(0);
        }
        self.data.len() - start
    }

    fn write_pointer(&mut self, offset: u16) {
        let mut buf = [0u8; 2];
        BigEndian::write_u16(&mut buf, offset | 0xC000);
        self.data.extend_from_slice(&buf);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.data.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        let mut buf = [0u8; 2];
        BigEndian::write_u16(&mut buf, v);
        self.data.extend_from_slice(&buf);
    }

    pub fn write_u32(&mut self, v: u32) {
        let mut buf = [0u8; 4];
        BigEndian::write_u32(&mut buf, v);
        self.data.extend_from_slice(&buf);
    }

    pub fn write_u16_at(&mut self, pos: usize, v: u16) {
        BigEndian::write_u16(&mut self.data[pos..pos + 2], v);
    }

    pub fn read_u16(&self, pos: usize) -> Result<u16> {
        let bytes = self
            .data
            .get(pos..pos + 2)
            .ok_or_else(|| Error::Packet(format!("truncated u16 at {}", pos)))?;
        Ok(BigEndian::read_u16(bytes))
    }

    pub fn read_u32(&self, pos: usize) -> Result<u32> {
        let bytes = self
            .data
            .get(pos..pos + 4)
            .ok_or_else(|| Error::Packet(format!("truncated u32 at {}", pos)))?;
        Ok(BigEndian::read_u32(bytes))
    }

    pub fn read_i32(&self, pos: usize) -> Result<i32> {
        self.read_u32(pos).map(|v| v as i32)
    }

    pub fn slice(&self, pos: usize, len: usize) -> Result<&[u8]> {
        self.data
            .get(pos..pos + len)
            .ok_or_else(|| Error::Packet(format!("truncated field at {} (len {})", pos, len)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_name_round_trips() {
        let mut pkt = Packet::new();
        pkt.write_name("_airplay._tcp.local");
        let (consumed, name) = pkt.read_name(0).unwrap();
        assert_eq!(name, "_airplay._tcp.local");
        assert_eq!(consumed, pkt.len());
    }

    #[test]
    fn repeated_suffix_emits_pointer() {
        let mut pkt = Packet::new();
        pkt.write_name("_airplay._tcp.local");
        let first_len = pkt.len();
        let second_start = pkt.len();
        pkt.write_name("_airplay._tcp.local");
        // A full repeat collapses to a single two-byte pointer.
        assert_eq!(pkt.len() - second_start, 2);

        let (_, name) = pkt.read_name(second_start).unwrap();
        assert_eq!(name, "_airplay._tcp.local");
        assert!(pkt.len() < first_len * 2);
    }

    #[test]
    fn partial_suffix_reuses_pointer() {
        let mut pkt = Packet::new();
        pkt.write_name("_airplay._tcp.local");
        let second_start = pkt.len();
        pkt.write_name("Apple TV._airplay._tcp.local");
        let (_, name) = pkt.read_name(second_start).unwrap();
        assert_eq!(name, "Apple TV._airplay._tcp.local");
    }

    #[test]
    fn cyclic_pointer_is_rejected() {
        let mut pkt = Packet::new();
        // A pointer at offset 0 pointing to itself.
        pkt.write_u16(0xC000);
        assert!(pkt.read_name(0).is_err());
    }
}
