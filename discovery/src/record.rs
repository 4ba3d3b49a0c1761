//! Resource record types and the typed `rdata` variant.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::error::Result;
use crate::packet::Packet;

pub const QTYPE_A: u16 = 1;
pub const QTYPE_NS: u16 = 2;
pub const QTYPE_PTR: u16 = 12;
pub const QTYPE_TXT: u16 = 16;
pub const QTYPE_AAAA: u16 = 28;
pub const QTYPE_SRV: u16 = 33;
pub const QTYPE_OPT: u16 = 41;
pub const QTYPE_ANY: u16 = 255;

pub const QCLASS_IN: u16 = 1;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Srv {
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RData {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Ptr(String),
    Srv(Srv),
    Txt(Vec<u8>),
    Opt(Vec<u8>),
    /// A record type this engine does not interpret; the bytes are kept for
    /// debugging but otherwise ignored.
    Other(u16, Vec<u8>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub qname: String,
    pub qtype: u16,
    pub qclass: u16,
    pub ttl: i32,
    pub rdata: RData,
}

impl Record {
    /// Parse one resource record starting at `pos`. Returns the record and
    /// the position immediately following it.
    pub(crate) fn parse(pkt: &Packet, pos: usize) -> Result<(Record, usize)> {
        let (n, qname) = pkt.read_name(pos)?;
        let mut pos = pos + n;
        let qtype = pkt.read_u16(pos)?;
        let qclass = pkt.read_u16(pos + 2)?;
        let ttl = pkt.read_i32(pos + 4)?;
        let rdlength = pkt.read_u16(pos + 8)? as usize;
        pos += 10;

        let rdata = match qtype {
            QTYPE_SRV => {
                let priority = pkt.read_u16(pos)?;
                let weight = pkt.read_u16(pos + 2)?;
                let port = pkt.read_u16(pos + 4)?;
                let (_, name) = pkt.read_name(pos + 6)?;
                RData::Srv(Srv {
                    priority,
                    weight,
                    port,
                    name,
                })
            }
            QTYPE_A => {
                let bytes = pkt.slice(pos, 4)?;
                RData::A(Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]))
            }
            QTYPE_AAAA => {
                let bytes = pkt.slice(pos, 16)?;
                let mut octets = [0u8; 16];
                octets.copy_from_slice(bytes);
                RData::Aaaa(Ipv6Addr::from(octets))
            }
            QTYPE_PTR => {
                let (_, name) = pkt.read_name(pos)?;
                RData::Ptr(name)
            }
            QTYPE_TXT => RData::Txt(pkt.slice(pos, rdlength)?.to_vec()),
            QTYPE_OPT => RData::Opt(pkt.slice(pos, rdlength)?.to_vec()),
            other => RData::Other(other, pkt.slice(pos, rdlength)?.to_vec()),
        };
        pos += rdlength;

        Ok((
            Record {
                qname,
                qtype,
                qclass,
                ttl,
                rdata,
            },
            pos,
        ))
    }
}
