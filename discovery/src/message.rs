//! Parsed representation of an inbound (or just-built outbound) mDNS
//! message: header plus the four RFC 1035 sections.

use crate::error::Result;
use crate::packet::Packet;
use crate::query::Query;
use crate::record::Record;

const FLAG_QR: u16 = 1 << 15;
const FLAG_TC: u16 = 1 << 9;
const RCODE_MASK: u16 = 0x000F;

#[derive(Clone, Debug)]
pub struct ParsedQuestion {
    pub qname: String,
    pub qtype: u16,
    pub qclass: u16,
}

#[derive(Debug)]
pub struct Message {
    pub id: u16,
    pub flags: u16,
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
    pub questions: Vec<ParsedQuestion>,
    pub answers: Vec<Record>,
    pub authorities: Vec<Record>,
    pub additional: Vec<Record>,
}

impl Message {
    pub fn parse(data: Vec<u8>) -> Result<Message> {
        let pkt = Packet::from_bytes(data);
        let id = pkt.read_u16(0)?;
        let flags = pkt.read_u16(2)?;
        let qdcount = pkt.read_u16(4)?;
        let ancount = pkt.read_u16(6)?;
        let nscount = pkt.read_u16(8)?;
        let arcount = pkt.read_u16(10)?;

        let mut pos = 12;
        let mut questions = Vec::with_capacity(qdcount as usize);
        for _ in 0..qdcount {
            let (n, qname) = pkt.read_name(pos)?;
            pos += n;
            let qtype = pkt.read_u16(pos)?;
            let qclass = pkt.read_u16(pos + 2)?;
            pos += 4;
            questions.push(ParsedQuestion {
                qname,
                qtype,
                qclass,
            });
        }

        let mut answers = Vec::with_capacity(ancount as usize);
        for _ in 0..ancount {
            let (rec, next) = Record::parse(&pkt, pos)?;
            pos = next;
            answers.push(rec);
        }

        let mut authorities = Vec::with_capacity(nscount as usize);
        for _ in 0..nscount {
            let (rec, next) = Record::parse(&pkt, pos)?;
            pos = next;
            authorities.push(rec);
        }

        let mut additional = Vec::with_capacity(arcount as usize);
        for _ in 0..arcount {
            let (rec, next) = Record::parse(&pkt, pos)?;
            pos = next;
            additional.push(rec);
        }

        Ok(Message {
            id,
            flags,
            qdcount,
            ancount,
            nscount,
            arcount,
            questions,
            answers,
            authorities,
            additional,
        })
    }

    pub fn is_response(&self) -> bool {
        self.flags & FLAG_QR != 0
    }

    pub fn truncated(&self) -> bool {
        self.flags & FLAG_TC != 0
    }

    pub fn has_error(&self) -> bool {
        self.flags & RCODE_MASK != 0
    }

    /// True if this (response) message answers one of `query`'s questions,
    /// i.e. any answer's name matches a pending question.
    pub fn is_applicable(&self, query: &Query) -> bool {
        self.answers.iter().any(|a| query.matches(&a.qname))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::KnownAnswer;
    use crate::record::QCLASS_IN;

    #[test]
    fn applicability_matches_parent_question() {
        let mut query = Query::new();
        query.add_question("_airplay._tcp.local");

        let mut answer_query = Query::new();
        answer_query.add_known_answer(KnownAnswer {
            qname: "_airplay._tcp.local".into(),
            ptr: "Apple TV._airplay._tcp.local".into(),
            qtype: 12,
            qclass: QCLASS_IN,
            ttl: 120,
        });
        let packets = answer_query.packet_data();
        let msg = Message::parse(packets[0].clone()).unwrap();
        assert!(msg.is_applicable(&query));
    }

    #[test]
    fn error_rcode_is_detected() {
        let mut pkt = Packet::new();
        pkt.write_u16(1);
        pkt.write_u16(FLAG_QR | 0x0002); // SERVFAIL
        pkt.write_u16(0);
        pkt.write_u16(0);
        pkt.write_u16(0);
        pkt.write_u16(0);
        let msg = Message::parse(pkt.data).unwrap();
        assert!(msg.has_error());
        assert!(msg.is_response());
    }
}
