//! Query construction: questions, known-answer suppression, and the
//! multi-packet splitting required once more than [`MAX_ANSWERS`] known
//! answers have accumulated.

use rand::Rng;

use crate::packet::Packet;
use crate::record::{QCLASS_IN, QTYPE_ANY};

/// RFC 6762 recommends keeping responses under one packet; `atavism` (the
/// implementation this engine's wire behavior is grounded on) caps known
/// answers per outbound datagram at this value and sets `TC` on every
/// packet but the last once the cap is exceeded.
pub const MAX_ANSWERS: usize = 24;

const FLAG_TC: u16 = 1 << 9;

#[derive(Clone, Debug)]
pub struct Question {
    pub qname: String,
    pub qtype: u16,
    pub qclass: u16,
}

#[derive(Clone, Debug)]
pub struct KnownAnswer {
    pub qname: String,
    pub ptr: String,
    pub qtype: u16,
    pub qclass: u16,
    pub ttl: i32,
}

#[derive(Debug)]
pub struct Query {
    pub id: u16,
    pub questions: Vec<Question>,
    pub known_answers: Vec<KnownAnswer>,
}

impl Query {
    pub fn new() -> Self {
        Query {
            id: rand::thread_rng().gen(),
            questions: Vec::new(),
            known_answers: Vec::new(),
        }
    }

    pub fn add_question(&mut self, qname: impl Into<String>) {
        self.questions.push(Question {
            qname: qname.into(),
            qtype: QTYPE_ANY,
            qclass: QCLASS_IN,
        });
    }

    /// Record a `PTR` answer so that future outbound packets suppress it
    /// (RFC 6762 §7.1 known-answer suppression).
    pub fn add_known_answer(&mut self, answer: KnownAnswer) {
        self.known_answers.push(answer);
    }

    /// True if `qname` (or its immediate parent, i.e. stripping the leading
    /// label) matches one of this query's outstanding questions.
    pub fn matches(&self, qname: &str) -> bool {
        self.questions.iter().any(|q| {
            q.qname == qname || {
                match qname.find('.') {
                    Some(idx) => q.qname == qname[idx + 1..],
                    None => false,
                }
            }
        })
    }

    /// Build the set of datagrams to send for this query. Questions are
    /// only included in the first packet; known answers are chunked across
    /// as many packets as needed, `TC` set on all but the last.
    pub fn packet_data(&self) -> Vec<Vec<u8>> {
        let mut packets = Vec::new();
        let mut idx = 0;
        loop {
            let remaining = self.known_answers.len().saturating_sub(idx);
            let ac = remaining.min(MAX_ANSWERS);
            let qc = if idx == 0 { self.questions.len() } else { 0 };
            if qc + ac == 0 {
                break;
            }

            let mut flags = 0u16;
            if remaining > MAX_ANSWERS {
                flags |= FLAG_TC;
            }

            let mut pkt = Packet::new();
            pkt.write_u16(self.id);
            pkt.write_u16(flags);
            pkt.write_u16(qc as u16);
            pkt.write_u16(ac as u16);
            pkt.write_u16(0);
            pkt.write_u16(0);

            for q in &self.questions[..qc] {
                pkt.write_name(&q.qname);
                pkt.write_u16(q.qtype);
                pkt.write_u16(q.qclass);
            }

            for a in &self.known_answers[idx..idx + ac] {
                pkt.write_name(&a.qname);
                pkt.write_u16(a.qtype);
                pkt.write_u16(a.qclass);
                pkt.write_u32(a.ttl as u32);
                let rdlen_pos = pkt.len();
                pkt.write_u16(0);
                let rdata_start = pkt.len();
                pkt.write_name(&a.ptr);
                let rdlen = (pkt.len() - rdata_start) as u16;
                pkt.write_u16_at(rdlen_pos, rdlen);
            }

            packets.push(pkt.data);
            if ac == 0 {
                break;
            }
            idx += ac;
        }
        packets
    }
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[test]
    fn label_pointer_round_trip() {
        let mut query = Query::new();
        query.add_question("_airplay._tcp.local");
        let packets = query.packet_data();
        assert_eq!(packets.len(), 1);

        let msg = Message::parse(packets[0].clone()).unwrap();
        assert_eq!(msg.questions.len(), 1);
        assert_eq!(msg.questions[0].qname, "_airplay._tcp.local");
        assert_eq!(msg.questions[0].qtype, QTYPE_ANY);
        assert_eq!(msg.ancount, 0);
        assert!(!msg.truncated());
    }

    #[test]
    fn known_answer_suppression_and_truncation() {
        let mut query = Query::new();
        query.add_question("_airplay._tcp.local");
        query.add_known_answer(KnownAnswer {
            qname: "_airplay._tcp.local".into(),
            ptr: "Apple TV._airplay._tcp.local".into(),
            qtype: 12,
            qclass: QCLASS_IN,
            ttl: 120,
        });
        let packets = query.packet_data();
        assert_eq!(packets.len(), 1);
        let msg = Message::parse(packets[0].clone()).unwrap();
        assert_eq!(msg.answers.len(), 1);

        for i in 0..(MAX_ANSWERS) {
            query.add_known_answer(KnownAnswer {
                qname: "_airplay._tcp.local".into(),
                ptr: format!("Device {}._airplay._tcp.local", i),
                qtype: 12,
                qclass: QCLASS_IN,
                ttl: 120,
            });
        }
        // 1 + 24 = 25 known answers now, over the 24-per-packet cap.
        let packets = query.packet_data();
        assert_eq!(packets.len(), 2);
        let first = Message::parse(packets[0].clone()).unwrap();
        assert!(first.truncated());
        let second = Message::parse(packets[1].clone()).unwrap();
        assert!(!second.truncated());
        assert_eq!(first.answers.len() + second.answers.len(), 25);
    }
}
