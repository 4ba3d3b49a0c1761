//! The Castv2 wire envelope: a length-prefixed, field-tagged frame.
//!
//! Each frame on the wire is a 4-byte big-endian length followed by that
//! many bytes of field-tagged payload (fields 1-7: protocol version,
//! source id, destination id, namespace, payload type, utf8 payload,
//! binary payload). This is a hand-rolled codec, not a generated
//! protobuf, matching the device's actual wire contract literally rather
//! than going through a `.proto` schema.

use byteorder::{BigEndian, ByteOrder};
use serde_json::Value;

use crate::error::{Error, Result};

pub const CONNECTION_NS: &str = "urn:x-cast:com.google.cast.tp.connection";
pub const HEARTBEAT_NS: &str = "urn:x-cast:com.google.cast.tp.heartbeat";
pub const RECEIVER_NS: &str = "urn:x-cast:com.google.cast.receiver";
pub const MEDIA_NS: &str = "urn:x-cast:com.google.cast.media";
pub const PLATFORM_DEST: &str = "receiver-0";
pub const DEFAULT_SOURCE: &str = "source-0";

const TYPE_STRING: u8 = 2;
const TYPE_BINARY: u8 = 2;

const FIELD_PROTOCOL: u8 = 1;
const FIELD_SOURCE_ID: u8 = 2;
const FIELD_DESTINATION_ID: u8 = 3;
const FIELD_NAMESPACE: u8 = 4;
const FIELD_PAYLOAD_TYPE: u8 = 5;
const FIELD_UTF8_PAYLOAD: u8 = 6;
const FIELD_BINARY_PAYLOAD: u8 = 7;

/// `payload_type` as carried on the wire: `0` string, `1` binary.
pub const PAYLOAD_STRING: u8 = 0;
pub const PAYLOAD_BINARY: u8 = 1;

#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    pub protocol: u8,
    pub source_id: String,
    pub destination_id: String,
    pub namespace: String,
    pub payload_type: u8,
    pub utf8_payload: String,
    pub binary_payload: Vec<u8>,
}

impl Default for Envelope {
    fn default() -> Self {
        Envelope {
            protocol: 0,
            source_id: DEFAULT_SOURCE.to_owned(),
            destination_id: PLATFORM_DEST.to_owned(),
            namespace: CONNECTION_NS.to_owned(),
            payload_type: PAYLOAD_STRING,
            utf8_payload: String::new(),
            binary_payload: Vec::new(),
        }
    }
}

impl Envelope {
    pub fn new(namespace: impl Into<String>, destination_id: impl Into<String>) -> Self {
        Envelope {
            namespace: namespace.into(),
            destination_id: destination_id.into(),
            ..Envelope::default()
        }
    }

    pub fn with_source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = source_id.into();
        self
    }

    pub fn with_json(mut self, value: &Value) -> Self {
        self.utf8_payload = value.to_string();
        self.payload_type = PAYLOAD_STRING;
        self
    }

    pub fn json(&self) -> Result<Value> {
        serde_json::from_str(&self.utf8_payload)
            .map_err(|err| Error::Envelope(format!("payload was not valid JSON: {}", err)))
    }

    /// Encode this envelope into a full wire frame: 4-byte big-endian
    /// length prefix followed by the field-tagged body.
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.push(pack_tag(FIELD_PROTOCOL, 0));
        body.push(self.protocol);

        write_string_field(&mut body, FIELD_SOURCE_ID, &self.source_id);
        write_string_field(&mut body, FIELD_DESTINATION_ID, &self.destination_id);
        write_string_field(&mut body, FIELD_NAMESPACE, &self.namespace);

        body.push(pack_tag(FIELD_PAYLOAD_TYPE, 0));
        body.push(self.payload_type);

        if self.payload_type == PAYLOAD_BINARY && !self.binary_payload.is_empty() {
            body.push(pack_tag(FIELD_BINARY_PAYLOAD, TYPE_BINARY));
            body.extend(encode_varint(self.binary_payload.len()));
            body.extend_from_slice(&self.binary_payload);
        } else {
            body.push(pack_tag(FIELD_UTF8_PAYLOAD, TYPE_STRING));
            body.extend(encode_varint(self.utf8_payload.len()));
            body.extend_from_slice(self.utf8_payload.as_bytes());
        }

        let mut frame = Vec::with_capacity(4 + body.len());
        let mut len_buf = [0u8; 4];
        BigEndian::write_u32(&mut len_buf, body.len() as u32);
        frame.extend_from_slice(&len_buf);
        frame.extend_from_slice(&body);
        frame
    }

    /// Decode one frame's body (the bytes *after* the 4-byte length
    /// prefix has already been stripped by the caller).
    pub fn decode(data: &[u8]) -> Result<Envelope> {
        let mut env = Envelope {
            source_id: String::new(),
            destination_id: String::new(),
            namespace: String::new(),
            ..Envelope::default()
        };
        let mut pos = 0;
        while pos < data.len() {
            let (field, wire_type) = unpack_tag(data[pos]);
            pos += 1;
            let _ = wire_type;
            match field {
                FIELD_PROTOCOL => {
                    env.protocol = read_u8(data, pos)?;
                    pos += 1;
                }
                FIELD_SOURCE_ID => {
                    let (s, n) = read_string(data, pos)?;
                    env.source_id = s;
                    pos += n;
                }
                FIELD_DESTINATION_ID => {
                    let (s, n) = read_string(data, pos)?;
                    env.destination_id = s;
                    pos += n;
                }
                FIELD_NAMESPACE => {
                    let (s, n) = read_string(data, pos)?;
                    env.namespace = s;
                    pos += n;
                }
                FIELD_PAYLOAD_TYPE => {
                    env.payload_type = read_u8(data, pos)?;
                    pos += 1;
                }
                FIELD_UTF8_PAYLOAD => {
                    let (len, n) = decode_varint(&data[pos..])?;
                    pos += n;
                    let bytes = data
                        .get(pos..pos + len)
                        .ok_or_else(|| Error::Envelope("truncated utf8 payload".into()))?;
                    env.utf8_payload = String::from_utf8_lossy(bytes).into_owned();
                    pos += len;
                }
                FIELD_BINARY_PAYLOAD => {
                    let (len, n) = decode_varint(&data[pos..])?;
                    pos += n;
                    let bytes = data
                        .get(pos..pos + len)
                        .ok_or_else(|| Error::Envelope("truncated binary payload".into()))?;
                    env.binary_payload = bytes.to_vec();
                    pos += len;
                }
                other => {
                    return Err(Error::Envelope(format!("unknown field id {}", other)));
                }
            }
        }
        Ok(env)
    }
}

fn pack_tag(field: u8, wire_type: u8) -> u8 {
    (field << 3) | wire_type
}

fn unpack_tag(byte: u8) -> (u8, u8) {
    (byte >> 3, byte & 0x7)
}

fn read_u8(data: &[u8], pos: usize) -> Result<u8> {
    data.get(pos)
        .copied()
        .ok_or_else(|| Error::Envelope("truncated field".into()))
}

fn write_string_field(body: &mut Vec<u8>, field: u8, value: &str) {
    body.push(pack_tag(field, TYPE_STRING));
    body.push(value.len() as u8);
    body.extend_from_slice(value.as_bytes());
}

fn read_string(data: &[u8], pos: usize) -> Result<(String, usize)> {
    let len = read_u8(data, pos)? as usize;
    let bytes = data
        .get(pos + 1..pos + 1 + len)
        .ok_or_else(|| Error::Envelope("truncated string field".into()))?;
    Ok((String::from_utf8_lossy(bytes).into_owned(), len + 1))
}

/// Base-128 varint used to prefix the `utf8_payload`/`binary_payload`
/// field lengths (not the frame length, which is always a 4-byte
/// fixed-width big-endian integer).
fn encode_varint(mut len: usize) -> Vec<u8> {
    let mut out = Vec::new();
    while len > 0x7F {
        out.push((len & 0x7F) as u8 | 0x80);
        len >>= 7;
    }
    out.push((len & 0x7F) as u8);
    out
}

fn decode_varint(data: &[u8]) -> Result<(usize, usize)> {
    let mut value: usize = 0;
    let mut base: usize = 1;
    let mut read = 0;
    for &byte in data {
        read += 1;
        value += (byte & 0x7F) as usize * base;
        if byte & 0x80 != 0 {
            base *= 128;
        } else {
            return Ok((value, read));
        }
    }
    Err(Error::Envelope("truncated varint".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_string_payload() {
        let env = Envelope::new(RECEIVER_NS, PLATFORM_DEST).with_json(&serde_json::json!({
            "type": "GET_STATUS",
        }));
        let frame = env.encode();
        let len = BigEndian::read_u32(&frame[..4]) as usize;
        assert_eq!(frame.len(), 4 + len);

        let decoded = Envelope::decode(&frame[4..]).unwrap();
        assert_eq!(decoded.namespace, RECEIVER_NS);
        assert_eq!(decoded.destination_id, PLATFORM_DEST);
        assert_eq!(decoded.json().unwrap()["type"], "GET_STATUS");
    }

    #[test]
    fn round_trips_binary_payload() {
        let mut env = Envelope::new(MEDIA_NS, "transport-1");
        env.payload_type = PAYLOAD_BINARY;
        env.binary_payload = vec![0xDE, 0xAD, 0xBE, 0xEF];
        let frame = env.encode();
        let decoded = Envelope::decode(&frame[4..]).unwrap();
        assert_eq!(decoded.binary_payload, vec![0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn varint_round_trips_long_payload() {
        let long_payload = "x".repeat(300);
        let env = Envelope::new(MEDIA_NS, "transport-1")
            .with_json(&Value::String(long_payload.clone()));
        let frame = env.encode();
        let decoded = Envelope::decode(&frame[4..]).unwrap();
        assert_eq!(decoded.json().unwrap(), Value::String(long_payload));
    }

    #[test]
    fn unknown_field_id_is_rejected() {
        let body = vec![pack_tag(9, 0), 1];
        assert!(Envelope::decode(&body).is_err());
    }
}
