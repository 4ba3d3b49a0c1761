//! Parser for `TXT` record key=value pairs.
//!
//! A `TXT` rdata is a sequence of length-prefixed byte strings (RFC 1035
//! §3.3.14), each conventionally holding one `key=value` pair (RFC 6763
//! §6). Strings without an `=` are kept with an empty value, matching
//! `atavism`'s treatment of boolean-style TXT entries.

use nom::types::CompleteStr;
use nom::{alphanumeric, char, do_parse, named, take_while};

use std::collections::HashMap;

named!(
    key_value<CompleteStr, (CompleteStr, CompleteStr)>,
    do_parse!(key: alphanumeric >> char!('=') >> val: take_while!(|_| true) >> (key, val))
);

/// Split a raw `TXT` rdata blob into its length-prefixed strings.
fn split_strings(rdata: &[u8]) -> Vec<&[u8]> {
    let mut strings = Vec::new();
    let mut pos = 0;
    while pos < rdata.len() {
        let len = rdata[pos] as usize;
        pos += 1;
        if pos + len > rdata.len() {
            break;
        }
        strings.push(&rdata[pos..pos + len]);
        pos += len;
    }
    strings
}

/// Decode a `TXT` rdata blob into a key/value map. Malformed or non-UTF8
/// entries are skipped rather than failing the whole record, since a single
/// vendor-specific garbage entry should not block discovery of an otherwise
/// well-formed device.
pub fn decode(rdata: &[u8]) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for raw in split_strings(rdata) {
        let text = match std::str::from_utf8(raw) {
            Ok(s) => s,
            Err(_) => continue,
        };
        match key_value(CompleteStr(text)) {
            Ok((_, (key, val))) => {
                map.insert(key.as_ref().to_owned(), val.as_ref().to_owned());
            }
            Err(_) => {
                if !text.is_empty() {
                    map.insert(text.to_owned(), String::new());
                }
            }
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(s: &str) -> Vec<u8> {
        let mut v = vec![s.len() as u8];
        v.extend_from_slice(s.as_bytes());
        v
    }

    #[test]
    fn decodes_multiple_entries() {
        let mut rdata = Vec::new();
        rdata.extend(tag("md=Chromecast"));
        rdata.extend(tag("fn=Living Room"));
        rdata.extend(tag("id=abc123"));
        let map = decode(&rdata);
        assert_eq!(map["md"], "Chromecast");
        assert_eq!(map["fn"], "Living Room");
        assert_eq!(map["id"], "abc123");
    }

    #[test]
    fn value_containing_equals_is_kept_whole() {
        let rdata = tag("fn=Bob's=Cast");
        let map = decode(&rdata);
        assert_eq!(map["fn"], "Bob's=Cast");
    }

    #[test]
    fn boolean_entry_without_equals() {
        let rdata = tag("rs");
        let map = decode(&rdata);
        assert_eq!(map["rs"], "");
    }
}
