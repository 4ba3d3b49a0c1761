//! Aggregated view of a discovered device: the `PTR` target plus whatever
//! `A`/`AAAA`/`SRV`/`TXT` records arrived alongside it in the additional
//! section of the same response.

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::record::{RData, Record, Srv};
use crate::txt;

#[derive(Clone, Debug, Default)]
pub struct Device {
    /// The `PTR` target, e.g. `"Living Room-abcdef._googlecast._tcp.local"`.
    pub name: String,
    pub a: Option<Ipv4Addr>,
    pub aaaa: Option<Ipv6Addr>,
    pub srv: Option<Srv>,
    pub txt: Option<Vec<u8>>,
}

impl Device {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Device {
            name: name.into(),
            ..Device::default()
        }
    }

    /// Fold in any `A`/`AAAA`/`SRV`/`TXT` records found in a response's
    /// additional section, keeping the device's own `PTR` name as-is.
    pub(crate) fn absorb_additional(&mut self, additional: &[Record]) {
        for rec in additional {
            match &rec.rdata {
                RData::A(addr) => self.a = Some(*addr),
                RData::Aaaa(addr) => self.aaaa = Some(*addr),
                RData::Srv(srv) => self.srv = Some(srv.clone()),
                RData::Txt(bytes) => self.txt = Some(bytes.clone()),
                _ => {}
            }
        }
    }

    /// The port to connect on, if an `SRV` record was seen.
    pub fn port(&self) -> Option<u16> {
        self.srv.as_ref().map(|s| s.port)
    }

    /// Decoded `TXT` key/value pairs, or an empty map if none were seen.
    pub fn txt_map(&self) -> HashMap<String, String> {
        match &self.txt {
            Some(bytes) => txt::decode(bytes),
            None => HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::QTYPE_A;

    #[test]
    fn absorbs_additional_records() {
        let mut device = Device::new("Chromecast._googlecast._tcp.local");
        let additional = vec![Record {
            qname: "Chromecast._googlecast._tcp.local".into(),
            qtype: QTYPE_A,
            qclass: 1,
            ttl: 120,
            rdata: RData::A(Ipv4Addr::new(192, 168, 1, 42)),
        }];
        device.absorb_additional(&additional);
        assert_eq!(device.a, Some(Ipv4Addr::new(192, 168, 1, 42)));
    }
}
