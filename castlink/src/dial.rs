//! A thin helper over the receiver's unencrypted companion port (8008):
//! read its UPnP device descriptor and ask it to reboot. This sits
//! alongside the TLS control channel the same way the source's `Chromecast`
//! device keeps a second plain-HTTP client (`self.dial`) next to its main
//! cast client.

use quick_xml::events::Event;
use quick_xml::Reader;

use http11::{HttpClient, PostData};

use crate::error::Result;

pub const DIAL_PORT: u16 = 8008;

/// The subset of a receiver's UPnP device descriptor this helper reads.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub friendly_name: String,
    pub model_name: String,
    pub manufacturer: String,
}

pub struct DialClient {
    http: HttpClient,
}

impl DialClient {
    pub fn new(host: impl Into<String>) -> DialClient {
        DialClient {
            http: HttpClient::new(host, DIAL_PORT),
        }
    }

    /// Fetch and parse `/ssdp/device-desc.xml`.
    pub fn device_descriptor(&mut self) -> Result<DeviceDescriptor> {
        let body = self.http.simple_request("/ssdp/device-desc.xml")?;
        Ok(parse_device_descriptor(&String::from_utf8_lossy(&body)))
    }

    /// Ask the receiver to reboot via `/setup/reboot`.
    pub fn reboot(&mut self) -> Result<()> {
        self.http.post_data(
            "/setup/reboot",
            Some(PostData::Raw(br#"{"params": "now"}"#.to_vec())),
            Some("application/json"),
        )?;
        Ok(())
    }
}

fn parse_device_descriptor(xml: &str) -> DeviceDescriptor {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut descriptor = DeviceDescriptor::default();
    let mut current_tag = String::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event(&mut buf) {
            Ok(Event::Start(ref e)) => {
                current_tag = String::from_utf8_lossy(e.name()).into_owned();
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape_and_decode(&reader).unwrap_or_default();
                match current_tag.as_str() {
                    "friendlyName" => descriptor.friendly_name = text,
                    "modelName" => descriptor.model_name = text,
                    "manufacturer" => descriptor.manufacturer = text,
                    _ => {}
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    descriptor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_friendly_name_and_model_from_device_descriptor() {
        let xml = r#"<?xml version="1.0"?>
            <root xmlns="urn:schemas-upnp-org:device-1-0">
              <device>
                <deviceType>urn:dial-multiscreen-org:device:dial:1</deviceType>
                <friendlyName>Living Room TV</friendlyName>
                <manufacturer>Google Inc.</manufacturer>
                <modelName>Chromecast</modelName>
              </device>
            </root>"#;
        let descriptor = parse_device_descriptor(xml);
        assert_eq!(descriptor.friendly_name, "Living Room TV");
        assert_eq!(descriptor.manufacturer, "Google Inc.");
        assert_eq!(descriptor.model_name, "Chromecast");
    }
}
