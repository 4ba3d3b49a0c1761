//! A thin AppleTV control helper built atop `http11::HttpClient`: fetch
//! device info, drive playback, and poll scrub position. Interaction with
//! the real AirPlay/plist wire format is out of scope; this treats
//! `/server-info` and `/scrub` as the same `key: value` line format the
//! `/play` request body uses.

use std::collections::HashMap;

use http11::{HttpClient, PostData};

use crate::error::{Error, Result};

pub const DEFAULT_PORT: u16 = 7000;
const STREAMING_FEATURE_BIT: u32 = 1 << 4;

pub struct AppleTvClient {
    http: HttpClient,
    pub model: String,
    pub features: u32,
}

impl AppleTvClient {
    /// Connect and fetch `/server-info`.
    pub fn connect(host: impl Into<String>, port: u16) -> Result<AppleTvClient> {
        let mut http = HttpClient::new(host, port);
        let body = http.simple_request("/server-info")?;
        let info = parse_key_value(&body);
        let model = info.get("model").cloned().unwrap_or_default();
        let features = info.get("features").and_then(|v| v.parse().ok()).unwrap_or(0);
        Ok(AppleTvClient { http, model, features })
    }

    pub fn supports_streaming(&self) -> bool {
        self.features & STREAMING_FEATURE_BIT != 0
    }

    /// Stop whatever is playing, then start playback of `url` from the
    /// beginning.
    pub fn play(&mut self, url: &str) -> Result<()> {
        let _ = self.stop();
        let data = PostData::Form(vec![
            ("Content-Location".to_owned(), url.to_owned()),
            ("Start-Position".to_owned(), "0".to_owned()),
        ]);
        let resp = self.http.post_data("/play", Some(data), Some("text/parameters"))?;
        if resp.code != 200 {
            return Err(Error::AppleTvRejected(resp.code));
        }
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        self.http.post_data("/stop", None, None)?;
        Ok(())
    }

    /// Current playback position and total duration, in seconds.
    pub fn scrub(&mut self) -> Result<(f64, f64)> {
        let body = self.http.simple_request("/scrub")?;
        let info = parse_key_value(&body);
        let position = info.get("position").and_then(|v| v.parse().ok()).unwrap_or(0.0);
        let duration = info.get("duration").and_then(|v| v.parse().ok()).unwrap_or(0.0);
        Ok((position, duration))
    }
}

fn parse_key_value(body: &[u8]) -> HashMap<String, String> {
    String::from_utf8_lossy(body)
        .lines()
        .filter_map(|line| {
            let mut parts = line.splitn(2, ':');
            let key = parts.next()?.trim();
            let value = parts.next()?.trim();
            if key.is_empty() {
                None
            } else {
                Some((key.to_owned(), value.to_owned()))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_server_info_key_value_lines() {
        let info = parse_key_value(b"model: AppleTV3,2\nfeatures: 16\n");
        assert_eq!(info.get("model").map(String::as_str), Some("AppleTV3,2"));
        assert_eq!(info.get("features").map(String::as_str), Some("16"));
    }

    #[test]
    fn streaming_feature_bit_is_checked() {
        let client = AppleTvClient {
            http: HttpClient::new("127.0.0.1", DEFAULT_PORT),
            model: "AppleTV3,2".to_owned(),
            features: 1 << 4,
        };
        assert!(client.supports_streaming());
    }
}
