//! The controller that wires the three engines together: find a
//! receiver, stand up a local HTTP server over the encoded media, and
//! drive the receiver through its control channel until playback
//! finishes.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::Rng;

use castlink::{ChromecastClient, DialClient};
use discovery::Device;
use http11::HttpServer;

use crate::appletv::AppleTvClient;
use crate::config::{Config, BIND_PORT_RANGE, BIND_RETRIES};
use crate::encoder;
use crate::error::{Error, Result};
use crate::static_server;

const CAST_SERVICE: &str = "_googlecast._tcp.local";
const AIRPLAY_SERVICE: &str = "_airplay._tcp.local";
const FRIENDLY_NAME_KEY: &str = "fn";
const DEFAULT_CAST_PORT: u16 = 8009;
const STATUS_POLL: Duration = Duration::from_secs(2);

/// A discovered receiver, tagged by which control protocol drives it.
enum Receiver {
    Cast(Device),
    AirPlay(Device),
}

pub struct Controller {
    config: Config,
}

impl Controller {
    pub fn new(config: Config) -> Controller {
        Controller { config }
    }

    pub fn run(&self) -> Result<()> {
        let receiver = self.find_device()?;
        let egress_ip = discovery::find_egress_ipv4()?;

        let scratch_dir = std::env::temp_dir().join(format!("castbeam-{}", std::process::id()));
        let playlist_path = encoder::segment(&self.config.source_path, &scratch_dir)?;
        let serve_dir = playlist_path.parent().unwrap_or(&scratch_dir).to_path_buf();
        let playlist_name = playlist_path.file_name().and_then(|n| n.to_str()).unwrap_or(encoder::PLAYLIST_NAME).to_owned();

        let (mut server, port) = bind_server(&self.config.bind_host, serve_dir)?;
        info!("serving {} on {}:{}", playlist_name, egress_ip, port);

        let url = format!("http://{}:{}/{}", egress_ip, port, playlist_name);
        let result = match &receiver {
            Receiver::Cast(device) => self.drive_cast_playback(device, &url),
            Receiver::AirPlay(device) => self.drive_airplay_playback(device, &url),
        };

        server.stop();
        let _ = std::fs::remove_dir_all(&scratch_dir);
        result
    }

    /// Probe both service names for a device matching the configured name,
    /// preferring a Chromecast-style match over an AirPlay one.
    fn find_device(&self) -> Result<Receiver> {
        if let Some(device) = self.find_on_service(CAST_SERVICE, |d| d.txt_map().get(FRIENDLY_NAME_KEY).map(String::as_str) == Some(self.config.device_name.as_str()))? {
            return Ok(Receiver::Cast(device));
        }
        if let Some(device) = self.find_on_service(AIRPLAY_SERVICE, |d| ptr_display_name(d) == self.config.device_name)? {
            return Ok(Receiver::AirPlay(device));
        }
        Err(Error::DeviceNotFound(self.config.device_name.clone()))
    }

    fn find_on_service(&self, qname: &str, matches: impl Fn(&Device) -> bool) -> Result<Option<Device>> {
        let discovery_config = discovery::Config { timeout: self.config.discovery_timeout, ..discovery::Config::default() };
        match discovery::find_devices(qname, &discovery_config) {
            Ok(devices) => Ok(devices.into_values().find(matches)),
            Err(discovery::Error::Timeout) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn drive_cast_playback(&self, device: &Device, url: &str) -> Result<()> {
        let addr = device.a.ok_or_else(|| Error::DeviceNotFound(self.config.device_name.clone()))?;
        let port = device.port().unwrap_or(DEFAULT_CAST_PORT);

        if let Ok(descriptor) = DialClient::new(addr.to_string()).device_descriptor() {
            debug!("receiver device descriptor: {:?}", descriptor);
        }

        let client = ChromecastClient::connect(&addr.to_string(), port)?;
        let session = client.launch_app(None)?;
        client.connect_session(&session.session_id)?;
        client.load_movie(&session.session_id, url, "application/vnd.apple.mpegurl", None)?;
        client.play_media(&session.session_id)?;

        loop {
            client.get_media_status(&session.session_id)?;
            match client.session(&session.session_id) {
                Some(session) if session.media_finished => break,
                Some(_) => thread::sleep(STATUS_POLL),
                None => break,
            }
        }

        client.stop_apps()?;
        Ok(())
    }

    fn drive_airplay_playback(&self, device: &Device, url: &str) -> Result<()> {
        let addr = device.a.ok_or_else(|| Error::DeviceNotFound(self.config.device_name.clone()))?;
        let port = device.port().unwrap_or(crate::appletv::DEFAULT_PORT);

        let mut client = AppleTvClient::connect(addr.to_string(), port)?;
        if !client.supports_streaming() {
            return Err(Error::StreamingUnsupported(self.config.device_name.clone()));
        }
        client.play(url)?;

        loop {
            let (position, duration) = client.scrub()?;
            if duration > 0.0 && position >= duration {
                break;
            }
            thread::sleep(STATUS_POLL);
        }

        client.stop()?;
        Ok(())
    }
}

/// The receiver's display name as advertised over mDNS: the portion of the
/// `PTR` target before the service suffix.
fn ptr_display_name(device: &Device) -> &str {
    device.name.split('.').next().unwrap_or(&device.name)
}

/// Bind the local HTTP server on a randomised port in `BIND_PORT_RANGE`,
/// retrying on bind failure up to `BIND_RETRIES` times.
fn bind_server(host: &str, serve_dir: std::path::PathBuf) -> Result<(HttpServer, u16)> {
    let handler = Arc::new(static_server::handler(serve_dir));
    for _ in 0..BIND_RETRIES {
        let port = rand::thread_rng().gen_range(BIND_PORT_RANGE.0, BIND_PORT_RANGE.1);
        let mut server = HttpServer::new(host, port, handler.clone());
        match server.start() {
            Ok(()) => return Ok((server, port)),
            Err(_) => continue,
        }
    }
    Err(Error::BindFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ptr_display_name_strips_service_suffix() {
        let device = Device {
            name: "Living Room._airplay._tcp.local".to_owned(),
            ..Device::default()
        };
        assert_eq!(ptr_display_name(&device), "Living Room");
    }
}
