//! Multicast socket setup and the `find_devices` probe/backoff loop.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::time::{Duration, Instant};

use socket2::{Domain, Protocol, Socket, Type};

use crate::device::Device;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::query::Query;
use crate::record::{QTYPE_PTR, RData};

pub const MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);
pub const MULTICAST_PORT: u16 = 5353;

const DEFAULT_TTL: u32 = 2;
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Tunables for a single discovery run.
#[derive(Clone, Debug)]
pub struct Config {
    pub timeout: Duration,
    pub ttl: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            timeout: Duration::from_secs(10),
            ttl: DEFAULT_TTL,
        }
    }
}

/// Determine the local IPv4 egress address by "connecting" a UDP socket to
/// an unreachable public address and reading back the chosen local
/// endpoint. No packets actually leave the host for a UDP connect.
pub fn find_egress_ipv4() -> Result<Ipv4Addr> {
    let sock = UdpSocket::bind("0.0.0.0:0").map_err(|_| Error::NoInterface)?;
    sock.connect("8.8.8.8:56").map_err(|_| Error::NoInterface)?;
    match sock.local_addr().map_err(|_| Error::NoInterface)?.ip() {
        std::net::IpAddr::V4(addr) => Ok(addr),
        std::net::IpAddr::V6(_) => Err(Error::NoInterface),
    }
}

fn make_socket(egress: Ipv4Addr, ttl: u32) -> Result<UdpSocket> {
    let sock = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    sock.set_reuse_address(true)?;
    #[cfg(unix)]
    sock.set_reuse_port(true)?;
    sock.set_read_timeout(Some(POLL_INTERVAL))?;

    let bind_addr = SocketAddrV4::new(MULTICAST_ADDR, MULTICAST_PORT);
    sock.bind(&bind_addr.into())?;

    sock.set_multicast_ttl_v4(ttl)?;
    sock.set_multicast_if_v4(&egress)?;
    sock.set_multicast_loop_v4(false)?;
    sock.join_multicast_v4(&MULTICAST_ADDR, &egress)?;

    Ok(sock.into())
}

/// Probe the network for devices answering `qname`/`ANY`, for up to
/// `config.timeout`. Returns devices keyed by their `PTR` target name.
/// Malformed datagrams are dropped (logged at debug); the run is considered
/// successful if at least one device was found.
pub fn find_devices(qname: &str, config: &Config) -> Result<HashMap<String, Device>> {
    let egress = find_egress_ipv4()?;
    let sock = make_socket(egress, config.ttl)?;

    let mut query = Query::new();
    query.add_question(qname);

    let mut devices: HashMap<String, Device> = HashMap::new();
    let deadline = Instant::now() + config.timeout;
    let mut next_send = Instant::now();
    let mut delay = Duration::from_secs(1);
    let dest = SocketAddrV4::new(MULTICAST_ADDR, MULTICAST_PORT);

    let mut buf = [0u8; 16384];
    while Instant::now() < deadline {
        if Instant::now() >= next_send {
            for packet in query.packet_data() {
                let _ = sock.send_to(&packet, dest);
            }
            next_send += delay;
            delay *= 2;
        }

        match sock.recv_from(&mut buf) {
            Ok((n, _addr)) => {
                let msg = match Message::parse(buf[..n].to_vec()) {
                    Ok(m) => m,
                    Err(err) => {
                        log::debug!("dropping malformed mDNS datagram: {}", err);
                        continue;
                    }
                };
                if !msg.is_response() || msg.answers.is_empty() || msg.has_error() {
                    continue;
                }
                if !msg.is_applicable(&query) {
                    continue;
                }

                for answer in &msg.answers {
                    if answer.qtype != QTYPE_PTR {
                        continue;
                    }
                    let target = match &answer.rdata {
                        RData::Ptr(name) => name.clone(),
                        _ => continue,
                    };

                    query.add_known_answer(crate::query::KnownAnswer {
                        qname: answer.qname.clone(),
                        ptr: target.clone(),
                        qtype: answer.qtype,
                        qclass: answer.qclass,
                        ttl: answer.ttl,
                    });

                    let device = devices
                        .entry(target.clone())
                        .or_insert_with(|| Device::new(target.clone()));
                    device.absorb_additional(&msg.additional);
                }
            }
            Err(ref err) if err.kind() == std::io::ErrorKind::WouldBlock => continue,
            Err(ref err) if err.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(err) => return Err(Error::Socket(err)),
        }
    }

    if devices.is_empty() {
        return Err(Error::Timeout);
    }
    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_match_spec() {
        let config = Config::default();
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.ttl, 2);
    }
}
