//! RFC 6762/6763 multicast DNS service discovery.
//!
//! This crate implements just enough of mDNS/DNS-SD to discover local
//! streaming receivers: build a query, send it over multicast with
//! known-answer suppression, and aggregate `PTR`/`A`/`AAAA`/`SRV`/`TXT`
//! records into a [`device::Device`] per discovered name.

mod device;
mod error;
mod message;
mod packet;
mod query;
mod record;
mod socket;
mod txt;

pub use device::Device;
pub use error::{Error, Result};
pub use message::{Message, ParsedQuestion};
pub use query::{KnownAnswer, Query, Question, MAX_ANSWERS};
pub use record::{RData, Record, Srv, QCLASS_IN, QTYPE_A, QTYPE_AAAA, QTYPE_PTR, QTYPE_SRV, QTYPE_TXT};
pub use socket::{find_devices, find_egress_ipv4, Config, MULTICAST_ADDR, MULTICAST_PORT};
