//! A small HTTP/1.1 client and server, enough to fetch a remote resource
//! and to serve an HLS playlist and its segments with byte-range support.

mod client;
mod content;
mod cookie;
mod error;
mod frame;
mod headers;
mod range;
mod request;
mod response;
mod server;

pub use client::{HttpClient, PostData};
pub use content::{Body, FileBody, MAX_SEND};
pub use cookie::{Cookie, CookieJar};
pub use error::{Error, Result};
pub use range::{parse_header as parse_range_header, Range};
pub use request::Request;
pub use response::Response;
pub use server::{Handler, HttpServer};
