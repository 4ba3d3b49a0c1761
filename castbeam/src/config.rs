//! Runtime configuration for the outer binary: which receiver to target,
//! which file to stream, and how long to keep probing for it. Mirrors the
//! family's existing `Config`-struct-passed-to-a-controller pattern rather
//! than introducing a config file format.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);
pub const BIND_PORT_RANGE: (u16, u16) = (8100, 20000);
pub const BIND_RETRIES: u32 = 5;

pub struct Config {
    pub device_name: String,
    pub source_path: PathBuf,
    pub discovery_timeout: Duration,
    pub bind_host: String,
}

impl Config {
    /// Parse `castbeam <device name> <source file>` plus an optional
    /// `--timeout <seconds>` flag from the process argument list.
    pub fn from_args(mut args: impl Iterator<Item = String>) -> Result<Config> {
        let _argv0 = args.next();
        let mut positional = Vec::new();
        let mut discovery_timeout = DEFAULT_DISCOVERY_TIMEOUT;

        while let Some(arg) = args.next() {
            if arg == "--timeout" {
                let secs: u64 = args
                    .next()
                    .and_then(|v| v.parse().ok())
                    .ok_or_else(|| Error::DeviceNotFound("--timeout requires a numeric argument".into()))?;
                discovery_timeout = Duration::from_secs(secs);
            } else {
                positional.push(arg);
            }
        }

        let mut positional = positional.into_iter();
        let device_name = positional
            .next()
            .ok_or_else(|| Error::DeviceNotFound("usage: castbeam <device name> <source file>".into()))?;
        let source_path = positional
            .next()
            .map(PathBuf::from)
            .ok_or_else(|| Error::DeviceNotFound("usage: castbeam <device name> <source file>".into()))?;

        Ok(Config {
            device_name,
            source_path,
            discovery_timeout,
            bind_host: "0.0.0.0".to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positional_arguments() {
        let args = vec!["castbeam".to_owned(), "Living Room".to_owned(), "movie.mp4".to_owned()];
        let config = Config::from_args(args.into_iter()).unwrap();
        assert_eq!(config.device_name, "Living Room");
        assert_eq!(config.source_path, PathBuf::from("movie.mp4"));
        assert_eq!(config.discovery_timeout, DEFAULT_DISCOVERY_TIMEOUT);
    }

    #[test]
    fn parses_timeout_flag() {
        let args = vec![
            "castbeam".to_owned(),
            "--timeout".to_owned(),
            "20".to_owned(),
            "Living Room".to_owned(),
            "movie.mp4".to_owned(),
        ];
        let config = Config::from_args(args.into_iter()).unwrap();
        assert_eq!(config.discovery_timeout, Duration::from_secs(20));
    }

    #[test]
    fn missing_arguments_is_an_error() {
        let args = vec!["castbeam".to_owned()];
        assert!(Config::from_args(args.into_iter()).is_err());
    }
}
