//! Thin glue around an external video encoder binary. Transcoding itself
//! is out of scope here; this just shells out to `ffmpeg` to segment a
//! source file into an HLS playlist plus `.ts` segments in a scratch
//! directory, the way the outer app is expected to hand off to whatever
//! encoder is actually installed.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};

pub const PLAYLIST_NAME: &str = "stream.m3u8";

/// Invoke the encoder synchronously; by the time this returns, the
/// playlist and its segments are complete on disk in `out_dir`.
pub fn segment(source: &Path, out_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(out_dir).map_err(Error::Encoder)?;
    let playlist = out_dir.join(PLAYLIST_NAME);

    let status = Command::new("ffmpeg")
        .arg("-y")
        .arg("-i")
        .arg(source)
        .args(&["-codec", "copy", "-start_number", "0", "-hls_time", "10", "-hls_list_size", "0", "-f", "hls"])
        .arg(&playlist)
        .status()
        .map_err(Error::Encoder)?;

    if !status.success() {
        return Err(Error::Encoder(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("ffmpeg exited with {}", status),
        )));
    }
    Ok(playlist)
}
