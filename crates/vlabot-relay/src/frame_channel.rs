//! [`FrameChannel`] – the image side of the relay.
//!
//! Frames are files named `<prefix>_<unix-seconds>.<ext>` in a shared
//! directory.  The "current" frame is the matching file with the largest
//! embedded timestamp; equal timestamps are broken by file name so every
//! reader picks the same one.  Files are never deleted here; pruning old
//! frames is left to external housekeeping.

use std::fs;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;
use vlabot_types::{Frame, VlaError};

use crate::atomic::write_atomic;
use crate::bmp;

/// Extensions consumers accept.  Producers write `bmp`; a producer with an
/// image codec available may publish a compressed format instead.
pub const FRAME_EXTENSIONS: [&str; 4] = ["bmp", "jpg", "jpeg", "png"];

/// A frame found by a directory scan, with the file's modification time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedFrame {
    pub frame: Frame,
    pub modified: Option<SystemTime>,
}

/// Directory-scan image channel.
#[derive(Debug, Clone)]
pub struct FrameChannel {
    dir: PathBuf,
    prefix: String,
}

impl FrameChannel {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// File name for a frame captured at `timestamp`.
    pub fn file_name(&self, timestamp: i64, ext: &str) -> String {
        format!("{}_{timestamp}.{ext}", self.prefix)
    }

    /// Parse a file name of this channel, returning the embedded timestamp.
    pub fn parse_file_name(&self, name: &str) -> Option<i64> {
        let rest = name.strip_prefix(&self.prefix)?.strip_prefix('_')?;
        let (stamp, ext) = rest.split_once('.')?;
        if stamp.is_empty() || !stamp.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if !FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
            return None;
        }
        stamp.parse().ok()
    }

    /// Atomically publish an encoded image captured at `timestamp`.  A frame
    /// already published under the same name is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`VlaError::Io`] if the file cannot be written.
    pub fn publish(&self, timestamp: i64, ext: &str, bytes: &[u8]) -> Result<PathBuf, VlaError> {
        let path = self.dir.join(self.file_name(timestamp, ext));
        write_atomic(&path, bytes)?;
        Ok(path)
    }

    /// The current frame, or `None` if no matching file exists.
    ///
    /// # Errors
    ///
    /// Returns [`VlaError::Io`] if the directory cannot be listed.
    pub fn latest(&self) -> Result<Option<Frame>, VlaError> {
        Ok(self.scan()?.map(|o| o.frame))
    }

    /// Like [`latest`][Self::latest] but also reports the file's
    /// modification time, so a watcher can notice a same-second overwrite.
    ///
    /// # Errors
    ///
    /// Returns [`VlaError::Io`] if the directory cannot be listed.
    pub fn scan(&self) -> Result<Option<ObservedFrame>, VlaError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(VlaError::io(&self.dir, e)),
        };

        let mut best: Option<(i64, String)> = None;
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(stamp) = self.parse_file_name(&name) else {
                continue;
            };
            let newer = match &best {
                None => true,
                Some((s, n)) => (stamp, name.as_str()) > (*s, n.as_str()),
            };
            if newer {
                best = Some((stamp, name));
            }
        }

        let Some((stamp, name)) = best else {
            return Ok(None);
        };
        let path = self.dir.join(&name);
        // The file may vanish between listing and stat; report it without
        // metadata rather than failing the scan.
        let modified = fs::metadata(&path).and_then(|m| m.modified()).ok();
        let (width, height) = if name.to_ascii_lowercase().ends_with(".bmp") {
            bmp_dimensions(&path).unzip()
        } else {
            (None, None)
        };
        debug!(path = %path.display(), stamp, "latest frame");

        Ok(Some(ObservedFrame {
            frame: Frame {
                capture_timestamp: stamp,
                file_path: path,
                width,
                height,
            },
            modified,
        }))
    }
}

fn bmp_dimensions(path: &Path) -> Option<(u32, u32)> {
    let mut header = [0u8; 26];
    fs::File::open(path).ok()?.read_exact(&mut header).ok()?;
    bmp::read_dimensions(&header)
}
